// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use libfuzzer_sys::fuzz_target;
use notestamp_core::ast::validate_nodes;
use notestamp_core::{Editor, ListKind, Mark, MemoryClipboard, Node, Point, Range, Stamp, StampContext};

fn stamp_odd(context: &StampContext) -> Option<Stamp> {
    (context.cursor.path.len() % 2 == 1).then(|| Stamp::new("s", 1))
}

fn text_paths(nodes: &[Node], prefix: &mut Vec<usize>, out: &mut Vec<Point>) {
    for (index, node) in nodes.iter().enumerate() {
        prefix.push(index);
        match node {
            Node::Text(text) => out.push(Point::new(prefix.clone(), text.char_len())),
            Node::Element(element) => text_paths(&element.children, prefix, out),
        }
        prefix.pop();
    }
}

fuzz_target!(|data: &[u8]| {
    let mut editor = Editor::builder().host(stamp_odd).build();
    let mut clipboard = MemoryClipboard::new();
    for pair in data.chunks(2) {
        let (op, arg) = (pair[0], pair.get(1).copied().unwrap_or(0));
        let _ = match op % 10 {
            0 => editor.insert_text(["a", "bc", "\n", "x\r\ny", "é"][arg as usize % 5]),
            1 => editor.insert_break(),
            2 => editor.delete_backward(),
            3 => editor.delete_fragment(),
            4 => editor.toggle_mark(Mark::ALL[arg as usize % 4]),
            5 => {
                let kind = if arg % 2 == 0 { ListKind::Ordered } else { ListKind::Unordered };
                editor.toggle_block(kind)
            }
            6 => {
                editor.copy(&mut clipboard);
                Ok(())
            }
            7 => editor.paste(&clipboard),
            8 => editor.insert_tab(),
            _ => {
                let mut points = Vec::new();
                text_paths(&editor.children(), &mut Vec::new(), &mut points);
                let anchor = points[arg as usize % points.len()].clone();
                let focus = points[(arg as usize / 7) % points.len()].clone();
                let anchor = Point::new(anchor.path, anchor.offset / 2);
                editor.select(Range::new(anchor, focus))
            }
        };
        let children = editor.children();
        assert!(validate_nodes(&children).is_ok(), "{children:?}");
        if let Some(selection) = editor.selection() {
            let mut points = Vec::new();
            text_paths(&children, &mut Vec::new(), &mut points);
            for point in [&selection.anchor, &selection.focus] {
                assert!(points
                    .iter()
                    .any(|p| p.path == point.path && point.offset <= p.offset));
            }
        }
    }
});

// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end editing scenarios driven through the public editor API

use notestamp_core::ast::validate_nodes;
use notestamp_core::{
    Editor, EditorConfig, EditorError, LineOptions, ListKind, Mark, MemoryClipboard, Node, Point,
    Range, Stamp, StampContext, StampTrigger,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::Cell;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Host stamping every request with an increasing counter
fn counting_host() -> impl Fn(&StampContext) -> Option<Stamp> {
    let count = Cell::new(0);
    move |_context: &StampContext| {
        count.set(count.get() + 1);
        let n = count.get();
        Some(Stamp::new(n.to_string(), n))
    }
}

fn stamped_line(label: &str, value: u64, text: &str) -> Node {
    Node::paragraph(vec![Node::stamped(Stamp::new(label, value), vec![Node::text(text)])])
}

fn with_stamps(editor: &Editor) -> String {
    editor.text_content(&LineOptions::with_stamps())
}

#[test]
fn test_enter_stamps_new_line() {
    init_tracing();
    let mut editor = Editor::new(counting_host());
    editor.insert_text("a").unwrap();
    editor.insert_break().unwrap();
    editor.insert_text("b").unwrap();

    assert_eq!(
        editor.children(),
        vec![stamped_line("1", 1, "a"), stamped_line("2", 2, "b")]
    );
    assert_eq!(with_stamps(&editor), "[1] a\n[2] b\n");
    assert_eq!(editor.text_content(&LineOptions::default()), "a\nb\n");
}

#[test]
fn test_declined_stamp_gives_plain_lines() {
    init_tracing();
    let mut editor = Editor::new(|_: &StampContext| -> Option<Stamp> { None });
    editor.insert_text("a").unwrap();
    editor.insert_break().unwrap();
    editor.insert_text("b").unwrap();

    assert_eq!(
        editor.children(),
        vec![
            Node::paragraph(vec![Node::text("a")]),
            Node::paragraph(vec![Node::text("b")]),
        ]
    );
}

#[test]
fn test_host_sees_trigger() {
    let triggers = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = std::rc::Rc::clone(&triggers);
    let mut editor = Editor::new(move |context: &StampContext| -> Option<Stamp> {
        seen.borrow_mut().push(context.trigger);
        None
    });
    editor.insert_text("a").unwrap();
    editor.insert_break().unwrap();
    assert_eq!(
        triggers.borrow().as_slice(),
        &[StampTrigger::FirstCharacter, StampTrigger::Break]
    );
}

#[test]
fn test_backspace_at_stamp_start_removes_stamp() {
    init_tracing();
    let mut editor = Editor::new(counting_host());
    editor.insert_text("a").unwrap();
    editor.insert_break().unwrap();
    editor.insert_text("b").unwrap();

    editor.delete_backward().unwrap();
    assert_eq!(with_stamps(&editor), "[1] a\n[2] \n");
    editor.delete_backward().unwrap();
    assert_eq!(
        editor.children(),
        vec![stamped_line("1", 1, "a"), Node::paragraph(vec![Node::text("")])]
    );
    assert_eq!(
        editor.selection(),
        Some(Range::collapsed(Point::new([1, 0], 0)))
    );
}

#[test]
fn test_paste_replays_copied_lines() {
    init_tracing();
    let mut editor = Editor::default();
    editor.set_text_content("ab\ncd").unwrap();
    editor
        .select(Range::new(Point::new([0, 0], 1), Point::new([1, 0], 1)))
        .unwrap();
    editor.toggle_mark(Mark::Bold).unwrap();

    let mut clipboard = MemoryClipboard::new();
    editor.copy(&mut clipboard);
    assert_eq!(clipboard.text(), Some("b\nc\n"));

    editor.select_end().unwrap();
    editor.paste(&clipboard).unwrap();
    assert_eq!(editor.text_content(&LineOptions::default()), "ab\ncdb\nc\n");
    assert_eq!(
        editor.children()[2],
        Node::paragraph(vec![Node::marked("c", [Mark::Bold])])
    );
}

#[test]
fn test_paste_into_empty_document() {
    let mut editor = Editor::default();
    document(&mut editor, &["foo".to_owned(), "bar".to_owned()]);
    let mut clipboard = MemoryClipboard::new();
    editor.copy(&mut clipboard);
    assert_eq!(clipboard.text(), Some("foo\nbar\n"));

    editor.clear().unwrap();
    editor.paste(&clipboard).unwrap();
    assert_eq!(
        editor.children(),
        vec![
            Node::paragraph(vec![Node::text("foo")]),
            Node::paragraph(vec![Node::text("bar")]),
        ]
    );
    assert_eq!(
        editor.selection(),
        Some(Range::collapsed(Point::new([1, 0], 3)))
    );
}

#[test]
fn test_paste_of_foreign_text_is_plain() {
    let mut editor = Editor::default();
    editor.toggle_mark(Mark::Italic).unwrap();
    editor.insert_text("x").unwrap();
    editor.paste(&MemoryClipboard::with_text("y")).unwrap();
    assert_eq!(
        editor.children(),
        vec![Node::paragraph(vec![
            Node::marked("x", [Mark::Italic]),
            Node::text("y"),
        ])]
    );
}

#[test]
fn test_version_counts_changing_batches() {
    let mut editor = Editor::default();
    editor.delete_backward().unwrap();
    assert_eq!(editor.version(), 0);
    editor.insert_text("a").unwrap();
    editor.select_point(Point::new([0, 0], 0)).unwrap();
    assert_eq!(editor.version(), 1);
    editor.insert_break().unwrap();
    assert_eq!(editor.version(), 2);
}

#[test]
fn test_failed_batch_rolls_back() {
    init_tracing();
    let mut editor = Editor::builder()
        .config(EditorConfig { normalize_limit: 0 })
        .build();
    editor.insert_text("kept").unwrap();
    let before = editor.children();
    let result = editor.insert_text("a\nb");
    assert!(matches!(
        result,
        Err(EditorError::StructuralInvariantViolation(_))
    ));
    assert_eq!(editor.children(), before);
    assert_eq!(editor.version(), 1);
}

#[test]
fn test_config_from_json() {
    let config: EditorConfig = serde_json::from_str(r#"{"normalize_limit": 7}"#).unwrap();
    assert_eq!(config.normalize_limit, 7);
    let config: EditorConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.normalize_limit, EditorConfig::default().normalize_limit);
}

#[test]
fn test_list_keeps_stamps() {
    let mut editor = Editor::new(counting_host());
    editor.insert_text("a").unwrap();
    editor.toggle_block(ListKind::Ordered).unwrap();
    assert_eq!(
        editor.children(),
        vec![Node::list(
            ListKind::Ordered,
            vec![Node::list_item(vec![Node::stamped(
                Stamp::new("1", 1),
                vec![Node::text("a")]
            )])]
        )]
    );
    editor.insert_break().unwrap();
    assert_eq!(with_stamps(&editor), "[1] a\n[2] \n");
    assert!(editor.is_block_active(ListKind::Ordered));
}

fn document(editor: &mut Editor, lines: &[String]) {
    editor.set_text_content(&lines.join("\n")).unwrap();
    let last = lines.len() - 1;
    let len = lines[last].chars().count();
    editor
        .select(Range::new(Point::new([0, 0], 0), Point::new([last, 0], len)))
        .unwrap();
}

#[derive(Debug, Clone)]
enum Edit {
    Type(String),
    Break,
    Backspace,
    Mark(usize),
    List(bool),
    Select(usize, usize),
    DeleteFragment,
    Copy,
    Paste,
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[a-c\n]{1,3}".prop_map(Edit::Type),
        Just(Edit::Break),
        Just(Edit::Backspace),
        (0usize..4).prop_map(Edit::Mark),
        any::<bool>().prop_map(Edit::List),
        (0usize..16, 0usize..16).prop_map(|(a, b)| Edit::Select(a, b)),
        Just(Edit::DeleteFragment),
        Just(Edit::Copy),
        Just(Edit::Paste),
    ]
}

fn leaf_points(nodes: &[Node], prefix: &mut Vec<usize>, out: &mut Vec<Point>) {
    for (index, node) in nodes.iter().enumerate() {
        prefix.push(index);
        match node {
            Node::Text(text) => out.push(Point::new(prefix.clone(), text.char_len())),
            Node::Element(element) => leaf_points(&element.children, prefix, out),
        }
        prefix.pop();
    }
}

fn any_line_break(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| match node {
        Node::Text(text) => text.text.contains('\n'),
        Node::Element(element) => any_line_break(&element.children),
    })
}

proptest! {
    // Property: toggling a list on and off restores the lines
    #[test]
    fn prop_list_toggle_round_trip(
        lines in prop::collection::vec("[a-z]{1,5}", 1..5),
        ordered in any::<bool>(),
    ) {
        let kind = if ordered { ListKind::Ordered } else { ListKind::Unordered };
        let mut editor = Editor::default();
        document(&mut editor, &lines);
        let before = editor.children();
        editor.toggle_block(kind).unwrap();
        prop_assert!(editor.is_block_active(kind));
        editor.toggle_block(kind).unwrap();
        prop_assert_eq!(editor.children(), before);
    }

    // Property: any edit sequence leaves a well-formed tree and a valid selection
    #[test]
    fn prop_edits_preserve_structure(edits in prop::collection::vec(edit_strategy(), 0..24)) {
        let mut editor = Editor::new(counting_host());
        let mut clipboard = MemoryClipboard::new();
        for edit in edits {
            let result = match edit {
                Edit::Type(text) => editor.insert_text(&text),
                Edit::Break => editor.insert_break(),
                Edit::Backspace => editor.delete_backward(),
                Edit::Mark(i) => editor.toggle_mark(Mark::ALL[i]),
                Edit::List(ordered) => editor.toggle_block(if ordered {
                    ListKind::Ordered
                } else {
                    ListKind::Unordered
                }),
                Edit::Select(a, b) => {
                    let mut points = Vec::new();
                    leaf_points(&editor.children(), &mut Vec::new(), &mut points);
                    let anchor = points[a % points.len()].clone();
                    let focus = points[b % points.len()].clone();
                    editor.select(Range::new(anchor, focus))
                }
                Edit::DeleteFragment => editor.delete_fragment(),
                Edit::Copy => {
                    editor.copy(&mut clipboard);
                    Ok(())
                }
                Edit::Paste => editor.paste(&clipboard),
            };
            prop_assert!(result.is_ok(), "{:?}", result);
            let children = editor.children();
            prop_assert!(validate_nodes(&children).is_ok());
            prop_assert!(children.iter().all(|node| !node.is_text()));
            prop_assert!(!any_line_break(&children));
            let mut points = Vec::new();
            leaf_points(&children, &mut Vec::new(), &mut points);
            let selection = editor.selection().expect("editor keeps a selection");
            for point in [&selection.anchor, &selection.focus] {
                prop_assert!(points
                    .iter()
                    .any(|leaf| leaf.path == point.path && point.offset <= leaf.offset));
            }
        }
    }
}

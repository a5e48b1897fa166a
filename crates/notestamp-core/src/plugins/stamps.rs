// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stamped line behaviour
//!
//! Decides when a new line asks the host for a stamp, keeps stamped lines
//! hosted in a paragraph or list item, and removes stamps on backspace.

use crate::ast::{Element, ElementKind, Node, Stamp, Text};
use crate::path::{Path, Point};
use crate::traits::{
    EditorError, Next, Plugin, Result, StampContext, StampHost, StampTrigger,
};
use crate::tree::Tree;
use std::rc::Rc;
use tracing::debug;

pub struct StampsPlugin {
    host: Rc<dyn StampHost>,
}

impl StampsPlugin {
    pub fn new(host: Rc<dyn StampHost>) -> Self {
        Self { host }
    }

    /// Ask the host for a stamp; a null value means no stamp
    fn request_stamp(&self, trigger: StampTrigger, cursor: &Point) -> Option<Stamp> {
        let context = StampContext {
            trigger,
            cursor: cursor.clone(),
        };
        let stamp = self
            .host
            .on_stamp_insert(&context)
            .filter(|stamp| !stamp.is_void());
        debug!(?trigger, granted = stamp.is_some(), "requested stamp");
        stamp
    }
}

fn structural(message: String) -> EditorError {
    EditorError::StructuralInvariantViolation(message)
}

/// Nearest non-stamped block above `path`, with its kind
fn host_of(tree: &Tree, path: &Path) -> Result<(Path, ElementKind)> {
    tree.host_above(path)
        .map(|(host, element)| (host, element.kind.clone()))
        .ok_or_else(|| structural(format!("no unstamped block above {path}")))
}

fn block_of<'a>(tree: &'a Tree, path: &Path) -> Result<(Path, &'a Element)> {
    tree.block_above(path)
        .ok_or_else(|| structural(format!("no block above {path}")))
}

impl Plugin for StampsPlugin {
    fn name(&self) -> &'static str {
        "stamps"
    }

    fn insert_break(&self, tree: &mut Tree, next: Next<'_>) -> Result<()> {
        let selection = tree.require_selection()?;
        if selection.is_expanded() {
            next.head().delete_fragment(tree)?;
            let start = tree.require_selection()?.start();
            tree.select_point(start);
        }
        let cursor = tree.require_selection()?.focus;
        let (host, host_kind) = host_of(tree, &cursor.path)?;
        let (block, _) = block_of(tree, &cursor.path)?;

        let content = if tree.is_end(&cursor, &block) {
            let body = vec![Node::text("")];
            match self.request_stamp(StampTrigger::Break, &cursor) {
                Some(stamp) => vec![Node::stamped(stamp, body)],
                None => body,
            }
        } else {
            let tail = tree.detach_tail(&cursor, &block)?;
            match self.request_stamp(StampTrigger::Break, &cursor) {
                Some(stamp) => vec![Node::stamped(stamp, tail)],
                None => tail,
            }
        };
        let line = host.next();
        tree.insert_node(line.clone(), Node::element(host_kind, content))?;
        let start = tree.start(&line)?;
        tree.select_point(start);
        Ok(())
    }

    fn insert_text(&self, tree: &mut Tree, text: &str, next: Next<'_>) -> Result<()> {
        let selection = tree.require_selection()?;
        if selection.is_expanded() || text.is_empty() {
            return next.insert_text(tree, text);
        }
        let cursor = selection.focus;
        let (block, element) = block_of(tree, &cursor.path)?;
        if element.kind.is_stamped() || !element.is_empty_line() {
            return next.insert_text(tree, text);
        }
        let kind = element.kind.clone();
        let marks = tree.text(&cursor.path)?.marks.clone();
        let Some(stamp) = self.request_stamp(StampTrigger::FirstCharacter, &cursor) else {
            return next.insert_text(tree, text);
        };

        let body = Node::Text(Text::new("").with_marks(marks));
        let line = Node::element(kind, vec![Node::stamped(stamp, vec![body])]);
        tree.insert_node(block.next(), line)?;
        tree.remove_node(&block)?;
        let start = tree.start(&block)?;
        tree.select_point(start);
        next.insert_text(tree, text)
    }

    fn delete_backward(&self, tree: &mut Tree, next: Next<'_>) -> Result<()> {
        let selection = tree.require_selection()?;
        if selection.is_expanded() {
            return next.delete_backward(tree);
        }
        let cursor = selection.focus;
        let (block, element) = block_of(tree, &cursor.path)?;
        if !tree.is_start(&cursor, &block) {
            return next.delete_backward(tree);
        }
        if element.kind.is_stamped() {
            debug!(path = %block, "unwrapping stamped line");
            return tree.unwrap_node(&block);
        }

        // an empty stamped line right before takes over this line
        let Some(before) = tree.before(&cursor) else {
            return next.delete_backward(tree);
        };
        let empty_stamp_before = tree
            .above(&before.path, |e| e.kind.is_stamped())
            .is_some_and(|(stamped, _)| tree.is_start(&before, &stamped));
        if !empty_stamp_before {
            return next.delete_backward(tree);
        }
        let leaves: Vec<Text> = if element.is_empty_line() {
            Vec::new()
        } else {
            element
                .children
                .iter()
                .filter_map(Node::as_text)
                .cloned()
                .collect()
        };
        tree.remove_and_prune(&block, &Path::root())?;
        tree.select_point(before.clone());
        tree.insert_leaves(&before, leaves)?;
        tree.select_point(before);
        Ok(())
    }

    fn normalize_node(&self, tree: &mut Tree, path: &Path, next: Next<'_>) -> Result<bool> {
        let breaks = match tree.get(path) {
            Some(Node::Text(leaf)) => line_breaks(&leaf.text),
            _ => Vec::new(),
        };
        if breaks.is_empty() {
            return next.normalize_node(tree, path);
        }
        let Some((host, host_element)) = tree.host_above(path) else {
            return next.normalize_node(tree, path);
        };
        if !host_element.kind.is_host() {
            return next.normalize_node(tree, path);
        }
        let host_kind = host_element.kind.clone();
        let block = path.parent();
        let stamped_at = if tree.kind(&block)?.is_stamped() {
            let index = host
                .index()
                .ok_or_else(|| structural(format!("stamped line {block} at root")))?;
            Some(index)
        } else {
            None
        };

        // last break first, so earlier offsets and `path` stay put
        for &(offset, len) in breaks.iter().rev() {
            tree.remove_text(path, offset, len)?;
            let right = tree.split_nodes(&Point::new(path.clone(), offset), &block)?;
            if let Some(index) = stamped_at {
                tree.move_node(&right, &host.next())?;
                tree.wrap_nodes(&host.parent(), index + 1, index + 2, host_kind.clone())?;
            }
        }
        debug!(path = %path, lines = breaks.len() + 1, "split text at line breaks");
        Ok(true)
    }
}

/// Line breaks in `text` as (char offset, char length); `\r\n` is one break
fn line_breaks(text: &str) -> Vec<(usize, usize)> {
    let mut breaks = Vec::new();
    let mut previous = None;
    for (offset, c) in text.chars().enumerate() {
        if c == '\n' {
            breaks.push(if previous == Some('\r') {
                (offset - 1, 2)
            } else {
                (offset, 1)
            });
        }
        previous = Some(c);
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Mark, Marks};
    use crate::path::Range;
    use crate::tree::normalize::normalize;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    /// Host handing out sequential stamps, or declining
    struct Counter {
        next: Cell<i64>,
        grant: bool,
    }

    impl StampHost for Counter {
        fn on_stamp_insert(&self, _context: &StampContext) -> Option<Stamp> {
            let n = self.next.get();
            self.next.set(n + 1);
            self.grant.then(|| Stamp::new(n.to_string(), n))
        }
    }

    fn chain(grant: bool) -> Vec<Box<dyn Plugin>> {
        vec![Box::new(StampsPlugin::new(Rc::new(Counter {
            next: Cell::new(1),
            grant,
        })))]
    }

    fn tree_at(children: Vec<Node>, point: Point) -> Tree {
        let mut tree = Tree::new();
        tree.replace_children(children);
        tree.select_point(point);
        tree
    }

    fn settle(tree: &mut Tree, chain: &[Box<dyn Plugin>]) {
        normalize(tree, Next::new(chain), 1_000).unwrap();
    }

    #[test]
    fn test_break_at_end_inserts_stamped_line() {
        let chain = chain(true);
        let mut tree = tree_at(vec![Node::paragraph(vec![Node::text("hello")])], Point::new([0, 0], 5));
        Next::new(&chain).insert_break(&mut tree).unwrap();
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[
                Node::paragraph(vec![Node::text("hello")]),
                Node::paragraph(vec![Node::stamped(Stamp::new("1", 1), vec![Node::text("")])]),
            ]
        );
        assert_eq!(tree.selection(), Some(&Range::collapsed(Point::new([1, 0, 0], 0))));
    }

    #[test]
    fn test_break_mid_line_moves_tail_into_stamp() {
        let chain = chain(true);
        let mut tree = tree_at(vec![Node::paragraph(vec![Node::text("hello")])], Point::new([0, 0], 2));
        Next::new(&chain).insert_break(&mut tree).unwrap();
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[
                Node::paragraph(vec![Node::text("he")]),
                Node::paragraph(vec![Node::stamped(Stamp::new("1", 1), vec![Node::text("llo")])]),
            ]
        );
    }

    #[test]
    fn test_declined_break_in_list_item() {
        let chain = chain(false);
        let mut tree = tree_at(
            vec![Node::list(
                crate::ast::ListKind::Unordered,
                vec![Node::list_item(vec![Node::text("ab")])],
            )],
            Point::new([0, 0, 0], 1),
        );
        Next::new(&chain).insert_break(&mut tree).unwrap();
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[Node::list(
                crate::ast::ListKind::Unordered,
                vec![
                    Node::list_item(vec![Node::text("a")]),
                    Node::list_item(vec![Node::text("b")]),
                ],
            )]
        );
        assert_eq!(tree.selection(), Some(&Range::collapsed(Point::new([0, 1, 0], 0))));
    }

    #[test]
    fn test_break_inside_stamp_creates_hosted_sibling() {
        let chain = chain(true);
        let mut tree = tree_at(
            vec![Node::paragraph(vec![Node::stamped(Stamp::new("0", 0), vec![Node::text("abcd")])])],
            Point::new([0, 0, 0], 2),
        );
        Next::new(&chain).insert_break(&mut tree).unwrap();
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[
                Node::paragraph(vec![Node::stamped(Stamp::new("0", 0), vec![Node::text("ab")])]),
                Node::paragraph(vec![Node::stamped(Stamp::new("1", 1), vec![Node::text("cd")])]),
            ]
        );
    }

    #[test]
    fn test_first_character_requests_stamp_and_keeps_marks() {
        let chain = chain(true);
        let mut tree = tree_at(
            vec![Node::paragraph(vec![Node::marked("", [Mark::Italic])])],
            Point::new([0, 0], 0),
        );
        Next::new(&chain).insert_text(&mut tree, "x").unwrap();
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[Node::paragraph(vec![Node::stamped(
                Stamp::new("1", 1),
                vec![Node::marked("x", [Mark::Italic])],
            )])]
        );
        assert_eq!(tree.selection(), Some(&Range::collapsed(Point::new([0, 0, 0], 1))));
    }

    #[test]
    fn test_typing_into_non_empty_line_passes_through() {
        let chain = chain(true);
        let mut tree = tree_at(vec![Node::paragraph(vec![Node::text("a")])], Point::new([0, 0], 1));
        Next::new(&chain).insert_text(&mut tree, "b").unwrap();
        assert_eq!(tree.children(), &[Node::paragraph(vec![Node::text("ab")])]);
    }

    #[test]
    fn test_backspace_at_stamp_start_unwraps() {
        let chain = chain(true);
        let mut tree = tree_at(
            vec![Node::paragraph(vec![Node::stamped(Stamp::new("x", 0), vec![Node::text("abc")])])],
            Point::new([0, 0, 0], 0),
        );
        Next::new(&chain).delete_backward(&mut tree).unwrap();
        settle(&mut tree, &chain);
        assert_eq!(tree.children(), &[Node::paragraph(vec![Node::text("abc")])]);
    }

    #[test]
    fn test_backspace_into_empty_stamp_moves_line() {
        let chain = chain(true);
        let stamp = Stamp::new("2", 2);
        let mut tree = tree_at(
            vec![
                Node::paragraph(vec![Node::stamped(stamp.clone(), vec![Node::text("")])]),
                Node::paragraph(vec![Node::text("tail")]),
            ],
            Point::new([1, 0], 0),
        );
        Next::new(&chain).delete_backward(&mut tree).unwrap();
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[Node::paragraph(vec![Node::stamped(stamp, vec![Node::text("tail")])])]
        );
        assert_eq!(tree.selection(), Some(&Range::collapsed(Point::new([0, 0, 0], 0))));
    }

    #[test]
    fn test_newline_inside_stamp_splits_into_hosted_lines() {
        let chain = chain(true);
        let stamp = Stamp::new("7", json!({ "t": 7 }));
        let mut tree = tree_at(
            vec![Node::paragraph(vec![Node::stamped(stamp.clone(), vec![Node::text("a\r\nb\nc")])])],
            Point::new([0, 0, 0], 0),
        );
        settle(&mut tree, &chain);
        let line = |s: &str| Node::paragraph(vec![Node::stamped(stamp.clone(), vec![Node::text(s)])]);
        assert_eq!(tree.children(), &[line("a"), line("b"), line("c")]);
    }

    #[test]
    fn test_newline_in_paragraph_keeps_marks() {
        let chain = chain(false);
        let mut tree = tree_at(
            vec![Node::paragraph(vec![Node::marked("x\ny", [Mark::Bold])])],
            Point::new([0, 0], 0),
        );
        settle(&mut tree, &chain);
        assert_eq!(
            tree.children(),
            &[
                Node::paragraph(vec![Node::marked("x", [Mark::Bold])]),
                Node::paragraph(vec![Node::marked("y", [Mark::Bold])]),
            ]
        );
        assert_eq!(tree.pending_marks(), None::<&Marks>);
    }

    #[test]
    fn test_all_breaks_split_in_one_fix() {
        let chain = chain(false);
        let mut tree = tree_at(
            vec![Node::paragraph(vec![Node::text("a\nb\nc\nd")])],
            Point::new([0, 0], 0),
        );
        assert_eq!(normalize(&mut tree, Next::new(&chain), 1).unwrap(), 1);
        let lines: Vec<Node> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|s| Node::paragraph(vec![Node::text(s)]))
            .collect();
        assert_eq!(tree.children(), lines.as_slice());
    }

    #[test]
    fn test_line_breaks_count_crlf_once() {
        assert_eq!(line_breaks("plain"), vec![]);
        assert_eq!(line_breaks("a\r\nb\nc"), vec![(1, 2), (4, 1)]);
        assert_eq!(line_breaks("\n\n"), vec![(0, 1), (1, 1)]);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mark queries and toggling

use crate::ast::{Mark, Marks};
use crate::path::{Path, Point, Range};
use crate::traits::Result;
use crate::tree::{Operation, Tree};

/// Marks in effect at the selection.
///
/// Pending marks win. A cursor takes the marks of its leaf, or of the
/// previous leaf in the same block when it sits at offset 0. An expanded
/// selection yields the marks shared by every leaf it touches.
pub fn active_marks(tree: &Tree) -> Marks {
    if let Some(marks) = tree.pending_marks() {
        return marks.clone();
    }
    let Some(selection) = tree.selection() else {
        return Marks::new();
    };
    if selection.is_collapsed() {
        let point = &selection.focus;
        let leaf = match point.path.previous() {
            Some(previous) if point.offset == 0 && tree.text(&previous).is_ok() => previous,
            _ => point.path.clone(),
        };
        return tree
            .text(&leaf)
            .map(|text| text.marks.clone())
            .unwrap_or_default();
    }
    let mut leaves = covered_leaves(tree, selection).into_iter();
    let Some(first) = leaves.next().and_then(|path| tree.text(&path).ok()) else {
        return Marks::new();
    };
    leaves
        .filter_map(|path| tree.text(&path).ok())
        .fold(first.marks.clone(), |acc, text| acc.intersection(&text.marks))
}

pub fn is_mark_active(tree: &Tree, mark: Mark) -> bool {
    active_marks(tree).contains(mark)
}

/// Text leaves holding at least one selected character
pub fn covered_leaves(tree: &Tree, range: &Range) -> Vec<Path> {
    let (start, end) = range.edges();
    tree.text_paths()
        .into_iter()
        .filter(|path| *path >= start.path && *path <= end.path)
        .filter(|path| {
            if *path == start.path && *path != end.path {
                let len = tree.text(path).map_or(0, |text| text.char_len());
                return start.offset < len;
            }
            if *path == end.path && *path != start.path {
                return end.offset > 0;
            }
            true
        })
        .collect()
}

/// Add `mark` where it is missing, or remove it where it is active.
///
/// A cursor only changes the pending set. An expanded selection splits the
/// leaves at its edges and restyles every covered leaf.
pub fn toggle_mark(tree: &mut Tree, mark: Mark) -> Result<()> {
    let selection = tree.require_selection()?;
    let active = is_mark_active(tree, mark);
    if selection.is_collapsed() {
        let base = active_marks(tree);
        let marks = if active { base.without(mark) } else { base.with(mark) };
        tree.set_pending_marks(Some(marks));
        return Ok(());
    }

    let forward = selection.anchor <= selection.focus;
    let (mut start, mut end) = selection.edges();
    for point in [end.clone(), start.clone()] {
        let len = tree.text(&point.path)?.char_len();
        if point.offset == 0 || point.offset >= len {
            continue;
        }
        let op = Operation::SplitNode {
            path: point.path.clone(),
            position: point.offset,
        };
        start = op.transform_point(&start).unwrap_or(start);
        end = op.transform_point(&end).unwrap_or(end);
        tree.apply(op)?;
    }
    // the end half of the range keeps the right edge in place
    if end.offset == 0 && end.path != start.path {
        if let Some(previous) = end.path.previous().filter(|p| tree.text(p).is_ok()) {
            let len = tree.text(&previous)?.char_len();
            end = Point::new(previous, len);
        }
    }

    let range = Range::new(start.clone(), end.clone());
    for path in covered_leaves(tree, &range) {
        let marks = &tree.text(&path)?.marks;
        let marks = if active { marks.without(mark) } else { marks.with(mark) };
        tree.set_marks(&path, marks)?;
    }
    tree.select(if forward {
        Range::new(start, end)
    } else {
        Range::new(end, start)
    });
    tree.set_pending_marks(None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use pretty_assertions::assert_eq;

    fn tree_with(children: Vec<Node>, range: Range) -> Tree {
        let mut tree = Tree::new();
        tree.replace_children(children);
        tree.select(range);
        tree
    }

    #[test]
    fn test_cursor_toggle_sets_pending_marks() {
        let mut tree = tree_with(
            vec![Node::paragraph(vec![Node::text("ab")])],
            Range::collapsed(Point::new([0, 0], 1)),
        );
        toggle_mark(&mut tree, Mark::Bold).unwrap();
        assert!(is_mark_active(&tree, Mark::Bold));
        toggle_mark(&mut tree, Mark::Bold).unwrap();
        assert!(!is_mark_active(&tree, Mark::Bold));
        assert_eq!(tree.children()[0], Node::paragraph(vec![Node::text("ab")]));
    }

    #[test]
    fn test_cursor_at_leaf_start_reads_previous_leaf() {
        let tree = tree_with(
            vec![Node::paragraph(vec![
                Node::marked("ab", [Mark::Italic]),
                Node::text("cd"),
            ])],
            Range::collapsed(Point::new([0, 1], 0)),
        );
        assert!(is_mark_active(&tree, Mark::Italic));
    }

    #[test]
    fn test_expanded_toggle_splits_edges() {
        let mut tree = tree_with(
            vec![Node::paragraph(vec![Node::text("abcd")])],
            Range::new(Point::new([0, 0], 1), Point::new([0, 0], 3)),
        );
        toggle_mark(&mut tree, Mark::Bold).unwrap();
        assert_eq!(
            tree.children()[0],
            Node::paragraph(vec![
                Node::text("a"),
                Node::marked("bc", [Mark::Bold]),
                Node::text("d"),
            ])
        );
        assert_eq!(
            tree.selection(),
            Some(&Range::new(Point::new([0, 1], 0), Point::new([0, 1], 2)))
        );
        assert!(is_mark_active(&tree, Mark::Bold));

        toggle_mark(&mut tree, Mark::Bold).unwrap();
        assert!(!is_mark_active(&tree, Mark::Bold));
        assert_eq!(tree.children()[0].string(), "abcd");
    }

    #[test]
    fn test_expanded_intersection() {
        let tree = tree_with(
            vec![Node::paragraph(vec![
                Node::marked("ab", [Mark::Bold, Mark::Code]),
                Node::marked("cd", [Mark::Bold]),
            ])],
            Range::new(Point::new([0, 0], 0), Point::new([0, 1], 2)),
        );
        assert_eq!(active_marks(&tree), Marks::from_iter([Mark::Bold]));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in editing behaviour at the end of the plugin chain

use super::Tree;
use crate::ast::Text;
use crate::path::{Point, Range};
use crate::traits::{EditorError, Result};

/// Insert `text` at the cursor, replacing an expanded selection. Pending
/// marks that differ from the cursor leaf start a new leaf.
pub fn insert_text(tree: &mut Tree, text: &str) -> Result<()> {
    let point = collapse(tree)?;
    if text.is_empty() {
        return Ok(());
    }
    let leaf_marks = tree.text(&point.path)?.marks.clone();
    match tree.pending_marks().cloned() {
        Some(marks) if marks != leaf_marks => {
            let end = tree.insert_leaves(&point, vec![Text::new(text).with_marks(marks)])?;
            tree.select_point(end);
        }
        _ => {
            tree.insert_text_at(&point, text)?;
            let offset = point.offset + text.chars().count();
            tree.select_point(Point::new(point.path, offset));
        }
    }
    tree.set_pending_marks(None);
    Ok(())
}

/// Split the current block at the cursor
pub fn insert_break(tree: &mut Tree) -> Result<()> {
    let point = collapse(tree)?;
    let (block, _) = tree.block_above(&point.path).ok_or_else(|| {
        EditorError::StructuralInvariantViolation(format!("no block above {}", point.path))
    })?;
    let right = tree.split_nodes(&point, &block)?;
    let start = tree.start(&right)?;
    tree.select_point(start);
    Ok(())
}

/// Delete one grapheme (or one block boundary) before the cursor
pub fn delete_backward(tree: &mut Tree) -> Result<()> {
    let selection = tree.require_selection()?;
    if selection.is_expanded() {
        return delete_fragment(tree);
    }
    let cursor = selection.focus;
    let Some(before) = tree.before(&cursor) else {
        return Ok(());
    };
    let point = tree.delete_range(&Range::new(before, cursor))?;
    tree.select_point(point);
    tree.set_pending_marks(None);
    Ok(())
}

/// Delete the selected content
pub fn delete_fragment(tree: &mut Tree) -> Result<()> {
    let selection = tree.require_selection()?;
    if selection.is_collapsed() {
        return Ok(());
    }
    let point = tree.delete_range(&selection)?;
    tree.select_point(point);
    tree.set_pending_marks(None);
    Ok(())
}

/// Delete an expanded selection and return the cursor
fn collapse(tree: &mut Tree) -> Result<Point> {
    let selection = tree.require_selection()?;
    if selection.is_collapsed() {
        return Ok(selection.focus);
    }
    let point = tree.delete_range(&selection)?;
    tree.select_point(point.clone());
    Ok(point)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Copy and paste
//!
//! Copy writes the plain text of the selected lines to the system clipboard
//! and keeps the styled lines in the editor. Paste replays the styled lines
//! when the system clipboard still holds exactly their text, and otherwise
//! inserts the system text as one unformatted run.

use crate::ast::{Marks, Node, Text};
use crate::lines::{lines_to_text, to_lines, Line};
use crate::path::Point;
use crate::traits::{EditorError, LineOptions, Next, Result, SystemClipboard};
use crate::tree::{commands, Tree};
use tracing::debug;

/// In-memory system clipboard
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    text: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl SystemClipboard for MemoryClipboard {
    fn read_text(&self) -> Option<String> {
        self.text.clone()
    }

    fn write_text(&mut self, text: &str) {
        self.text = Some(text.to_owned());
    }
}

/// Lines of the selected content. A cursor copies nothing.
pub fn copy_lines(tree: &Tree) -> Option<Vec<Line>> {
    let selection = tree.selection()?;
    if selection.is_collapsed() {
        return None;
    }
    let fragment = tree.fragment(selection);
    Some(to_lines(&fragment, &LineOptions::default()).collect())
}

/// Paste at the selection, replacing expanded content first
pub fn paste(tree: &mut Tree, next: Next<'_>, internal: &[Line], system: Option<&str>) -> Result<()> {
    if tree.require_selection()?.is_expanded() {
        next.head().delete_fragment(tree)?;
    }
    let Some(system) = system else {
        return Ok(());
    };
    if !internal.is_empty() && lines_to_text(internal) == system {
        debug!(lines = internal.len(), "replaying copied lines");
        return paste_lines(tree, internal);
    }
    tree.set_pending_marks(Some(Marks::new()));
    commands::insert_text(tree, system)
}

/// Insert styled lines at the cursor: the first inline, the rest as new
/// lines after the cursor's host, stamped like the line they land in
pub fn paste_lines(tree: &mut Tree, lines: &[Line]) -> Result<()> {
    let Some((first, rest)) = lines.split_first() else {
        return Ok(());
    };
    let cursor = tree.require_selection()?.focus;
    let (host, host_element) = tree.host_above(&cursor.path).ok_or_else(|| {
        EditorError::StructuralInvariantViolation(format!("no unstamped block above {}", cursor.path))
    })?;
    let host_kind = host_element.kind.clone();
    let (block, block_element) = tree.block_above(&cursor.path).ok_or_else(|| {
        EditorError::StructuralInvariantViolation(format!("no block above {}", cursor.path))
    })?;
    let stamp = block_element.kind.stamp().cloned();

    let mut tail = if rest.is_empty() {
        Vec::new()
    } else {
        tree.detach_tail(&cursor, &block)?
    };
    let mut end = tree.insert_leaves(&cursor, leaves(first))?;

    let mut line_path = host;
    for (i, line) in rest.iter().enumerate() {
        let mut children: Vec<Node> = leaves(line).into_iter().map(Node::Text).collect();
        if children.is_empty() {
            children.push(Node::text(""));
        }
        let last = children.len() - 1;
        let last_len = children[last].char_count();
        if i + 1 == rest.len() {
            children.append(&mut tail);
        }
        line_path = line_path.next();
        let (content, body) = match &stamp {
            Some(stamp) => (
                vec![Node::stamped(stamp.clone(), children)],
                line_path.child(0),
            ),
            None => (children, line_path.clone()),
        };
        tree.insert_node(
            line_path.clone(),
            Node::element(host_kind.clone(), content),
        )?;
        end = Point::new(body.child(last), last_len);
    }
    tree.select_point(end);
    Ok(())
}

fn leaves(line: &Line) -> Vec<Text> {
    line.iter().cloned().map(Text::from).collect()
}

/// Plain text a copy of `lines` puts on the system clipboard
pub fn clipboard_text(lines: &[Line]) -> String {
    lines_to_text(lines)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! List toggling
//!
//! Lists are a wrapper element (`ordered-list` / `unordered-list`) around
//! `list-item` hosts. Toggling works on the hosts the selection touches,
//! so stamped lines keep their stamps when they move in or out of a list.

use crate::ast::{ElementKind, ListKind};
use crate::path::{Path, Range};
use crate::traits::{EditorError, Result};
use crate::tree::{Operation, Tree};

/// Paragraphs and list items holding the selected leaves, in document order
pub fn line_hosts(tree: &Tree, range: &Range) -> Vec<Path> {
    let (start, end) = range.edges();
    let mut hosts: Vec<Path> = Vec::new();
    for leaf in tree.text_paths() {
        if leaf < start.path || leaf > end.path {
            continue;
        }
        if let Some((host, _)) = tree.above(&leaf, |element| element.kind.is_host()) {
            if hosts.last() != Some(&host) {
                hosts.push(host);
            }
        }
    }
    hosts
}

/// Whether the selection touches a list of `kind`
pub fn is_list_active(tree: &Tree, kind: ListKind) -> bool {
    let Some(selection) = tree.selection() else {
        return false;
    };
    line_hosts(tree, selection).iter().any(|host| {
        tree.above(host, |element| element.kind.list_kind() == Some(kind))
            .is_some()
    })
}

/// Move the selected lines out of any list, then either leave them as
/// paragraphs (`is_active`) or wrap them in a fresh list of `kind`.
pub fn toggle_list(tree: &mut Tree, is_active: bool, kind: ListKind) -> Result<()> {
    let selection = tree.require_selection()?;
    for (list, first, last) in list_runs(tree, &line_hosts(tree, &selection))
        .into_iter()
        .rev()
    {
        let len = tree.element(&list)?.children.len();
        if last + 1 < len {
            tree.apply(Operation::SplitNode {
                path: list.clone(),
                position: last + 1,
            })?;
        }
        let target = if first > 0 {
            tree.apply(Operation::SplitNode {
                path: list.clone(),
                position: first,
            })?;
            list.next()
        } else {
            list
        };
        tree.unwrap_node(&target)?;
    }

    let selection = tree.require_selection()?;
    let hosts = line_hosts(tree, &selection);
    let new_kind = if is_active {
        ElementKind::Paragraph
    } else {
        ElementKind::ListItem
    };
    for host in &hosts {
        if *tree.kind(host)? != new_kind {
            tree.set_kind(host, new_kind.clone())?;
        }
    }
    if is_active {
        return Ok(());
    }

    let (Some(first), Some(last)) = (hosts.first(), hosts.last()) else {
        return Err(EditorError::StructuralInvariantViolation(
            "selection touches no line".into(),
        ));
    };
    let parent = first.parent();
    let contiguous = hosts
        .iter()
        .enumerate()
        .all(|(i, host)| host.parent() == parent && host.index() == first.index().map(|f| f + i));
    let (Some(from), Some(to)) = (first.index(), last.index()) else {
        return Err(EditorError::StructuralInvariantViolation(
            "line at document root".into(),
        ));
    };
    if !contiguous {
        return Err(EditorError::StructuralInvariantViolation(format!(
            "selected lines {first}..{last} are not siblings"
        )));
    }
    tree.wrap_nodes(&parent, from, to + 1, kind.element_kind())
}

/// Runs of selected hosts grouped by their list wrapper: (list, first, last)
fn list_runs(tree: &Tree, hosts: &[Path]) -> Vec<(Path, usize, usize)> {
    let mut runs: Vec<(Path, usize, usize)> = Vec::new();
    for host in hosts {
        let list = host.parent();
        let is_list = !list.is_root() && tree.kind(&list).is_ok_and(ElementKind::is_list);
        let Some(index) = host.index().filter(|_| is_list) else {
            continue;
        };
        match runs.last_mut() {
            Some((current, _, last)) if *current == list => *last = index,
            _ => runs.push((list, index, index)),
        }
    }
    runs
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structural normalization
//!
//! [`normalize_node`] applies at most one repair to a node; [`normalize`]
//! walks the document children-first through the plugin chain, resumes
//! next to each repaired node, and repeats whole passes until one pass
//! changes nothing.

use super::{Operation, Tree};
use crate::ast::{ElementKind, Node};
use crate::path::Path;
use crate::traits::{EditorError, Next, Result};
use tracing::trace;

/// Run the chain's normalizers until the tree is stable.
///
/// `limit` is the number of repairs allowed per document node; going past
/// it means the normalizers keep undoing each other.
pub fn normalize(tree: &mut Tree, next: Next<'_>, limit: usize) -> Result<usize> {
    let mut fixes = 0;
    loop {
        let budget = limit.saturating_mul(node_count(tree.children()) + 1);
        let mut settled = true;
        let mut cursor = Some(tree.first_in_post_order(&Path::root()));
        while let Some(path) = cursor {
            if !next.normalize_node(tree, &path)? {
                cursor = tree.next_in_post_order(&path);
                continue;
            }
            fixes += 1;
            settled = false;
            trace!(path = %path, fixes, "normalized node");
            if fixes > budget {
                return Err(EditorError::StructuralInvariantViolation(format!(
                    "normalization did not settle after {fixes} fixes"
                )));
            }
            cursor = Some(resume_point(tree, &path));
        }
        if settled {
            return Ok(fixes);
        }
    }
}

/// Where the walk picks up after repairing `path`: the subtree of its
/// previous sibling, which a merge may have changed, else its own
fn resume_point(tree: &Tree, path: &Path) -> Path {
    if path.is_root() {
        return tree.first_in_post_order(path);
    }
    let anchor = path
        .previous()
        .filter(|previous| tree.has(previous))
        .unwrap_or_else(|| path.clone());
    if tree.has(&anchor) {
        tree.first_in_post_order(&anchor)
    } else {
        path.parent()
    }
}

fn node_count(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + node.as_element().map_or(0, |element| node_count(&element.children)))
        .sum()
}

/// A single structural repair
#[derive(Debug)]
enum Repair {
    Insert(Path, Node),
    Remove(Path),
    /// Wrap child `index` of `parent` in a new element
    Wrap(Path, usize, ElementKind),
    Unwrap(Path),
    SetKind(Path, ElementKind),
    Split(Path, usize),
    Merge(Path),
    /// Lift the last child of a stamped line after it
    Lift(Path),
    AdoptMarks(Path),
}

/// Built-in repair for the node at `path`
pub fn normalize_node(tree: &mut Tree, path: &Path) -> Result<bool> {
    let repair = if path.is_root() {
        tree.children()
            .is_empty()
            .then(|| Repair::Insert(Path::from([0]), super::empty_paragraph()))
    } else {
        match tree.get(path) {
            Some(node) if path.len() == 1 => top_level_repair(tree, path, node),
            Some(Node::Element(element)) => element_repair(path, &element.kind, &element.children),
            _ => None,
        }
    };
    let Some(repair) = repair else {
        return Ok(false);
    };
    trace!(path = %path, repair = ?repair, "repairing node");
    match repair {
        Repair::Insert(at, node) => tree.insert_node(at, node)?,
        Repair::Remove(at) => tree.remove_node(&at)?,
        Repair::Wrap(parent, index, kind) => tree.wrap_nodes(&parent, index, index + 1, kind)?,
        Repair::Unwrap(at) => tree.unwrap_node(&at)?,
        Repair::SetKind(at, kind) => tree.set_kind(&at, kind)?,
        Repair::Split(at, position) => tree.apply(Operation::SplitNode { path: at, position })?,
        Repair::Merge(at) => tree.merge_node(&at)?,
        Repair::Lift(at) => {
            let last = tree.element(&at)?.children.len().saturating_sub(1);
            tree.move_node(&at.child(last), &at.next())?;
            if tree.element(&at)?.children.is_empty() {
                tree.remove_node(&at)?;
            }
        }
        Repair::AdoptMarks(at) => {
            let marks = tree.text(&at)?.marks.clone();
            let previous = at
                .previous()
                .ok_or_else(|| EditorError::NodeNotFound(at.clone()))?;
            tree.set_marks(&previous, marks)?;
            tree.merge_node(&at)?;
        }
    }
    Ok(true)
}

/// Root children are hosts or lists; a list absorbs into a preceding list
/// of the same kind
fn top_level_repair(tree: &Tree, path: &Path, node: &Node) -> Option<Repair> {
    let index = path.index()?;
    let element = match node {
        Node::Text(_) => return Some(Repair::Wrap(Path::root(), index, ElementKind::Paragraph)),
        Node::Element(element) => element,
    };
    if element.kind.is_stamped() {
        return Some(Repair::Wrap(Path::root(), index, ElementKind::Paragraph));
    }
    let merges_into_previous = element.kind.is_list()
        && path
            .previous()
            .and_then(|previous| tree.get(&previous))
            .and_then(Node::as_element)
            .is_some_and(|previous| previous.kind == element.kind);
    if merges_into_previous {
        return Some(Repair::Merge(path.clone()));
    }
    element_repair(path, &element.kind, &element.children)
}

fn element_repair(path: &Path, kind: &ElementKind, children: &[Node]) -> Option<Repair> {
    if children.is_empty() {
        return Some(if kind.is_list() {
            Repair::Remove(path.clone())
        } else {
            Repair::Insert(path.child(0), Node::text(""))
        });
    }
    let repair = match kind {
        ElementKind::OrderedList | ElementKind::UnorderedList => list_repair(path, children),
        ElementKind::Paragraph | ElementKind::ListItem => host_repair(path, children),
        ElementKind::StampedLine(_) => stamped_repair(path, children),
    };
    repair.or_else(|| text_repair(path, children))
}

/// List wrappers hold list items only
fn list_repair(path: &Path, children: &[Node]) -> Option<Repair> {
    children.iter().enumerate().find_map(|(index, child)| {
        let Node::Element(element) = child else {
            return Some(Repair::Wrap(path.clone(), index, ElementKind::ListItem));
        };
        match element.kind {
            ElementKind::ListItem => None,
            ElementKind::Paragraph => Some(Repair::SetKind(path.child(index), ElementKind::ListItem)),
            ElementKind::StampedLine(_) => {
                Some(Repair::Wrap(path.clone(), index, ElementKind::ListItem))
            }
            ElementKind::OrderedList | ElementKind::UnorderedList => {
                Some(Repair::Unwrap(path.child(index)))
            }
        }
    })
}

/// A host holds a run of text leaves or a single stamped line
fn host_repair(path: &Path, children: &[Node]) -> Option<Repair> {
    if let Some(index) = children
        .iter()
        .position(|child| child.as_element().is_some_and(|e| !e.kind.is_stamped()))
    {
        return Some(Repair::Unwrap(path.child(index)));
    }
    let has_stamp = children.iter().any(|child| !child.is_text());
    if has_stamp && children.len() > 1 {
        if let Some(index) = children
            .iter()
            .position(|child| child.as_text().is_some_and(|t| t.text.is_empty()))
        {
            return Some(Repair::Remove(path.child(index)));
        }
    }
    let first_segment = match children.first() {
        Some(Node::Element(_)) => 1,
        _ => children.iter().take_while(|child| child.is_text()).count(),
    };
    (first_segment < children.len()).then(|| Repair::Split(path.clone(), first_segment))
}

/// A stamped line holds text leaves only
fn stamped_repair(path: &Path, children: &[Node]) -> Option<Repair> {
    let (index, nested) = children
        .iter()
        .enumerate()
        .find_map(|(i, child)| child.as_element().map(|e| (i, e.kind.is_stamped())))?;
    Some(if !nested {
        Repair::Unwrap(path.child(index))
    } else if index + 1 < children.len() {
        Repair::Split(path.clone(), index + 1)
    } else {
        Repair::Lift(path.clone())
    })
}

/// Join neighbouring leaves that carry the same marks, and drop empty ones
fn text_repair(path: &Path, children: &[Node]) -> Option<Repair> {
    children.windows(2).enumerate().find_map(|(index, pair)| {
        let (left, right) = (pair[0].as_text()?, pair[1].as_text()?);
        let right_path = path.child(index + 1);
        if left.marks == right.marks || right.text.is_empty() {
            Some(Repair::Merge(right_path))
        } else if left.text.is_empty() {
            Some(Repair::AdoptMarks(right_path))
        } else {
            None
        }
    })
}

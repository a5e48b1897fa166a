// SPDX-License-Identifier: AGPL-3.0-or-later
//! Atomic tree operations and the way they move paths and points
//!
//! Every structural change to a document goes through one of these
//! operations, so positions held elsewhere (the selection) can be carried
//! across the change instead of pointing at stale nodes.

use crate::ast::{Element, ElementKind, Marks, Node, Text};
use crate::path::{Path, Point};
use crate::traits::{EditorError, Result};

/// Primitive document mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert `node` so that it ends up at `path`
    InsertNode { path: Path, node: Node },
    RemoveNode { path: Path },
    InsertText { path: Path, offset: usize, text: String },
    /// Remove `len` characters starting at `offset`
    RemoveText { path: Path, offset: usize, len: usize },
    /// Split the node at `path`: characters (text) or children (element)
    /// from `position` on move into a new following sibling
    SplitNode { path: Path, position: usize },
    /// Merge the node at `path` into its previous sibling, whose length
    /// before the merge was `position`
    MergeNode { path: Path, position: usize },
    MoveNode { path: Path, new_path: Path },
    SetKind { path: Path, kind: ElementKind },
    SetMarks { path: Path, marks: Marks },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertNode { .. } => "insert_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::InsertText { .. } => "insert_text",
            Self::RemoveText { .. } => "remove_text",
            Self::SplitNode { .. } => "split_node",
            Self::MergeNode { .. } => "merge_node",
            Self::MoveNode { .. } => "move_node",
            Self::SetKind { .. } => "set_kind",
            Self::SetMarks { .. } => "set_marks",
        }
    }

    /// The path this operation targets
    pub fn path(&self) -> &Path {
        match self {
            Self::InsertNode { path, .. }
            | Self::RemoveNode { path }
            | Self::InsertText { path, .. }
            | Self::RemoveText { path, .. }
            | Self::SplitNode { path, .. }
            | Self::MergeNode { path, .. }
            | Self::MoveNode { path, .. }
            | Self::SetKind { path, .. }
            | Self::SetMarks { path, .. } => path,
        }
    }

    /// Where the node at `path` lives after this operation, or `None` if
    /// the operation removed it.
    pub fn transform_path(&self, path: &Path) -> Option<Path> {
        let mut p = path.clone();
        match self {
            Self::InsertNode { path: op, .. } => {
                if op == path || op.ends_before(path) || op.is_ancestor_of(path) {
                    p.indices_mut()[op.len() - 1] += 1;
                }
            }
            Self::RemoveNode { path: op } => {
                if op == path || op.is_ancestor_of(path) {
                    return None;
                }
                if op.ends_before(path) {
                    p.indices_mut()[op.len() - 1] -= 1;
                }
            }
            Self::MergeNode { path: op, position } => {
                if op == path || op.ends_before(path) {
                    p.indices_mut()[op.len() - 1] -= 1;
                } else if op.is_ancestor_of(path) {
                    let indices = p.indices_mut();
                    indices[op.len() - 1] -= 1;
                    indices[op.len()] += position;
                }
            }
            Self::SplitNode { path: op, position } => {
                if op == path {
                    // the left half keeps the path
                } else if op.ends_before(path) {
                    p.indices_mut()[op.len() - 1] += 1;
                } else if op.is_ancestor_of(path) && path[op.len()] >= *position {
                    let indices = p.indices_mut();
                    indices[op.len() - 1] += 1;
                    indices[op.len()] -= position;
                }
            }
            Self::MoveNode { path: op, new_path } => {
                if op == new_path {
                    return Some(p);
                }
                if op.is_ancestor_or_self(path) {
                    let mut moved = new_path.clone();
                    if op.ends_before(new_path) && op.len() < new_path.len() {
                        moved.indices_mut()[op.len() - 1] -= 1;
                    }
                    return Some(moved.join(&path[op.len()..]));
                }
                let indices = p.indices_mut();
                if op.is_sibling_of(new_path) && new_path.is_ancestor_or_self(path) {
                    if op.ends_before(path) {
                        indices[op.len() - 1] -= 1;
                    } else {
                        indices[op.len() - 1] += 1;
                    }
                } else if new_path.ends_before(path) || new_path.is_ancestor_or_self(path) {
                    if op.ends_before(path) {
                        indices[op.len() - 1] -= 1;
                    }
                    indices[new_path.len() - 1] += 1;
                } else if op.ends_before(path) {
                    indices[op.len() - 1] -= 1;
                }
            }
            Self::InsertText { .. }
            | Self::RemoveText { .. }
            | Self::SetKind { .. }
            | Self::SetMarks { .. } => {}
        }
        Some(p)
    }

    /// Carry a point across this operation with forward affinity: a point
    /// sitting exactly at an insertion or split moves with the content
    /// after it.
    pub fn transform_point(&self, point: &Point) -> Option<Point> {
        let mut offset = point.offset;
        match self {
            Self::InsertText {
                path,
                offset: at,
                text,
            } => {
                if *path == point.path && *at <= offset {
                    offset += text.chars().count();
                }
                Some(Point::new(point.path.clone(), offset))
            }
            Self::RemoveText {
                path,
                offset: at,
                len,
            } => {
                if *path == point.path && *at <= offset {
                    offset -= (offset - at).min(*len);
                }
                Some(Point::new(point.path.clone(), offset))
            }
            Self::MergeNode { path, position } => {
                if *path == point.path {
                    offset += position;
                }
                Some(Point::new(self.transform_path(&point.path)?, offset))
            }
            Self::SplitNode { path, position } if *path == point.path => {
                if *position <= offset {
                    Some(Point::new(path.next(), offset - position))
                } else {
                    Some(point.clone())
                }
            }
            _ => Some(Point::new(self.transform_path(&point.path)?, offset)),
        }
    }

    /// Apply to the root children of a document
    pub(crate) fn apply(&self, root: &mut Vec<Node>) -> Result<()> {
        if self.path().is_root() {
            return Err(EditorError::InvalidOperation(format!(
                "{} cannot target the document root",
                self.name()
            )));
        }
        match self {
            Self::InsertNode { path, node } => {
                let (children, index) = parent_children(root, path)?;
                if index > children.len() {
                    return Err(EditorError::NodeNotFound(path.clone()));
                }
                children.insert(index, node.clone());
            }
            Self::RemoveNode { path } => {
                let (children, index) = parent_children(root, path)?;
                if index >= children.len() {
                    return Err(EditorError::NodeNotFound(path.clone()));
                }
                children.remove(index);
            }
            Self::InsertText { path, offset, text } => {
                let leaf = text_mut(root, path)?;
                let at = byte_offset(&leaf.text, *offset);
                leaf.text.insert_str(at, text);
            }
            Self::RemoveText { path, offset, len } => {
                let leaf = text_mut(root, path)?;
                let from = byte_offset(&leaf.text, *offset);
                let to = byte_offset(&leaf.text, offset + len);
                leaf.text.replace_range(from..to, "");
            }
            Self::SplitNode { path, position } => {
                let (children, index) = parent_children(root, path)?;
                let right = match children.get_mut(index) {
                    Some(Node::Text(leaf)) => {
                        let at = byte_offset(&leaf.text, *position);
                        let tail = leaf.text.split_off(at);
                        Node::Text(Text::new(tail).with_marks(leaf.marks.clone()))
                    }
                    Some(Node::Element(element)) => {
                        let at = (*position).min(element.children.len());
                        let tail = element.children.split_off(at);
                        Node::Element(Element::new(element.kind.clone(), tail))
                    }
                    None => return Err(EditorError::NodeNotFound(path.clone())),
                };
                children.insert(index + 1, right);
            }
            Self::MergeNode { path, .. } => {
                let (children, index) = parent_children(root, path)?;
                if index == 0 || index >= children.len() {
                    return Err(EditorError::InvalidOperation(format!(
                        "no previous sibling to merge {path} into"
                    )));
                }
                let node = children.remove(index);
                match (&mut children[index - 1], node) {
                    (Node::Text(left), Node::Text(right)) => left.text.push_str(&right.text),
                    (Node::Element(left), Node::Element(right)) => {
                        left.children.extend(right.children)
                    }
                    (_, node) => {
                        children.insert(index, node);
                        return Err(EditorError::InvalidOperation(format!(
                            "cannot merge {path} into a node of a different shape"
                        )));
                    }
                }
            }
            Self::MoveNode { path, new_path } => {
                if path.is_ancestor_of(new_path) {
                    return Err(EditorError::InvalidOperation(format!(
                        "cannot move {path} inside itself"
                    )));
                }
                let target = self
                    .transform_path(path)
                    .ok_or_else(|| EditorError::NodeNotFound(path.clone()))?;
                let (children, index) = parent_children(root, path)?;
                if index >= children.len() {
                    return Err(EditorError::NodeNotFound(path.clone()));
                }
                let node = children.remove(index);
                let (children, index) = parent_children(root, &target)?;
                if index > children.len() {
                    return Err(EditorError::NodeNotFound(target));
                }
                children.insert(index, node);
            }
            Self::SetKind { path, kind } => match node_mut(root, path) {
                Some(Node::Element(element)) => element.kind = kind.clone(),
                _ => return Err(EditorError::NodeNotFound(path.clone())),
            },
            Self::SetMarks { path, marks } => {
                text_mut(root, path)?.marks = marks.clone();
            }
        }
        Ok(())
    }
}

/// Byte index of the `chars`-th character, clamped to the end
pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}

pub(crate) fn node_at<'a>(root: &'a [Node], path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = root.get(*first)?;
    for index in rest {
        node = match node {
            Node::Element(element) => element.children.get(*index)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn node_mut<'a>(root: &'a mut [Node], path: &[usize]) -> Option<&'a mut Node> {
    let (first, rest) = path.split_first()?;
    let mut node = root.get_mut(*first)?;
    for index in rest {
        node = match node {
            Node::Element(element) => element.children.get_mut(*index)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn text_mut<'a>(root: &'a mut [Node], path: &Path) -> Result<&'a mut Text> {
    match node_mut(root, path) {
        Some(Node::Text(leaf)) => Ok(leaf),
        _ => Err(EditorError::NodeNotFound(path.clone())),
    }
}

/// Children list holding `path`, plus the index of `path` in it
fn parent_children<'a>(root: &'a mut Vec<Node>, path: &Path) -> Result<(&'a mut Vec<Node>, usize)> {
    let (index, parent) = path
        .split_last()
        .ok_or_else(|| EditorError::NodeNotFound(path.clone()))?;
    if parent.is_empty() {
        return Ok((root, *index));
    }
    match node_mut(root, parent) {
        Some(Node::Element(element)) => Ok((&mut element.children, *index)),
        _ => Err(EditorError::NodeNotFound(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> Vec<Node> {
        vec![
            Node::paragraph(vec![Node::text("hello")]),
            Node::paragraph(vec![Node::text("world")]),
        ]
    }

    #[test]
    fn test_split_and_merge_text() {
        let mut root = doc();
        Operation::SplitNode {
            path: Path::from([0, 0]),
            position: 2,
        }
        .apply(&mut root)
        .unwrap();
        assert_eq!(
            root[0],
            Node::paragraph(vec![Node::text("he"), Node::text("llo")])
        );

        Operation::MergeNode {
            path: Path::from([0, 1]),
            position: 2,
        }
        .apply(&mut root)
        .unwrap();
        assert_eq!(root, doc());
    }

    #[test]
    fn test_move_between_parents() {
        let mut root = doc();
        Operation::MoveNode {
            path: Path::from([1, 0]),
            new_path: Path::from([0, 1]),
        }
        .apply(&mut root)
        .unwrap();
        assert_eq!(
            root,
            vec![
                Node::paragraph(vec![Node::text("hello"), Node::text("world")]),
                Node::paragraph(vec![]),
            ]
        );
    }

    #[test]
    fn test_remove_text_counts_characters() {
        let mut root = vec![Node::paragraph(vec![Node::text("héllo")])];
        Operation::RemoveText {
            path: Path::from([0, 0]),
            offset: 1,
            len: 2,
        }
        .apply(&mut root)
        .unwrap();
        assert_eq!(root[0].string(), "hlo");
    }

    #[test]
    fn test_point_follows_split_with_forward_affinity() {
        let op = Operation::SplitNode {
            path: Path::from([0, 0]),
            position: 2,
        };
        assert_eq!(
            op.transform_point(&Point::new([0, 0], 2)),
            Some(Point::new([0, 1], 0))
        );
        assert_eq!(
            op.transform_point(&Point::new([0, 0], 1)),
            Some(Point::new([0, 0], 1))
        );
    }

    #[test]
    fn test_point_follows_merge() {
        let op = Operation::MergeNode {
            path: Path::from([0, 1]),
            position: 3,
        };
        assert_eq!(
            op.transform_point(&Point::new([0, 1], 2)),
            Some(Point::new([0, 0], 5))
        );
    }

    #[test]
    fn test_path_follows_unwrapping_move() {
        // lifting the first child of [1] to sit before it
        let op = Operation::MoveNode {
            path: Path::from([1, 0]),
            new_path: Path::from([1]),
        };
        assert_eq!(op.transform_path(&Path::from([1, 0, 2])), Some(Path::from([1, 2])));
        assert_eq!(op.transform_path(&Path::from([1, 1])), Some(Path::from([2, 0])));
        assert_eq!(op.transform_path(&Path::from([0, 4])), Some(Path::from([0, 4])));
    }

    #[test]
    fn test_removed_node_has_no_path() {
        let op = Operation::RemoveNode {
            path: Path::from([0]),
        };
        assert_eq!(op.transform_point(&Point::new([0, 0], 1)), None);
        assert_eq!(op.transform_path(&Path::from([2, 1])), Some(Path::from([1, 1])));
    }

    #[test]
    fn test_root_is_not_a_target() {
        let mut root = doc();
        let result = Operation::RemoveNode { path: Path::root() }.apply(&mut root);
        assert!(matches!(result, Err(EditorError::InvalidOperation(_))));
    }
}

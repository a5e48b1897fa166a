// SPDX-License-Identifier: AGPL-3.0-or-later
//! Composite transforms built from atomic operations

use super::{Operation, Tree};
use crate::ast::{Element, ElementKind, Marks, Node, Text};
use crate::path::{Path, Point, Range};
use crate::traits::{EditorError, Result};

impl Tree {
    pub fn insert_node(&mut self, path: Path, node: Node) -> Result<()> {
        self.apply(Operation::InsertNode { path, node })
    }

    /// Insert `nodes` as consecutive siblings starting at `path`
    pub fn insert_nodes(&mut self, path: &Path, nodes: Vec<Node>) -> Result<()> {
        let mut at = path.clone();
        for node in nodes {
            self.insert_node(at.clone(), node)?;
            at = at.next();
        }
        Ok(())
    }

    pub fn remove_node(&mut self, path: &Path) -> Result<()> {
        self.apply(Operation::RemoveNode { path: path.clone() })
    }

    pub fn set_kind(&mut self, path: &Path, kind: ElementKind) -> Result<()> {
        self.apply(Operation::SetKind {
            path: path.clone(),
            kind,
        })
    }

    pub fn set_marks(&mut self, path: &Path, marks: Marks) -> Result<()> {
        self.apply(Operation::SetMarks {
            path: path.clone(),
            marks,
        })
    }

    pub fn insert_text_at(&mut self, point: &Point, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.apply(Operation::InsertText {
            path: point.path.clone(),
            offset: point.offset,
            text: text.to_owned(),
        })
    }

    pub fn remove_text(&mut self, path: &Path, offset: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        self.apply(Operation::RemoveText {
            path: path.clone(),
            offset,
            len,
        })
    }

    pub fn move_node(&mut self, path: &Path, new_path: &Path) -> Result<()> {
        self.apply(Operation::MoveNode {
            path: path.clone(),
            new_path: new_path.clone(),
        })
    }

    /// Merge the node at `path` into its previous sibling
    pub fn merge_node(&mut self, path: &Path) -> Result<()> {
        let previous = path
            .previous()
            .ok_or_else(|| EditorError::InvalidOperation(format!("{path} has no previous sibling")))?;
        let position = match self.node(&previous)? {
            Node::Text(text) => text.char_len(),
            Node::Element(element) => element.children.len(),
        };
        self.apply(Operation::MergeNode {
            path: path.clone(),
            position,
        })
    }

    /// Split the leaf at `point`, then every ancestor up to and including
    /// `top`. Returns the path of the right half of `top`.
    pub fn split_nodes(&mut self, point: &Point, top: &Path) -> Result<Path> {
        if !top.is_ancestor_or_self(&point.path) || top.is_root() {
            return Err(EditorError::InvalidOperation(format!(
                "cannot split {} up to {top}",
                point.path
            )));
        }
        self.apply(Operation::SplitNode {
            path: point.path.clone(),
            position: point.offset,
        })?;
        let mut position = point.path.index().map_or(0, |index| index + 1);
        let mut current = point.path.parent();
        while current.len() >= top.len() {
            self.apply(Operation::SplitNode {
                path: current.clone(),
                position,
            })?;
            position = current.index().map_or(0, |index| index + 1);
            current = current.parent();
        }
        Ok(top.next())
    }

    /// Wrap children `from..to` of `parent` in a new element of `kind`
    pub fn wrap_nodes(&mut self, parent: &Path, from: usize, to: usize, kind: ElementKind) -> Result<()> {
        let wrapper = parent.child(from);
        self.insert_node(wrapper.clone(), Node::element(kind, Vec::new()))?;
        for k in 0..to.saturating_sub(from) {
            self.move_node(&parent.child(from + 1), &wrapper.child(k))?;
        }
        Ok(())
    }

    /// Replace the element at `path` by its children
    pub fn unwrap_node(&mut self, path: &Path) -> Result<()> {
        let count = self.element(path)?.children.len();
        let parent = path.parent();
        let index = path
            .index()
            .ok_or_else(|| EditorError::InvalidOperation("cannot unwrap the root".into()))?;
        for i in 0..count {
            self.move_node(&parent.child(index + i).child(0), &parent.child(index + i))?;
        }
        self.remove_node(&parent.child(index + count))
    }

    /// Remove the node at `path` and every ancestor below `top` it leaves
    /// empty
    pub fn remove_and_prune(&mut self, path: &Path, top: &Path) -> Result<()> {
        self.remove_node(path)?;
        let mut current = path.parent();
        while current.len() > top.len() && self.element(&current)?.children.is_empty() {
            self.remove_node(&current)?;
            current = current.parent();
        }
        Ok(())
    }

    /// Delete the content covered by `range` and join the line holding its
    /// end onto the line holding its start. Returns the collapsed point.
    ///
    /// Only the leaves of the end line move, so the start line keeps its
    /// own kind and a stamp at the end never reaches the deletion start.
    pub fn delete_range(&mut self, range: &Range) -> Result<Point> {
        let (start, end) = range.edges();
        if start == end {
            return Ok(start);
        }
        if start.path == end.path {
            self.remove_text(&start.path, start.offset, end.offset - start.offset)?;
            return Ok(start);
        }
        let common = start.path.common_ancestor(&end.path);
        let depth = common.len();
        let (s, e) = (start.path[depth], end.path[depth]);

        self.split_nodes(&end, &common.child(e))?;
        self.split_nodes(&start, &common.child(s))?;
        for _ in s..=e {
            self.remove_node(&common.child(s + 1))?;
        }

        let left = common.child(s);
        let right = common.child(s + 1);
        let both_elements = matches!(
            (self.get(&left), self.get(&right)),
            (Some(Node::Element(_)), Some(Node::Element(_)))
        );
        if both_elements {
            self.merge_lines(&left, &right)?;
        }
        Ok(start)
    }

    /// Move the first line of `right` onto the end of the last line of
    /// `left`, dropping whatever the move leaves empty
    fn merge_lines(&mut self, left: &Path, right: &Path) -> Result<()> {
        let target = self.line_at(left, true)?;
        let source = self.line_at(right, false)?;
        let count = self.element(&source)?.children.len();
        let mut len = self.element(&target)?.children.len();
        for _ in 0..count {
            self.move_node(&source.child(0), &target.child(len))?;
            len += 1;
        }
        self.remove_and_prune(&source, &right.parent())
    }

    /// Deepest last (or first) element below `path` that holds text
    fn line_at(&self, path: &Path, last: bool) -> Result<Path> {
        let mut current = path.clone();
        loop {
            let element = self.element(&current)?;
            if !element.has_block_children() {
                return Ok(current);
            }
            let index = if last { element.children.len() - 1 } else { 0 };
            current = current.child(index);
        }
    }

    /// Clone of the content covered by `range`, rooted at the document
    pub fn fragment(&self, range: &Range) -> Vec<Node> {
        let (start, end) = range.edges();
        slice_children(
            self.children(),
            Some((&start.path, start.offset)),
            Some((&end.path, end.offset)),
        )
    }

    /// Insert text leaves at `point`, splitting the leaf there. Returns the
    /// end of the last inserted leaf.
    pub fn insert_leaves(&mut self, point: &Point, leaves: Vec<Text>) -> Result<Point> {
        let Some(last) = leaves.last() else {
            return Ok(point.clone());
        };
        let last_len = last.char_len();
        let count = leaves.len();
        self.apply(Operation::SplitNode {
            path: point.path.clone(),
            position: point.offset,
        })?;
        let first = point.path.next();
        self.insert_nodes(&first, leaves.into_iter().map(Node::Text).collect())?;
        let parent = point.path.parent();
        let index = first.index().unwrap_or(0);
        Ok(Point::new(parent.child(index + count - 1), last_len))
    }

    /// Cut the content from `point` to the end of the text block at `block`
    pub fn detach_tail(&mut self, point: &Point, block: &Path) -> Result<Vec<Node>> {
        let element = self.element(block)?;
        let relative = &point.path[block.len()..];
        let tail = slice_children(&element.children, Some((relative, point.offset)), None);
        let end = self.end(block)?;
        self.delete_range(&Range::new(point.clone(), end))?;
        Ok(tail)
    }
}

/// Clone `children` between two optional relative positions
pub(crate) fn slice_children(
    children: &[Node],
    start: Option<(&[usize], usize)>,
    end: Option<(&[usize], usize)>,
) -> Vec<Node> {
    if children.is_empty() {
        return Vec::new();
    }
    let from = start.map_or(0, |(path, _)| path[0]);
    let to = end.map_or(children.len() - 1, |(path, _)| path[0]);
    (from..=to.min(children.len() - 1))
        .map(|index| {
            slice_node(
                &children[index],
                descend(start, index),
                descend(end, index),
            )
        })
        .collect()
}

/// The part of `bound` below child `index`, if it points into that child
fn descend(bound: Option<(&[usize], usize)>, index: usize) -> Option<(&[usize], usize)> {
    bound
        .filter(|(path, _)| path[0] == index)
        .map(|(path, offset)| (&path[1..], offset))
}

fn slice_node(
    node: &Node,
    start: Option<(&[usize], usize)>,
    end: Option<(&[usize], usize)>,
) -> Node {
    match node {
        Node::Text(text) => {
            let from = start.map_or(0, |(_, offset)| offset);
            let to = end.map_or(usize::MAX, |(_, offset)| offset);
            let content: String = text.text.chars().take(to).skip(from).collect();
            Node::Text(Text::new(content).with_marks(text.marks.clone()))
        }
        Node::Element(element) => Node::Element(Element::new(
            element.kind.clone(),
            slice_children(&element.children, start, end),
        )),
    }
}

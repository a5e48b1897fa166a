// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document tree with path addressing and a tracked selection
//!
//! The tree owns the root children, the current selection and the pending
//! mark set. All mutation goes through [`Tree::apply`], which keeps the
//! selection pointing at the same content across structural edits.

pub mod commands;
pub mod normalize;
pub mod ops;
pub mod transforms;

pub use ops::Operation;

use crate::ast::{Element, ElementKind, Marks, Node, Text};
use crate::path::{Path, Point, Range};
use crate::traits::{EditorError, Result};
use ops::{byte_offset, node_at};
use tracing::trace;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    children: Vec<Node>,
    selection: Option<Range>,
    pending_marks: Option<Marks>,
    changed: bool,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// A document holding one empty paragraph, cursor inside it
    pub fn new() -> Self {
        Self {
            children: vec![empty_paragraph()],
            selection: Some(Range::collapsed(Point::new([0, 0], 0))),
            pending_marks: None,
            changed: false,
        }
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn selection(&self) -> Option<&Range> {
        self.selection.as_ref()
    }

    /// The selection, which many commands cannot run without
    pub fn require_selection(&self) -> Result<Range> {
        self.selection.clone().ok_or_else(|| {
            EditorError::StructuralInvariantViolation("operation requires a selection".into())
        })
    }

    pub fn select(&mut self, range: Range) {
        self.selection = Some(range);
    }

    pub fn select_point(&mut self, point: Point) {
        self.selection = Some(Range::collapsed(point));
    }

    pub fn deselect(&mut self) {
        self.selection = None;
    }

    pub fn pending_marks(&self) -> Option<&Marks> {
        self.pending_marks.as_ref()
    }

    pub fn set_pending_marks(&mut self, marks: Option<Marks>) {
        self.pending_marks = marks;
    }

    /// Whether any operation was applied since the last call
    pub(crate) fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Swap in new root children wholesale and put the cursor at the start
    pub(crate) fn replace_children(&mut self, children: Vec<Node>) {
        self.children = children;
        self.pending_marks = None;
        self.changed = true;
        self.selection = self
            .first_text(&Path::root())
            .map(|path| Range::collapsed(Point::new(path, 0)));
    }

    /// Apply one operation and carry the selection across it
    pub fn apply(&mut self, op: Operation) -> Result<()> {
        if let (Operation::RemoveNode { path }, Some(selection)) = (&op, self.selection.clone()) {
            self.selection = Some(Range::new(
                self.relocate(&selection.anchor, path),
                self.relocate(&selection.focus, path),
            ));
        }
        op.apply(&mut self.children)?;
        self.selection = self.selection.take().and_then(|selection| {
            Some(Range::new(
                op.transform_point(&selection.anchor)?,
                op.transform_point(&selection.focus)?,
            ))
        });
        self.changed = true;
        trace!(op = op.name(), path = %op.path(), "applied operation");
        Ok(())
    }

    /// Move a point out of a subtree about to be removed: end of the
    /// previous leaf, else start of the next one
    fn relocate(&self, point: &Point, removed: &Path) -> Point {
        if !removed.is_ancestor_or_self(&point.path) {
            return point.clone();
        }
        if let Some(path) = self.previous_text(removed) {
            let len = self.text(&path).map_or(0, Text::char_len);
            return Point::new(path, len);
        }
        match self.next_text(removed) {
            Some(path) => Point::new(path, 0),
            None => point.clone(),
        }
    }

    pub fn get(&self, path: &[usize]) -> Option<&Node> {
        node_at(&self.children, path)
    }

    pub fn has(&self, path: &[usize]) -> bool {
        self.get(path).is_some()
    }

    pub fn node(&self, path: &Path) -> Result<&Node> {
        self.get(path)
            .ok_or_else(|| EditorError::NodeNotFound(path.clone()))
    }

    pub fn element(&self, path: &Path) -> Result<&Element> {
        match self.get(path) {
            Some(Node::Element(element)) => Ok(element),
            _ => Err(EditorError::NodeNotFound(path.clone())),
        }
    }

    pub fn text(&self, path: &Path) -> Result<&Text> {
        match self.get(path) {
            Some(Node::Text(text)) => Ok(text),
            _ => Err(EditorError::NodeNotFound(path.clone())),
        }
    }

    /// Children of the element at `path`, or the root children
    pub fn children_of(&self, path: &Path) -> Result<&[Node]> {
        if path.is_root() {
            Ok(&self.children)
        } else {
            Ok(&self.element(path)?.children)
        }
    }

    /// Nearest strict ancestor element of `path` matching `pred`
    pub fn above<F>(&self, path: &Path, pred: F) -> Option<(Path, &Element)>
    where
        F: Fn(&Element) -> bool,
    {
        path.ancestors()
            .filter(|ancestor| !ancestor.is_root())
            .find_map(|ancestor| {
                let element = self.get(&ancestor)?.as_element()?;
                pred(element).then_some((ancestor, element))
            })
    }

    /// Innermost block holding `path`
    pub fn block_above(&self, path: &Path) -> Option<(Path, &Element)> {
        self.above(path, |_| true)
    }

    /// Nearest ancestor that is not a stamped line
    pub fn host_above(&self, path: &Path) -> Option<(Path, &Element)> {
        self.above(path, |element| !element.kind.is_stamped())
    }

    /// Text leaf paths in document order
    pub fn text_paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        collect_text_paths(&self.children, &Path::root(), &mut out);
        out
    }

    /// Text leaf paths below `path`, in document order
    pub fn text_paths_in(&self, path: &Path) -> Vec<Path> {
        let mut out = Vec::new();
        match self.get(path) {
            Some(Node::Text(_)) => out.push(path.clone()),
            Some(Node::Element(element)) => collect_text_paths(&element.children, path, &mut out),
            None if path.is_root() => collect_text_paths(&self.children, path, &mut out),
            None => {}
        }
        out
    }

    fn first_text(&self, path: &Path) -> Option<Path> {
        self.text_paths_in(path).into_iter().next()
    }

    /// First position inside the subtree at `path`
    pub fn start(&self, path: &Path) -> Result<Point> {
        self.first_text(path)
            .map(|leaf| Point::new(leaf, 0))
            .ok_or_else(|| EditorError::NodeNotFound(path.clone()))
    }

    /// Last position inside the subtree at `path`
    pub fn end(&self, path: &Path) -> Result<Point> {
        let leaf = self
            .text_paths_in(path)
            .pop()
            .ok_or_else(|| EditorError::NodeNotFound(path.clone()))?;
        let len = self.text(&leaf)?.char_len();
        Ok(Point::new(leaf, len))
    }

    pub fn is_start(&self, point: &Point, path: &Path) -> bool {
        self.start(path).is_ok_and(|start| start == *point)
    }

    pub fn is_end(&self, point: &Point, path: &Path) -> bool {
        self.end(path).is_ok_and(|end| end == *point)
    }

    /// Last text leaf before `path` in document order, outside its subtree
    pub fn previous_text(&self, path: &Path) -> Option<Path> {
        let mut path = path.clone();
        loop {
            let Some(sibling) = path.previous() else {
                path = path.parent();
                if path.is_root() {
                    return None;
                }
                continue;
            };
            if let Some(leaf) = self.text_paths_in(&sibling).pop() {
                return Some(leaf);
            }
            path = sibling;
        }
    }

    /// First text leaf after `path` in document order, outside its subtree
    pub fn next_text(&self, path: &Path) -> Option<Path> {
        let mut path = path.clone();
        while !path.is_root() {
            let sibling = path.next();
            if !self.has(&sibling) {
                path = path.parent();
                continue;
            }
            if let Some(leaf) = self.first_text(&sibling) {
                return Some(leaf);
            }
            path = sibling;
        }
        None
    }

    /// One grapheme cluster before `point`. Leaving a block counts as one
    /// unit and lands at the end of the previous block.
    pub fn before(&self, point: &Point) -> Option<Point> {
        let leaf = self.text(&point.path).ok()?;
        if point.offset > 0 {
            let head = &leaf.text[..byte_offset(&leaf.text, point.offset)];
            let step = head.graphemes(true).next_back()?.chars().count();
            return Some(Point::new(point.path.clone(), point.offset - step));
        }
        let block = point.path.parent();
        let mut path = point.path.clone();
        loop {
            let previous = self.previous_text(&path)?;
            let len = self.text(&previous).ok()?.char_len();
            if previous.parent() != block {
                return Some(Point::new(previous, len));
            }
            if len > 0 {
                return self.before(&Point::new(previous, len));
            }
            path = previous;
        }
    }

    fn child_count(&self, path: &Path) -> usize {
        if path.is_root() {
            return self.children.len();
        }
        self.get(path)
            .and_then(Node::as_element)
            .map_or(0, |element| element.children.len())
    }

    /// First path of the subtree at `path` when visiting children before
    /// parents
    pub fn first_in_post_order(&self, path: &Path) -> Path {
        let mut path = path.clone();
        while self.child_count(&path) > 0 {
            path = path.child(0);
        }
        path
    }

    /// Path visited after `path` when visiting children before parents.
    /// The root comes last.
    pub fn next_in_post_order(&self, path: &Path) -> Option<Path> {
        let index = path.index()?;
        let parent = path.parent();
        if index + 1 < self.child_count(&parent) {
            Some(self.first_in_post_order(&parent.child(index + 1)))
        } else {
            Some(parent)
        }
    }

    /// Kind of the element at `path`
    pub fn kind(&self, path: &Path) -> Result<&ElementKind> {
        Ok(&self.element(path)?.kind)
    }
}

pub(crate) fn empty_paragraph() -> Node {
    Node::paragraph(vec![Node::text("")])
}

fn collect_text_paths(children: &[Node], parent: &Path, out: &mut Vec<Path>) {
    for (index, child) in children.iter().enumerate() {
        let path = parent.child(index);
        match child {
            Node::Text(_) => out.push(path),
            Node::Element(element) => collect_text_paths(&element.children, &path, out),
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Position addressing: paths, points and ranges
//!
//! A [`Path`] locates a node by successive child indices from the document
//! root. A [`Point`] is a path to a text leaf plus a character offset.
//! A [`Range`] is an anchor/focus pair of points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Child-index path from the document root
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<usize>);

impl Path {
    /// The document root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self) -> Path {
        match self.0.split_last() {
            Some((_, rest)) => Self(rest.to_vec()),
            None => Self::root(),
        }
    }

    pub fn child(&self, index: usize) -> Path {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Following sibling. The root is its own sibling.
    pub fn next(&self) -> Path {
        let mut indices = self.0.clone();
        if let Some(last) = indices.last_mut() {
            *last += 1;
        }
        Self(indices)
    }

    pub fn previous(&self) -> Option<Path> {
        let mut indices = self.0.clone();
        let last = indices.last_mut()?;
        *last = last.checked_sub(1)?;
        Some(Self(indices))
    }

    /// Index within the parent
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Prefix of the first `len` indices
    pub fn prefix(&self, len: usize) -> Path {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn join(&self, rest: &[usize]) -> Path {
        let mut indices = self.0.clone();
        indices.extend_from_slice(rest);
        Self(indices)
    }

    /// Strict ancestor test
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    pub fn is_ancestor_or_self(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// True when `self` ends before `other` at the level of `self`'s last
    /// index: same parent prefix and a smaller final index.
    pub fn ends_before(&self, other: &Path) -> bool {
        let Some(i) = self.0.len().checked_sub(1) else {
            return false;
        };
        other.0.len() > i && self.0[..i] == other.0[..i] && self.0[i] < other.0[i]
    }

    pub fn is_sibling_of(&self, other: &Path) -> bool {
        !self.0.is_empty()
            && self.0.len() == other.0.len()
            && self.0[..self.0.len() - 1] == other.0[..other.0.len() - 1]
            && self.0 != other.0
    }

    /// Longest shared prefix
    pub fn common_ancestor(&self, other: &Path) -> Path {
        let shared = self
            .0
            .iter()
            .zip(&other.0)
            .take_while(|(a, b)| a == b)
            .count();
        self.prefix(shared)
    }

    /// Strict ancestors, nearest first, ending with the root
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (0..self.0.len()).rev().map(move |len| self.prefix(len))
    }

    pub(crate) fn indices_mut(&mut self) -> &mut Vec<usize> {
        &mut self.0
    }
}

impl Deref for Path {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for Path {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl From<&[usize]> for Path {
    fn from(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Path {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Cursor position inside a text leaf
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub path: Path,
    /// Offset in characters
    pub offset: usize,
}

impl Point {
    pub fn new(path: impl Into<Path>, offset: usize) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.offset)
    }
}

/// Selection: a cursor when collapsed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub anchor: Point,
    pub focus: Point,
}

impl Range {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_expanded(&self) -> bool {
        !self.is_collapsed()
    }

    /// Start and end in document order
    pub fn edges(&self) -> (Point, Point) {
        if self.anchor <= self.focus {
            (self.anchor.clone(), self.focus.clone())
        } else {
            (self.focus.clone(), self.anchor.clone())
        }
    }

    pub fn start(&self) -> Point {
        self.edges().0
    }

    pub fn end(&self) -> Point {
        self.edges().1
    }
}

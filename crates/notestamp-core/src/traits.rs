// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type, configuration, plugin chain and host-facing traits

use crate::ast::Stamp;
use crate::path::{Path, Point};
use crate::tree::{commands, normalize, Tree};
use serde::Deserialize;
use serde_json::Value;

/// Error type for editing operations
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The tree is in a shape normalization should have ruled out.
    /// The batch that hit it is rolled back.
    #[error("Structural invariant violation: {0}")]
    StructuralInvariantViolation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Host callback contract violation: {0}")]
    HostCallbackContractViolation(String),

    #[error("No node at path {0}")]
    NodeNotFound(Path),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Editor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Normalization fixes allowed per document node in one batch before
    /// the batch is treated as a structural violation
    pub normalize_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            normalize_limit: 64,
        }
    }
}

/// Options for plain-text and line export
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct LineOptions {
    /// Prefix stamped lines with a `[label] ` marker
    pub with_stamps: bool,
}

impl LineOptions {
    pub fn with_stamps() -> Self {
        Self { with_stamps: true }
    }
}

/// A capability override in the editing pipeline.
///
/// Every method receives the chain position after this plugin; calling the
/// same method on `next` runs the remaining plugins and finally the tree's
/// built-in behaviour. A plugin that does not override a method passes
/// straight through.
pub trait Plugin {
    /// Plugin name for logging
    fn name(&self) -> &'static str;

    fn insert_break(&self, tree: &mut Tree, next: Next<'_>) -> Result<()> {
        next.insert_break(tree)
    }

    fn insert_text(&self, tree: &mut Tree, text: &str, next: Next<'_>) -> Result<()> {
        next.insert_text(tree, text)
    }

    fn delete_backward(&self, tree: &mut Tree, next: Next<'_>) -> Result<()> {
        next.delete_backward(tree)
    }

    fn delete_fragment(&self, tree: &mut Tree, next: Next<'_>) -> Result<()> {
        next.delete_fragment(tree)
    }

    /// Apply at most one fix to the node at `path`; report whether the
    /// tree changed
    fn normalize_node(&self, tree: &mut Tree, path: &Path, next: Next<'_>) -> Result<bool> {
        next.normalize_node(tree, path)
    }
}

/// Remaining part of a plugin chain
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Box<dyn Plugin>],
    position: usize,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Box<dyn Plugin>]) -> Self {
        Self { chain, position: 0 }
    }

    /// The whole chain again, for plugins that re-enter a command from the
    /// top (a break deleting its selection first)
    pub fn head(&self) -> Next<'a> {
        Self::new(self.chain)
    }

    fn split(&self) -> Option<(&'a dyn Plugin, Next<'a>)> {
        let plugin = self.chain.get(self.position)?;
        Some((
            plugin.as_ref(),
            Next {
                chain: self.chain,
                position: self.position + 1,
            },
        ))
    }

    pub fn insert_break(&self, tree: &mut Tree) -> Result<()> {
        match self.split() {
            Some((plugin, next)) => plugin.insert_break(tree, next),
            None => commands::insert_break(tree),
        }
    }

    pub fn insert_text(&self, tree: &mut Tree, text: &str) -> Result<()> {
        match self.split() {
            Some((plugin, next)) => plugin.insert_text(tree, text, next),
            None => commands::insert_text(tree, text),
        }
    }

    pub fn delete_backward(&self, tree: &mut Tree) -> Result<()> {
        match self.split() {
            Some((plugin, next)) => plugin.delete_backward(tree, next),
            None => commands::delete_backward(tree),
        }
    }

    pub fn delete_fragment(&self, tree: &mut Tree) -> Result<()> {
        match self.split() {
            Some((plugin, next)) => plugin.delete_fragment(tree, next),
            None => commands::delete_fragment(tree),
        }
    }

    pub fn normalize_node(&self, tree: &mut Tree, path: &Path) -> Result<bool> {
        match self.split() {
            Some((plugin, next)) => plugin.normalize_node(tree, path, next),
            None => normalize::normalize_node(tree, path),
        }
    }
}

/// What caused a stamp request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampTrigger {
    /// Enter pressed
    Break,
    /// First character typed into an empty line
    FirstCharacter,
}

/// Context handed to the host when a stamp is requested
#[derive(Debug, Clone)]
pub struct StampContext {
    pub trigger: StampTrigger,
    pub cursor: Point,
}

/// Host side of stamped lines
pub trait StampHost {
    /// Produce the stamp for a new line, or `None` for a plain line
    fn on_stamp_insert(&self, context: &StampContext) -> Option<Stamp>;

    /// A rendered stamp was activated
    fn on_stamp_click(&self, _label: &str, _value: &Value) {}
}

impl<F> StampHost for F
where
    F: Fn(&StampContext) -> Option<Stamp>,
{
    fn on_stamp_insert(&self, context: &StampContext) -> Option<Stamp> {
        self(context)
    }
}

/// Host that never stamps
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStamps;

impl StampHost for NoStamps {
    fn on_stamp_insert(&self, _context: &StampContext) -> Option<Stamp> {
        None
    }
}

/// System clipboard access
pub trait SystemClipboard {
    fn read_text(&self) -> Option<String>;

    fn write_text(&mut self, text: &str);
}

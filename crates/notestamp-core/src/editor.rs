// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host-facing editor
//!
//! Every public mutation runs as one batch: the command goes through the
//! plugin chain, normalization runs until the tree is stable, and a failure
//! anywhere restores the tree as it was before the batch.

use crate::ast::{validate_nodes, ElementKind, ListKind, Mark, Marks, Node};
use crate::clipboard::{self, clipboard_text, copy_lines};
use crate::lines::{lines_to_text, to_lines, Line};
use crate::lists;
use crate::marks;
use crate::path::{Path, Point, Range};
use crate::plugins::{MarksPlugin, StampsPlugin};
use crate::traits::{
    EditorConfig, EditorError, LineOptions, Next, NoStamps, Plugin, Result, StampHost,
    SystemClipboard,
};
use crate::tree::normalize::normalize;
use crate::tree::{commands, Tree};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{debug, error, warn};

/// A toolbar format: a mark or a list kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Mark(Mark),
    List(ListKind),
}

impl FromStr for Format {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "numbered-list" | "ordered-list" => Ok(Self::List(ListKind::Ordered)),
            "bulleted-list" | "unordered-list" => Ok(Self::List(ListKind::Unordered)),
            other => other.parse().map(Self::Mark),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mark(mark) => write!(f, "{mark}"),
            Self::List(ListKind::Ordered) => f.write_str("numbered-list"),
            Self::List(ListKind::Unordered) => f.write_str("bulleted-list"),
        }
    }
}

/// Builder for [`Editor`]
pub struct EditorBuilder {
    host: Rc<dyn StampHost>,
    config: EditorConfig,
    plugins: Vec<Box<dyn Plugin>>,
}

impl Default for EditorBuilder {
    fn default() -> Self {
        Self {
            host: Rc::new(NoStamps),
            config: EditorConfig::default(),
            plugins: Vec::new(),
        }
    }
}

impl EditorBuilder {
    pub fn host(mut self, host: impl StampHost + 'static) -> Self {
        self.host = Rc::new(host);
        self
    }

    pub fn shared_host(mut self, host: Rc<dyn StampHost>) -> Self {
        self.host = host;
        self
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a plugin ahead of the built-in ones
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn build(self) -> Editor {
        let mut plugins = self.plugins;
        plugins.push(Box::new(MarksPlugin));
        plugins.push(Box::new(StampsPlugin::new(Rc::clone(&self.host))));
        debug!(
            plugins = ?plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "editor built"
        );
        Editor {
            tree: Tree::new(),
            plugins,
            host: self.host,
            config: self.config,
            clipboard: None,
            version: 0,
        }
    }
}

/// Rich-text editor with stamped lines
pub struct Editor {
    tree: Tree,
    plugins: Vec<Box<dyn Plugin>>,
    host: Rc<dyn StampHost>,
    config: EditorConfig,
    clipboard: Option<Vec<Line>>,
    version: u64,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("tree", &self.tree)
            .field("config", &self.config)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Editor {
    pub fn new(host: impl StampHost + 'static) -> Self {
        Self::builder().host(host).build()
    }

    pub fn builder() -> EditorBuilder {
        EditorBuilder::default()
    }

    /// Run `command` and normalize, rolling back on failure
    fn batch<T>(
        &mut self,
        name: &'static str,
        command: impl FnOnce(&mut Tree, Next<'_>) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.tree.clone();
        let next = Next::new(&self.plugins);
        let limit = self.config.normalize_limit;
        let result = command(&mut self.tree, next).and_then(|value| {
            normalize(&mut self.tree, next, limit)?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                if self.tree.take_changed() {
                    self.version += 1;
                }
                debug!(command = name, version = self.version, "batch applied");
                Ok(value)
            }
            Err(err) => {
                error!(command = name, error = %err, "batch aborted, tree restored");
                self.tree = snapshot;
                Err(err)
            }
        }
    }

    /// Snapshot of the document
    pub fn children(&self) -> Vec<Node> {
        self.tree.children().to_vec()
    }

    pub fn children_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self.tree.children())?)
    }

    pub fn selection(&self) -> Option<Range> {
        self.tree.selection().cloned()
    }

    /// Move the selection. Both ends must point into existing text.
    pub fn select(&mut self, range: Range) -> Result<()> {
        for point in [&range.anchor, &range.focus] {
            let valid = self
                .tree
                .text(&point.path)
                .is_ok_and(|text| point.offset <= text.char_len());
            if !valid {
                warn!(point = %point, "rejected selection");
                return Err(EditorError::InvalidArgument(format!(
                    "{point} is not a position in the document"
                )));
            }
        }
        self.tree.select(range);
        self.tree.set_pending_marks(None);
        Ok(())
    }

    pub fn select_point(&mut self, point: Point) -> Result<()> {
        self.select(Range::collapsed(point))
    }

    /// Place the cursor at the end of the document
    pub fn select_end(&mut self) -> Result<()> {
        let end = self.tree.end(&Path::root())?;
        self.select_point(end)
    }

    /// Plain text, one line per block, each followed by `\n`
    pub fn text_content(&self, options: &LineOptions) -> String {
        lines_to_text(to_lines(self.tree.children(), options))
    }

    /// Replace the document with `text` as a single run
    pub fn set_text_content(&mut self, text: &str) -> Result<()> {
        self.batch("set_text_content", |tree, _| {
            tree.replace_children(vec![Node::paragraph(vec![Node::text("")])]);
            commands::insert_text(tree, text)
        })
    }

    /// [`Editor::set_text_content`] for loosely typed host input; anything
    /// but a string is rejected
    pub fn set_text_content_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(text) => self.set_text_content(text),
            other => {
                warn!(value = %other, "set_text_content expects a string");
                Err(EditorError::InvalidArgument(format!(
                    "text content must be a string, got {other}"
                )))
            }
        }
    }

    /// Replace the document. Malformed node lists leave it untouched.
    pub fn set_children(&mut self, children: Vec<Node>) -> Result<()> {
        if let Err(err) = validate_nodes(&children) {
            warn!(error = %err, "rejected node list");
            return Err(err);
        }
        self.batch("set_children", |tree, _| {
            tree.replace_children(children);
            Ok(())
        })
    }

    pub fn set_children_json(&mut self, json: &str) -> Result<()> {
        let children: Vec<Node> = serde_json::from_str(json).map_err(|err| {
            warn!(error = %err, "rejected node list");
            EditorError::InvalidArgument(format!("malformed node list: {err}"))
        })?;
        self.set_children(children)
    }

    /// Back to a single empty paragraph
    pub fn clear(&mut self) -> Result<()> {
        self.batch("clear", |tree, _| {
            tree.replace_children(vec![Node::paragraph(vec![Node::text("")])]);
            Ok(())
        })
    }

    pub fn insert_break(&mut self) -> Result<()> {
        self.batch("insert_break", |tree, next| next.insert_break(tree))
    }

    pub fn insert_text(&mut self, text: &str) -> Result<()> {
        self.batch("insert_text", |tree, next| next.insert_text(tree, text))
    }

    /// Insert a tab, keeping the active marks
    pub fn insert_tab(&mut self) -> Result<()> {
        self.batch("insert_tab", |tree, _| {
            let active = marks::active_marks(tree);
            commands::insert_text(tree, "\t")?;
            if !active.is_empty() {
                tree.set_pending_marks(Some(active));
            }
            Ok(())
        })
    }

    pub fn delete_backward(&mut self) -> Result<()> {
        self.batch("delete_backward", |tree, next| next.delete_backward(tree))
    }

    pub fn delete_fragment(&mut self) -> Result<()> {
        self.batch("delete_fragment", |tree, next| next.delete_fragment(tree))
    }

    /// Marks the next typed character gets
    pub fn marks(&self) -> Marks {
        marks::active_marks(&self.tree)
    }

    pub fn is_mark_active(&self, mark: Mark) -> bool {
        marks::is_mark_active(&self.tree, mark)
    }

    pub fn toggle_mark(&mut self, mark: Mark) -> Result<()> {
        self.batch("toggle_mark", |tree, _| marks::toggle_mark(tree, mark))
    }

    pub fn toggle_list(&mut self, is_active: bool, kind: ListKind) -> Result<()> {
        self.batch("toggle_list", |tree, _| lists::toggle_list(tree, is_active, kind))
    }

    pub fn is_block_active(&self, kind: ListKind) -> bool {
        lists::is_list_active(&self.tree, kind)
    }

    /// Toggle a list, deriving its current state from the selection
    pub fn toggle_block(&mut self, kind: ListKind) -> Result<()> {
        let is_active = self.is_block_active(kind);
        self.toggle_list(is_active, kind)
    }

    pub fn is_format_active(&self, format: Format) -> bool {
        match format {
            Format::Mark(mark) => self.is_mark_active(mark),
            Format::List(kind) => self.is_block_active(kind),
        }
    }

    pub fn toggle_format(&mut self, format: Format) -> Result<()> {
        match format {
            Format::Mark(mark) => self.toggle_mark(mark),
            Format::List(kind) => self.toggle_block(kind),
        }
    }

    /// Copy the selection. A cursor copies nothing.
    pub fn copy(&mut self, system: &mut dyn SystemClipboard) {
        let Some(lines) = copy_lines(&self.tree) else {
            return;
        };
        system.write_text(&clipboard_text(&lines));
        debug!(lines = lines.len(), "copied selection");
        self.clipboard = Some(lines);
    }

    pub fn paste(&mut self, system: &dyn SystemClipboard) -> Result<()> {
        let text = system.read_text();
        let internal = self.clipboard.clone().unwrap_or_default();
        self.batch("paste", |tree, next| {
            clipboard::paste(tree, next, &internal, text.as_deref())
        })
    }

    /// Report a click on the stamp of the stamped line at `path`
    pub fn activate_stamp(&self, path: &Path) -> Result<()> {
        match self.tree.kind(path) {
            Ok(ElementKind::StampedLine(stamp)) => {
                self.host.on_stamp_click(&stamp.label, &stamp.value);
                Ok(())
            }
            _ => Err(EditorError::InvalidArgument(format!(
                "no stamped line at {path}"
            ))),
        }
    }

    /// Number of batches that changed the document
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }
}

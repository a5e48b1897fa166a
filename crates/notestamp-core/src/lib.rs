// SPDX-License-Identifier: AGPL-3.0-or-later
//! Notestamp Core - Rich-text edit engine with stamped lines
//!
//! This crate provides:
//! - A block/inline document tree with marks, lists and stamped lines
//! - Atomic operations, tree transforms and a fixed-point normalizer
//! - A plugin chain overriding break, typing and deletion behaviour
//! - Styled copy/paste and plain-text export
//! - C FFI exports for non-Rust hosts

pub mod ast;
pub mod clipboard;
pub mod editor;
pub mod lines;
pub mod lists;
pub mod marks;
pub mod path;
pub mod plugins;
pub mod traits;
pub mod tree;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use ast::{Element, ElementKind, ListKind, Mark, Marks, Node, Stamp, Text};
pub use clipboard::MemoryClipboard;
pub use editor::{Editor, EditorBuilder, Format};
pub use lines::{Leaf, Line};
pub use path::{Path, Point, Range};
pub use traits::{
    EditorConfig, EditorError, LineOptions, Next, NoStamps, Plugin, Result, StampContext,
    StampHost, StampTrigger, SystemClipboard,
};
pub use tree::{Operation, Tree};

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document node model
//!
//! A document is a tree of elements and text leaves. Elements are always
//! blocks: paragraphs and list items host a line of text, list wrappers
//! group list items, and stamped lines annotate a line with a host-supplied
//! label/value pair.

use crate::traits::{EditorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Formatting attribute attached to a text leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
}

impl Mark {
    /// Name used by hosts and in serialized leaves
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Code => "code",
        }
    }

    pub const ALL: [Self; 4] = [Self::Bold, Self::Italic, Self::Underline, Self::Code];
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mark {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mark| mark.name() == s)
            .ok_or_else(|| EditorError::InvalidArgument(format!("unknown mark: {s}")))
    }
}

/// Set of marks carried by a leaf, or pending for the next typed character
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marks(BTreeSet<Mark>);

impl Marks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, mark: Mark) -> bool {
        self.0.contains(&mark)
    }

    pub fn insert(&mut self, mark: Mark) {
        self.0.insert(mark);
    }

    pub fn remove(&mut self, mark: Mark) {
        self.0.remove(&mark);
    }

    /// Copy of this set with `mark` added
    pub fn with(&self, mark: Mark) -> Self {
        let mut marks = self.clone();
        marks.insert(mark);
        marks
    }

    /// Copy of this set with `mark` removed
    pub fn without(&self, mark: Mark) -> Self {
        let mut marks = self.clone();
        marks.remove(mark);
        marks
    }

    pub fn intersection(&self, other: &Marks) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = Mark> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Mark> for Marks {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Host-supplied annotation carried by a stamped line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub label: String,
    pub value: Value,
}

impl Stamp {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// A null value means "do not stamp"
    pub fn is_void(&self) -> bool {
        self.value.is_null()
    }

    /// Parse a loosely typed host reply.
    ///
    /// `null` is a declined stamp. Anything other than `null` or an object
    /// with a string `label` and a `value` key breaks the host contract.
    pub fn from_host_value(reply: Value) -> Result<Option<Stamp>> {
        match reply {
            Value::Null => Ok(None),
            Value::Object(mut map) => {
                let label = match map.remove("label") {
                    Some(Value::String(label)) => label,
                    other => {
                        return Err(EditorError::HostCallbackContractViolation(format!(
                            "stamp label must be a string, got {other:?}"
                        )))
                    }
                };
                let value = map.remove("value").ok_or_else(|| {
                    EditorError::HostCallbackContractViolation("stamp reply has no value".into())
                })?;
                let stamp = Stamp { label, value };
                Ok((!stamp.is_void()).then_some(stamp))
            }
            other => Err(EditorError::HostCallbackContractViolation(format!(
                "expected null or {{label, value}}, got {other}"
            ))),
        }
    }
}

/// List flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    pub const fn element_kind(&self) -> ElementKind {
        match self {
            Self::Ordered => ElementKind::OrderedList,
            Self::Unordered => ElementKind::UnorderedList,
        }
    }
}

/// Element type tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementKind {
    Paragraph,
    ListItem,
    OrderedList,
    UnorderedList,
    StampedLine(Stamp),
}

impl ElementKind {
    /// Tag name as it appears in serialized documents
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::ListItem => "list-item",
            Self::OrderedList => "ordered-list",
            Self::UnorderedList => "unordered-list",
            Self::StampedLine(_) => "stamped-line",
        }
    }

    /// Paragraphs and list items: the blocks a stamped line can live in
    pub const fn is_host(&self) -> bool {
        matches!(self, Self::Paragraph | Self::ListItem)
    }

    pub const fn is_list(&self) -> bool {
        matches!(self, Self::OrderedList | Self::UnorderedList)
    }

    pub const fn is_stamped(&self) -> bool {
        matches!(self, Self::StampedLine(_))
    }

    pub fn list_kind(&self) -> Option<ListKind> {
        match self {
            Self::OrderedList => Some(ListKind::Ordered),
            Self::UnorderedList => Some(ListKind::Unordered),
            _ => None,
        }
    }

    pub fn stamp(&self) -> Option<&Stamp> {
        match self {
            Self::StampedLine(stamp) => Some(stamp),
            _ => None,
        }
    }
}

/// Text leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
    #[serde(default, skip_serializing_if = "Marks::is_empty")]
    pub marks: Marks,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::new(),
        }
    }

    pub fn with_marks(mut self, marks: Marks) -> Self {
        self.marks = marks;
        self
    }

    /// Length in characters (the unit of point offsets)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Block element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(flatten)]
    pub kind: ElementKind,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(kind: ElementKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    /// True when the element holds a single empty leaf
    pub fn is_empty_line(&self) -> bool {
        matches!(self.children.as_slice(), [Node::Text(t)] if t.text.is_empty())
    }

    /// True when any child is an element
    pub fn has_block_children(&self) -> bool {
        self.children.iter().any(|c| matches!(c, Node::Element(_)))
    }

    /// Concatenated text of all leaves below this element
    pub fn string(&self) -> String {
        self.children.iter().map(Node::string).collect()
    }
}

/// Document node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(Text),
    Element(Element),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(Text::new(text))
    }

    pub fn marked(text: impl Into<String>, marks: impl IntoIterator<Item = Mark>) -> Self {
        Node::Text(Text::new(text).with_marks(marks.into_iter().collect()))
    }

    pub fn element(kind: ElementKind, children: Vec<Node>) -> Self {
        Node::Element(Element::new(kind, children))
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Self::element(ElementKind::Paragraph, children)
    }

    pub fn list_item(children: Vec<Node>) -> Self {
        Self::element(ElementKind::ListItem, children)
    }

    pub fn list(kind: ListKind, items: Vec<Node>) -> Self {
        Self::element(kind.element_kind(), items)
    }

    pub fn stamped(stamp: Stamp, children: Vec<Node>) -> Self {
        Self::element(ElementKind::StampedLine(stamp), children)
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    /// Concatenated text of this node
    pub fn string(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Element(e) => e.string(),
        }
    }

    /// Count characters below this node
    pub fn char_count(&self) -> usize {
        match self {
            Node::Text(t) => t.char_len(),
            Node::Element(e) => e.children.iter().map(Node::char_count).sum(),
        }
    }

    /// Whether a stamped line appears anywhere in this subtree
    pub fn contains_stamp(&self) -> bool {
        match self {
            Node::Text(_) => false,
            Node::Element(e) => e.kind.is_stamped() || e.children.iter().any(Node::contains_stamp),
        }
    }
}

/// Check that a host-supplied node list can become a document.
///
/// Top-level nodes must be elements, every element needs children, and no
/// stamped line may sit inside another one.
pub fn validate_nodes(nodes: &[Node]) -> Result<()> {
    if nodes.is_empty() {
        return Err(EditorError::InvalidArgument("node list is empty".into()));
    }
    for (index, node) in nodes.iter().enumerate() {
        if node.is_text() {
            return Err(EditorError::InvalidArgument(format!(
                "top-level node {index} is a text leaf"
            )));
        }
        validate_node(node, false)?;
    }
    Ok(())
}

fn validate_node(node: &Node, inside_stamp: bool) -> Result<()> {
    let Node::Element(element) = node else {
        return Ok(());
    };
    let stamped = element.kind.is_stamped();
    if stamped && inside_stamp {
        return Err(EditorError::InvalidArgument(
            "stamped line nested inside another stamped line".into(),
        ));
    }
    if element.children.is_empty() {
        return Err(EditorError::InvalidArgument(format!(
            "{} element has no children",
            element.kind.name()
        )));
    }
    element
        .children
        .iter()
        .try_for_each(|child| validate_node(child, inside_stamp || stamped))
}

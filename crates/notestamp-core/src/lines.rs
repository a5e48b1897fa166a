// SPDX-License-Identifier: AGPL-3.0-or-later
//! Line-oriented view of a document
//!
//! Copy/paste and plain-text export see a document as a sequence of lines,
//! each an ordered run of styled leaves.

use crate::ast::{Element, Marks, Node, Text};
use crate::traits::LineOptions;
use serde::{Deserialize, Serialize};

/// Text run of a line with its marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub text: String,
    #[serde(default, skip_serializing_if = "Marks::is_empty")]
    pub marks: Marks,
}

impl Leaf {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::new(),
        }
    }
}

impl From<&Text> for Leaf {
    fn from(text: &Text) -> Self {
        Self {
            text: text.text.clone(),
            marks: text.marks.clone(),
        }
    }
}

impl From<Leaf> for Text {
    fn from(leaf: Leaf) -> Self {
        Text::new(leaf.text).with_marks(leaf.marks)
    }
}

pub type Line = Vec<Leaf>;

/// Lines of `nodes`: one per text block, one per list item, one per
/// stamped line. The iterator is cheap to clone and restart.
pub fn to_lines<'a>(nodes: &'a [Node], options: &LineOptions) -> Lines<'a> {
    Lines {
        stack: nodes.iter().rev().collect(),
        options: *options,
    }
}

#[derive(Debug, Clone)]
pub struct Lines<'a> {
    stack: Vec<&'a Node>,
    options: LineOptions,
}

impl Iterator for Lines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        loop {
            match self.stack.pop()? {
                Node::Text(text) => return Some(vec![Leaf::from(text)]),
                Node::Element(element) if element.has_block_children() => {
                    self.stack.extend(element.children.iter().rev());
                }
                Node::Element(element) => return Some(line_of(element, &self.options)),
            }
        }
    }
}

fn line_of(element: &Element, options: &LineOptions) -> Line {
    let mut line = Vec::new();
    if let (true, Some(stamp)) = (options.with_stamps, element.kind.stamp()) {
        line.push(Leaf::new(format!("[{}] ", stamp.label)));
    }
    line.extend(
        element
            .children
            .iter()
            .filter_map(Node::as_text)
            .map(Leaf::from),
    );
    line
}

/// Plain text of `lines`, marks dropped, `\n` after every line
pub fn lines_to_text<I, L>(lines: I) -> String
where
    I: IntoIterator<Item = L>,
    L: AsRef<[Leaf]>,
{
    let mut out = String::new();
    for line in lines {
        for leaf in line.as_ref() {
            out.push_str(&leaf.text);
        }
        out.push('\n');
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::ast::Mark;
    use proptest::prelude::*;

    fn run_strategy() -> impl Strategy<Value = Node> {
        ("[^\n\r]{0,8}", prop::option::of(Just(Mark::Italic)))
            .prop_map(|(text, mark)| Node::marked(text, mark))
    }

    proptest! {
        // Property: a single newline-free line exports as its text plus "\n"
        #[test]
        fn prop_line_round_trip(runs in prop::collection::vec(run_strategy(), 1..5)) {
            let expected: String = runs.iter().map(Node::string).collect();
            let fragment = vec![Node::paragraph(runs)];
            let text = lines_to_text(to_lines(&fragment, &LineOptions::default()));
            prop_assert_eq!(text, format!("{expected}\n"));
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Carries formatting across line breaks

use crate::marks::active_marks;
use crate::traits::{Next, Plugin, Result};
use crate::tree::Tree;

/// Makes the marks active before a break pending on the new line
#[derive(Debug, Default)]
pub struct MarksPlugin;

impl Plugin for MarksPlugin {
    fn name(&self) -> &'static str {
        "marks"
    }

    fn insert_break(&self, tree: &mut Tree, next: Next<'_>) -> Result<()> {
        let marks = active_marks(tree);
        next.insert_break(tree)?;
        if !marks.is_empty() {
            tree.set_pending_marks(Some(marks));
        }
        Ok(())
    }
}

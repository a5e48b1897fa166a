// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in plugins

pub mod marks;
pub mod stamps;

pub use marks::MarksPlugin;
pub use stamps::StampsPlugin;

//! Command implementations

pub mod args;
pub mod check;
pub mod completions;
pub mod list;
pub mod show;

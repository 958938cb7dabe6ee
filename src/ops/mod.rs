//! High-level operations.
//!
//! This module contains the implementation of specforge commands.

pub mod args;
pub mod check;
pub mod list;
pub mod load;
pub mod show;

pub use args::{construct_task, format_task, parse_setting_assignment, ArgsOptions, ArgsResult};
pub use check::{check, CheckOptions, CheckReport};
pub use list::{format_spec_list, list_specs, ListOptions, SpecSummary};
pub use load::{load, load_registry, resolve_config, LoadOptions};
pub use show::{format_spec_details, show_spec, OptionSummary, SpecDetails};

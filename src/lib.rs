//! specforge - a registry and command-line engine for declarative build tool specs
//!
//! This crate loads tool, build system and file type specs from spec files,
//! resolves their inheritance across domains, and turns a tool spec plus a
//! set of build settings into the command line, environment and file
//! dependencies of a task.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{CommandBuildContext, CommandLineToolSpec, TaskDescriptor};
pub use crate::core::{RegistryBuilder, Spec, SpecRegistry};
pub use util::config::Config;

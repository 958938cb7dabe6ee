//! Turning tool specs into tasks.
//!
//! This module holds the build option model, the command-line template
//! engine that evaluates it against a macro scope, and the pieces around a
//! constructed task: tool discovery and output parsing.

pub mod build_option;
pub mod context;
pub mod discovery;
pub mod grouping;
pub mod option_type;
pub mod output_parser;
pub mod property_domain;
pub mod task;
pub mod tool;

pub use build_option::BuildOption;
pub use context::{BuildOptionGenerationContext, CommandBuildContext, CommandProducer, FileToBuild};
pub use discovery::{DiscoveredInfoCache, DiscoveredToolInfo, ToolFeatures};
pub use output_parser::GenericOutputParser;
pub use property_domain::PropertyDomainSpec;
pub use task::{CollectingDelegate, TaskDescriptor, TaskGenerationDelegate};
pub use tool::CommandLineToolSpec;

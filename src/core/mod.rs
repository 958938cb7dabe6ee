//! Spec data and the registry that holds it.
//!
//! - Property-list values and typed field extraction (`plist`, `parser`)
//! - The macro language (`macros`)
//! - Spec records, their proxies and the registry (`spec`, `proxy`, `registry`)

pub mod build_system;
pub mod file_type;
pub mod macros;
pub mod parser;
pub mod plist;
pub mod proxy;
pub mod registry;
pub mod spec;

pub use plist::{PropertyListDict, PropertyListItem};
pub use proxy::SpecProxy;
pub use registry::{RegistryBuilder, SpecLoadingError, SpecRegistry};
pub use spec::{Spec, SpecClass, SpecType};

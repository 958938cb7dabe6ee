//! Macro declarations shared by every spec in a registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

/// The declared type of a macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroType {
    Boolean,
    String,
    StringList,
    Path,
    PathList,
}

impl MacroType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroType::Boolean => "boolean",
            MacroType::String => "string",
            MacroType::StringList => "stringlist",
            MacroType::Path => "path",
            MacroType::PathList => "pathlist",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, MacroType::StringList | MacroType::PathList)
    }
}

impl fmt::Display for MacroType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("macro '{name}' redeclared with conflicting type '{requested}' (was '{existing}')")]
pub struct MacroDeclarationError {
    pub name: String,
    pub existing: MacroType,
    pub requested: MacroType,
}

/// Names every macro gets evaluated against a scope for.
pub mod builtin {
    pub const CURRENT_ARCH: &str = "CURRENT_ARCH";
    pub const VALUE: &str = "value";
    pub const OUTPUT_PATH: &str = "OutputPath";
    pub const DERIVED_SOURCES_DIR: &str = "DERIVED_SOURCES_DIR";
}

/// Thread-safe table of declared macros.
#[derive(Debug, Default)]
pub struct MacroNamespace {
    declarations: RwLock<HashMap<String, MacroType>>,
}

impl MacroNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A namespace with the engine's own macros declared.
    pub fn with_builtins() -> Self {
        let namespace = Self::new();
        for (name, ty) in [
            (builtin::CURRENT_ARCH, MacroType::String),
            (builtin::VALUE, MacroType::String),
            (builtin::OUTPUT_PATH, MacroType::Path),
            (builtin::DERIVED_SOURCES_DIR, MacroType::Path),
        ] {
            // Fresh namespace: these cannot conflict.
            let _ = namespace.declare(name, ty);
        }
        namespace
    }

    pub fn lookup(&self, name: &str) -> Option<MacroType> {
        self.declarations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Declare `name`; redeclaring with the same type is a no-op.
    pub fn declare(&self, name: &str, ty: MacroType) -> Result<MacroType, MacroDeclarationError> {
        let mut declarations = self
            .declarations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match declarations.get(name) {
            Some(existing) if *existing == ty => Ok(ty),
            Some(existing) => Err(MacroDeclarationError {
                name: name.to_string(),
                existing: *existing,
                requested: ty,
            }),
            None => {
                declarations.insert(name.to_string(), ty);
                Ok(ty)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.declarations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Lazy handles to registered spec records.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::parser::LocalizedStrings;
use crate::core::plist::PropertyListDict;
use crate::core::spec::{Spec, SpecClass, SpecType};
use crate::util::Diagnostic;

/// Index of a proxy in its registry's arena.
pub type ProxyId = usize;

/// One registered spec record, not yet parsed.
#[derive(Debug, Clone)]
pub struct SpecProxy {
    pub(crate) id: ProxyId,
    pub identifier: String,
    pub domain: String,
    pub path: PathBuf,
    pub ty: SpecType,
    /// Explicit or identifier-implied class.
    pub class: Option<SpecClass>,
    /// The raw `BasedOn` reference.
    pub based_on: Option<String>,
    pub data: Arc<PropertyListDict>,
    pub localized: Option<Arc<LocalizedStrings>>,
    /// Resolved when the registry is frozen.
    pub(crate) base: Option<ProxyId>,
}

impl SpecProxy {
    pub fn new(
        identifier: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<PathBuf>,
        ty: SpecType,
        data: Arc<PropertyListDict>,
    ) -> Self {
        SpecProxy {
            id: 0,
            identifier: identifier.into(),
            domain: domain.into(),
            path: path.into(),
            ty,
            class: None,
            based_on: None,
            data,
            localized: None,
            base: None,
        }
    }

    /// `'domain:identifier'`, quoted, for messages.
    pub fn specifier_string(&self) -> String {
        format!("'{}:{}'", self.domain, self.identifier)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `(domain, identifier)` the `BasedOn` reference names.
    pub fn base_reference(&self) -> Option<(String, String)> {
        self.based_on
            .as_deref()
            .map(|reference| split_reference(reference, &self.domain))
    }
}

impl fmt::Display for SpecProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.identifier)
    }
}

/// Split `[domain:]identifier`.
///
/// A bare identifier stays in `own_domain`; the domain `default` is the
/// global domain.
pub fn split_reference(reference: &str, own_domain: &str) -> (String, String) {
    match reference.split_once(':') {
        Some((domain, identifier)) if !identifier.is_empty() => {
            let domain = if domain == "default" { "" } else { domain };
            (domain.to_string(), identifier.to_string())
        }
        Some((identifier, _)) => (own_domain.to_string(), identifier.to_string()),
        None => (own_domain.to_string(), reference.to_string()),
    }
}

/// Per-proxy loading state; each proxy moves through it exactly once.
#[derive(Debug, Clone, Default)]
pub(crate) enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Arc<Spec>),
    Error(Vec<Diagnostic>),
}

impl LoadState {
    pub(crate) fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            LoadState::Error(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

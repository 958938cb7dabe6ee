//! Loading every spec and collecting what went wrong.

use crate::core::registry::SpecRegistry;
use crate::util::diagnostic::Diagnostic;

/// Options for [`check`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Also report `BasedOn` references that cross into an unrelated domain
    pub domain_inversion: bool,
}

/// Outcome of [`check`].
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub loaded: usize,
    pub failed: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub domain_inversion_errors: Vec<String>,
}

impl CheckReport {
    pub fn has_errors(&self) -> bool {
        self.failed > 0
            || !self.domain_inversion_errors.is_empty()
            || self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| !d.is_error()).count()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count() + self.domain_inversion_errors.len()
    }
}

/// Force-load every registered spec.
pub fn check(registry: &SpecRegistry, opts: CheckOptions) -> CheckReport {
    let mut report = CheckReport::default();
    for proxy in registry.proxies() {
        if registry.load(proxy).is_some() {
            report.loaded += 1;
        } else {
            report.failed += 1;
        }
    }
    report.diagnostics = registry.diagnostics();

    if opts.domain_inversion {
        let errors = &mut report.domain_inversion_errors;
        registry.validate_spec_domain_inversion(|message| errors.push(message));
    }

    tracing::debug!(
        "checked {} specs: {} failed, {} diagnostics",
        report.loaded + report.failed,
        report.failed,
        report.diagnostics.len()
    );
    report
}

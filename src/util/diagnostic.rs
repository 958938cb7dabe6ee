//! Diagnostics produced while discovering, parsing and using specs.
//!
//! Spec data errors never abort: every parser, the registry and the task
//! constructor record `Diagnostic`s and keep going with a best-effort value.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages.
pub mod suggestions {
    /// Suggestion when no spec search path is configured.
    pub const NO_SEARCH_PATH: &str =
        "help: Pass `--spec-path <dir>` or add `search_paths` to .specforge/config.toml";

    /// Suggestion when a spec is not found.
    pub const SPEC_NOT_FOUND: &str = "help: Run `specforge list` to see the loaded specs";

    /// Suggestion when spec loading produced errors.
    pub const CHECK_SPECS: &str = "help: Run `specforge check` for the full diagnostic list";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position inside a file a diagnostic refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Location {
    /// A location naming a whole file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Location {
            path: path.into(),
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        Ok(())
    }
}

/// A diagnostic message with optional context, suggestions and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location
    pub location: Option<Location>,
    /// Nested diagnostics (e.g. the errors of a base spec)
    pub children: Vec<Diagnostic>,
}

impl Diagnostic {
    /// Create a diagnostic with the given severity.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
            children: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create a new note diagnostic.
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach child diagnostics.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Diagnostic>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();
        self.format_into(&mut output, color, 0);
        output
    }

    fn format_into(&self, output: &mut String, color: bool, depth: usize) {
        let indent = "  ".repeat(depth);
        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
                Severity::Help => "\x1b[1;32mhelp\x1b[0m",
            }
        } else {
            self.severity.as_str()
        };

        output.push_str(&format!("{}{}: {}\n", indent, severity_str, self.message));

        if let Some(ref location) = self.location {
            output.push_str(&format!("{}  --> {}\n", indent, location));
        }

        for ctx in &self.context {
            output.push_str(&format!("{}  → {}\n", indent, ctx));
        }

        if !self.suggestions.is_empty() {
            for suggestion in &self.suggestions {
                output.push_str(&format!("{}  {}\n", indent, suggestion));
            }
        }

        for child in &self.children {
            child.format_into(output, color, depth + 1);
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Accumulates diagnostics for one unit of work (a spec parse, a task).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::error(message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::warning(message));
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::note(message));
    }

    /// Whether any error-severity diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(other);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("unable to load 'macosx:com.example.tool'")
            .with_location(Location::file("/specs/Tool.xcspec"))
            .with_context("while loading base spec")
            .with_suggestion(suggestions::CHECK_SPECS)
            .with_children([Diagnostic::error("missing required 'CommandLine' key")]);

        let output = diag.format(false);
        assert!(output.contains("error: unable to load"));
        assert!(output.contains("--> /specs/Tool.xcspec"));
        assert!(output.contains("while loading base spec"));
        assert!(output.contains("help: Run `specforge check`"));
        assert!(output.contains("  error: missing required 'CommandLine' key"));
    }

    #[test]
    fn test_location_display() {
        let loc = Location {
            path: PathBuf::from("main.c"),
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(loc.to_string(), "main.c:3:7");
        assert_eq!(Location::file("a.c").to_string(), "a.c");
    }

    #[test]
    fn test_diagnostics_collector() {
        let mut diags = Diagnostics::new();
        diags.warning("unused key 'Foo'");
        assert!(!diags.has_errors());
        diags.error("bad value");
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(diags.len(), 2);
    }
}

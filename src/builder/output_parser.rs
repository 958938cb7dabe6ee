//! Scraping POSIX-style diagnostics out of tool output.
//!
//! Output arrives in arbitrary chunks. It is forwarded to the delegate as
//! received and parsed line by line once each newline shows up. A
//! diagnostic stays open until the next one starts (or the stream ends) so
//! trailing `fixit:` lines can attach to it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::builder::task::{OutputParserKind, TaskDescriptor};
use crate::util::diagnostic::{Diagnostic, Location, Severity};
use crate::util::fs::normalize_path;

static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):(?:([0-9]+):)?(?:([0-9]+):)? +$").unwrap());

static FIXIT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):([0-9]+):([0-9]+)-([0-9]+):([0-9]+): +fixit: (.*)$").unwrap()
});

static FIXIT_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):([0-9]+):([0-9]+): +fixit: (.*)$").unwrap());

/// A span of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub path: PathBuf,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// A suggested replacement attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixIt {
    pub range: SourceRange,
    pub new_text: String,
}

impl FixIt {
    /// Parse `FILE:L:C-L:C: fixit: TEXT` or `FILE:L:C: fixit: TEXT`.
    ///
    /// Returns `None` for malformed lines, for lines whose file is one of
    /// `ignored_paths`, and when the text is not a valid JSON string body.
    pub fn parse(line: &str, ignored_paths: &[String], working_dir: &Path) -> Option<FixIt> {
        let (file, start, end, text) = if let Some(m) = FIXIT_RANGE.captures(line) {
            let start = (m[2].parse().ok()?, m[3].parse().ok()?);
            let end = (m[4].parse().ok()?, m[5].parse().ok()?);
            (m.get(1)?.as_str(), start, end, m.get(6)?.as_str())
        } else {
            let m = FIXIT_POINT.captures(line)?;
            let start = (m[2].parse().ok()?, m[3].parse().ok()?);
            (m.get(1)?.as_str(), start, start, m.get(4)?.as_str())
        };
        if ignored_paths.iter().any(|p| p == file) {
            return None;
        }
        let new_text = serde_json::from_str::<String>(&format!("\"{}\"", text)).ok()?;
        Some(FixIt {
            range: SourceRange {
                path: absolute(file, working_dir),
                start_line: start.0,
                start_column: start.1,
                end_line: end.0,
                end_column: end.1,
            },
            new_text,
        })
    }
}

/// A scraped diagnostic together with its fix-its.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDiagnostic {
    pub diagnostic: Diagnostic,
    pub fixits: Vec<FixIt>,
}

/// Receives the raw output and the diagnostics found in it.
pub trait OutputParserDelegate {
    fn emit_output(&mut self, bytes: &[u8]);

    fn emit_diagnostic(&mut self, diagnostic: ParsedDiagnostic);

    fn close(&mut self) {}
}

/// Keeps everything it is given.
#[derive(Debug, Default)]
pub struct CollectingOutputDelegate {
    pub output: Vec<u8>,
    pub diagnostics: Vec<ParsedDiagnostic>,
    pub closed: bool,
}

impl OutputParserDelegate for CollectingOutputDelegate {
    fn emit_output(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn emit_diagnostic(&mut self, diagnostic: ParsedDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn absolute(file: &str, working_dir: &Path) -> PathBuf {
    normalize_path(&working_dir.join(file))
}

fn severity_for(kind: &str) -> Severity {
    match kind {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Note,
    }
}

/// Line-buffered diagnostic scraper for one task's output.
pub struct GenericOutputParser<D> {
    delegate: D,
    kind: OutputParserKind,
    diagnostic_regex: Regex,
    tool_basenames: Vec<String>,
    working_dir: PathBuf,
    unparsed: Vec<u8>,
    in_progress: Option<Diagnostic>,
    fixits: Vec<FixIt>,
}

impl<D: OutputParserDelegate> GenericOutputParser<D> {
    /// `aliases` are extra names the tool may print in place of a location;
    /// the basename of `executable` is always included.
    pub fn new(
        delegate: D,
        aliases: &[String],
        executable: &str,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut tool_basenames: Vec<String> = aliases.to_vec();
        let executable = Path::new(executable)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.to_string());
        if !tool_basenames.contains(&executable) {
            tool_basenames.push(executable);
        }

        // A diagnostic either starts the line (after whitespace) or follows a
        // `location: ` prefix that contains no quotes.
        let tool_names = tool_basenames
            .iter()
            .map(|name| format!(r"(?:.*/)?{}", regex::escape(name)))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r#"^([^'"]+: +|[ \t\f\p{{Z}}]*)(error|warning|note|notice|fixit|{}): (.*)$"#,
            tool_names
        );
        // Every interpolated name is escaped, so the pattern always compiles.
        let diagnostic_regex = Regex::new(&pattern).unwrap();

        GenericOutputParser {
            delegate,
            kind: OutputParserKind::Diagnostics,
            diagnostic_regex,
            tool_basenames,
            working_dir: working_dir.into(),
            unparsed: Vec::new(),
            in_progress: None,
            fixits: Vec::new(),
        }
    }

    /// A parser for the output of `task`.
    pub fn for_task(delegate: D, task: &TaskDescriptor, aliases: &[String]) -> Self {
        let executable = task.command_line.first().map(String::as_str).unwrap_or_default();
        let mut parser = Self::new(delegate, aliases, executable, task.working_directory.clone());
        parser.kind = task.output_parser;
        parser
    }

    /// Report unrecognized lines as notes instead of dropping them.
    pub fn shell_script(mut self) -> Self {
        self.kind = OutputParserKind::ShellScript;
        self
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.delegate.emit_output(bytes);
        self.unparsed.extend_from_slice(bytes);

        let Some(last_newline) = self.unparsed.iter().rposition(|b| *b == b'\n') else {
            return;
        };
        let complete: Vec<u8> = self.unparsed.drain(..=last_newline).collect();
        for line in complete[..last_newline].split(|b| *b == b'\n') {
            self.parse_line(line);
        }
    }

    /// Parse any unterminated line, flush the open diagnostic and hand back
    /// the delegate.
    pub fn close(mut self) -> D {
        if !self.unparsed.is_empty() {
            let rest = std::mem::take(&mut self.unparsed);
            self.parse_line(&rest);
        }
        self.flush();
        self.delegate.close();
        self.delegate
    }

    fn parse_line(&mut self, bytes: &[u8]) {
        let line = String::from_utf8_lossy(bytes);
        if self.parse_diagnostic_line(&line) {
            return;
        }
        if self.kind == OutputParserKind::ShellScript {
            self.delegate.emit_diagnostic(ParsedDiagnostic {
                diagnostic: Diagnostic::note(line.into_owned()),
                fixits: Vec::new(),
            });
        }
    }

    /// Whether the line was consumed as part of a diagnostic.
    fn parse_diagnostic_line(&mut self, line: &str) -> bool {
        let Some(captures) = self.diagnostic_regex.captures(line) else {
            return false;
        };
        let prefix = captures.get(1).map_or("", |m| m.as_str());
        let kind = captures.get(2).map_or("", |m| m.as_str());
        let message = captures.get(3).map_or("", |m| m.as_str());

        if kind == "fixit" {
            if self.in_progress.is_none() {
                return false;
            }
            if let Some(fixit) = FixIt::parse(line, &self.tool_basenames, &self.working_dir) {
                self.fixits.push(fixit);
            }
            return true;
        }

        let location = self.parse_location(prefix);
        self.flush();
        let mut diagnostic = Diagnostic::new(severity_for(kind), message);
        diagnostic.location = location;
        self.in_progress = Some(diagnostic);
        true
    }

    fn parse_location(&self, prefix: &str) -> Option<Location> {
        let captures = LOCATION.captures(prefix)?;
        let file = captures.get(1)?.as_str();
        if self.tool_basenames.iter().any(|name| name == file) {
            return None;
        }
        Some(Location {
            path: absolute(file, &self.working_dir),
            line: captures.get(2).and_then(|m| m.as_str().parse().ok()),
            column: captures.get(3).and_then(|m| m.as_str().parse().ok()),
        })
    }

    fn flush(&mut self) {
        let fixits = std::mem::take(&mut self.fixits);
        if let Some(diagnostic) = self.in_progress.take() {
            self.delegate.emit_diagnostic(ParsedDiagnostic { diagnostic, fixits });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(chunks: &[&str]) -> CollectingOutputDelegate {
        let mut parser = GenericOutputParser::new(
            CollectingOutputDelegate::default(),
            &["ld64".to_string()],
            "/usr/bin/ld",
            "/work",
        );
        for chunk in chunks {
            parser.write(chunk.as_bytes());
        }
        parser.close()
    }

    #[test]
    fn test_diagnostic_with_location() {
        let result = parse(&["src/a.c:3:7: error: bad thing\n"]);
        assert_eq!(result.output, b"src/a.c:3:7: error: bad thing\n");
        assert!(result.closed);

        let [parsed] = result.diagnostics.as_slice() else {
            panic!("expected one diagnostic");
        };
        assert_eq!(parsed.diagnostic.severity, Severity::Error);
        assert_eq!(parsed.diagnostic.message, "bad thing");
        assert_eq!(
            parsed.diagnostic.location,
            Some(Location {
                path: PathBuf::from("/work/src/a.c"),
                line: Some(3),
                column: Some(7),
            })
        );
    }

    #[test]
    fn test_lines_split_across_writes() {
        let result = parse(&["warn", "ing: first\nnote: sec", "ond"]);
        let messages: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| (d.diagnostic.severity, d.diagnostic.message.as_str()))
            .collect();
        assert_eq!(messages, [(Severity::Warning, "first"), (Severity::Note, "second")]);
    }

    #[test]
    fn test_tool_name_is_not_a_location() {
        let result = parse(&["ld: warning: directory not found\n", "/usr/bin/ld: symbols missing\n"]);
        assert_eq!(result.diagnostics.len(), 2);
        assert_eq!(result.diagnostics[0].diagnostic.severity, Severity::Warning);
        assert_eq!(result.diagnostics[0].diagnostic.location, None);
        assert_eq!(result.diagnostics[1].diagnostic.severity, Severity::Note);
        assert_eq!(result.diagnostics[1].diagnostic.message, "symbols missing");
    }

    #[test]
    fn test_fixits_attach_to_open_diagnostic() {
        let result = parse(&[
            "fixit: orphan\n",
            "a.c:1:2: error: missing semicolon\n",
            "a.c:1:2: fixit: ;\n",
            "a.c:1:2-1:5: fixit: \\\"x\\\"\n",
            "a.c:bogus: fixit: dropped\n",
            "b.c:9: warning: next\n",
        ]);
        assert_eq!(result.diagnostics.len(), 2);

        let fixits = &result.diagnostics[0].fixits;
        assert_eq!(fixits.len(), 2);
        assert_eq!(fixits[0].new_text, ";");
        assert_eq!(fixits[0].range.path, PathBuf::from("/work/a.c"));
        assert_eq!((fixits[0].range.end_line, fixits[0].range.end_column), (1, 2));
        assert_eq!(fixits[1].new_text, "\"x\"");
        assert_eq!((fixits[1].range.end_line, fixits[1].range.end_column), (1, 5));
        assert!(result.diagnostics[1].fixits.is_empty());
    }

    #[test]
    fn test_quoted_prefix_is_not_a_diagnostic() {
        let result = parse(&["echo 'x: error: y'\n", "plain text\n"]);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_shell_script_reports_every_line() {
        let mut parser = GenericOutputParser::new(
            CollectingOutputDelegate::default(),
            &[],
            "/bin/sh",
            "/work",
        )
        .shell_script();
        parser.write(b"building\nerror: failed\n");
        let result = parser.close();

        let messages: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| (d.diagnostic.severity, d.diagnostic.message.as_str()))
            .collect();
        assert_eq!(messages, [(Severity::Note, "building"), (Severity::Error, "failed")]);
    }

    #[test]
    fn test_fixit_in_ignored_file_is_dropped() {
        let ignored = ["ld".to_string()];
        assert!(FixIt::parse("ld:1:1: fixit: x", &ignored, Path::new("/w")).is_none());
        assert!(FixIt::parse("a.c:1:1: fixit: \\q", &ignored, Path::new("/w")).is_none());
        assert!(FixIt::parse("a.c:1:1: fixit: ok", &ignored, Path::new("/w")).is_some());
    }
}

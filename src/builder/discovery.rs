//! Discovering what an installed tool is and what it supports.
//!
//! Asking a tool for its version means running it, so every result is
//! cached per file path or command line and computed at most once, even
//! when several tasks ask at the same time.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex, OnceLock, PoisonError};

use miette::Diagnostic as MietteDiagnostic;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::builder::context::BuildOptionGenerationContext;
use crate::util::process::ProcessBuilder;
use crate::util::version::{Version, VersionError};

/// Errors from reading a tool's features file.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum FeaturesError {
    #[error("failed to read tool features from '{}': {message}", path.display())]
    #[diagnostic(code(specforge::features::read))]
    Read { path: PathBuf, message: String },

    #[error("invalid tool features file '{}': {message}", path.display())]
    #[diagnostic(code(specforge::features::parse))]
    Parse { path: PathBuf, message: String },
}

/// Errors from parsing a tool's version output.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum VersionInfoError {
    #[error("could not parse project version from string: {0}")]
    #[diagnostic(code(specforge::discovery::project_version))]
    ProjectVersion(String),

    #[error("could not parse generic version from string: {0}")]
    #[diagnostic(code(specforge::discovery::generic_version))]
    GenericVersion(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Version(#[from] VersionError),
}

/// Errors from discovering tool information.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum DiscoveryError {
    #[error("failed to read '{}': {message}", path.display())]
    #[diagnostic(code(specforge::discovery::read))]
    Read { path: PathBuf, message: String },

    #[error("failed to run `{command}`: {message}")]
    #[diagnostic(code(specforge::discovery::command))]
    Command { command: String, message: String },

    #[error("'{}' is not absolute", .0.display())]
    #[diagnostic(code(specforge::discovery::relative_path))]
    RelativeToolPath(PathBuf),

    #[error(transparent)]
    #[diagnostic(transparent)]
    VersionInfo(#[from] VersionInfoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Features(#[from] FeaturesError),
}

/// The optional capabilities a tool installation advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFeatures {
    flags: BTreeSet<String>,
}

#[derive(Deserialize)]
struct FeatureSet {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    name: String,
}

impl ToolFeatures {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolFeatures {
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Read a features file of the form `{"features": [{"name": "..."}]}`.
    pub fn load(path: &Path) -> Result<Self, FeaturesError> {
        let content = std::fs::read_to_string(path).map_err(|err| FeaturesError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, FeaturesError> {
        let set: FeatureSet = serde_json::from_str(content).map_err(|err| FeaturesError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self::new(set.features.into_iter().map(|feature| feature.name)))
    }

    /// Keep only flags the caller knows how to use.
    pub fn restricted_to(self, known: &[&str]) -> Self {
        ToolFeatures {
            flags: self
                .flags
                .into_iter()
                .filter(|flag| known.contains(&flag.as_str()))
                .collect(),
        }
    }

    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }
}

static PROJECT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_]+)-([\d.]+)$").unwrap());

static GENERIC_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PROGRAM:(.+)  PROJECT:([A-Za-z0-9_]+)-([\d.]+)$").unwrap()
});

/// `project-1.2.3`, as printed by `tool --version` style queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectVersionInfo {
    pub project: String,
    pub version: Version,
}

impl FromStr for ProjectVersionInfo {
    type Err = VersionInfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = PROJECT_VERSION
            .captures(s)
            .ok_or_else(|| VersionInfoError::ProjectVersion(s.to_string()))?;
        Ok(ProjectVersionInfo {
            project: captures[1].to_string(),
            version: captures[2].parse()?,
        })
    }
}

/// `PROGRAM:name  PROJECT:project-1.2.3`, as embedded in binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericVersionInfo {
    pub program: String,
    pub project: String,
    pub version: Version,
}

impl FromStr for GenericVersionInfo {
    type Err = VersionInfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = GENERIC_VERSION
            .captures(s)
            .ok_or_else(|| VersionInfoError::GenericVersion(s.to_string()))?;
        Ok(GenericVersionInfo {
            program: captures[1].to_string(),
            project: captures[2].to_string(),
            version: captures[3].parse()?,
        })
    }
}

/// What is known about one tool installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredToolInfo {
    pub tool_path: PathBuf,
    pub tool_version: Option<Version>,
    pub features: ToolFeatures,
}

impl DiscoveredToolInfo {
    pub fn new(tool_path: impl Into<PathBuf>) -> Self {
        DiscoveredToolInfo {
            tool_path: tool_path.into(),
            tool_version: None,
            features: ToolFeatures::none(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.tool_version = Some(version);
        self
    }

    pub fn with_features(mut self, features: ToolFeatures) -> Self {
        self.features = features;
        self
    }
}

impl BuildOptionGenerationContext for DiscoveredToolInfo {
    fn tool_version(&self) -> Option<&Version> {
        self.tool_version.as_ref()
    }

    fn has_feature(&self, flag: &str) -> bool {
        self.features.has(flag)
    }
}

/// What a discovery result is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscoveryKey {
    FilePath(PathBuf),
    CommandLine(Vec<String>),
}

impl fmt::Display for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryKey::FilePath(path) => write!(f, "{}", path.display()),
            DiscoveryKey::CommandLine(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

type Slot<T> = Arc<OnceLock<Result<T, DiscoveryError>>>;

/// Single-flight cache of discovery results.
///
/// The first caller for a key computes the result; concurrent callers for
/// the same key block until it is ready, and later callers get the stored
/// result, failures included.
pub struct DiscoveredInfoCache<T> {
    slots: Mutex<HashMap<DiscoveryKey, Slot<T>>>,
}

impl<T> Default for DiscoveredInfoCache<T> {
    fn default() -> Self {
        DiscoveredInfoCache {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> DiscoveredInfoCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &DiscoveryKey) -> Slot<T> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// The cached result for `key`, computing it with `compute` if absent.
    pub fn get_or_compute(
        &self,
        key: DiscoveryKey,
        compute: impl FnOnce() -> Result<T, DiscoveryError>,
    ) -> Result<T, DiscoveryError> {
        let slot = self.slot(&key);
        slot.get_or_init(|| {
            tracing::debug!(%key, "discovering tool info");
            compute()
        })
        .clone()
    }

    /// Read `path` once and derive a result from its contents.
    pub fn run_file(
        &self,
        path: &Path,
        process: impl FnOnce(&str) -> Result<T, DiscoveryError>,
    ) -> Result<T, DiscoveryError> {
        self.get_or_compute(DiscoveryKey::FilePath(path.to_path_buf()), || {
            let content = std::fs::read_to_string(path).map_err(|err| DiscoveryError::Read {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            process(&content)
        })
    }

    /// Run `argv` once and derive a result from its standard output.
    pub fn run_command(
        &self,
        argv: &[String],
        process: impl FnOnce(&str) -> Result<T, DiscoveryError>,
    ) -> Result<T, DiscoveryError> {
        self.get_or_compute(DiscoveryKey::CommandLine(argv.to_vec()), || {
            let command_error = |err: anyhow::Error| DiscoveryError::Command {
                command: argv.join(" "),
                message: format!("{:#}", err),
            };
            let stdout = ProcessBuilder::from_argv(argv)
                .and_then(|builder| builder.exec_stdout())
                .map_err(command_error)?;
            process(&stdout)
        })
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `argv` and parse its trimmed output as `project-version`.
pub fn parse_project_version_info<T: Clone>(
    cache: &DiscoveredInfoCache<T>,
    argv: &[String],
    construct: impl FnOnce(ProjectVersionInfo) -> T,
) -> Result<T, DiscoveryError> {
    cache.run_command(argv, |stdout| {
        let info: ProjectVersionInfo = stdout.trim().parse()?;
        Ok(construct(info))
    })
}

/// Run `what -q` on `tool_path` and parse the embedded version string.
///
/// Multi-architecture binaries print the string once per slice; identical
/// lines are collapsed.
pub fn parse_what_style_version_info<T: Clone>(
    cache: &DiscoveredInfoCache<T>,
    tool_path: &Path,
    construct: impl FnOnce(GenericVersionInfo) -> T,
) -> Result<T, DiscoveryError> {
    if !tool_path.is_absolute() {
        return Err(DiscoveryError::RelativeToolPath(tool_path.to_path_buf()));
    }
    let argv = vec![
        "/usr/bin/what".to_string(),
        "-q".to_string(),
        tool_path.to_string_lossy().into_owned(),
    ];
    cache.run_command(&argv, |stdout| {
        let info: GenericVersionInfo = single_line(stdout.trim()).parse()?;
        Ok(construct(info))
    })
}

/// The only distinct line of `output`, or all of it.
fn single_line(output: &str) -> &str {
    let lines: BTreeSet<&str> = output.lines().collect();
    match lines.len() {
        1 => lines.into_iter().next().unwrap_or(output),
        _ => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_project_version_info() {
        let info: ProjectVersionInfo = "ld64-907.1".parse().unwrap();
        assert_eq!(info.project, "ld64");
        assert_eq!(info.version, Version::new([907, 1]));
        assert!(matches!(
            "not a version".parse::<ProjectVersionInfo>(),
            Err(VersionInfoError::ProjectVersion(_))
        ));
    }

    #[test]
    fn test_generic_version_info() {
        let info: GenericVersionInfo = "PROGRAM:ld  PROJECT:ld64-1015.7".parse().unwrap();
        assert_eq!(info.program, "ld");
        assert_eq!(info.project, "ld64");
        assert_eq!(info.version, Version::new([1015, 7]));
        assert!("PROGRAM:ld PROJECT:ld64-1".parse::<GenericVersionInfo>().is_err());
    }

    #[test]
    fn test_single_line_collapses_duplicates() {
        assert_eq!(single_line("a\na"), "a");
        assert_eq!(single_line("a\nb"), "a\nb");
    }

    #[test]
    fn test_features_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("features.json");
        std::fs::write(&path, r#"{"features": [{"name": "fancy"}, {"name": "plain"}]}"#).unwrap();

        let features = ToolFeatures::load(&path).unwrap();
        assert!(features.has("fancy"));
        assert!(!features.has("missing"));
        let restricted = features.restricted_to(&["plain"]);
        assert_eq!(restricted.iter().collect::<Vec<_>>(), ["plain"]);

        std::fs::write(&path, r#"{"features": "nope"}"#).unwrap();
        assert!(matches!(ToolFeatures::load(&path), Err(FeaturesError::Parse { .. })));
        assert!(matches!(
            ToolFeatures::load(&tmp.path().join("missing.json")),
            Err(FeaturesError::Read { .. })
        ));
    }

    #[test]
    fn test_tool_info_context() {
        let info = DiscoveredToolInfo::new("/usr/bin/cc")
            .with_version(Version::new([15, 0]))
            .with_features(ToolFeatures::new(["fancy"]));
        assert_eq!(info.tool_version(), Some(&Version::new([15])));
        assert!(info.has_feature("fancy"));
        assert!(!info.has_feature("plain"));
    }

    #[test]
    fn test_cache_computes_once_per_key() {
        let cache: DiscoveredInfoCache<usize> = DiscoveredInfoCache::new();
        let calls = AtomicUsize::new(0);
        let key = DiscoveryKey::CommandLine(vec!["tool".into(), "--version".into()]);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let value = cache.get_or_compute(key.clone(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(42)
                    });
                    assert_eq!(value, Ok(42));
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_keeps_failures() {
        let cache: DiscoveredInfoCache<String> = DiscoveredInfoCache::new();
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing");
        assert!(matches!(cache.run_file(&missing, |s| Ok(s.to_string())), Err(DiscoveryError::Read { .. })));

        std::fs::write(&missing, "now present").unwrap();
        assert!(cache.run_file(&missing, |s| Ok(s.to_string())).is_err());
    }

    #[test]
    fn test_run_file_reads_once() {
        let cache: DiscoveredInfoCache<ToolFeatures> = DiscoveredInfoCache::new();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("features.json");
        std::fs::write(&path, r#"{"features": [{"name": "a"}]}"#).unwrap();

        let parse = |content: &str| -> Result<ToolFeatures, DiscoveryError> {
            Ok(ToolFeatures::parse(&path, content)?)
        };
        assert!(cache.run_file(&path, parse).unwrap().has("a"));
        std::fs::write(&path, r#"{"features": []}"#).unwrap();
        assert!(cache.run_file(&path, parse).unwrap().has("a"));
    }

    #[test]
    fn test_relative_what_path_is_rejected() {
        let cache: DiscoveredInfoCache<Version> = DiscoveredInfoCache::new();
        let result = parse_what_style_version_info(&cache, Path::new("bin/ld"), |info| info.version);
        assert_eq!(result, Err(DiscoveryError::RelativeToolPath(PathBuf::from("bin/ld"))));
        assert!(cache.is_empty());
    }
}

//! Tool version handling.
//!
//! Discovered tool versions are dot-separated numeric components of any
//! length (`1100.0.2.1`), which rules out strict three-part semver.
//! Trailing zero components are insignificant: `15` == `15.0.0`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Errors from parsing versions and building ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum VersionError {
    #[error("invalid version string '{0}'")]
    #[diagnostic(code(specforge::version::invalid))]
    Invalid(String),

    #[error("version range start must be less than or equal to end, but {start} greater than {end}")]
    #[diagnostic(code(specforge::version::inverted_range))]
    InvertedRange { start: String, end: String },
}

/// A numeric, dot-separated version.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    pub fn new(components: impl Into<Vec<u64>>) -> Self {
        Version {
            components: components.into(),
        }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Component `index`, or zero past the end.
    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|c| *c != 0)
            .map_or(0, |i| i + 1);
        &self.components[..len]
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Invalid(s.to_string()));
        }
        let components = s
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::Invalid(s.to_string()))?;
        Ok(Version { components })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

/// A version whose components may be `*`, which match anything.
///
/// `1100.*.2.1` accepts `1100.0.2.1` and `1100.2.2.1` as equal, and orders
/// `1100.3` above itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyVersion {
    components: Vec<Option<u64>>,
}

impl FuzzyVersion {
    /// Compare against a concrete version, skipping wildcard components.
    pub fn compare(&self, version: &Version) -> Ordering {
        let len = self.components.len().max(version.components.len());
        for i in 0..len {
            match self.components.get(i).copied().unwrap_or(Some(0)) {
                None => continue,
                Some(c) => match c.cmp(&version.component(i)) {
                    Ordering::Equal => continue,
                    other => return other,
                },
            }
        }
        Ordering::Equal
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.compare(version) == Ordering::Equal
    }
}

impl FromStr for FuzzyVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Invalid(s.to_string()));
        }
        let components = s
            .split('.')
            .map(|part| {
                if part == "*" {
                    Ok(None)
                } else {
                    part.parse::<u64>().map(Some)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::Invalid(s.to_string()))?;
        Ok(FuzzyVersion { components })
    }
}

impl fmt::Display for FuzzyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .components
            .iter()
            .map(|c| c.map_or_else(|| "*".to_string(), |c| c.to_string()))
            .collect();
        f.write_str(&parts.join("."))
    }
}

/// The lower bound of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeStart {
    Exact(Version),
    Fuzzy(FuzzyVersion),
}

impl RangeStart {
    /// Whether `version` is at or above this bound.
    fn admits(&self, version: &Version) -> bool {
        match self {
            RangeStart::Exact(start) => start <= version,
            RangeStart::Fuzzy(start) => start.compare(version) != Ordering::Greater,
        }
    }
}

impl fmt::Display for RangeStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeStart::Exact(v) => v.fmt(f),
            RangeStart::Fuzzy(v) => v.fmt(f),
        }
    }
}

/// An inclusive version range with an optional upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub start: RangeStart,
    pub end: Option<Version>,
}

impl VersionRange {
    /// A range with no upper bound.
    pub fn from_start(start: Version) -> Self {
        VersionRange {
            start: RangeStart::Exact(start),
            end: None,
        }
    }

    /// A range with a fuzzy lower bound and no upper bound.
    pub fn from_fuzzy_start(start: FuzzyVersion) -> Self {
        VersionRange {
            start: RangeStart::Fuzzy(start),
            end: None,
        }
    }

    /// A closed range; `start` must not exceed `end`.
    pub fn bounded(start: Version, end: Version) -> Result<Self, VersionError> {
        if start > end {
            return Err(VersionError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(VersionRange {
            start: RangeStart::Exact(start),
            end: Some(end),
        })
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.start.admits(version) && self.end.as_ref().map_or(true, |end| version <= end)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "[{}, {}]", self.start, end),
            None => write!(f, "[{}, ...)", self.start),
        }
    }
}

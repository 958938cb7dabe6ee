//! Build-setting assignment tables.
//!
//! Setting names may carry condition suffixes, `NAME[sdk=macosx*][arch=arm64]`.
//! A table keeps one assignment per name-and-conditions key; pushing the
//! same key again replaces the earlier value.

use std::collections::BTreeMap;

use super::expr::{MacroString, MacroStringList};
use super::is_legal_identifier;

/// The right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroValue {
    String(MacroString),
    List(MacroStringList),
}

impl MacroValue {
    /// A string that is never expanded.
    pub fn literal(value: impl Into<String>) -> Self {
        MacroValue::String(MacroString::literal(value))
    }

    /// A list whose items are never expanded.
    pub fn literal_list<S: AsRef<str>>(items: &[S]) -> Self {
        MacroValue::List(MacroStringList::literal(items))
    }

    /// Parse a string expression, keeping malformed text literally.
    pub fn parse_string(text: &str) -> Self {
        MacroValue::String(MacroString::parse(text).unwrap_or_else(|_| MacroString::literal(text)))
    }

    /// Parse list items, keeping malformed items literally.
    pub fn parse_list<S: AsRef<str>>(items: &[S]) -> Self {
        MacroValue::List(
            MacroStringList::from_items(items).unwrap_or_else(|_| MacroStringList::literal(items)),
        )
    }
}

/// One `NAME[cond=pattern]... = value` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroAssignment {
    pub name: String,
    pub conditions: Vec<(String, String)>,
    pub value: MacroValue,
}

impl MacroAssignment {
    pub fn new(name: impl Into<String>, value: MacroValue) -> Self {
        MacroAssignment {
            name: name.into(),
            conditions: Vec::new(),
            value,
        }
    }

    pub fn with_condition(mut self, parameter: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.conditions.push((parameter.into(), pattern.into()));
        self
    }

    /// The table key: the name followed by its condition suffixes.
    pub fn key(&self) -> String {
        let mut key = self.name.clone();
        for (parameter, pattern) in &self.conditions {
            key.push_str(&format!("[{}={}]", parameter, pattern));
        }
        key
    }
}

/// Assignments keyed by name and conditions, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettingsTable {
    assignments: BTreeMap<String, MacroAssignment>,
}

impl BuildSettingsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an assignment; a later push for the same key wins.
    pub fn push(&mut self, assignment: MacroAssignment) {
        self.assignments.insert(assignment.key(), assignment);
    }

    /// The unconditional assignment for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&MacroAssignment> {
        self.assignments.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MacroAssignment> {
        self.assignments.values()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Split `NAME[param=pattern]...` into the name and its conditions.
pub fn parse_setting_name(text: &str) -> Option<(String, Vec<(String, String)>)> {
    let (name, mut rest) = match text.find('[') {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    };
    if !is_legal_identifier(name) {
        return None;
    }

    let mut conditions = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let (parameter, pattern) = inner[..close].split_once('=')?;
        let parameter = parameter.trim();
        if parameter.is_empty() {
            return None;
        }
        conditions.push((parameter.to_string(), pattern.trim().to_string()));
        rest = &inner[close + 1..];
    }

    Some((name.to_string(), conditions))
}

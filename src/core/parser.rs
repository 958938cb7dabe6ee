//! Typed extraction of fields from one raw spec record.
//!
//! Every extractor records a diagnostic and returns a placeholder on bad
//! input instead of failing, so a record with several mistakes still parses
//! to the end and reports all of them at once.

use std::collections::{HashMap, HashSet};

use crate::core::macros::{
    parse_setting_name, BuildSettingsTable, MacroAssignment, MacroNamespace, MacroString,
    MacroStringList, MacroType, MacroValue,
};
use crate::core::plist::{PropertyListDict, PropertyListItem};
use crate::util::Diagnostics;

/// Localized display strings for one spec file.
pub type LocalizedStrings = HashMap<String, String>;

/// Placeholder returned for required values that are missing or malformed.
pub const INVALID: &str = "<invalid>";

/// Keys the registry reads itself; never reported as unused.
const RESERVED_KEYS: &[&str] = &["BasedOn", "Class", "Domain", "Identifier", "Type", "_Domain"];

/// Parser for a single spec record and its `BasedOn` chain.
pub struct SpecParser<'a> {
    identifier: &'a str,
    data: &'a PropertyListDict,
    /// Raw records of the base chain, nearest base first.
    bases: Vec<&'a PropertyListDict>,
    localized: Vec<&'a LocalizedStrings>,
    namespace: &'a MacroNamespace,
    used: HashSet<&'a str>,
    diagnostics: Diagnostics,
}

impl<'a> SpecParser<'a> {
    pub fn new(
        identifier: &'a str,
        data: &'a PropertyListDict,
        namespace: &'a MacroNamespace,
    ) -> Self {
        SpecParser {
            identifier,
            data,
            bases: Vec::new(),
            localized: Vec::new(),
            namespace,
            used: HashSet::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Add the next base record, consulted by inherited lookups.
    pub fn with_base(mut self, data: &'a PropertyListDict) -> Self {
        self.bases.push(data);
        self
    }

    /// Add a localized strings table; earlier tables win.
    pub fn with_localized(mut self, strings: &'a LocalizedStrings) -> Self {
        self.localized.push(strings);
        self
    }

    pub fn identifier(&self) -> &'a str {
        self.identifier
    }

    pub fn namespace(&self) -> &'a MacroNamespace {
        self.namespace
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.error(message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.diagnostics.warning(message);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn localized_string(&self, key: &str) -> Option<String> {
        self.localized.iter().find_map(|table| table.get(key).cloned())
    }

    /// Look up `key`, marking it consumed.
    ///
    /// Inherited lookups fall back to the base chain when this record lacks
    /// the key.
    pub fn parse_object(&mut self, key: &str, inherited: bool) -> Option<&'a PropertyListItem> {
        if let Some((name, value)) = self.data.get_key_value(key) {
            self.used.insert(name.as_str());
            return Some(value);
        }
        if !inherited {
            return None;
        }
        self.bases.iter().copied().find_map(|base| base.get(key))
    }

    pub fn parse_string(&mut self, key: &str) -> Option<String> {
        self.string_from(key, true)
    }

    pub fn parse_own_string(&mut self, key: &str) -> Option<String> {
        self.string_from(key, false)
    }

    fn string_from(&mut self, key: &str, inherited: bool) -> Option<String> {
        match self.parse_object(key, inherited)? {
            PropertyListItem::String(s) => Some(s.clone()),
            other => {
                self.error(format!(
                    "unexpected item: {} while parsing key {} (expected string)",
                    other, key
                ));
                None
            }
        }
    }

    pub fn parse_required_string(&mut self, key: &str) -> String {
        match self.parse_string(key) {
            Some(value) => value,
            None => {
                self.error(format!("missing required value for key: '{}'", key));
                INVALID.to_string()
            }
        }
    }

    pub fn parse_string_list(&mut self, key: &str) -> Option<Vec<String>> {
        self.string_list_from(key, true)
    }

    pub fn parse_own_string_list(&mut self, key: &str) -> Option<Vec<String>> {
        self.string_list_from(key, false)
    }

    fn string_list_from(&mut self, key: &str, inherited: bool) -> Option<Vec<String>> {
        match self.parse_object(key, inherited)? {
            PropertyListItem::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        PropertyListItem::String(s) => s.clone(),
                        other => {
                            self.error(format!(
                                "unexpected array member: {} while parsing key {}",
                                other, key
                            ));
                            INVALID.to_string()
                        }
                    })
                    .collect(),
            ),
            other => {
                self.error(format!(
                    "unexpected item: {} while parsing key {} (expected array of strings)",
                    other, key
                ));
                None
            }
        }
    }

    pub fn parse_required_string_list(&mut self, key: &str) -> Vec<String> {
        match self.parse_string_list(key) {
            Some(values) => values,
            None => {
                self.error(format!("missing required value for key: '{}'", key));
                vec![INVALID.to_string()]
            }
        }
    }

    pub fn parse_bool(&mut self, key: &str) -> Option<bool> {
        let item = self.parse_object(key, true)?;
        match item {
            PropertyListItem::Bool(b) => Some(*b),
            PropertyListItem::String(s) => match s.as_str() {
                "no" | "No" | "NO" | "0" => Some(false),
                "yes" | "Yes" | "YES" | "1" => Some(true),
                _ => {
                    self.invalid_bool(key, item);
                    Some(false)
                }
            },
            _ => {
                self.invalid_bool(key, item);
                Some(false)
            }
        }
    }

    fn invalid_bool(&mut self, key: &str, item: &PropertyListItem) {
        self.error(format!(
            "invalid value: {} for key {} (expected boolean 'YES' or 'NO')",
            item, key
        ));
    }

    pub fn parse_required_bool(&mut self, key: &str) -> bool {
        match self.parse_bool(key) {
            Some(value) => value,
            None => {
                self.error(format!("missing required value for key: '{}'", key));
                false
            }
        }
    }

    /// Parse a macro string expression, keeping malformed text literally.
    pub fn parse_macro_string(&mut self, key: &str) -> Option<MacroString> {
        let text = self.parse_string(key)?;
        Some(self.macro_string(&text, key))
    }

    /// Parse `text` as a macro string, reporting errors against `context`.
    pub fn macro_string(&mut self, text: &str, context: &str) -> MacroString {
        MacroString::parse(text).unwrap_or_else(|err| {
            self.error(format!("macro parsing error in '{}': {}", context, err));
            MacroString::literal(text)
        })
    }

    /// Parse `text` as a shell-quoted macro string list.
    pub fn macro_list(&mut self, text: &str, context: &str) -> MacroStringList {
        MacroStringList::parse(text).unwrap_or_else(|err| {
            self.error(format!("macro parsing error in '{}': {}", context, err));
            MacroStringList::literal(&text.split_whitespace().collect::<Vec<_>>())
        })
    }

    /// Parse array items as a macro string list.
    pub fn macro_list_items<S: AsRef<str>>(&mut self, items: &[S], context: &str) -> MacroStringList {
        MacroStringList::from_items(items).unwrap_or_else(|err| {
            self.error(format!("macro parsing error in '{}': {}", context, err));
            MacroStringList::literal(items)
        })
    }

    /// A value given either as an array of strings or as one shell-quoted string.
    pub fn parse_command_line_string(&mut self, key: &str, inherited: bool) -> Option<Vec<String>> {
        match self.parse_object(key, inherited)? {
            PropertyListItem::Array(_) => self.string_list_from(key, inherited),
            PropertyListItem::String(s) => Some(shlex::split(s).unwrap_or_else(|| {
                self.error(format!("unbalanced quoting in value for key '{}'", key));
                s.split_whitespace().map(str::to_string).collect()
            })),
            other => {
                self.error(format!(
                    "unexpected item: {} while parsing key '{}' (expected string or string list)",
                    other, key
                ));
                None
            }
        }
    }

    /// An array of dictionaries.
    ///
    /// With `allow_unarrayed`, a bare element stands in for a one-element
    /// array; with `implied_key`, a bare string stands in for a dictionary
    /// holding that string under the key.
    pub fn parse_array_of_dicts(
        &mut self,
        key: &str,
        allow_unarrayed: bool,
        implied_key: Option<&str>,
    ) -> Option<Vec<PropertyListDict>> {
        let item = self.parse_object(key, true)?;
        let elements: Vec<&PropertyListItem> = match item {
            PropertyListItem::Array(items) => items.iter().collect(),
            other if allow_unarrayed => vec![other],
            other => {
                self.error(format!(
                    "unexpected item: {} while parsing key '{}' (expected array)",
                    other, key
                ));
                return None;
            }
        };

        let mut result = Vec::with_capacity(elements.len());
        for element in elements {
            match (element, implied_key) {
                (PropertyListItem::Dict(dict), _) => result.push(dict.clone()),
                (PropertyListItem::String(s), Some(implied)) => {
                    let mut dict = PropertyListDict::new();
                    dict.insert(implied.to_string(), PropertyListItem::String(s.clone()));
                    result.push(dict);
                }
                (other, _) => self.error(format!(
                    "unexpected item: {} while parsing elements of key '{}' (expected dictionary)",
                    other, key
                )),
            }
        }
        Some(result)
    }

    /// A dictionary of build settings layered over `base`.
    ///
    /// Not inherited: the caller passes the base spec's already-parsed table.
    /// Entries are applied in key order and a later entry for the same key
    /// replaces an earlier one.
    pub fn parse_build_settings(
        &mut self,
        key: &str,
        base: Option<&BuildSettingsTable>,
    ) -> Option<BuildSettingsTable> {
        let item = self.parse_object(key, false);
        let Some(item) = item else {
            return base.cloned();
        };
        let Some(dict) = item.as_dict() else {
            self.error(format!(
                "unexpected item: {} while parsing key {} (expected dictionary)",
                item, key
            ));
            return base.cloned();
        };

        let mut table = base.cloned().unwrap_or_default();
        for (setting, value) in dict {
            let Some((name, conditions)) = parse_setting_name(setting) else {
                self.error(format!("invalid setting name: '{}'", setting));
                continue;
            };

            let (ty, value) = match value {
                PropertyListItem::Bool(b) => (
                    MacroType::Boolean,
                    MacroValue::literal(if *b { "YES" } else { "NO" }),
                ),
                PropertyListItem::Array(items) => {
                    let strings: Vec<String> = items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                        .collect();
                    (MacroType::StringList, MacroValue::parse_list(&strings))
                }
                PropertyListItem::String(s) => {
                    let ty = self.namespace.lookup(&name).unwrap_or(MacroType::String);
                    let value = if ty.is_list() {
                        MacroValue::List(self.macro_list(s, setting))
                    } else {
                        MacroValue::String(self.macro_string(s, setting))
                    };
                    (ty, value)
                }
                other => {
                    self.error(format!(
                        "unexpected item: {} while parsing build setting {} (expected string)",
                        other, setting
                    ));
                    continue;
                }
            };

            if let Err(err) = self.namespace.declare(&name, ty) {
                self.error(err.to_string());
                continue;
            }

            let mut assignment = MacroAssignment::new(name, value);
            for (parameter, pattern) in conditions {
                assignment = assignment.with_condition(parameter, pattern);
            }
            table.push(assignment);
        }
        Some(table)
    }

    /// Finish parsing: warn about every key of this record never read.
    pub fn complete(mut self) -> Diagnostics {
        let unused: Vec<String> = self
            .data
            .keys()
            .filter(|key| !self.used.contains(key.as_str()) && !RESERVED_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        for key in unused {
            self.warning(format!("unused key '{}'", key));
        }
        self.diagnostics
    }

    /// Diagnostics recorded so far, without the unused-key check.
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}

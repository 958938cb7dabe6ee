//! Evaluation of macro expressions against bound settings.
//!
//! A name resolves through, in order: the caller's [`LookupChain`], the
//! scope's bound values, then declared defaults. Bound values are themselves
//! expressions and are expanded recursively.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use super::condition::MacroCondition;
use super::expr::{MacroString, MacroStringList, Segment};
use super::namespace::{builtin, MacroType};
use super::table::{BuildSettingsTable, MacroValue};

/// Expansion depth at which a reference is treated as cyclic.
const MAX_EXPANSION_DEPTH: usize = 32;

/// Value reported for `CURRENT_ARCH` when nothing binds it.
pub const UNDEFINED_ARCH: &str = "undefined_arch";

/// A concrete setting value supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    String(String),
    List(Vec<String>),
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        SettingValue::List(value)
    }
}

impl From<&[&str]> for SettingValue {
    fn from(value: &[&str]) -> Self {
        SettingValue::List(value.iter().map(|s| s.to_string()).collect())
    }
}

/// The closed set of evaluation results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluatedValue {
    Boolean(bool),
    String(String),
    List(Vec<String>),
}

/// Whether a string spells a true boolean.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim(),
        "YES" | "Yes" | "yes" | "TRUE" | "True" | "true" | "1"
    )
}

/// A strategy consulted before the scope's own values.
pub trait MacroLookup {
    fn lookup(&self, name: &str) -> Option<MacroValue>;
}

impl<F> MacroLookup for F
where
    F: Fn(&str) -> Option<MacroValue>,
{
    fn lookup(&self, name: &str) -> Option<MacroValue> {
        self(name)
    }
}

impl MacroLookup for HashMap<String, MacroValue> {
    fn lookup(&self, name: &str) -> Option<MacroValue> {
        self.get(name).cloned()
    }
}

/// Binds `$(value)` to one concrete string.
#[derive(Debug, Clone)]
pub struct ValueBinding(pub String);

impl MacroLookup for ValueBinding {
    fn lookup(&self, name: &str) -> Option<MacroValue> {
        (name == builtin::VALUE).then(|| MacroValue::literal(self.0.clone()))
    }
}

/// An ordered list of lookup strategies; the first hit wins.
#[derive(Clone, Default)]
pub struct LookupChain<'a> {
    strategies: Vec<&'a dyn MacroLookup>,
}

impl<'a> LookupChain<'a> {
    /// A chain with no strategies.
    pub fn new() -> Self {
        LookupChain {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy, consulted after the existing ones.
    pub fn then(mut self, strategy: &'a dyn MacroLookup) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// A copy of this chain with `strategy` consulted first.
    pub fn preceded_by(&self, strategy: &'a dyn MacroLookup) -> LookupChain<'a> {
        let mut strategies = Vec::with_capacity(self.strategies.len() + 1);
        strategies.push(strategy);
        strategies.extend(self.strategies.iter().copied());
        LookupChain { strategies }
    }

    pub fn lookup(&self, name: &str) -> Option<MacroValue> {
        self.strategies.iter().find_map(|s| s.lookup(name))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for LookupChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LookupChain({} strategies)", self.strategies.len())
    }
}

/// Bound settings plus defaults, the context expressions evaluate in.
#[derive(Debug, Clone, Default)]
pub struct MacroScope {
    values: HashMap<String, MacroValue>,
    defaults: HashMap<String, MacroValue>,
    parameters: HashMap<String, String>,
}

impl MacroScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a setting, parsing it as an expression.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<SettingValue>) {
        let value = match value.into() {
            SettingValue::String(s) => MacroValue::parse_string(&s),
            SettingValue::List(items) => MacroValue::parse_list(&items),
        };
        self.values.insert(name.into(), value);
    }

    /// Builder form of [`MacroScope::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Bind an already-parsed expression.
    pub fn set_expr(&mut self, name: impl Into<String>, value: MacroValue) {
        self.values.insert(name.into(), value);
    }

    /// Register a fallback used when `name` is not bound.
    pub fn set_default(&mut self, name: impl Into<String>, value: MacroValue) {
        self.defaults.insert(name.into(), value);
    }

    /// Register many defaults; later entries replace earlier ones.
    pub fn extend_defaults(&mut self, defaults: impl IntoIterator<Item = (String, MacroValue)>) {
        self.defaults.extend(defaults);
    }

    /// Set a condition parameter (`sdk`, `arch`, `config`) for tables.
    pub fn set_parameter(&mut self, parameter: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(parameter.into(), value.into());
    }

    /// Apply every assignment whose conditions match this scope.
    pub fn push_table(&mut self, table: &BuildSettingsTable) {
        for assignment in table.iter() {
            let applies = assignment.conditions.iter().all(|(parameter, pattern)| {
                self.parameters.get(parameter).is_some_and(|value| {
                    glob::Pattern::new(pattern)
                        .map(|p| p.matches(value))
                        .unwrap_or(pattern == value)
                })
            });
            if applies {
                self.values
                    .insert(assignment.name.clone(), assignment.value.clone());
            }
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The current architecture, or `undefined_arch`.
    pub fn current_arch(&self) -> String {
        let arch = self.lookup_string(builtin::CURRENT_ARCH, &LookupChain::new());
        if arch.is_empty() {
            UNDEFINED_ARCH.to_string()
        } else {
            arch
        }
    }

    pub fn evaluate_string(&self, expr: &MacroString, chain: &LookupChain<'_>) -> String {
        self.eval_string_expr(expr, chain, 0)
    }

    pub fn evaluate_list(&self, expr: &MacroStringList, chain: &LookupChain<'_>) -> Vec<String> {
        self.eval_list_expr(expr, chain, 0)
    }

    pub fn evaluate_condition(&self, condition: &MacroCondition, chain: &LookupChain<'_>) -> bool {
        match condition {
            MacroCondition::Truthy(expr) => is_truthy(&self.evaluate_string(expr, chain)),
            MacroCondition::Equal(lhs, rhs) => {
                self.evaluate_string(lhs, chain) == self.evaluate_string(rhs, chain)
            }
            MacroCondition::NotEqual(lhs, rhs) => {
                self.evaluate_string(lhs, chain) != self.evaluate_string(rhs, chain)
            }
            MacroCondition::Not(inner) => !self.evaluate_condition(inner, chain),
            MacroCondition::And(lhs, rhs) => {
                self.evaluate_condition(lhs, chain) && self.evaluate_condition(rhs, chain)
            }
            MacroCondition::Or(lhs, rhs) => {
                self.evaluate_condition(lhs, chain) || self.evaluate_condition(rhs, chain)
            }
        }
    }

    /// Evaluate a named setting as a string; lists are space-joined.
    pub fn lookup_string(&self, name: &str, chain: &LookupChain<'_>) -> String {
        self.eval_named_string(name, chain, 0)
    }

    /// Evaluate a named setting as a list; strings are shell-split.
    pub fn lookup_list(&self, name: &str, chain: &LookupChain<'_>) -> Vec<String> {
        self.eval_named_list(name, chain, 0)
    }

    pub fn lookup_bool(&self, name: &str, chain: &LookupChain<'_>) -> bool {
        is_truthy(&self.lookup_string(name, chain))
    }

    /// Evaluate a named setting according to its declared type.
    pub fn evaluate_setting(
        &self,
        name: &str,
        ty: MacroType,
        chain: &LookupChain<'_>,
    ) -> EvaluatedValue {
        match ty {
            MacroType::Boolean => EvaluatedValue::Boolean(self.lookup_bool(name, chain)),
            MacroType::String | MacroType::Path => {
                EvaluatedValue::String(self.lookup_string(name, chain))
            }
            MacroType::StringList | MacroType::PathList => {
                EvaluatedValue::List(self.lookup_list(name, chain))
            }
        }
    }

    /// Every bound setting evaluated to a string, sorted by name.
    pub fn bound_settings(&self, chain: &LookupChain<'_>) -> BTreeMap<String, String> {
        self.values
            .keys()
            .map(|name| (name.clone(), self.lookup_string(name, chain)))
            .collect()
    }

    fn resolve<'s>(&'s self, name: &str, chain: &LookupChain<'_>) -> Option<Cow<'s, MacroValue>> {
        if let Some(value) = chain.lookup(name) {
            return Some(Cow::Owned(value));
        }
        self.values
            .get(name)
            .or_else(|| self.defaults.get(name))
            .map(Cow::Borrowed)
    }

    fn eval_string_expr(&self, expr: &MacroString, chain: &LookupChain<'_>, depth: usize) -> String {
        let mut result = String::new();
        for segment in expr.segments() {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Reference(name) => {
                    result.push_str(&self.eval_named_string(name, chain, depth + 1))
                }
            }
        }
        result
    }

    fn eval_list_expr(
        &self,
        expr: &MacroStringList,
        chain: &LookupChain<'_>,
        depth: usize,
    ) -> Vec<String> {
        let mut result = Vec::new();
        for item in expr.items() {
            match item.single_reference() {
                Some(name) => {
                    if depth >= MAX_EXPANSION_DEPTH {
                        tracing::debug!("macro expansion too deep at '{}'", name);
                        continue;
                    }
                    match self.resolve(name, chain).as_deref() {
                        Some(MacroValue::List(list)) => {
                            result.extend(self.eval_list_expr(list, chain, depth + 1))
                        }
                        Some(MacroValue::String(expr)) => {
                            let value = self.eval_string_expr(expr, chain, depth + 1);
                            if !value.is_empty() {
                                result.push(value);
                            }
                        }
                        None => {}
                    }
                }
                None => result.push(self.eval_string_expr(item, chain, depth)),
            }
        }
        result
    }

    fn eval_named_string(&self, name: &str, chain: &LookupChain<'_>, depth: usize) -> String {
        if depth >= MAX_EXPANSION_DEPTH {
            tracing::debug!("macro expansion too deep at '{}'", name);
            return String::new();
        }
        match self.resolve(name, chain).as_deref() {
            Some(MacroValue::String(expr)) => self.eval_string_expr(expr, chain, depth),
            Some(MacroValue::List(list)) => self.eval_list_expr(list, chain, depth).join(" "),
            None => String::new(),
        }
    }

    fn eval_named_list(&self, name: &str, chain: &LookupChain<'_>, depth: usize) -> Vec<String> {
        match self.resolve(name, chain).as_deref() {
            Some(MacroValue::List(list)) => self.eval_list_expr(list, chain, depth),
            Some(MacroValue::String(expr)) => {
                let value = self.eval_string_expr(expr, chain, depth);
                shlex::split(&value)
                    .unwrap_or_else(|| value.split_whitespace().map(str::to_string).collect())
            }
            None => Vec::new(),
        }
    }
}

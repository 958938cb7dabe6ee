//! The macro language build settings and spec templates are written in.

pub mod condition;
pub mod expr;
pub mod namespace;
pub mod scope;
pub mod table;

pub use condition::MacroCondition;
pub use expr::{MacroParseError, MacroString, MacroStringList, Segment};
pub use namespace::{builtin, MacroDeclarationError, MacroNamespace, MacroType};
pub use scope::{
    is_truthy, EvaluatedValue, LookupChain, MacroLookup, MacroScope, SettingValue, ValueBinding,
};
pub use table::{parse_setting_name, BuildSettingsTable, MacroAssignment, MacroValue};

/// Whether `name` can be used as a macro name.
pub fn is_legal_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

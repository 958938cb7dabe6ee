//! Declared types of build options.

use std::fmt;

use crate::core::macros::MacroType;

/// The type a build option declares with its `Type` key.
///
/// Several domain-specific names are aliases for a string or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildOptionType {
    Boolean,
    String,
    StringList,
    Path,
    PathList,
    Enumeration,
    CodeSignIdentity,
    CodeSignStyle,
    CompilerVersion,
    DevelopmentTeam,
    ProvisioningProfile,
    ProvisioningProfileSpecifier,
    OpenCLArchitectures,
}

/// How an option's value is evaluated and expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Boolean,
    Scalar,
    List,
}

impl BuildOptionType {
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" | "Bool" | "boolean" | "Boolean" => BuildOptionType::Boolean,
            "enum" | "Enumeration" => BuildOptionType::Enumeration,
            "string" | "String" => BuildOptionType::String,
            "stringlist" | "StringList" => BuildOptionType::StringList,
            "path" | "Path" => BuildOptionType::Path,
            "pathlist" | "PathList" => BuildOptionType::PathList,
            "CodeSignIdentity" => BuildOptionType::CodeSignIdentity,
            "CodeSignStyle" => BuildOptionType::CodeSignStyle,
            "CompilerVersion" => BuildOptionType::CompilerVersion,
            "DevelopmentTeam" => BuildOptionType::DevelopmentTeam,
            "ProvisioningProfile" => BuildOptionType::ProvisioningProfile,
            "ProvisioningProfileSpecifier" => BuildOptionType::ProvisioningProfileSpecifier,
            "OpenCLArchitectures" => BuildOptionType::OpenCLArchitectures,
            _ => return None,
        };
        Some(ty)
    }

    /// The canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildOptionType::Boolean => "Boolean",
            BuildOptionType::String => "String",
            BuildOptionType::StringList => "StringList",
            BuildOptionType::Path => "Path",
            BuildOptionType::PathList => "PathList",
            BuildOptionType::Enumeration => "Enumeration",
            BuildOptionType::CodeSignIdentity => "CodeSignIdentity",
            BuildOptionType::CodeSignStyle => "CodeSignStyle",
            BuildOptionType::CompilerVersion => "CompilerVersion",
            BuildOptionType::DevelopmentTeam => "DevelopmentTeam",
            BuildOptionType::ProvisioningProfile => "ProvisioningProfile",
            BuildOptionType::ProvisioningProfileSpecifier => "ProvisioningProfileSpecifier",
            BuildOptionType::OpenCLArchitectures => "OpenCLArchitectures",
        }
    }

    /// The macro type the option's setting is declared with.
    pub fn macro_type(&self) -> MacroType {
        match self {
            BuildOptionType::Boolean => MacroType::Boolean,
            BuildOptionType::StringList | BuildOptionType::OpenCLArchitectures => {
                MacroType::StringList
            }
            BuildOptionType::Path => MacroType::Path,
            BuildOptionType::PathList => MacroType::PathList,
            _ => MacroType::String,
        }
    }

    /// The type an undeclared option gets from an existing macro declaration.
    pub fn from_macro_type(ty: MacroType) -> Self {
        match ty {
            MacroType::Boolean => BuildOptionType::Boolean,
            MacroType::String => BuildOptionType::String,
            MacroType::StringList => BuildOptionType::StringList,
            MacroType::Path => BuildOptionType::Path,
            MacroType::PathList => BuildOptionType::PathList,
        }
    }

    pub fn kind(&self) -> OptionKind {
        match self.macro_type() {
            MacroType::Boolean => OptionKind::Boolean,
            MacroType::StringList | MacroType::PathList => OptionKind::List,
            MacroType::String | MacroType::Path => OptionKind::Scalar,
        }
    }

    pub fn is_list(&self) -> bool {
        self.kind() == OptionKind::List
    }

    /// Whether values should be passed as path arguments.
    pub fn is_path(&self) -> bool {
        matches!(self, BuildOptionType::Path | BuildOptionType::PathList)
    }

    /// Whether the type accepts a `Values` table.
    pub fn supports_values(&self) -> bool {
        matches!(
            self,
            BuildOptionType::Boolean | BuildOptionType::Enumeration | BuildOptionType::CodeSignStyle
        )
    }
}

impl fmt::Display for BuildOptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

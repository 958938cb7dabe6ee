//! Loaded, strongly typed specs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::property_domain::PropertyDomainSpec;
use crate::builder::tool::CommandLineToolSpec;
use crate::core::build_system::BuildSystemSpec;
use crate::core::file_type::FileTypeSpec;
use crate::core::parser::{LocalizedStrings, SpecParser};

/// The kind of a spec, selected by its `Type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecType {
    Tool,
    Compiler,
    Linker,
    BuildSystem,
    FileType,
}

impl SpecType {
    pub const ALL: [SpecType; 5] = [
        SpecType::Tool,
        SpecType::Compiler,
        SpecType::Linker,
        SpecType::BuildSystem,
        SpecType::FileType,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        SpecType::ALL.into_iter().find(|ty| ty.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecType::Tool => "Tool",
            SpecType::Compiler => "Compiler",
            SpecType::Linker => "Linker",
            SpecType::BuildSystem => "BuildSystem",
            SpecType::FileType => "FileType",
        }
    }

    /// Name of the table lookups by kind search.
    pub fn subregistry(&self) -> &'static str {
        self.as_str()
    }

    /// Whether specs of this kind construct command-line tasks.
    pub fn is_tool(&self) -> bool {
        matches!(self, SpecType::Tool | SpecType::Compiler | SpecType::Linker)
    }

    /// Implementation used when neither the spec nor its bases name one.
    pub fn default_class(&self) -> Option<SpecClass> {
        self.is_tool().then_some(SpecClass::GenericCommandLineTool)
    }
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implementation selected for a tool spec by its `Class` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecClass {
    /// Templates, outputs and environment all come from the record.
    GenericCommandLineTool,
    /// Only options are read from the record; templates are supplied in code.
    CommandLineTool,
    /// Generic, with shell-script output scraping.
    ShellScriptTool,
}

impl SpecClass {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GenericCommandLineTool" => Some(SpecClass::GenericCommandLineTool),
            "CommandLineTool" => Some(SpecClass::CommandLineTool),
            "ShellScriptTool" => Some(SpecClass::ShellScriptTool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecClass::GenericCommandLineTool => "GenericCommandLineTool",
            SpecClass::CommandLineTool => "CommandLineTool",
            SpecClass::ShellScriptTool => "ShellScriptTool",
        }
    }

    pub fn is_generic(&self) -> bool {
        !matches!(self, SpecClass::CommandLineTool)
    }

    /// Class implied by a well-known identifier.
    pub fn for_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "org.specforge.tools.shell-script" => Some(SpecClass::ShellScriptTool),
            _ => None,
        }
    }
}

impl fmt::Display for SpecClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific contents of a spec.
#[derive(Debug)]
pub enum SpecKind {
    Tool(CommandLineToolSpec),
    BuildSystem(BuildSystemSpec),
    FileType(FileTypeSpec),
}

/// A loaded spec.
#[derive(Debug)]
pub struct Spec {
    pub identifier: String,
    pub domain: String,
    pub ty: SpecType,
    pub class: Option<SpecClass>,
    pub path: PathBuf,
    pub name: Option<String>,
    pub description: Option<String>,
    pub base: Option<Arc<Spec>>,
    localized: Option<Arc<LocalizedStrings>>,
    pub kind: SpecKind,
}

/// Identity of a spec being parsed.
#[derive(Debug, Clone)]
pub struct SpecHeader {
    pub identifier: String,
    pub domain: String,
    pub ty: SpecType,
    pub class: Option<SpecClass>,
    pub path: PathBuf,
    pub localized: Option<Arc<LocalizedStrings>>,
}

impl Spec {
    /// Parse the kind-specific body and the common keys of a record.
    pub fn parse(parser: &mut SpecParser<'_>, header: SpecHeader, base: Option<Arc<Spec>>) -> Spec {
        let kind = match header.ty {
            SpecType::Tool | SpecType::Compiler | SpecType::Linker => {
                let class = header.class.unwrap_or(SpecClass::GenericCommandLineTool);
                SpecKind::Tool(CommandLineToolSpec::parse(
                    parser,
                    &header.identifier,
                    class,
                    base.clone(),
                ))
            }
            SpecType::BuildSystem => SpecKind::BuildSystem(BuildSystemSpec::parse(parser, base.clone())),
            SpecType::FileType => SpecKind::FileType(FileTypeSpec::parse(parser)),
        };

        let name = parser.parse_own_string("Name");
        let description = parser.parse_own_string("Description");
        // Informational only.
        parser.parse_own_string("Vendor");
        parser.parse_own_string("Version");

        Spec {
            identifier: header.identifier,
            domain: header.domain,
            ty: header.ty,
            class: header.class,
            path: header.path,
            name,
            description,
            base,
            localized: header.localized,
            kind,
        }
    }

    /// A spec built in code rather than read from a file.
    pub fn builtin(identifier: impl Into<String>, ty: SpecType, kind: SpecKind) -> Spec {
        Spec {
            identifier: identifier.into(),
            domain: String::new(),
            ty,
            class: match kind {
                SpecKind::Tool(_) => Some(SpecClass::CommandLineTool),
                _ => None,
            },
            path: PathBuf::from("<builtin>"),
            name: None,
            description: None,
            base: None,
            localized: None,
            kind,
        }
    }

    /// `domain:identifier`.
    pub fn specifier(&self) -> String {
        format!("{}:{}", self.domain, self.identifier)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// This spec followed by its bases, nearest first.
    pub fn base_chain(&self) -> impl Iterator<Item = &Spec> {
        std::iter::successors(Some(self), |spec| spec.base.as_deref())
    }

    /// A localized string from this spec's table or the nearest base with one.
    pub fn localized_string(&self, key: &str) -> Option<&str> {
        self.base_chain()
            .filter_map(|spec| spec.localized.as_deref())
            .find_map(|table| table.get(key).map(String::as_str))
    }

    pub fn as_tool(&self) -> Option<&CommandLineToolSpec> {
        match &self.kind {
            SpecKind::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn as_build_system(&self) -> Option<&BuildSystemSpec> {
        match &self.kind {
            SpecKind::BuildSystem(build_system) => Some(build_system),
            _ => None,
        }
    }

    pub fn as_file_type(&self) -> Option<&FileTypeSpec> {
        match &self.kind {
            SpecKind::FileType(file_type) => Some(file_type),
            _ => None,
        }
    }

    /// The build options table, for kinds that carry one.
    pub fn property_domain(&self) -> Option<&PropertyDomainSpec> {
        match &self.kind {
            SpecKind::Tool(tool) => Some(&tool.options),
            SpecKind::BuildSystem(build_system) => Some(&build_system.options),
            SpecKind::FileType(_) => None,
        }
    }

    /// Whether this spec is, or is based on, the spec named `identifier`.
    pub fn conforms_to(&self, identifier: &str) -> bool {
        self.base_chain().any(|spec| spec.identifier == identifier)
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.specifier(), self.ty)
    }
}

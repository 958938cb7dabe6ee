//! Per-invocation context for task construction.
//!
//! A [`CommandProducer`] answers questions about the surrounding build
//! (file types, search paths, working directory); a
//! [`CommandBuildContext`] carries the inputs and outputs of one task.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use walkdir::WalkDir;

use crate::builder::task::PlannedNode;
use crate::core::macros::{MacroScope, MacroStringList};
use crate::core::registry::SpecRegistry;
use crate::core::spec::Spec;
use crate::util::version::Version;

/// Suffix marking a search path whose subdirectories are searched too.
pub const RECURSIVE_SEARCH_SUFFIX: &str = "/**";

/// One argument of a constructed command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandLineArgument {
    Literal(String),
    Path(PathBuf),
    /// A flag and its value passed as a single token, `-Lfoo`.
    Joined { flag: String, value: String },
}

impl CommandLineArgument {
    pub fn literal(value: impl Into<String>) -> Self {
        CommandLineArgument::Literal(value.into())
    }

    pub fn path(value: impl Into<PathBuf>) -> Self {
        CommandLineArgument::Path(value.into())
    }

    /// The argument as it is passed to the process.
    pub fn as_string(&self) -> String {
        match self {
            CommandLineArgument::Literal(value) => value.clone(),
            CommandLineArgument::Path(path) => path.to_string_lossy().into_owned(),
            CommandLineArgument::Joined { flag, value } => format!("{}{}", flag, value),
        }
    }
}

impl fmt::Display for CommandLineArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// What a discovered tool installation reports about itself.
pub trait BuildOptionGenerationContext {
    /// The tool's version, if it could be determined.
    fn tool_version(&self) -> Option<&Version>;

    fn has_feature(&self, flag: &str) -> bool;
}

/// The build-wide services task construction relies on.
pub trait CommandProducer: Sync {
    /// Resolve a file type by identifier.
    fn lookup_file_type(&self, identifier: &str) -> Option<Arc<Spec>>;

    /// The file type of a path, inferred from its name.
    fn file_type_for_path(&self, _path: &Path) -> Option<Arc<Spec>> {
        None
    }

    /// Directories searched for tool executables before `PATH`.
    fn executable_search_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn default_working_directory(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Expand `dir/**` entries into the directory and all its subdirectories.
    fn expanded_search_paths(&self, paths: &[String], _scope: &MacroScope) -> Vec<String> {
        expand_recursive_search_paths(paths)
    }
}

/// Expand every `dir/**` entry into `dir` followed by its subdirectories in
/// sorted order. Other entries pass through unchanged.
pub fn expand_recursive_search_paths(paths: &[String]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(base) = path.strip_suffix(RECURSIVE_SEARCH_SUFFIX) else {
            expanded.push(path.clone());
            continue;
        };
        expanded.push(base.to_string());
        let subdirectories = WalkDir::new(base)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.path().to_string_lossy().into_owned());
        expanded.extend(subdirectories);
    }
    expanded
}

/// A producer backed by a frozen registry.
pub struct RegistryProducer {
    registry: Arc<SpecRegistry>,
    domain: String,
    executable_search_paths: Vec<PathBuf>,
    working_directory: Option<PathBuf>,
}

impl RegistryProducer {
    pub fn new(registry: Arc<SpecRegistry>, domain: impl Into<String>) -> Self {
        RegistryProducer {
            registry,
            domain: domain.into(),
            executable_search_paths: Vec::new(),
            working_directory: None,
        }
    }

    pub fn with_executable_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.executable_search_paths = paths;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// A file to build, typed by its name through the registry.
    pub fn file_to_build(&self, path: impl Into<PathBuf>) -> FileToBuild {
        let path = path.into();
        FileToBuild {
            file_type: self.file_type_for_path(&path),
            ..FileToBuild::new(path)
        }
    }
}

impl CommandProducer for RegistryProducer {
    fn lookup_file_type(&self, identifier: &str) -> Option<Arc<Spec>> {
        self.registry.get_file_type(identifier, &self.domain).ok()
    }

    fn file_type_for_path(&self, path: &Path) -> Option<Arc<Spec>> {
        let name = path.file_name()?.to_str()?;
        self.registry.lookup_file_type_by_name(name, &self.domain)
    }

    fn executable_search_paths(&self) -> Vec<PathBuf> {
        self.executable_search_paths.clone()
    }

    fn default_working_directory(&self) -> PathBuf {
        match &self.working_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// An input of a task.
#[derive(Debug, Clone)]
pub struct FileToBuild {
    pub path: PathBuf,
    pub file_type: Option<Arc<Spec>>,
    /// Localization region, such as `en`.
    pub region: Option<String>,
    /// Per-file flags, bound to `build_file_compiler_flags`.
    pub additional_args: Option<MacroStringList>,
}

impl FileToBuild {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileToBuild {
            path: path.into(),
            file_type: None,
            region: None,
            additional_args: None,
        }
    }

    pub fn with_file_type(mut self, file_type: Arc<Spec>) -> Self {
        self.file_type = Some(file_type);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `en.lproj/` for a file in the `en` region, otherwise empty.
    pub fn region_path_component(&self) -> String {
        self.region
            .as_deref()
            .map(|region| format!("{}.lproj/", region))
            .unwrap_or_default()
    }
}

/// Everything a tool spec needs to construct one task.
pub struct CommandBuildContext<'a> {
    pub producer: &'a dyn CommandProducer,
    pub scope: &'a MacroScope,
    pub inputs: Vec<FileToBuild>,
    /// Outputs proposed by the caller; the spec's own outputs take precedence.
    pub outputs: Vec<PathBuf>,
    pub resources_dir: Option<PathBuf>,
    pub tmp_resources_dir: Option<PathBuf>,
    pub unlocalized_resources_dir: Option<PathBuf>,
    /// Virtual nodes that order tasks writing the same path.
    pub command_ordering_inputs: Vec<PlannedNode>,
    pub command_ordering_outputs: Vec<PlannedNode>,
    pub tool_info: Option<&'a dyn BuildOptionGenerationContext>,
}

impl<'a> CommandBuildContext<'a> {
    pub fn new(producer: &'a dyn CommandProducer, scope: &'a MacroScope) -> Self {
        CommandBuildContext {
            producer,
            scope,
            inputs: Vec::new(),
            outputs: Vec::new(),
            resources_dir: None,
            tmp_resources_dir: None,
            unlocalized_resources_dir: None,
            command_ordering_inputs: Vec::new(),
            command_ordering_outputs: Vec::new(),
            tool_info: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<FileToBuild>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_tool_info(mut self, info: &'a dyn BuildOptionGenerationContext) -> Self {
        self.tool_info = Some(info);
        self
    }

    /// The file type of the first input, which gates file-type filtered options.
    pub fn primary_input_type(&self) -> Option<&Spec> {
        self.inputs.first().and_then(|input| input.file_type.as_deref())
    }
}

impl fmt::Debug for CommandBuildContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuildContext")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("resources_dir", &self.resources_dir)
            .field("tool_info", &self.tool_info.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_argument_strings() {
        assert_eq!(CommandLineArgument::literal("-c").as_string(), "-c");
        assert_eq!(CommandLineArgument::path("/a/b").as_string(), "/a/b");
        let joined = CommandLineArgument::Joined {
            flag: "-L".into(),
            value: "/lib".into(),
        };
        assert_eq!(joined.to_string(), "-L/lib");
    }

    #[test]
    fn test_expand_recursive_search_paths() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("b/inner")).unwrap();
        std::fs::create_dir_all(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("file.txt"), "").unwrap();

        let root = tmp.path().to_string_lossy().into_owned();
        let expanded = expand_recursive_search_paths(&[
            format!("{}/**", root),
            "/plain".to_string(),
        ]);
        assert_eq!(
            expanded,
            vec![
                root.clone(),
                format!("{}/a", root),
                format!("{}/b", root),
                format!("{}/b/inner", root),
                "/plain".to_string(),
            ]
        );
    }

    #[test]
    fn test_region_path_component() {
        assert_eq!(FileToBuild::new("x.strings").region_path_component(), "");
        assert_eq!(
            FileToBuild::new("x.strings").with_region("en").region_path_component(),
            "en.lproj/"
        );
    }
}

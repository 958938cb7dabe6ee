//! Constructed task descriptors and the sink that receives them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::context::FileToBuild;
use crate::util::diagnostic::{Diagnostic, Diagnostics};
use crate::util::hash::Signature;

/// A node in the task graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PlannedNode {
    File(PathBuf),
    /// A directory whose whole contents are tracked.
    DirectoryTree(PathBuf),
    /// An ordering-only node with no file behind it.
    Virtual(String),
}

impl PlannedNode {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PlannedNode::File(path) | PlannedNode::DirectoryTree(path) => Some(path),
            PlannedNode::Virtual(_) => None,
        }
    }
}

impl fmt::Display for PlannedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedNode::File(path) => write!(f, "{}", path.display()),
            PlannedNode::DirectoryTree(path) => write!(f, "{}/", path.display()),
            PlannedNode::Virtual(name) => write!(f, "<{}>", name),
        }
    }
}

/// Where a tool writes its discovered dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "paths", rename_all = "snake_case")]
pub enum DependencyDataStyle {
    DependencyInfo(PathBuf),
    Makefile(PathBuf),
    Makefiles(Vec<PathBuf>),
}

/// How the tool's output is scraped for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputParserKind {
    Diagnostics,
    ShellScript,
}

/// Everything needed to run one tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    pub tool_identifier: String,
    pub rule_info: Vec<String>,
    pub command_line: Vec<String>,
    pub environment: Vec<(String, String)>,
    pub working_directory: PathBuf,
    pub inputs: Vec<PlannedNode>,
    pub outputs: Vec<PlannedNode>,
    pub execution_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_data: Option<DependencyDataStyle>,
    /// Hex SHA-256 over rule info, command line and environment.
    pub signature: String,
    pub dont_process_outputs: bool,
    pub is_unsafe_to_interrupt: bool,
    pub llbuild_control_disabled: bool,
    pub additional_directories_to_create: Vec<PathBuf>,
    pub output_parser: OutputParserKind,
}

impl TaskDescriptor {
    pub fn compute_signature(
        rule_info: &[String],
        command_line: &[String],
        environment: &[(String, String)],
    ) -> String {
        let mut signature = Signature::new();
        signature
            .update_list(rule_info.iter().map(String::as_str))
            .update_list(command_line.iter().map(String::as_str));
        for (key, value) in environment {
            signature.update_pair(key, value);
        }
        signature.finish()
    }

    /// The command line as a shell-quoted string.
    pub fn display_command(&self) -> String {
        shlex::try_join(self.command_line.iter().map(String::as_str))
            .unwrap_or_else(|_| self.command_line.join(" "))
    }
}

/// Receives diagnostics, outputs and tasks during task construction.
pub trait TaskGenerationDelegate {
    fn diagnostic(&mut self, diagnostic: Diagnostic);

    fn error(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.diagnostic(Diagnostic::error(message));
    }

    fn warning(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.diagnostic(Diagnostic::warning(message));
    }

    /// An output that later tasks may consume as an input.
    fn declare_output(&mut self, file: FileToBuild);

    fn declare_generated_info_plist_content(&mut self, path: PathBuf);

    fn create_node(&mut self, path: PathBuf) -> PlannedNode {
        PlannedNode::File(path)
    }

    fn create_directory_tree_node(&mut self, path: PathBuf) -> PlannedNode {
        PlannedNode::DirectoryTree(path)
    }

    fn create_task(&mut self, task: TaskDescriptor);
}

/// A delegate that keeps everything it receives.
#[derive(Debug, Default)]
pub struct CollectingDelegate {
    pub tasks: Vec<TaskDescriptor>,
    pub diagnostics: Diagnostics,
    pub declared_outputs: Vec<FileToBuild>,
    pub generated_info_plist_content: Vec<PathBuf>,
}

impl CollectingDelegate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskGenerationDelegate for CollectingDelegate {
    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn declare_output(&mut self, file: FileToBuild) {
        self.declared_outputs.push(file);
    }

    fn declare_generated_info_plist_content(&mut self, path: PathBuf) {
        self.generated_info_plist_content.push(path);
    }

    fn create_task(&mut self, task: TaskDescriptor) {
        tracing::debug!(tool = %task.tool_identifier, "created task: {}", task.display_command());
        self.tasks.push(task);
    }
}

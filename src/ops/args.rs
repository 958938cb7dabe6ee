//! Constructing the task a tool spec produces for some inputs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::builder::context::{BuildOptionGenerationContext, CommandBuildContext, RegistryProducer};
use crate::builder::discovery::{DiscoveredToolInfo, ToolFeatures};
use crate::builder::task::{CollectingDelegate, TaskDescriptor};
use crate::core::macros::{builtin, is_legal_identifier, MacroScope, MacroValue, SettingValue};
use crate::core::registry::SpecRegistry;
use crate::util::config::{load_settings_file, Config};
use crate::util::diagnostic::Diagnostic;
use crate::util::version::Version;

/// Options for [`construct_task`].
#[derive(Debug, Clone, Default)]
pub struct ArgsOptions {
    /// Identifier of the tool spec
    pub tool: String,

    /// Domain the tool is looked up in
    pub domain: String,

    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,

    /// TOML table of additional settings
    pub settings_file: Option<PathBuf>,

    /// `NAME=VALUE` settings, applied last
    pub settings: Vec<(String, String)>,

    /// Bound to `CURRENT_ARCH` and the `arch` condition parameter
    pub arch: Option<String>,

    /// Version reported for the tool, for version-gated options
    pub tool_version: Option<Version>,

    /// Features file for feature-gated options
    pub features_file: Option<PathBuf>,

    pub working_dir: PathBuf,
}

/// The tasks and diagnostics produced for one tool invocation.
#[derive(Debug, Default)]
pub struct ArgsResult {
    pub tasks: Vec<TaskDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ArgsResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Split `NAME=VALUE`.
pub fn parse_setting_assignment(text: &str) -> Result<(String, String)> {
    let Some((name, value)) = text.split_once('=') else {
        bail!("invalid setting `{}`: expected NAME=VALUE", text);
    };
    let name = name.trim();
    if !is_legal_identifier(name) {
        bail!("invalid setting name `{}`", name);
    }
    Ok((name.to_string(), value.to_string()))
}

/// The scope a task is constructed in: option defaults, then config
/// settings, then the settings file, then explicit assignments.
pub fn build_scope(
    config: &Config,
    opts: &ArgsOptions,
    defaults: impl IntoIterator<Item = (String, MacroValue)>,
) -> Result<MacroScope> {
    let mut scope = MacroScope::new();
    scope.extend_defaults(defaults);

    for (name, value) in &config.settings {
        scope.set(name.clone(), SettingValue::from(value.clone()));
    }
    if let Some(path) = &opts.settings_file {
        for (name, value) in load_settings_file(path)? {
            scope.set(name, SettingValue::from(value));
        }
    }
    for (name, value) in &opts.settings {
        scope.set(name.clone(), value.as_str());
    }
    if let Some(arch) = &opts.arch {
        scope.set(builtin::CURRENT_ARCH, arch.as_str());
        scope.set_parameter("arch", arch.as_str());
    }
    Ok(scope)
}

fn tool_info(spec_exec_path: Option<PathBuf>, opts: &ArgsOptions) -> Result<Option<DiscoveredToolInfo>> {
    if opts.tool_version.is_none() && opts.features_file.is_none() {
        return Ok(None);
    }
    let mut info = DiscoveredToolInfo::new(spec_exec_path.unwrap_or_else(|| PathBuf::from(&opts.tool)));
    if let Some(version) = &opts.tool_version {
        info = info.with_version(version.clone());
    }
    if let Some(path) = &opts.features_file {
        info = info.with_features(ToolFeatures::load(path)?);
    }
    Ok(Some(info))
}

/// Look up the tool and construct its task for `opts.inputs`.
pub fn construct_task(
    registry: &Arc<SpecRegistry>,
    config: &Config,
    opts: &ArgsOptions,
) -> Result<ArgsResult> {
    let spec = registry
        .get_tool(&opts.tool, &opts.domain)
        .with_context(|| format!("cannot construct a task for `{}`", opts.tool))?;
    let Some(tool) = spec.as_tool() else {
        bail!("`{}` is not a command-line tool", opts.tool);
    };

    let scope = build_scope(config, opts, tool.options.default_settings())?;
    let search_paths = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default();
    let producer = RegistryProducer::new(Arc::clone(registry), opts.domain.clone())
        .with_executable_search_paths(search_paths)
        .with_working_directory(&opts.working_dir);

    let inputs = opts
        .inputs
        .iter()
        .map(|path| producer.file_to_build(path.clone()))
        .collect();
    let info = tool_info(
        tool.exec_path.as_ref().map(|path| PathBuf::from(path.as_str())),
        opts,
    )?;

    let mut cbc = CommandBuildContext::new(&producer, &scope)
        .with_inputs(inputs)
        .with_outputs(opts.output.iter().cloned().collect());
    if let Some(info) = &info {
        cbc = cbc.with_tool_info(info as &dyn BuildOptionGenerationContext);
    }

    let mut delegate = CollectingDelegate::new();
    tool.construct_tasks(&cbc, &mut delegate);
    tracing::debug!(
        "constructed {} tasks for {}",
        delegate.tasks.len(),
        spec.specifier()
    );

    Ok(ArgsResult {
        tasks: delegate.tasks,
        diagnostics: delegate.diagnostics.into_vec(),
    })
}

/// Human-readable rendering of a constructed task.
pub fn format_task(task: &TaskDescriptor) -> String {
    let mut output = String::new();
    output.push_str(&format!("rule: {}\n", task.rule_info.join(" ")));
    output.push_str(&format!("command: {}\n", task.display_command()));
    output.push_str(&format!("description: {}\n", task.execution_description));
    output.push_str(&format!("cwd: {}\n", task.working_directory.display()));
    if !task.environment.is_empty() {
        output.push_str("environment:\n");
        for (name, value) in &task.environment {
            output.push_str(&format!("  {}={}\n", name, value));
        }
    }
    if !task.inputs.is_empty() {
        output.push_str("inputs:\n");
        for node in &task.inputs {
            output.push_str(&format!("  {}\n", node));
        }
    }
    if !task.outputs.is_empty() {
        output.push_str("outputs:\n");
        for node in &task.outputs {
            output.push_str(&format!("  {}\n", node));
        }
    }
    output
}

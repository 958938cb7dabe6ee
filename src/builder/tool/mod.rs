//! Command-line tool specs.
//!
//! A tool spec describes how to invoke one external tool: the command line
//! and rule info templates, the outputs it writes, the environment it runs
//! in and the build options that contribute arguments. Task construction
//! lives in [`construct`]; the input and output variables visible to macro
//! expressions live in [`lookup`].

mod construct;
mod lookup;
pub mod template;

use std::path::Path;
use std::sync::Arc;

use crate::builder::grouping::InputFileGroupingStrategy;
use crate::builder::property_domain::PropertyDomainSpec;
use crate::builder::task::OutputParserKind;
use crate::core::macros::{builtin, MacroString};
use crate::core::parser::SpecParser;
use crate::core::plist::PropertyListItem;
use crate::core::spec::{Spec, SpecClass};

pub use lookup::ToolLookup;
pub use template::{CommandLineTemplateArg, RuleInfoTemplateArg};

/// Keys older spec files carry that have no effect.
const IGNORED_KEYS: &[&str] = &[
    "AdditionalFilesToClean",
    "AdditionalInputFiles",
    "CaresAboutInclusionDependencies",
    "CommandIdentifier",
    "CommandOutputParser",
    "CommandResultsPostprocessor",
    "DashIFlagAcceptsHeadermaps",
    "ExecCPlusPlusLinkerPath",
    "ExecDescriptionForCompile",
    "ExecDescriptionForCreateBitcode",
    "ExecDescriptionForPrecompile",
    "ExecutionDescription",
    "FallbackTools",
    "GenericCommandFailedErrorString",
    "InputTypes",
    "IsNoLongerSupported",
    "MessageCategoryInfoOptions",
    "MessageInfoCategory",
    "MessageLimit",
    "MightNotEmitAllOutputs",
    "OutputDir",
    "OutputFileExtension",
    "OutputsAreProducts",
    "OutputsAreSourceFiles",
    "OutputsAreTargets",
    "OverridingProperties",
    "PatternsOfFlagsNotAffectingOutputFile",
    "PrecompStyle",
    "ProgressDescription",
    "ProgressDescriptionForCompile",
    "ProgressDescriptionForPrecompile",
    "PrunePrecompiledHeaderCache",
    "RelatedDisplaySpecifications",
    "RequiredComponents",
    "RuleFormat",
    "ShouldRerunOnError",
    "ShowInCompilerSelectionPopup",
    "SoftError",
    "SuccessExitCodes",
    "SupportsAnalyzeFile",
    "SupportsGenerateAssemblyFile",
    "SupportsGeneratePreprocessedFile",
    "SupportsHeadermaps",
    "SupportsIsysroot",
    "SupportsMacOSXDeploymentTarget",
    "SupportsMacOSXMinVersionFlag",
    "SupportsPredictiveCompilation",
    "SupportsSeparateUserHeaderPaths",
    "SupportsSerializedDiagnostics",
    "SupportsSymbolSeparation",
    "SupportsZeroLink",
    "UseCPlusPlusCompilerDriverWhenBundlizing",
];

/// A tool spec.
#[derive(Debug)]
pub struct CommandLineToolSpec {
    pub identifier: String,
    pub class: SpecClass,
    pub options: PropertyDomainSpec,

    pub exec_path: Option<MacroString>,
    pub exec_description: Option<MacroString>,
    pub command_line_template: Option<Vec<CommandLineTemplateArg>>,
    pub rule_info_template: Option<Vec<RuleInfoTemplateArg>>,
    /// Declared outputs; `None` means the single `$(OutputPath)` output.
    pub outputs: Option<Vec<MacroString>>,
    /// Static exports, sorted by variable name.
    pub environment_variables: Option<Vec<(String, MacroString)>>,

    pub include_in_unioned_defaults: bool,
    pub wants_build_settings_in_environment: bool,
    pub generated_info_plist_content: Option<MacroString>,
    pub source_file_option: Option<String>,
    pub additional_directories_to_create: Vec<MacroString>,
    pub input_file_types: Option<Vec<String>>,
    pub synthesize_build_rule: bool,
    pub input_file_grouping_strategies: Vec<InputFileGroupingStrategy>,

    pub dont_process_outputs: bool,
    pub is_architecture_neutral: bool,
    pub deeply_stat_input_directories: bool,
    pub is_unsafe_to_interrupt: bool,
    pub swap_outputs_with_inputs_for_indexing: bool,
    pub llbuild_control_disabled: bool,
    pub output_parser: OutputParserKind,
}

impl CommandLineToolSpec {
    pub fn parse(
        parser: &mut SpecParser<'_>,
        identifier: &str,
        class: SpecClass,
        base: Option<Arc<Spec>>,
    ) -> CommandLineToolSpec {
        let base_tool = base.as_deref().and_then(Spec::as_tool);
        let inherited_command_line = base_tool.and_then(|tool| tool.command_line_template.clone());
        let inherited_rule_info = base_tool.and_then(|tool| tool.rule_info_template.clone());
        let inherited_outputs = base_tool.and_then(|tool| tool.outputs.clone());

        let mut command_line_template = None;
        let mut rule_info_template = None;
        let mut outputs = None;
        let mut environment_variables = None;
        if class.is_generic() {
            command_line_template = match parser.parse_command_line_string("CommandLine", false) {
                Some(components) => Some(template::parse_command_line_template(parser, &components)),
                None => inherited_command_line,
            };
            if command_line_template.is_none() {
                parser.error("missing required 'CommandLine' key");
            }

            rule_info_template = match parser.parse_command_line_string("RuleName", false) {
                Some(components) => Some(template::parse_rule_info_template(parser, &components)),
                None => inherited_rule_info,
            };
            if rule_info_template.is_none() {
                parser.error("missing required 'RuleName' key");
            }

            outputs = parse_outputs(parser)
                .or(inherited_outputs)
                .or_else(|| Some(vec![MacroString::reference(builtin::OUTPUT_PATH)]));
            environment_variables = parse_environment_variables(parser);
        }

        let exec_path = parser
            .parse_macro_string("ExecPath")
            .or_else(|| implied_exec_path(command_line_template.as_deref()));

        let input_file_types = parser
            .parse_array_of_dicts("InputFileTypes", true, Some("FileType"))
            .or_else(|| parser.parse_array_of_dicts("FileTypes", true, Some("FileType")))
            .map(|dicts| {
                dicts
                    .iter()
                    .filter_map(|dict| dict.get("FileType").and_then(PropertyListItem::as_str))
                    .map(str::to_string)
                    .collect()
            });

        let synthesize_for_phases = parser
            .parse_string_list("SynthesizeBuildRuleForBuildPhases")
            .is_some_and(|phases| !phases.is_empty());
        let synthesize_build_rule =
            parser.parse_bool("SynthesizeBuildRule").unwrap_or(false) || synthesize_for_phases;

        let input_file_grouping_strategies = parser
            .parse_string_list("InputFileGroupings")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|name| {
                let strategy = InputFileGroupingStrategy::from_name(&name, identifier);
                if strategy.is_none() {
                    parser.error(format!("unknown grouping strategy: {}", name));
                }
                strategy
            })
            .collect();

        let additional_directories_to_create = parser
            .parse_string_list("AdditionalDirectoriesToCreate")
            .unwrap_or_default()
            .iter()
            .map(|dir| parser.macro_string(dir, "AdditionalDirectoriesToCreate"))
            .collect();

        for key in IGNORED_KEYS {
            parser.parse_object(key, false);
        }

        let output_parser = match class {
            SpecClass::ShellScriptTool => OutputParserKind::ShellScript,
            _ => OutputParserKind::Diagnostics,
        };

        CommandLineToolSpec {
            identifier: identifier.to_string(),
            class,
            exec_path,
            exec_description: parser.parse_macro_string("ExecDescription"),
            command_line_template,
            rule_info_template,
            outputs,
            environment_variables,
            include_in_unioned_defaults: parser.parse_bool("IncludeInUnionedToolDefaults").unwrap_or(true),
            wants_build_settings_in_environment: parser
                .parse_bool("WantsBuildSettingsInEnvironment")
                .unwrap_or(false),
            generated_info_plist_content: parser.parse_macro_string("GeneratedInfoPlistContentFilePath"),
            source_file_option: parser.parse_string("SourceFileOption"),
            additional_directories_to_create,
            input_file_types,
            synthesize_build_rule,
            input_file_grouping_strategies,
            dont_process_outputs: parser.parse_bool("DontProcessOutputs").unwrap_or(false),
            is_architecture_neutral: parser.parse_bool("IsArchitectureNeutral").unwrap_or(false),
            deeply_stat_input_directories: parser.parse_bool("DeeplyStatInputDirectories").unwrap_or(false),
            is_unsafe_to_interrupt: parser.parse_bool("IsUnsafeToInterrupt").unwrap_or(false),
            swap_outputs_with_inputs_for_indexing: parser
                .parse_bool("SwapOutputsWithInputsForIndexing")
                .unwrap_or(false),
            llbuild_control_disabled: parser.parse_bool("LLBuildControlDisabled").unwrap_or(true),
            output_parser,
            options: PropertyDomainSpec::parse(parser, base),
        }
    }

    /// A tool whose templates are supplied in code.
    pub fn builtin(
        identifier: impl Into<String>,
        rule_info: Vec<RuleInfoTemplateArg>,
        command_line: Vec<CommandLineTemplateArg>,
        options: PropertyDomainSpec,
    ) -> CommandLineToolSpec {
        let exec_path = implied_exec_path(Some(&command_line));
        CommandLineToolSpec {
            identifier: identifier.into(),
            class: SpecClass::CommandLineTool,
            options,
            exec_path,
            exec_description: None,
            command_line_template: Some(command_line),
            rule_info_template: Some(rule_info),
            outputs: None,
            environment_variables: None,
            include_in_unioned_defaults: true,
            wants_build_settings_in_environment: false,
            generated_info_plist_content: None,
            source_file_option: None,
            additional_directories_to_create: Vec::new(),
            input_file_types: None,
            synthesize_build_rule: false,
            input_file_grouping_strategies: Vec::new(),
            dont_process_outputs: false,
            is_architecture_neutral: false,
            deeply_stat_input_directories: false,
            is_unsafe_to_interrupt: false,
            swap_outputs_with_inputs_for_indexing: false,
            llbuild_control_disabled: true,
            output_parser: OutputParserKind::Diagnostics,
        }
    }

    /// Names the tool may print itself as in diagnostics, such as `clang`.
    pub fn tool_basename_aliases(&self) -> Vec<String> {
        let mut aliases = Vec::new();
        let exec = self
            .exec_path
            .as_ref()
            .filter(|path| path.is_literal())
            .and_then(|path| {
                Path::new(path.as_str())
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            });
        if let Some(exec) = exec {
            aliases.push(exec);
        }
        if let Some(last) = self.identifier.rsplit('.').next() {
            if !last.is_empty() && !aliases.iter().any(|alias| alias == last) {
                aliases.push(last.to_string());
            }
        }
        aliases
    }
}

/// `Outputs` as a list, or the single `OutputPath`.
fn parse_outputs(parser: &mut SpecParser<'_>) -> Option<Vec<MacroString>> {
    if let Some(outputs) = parser.parse_own_string_list("Outputs") {
        return Some(
            outputs
                .iter()
                .map(|output| parser.macro_string(output, "Outputs"))
                .collect(),
        );
    }
    let path = parser.parse_own_string("OutputPath")?;
    Some(vec![parser.macro_string(&path, "OutputPath")])
}

fn parse_environment_variables(parser: &mut SpecParser<'_>) -> Option<Vec<(String, MacroString)>> {
    let item = parser.parse_object("EnvironmentVariables", true)?;
    let Some(dict) = item.as_dict() else {
        parser.error("invalid value for 'EnvironmentVariables' key (expected dictionary)");
        return None;
    };
    // Dictionary order is already sorted by key.
    let mut variables = Vec::with_capacity(dict.len());
    for (key, value) in dict {
        match value.as_str() {
            Some(value) => {
                let value = parser.macro_string(value, "EnvironmentVariables");
                variables.push((key.clone(), value));
            }
            None => parser.error(format!(
                "invalid value for '{}' key in 'EnvironmentVariables' (expected string)",
                key
            )),
        }
    }
    Some(variables)
}

/// A leading literal template token names the executable.
fn implied_exec_path(template: Option<&[CommandLineTemplateArg]>) -> Option<MacroString> {
    match template?.first()? {
        CommandLineTemplateArg::Literal(list) if list.len() == 1 => list.items().first().cloned(),
        _ => None,
    }
}

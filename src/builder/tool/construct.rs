//! Turning a tool spec plus a build context into a task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use super::lookup::ToolLookup;
use super::template::{CommandLineTemplateArg, RuleInfoTemplateArg};
use super::CommandLineToolSpec;
use crate::builder::build_option::{BuildOption, DependencyDataFormat};
use crate::builder::context::{CommandBuildContext, CommandLineArgument, CommandProducer, FileToBuild};
use crate::builder::option_type::OptionKind;
use crate::builder::task::{DependencyDataStyle, PlannedNode, TaskDescriptor, TaskGenerationDelegate};
use crate::core::macros::{builtin, EvaluatedValue, LookupChain, MacroLookup, MacroScope};
use crate::core::macros::scope::UNDEFINED_ARCH;
use crate::core::spec::Spec;
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::normalize_path;
use crate::util::process::resolve_executable;

/// Every flattened option with the arguments it contributes to this task.
type ActiveOptions<'s> = Vec<(&'s Arc<BuildOption>, Vec<CommandLineArgument>)>;

/// `path` made absolute against `cwd` and lexically normalized.
fn absolute(path: &str, cwd: &Path) -> PathBuf {
    normalize_path(&cwd.join(path))
}

/// Command-line tokens that name an in-process implementation rather than an
/// executable on disk.
fn is_builtin_command(token: &str) -> bool {
    token.starts_with("builtin-") || (token.starts_with('<') && token.ends_with('>'))
}

impl CommandLineToolSpec {
    /// Construct this tool's task for `cbc` and hand it to `delegate`.
    pub fn construct_tasks(&self, cbc: &CommandBuildContext<'_>, delegate: &mut dyn TaskGenerationDelegate) {
        self.construct_tasks_with(cbc, delegate, &[], None);
    }

    /// Like [`construct_tasks`](Self::construct_tasks), with arguments for
    /// `[special-args]` and a lookup consulted before everything else.
    pub fn construct_tasks_with(
        &self,
        cbc: &CommandBuildContext<'_>,
        delegate: &mut dyn TaskGenerationDelegate,
        special_args: &[String],
        override_lookup: Option<&dyn MacroLookup>,
    ) {
        let scope = cbc.scope;
        let cwd = cbc.producer.default_working_directory();
        let base_chain = match override_lookup {
            Some(lookup) => LookupChain::new().then(lookup),
            None => LookupChain::new(),
        };

        let output_lookup = ToolLookup::new(&self.identifier, cbc);
        let evaluated_outputs = self.evaluate_outputs(cbc, &base_chain.clone().then(&output_lookup));
        flush(&output_lookup, delegate);

        let mut outputs: Vec<PlannedNode> = evaluated_outputs
            .iter()
            .map(|output| {
                let path = absolute(output, &cwd);
                if output.ends_with('/') {
                    delegate.create_directory_tree_node(path)
                } else {
                    delegate.create_node(path)
                }
            })
            .collect();
        let first_output = outputs.first().and_then(PlannedNode::path).map(Path::to_path_buf);

        let lookup = ToolLookup::new(&self.identifier, cbc).with_output(first_output.clone());
        let chain = base_chain.clone().then(&lookup);

        let input_type = cbc.primary_input_type();
        let active: ActiveOptions<'_> = self
            .options
            .flattened_ordered_options()
            .iter()
            .map(|option| {
                let args = option.get_arguments(cbc.producer, scope, input_type, cbc.tool_info, &chain);
                (option, args)
            })
            .collect();

        let dependency_data = dependency_data(&active, scope, &chain, &cwd, delegate);
        if let Some(style) = &dependency_data {
            let paths: Vec<PathBuf> = match style {
                DependencyDataStyle::DependencyInfo(path) | DependencyDataStyle::Makefile(path) => vec![path.clone()],
                DependencyDataStyle::Makefiles(paths) => paths.clone(),
            };
            outputs.extend(paths.into_iter().map(|path| delegate.create_node(path)));
        }

        let first_output_string = first_output
            .as_deref()
            .map(|path| path.to_string_lossy().into_owned());
        let rule_info = self.rule_info(cbc, scope, &chain, first_output_string.as_deref());

        let Some(mut command_line) = self.command_line(cbc, &active, special_args, &chain, delegate) else {
            flush(&lookup, delegate);
            return;
        };
        if let Some(executable) = command_line.first_mut() {
            if !is_builtin_command(executable) {
                let resolved = resolve_executable(executable, &cbc.producer.executable_search_paths());
                *executable = resolved.to_string_lossy().into_owned();
            }
        }

        let environment = self.environment(cbc, input_type, &chain);

        if self.swap_outputs_with_inputs_for_indexing
            && (cbc.inputs.len() != 1 || evaluated_outputs.len() != 1)
        {
            delegate.diagnostic(Diagnostic::warning(format!(
                "SwapOutputsWithInputsForIndexing is enabled, but there were {} inputs and {} outputs (expected 1 and 1)",
                cbc.inputs.len(),
                evaluated_outputs.len()
            )));
        }

        for node in outputs.iter().take(evaluated_outputs.len()) {
            if let PlannedNode::File(path) = node {
                let file = FileToBuild {
                    file_type: cbc.producer.file_type_for_path(path),
                    ..FileToBuild::new(path.clone())
                };
                delegate.declare_output(file);
            }
        }

        if let Some(content) = &self.generated_info_plist_content {
            let path = scope.evaluate_string(content, &chain);
            if !path.is_empty() {
                let path = absolute(&path, &cwd);
                outputs.push(delegate.create_node(path.clone()));
                delegate.declare_generated_info_plist_content(path);
            }
        }
        for (option, _) in active.iter().filter(|(_, args)| !args.is_empty()) {
            for dependency in option.output_dependencies.iter().flatten() {
                let path = scope.evaluate_string(dependency, &chain);
                if !path.is_empty() {
                    outputs.push(delegate.create_node(absolute(&path, &cwd)));
                }
            }
        }

        let mut execution_description = match &self.exec_description {
            Some(description) => scope.evaluate_string(description, &chain),
            None => match cbc.inputs.first().and_then(|input| input.path().file_name()) {
                Some(name) => format!("Processing {}", name.to_string_lossy()),
                None => rule_info.join(" "),
            },
        };
        let arch = scope.current_arch();
        if !self.is_architecture_neutral && arch != UNDEFINED_ARCH {
            execution_description = format!("{} ({})", execution_description, arch);
        }

        let mut inputs = Vec::with_capacity(cbc.inputs.len());
        for input in &cbc.inputs {
            let path = normalize_path(&cwd.join(input.path()));
            if self.deeply_stat_input_directories {
                inputs.push(delegate.create_directory_tree_node(path.clone()));
            }
            inputs.push(delegate.create_node(path));
        }
        if let Some(key_file) = command_line
            .iter()
            .position(|arg| arg == "--encrypt")
            .and_then(|index| command_line.get(index + 1))
        {
            inputs.push(delegate.create_node(absolute(key_file, &cwd)));
        }
        inputs.extend(cbc.command_ordering_inputs.iter().cloned());
        outputs.extend(cbc.command_ordering_outputs.iter().cloned());

        for (option, _) in active.iter().filter(|(_, args)| !args.is_empty()) {
            for inclusion in option.input_inclusions.iter().flatten() {
                let path = scope.evaluate_string(inclusion, &chain);
                if !path.is_empty() {
                    inputs.push(delegate.create_node(absolute(&path, &cwd)));
                }
            }
        }

        let additional_directories_to_create = self
            .additional_directories_to_create
            .iter()
            .map(|dir| scope.evaluate_string(dir, &chain))
            .filter(|dir| !dir.is_empty())
            .map(|dir| absolute(&dir, &cwd))
            .collect();

        flush(&lookup, delegate);

        let signature = TaskDescriptor::compute_signature(&rule_info, &command_line, &environment);
        tracing::debug!(tool = %self.identifier, rule = %rule_info.join(" "), "constructed task");
        delegate.create_task(TaskDescriptor {
            tool_identifier: self.identifier.clone(),
            rule_info,
            command_line,
            environment,
            working_directory: cwd,
            inputs,
            outputs,
            execution_description,
            dependency_data,
            signature,
            dont_process_outputs: self.dont_process_outputs,
            is_unsafe_to_interrupt: self.is_unsafe_to_interrupt,
            llbuild_control_disabled: self.llbuild_control_disabled,
            additional_directories_to_create,
            output_parser: self.output_parser,
        });
    }

    /// Arguments every option contributes to the linker for `input_types`.
    pub fn compute_additional_linker_args(
        &self,
        producer: &dyn CommandProducer,
        scope: &MacroScope,
        input_types: &[&Spec],
    ) -> Vec<String> {
        self.options
            .flattened_ordered_options()
            .iter()
            .flat_map(|option| option.get_additional_linker_args(producer, scope, input_types))
            .collect()
    }

    /// Declared outputs, or the caller's first output when the spec only
    /// declares the implicit `$(OutputPath)`.
    fn evaluate_outputs(&self, cbc: &CommandBuildContext<'_>, chain: &LookupChain<'_>) -> Vec<String> {
        let implicit = || -> Vec<String> {
            cbc.outputs
                .first()
                .map(|output| output.to_string_lossy().into_owned())
                .into_iter()
                .collect()
        };
        match &self.outputs {
            None => implicit(),
            Some(outputs) if outputs.len() == 1 && outputs[0].single_reference() == Some(builtin::OUTPUT_PATH) => {
                implicit()
            }
            Some(outputs) => outputs
                .iter()
                .map(|output| cbc.scope.evaluate_string(output, chain))
                .filter(|output| !output.is_empty())
                .collect(),
        }
    }

    fn rule_info(
        &self,
        cbc: &CommandBuildContext<'_>,
        scope: &MacroScope,
        chain: &LookupChain<'_>,
        output: Option<&str>,
    ) -> Vec<String> {
        let Some(template) = &self.rule_info_template else {
            return vec![self.identifier.clone()];
        };
        let mut rule_info = Vec::new();
        for arg in template {
            match arg {
                RuleInfoTemplateArg::String(text) => rule_info.push(text.clone()),
                RuleInfoTemplateArg::Input => rule_info.extend(input_strings(cbc).take(1)),
                RuleInfoTemplateArg::Inputs => rule_info.extend(input_strings(cbc)),
                RuleInfoTemplateArg::Output => rule_info.extend(output.map(str::to_string)),
                RuleInfoTemplateArg::Literal(list) => rule_info.extend(scope.evaluate_list(list, chain)),
            }
        }
        rule_info
    }

    fn command_line(
        &self,
        cbc: &CommandBuildContext<'_>,
        active: &ActiveOptions<'_>,
        special_args: &[String],
        chain: &LookupChain<'_>,
        delegate: &mut dyn TaskGenerationDelegate,
    ) -> Option<Vec<String>> {
        let scope = cbc.scope;
        let Some(template) = &self.command_line_template else {
            delegate.diagnostic(Diagnostic::error(format!(
                "no 'CommandLine' template for spec '{}'",
                self.identifier
            )));
            return None;
        };

        let mut command_line = Vec::new();
        for arg in template {
            match arg {
                CommandLineTemplateArg::ExecPath => match &self.exec_path {
                    Some(exec_path) => command_line.push(scope.evaluate_string(exec_path, chain)),
                    None => delegate.diagnostic(Diagnostic::error(format!(
                        "missing 'ExecPath' for '[exec-path]' in spec '{}'",
                        self.identifier
                    ))),
                },
                CommandLineTemplateArg::Input => command_line.extend(input_strings(cbc).take(1)),
                CommandLineTemplateArg::Inputs => command_line.extend(input_strings(cbc)),
                CommandLineTemplateArg::Options => command_line.extend(
                    active
                        .iter()
                        .flat_map(|(_, args)| args.iter().map(CommandLineArgument::as_string)),
                ),
                CommandLineTemplateArg::Output => {
                    let output = scope.lookup_string(builtin::OUTPUT_PATH, chain);
                    if !output.is_empty() {
                        command_line.push(output);
                    }
                }
                CommandLineTemplateArg::SpecialArgs => command_line.extend(special_args.iter().cloned()),
                CommandLineTemplateArg::Literal(list) => command_line.extend(scope.evaluate_list(list, chain)),
            }
        }

        if command_line.is_empty() {
            delegate.diagnostic(Diagnostic::error(format!(
                "empty command line for spec '{}'",
                self.identifier
            )));
            return None;
        }
        Some(command_line)
    }

    /// Static exports, then option exports, then (if wanted) every bound
    /// setting not already exported.
    fn environment(
        &self,
        cbc: &CommandBuildContext<'_>,
        input_type: Option<&Spec>,
        chain: &LookupChain<'_>,
    ) -> Vec<(String, String)> {
        let scope = cbc.scope;
        let mut environment = IndexMap::new();
        for (name, value) in self.environment_variables.iter().flatten() {
            environment.insert(name.clone(), scope.evaluate_string(value, chain));
        }
        for option in self.options.flattened_ordered_options() {
            if let Some((name, value)) = option.get_environment_assignment(cbc.producer, scope, input_type, chain) {
                environment.insert(name, value);
            }
        }
        if self.wants_build_settings_in_environment {
            for (name, value) in scope.bound_settings(chain) {
                environment.entry(name).or_insert(value);
            }
        }
        environment.into_iter().collect()
    }
}

fn input_strings<'c>(cbc: &'c CommandBuildContext<'_>) -> impl Iterator<Item = String> + 'c {
    cbc.inputs
        .iter()
        .map(|input| input.path().to_string_lossy().into_owned())
}

fn flush(lookup: &ToolLookup<'_>, delegate: &mut dyn TaskGenerationDelegate) {
    for warning in lookup.take_warnings() {
        delegate.diagnostic(warning);
    }
}

/// Where the active options ask the tool to write dependency data.
fn dependency_data(
    active: &ActiveOptions<'_>,
    scope: &MacroScope,
    chain: &LookupChain<'_>,
    cwd: &Path,
    delegate: &mut dyn TaskGenerationDelegate,
) -> Option<DependencyDataStyle> {
    let mut dependency_info: Option<PathBuf> = None;
    let mut makefiles = Vec::new();
    for (option, args) in active {
        let Some(format) = option.dependency_format else {
            continue;
        };
        if option.kind() == OptionKind::Boolean {
            delegate.diagnostic(Diagnostic::error(
                "DependencyDataFormat is only allowed on build options of type String, StringList, Path, or PathList",
            ));
            continue;
        }
        if args.is_empty() {
            continue;
        }

        let paths: Vec<PathBuf> = match option.evaluate(scope, chain) {
            EvaluatedValue::String(value) => vec![value],
            EvaluatedValue::List(values) => values,
            EvaluatedValue::Boolean(_) => Vec::new(),
        }
        .into_iter()
        .filter(|value| !value.is_empty())
        .map(|value| absolute(&value, cwd))
        .collect();

        match format {
            DependencyDataFormat::DependencyInfo => {
                for path in paths {
                    if dependency_info.is_some() {
                        delegate.diagnostic(Diagnostic::error(
                            "Multiple build options specified dependency info in ld64 format",
                        ));
                    } else {
                        dependency_info = Some(path);
                    }
                }
            }
            DependencyDataFormat::Makefile => makefiles.extend(paths),
        }
    }

    match (dependency_info, makefiles.len()) {
        (Some(_), n) if n > 0 => {
            delegate.diagnostic(Diagnostic::error(
                "Multiple build options specified dependency info in different formats",
            ));
            None
        }
        (Some(path), _) => Some(DependencyDataStyle::DependencyInfo(path)),
        (None, 0) => None,
        (None, 1) => makefiles.pop().map(DependencyDataStyle::Makefile),
        (None, _) => Some(DependencyDataStyle::Makefiles(makefiles)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::task::CollectingDelegate;
    use crate::core::file_type::FileTypeSpec;
    use crate::core::macros::MacroNamespace;
    use crate::core::parser::SpecParser;
    use crate::core::plist::PropertyListItem;
    use crate::core::spec::{SpecClass, SpecKind, SpecType};

    struct Producer;

    impl CommandProducer for Producer {
        fn lookup_file_type(&self, _identifier: &str) -> Option<Arc<Spec>> {
            None
        }

        fn default_working_directory(&self) -> PathBuf {
            PathBuf::from("/work")
        }
    }

    fn tool(json: &str) -> CommandLineToolSpec {
        let data = PropertyListItem::from_json_str(json).unwrap();
        let record = data.as_dict().unwrap().clone();
        let ns = MacroNamespace::with_builtins();
        let mut parser = SpecParser::new("org.test.tool", &record, &ns);
        let tool = CommandLineToolSpec::parse(&mut parser, "org.test.tool", SpecClass::GenericCommandLineTool, None);
        let diagnostics = parser.complete();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        tool
    }

    fn construct(tool: &CommandLineToolSpec, scope: &MacroScope, inputs: Vec<FileToBuild>) -> CollectingDelegate {
        let cbc = CommandBuildContext::new(&Producer, scope).with_inputs(inputs);
        let mut delegate = CollectingDelegate::new();
        tool.construct_tasks(&cbc, &mut delegate);
        delegate
    }

    fn messages(delegate: &CollectingDelegate) -> Vec<String> {
        delegate.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    fn source_type() -> Arc<Spec> {
        Arc::new(Spec::builtin(
            "sourcecode.c",
            SpecType::FileType,
            SpecKind::FileType(FileTypeSpec::default()),
        ))
    }

    #[test]
    fn test_exec_path_options_and_output() {
        let tool = tool(
            r#"{
                "CommandLine": ["[exec-path]", "[options]", "[output]"],
                "RuleName": "Run [output]",
                "ExecPath": "/usr/bin/tool",
                "OutputPath": "/out/o",
                "Options": [{"Name": "X", "Type": "String", "DefaultValue": "v", "CommandLineArgs": ["-x", "$(value)"]}]
            }"#,
        );
        let delegate = construct(&tool, &MacroScope::new(), Vec::new());
        assert!(delegate.diagnostics.is_empty(), "{:?}", messages(&delegate));
        let task = &delegate.tasks[0];
        assert_eq!(task.command_line, ["/usr/bin/tool", "-x", "v", "/out/o"]);
        assert_eq!(task.rule_info, ["Run", "/out/o"]);
        assert_eq!(task.outputs, [PlannedNode::File("/out/o".into())]);
        assert_eq!(delegate.declared_outputs.len(), 1);
        assert_eq!(task.working_directory, Path::new("/work"));
    }

    #[test]
    fn test_inputs_outputs_and_description() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/cc -c [input] -o $(OBJ_DIR)/$(InputFileBase).o",
                "RuleName": "CompileC $(OBJ_DIR)/$(InputFileBase).o [input]",
                "Outputs": ["$(OBJ_DIR)/$(InputFileBase).o"],
                "ExecDescription": "Compile $(InputFileName)"
            }"#,
        );
        let scope = MacroScope::new().with("OBJ_DIR", "obj").with("CURRENT_ARCH", "arm64");
        let delegate = construct(&tool, &scope, vec![FileToBuild::new("src/main.c")]);
        let task = &delegate.tasks[0];
        assert_eq!(task.command_line, ["/bin/cc", "-c", "src/main.c", "-o", "obj/main.o"]);
        assert_eq!(task.rule_info, ["CompileC", "obj/main.o", "src/main.c"]);
        assert_eq!(task.inputs, [PlannedNode::File("/work/src/main.c".into())]);
        assert_eq!(task.outputs, [PlannedNode::File("/work/obj/main.o".into())]);
        assert_eq!(task.execution_description, "Compile main.c (arm64)");
    }

    #[test]
    fn test_architecture_neutral_and_directory_outputs() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/cp -R [input] [output]",
                "RuleName": "Copy [output]",
                "Outputs": ["/dst/Bundle/"],
                "IsArchitectureNeutral": "YES",
                "DeeplyStatInputDirectories": "YES"
            }"#,
        );
        let scope = MacroScope::new().with("CURRENT_ARCH", "x86_64");
        let delegate = construct(&tool, &scope, vec![FileToBuild::new("/src/Bundle")]);
        let task = &delegate.tasks[0];
        assert_eq!(task.command_line, ["/bin/cp", "-R", "/src/Bundle", "/dst/Bundle"]);
        assert_eq!(task.outputs, [PlannedNode::DirectoryTree("/dst/Bundle".into())]);
        assert_eq!(
            task.inputs,
            [
                PlannedNode::DirectoryTree("/src/Bundle".into()),
                PlannedNode::File("/src/Bundle".into()),
            ]
        );
        assert_eq!(task.execution_description, "Processing Bundle");
        assert!(delegate.declared_outputs.is_empty());
    }

    #[test]
    fn test_environment_assignments() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/sh [input]",
                "RuleName": "Script",
                "EnvironmentVariables": {"MODE": "$(CONFIGURATION)"},
                "WantsBuildSettingsInEnvironment": "YES",
                "Options": [{"Name": "LEVEL", "Type": "String", "DefaultValue": "3", "SetValueInEnvironmentVariable": "TOOL_LEVEL"}]
            }"#,
        );
        let scope = MacroScope::new().with("CONFIGURATION", "Debug").with("MODE", "ignored");
        let input = FileToBuild::new("/s.sh").with_file_type(source_type());
        let delegate = construct(&tool, &scope, vec![input]);
        let environment = &delegate.tasks[0].environment;
        assert_eq!(environment[0], ("MODE".to_string(), "Debug".to_string()));
        assert_eq!(environment[1], ("TOOL_LEVEL".to_string(), "3".to_string()));
        assert!(environment.contains(&("CONFIGURATION".to_string(), "Debug".to_string())));
        assert_eq!(environment.iter().filter(|(name, _)| name == "MODE").count(), 1);
    }

    #[test]
    fn test_additional_linker_args_in_option_order() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/cc [options] [input]",
                "RuleName": "Compile",
                "Options": [
                    {"Name": "DEAD", "Type": "Boolean", "Values": [{"Value": "YES", "CommandLineFlag": "-dead"}, "NO"],
                        "AdditionalLinkerArgs": {"YES": ["-dead_strip"], "NO": ""}},
                    {"Name": "OBJC", "Type": "Boolean", "Values": ["YES", "NO"], "FileTypes": ["sourcecode.objc"],
                        "AdditionalLinkerArgs": {"YES": ["-ObjC"], "NO": ""}},
                    {"Name": "ARC", "Type": "Boolean", "Values": ["YES", "NO"],
                        "AdditionalLinkerArgs": {"YES": ["-fobjc-arc"], "NO": ""}}
                ]
            }"#,
        );
        let c = source_type();
        let scope = MacroScope::new().with("DEAD", "YES").with("OBJC", "YES").with("ARC", "YES");
        assert_eq!(
            tool.compute_additional_linker_args(&Producer, &scope, &[&c]),
            ["-dead_strip", "-fobjc-arc"]
        );
        let scope = MacroScope::new().with("DEAD", "NO").with("ARC", "YES");
        assert_eq!(tool.compute_additional_linker_args(&Producer, &scope, &[&c]), ["-fobjc-arc"]);
        assert!(tool.compute_additional_linker_args(&Producer, &scope, &[]).is_empty());
    }

    #[test]
    fn test_dependency_data_styles() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/cc [options]",
                "RuleName": "Compile",
                "Options": [
                    {"Name": "DEP_FILE", "Type": "Path", "DefaultValue": "/o/a.d", "CommandLineFlag": "-MF", "DependencyDataFormat": "makefile"},
                    {"Name": "INFO", "Type": "Path", "CommandLineFlag": "-info", "DependencyDataFormat": "dependencyInfo"}
                ]
            }"#,
        );
        let delegate = construct(&tool, &MacroScope::new(), Vec::new());
        let task = &delegate.tasks[0];
        assert_eq!(task.dependency_data, Some(DependencyDataStyle::Makefile("/o/a.d".into())));
        assert_eq!(task.command_line, ["/bin/cc", "-MF", "/o/a.d"]);
        assert_eq!(task.outputs, [PlannedNode::File("/o/a.d".into())]);

        let both = construct(&tool, &MacroScope::new().with("INFO", "/o/info.dat"), Vec::new());
        assert_eq!(
            messages(&both),
            ["Multiple build options specified dependency info in different formats"]
        );
        assert_eq!(both.tasks[0].dependency_data, None);
    }

    #[test]
    fn test_duplicate_dependency_info() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/ld [options]",
                "RuleName": "Link",
                "Options": [
                    {"Name": "A", "Type": "Path", "DefaultValue": "/a", "CommandLineFlag": "-a", "DependencyDataFormat": "dependencyInfo"},
                    {"Name": "B", "Type": "Path", "DefaultValue": "/b", "CommandLineFlag": "-b", "DependencyDataFormat": "dependencyInfo"},
                    {"Name": "C", "Type": "Boolean", "DefaultValue": "YES", "CommandLineFlag": "-c", "DependencyDataFormat": "makefile"}
                ]
            }"#,
        );
        let delegate = construct(&tool, &MacroScope::new(), Vec::new());
        assert_eq!(
            messages(&delegate),
            [
                "Multiple build options specified dependency info in ld64 format",
                "DependencyDataFormat is only allowed on build options of type String, StringList, Path, or PathList",
            ]
        );
        assert_eq!(
            delegate.tasks[0].dependency_data,
            Some(DependencyDataStyle::DependencyInfo("/a".into()))
        );
    }

    #[test]
    fn test_swap_outputs_warning_and_missing_exec_path() {
        let tool = tool(
            r#"{
                "CommandLine": ["[exec-path]", "[inputs]"],
                "RuleName": "Index",
                "SwapOutputsWithInputsForIndexing": "YES"
            }"#,
        );
        let delegate = construct(&tool, &MacroScope::new(), vec![FileToBuild::new("/a"), FileToBuild::new("/b")]);
        assert_eq!(
            messages(&delegate),
            [
                "missing 'ExecPath' for '[exec-path]' in spec 'org.test.tool'",
                "SwapOutputsWithInputsForIndexing is enabled, but there were 2 inputs and 0 outputs (expected 1 and 1)",
            ]
        );
    }

    #[test]
    fn test_encrypt_key_and_builtin_commands() {
        let tool = tool(
            r#"{
                "CommandLine": "builtin-compile --encrypt key.bin [input]",
                "RuleName": "Compile [input]",
                "InputFileTypes": ["sourcecode.c"]
            }"#,
        );
        let delegate = construct(&tool, &MacroScope::new(), vec![FileToBuild::new("/src/a.c")]);
        let task = &delegate.tasks[0];
        assert_eq!(task.command_line[0], "builtin-compile");
        assert_eq!(
            task.inputs,
            [PlannedNode::File("/src/a.c".into()), PlannedNode::File("/work/key.bin".into())]
        );
    }

    #[test]
    fn test_input_inclusions_and_output_dependencies() {
        let tool = tool(
            r#"{
                "CommandLine": "/bin/gen [options]",
                "RuleName": "Gen",
                "Options": [
                    {"Name": "MAP", "Type": "Path", "CommandLineFlag": "-map",
                     "InputInclusions": "$(MAP)", "OutputDependencies": ["$(MAP).out"]}
                ]
            }"#,
        );
        let inactive = construct(&tool, &MacroScope::new(), Vec::new());
        assert!(inactive.tasks[0].inputs.is_empty());

        let delegate = construct(&tool, &MacroScope::new().with("MAP", "/m"), Vec::new());
        let task = &delegate.tasks[0];
        assert_eq!(task.inputs, [PlannedNode::File("/m".into())]);
        assert_eq!(task.outputs, [PlannedNode::File("/m.out".into())]);
    }

    #[test]
    fn test_override_lookup_wins() {
        let tool = tool(r#"{"CommandLine": "/bin/echo $(MSG)", "RuleName": "Echo"}"#);
        let scope = MacroScope::new().with("MSG", "scope");
        let cbc = CommandBuildContext::new(&Producer, &scope);
        let mut delegate = CollectingDelegate::new();
        let override_lookup = |name: &str| {
            (name == "MSG").then(|| crate::core::macros::MacroValue::literal("override"))
        };
        tool.construct_tasks_with(&cbc, &mut delegate, &[], Some(&override_lookup));
        assert_eq!(delegate.tasks[0].command_line, ["/bin/echo", "override"]);
    }

    #[test]
    fn test_special_args_and_builtin_tool() {
        use crate::builder::property_domain::PropertyDomainSpec;
        use crate::core::macros::MacroStringList;

        let tool = CommandLineToolSpec::builtin(
            "org.test.builtin",
            vec![RuleInfoTemplateArg::String("Touch".into()), RuleInfoTemplateArg::Input],
            vec![
                CommandLineTemplateArg::Literal(MacroStringList::literal(&["/usr/bin/touch"])),
                CommandLineTemplateArg::SpecialArgs,
                CommandLineTemplateArg::Input,
            ],
            PropertyDomainSpec::default(),
        );
        let scope = MacroScope::new();
        let cbc = CommandBuildContext::new(&Producer, &scope).with_inputs(vec![FileToBuild::new("/f")]);
        let mut delegate = CollectingDelegate::new();
        tool.construct_tasks_with(&cbc, &mut delegate, &["-c".to_string()], None);
        let task = &delegate.tasks[0];
        assert_eq!(task.command_line, ["/usr/bin/touch", "-c", "/f"]);
        assert_eq!(task.rule_info, ["Touch", "/f"]);
        assert_eq!(tool.tool_basename_aliases(), ["touch", "builtin"]);
    }
}

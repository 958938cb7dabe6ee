//! Build options: typed settings that expand into command-line arguments.
//!
//! Each option maps the evaluated value of one build setting onto a
//! command-line template. Boolean options choose between the "empty" (`NO`)
//! and "other" (`YES`) templates; scalar options first look for a template
//! registered for their exact value; list options apply the chosen template
//! once per item.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::builder::context::{BuildOptionGenerationContext, CommandLineArgument, CommandProducer};
use crate::builder::option_type::{BuildOptionType, OptionKind};
use crate::core::macros::{
    is_legal_identifier, is_truthy, EvaluatedValue, LookupChain, MacroCondition, MacroScope,
    MacroString, MacroStringList, MacroType, MacroValue, ValueBinding,
};
use crate::core::parser::SpecParser;
use crate::core::plist::{PropertyListDict, PropertyListItem};
use crate::core::spec::Spec;
use crate::util::version::{FuzzyVersion, Version, VersionRange};

/// Key in `CommandLineArgs` and `AdditionalLinkerArgs` for values with no
/// definition of their own.
const OTHERWISE: &str = "<<otherwise>>";

/// Placeholder name used in messages when an option has no usable name.
const UNKNOWN_NAME: &str = "<UNKNOWN>";

/// How a value is turned into arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLineTemplate {
    /// No arguments; blocks fallback templates.
    Empty,
    /// The value itself.
    Literal,
    /// Evaluated arguments with `$(value)` bound to the value.
    Args(MacroStringList),
    /// The flag, followed by the value for non-boolean options.
    Flag(MacroString),
    /// The flag and value as one joined token.
    PrefixFlag(MacroString),
}

/// What one value of an option contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptionValue {
    pub command_line: Option<CommandLineTemplate>,
    pub additional_linker_args: Option<MacroStringList>,
    /// The template is the option's general one rather than one declared
    /// for this value; an empty list does not expand it.
    pub shares_general_template: bool,
}

impl BuildOptionValue {
    fn with_template(template: CommandLineTemplate) -> Self {
        BuildOptionValue {
            command_line: Some(template),
            additional_linker_args: None,
            shares_general_template: false,
        }
    }

    fn shared(self) -> Self {
        BuildOptionValue {
            shares_general_template: true,
            ..self
        }
    }

    fn with_linker_args(existing: Option<BuildOptionValue>, args: MacroStringList) -> Self {
        BuildOptionValue {
            additional_linker_args: Some(args),
            ..existing.unwrap_or_default()
        }
    }
}

/// Format of a dependency file an option makes the tool write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyDataFormat {
    /// ld64-style binary dependency info.
    DependencyInfo,
    Makefile,
}

impl DependencyDataFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dependencyInfo" => Some(DependencyDataFormat::DependencyInfo),
            "makefile" => Some(DependencyDataFormat::Makefile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyDataFormat::DependencyInfo => "dependencyInfo",
            DependencyDataFormat::Makefile => "makefile",
        }
    }
}

/// The raw command-line key, resolved once every key has been read.
enum CommandLineSpecifier {
    ArrayArgs(Vec<String>),
    DictArgs(PropertyListDict),
    StringArgs(String),
    Flag(String),
    PrefixFlag(String),
}

/// One option of a property domain.
#[derive(Debug, Clone)]
pub struct BuildOption {
    pub name: String,
    /// `DisplayName`, the localized `[NAME]-name`, or the name itself.
    pub display_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub ty: BuildOptionType,
    pub appears_after: Option<String>,
    pub default_value: Option<MacroValue>,
    pub empty_value: Option<BuildOptionValue>,
    pub other_value: Option<BuildOptionValue>,
    pub values: Option<BTreeMap<String, BuildOptionValue>>,
    pub condition: Option<MacroCondition>,
    pub architectures: Option<BTreeSet<String>>,
    pub file_types: Option<Vec<String>>,
    pub flatten_recursive_search_paths: bool,
    pub environment_variable: Option<MacroString>,
    pub supported_version_ranges: Option<Vec<VersionRange>>,
    pub dependency_format: Option<DependencyDataFormat>,
    pub feature_flags: Option<Vec<String>>,
    pub input_inclusions: Option<Vec<MacroString>>,
    pub output_dependencies: Option<Vec<MacroString>>,
}

/// Diagnostics for one option record, suffixed with the option's name.
struct OptionDiagnostics<'p, 'a> {
    parser: &'p mut SpecParser<'a>,
    name: String,
}

impl OptionDiagnostics<'_, '_> {
    fn error(&mut self, message: impl fmt::Display) {
        self.parser.error(format!("{} for option '{}'", message, self.name));
    }
}

fn strings_in(
    items: &[PropertyListItem],
    mut on_error: impl FnMut(&PropertyListItem),
) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item.as_str() {
            Some(value) => Some(value.to_string()),
            None => {
                on_error(item);
                None
            }
        })
        .collect()
}

impl BuildOption {
    /// Parse one entry of a `Properties` or `Options` array.
    pub fn parse(parser: &mut SpecParser<'_>, data: &PropertyListItem) -> BuildOption {
        let empty = PropertyListDict::new();
        let items = match data.as_dict() {
            Some(items) => items,
            None => {
                parser.error(format!(
                    "expected build option definition dictionary instead of item: {}",
                    data
                ));
                &empty
            }
        };
        let label = items
            .get("Name")
            .and_then(PropertyListItem::as_str)
            .unwrap_or(UNKNOWN_NAME)
            .to_string();
        let mut diag = OptionDiagnostics { parser, name: label };

        let mut name = None;
        let mut ty = None;
        let mut default_item = None;
        let mut values_data: Option<&[PropertyListItem]> = None;
        let mut command_line_key: Option<&str> = None;
        let mut specifier = None;
        let mut condition = None;
        let mut linker_args = None;
        let mut architectures = None;
        let mut file_types = None;
        let mut appears_after = None;
        let mut environment_variable = None;
        let mut category = None;
        let mut description = None;
        let mut display_name = None;
        let mut flatten_recursive_search_paths = false;
        let mut input_inclusions = None;
        let mut output_dependencies = None;
        let mut supported_version_ranges = None;
        let mut feature_flags = None;
        let mut dependency_format = None;

        for (key, value) in items {
            let key = key.as_str();
            match key {
                "Name" => match value.as_str() {
                    None => diag.parser.error(format!(
                        "expected string value for build option key '{}' in data: {}",
                        key, data
                    )),
                    Some(text) if text.is_empty() || !is_legal_identifier(text) => diag
                        .parser
                        .error(format!("'{}' is not a valid build setting name", text)),
                    Some(text) => name = Some(text.to_string()),
                },
                "Type" => match value.as_str() {
                    None => diag.error(format!("invalid build option key '{}' value", key)),
                    Some(text) => match BuildOptionType::from_name(text) {
                        Some(resolved) => ty = Some(resolved),
                        None => diag.error(format!("unknown build option type '{}'", text)),
                    },
                },
                "DefaultValue" => default_item = Some(value),
                "AllowedValues" | "Values" => {
                    if values_data.is_some() {
                        diag.error("cannot specify both 'AllowedValues' and 'Values'");
                        continue;
                    }
                    match value.as_array() {
                        Some(items) => values_data = Some(items),
                        None => diag.error(format!("invalid build option key '{}' value", key)),
                    }
                }
                "CommandLineArgs" | "CommandLineFlag" | "CommandLinePrefixFlag" => {
                    if let Some(previous) = command_line_key {
                        diag.error(format!(
                            "invalid build option key '{}', cannot combine with '{}'",
                            key, previous
                        ));
                        continue;
                    }
                    let parsed = match (key, value) {
                        ("CommandLineArgs", PropertyListItem::String(text)) => {
                            Some(CommandLineSpecifier::StringArgs(text.clone()))
                        }
                        ("CommandLineArgs", PropertyListItem::Array(items)) => {
                            let strings = strings_in(items, |_| {
                                diag.error("expected string in 'CommandLineArgs'")
                            });
                            Some(CommandLineSpecifier::ArrayArgs(strings))
                        }
                        ("CommandLineArgs", PropertyListItem::Dict(dict)) => {
                            Some(CommandLineSpecifier::DictArgs(dict.clone()))
                        }
                        ("CommandLineArgs", _) => {
                            diag.error(format!(
                                "expected string, array, or dict value for build option key '{}'",
                                key
                            ));
                            None
                        }
                        (_, PropertyListItem::String(text)) if key == "CommandLineFlag" => {
                            Some(CommandLineSpecifier::Flag(text.clone()))
                        }
                        (_, PropertyListItem::String(text)) => {
                            Some(CommandLineSpecifier::PrefixFlag(text.clone()))
                        }
                        _ => {
                            diag.error(format!(
                                "expected string value for build option key '{}'",
                                key
                            ));
                            None
                        }
                    };
                    if parsed.is_some() {
                        specifier = parsed;
                        command_line_key = Some(key);
                    }
                }
                "Condition" => match value.as_str() {
                    None => diag
                        .parser
                        .error(format!("expected string value for build option key '{}'", key)),
                    Some(text) => match MacroCondition::parse(text) {
                        Ok(parsed) => condition = Some(parsed),
                        Err(err) => diag.parser.error(format!(
                            "unable to parse value for build option key '{}': {}",
                            key, err
                        )),
                    },
                },
                "AdditionalLinkerArgs" => match value.as_dict() {
                    Some(dict) => linker_args = Some(dict),
                    None => diag.error(format!(
                        "expected dictionary value for build option key '{}'",
                        key
                    )),
                },
                "Architectures" | "FileTypes" => {
                    let Some(items) = value.as_array() else {
                        diag.error(format!("invalid build option key '{}' value", key));
                        continue;
                    };
                    let strings = strings_in(items, |_| diag.error(format!("expected string in '{}'", key)));
                    if key == "Architectures" {
                        architectures = Some(strings.into_iter().collect::<BTreeSet<_>>());
                    } else {
                        file_types = Some(strings);
                    }
                }
                "AppearsAfter" | "Category" | "Description" | "DisplayName"
                | "SetValueInEnvironmentVariable" => {
                    let Some(text) = value.as_str() else {
                        diag.error(format!("expected string value for build option key '{}'", key));
                        continue;
                    };
                    match key {
                        "AppearsAfter" => appears_after = Some(text.to_string()),
                        "Category" => category = Some(text.to_string()),
                        "Description" => description = Some(text.to_string()),
                        "DisplayName" => display_name = Some(text.to_string()),
                        _ => environment_variable = Some(diag.parser.macro_string(text, key)),
                    }
                }
                "FlattenRecursiveSearchPathsInValue" => match value.loose_bool() {
                    Some(flag) => flatten_recursive_search_paths = flag,
                    None => diag.error(format!("expected bool value for build option key '{}'", key)),
                },
                "InputInclusions" | "OutputDependencies" | "FeatureFlags" => {
                    let strings = match value {
                        PropertyListItem::String(text) => vec![text.clone()],
                        PropertyListItem::Array(items) => strings_in(items, |_| {
                            diag.error(format!("expected all string values in array for '{}'", key))
                        }),
                        _ => {
                            diag.error(format!(
                                "expected string or array value for build option key '{}'",
                                key
                            ));
                            continue;
                        }
                    };
                    match key {
                        "FeatureFlags" => feature_flags = Some(strings),
                        _ => {
                            let exprs = strings
                                .iter()
                                .map(|text| diag.parser.macro_string(text, key))
                                .collect();
                            if key == "InputInclusions" {
                                input_inclusions = Some(exprs);
                            } else {
                                output_dependencies = Some(exprs);
                            }
                        }
                    }
                }
                "SupportedVersionRanges" => match value.as_array() {
                    Some(items) => {
                        supported_version_ranges = Some(parse_version_ranges(&mut diag, key, items))
                    }
                    None => diag.error(format!("expected array value for build option key '{}'", key)),
                },
                "DependencyDataFormat" => match value.as_str() {
                    None => diag.error(format!("expected string value for build option key '{}'", key)),
                    Some(text) => match DependencyDataFormat::from_name(text) {
                        Some(format) => dependency_format = Some(format),
                        None => diag.error(format!(
                            "unrecognized value '{}' for build option key '{}'",
                            text, key
                        )),
                    },
                },
                "AvoidEmptyValue" | "AvoidMacroDefinition" | "Basic" | "ConditionFlavors"
                | "DisplayValues" | "IsInputDependency" | "IsOutputDependency"
                | "OutputsAreSourceFiles" | "UIType" => {}
                _ => diag.error(format!("unknown build option key '{}'", key)),
            }
        }

        // Infer a missing type from an existing declaration of the setting.
        if let (Some(name), None) = (&name, ty) {
            if let Some(declared) = diag.parser.namespace().lookup(name) {
                let inferred = BuildOptionType::from_macro_type(declared);
                if declared != MacroType::String {
                    diag.parser.warning(format!(
                        "build option '{}' missing type declaration (as '{}')",
                        name, inferred
                    ));
                }
                ty = Some(inferred);
            }
        }

        if name.is_none() {
            diag.parser
                .error(format!("missing build option key 'Name' in data: {}", data));
        }
        let name = name.unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let ty = ty.unwrap_or(BuildOptionType::String);

        if name != UNKNOWN_NAME {
            if let Err(err) = diag.parser.namespace().declare(&name, ty.macro_type()) {
                diag.parser
                    .error(format!("unable to declare macro for option '{}': {}", name, err));
            }
        }

        let default_value = default_item.and_then(|item| match item.as_str() {
            Some(text) if ty.is_list() => {
                Some(MacroValue::List(diag.parser.macro_list(text, "DefaultValue")))
            }
            Some(text) => Some(MacroValue::String(diag.parser.macro_string(text, "DefaultValue"))),
            None => {
                diag.error("expected string value for build option key 'DefaultValue'");
                None
            }
        });

        let (empty_value, other_value, values) =
            parse_value_definitions(&mut diag, ty, specifier, values_data, linker_args);

        let localized_name = diag.parser.localized_string(&format!("[{}]-name", name));
        let localized_description = diag.parser.localized_string(&format!("[{}]-description", name));
        let localized_category = diag.parser.localized_string(&format!("[{}]-category", name));

        BuildOption {
            display_name: display_name.or(localized_name).unwrap_or_else(|| name.clone()),
            description: description.or(localized_description),
            category: category.or(localized_category),
            name,
            ty,
            appears_after,
            default_value,
            empty_value,
            other_value,
            values,
            condition,
            architectures,
            file_types,
            flatten_recursive_search_paths,
            environment_variable,
            supported_version_ranges,
            dependency_format,
            feature_flags,
            input_inclusions,
            output_dependencies,
        }
    }

    pub fn kind(&self) -> OptionKind {
        self.ty.kind()
    }

    pub fn macro_type(&self) -> MacroType {
        self.ty.macro_type()
    }

    fn supports_architecture(&self, arch: &str) -> bool {
        self.architectures
            .as_ref()
            .map_or(true, |archs| archs.contains(arch))
    }

    /// Whether `input_type` conforms to one of the option's file types.
    pub fn supports_file_type(&self, producer: &dyn CommandProducer, input_type: &Spec) -> bool {
        let Some(identifiers) = &self.file_types else {
            return true;
        };
        identifiers.iter().any(|identifier| {
            producer
                .lookup_file_type(identifier)
                .is_some_and(|ty| input_type.conforms_to(&ty.identifier))
        })
    }

    fn supports_tool(&self, context: Option<&dyn BuildOptionGenerationContext>) -> bool {
        let Some(context) = context else {
            return true;
        };
        if let (Some(ranges), Some(version)) = (&self.supported_version_ranges, context.tool_version()) {
            if !ranges.iter().any(|range| range.contains(version)) {
                return false;
            }
        }
        self.feature_flags
            .as_ref()
            .map_or(true, |flags| flags.iter().all(|flag| context.has_feature(flag)))
    }

    fn condition_holds(&self, scope: &MacroScope, chain: &LookupChain<'_>) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| scope.evaluate_condition(condition, chain))
    }

    /// The option's value: the bound setting, else the option's default.
    pub fn evaluate(&self, scope: &MacroScope, chain: &LookupChain<'_>) -> EvaluatedValue {
        let bound = scope.is_bound(&self.name) || chain.lookup(&self.name).is_some();
        match (&self.default_value, bound) {
            (Some(default), false) => {
                let value = match default {
                    MacroValue::String(expr) => scope.evaluate_string(expr, chain),
                    MacroValue::List(list) => {
                        let items = scope.evaluate_list(list, chain);
                        if self.kind() == OptionKind::List {
                            return EvaluatedValue::List(items);
                        }
                        items.join(" ")
                    }
                };
                match self.kind() {
                    OptionKind::Boolean => EvaluatedValue::Boolean(is_truthy(&value)),
                    OptionKind::Scalar => EvaluatedValue::String(value),
                    OptionKind::List => EvaluatedValue::List(
                        shlex::split(&value)
                            .unwrap_or_else(|| value.split_whitespace().map(str::to_string).collect()),
                    ),
                }
            }
            _ => scope.evaluate_setting(&self.name, self.macro_type(), chain),
        }
    }

    fn evaluate_bool(&self, scope: &MacroScope, chain: &LookupChain<'_>) -> bool {
        match self.evaluate(scope, chain) {
            EvaluatedValue::Boolean(value) => value,
            EvaluatedValue::String(value) => is_truthy(&value),
            EvaluatedValue::List(values) => values.iter().any(|v| is_truthy(v)),
        }
    }

    fn evaluate_list(&self, scope: &MacroScope, chain: &LookupChain<'_>) -> Vec<String> {
        match self.evaluate(scope, chain) {
            EvaluatedValue::List(values) => values,
            EvaluatedValue::String(value) if value.is_empty() => Vec::new(),
            EvaluatedValue::String(value) => vec![value],
            EvaluatedValue::Boolean(value) => vec![if value { "YES" } else { "NO" }.to_string()],
        }
    }

    fn evaluate_scalar(&self, scope: &MacroScope, chain: &LookupChain<'_>) -> String {
        match self.evaluate(scope, chain) {
            EvaluatedValue::String(value) => value,
            EvaluatedValue::List(values) => values.join(" "),
            EvaluatedValue::Boolean(value) => if value { "YES" } else { "NO" }.to_string(),
        }
    }

    /// The definition selected for a scalar value.
    fn scalar_definition(&self, value: &str) -> Option<&BuildOptionValue> {
        self.values
            .as_ref()
            .and_then(|values| values.get(value))
            .or(if value.is_empty() {
                self.empty_value.as_ref()
            } else {
                self.other_value.as_ref()
            })
    }

    fn argument(&self, value: String) -> CommandLineArgument {
        if self.ty.is_path() {
            CommandLineArgument::path(value)
        } else {
            CommandLineArgument::literal(value)
        }
    }

    /// The arguments this option contributes to a command line.
    ///
    /// Nothing is produced unless the current architecture, the input's file
    /// type, the tool version and features, and the condition all admit the
    /// option. A missing tool version never filters.
    pub fn get_arguments(
        &self,
        producer: &dyn CommandProducer,
        scope: &MacroScope,
        input_type: Option<&Spec>,
        context: Option<&dyn BuildOptionGenerationContext>,
        chain: &LookupChain<'_>,
    ) -> Vec<CommandLineArgument> {
        if !self.supports_architecture(&scope.current_arch()) {
            return Vec::new();
        }
        if let Some(input_type) = input_type {
            if !self.supports_file_type(producer, input_type) {
                return Vec::new();
            }
        }
        if !self.supports_tool(context) || !self.condition_holds(scope, chain) {
            return Vec::new();
        }

        match self.kind() {
            OptionKind::Boolean => {
                let value = self.evaluate_bool(scope, chain);
                let definition = if value { &self.other_value } else { &self.empty_value };
                let Some(template) = definition.as_ref().and_then(|d| d.command_line.as_ref()) else {
                    return Vec::new();
                };
                match template {
                    CommandLineTemplate::Args(expr) => {
                        let binding = ValueBinding(if value { "YES" } else { "NO" }.to_string());
                        let chain = chain.preceded_by(&binding);
                        scope
                            .evaluate_list(expr, &chain)
                            .into_iter()
                            .map(CommandLineArgument::Literal)
                            .collect()
                    }
                    CommandLineTemplate::Flag(flag) => {
                        vec![CommandLineArgument::Literal(scope.evaluate_string(flag, chain))]
                    }
                    // Rejected at parse time for booleans.
                    CommandLineTemplate::Empty
                    | CommandLineTemplate::Literal
                    | CommandLineTemplate::PrefixFlag(_) => Vec::new(),
                }
            }
            OptionKind::List => {
                let mut values = self.evaluate_list(scope, chain);
                let definition = if values.is_empty() {
                    &self.empty_value
                } else {
                    &self.other_value
                };
                let Some(template) = definition.as_ref().and_then(|d| d.command_line.as_ref()) else {
                    return Vec::new();
                };
                // Only a template declared for the empty value expands an
                // empty list, once, with an empty value.
                let declared_for_empty =
                    values.is_empty() && definition.as_ref().is_some_and(|d| !d.shares_general_template);
                if self.flatten_recursive_search_paths {
                    values = producer.expanded_search_paths(&values, scope);
                }
                if values.is_empty() {
                    if !declared_for_empty {
                        return Vec::new();
                    }
                    return match template {
                        CommandLineTemplate::Args(expr) => {
                            let binding = ValueBinding(String::new());
                            let chain = chain.preceded_by(&binding);
                            scope
                                .evaluate_list(expr, &chain)
                                .into_iter()
                                .map(CommandLineArgument::Literal)
                                .collect()
                        }
                        _ => Vec::new(),
                    };
                }
                match template {
                    CommandLineTemplate::Empty => Vec::new(),
                    CommandLineTemplate::Literal => {
                        values.into_iter().map(|value| self.argument(value)).collect()
                    }
                    CommandLineTemplate::Args(expr) => values
                        .into_iter()
                        .flat_map(|value| {
                            let binding = ValueBinding(value);
                            let chain = chain.preceded_by(&binding);
                            scope.evaluate_list(expr, &chain)
                        })
                        .map(|value| self.argument(value))
                        .collect(),
                    CommandLineTemplate::Flag(flag) => {
                        let flag = scope.evaluate_string(flag, chain);
                        values
                            .into_iter()
                            .flat_map(|value| [CommandLineArgument::literal(flag.clone()), self.argument(value)])
                            .collect()
                    }
                    CommandLineTemplate::PrefixFlag(flag) => {
                        let flag = scope.evaluate_string(flag, chain);
                        values
                            .into_iter()
                            .map(|value| CommandLineArgument::Joined {
                                flag: flag.clone(),
                                value,
                            })
                            .collect()
                    }
                }
            }
            OptionKind::Scalar => {
                let value = self.evaluate_scalar(scope, chain);
                let Some(template) = self
                    .scalar_definition(&value)
                    .and_then(|d| d.command_line.as_ref())
                else {
                    return Vec::new();
                };
                match template {
                    CommandLineTemplate::Empty => Vec::new(),
                    CommandLineTemplate::Literal => vec![self.argument(value)],
                    CommandLineTemplate::Args(expr) => {
                        let binding = ValueBinding(value);
                        let chain = chain.preceded_by(&binding);
                        scope
                            .evaluate_list(expr, &chain)
                            .into_iter()
                            .map(|arg| self.argument(arg))
                            .collect()
                    }
                    CommandLineTemplate::Flag(flag) => {
                        let flag = CommandLineArgument::Literal(scope.evaluate_string(flag, chain));
                        if self.ty == BuildOptionType::Enumeration {
                            vec![flag]
                        } else {
                            vec![flag, self.argument(value)]
                        }
                    }
                    CommandLineTemplate::PrefixFlag(flag) => vec![CommandLineArgument::Joined {
                        flag: scope.evaluate_string(flag, chain),
                        value,
                    }],
                }
            }
        }
    }

    /// The `(variable, value)` this option exports to the tool's environment.
    ///
    /// List values are joined with a single space, without quoting.
    pub fn get_environment_assignment(
        &self,
        producer: &dyn CommandProducer,
        scope: &MacroScope,
        primary_input_type: Option<&Spec>,
        chain: &LookupChain<'_>,
    ) -> Option<(String, String)> {
        let variable = self.environment_variable.as_ref()?;
        if !self.supports_architecture(&scope.current_arch()) {
            return None;
        }
        if !self.supports_file_type(producer, primary_input_type?) {
            return None;
        }
        if !self.condition_holds(scope, chain) {
            return None;
        }
        let key = scope.evaluate_string(variable, &LookupChain::new());
        if key.is_empty() {
            return None;
        }

        let value = match self.kind() {
            OptionKind::Boolean => {
                return Some((key, if self.evaluate_bool(scope, chain) { "YES" } else { "NO" }.to_string()));
            }
            OptionKind::List => self.evaluate_list(scope, chain).join(" "),
            OptionKind::Scalar => self.evaluate_scalar(scope, chain),
        };
        (!value.is_empty()).then_some((key, value))
    }

    /// Extra arguments for the linker when this option's current value asks
    /// for them.
    pub fn get_additional_linker_args(
        &self,
        producer: &dyn CommandProducer,
        scope: &MacroScope,
        input_types: &[&Spec],
    ) -> Vec<String> {
        if !input_types
            .iter()
            .any(|input_type| self.supports_file_type(producer, input_type))
        {
            return Vec::new();
        }
        let chain = LookupChain::new();
        if !self.condition_holds(scope, &chain) {
            return Vec::new();
        }

        match self.kind() {
            OptionKind::Boolean => {
                let definition = if self.evaluate_bool(scope, &chain) {
                    &self.other_value
                } else {
                    &self.empty_value
                };
                definition
                    .as_ref()
                    .and_then(|d| d.additional_linker_args.as_ref())
                    .map(|expr| scope.evaluate_list(expr, &chain))
                    .unwrap_or_default()
            }
            OptionKind::List => {
                let definition = if self.evaluate_list(scope, &chain).is_empty() {
                    &self.empty_value
                } else {
                    &self.other_value
                };
                definition
                    .as_ref()
                    .and_then(|d| d.additional_linker_args.as_ref())
                    .map(|expr| scope.evaluate_list(expr, &chain))
                    .unwrap_or_default()
            }
            OptionKind::Scalar => {
                let value = self.evaluate_scalar(scope, &chain);
                let Some(expr) = self
                    .scalar_definition(&value)
                    .and_then(|d| d.additional_linker_args.as_ref())
                else {
                    return Vec::new();
                };
                let binding = ValueBinding(value);
                scope.evaluate_list(expr, &LookupChain::new().then(&binding))
            }
        }
    }
}

impl fmt::Display for BuildOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.ty)
    }
}

fn parse_version_ranges(
    diag: &mut OptionDiagnostics<'_, '_>,
    key: &str,
    items: &[PropertyListItem],
) -> Vec<VersionRange> {
    let mut ranges = Vec::new();
    for item in items {
        match item {
            PropertyListItem::String(text) => {
                if let Ok(start) = text.parse::<Version>() {
                    ranges.push(VersionRange::from_start(start));
                } else if let Ok(start) = text.parse::<FuzzyVersion>() {
                    ranges.push(VersionRange::from_fuzzy_start(start));
                } else {
                    diag.error(format!("could not parse value '{}' in array for '{}'", text, key));
                }
            }
            PropertyListItem::Array(bounds) => {
                let parse = |index: usize| {
                    bounds
                        .get(index)
                        .and_then(PropertyListItem::as_str)
                        .and_then(|text| text.parse::<Version>().ok())
                };
                match bounds.len() {
                    1 => match parse(0) {
                        Some(start) => ranges.push(VersionRange::from_start(start)),
                        None => diag.error(format!(
                            "could not parse value '{}' in array for '{}'",
                            item, key
                        )),
                    },
                    2 => {
                        let Some(start) = parse(0) else {
                            diag.error(format!(
                                "could not parse first element of value '{}' in array for '{}'",
                                item, key
                            ));
                            continue;
                        };
                        let Some(end) = parse(1) else {
                            diag.error(format!(
                                "could not parse second element of value '{}' in array for '{}'",
                                item, key
                            ));
                            continue;
                        };
                        match VersionRange::bounded(start, end) {
                            Ok(range) => ranges.push(range),
                            Err(err) => diag.error(format!(
                                "unexpected value '{}' in array for '{}' - {}",
                                item, key, err
                            )),
                        }
                    }
                    _ => diag.error(format!(
                        "unexpected value '{}' in array for '{}' - array contains more than 2 elements",
                        item, key
                    )),
                }
            }
            other => diag.error(format!("unexpected value '{}' in array for '{}'", other, key)),
        }
    }
    ranges
}

/// One dictionary entry of `Values`.
fn parse_value_definition(
    diag: &mut OptionDiagnostics<'_, '_>,
    data: &PropertyListDict,
) -> Option<(String, BuildOptionValue)> {
    let value_label = data
        .get("Value")
        .and_then(PropertyListItem::as_str)
        .unwrap_or(UNKNOWN_NAME)
        .to_string();
    let option = diag.name.clone();
    let error = |parser: &mut SpecParser<'_>, message: String| {
        parser.error(format!(
            "{} for value '{}' in option '{}'",
            message, value_label, option
        ))
    };

    let mut value_name = None;
    let mut template = None;
    let mut command_line_key: Option<&str> = None;
    for (key, item) in data {
        let key = key.as_str();
        match key {
            "Value" => match item.as_str() {
                Some(text) => value_name = Some(text.to_string()),
                None => error(diag.parser, format!("invalid build option value key '{}'", key)),
            },
            "CommandLine" | "CommandLineArgs" | "CommandLineFlag" => {
                if let Some(previous) = command_line_key {
                    error(
                        diag.parser,
                        format!(
                            "invalid build option value key '{}', cannot combine with '{}'",
                            key, previous
                        ),
                    );
                    continue;
                }
                let context = format!("{} for value '{}'", key, value_label);
                let parsed = match (key, item) {
                    ("CommandLine", PropertyListItem::String(text)) => {
                        Some(CommandLineTemplate::Args(diag.parser.macro_list(text, &context)))
                    }
                    ("CommandLineArgs", PropertyListItem::Array(items)) => {
                        let strings = strings_in(items, |_| {
                            error(diag.parser, "expected string in 'CommandLineArgs'".to_string())
                        });
                        Some(CommandLineTemplate::Args(
                            diag.parser.macro_list_items(&strings, &context),
                        ))
                    }
                    ("CommandLineArgs", _) => {
                        error(
                            diag.parser,
                            format!("expected array value for build option value key '{}'", key),
                        );
                        None
                    }
                    ("CommandLineFlag", PropertyListItem::String(text)) if text.is_empty() => {
                        Some(CommandLineTemplate::Empty)
                    }
                    ("CommandLineFlag", PropertyListItem::String(text)) => {
                        Some(CommandLineTemplate::Flag(diag.parser.macro_string(text, &context)))
                    }
                    _ => {
                        error(
                            diag.parser,
                            format!("expected string value for build option value key '{}'", key),
                        );
                        None
                    }
                };
                if parsed.is_some() {
                    template = parsed;
                    command_line_key = Some(key);
                }
            }
            "DisplayName" | "Outputs" => {}
            _ => error(diag.parser, format!("unknown build option value key '{}'", key)),
        }
    }

    match value_name {
        Some(value) => Some((
            value,
            BuildOptionValue {
                command_line: template,
                additional_linker_args: None,
                shares_general_template: false,
            },
        )),
        None => {
            diag.parser.error(format!(
                "missing build option value key 'Value' in option '{}'",
                option
            ));
            None
        }
    }
}

/// A `CommandLineArgs` dictionary entry.
fn dict_args_template(
    diag: &mut OptionDiagnostics<'_, '_>,
    key: &str,
    item: &PropertyListItem,
) -> Option<CommandLineTemplate> {
    let context = format!("'{}' in 'CommandLineArgs'", key);
    match item {
        PropertyListItem::String(text) if text.is_empty() => Some(CommandLineTemplate::Empty),
        PropertyListItem::String(text) => {
            Some(CommandLineTemplate::Args(diag.parser.macro_list(text, &context)))
        }
        PropertyListItem::Array(items) if items.is_empty() => Some(CommandLineTemplate::Empty),
        PropertyListItem::Array(items) => {
            let strings = strings_in(items, |_| {
                diag.error(format!("expected string for '{}' in 'CommandLineArgs'", key))
            });
            Some(CommandLineTemplate::Args(
                diag.parser.macro_list_items(&strings, &context),
            ))
        }
        _ => {
            diag.error(format!(
                "invalid build option value for '{}' in 'CommandLineArgs'",
                key
            ));
            None
        }
    }
}

/// Give every value definition without a template the fallback `template`.
fn propagate_template(
    values: &mut Option<BTreeMap<String, BuildOptionValue>>,
    template: &CommandLineTemplate,
) {
    for definition in values.iter_mut().flat_map(|values| values.values_mut()) {
        if definition.command_line.is_none() {
            definition.command_line = Some(template.clone());
        }
    }
}

type ValueDefinitions = (
    Option<BuildOptionValue>,
    Option<BuildOptionValue>,
    Option<BTreeMap<String, BuildOptionValue>>,
);

/// Combine `Values`, the command-line key and `AdditionalLinkerArgs` into
/// the empty, other and per-value definitions.
fn parse_value_definitions(
    diag: &mut OptionDiagnostics<'_, '_>,
    ty: BuildOptionType,
    specifier: Option<CommandLineSpecifier>,
    mut values_data: Option<&[PropertyListItem]>,
    linker_args: Option<&PropertyListDict>,
) -> ValueDefinitions {
    if !ty.supports_values() && values_data.is_some() {
        diag.error(format!("invalid build option key 'Values' used with type '{}'", ty));
        values_data = None;
    }
    if ty == BuildOptionType::Enumeration && values_data.is_none() {
        let message = format!(
            "missing required build option key 'Values' used with type '{}' for option '{}'",
            ty, diag.name
        );
        diag.parser.warning(message);
    }

    let mut values: Option<BTreeMap<String, BuildOptionValue>> = None;
    if let Some(items) = values_data {
        let mut definitions = BTreeMap::new();
        for item in items {
            let (value, definition) = match item {
                PropertyListItem::String(value) => (value.clone(), BuildOptionValue::default()),
                PropertyListItem::Dict(dict) => match parse_value_definition(diag, dict) {
                    Some(parsed) => parsed,
                    None => continue,
                },
                other => {
                    diag.error(format!("invalid value definition data '{}'", other));
                    continue;
                }
            };
            if definitions.contains_key(&value) {
                diag.error(format!("duplicate value definition '{}'", value));
                continue;
            }
            definitions.insert(value, definition);
        }
        values = Some(definitions);
    }

    let mut empty_value = None;
    let mut other_value = None;
    match specifier {
        Some(CommandLineSpecifier::DictArgs(dict)) => {
            for (key, item) in &dict {
                let Some(template) = dict_args_template(diag, key, item) else {
                    continue;
                };
                match key.as_str() {
                    "" => empty_value = Some(BuildOptionValue::with_template(template)),
                    OTHERWISE => other_value = Some(BuildOptionValue::with_template(template)),
                    _ => {
                        let definitions = values.get_or_insert_with(BTreeMap::new);
                        match definitions.get_mut(key) {
                            Some(existing) if existing.command_line.is_some() => diag.error(format!(
                                "invalid key '{}' in 'CommandLineArgs', a command line template was already defined in 'Values'",
                                key
                            )),
                            Some(existing) => existing.command_line = Some(template),
                            None => {
                                definitions.insert(key.clone(), BuildOptionValue::with_template(template));
                            }
                        }
                    }
                }
            }
            if let Some(template) = other_value.as_ref().and_then(|d| d.command_line.clone()) {
                propagate_template(&mut values, &template);
            }
        }
        Some(CommandLineSpecifier::ArrayArgs(items)) if items.is_empty() => {
            other_value = Some(BuildOptionValue::with_template(CommandLineTemplate::Empty));
        }
        Some(CommandLineSpecifier::StringArgs(text)) if text.is_empty() => {
            other_value = Some(BuildOptionValue::with_template(CommandLineTemplate::Empty));
        }
        Some(CommandLineSpecifier::ArrayArgs(items)) => {
            let template = CommandLineTemplate::Args(diag.parser.macro_list_items(&items, "CommandLineArgs"));
            propagate_template(&mut values, &template);
            other_value = Some(BuildOptionValue::with_template(template));
            empty_value = other_value.clone().map(BuildOptionValue::shared);
        }
        Some(CommandLineSpecifier::StringArgs(text)) => {
            let template = CommandLineTemplate::Args(diag.parser.macro_list(&text, "CommandLineArgs"));
            propagate_template(&mut values, &template);
            other_value = Some(BuildOptionValue::with_template(template));
            empty_value = other_value.clone().map(BuildOptionValue::shared);
        }
        Some(CommandLineSpecifier::Flag(text)) => {
            let template = if text.is_empty() {
                if ty == BuildOptionType::Boolean {
                    CommandLineTemplate::Empty
                } else {
                    CommandLineTemplate::Literal
                }
            } else {
                CommandLineTemplate::Flag(diag.parser.macro_string(&text, "CommandLineFlag"))
            };
            other_value = Some(BuildOptionValue::with_template(template));
        }
        Some(CommandLineSpecifier::PrefixFlag(text)) => {
            if ty == BuildOptionType::Boolean {
                diag.error("invalid build option key 'CommandLinePrefixFlag' used with type 'Boolean'");
            } else if text.is_empty() {
                other_value = Some(BuildOptionValue::with_template(CommandLineTemplate::Literal));
            } else {
                let flag = diag.parser.macro_string(&text, "CommandLinePrefixFlag");
                other_value = Some(BuildOptionValue::with_template(CommandLineTemplate::PrefixFlag(flag)));
            }
        }
        None => {}
    }

    // Booleans only have the empty (NO) and other (YES) definitions.
    if ty == BuildOptionType::Boolean {
        if let Some(definitions) = &values {
            for (key, definition) in definitions {
                match key.as_str() {
                    "NO" => empty_value = Some(definition.clone()),
                    "YES" => other_value = Some(definition.clone()),
                    _ => diag.error(format!(
                        "unexpected '{}' value definition for boolean type (expected only 'YES' or 'NO')",
                        key
                    )),
                }
            }
        }
    }

    if let Some(linker_args) = linker_args {
        for (key, item) in linker_args {
            let context = format!("'{}' in 'AdditionalLinkerArgs'", key);
            let expr = match item {
                PropertyListItem::String(text) if text.is_empty() => continue,
                PropertyListItem::String(text) => diag.parser.macro_list(text, &context),
                PropertyListItem::Array(items) if items.is_empty() => continue,
                PropertyListItem::Array(items) => {
                    let strings = strings_in(items, |_| {
                        diag.error(format!("expected string for '{}' in 'AdditionalLinkerArgs'", key))
                    });
                    diag.parser.macro_list_items(&strings, &context)
                }
                _ => {
                    diag.error(format!("unexpected value for '{}' in 'AdditionalLinkerArgs'", key));
                    continue;
                }
            };

            if ty == BuildOptionType::Boolean {
                match key.as_str() {
                    "NO" => empty_value = Some(BuildOptionValue::with_linker_args(empty_value, expr)),
                    "YES" => other_value = Some(BuildOptionValue::with_linker_args(other_value, expr)),
                    _ => diag.error(format!(
                        "unexpected '{}' linker args definition for boolean type (expected only 'YES' or 'NO')",
                        key
                    )),
                }
                continue;
            }

            match key.as_str() {
                "" => empty_value = Some(BuildOptionValue::with_linker_args(empty_value, expr)),
                OTHERWISE => {
                    // Values with their own linker args entry keep them, even when empty.
                    for (value, definition) in values.iter_mut().flat_map(|v| v.iter_mut()) {
                        if !linker_args.contains_key(value) && definition.additional_linker_args.is_none() {
                            definition.additional_linker_args = Some(expr.clone());
                        }
                    }
                    other_value = Some(BuildOptionValue::with_linker_args(other_value, expr));
                }
                _ => {
                    let definitions = values.get_or_insert_with(BTreeMap::new);
                    let existing = definitions.remove(key);
                    definitions.insert(key.clone(), BuildOptionValue::with_linker_args(existing, expr));
                }
            }
        }
    }

    (empty_value, other_value, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_type::FileTypeSpec;
    use crate::core::macros::MacroNamespace;
    use crate::core::spec::{SpecKind, SpecType};
    use crate::util::Diagnostics;
    use std::sync::Arc;

    struct Producer {
        file_types: Vec<Arc<Spec>>,
    }

    impl CommandProducer for Producer {
        fn lookup_file_type(&self, identifier: &str) -> Option<Arc<Spec>> {
            self.file_types
                .iter()
                .find(|spec| spec.identifier == identifier)
                .cloned()
        }
    }

    fn producer() -> Producer {
        Producer {
            file_types: vec![file_type("sourcecode.c", None), file_type("sourcecode.cpp", None)],
        }
    }

    fn file_type(identifier: &str, base: Option<Arc<Spec>>) -> Arc<Spec> {
        let mut spec = Spec::builtin(
            identifier,
            SpecType::FileType,
            SpecKind::FileType(FileTypeSpec::default()),
        );
        spec.base = base;
        Arc::new(spec)
    }

    struct Tool {
        version: Option<Version>,
        features: Vec<&'static str>,
    }

    impl BuildOptionGenerationContext for Tool {
        fn tool_version(&self) -> Option<&Version> {
            self.version.as_ref()
        }

        fn has_feature(&self, flag: &str) -> bool {
            self.features.contains(&flag)
        }
    }

    fn parse_with(ns: &MacroNamespace, json: &str) -> (BuildOption, Diagnostics) {
        let data = PropertyListItem::from_json_str(json).unwrap();
        let record = PropertyListDict::new();
        let mut parser = SpecParser::new("test.tool", &record, ns);
        let option = BuildOption::parse(&mut parser, &data);
        (option, parser.into_diagnostics())
    }

    fn parse(json: &str) -> BuildOption {
        let ns = MacroNamespace::new();
        let (option, diags) = parse_with(&ns, json);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        option
    }

    fn errors(json: &str) -> Vec<String> {
        let ns = MacroNamespace::new();
        let (_, diags) = parse_with(&ns, json);
        diags.iter().map(|d| d.message.clone()).collect()
    }

    fn args(option: &BuildOption, scope: &MacroScope) -> Vec<String> {
        option
            .get_arguments(&producer(), scope, None, None, &LookupChain::new())
            .iter()
            .map(CommandLineArgument::as_string)
            .collect()
    }

    #[test]
    fn test_boolean_flag() {
        let option = parse(r#"{"Name": "FOO", "Type": "Boolean", "CommandLineFlag": "-foo"}"#);
        assert_eq!(args(&option, &MacroScope::new().with("FOO", "YES")), ["-foo"]);
        assert!(args(&option, &MacroScope::new().with("FOO", "NO")).is_empty());
    }

    #[test]
    fn test_path_list_flag_per_value() {
        let option = parse(r#"{"Name": "BAR", "Type": "PathList", "CommandLineFlag": "-I"}"#);
        let scope = MacroScope::new().with("BAR", vec!["/a".to_string(), "/b".to_string()]);
        let result = option.get_arguments(&producer(), &scope, None, None, &LookupChain::new());
        assert_eq!(
            result,
            vec![
                CommandLineArgument::literal("-I"),
                CommandLineArgument::path("/a"),
                CommandLineArgument::literal("-I"),
                CommandLineArgument::path("/b"),
            ]
        );
    }

    #[test]
    fn test_list_prefix_flag_joins() {
        let option = parse(r#"{"Name": "LIBS", "Type": "StringList", "CommandLinePrefixFlag": "-l"}"#);
        let scope = MacroScope::new().with("LIBS", vec!["z".to_string(), "m".to_string()]);
        let result = option.get_arguments(&producer(), &scope, None, None, &LookupChain::new());
        assert_eq!(
            result,
            vec![
                CommandLineArgument::Joined { flag: "-l".into(), value: "z".into() },
                CommandLineArgument::Joined { flag: "-l".into(), value: "m".into() },
            ]
        );
    }

    #[test]
    fn test_list_empty_template() {
        let option = parse(
            r#"{"Name": "L", "Type": "StringList", "CommandLineArgs": {"": ["-none"], "<<otherwise>>": ["-x", "$(value)"]}}"#,
        );
        assert_eq!(args(&option, &MacroScope::new()), ["-none"]);
        let scope = MacroScope::new().with("L", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(args(&option, &scope), ["-x", "a", "-x", "b"]);
    }

    #[test]
    fn test_list_args_skip_empty_list() {
        let framework = parse(r#"{"Name": "FW", "Type": "StringList", "CommandLineArgs": ["-framework", "$(value)"]}"#);
        assert!(args(&framework, &MacroScope::new()).is_empty());
        let scope = MacroScope::new().with("FW", vec!["Foundation".to_string()]);
        assert_eq!(args(&framework, &scope), ["-framework", "Foundation"]);

        let include = parse(r#"{"Name": "INC", "Type": "PathList", "CommandLineArgs": "-I$(value)"}"#);
        assert!(args(&include, &MacroScope::new()).is_empty());
        assert!(args(&include, &MacroScope::new().with("INC", Vec::<String>::new())).is_empty());
    }

    #[test]
    fn test_scalar_args_and_value_definitions() {
        let option = parse(
            r#"{"Name": "OPT", "Type": "Enumeration",
                "Values": ["0", {"Value": "s", "CommandLineFlag": "-Os"}],
                "CommandLineArgs": {"<<otherwise>>": "-O$(value)"}}"#,
        );
        assert_eq!(args(&option, &MacroScope::new().with("OPT", "s")), ["-Os"]);
        assert_eq!(args(&option, &MacroScope::new().with("OPT", "0")), ["-O0"]);
        assert_eq!(args(&option, &MacroScope::new().with("OPT", "3")), ["-O3"]);
        assert!(args(&option, &MacroScope::new()).is_empty());
    }

    #[test]
    fn test_string_flag_and_default() {
        let option = parse(r#"{"Name": "SDK", "Type": "String", "DefaultValue": "macosx", "CommandLineFlag": "-sdk"}"#);
        assert_eq!(args(&option, &MacroScope::new()), ["-sdk", "macosx"]);
        assert_eq!(args(&option, &MacroScope::new().with("SDK", "ios")), ["-sdk", "ios"]);
        assert!(args(&option, &MacroScope::new().with("SDK", "")).is_empty());
    }

    #[test]
    fn test_string_args_apply_to_empty_values() {
        let option = parse(r#"{"Name": "S", "Type": "String", "CommandLineArgs": ["-s=$(value)"]}"#);
        assert_eq!(args(&option, &MacroScope::new()), ["-s="]);
    }

    #[test]
    fn test_filters_are_independent() {
        let option = parse(
            r#"{"Name": "F", "Type": "Boolean", "CommandLineFlag": "-f",
                "Architectures": ["arm64"], "FileTypes": ["sourcecode.c"],
                "SupportedVersionRanges": ["10"], "FeatureFlags": ["fancy"],
                "Condition": "$(ENABLE) == YES"}"#,
        );
        let c = file_type("sourcecode.c", None);
        let cpp = file_type("sourcecode.cpp", None);
        let good_tool = Tool { version: Some("11.2".parse().unwrap()), features: vec!["fancy"] };
        let old_tool = Tool { version: Some("9".parse().unwrap()), features: vec!["fancy"] };
        let plain_tool = Tool { version: Some("11".parse().unwrap()), features: vec![] };
        let unknown_version = Tool { version: None, features: vec!["fancy"] };
        let base = MacroScope::new().with("F", "YES").with("ENABLE", "YES");

        let run = |scope: &MacroScope, input: &Spec, tool: &Tool| {
            option
                .get_arguments(&producer(), scope, Some(input), Some(tool), &LookupChain::new())
                .len()
        };
        let arm = base.clone().with("CURRENT_ARCH", "arm64");
        assert_eq!(run(&arm, &c, &good_tool), 1);
        assert_eq!(run(&arm, &c, &unknown_version), 1);
        assert_eq!(run(&base.clone().with("CURRENT_ARCH", "x86_64"), &c, &good_tool), 0);
        assert_eq!(run(&arm, &cpp, &good_tool), 0);
        assert_eq!(run(&arm, &c, &old_tool), 0);
        assert_eq!(run(&arm, &c, &plain_tool), 0);
        assert_eq!(run(&arm.clone().with("ENABLE", "NO"), &c, &good_tool), 0);
    }

    #[test]
    fn test_file_type_conformance() {
        let option = parse(r#"{"Name": "F", "Type": "Boolean", "CommandLineFlag": "-f", "FileTypes": ["sourcecode.c"]}"#);
        let c = file_type("sourcecode.c", None);
        let derived = file_type("sourcecode.c.preprocessed", Some(c));
        assert!(option.supports_file_type(&producer(), &derived));
    }

    #[test]
    fn test_linker_args_do_not_change_command_line() {
        let plain = parse(r#"{"Name": "DEAD", "Type": "Boolean", "Values": [{"Value": "YES", "CommandLineFlag": "-dead"}, "NO"]}"#);
        let with_linker = parse(
            r#"{"Name": "DEAD", "Type": "Boolean", "Values": [{"Value": "YES", "CommandLineFlag": "-dead"}, "NO"],
                "AdditionalLinkerArgs": {"YES": ["-dead_strip"], "NO": ""}}"#,
        );
        let c = file_type("sourcecode.c", None);
        for value in ["YES", "NO"] {
            let scope = MacroScope::new().with("DEAD", value);
            assert_eq!(args(&plain, &scope), args(&with_linker, &scope));
        }
        let scope = MacroScope::new().with("DEAD", "YES");
        assert_eq!(
            with_linker.get_additional_linker_args(&producer(), &scope, &[&c]),
            ["-dead_strip"]
        );
        assert!(plain
            .get_additional_linker_args(&producer(), &scope, &[&c])
            .is_empty());
    }

    #[test]
    fn test_linker_args_otherwise() {
        let option = parse(
            r#"{"Name": "MODE", "Type": "Enumeration", "Values": ["a", "b"],
                "AdditionalLinkerArgs": {"a": [], "<<otherwise>>": "-other $(value)"}}"#,
        );
        let c = file_type("sourcecode.c", None);
        let linker = |value: &str| {
            option.get_additional_linker_args(&producer(), &MacroScope::new().with("MODE", value), &[&c])
        };
        assert!(linker("a").is_empty());
        assert_eq!(linker("b"), ["-other", "b"]);
        assert_eq!(linker("zzz"), ["-other", "zzz"]);
    }

    #[test]
    fn test_environment_assignment() {
        let option = parse(r#"{"Name": "PATHS", "Type": "StringList", "SetValueInEnvironmentVariable": "TOOL_PATHS"}"#);
        let c = file_type("sourcecode.c", None);
        let scope = MacroScope::new().with("PATHS", vec!["/a".to_string(), "/b c".to_string()]);
        let chain = LookupChain::new();
        assert_eq!(
            option.get_environment_assignment(&producer(), &scope, Some(&c), &chain),
            Some(("TOOL_PATHS".to_string(), "/a /b c".to_string()))
        );
        assert_eq!(option.get_environment_assignment(&producer(), &scope, None, &chain), None);
        assert_eq!(
            option.get_environment_assignment(&producer(), &MacroScope::new(), Some(&c), &chain),
            None
        );

        let arm_only = parse(
            r#"{"Name": "E", "Type": "String", "Architectures": ["arm64"], "SetValueInEnvironmentVariable": "E_ENV"}"#,
        );
        let intel = MacroScope::new().with("E", "v").with("CURRENT_ARCH", "x86_64");
        assert_eq!(arm_only.get_environment_assignment(&producer(), &intel, Some(&c), &chain), None);
        let arm = MacroScope::new().with("E", "v").with("CURRENT_ARCH", "arm64");
        assert_eq!(
            arm_only.get_environment_assignment(&producer(), &arm, Some(&c), &chain),
            Some(("E_ENV".to_string(), "v".to_string()))
        );

        let flag = parse(r#"{"Name": "ON", "Type": "Boolean", "SetValueInEnvironmentVariable": "ON_ENV"}"#);
        assert_eq!(
            flag.get_environment_assignment(&producer(), &MacroScope::new(), Some(&c), &chain),
            Some(("ON_ENV".to_string(), "NO".to_string()))
        );
    }

    #[test]
    fn test_type_inference_from_declaration() {
        let ns = MacroNamespace::new();
        ns.declare("FLAGS", MacroType::StringList).unwrap();
        let (option, diags) = parse_with(&ns, r#"{"Name": "FLAGS"}"#);
        assert_eq!(option.ty, BuildOptionType::StringList);
        assert_eq!(
            diags.iter().map(|d| d.message.as_str()).collect::<Vec<_>>(),
            ["build option 'FLAGS' missing type declaration (as 'StringList')"]
        );

        let (option, diags) = parse_with(&ns, r#"{"Name": "UNDECLARED"}"#);
        assert_eq!(option.ty, BuildOptionType::String);
        assert!(diags.is_empty());
        assert_eq!(ns.lookup("UNDECLARED"), Some(MacroType::String));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            errors(r#"{"Name": "X", "CommandLineFlag": "-x", "CommandLineArgs": ["-y"]}"#),
            ["invalid build option key 'CommandLineFlag', cannot combine with 'CommandLineArgs' for option 'X'"]
        );
        assert_eq!(
            errors(r#"{"Name": "X", "Type": "String", "Values": ["a"]}"#),
            ["invalid build option key 'Values' used with type 'String' for option 'X'"]
        );
        assert_eq!(
            errors(r#"{"Name": "X", "Type": "Boolean", "Values": ["YES", "YES"]}"#),
            ["duplicate value definition 'YES' for option 'X'"]
        );
        assert_eq!(
            errors(r#"{"Name": "X", "Bogus": 1}"#),
            ["unknown build option key 'Bogus' for option 'X'"]
        );
        let messages = errors(r#"{"Name": "1X"}"#);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "'1X' is not a valid build setting name");
        assert!(messages[1].starts_with("missing build option key 'Name'"));
        assert_eq!(
            errors(r#"{"Name": "X", "Type": "Enumeration", "Values": [{"CommandLineFlag": "-a"}]}"#),
            ["missing build option value key 'Value' in option 'X'"]
        );
        assert_eq!(
            errors(r#"{"Name": "X", "Type": "Boolean", "Values": ["MAYBE"]}"#),
            ["unexpected 'MAYBE' value definition for boolean type (expected only 'YES' or 'NO') for option 'X'"]
        );
    }

    #[test]
    fn test_enumeration_without_values_warns() {
        let ns = MacroNamespace::new();
        let (_, diags) = parse_with(&ns, r#"{"Name": "E", "Type": "enum"}"#);
        assert!(!diags.has_errors());
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn test_version_ranges() {
        let option = parse(r#"{"Name": "V", "SupportedVersionRanges": ["1100.*.2", ["3", "5.1"], ["7"]]}"#);
        let ranges = option.supported_version_ranges.unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges[1].contains(&"5.1.0".parse().unwrap()));
        assert!(!ranges[1].contains(&"5.2".parse().unwrap()));

        let messages = errors(r#"{"Name": "V", "SupportedVersionRanges": [["5", "3"], ["1", "2", "3"], "x.y"]}"#);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].starts_with("unexpected value '(\"5\", \"3\")' in array for 'SupportedVersionRanges' - "));
        assert!(messages[1].ends_with("array contains more than 2 elements for option 'V'"));
        assert_eq!(messages[2], "could not parse value 'x.y' in array for 'SupportedVersionRanges' for option 'V'");
    }

    #[test]
    fn test_localized_display_strings() {
        let data = PropertyListItem::from_json_str(r#"{"Name": "GCC_X", "Description": "explicit"}"#).unwrap();
        let record = PropertyListDict::new();
        let ns = MacroNamespace::new();
        let strings: crate::core::parser::LocalizedStrings = [
            ("[GCC_X]-name".to_string(), "Fancy X".to_string()),
            ("[GCC_X]-description".to_string(), "localized".to_string()),
            ("[GCC_X]-category".to_string(), "Code Generation".to_string()),
        ]
        .into();
        let mut parser = SpecParser::new("t", &record, &ns).with_localized(&strings);
        let option = BuildOption::parse(&mut parser, &data);
        assert_eq!(option.display_name, "Fancy X");
        assert_eq!(option.description.as_deref(), Some("explicit"));
        assert_eq!(option.category.as_deref(), Some("Code Generation"));
    }
}

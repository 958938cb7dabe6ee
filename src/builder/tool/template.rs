//! `CommandLine` and `RuleName` templates.

use std::fmt;

use crate::core::macros::MacroStringList;
use crate::core::parser::SpecParser;

/// One element of a `CommandLine` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLineTemplateArg {
    ExecPath,
    Input,
    Inputs,
    /// Arguments of every active build option, in flattened order.
    Options,
    Output,
    SpecialArgs,
    Literal(MacroStringList),
}

/// One element of a `RuleName` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleInfoTemplateArg {
    /// A fixed string, for templates built in code.
    String(String),
    Input,
    Inputs,
    Output,
    Literal(MacroStringList),
}

fn is_placeholder(component: &str) -> bool {
    component.starts_with('[') && component.ends_with(']')
}

/// Tracks placeholders already seen in one template.
struct Placeholders<'k> {
    key: &'k str,
    seen: Vec<&'static str>,
}

impl<'k> Placeholders<'k> {
    fn new(key: &'k str) -> Self {
        Placeholders { key, seen: Vec::new() }
    }

    fn see(&mut self, parser: &mut SpecParser<'_>, placeholder: &'static str) {
        let exclusive = match placeholder {
            "[input]" => Some("[inputs]"),
            "[inputs]" => Some("[input]"),
            _ => None,
        };
        if exclusive.is_some_and(|other| self.seen.contains(&other)) {
            parser.error(format!(
                "invalid '{}' template: cannot use both '[input]' and '[inputs]'",
                self.key
            ));
        }
        if self.seen.contains(&placeholder) {
            parser.error(format!("duplicate '{}' template arg: '{}'", self.key, placeholder));
        }
        self.seen.push(placeholder);
    }

    fn literal(&self, parser: &mut SpecParser<'_>, component: &str) -> MacroStringList {
        if is_placeholder(component) {
            parser.error(format!(
                "invalid '{}' template placeholder arg: '{}'",
                self.key, component
            ));
            return MacroStringList::literal(&[component]);
        }
        parser.macro_list(component, &format!("'{}' template", self.key))
    }
}

pub fn parse_command_line_template(
    parser: &mut SpecParser<'_>,
    components: &[String],
) -> Vec<CommandLineTemplateArg> {
    let mut placeholders = Placeholders::new("CommandLine");
    components
        .iter()
        .map(|component| {
            let (placeholder, arg) = match component.as_str() {
                "[exec-path]" => ("[exec-path]", CommandLineTemplateArg::ExecPath),
                "[input]" => ("[input]", CommandLineTemplateArg::Input),
                "[inputs]" => ("[inputs]", CommandLineTemplateArg::Inputs),
                "[options]" => ("[options]", CommandLineTemplateArg::Options),
                "[output]" => ("[output]", CommandLineTemplateArg::Output),
                "[special-args]" => ("[special-args]", CommandLineTemplateArg::SpecialArgs),
                other => return CommandLineTemplateArg::Literal(placeholders.literal(parser, other)),
            };
            placeholders.see(parser, placeholder);
            arg
        })
        .collect()
}

pub fn parse_rule_info_template(
    parser: &mut SpecParser<'_>,
    components: &[String],
) -> Vec<RuleInfoTemplateArg> {
    let mut placeholders = Placeholders::new("RuleName");
    components
        .iter()
        .map(|component| {
            let (placeholder, arg) = match component.as_str() {
                "[input]" => ("[input]", RuleInfoTemplateArg::Input),
                "[inputs]" => ("[inputs]", RuleInfoTemplateArg::Inputs),
                "[output]" => ("[output]", RuleInfoTemplateArg::Output),
                other => return RuleInfoTemplateArg::Literal(placeholders.literal(parser, other)),
            };
            placeholders.see(parser, placeholder);
            arg
        })
        .collect()
}

impl fmt::Display for CommandLineTemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLineTemplateArg::ExecPath => f.write_str("[exec-path]"),
            CommandLineTemplateArg::Input => f.write_str("[input]"),
            CommandLineTemplateArg::Inputs => f.write_str("[inputs]"),
            CommandLineTemplateArg::Options => f.write_str("[options]"),
            CommandLineTemplateArg::Output => f.write_str("[output]"),
            CommandLineTemplateArg::SpecialArgs => f.write_str("[special-args]"),
            CommandLineTemplateArg::Literal(list) => write!(f, "{}", list),
        }
    }
}

//! Describing one spec and its flattened build options.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::core::macros::MacroValue;
use crate::core::registry::SpecRegistry;
use crate::core::spec::SpecKind;
use crate::util::diagnostic::suggestions;

/// One build option as shown by `specforge show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Where the option was declared, if not in the spec itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
}

/// Everything `specforge show` prints.
#[derive(Debug, Clone, Serialize)]
pub struct SpecDetails {
    pub identifier: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub path: PathBuf,
    /// The `BasedOn` chain, nearest first
    pub bases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_path: Option<String>,
    pub options: Vec<OptionSummary>,
}

fn format_value(value: &MacroValue) -> String {
    match value {
        MacroValue::String(expr) => expr.to_string(),
        MacroValue::List(list) => format!("({})", list),
    }
}

/// Load `identifier` as seen from `domain` and describe it.
pub fn show_spec(registry: &SpecRegistry, identifier: &str, domain: &str) -> Result<SpecDetails> {
    let proxy = registry.lookup_proxy(identifier, domain).ok_or_else(|| {
        anyhow!(
            "spec `{}` not found in domain `{}`\n{}",
            identifier,
            domain,
            suggestions::SPEC_NOT_FOUND
        )
    })?;
    let spec = registry.load(proxy).ok_or_else(|| {
        let reasons: Vec<String> = registry
            .load_errors(proxy)
            .iter()
            .map(|d| d.format(false))
            .collect();
        anyhow!(
            "unable to load spec {}\n{}{}",
            proxy.specifier_string(),
            reasons.concat(),
            suggestions::CHECK_SPECS
        )
    })?;

    let own: Vec<&str> = spec
        .property_domain()
        .map(|domain| domain.options.iter().map(|o| o.name.as_str()).collect())
        .unwrap_or_default();

    let options = spec
        .property_domain()
        .map(|domain| {
            domain
                .flattened_ordered_options()
                .iter()
                .map(|option| OptionSummary {
                    name: option.name.clone(),
                    ty: option.ty.as_str().to_string(),
                    default: option.default_value.as_ref().map(format_value),
                    category: option.category.clone(),
                    inherited_from: if own.contains(&option.name.as_str()) {
                        None
                    } else {
                        spec.base_chain()
                            .skip(1)
                            .find(|base| {
                                base.property_domain().is_some_and(|d| {
                                    d.options.iter().any(|o| o.name == option.name)
                                })
                            })
                            .map(|base| base.identifier.clone())
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    let exec_path = match &spec.kind {
        SpecKind::Tool(tool) => tool.exec_path.as_ref().map(ToString::to_string),
        _ => None,
    };

    Ok(SpecDetails {
        identifier: spec.identifier.clone(),
        domain: spec.domain.clone(),
        ty: spec.ty.to_string(),
        class: spec.class.map(|class| class.to_string()),
        name: spec.name.clone(),
        description: spec.description.clone(),
        path: spec.path.clone(),
        bases: spec.base_chain().skip(1).map(|base| base.specifier()).collect(),
        exec_path,
        options,
    })
}

/// Human-readable rendering of [`SpecDetails`].
pub fn format_spec_details(details: &SpecDetails) -> String {
    let mut output = format!("{} ({})\n", details.identifier, details.ty);
    if let Some(name) = &details.name {
        output.push_str(&format!("  name: {}\n", name));
    }
    if let Some(class) = &details.class {
        output.push_str(&format!("  class: {}\n", class));
    }
    output.push_str(&format!("  path: {}\n", details.path.display()));
    for base in &details.bases {
        output.push_str(&format!("  based on: {}\n", base));
    }
    if let Some(exec_path) = &details.exec_path {
        output.push_str(&format!("  exec path: {}\n", exec_path));
    }

    if details.options.is_empty() {
        return output;
    }
    output.push_str("\nOptions:\n");
    let width = details.options.iter().map(|o| o.name.len()).max().unwrap_or(0);
    for option in &details.options {
        output.push_str(&format!("  {:<width$}  {}", option.name, option.ty));
        if let Some(default) = &option.default {
            output.push_str(&format!(" = {}", default));
        }
        if let Some(base) = &option.inherited_from {
            output.push_str(&format!("    # from: {}", base));
        }
        output.push('\n');
    }
    output
}

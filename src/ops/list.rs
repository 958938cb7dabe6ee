//! Listing registered specs.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::registry::SpecRegistry;
use crate::core::spec::SpecType;

/// Filters for [`list_specs`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only specs visible from this domain (including inherited domains)
    pub domain: Option<String>,

    /// Only specs of this type
    pub ty: Option<SpecType>,
}

/// One line of `specforge list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecSummary {
    pub identifier: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on: Option<String>,
    pub path: PathBuf,
}

/// Registered specs matching `opts`, sorted by identifier then domain.
pub fn list_specs(registry: &SpecRegistry, opts: &ListOptions) -> Vec<SpecSummary> {
    let visible = opts
        .domain
        .as_deref()
        .map(|domain| registry.domain_search_list(domain));

    registry
        .proxies()
        .into_iter()
        .filter(|proxy| opts.ty.is_none_or(|ty| proxy.ty == ty))
        .filter(|proxy| {
            visible
                .as_ref()
                .is_none_or(|domains| domains.contains(&proxy.domain))
        })
        .map(|proxy| SpecSummary {
            identifier: proxy.identifier.clone(),
            domain: proxy.domain.clone(),
            ty: proxy.ty.to_string(),
            class: proxy.class.map(|class| class.to_string()),
            based_on: proxy.based_on.clone(),
            path: proxy.path.clone(),
        })
        .collect()
}

/// Aligned `identifier  domain  type` rows.
pub fn format_spec_list(specs: &[SpecSummary]) -> String {
    let id_width = specs.iter().map(|s| s.identifier.len()).max().unwrap_or(0);
    let domain_width = specs
        .iter()
        .map(|s| display_domain(&s.domain).len())
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    for spec in specs {
        output.push_str(&format!(
            "{:<id_width$}  {:<domain_width$}  {}",
            spec.identifier,
            display_domain(&spec.domain),
            spec.ty,
        ));
        if let Some(based_on) = &spec.based_on {
            output.push_str(&format!("  (based on {})", based_on));
        }
        output.push('\n');
    }
    output
}

fn display_domain(domain: &str) -> &str {
    if domain.is_empty() {
        "(default)"
    } else {
        domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(identifier: &str, domain: &str, based_on: Option<&str>) -> SpecSummary {
        SpecSummary {
            identifier: identifier.to_string(),
            domain: domain.to_string(),
            ty: "Tool".to_string(),
            class: None,
            based_on: based_on.map(str::to_string),
            path: PathBuf::from("/specs/a.xcspec"),
        }
    }

    #[test]
    fn test_format_spec_list() {
        let output = format_spec_list(&[
            summary("org.test.a", "", None),
            summary("org.test.longer", "macosx", Some("org.test.a")),
        ]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "org.test.a       (default)  Tool");
        assert_eq!(lines[1], "org.test.longer  macosx     Tool  (based on org.test.a)");
    }
}

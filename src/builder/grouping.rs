//! Strategies that decide which inputs share one tool invocation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::builder::context::FileToBuild;
use crate::util::fs::without_suffix;

/// Assigns inputs to groups; inputs with the same group id are processed by
/// a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum InputFileGroupingStrategy {
    /// Every input joins one group named after the tool.
    Tool { group_identifier: String },
    /// Inputs sharing a path without suffix are grouped, such as `View.h`
    /// and `View.m`.
    CommonFileBase { tool_name: String },
}

impl InputFileGroupingStrategy {
    /// The strategy named `name` in an `InputFileGroupings` list.
    pub fn from_name(name: &str, spec_identifier: &str) -> Option<Self> {
        match name {
            "tool" => Some(InputFileGroupingStrategy::Tool {
                group_identifier: spec_identifier.to_string(),
            }),
            "common-file-base" => Some(InputFileGroupingStrategy::CommonFileBase {
                tool_name: spec_identifier.to_string(),
            }),
            _ => None,
        }
    }

    pub fn group_identifier(&self, file: &FileToBuild) -> String {
        match self {
            InputFileGroupingStrategy::Tool { group_identifier } => group_identifier.clone(),
            InputFileGroupingStrategy::CommonFileBase { tool_name } => {
                format!("tool:{} file-base:{}", tool_name, without_suffix(file.path()))
            }
        }
    }
}

/// Partition `files` by the first strategy, keeping first-seen group order.
pub fn group_inputs(
    strategies: &[InputFileGroupingStrategy],
    files: Vec<FileToBuild>,
) -> Vec<(String, Vec<FileToBuild>)> {
    let Some(strategy) = strategies.first() else {
        return files
            .into_iter()
            .map(|file| (file.path().display().to_string(), vec![file]))
            .collect();
    };

    let mut order = Vec::new();
    let mut groups: BTreeMap<String, Vec<FileToBuild>> = BTreeMap::new();
    for file in files {
        let id = strategy.group_identifier(&file);
        if !groups.contains_key(&id) {
            order.push(id.clone());
        }
        groups.entry(id).or_default().push(file);
    }
    order
        .into_iter()
        .filter_map(|id| groups.remove(&id).map(|files| (id, files)))
        .collect()
}

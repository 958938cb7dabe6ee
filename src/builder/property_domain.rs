//! Property domains: the inherited, ordered build options of a spec.

use std::sync::{Arc, OnceLock};

use indexmap::{IndexMap, IndexSet};

use crate::builder::build_option::BuildOption;
use crate::core::macros::MacroValue;
use crate::core::parser::SpecParser;
use crate::core::plist::PropertyListItem;
use crate::core::spec::Spec;

/// The build options a spec declares, plus lazily flattened views over its
/// base chain.
#[derive(Debug, Default)]
pub struct PropertyDomainSpec {
    /// Options declared by this spec, in declaration order.
    pub options: Vec<Arc<BuildOption>>,
    pub deleted_option_names: Vec<String>,
    base: Option<Arc<Spec>>,
    flattened: OnceLock<IndexMap<String, Arc<BuildOption>>>,
    flattened_ordered: OnceLock<Vec<Arc<BuildOption>>>,
}

impl PropertyDomainSpec {
    pub fn parse(parser: &mut SpecParser<'_>, base: Option<Arc<Spec>>) -> PropertyDomainSpec {
        let options = match parser.parse_object("Properties", false) {
            Some(properties) => {
                if parser.parse_object("Options", false).is_some() {
                    parser.error("cannot define both 'Properties' and 'Options'");
                }
                parse_options(parser, "Properties", properties)
            }
            None => match parser.parse_object("Options", false) {
                Some(options) => parse_options(parser, "Options", options),
                None => Vec::new(),
            },
        };
        let deleted_option_names = parser.parse_string_list("DeletedProperties").unwrap_or_default();

        // Unused.
        parser.parse_bool("IsGlobalDomainInUI");
        parser.parse_string_list("OptionConditionFlavors");

        PropertyDomainSpec::new(options, base).with_deleted(deleted_option_names)
    }

    pub fn new(options: Vec<BuildOption>, base: Option<Arc<Spec>>) -> Self {
        PropertyDomainSpec {
            options: options.into_iter().map(Arc::new).collect(),
            base,
            ..Default::default()
        }
    }

    fn with_deleted(mut self, names: Vec<String>) -> Self {
        self.deleted_option_names = names;
        self
    }

    fn base_domain(&self) -> Option<&PropertyDomainSpec> {
        self.base.as_deref().and_then(Spec::property_domain)
    }

    /// Every option visible from this spec by name; own options replace
    /// inherited ones.
    pub fn flattened_options(&self) -> &IndexMap<String, Arc<BuildOption>> {
        self.flattened.get_or_init(|| {
            let mut options = self
                .base_domain()
                .map(|base| base.flattened_options().clone())
                .unwrap_or_default();
            for option in &self.options {
                options.insert(option.name.clone(), Arc::clone(option));
            }
            options
        })
    }

    /// Every visible option in command-line order.
    ///
    /// Starts from the base's order. An own option with `AppearsAfter` naming
    /// an option already in the order is placed right after it, unless it is
    /// itself already present; otherwise an inherited name keeps its slot and
    /// a new name is appended.
    pub fn flattened_ordered_options(&self) -> &[Arc<BuildOption>] {
        self.flattened_ordered.get_or_init(|| {
            let mut names: IndexSet<String> = self
                .base_domain()
                .map(|base| {
                    base.flattened_ordered_options()
                        .iter()
                        .map(|option| option.name.clone())
                        .collect()
                })
                .unwrap_or_default();

            for option in &self.options {
                let anchor = option
                    .appears_after
                    .as_deref()
                    .and_then(|after| names.get_index_of(after));
                match anchor {
                    Some(anchor) if !names.contains(&option.name) => {
                        names.shift_insert(anchor + 1, option.name.clone());
                    }
                    Some(_) => {}
                    None => {
                        names.insert(option.name.clone());
                    }
                }
            }

            let flattened = self.flattened_options();
            names
                .iter()
                .filter_map(|name| flattened.get(name).cloned())
                .collect()
        })
    }

    pub fn option(&self, name: &str) -> Option<&Arc<BuildOption>> {
        self.flattened_options().get(name)
    }

    /// Default value expressions of the flattened options, in order.
    pub fn default_settings(&self) -> Vec<(String, MacroValue)> {
        self.flattened_ordered_options()
            .iter()
            .filter_map(|option| {
                option
                    .default_value
                    .clone()
                    .map(|value| (option.name.clone(), value))
            })
            .collect()
    }
}

fn parse_options(parser: &mut SpecParser<'_>, key: &str, data: &PropertyListItem) -> Vec<BuildOption> {
    match data.as_array() {
        Some(items) => items.iter().map(|item| BuildOption::parse(parser, item)).collect(),
        None => {
            parser.error(format!("expected build option array for '{}' key", key));
            Vec::new()
        }
    }
}

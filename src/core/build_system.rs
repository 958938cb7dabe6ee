//! Build system specs: a property domain plus default build properties.

use std::sync::Arc;

use crate::builder::property_domain::PropertyDomainSpec;
use crate::core::macros::BuildSettingsTable;
use crate::core::parser::SpecParser;
use crate::core::spec::Spec;

#[derive(Debug)]
pub struct BuildSystemSpec {
    pub options: PropertyDomainSpec,
    /// Own `DefaultBuildProperties` layered over the base's; last entry wins.
    pub default_build_properties: BuildSettingsTable,
}

impl BuildSystemSpec {
    pub fn parse(parser: &mut SpecParser<'_>, base: Option<Arc<Spec>>) -> BuildSystemSpec {
        let base_properties = base
            .as_deref()
            .and_then(Spec::as_build_system)
            .map(|spec| &spec.default_build_properties);
        let default_build_properties = parser
            .parse_build_settings("DefaultBuildProperties", base_properties)
            .unwrap_or_default();

        BuildSystemSpec {
            options: PropertyDomainSpec::parse(parser, base),
            default_build_properties,
        }
    }
}

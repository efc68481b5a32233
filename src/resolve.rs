//! Ordered fallback rules evaluated against a decoded [`Package`].
//!
//! A chain is a list of [`FieldSource`]s; the first one that yields a
//! non-blank value wins. Missing data never fails, it just resolves to "".

use crate::package::{ExternalId, Package, SampleAttribute};

/// One candidate location for a value inside a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// `EXPERIMENT/STUDY_REF/IDENTIFIERS/EXTERNAL_ID` with this namespace.
    ExperimentExternalId(&'static str),
    /// `SAMPLE/IDENTIFIERS/EXTERNAL_ID` with this namespace.
    SampleExternalId(&'static str),
    /// `SAMPLE_ATTRIBUTE` whose tag matches, ignoring ASCII case.
    SampleAttribute(&'static str),
    OrganizationName,
}

impl FieldSource {
    pub fn locate<'a>(&self, package: &'a Package) -> Option<&'a str> {
        match *self {
            FieldSource::ExperimentExternalId(namespace) => {
                find_external_id(package.experiment.external_ids(), namespace)
            }
            FieldSource::SampleExternalId(namespace) => {
                find_external_id(package.sample.external_ids(), namespace)
            }
            FieldSource::SampleAttribute(tag) => {
                find_attribute(package.sample.attributes(), tag)
            }
            FieldSource::OrganizationName => package
                .organization
                .as_ref()
                .map(|org| org.name.value.as_str()),
        }
    }
}

pub const BIOPROJECT: &[FieldSource] = &[
    FieldSource::ExperimentExternalId("BioProject"),
    FieldSource::SampleExternalId("BioProject"),
    FieldSource::SampleAttribute("bioproject"),
];

pub const BIOSAMPLE: &[FieldSource] = &[FieldSource::SampleExternalId("BioSample")];

pub const SUBMITTER: &[FieldSource] = &[
    FieldSource::OrganizationName,
    FieldSource::SampleAttribute("submitter"),
    FieldSource::SampleAttribute("submitted_by"),
    FieldSource::SampleAttribute("center_name"),
];

pub const COLLECTION_DATE: &[FieldSource] = &[FieldSource::SampleAttribute("collection_date")];

pub const LOCATION: &[FieldSource] = &[FieldSource::SampleAttribute("geo_loc_name")];

pub const POPULATION: &[FieldSource] = &[FieldSource::SampleAttribute("ww_population")];

/// Walks `chain` in order and returns the first non-blank, trimmed value.
pub fn resolve(package: &Package, chain: &[FieldSource]) -> String {
    chain
        .iter()
        .filter_map(|source| source.locate(package))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Prefers the run-level value and falls back to the package default.
pub fn prefer_run_value(run_value: &str, package_value: &str) -> String {
    if run_value.is_empty() {
        package_value.to_string()
    } else {
        run_value.to_string()
    }
}

fn find_external_id<'a>(ids: &'a [ExternalId], namespace: &str) -> Option<&'a str> {
    ids.iter()
        .find(|id| id.namespace == namespace)
        .map(|id| id.value.as_str())
}

fn find_attribute<'a>(attrs: &'a [SampleAttribute], tag: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|attr| attr.tag.trim().eq_ignore_ascii_case(tag))
        .map(|attr| attr.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Organization, TextNode};

    fn attr(tag: &str, value: &str) -> SampleAttribute {
        SampleAttribute {
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }

    fn ext(namespace: &str, value: &str) -> ExternalId {
        ExternalId {
            namespace: namespace.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn bioproject_prefers_experiment_over_attribute() {
        let mut package = Package::default();
        package
            .experiment
            .study_ref
            .identifiers
            .external_ids
            .push(ext("BioProject", "PRJNA1"));
        package.sample.attributes.items.push(attr("bioproject", "PRJNA2"));
        assert_eq!(resolve(&package, BIOPROJECT), "PRJNA1");
    }

    #[test]
    fn bioproject_falls_back_to_sample_identifier_then_attribute() {
        let mut package = Package::default();
        package.sample.attributes.items.push(attr("BioProject", "PRJNA3"));
        assert_eq!(resolve(&package, BIOPROJECT), "PRJNA3");

        package
            .sample
            .identifiers
            .external_ids
            .push(ext("BioProject", "PRJNA4"));
        assert_eq!(resolve(&package, BIOPROJECT), "PRJNA4");
    }

    #[test]
    fn blank_organization_name_falls_through() {
        let mut package = Package::default();
        package.organization = Some(Organization {
            kind: "center".to_string(),
            name: TextNode {
                value: "  ".to_string(),
            },
        });
        package.sample.attributes.items.push(attr("center_name", "Lab C"));
        package.sample.attributes.items.push(attr("submitted_by", "Lab B"));
        assert_eq!(resolve(&package, SUBMITTER), "Lab B");
    }

    #[test]
    fn namespace_match_is_exact() {
        let mut package = Package::default();
        package
            .sample
            .identifiers
            .external_ids
            .push(ext("biosample", "SAMN1"));
        assert_eq!(resolve(&package, BIOSAMPLE), "");
    }

    #[test]
    fn run_value_wins_over_package_default() {
        assert_eq!(prefer_run_value("2024-02-02", "2024-01-01"), "2024-02-02");
        assert_eq!(prefer_run_value("", "2024-01-01"), "2024-01-01");
        assert_eq!(prefer_run_value("", ""), "");
    }
}

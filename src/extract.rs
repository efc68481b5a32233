use serde::Serialize;

use crate::package::Package;
use crate::resolve::{self, prefer_run_value};

/// One flattened output record: a run plus its package-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    pub run_accession: String,
    pub bioproject: String,
    pub biosample: String,
    pub submitter: String,
    pub collection_date: String,
    pub location: String,
    pub population: String,
    pub total_spots: String,
    pub release_date: String,
    pub load_date: String,
}

impl Row {
    pub const HEADERS: [&'static str; 10] = [
        "RunAccession",
        "BioProject",
        "BioSample",
        "Submitter",
        "CollectionDate",
        "Location",
        "Population",
        "TotalSpots",
        "ReleaseDate",
        "LoadDate",
    ];

    /// Field values in [`Row::HEADERS`] order.
    pub fn fields(&self) -> [&str; 10] {
        [
            self.run_accession.as_str(),
            self.bioproject.as_str(),
            self.biosample.as_str(),
            self.submitter.as_str(),
            self.collection_date.as_str(),
            self.location.as_str(),
            self.population.as_str(),
            self.total_spots.as_str(),
            self.release_date.as_str(),
            self.load_date.as_str(),
        ]
    }
}

/// Package-level values shared by every run of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SharedFields {
    bioproject: String,
    biosample: String,
    submitter: String,
    collection_date: String,
    location: String,
    population: String,
}

impl SharedFields {
    fn resolve(package: &Package) -> Self {
        Self {
            bioproject: resolve::resolve(package, resolve::BIOPROJECT),
            biosample: resolve::resolve(package, resolve::BIOSAMPLE),
            submitter: resolve::resolve(package, resolve::SUBMITTER),
            collection_date: resolve::resolve(package, resolve::COLLECTION_DATE),
            location: resolve::resolve(package, resolve::LOCATION),
            population: resolve::resolve(package, resolve::POPULATION),
        }
    }
}

/// Flattens a package into one row per run. Pure; never drops a run.
pub fn extract_rows(package: &Package) -> Vec<Row> {
    let shared = SharedFields::resolve(package);
    package
        .runs()
        .iter()
        .map(|run| Row {
            run_accession: run.accession.clone(),
            bioproject: shared.bioproject.clone(),
            biosample: shared.biosample.clone(),
            submitter: shared.submitter.clone(),
            collection_date: shared.collection_date.clone(),
            location: shared.location.clone(),
            population: shared.population.clone(),
            total_spots: run.total_spots.clone(),
            release_date: prefer_run_value(&run.release_date, &package.release_date),
            load_date: prefer_run_value(&run.load_date, &package.load_date),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Run;

    #[test]
    fn package_without_runs_yields_nothing() {
        assert!(extract_rows(&Package::default()).is_empty());
    }

    #[test]
    fn run_without_metadata_is_kept() {
        let mut package = Package::default();
        package.run_set.runs.push(Run {
            accession: "SRR1".to_string(),
            ..Run::default()
        });
        let rows = extract_rows(&package);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].run_accession, "SRR1");
        assert!(rows[0].fields()[1..].iter().all(|value| value.is_empty()));
    }
}

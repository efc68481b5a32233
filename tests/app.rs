use std::fs;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_sra_meta::app::App;
use kira_sra_meta::config::{FetchConfig, SearchQuery};
use kira_sra_meta::domain::Batch;
use kira_sra_meta::error::SraMetaError;
use kira_sra_meta::ncbi::ArchiveClient;
use kira_sra_meta::output::JsonOutput;
use kira_sra_meta::package::{PackageSet, SearchResult, decode_package_set, decode_search_result};

/// Serves the esearch fixture for listing and the efetch fixture for the
/// first batch only; later batches come back empty.
struct FixtureClient {
    listing: Option<String>,
    packages: String,
    requested: Arc<Mutex<Vec<String>>>,
}

impl FixtureClient {
    fn new() -> Self {
        Self {
            listing: Some(fs::read_to_string("tests/fixtures/esearch_ids.xml").unwrap()),
            packages: fs::read_to_string("tests/fixtures/efetch_packages.xml").unwrap(),
            requested: Arc::default(),
        }
    }
}

impl ArchiveClient for FixtureClient {
    fn search_ids(&self, _query: &SearchQuery) -> Result<SearchResult, SraMetaError> {
        match &self.listing {
            Some(xml) => decode_search_result(xml),
            None => Err(SraMetaError::EutilsStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
        }
    }

    fn fetch_packages(&self, batch: &Batch) -> Result<PackageSet, SraMetaError> {
        self.requested.lock().unwrap().push(batch.joined());
        if batch.index() == 0 {
            decode_package_set(&self.packages)
        } else {
            Ok(PackageSet::default())
        }
    }
}

fn config() -> FetchConfig {
    FetchConfig {
        batch_size: 2,
        max_workers: 2,
        max_attempts: 2,
        backoff_unit: std::time::Duration::from_millis(1),
    }
}

#[test]
fn run_writes_tsv_for_all_fetched_packages() {
    let temp = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(temp.path().join("out/metadata.tsv")).unwrap();
    let app = App::new(FixtureClient::new(), config());

    let summary = app
        .run(&SearchQuery::default(), &output, &JsonOutput)
        .unwrap();

    assert_eq!(summary.identifiers, 5);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.fetched_batches, 3);
    assert_eq!(summary.dropped_batches, 0);
    assert_eq!(summary.packages, 2);
    assert_eq!(summary.rows, 3);

    let text = fs::read_to_string(output.as_std_path()).unwrap();
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("RunAccession\tBioProject\t"));
    assert!(lines.iter().all(|line| line.split('\t').count() == 10));
    assert!(
        lines.contains(
            &"SRR2600003\tPRJNA900002\tSAMN38000002\tState Hygiene Lab\t2024-02-03\t\t\t5001\t\t"
        )
    );
}

#[test]
fn batches_keep_listing_order() {
    let client = FixtureClient::new();
    let app = App::new(client, config());
    let ids = app.list(&SearchQuery::default()).unwrap();
    let ids = ids.iter().map(|id| id.as_str()).collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec!["31000005", "31000004", "31000003", "31000002", "31000001"]
    );
}

#[test]
fn listing_failure_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(temp.path().join("never.tsv")).unwrap();
    let client = FixtureClient {
        listing: None,
        ..FixtureClient::new()
    };
    let app = App::new(client, config());

    let err = app
        .run(&SearchQuery::default(), &output, &JsonOutput)
        .unwrap_err();

    assert_matches!(err, SraMetaError::Listing(_));
    assert!(!output.as_std_path().exists());
}

#[test]
fn listing_error_element_is_fatal() {
    let client = FixtureClient {
        listing: Some("<eSearchResult><ERROR>Invalid query syntax</ERROR></eSearchResult>".to_string()),
        ..FixtureClient::new()
    };
    let app = App::new(client, config());

    let err = app.list(&SearchQuery::default()).unwrap_err();
    assert_matches!(err, SraMetaError::Listing(message) if message == "Invalid query syntax");
}

#[test]
fn unwritable_output_is_fatal_after_fetching() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();
    let output = Utf8PathBuf::from_path_buf(blocker.join("metadata.tsv")).unwrap();
    let client = FixtureClient::new();
    let requested = Arc::clone(&client.requested);
    let app = App::new(client, config());

    let err = app
        .run(&SearchQuery::default(), &output, &JsonOutput)
        .unwrap_err();

    assert_matches!(err, SraMetaError::Output { .. });
    assert_eq!(requested.lock().unwrap().len(), 3);
}

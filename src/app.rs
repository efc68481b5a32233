use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{FetchConfig, SearchQuery};
use crate::domain::{Identifier, chunk_ids};
use crate::error::SraMetaError;
use crate::ncbi::ArchiveClient;
use crate::output::write_tsv_file;
use crate::pipeline::fetch_batches;
use crate::progress::ProgressSink;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub identifiers: usize,
    pub batches: usize,
    pub fetched_batches: usize,
    pub dropped_batches: usize,
    pub packages: usize,
    pub rows: usize,
    pub output: String,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
}

fn as_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

pub struct App<C: ArchiveClient> {
    client: C,
    fetch: FetchConfig,
}

impl<C: ArchiveClient> App<C> {
    pub fn new(client: C, fetch: FetchConfig) -> Self {
        Self { client, fetch }
    }

    /// Lists every identifier matching `query`. Any failure here is fatal.
    pub fn list(&self, query: &SearchQuery) -> Result<Vec<Identifier>, SraMetaError> {
        let result = self
            .client
            .search_ids(query)
            .map_err(|err| SraMetaError::Listing(err.to_string()))?;
        if let Some(message) = result.error.as_deref() {
            return Err(SraMetaError::Listing(message.trim().to_string()));
        }

        let ids = result.ids();
        if result.count > ids.len() {
            warn!(
                "search matched {} records but only {} identifiers were returned",
                result.count,
                ids.len()
            );
        }
        Ok(ids)
    }

    /// Lists, fetches and writes the TSV to `output`.
    pub fn run(
        &self,
        query: &SearchQuery,
        output: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, SraMetaError> {
        self.fetch.validate()?;
        let started = Instant::now();

        let ids = self.list(query)?;
        info!("Found {} IDs", ids.len());

        let batches = chunk_ids(&ids, self.fetch.batch_size);
        let outcome = fetch_batches(&self.client, &batches, &self.fetch, sink);
        if outcome.dropped_batches() > 0 {
            warn!(
                "{} of {} batches could not be fetched",
                outcome.dropped_batches(),
                outcome.total_batches
            );
        }

        let packages = outcome.package_sets.iter().map(|set| set.len()).sum();
        let rows = write_tsv_file(output, &outcome.package_sets)?;
        info!("Saved parsed metadata to {output}");

        let summary = RunSummary {
            identifiers: ids.len(),
            batches: outcome.total_batches,
            fetched_batches: outcome.fetched_batches(),
            dropped_batches: outcome.dropped_batches(),
            packages,
            rows,
            output: output.to_string(),
            elapsed: started.elapsed(),
        };
        info!("Total time: {:.2}s", summary.elapsed.as_secs_f64());
        Ok(summary)
    }
}

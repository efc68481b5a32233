use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::SearchQuery;
use crate::domain::Batch;
use crate::error::SraMetaError;
use crate::package::{PackageSet, SearchResult, decode_package_set, decode_search_result};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const SEARCH_RET_MAX: usize = 100_000;

/// Remote archive seam. Each call is a single attempt; retry policy lives
/// with the batch worker.
pub trait ArchiveClient: Send + Sync {
    fn search_ids(&self, query: &SearchQuery) -> Result<SearchResult, SraMetaError>;
    fn fetch_packages(&self, batch: &Batch) -> Result<PackageSet, SraMetaError>;
}

#[derive(Clone)]
pub struct EutilsHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl EutilsHttpClient {
    pub fn new(api_key: Option<String>) -> Result<Self, SraMetaError> {
        Self::with_base_url(EUTILS_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self, SraMetaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-sra-meta/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SraMetaError::EutilsHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SraMetaError::EutilsHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}.fcgi", self.base_url)
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("api_key", key.as_str())]),
            None => request,
        }
    }

    fn read_body(response: Response) -> Result<String, SraMetaError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "E-utilities request failed".to_string());
            return Err(SraMetaError::EutilsStatus { status, message });
        }
        response
            .text()
            .map_err(|err| SraMetaError::EutilsHttp(err.to_string()))
    }
}

impl ArchiveClient for EutilsHttpClient {
    fn search_ids(&self, query: &SearchQuery) -> Result<SearchResult, SraMetaError> {
        let term = query.entrez_term();
        let ret_max = SEARCH_RET_MAX.to_string();
        let request = self.client.get(self.endpoint("esearch")).query(&[
            ("db", "sra"),
            ("term", term.as_str()),
            ("retmode", "xml"),
            ("retmax", ret_max.as_str()),
        ]);
        let response = self
            .with_api_key(request)
            .send()
            .map_err(|err| SraMetaError::EutilsHttp(err.to_string()))?;
        let body = Self::read_body(response)?;
        decode_search_result(&body)
    }

    fn fetch_packages(&self, batch: &Batch) -> Result<PackageSet, SraMetaError> {
        let ids = batch.joined();
        let request = self.client.get(self.endpoint("efetch")).query(&[
            ("db", "sra"),
            ("id", ids.as_str()),
            ("retmode", "xml"),
        ]);
        let response = self
            .with_api_key(request)
            .send()
            .map_err(|err| SraMetaError::EutilsHttp(err.to_string()))?;
        let body = Self::read_body(response)?;
        decode_package_set(&body)
    }
}

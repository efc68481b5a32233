use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SraMetaError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-sra-meta.json";
pub const DEFAULT_TERM: &str = "sars-cov-2 wastewater";
pub const DEFAULT_START_DATE: &str = "2024/09/15";
pub const DEFAULT_END_DATE: &str = "2030/12/31";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 7;
pub const API_KEY_ENV: &str = "NCBI_API_KEY";

/// Tuning for the batch fetch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub batch_size: usize,
    pub max_workers: usize,
    pub max_attempts: u32,
    /// Base delay; the wait after failed 0-based attempt `n` is
    /// `backoff_unit * 2^n`. With the defaults that is 1, 2, 4, 8, 16 and 32
    /// seconds; a two-second unit (`backoff_ms: 2000`) gives 2 to 64 seconds.
    pub backoff_unit: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), SraMetaError> {
        if self.batch_size == 0 {
            return Err(SraMetaError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(SraMetaError::InvalidConfig(
                "worker count must be positive".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(SraMetaError::InvalidConfig(
                "max attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay after the failed 0-based `attempt`, before the next one.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Search parameters for the identifier listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub start_date: String,
    pub end_date: String,
    pub api_key: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            api_key: None,
        }
    }
}

impl SearchQuery {
    pub fn validate(&self) -> Result<(), SraMetaError> {
        if self.term.trim().is_empty() {
            return Err(SraMetaError::InvalidConfig(
                "search term must not be empty".to_string(),
            ));
        }
        for date in [&self.start_date, &self.end_date] {
            if !date_pattern().is_match(date) {
                return Err(SraMetaError::InvalidDate(date.clone()));
            }
        }
        Ok(())
    }

    /// Entrez term restricted to the publication date range.
    pub fn entrez_term(&self) -> String {
        format!(
            "({}) AND (\"{}\"[PDAT] : \"{}\"[PDAT])",
            self.term, self.start_date, self.end_date
        )
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}/(0[1-9]|1[0-2])/(0[1-9]|[12]\d|3[01])$").expect("valid date regex")
    })
}

/// On-disk JSON config. Every key is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
    #[serde(default)]
    pub output: Option<String>,
}

/// Values supplied on the command line; they win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub term: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub api_key: Option<String>,
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
    pub max_attempts: Option<u32>,
    pub output: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub query: SearchQuery,
    pub fetch: FetchConfig,
    pub output: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file (explicit path, or the default file when present)
    /// and layers CLI overrides and the environment on top.
    pub fn resolve(
        path: Option<&str>,
        overrides: Overrides,
    ) -> Result<ResolvedConfig, SraMetaError> {
        let file = Self::load_file(path)?;
        let env_key = std::env::var(API_KEY_ENV).ok();
        Self::resolve_config(file, overrides, env_key)
    }

    pub fn load_file(path: Option<&str>) -> Result<ConfigFile, SraMetaError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ConfigFile::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SraMetaError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| SraMetaError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        file: ConfigFile,
        overrides: Overrides,
        env_api_key: Option<String>,
    ) -> Result<ResolvedConfig, SraMetaError> {
        let defaults = SearchQuery::default();
        let query = SearchQuery {
            term: overrides.term.or(file.term).unwrap_or(defaults.term),
            start_date: overrides
                .start
                .or(file.start)
                .unwrap_or(defaults.start_date),
            end_date: overrides.end.or(file.end).unwrap_or(defaults.end_date),
            api_key: [overrides.api_key, file.api_key, env_api_key]
                .into_iter()
                .flatten()
                .map(|key| key.trim().to_string())
                .find(|key| !key.is_empty()),
        };
        query.validate()?;

        let base = FetchConfig::default();
        let fetch = FetchConfig {
            batch_size: overrides
                .batch_size
                .or(file.batch_size)
                .unwrap_or(base.batch_size),
            max_workers: overrides.workers.or(file.workers).unwrap_or(base.max_workers),
            max_attempts: overrides
                .max_attempts
                .or(file.max_attempts)
                .unwrap_or(base.max_attempts),
            backoff_unit: file
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(base.backoff_unit),
        };
        fetch.validate()?;

        Ok(ResolvedConfig {
            query,
            fetch,
            output: overrides.output.or(file.output),
        })
    }
}

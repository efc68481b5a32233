use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SraMetaError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid date (expected YYYY/MM/DD): {0}")]
    InvalidDate(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("E-utilities request failed: {0}")]
    EutilsHttp(String),

    #[error("E-utilities returned status {status}: {message}")]
    EutilsStatus { status: u16, message: String },

    #[error("failed to decode archive response: {0}")]
    Decode(String),

    #[error("identifier listing failed: {0}")]
    #[diagnostic(help("check the search term and network access to eutils.ncbi.nlm.nih.gov"))]
    Listing(String),

    #[error("failed to write output {path}: {message}")]
    Output { path: String, message: String },
}


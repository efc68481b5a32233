pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod ncbi;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod resolve;

//! Novel-Harvest: resilient web novel acquisition from interchangeable mirrors
//!
//! This crate fetches a multi-chapter novel from a set of unreliable,
//! rate-limited mirror endpoints. It fails over between mirrors for single
//! lookups (search, catalog), fans chapter fetches out under a concurrency
//! cap, publishes progress for external pollers, and reassembles chapters
//! into a plain text or EPUB book.

pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Novel-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("All endpoints exhausted after {attempts} attempts, last error: {last_error}")]
    Exhausted { attempts: u32, last_error: FetchError },

    #[error("No catalog stored for book '{book}'")]
    CatalogMissing { book: String },

    #[error("Invalid chapter range {start}..{end} for a catalog of {total} chapters")]
    InvalidRange { start: i64, end: i64, total: usize },

    #[error("Search for '{keyword}' has no hit number {hit}")]
    NoSearchHit { keyword: String, hit: usize },

    #[error("Job exceeded its {}ms timeout", .limit.as_millis())]
    Timeout { limit: Duration },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// A failed attempt against one endpoint
///
/// All three variants are failure events for the failover controller and
/// are treated identically there. The distinction only matters for logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network, timeout or non-success HTTP status
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The endpoint answered with its "no result" sentinel body
    #[error("empty result from {url}")]
    EmptySentinel { url: String },

    /// The payload could not be decoded
    #[error("decode error for {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Returns the URL of the failed attempt
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::EmptySentinel { url } | Self::Decode { url, .. } => {
                url
            }
        }
    }
}

/// HTML extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No chapter links found on {url}")]
    NoChapters { url: String },
}

// Re-export commonly used types
pub use config::Config;
pub use content::{is_valid_chapter_title, ContentCleaner, TitleFilter};
pub use crawler::{AcquisitionPool, DownloadJob, DownloadRequest, SingleResultAcquisition, StopSignal};
pub use output::OutputFormat;
pub use state::{
    CatalogDocument, ChapterRecord, ChapterReference, Endpoint, FailoverController,
    FailoverDecision, ProgressState, TaskStatus,
};

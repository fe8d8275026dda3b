//! Configuration module for Novel-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The configuration is built once at startup and shared read-only by every job.
//!
//! # Example
//!
//! ```no_run
//! use novel_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Chapter fetches in flight: {}", config.acquisition.request_concurrency);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AcquisitionConfig, Config, FilterConfig, FormatConfig, HttpConfig, OutputConfig,
    SelectorConfig, StoreKind,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub(crate) use types::{DEFAULT_INVALID_KEYWORDS, DEFAULT_INVALID_PREFIXES, DEFAULT_META_NOTES};
pub(crate) use validation::parse_selector;

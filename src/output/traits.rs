//! Assembler traits and types
//!
//! This module defines the interface every book container implements and
//! the metadata shared between them.

use crate::state::ChapterRecord;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Book container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Flat text, chapters appended in arrival order
    Txt,
    /// EPUB 3, chapters sorted by index at finalize
    Epub,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Epub => "epub",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "epub" => Ok(Self::Epub),
            other => Err(format!("unknown output format '{}' (expected txt or epub)", other)),
        }
    }
}

/// Book-level metadata written into every container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMeta {
    pub title: String,
    pub author: Option<String>,
    /// Where the catalog was read from
    pub source: String,
    /// BCP 47 language tag
    pub language: String,
}

/// What a finalized assembler produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblySummary {
    pub chapters_written: usize,
    pub path: PathBuf,
}

/// Consumes chapter records and produces a book
///
/// Records may arrive in any order. Each implementation documents whether
/// it preserves arrival order or sorts by chapter index.
#[async_trait]
pub trait Assembler: Send {
    /// Hands one record over to the assembler
    async fn accept(&mut self, record: ChapterRecord) -> OutputResult<()>;

    /// Waits for every outstanding write, closes the container and reports
    ///
    /// Consumes the assembler, so the underlying file is released once.
    async fn finalize(self: Box<Self>) -> OutputResult<AssemblySummary>;
}

//! State module for acquisition bookkeeping
//!
//! # Components
//!
//! - `Endpoint`, `FailoverController`: per-request mirror retry/failover state
//! - `TaskStatus`, `ProgressState`: the progress document of a download task
//! - `CatalogDocument`, `ChapterReference`, `ChapterRecord`: chapter data before and after fetching

mod catalog;
mod failover;
mod progress;

// Re-export main types
pub use catalog::{CatalogDocument, CatalogEntry, ChapterRecord, ChapterReference, NovelInfo};
pub use failover::{Endpoint, FailoverController, FailoverDecision};
pub use progress::{compute_percentage, ProgressState, TaskStatus};

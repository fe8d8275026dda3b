//! Crawler module for acquiring novels from mirror endpoints
//!
//! This module contains the acquisition engine, including:
//! - The transport seam and its reqwest implementation
//! - Single-result lookups (search, catalog) with failover and caching
//! - The bounded chapter acquisition pool
//! - Progress tracking and download job coordination

mod catalog;
mod fetch_task;
mod job;
mod pool;
mod search;
mod single;
mod tracker;
mod transport;

pub use catalog::{fetch_catalog, search, CatalogLookup};
pub use fetch_task::ChapterFetcher;
pub use job::{DownloadJob, DownloadRequest, JobReport};
pub use pool::{AcquisitionPool, PoolHandle, PoolSettings};
pub use search::{decode_hits, SearchHit, SearchLookup};
pub use single::{Lookup, LookupRequest, SingleResultAcquisition};
pub use tracker::ProgressTracker;
pub use transport::{build_http_client, HttpTransport, Transport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal shared between a job and its caller
///
/// Raising it only suppresses new dispatches. Fetches already in flight
/// run to completion and their records still count.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

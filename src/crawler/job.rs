//! Download job coordination
//!
//! A job ties the pieces together for one book:
//! 1. Register the task and publish `starting`
//! 2. Load the stored catalog and resolve the chapter sub-range
//! 3. Run the acquisition pool and fan every record out to the tracker and
//!    the assembler
//! 4. Finalize the book and publish the terminal status
//!
//! Outcomes of the run itself (completed, stopped, timed out) come back as
//! a [`JobReport`]. Failures that keep the job from starting are returned as
//! errors, after `failed` has been published for the task.

use crate::config::Config;
use crate::content::{ContentCleaner, Extractor, HtmlExtractor, TitleFilter};
use crate::crawler::fetch_task::ChapterFetcher;
use crate::crawler::pool::{AcquisitionPool, PoolSettings};
use crate::crawler::tracker::ProgressTracker;
use crate::crawler::transport::Transport;
use crate::crawler::StopSignal;
use crate::output::{create_assembler, AssemblySummary, BookMeta, OutputFormat};
use crate::state::{CatalogDocument, ChapterReference, Endpoint, ProgressState};
use crate::storage::{catalog_key, short_digest, task_key, Store, StoreExt, TaskRecord};
use crate::HarvestError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Characters that never make it into an output file name
const UNSAFE_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// What to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Book name the catalog was stored under
    pub book: String,
    /// First chapter, 1-based
    pub start: i64,
    /// Last chapter, inclusive, or -1 for the end of the catalog
    pub end: i64,
    pub format: OutputFormat,
    /// Caller-chosen task id, generated when absent
    pub task_id: Option<String>,
}

impl DownloadRequest {
    /// Whole book as plain text
    pub fn new(book: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            start: 1,
            end: -1,
            format: OutputFormat::Txt,
            task_id: None,
        }
    }
}

/// Final state of a job that ran
#[derive(Debug, Clone)]
pub struct JobReport {
    pub progress: ProgressState,
    /// `None` when the book could not be finalized
    pub output: Option<AssemblySummary>,
}

/// Download job runner
pub struct DownloadJob {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    pool: AcquisitionPool,
    endpoints: Vec<Endpoint>,
    job_timeout: Duration,
}

impl DownloadJob {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        pool: AcquisitionPool,
        endpoints: Vec<Endpoint>,
    ) -> Self {
        let job_timeout = Duration::from_secs(config.acquisition.job_timeout_secs);
        Self {
            config,
            store,
            pool,
            endpoints,
            job_timeout,
        }
    }

    /// Builds the extractor, cleaner and pool described by `config`
    pub fn from_config(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
    ) -> Result<Self, HarvestError> {
        let extractor: Arc<dyn Extractor> = Arc::new(HtmlExtractor::new(
            &config.selectors,
            TitleFilter::from_config(&config.filters),
        )?);
        let cleaner = ContentCleaner::from_config(&config.filters, &config.format);
        let fetcher = Arc::new(ChapterFetcher::new(transport, extractor, cleaner));
        let pool = AcquisitionPool::new(fetcher, PoolSettings::from_config(&config.acquisition));
        let endpoints = Endpoint::parse_all(&config.acquisition.endpoints)?;

        Ok(Self::new(config, store, pool, endpoints))
    }

    /// Overrides the wall-clock bound of a run
    pub fn with_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    /// Where the book for `request` is written
    pub fn output_path(&self, request: &DownloadRequest) -> PathBuf {
        Path::new(&self.config.output.directory).join(format!(
            "{}.{}",
            file_stem(&request.book),
            request.format.extension()
        ))
    }

    /// Runs one download job to a terminal status
    ///
    /// # Arguments
    ///
    /// * `request` - Book, chapter range and format
    /// * `stop` - Raised by the caller to stop dispatching new chapters
    ///
    /// # Returns
    ///
    /// * `Ok(JobReport)` - The job ran; its status is completed, stopped or failed (timeout)
    /// * `Err(HarvestError)` - The job could not start (missing catalog, bad range, unwritable output)
    pub async fn run(
        &self,
        request: DownloadRequest,
        stop: StopSignal,
    ) -> Result<JobReport, HarvestError> {
        let started_at = Utc::now();
        let task_id = request
            .task_id
            .clone()
            .unwrap_or_else(|| short_digest(&format!("{}{}", request.book, started_at.to_rfc3339())));
        let output_path = self.output_path(&request);

        let mut tracker = ProgressTracker::new(task_id.clone(), self.store.clone());

        let registry = TaskRecord {
            task_id: task_id.clone(),
            book: request.book.clone(),
            start: request.start,
            end: request.end,
            format: request.format.to_string(),
            output_path: output_path.display().to_string(),
            started_at: started_at.to_rfc3339(),
        };
        if let Err(e) = self.store.put_json(&task_key(&task_id), &registry) {
            tracker.fail(&format!("Failed to register task: {}", e));
            return Err(e.into());
        }

        tracing::info!(
            task_id = %task_id,
            "Starting download of '{}' chapters {}..{} as {}",
            request.book,
            request.start,
            request.end,
            request.format
        );

        let catalog = match self.load_catalog(&request.book) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracker.fail(&e.to_string());
                return Err(e);
            }
        };

        let references = match catalog.select_range(request.start, request.end) {
            Ok(references) => references,
            Err(e) => {
                tracker.fail(&e.to_string());
                return Err(e);
            }
        };

        let references = chapter_pages(references, &self.config.acquisition.chapter_path_prefix);

        let meta = BookMeta {
            title: catalog.novel_info.novel_title.clone(),
            author: catalog.novel_info.author.clone(),
            source: catalog.novel_info.detail_url.clone(),
            language: self.config.format.language.clone(),
        };
        let mut assembler = match create_assembler(
            request.format,
            &output_path,
            meta,
            &self.config.format,
            self.config.acquisition.write_concurrency as usize,
        ) {
            Ok(assembler) => assembler,
            Err(e) => {
                tracker.fail(&format!("Failed to create output: {}", e));
                return Err(e.into());
            }
        };

        tracker.begin(references.len());

        let mut handle = match self.pool.acquire(references, &self.endpoints, stop.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                tracker.fail(&e.to_string());
                return Err(e.into());
            }
        };

        let deadline = tokio::time::Instant::now() + self.job_timeout;
        let mut failure: Option<String> = None;
        let mut aborted = false;

        loop {
            match tokio::time::timeout_at(deadline, handle.next()).await {
                Ok(Some(record)) => {
                    tracker.record(&record);
                    if let Err(e) = assembler.accept(record).await {
                        tracing::error!(task_id = %task_id, "Output write failed: {}", e);
                        failure = Some(format!("Output write failed: {}", e));
                        stop.raise();
                        handle.abort();
                        aborted = true;
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    let timeout = HarvestError::Timeout {
                        limit: self.job_timeout,
                    };
                    tracing::warn!(task_id = %task_id, "{}, abandoning in-flight chapters", timeout);
                    failure = Some(timeout.to_string());
                    stop.raise();
                    handle.abort();
                    aborted = true;
                    break;
                }
            }
        }

        if !aborted {
            let dispatched = handle.dispatched().await;
            tracing::debug!(task_id = %task_id, "Pool drained after {} dispatches", dispatched);
        }

        let output = match assembler.finalize().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!(task_id = %task_id, "Failed to finalize output: {}", e);
                if failure.is_none() {
                    failure = Some(format!("Failed to finalize output: {}", e));
                }
                None
            }
        };

        let unfinished = tracker.state().current < tracker.state().total;
        if let Some(reason) = failure {
            tracker.fail(&reason);
        } else if stop.is_raised() && unfinished {
            tracker.stop();
        } else {
            tracker.complete();
        }

        let progress = tracker.into_state();
        tracing::info!(
            task_id = %task_id,
            "Download finished as {} ({}/{} chapters, {} failed)",
            progress.status,
            progress.current,
            progress.total,
            progress.failed_chapters.len()
        );

        Ok(JobReport { progress, output })
    }

    fn load_catalog(&self, book: &str) -> Result<CatalogDocument, HarvestError> {
        self.store
            .get_json::<CatalogDocument>(&catalog_key(book))?
            .ok_or_else(|| HarvestError::CatalogMissing {
                book: book.to_string(),
            })
    }
}

/// Keeps the references whose page path starts with `prefix`
///
/// Absolute URLs are judged by their path. An empty prefix keeps everything.
fn chapter_pages(references: Vec<ChapterReference>, prefix: &str) -> Vec<ChapterReference> {
    if prefix.is_empty() {
        return references;
    }

    references
        .into_iter()
        .filter(|reference| {
            let path = match Url::parse(&reference.relative_path) {
                Ok(url) => url.path().to_string(),
                Err(_) => reference.relative_path.clone(),
            };
            let keep = path.starts_with(prefix);
            if !keep {
                tracing::info!(
                    index = reference.index,
                    "Skipping '{}', {} is not a chapter page",
                    reference.title,
                    reference.relative_path
                );
            }
            keep
        })
        .collect()
}

/// Book name made safe for use as a file name
fn file_stem(book: &str) -> String {
    let stem: String = book
        .trim()
        .chars()
        .map(|c| if UNSAFE_FILE_CHARS.contains(&c) { '_' } else { c })
        .collect();
    if stem.is_empty() {
        "book".to_string()
    } else {
        stem
    }
}

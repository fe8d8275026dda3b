//! Concurrent acquisition pool
//!
//! This module handles:
//! - Fanning chapter fetches out under a global concurrency cap (semaphore)
//! - Static round-robin assignment of mirrors over the selected sub-range
//! - The politeness delay between dispatches
//! - Cooperative stop: no new dispatch once the signal is raised
//!
//! Every dispatched reference yields exactly one [`ChapterRecord`] on the
//! handle's stream, successful or degraded, in completion order. A chapter
//! gets one attempt at its assigned mirror; failures are not retried here.
//!
//! A permit covers the fetch only. It is returned before the record is
//! handed to the stream, so a slow consumer delays delivery but never
//! holds back the next fetch.

use crate::config::AcquisitionConfig;
use crate::crawler::fetch_task::ChapterFetcher;
use crate::crawler::StopSignal;
use crate::state::{ChapterRecord, ChapterReference, Endpoint};
use crate::ConfigError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// Dispatch settings of the pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum fetches in flight
    pub concurrency: usize,
    /// Pause before each dispatch after the first
    pub download_delay: Duration,
    /// Scale each pause by a random factor in [0.5, 1.5)
    pub randomize_delay: bool,
}

impl PoolSettings {
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self {
            concurrency: config.request_concurrency.max(1) as usize,
            download_delay: Duration::from_millis(config.download_delay_ms),
            randomize_delay: config.randomize_download_delay,
        }
    }

    fn next_delay(&self) -> Duration {
        if self.download_delay.is_zero() || !self.randomize_delay {
            return self.download_delay;
        }
        let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
        self.download_delay.mul_f64(factor)
    }
}

/// Bounded concurrent chapter fetcher
#[derive(Clone)]
pub struct AcquisitionPool {
    fetcher: Arc<ChapterFetcher>,
    settings: PoolSettings,
}

/// Stream of records produced by one [`AcquisitionPool::acquire`] call
pub struct PoolHandle {
    receiver: mpsc::Receiver<ChapterRecord>,
    dispatcher: JoinHandle<usize>,
}

impl PoolHandle {
    /// Next record in completion order, `None` once every dispatched fetch has reported
    pub async fn next(&mut self) -> Option<ChapterRecord> {
        self.receiver.recv().await
    }

    /// Abandons the run, cancelling the dispatcher and every in-flight fetch
    pub fn abort(&self) {
        self.dispatcher.abort();
    }

    /// Waits for the dispatcher and returns how many references were dispatched
    pub async fn dispatched(self) -> usize {
        self.dispatcher.await.unwrap_or(0)
    }
}

impl AcquisitionPool {
    pub fn new(fetcher: Arc<ChapterFetcher>, settings: PoolSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Starts fetching `references`
    ///
    /// The i-th reference of the list (position in the selected sub-range,
    /// not its catalog index) goes to `endpoints[i % endpoints.len()]`.
    ///
    /// # Arguments
    ///
    /// * `references` - Chapters to fetch, in catalog order
    /// * `endpoints` - Mirrors to distribute the fetches over, must not be empty
    /// * `stop` - Cooperative stop signal, checked before every dispatch
    ///
    /// # Returns
    ///
    /// * `Ok(PoolHandle)` - Stream of records
    /// * `Err(ConfigError)` - No endpoints to distribute over
    pub fn acquire(
        &self,
        references: Vec<ChapterReference>,
        endpoints: &[Endpoint],
        stop: StopSignal,
    ) -> Result<PoolHandle, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::Validation(
                "chapter acquisition needs at least one endpoint".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::channel(self.settings.concurrency.max(1));
        let dispatcher = tokio::spawn(dispatch(
            self.fetcher.clone(),
            self.settings.clone(),
            references,
            endpoints.to_vec(),
            stop,
            sender,
        ));

        Ok(PoolHandle {
            receiver,
            dispatcher,
        })
    }
}

async fn dispatch(
    fetcher: Arc<ChapterFetcher>,
    settings: PoolSettings,
    references: Vec<ChapterReference>,
    endpoints: Vec<Endpoint>,
    stop: StopSignal,
    sender: mpsc::Sender<ChapterRecord>,
) -> usize {
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let mut in_flight = JoinSet::new();
    let total = references.len();
    let mut dispatched = 0;

    for (position, reference) in references.into_iter().enumerate() {
        if stop.is_raised() {
            tracing::info!("Stop requested, {} of {} chapters dispatched", dispatched, total);
            break;
        }

        if position > 0 {
            let delay = settings.next_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        // The wait for a permit can be long, check again
        if stop.is_raised() {
            tracing::info!("Stop requested, {} of {} chapters dispatched", dispatched, total);
            break;
        }

        let endpoint = endpoints[position % endpoints.len()].clone();
        let fetcher = fetcher.clone();
        let sender = sender.clone();

        tracing::trace!(
            index = reference.index,
            endpoint = %endpoint,
            "Dispatching chapter '{}'",
            reference.title
        );

        in_flight.spawn(async move {
            let record = fetcher.fetch(&reference, &endpoint).await;
            drop(permit);
            if sender.send(record).await.is_err() {
                tracing::debug!("Record for chapter {} dropped, receiver closed", reference.index);
            }
        });
        dispatched += 1;
    }

    // Receivers see the end of stream once the last in-flight fetch reports
    drop(sender);
    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("Chapter fetch task panicked: {}", e);
            }
        }
    }

    tracing::debug!("Dispatcher finished, {} chapters dispatched", dispatched);
    dispatched
}

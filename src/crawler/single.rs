//! Single-result acquisition
//!
//! One logical, idempotent lookup (a search, a catalog page) driven through
//! the failover controller: issue against the current endpoint, and on
//! failure retry it there or fail over, until it succeeds or the attempt
//! budget is spent. A cached success short-circuits the whole thing.

use crate::config::Config;
use crate::crawler::transport::Transport;
use crate::state::{Endpoint, FailoverController, FailoverDecision};
use crate::storage::{Store, StoreExt, StorageError};
use crate::{FetchError, HarvestError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A request ready for the transport
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

/// One kind of single-result lookup
pub trait Lookup: Send + Sync {
    /// The persisted and returned result
    type Output: Serialize + DeserializeOwned + Send;

    /// Store key of a successful result
    fn cache_key(&self) -> String;

    /// Builds the request for one endpoint
    fn request(&self, endpoint: &Endpoint) -> Result<LookupRequest, FetchError>;

    /// Decodes a response body
    ///
    /// Sentinel "no result" bodies and malformed payloads are failures, and
    /// count toward failover exactly like transport errors.
    fn decode(&self, body: &str, url: &Url, endpoint: &Endpoint) -> Result<Self::Output, FetchError>;
}

/// Failover-driven runner for [`Lookup`]s
pub struct SingleResultAcquisition {
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    endpoints: Vec<Endpoint>,
    start_index: usize,
    max_retries_per_endpoint: u32,
    retry_delay: Duration,
}

impl SingleResultAcquisition {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        endpoints: Vec<Endpoint>,
        start_index: usize,
        max_retries_per_endpoint: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            endpoints,
            start_index,
            max_retries_per_endpoint,
            retry_delay,
        }
    }

    pub fn from_config(
        config: &Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
    ) -> Result<Self, HarvestError> {
        let acquisition = &config.acquisition;
        Ok(Self::new(
            transport,
            store,
            Endpoint::parse_all(&acquisition.endpoints)?,
            acquisition.default_endpoint,
            acquisition.max_retries_per_endpoint,
            Duration::from_millis(acquisition.retry_delay_ms),
        ))
    }

    /// Store that cached results are read from and written to
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Runs a lookup, cache first
    ///
    /// Each call owns a fresh [`FailoverController`]; concurrent lookups
    /// never share retry state.
    ///
    /// # Returns
    ///
    /// * `Ok(L::Output)` - Cached or freshly fetched (and persisted) result
    /// * `Err(HarvestError::Exhausted)` - Every endpoint failed `max_retries_per_endpoint` times
    /// * `Err(HarvestError::Storage)` - The result could not be read or persisted
    pub async fn acquire<L: Lookup>(&self, lookup: &L) -> Result<L::Output, HarvestError> {
        let key = lookup.cache_key();

        match self.store.get_json::<L::Output>(&key) {
            Ok(Some(cached)) => {
                tracing::info!("Using cached result for {}", key);
                return Ok(cached);
            }
            Ok(None) => {}
            Err(StorageError::Serialization(e)) => {
                tracing::warn!("Ignoring unreadable cached result for {}: {}", key, e);
            }
            Err(e) => return Err(e.into()),
        }

        let mut controller = FailoverController::new(
            self.endpoints.clone(),
            self.start_index,
            self.max_retries_per_endpoint,
        )?;

        loop {
            let endpoint = controller.current_endpoint().clone();
            tracing::info!(
                endpoint = %endpoint,
                attempt = controller.total_attempts() + 1,
                "Looking up {}",
                key
            );

            match self.attempt(lookup, &endpoint).await {
                Ok(output) => {
                    controller.on_success();
                    // Save failures end the lookup, they are not failover events
                    self.store.put_json(&key, &output)?;
                    tracing::info!(endpoint = %endpoint, "Saved result for {}", key);
                    return Ok(output);
                }
                Err(error) => match controller.on_failure(&error) {
                    FailoverDecision::Exhausted => {
                        return Err(HarvestError::Exhausted {
                            attempts: controller.total_attempts(),
                            last_error: error,
                        });
                    }
                    FailoverDecision::RetrySame | FailoverDecision::SwitchEndpoint => {
                        if !self.retry_delay.is_zero() {
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                },
            }
        }
    }

    async fn attempt<L: Lookup>(&self, lookup: &L, endpoint: &Endpoint) -> Result<L::Output, FetchError> {
        let request = lookup.request(endpoint)?;
        let body = self.transport.fetch(&request.url, &request.headers).await?;
        lookup.decode(&body, &request.url, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteStore, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replies from a script, then keeps failing; records every requested host
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<String, FetchError>>>,
        calls: AtomicUsize,
        hosts: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(mut replies: Vec<Result<String, FetchError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                hosts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, url: &Url, _headers: &[(String, String)]) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hosts
                .lock()
                .unwrap()
                .push(url.host_str().unwrap().to_string());
            self.replies.lock().unwrap().pop().unwrap_or_else(|| {
                Err(FetchError::Transport {
                    url: url.to_string(),
                    message: "down".to_string(),
                })
            })
        }
    }

    struct EchoLookup;

    impl Lookup for EchoLookup {
        type Output = String;

        fn cache_key(&self) -> String {
            "search_echo".to_string()
        }

        fn request(&self, endpoint: &Endpoint) -> Result<LookupRequest, FetchError> {
            Ok(LookupRequest {
                url: endpoint.resolve("/echo").unwrap(),
                headers: vec![],
            })
        }

        fn decode(&self, body: &str, url: &Url, _endpoint: &Endpoint) -> Result<String, FetchError> {
            if body == "1" {
                return Err(FetchError::EmptySentinel {
                    url: url.to_string(),
                });
            }
            Ok(body.to_string())
        }
    }

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint::parse(&format!("https://www.mirror{}.cfd", i)).unwrap())
            .collect()
    }

    fn acquisition(transport: Arc<ScriptedTransport>, store: Arc<dyn Store>) -> SingleResultAcquisition {
        SingleResultAcquisition::new(transport, store, endpoints(3), 0, 2, Duration::ZERO)
    }

    fn failure() -> Result<String, FetchError> {
        Err(FetchError::Transport {
            url: "x".to_string(),
            message: "reset".to_string(),
        })
    }

    #[tokio::test]
    async fn test_success_is_persisted() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let transport = Arc::new(ScriptedTransport::new(vec![Ok("hit".to_string())]));

        let result = acquisition(transport, store.clone())
            .acquire(&EchoLookup)
            .await
            .unwrap();

        assert_eq!(result, "hit");
        assert_eq!(
            store.get_json::<String>("search_echo").unwrap().as_deref(),
            Some("hit")
        );
    }

    #[tokio::test]
    async fn test_cached_result_issues_no_requests() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.put_json("search_echo", &"cached".to_string()).unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![Ok("fresh".to_string())]));

        let result = acquisition(transport.clone(), store)
            .acquire(&EchoLookup)
            .await
            .unwrap();

        assert_eq!(result, "cached");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_then_fails_over() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let transport = Arc::new(ScriptedTransport::new(vec![
            failure(),
            Ok("1".to_string()),
            failure(),
            Ok("found".to_string()),
        ]));

        let result = acquisition(transport.clone(), store)
            .acquire(&EchoLookup)
            .await
            .unwrap();

        assert_eq!(result, "found");
        assert_eq!(
            *transport.hosts.lock().unwrap(),
            vec![
                "www.mirror0.cfd",
                "www.mirror0.cfd",
                "www.mirror1.cfd",
                "www.mirror1.cfd"
            ]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_after_endpoints_times_retries() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let transport = Arc::new(ScriptedTransport::new(vec![]));

        let err = acquisition(transport.clone(), store.clone())
            .acquire(&EchoLookup)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Exhausted { attempts: 6, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 6);
        assert_eq!(store.get("search_echo").unwrap(), None);
    }

    /// Reads as empty and refuses every write
    struct ReadOnlyStore;

    impl Store for ReadOnlyStore {
        fn put(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Database("disk full".to_string()))
        }

        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn keys_with_prefix(&self, _prefix: &str) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_save_failure_is_not_failed_over() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok("hit".to_string()),
            Ok("hit".to_string()),
        ]));

        let err = acquisition(transport.clone(), Arc::new(ReadOnlyStore))
            .acquire(&EchoLookup)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Storage(StorageError::Database(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_cache_is_refetched() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.put("search_echo", "not json").unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![Ok("fresh".to_string())]));

        let result = acquisition(transport, store)
            .acquire(&EchoLookup)
            .await
            .unwrap();
        assert_eq!(result, "fresh");
    }
}

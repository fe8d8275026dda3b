//! Mirror endpoints and the per-request failover controller
//!
//! A single-result lookup (search, catalog) is retried against the current
//! mirror a bounded number of times, then fails over to the next mirror in
//! the list, wrapping around, until the total attempt budget of
//! `endpoints × retries` is spent.
//!
//! One controller belongs to one logical request. Nothing here is global:
//! concurrent lookups each own their controller and never see each other's
//! counters.

use crate::{ConfigError, FetchError};
use std::fmt;
use url::Url;

/// One interchangeable mirror, identified by its base URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parses a mirror base URL such as `https://www.97c286.cfd`
    pub fn parse(base: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", base, e)))?;
        if base.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint '{}' has no host",
                base
            )));
        }
        Ok(Self { base })
    }

    /// Parses an ordered endpoint list
    pub fn parse_all(bases: &[String]) -> Result<Vec<Self>, ConfigError> {
        bases.iter().map(|b| Self::parse(b)).collect()
    }

    /// Host (and port, when explicit) of the mirror
    pub fn host(&self) -> String {
        let host = self.base.host_str().unwrap_or_default();
        match self.base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves a site path against this mirror
    ///
    /// Absolute URLs are rebased onto this mirror, keeping path and query,
    /// since every mirror serves the same paths.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        match Url::parse(path) {
            Ok(absolute) => {
                let mut relative = absolute.path().to_string();
                if let Some(query) = absolute.query() {
                    relative.push('?');
                    relative.push_str(query);
                }
                self.base.join(&relative)
            }
            Err(_) => self.base.join(path),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.as_str().trim_end_matches('/'))
    }
}

/// What the caller should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverDecision {
    /// Reissue the request against the same endpoint
    RetrySame,
    /// Reissue the request against the (new) current endpoint
    SwitchEndpoint,
    /// Attempt budget spent, the logical request has failed
    Exhausted,
}

/// Retry/failover state machine for one logical request
#[derive(Debug, Clone)]
pub struct FailoverController {
    endpoints: Vec<Endpoint>,
    max_retries_per_endpoint: u32,
    current_index: usize,
    retry_count: u32,
    total_attempts: u32,
}

impl FailoverController {
    /// Creates a controller starting at `start_index`
    ///
    /// # Arguments
    ///
    /// * `endpoints` - Ordered mirror list, must not be empty
    /// * `start_index` - Index of the first endpoint to try
    /// * `max_retries_per_endpoint` - Attempts per endpoint before failing over, at least 1
    pub fn new(
        endpoints: Vec<Endpoint>,
        start_index: usize,
        max_retries_per_endpoint: u32,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::Validation(
                "failover needs at least one endpoint".to_string(),
            ));
        }
        if start_index >= endpoints.len() {
            return Err(ConfigError::Validation(format!(
                "start index {} out of range for {} endpoints",
                start_index,
                endpoints.len()
            )));
        }
        if max_retries_per_endpoint == 0 {
            return Err(ConfigError::Validation(
                "max_retries_per_endpoint must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            endpoints,
            max_retries_per_endpoint,
            current_index: start_index,
            retry_count: 0,
            total_attempts: 0,
        })
    }

    /// The endpoint the next attempt should go to
    pub fn current_endpoint(&self) -> &Endpoint {
        &self.endpoints[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Failed attempts against the current endpoint since the last switch or success
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Failed attempts across all endpoints
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn max_total_attempts(&self) -> u32 {
        self.endpoints.len() as u32 * self.max_retries_per_endpoint
    }

    pub fn is_exhausted(&self) -> bool {
        self.total_attempts >= self.max_total_attempts()
    }

    /// Records a failed attempt and decides what happens next
    ///
    /// Transport errors, the empty-result sentinel and decode errors all
    /// count the same. Once exhausted, every further call returns
    /// [`FailoverDecision::Exhausted`] without touching the counters.
    pub fn on_failure(&mut self, reason: &FetchError) -> FailoverDecision {
        if self.is_exhausted() {
            return FailoverDecision::Exhausted;
        }

        self.total_attempts += 1;
        tracing::warn!(
            endpoint = %self.current_endpoint(),
            attempt = self.total_attempts,
            "Attempt failed: {}",
            reason
        );

        if self.is_exhausted() {
            tracing::error!(
                "All {} endpoints failed after {} attempts",
                self.endpoints.len(),
                self.total_attempts
            );
            return FailoverDecision::Exhausted;
        }

        self.retry_count += 1;
        if self.retry_count < self.max_retries_per_endpoint {
            tracing::info!(
                "Retrying endpoint {} ({}/{})",
                self.current_endpoint(),
                self.retry_count,
                self.max_retries_per_endpoint
            );
            return FailoverDecision::RetrySame;
        }

        // A single-endpoint list lands on the same endpoint again
        self.retry_count = 0;
        self.current_index = (self.current_index + 1) % self.endpoints.len();
        tracing::info!("Failing over to endpoint {}", self.current_endpoint());
        FailoverDecision::SwitchEndpoint
    }

    /// Records a successful attempt
    pub fn on_success(&mut self) {
        self.retry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint::parse(&format!("https://www.mirror{}.cfd", i)).unwrap())
            .collect()
    }

    fn failure() -> FetchError {
        FetchError::Transport {
            url: "https://www.mirror0.cfd/user/search.html".to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn test_exhausts_after_endpoints_times_retries() {
        let mut controller = FailoverController::new(endpoints(3), 0, 2).unwrap();

        let decisions: Vec<FailoverDecision> =
            (0..6).map(|_| controller.on_failure(&failure())).collect();

        assert_eq!(
            decisions,
            vec![
                FailoverDecision::RetrySame,
                FailoverDecision::SwitchEndpoint,
                FailoverDecision::RetrySame,
                FailoverDecision::SwitchEndpoint,
                FailoverDecision::RetrySame,
                FailoverDecision::Exhausted,
            ]
        );
        assert_eq!(controller.total_attempts(), 6);
        assert!(controller.is_exhausted());
    }

    #[test]
    fn test_exhausted_is_terminal() {
        let mut controller = FailoverController::new(endpoints(2), 0, 1).unwrap();
        assert_eq!(
            controller.on_failure(&failure()),
            FailoverDecision::SwitchEndpoint
        );
        assert_eq!(controller.on_failure(&failure()), FailoverDecision::Exhausted);

        for _ in 0..5 {
            assert_eq!(controller.on_failure(&failure()), FailoverDecision::Exhausted);
        }
        assert_eq!(controller.total_attempts(), 2);
    }

    #[test]
    fn test_switch_advances_circularly() {
        let mut controller = FailoverController::new(endpoints(3), 2, 1).unwrap();
        assert_eq!(controller.current_index(), 2);

        assert_eq!(
            controller.on_failure(&failure()),
            FailoverDecision::SwitchEndpoint
        );
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.retry_count(), 0);
    }

    #[test]
    fn test_single_endpoint_degrades_to_retry() {
        let mut controller = FailoverController::new(endpoints(1), 0, 2).unwrap();

        assert_eq!(controller.on_failure(&failure()), FailoverDecision::RetrySame);
        assert_eq!(controller.on_failure(&failure()), FailoverDecision::Exhausted);
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn test_single_endpoint_switch_lands_on_same_endpoint() {
        let endpoint = endpoints(1);
        let mut controller = FailoverController::new(endpoint.clone(), 0, 1).unwrap();
        // with one retry per endpoint, the budget is one attempt
        assert_eq!(controller.on_failure(&failure()), FailoverDecision::Exhausted);
        assert_eq!(controller.current_endpoint(), &endpoint[0]);
    }

    #[test]
    fn test_success_resets_retry_count_only() {
        let mut controller = FailoverController::new(endpoints(3), 0, 3).unwrap();
        controller.on_failure(&failure());
        controller.on_failure(&failure());
        assert_eq!(controller.on_failure(&failure()), FailoverDecision::SwitchEndpoint);
        controller.on_failure(&failure());
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.retry_count(), 1);

        controller.on_success();

        assert_eq!(controller.retry_count(), 0);
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.total_attempts(), 4);
    }

    #[test]
    fn test_all_failure_kinds_count_the_same() {
        let mut controller = FailoverController::new(endpoints(3), 0, 1).unwrap();
        let url = "https://www.mirror0.cfd/x".to_string();

        controller.on_failure(&FetchError::EmptySentinel { url: url.clone() });
        controller.on_failure(&FetchError::Decode {
            url: url.clone(),
            message: "expected value".to_string(),
        });
        assert_eq!(
            controller.on_failure(&FetchError::Transport {
                url,
                message: "timeout".to_string()
            }),
            FailoverDecision::Exhausted
        );
    }

    #[test]
    fn test_new_rejects_bad_arguments() {
        assert!(FailoverController::new(vec![], 0, 3).is_err());
        assert!(FailoverController::new(endpoints(2), 2, 3).is_err());
        assert!(FailoverController::new(endpoints(2), 0, 0).is_err());
    }

    #[test]
    fn test_endpoint_resolve() {
        let endpoint = Endpoint::parse("https://www.97c286.cfd").unwrap();

        assert_eq!(
            endpoint.resolve("/book/1/2.html").unwrap().as_str(),
            "https://www.97c286.cfd/book/1/2.html"
        );
        assert_eq!(
            endpoint
                .resolve("https://www.other.cfd/book/1/2.html?x=1")
                .unwrap()
                .as_str(),
            "https://www.97c286.cfd/book/1/2.html?x=1"
        );
        assert_eq!(endpoint.host(), "www.97c286.cfd");
        assert_eq!(endpoint.to_string(), "https://www.97c286.cfd");
    }

    #[test]
    fn test_endpoint_host_keeps_port() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8123").unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1:8123");
    }
}

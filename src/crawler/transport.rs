//! HTTP transport
//!
//! The acquisition engine only talks to the network through [`Transport`],
//! so tests can replace mirrors with scripted fakes.

use crate::config::{AcquisitionConfig, HttpConfig};
use crate::FetchError;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// One network round trip: `fetch(url, headers) -> body | error`
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url, headers: &[(String, String)]) -> Result<String, FetchError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport from the `[http]` and `[acquisition]` sections
    pub fn from_config(http: &HttpConfig, acquisition: &AcquisitionConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(http, acquisition)?))
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `http` - User agents, Accept header and content codings
/// * `acquisition` - Request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    http: &HttpConfig,
    acquisition: &AcquisitionConfig,
) -> Result<Client, reqwest::Error> {
    let user_agent = http
        .user_agents
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_default();

    let mut headers = HeaderMap::new();
    if let Ok(accept) = HeaderValue::from_str(&http.accept) {
        headers.insert(ACCEPT, accept);
    }

    // reqwest sets Accept-Encoding itself for every decoder it has enabled
    let encodings = http.accept_encoding.to_ascii_lowercase();

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(acquisition.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(encodings.contains("gzip"))
        .deflate(encodings.contains("deflate"))
        .brotli(encodings.contains("br"))
        .build()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, headers: &[(String, String)]) -> Result<String, FetchError> {
        let transport_error = |message: String| FetchError::Transport {
            url: url.to_string(),
            message,
        };

        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(format!("HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| transport_error(e.to_string()))
    }
}

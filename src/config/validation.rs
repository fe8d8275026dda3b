use crate::config::types::{AcquisitionConfig, Config, FormatConfig, HttpConfig, SelectorConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_acquisition_config(&config.acquisition)?;
    validate_http_config(&config.http)?;
    validate_format_config(&config.format)?;
    validate_selectors(&config.selectors)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates mirror list, retry and concurrency limits
fn validate_acquisition_config(config: &AcquisitionConfig) -> Result<(), ConfigError> {
    if config.endpoints.is_empty() {
        return Err(ConfigError::Validation(
            "at least one endpoint is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        validate_endpoint(endpoint)?;
        if !seen.insert(endpoint.trim_end_matches('/')) {
            return Err(ConfigError::Validation(format!(
                "duplicate endpoint '{}'",
                endpoint
            )));
        }
    }

    if config.default_endpoint >= config.endpoints.len() {
        return Err(ConfigError::Validation(format!(
            "default_endpoint {} is out of range for {} endpoints",
            config.default_endpoint,
            config.endpoints.len()
        )));
    }

    if config.max_retries_per_endpoint < 1 {
        return Err(ConfigError::Validation(
            "max_retries_per_endpoint must be >= 1".to_string(),
        ));
    }

    if config.request_concurrency < 1 || config.request_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "request_concurrency must be between 1 and 100, got {}",
            config.request_concurrency
        )));
    }

    if config.write_concurrency < 1 || config.write_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "write_concurrency must be between 1 and 100, got {}",
            config.write_concurrency
        )));
    }

    if config.request_timeout_secs == 0 || config.job_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single mirror base URL
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use http or https",
            endpoint
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' has no host",
            endpoint
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agents.iter().all(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "at least one non-empty user agent is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_format_config(config: &FormatConfig) -> Result<(), ConfigError> {
    if config.chapter_separator.is_empty() {
        return Err(ConfigError::Validation(
            "chapter_separator cannot be empty".to_string(),
        ));
    }
    if config.language.trim().is_empty() {
        return Err(ConfigError::Validation(
            "language cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Checks that every configured selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    let singles = [
        &config.catalog_title,
        &config.catalog_title_fallback,
        &config.author_spans,
        &config.chapter_links,
        &config.chapter_title,
    ];
    for selector in singles.into_iter().chain(config.chapter_content.iter()) {
        parse_selector(selector)?;
    }

    if config.chapter_content.is_empty() {
        return Err(ConfigError::Validation(
            "at least one chapter content selector is required".to_string(),
        ));
    }

    Ok(())
}

/// Parses a CSS selector, mapping failures to a config error
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

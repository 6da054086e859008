//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client and fetch behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Outer backoff and proxy failover settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker settings
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Polling cadence
    #[serde(default)]
    pub poll: PollConfig,

    /// Upstream endpoint URLs
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Fallback relay proxies, in attempt order
    #[serde(default = "defaults::proxies")]
    pub proxies: Vec<ProxyConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::config("fetcher.user_agent is empty"));
        }
        if self.fetcher.fetch_timeout_secs == 0 {
            return Err(AppError::config("fetcher.fetch_timeout_secs must be > 0"));
        }
        if self.fetcher.health_check_timeout_secs == 0 {
            return Err(AppError::config(
                "fetcher.health_check_timeout_secs must be > 0",
            ));
        }
        if self.fetcher.page_size == 0 {
            return Err(AppError::config("fetcher.page_size must be > 0"));
        }
        if self.retry.initial_delay_ms == 0 {
            return Err(AppError::config("retry.initial_delay_ms must be > 0"));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(AppError::config(
                "retry.max_delay_ms must be >= retry.initial_delay_ms",
            ));
        }
        if self.circuit.max_consecutive_failures == 0 {
            return Err(AppError::config(
                "circuit.max_consecutive_failures must be > 0",
            ));
        }
        if self.poll.interval_secs == 0 {
            return Err(AppError::config("poll.interval_secs must be > 0"));
        }
        for proxy in &self.proxies {
            if proxy.url.trim().is_empty() || proxy.health_check.trim().is_empty() {
                return Err(AppError::config("proxy entries need url and health_check"));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            retry: RetryConfig::default(),
            circuit: CircuitConfig::default(),
            poll: PollConfig::default(),
            endpoints: EndpointsConfig::default(),
            proxies: defaults::proxies(),
        }
    }
}

/// HTTP client and fetch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests. The upstream discriminates on
    /// request shape, so this defaults to a full browser string.
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Timeout for the announcement listing fetch, in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Timeout for connectivity probes, in seconds
    #[serde(default = "defaults::probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for proxy health checks, in seconds
    #[serde(default = "defaults::health_check_timeout")]
    pub health_check_timeout_secs: u64,

    /// Timeout for PDF downloads, in seconds
    #[serde(default = "defaults::pdf_timeout")]
    pub pdf_timeout_secs: u64,

    /// Listing page size requested from the HTML endpoint
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            fetch_timeout_secs: defaults::fetch_timeout(),
            probe_timeout_secs: defaults::probe_timeout(),
            health_check_timeout_secs: defaults::health_check_timeout(),
            pdf_timeout_secs: defaults::pdf_timeout(),
            page_size: defaults::page_size(),
        }
    }
}

/// Outer backoff and proxy failover settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff delay, in milliseconds (doubles each retry)
    #[serde(default = "defaults::initial_delay")]
    pub initial_delay_ms: u64,

    /// Backoff delay cap, in milliseconds
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,

    /// Pause before moving to the next proxy after a non-CORS failure
    #[serde(default = "defaults::proxy_failover_delay")]
    pub proxy_failover_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            initial_delay_ms: defaults::initial_delay(),
            max_delay_ms: defaults::max_delay(),
            proxy_failover_delay_ms: defaults::proxy_failover_delay(),
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive refresh failures before the circuit opens
    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// How long the circuit stays open, in seconds
    #[serde(default = "defaults::circuit_open")]
    pub open_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: defaults::max_consecutive_failures(),
            open_secs: defaults::circuit_open(),
        }
    }
}

/// Polling cadence for watch mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between refresh attempts
    #[serde(default = "defaults::poll_interval")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::poll_interval(),
        }
    }
}

/// Which upstream endpoint to request. The response parser auto-detects
/// the body shape either way; this only selects the query that is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceShape {
    /// The announcement listing page (HTML table `#tdData`)
    #[default]
    Html,
    /// The JSON API (`Table` array)
    Json,
}

/// Upstream endpoint URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Which endpoint/query to use for listing fetches
    #[serde(default)]
    pub source: SourceShape,

    /// HTML-shape announcement listing endpoint
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// JSON-shape announcement API endpoint
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Base path for PDF attachments referenced by the JSON shape
    #[serde(default = "defaults::pdf_base_url")]
    pub pdf_base_url: String,

    /// Target for the upstream reachability probe
    #[serde(default = "defaults::status_check_url")]
    pub status_check_url: String,

    /// Target for the generic internet reachability probe
    #[serde(default = "defaults::connectivity_check_url")]
    pub connectivity_check_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            source: SourceShape::default(),
            listing_url: defaults::listing_url(),
            api_url: defaults::api_url(),
            pdf_base_url: defaults::pdf_base_url(),
            status_check_url: defaults::status_check_url(),
            connectivity_check_url: defaults::connectivity_check_url(),
        }
    }
}

/// A fallback relay proxy with its health-check target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Relay URL prefix; the encoded upstream URL is appended to it
    pub url: String,

    /// Fixed URL used to validate the relay before use
    pub health_check: String,
}

mod defaults {
    use super::ProxyConfig;

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn fetch_timeout() -> u64 {
        60
    }
    pub fn probe_timeout() -> u64 {
        5
    }
    pub fn health_check_timeout() -> u64 {
        10
    }
    pub fn pdf_timeout() -> u64 {
        30
    }
    pub fn page_size() -> u32 {
        50
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_delay() -> u64 {
        2000
    }
    pub fn max_delay() -> u64 {
        30_000
    }
    pub fn proxy_failover_delay() -> u64 {
        1000
    }

    // Circuit breaker defaults
    pub fn max_consecutive_failures() -> u32 {
        3
    }
    pub fn circuit_open() -> u64 {
        300
    }

    // Poll defaults
    pub fn poll_interval() -> u64 {
        60
    }

    // Endpoint defaults
    pub fn listing_url() -> String {
        "https://www.bseindia.com/corporates/annListings_New.aspx".into()
    }
    pub fn api_url() -> String {
        "https://api.bseindia.com/BseIndiaAPI/api/AnnGetData/w".into()
    }
    pub fn pdf_base_url() -> String {
        "https://www.bseindia.com/xml-data/corpfiling/AttachLive/".into()
    }
    pub fn status_check_url() -> String {
        "https://www.bseindia.com/".into()
    }
    pub fn connectivity_check_url() -> String {
        "https://www.google.com/favicon.ico".into()
    }

    // Proxy defaults
    pub fn proxies() -> Vec<ProxyConfig> {
        vec![
            ProxyConfig {
                url: "https://api.allorigins.win/raw?url=".into(),
                health_check: "https://api.allorigins.win/raw?url=https://example.com".into(),
            },
            ProxyConfig {
                url: "https://api.codetabs.com/v1/proxy?quest=".into(),
                health_check: "https://api.codetabs.com/v1/proxy?quest=https://example.com".into(),
            },
            ProxyConfig {
                url: "https://corsproxy.io/?".into(),
                health_check: "https://corsproxy.io/?https://example.com".into(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetcher.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_failure_threshold() {
        let mut config = Config::default();
        config.circuit.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_delay_cap_below_initial() {
        let mut config = Config::default();
        config.retry.max_delay_ms = config.retry.initial_delay_ms - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_proxies_are_three_in_order() {
        let config = Config::default();
        assert_eq!(config.proxies.len(), 3);
        assert!(config.proxies[0].url.contains("allorigins"));
        assert!(config.proxies[1].url.contains("codetabs"));
        assert!(config.proxies[2].url.contains("corsproxy"));
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 2000);
        assert_eq!(config.fetcher.fetch_timeout_secs, 60);
        assert_eq!(config.proxies.len(), 3);
    }
}

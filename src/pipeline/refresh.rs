//! Resilience orchestrator.
//!
//! Composes the circuit breaker, connectivity probes, proxy failover and
//! the outer backoff retrier around the fetch pipeline. All attempts are
//! strictly sequential so every failure stays attributable to a specific
//! channel and a struggling upstream never sees amplified load.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Announcement, Config, ProxyConfig};
use crate::pipeline::circuit_breaker::CircuitBreaker;
use crate::pipeline::retry::{RetryPolicy, retry_with_backoff};
use crate::services::{ConnectivityProber, FetchPipeline, ProxyHealthChecker, http};

/// Reachability probes the orchestrator gates on before fetching.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_internet_reachable(&self) -> bool;
    async fn is_upstream_reachable(&self) -> bool;
}

/// Supplies the relays to attempt, already filtered and in order.
#[async_trait]
pub trait RelayHealth: Send + Sync {
    async fn healthy_proxies(&self) -> Vec<ProxyConfig>;
}

/// Fetches one normalized listing through a relay prefix (or directly).
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_via_channel(&self, channel_prefix: &str) -> Result<Vec<Announcement>>;
}

#[async_trait]
impl Connectivity for ConnectivityProber {
    async fn is_internet_reachable(&self) -> bool {
        ConnectivityProber::is_internet_reachable(self).await
    }

    async fn is_upstream_reachable(&self) -> bool {
        ConnectivityProber::is_upstream_reachable(self).await
    }
}

#[async_trait]
impl RelayHealth for ProxyHealthChecker {
    async fn healthy_proxies(&self) -> Vec<ProxyConfig> {
        ProxyHealthChecker::healthy_proxies(self).await
    }
}

#[async_trait]
impl ListingSource for FetchPipeline {
    async fn fetch_via_channel(&self, channel_prefix: &str) -> Result<Vec<Announcement>> {
        FetchPipeline::fetch_via_channel(self, channel_prefix).await
    }
}

/// Orchestrator for announcement refreshes.
pub struct Orchestrator {
    prober: Box<dyn Connectivity>,
    health: Box<dyn RelayHealth>,
    pipeline: Box<dyn ListingSource>,
    circuit: CircuitBreaker,
    policy: RetryPolicy,
    failover_delay: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with its own HTTP client.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = http::create_client(&config.fetcher)?;
        Ok(Self::assemble(
            Box::new(ConnectivityProber::new(client.clone(), &config)),
            Box::new(ProxyHealthChecker::new(client.clone(), &config)),
            Box::new(FetchPipeline::new(client, &config)),
            &config,
        ))
    }

    fn assemble(
        prober: Box<dyn Connectivity>,
        health: Box<dyn RelayHealth>,
        pipeline: Box<dyn ListingSource>,
        config: &Config,
    ) -> Self {
        Self {
            prober,
            health,
            pipeline,
            circuit: CircuitBreaker::new(&config.circuit),
            policy: RetryPolicy::from_config(&config.retry),
            failover_delay: Duration::from_millis(config.retry.proxy_failover_delay_ms),
        }
    }

    /// Refresh the announcement list.
    ///
    /// While the circuit is open this returns `CircuitOpen` immediately,
    /// without any network call. Otherwise the per-refresh sweep runs under
    /// the outer backoff retrier; the final outcome feeds the circuit
    /// breaker (success resets it, failure counts toward tripping it).
    pub async fn refresh(&mut self) -> Result<Vec<Announcement>> {
        self.circuit.check()?;

        let result = {
            let this = &*self;
            retry_with_backoff(&this.policy, || this.sweep()).await
        };

        match &result {
            Ok(announcements) => {
                self.circuit.record_success();
                log::info!("Refresh succeeded with {} announcements", announcements.len());
            }
            Err(error) => {
                log::error!("Refresh failed: {}", error);
                if self.circuit.record_failure() {
                    log::warn!("Circuit breaker opened after repeated refresh failures");
                }
            }
        }

        result
    }

    /// Whether the circuit breaker is currently open.
    pub fn is_circuit_open(&self) -> bool {
        self.circuit.is_open()
    }

    /// Explicitly close the circuit breaker.
    pub fn reset_circuit(&mut self) {
        self.circuit.reset();
    }

    /// One fail-fast multi-channel sweep:
    /// probes → healthy proxies in order → final direct attempt.
    async fn sweep(&self) -> Result<Vec<Announcement>> {
        if !self.prober.is_internet_reachable().await {
            return Err(AppError::Offline);
        }
        if !self.prober.is_upstream_reachable().await {
            return Err(AppError::UpstreamDown);
        }

        let proxies = self.health.healthy_proxies().await;
        let mut proxy_errors = Vec::new();

        for proxy in &proxies {
            log::info!("Attempting request with proxy: {}", proxy.url);
            match self.pipeline.fetch_via_channel(&proxy.url).await {
                Ok(announcements) => return Ok(announcements),
                Err(error) => {
                    log::warn!("Failed with proxy {}: {}", proxy.url, error);
                    let cors = error.is_cors_rejection();
                    proxy_errors.push(format!("{}: {}", proxy.url, error));

                    // A cross-origin rejection tells us nothing about
                    // upstream load; rotate to the next relay immediately.
                    if !cors {
                        tokio::time::sleep(self.failover_delay).await;
                    }
                }
            }
        }

        log::info!("Attempting direct request without proxy");
        match self.pipeline.fetch_via_channel("").await {
            Ok(announcements) => Ok(announcements),
            Err(error) => Err(AppError::FetchFailed {
                proxy_errors,
                direct_error: error.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysOnline;

    #[async_trait]
    impl Connectivity for AlwaysOnline {
        async fn is_internet_reachable(&self) -> bool {
            true
        }

        async fn is_upstream_reachable(&self) -> bool {
            true
        }
    }

    struct CountingProbes(Arc<AtomicUsize>);

    #[async_trait]
    impl Connectivity for CountingProbes {
        async fn is_internet_reachable(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn is_upstream_reachable(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    /// Relays with a fixed health verdict each; unhealthy ones are
    /// withheld from the sweep, like the real checker does.
    struct FixedRelays {
        relays: Vec<(ProxyConfig, bool)>,
    }

    #[async_trait]
    impl RelayHealth for FixedRelays {
        async fn healthy_proxies(&self) -> Vec<ProxyConfig> {
            self.relays
                .iter()
                .filter(|(_, healthy)| *healthy)
                .map(|(proxy, _)| proxy.clone())
                .collect()
        }
    }

    /// Records every attempted channel prefix; succeeds only on the
    /// configured one.
    struct ScriptedListing {
        attempts: Arc<Mutex<Vec<String>>>,
        succeed_on: Option<String>,
    }

    #[async_trait]
    impl ListingSource for ScriptedListing {
        async fn fetch_via_channel(&self, channel_prefix: &str) -> Result<Vec<Announcement>> {
            self.attempts.lock().unwrap().push(channel_prefix.to_string());
            if self.succeed_on.as_deref() == Some(channel_prefix) {
                Ok(vec![sample_announcement()])
            } else {
                Err(AppError::transport("relay unreachable"))
            }
        }
    }

    fn sample_announcement() -> Announcement {
        Announcement {
            id: "1".to_string(),
            company_name: "ABC Ltd".to_string(),
            company_code: "500001".to_string(),
            announcement_type: "Board Meeting".to_string(),
            subject: "Q1 Results".to_string(),
            submission_date: "2025-07-21T10:00:00.000Z".to_string(),
            pdf_url: String::new(),
            summary: None,
            is_processed: false,
        }
    }

    fn relay(url: &str) -> ProxyConfig {
        ProxyConfig {
            url: url.to_string(),
            health_check: format!("{url}https%3A%2F%2Fwww.bseindia.com"),
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config.retry.proxy_failover_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_sweep_attempts_only_healthy_relays_in_order() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::assemble(
            Box::new(AlwaysOnline),
            Box::new(FixedRelays {
                relays: vec![
                    (relay("https://a.example/raw?url="), false),
                    (relay("https://b.example/raw?url="), false),
                    (relay("https://c.example/raw?url="), true),
                ],
            }),
            Box::new(ScriptedListing {
                attempts: Arc::clone(&attempts),
                succeed_on: Some("https://c.example/raw?url=".to_string()),
            }),
            &fast_config(),
        );

        let announcements = orchestrator.refresh().await.unwrap();
        assert_eq!(announcements.len(), 1);
        // The two unhealthy relays are never attempted, and success on the
        // healthy one stops the sweep before the direct fallback.
        assert_eq!(
            *attempts.lock().unwrap(),
            vec!["https://c.example/raw?url=".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_relays_fall_back_to_direct() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::assemble(
            Box::new(AlwaysOnline),
            Box::new(FixedRelays {
                relays: vec![
                    (relay("https://a.example/raw?url="), true),
                    (relay("https://b.example/raw?url="), true),
                ],
            }),
            Box::new(ScriptedListing {
                attempts: Arc::clone(&attempts),
                succeed_on: Some(String::new()),
            }),
            &fast_config(),
        );

        let announcements = orchestrator.refresh().await.unwrap();
        assert_eq!(announcements.len(), 1);
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![
                "https://a.example/raw?url=".to_string(),
                "https://b.example/raw?url=".to_string(),
                String::new(),
            ]
        );
    }

    #[tokio::test]
    async fn test_open_circuit_short_circuits_without_network() {
        let probe_calls = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::assemble(
            Box::new(CountingProbes(Arc::clone(&probe_calls))),
            Box::new(FixedRelays { relays: Vec::new() }),
            Box::new(ScriptedListing {
                attempts: Arc::clone(&attempts),
                succeed_on: None,
            }),
            &fast_config(),
        );

        for _ in 0..3 {
            assert!(orchestrator.refresh().await.is_err());
        }
        assert!(orchestrator.is_circuit_open());

        let probes_before = probe_calls.load(Ordering::SeqCst);
        let attempts_before = attempts.lock().unwrap().len();

        let error = orchestrator.refresh().await.unwrap_err();
        assert!(matches!(error, AppError::CircuitOpen { .. }));
        assert_eq!(probe_calls.load(Ordering::SeqCst), probes_before);
        assert_eq!(attempts.lock().unwrap().len(), attempts_before);
    }

    #[tokio::test]
    async fn test_exhausted_sweep_reports_every_channel() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::assemble(
            Box::new(AlwaysOnline),
            Box::new(FixedRelays {
                relays: vec![(relay("https://a.example/raw?url="), true)],
            }),
            Box::new(ScriptedListing {
                attempts: Arc::clone(&attempts),
                succeed_on: None,
            }),
            &fast_config(),
        );

        let error = orchestrator.refresh().await.unwrap_err();
        match error {
            AppError::RetriesExhausted { last } => match *last {
                AppError::FetchFailed {
                    proxy_errors,
                    direct_error,
                } => {
                    assert_eq!(proxy_errors.len(), 1);
                    assert!(proxy_errors[0].starts_with("https://a.example/raw?url="));
                    assert!(direct_error.contains("relay unreachable"));
                }
                other => panic!("expected FetchFailed, got {other:?}"),
            },
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }
}

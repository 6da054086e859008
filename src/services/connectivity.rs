// src/services/connectivity.rs

//! Connectivity probes.
//!
//! Cheap, advisory reachability checks used to fail fast before the
//! expensive listing fetch. A false negative only costs one refresh cycle,
//! so each check is a single cache-busting request with a short timeout and
//! no retries.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::CACHE_CONTROL;

use crate::models::Config;

/// Reachability prober for the internet at large and the BSE site.
pub struct ConnectivityProber {
    client: reqwest::Client,
    internet_url: String,
    upstream_url: String,
    timeout: Duration,
}

impl ConnectivityProber {
    /// Create a prober sharing the application HTTP client.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            internet_url: config.endpoints.connectivity_check_url.clone(),
            upstream_url: config.endpoints.status_check_url.clone(),
            timeout: Duration::from_secs(config.fetcher.probe_timeout_secs),
        }
    }

    /// Check whether any internet connectivity exists.
    pub async fn is_internet_reachable(&self) -> bool {
        self.probe(&self.internet_url).await
    }

    /// Check whether the BSE website answers at all.
    pub async fn is_upstream_reachable(&self) -> bool {
        self.probe(&self.upstream_url).await
    }

    /// Issue one cache-busting GET. Any transport-level success counts as
    /// reachable regardless of status code; any error counts as unreachable.
    async fn probe(&self, target: &str) -> bool {
        let separator = if target.contains('?') { '&' } else { '?' };
        let url = format!("{target}{separator}_={}", Utc::now().timestamp_millis());

        match self
            .client
            .get(&url)
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Probe of {} failed: {}", target, e);
                false
            }
        }
    }
}

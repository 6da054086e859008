// src/services/proxy_health.rs

//! Relay proxy health checking.
//!
//! Each configured relay is validated before any fetch attempt. Checks run
//! sequentially in configured order so a degraded relay is never hit by a
//! burst, and the resulting list order defines the later attempt order.

use std::time::Duration;

use crate::models::{Config, ProxyConfig};

/// Health checker for the configured fallback relays.
pub struct ProxyHealthChecker {
    client: reqwest::Client,
    proxies: Vec<ProxyConfig>,
    timeout: Duration,
}

/// Decide whether a health-check response indicates a usable relay.
///
/// A status below 500 is not sufficient on its own: relays frequently
/// return error pages disguised as 200s, so the body must look like a real
/// HTML document, and 403/429 mean the relay is rate-limiting or blocking
/// even though both are below 500.
pub fn is_healthy_response(status: u16, body: &str) -> bool {
    if status >= 500 || status == 403 || status == 429 {
        return false;
    }
    body.to_lowercase().contains("<!doctype html>")
}

impl ProxyHealthChecker {
    /// Create a health checker sharing the application HTTP client.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            proxies: config.proxies.clone(),
            timeout: Duration::from_secs(config.fetcher.health_check_timeout_secs),
        }
    }

    /// Check a single relay against its health-check target.
    ///
    /// Any thrown error, timeout or failed validation counts as unhealthy.
    pub async fn check_health(&self, proxy: &ProxyConfig) -> bool {
        log::debug!("Checking health of proxy: {}", proxy.url);

        let response = match self
            .client
            .get(&proxy.health_check)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Proxy {} health check failed: {}", proxy.url, e);
                return false;
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Proxy {} returned unreadable body: {}", proxy.url, e);
                return false;
            }
        };

        if !is_healthy_response(status, &body) {
            log::warn!("Proxy {} returned invalid response (status {})", proxy.url, status);
            return false;
        }

        log::debug!("Proxy {} is healthy", proxy.url);
        true
    }

    /// Filter the configured relay list down to the healthy ones,
    /// preserving configured order. Checks run strictly sequentially.
    pub async fn healthy_proxies(&self) -> Vec<ProxyConfig> {
        let mut healthy = Vec::new();
        for proxy in &self.proxies {
            if self.check_health(proxy).await {
                healthy.push(proxy.clone());
            }
        }
        log::info!("Found {} healthy proxies", healthy.len());
        healthy
    }
}

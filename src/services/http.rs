// src/services/http.rs

//! HTTP client utilities.

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, ORIGIN, PRAGMA, REFERER,
};

use crate::error::Result;
use crate::models::FetcherConfig;

/// Create a configured asynchronous HTTP client.
///
/// Timeouts are applied per request; the upstream listing fetch, the proxy
/// health checks and the connectivity probes all need different bounds.
pub fn create_client(config: &FetcherConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()?;
    Ok(client)
}

/// Browser-like headers for upstream requests.
///
/// The BSE endpoints reject requests that do not look like they came from a
/// browser on their own pages.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.bseindia.com"));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://www.bseindia.com/corporates/ann.html"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_headers_present() {
        let headers = browser_headers();
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://www.bseindia.com");
        assert!(headers.contains_key(ACCEPT));
        assert!(headers.contains_key(REFERER));
    }

    #[test]
    fn test_create_client_with_defaults() {
        let config = FetcherConfig::default();
        assert!(create_client(&config).is_ok());
    }
}

// src/error.rs

//! Unified error handling for the announcement fetcher.

use thiserror::Error;

/// Result type alias for fetcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Internet connectivity probe failed
    #[error("No internet connection detected. Please check your network connection.")]
    Offline,

    /// BSE website reachability probe failed
    #[error(
        "Unable to reach the BSE website. The service might be experiencing technical difficulties."
    )]
    UpstreamDown,

    /// Circuit breaker is open; no network attempt was made
    #[error("Too many failed attempts. Please try again in {remaining_minutes} minutes.")]
    CircuitOpen { remaining_minutes: i64 },

    /// HTTP call failed or the body shape was not recognized
    #[error("Transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The normalized announcement list was empty
    #[error("No announcements found in the response")]
    EmptyResult,

    /// Every proxy attempt and the final direct attempt failed
    #[error(
        "Unable to fetch data from the BSE API ({} proxy attempts failed). Direct attempt: {direct_error}",
        .proxy_errors.len()
    )]
    FetchFailed {
        proxy_errors: Vec<String>,
        direct_error: String,
    },

    /// Outer backoff retrier gave up
    #[error("All retry attempts failed. {last}")]
    RetriesExhausted { last: Box<AppError> },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Create a transport error with an HTTP status code.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this failure looks like a cross-origin rejection surfaced
    /// by a relay. Such failures rotate to the next proxy without delay.
    pub fn is_cors_rejection(&self) -> bool {
        let message = self.to_string();
        message.contains("CORS") || message.contains("cross-origin")
    }
}

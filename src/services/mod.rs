// src/services/mod.rs

//! Network-facing services: probing, health checking, fetching, downloads.

pub mod connectivity;
pub mod fetch;
pub mod http;
pub mod pdf;
pub mod proxy_health;

pub use connectivity::ConnectivityProber;
pub use fetch::FetchPipeline;
pub use pdf::PdfDownloader;
pub use proxy_health::ProxyHealthChecker;

// src/models/mod.rs

//! Domain models for the announcement fetcher.

mod announcement;
mod config;

pub use announcement::{Announcement, AnnouncementFilter};
pub use config::{
    CircuitConfig, Config, EndpointsConfig, FetcherConfig, PollConfig, ProxyConfig, RetryConfig,
    SourceShape,
};

// src/lib.rs

//! bsewatch Library
//!
//! Resilient acquisition of BSE corporate disclosure announcements:
//! connectivity probing, proxy failover, retry with backoff, circuit
//! breaking, two-shape response normalization and local snapshot caching.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod store;

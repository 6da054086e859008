// src/pipeline/mod.rs

//! Resilience pipeline around the fetch service.
//!
//! - `circuit_breaker`: short-circuits refreshes after repeated failures
//! - `retry`: outer exponential backoff around the per-refresh sweep
//! - `refresh`: the orchestrator composing probes, proxy failover and retry

pub mod circuit_breaker;
pub mod refresh;
pub mod retry;

pub use circuit_breaker::CircuitBreaker;
pub use refresh::Orchestrator;
pub use retry::{RetryPolicy, retry_with_backoff};

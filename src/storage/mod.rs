// src/storage/mod.rs

//! Snapshot cache abstractions.
//!
//! The cache is a fallback substrate for display continuity: the last
//! successful result set plus its timestamp, replaced wholesale on every
//! successful fetch and never merged with live data.

pub mod cache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Announcement;

// Re-export for convenience
pub use cache::LocalCache;

/// A cached result set with its save time.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    /// The announcements as of the last successful fetch
    pub announcements: Vec<Announcement>,
    /// When the snapshot was saved
    pub saved_at: DateTime<Utc>,
}

/// Trait for snapshot cache backends.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Persist the full record list plus the current timestamp,
    /// overwriting any prior content.
    async fn save(&self, announcements: &[Announcement]) -> Result<()>;

    /// Load the last saved snapshot.
    ///
    /// Returns `None` when absent or corrupt; corruption is never fatal.
    async fn load(&self) -> Option<CachedSnapshot>;
}

//! Local filesystem snapshot cache.
//!
//! Two fixed keys under a root directory, mirroring the browser
//! localStorage layout this replaces:
//!
//! ```text
//! {root}/
//! ├── cached_announcements.json       # serialized record list
//! └── cached_announcements_timestamp  # ISO 8601 save time
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::Announcement;
use crate::storage::{CachedSnapshot, SnapshotCache};

/// Fixed key for the serialized record list.
const CACHE_KEY: &str = "cached_announcements.json";

/// Fixed key for the save timestamp.
const CACHE_TIMESTAMP_KEY: &str = "cached_announcements_timestamp";

/// Local filesystem cache backend.
#[derive(Clone)]
pub struct LocalCache {
    root_dir: PathBuf,
}

impl LocalCache {
    /// Create a cache rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let path = self.path(key);
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read a key to a string, returning None if the file doesn't exist.
    async fn read_string(&self, key: &str) -> Option<String> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }
}

#[async_trait]
impl SnapshotCache for LocalCache {
    async fn save(&self, announcements: &[Announcement]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(announcements)?;
        self.write_bytes(CACHE_KEY, &bytes).await?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.write_bytes(CACHE_TIMESTAMP_KEY, timestamp.as_bytes())
            .await?;

        log::debug!("Cached {} announcements", announcements.len());
        Ok(())
    }

    async fn load(&self) -> Option<CachedSnapshot> {
        let data = self.read_string(CACHE_KEY).await?;
        let timestamp = self.read_string(CACHE_TIMESTAMP_KEY).await?;

        let announcements: Vec<Announcement> = match serde_json::from_str(&data) {
            Ok(announcements) => announcements,
            Err(e) => {
                log::warn!("Corrupt announcement cache ignored: {}", e);
                return None;
            }
        };

        let saved_at = match DateTime::parse_from_rfc3339(timestamp.trim()) {
            Ok(saved_at) => saved_at.with_timezone(&Utc),
            Err(e) => {
                log::warn!("Corrupt cache timestamp ignored: {}", e);
                return None;
            }
        };

        Some(CachedSnapshot {
            announcements,
            saved_at,
        })
    }
}

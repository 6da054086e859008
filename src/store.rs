// src/store.rs

//! Announcement store.
//!
//! Consumer surface over the orchestrator and the snapshot cache: seeds
//! from cache on cold start, replaces its set on every successful refresh,
//! applies filters, runs summary processing, and turns fetch errors into
//! the composite human-readable message shown to users.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Announcement, AnnouncementFilter, Config};
use crate::pipeline::Orchestrator;
use crate::storage::SnapshotCache;

/// Produces a summary line for one announcement.
pub trait Summarizer {
    fn summarize(&self, announcement: &Announcement) -> String;
}

/// Placeholder summarizer. Real summarization is out of scope; this just
/// restates the headline so processing has an observable effect.
pub struct HeadlineSummarizer;

impl Summarizer for HeadlineSummarizer {
    fn summarize(&self, announcement: &Announcement) -> String {
        format!(
            "{} filed \"{}\" under {}.",
            announcement.company_name, announcement.subject, announcement.announcement_type
        )
    }
}

/// Store holding the current announcement set.
pub struct AnnouncementStore {
    orchestrator: Orchestrator,
    cache: Arc<dyn SnapshotCache>,
    announcements: Vec<Announcement>,
    last_successful_fetch: Option<DateTime<Utc>>,
}

impl AnnouncementStore {
    /// Create a store. Call [`seed_from_cache`](Self::seed_from_cache)
    /// afterwards to restore the previous snapshot.
    pub fn new(config: Arc<Config>, cache: Arc<dyn SnapshotCache>) -> Result<Self> {
        Ok(Self {
            orchestrator: Orchestrator::new(config)?,
            cache,
            announcements: Vec::new(),
            last_successful_fetch: None,
        })
    }

    /// Load the cached snapshot as the initial display set.
    /// Returns true if a snapshot was restored.
    pub async fn seed_from_cache(&mut self) -> bool {
        match self.cache.load().await {
            Some(snapshot) => {
                log::info!(
                    "Restored {} cached announcements from {}",
                    snapshot.announcements.len(),
                    snapshot.saved_at
                );
                self.announcements = snapshot.announcements;
                self.last_successful_fetch = Some(snapshot.saved_at);
                true
            }
            None => false,
        }
    }

    /// Fetch the latest announcements, replacing the current set and the
    /// cached snapshot. Cache write failures are logged, never propagated.
    pub async fn refresh(&mut self) -> Result<usize> {
        let announcements = self.orchestrator.refresh().await?;

        self.announcements = announcements;
        self.last_successful_fetch = Some(Utc::now());

        if let Err(e) = self.cache.save(&self.announcements).await {
            log::error!("Failed to cache announcements: {}", e);
        }

        Ok(self.announcements.len())
    }

    /// The current announcement set.
    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }

    /// When the last successful fetch happened (live or cached).
    pub fn last_successful_fetch(&self) -> Option<DateTime<Utc>> {
        self.last_successful_fetch
    }

    /// Announcements passing the given filter, in batch order.
    pub fn filtered(&self, filter: &AnnouncementFilter) -> Vec<&Announcement> {
        self.announcements
            .iter()
            .filter(|a| filter.matches(a))
            .collect()
    }

    /// Run the summarizer over every unprocessed announcement.
    /// Already-processed records are untouched. Returns how many records
    /// were newly processed.
    pub fn process_unprocessed(&mut self, summarizer: &dyn Summarizer) -> usize {
        let mut processed = 0;
        for index in 0..self.announcements.len() {
            if self.announcements[index].is_processed {
                continue;
            }
            let summary = summarizer.summarize(&self.announcements[index]);
            self.announcements[index].apply_summary(summary);
            processed += 1;
        }
        if processed > 0 {
            log::info!("Processed {} announcements", processed);
        }
        processed
    }

    /// Build the user-facing composite message for a refresh failure,
    /// including whether cached data is shown and how stale it is.
    pub fn format_error_message(&self, error: &AppError) -> String {
        // The retrier hands back its last underlying failure; that is the
        // one worth explaining to the user.
        let root = match error {
            AppError::RetriesExhausted { last } => last.as_ref(),
            other => other,
        };

        let mut message = match root {
            AppError::Offline => {
                "Unable to connect to the internet. Please check your network connection and \
                 ensure you are online."
                    .to_string()
            }
            AppError::UpstreamDown => {
                "The BSE website is currently inaccessible. This could be due to maintenance or \
                 technical issues on their end."
                    .to_string()
            }
            AppError::Transport { .. } | AppError::Http(_) => {
                "A network error occurred while trying to fetch announcements. This might be due to:\n\
                 \u{2022} Unstable internet connection\n\
                 \u{2022} Firewall or security software blocking the connection\n\
                 \u{2022} VPN issues if you're using one"
                    .to_string()
            }
            other => other.to_string(),
        };

        message.push_str("\n\n");

        if self.announcements.is_empty() {
            message.push_str(
                "No cached announcements are available. Please resolve the connection issues \
                 to view announcements.",
            );
        } else {
            let last_update = self
                .last_successful_fetch
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            message.push_str(&format!(
                "Currently showing cached announcements from {last_update}. \
                 These announcements may not include the latest updates."
            ));
        }

        message.push_str(
            "\n\nTroubleshooting steps:\n\
             1. Check your internet connection\n\
             2. Try disabling any VPN or proxy services\n\
             3. Verify if you can access the BSE website directly at https://www.bseindia.com\n\
             4. If the problem persists, wait a few minutes and try again\n\
             5. If none of the above work, the BSE service might be temporarily unavailable",
        );

        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalCache;
    use tempfile::TempDir;

    fn sample(id: &str, processed: bool) -> Announcement {
        Announcement {
            id: id.to_string(),
            company_name: "ABC Ltd".to_string(),
            company_code: "500001".to_string(),
            announcement_type: "Board Meeting".to_string(),
            subject: "Q1 Results".to_string(),
            submission_date: "2025-07-21T10:00:00.000Z".to_string(),
            pdf_url: "https://example.com/abc.pdf".to_string(),
            summary: processed.then(|| "existing summary".to_string()),
            is_processed: processed,
        }
    }

    fn store_with(announcements: Vec<Announcement>) -> AnnouncementStore {
        let tmp = TempDir::new().unwrap();
        let config = Arc::new(Config::default());
        let cache = Arc::new(LocalCache::new(tmp.path()));
        let mut store = AnnouncementStore::new(config, cache).unwrap();
        store.announcements = announcements;
        store
    }

    #[test]
    fn test_process_unprocessed_sets_summary_once() {
        let mut store = store_with(vec![sample("1", false), sample("2", true)]);

        let processed = store.process_unprocessed(&HeadlineSummarizer);
        assert_eq!(processed, 1);
        assert!(store.announcements()[0].is_processed);
        assert!(store.announcements()[0].summary.is_some());

        // Second pass is a no-op
        let processed = store.process_unprocessed(&HeadlineSummarizer);
        assert_eq!(processed, 0);
        assert_eq!(
            store.announcements()[1].summary.as_deref(),
            Some("existing summary")
        );
    }

    #[test]
    fn test_filtered_applies_predicate() {
        let mut other = sample("2", false);
        other.company_name = "DEF Ltd".to_string();
        let store = store_with(vec![sample("1", false), other]);

        let filter = AnnouncementFilter {
            company_name: Some("ABC Ltd".to_string()),
            ..AnnouncementFilter::default()
        };
        let hits = store.filtered(&filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }

    #[test]
    fn test_error_message_distinguishes_offline() {
        let store = store_with(Vec::new());
        let message = store.format_error_message(&AppError::Offline);
        assert!(message.contains("Unable to connect to the internet"));
        assert!(message.contains("No cached announcements are available"));
        assert!(message.contains("Troubleshooting steps"));
    }

    #[test]
    fn test_error_message_unwraps_retry_wrapper() {
        let store = store_with(Vec::new());
        let wrapped = AppError::RetriesExhausted {
            last: Box::new(AppError::Offline),
        };
        let message = store.format_error_message(&wrapped);
        assert!(message.contains("Unable to connect to the internet"));

        let wrapped = AppError::RetriesExhausted {
            last: Box::new(AppError::transport("connection reset")),
        };
        let message = store.format_error_message(&wrapped);
        assert!(message.contains("A network error occurred"));
    }

    #[test]
    fn test_error_message_mentions_cached_data() {
        let mut store = store_with(vec![sample("1", false)]);
        store.last_successful_fetch = Some(Utc::now());
        let message = store.format_error_message(&AppError::UpstreamDown);
        assert!(message.contains("BSE website is currently inaccessible"));
        assert!(message.contains("Currently showing cached announcements"));
    }

    #[tokio::test]
    async fn test_seed_from_cache() {
        let tmp = TempDir::new().unwrap();
        let config = Arc::new(Config::default());
        let cache = Arc::new(LocalCache::new(tmp.path()));
        cache.save(&[sample("1", false)]).await.unwrap();

        let mut store = AnnouncementStore::new(config, cache).unwrap();
        assert!(store.seed_from_cache().await);
        assert_eq!(store.announcements().len(), 1);
        assert!(store.last_successful_fetch().is_some());
    }

    #[tokio::test]
    async fn test_seed_from_empty_cache_is_false() {
        let mut store = store_with(Vec::new());
        store.announcements.clear();
        assert!(!store.seed_from_cache().await);
    }
}

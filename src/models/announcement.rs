//! Canonical announcement record and filtering.

use serde::{Deserialize, Serialize};

/// A corporate disclosure announcement, normalized from either upstream
/// response shape (HTML table or JSON API).
///
/// Field names on the wire follow the upstream camelCase contract so the
/// cached snapshot stays readable by existing consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Unique identifier within a batch, stable enough for UI keys
    pub id: String,

    /// Listed company name (trimmed, never empty)
    pub company_name: String,

    /// Exchange scrip code
    pub company_code: String,

    /// Announcement category (e.g. "Board Meeting")
    pub announcement_type: String,

    /// Announcement subject line (trimmed, never empty)
    pub subject: String,

    /// Submission timestamp, always ISO 8601
    pub submission_date: String,

    /// Absolute URL to the source PDF
    pub pdf_url: String,

    /// Pseudo-AI summary, populated by a `Summarizer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// True once a summary has been assigned
    pub is_processed: bool,
}

impl Announcement {
    /// Assign a summary and mark the record processed.
    ///
    /// Idempotent: a record that is already processed is left untouched.
    pub fn apply_summary(&mut self, summary: String) {
        if self.is_processed {
            return;
        }
        self.summary = Some(summary);
        self.is_processed = true;
    }
}

/// Filter criteria applied by the announcement store.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    /// Case-insensitive substring match on company, subject and type
    pub search_term: String,

    /// Exact company name match
    pub company_name: Option<String>,

    /// Exact announcement type match
    pub announcement_type: Option<String>,

    /// Inclusive lower bound on submission date (ISO 8601)
    pub from_date: Option<String>,

    /// Inclusive upper bound on submission date (ISO 8601)
    pub to_date: Option<String>,
}

impl AnnouncementFilter {
    /// Check whether an announcement passes this filter.
    pub fn matches(&self, announcement: &Announcement) -> bool {
        if !self.search_term.is_empty() {
            let term = self.search_term.to_lowercase();
            let hit = announcement.company_name.to_lowercase().contains(&term)
                || announcement.subject.to_lowercase().contains(&term)
                || announcement
                    .announcement_type
                    .to_lowercase()
                    .contains(&term);
            if !hit {
                return false;
            }
        }

        if let Some(company) = &self.company_name {
            if &announcement.company_name != company {
                return false;
            }
        }

        if let Some(kind) = &self.announcement_type {
            if &announcement.announcement_type != kind {
                return false;
            }
        }

        // ISO 8601 strings compare chronologically as strings
        if let Some(from) = &self.from_date {
            if announcement.submission_date.as_str() < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.to_date {
            if announcement.submission_date.as_str() > to.as_str() {
                return false;
            }
        }

        true
    }
}

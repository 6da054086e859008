// src/services/pdf.rs

//! PDF retrieval.
//!
//! Attachments are fetched directly (no relay) and saved under a sanitized
//! filename derived from company name and subject.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{ACCEPT, REFERER};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::retry::{RetryPolicy, retry_with_backoff};

/// Maximum subject length used when deriving a filename.
const MAX_SUBJECT_LEN: usize = 50;

/// Downloader for announcement PDF attachments.
pub struct PdfDownloader {
    client: reqwest::Client,
    policy: RetryPolicy,
    timeout: Duration,
    referer: String,
}

impl PdfDownloader {
    /// Create a downloader sharing the application HTTP client.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            policy: RetryPolicy::from_config(&config.retry),
            timeout: Duration::from_secs(config.fetcher.pdf_timeout_secs),
            referer: config.endpoints.status_check_url.clone(),
        }
    }

    /// Download a PDF to `dest_dir/file_name`, retrying with backoff.
    pub async fn download(
        &self,
        pdf_url: &str,
        file_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        retry_with_backoff(&self.policy, || {
            self.download_once(pdf_url, file_name, dest_dir)
        })
        .await
    }

    async fn download_once(
        &self,
        pdf_url: &str,
        file_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        log::info!("Downloading PDF from {}", pdf_url);

        let response = self
            .client
            .get(pdf_url)
            .header(ACCEPT, "application/pdf")
            .header(REFERER, &self.referer)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: format!("Failed to download PDF: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::status(
                status.as_u16(),
                "Failed to download PDF: the file may be temporarily unavailable",
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::transport(format!("PDF body read failed: {e}")))?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(file_name);

        // Write to a temp file, then rename into place
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;

        log::info!("PDF saved to {}", path.display());
        Ok(path)
    }
}

/// Derive a filesystem-safe PDF filename from company name and subject.
///
/// The subject is truncated so pathological subject lines cannot blow the
/// path length limit.
pub fn sanitize_file_name(company_name: &str, subject: &str) -> String {
    let truncated: String = subject.chars().take(MAX_SUBJECT_LEN).collect();
    let raw = format!("{company_name}_{truncated}");

    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while name.contains("__") {
        name = name.replace("__", "_");
    }

    format!("{}.pdf", name.trim_matches('_'))
}

// src/services/fetch.rs

//! Fetch-and-normalize pipeline.
//!
//! Issues a single listing request (direct or behind a relay prefix),
//! discriminates the two upstream response shapes and maps each through its
//! own normalization function into the canonical [`Announcement`] record.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;
use url::form_urlencoded;

use crate::error::{AppError, Result};
use crate::models::{Announcement, Config, SourceShape};
use crate::services::http;

/// Raw listing response, resolved by content type or shape probe.
#[derive(Debug)]
enum RawListing {
    Html(String),
    Json(AnnGetDataResponse),
}

/// JSON-shape response body.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnGetDataResponse {
    #[serde(rename = "Table", default)]
    pub table: Vec<AnnRow>,
}

/// One row of the JSON `Table` array. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnRow {
    #[serde(rename = "NEWSID", default)]
    pub news_id: String,
    #[serde(rename = "SCRIP_NAME", default)]
    pub scrip_name: String,
    #[serde(rename = "SCRIP_CODE", default)]
    pub scrip_code: i64,
    #[serde(rename = "CATEGORYNAME", default)]
    pub category_name: String,
    #[serde(rename = "NEWSSUB", default)]
    pub news_sub: String,
    #[serde(rename = "NEWSDTTM", default)]
    pub news_dttm: String,
    #[serde(rename = "ATTACHMENTNAME", default)]
    pub attachment_name: String,
}

/// Service for fetching and normalizing the announcement listing.
pub struct FetchPipeline {
    client: reqwest::Client,
    source: SourceShape,
    listing_url: String,
    api_url: String,
    pdf_base_url: String,
    page_size: u32,
    timeout: Duration,
}

impl FetchPipeline {
    /// Create a pipeline sharing the application HTTP client.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            source: config.endpoints.source,
            listing_url: config.endpoints.listing_url.clone(),
            api_url: config.endpoints.api_url.clone(),
            pdf_base_url: config.endpoints.pdf_base_url.clone(),
            page_size: config.fetcher.page_size,
            timeout: Duration::from_secs(config.fetcher.fetch_timeout_secs),
        }
    }

    /// Fetch today's announcements through the given relay prefix.
    ///
    /// An empty prefix means a direct, unrelayed request. An empty
    /// normalized list is a failure: the upstream always carries same-day
    /// entries during the polling window, so zero rows means it served a
    /// placeholder or error page.
    pub async fn fetch_via_channel(&self, channel_prefix: &str) -> Result<Vec<Announcement>> {
        let url = self.channel_url(channel_prefix)?;
        log::debug!("Fetching announcements from {}", url);

        let response = self
            .client
            .get(&url)
            .headers(http::browser_headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::status(
                status.as_u16(),
                "BSE website returned an error",
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| AppError::transport(format!("unreadable response body: {e}")))?;

        let announcements = match discriminate(content_type.as_deref(), body)? {
            RawListing::Html(html) => parse_html_listing(&html),
            RawListing::Json(data) => parse_json_listing(&data, &self.pdf_base_url),
        };

        if announcements.is_empty() {
            return Err(AppError::EmptyResult);
        }

        log::info!("Fetched {} announcements", announcements.len());
        Ok(announcements)
    }

    /// Build the full request URL for a channel.
    ///
    /// Relayed requests carry the whole upstream URL percent-encoded behind
    /// the relay prefix, query included, so the relay decodes exactly once.
    fn channel_url(&self, channel_prefix: &str) -> Result<String> {
        let (base, params) = self.upstream_query(Utc::now().date_naive());

        if channel_prefix.is_empty() {
            let url = Url::parse_with_params(&base, &params)?;
            return Ok(url.to_string());
        }

        let query: String = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&params)
            .finish();
        let encoded_base: String = form_urlencoded::byte_serialize(base.as_bytes()).collect();
        let encoded_query: String =
            form_urlencoded::byte_serialize(format!("?{query}").as_bytes()).collect();

        Ok(format!("{channel_prefix}{encoded_base}{encoded_query}"))
    }

    /// The exchange-specific query for today's announcements.
    fn upstream_query(&self, today: NaiveDate) -> (String, Vec<(String, String)>) {
        let date = today.format("%d/%m/%Y").to_string();
        match self.source {
            SourceShape::Html => (
                self.listing_url.clone(),
                vec![
                    ("dt".into(), date.clone()),
                    ("PageSize".into(), self.page_size.to_string()),
                    ("PageNo".into(), "1".into()),
                    ("hdnDate".into(), date),
                    ("scrip".into(), String::new()),
                    ("anntype".into(), String::new()),
                    ("annflag".into(), "1".into()),
                    ("exchdiv".into(), "All".into()),
                ],
            ),
            SourceShape::Json => (
                self.api_url.clone(),
                vec![
                    ("strCat".into(), "-1".into()),
                    ("strPrevDate".into(), date.clone()),
                    ("strScrip".into(), String::new()),
                    ("strSearch".into(), "1".into()),
                    ("strToDate".into(), date),
                    ("strType".into(), "C".into()),
                ],
            ),
        }
    }
}

/// Resolve the response shape: content type first, shape probe second.
fn discriminate(content_type: Option<&str>, body: String) -> Result<RawListing> {
    let looks_json = content_type.is_some_and(|ct| ct.contains("json"))
        || body.trim_start().starts_with('{');

    if looks_json {
        let data: AnnGetDataResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::transport(format!("invalid JSON response shape: {e}")))?;
        return Ok(RawListing::Json(data));
    }
    Ok(RawListing::Html(body))
}

/// Normalize the HTML table shape.
///
/// Fixed column positions in `#tdData`: 0 company, 1 subject (anchor holds
/// the PDF link), 2 scrip code, 3 category, 4 submission date. Rows missing
/// company name or subject are dropped.
pub fn parse_html_listing(html: &str) -> Vec<Announcement> {
    static ROW_SELECTOR: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#tdData tr").expect("static selector"));
    static CELL_SELECTOR: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td").expect("static selector"));
    static LINK_SELECTOR: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a").expect("static selector"));

    let document = Html::parse_document(html);
    let batch_stamp = Utc::now().timestamp_millis();
    let mut announcements = Vec::new();

    for (index, row) in document.select(&ROW_SELECTOR).enumerate() {
        let cells: Vec<_> = row.select(&CELL_SELECTOR).collect();

        let text_at = |i: usize| -> String {
            cells
                .get(i)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .unwrap_or_default()
        };

        let company_name = text_at(0);
        let subject = text_at(1);
        if company_name.is_empty() || subject.is_empty() {
            continue;
        }

        let pdf_url = cells
            .get(1)
            .and_then(|c| c.select(&LINK_SELECTOR).next())
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        let submission_date = to_iso_8601(&text_at(4))
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());

        announcements.push(Announcement {
            id: format!("ann_{index}_{batch_stamp}"),
            company_name,
            company_code: text_at(2),
            announcement_type: text_at(3),
            subject,
            submission_date,
            pdf_url,
            summary: None,
            is_processed: false,
        });
    }

    announcements
}

/// Normalize the JSON `Table` shape.
///
/// The PDF URL is the fixed attachment base path plus the attachment file
/// name. Rows missing company name or subject are dropped.
pub fn parse_json_listing(data: &AnnGetDataResponse, pdf_base_url: &str) -> Vec<Announcement> {
    data.table
        .iter()
        .filter_map(|row| {
            let company_name = row.scrip_name.trim().to_string();
            let subject = row.news_sub.trim().to_string();
            if company_name.is_empty() || subject.is_empty() {
                return None;
            }

            let pdf_url = if row.attachment_name.is_empty() {
                String::new()
            } else {
                format!("{pdf_base_url}{}", row.attachment_name)
            };

            let submission_date = to_iso_8601(&row.news_dttm)
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());

            Some(Announcement {
                id: row.news_id.clone(),
                company_name,
                company_code: row.scrip_code.to_string(),
                announcement_type: row.category_name.trim().to_string(),
                subject,
                submission_date,
                pdf_url,
                summary: None,
                is_processed: false,
            })
        })
        .collect()
}

/// Normalize a source datetime string to canonical ISO 8601 form
/// (`YYYY-MM-DDTHH:MM:SS.mmmZ`). Naive timestamps are taken as-is.
pub fn to_iso_8601(raw: &str) -> Option<String> {
    const ISO_OUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(ISO_OUT).to_string());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.format(ISO_OUT).to_string());
        }
    }

    for format in ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            let dt = date.and_hms_opt(0, 0, 0)?;
            return Some(dt.format(ISO_OUT).to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::http::create_client;

    const LISTING_HTML: &str = r#"
        <html><body>
        <table id="tdData">
            <tr>
                <td>ABC Ltd</td>
                <td><a href="https://www.bseindia.com/xml-data/corpfiling/AttachLive/abc.pdf">Q1 Results</a></td>
                <td>500001</td>
                <td>Board Meeting</td>
                <td>21/07/2025 10:00:00</td>
            </tr>
            <tr>
                <td></td>
                <td><a href="https://example.com/x.pdf">Missing company</a></td>
                <td>500002</td>
                <td>Other</td>
                <td>21/07/2025 11:00:00</td>
            </tr>
            <tr>
                <td>XYZ Ltd</td>
                <td>No link subject</td>
                <td>500003</td>
                <td>Dividend</td>
                <td>21/07/2025</td>
            </tr>
        </table>
        </body></html>
    "#;

    fn pipeline_for(source: SourceShape) -> FetchPipeline {
        let mut config = Config::default();
        config.endpoints.source = source;
        let client = create_client(&config.fetcher).unwrap();
        FetchPipeline::new(client, &config)
    }

    #[test]
    fn test_parse_html_listing_drops_incomplete_rows() {
        let announcements = parse_html_listing(LISTING_HTML);
        // 3 input rows, 1 dropped for missing company name
        assert_eq!(announcements.len(), 2);
        assert_eq!(announcements[0].company_name, "ABC Ltd");
        assert_eq!(announcements[0].subject, "Q1 Results");
        assert_eq!(announcements[0].company_code, "500001");
        assert_eq!(announcements[0].announcement_type, "Board Meeting");
        assert_eq!(
            announcements[0].pdf_url,
            "https://www.bseindia.com/xml-data/corpfiling/AttachLive/abc.pdf"
        );
        assert_eq!(announcements[0].submission_date, "2025-07-21T10:00:00.000Z");
        assert!(!announcements[0].is_processed);
    }

    #[test]
    fn test_parse_html_listing_ids_unique_within_batch() {
        let announcements = parse_html_listing(LISTING_HTML);
        assert_ne!(announcements[0].id, announcements[1].id);
    }

    #[test]
    fn test_parse_json_listing_maps_fields() {
        let body = r#"{
            "Table": [{
                "NEWSID": "1",
                "SCRIP_NAME": "ABC Ltd",
                "SCRIP_CODE": 500001,
                "CATEGORYNAME": "Board Meeting",
                "NEWSSUB": "Q1 Results",
                "NEWSDTTM": "2025-07-21T10:00:00",
                "ATTACHMENTNAME": "abc.pdf"
            }]
        }"#;
        let data: AnnGetDataResponse = serde_json::from_str(body).unwrap();
        let announcements =
            parse_json_listing(&data, "https://www.bseindia.com/xml-data/corpfiling/AttachLive/");

        assert_eq!(announcements.len(), 1);
        let ann = &announcements[0];
        assert_eq!(ann.id, "1");
        assert_eq!(ann.company_name, "ABC Ltd");
        assert_eq!(ann.company_code, "500001");
        assert_eq!(ann.announcement_type, "Board Meeting");
        assert_eq!(ann.subject, "Q1 Results");
        assert_eq!(ann.submission_date, "2025-07-21T10:00:00.000Z");
        assert_eq!(
            ann.pdf_url,
            "https://www.bseindia.com/xml-data/corpfiling/AttachLive/abc.pdf"
        );
        assert!(!ann.is_processed);
    }

    #[test]
    fn test_parse_json_listing_drops_empty_subject() {
        let body = r#"{"Table": [
            {"NEWSID": "1", "SCRIP_NAME": "ABC Ltd", "NEWSSUB": ""},
            {"NEWSID": "2", "SCRIP_NAME": "DEF Ltd", "NEWSSUB": "Valid", "NEWSDTTM": "2025-07-21T10:00:00"}
        ]}"#;
        let data: AnnGetDataResponse = serde_json::from_str(body).unwrap();
        let announcements = parse_json_listing(&data, "https://example.com/");
        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].id, "2");
    }

    #[test]
    fn test_discriminate_by_content_type() {
        let raw = discriminate(Some("application/json; charset=utf-8"), "{\"Table\":[]}".into());
        assert!(matches!(raw, Ok(RawListing::Json(_))));

        let raw = discriminate(Some("text/html"), "<html></html>".into());
        assert!(matches!(raw, Ok(RawListing::Html(_))));
    }

    #[test]
    fn test_discriminate_by_shape_probe() {
        let raw = discriminate(None, "  {\"Table\":[]}".into());
        assert!(matches!(raw, Ok(RawListing::Json(_))));
    }

    #[test]
    fn test_discriminate_rejects_malformed_json() {
        let raw = discriminate(Some("application/json"), "{not json".into());
        assert!(matches!(raw, Err(AppError::Transport { .. })));
    }

    #[test]
    fn test_to_iso_8601_formats() {
        assert_eq!(
            to_iso_8601("2025-07-21T10:00:00").as_deref(),
            Some("2025-07-21T10:00:00.000Z")
        );
        assert_eq!(
            to_iso_8601("21/07/2025 10:00:00").as_deref(),
            Some("2025-07-21T10:00:00.000Z")
        );
        assert_eq!(
            to_iso_8601("21/07/2025").as_deref(),
            Some("2025-07-21T00:00:00.000Z")
        );
        assert_eq!(to_iso_8601("not a date"), None);
        assert_eq!(to_iso_8601(""), None);
    }

    #[test]
    fn test_direct_channel_url_html_params() {
        let pipeline = pipeline_for(SourceShape::Html);
        let url = pipeline.channel_url("").unwrap();
        assert!(url.starts_with("https://www.bseindia.com/corporates/annListings_New.aspx?"));
        assert!(url.contains("PageSize=50"));
        assert!(url.contains("annflag=1"));
        assert!(url.contains("exchdiv=All"));
    }

    #[test]
    fn test_direct_channel_url_json_params() {
        let pipeline = pipeline_for(SourceShape::Json);
        let url = pipeline.channel_url("").unwrap();
        assert!(url.starts_with("https://api.bseindia.com/BseIndiaAPI/api/AnnGetData/w?"));
        assert!(url.contains("strCat=-1"));
        assert!(url.contains("strType=C"));
    }

    #[test]
    fn test_relayed_channel_url_is_encoded() {
        let pipeline = pipeline_for(SourceShape::Html);
        let url = pipeline.channel_url("https://api.allorigins.win/raw?url=").unwrap();
        assert!(url.starts_with("https://api.allorigins.win/raw?url=https%3A%2F%2F"));
        // Query separator of the upstream URL must be encoded too
        assert!(url.contains("%3Fdt%3D"));
        assert!(!url[40..].contains("https://www.bseindia.com"));
    }
}

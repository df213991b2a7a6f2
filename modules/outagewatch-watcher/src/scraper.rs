//! Fetches the provider's trouble-listing page and extracts outage records.
//!
//! Listing entries are anchors whose href points at `/trouble/detail/{id}`;
//! date, status, title, and area are recovered from the anchor text. Raw
//! status labels are mapped to [`OutageStatus`] here and nowhere else.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tracing::{info, warn};

use outagewatch_common::{OutageRecord, OutageStatus};

/// Produces the ordered list of outages as currently published.
#[async_trait]
pub trait OutageSource: Send + Sync {
    async fn fetch_outages(&self) -> Result<Vec<OutageRecord>>;
}

/// Max fetch attempts per page for transient HTTP failures.
const FETCH_MAX_ATTEMPTS: u32 = 3;
/// Base backoff duration. Actual delay is base * 2^attempt plus jitter.
const FETCH_RETRY_BASE: Duration = Duration::from_secs(1);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Parenthesized groups containing one of these read as an area, not a status.
const AREA_MARKERS: &str = "丁目|付近|地区|町|番地";

/// Scraper for the live trouble-listing page.
pub struct TroublePageSource {
    http: reqwest::Client,
    trouble_url: String,
    max_pages: u32,
}

impl TroublePageSource {
    pub fn new(trouble_url: &str, max_pages: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("outagewatch/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            trouble_url: trouble_url.to_string(),
            max_pages,
        })
    }

    fn page_url(&self, page: u32) -> String {
        if page == 1 {
            self.trouble_url.clone()
        } else {
            format!("{}page/{page}/", self.trouble_url)
        }
    }

    /// Fetch one URL, retrying transient failures with exponential backoff
    /// (1s, 2s) plus random jitter (0-1s).
    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 0..FETCH_MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = FETCH_RETRY_BASE * 2u32.pow(attempt - 1);
                let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                warn!(
                    url,
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs(),
                    "Retrying fetch after backoff"
                );
                tokio::time::sleep(backoff + jitter).await;
            }

            let result = async {
                let response = self.http.get(url).send().await?;
                let response = response.error_for_status()?;
                response.text().await
            }
            .await;

            match result {
                Ok(html) => return Ok(html),
                Err(e) => last_err = Some(e),
            }
        }

        Err(anyhow::Error::from(last_err.expect("at least one attempt ran")))
            .with_context(|| format!("Fetch failed after {FETCH_MAX_ATTEMPTS} attempts: {url}"))
    }
}

#[async_trait]
impl OutageSource for TroublePageSource {
    async fn fetch_outages(&self) -> Result<Vec<OutageRecord>> {
        let mut all = Vec::new();

        for page in 1..=self.max_pages {
            let url = self.page_url(page);
            let html = match self.fetch_with_retry(&url).await {
                Ok(html) => html,
                // The first page is the listing; without it there is no pass.
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "Listing page fetch failed, stopping pagination");
                    break;
                }
            };

            let records = parse_listing(&html, &url);
            if records.is_empty() {
                info!(page, "No outage entries on listing page");
                break;
            }
            info!(page, count = records.len(), "Parsed outage entries");
            all.extend(records);
        }

        Ok(all)
    }
}

/// Extract outage records from listing-page HTML, in page order.
/// Duplicate detail links keep their first occurrence.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<OutageRecord> {
    let anchor_re = Regex::new(
        r#"(?s)<a\s[^>]*href\s*=\s*["']([^"']*/trouble/detail/(\d+)[^"']*)["'][^>]*>(.*?)</a>"#,
    )
    .expect("valid regex");
    let base = url::Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for cap in anchor_re.captures_iter(html) {
        let href = &cap[1];
        let id = cap[2].to_string();
        if !seen.insert(id.clone()) {
            continue;
        }

        let text = strip_tags(&cap[3]);
        if text.is_empty() {
            continue;
        }

        let url = match &base {
            Some(b) => b
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        };

        let date = extract_date(&text);
        let status = extract_status(&text);
        let (title, area) = extract_title_and_area(&text, &date, &status);

        records.push(OutageRecord {
            id,
            date,
            status,
            title,
            area,
            url,
        });
    }

    records
}

/// Flatten an anchor's inner HTML to plain text: drop tags, trim each text
/// run, concatenate.
fn strip_tags(fragment: &str) -> String {
    let tag_re = Regex::new(r"<[^>]*>").expect("valid regex");
    tag_re
        .split(fragment)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

fn extract_date(text: &str) -> String {
    let date_re = Regex::new(r"\d{4}\.\d{2}\.\d{2}").expect("valid regex");
    date_re
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// The first parenthesized group after the date, unless it reads as an area.
fn extract_status(text: &str) -> OutageStatus {
    let status_re =
        Regex::new(r"(?:\d{4}\.\d{2}\.\d{2})?\s*[（(]([^）)]+)[）)]").expect("valid regex");
    let area_re = Regex::new(AREA_MARKERS).expect("valid regex");

    if let Some(cap) = status_re.captures(text) {
        let label = &cap[1];
        if !area_re.is_match(label) {
            return OutageStatus::from_label(label);
        }
    }
    OutageStatus::Ongoing
}

/// Whatever is left after removing the date and the status group is the
/// title, minus a parenthesized area group if one is present.
fn extract_title_and_area(text: &str, date: &str, status: &OutageStatus) -> (String, String) {
    let mut clean = text.to_string();
    if !date.is_empty() {
        clean = clean.replacen(date, "", 1);
    }
    if *status != OutageStatus::Ongoing {
        let status_re = Regex::new(&format!("[（(]{}[）)]", regex::escape(status.as_label())))
            .expect("valid regex");
        clean = status_re.replace_all(&clean, "").into_owned();
    }
    let clean = clean.trim().to_string();

    let area_re = Regex::new(&format!(r"[（(]([^）)]*(?:{AREA_MARKERS})[^）)]*)[）)]"))
        .expect("valid regex");
    let area = area_re
        .captures(&clean)
        .map(|cap| cap[1].to_string())
        .unwrap_or_default();

    let mut title = clean;
    if !area.is_empty() {
        let this_area_re =
            Regex::new(&format!("[（(]{}[）)]", regex::escape(&area))).expect("valid regex");
        title = this_area_re.replace_all(&title, "").into_owned();
    }

    (title.trim().to_string(), area)
}

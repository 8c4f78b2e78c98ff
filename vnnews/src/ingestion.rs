use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::Feed;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;

// Feed entries without a title get the same placeholder the scrapers use,
// so downstream display never shows an empty title.
use crate::scraping::MISSING_TITLE;

/// One entry of a syndication feed, reduced to the fields the poll cycle
/// works with.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Publish time as parsed by feed-rs; `None` when the feed omits the
    /// date or it does not parse. The scraper substitutes the fetch time.
    pub published: Option<DateTime<Utc>>,
}

/// Fetches a feed from the given URL and parses it.
/// One attempt only; a timeout or non-success status is a failed cycle and
/// the next scheduled poll is the retry.
pub async fn fetch_feed(url: &str, timeout_secs: u64) -> Result<Vec<FeedEntry>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build reqwest client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch feed: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
    }

    let bytes = response
        .bytes()
        .await
        .context("failed to read feed response body")?;
    let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;

    Ok(map_entries(feed))
}

/// Reduces a parsed feed to the title/link/published triple per entry,
/// preserving feed order.
pub fn map_entries(feed: Feed) -> Vec<FeedEntry> {
    feed.entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .map(|t| t.content)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| MISSING_TITLE.to_string());
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            FeedEntry {
                title,
                link,
                published: entry.published,
            }
        })
        .collect()
}

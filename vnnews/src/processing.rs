use std::collections::HashSet;

use anyhow::Result;
use common::NewsSource;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::ingestion;
use crate::llm::{summarizer, SummaryProvider};
use crate::scraping;
use crate::storage::{self, NewsItem};

/// Feed entries considered per poll cycle.
pub const FEED_ENTRY_LIMIT: usize = 30;

/// Recent rows snapshotted for title deduplication at cycle start.
pub const TITLE_SNAPSHOT_LIMIT: i64 = 500;

/// Per-source retention window; rows past it are pruned at cycle end.
pub const MAX_KEPT_TITLES: i64 = 200;

/// Summary stored when the scraped page has no usable body text.
pub const EMPTY_CONTENT_SUMMARY: &str = "Không có nội dung";

const FEED_TIMEOUT_SECS: u64 = 10;
const ARTICLE_TIMEOUT_SECS: u64 = 10;

/// Runs one poll cycle for a source: diff the feed against stored titles,
/// fetch and summarize exactly the new articles, and refresh the freshness
/// flags. Returns how many items were stored this cycle.
pub async fn poll_source(
    pool: &SqlitePool,
    provider: &dyn SummaryProvider,
    source: NewsSource,
    feed_url: &str,
    max_entries: usize,
) -> Result<usize> {
    // Snapshot stored titles before touching anything, so the dedup check
    // sees the pre-cycle state.
    let recent = storage::latest_news(pool, TITLE_SNAPSHOT_LIMIT, Some(source)).await?;
    let mut known_titles: HashSet<String> = recent.into_iter().map(|r| r.title).collect();

    // Demote before inserting: only items stored in this cycle stay new.
    storage::mark_all_old(pool, Some(source)).await?;

    let entries = ingestion::fetch_feed(feed_url, FEED_TIMEOUT_SECS).await?;

    let mut count_new = 0;
    for entry in entries.into_iter().take(max_entries) {
        if known_titles.contains(&entry.title) {
            continue;
        }

        let article = scraping::fetch_full_article(
            &entry.link,
            entry.published,
            ARTICLE_TIMEOUT_SECS,
            source,
        )
        .await;
        if article.is_error() {
            // One bad link must not poison the cycle. The sentinel record
            // is never persisted.
            continue;
        }

        let summary = if article.content.is_empty() {
            EMPTY_CONTENT_SUMMARY.to_string()
        } else {
            summarizer::summarize_or_error(provider, &article.content).await
        };

        storage::upsert_news(
            pool,
            &NewsItem {
                title: entry.title.clone(),
                time: article.time,
                content: article.content,
                summary,
                link: entry.link,
                is_new: true,
                source,
            },
        )
        .await?;

        count_new += 1;
        // Feeds occasionally list the same title twice; the set also guards
        // within a single cycle.
        known_titles.insert(entry.title);
    }

    storage::delete_old_news(pool, MAX_KEPT_TITLES, Some(source)).await?;
    info!(source = %source, new_items = count_new, "poll cycle finished");
    Ok(count_new)
}

/// Cycle wrapper that never fails: any error is logged and reported as zero
/// new items. There are no retries; the next scheduled cycle is the retry.
pub async fn run_cycle(
    pool: &SqlitePool,
    provider: &dyn SummaryProvider,
    source: NewsSource,
) -> usize {
    match poll_source(pool, provider, source, source.feed_url(), FEED_ENTRY_LIMIT).await {
        Ok(count) => count,
        Err(e) => {
            error!(source = %source, "poll cycle failed: {:#}", e);
            0
        }
    }
}

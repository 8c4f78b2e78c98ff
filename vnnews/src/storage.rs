use anyhow::{Context, Result};
use chrono::Utc;
use common::NewsSource;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// A news record as written by the poll cycle.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub title: String,
    pub time: String,
    pub content: String,
    pub summary: String,
    pub link: String,
    pub is_new: bool,
    pub source: NewsSource,
}

/// A news record as read back for display. The read path drops the raw
/// content; only the summary is shown.
#[derive(Debug, Clone)]
pub struct NewsRow {
    pub title: String,
    pub time: String,
    pub summary: String,
    pub link: String,
    pub is_new: bool,
}

/// Ensures the required schema exists. Runs CREATE TABLE IF NOT EXISTS for
/// both tables; idempotent and safe to call at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            time TEXT,
            content TEXT,
            summary TEXT,
            link TEXT,
            is_new INTEGER DEFAULT 1,
            source TEXT
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS config (
            id INTEGER PRIMARY KEY,
            gemini_api_key TEXT,
            last_update TEXT
        );
        "#,
    ];

    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| "failed to ensure schema")?;
    }

    Ok(())
}

/// Inserts the item, or refreshes the existing row with the same
/// (title, source). The title is the dedup key; a re-seen article keeps its
/// row id but picks up the new time, content, summary and freshness flag.
pub async fn upsert_news(pool: &SqlitePool, item: &NewsItem) -> Result<()> {
    let existing_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM news WHERE title=? AND source=?",
    )
    .bind(&item.title)
    .bind(item.source.id())
    .fetch_optional(pool)
    .await
    .context("failed to check existing news item")?;

    if let Some(id) = existing_id {
        sqlx::query("UPDATE news SET time=?, content=?, summary=?, link=?, is_new=? WHERE id=?")
            .bind(&item.time)
            .bind(&item.content)
            .bind(&item.summary)
            .bind(&item.link)
            .bind(item.is_new)
            .bind(id)
            .execute(pool)
            .await
            .context("failed to update news item")?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO news (title, time, content, summary, link, is_new, source)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.title)
        .bind(&item.time)
        .bind(&item.content)
        .bind(&item.summary)
        .bind(&item.link)
        .bind(item.is_new)
        .bind(item.source.id())
        .execute(pool)
        .await
        .context("failed to insert news item")?;
    }

    Ok(())
}

/// Returns the most recent rows by stored time, newest first, optionally
/// limited to one source.
pub async fn latest_news(
    pool: &SqlitePool,
    limit: i64,
    source: Option<NewsSource>,
) -> Result<Vec<NewsRow>> {
    let rows = if let Some(source) = source {
        sqlx::query(
            r#"
            SELECT title, time, summary, link, is_new
            FROM news
            WHERE source=?
            ORDER BY datetime(time) DESC
            LIMIT ?
            "#,
        )
        .bind(source.id())
        .bind(limit)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query(
            r#"
            SELECT title, time, summary, link, is_new
            FROM news
            ORDER BY datetime(time) DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
    .context("failed to query latest news")?;

    Ok(rows
        .into_iter()
        .map(|r| NewsRow {
            title: r.get::<String, _>("title"),
            time: r.get::<String, _>("time"),
            summary: r.get::<Option<String>, _>("summary").unwrap_or_default(),
            link: r.get::<String, _>("link"),
            is_new: r.get::<i64, _>("is_new") != 0,
        })
        .collect())
}

/// Clears the freshness flag, optionally for one source only. Runs at the
/// start of each poll cycle so that only items inserted in that cycle end up
/// flagged as new.
pub async fn mark_all_old(pool: &SqlitePool, source: Option<NewsSource>) -> Result<()> {
    if let Some(source) = source {
        sqlx::query("UPDATE news SET is_new=0 WHERE source=?")
            .bind(source.id())
            .execute(pool)
            .await
    } else {
        sqlx::query("UPDATE news SET is_new=0")
            .execute(pool)
            .await
    }
    .context("failed to mark news as old")?;

    Ok(())
}

/// Prunes rows that fall outside the most-recent-N window, per source when
/// one is given.
pub async fn delete_old_news(
    pool: &SqlitePool,
    max_titles: i64,
    source: Option<NewsSource>,
) -> Result<()> {
    let result = if let Some(source) = source {
        sqlx::query(
            r#"
            DELETE FROM news WHERE id NOT IN (
                SELECT id FROM news WHERE source=? ORDER BY datetime(time) DESC LIMIT ?
            ) AND source=?
            "#,
        )
        .bind(source.id())
        .bind(max_titles)
        .bind(source.id())
        .execute(pool)
        .await
    } else {
        sqlx::query(
            r#"
            DELETE FROM news WHERE id NOT IN (
                SELECT id FROM news ORDER BY datetime(time) DESC LIMIT ?
            )
            "#,
        )
        .bind(max_titles)
        .execute(pool)
        .await
    }
    .context("failed to prune old news")?;

    if result.rows_affected() > 0 {
        debug!(removed = result.rows_affected(), "pruned old news rows");
    }

    Ok(())
}

/// Persists the API key in the singleton config row.
pub async fn set_gemini_api_key(pool: &SqlitePool, api_key: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO config (id, gemini_api_key, last_update) VALUES (1, ?, ?)")
        .bind(api_key)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .context("failed to store API key")?;

    debug!("stored Gemini API key");
    Ok(())
}

/// Reads back the stored API key, if any was ever configured.
pub async fn get_gemini_api_key(pool: &SqlitePool) -> Result<Option<String>> {
    let key = sqlx::query_scalar::<_, Option<String>>(
        "SELECT gemini_api_key FROM config WHERE id=1",
    )
    .fetch_optional(pool)
    .await
    .context("failed to read API key")?;

    Ok(key.flatten())
}

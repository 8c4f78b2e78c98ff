/*!
common/src/lib.rs

Shared configuration types and DB helpers for VN News.

This crate provides:
- Config data structures (deserialized from TOML, default + override merge)
- The fixed enumeration of supported news sources
- The canonical stored-time format used across the news table
- A helper to initialize the SQLite connection pool
*/

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Format used for the `news.time` column and for display timestamps.
/// Stored as TEXT so SQLite's `datetime(time)` keeps ordering meaningful.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for storage in the `news.time` column.
pub fn format_stored_time(dt: DateTime<Utc>) -> String {
    dt.format(TIME_FORMAT).to_string()
}

/// The fixed set of supported news providers. Each carries its own feed URL
/// and scraping rules (see the `scraping` module in the main crate); adding a
/// provider means adding a variant here plus its selector set there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewsSource {
    #[serde(rename = "vnexpress")]
    VnExpress,
    #[serde(rename = "24h")]
    Hour24,
}

impl NewsSource {
    pub const ALL: [NewsSource; 2] = [NewsSource::VnExpress, NewsSource::Hour24];

    /// Stable identifier used as the `news.source` column value and in URLs.
    pub fn id(&self) -> &'static str {
        match self {
            NewsSource::VnExpress => "vnexpress",
            NewsSource::Hour24 => "24h",
        }
    }

    /// Human-readable provider name.
    pub fn label(&self) -> &'static str {
        match self {
            NewsSource::VnExpress => "VNExpress",
            NewsSource::Hour24 => "24h.com.vn",
        }
    }

    /// RSS feed for the provider's latest-news stream.
    pub fn feed_url(&self) -> &'static str {
        match self {
            NewsSource::VnExpress => "https://vnexpress.net/rss/tin-moi-nhat.rss",
            NewsSource::Hour24 => "https://cdn.24h.com.vn/upload/rss/tintuctrongngay.rss",
        }
    }
}

impl fmt::Display for NewsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for NewsSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vnexpress" => Ok(NewsSource::VnExpress),
            "24h" => Ok(NewsSource::Hour24),
            other => Err(anyhow::anyhow!("unknown news source: {}", other)),
        }
    }
}

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/vnnews.db")
    pub path: String,
}

/// Gemini credential configuration. The key may be given inline or via the
/// name of an environment variable; either way it ends up persisted in the
/// `config` table so later runs can fall back to the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
}

/// HTTP server bind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// One configured feed instance. Each instance gets its own polling timer and
/// its own set of item sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub source: NewsSource,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_minutes: u64,
    #[serde(default = "default_item_count")]
    pub news_item_count: usize,
}

fn default_scan_interval() -> u64 {
    600
}

fn default_item_count() -> usize {
    10
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gemini: Option<GeminiConfig>,
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional
    /// override file. If both are present they are merged, override winning.
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// Creates the parent directory and the DB file if necessary, then returns a
/// configured `SqlitePool`. Pool size is modest; the pollers are sequential
/// and the read surface is light.
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // Create the DB file up front so filesystem problems surface with a clear
    // error instead of through the SQLite connection attempt.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Local;
use common::{Config, FeedConfig, NewsSource, TIME_FORMAT};
use sqlx::SqlitePool;
use tokio::select;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::llm::SummaryProvider;
use crate::processing;
use crate::sensor::{
    FeedSensorSnapshot, ItemSensorSnapshot, NewsFeedSensor, NewsItemSensor,
    AGGREGATE_VIEW_LIMIT, ITEM_VIEW_LIMIT,
};
use crate::storage;

/// Sensors of one feed instance. Updated together after each poll cycle.
#[derive(Debug)]
struct Sensors {
    feed: NewsFeedSensor,
    items: Vec<NewsItemSensor>,
}

/// One configured feed instance: the aggregate sensor, its per-item slots
/// and the polling timer that drives them.
#[derive(Debug)]
pub struct NewsEntry {
    source: NewsSource,
    scan_interval: Duration,
    news_item_count: usize,
    sensors: RwLock<Sensors>,
    shutdown: Arc<Notify>,
}

impl NewsEntry {
    fn new(feed: &FeedConfig, shutdown: Arc<Notify>) -> Self {
        let source = feed.source;
        let items = (1..=feed.news_item_count)
            .map(|i| NewsItemSensor::new(source, i))
            .collect();
        Self {
            source,
            scan_interval: Duration::from_secs(feed.scan_interval_minutes * 60),
            news_item_count: feed.news_item_count,
            sensors: RwLock::new(Sensors {
                feed: NewsFeedSensor::new(source),
                items,
            }),
            shutdown,
        }
    }

    pub fn source(&self) -> NewsSource {
        self.source
    }

    pub fn news_item_count(&self) -> usize {
        self.news_item_count
    }

    /// One update pass: run the poll cycle, re-read the store, then swap the
    /// rendered views in. The sensors lock is only held for the final swap,
    /// so API reads never wait on network I/O.
    async fn update_all(&self, pool: &SqlitePool, provider: &dyn SummaryProvider) {
        let count_new = processing::run_cycle(pool, provider, self.source).await;
        let last_update = Local::now().format(TIME_FORMAT).to_string();

        let aggregate_rows =
            storage::latest_news(pool, AGGREGATE_VIEW_LIMIT, Some(self.source)).await;
        let item_rows = storage::latest_news(pool, ITEM_VIEW_LIMIT, Some(self.source)).await;

        let mut sensors = self.sensors.write().await;
        match aggregate_rows {
            Ok(rows) => sensors.feed.apply_cycle(count_new, &last_update, &rows),
            Err(e) => warn!(source = %self.source, "failed to read aggregate rows: {:#}", e),
        }
        match item_rows {
            Ok(rows) => {
                for item in sensors.items.iter_mut() {
                    item.apply_rows(&rows);
                }
            }
            Err(e) => warn!(source = %self.source, "failed to read item rows: {:#}", e),
        }
    }

    /// Timer loop for this entry: update immediately, then on every interval
    /// tick until shutdown. An in-flight update pass is never interrupted.
    pub async fn run(&self, pool: SqlitePool, provider: Arc<dyn SummaryProvider>) {
        info!(
            source = %self.source,
            interval_secs = self.scan_interval.as_secs(),
            "news entry timer started"
        );
        loop {
            self.update_all(&pool, provider.as_ref()).await;
            select! {
                _ = tokio::time::sleep(self.scan_interval) => {}
                _ = self.shutdown.notified() => {
                    info!(source = %self.source, "news entry timer stopped");
                    break;
                }
            }
        }
    }

    pub async fn feed_snapshot(&self) -> FeedSensorSnapshot {
        self.sensors.read().await.feed.snapshot()
    }

    /// Snapshot of the per-item slot at a 1-based index, or None when the
    /// index falls outside the configured slot count.
    pub async fn item_snapshot(&self, index: usize) -> Option<ItemSensorSnapshot> {
        let sensors = self.sensors.read().await;
        if index >= 1 && index <= sensors.items.len() {
            Some(sensors.items[index - 1].snapshot())
        } else {
            None
        }
    }

    pub async fn item_snapshots(&self) -> Vec<ItemSensorSnapshot> {
        self.sensors
            .read()
            .await
            .items
            .iter()
            .map(|s| s.snapshot())
            .collect()
    }
}

/// All configured feed instances, keyed by source id.
#[derive(Debug)]
pub struct EntryRegistry {
    entries: HashMap<String, Arc<NewsEntry>>,
    shutdown: Arc<Notify>,
}

impl EntryRegistry {
    /// Builds one entry per configured feed. Listing a source twice is a
    /// configuration error.
    pub fn from_config(config: &Config) -> Result<Self> {
        let shutdown = Arc::new(Notify::new());
        let mut entries = HashMap::new();
        for feed in &config.feeds {
            let id = feed.source.id().to_string();
            if entries.contains_key(&id) {
                bail!("news source {} is already configured", id);
            }
            entries.insert(id, Arc::new(NewsEntry::new(feed, shutdown.clone())));
        }
        Ok(Self { entries, shutdown })
    }

    pub fn get(&self, source: &str) -> Option<&Arc<NewsEntry>> {
        self.entries.get(source)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source ids in stable order, for listings.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.entries.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Spawns one timer task per entry. Each runs until `unsubscribe_all`.
    pub fn spawn_all(
        &self,
        pool: &SqlitePool,
        provider: &Arc<dyn SummaryProvider>,
    ) -> Vec<JoinHandle<()>> {
        self.entries
            .values()
            .map(|entry| {
                let entry = entry.clone();
                let pool = pool.clone();
                let provider = provider.clone();
                tokio::spawn(async move { entry.run(pool, provider).await })
            })
            .collect()
    }

    /// Stops every entry timer. An in-flight update pass finishes first.
    pub fn unsubscribe_all(&self) {
        self.shutdown.notify_waiters();
    }
}

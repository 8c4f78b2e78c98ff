use std::cmp::Reverse;

use chrono::NaiveDateTime;
use common::{NewsSource, TIME_FORMAT};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::storage::NewsRow;

/// Rows shown in the aggregate attribute map.
pub const AGGREGATE_VIEW_LIMIT: i64 = 30;

/// Rows considered when resolving a per-item slot.
pub const ITEM_VIEW_LIMIT: i64 = 60;

/// Per-item state is clipped to this many characters.
pub const ITEM_STATE_MAX_CHARS: usize = 255;

/// Placeholder state for an item slot with nothing at all to show.
pub const NO_DATA_STATE: &str = "Không có dữ liệu";

/// Aggregate state before the first completed cycle, and after any cycle
/// that stored nothing.
pub const NO_NEWS_STATE: &str = "Không có tin mới";

/// Stored times outside the expected format sort as minimum time, so they
/// rank last within their freshness tier.
fn parse_stored_time(time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(time, TIME_FORMAT).unwrap_or(NaiveDateTime::MIN)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Renders the aggregate view: state string plus the enumerated attribute
/// map. New items come first, then most recent first within each tier; the
/// sort is stable, so equal keys keep their stored order.
pub fn render_aggregate(
    rows: &[NewsRow],
    new_count: usize,
    last_update: &str,
    source: NewsSource,
) -> (String, Map<String, Value>) {
    let mut ordered: Vec<&NewsRow> = rows.iter().collect();
    ordered.sort_by_key(|r| (!r.is_new, Reverse(parse_stored_time(&r.time))));

    let mut attributes = Map::new();
    for (i, row) in ordered.iter().enumerate() {
        let padded = format!("{:02}", i + 1);
        let key = if row.is_new {
            format!("Tin {} (Tin mới)", padded)
        } else {
            format!("Tin {}", padded)
        };
        attributes.insert(
            key,
            Value::String(format!("Tiêu Đề: {}\nNội Dung: {}", row.title, row.summary)),
        );
    }
    attributes.insert("tin_moi".to_string(), json!(new_count));
    attributes.insert("cap_nhat_luc".to_string(), json!(last_update));
    attributes.insert("nguon_tin".to_string(), json!(source.id()));

    let state = if new_count > 0 {
        format!("Có {} tin mới", new_count)
    } else {
        NO_NEWS_STATE.to_string()
    };

    (state, attributes)
}

/// Resolves the state of the per-item slot at a 1-based index: new rows
/// outrank old rows, most recent first within each tier. A slot beyond the
/// available rows falls back to the least recent row, or the placeholder
/// when the table is empty for this source.
pub fn select_item_state(rows: &[NewsRow], index: usize) -> String {
    let mut fresh: Vec<&NewsRow> = rows.iter().filter(|r| r.is_new).collect();
    let mut stale: Vec<&NewsRow> = rows.iter().filter(|r| !r.is_new).collect();
    fresh.sort_by_key(|r| Reverse(parse_stored_time(&r.time)));
    stale.sort_by_key(|r| Reverse(parse_stored_time(&r.time)));

    let ranked: Vec<&NewsRow> = fresh.into_iter().chain(stale).collect();

    if index >= 1 && ranked.len() >= index {
        let summary = &ranked[index - 1].summary;
        if summary.is_empty() {
            String::new()
        } else {
            truncate_chars(summary, ITEM_STATE_MAX_CHARS)
        }
    } else {
        let summary = ranked.last().map(|r| r.summary.as_str()).unwrap_or("");
        if summary.is_empty() {
            NO_DATA_STATE.to_string()
        } else {
            truncate_chars(summary, ITEM_STATE_MAX_CHARS)
        }
    }
}

/// Snapshot of the aggregate sensor, as exposed over the read API.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSensorSnapshot {
    pub source: String,
    pub name: String,
    pub state: String,
    pub attributes: Map<String, Value>,
}

/// Snapshot of one per-item sensor. `state` is None until the first update.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSensorSnapshot {
    pub source: String,
    pub index: usize,
    pub name: String,
    pub state: Option<String>,
}

/// The aggregate sensor for one source. Holds the rendered view between
/// update passes; the entry runtime feeds it fresh rows after each cycle.
#[derive(Debug)]
pub struct NewsFeedSensor {
    source: NewsSource,
    name: String,
    state: String,
    attributes: Map<String, Value>,
    new_count: usize,
}

impl NewsFeedSensor {
    pub fn new(source: NewsSource) -> Self {
        Self {
            source,
            name: format!("{} News", source.id().to_uppercase()),
            state: NO_NEWS_STATE.to_string(),
            attributes: Map::new(),
            new_count: 0,
        }
    }

    /// Absorbs the outcome of a poll cycle and re-renders the view.
    pub fn apply_cycle(&mut self, new_count: usize, last_update: &str, rows: &[NewsRow]) {
        self.new_count = new_count;
        let (state, attributes) = render_aggregate(rows, new_count, last_update, self.source);
        self.state = state;
        self.attributes = attributes;
    }

    pub fn new_count(&self) -> usize {
        self.new_count
    }

    pub fn snapshot(&self) -> FeedSensorSnapshot {
        FeedSensorSnapshot {
            source: self.source.id().to_string(),
            name: self.name.clone(),
            state: self.state.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// One per-item sensor slot for a source.
#[derive(Debug)]
pub struct NewsItemSensor {
    source: NewsSource,
    index: usize,
    name: String,
    state: Option<String>,
}

impl NewsItemSensor {
    pub fn new(source: NewsSource, index: usize) -> Self {
        Self {
            source,
            index,
            name: format!("Tin {} ({})", index, source.id()),
            state: None,
        }
    }

    /// Re-resolves this slot from the given recent rows.
    pub fn apply_rows(&mut self, rows: &[NewsRow]) {
        self.state = Some(select_item_state(rows, self.index));
    }

    pub fn snapshot(&self) -> ItemSensorSnapshot {
        ItemSensorSnapshot {
            source: self.source.id().to_string(),
            index: self.index,
            name: self.name.clone(),
            state: self.state.clone(),
        }
    }
}

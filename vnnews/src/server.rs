use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket, State};
use serde::Serialize;
use sqlx::SqlitePool;

use common::Config;

use crate::entry::EntryRegistry;
use crate::sensor::{FeedSensorSnapshot, ItemSensorSnapshot};

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub db: SqlitePool,
    pub registry: Arc<EntryRegistry>,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    sources: Vec<SourceStatus>,
}

#[derive(Serialize)]
struct SourceStatus {
    id: String,
    label: String,
    feed_url: String,
    scan_interval_minutes: u64,
    news_item_count: usize,
    stored_rows: i64,
}

/// All sensors of one configured source.
#[derive(Serialize)]
struct EntrySensors {
    feed: FeedSensorSnapshot,
    items: Vec<ItemSensorSnapshot>,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint with uptime and the configured sources.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();

    let mut sources = Vec::new();
    for feed in &state.config.feeds {
        let stored_rows =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news WHERE source=?")
                .bind(feed.source.id())
                .fetch_one(&state.db)
                .await
                .unwrap_or(0);
        sources.push(SourceStatus {
            id: feed.source.id().to_string(),
            label: feed.source.label().to_string(),
            feed_url: feed.source.feed_url().to_string(),
            scan_interval_minutes: feed.scan_interval_minutes,
            news_item_count: feed.news_item_count,
            stored_rows,
        });
    }

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        sources,
    })
}

/// All sensors across every configured source.
#[get("/api/v1/sensors")]
async fn list_sensors(state: &State<AppState>) -> Json<Vec<EntrySensors>> {
    let mut all = Vec::new();
    for source in state.registry.sources() {
        if let Some(entry) = state.registry.get(&source) {
            all.push(EntrySensors {
                feed: entry.feed_snapshot().await,
                items: entry.item_snapshots().await,
            });
        }
    }
    Json(all)
}

/// Sensors of a single source; 404 for sources not configured.
#[get("/api/v1/sensors/<source>")]
async fn source_sensors(
    state: &State<AppState>,
    source: &str,
) -> Result<Json<EntrySensors>, Status> {
    let entry = state.registry.get(source).ok_or(Status::NotFound)?;
    Ok(Json(EntrySensors {
        feed: entry.feed_snapshot().await,
        items: entry.item_snapshots().await,
    }))
}

/// One per-item sensor. An index outside the configured slot count is a 404;
/// an index inside the count but beyond the stored rows resolves through the
/// staleness fallback instead.
#[get("/api/v1/sensors/<source>/items/<index>")]
async fn item_sensor(
    state: &State<AppState>,
    source: &str,
    index: usize,
) -> Result<Json<ItemSensorSnapshot>, Status> {
    let entry = state.registry.get(source).ok_or(Status::NotFound)?;
    let snapshot = entry.item_snapshot(index).await.ok_or(Status::NotFound)?;
    Ok(Json(snapshot))
}

/// Builds the Rocket instance with managed state and routes, applying
/// `server.bind` and `server.port` from the application config. Split from
/// `launch_rocket` so tests can drive it with a local client.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &state.config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig).manage(state).mount(
        "/",
        routes![health, status, list_sensors, source_sensors, item_sensor],
    )
}

/// Launches the HTTP server. Blocks until Rocket shuts down and returns an
/// error if it fails to start.
pub async fn launch_rocket(
    db_pool: SqlitePool,
    config: Arc<Config>,
    registry: Arc<EntryRegistry>,
) -> Result<()> {
    let state = AppState {
        started_at: Utc::now(),
        config,
        db: db_pool,
        registry,
    };

    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}

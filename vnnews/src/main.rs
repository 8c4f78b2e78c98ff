/*
vnnews - single-binary main.rs
This binary serves the sensor read API over HTTP and runs the per-source
polling timers inside the same process.
*/

use anyhow::Result;
use clap::Parser;
use common::{init_db_pool, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use vnnews::entry::EntryRegistry;
use vnnews::llm::gemini::GeminiClient;
use vnnews::llm::SummaryProvider;
use vnnews::server::launch_rocket;
use vnnews::setup;
use vnnews::storage;

#[derive(Parser, Debug)]
#[command(name = "vnnews", about = "VN News single-binary server + worker")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable the polling timers (run the read API only)
    #[arg(long)]
    no_worker: bool,

    /// Run the polling timers only (do not bind the HTTP server)
    #[arg(long)]
    worker_only: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() {
            Some(&default_path)
        } else {
            None
        },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    // Initialize DB pool - resolve and log the absolute DB path before connecting
    let db_path_abs = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path_abs, "resolved DB path");

    let db_pool = match init_db_pool(&db_path_abs).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %db_path_abs, "failed to initialize database pool");
            return Err(e);
        }
    };
    storage::ensure_schema(&db_pool).await?;

    // Resolve the Gemini credential (config, environment or stored key) and
    // build the summarization provider.
    let api_key = setup::resolve_api_key(&config, &db_pool).await?;
    let provider: Arc<dyn SummaryProvider> = Arc::new(GeminiClient::new(api_key));

    let config = Arc::new(config);
    let registry = Arc::new(EntryRegistry::from_config(&config)?);
    if registry.is_empty() {
        warn!("no feeds configured; the read API will serve empty data");
    }

    // If worker_only, run the polling timers (without HTTP) until ctrl-c.
    if args.worker_only {
        info!("Starting in worker-only mode");
        let handles = registry.spawn_all(&db_pool, &provider);

        tokio::signal::ctrl_c().await?;
        info!("ctrl-c received, notifying timers to shutdown");
        registry.unsubscribe_all();
        for handle in handles {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => error!(%join_err, "entry task panicked"),
                Err(_) => info!("Timed out waiting for entry task to exit"),
            }
        }
        info!("worker-only run finished");
        return Ok(());
    }

    // Otherwise, start the timers (unless disabled) and then the HTTP server.
    let mut worker_handles = Vec::new();
    if !args.no_worker {
        info!("Spawning polling timer tasks");
        worker_handles = registry.spawn_all(&db_pool, &provider);
    } else {
        info!("Polling timers disabled via CLI (--no-worker)");
    }

    // Launch the Rocket server (blocking until Rocket shuts down)
    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(db_pool.clone(), config.clone(), registry.clone()).await {
        error!(%e, "Rocket server failed");
    }

    // When the server shuts down, notify timers and wait for graceful exit.
    info!("HTTP server stopped; notifying timers to shutdown");
    registry.unsubscribe_all();

    for handle in worker_handles {
        match tokio::time::timeout(Duration::from_secs(20), handle).await {
            Ok(Ok(())) => info!("entry task exited cleanly"),
            Ok(Err(join_err)) => error!(%join_err, "entry task panicked"),
            Err(_) => info!("Timed out waiting for entry task to exit; continuing shutdown"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

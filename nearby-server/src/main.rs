use std::process::ExitCode;

use chrono::Local;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nearby_server::cache::{PAYLOAD_VERSION, ScheduleCache};
use nearby_server::config::{ConfigError, ServerConfig};
use nearby_server::proximity::ProximityExpander;
use nearby_server::schedule::ScheduleStitcher;
use nearby_server::store::{DiskCacheStore, FileScheduleStore, MemoryGeoIndex, StoreError};
use nearby_server::web::{AppState, create_router};

/// Error that stops the server from starting.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("loading data: {0}")]
    Store(#[from] StoreError),

    #[error("serving: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;

    // Load POIs (fail fast if unavailable)
    let index = MemoryGeoIndex::load_json(&config.pois_path)?;
    info!(
        path = %config.pois_path.display(),
        pois = index.len(),
        networks = ?index.networks(),
        "Loaded POIs"
    );

    let schedule = FileScheduleStore::open(&config.schedule_dir)?;
    info!(dir = %config.schedule_dir.display(), "Opened schedule");

    // Upgrade step: runs once, entries of an older payload format are dropped
    let cache_store = DiskCacheStore::open(&config.cache_dir, PAYLOAD_VERSION)?;
    info!(dir = %config.cache_dir.display(), version = PAYLOAD_VERSION, "Opened schedule cache");

    let nearby = ProximityExpander::new(index, config.proximity.clone());
    let stitcher = ScheduleStitcher::new(schedule, Local, config.stitch.clone());
    let departures = ScheduleCache::new(stitcher, cache_store, config.cache.clone());

    let app = create_router(AppState::new(nearby, departures));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "Nearby server listening");
    info!("Endpoints: GET /health, GET /nearby, GET /departures");

    axum::serve(listener, app).await?;
    Ok(())
}

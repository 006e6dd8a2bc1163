mod api;
mod config;
mod db;
mod detector;
mod error;
mod feed;
mod poller;
mod settlement;
mod state;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::FeedLatency;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::error::{AppError, Result};
use crate::feed::ScoreFeed;
use crate::poller::ScorePoller;
use crate::state::GameStore;
use crate::types::ControlMsg;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let db = sqlx::SqlitePool::connect(&format!("sqlite:{}", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Feed bootstrap: an unreachable feed is fatal at startup only ---
    let feed = ScoreFeed::new(&cfg)?;
    match feed.fetch_snapshot().await {
        Ok(Some(snap)) => info!(
            "Feed bootstrap OK: {} | AFC {} - NFC {} | period {} | clock {}",
            snap.game_name, snap.afc_score, snap.nfc_score, snap.period, snap.clock,
        ),
        Ok(None) => warn!("Feed bootstrap OK but no tracked contest on the scoreboard"),
        Err(e) => {
            return Err(AppError::Config(format!(
                "score feed unreachable at startup: {e}"
            )))
        }
    }

    // --- Shared state ---
    let games = GameStore::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(FeedLatency::new());
    let (control_tx, control_rx) = mpsc::channel::<ControlMsg>(CHANNEL_CAPACITY);

    // --- Score poller (background, fixed cadence) ---
    let poller = ScorePoller::new(
        cfg.clone(),
        feed,
        Arc::clone(&games),
        db.clone(),
        control_rx,
        Arc::clone(&health),
        Arc::clone(&latency),
    );
    tokio::spawn(async move { poller.run().await });
    info!(
        "Score poller started: every {}s against {}",
        cfg.poll_interval_secs, cfg.feed_url,
    );

    // --- HTTP API server ---
    let api_state = ApiState {
        db,
        games,
        control_tx,
        health,
        latency,
        game_name: cfg.game_name.clone(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

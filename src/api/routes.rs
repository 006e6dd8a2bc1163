use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::api::health::HealthState;
use crate::api::latency::{FeedLatency, LatencySnapshot};
use crate::db::{ScoreStore, WinnerStore};
use crate::error::AppError;
use crate::state::{game_store::LiveGame, GameStore};
use crate::types::{ControlMsg, Quarter, QuarterSettlement, RefreshOutcome};

#[derive(Clone)]
pub struct ApiState {
    pub db: sqlx::SqlitePool,
    pub games: Arc<GameStore>,
    pub control_tx: mpsc::Sender<ControlMsg>,
    pub health: Arc<HealthState>,
    pub latency: Arc<FeedLatency>,
    pub game_name: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/scores", get(get_scores))
        .route("/scores/live", get(get_live_scores))
        .route("/winners/recent", get(get_recent_winners))
        .route("/pools/:id/winners", get(get_pool_winners))
        .route("/admin/refresh", post(manual_refresh))
        .route("/admin/scores", put(update_score))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecentWinnersQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct PoolWinnersQuery {
    pub quarter: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateScoreRequest {
    /// Defaults to the configured tracked game.
    pub game_name: Option<String>,
    pub quarter: String,
    pub afc_score: i64,
    pub nfc_score: i64,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    pub game_name: String,
    pub quarter: String,
    pub afc_digit: i64,
    pub nfc_digit: i64,
    pub updated_at: i64,
}

#[derive(Serialize)]
pub struct WinnerResponse {
    pub id: i64,
    pub pool_id: i64,
    pub square_id: i64,
    pub profile_id: i64,
    pub quarter: String,
    pub payout_amount: f64,
    pub afc_digit: i64,
    pub nfc_digit: i64,
    pub created_at: i64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub feed_ok: bool,
    pub last_poll_at: i64,
    pub polls_completed: u64,
    pub quarters_settled: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_scores(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ScoreResponse>>, AppError> {
    let rows = ScoreStore::new(state.db.clone())
        .all(&state.game_name)
        .await?;
    let scores = rows
        .into_iter()
        .map(|r| ScoreResponse {
            game_name: r.game_name,
            quarter: r.quarter,
            afc_digit: r.afc_digit,
            nfc_digit: r.nfc_digit,
            updated_at: r.updated_at,
        })
        .collect();
    Ok(Json(scores))
}

async fn get_live_scores(State(state): State<ApiState>) -> Json<Vec<LiveGame>> {
    Json(state.games.all())
}

async fn get_recent_winners(
    State(state): State<ApiState>,
    Query(params): Query<RecentWinnersQuery>,
) -> Result<Json<Vec<WinnerResponse>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let rows = WinnerStore::new(state.db.clone()).recent(limit).await?;
    Ok(Json(rows.into_iter().map(winner_response).collect()))
}

async fn get_pool_winners(
    State(state): State<ApiState>,
    Path(pool_id): Path<i64>,
    Query(params): Query<PoolWinnersQuery>,
) -> Result<Json<Vec<WinnerResponse>>, AppError> {
    let quarter = params
        .quarter
        .as_deref()
        .map(|q| {
            Quarter::parse(q)
                .ok_or_else(|| AppError::InvalidRequest(format!("unknown quarter: {q}")))
        })
        .transpose()?;
    let rows = WinnerStore::new(state.db.clone())
        .for_pool(pool_id, quarter)
        .await?;
    Ok(Json(rows.into_iter().map(winner_response).collect()))
}

/// Operator-triggered poll-detect-settle cycle. The terminal error, if any,
/// is surfaced to the caller and never retried automatically.
async fn manual_refresh(
    State(state): State<ApiState>,
) -> Result<Json<RefreshOutcome>, AppError> {
    let (tx, rx) = oneshot::channel();
    state
        .control_tx
        .send(ControlMsg::Refresh(tx))
        .await
        .map_err(|e| AppError::ChannelSend(e.to_string()))?;
    let outcome = rx
        .await
        .map_err(|_| AppError::ChannelSend("poller dropped the reply".to_string()))??;
    Ok(Json(outcome))
}

/// Operator score correction. Freezes the quarter's digits and settles it
/// through the same engine as detector transitions.
async fn update_score(
    State(state): State<ApiState>,
    Json(req): Json<UpdateScoreRequest>,
) -> Result<Json<QuarterSettlement>, AppError> {
    let quarter = Quarter::parse(&req.quarter)
        .ok_or_else(|| AppError::InvalidRequest(format!("unknown quarter: {}", req.quarter)))?;
    let game_name = req.game_name.unwrap_or_else(|| state.game_name.clone());

    let (tx, rx) = oneshot::channel();
    state
        .control_tx
        .send(ControlMsg::SetScore {
            game_name,
            quarter,
            afc_score: req.afc_score,
            nfc_score: req.nfc_score,
            reply: tx,
        })
        .await
        .map_err(|e| AppError::ChannelSend(e.to_string()))?;
    let settlement = rx
        .await
        .map_err(|_| AppError::ChannelSend("poller dropped the reply".to_string()))??;
    Ok(Json(settlement))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        feed_ok: state.health.feed_ok(),
        last_poll_at: state.health.last_poll_at(),
        polls_completed: state.health.polls_completed(),
        quarters_settled: state.health.quarters_settled(),
    })
}

async fn get_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

fn winner_response(r: crate::db::models::WinnerRow) -> WinnerResponse {
    WinnerResponse {
        id: r.id,
        pool_id: r.pool_id,
        square_id: r.square_id,
        profile_id: r.profile_id,
        quarter: r.quarter,
        payout_amount: r.payout_amount,
        afc_digit: r.afc_digit,
        nfc_digit: r.nfc_digit,
        created_at: r.created_at,
    }
}

//! The driver: a single task that polls the score feed on a fixed cadence,
//! feeds the boundary detector, and settles any quarter that just ended.
//! Operator actions (manual refresh, score correction) arrive over the
//! control channel and run on the same task, so poll → detect → settle is
//! always one unit of work and never interleaves with itself.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::FeedLatency;
use crate::config::Config;
use crate::db::ScoreStore;
use crate::detector::BoundaryDetector;
use crate::error::Result;
use crate::feed::ScoreFeed;
use crate::settlement::WinnerSettlementEngine;
use crate::state::GameStore;
use crate::types::{
    last_digit, ControlMsg, Quarter, QuarterSettlement, RefreshOutcome, Transition,
};

pub struct ScorePoller {
    cfg: Config,
    feed: ScoreFeed,
    games: Arc<GameStore>,
    scores: ScoreStore,
    detector: BoundaryDetector,
    engine: WinnerSettlementEngine,
    control_rx: mpsc::Receiver<ControlMsg>,
    health: Arc<HealthState>,
    latency: Arc<FeedLatency>,
}

impl ScorePoller {
    pub fn new(
        cfg: Config,
        feed: ScoreFeed,
        games: Arc<GameStore>,
        db: sqlx::SqlitePool,
        control_rx: mpsc::Receiver<ControlMsg>,
        health: Arc<HealthState>,
        latency: Arc<FeedLatency>,
    ) -> Self {
        let scores = ScoreStore::new(db.clone());
        Self {
            cfg,
            feed,
            games,
            scores: scores.clone(),
            detector: BoundaryDetector::new(scores),
            engine: WinnerSettlementEngine::new(db),
            control_rx,
            health,
            latency,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.poll_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Transient failures skip the cycle; the cadence is the
                    // retry mechanism. Scheduled ticks surface nothing.
                    if let Err(e) = self.cycle().await {
                        if e.is_transient() {
                            warn!("Score poll failed, retrying next tick: {e}");
                        } else {
                            error!("Score poll failed: {e}");
                        }
                    }
                }
                Some(msg) = self.control_rx.recv() => {
                    self.handle_control(msg).await;
                }
            }
        }
    }

    async fn handle_control(&self, msg: ControlMsg) {
        match msg {
            ControlMsg::Refresh(reply) => {
                info!("Manual score refresh triggered");
                let result = self.cycle().await;
                if let Err(e) = &result {
                    error!("Manual refresh failed: {e}");
                }
                let _ = reply.send(result);
            }
            ControlMsg::SetScore { game_name, quarter, afc_score, nfc_score, reply } => {
                let result = self
                    .apply_correction(&game_name, quarter, afc_score, nfc_score)
                    .await;
                if let Err(e) = &result {
                    error!("Score correction failed: {e}");
                }
                let _ = reply.send(result);
            }
        }
    }

    /// One poll-detect-settle cycle.
    async fn cycle(&self) -> Result<RefreshOutcome> {
        let started = Instant::now();
        let snapshot = match self.feed.fetch_snapshot().await {
            Ok(s) => s,
            Err(e) => {
                self.health.set_feed_ok(false);
                return Err(e);
            }
        };
        self.latency.record(started.elapsed());
        self.health.set_feed_ok(true);

        let Some(snapshot) = snapshot else {
            info!("No tracked contest on the scoreboard");
            self.health.record_poll(now_secs());
            return Ok(RefreshOutcome { snapshot: None, settled: Vec::new() });
        };

        info!(
            game = %snapshot.game_name,
            period = snapshot.period,
            clock = %snapshot.clock,
            completed = snapshot.completed,
            "Score poll | AFC {} - NFC {} | period {} | clock {}",
            snapshot.afc_score, snapshot.nfc_score, snapshot.period, snapshot.clock,
        );
        self.games.record(snapshot.clone());

        let transitions = self.detector.observe(&snapshot).await?;
        let mut settled = Vec::with_capacity(transitions.len());
        for transition in &transitions {
            settled.push(self.settle(transition).await?);
        }

        self.health.record_poll(now_secs());
        Ok(RefreshOutcome { snapshot: Some(snapshot), settled })
    }

    /// Operator score correction: freeze the given digits directly, then
    /// settle through the engine — the same path detector transitions take.
    async fn apply_correction(
        &self,
        game_name: &str,
        quarter: Quarter,
        afc_score: i64,
        nfc_score: i64,
    ) -> Result<QuarterSettlement> {
        let transition = Transition {
            game_name: game_name.to_string(),
            quarter,
            afc_digit: last_digit(afc_score),
            nfc_digit: last_digit(nfc_score),
        };

        let outcome = self
            .scores
            .freeze(game_name, quarter, transition.afc_digit, transition.nfc_digit)
            .await?;
        info!(
            game = game_name,
            quarter = %quarter,
            afc_digit = transition.afc_digit,
            nfc_digit = transition.nfc_digit,
            ?outcome,
            "Operator set {} score to AFC {} / NFC {}",
            quarter, transition.afc_digit, transition.nfc_digit,
        );

        // Settle regardless of the freeze outcome: re-running an unchanged
        // quarter is a no-op by construction.
        self.settle(&transition).await
    }

    async fn settle(&self, transition: &Transition) -> Result<QuarterSettlement> {
        let summary = self.engine.settle_quarter(transition).await?;
        self.health.inc_quarters_settled();
        Ok(QuarterSettlement {
            quarter: transition.quarter,
            afc_digit: transition.afc_digit,
            nfc_digit: transition.nfc_digit,
            summary,
        })
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Quarter
// ---------------------------------------------------------------------------

/// The four settlement points of a contest. FINAL covers end of regulation
/// and overtime alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Final,
}

impl Quarter {
    /// Settlement order. Transitions only ever fire in this order.
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Final];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Final => "FINAL",
        }
    }

    pub fn parse(s: &str) -> Option<Quarter> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "FINAL" => Some(Quarter::Final),
            _ => None,
        }
    }
}

impl std::fmt::Display for Quarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last base-10 digit of a score. Scores are never negative in practice, but
/// `rem_euclid` keeps the result in 0..=9 regardless.
pub fn last_digit(score: i64) -> u8 {
    score.rem_euclid(10) as u8
}

// ---------------------------------------------------------------------------
// Score snapshot — ephemeral, one per poll, never persisted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ScoreSnapshot {
    pub game_name: String,
    /// Reported period: 1–4 regulation, 5+ overtime.
    pub period: i64,
    /// Display clock as reported by the feed, e.g. "12:34".
    pub clock: String,
    pub completed: bool,
    pub afc_score: i64,
    pub nfc_score: i64,
}

// ---------------------------------------------------------------------------
// Quarter transition — a frozen (quarter, digits) decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub game_name: String,
    pub quarter: Quarter,
    /// Column axis of the grid.
    pub afc_digit: u8,
    /// Row axis of the grid.
    pub nfc_digit: u8,
}

// ---------------------------------------------------------------------------
// Settlement results
// ---------------------------------------------------------------------------

/// Counters from settling one quarter across all active pools.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SettlementSummary {
    pub pools_settled: u32,
    /// Pools skipped for a missing payout or an isolated per-pool failure.
    pub pools_skipped: u32,
    pub primary_winners: u32,
    pub touch_winners: u32,
    /// Awards that already existed (idempotent re-run or lost insert race).
    pub already_settled: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuarterSettlement {
    pub quarter: Quarter,
    pub afc_digit: u8,
    pub nfc_digit: u8,
    pub summary: SettlementSummary,
}

/// Outcome of one poll-detect-settle cycle, returned to manual-refresh callers.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    /// None when the scoreboard had no tracked contest this cycle.
    pub snapshot: Option<ScoreSnapshot>,
    pub settled: Vec<QuarterSettlement>,
}

// ---------------------------------------------------------------------------
// Control messages into the poller task
// ---------------------------------------------------------------------------

/// Operator-triggered work, serialized through the poller task so the
/// scheduled tick, manual refresh, and score correction all run the same
/// detect-settle path one cycle at a time.
#[derive(Debug)]
pub enum ControlMsg {
    /// One poll-detect-settle cycle; outcome or terminal error goes back on
    /// the oneshot.
    Refresh(oneshot::Sender<Result<RefreshOutcome>>),
    /// Directly freeze a quarter's digits and settle it through the engine.
    SetScore {
        game_name: String,
        quarter: Quarter,
        afc_score: i64,
        nfc_score: i64,
        reply: oneshot::Sender<Result<QuarterSettlement>>,
    },
}

//! Quarter-boundary detection: turns a noisy polled stream of snapshots into
//! discrete quarter-ended transitions, each firing exactly once per quarter.
//!
//! A quarter N ends when the clock hits zero while the period is still N, or
//! when a snapshot already shows a later period with no frozen row for N —
//! the recovery rule for boundaries crossed between polls. FINAL also fires
//! on overtime (period >= 5) or the feed's completed flag.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::db::{FreezeOutcome, ScoreStore};
use crate::error::Result;
use crate::types::{last_digit, Quarter, ScoreSnapshot, Transition};

/// Regulation period for each quarter's boundary check.
fn period_of(quarter: Quarter) -> i64 {
    match quarter {
        Quarter::Q1 => 1,
        Quarter::Q2 => 2,
        Quarter::Q3 => 3,
        Quarter::Final => 4,
    }
}

/// True when the display clock reads zero. Unparseable clocks read as
/// not-expired so a garbled field can't end a quarter early.
pub fn clock_expired(clock: &str) -> bool {
    let clock = clock.trim();
    if clock == "0:00" {
        return true;
    }
    let Some((mins, secs)) = clock.split_once(':') else {
        return false;
    };
    let Ok(mins) = mins.parse::<u32>() else {
        return false;
    };
    let Ok(secs) = secs.parse::<f64>() else {
        return false;
    };
    mins == 0 && secs == 0.0
}

/// Transitions this snapshot implies, given the quarters already frozen.
/// Emitted in strict Q1 → Q2 → Q3 → FINAL order; digits are the snapshot's
/// scores taken modulo 10, independently per side.
///
/// The clock-at-zero clause fires regardless of the frozen set — the store's
/// freeze guard turns an identical replay into a no-op and a digit change
/// into a correction. Only the crossed-between-polls recovery clause
/// ("already in a later period") requires the frozen row to be absent.
pub fn pending_transitions(
    snapshot: &ScoreSnapshot,
    frozen: &HashSet<Quarter>,
) -> Vec<Transition> {
    let expired = clock_expired(&snapshot.clock);
    let mut out = Vec::new();

    for quarter in Quarter::ALL {
        let period = period_of(quarter);
        let at_boundary = snapshot.period == period && expired;
        let ended = if quarter == Quarter::Final {
            at_boundary || snapshot.period >= 5 || snapshot.completed
        } else {
            at_boundary || (snapshot.period > period && !frozen.contains(&quarter))
        };
        if ended {
            out.push(Transition {
                game_name: snapshot.game_name.clone(),
                quarter,
                afc_digit: last_digit(snapshot.afc_score),
                nfc_digit: last_digit(snapshot.nfc_score),
            });
        }
    }

    out
}

/// Stateful wrapper that persists each fired transition as a frozen score
/// row before handing it to settlement. The frozen-row set in the database
/// is the authoritative per-game state, so the detector survives restarts
/// without replaying quarters.
pub struct BoundaryDetector {
    scores: ScoreStore,
}

impl BoundaryDetector {
    pub fn new(scores: ScoreStore) -> Self {
        Self { scores }
    }

    /// Evaluate one snapshot. Returns the transitions that now need
    /// settlement — freshly frozen quarters plus any digit corrections.
    /// A quarter already frozen with the same digits is a no-op.
    pub async fn observe(&self, snapshot: &ScoreSnapshot) -> Result<Vec<Transition>> {
        let frozen = self.scores.frozen_quarters(&snapshot.game_name).await?;
        let fired = pending_transitions(snapshot, &frozen);

        let mut to_settle = Vec::new();
        for transition in fired {
            let outcome = self
                .scores
                .freeze(
                    &transition.game_name,
                    transition.quarter,
                    transition.afc_digit,
                    transition.nfc_digit,
                )
                .await?;
            match outcome {
                FreezeOutcome::Created => {
                    info!(
                        game = %transition.game_name,
                        quarter = %transition.quarter,
                        afc_digit = transition.afc_digit,
                        nfc_digit = transition.nfc_digit,
                        "Quarter frozen: {} at AFC {} / NFC {}",
                        transition.quarter, transition.afc_digit, transition.nfc_digit,
                    );
                    to_settle.push(transition);
                }
                FreezeOutcome::Unchanged => {
                    debug!(
                        quarter = %transition.quarter,
                        "Quarter already frozen with identical digits — no-op"
                    );
                }
                FreezeOutcome::Corrected { prev_afc, prev_nfc } => {
                    warn!(
                        quarter = %transition.quarter,
                        prev_afc, prev_nfc,
                        afc_digit = transition.afc_digit,
                        nfc_digit = transition.nfc_digit,
                        "Frozen digits corrected for {}: {}-{} -> {}-{}",
                        transition.quarter, prev_afc, prev_nfc,
                        transition.afc_digit, transition.nfc_digit,
                    );
                    to_settle.push(transition);
                }
            }
        }

        Ok(to_settle)
    }
}

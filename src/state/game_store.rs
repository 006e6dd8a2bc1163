use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

use crate::types::ScoreSnapshot;

/// Latest observed state for one tracked game. Ephemeral — rebuilt from the
/// feed after a restart.
#[derive(Debug, Clone, Serialize)]
pub struct LiveGame {
    pub snapshot: ScoreSnapshot,
    /// Unix seconds of the poll that produced this snapshot.
    pub observed_at: i64,
    /// Snapshots recorded for this game since process start.
    pub polls: u64,
}

/// In-memory view of live games, written by the poller task and read by the
/// API (`/scores/live`).
pub struct GameStore {
    games: DashMap<String, LiveGame>,
}

impl GameStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { games: DashMap::new() })
    }

    pub fn record(&self, snapshot: ScoreSnapshot) {
        let now = now_secs();
        self.games
            .entry(snapshot.game_name.clone())
            .and_modify(|g| {
                g.snapshot = snapshot.clone();
                g.observed_at = now;
                g.polls += 1;
            })
            .or_insert_with(|| LiveGame { snapshot, observed_at: now, polls: 1 });
    }

    pub fn get(&self, game_name: &str) -> Option<LiveGame> {
        self.games.get(game_name).map(|g| g.value().clone())
    }

    pub fn all(&self) -> Vec<LiveGame> {
        self.games.iter().map(|g| g.value().clone()).collect()
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(period: i64, afc: i64) -> ScoreSnapshot {
        ScoreSnapshot {
            game_name: "Super Bowl".to_string(),
            period,
            clock: "12:00".to_string(),
            completed: false,
            afc_score: afc,
            nfc_score: 0,
        }
    }

    #[test]
    fn record_replaces_snapshot_and_counts_polls() {
        let store = GameStore::new();
        store.record(snap(1, 0));
        store.record(snap(2, 14));

        let live = store.get("Super Bowl").unwrap();
        assert_eq!(live.polls, 2);
        assert_eq!(live.snapshot.period, 2);
        assert_eq!(live.snapshot.afc_score, 14);
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn unknown_game_reads_as_none() {
        let store = GameStore::new();
        assert!(store.get("Pro Bowl").is_none());
    }
}

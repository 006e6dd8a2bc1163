use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{Config, FEED_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::ScoreSnapshot;

/// Read-only client for the external scoreboard feed (ESPN NFL scoreboard by
/// default). One fetch per poll cycle; any transport or shape failure is a
/// transient error handled by the caller.
pub struct ScoreFeed {
    client: reqwest::Client,
    url: String,
    game_name: String,
}

impl ScoreFeed {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build feed HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: cfg.feed_url.clone(),
            game_name: cfg.game_name.clone(),
        })
    }

    /// Fetch the scoreboard and return the tracked contest's snapshot, or
    /// None when the scoreboard carries no matching game (offseason, pregame
    /// listing without our contest).
    pub async fn fetch_snapshot(&self) -> Result<Option<ScoreSnapshot>> {
        let resp: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .json()
            .await?;

        Ok(pick_tracked_game(&resp, &self.game_name))
    }
}

/// Select the tracked contest from a scoreboard payload. Events whose name
/// contains `game_name` (case-insensitive) are preferred; with no name match
/// the first parseable event is used, since the scoreboard on game day
/// carries the contest we care about.
pub fn pick_tracked_game(root: &serde_json::Value, game_name: &str) -> Option<ScoreSnapshot> {
    let events = root.get("events").and_then(|e| e.as_array())?;
    if events.is_empty() {
        return None;
    }

    let needle = game_name.to_lowercase();
    let mut fallback = None;

    for event in events {
        let name = event.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let Some(snap) = parse_event(event, game_name) else {
            continue;
        };
        if name.to_lowercase().contains(&needle) {
            return Some(snap);
        }
        if fallback.is_none() {
            fallback = Some(snap);
        }
    }

    fallback
}

/// Parse one scoreboard event into a snapshot.
///
/// The away competitor is the AFC side and the home competitor the NFC side.
/// Status fields are read tolerantly: a missing or garbled period defaults to
/// 1, the clock to "0:00", and completed to false, so a degraded payload can
/// never report a later period than the game has reached.
fn parse_event(event: &serde_json::Value, game_name: &str) -> Option<ScoreSnapshot> {
    let competition = event
        .get("competitions")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())?;
    let competitors = competition
        .get("competitors")
        .and_then(|c| c.as_array())?;
    if competitors.len() != 2 {
        debug!(
            "Scoreboard event has {} competitors, expected 2 — skipping",
            competitors.len()
        );
        return None;
    }

    let mut home = None;
    let mut away = None;
    for competitor in competitors {
        match competitor.get("homeAway").and_then(|h| h.as_str()) {
            Some("home") => home = Some(competitor),
            _ => away = Some(competitor),
        }
    }
    let (home, away) = match (home, away) {
        (Some(h), Some(a)) => (h, a),
        _ => {
            warn!("Scoreboard event missing home/away designation — skipping");
            return None;
        }
    };

    let status = competition.get("status");
    let period = status
        .and_then(|s| s.get("period"))
        .and_then(as_i64_lenient)
        .unwrap_or(1);
    let clock = status
        .and_then(|s| s.get("displayClock"))
        .and_then(|c| c.as_str())
        .unwrap_or("0:00")
        .to_string();
    let completed = status
        .and_then(|s| s.get("type"))
        .and_then(|t| t.get("completed"))
        .and_then(|c| c.as_bool())
        .unwrap_or(false);

    Some(ScoreSnapshot {
        game_name: game_name.to_string(),
        period,
        clock,
        completed,
        afc_score: competitor_score(away),
        nfc_score: competitor_score(home),
    })
}

/// Scores arrive as JSON strings ("24") on the live scoreboard and as numbers
/// in some archived payloads. Missing or garbled scores read as 0.
fn competitor_score(competitor: &serde_json::Value) -> i64 {
    competitor
        .get("score")
        .and_then(as_i64_lenient)
        .unwrap_or(0)
}

fn as_i64_lenient(v: &serde_json::Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoreboard(events: &str) -> serde_json::Value {
        serde_json::from_str(&format!(r#"{{"events":[{events}]}}"#)).unwrap()
    }

    fn event_json(name: &str, away_score: &str, home_score: &str, status: &str) -> String {
        format!(
            r#"{{
              "name": "{name}",
              "competitions": [{{
                "competitors": [
                  {{"homeAway": "away", "score": {away_score}, "team": {{"abbreviation": "KC"}}}},
                  {{"homeAway": "home", "score": {home_score}, "team": {{"abbreviation": "PHI"}}}}
                ],
                "status": {status}
              }}]
            }}"#
        )
    }

    #[test]
    fn parses_live_game_with_string_scores() {
        let status = r#"{"period": 2, "displayClock": "7:41", "type": {"completed": false}}"#;
        let root = scoreboard(&event_json(
            "Kansas City Chiefs at Philadelphia Eagles - Super Bowl LIX",
            "\"24\"",
            "\"17\"",
            status,
        ));
        let snap = pick_tracked_game(&root, "Super Bowl").unwrap();
        assert_eq!(snap.game_name, "Super Bowl");
        assert_eq!(snap.period, 2);
        assert_eq!(snap.clock, "7:41");
        assert!(!snap.completed);
        assert_eq!(snap.afc_score, 24);
        assert_eq!(snap.nfc_score, 17);
    }

    #[test]
    fn missing_status_defaults_do_not_advance_the_game() {
        let root = scoreboard(&event_json("Super Bowl", "3", "0", "null"));
        let snap = pick_tracked_game(&root, "Super Bowl").unwrap();
        assert_eq!(snap.period, 1);
        assert_eq!(snap.clock, "0:00");
        assert!(!snap.completed);
        assert_eq!(snap.afc_score, 3);
    }

    #[test]
    fn empty_scoreboard_yields_no_snapshot() {
        let root: serde_json::Value = serde_json::from_str(r#"{"events":[]}"#).unwrap();
        assert!(pick_tracked_game(&root, "Super Bowl").is_none());
        let root: serde_json::Value = serde_json::from_str(r#"{}"#).unwrap();
        assert!(pick_tracked_game(&root, "Super Bowl").is_none());
    }

    #[test]
    fn prefers_name_match_over_first_event() {
        let other = event_json("Week 18 Game", "10", "13", "null");
        let status = r#"{"period": 4, "displayClock": "0:00", "type": {"completed": true}}"#;
        let bowl = event_json("Super Bowl LIX", "\"31\"", "\"28\"", status);
        let root = scoreboard(&format!("{other},{bowl}"));
        let snap = pick_tracked_game(&root, "Super Bowl").unwrap();
        assert_eq!(snap.afc_score, 31);
        assert!(snap.completed);
    }

    #[test]
    fn falls_back_to_first_parseable_event() {
        let root = scoreboard(&event_json("Some Game", "7", "14", "null"));
        let snap = pick_tracked_game(&root, "Super Bowl").unwrap();
        assert_eq!(snap.nfc_score, 14);
    }

    #[test]
    fn single_competitor_event_is_skipped() {
        let root = scoreboard(
            r#"{"name":"Broken","competitions":[{"competitors":[{"homeAway":"home","score":"3"}]}]}"#,
        );
        assert!(pick_tracked_game(&root, "Super Bowl").is_none());
    }
}

//! Durable record of one frozen score per (game, quarter).
//! Written only by the detector's transition logic and the operator
//! correction path, which share `freeze`.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::models::FrozenScoreRow;
use crate::error::Result;
use crate::types::Quarter;

#[derive(Clone)]
pub struct ScoreStore {
    pool: sqlx::SqlitePool,
}

/// What `freeze` did with the observed digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeOutcome {
    Created,
    /// A row with identical digits already existed; nothing written.
    Unchanged,
    /// A row existed with different digits and was overwritten. A correction,
    /// not a normal path — the caller logs it.
    Corrected { prev_afc: u8, prev_nfc: u8 },
}

impl ScoreStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn all(&self, game_name: &str) -> Result<Vec<FrozenScoreRow>> {
        let rows = sqlx::query_as::<_, FrozenScoreRow>(
            "SELECT id, game_name, quarter, afc_digit, nfc_digit, updated_at
             FROM game_scores WHERE game_name = ? ORDER BY id",
        )
        .bind(game_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, game_name: &str, quarter: Quarter) -> Result<Option<FrozenScoreRow>> {
        let row = sqlx::query_as::<_, FrozenScoreRow>(
            "SELECT id, game_name, quarter, afc_digit, nfc_digit, updated_at
             FROM game_scores WHERE game_name = ? AND quarter = ?",
        )
        .bind(game_name)
        .bind(quarter.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Quarters that already hold a frozen row for this game. The detector's
    /// "later period, no frozen row" recovery rule reads this set.
    pub async fn frozen_quarters(&self, game_name: &str) -> Result<HashSet<Quarter>> {
        let rows = self.all(game_name).await?;
        Ok(rows
            .iter()
            .filter_map(|r| Quarter::parse(&r.quarter))
            .collect())
    }

    /// Record frozen digits for a quarter. Identical existing digits are a
    /// no-op; differing digits are overwritten as a correction.
    pub async fn freeze(
        &self,
        game_name: &str,
        quarter: Quarter,
        afc_digit: u8,
        nfc_digit: u8,
    ) -> Result<FreezeOutcome> {
        let now = now_secs();

        if let Some(existing) = self.get(game_name, quarter).await? {
            if existing.afc_digit == i64::from(afc_digit)
                && existing.nfc_digit == i64::from(nfc_digit)
            {
                return Ok(FreezeOutcome::Unchanged);
            }
            sqlx::query(
                "UPDATE game_scores SET afc_digit = ?, nfc_digit = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(i64::from(afc_digit))
            .bind(i64::from(nfc_digit))
            .bind(now)
            .bind(existing.id)
            .execute(&self.pool)
            .await?;
            return Ok(FreezeOutcome::Corrected {
                prev_afc: existing.afc_digit as u8,
                prev_nfc: existing.nfc_digit as u8,
            });
        }

        sqlx::query(
            "INSERT INTO game_scores (game_name, quarter, afc_digit, nfc_digit, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(game_name)
        .bind(quarter.as_str())
        .bind(i64::from(afc_digit))
        .bind(i64::from(nfc_digit))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(FreezeOutcome::Created)
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

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn freeze_creates_then_is_unchanged_on_same_digits() {
        let store = ScoreStore::new(test_pool().await);
        assert_eq!(
            store.freeze("Super Bowl", Quarter::Q1, 4, 7).await.unwrap(),
            FreezeOutcome::Created
        );
        assert_eq!(
            store.freeze("Super Bowl", Quarter::Q1, 4, 7).await.unwrap(),
            FreezeOutcome::Unchanged
        );
        assert_eq!(store.all("Super Bowl").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn freeze_overwrites_differing_digits_as_correction() {
        let store = ScoreStore::new(test_pool().await);
        store.freeze("Super Bowl", Quarter::Q2, 1, 0).await.unwrap();
        let outcome = store.freeze("Super Bowl", Quarter::Q2, 8, 0).await.unwrap();
        assert_eq!(outcome, FreezeOutcome::Corrected { prev_afc: 1, prev_nfc: 0 });

        let row = store.get("Super Bowl", Quarter::Q2).await.unwrap().unwrap();
        assert_eq!(row.afc_digit, 8);
        assert_eq!(store.all("Super Bowl").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn frozen_quarters_reflects_stored_rows() {
        let store = ScoreStore::new(test_pool().await);
        store.freeze("Super Bowl", Quarter::Q1, 0, 0).await.unwrap();
        store.freeze("Super Bowl", Quarter::Final, 3, 8).await.unwrap();

        let frozen = store.frozen_quarters("Super Bowl").await.unwrap();
        assert!(frozen.contains(&Quarter::Q1));
        assert!(frozen.contains(&Quarter::Final));
        assert!(!frozen.contains(&Quarter::Q2));
    }
}

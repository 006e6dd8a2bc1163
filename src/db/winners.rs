//! Winner records. Inserts are guarded twice: an existence check first, and
//! the UNIQUE(square_id, quarter) index as the authoritative backstop — a
//! racing insert loses with a constraint violation that is reported as
//! `AlreadySettled`, never surfaced as an error.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::models::WinnerRow;
use crate::error::{is_unique_violation, AppError, Result};
use crate::types::Quarter;

#[derive(Clone)]
pub struct WinnerStore {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, Clone)]
pub struct NewWinner {
    pub pool_id: i64,
    pub square_id: i64,
    pub profile_id: i64,
    pub quarter: Quarter,
    pub payout_amount: f64,
    pub afc_digit: u8,
    pub nfc_digit: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A winner already exists for (square, quarter).
    AlreadySettled,
}

impl WinnerStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn exists_for(&self, square_id: i64, quarter: Quarter) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM winners WHERE square_id = ? AND quarter = ?",
        )
        .bind(square_id)
        .bind(quarter.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn insert(&self, winner: &NewWinner) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO winners (pool_id, square_id, profile_id, quarter, payout_amount,
                                  afc_digit, nfc_digit, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(winner.pool_id)
        .bind(winner.square_id)
        .bind(winner.profile_id)
        .bind(winner.quarter.as_str())
        .bind(winner.payout_amount)
        .bind(i64::from(winner.afc_digit))
        .bind(i64::from(winner.nfc_digit))
        .bind(now_secs())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::AlreadySettled),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<WinnerRow>> {
        let rows = sqlx::query_as::<_, WinnerRow>(
            "SELECT id, pool_id, square_id, profile_id, quarter, payout_amount,
                    afc_digit, nfc_digit, created_at
             FROM winners ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn for_pool(
        &self,
        pool_id: i64,
        quarter: Option<Quarter>,
    ) -> Result<Vec<WinnerRow>> {
        let rows = match quarter {
            Some(q) => {
                sqlx::query_as::<_, WinnerRow>(
                    "SELECT id, pool_id, square_id, profile_id, quarter, payout_amount,
                            afc_digit, nfc_digit, created_at
                     FROM winners WHERE pool_id = ? AND quarter = ? ORDER BY id",
                )
                .bind(pool_id)
                .bind(q.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WinnerRow>(
                    "SELECT id, pool_id, square_id, profile_id, quarter, payout_amount,
                            afc_digit, nfc_digit, created_at
                     FROM winners WHERE pool_id = ? ORDER BY id",
                )
                .bind(pool_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
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

    async fn seed_square(db: &sqlx::SqlitePool) -> (i64, i64) {
        sqlx::query(
            "INSERT INTO pools (pool_name, bet_amount, q1_payout, is_active, created_at)
             VALUES ('p', 10.0, 50.0, 1, 0)",
        )
        .execute(db)
        .await
        .unwrap();
        let pool_id: i64 = sqlx::query_scalar("SELECT id FROM pools WHERE pool_name = 'p'")
            .fetch_one(db)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO squares (pool_id, row_pos, col_pos, profile_id, profile_name)
             VALUES (?, 7, 4, 42, 'P')",
        )
        .bind(pool_id)
        .execute(db)
        .await
        .unwrap();
        let square_id: i64 = sqlx::query_scalar("SELECT id FROM squares WHERE pool_id = ?")
            .bind(pool_id)
            .fetch_one(db)
            .await
            .unwrap();
        (pool_id, square_id)
    }

    fn winner(pool_id: i64, square_id: i64) -> NewWinner {
        NewWinner {
            pool_id,
            square_id,
            profile_id: 42,
            quarter: Quarter::Q1,
            payout_amount: 50.0,
            afc_digit: 4,
            nfc_digit: 7,
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_swallowed_as_already_settled() {
        let db = test_pool().await;
        let (pool_id, square_id) = seed_square(&db).await;
        let store = WinnerStore::new(db);

        let w = winner(pool_id, square_id);
        assert_eq!(store.insert(&w).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&w).await.unwrap(), InsertOutcome::AlreadySettled);
        assert_eq!(store.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_square_different_quarter_is_a_new_winner() {
        let db = test_pool().await;
        let (pool_id, square_id) = seed_square(&db).await;
        let store = WinnerStore::new(db);

        store.insert(&winner(pool_id, square_id)).await.unwrap();
        let mut final_win = winner(pool_id, square_id);
        final_win.quarter = Quarter::Final;
        assert_eq!(store.insert(&final_win).await.unwrap(), InsertOutcome::Inserted);

        assert!(store.exists_for(square_id, Quarter::Q1).await.unwrap());
        assert!(store.exists_for(square_id, Quarter::Final).await.unwrap());
        assert!(!store.exists_for(square_id, Quarter::Q2).await.unwrap());
    }
}

use crate::db::models::Pool;
use crate::error::Result;

#[derive(Clone)]
pub struct PoolStore {
    pool: sqlx::SqlitePool,
}

impl PoolStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Active pools only — inactive pools are never settled.
    pub async fn list_active(&self) -> Result<Vec<Pool>> {
        let rows = sqlx::query_as::<_, Pool>(
            "SELECT id, pool_name, bet_amount, q1_payout, halftime_payout, q3_payout,
                    final_payout, is_active, created_at, updated_at
             FROM pools WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

//! Winner settlement: given a frozen (quarter, AFC digit, NFC digit), award
//! payouts across every active pool, exactly once per (square, quarter).
//!
//! Re-running settlement for an already-settled quarter inserts nothing:
//! every award is guarded by an existence check and, authoritatively, by the
//! UNIQUE(square_id, quarter) index. Each pool settles inside its own error
//! boundary so one failing pool cannot block the rest.

use tracing::{error, info, warn};

use crate::config::TOUCH_PAYOUT_RATIO;
use crate::db::models::{Pool, SquareRow};
use crate::db::{GridStore, InsertOutcome, NewWinner, PoolStore, WinnerStore};
use crate::error::Result;
use crate::types::{SettlementSummary, Transition};

pub struct WinnerSettlementEngine {
    pools: PoolStore,
    grid: GridStore,
    winners: WinnerStore,
}

/// Per-pool award tally, folded into the quarter's summary.
#[derive(Debug, Clone, Copy, Default)]
struct PoolTally {
    primary: u32,
    touch: u32,
    already: u32,
}

impl WinnerSettlementEngine {
    pub fn new(db: sqlx::SqlitePool) -> Self {
        Self {
            pools: PoolStore::new(db.clone()),
            grid: GridStore::new(db.clone()),
            winners: WinnerStore::new(db),
        }
    }

    /// Settle one frozen quarter across all active pools.
    pub async fn settle_quarter(&self, transition: &Transition) -> Result<SettlementSummary> {
        info!(
            quarter = %transition.quarter,
            afc_digit = transition.afc_digit,
            nfc_digit = transition.nfc_digit,
            "Settling {} at cell (row {}, col {})",
            transition.quarter, transition.nfc_digit, transition.afc_digit,
        );

        let pools = self.pools.list_active().await?;
        let mut summary = SettlementSummary::default();

        for pool in &pools {
            match self.settle_pool(pool, transition).await {
                Ok(Some(tally)) => {
                    summary.pools_settled += 1;
                    summary.primary_winners += tally.primary;
                    summary.touch_winners += tally.touch;
                    summary.already_settled += tally.already;
                }
                Ok(None) => summary.pools_skipped += 1,
                Err(e) => {
                    // Isolated: log and move on to the remaining pools.
                    error!(
                        pool_id = pool.id,
                        pool_name = %pool.pool_name,
                        "Settlement failed for pool {}: {e}",
                        pool.pool_name,
                    );
                    summary.pools_skipped += 1;
                }
            }
        }

        info!(
            quarter = %transition.quarter,
            pools_settled = summary.pools_settled,
            pools_skipped = summary.pools_skipped,
            primary_winners = summary.primary_winners,
            touch_winners = summary.touch_winners,
            already_settled = summary.already_settled,
            "Settlement complete for {}: {} primary, {} touch across {} pools",
            transition.quarter, summary.primary_winners, summary.touch_winners,
            summary.pools_settled,
        );

        Ok(summary)
    }

    /// Settle one pool. Returns None when the pool is skipped because it has
    /// no payout configured for this quarter.
    async fn settle_pool(&self, pool: &Pool, t: &Transition) -> Result<Option<PoolTally>> {
        let Some(payout) = pool.payout_for(t.quarter) else {
            warn!(
                pool_id = pool.id,
                quarter = %t.quarter,
                "Pool {} has no payout configured for {} — skipping",
                pool.pool_name, t.quarter,
            );
            return Ok(None);
        };

        // Row axis carries the NFC digit, column axis the AFC digit.
        let (row, col) = (t.nfc_digit, t.afc_digit);
        let mut tally = PoolTally::default();

        match self.grid.square_at(pool.id, row, col).await? {
            Some(square) => {
                if let Some(profile_id) = square.profile_id {
                    match self.award(pool, &square, profile_id, t, payout).await? {
                        InsertOutcome::Inserted => {
                            tally.primary += 1;
                            info!(
                                pool_id = pool.id,
                                square_id = square.id,
                                payout,
                                "Primary winner in pool {}: {} takes ${payout:.2} at ({row}, {col})",
                                pool.pool_name,
                                square.profile_name.as_deref().unwrap_or("?"),
                            );
                        }
                        InsertOutcome::AlreadySettled => tally.already += 1,
                    }
                } else {
                    info!(
                        pool_id = pool.id,
                        "Winning square ({row}, {col}) in pool {} is unclaimed",
                        pool.pool_name,
                    );
                }
            }
            None => {
                warn!(
                    pool_id = pool.id,
                    "No square at ({row}, {col}) in pool {}",
                    pool.pool_name,
                );
            }
        }

        // Touch awards are independent of the primary cell's claim state.
        let touch_payout = payout * TOUCH_PAYOUT_RATIO;
        for square in self.grid.neighbors(pool.id, row, col).await? {
            let Some(profile_id) = square.profile_id else {
                continue;
            };
            match self.award(pool, &square, profile_id, t, touch_payout).await? {
                InsertOutcome::Inserted => {
                    tally.touch += 1;
                    info!(
                        pool_id = pool.id,
                        square_id = square.id,
                        payout = touch_payout,
                        "Touch winner in pool {}: {} takes ${touch_payout:.2} at ({}, {})",
                        pool.pool_name,
                        square.profile_name.as_deref().unwrap_or("?"),
                        square.row_pos, square.col_pos,
                    );
                }
                InsertOutcome::AlreadySettled => tally.already += 1,
            }
        }

        Ok(Some(tally))
    }

    /// Insert one winner record if none exists for (square, quarter). The
    /// pre-check keeps the common path quiet; the unique index settles races.
    async fn award(
        &self,
        pool: &Pool,
        square: &SquareRow,
        profile_id: i64,
        t: &Transition,
        payout: f64,
    ) -> Result<InsertOutcome> {
        if self.winners.exists_for(square.id, t.quarter).await? {
            return Ok(InsertOutcome::AlreadySettled);
        }
        self.winners
            .insert(&NewWinner {
                pool_id: pool.id,
                square_id: square.id,
                profile_id,
                quarter: t.quarter,
                payout_amount: payout,
                afc_digit: t.afc_digit,
                nfc_digit: t.nfc_digit,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::WinnerRow;
    use crate::types::Quarter;

    async fn test_db() -> sqlx::SqlitePool {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&db).await.unwrap();
        db
    }

    async fn create_pool(db: &sqlx::SqlitePool, name: &str, active: bool) -> i64 {
        sqlx::query(
            "INSERT INTO pools (pool_name, bet_amount, q1_payout, halftime_payout,
                                q3_payout, final_payout, is_active, created_at)
             VALUES (?, 10.0, 50.0, 100.0, 50.0, 300.0, ?, 0)",
        )
        .bind(name)
        .bind(active as i64)
        .execute(db)
        .await
        .unwrap();
        sqlx::query_scalar("SELECT id FROM pools WHERE pool_name = ?")
            .bind(name)
            .fetch_one(db)
            .await
            .unwrap()
    }

    async fn add_square(
        db: &sqlx::SqlitePool,
        pool_id: i64,
        row: u8,
        col: u8,
        profile: Option<(i64, &str)>,
    ) {
        sqlx::query(
            "INSERT INTO squares (pool_id, row_pos, col_pos, profile_id, profile_name, claimed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(pool_id)
        .bind(i64::from(row))
        .bind(i64::from(col))
        .bind(profile.map(|(id, _)| id))
        .bind(profile.map(|(_, name)| name))
        .bind(profile.map(|_| 1700000000i64))
        .execute(db)
        .await
        .unwrap();
    }

    async fn all_winners(db: &sqlx::SqlitePool) -> Vec<WinnerRow> {
        sqlx::query_as::<_, WinnerRow>(
            "SELECT id, pool_id, square_id, profile_id, quarter, payout_amount,
                    afc_digit, nfc_digit, created_at
             FROM winners ORDER BY id",
        )
        .fetch_all(db)
        .await
        .unwrap()
    }

    fn q1_at(afc_digit: u8, nfc_digit: u8) -> Transition {
        Transition {
            game_name: "Super Bowl".to_string(),
            quarter: Quarter::Q1,
            afc_digit,
            nfc_digit,
        }
    }

    #[tokio::test]
    async fn primary_and_touch_awards_for_frozen_digits() {
        // Q1 freezes at AFC 24 / NFC 17 — cell (7, 4). Payouts: $50 primary,
        // $5 per touch.
        let db = test_db().await;
        let pool_id = create_pool(&db, "office", true).await;
        add_square(&db, pool_id, 7, 4, Some((1, "P"))).await;
        add_square(&db, pool_id, 6, 4, Some((2, "A"))).await;
        add_square(&db, pool_id, 8, 4, Some((3, "B"))).await;
        add_square(&db, pool_id, 7, 3, Some((4, "C"))).await;
        add_square(&db, pool_id, 7, 5, None).await; // unclaimed neighbor

        let engine = WinnerSettlementEngine::new(db.clone());
        let summary = engine.settle_quarter(&q1_at(4, 7)).await.unwrap();

        assert_eq!(summary.pools_settled, 1);
        assert_eq!(summary.primary_winners, 1);
        assert_eq!(summary.touch_winners, 3);

        let winners = all_winners(&db).await;
        assert_eq!(winners.len(), 4);
        let primary = winners.iter().find(|w| w.profile_id == 1).unwrap();
        assert_eq!(primary.payout_amount, 50.0);
        assert_eq!(primary.quarter, "Q1");
        assert_eq!((primary.afc_digit, primary.nfc_digit), (4, 7));
        for touch in winners.iter().filter(|w| w.profile_id != 1) {
            assert_eq!(touch.payout_amount, 5.0);
        }
    }

    #[tokio::test]
    async fn settlement_is_idempotent() {
        let db = test_db().await;
        let pool_id = create_pool(&db, "office", true).await;
        add_square(&db, pool_id, 7, 4, Some((1, "P"))).await;
        add_square(&db, pool_id, 6, 4, Some((2, "A"))).await;

        let engine = WinnerSettlementEngine::new(db.clone());
        engine.settle_quarter(&q1_at(4, 7)).await.unwrap();
        let before = all_winners(&db).await.len();

        let summary = engine.settle_quarter(&q1_at(4, 7)).await.unwrap();
        assert_eq!(summary.primary_winners, 0);
        assert_eq!(summary.touch_winners, 0);
        assert_eq!(summary.already_settled, 2);
        assert_eq!(all_winners(&db).await.len(), before);
    }

    #[tokio::test]
    async fn corner_cell_touches_are_clipped() {
        // Digits (0, 0): primary at (0, 0), only (1, 0) and (0, 1) can touch.
        let db = test_db().await;
        let pool_id = create_pool(&db, "office", true).await;
        for row in 0..3u8 {
            for col in 0..3u8 {
                let id = i64::from(row) * 10 + i64::from(col) + 1;
                add_square(&db, pool_id, row, col, Some((id, "x"))).await;
            }
        }

        let engine = WinnerSettlementEngine::new(db.clone());
        let summary = engine.settle_quarter(&q1_at(0, 0)).await.unwrap();
        assert_eq!(summary.primary_winners, 1);
        assert_eq!(summary.touch_winners, 2);
    }

    #[tokio::test]
    async fn inactive_pool_is_never_settled() {
        let db = test_db().await;
        let pool_id = create_pool(&db, "retired", false).await;
        add_square(&db, pool_id, 7, 4, Some((1, "P"))).await;

        let engine = WinnerSettlementEngine::new(db.clone());
        let summary = engine.settle_quarter(&q1_at(4, 7)).await.unwrap();
        assert_eq!(summary.pools_settled, 0);
        assert!(all_winners(&db).await.is_empty());
    }

    #[tokio::test]
    async fn pool_without_quarter_payout_is_skipped_others_settle() {
        let db = test_db().await;
        let broken = create_pool(&db, "broken", true).await;
        sqlx::query("UPDATE pools SET q1_payout = NULL WHERE id = ?")
            .bind(broken)
            .execute(&db)
            .await
            .unwrap();
        add_square(&db, broken, 7, 4, Some((1, "P"))).await;

        let healthy = create_pool(&db, "healthy", true).await;
        add_square(&db, healthy, 7, 4, Some((2, "Q"))).await;

        let engine = WinnerSettlementEngine::new(db.clone());
        let summary = engine.settle_quarter(&q1_at(4, 7)).await.unwrap();

        assert_eq!(summary.pools_skipped, 1);
        assert_eq!(summary.pools_settled, 1);
        let winners = all_winners(&db).await;
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].pool_id, healthy);
    }

    #[tokio::test]
    async fn unclaimed_primary_still_awards_claimed_touches() {
        let db = test_db().await;
        let pool_id = create_pool(&db, "office", true).await;
        add_square(&db, pool_id, 7, 4, None).await; // winning cell unclaimed
        add_square(&db, pool_id, 6, 4, Some((2, "A"))).await;
        add_square(&db, pool_id, 7, 5, Some((3, "B"))).await;

        let engine = WinnerSettlementEngine::new(db.clone());
        let summary = engine.settle_quarter(&q1_at(4, 7)).await.unwrap();

        assert_eq!(summary.primary_winners, 0);
        assert_eq!(summary.touch_winners, 2);
        for w in all_winners(&db).await {
            assert_eq!(w.payout_amount, 5.0);
        }
    }

    #[tokio::test]
    async fn payout_selected_by_quarter_enum() {
        let db = test_db().await;
        let pool_id = create_pool(&db, "office", true).await;
        add_square(&db, pool_id, 8, 1, Some((1, "P"))).await;

        let engine = WinnerSettlementEngine::new(db.clone());
        let t = Transition {
            game_name: "Super Bowl".to_string(),
            quarter: Quarter::Final,
            afc_digit: 1,
            nfc_digit: 8,
        };
        engine.settle_quarter(&t).await.unwrap();

        let winners = all_winners(&db).await;
        assert_eq!(winners[0].payout_amount, 300.0);
        assert_eq!(winners[0].quarter, "FINAL");
    }

    #[tokio::test]
    async fn same_cell_pays_again_in_a_later_quarter() {
        let db = test_db().await;
        let pool_id = create_pool(&db, "office", true).await;
        add_square(&db, pool_id, 7, 4, Some((1, "P"))).await;

        let engine = WinnerSettlementEngine::new(db.clone());
        engine.settle_quarter(&q1_at(4, 7)).await.unwrap();

        let mut half = q1_at(4, 7);
        half.quarter = Quarter::Q2;
        let summary = engine.settle_quarter(&half).await.unwrap();

        assert_eq!(summary.primary_winners, 1);
        let winners = all_winners(&db).await;
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[1].payout_amount, 100.0);
    }
}

//! Database row types. Used by sqlx for typed queries.

use crate::types::Quarter;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FrozenScoreRow {
    pub id: i64,
    pub game_name: String,
    /// Quarter::as_str() form; the table's UNIQUE(game_name, quarter) is the
    /// one-row-per-quarter invariant.
    pub quarter: String,
    pub afc_digit: i64,
    pub nfc_digit: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Pool {
    pub id: i64,
    pub pool_name: String,
    pub bet_amount: f64,
    pub q1_payout: Option<f64>,
    pub halftime_payout: Option<f64>,
    pub q3_payout: Option<f64>,
    pub final_payout: Option<f64>,
    pub is_active: i64,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Pool {
    /// Typed quarter→payout lookup. None means the pool was configured
    /// without a payout for this quarter and must be skipped at settlement.
    pub fn payout_for(&self, quarter: Quarter) -> Option<f64> {
        match quarter {
            Quarter::Q1 => self.q1_payout,
            Quarter::Q2 => self.halftime_payout,
            Quarter::Q3 => self.q3_payout,
            Quarter::Final => self.final_payout,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SquareRow {
    pub id: i64,
    pub pool_id: i64,
    /// NFC-digit axis.
    pub row_pos: i64,
    /// AFC-digit axis.
    pub col_pos: i64,
    pub profile_id: Option<i64>,
    pub profile_name: Option<String>,
    pub claimed_at: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WinnerRow {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_payouts() -> Pool {
        Pool {
            id: 1,
            pool_name: "office".to_string(),
            bet_amount: 10.0,
            q1_payout: Some(50.0),
            halftime_payout: Some(100.0),
            q3_payout: Some(50.0),
            final_payout: Some(300.0),
            is_active: 1,
            created_at: 0,
            updated_at: None,
        }
    }

    #[test]
    fn payout_lookup_is_selected_by_quarter() {
        let pool = pool_with_payouts();
        assert_eq!(pool.payout_for(Quarter::Q1), Some(50.0));
        assert_eq!(pool.payout_for(Quarter::Q2), Some(100.0));
        assert_eq!(pool.payout_for(Quarter::Q3), Some(50.0));
        assert_eq!(pool.payout_for(Quarter::Final), Some(300.0));
    }

    #[test]
    fn missing_payout_reads_as_none() {
        let mut pool = pool_with_payouts();
        pool.halftime_payout = None;
        assert_eq!(pool.payout_for(Quarter::Q2), None);
        assert_eq!(pool.payout_for(Quarter::Q1), Some(50.0));
    }
}

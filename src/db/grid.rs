//! Read access to the 10×10 claim grid. Claim ownership is mutated by the
//! user-facing layer; settlement only reads it.

use crate::config::GRID_SIZE;
use crate::db::models::SquareRow;
use crate::error::Result;

#[derive(Clone)]
pub struct GridStore {
    pool: sqlx::SqlitePool,
}

impl GridStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn square_at(
        &self,
        pool_id: i64,
        row: u8,
        col: u8,
    ) -> Result<Option<SquareRow>> {
        let row = sqlx::query_as::<_, SquareRow>(
            "SELECT id, pool_id, row_pos, col_pos, profile_id, profile_name, claimed_at
             FROM squares WHERE pool_id = ? AND row_pos = ? AND col_pos = ?",
        )
        .bind(pool_id)
        .bind(i64::from(row))
        .bind(i64::from(col))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// The orthogonal neighbors of (row, col) that exist in this pool's grid.
    pub async fn neighbors(&self, pool_id: i64, row: u8, col: u8) -> Result<Vec<SquareRow>> {
        let mut out = Vec::new();
        for (nr, nc) in neighbor_coords(row, col) {
            if let Some(square) = self.square_at(pool_id, nr, nc).await? {
                out.push(square);
            }
        }
        Ok(out)
    }
}

/// Up/down/left/right neighbors of a cell, clipped to the grid. No
/// wraparound: a corner cell has exactly 2 neighbors, an edge cell 3.
pub fn neighbor_coords(row: u8, col: u8) -> Vec<(u8, u8)> {
    const OFFSETS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    let mut out = Vec::with_capacity(4);
    for (dr, dc) in OFFSETS {
        let nr = i16::from(row) + i16::from(dr);
        let nc = i16::from(col) + i16::from(dc);
        if (0..i16::from(GRID_SIZE)).contains(&nr) && (0..i16::from(GRID_SIZE)).contains(&nc) {
            out.push((nr as u8, nc as u8));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_cell_has_four_neighbors() {
        let n = neighbor_coords(7, 4);
        assert_eq!(n, vec![(6, 4), (8, 4), (7, 3), (7, 5)]);
    }

    #[test]
    fn corner_cells_clip_to_two_neighbors() {
        assert_eq!(neighbor_coords(0, 0), vec![(1, 0), (0, 1)]);
        assert_eq!(neighbor_coords(9, 9), vec![(8, 9), (9, 8)]);
    }

    #[test]
    fn edge_cells_clip_to_three_neighbors() {
        assert_eq!(neighbor_coords(0, 5), vec![(1, 5), (0, 4), (0, 6)]);
        assert_eq!(neighbor_coords(5, 9), vec![(4, 9), (6, 9), (5, 8)]);
    }
}

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use shared::domain::{BoardId, TileIndex};

use crate::Storage;

impl Storage {
    pub async fn is_tile_active(&self, board_id: BoardId, tile: TileIndex) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM status WHERE board_id = ? AND tile_idx = ?",
        )
        .bind(board_id.0)
        .bind(i64::from(tile))
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn list_active_tiles(&self, board_id: BoardId) -> Result<BTreeSet<TileIndex>> {
        let rows: Vec<i64> = sqlx::query_scalar(
            "SELECT tile_idx FROM status WHERE board_id = ? ORDER BY tile_idx ASC",
        )
        .bind(board_id.0)
        .fetch_all(&self.pool)
        .await?;
        // The CHECK constraint keeps stored indices in range.
        Ok(rows
            .into_iter()
            .filter_map(|idx| TileIndex::try_from(idx).ok())
            .collect())
    }

    /// Flips the tile and returns whether it is now active.
    ///
    /// Two requests racing on the same tile may both observe the same state;
    /// the insert ignores duplicates and the delete tolerates a missing row,
    /// so neither side errors and the later arrival decides the final state.
    /// The insert only lands while the board row exists, so a toggle racing a
    /// board delete leaves nothing behind.
    pub async fn toggle_tile(&self, board_id: BoardId, tile: TileIndex) -> Result<bool> {
        if self.is_tile_active(board_id, tile).await? {
            sqlx::query("DELETE FROM status WHERE board_id = ? AND tile_idx = ?")
                .bind(board_id.0)
                .bind(i64::from(tile))
                .execute(&self.pool)
                .await
                .context("failed to deactivate tile")?;
            return Ok(false);
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO status (board_id, tile_idx) \
             SELECT ?, ? WHERE EXISTS (SELECT 1 FROM boards WHERE id = ?)",
        )
        .bind(board_id.0)
        .bind(i64::from(tile))
        .bind(board_id.0)
        .execute(&self.pool)
        .await
        .context("failed to activate tile")?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Either a concurrent toggle inserted first or the board is gone.
        self.is_tile_active(board_id, tile).await
    }

    /// Removes every active tile of a board. Returns the number of rows removed.
    pub async fn clear_tiles(&self, board_id: BoardId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM status WHERE board_id = ?")
            .bind(board_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

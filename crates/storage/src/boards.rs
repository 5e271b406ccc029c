use anyhow::{Context, Result};
use shared::domain::{Board, BoardContent, BoardId};
use sqlx::{sqlite::SqliteRow, Row};

use crate::Storage;

const NEW_BOARD_NAME: &str = "New Board";

impl Storage {
    /// Inserts a board with a placeholder name and no content.
    pub async fn create_board(&self) -> Result<BoardId> {
        let rec = sqlx::query(
            "INSERT INTO boards (name, items, rewards, punishment) VALUES (?, '', '', '') RETURNING id",
        )
        .bind(NEW_BOARD_NAME)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert board")?;
        Ok(BoardId(rec.get::<i64, _>(0)))
    }

    pub async fn get_board(&self, board_id: BoardId) -> Result<Option<Board>> {
        let row = sqlx::query(
            "SELECT id, name, items, rewards, punishment FROM boards WHERE id = ?",
        )
        .bind(board_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(board_from_row))
    }

    pub async fn board_exists(&self, board_id: BoardId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM boards WHERE id = ?")
            .bind(board_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// All boards in id order.
    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let rows = sqlx::query(
            "SELECT id, name, items, rewards, punishment FROM boards ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(board_from_row).collect())
    }

    /// Overwrites every field of the board. Returns false, and changes
    /// nothing, when the id does not exist.
    pub async fn update_board(&self, board_id: BoardId, content: &BoardContent) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE boards SET name = ?, items = ?, rewards = ?, punishment = ? WHERE id = ?",
        )
        .bind(content.name.as_str())
        .bind(content.items.as_str())
        .bind(content.rewards.as_str())
        .bind(content.punishment.as_str())
        .bind(board_id.0)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update board {}", board_id.0))?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes the board together with all of its tile state in one
    /// transaction.
    pub async fn delete_board(&self, board_id: BoardId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM status WHERE board_id = ?")
            .bind(board_id.0)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM boards WHERE id = ?")
            .bind(board_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit()
            .await
            .with_context(|| format!("failed to delete board {}", board_id.0))?;
        Ok(result.rows_affected() > 0)
    }
}

fn board_from_row(r: SqliteRow) -> Board {
    Board {
        id: BoardId(r.get::<i64, _>(0)),
        name: r.get::<String, _>(1),
        items: r.get::<String, _>(2),
        rewards: r.get::<String, _>(3),
        punishment: r.get::<String, _>(4),
    }
}

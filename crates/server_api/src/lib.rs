use shared::{
    domain::{BoardId, TileIndex},
    error::{ApiError, ErrorCode},
    protocol::{BoardSummary, ToggleRequest, ToggleResponse},
};
use storage::Storage;
use tracing::{error, info};

pub mod admin;
pub mod html;
pub mod nonce;
pub mod render;

use nonce::{Action, Identity, NonceConfig};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub nonces: NonceConfig,
    /// Credential granting the administrative capability. Empty disables it.
    pub admin_token: String,
}

pub fn toggle_route() -> &'static str {
    "/toggle"
}

/// Flips one tile of a board for everyone viewing it.
///
/// The token is checked first, then the tile index and board id, so a
/// rejected request never reaches the tile store.
pub async fn toggle_tile(ctx: &ApiContext, req: &ToggleRequest) -> Result<ToggleResponse, ApiError> {
    let board_id = BoardId(req.board);
    nonce::verify(&ctx.nonces, Identity::Visitor, Action::Toggle(board_id), &req.nonce)?;
    let tile = TileIndex::try_from(req.tile)
        .map_err(|e| ApiError::new(ErrorCode::Validation, e.to_string()))?;

    if !ctx.storage.board_exists(board_id).await.map_err(internal)? {
        return Err(ApiError::not_found("board not found"));
    }

    let active = ctx
        .storage
        .toggle_tile(board_id, tile)
        .await
        .map_err(internal)?;
    info!(board_id = board_id.0, tile = tile.get(), active, "tile toggled");
    Ok(ToggleResponse::active(active))
}

pub async fn list_boards(ctx: &ApiContext) -> Result<Vec<BoardSummary>, ApiError> {
    let boards = ctx.storage.list_boards().await.map_err(internal)?;
    Ok(boards
        .into_iter()
        .map(|board| BoardSummary {
            board_id: board.id,
            name: board.name,
        })
        .collect())
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    error!(%err, "storage or token failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

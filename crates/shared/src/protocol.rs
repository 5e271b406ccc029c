use serde::{Deserialize, Serialize};

use crate::domain::BoardId;

/// Form body of the public toggle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub board: i64,
    pub tile: i64,
    #[serde(default)]
    pub nonce: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleStatus {
    /// 1 when the tile is now active, 0 otherwise.
    pub status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub data: ToggleStatus,
}

impl ToggleResponse {
    pub fn active(active: bool) -> Self {
        Self {
            success: true,
            data: ToggleStatus {
                status: u8::from(active),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub board_id: BoardId,
    pub name: String,
}

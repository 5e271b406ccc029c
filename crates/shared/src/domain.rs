use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(BoardId);

/// Tiles per side of the square grid.
pub const GRID_SIDE: usize = 5;
/// Cells on a rendered board, center included.
pub const TILE_COUNT: usize = GRID_SIDE * GRID_SIDE;
/// Configurable tiles, i.e. every cell except the center.
pub const ITEM_SLOTS: usize = TILE_COUNT - 1;
pub const CENTER_TILE: usize = TILE_COUNT / 2;
pub const CENTER_LABEL: &str = "BINGO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tile index {0} is outside 0..={max}", max = TILE_COUNT - 1)]
pub struct TileIndexOutOfRange(pub i64);

/// Position of a cell on the 5x5 grid, row-major, always below [`TILE_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TileIndex(u8);

impl TileIndex {
    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = TileIndex> {
        (0..TILE_COUNT as u8).map(TileIndex)
    }
}

impl TryFrom<i64> for TileIndex {
    type Error = TileIndexOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(idx) if usize::from(idx) < TILE_COUNT => Ok(TileIndex(idx)),
            _ => Err(TileIndexOutOfRange(value)),
        }
    }
}

impl From<TileIndex> for i64 {
    fn from(value: TileIndex) -> Self {
        i64::from(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    /// Newline-delimited tile labels.
    pub items: String,
    pub rewards: String,
    pub punishment: String,
}

/// Field values written by an admin save. All fields are replaced at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardContent {
    pub name: String,
    pub items: String,
    pub rewards: String,
    pub punishment: String,
}

impl Board {
    /// The 25 labels in grid order: the first 24 item lines, padded with empty
    /// labels, with [`CENTER_LABEL`] spliced in at [`CENTER_TILE`].
    pub fn tile_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = split_lines(&self.items).take(ITEM_SLOTS).collect();
        labels.resize(ITEM_SLOTS, "");
        labels.insert(CENTER_TILE, CENTER_LABEL);
        labels
    }

    /// Reward lines, trimmed. Blank lines are kept as empty entries.
    pub fn reward_lines(&self) -> Vec<&str> {
        display_lines(&self.rewards)
    }

    pub fn punishment_lines(&self) -> Vec<&str> {
        display_lines(&self.punishment)
    }
}

fn display_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    split_lines(text).map(str::trim).collect()
}

/// Splits on `\r\n`, `\r` or `\n`. An empty input yields a single empty line.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(pos) => {
                let skip = if current[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[pos + skip..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

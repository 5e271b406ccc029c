use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{BoardContent, BoardId, CENTER_TILE};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/bingo.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateBoard {
        #[arg(long)]
        name: Option<String>,
    },
    ListBoards,
    ShowBoard {
        board_id: i64,
    },
    /// Replaces a board's items with the lines of a text file.
    LoadItems {
        board_id: i64,
        file: PathBuf,
    },
    DeleteBoard {
        board_id: i64,
    },
    ResetTiles {
        board_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateBoard { name } => {
            let board_id = storage.create_board().await?;
            if let Some(name) = name {
                let content = BoardContent {
                    name,
                    ..Default::default()
                };
                storage.update_board(board_id, &content).await?;
            }
            println!("created board_id={}", board_id.0);
        }
        Command::ListBoards => {
            for board in storage.list_boards().await? {
                println!("{}\t{}", board.id.0, board.name);
            }
        }
        Command::ShowBoard { board_id } => {
            let board_id = BoardId(board_id);
            let Some(board) = storage.get_board(board_id).await? else {
                bail!("board {} not found", board_id.0);
            };
            let active = storage.list_active_tiles(board_id).await?;
            println!("{} ({} active)", board.name, active.len());
            for (idx, label) in board.tile_labels().into_iter().enumerate() {
                let mark = if active.iter().any(|t| t.get() == idx) { "x" } else { " " };
                let center = if idx == CENTER_TILE { "*" } else { "" };
                println!("[{mark}] {idx:>2}{center} {label}");
            }
        }
        Command::LoadItems { board_id, file } => {
            let board_id = BoardId(board_id);
            let Some(board) = storage.get_board(board_id).await? else {
                bail!("board {} not found", board_id.0);
            };
            let items = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let content = BoardContent {
                name: board.name,
                items: items.trim_end().to_string(),
                rewards: board.rewards,
                punishment: board.punishment,
            };
            storage.update_board(board_id, &content).await?;
            println!("loaded items into board_id={}", board_id.0);
        }
        Command::DeleteBoard { board_id } => {
            if storage.delete_board(BoardId(board_id)).await? {
                println!("deleted board_id={board_id}");
            } else {
                bail!("board {board_id} not found");
            }
        }
        Command::ResetTiles { board_id } => {
            let cleared = storage.clear_tiles(BoardId(board_id)).await?;
            println!("cleared {cleared} active tiles on board_id={board_id}");
        }
    }

    Ok(())
}

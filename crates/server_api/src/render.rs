use std::{collections::BTreeSet, fmt::Write as _};

use shared::{
    domain::{Board, BoardId, TileIndex, CENTER_TILE},
    error::ApiError,
};

use crate::{
    html::{escape_html, page},
    internal,
    nonce::{self, Action, Identity},
    ApiContext,
};

/// Tag name of the embedding directive, e.g. `[digital_bingo id="3"]`.
pub const SHORTCODE_TAG: &str = "digital_bingo";

pub fn shortcode_for(board_id: BoardId) -> String {
    format!("[{SHORTCODE_TAG} id=\"{}\"]", board_id.0)
}

/// Renders the board fragment, or an empty string when the id is unknown.
pub async fn render_board(ctx: &ApiContext, board_id: BoardId) -> Result<String, ApiError> {
    match ctx.storage.get_board(board_id).await.map_err(internal)? {
        Some(board) => fragment(ctx, &board).await,
        None => Ok(String::new()),
    }
}

/// Standalone page for a board, `None` when the id is unknown.
pub async fn render_board_page(
    ctx: &ApiContext,
    board_id: BoardId,
) -> Result<Option<String>, ApiError> {
    let Some(board) = ctx.storage.get_board(board_id).await.map_err(internal)? else {
        return Ok(None);
    };
    let body = fragment(ctx, &board).await?;
    Ok(Some(page(&board.name, &body)))
}

async fn fragment(ctx: &ApiContext, board: &Board) -> Result<String, ApiError> {
    let active = ctx
        .storage
        .list_active_tiles(board.id)
        .await
        .map_err(internal)?;
    let toggle_nonce =
        nonce::mint(&ctx.nonces, Identity::Visitor, Action::Toggle(board.id)).map_err(internal)?;
    Ok(board_markup(board, &active, &toggle_nonce))
}

pub fn board_markup(board: &Board, active: &BTreeSet<TileIndex>, toggle_nonce: &str) -> String {
    let id = board.id.0;
    let mut html = format!(
        "<h2 class=\"bingo-board-title\">{}</h2>",
        escape_html(&board.name)
    );
    let _ = write!(
        html,
        "<div class=\"bingo-board\" data-board=\"{id}\" data-nonce=\"{}\">",
        escape_html(toggle_nonce)
    );
    for (tile, label) in TileIndex::all().zip(board.tile_labels()) {
        let mut class = String::from("bingo-tile");
        if tile.get() == CENTER_TILE {
            class.push_str(" bingo-center");
        }
        if active.contains(&tile) {
            class.push_str(" active");
        }
        let _ = write!(
            html,
            "<div class=\"{class}\" data-board=\"{id}\" data-tile=\"{}\">{}</div>",
            tile.get(),
            escape_html(label)
        );
    }
    html.push_str("</div>");

    list_section(&mut html, "Rewards:", &board.reward_lines());
    list_section(&mut html, "Punishment:", &board.punishment_lines());
    html
}

fn list_section(html: &mut String, heading: &str, lines: &[&str]) {
    if lines.is_empty() {
        return;
    }
    let _ = write!(html, "<h3>{heading}</h3><ul>");
    for line in lines {
        let _ = write!(html, "<li>{}</li>", escape_html(line));
    }
    html.push_str("</ul>");
}

/// Replaces every embedding directive in host content with the rendered board.
/// Text outside directives is passed through untouched.
pub async fn expand_shortcodes(ctx: &ApiContext, content: &str) -> Result<String, ApiError> {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some((before, attrs, after)) = next_shortcode(rest) {
        out.push_str(before);
        let board_id = BoardId(shortcode_id(attrs));
        out.push_str(&render_board(ctx, board_id).await?);
        rest = after;
    }
    out.push_str(rest);
    Ok(out)
}

/// Finds the next `[digital_bingo ...]` and splits the input around it.
fn next_shortcode(text: &str) -> Option<(&str, &str, &str)> {
    let opener = format!("[{SHORTCODE_TAG}");
    let mut search_from = 0;
    loop {
        let start = search_from + text[search_from..].find(&opener)?;
        let tail = &text[start + opener.len()..];
        // `[digital_bingox]` is a different tag.
        if tail.starts_with(|c: char| c == ']' || c.is_whitespace()) {
            let end = tail.find(']')?;
            return Some((&text[..start], &tail[..end], &tail[end + 1..]));
        }
        search_from = start + opener.len();
    }
}

/// Reads the `id` attribute with integer-prefix semantics; anything
/// unreadable resolves to 0, which never names a board.
fn shortcode_id(attrs: &str) -> i64 {
    shortcode_attrs(attrs)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("id"))
        .map(|(_, value)| leading_int(value.trim()))
        .unwrap_or(0)
}

/// Splits `key = "value"` pairs. Whitespace around `=` is allowed, values may
/// be double-quoted, single-quoted or bare, and keys without a value are
/// skipped.
fn shortcode_attrs(attrs: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut rest = attrs.trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();
        let Some(after_eq) = rest.strip_prefix('=') else {
            continue;
        };
        rest = after_eq.trim_start();

        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &rest[1..];
                let close = inner.find(quote).unwrap_or(inner.len());
                rest = inner.get(close + 1..).unwrap_or("");
                &inner[..close]
            }
            _ => {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                let value = &rest[..end];
                rest = &rest[end..];
                value
            }
        };
        pairs.push((key, value));
        rest = rest.trim_start();
    }
    pairs
}

fn leading_int(value: &str) -> i64 {
    let digits_end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..digits_end].parse().unwrap_or(0)
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;

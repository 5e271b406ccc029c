use std::fmt::Write as _;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use shared::{
    domain::{split_lines, Board, BoardContent, BoardId},
    error::{ApiError, ErrorCode},
};
use tracing::{info, warn};

use crate::{
    html::{escape_html, page},
    internal,
    nonce::{self, Action, Identity},
    render::shortcode_for,
    ApiContext,
};

pub fn admin_route() -> &'static str {
    "/admin"
}

pub fn admin_login_route() -> &'static str {
    "/admin/login"
}

pub fn create_board_route() -> &'static str {
    "/admin/boards/new"
}

pub fn save_board_route() -> &'static str {
    "/admin/boards/save"
}

/// Proof that the request carried the administrative credential. Only
/// [`authorize_admin`] constructs it, so every admin operation taking one is
/// gated.
#[derive(Debug)]
pub struct AdminSession(());

pub fn authorize_admin(ctx: &ApiContext, presented: Option<&str>) -> Result<AdminSession, ApiError> {
    // An unset token disables the admin surface entirely.
    match presented {
        Some(token) if !ctx.admin_token.is_empty() && tokens_match(token, &ctx.admin_token) => {
            Ok(AdminSession(()))
        }
        Some(_) => {
            warn!("rejected admin request with wrong credential");
            Err(ApiError::new(ErrorCode::Unauthorized, "invalid admin credential"))
        }
        None => Err(ApiError::new(ErrorCode::Unauthorized, "admin credential required")),
    }
}

/// Accepts the signed session value issued by [`issue_session_cookie`].
pub fn authorize_admin_session(ctx: &ApiContext, session: &str) -> Result<AdminSession, ApiError> {
    if ctx.admin_token.is_empty() {
        return Err(ApiError::new(ErrorCode::Unauthorized, "admin is disabled"));
    }
    nonce::verify(&ctx.nonces, Identity::Admin, Action::AdminSession, session).map_err(|err| {
        warn!(%err, "rejected admin session cookie");
        ApiError::new(ErrorCode::Unauthorized, "invalid admin session")
    })?;
    Ok(AdminSession(()))
}

/// Value for the admin cookie. The raw credential never leaves the login form.
pub fn issue_session_cookie(ctx: &ApiContext, _session: &AdminSession) -> Result<String, ApiError> {
    nonce::mint(&ctx.nonces, Identity::Admin, Action::AdminSession).map_err(internal)
}

/// Compares fixed-size digests without an early exit, so timing reveals
/// neither the length nor the matching prefix of the configured token.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    New,
    Board(BoardId),
}

impl AdminTab {
    /// Absent or unreadable values select the "new board" tab.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .and_then(|value| value.parse::<i64>().ok())
            .map(|id| AdminTab::Board(BoardId(id)))
            .unwrap_or(AdminTab::New)
    }

    pub fn url(self, saved: bool) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        match self {
            AdminTab::New => query.append_pair("tab", "new"),
            AdminTab::Board(id) => query.append_pair("tab", &id.0.to_string()),
        };
        if saved {
            query.append_pair("saved", "1");
        }
        format!("{}?{}", admin_route(), query.finish())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBoardForm {
    #[serde(rename = "_nonce", default)]
    pub nonce: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveBoardForm {
    pub board_id: i64,
    #[serde(rename = "_nonce", default)]
    pub nonce: String,
    #[serde(default)]
    pub board_name: String,
    #[serde(default)]
    pub items_text: String,
    #[serde(default)]
    pub rewards_text: String,
    #[serde(default)]
    pub punishment_text: String,
    /// Present when the delete button submitted the form.
    pub delete: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(BoardId),
    Deleted(BoardId),
}

impl SaveOutcome {
    pub fn redirect_url(self) -> String {
        match self {
            SaveOutcome::Saved(id) => AdminTab::Board(id).url(true),
            SaveOutcome::Deleted(_) => AdminTab::New.url(false),
        }
    }
}

pub async fn create_board(
    ctx: &ApiContext,
    _session: &AdminSession,
    form: &CreateBoardForm,
) -> Result<BoardId, ApiError> {
    nonce::verify(&ctx.nonces, Identity::Admin, Action::AddBoard, &form.nonce)?;
    let board_id = ctx.storage.create_board().await.map_err(internal)?;
    info!(board_id = board_id.0, "board created");
    Ok(board_id)
}

/// Saves or deletes depending on the submitted button. The token must have
/// been issued for this exact board id.
pub async fn save_board(
    ctx: &ApiContext,
    _session: &AdminSession,
    form: &SaveBoardForm,
) -> Result<SaveOutcome, ApiError> {
    let board_id = BoardId(form.board_id);
    nonce::verify(&ctx.nonces, Identity::Admin, Action::SaveBoard(board_id), &form.nonce)?;

    if form.delete.is_some() {
        let existed = ctx.storage.delete_board(board_id).await.map_err(internal)?;
        info!(board_id = board_id.0, existed, "board deleted");
        return Ok(SaveOutcome::Deleted(board_id));
    }

    let content = BoardContent {
        name: sanitize_line(&form.board_name),
        items: sanitize_text(&form.items_text),
        rewards: sanitize_text(&form.rewards_text),
        punishment: sanitize_text(&form.punishment_text),
    };
    let updated = ctx
        .storage
        .update_board(board_id, &content)
        .await
        .map_err(internal)?;
    info!(board_id = board_id.0, updated, "board saved");
    Ok(SaveOutcome::Saved(board_id))
}

/// Single-line field: line breaks and runs of whitespace collapse to one space.
pub fn sanitize_line(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Multi-line field: line endings normalized to `\n`, outer whitespace trimmed.
pub fn sanitize_text(raw: &str) -> String {
    split_lines(raw).collect::<Vec<_>>().join("\n").trim().to_string()
}

pub async fn render_admin_page(
    ctx: &ApiContext,
    _session: &AdminSession,
    tab: AdminTab,
    saved: bool,
) -> Result<String, ApiError> {
    let boards = ctx.storage.list_boards().await.map_err(internal)?;
    let add_nonce = admin_nonce(ctx, Action::AddBoard)?;

    let mut body = String::from("<div class=\"wrap\"><h1>Bingo Boards</h1>");
    if saved {
        body.push_str("<div class=\"notice notice-success\"><p>Changes saved.</p></div>");
    }

    body.push_str("<nav class=\"nav-tab-wrapper\">");
    for board in &boards {
        let class = if tab == AdminTab::Board(board.id) {
            "nav-tab nav-tab-active"
        } else {
            "nav-tab"
        };
        let _ = write!(
            body,
            "<a href=\"{}\" class=\"{class}\">{}</a>",
            escape_html(&AdminTab::Board(board.id).url(false)),
            escape_html(&board.name)
        );
    }
    let add_class = if tab == AdminTab::New {
        "nav-tab nav-tab-active"
    } else {
        "nav-tab"
    };
    let add_url = format!(
        "{}?{}",
        create_board_route(),
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("_nonce", &add_nonce)
            .finish()
    );
    let _ = write!(
        body,
        "<a href=\"{}\" class=\"{add_class}\">+ Add New</a></nav>",
        escape_html(&add_url)
    );

    match tab {
        AdminTab::New => {
            let _ = write!(
                body,
                "<form method=\"post\" action=\"{}\"><input type=\"hidden\" name=\"_nonce\" value=\"{}\">\
                 <p><button class=\"button button-primary\" type=\"submit\">Create New Board</button></p></form>",
                create_board_route(),
                escape_html(&add_nonce)
            );
        }
        AdminTab::Board(board_id) => match boards.iter().find(|b| b.id == board_id) {
            Some(board) => {
                let save_nonce = admin_nonce(ctx, Action::SaveBoard(board_id))?;
                edit_form(&mut body, board, &save_nonce);
            }
            None => body.push_str("<p>Board not found.</p>"),
        },
    }

    body.push_str("</div>");
    Ok(page("Bingo Boards", &body))
}

fn admin_nonce(ctx: &ApiContext, action: Action) -> Result<String, ApiError> {
    nonce::mint(&ctx.nonces, Identity::Admin, action).map_err(internal)
}

fn edit_form(body: &mut String, board: &Board, save_nonce: &str) {
    let _ = write!(
        body,
        "<form method=\"post\" action=\"{}\">\
         <input type=\"hidden\" name=\"_nonce\" value=\"{}\">\
         <input type=\"hidden\" name=\"board_id\" value=\"{}\">\
         <table class=\"form-table\">\
         <tr><th>Name</th><td><input class=\"regular-text\" name=\"board_name\" value=\"{}\"></td></tr>\
         <tr><th>Items (24 lines)</th><td><textarea rows=\"24\" name=\"items_text\">{}</textarea></td></tr>\
         <tr><th>Rewards (one per line)</th><td><textarea rows=\"4\" name=\"rewards_text\">{}</textarea></td></tr>\
         <tr><th>Punishment (one per line)</th><td><textarea rows=\"4\" name=\"punishment_text\">{}</textarea></td></tr>\
         </table>",
        save_board_route(),
        escape_html(save_nonce),
        board.id.0,
        escape_html(&board.name),
        escape_html(&board.items),
        escape_html(&board.rewards),
        escape_html(&board.punishment),
    );
    let _ = write!(
        body,
        "<p>Shortcode: <code>{}</code></p>\
         <p><button class=\"button button-primary\" type=\"submit\" name=\"save\" value=\"1\">Save Board</button> \
         <button class=\"button\" type=\"submit\" name=\"delete\" value=\"1\" \
         onclick=\"return confirm('Delete this board?');\">Delete Board</button></p></form>",
        escape_html(&shortcode_for(board.id))
    );
}

#[cfg(test)]
#[path = "tests/admin_tests.rs"]
mod tests;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use server_api::{
    admin::{
        admin_login_route, admin_route, authorize_admin, authorize_admin_session, create_board,
        create_board_route, issue_session_cookie, render_admin_page, save_board, save_board_route,
        AdminSession, AdminTab, CreateBoardForm, SaveBoardForm,
    },
    html::{script_route, stylesheet_route},
    list_boards,
    nonce::NonceConfig,
    render::{expand_shortcodes, render_board, render_board_page},
    toggle_route, toggle_tile, ApiContext,
};
use shared::{
    domain::BoardId,
    error::{ApiError, ErrorCode},
    protocol::{BoardSummary, ToggleRequest, ToggleResponse},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

const ADMIN_COOKIE: &str = "bingo_admin";
const MAX_BODY_BYTES: usize = 256 * 1024;

const SCRIPT: &str = include_str!("../assets/bingo.js");
const STYLESHEET: &str = include_str!("../assets/bingo.css");

type Rejection = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
struct AdminPageQuery {
    tab: Option<String>,
    saved: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    if settings.uses_dev_secrets() {
        warn!("running with development admin token or nonce secret; set APP__ADMIN_TOKEN and APP__NONCE_SECRET");
    }
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        nonces: NonceConfig {
            secret: settings.nonce_secret,
            ttl_seconds: settings.nonce_ttl_seconds,
        },
        admin_token: settings.admin_token,
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/boards", get(http_list_boards))
        .route("/boards/:board_id", get(board_page))
        .route("/boards/:board_id/fragment", get(board_fragment))
        .route("/render", post(render_content))
        .route(toggle_route(), post(http_toggle))
        .route(admin_route(), get(admin_page))
        .route(admin_login_route(), post(admin_login))
        .route(
            create_board_route(),
            get(admin_create_board_link).post(admin_create_board),
        )
        .route(save_board_route(), post(admin_save_board))
        .route(script_route(), get(script_asset))
        .route(stylesheet_route(), get(stylesheet_asset))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn reject(err: ApiError) -> Rejection {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_list_boards(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BoardSummary>>, Rejection> {
    let boards = list_boards(&state.api).await.map_err(reject)?;
    Ok(Json(boards))
}

async fn board_page(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<i64>,
) -> Result<(StatusCode, Html<String>), Rejection> {
    let page = render_board_page(&state.api, BoardId(board_id))
        .await
        .map_err(reject)?;
    Ok(match page {
        Some(page) => (StatusCode::OK, Html(page)),
        None => (StatusCode::NOT_FOUND, Html(String::new())),
    })
}

async fn board_fragment(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<i64>,
) -> Result<Html<String>, Rejection> {
    let fragment = render_board(&state.api, BoardId(board_id))
        .await
        .map_err(reject)?;
    Ok(Html(fragment))
}

async fn render_content(
    State(state): State<Arc<AppState>>,
    content: String,
) -> Result<Html<String>, Rejection> {
    let html = expand_shortcodes(&state.api, &content)
        .await
        .map_err(reject)?;
    Ok(Html(html))
}

async fn http_toggle(
    State(state): State<Arc<AppState>>,
    Form(req): Form<ToggleRequest>,
) -> Result<Json<ToggleResponse>, Rejection> {
    let response = toggle_tile(&state.api, &req).await.map_err(|e| {
        if matches!(e.code, ErrorCode::Forbidden) {
            warn!(board = req.board, tile = req.tile, "rejected toggle: {}", e.message);
        }
        reject(e)
    })?;
    Ok(Json(response))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ADMIN_COOKIE)
        .map(|(_, value)| value)
}

/// A bearer header carries the raw admin token; the cookie carries the signed
/// session issued by the login form.
fn admin_session(state: &AppState, headers: &HeaderMap) -> Result<AdminSession, Rejection> {
    if let Some(token) = bearer_token(headers) {
        return authorize_admin(&state.api, Some(token)).map_err(reject);
    }
    match session_cookie(headers) {
        Some(session) => authorize_admin_session(&state.api, session).map_err(reject),
        None => authorize_admin(&state.api, None).map_err(reject),
    }
}

async fn admin_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<AdminPageQuery>,
) -> Result<Html<String>, Rejection> {
    let session = admin_session(&state, &headers)?;
    let tab = AdminTab::parse(q.tab.as_deref());
    let html = render_admin_page(&state.api, &session, tab, q.saved.is_some())
        .await
        .map_err(reject)?;
    Ok(Html(html))
}

async fn admin_login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, Rejection> {
    let session = authorize_admin(&state.api, Some(form.token.as_str())).map_err(reject)?;
    let value = issue_session_cookie(&state.api, &session).map_err(reject)?;
    let cookie = HeaderValue::from_str(&format!(
        "{ADMIN_COOKIE}={value}; Path={}; Max-Age={}; HttpOnly; SameSite=Strict",
        admin_route(),
        state.api.nonces.ttl_seconds
    ))
    .map_err(|_| {
        reject(ApiError::new(
            ErrorCode::Internal,
            "admin session cannot be stored in a cookie",
        ))
    })?;
    let mut response = Redirect::to(&AdminTab::New.url(false)).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn admin_create_board_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(form): Query<CreateBoardForm>,
) -> Result<Redirect, Rejection> {
    create_and_redirect(&state, &headers, &form).await
}

async fn admin_create_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CreateBoardForm>,
) -> Result<Redirect, Rejection> {
    create_and_redirect(&state, &headers, &form).await
}

async fn create_and_redirect(
    state: &AppState,
    headers: &HeaderMap,
    form: &CreateBoardForm,
) -> Result<Redirect, Rejection> {
    let session = admin_session(state, headers)?;
    let board_id = create_board(&state.api, &session, form)
        .await
        .map_err(reject)?;
    Ok(Redirect::to(&AdminTab::Board(board_id).url(false)))
}

async fn admin_save_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<SaveBoardForm>,
) -> Result<Redirect, Rejection> {
    let session = admin_session(&state, &headers)?;
    let outcome = save_board(&state.api, &session, &form)
        .await
        .map_err(reject)?;
    Ok(Redirect::to(&outcome.redirect_url()))
}

async fn script_asset() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        SCRIPT,
    )
}

async fn stylesheet_asset() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

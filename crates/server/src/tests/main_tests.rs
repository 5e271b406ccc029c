use super::*;
use axum::{
    body::{self, Body},
    http::Request,
};
use server_api::nonce::{self, Action, Identity};
use shared::domain::{BoardContent, TileIndex};
use tower::ServiceExt;

const ADMIN: &str = "test-admin";

async fn test_app() -> (Router, ApiContext) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        storage,
        nonces: NonceConfig {
            secret: "s".to_string(),
            ttl_seconds: 60,
        },
        admin_token: ADMIN.to_string(),
    };
    let app = build_router(Arc::new(AppState { api: api.clone() }));
    (app, api)
}

async fn body_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

fn form_post(uri: &str) -> axum::http::request::Builder {
    Request::post(uri).header("content-type", "application/x-www-form-urlencoded")
}

fn toggle_body(api: &ApiContext, board: BoardId, tile: i64) -> String {
    let token = nonce::mint(&api.nonces, Identity::Visitor, Action::Toggle(board)).expect("nonce");
    format!("board={}&tile={tile}&nonce={token}", board.0)
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location")
        .to_str()
        .expect("ascii")
        .to_string()
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _api) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn board_page_renders_and_unknown_board_is_empty_404() {
    let (app, api) = test_app().await;
    let board = api.storage.create_board().await.expect("board");

    let request = Request::get(format!("/boards/{}", board.0))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("class=\"bingo-board\""));
    assert!(html.contains("/assets/bingo.js"));

    let request = Request::get("/boards/999").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn fragment_route_returns_empty_body_for_unknown_board() {
    let (app, _api) = test_app().await;
    let request = Request::get("/boards/42/fragment")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn render_route_expands_directives() {
    let (app, api) = test_app().await;
    let board = api.storage.create_board().await.expect("board");
    let request = Request::post("/render")
        .header("content-type", "text/plain")
        .body(Body::from(format!("before [digital_bingo id=\"{}\"] after", board.0)))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.starts_with("before <h2 class=\"bingo-board-title\">"));
    assert!(html.ends_with(" after"));
}

#[tokio::test]
async fn toggle_route_flips_state_and_reports_it() {
    let (app, api) = test_app().await;
    let board = api.storage.create_board().await.expect("board");

    for expected in [1, 0] {
        let request = form_post("/toggle")
            .body(Body::from(toggle_body(&api, board, 5)))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let dto: ToggleResponse = serde_json::from_str(&body_text(response).await).expect("json");
        assert!(dto.success);
        assert_eq!(dto.data.status, expected);
    }
    assert!(api
        .storage
        .list_active_tiles(board)
        .await
        .expect("active")
        .is_empty());
}

#[tokio::test]
async fn toggle_route_rejects_missing_token_and_bad_tile() {
    let (app, api) = test_app().await;
    let board = api.storage.create_board().await.expect("board");

    let request = form_post("/toggle")
        .body(Body::from(format!("board={}&tile=3", board.0)))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let request = form_post("/toggle")
        .body(Body::from(toggle_body(&api, board, 40)))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(!api
        .storage
        .is_tile_active(board, TileIndex::try_from(3).expect("tile"))
        .await
        .expect("state"));
}

#[tokio::test]
async fn admin_routes_require_credential() {
    let (app, _api) = test_app().await;
    let request = Request::get("/admin").body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::get("/admin")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_page_accepts_bearer_and_cookie() {
    let (app, api) = test_app().await;
    let request = Request::get("/admin?tab=new")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Create New Board"));

    let session = nonce::mint(&api.nonces, Identity::Admin, Action::AdminSession).expect("nonce");
    let request = Request::get("/admin")
        .header(header::COOKIE, format!("theme=dark; {ADMIN_COOKIE}={session}"))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::get("/admin")
        .header(header::COOKIE, format!("{ADMIN_COOKIE}={ADMIN}"))
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_admin_cookie() {
    let (app, _api) = test_app().await;
    let request = form_post("/admin/login")
        .body(Body::from(format!("token={ADMIN}")))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("cookie")
        .to_str()
        .expect("ascii");
    assert!(cookie.starts_with(&format!("{ADMIN_COOKIE}=")));
    assert!(!cookie.contains(ADMIN));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie
        .split(';')
        .next()
        .expect("pair")
        .to_string();
    let request = Request::get("/admin")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let request = form_post("/admin/login")
        .body(Body::from("token=nope"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_save_and_delete_flow() {
    let (app, api) = test_app().await;
    let bearer = format!("Bearer {ADMIN}");

    let add_token = nonce::mint(&api.nonces, Identity::Admin, Action::AddBoard).expect("nonce");
    let request = Request::get(format!("/admin/boards/new?_nonce={add_token}"))
        .header(header::AUTHORIZATION, &bearer)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let boards = api.storage.list_boards().await.expect("list");
    assert_eq!(boards.len(), 1);
    let board = boards[0].id;
    assert_eq!(location(&response), format!("/admin?tab={}", board.0));

    let save_token =
        nonce::mint(&api.nonces, Identity::Admin, Action::SaveBoard(board)).expect("nonce");
    let request = form_post("/admin/boards/save")
        .header(header::AUTHORIZATION, &bearer)
        .body(Body::from(format!(
            "board_id={}&_nonce={save_token}&board_name=Friday&items_text=a%0Ab&rewards_text=Pizza&punishment_text=",
            board.0
        )))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/admin?tab={}&saved=1", board.0));
    let stored = api.storage.get_board(board).await.expect("get").expect("board");
    assert_eq!(stored.name, "Friday");
    assert_eq!(stored.items, "a\nb");

    api.storage
        .toggle_tile(board, TileIndex::try_from(0).expect("tile"))
        .await
        .expect("toggle");
    let request = form_post("/admin/boards/save")
        .header(header::AUTHORIZATION, &bearer)
        .body(Body::from(format!(
            "board_id={}&_nonce={save_token}&delete=1",
            board.0
        )))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin?tab=new");
    assert!(api.storage.get_board(board).await.expect("get").is_none());
    assert!(api
        .storage
        .list_active_tiles(board)
        .await
        .expect("active")
        .is_empty());
}

#[tokio::test]
async fn save_with_token_for_another_board_is_forbidden() {
    let (app, api) = test_app().await;
    let board_a = api.storage.create_board().await.expect("a");
    let board_b = api.storage.create_board().await.expect("b");
    api.storage
        .update_board(
            board_b,
            &BoardContent {
                name: "Keep".into(),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    let token_a =
        nonce::mint(&api.nonces, Identity::Admin, Action::SaveBoard(board_a)).expect("nonce");
    let request = form_post("/admin/boards/save")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .body(Body::from(format!(
            "board_id={}&_nonce={token_a}&board_name=Hijacked",
            board_b.0
        )))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = api.storage.get_board(board_b).await.expect("get").expect("board");
    assert_eq!(stored.name, "Keep");
}

#[tokio::test]
async fn list_route_returns_summaries() {
    let (app, api) = test_app().await;
    api.storage.create_board().await.expect("board");
    let request = Request::get("/boards").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let boards: Vec<BoardSummary> =
        serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0].name, "New Board");
}

#[tokio::test]
async fn assets_are_served_with_content_types() {
    let (app, _api) = test_app().await;
    let request = Request::get("/assets/bingo.js")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .expect("ascii")
        .starts_with("text/javascript"));

    let request = Request::get("/assets/bingo.css")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(body_text(response).await.contains(".bingo-board"));
}

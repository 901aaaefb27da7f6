//! ApiClient against a local stand-in for the Mattermost API

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;

use client::prelude::*;

const TOKEN: &str = "test-token";
const TEAMS_ETAG: &str = "\"teams-1\"";

#[derive(Default)]
struct ServerState {
    posts: Vec<Value>,
    views: Vec<Value>,
}

type Shared = Arc<Mutex<ServerState>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["login_id"] == "alice" && body["password"] == "hunter2" {
        (
            [("Token", TOKEN)],
            Json(json!({"id": "alice-id", "username": "alice", "email": "a@example.com"})),
        )
            .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "bad credentials").into_response()
    }
}

async fn teams(Path(user_id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let if_none_match = headers.get("if-none-match").and_then(|v| v.to_str().ok());
    if if_none_match == Some(TEAMS_ETAG) {
        return StatusCode::NOT_MODIFIED.into_response();
    }
    assert_eq!(user_id, "alice-id");
    (
        [("ETag", TEAMS_ETAG)],
        Json(json!([{"id": "t1", "name": "engineering", "display_name": "Engineering"}])),
    )
        .into_response()
}

async fn user(Path(user_id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match user_id.as_str() {
        "bob-id" => Json(json!({"id": "bob-id", "username": "bob"})).into_response(),
        "broken-id" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (StatusCode::NOT_FOUND, "no such user").into_response(),
    }
}

async fn create_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.lock().posts.push(body.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "newpost000001",
            "channel_id": body["channel_id"],
            "user_id": "alice-id",
            "create_at": 1_700_000_000_000i64,
            "message": body["message"],
        })),
    )
        .into_response()
}

async fn view(
    State(state): State<Shared>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    assert_eq!(user_id, "alice-id");
    state.lock().views.push(body);
    Json(json!({"status": "OK"})).into_response()
}

async fn unread(Path((_user_id, channel_id)): Path<(String, String)>) -> Response {
    assert_eq!(channel_id, "c1");
    Json(json!({
        "order": ["p2", "p1"],
        "posts": {
            "p1": {"id": "p1", "user_id": "bob-id", "create_at": 1, "message": "first"},
            "p2": {"id": "p2", "user_id": "bob-id", "create_at": 2, "message": "second"}
        }
    }))
    .into_response()
}

async fn spawn_server() -> (Url, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/api/v4/users/login", post(login))
        .route("/api/v4/users/:user_id", get(user))
        .route("/api/v4/users/:user_id/teams", get(teams))
        .route(
            "/api/v4/users/:user_id/channels/:channel_id/posts/unread",
            get(unread),
        )
        .route("/api/v4/channels/members/:user_id/view", post(view))
        .route("/api/v4/posts", post(create_post))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{}", addr)).unwrap(), state)
}

async fn logged_in() -> (ApiClient, Shared) {
    let (url, state) = spawn_server().await;
    let client = ApiClient::login(&ClientConfig::new(url), "alice", "hunter2")
        .await
        .unwrap();
    (client, state)
}

#[tokio::test]
async fn test_login_keeps_current_user() {
    let (client, _) = logged_in().await;
    assert_eq!(client.user().id, "alice-id");
    assert_eq!(client.user().username, "alice");
}

#[tokio::test]
async fn test_login_rejected() {
    let (url, _) = spawn_server().await;
    let err = ApiClient::login(&ClientConfig::new(url), "alice", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::HttpStatus(StatusCode::UNAUTHORIZED, _)));
}

#[tokio::test]
async fn test_teams_conditional_fetch() {
    let (client, _) = logged_in().await;

    let fetched = client.list_teams_for_user("alice-id", None).await.unwrap();
    let Fetched::Fresh { value, etag } = fetched else {
        panic!("expected a fresh team list");
    };
    assert_eq!(value.len(), 1);
    assert_eq!(value[0].name, "engineering");
    assert_eq!(etag.as_deref(), Some(TEAMS_ETAG));

    let again = client
        .list_teams_for_user("alice-id", Some(TEAMS_ETAG))
        .await
        .unwrap();
    assert_eq!(again, Fetched::NotModified);
}

#[tokio::test]
async fn test_get_user_not_found_is_distinguished() {
    let (client, _) = logged_in().await;

    assert_eq!(client.get_user("bob-id").await.unwrap().username, "bob");
    assert!(client.get_user("ghost-id").await.unwrap_err().is_not_found());

    let err = client.get_user("broken-id").await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_unread_window_and_mark_read() {
    let (client, state) = logged_in().await;

    let list = client.get_unread_window("alice-id", "c1").await.unwrap();
    assert_eq!(list.order, vec!["p2", "p1"]);

    client.mark_channel_read("alice-id", "c1").await.unwrap();
    let views = state.lock().views.clone();
    assert_eq!(views, vec![json!({"channel_id": "", "prev_channel_id": "c1"})]);
}

#[tokio::test]
async fn test_create_post_sends_message() {
    let (client, state) = logged_in().await;

    let created = client.create_post("c1", "hello team").await.unwrap();
    assert_eq!(created.message, "hello team");

    let posts = state.lock().posts.clone();
    assert_eq!(posts, vec![json!({"channel_id": "c1", "message": "hello team"})]);
}

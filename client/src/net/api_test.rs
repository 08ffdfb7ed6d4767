use super::*;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

// =============================================================
// Mock backend
// =============================================================

const GOOD_TOKEN: &str = "good-token";

fn profile_json() -> serde_json::Value {
    json!({
        "id": "6f1f7d8e-0000-0000-0000-000000000001",
        "telegram_id": 42,
        "first_name": "Alice",
        "last_name": null,
        "username": "alice",
        "photo_url": null,
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn mock_login(Json(body): Json<serde_json::Value>) -> Response {
    match body["hash"].as_str() {
        Some("good") => Json(json!({
            "success": true,
            "token": GOOD_TOKEN,
            "user": profile_json(),
            "expires_at": 1_900_000_000,
        }))
        .into_response(),
        Some("silent") => StatusCode::UNAUTHORIZED.into_response(),
        Some("boom") => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "database down" }))).into_response(),
        Some("soft") => Json(json!({ "success": false, "error": "Account disabled" })).into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "error": "Assertion expired" }))).into_response(),
    }
}

async fn mock_me(headers: HeaderMap) -> Response {
    let bearer_ok = header(&headers, "authorization") == Some("Bearer good-token");
    let guard_ok = header(&headers, "x-auth-token") == Some(GOOD_TOKEN);
    if bearer_ok && guard_ok {
        Json(json!({ "user": profile_json() })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "error": "Authentication required" }))).into_response()
    }
}

async fn mock_echo(headers: HeaderMap) -> Json<serde_json::Value> {
    Json(json!({
        "authorization": header(&headers, "authorization"),
        "x_auth_token": header(&headers, "x-auth-token"),
    }))
}

async fn mock_dashboard(headers: HeaderMap) -> Response {
    let has_cookie = header(&headers, "cookie").is_some_and(|c| c.contains("auth_token=good-token"));
    if has_cookie {
        "dashboard".into_response()
    } else {
        Redirect::temporary("/login").into_response()
    }
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/auth/telegram", post(mock_login))
        .route("/api/auth/me", get(mock_me))
        .route("/api/auth/logout", post(|| async { StatusCode::NO_CONTENT }))
        .route("/api/echo", get(mock_echo))
        .route("/api/forbidden", get(|| async { StatusCode::FORBIDDEN }))
        .route("/api/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, Json(json!({ "error": "short and stout" }))) }))
        .route("/dashboard", get(mock_dashboard));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn assertion(hash: &str) -> IdentityAssertion {
    IdentityAssertion {
        id: 42,
        first_name: "Alice".to_owned(),
        last_name: None,
        username: Some("alice".to_owned()),
        photo_url: None,
        auth_date: 1_700_000_000,
        hash: hash.to_owned(),
    }
}

// =============================================================
// Pure helpers
// =============================================================

#[test]
fn classify_status_maps_401_and_403_to_unauthorized() {
    assert_eq!(classify_status(401, None), ApiError::Unauthorized { status: 401 });
    assert_eq!(classify_status(403, Some("x".into())), ApiError::Unauthorized { status: 403 });
}

#[test]
fn classify_status_keeps_message_for_other_statuses() {
    assert_eq!(
        classify_status(500, Some("db".into())),
        ApiError::Status { status: 500, message: "db".into() }
    );
    assert_eq!(
        classify_status(404, None),
        ApiError::Status { status: 404, message: "request failed: 404".into() }
    );
}

#[test]
fn error_message_reads_error_field() {
    assert_eq!(error_message(r#"{"success":false,"error":"nope"}"#).as_deref(), Some("nope"));
    assert_eq!(error_message(r#"{"error":"  "}"#), None);
    assert_eq!(error_message("not json"), None);
}

#[test]
fn user_message_defaults_to_generic_failure() {
    assert_eq!(ApiError::Unauthorized { status: 401 }.user_message(), DEFAULT_AUTH_FAILURE);
    assert_eq!(ApiError::Decode("x".into()).user_message(), DEFAULT_AUTH_FAILURE);
    assert_eq!(ApiError::Rejected { message: "Stale".into() }.user_message(), "Stale");
}

#[test]
fn only_unauthorized_is_auth_failure() {
    assert!(ApiError::Unauthorized { status: 403 }.is_auth_failure());
    assert!(!ApiError::Network("down".into()).is_auth_failure());
    assert!(!ApiError::Rejected { message: "x".into() }.is_auth_failure());
}

#[test]
fn base_url_trailing_slash_is_trimmed() {
    let backend = HttpBackend::new("http://localhost:3000/").unwrap();
    assert_eq!(backend.base_url(), "http://localhost:3000");
    assert_eq!(backend.url("api/x"), "http://localhost:3000/api/x");
    assert_eq!(backend.url("/api/x"), "http://localhost:3000/api/x");
}

// =============================================================
// HttpBackend against a live mock
// =============================================================

#[tokio::test]
async fn login_success_returns_grant() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let grant = backend.login(&assertion("good")).await.unwrap();
    assert_eq!(grant.token, GOOD_TOKEN);
    assert_eq!(grant.user.telegram_id, 42);
    assert_eq!(grant.expires_at, Some(1_900_000_000));
}

#[tokio::test]
async fn login_rejection_carries_backend_message() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let err = backend.login(&assertion("stale")).await.unwrap_err();
    assert_eq!(err, ApiError::Rejected { message: "Assertion expired".into() });
}

#[tokio::test]
async fn login_rejection_without_body_uses_default_message() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let err = backend.login(&assertion("silent")).await.unwrap_err();
    assert_eq!(err.user_message(), DEFAULT_AUTH_FAILURE);
}

#[tokio::test]
async fn login_success_false_envelope_is_rejected() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let err = backend.login(&assertion("soft")).await.unwrap_err();
    assert_eq!(err, ApiError::Rejected { message: "Account disabled".into() });
}

#[tokio::test]
async fn login_server_error_is_status() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let err = backend.login(&assertion("boom")).await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 500, message: "database down".into() });
}

#[tokio::test]
async fn current_profile_sends_both_token_headers() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let user = backend.current_profile(GOOD_TOKEN).await.unwrap();
    assert_eq!(user.first_name, "Alice");
}

#[tokio::test]
async fn current_profile_with_bad_token_is_unauthorized() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let err = backend.current_profile("forged").await.unwrap_err();
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn logout_accepts_no_content() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    backend.logout(GOOD_TOKEN).await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let backend = HttpBackend::new(format!("http://{addr}")).unwrap();
    let err = backend.current_profile(GOOD_TOKEN).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
}

#[tokio::test]
async fn request_classifies_forbidden_and_other_statuses() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let err = backend.request(Method::GET, "/api/forbidden", None, None).await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized { status: 403 });
    let err = backend.request(Method::GET, "/api/teapot", None, None).await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 418, message: "short and stout".into() });
}

#[tokio::test]
async fn visit_does_not_follow_guard_redirects() {
    let backend = HttpBackend::new(spawn_backend().await).unwrap();
    let outcome = backend.visit("/dashboard", None).await.unwrap();
    assert_eq!(outcome.status, 307);
    assert!(outcome.is_redirect());
    assert_eq!(outcome.location.as_deref(), Some("/login"));
}

// =============================================================
// ApiClient
// =============================================================

#[tokio::test]
async fn api_client_attaches_stored_token() {
    let backend = Arc::new(HttpBackend::new(spawn_backend().await).unwrap());
    let tokens = Arc::new(SessionTokens::in_memory());
    tokens.set_session_token(GOOD_TOKEN).unwrap();
    let client = ApiClient::new(backend, tokens);

    let echoed = client.request(Method::GET, "/api/echo", None).await.unwrap();
    assert_eq!(echoed["authorization"], "Bearer good-token");
    assert_eq!(echoed["x_auth_token"], GOOD_TOKEN);
}

#[tokio::test]
async fn api_client_without_token_sends_no_auth_headers() {
    let backend = Arc::new(HttpBackend::new(spawn_backend().await).unwrap());
    let client = ApiClient::new(backend, Arc::new(SessionTokens::in_memory()));

    let echoed = client.request(Method::GET, "/api/echo", None).await.unwrap();
    assert!(echoed["authorization"].is_null());
    assert!(echoed["x_auth_token"].is_null());
}

#[tokio::test]
async fn api_client_visit_uses_guard_cookie() {
    let backend = Arc::new(HttpBackend::new(spawn_backend().await).unwrap());
    let tokens = Arc::new(SessionTokens::in_memory());
    tokens.set_session_token(GOOD_TOKEN).unwrap();
    let client = ApiClient::new(backend, tokens);

    let outcome = client.visit("/dashboard").await.unwrap();
    assert_eq!(outcome.status, 200);
    assert!(outcome.location.is_none());
}

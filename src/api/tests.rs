//! Router tests against the in-memory directory.

use super::{
    app,
    session::{SessionConfig, SessionStore},
};
use crate::directory::fake::{FakeDirectory, FakeEntry, OPERATORS, VIPS};
use crate::directory::DirectoryConfig;
use crate::notify::{fake::RecordingSender, Notifier};
use crate::portal::Portal;
use crate::record::RequestRecorder;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::{path::Path, sync::Arc};
use tower::ServiceExt;

fn directory() -> FakeDirectory {
    let mut alice = FakeEntry::operator("alice-pw");
    alice.mail = Some("alice@corp.example".to_string());
    let mut dave = FakeEntry::employee("E7", "IT");
    dave.password = "dave-pw".to_string();
    let mut vip = FakeEntry::employee("E1", "EXEC");
    vip.groups.push(VIPS.to_string());

    FakeDirectory::new()
        .with_entry("alice", alice)
        .with_entry("dave", dave)
        .with_entry("bob", FakeEntry::employee("E123", "FIN"))
        .with_entry("ceo", vip)
}

fn router(directory: &FakeDirectory, root: &Path) -> Result<Router> {
    let config = DirectoryConfig::new(
        "dc01.corp.example",
        "corp.example",
        "DC=corp,DC=example",
        OPERATORS,
        VIPS,
    )?;
    let portal = Portal::new(
        Arc::new(directory.clone()),
        Arc::new(config),
        RequestRecorder::new(root),
        Notifier::new(Arc::new(RecordingSender::default()), "ops@corp.example"),
    );
    Ok(app(
        Arc::new(portal),
        Arc::new(SessionStore::new(SessionConfig::new())),
    ))
}

fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn login(app: &Router, username: &str, password: &str) -> Result<Response> {
    let request = post_json(
        "/v1/auth/login",
        &json!({ "username": username, "password": password }),
    )?;
    Ok(app.clone().oneshot(request).await?)
}

fn session_token(response: &Response) -> Result<String> {
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("missing session cookie")?
        .to_str()?;
    cookie
        .strip_prefix("resetdesk_session=")
        .and_then(|rest| rest.split(';').next())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("unexpected cookie: {cookie}"))
}

fn reset_request(token: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/v1/resets")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, format!("resetdesk_session={token}"))
        .body(Body::from(serde_json::to_vec(body)?))?)
}

fn bob_request(password: &str) -> Value {
    json!({
        "user_sam_account_name": "bob",
        "employee_id": "E123",
        "service_code": "FIN",
        "password": password,
    })
}

#[tokio::test]
async fn login_sets_cookie_and_session_resolves() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;

    let response = login(&app, "alice", "alice-pw").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let token = session_token(&response)?;
    assert_eq!(
        json_body(response).await?,
        json!({ "username": "alice", "email": "alice@corp.example" })
    );

    let probe = Request::builder()
        .uri("/v1/auth/session")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = app.clone().oneshot(probe).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["username"], "alice");
    Ok(())
}

#[tokio::test]
async fn login_failures_map_to_status_codes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;

    let response = login(&app, "alice", "wrong").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());

    let response = login(&app, "dave", "dave-pw").await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(json_body(response).await?["reason"], "not-an-operator");

    let response = login(&app, "../etc", "x").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unreachable = router(&FakeDirectory::unreachable(), dir.path())?;
    let response = login(&unreachable, "alice", "alice-pw").await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn malformed_login_body_is_invalid_credentials() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // never reaches the directory, so an unreachable one still answers 401
    let app = router(&FakeDirectory::unreachable(), dir.path())?;

    for body in [
        json!({ "username": "alice" }),
        json!({ "username": 42, "password": "alice-pw" }),
    ] {
        let response = app.clone().oneshot(post_json("/v1/auth/login", &body)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(json_body(response).await?["reason"], "invalid-credentials");
    }
    Ok(())
}

#[tokio::test]
async fn session_probe_without_cookie_is_empty() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;

    let probe = Request::builder()
        .uri("/v1/auth/session")
        .body(Body::empty())?;
    let response = app.oneshot(probe).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn approved_reset_is_created() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;
    let token = session_token(&login(&app, "alice", "alice-pw").await?)?;

    let response = app
        .clone()
        .oneshot(reset_request(&token, &bob_request("alice-pw"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().get("x-request-id").is_some());

    let body = json_body(response).await?;
    assert_eq!(body["status"], "submitted");
    assert!(body.get("warning").is_none());
    let file_name = body["record"]["file_name"]
        .as_str()
        .context("missing file name")?;
    assert!(file_name.ends_with("_password_reset_alice_bob.json"));
    assert!(dir.path().join(file_name).exists());
    Ok(())
}

#[tokio::test]
async fn vip_target_is_unprocessable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;
    let token = session_token(&login(&app, "alice", "alice-pw").await?)?;

    let body = json!({
        "user_sam_account_name": "ceo",
        "employee_id": "E1",
        "service_code": "EXEC",
        "password": "alice-pw",
    });
    let response = app.oneshot(reset_request(&token, &body)?).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await?["reason"], "target-is-vip");
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn reset_requires_session_and_fresh_password() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;

    let response = app
        .clone()
        .oneshot(post_json("/v1/resets", &bob_request("alice-pw"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await?["reason"], "no-session");

    let token = session_token(&login(&app, "alice", "alice-pw").await?)?;
    let response = app
        .oneshot(reset_request(&token, &bob_request("stale"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await?["reason"], "invalid-credentials");
    Ok(())
}

#[tokio::test]
async fn malformed_payload_is_bad_request() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;
    let token = session_token(&login(&app, "alice", "alice-pw").await?)?;

    let missing_field = json!({ "user_sam_account_name": "bob", "password": "alice-pw" });
    let response = app
        .clone()
        .oneshot(reset_request(&token, &missing_field)?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let blank_service = json!({
        "user_sam_account_name": "bob",
        "employee_id": "E123",
        "service_code": "  ",
        "password": "alice-pw",
    });
    let response = app.oneshot(reset_request(&token, &blank_service)?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["reason"], "invalid-request");
    Ok(())
}

#[tokio::test]
async fn logout_ends_the_session() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;
    let token = session_token(&login(&app, "alice", "alice-pw").await?)?;

    let logout = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/logout")
        .header(COOKIE, format!("resetdesk_session={token}"))
        .body(Body::empty())?;
    let response = app.clone().oneshot(logout).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .context("missing cleared cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));

    let response = app
        .oneshot(reset_request(&token, &bob_request("alice-pw"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn request_id_is_kept_and_openapi_is_served() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = router(&directory(), dir.path())?;

    let request = Request::builder()
        .uri("/openapi.json")
        .header("x-request-id", "req-42")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-42")
    );
    let spec = json_body(response).await?;
    assert!(spec["paths"]["/v1/resets"].is_object());
    Ok(())
}

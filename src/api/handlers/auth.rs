//! Sponsor login, session probe and logout.

use super::{
    error_response, portal_error_response,
    types::{ErrorResponse, LoginRequest, SessionResponse},
};
use crate::api::session::{extract_session_token, SessionStore};
use crate::model::{AccountId, Credentials};
use crate::portal::{Portal, PortalError};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, error};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Sponsor authenticated, session cookie set", body = SessionResponse),
        (status = 401, description = "Invalid or malformed credentials", body = ErrorResponse),
        (status = 403, description = "Not a member of the operator group", body = ErrorResponse),
        (status = 502, description = "Unexpected directory error", body = ErrorResponse),
        (status = 503, description = "Directory unreachable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    portal: Extension<Arc<Portal>>,
    sessions: Extension<Arc<SessionStore>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    // Malformed bodies and names are reported like a bad password.
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("invalid login payload: {rejection}");
            return portal_error_response(&PortalError::AuthenticationRejected);
        }
    };
    let Ok(account) = AccountId::parse(&request.username) else {
        return portal_error_response(&PortalError::AuthenticationRejected);
    };
    let credentials = Credentials::new(account, SecretString::from(request.password));

    let sponsor = match portal.authenticate(&credentials).await {
        Ok(sponsor) => sponsor,
        Err(err) => return portal_error_response(&err),
    };

    let cookie = match sessions.create(sponsor.clone()).await {
        Ok(token) => sessions.cookie(&token),
        Err(err) => {
            error!("Failed to create session: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match cookie {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    (StatusCode::OK, headers, Json(SessionResponse::from(&sponsor))).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, sessions: Extension<Arc<SessionStore>>) -> Response {
    match sessions.authenticate(&headers).await {
        Some(sponsor) => (StatusCode::OK, Json(SessionResponse::from(&sponsor))).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, sessions: Extension<Arc<SessionStore>>) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        sessions.remove(&token).await;
    }

    // Always clear the cookie, even if the session was already gone.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = sessions.clear_cookie() {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// 401 body for requests that need a session and have none.
pub(crate) fn no_session() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "no-session",
        "Sign in before submitting a request.",
    )
}

use super::{
    auth::no_session,
    error_response, portal_error_response,
    types::{ErrorResponse, ResetResponse, ResetSubmission, SubmissionStatus},
};
use crate::api::session::SessionStore;
use crate::model::ResetRequest;
use crate::portal::{Portal, Submission};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;

#[utoipa::path(
    post,
    path = "/v1/resets",
    request_body = ResetSubmission,
    responses(
        (status = 201, description = "Request recorded", body = ResetResponse),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "No session or re-authentication failed", body = ErrorResponse),
        (status = 403, description = "Sponsor is not an operator", body = ErrorResponse),
        (status = 422, description = "Request rejected by an eligibility check", body = ErrorResponse),
        (status = 500, description = "Request could not be recorded", body = ErrorResponse),
        (status = 502, description = "Unexpected directory error", body = ErrorResponse),
        (status = 503, description = "Directory unreachable", body = ErrorResponse)
    ),
    tag = "resets"
)]
pub async fn create_reset(
    headers: HeaderMap,
    portal: Extension<Arc<Portal>>,
    sessions: Extension<Arc<SessionStore>>,
    payload: Result<Json<ResetSubmission>, JsonRejection>,
) -> Response {
    let Some(sponsor) = sessions.authenticate(&headers).await else {
        return no_session();
    };

    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            debug!("invalid reset payload: {rejection}");
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid-request",
                &rejection.body_text(),
            );
        }
    };

    let request = match ResetRequest::new(
        &submission.user_sam_account_name,
        &submission.employee_id,
        &submission.service_code,
    ) {
        Ok(request) => request,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid-request", &err.to_string())
        }
    };

    let secret = SecretString::from(submission.password);
    let response = match portal.submit(&sponsor, secret, &request).await {
        Ok(Submission::Submitted(record)) => ResetResponse {
            status: SubmissionStatus::Submitted,
            record,
            warning: None,
        },
        Ok(Submission::SubmittedWithWarning { receipt, warning }) => ResetResponse {
            status: SubmissionStatus::SubmittedWithWarning,
            record: receipt,
            warning: Some(warning),
        },
        Err(err) => return portal_error_response(&err),
    };

    (StatusCode::CREATED, Json(response)).into_response()
}

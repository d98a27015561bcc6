use crate::model::Sponsor;
use crate::record::RecordReceipt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub username: String,
    pub email: String,
}

impl From<&Sponsor> for SessionResponse {
    fn from(sponsor: &Sponsor) -> Self {
        Self {
            username: sponsor.account.to_string(),
            email: sponsor.email.clone(),
        }
    }
}

/// Reset submission; `password` re-authenticates the sponsor.
#[derive(Deserialize, ToSchema)]
pub struct ResetSubmission {
    pub user_sam_account_name: String,
    pub employee_id: String,
    pub service_code: String,
    pub password: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    SubmittedWithWarning,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    pub status: SubmissionStatus,
    pub record: RecordReceipt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub reason: String,
    pub message: String,
}

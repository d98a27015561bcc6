//! The ordered gate a reset request must pass.
//!
//! Gates run in a fixed order and the first failure wins:
//!
//! 1. the target account exists,
//! 2. the target is not a VIP or privileged account,
//! 3. the employee id belongs to the target,
//! 4. the service code matches the target's department.
//!
//! Operator membership of the sponsor is checked at login and again on
//! submission, before these gates run.

use crate::directory::{DirectoryError, IdentityQueries};
use crate::model::ResetRequest;
use serde::Serialize;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    TargetNotFound,
    TargetIsVip,
    EmployeeIdMismatch,
    DepartmentMismatch,
    NotAnOperator,
}

impl Rejection {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::TargetNotFound => "target-not-found",
            Self::TargetIsVip => "target-is-vip",
            Self::EmployeeIdMismatch => "employee-id-mismatch",
            Self::DepartmentMismatch => "department-mismatch",
            Self::NotAnOperator => "not-an-operator",
        }
    }

    /// User-facing reason.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::TargetNotFound => "The user account does not exist.",
            Self::TargetIsVip => {
                "Password resets for VIP or administrator accounts cannot be requested here."
            }
            Self::EmployeeIdMismatch => "The employee ID does not match the user account.",
            Self::DepartmentMismatch => "The service code does not match the user's department.",
            Self::NotAnOperator => "You are not authorized to sponsor password resets.",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Rejected(Rejection),
}

/// Run the gates against an open session.
///
/// # Errors
/// Only session-level directory failures are returned; query failures have
/// already been folded into negative answers by the session.
#[instrument(skip_all, fields(target = %request.target))]
pub async fn evaluate(
    directory: &mut dyn IdentityQueries,
    request: &ResetRequest,
) -> Result<Verdict, DirectoryError> {
    let target = &request.target;

    if !directory.exists(target).await? {
        return Ok(reject(Rejection::TargetNotFound));
    }
    debug!("target exists");

    if directory.is_vip(target).await? {
        return Ok(reject(Rejection::TargetIsVip));
    }
    debug!("target is not privileged");

    if !directory
        .employee_id_matches(target, &request.employee_id)
        .await?
    {
        return Ok(reject(Rejection::EmployeeIdMismatch));
    }
    debug!("employee id matches");

    if !directory
        .department_matches(target, &request.service_code)
        .await?
    {
        return Ok(reject(Rejection::DepartmentMismatch));
    }

    info!("reset request is eligible");
    Ok(Verdict::Eligible)
}

fn reject(rejection: Rejection) -> Verdict {
    info!(reason = rejection.code(), "reset request rejected");
    Verdict::Rejected(rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::fake::{FakeDirectory, FakeEntry, VIPS};
    use anyhow::Result;

    fn request(employee_id: &str, service_code: &str) -> Result<ResetRequest> {
        Ok(ResetRequest::new("bob", employee_id, service_code)?)
    }

    fn bob() -> FakeEntry {
        FakeEntry::employee("E123", "FIN")
    }

    #[tokio::test]
    async fn all_gates_pass() -> Result<()> {
        let directory = FakeDirectory::new().with_entry("bob", bob());
        let verdict = evaluate(&mut directory.session(), &request("E123", "FIN")?).await?;
        assert_eq!(verdict, Verdict::Eligible);
        assert_eq!(
            directory.calls(),
            vec![
                "exists:bob",
                "is_vip:bob",
                "employee_id_matches:bob",
                "department_matches:bob"
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_target_stops_at_first_gate() -> Result<()> {
        let directory = FakeDirectory::new();
        let verdict = evaluate(&mut directory.session(), &request("E123", "FIN")?).await?;
        assert_eq!(verdict, Verdict::Rejected(Rejection::TargetNotFound));
        assert_eq!(directory.calls(), vec!["exists:bob"]);
        Ok(())
    }

    #[tokio::test]
    async fn vip_group_blocks_regardless_of_other_fields() -> Result<()> {
        let mut entry = bob();
        entry.groups.push(VIPS.to_string());
        let directory = FakeDirectory::new().with_entry("bob", entry);
        let verdict = evaluate(&mut directory.session(), &request("E123", "FIN")?).await?;
        assert_eq!(verdict, Verdict::Rejected(Rejection::TargetIsVip));
        assert_eq!(directory.calls(), vec!["exists:bob", "is_vip:bob"]);
        Ok(())
    }

    #[tokio::test]
    async fn privilege_marker_alone_blocks() -> Result<()> {
        let mut entry = bob();
        entry.privileged = true;
        let directory = FakeDirectory::new().with_entry("bob", entry);
        let verdict = evaluate(&mut directory.session(), &request("WRONG", "HR")?).await?;
        assert_eq!(verdict, Verdict::Rejected(Rejection::TargetIsVip));
        Ok(())
    }

    #[tokio::test]
    async fn employee_mismatch_never_reaches_department() -> Result<()> {
        let directory = FakeDirectory::new().with_entry("bob", bob());
        let verdict = evaluate(&mut directory.session(), &request("E999", "FIN")?).await?;
        assert_eq!(verdict, Verdict::Rejected(Rejection::EmployeeIdMismatch));
        assert!(!directory
            .calls()
            .iter()
            .any(|call| call.starts_with("department_matches")));
        Ok(())
    }

    #[tokio::test]
    async fn department_mismatch_is_last_gate() -> Result<()> {
        let directory =
            FakeDirectory::new().with_entry("bob", FakeEntry::employee("E123", "HR"));
        let verdict = evaluate(&mut directory.session(), &request("E123", "FIN")?).await?;
        assert_eq!(verdict, Verdict::Rejected(Rejection::DepartmentMismatch));
        Ok(())
    }

    #[tokio::test]
    async fn department_comparison_is_case_sensitive() -> Result<()> {
        let directory = FakeDirectory::new().with_entry("bob", bob());
        let verdict = evaluate(&mut directory.session(), &request("E123", "fin")?).await?;
        assert_eq!(verdict, Verdict::Rejected(Rejection::DepartmentMismatch));
        Ok(())
    }

    #[tokio::test]
    async fn session_failure_propagates() -> Result<()> {
        let directory = FakeDirectory::new()
            .with_entry("bob", bob())
            .dropping_on("is_vip");
        let result = evaluate(&mut directory.session(), &request("E123", "FIN")?).await;
        assert!(matches!(result, Err(DirectoryError::Connection(_))));
        Ok(())
    }

    #[test]
    fn rejection_codes_serialize_as_kebab_case() -> Result<()> {
        for rejection in [
            Rejection::TargetNotFound,
            Rejection::TargetIsVip,
            Rejection::EmployeeIdMismatch,
            Rejection::DepartmentMismatch,
            Rejection::NotAnOperator,
        ] {
            assert_eq!(serde_json::to_value(rejection)?, rejection.code());
        }
        Ok(())
    }
}

//! Sponsor login and reset submission.
//!
//! Every call opens its own directory session with the sponsor's credentials
//! and closes it before returning. Submission asks for the sponsor's password
//! again instead of reusing anything from the web session.

use crate::directory::{DirectoryConfig, DirectoryConnector, DirectoryError, IdentityQueries};
use crate::eligibility::{self, Rejection, Verdict};
use crate::model::{AccountId, Credentials, ResetRequest, Sponsor};
use crate::notify::Notifier;
use crate::record::{RecordError, RecordReceipt, RequestRecorder};
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("directory unreachable: {0}")]
    ConnectionFailure(String),
    #[error("directory error: {0}")]
    Directory(String),
    #[error("authentication rejected")]
    AuthenticationRejected,
    #[error("request rejected: {}", .0.code())]
    EligibilityRejected(Rejection),
    #[error("failed to persist reset request: {0}")]
    PersistenceFailure(#[from] RecordError),
}

impl From<DirectoryError> for PortalError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Connection(reason) => Self::ConnectionFailure(reason),
            DirectoryError::AuthenticationRejected => Self::AuthenticationRejected,
            DirectoryError::Protocol(reason) => Self::Directory(reason),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Submitted(RecordReceipt),
    /// Recorded, but the notification could not be delivered.
    SubmittedWithWarning {
        receipt: RecordReceipt,
        warning: String,
    },
}

impl Submission {
    #[must_use]
    pub fn receipt(&self) -> &RecordReceipt {
        match self {
            Self::Submitted(receipt) | Self::SubmittedWithWarning { receipt, .. } => receipt,
        }
    }
}

#[derive(Clone)]
pub struct Portal {
    connector: Arc<dyn DirectoryConnector>,
    directory: Arc<DirectoryConfig>,
    recorder: RequestRecorder,
    notifier: Notifier,
}

impl Portal {
    #[must_use]
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        directory: Arc<DirectoryConfig>,
        recorder: RequestRecorder,
        notifier: Notifier,
    ) -> Self {
        Self {
            connector,
            directory,
            recorder,
            notifier,
        }
    }

    /// Bind as the sponsor and confirm operator membership.
    ///
    /// # Errors
    /// `AuthenticationRejected` for bad credentials,
    /// `EligibilityRejected(NotAnOperator)` outside the operator group, and
    /// `ConnectionFailure` when the directory cannot be reached.
    #[instrument(skip_all, fields(account = %credentials.account()))]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Sponsor, PortalError> {
        let mut session = self.connector.open(credentials).await?;
        let sponsor = self.sponsor(session.as_mut(), credentials.account()).await;
        session.close().await;

        let sponsor = sponsor?;
        info!(email = %sponsor.email, "sponsor authenticated");
        Ok(sponsor)
    }

    /// Re-authenticate the sponsor, run the eligibility gates, then record and
    /// notify.
    ///
    /// # Errors
    /// Any `PortalError`; a notification failure is not an error but a
    /// `Submission::SubmittedWithWarning`.
    #[instrument(skip_all, fields(sponsor = %sponsor.account, target = %request.target))]
    pub async fn submit(
        &self,
        sponsor: &Sponsor,
        secret: SecretString,
        request: &ResetRequest,
    ) -> Result<Submission, PortalError> {
        let credentials = Credentials::new(sponsor.account.clone(), secret);
        let mut session = self.connector.open(&credentials).await?;
        let verdict = self.verify(session.as_mut(), &sponsor.account, request).await;
        session.close().await;

        if let Verdict::Rejected(rejection) = verdict? {
            return Err(PortalError::EligibilityRejected(rejection));
        }

        let receipt = self.recorder.record(sponsor, request).await?;

        match self.notifier.notify(sponsor, request).await {
            Ok(()) => Ok(Submission::Submitted(receipt)),
            Err(err) => {
                warn!(file = %receipt.file_name, "reset recorded without notification");
                Ok(Submission::SubmittedWithWarning {
                    receipt,
                    warning: err.to_string(),
                })
            }
        }
    }

    async fn sponsor(
        &self,
        session: &mut dyn IdentityQueries,
        account: &AccountId,
    ) -> Result<Sponsor, PortalError> {
        if !session
            .is_member_of_group(account, self.directory.operator_group())
            .await?
        {
            info!("sponsor is not an operator");
            return Err(PortalError::EligibilityRejected(Rejection::NotAnOperator));
        }

        let email = session
            .email_address(account)
            .await?
            .unwrap_or_else(|| self.directory.fallback_email(account.as_str()));

        Ok(Sponsor {
            account: account.clone(),
            email,
        })
    }

    async fn verify(
        &self,
        session: &mut dyn IdentityQueries,
        sponsor: &AccountId,
        request: &ResetRequest,
    ) -> Result<Verdict, DirectoryError> {
        if !session
            .is_member_of_group(sponsor, self.directory.operator_group())
            .await?
        {
            return Ok(Verdict::Rejected(Rejection::NotAnOperator));
        }
        eligibility::evaluate(session, request).await
    }
}

//! Directory access: session opening and the fixed identity queries.
//!
//! A session is opened per request with the caller's own credentials and
//! dropped afterwards; nothing is pooled.
//!
//! ## Fail-closed queries
//!
//! Query methods return the *negative* result when the directory answers with
//! an unexpected error: `false` for the positive checks, and `true` for
//! [`IdentityQueries::is_vip`], whose negative outcome is "do not proceed".
//! Only session-level failures (I/O, timeouts, a closed connection) surface as
//! [`DirectoryError::Connection`].

pub mod config;
pub mod filter;
pub mod ldap;

#[cfg(test)]
pub(crate) mod fake;

use crate::model::{AccountId, Credentials};
use async_trait::async_trait;
use thiserror::Error;

pub use config::{DirectoryConfig, RetryPolicy};
pub use ldap::LdapConnector;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Unreachable after retries, or the session dropped mid-query.
    #[error("directory unreachable: {0}")]
    Connection(String),
    /// The directory was reached and refused the credentials.
    #[error("invalid credentials")]
    AuthenticationRejected,
    /// Non-transient failure while connecting; never retried.
    #[error("directory error: {0}")]
    Protocol(String),
}

/// Opens authenticated directory sessions.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Open a session bound as `credentials`.
    ///
    /// # Errors
    /// `AuthenticationRejected` for refused or empty credentials, `Connection`
    /// once transient connect failures exhaust the retry policy, `Protocol`
    /// for anything else.
    async fn open(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn IdentityQueries>, DirectoryError>;
}

/// The read-only lookups available on an open session.
#[async_trait]
pub trait IdentityQueries: Send {
    async fn exists(&mut self, account: &AccountId) -> Result<bool, DirectoryError>;

    /// Single search on the conjunction of account and employee id.
    async fn employee_id_matches(
        &mut self,
        account: &AccountId,
        employee_id: &str,
    ) -> Result<bool, DirectoryError>;

    /// Case-sensitive equality against the entry's `department`.
    async fn department_matches(
        &mut self,
        account: &AccountId,
        service_code: &str,
    ) -> Result<bool, DirectoryError>;

    async fn is_member_of_group(
        &mut self,
        account: &AccountId,
        group_dn: &str,
    ) -> Result<bool, DirectoryError>;

    /// VIP group member OR privilege marker equal to the sentinel.
    async fn is_vip(&mut self, account: &AccountId) -> Result<bool, DirectoryError>;

    async fn email_address(&mut self, account: &AccountId)
        -> Result<Option<String>, DirectoryError>;

    /// Unbind; failures are only logged.
    async fn close(&mut self);
}

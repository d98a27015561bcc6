//! Request-scoped values shared by the directory, pipeline and recorder.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_FIELD_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("invalid account identifier")]
    AccountId,
    #[error("missing or invalid employee identifier")]
    EmployeeId,
    #[error("missing or invalid service code")]
    ServiceCode,
}

/// A directory account name (`sAMAccountName`).
///
/// Only `[A-Za-z0-9._-]` is accepted, starting with an alphanumeric, so the
/// value is also safe as a filename component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// # Errors
    /// Returns `InvalidInput::AccountId` if the value is empty, too long or
    /// contains characters outside the accepted set.
    pub fn parse(raw: &str) -> Result<Self, InvalidInput> {
        let trimmed = raw.trim();
        if trimmed.len() > MAX_FIELD_LEN {
            return Err(InvalidInput::AccountId);
        }
        let valid = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$")
            .is_ok_and(|regex| regex.is_match(trimmed));
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidInput::AccountId)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// Account name and password, held only for the duration of a bind.
#[derive(Clone)]
pub struct Credentials {
    account: AccountId,
    secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(account: AccountId, secret: SecretString) -> Self {
        Self { account, secret }
    }

    #[must_use]
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn has_secret(&self) -> bool {
        !self.secret.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("secret", &"***")
            .finish()
    }
}

/// The authenticated operator filing a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsor {
    pub account: AccountId,
    pub email: String,
}

/// A reset request as supplied by the sponsor, after input validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetRequest {
    pub target: AccountId,
    pub employee_id: String,
    pub service_code: String,
}

impl ResetRequest {
    /// # Errors
    /// Returns the first field that fails validation.
    pub fn new(target: &str, employee_id: &str, service_code: &str) -> Result<Self, InvalidInput> {
        let target = AccountId::parse(target)?;
        let employee_id = required_field(employee_id).ok_or(InvalidInput::EmployeeId)?;
        let service_code = required_field(service_code).ok_or(InvalidInput::ServiceCode)?;

        Ok(Self {
            target,
            employee_id,
            service_code,
        })
    }
}

fn required_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_FIELD_LEN {
        None
    } else {
        Some(trimmed.to_string())
    }
}

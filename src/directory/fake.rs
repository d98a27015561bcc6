//! In-memory directory for unit tests.

use super::{DirectoryConnector, DirectoryError, IdentityQueries};
use crate::model::{AccountId, Credentials};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

pub(crate) const OPERATORS: &str = "CN=Operators,OU=Groups,DC=corp,DC=example";
pub(crate) const VIPS: &str = "CN=VIP,OU=Groups,DC=corp,DC=example";

#[derive(Clone, Debug, Default)]
pub(crate) struct FakeEntry {
    pub password: String,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub groups: Vec<String>,
    pub privileged: bool,
    pub mail: Option<String>,
}

impl FakeEntry {
    pub(crate) fn operator(password: &str) -> Self {
        Self {
            password: password.to_string(),
            groups: vec![OPERATORS.to_string()],
            ..Self::default()
        }
    }

    pub(crate) fn employee(employee_id: &str, department: &str) -> Self {
        Self {
            password: "unused".to_string(),
            employee_id: Some(employee_id.to_string()),
            department: Some(department.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeDirectory {
    entries: Arc<Mutex<HashMap<String, FakeEntry>>>,
    calls: Arc<Mutex<Vec<String>>>,
    unreachable: bool,
    drops_on: Option<&'static str>,
}

impl FakeDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// The session drops when `query` runs.
    pub(crate) fn dropping_on(self, query: &'static str) -> Self {
        Self {
            drops_on: Some(query),
            ..self
        }
    }

    pub(crate) fn with_entry(self, account: &str, entry: FakeEntry) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(account.to_string(), entry);
        }
        self
    }

    /// Query names in call order, e.g. `exists:bob`.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub(crate) fn session(&self) -> FakeSession {
        FakeSession {
            directory: self.clone(),
        }
    }

    fn entry(&self, account: &AccountId) -> Option<FakeEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(account.as_str()).cloned())
    }

    fn record(&self, call: &'static str, account: &AccountId) -> Result<(), DirectoryError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{call}:{account}"));
        }
        if self.drops_on == Some(call) {
            return Err(DirectoryError::Connection("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn open(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn IdentityQueries>, DirectoryError> {
        if self.unreachable {
            return Err(DirectoryError::Connection("connection refused".to_string()));
        }
        let password = credentials.secret().expose_secret();
        match self.entry(credentials.account()) {
            Some(entry) if !password.is_empty() && entry.password == password => {
                Ok(Box::new(self.session()))
            }
            _ => Err(DirectoryError::AuthenticationRejected),
        }
    }
}

pub(crate) struct FakeSession {
    directory: FakeDirectory,
}

#[async_trait]
impl IdentityQueries for FakeSession {
    async fn exists(&mut self, account: &AccountId) -> Result<bool, DirectoryError> {
        self.directory.record("exists", account)?;
        Ok(self.directory.entry(account).is_some())
    }

    async fn employee_id_matches(
        &mut self,
        account: &AccountId,
        employee_id: &str,
    ) -> Result<bool, DirectoryError> {
        self.directory.record("employee_id_matches", account)?;
        Ok(self
            .directory
            .entry(account)
            .and_then(|entry| entry.employee_id)
            .is_some_and(|id| id == employee_id))
    }

    async fn department_matches(
        &mut self,
        account: &AccountId,
        service_code: &str,
    ) -> Result<bool, DirectoryError> {
        self.directory.record("department_matches", account)?;
        Ok(self
            .directory
            .entry(account)
            .and_then(|entry| entry.department)
            .is_some_and(|department| department == service_code))
    }

    async fn is_member_of_group(
        &mut self,
        account: &AccountId,
        group_dn: &str,
    ) -> Result<bool, DirectoryError> {
        self.directory.record("is_member_of_group", account)?;
        Ok(self
            .directory
            .entry(account)
            .is_some_and(|entry| entry.groups.iter().any(|group| group == group_dn)))
    }

    async fn is_vip(&mut self, account: &AccountId) -> Result<bool, DirectoryError> {
        self.directory.record("is_vip", account)?;
        Ok(self.directory.entry(account).is_some_and(|entry| {
            entry.privileged || entry.groups.iter().any(|group| group == VIPS)
        }))
    }

    async fn email_address(
        &mut self,
        account: &AccountId,
    ) -> Result<Option<String>, DirectoryError> {
        self.directory.record("email_address", account)?;
        Ok(self.directory.entry(account).and_then(|entry| entry.mail))
    }

    async fn close(&mut self) {}
}

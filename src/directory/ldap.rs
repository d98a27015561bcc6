//! `ldap3`-backed connector and session.

use super::{
    filter, DirectoryConfig, DirectoryConnector, DirectoryError, IdentityQueries, RetryPolicy,
};
use crate::model::{AccountId, Credentials};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use secrecy::ExposeSecret;
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

type Attributes = HashMap<String, Vec<String>>;

/// A failed directory operation, split by whether the connection survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    /// Socket-level: refused, timed out, or the stream closed.
    Session(String),
    /// The server answered with an error.
    Query(String),
}

impl From<LdapError> for Failure {
    fn from(err: LdapError) -> Self {
        match &err {
            LdapError::Io { .. }
            | LdapError::Timeout { .. }
            | LdapError::EndOfStream
            | LdapError::ResultRecv { .. }
            | LdapError::OpSend { .. } => Self::Session(err.to_string()),
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Run `connect` until it succeeds, retrying only session failures.
pub(crate) async fn connect_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut connect: F,
) -> Result<T, DirectoryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let mut attempt = 1;
    loop {
        debug!(
            attempt,
            max_attempts = policy.max_attempts(),
            "connecting to directory"
        );
        match connect(attempt).await {
            Ok(connection) => return Ok(connection),
            Err(Failure::Session(reason)) if attempt < policy.max_attempts() => {
                warn!(
                    attempt,
                    %reason,
                    "directory connection failed, retrying in {:?}",
                    policy.delay()
                );
                sleep(policy.delay()).await;
                attempt += 1;
            }
            Err(Failure::Session(reason)) => {
                error!(attempts = attempt, %reason, "directory unreachable");
                return Err(DirectoryError::Connection(reason));
            }
            Err(Failure::Query(reason)) => {
                error!(%reason, "directory connection error");
                return Err(DirectoryError::Protocol(reason));
            }
        }
    }
}

/// Apply the fail-closed contract to a query result.
fn settle(
    check: &'static str,
    result: Result<bool, Failure>,
    on_failure: bool,
) -> Result<bool, DirectoryError> {
    match result {
        Ok(hit) => Ok(hit),
        Err(Failure::Session(reason)) => Err(DirectoryError::Connection(reason)),
        Err(Failure::Query(reason)) => {
            warn!(check, %reason, result = on_failure, "directory query failed");
            Ok(on_failure)
        }
    }
}

/// Attribute names come back in server casing.
fn values<'a>(attributes: &'a Attributes, name: &str) -> &'a [String] {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map_or(&[][..], |(_, values)| values.as_slice())
}

fn contains_dn(groups: &[String], group_dn: &str) -> bool {
    let group_dn = group_dn.trim();
    groups
        .iter()
        .any(|group| group.trim().eq_ignore_ascii_case(group_dn))
}

fn is_privileged(attributes: &Attributes, config: &DirectoryConfig) -> bool {
    contains_dn(values(attributes, filter::MEMBER_OF), config.vip_group())
        || values(attributes, config.privilege_attribute())
            .iter()
            .any(|value| value == config.privilege_sentinel())
}

pub struct LdapConnector {
    config: Arc<DirectoryConfig>,
}

impl LdapConnector {
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap, Failure> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connect_timeout())
            .set_no_tls_verify(self.config.no_tls_verify());

        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url()).await?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(error = %err, "directory connection driver error");
            }
        });

        Ok(ldap)
    }
}

impl std::fmt::Debug for LdapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnector")
            .field("url", &self.config.url())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    #[instrument(skip_all, fields(account = %credentials.account()))]
    async fn open(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn IdentityQueries>, DirectoryError> {
        // An empty simple bind is an anonymous bind and would "succeed".
        if !credentials.has_secret() {
            debug!("empty password refused before bind");
            return Err(DirectoryError::AuthenticationRejected);
        }

        let mut ldap = connect_with_retry(self.config.retry(), |_| self.connect()).await?;

        let bind_name = self.config.bind_name(credentials.account().as_str());
        debug!(%bind_name, "binding to directory");

        let bind = ldap
            .with_timeout(self.config.receive_timeout())
            .simple_bind(&bind_name, credentials.secret().expose_secret())
            .await;

        match bind {
            Ok(result) if result.rc == 0 => {
                info!("directory bind succeeded");
                Ok(Box::new(LdapSession {
                    ldap,
                    config: Arc::clone(&self.config),
                }))
            }
            Ok(result) => {
                debug!(rc = result.rc, text = %result.text, "directory bind rejected");
                if let Err(err) = ldap.unbind().await {
                    debug!(error = %err, "unbind after rejected bind failed");
                }
                Err(DirectoryError::AuthenticationRejected)
            }
            Err(err) => match Failure::from(err) {
                Failure::Session(reason) => Err(DirectoryError::Connection(reason)),
                Failure::Query(reason) => Err(DirectoryError::Protocol(reason)),
            },
        }
    }
}

pub struct LdapSession {
    ldap: Ldap,
    config: Arc<DirectoryConfig>,
}

impl LdapSession {
    async fn search(
        &mut self,
        search_filter: &str,
        attributes: Vec<&str>,
    ) -> Result<Vec<Attributes>, Failure> {
        debug!(
            filter = search_filter,
            base = self.config.search_base(),
            "directory search"
        );

        let (entries, _result) = self
            .ldap
            .with_timeout(self.config.receive_timeout())
            .search(
                self.config.search_base(),
                Scope::Subtree,
                search_filter,
                attributes,
            )
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_ref())
            .map(|entry| SearchEntry::construct(entry).attrs)
            .collect())
    }

    async fn lookup(
        &mut self,
        account: &AccountId,
        attributes: Vec<&str>,
    ) -> Result<Option<Attributes>, Failure> {
        let entries = self
            .search(&filter::account(account.as_str()), attributes)
            .await?;
        Ok(entries.into_iter().next())
    }
}

#[async_trait]
impl IdentityQueries for LdapSession {
    #[instrument(skip(self))]
    async fn exists(&mut self, account: &AccountId) -> Result<bool, DirectoryError> {
        let found = self
            .search(&filter::account(account.as_str()), vec![filter::ACCOUNT])
            .await
            .map(|entries| !entries.is_empty());
        settle("exists", found, false)
    }

    #[instrument(skip(self, employee_id))]
    async fn employee_id_matches(
        &mut self,
        account: &AccountId,
        employee_id: &str,
    ) -> Result<bool, DirectoryError> {
        let search_filter =
            filter::account_with(account.as_str(), filter::EMPLOYEE_ID, employee_id);
        let found = self
            .search(&search_filter, vec![filter::ACCOUNT])
            .await
            .map(|entries| !entries.is_empty());
        settle("employee_id_matches", found, false)
    }

    #[instrument(skip(self))]
    async fn department_matches(
        &mut self,
        account: &AccountId,
        service_code: &str,
    ) -> Result<bool, DirectoryError> {
        let matched = self
            .lookup(account, vec![filter::DEPARTMENT])
            .await
            .map(|entry| {
                entry.is_some_and(|attributes| {
                    values(&attributes, filter::DEPARTMENT)
                        .iter()
                        .any(|department| department == service_code)
                })
            });
        settle("department_matches", matched, false)
    }

    #[instrument(skip(self))]
    async fn is_member_of_group(
        &mut self,
        account: &AccountId,
        group_dn: &str,
    ) -> Result<bool, DirectoryError> {
        let member = self
            .lookup(account, vec![filter::MEMBER_OF])
            .await
            .map(|entry| {
                entry.is_some_and(|attributes| {
                    contains_dn(values(&attributes, filter::MEMBER_OF), group_dn)
                })
            });
        settle("is_member_of_group", member, false)
    }

    #[instrument(skip(self))]
    async fn is_vip(&mut self, account: &AccountId) -> Result<bool, DirectoryError> {
        let config = Arc::clone(&self.config);
        let flagged = self
            .lookup(
                account,
                vec![filter::MEMBER_OF, config.privilege_attribute()],
            )
            .await
            .map(|entry| entry.is_some_and(|attributes| is_privileged(&attributes, &config)));
        settle("is_vip", flagged, true)
    }

    #[instrument(skip(self))]
    async fn email_address(
        &mut self,
        account: &AccountId,
    ) -> Result<Option<String>, DirectoryError> {
        match self.lookup(account, vec![filter::MAIL]).await {
            Ok(entry) => Ok(entry.and_then(|attributes| {
                values(&attributes, filter::MAIL)
                    .first()
                    .map(|mail| mail.trim().to_string())
                    .filter(|mail| !mail.is_empty())
            })),
            Err(Failure::Session(reason)) => Err(DirectoryError::Connection(reason)),
            Err(Failure::Query(reason)) => {
                warn!(%reason, "mail lookup failed");
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.ldap.unbind().await {
            debug!(error = %err, "directory unbind failed");
        }
    }
}

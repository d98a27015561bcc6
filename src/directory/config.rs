//! Directory endpoint and policy settings, built once at startup.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;
const DEFAULT_PRIVILEGE_ATTRIBUTE: &str = "adminCount";
const DEFAULT_PRIVILEGE_SENTINEL: &str = "1";
const LDAPS_PORT: u16 = 636;

/// Fixed-delay retry applied to transient connect failures only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
        )
    }
}

#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    url: String,
    domain: String,
    search_base: String,
    operator_group: String,
    vip_group: String,
    privilege_attribute: String,
    privilege_sentinel: String,
    email_domain: String,
    connect_timeout: Duration,
    receive_timeout: Duration,
    retry: RetryPolicy,
    no_tls_verify: bool,
}

impl DirectoryConfig {
    /// # Errors
    /// Returns an error if `server` is not a usable `ldaps://` endpoint.
    pub fn new(
        server: &str,
        domain: &str,
        search_base: &str,
        operator_group: &str,
        vip_group: &str,
    ) -> Result<Self> {
        Ok(Self {
            url: server_url(server)?,
            domain: domain.trim().to_string(),
            search_base: search_base.to_string(),
            operator_group: operator_group.to_string(),
            vip_group: vip_group.to_string(),
            privilege_attribute: DEFAULT_PRIVILEGE_ATTRIBUTE.to_string(),
            privilege_sentinel: DEFAULT_PRIVILEGE_SENTINEL.to_string(),
            email_domain: domain.trim().to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            receive_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            retry: RetryPolicy::default(),
            no_tls_verify: false,
        })
    }

    #[must_use]
    pub fn with_privilege_marker(mut self, attribute: String, sentinel: String) -> Self {
        self.privilege_attribute = attribute;
        self.privilege_sentinel = sentinel;
        self
    }

    #[must_use]
    pub fn with_email_domain(mut self, email_domain: &str) -> Self {
        self.email_domain = email_domain.trim().trim_start_matches('@').to_string();
        self
    }

    #[must_use]
    pub fn with_connect_timeout_seconds(mut self, seconds: u64) -> Self {
        self.connect_timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_receive_timeout_seconds(mut self, seconds: u64) -> Self {
        self.receive_timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_no_tls_verify(mut self, no_tls_verify: bool) -> Self {
        self.no_tls_verify = no_tls_verify;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn search_base(&self) -> &str {
        &self.search_base
    }

    #[must_use]
    pub fn operator_group(&self) -> &str {
        &self.operator_group
    }

    #[must_use]
    pub fn vip_group(&self) -> &str {
        &self.vip_group
    }

    #[must_use]
    pub fn privilege_attribute(&self) -> &str {
        &self.privilege_attribute
    }

    #[must_use]
    pub fn privilege_sentinel(&self) -> &str {
        &self.privilege_sentinel
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    #[must_use]
    pub fn no_tls_verify(&self) -> bool {
        self.no_tls_verify
    }

    /// Down-level logon name: `<first domain label>\<account>`.
    #[must_use]
    pub fn bind_name(&self, account: &str) -> String {
        let short_name = self.domain.split('.').next().unwrap_or_default();
        format!("{short_name}\\{account}")
    }

    /// Address used when the directory entry has no `mail` attribute.
    #[must_use]
    pub fn fallback_email(&self, account: &str) -> String {
        format!("{account}@{}", self.email_domain)
    }
}

/// Normalize the configured server into an `ldaps://host:port` URL.
///
/// A bare host gets the LDAPS scheme and port; plain `ldap://` is refused so
/// passwords never cross the wire unencrypted.
fn server_url(server: &str) -> Result<String> {
    let server = server.trim().trim_end_matches('/');
    if server.is_empty() {
        return Err(anyhow!("directory server must not be empty"));
    }

    let candidate = if server.contains("://") {
        server.to_string()
    } else {
        format!("ldaps://{server}")
    };

    let parsed =
        Url::parse(&candidate).with_context(|| format!("Invalid directory server: {server}"))?;
    if parsed.scheme() != "ldaps" {
        return Err(anyhow!(
            "Unsupported directory scheme {}, only ldaps is allowed",
            parsed.scheme()
        ));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Directory server must include a host: {server}"))?;
    let port = parsed.port().unwrap_or(LDAPS_PORT);

    Ok(format!("ldaps://{host}:{port}"))
}

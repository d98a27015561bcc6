use crate::directory::{DirectoryConfig, RetryPolicy};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_LDAP_SERVER: &str = "ldap-server";
pub const ARG_LDAP_DOMAIN: &str = "ldap-domain";
pub const ARG_LDAP_SEARCH_BASE: &str = "ldap-search-base";
pub const ARG_OPERATOR_GROUP: &str = "operator-group";
pub const ARG_VIP_GROUP: &str = "vip-group";
pub const ARG_PRIVILEGE_ATTRIBUTE: &str = "privilege-attribute";
pub const ARG_PRIVILEGE_SENTINEL: &str = "privilege-sentinel";
pub const ARG_EMAIL_DOMAIN: &str = "email-domain";
pub const ARG_CONNECT_TIMEOUT: &str = "ldap-connect-timeout";
pub const ARG_RECEIVE_TIMEOUT: &str = "ldap-receive-timeout";
pub const ARG_RETRIES: &str = "ldap-retries";
pub const ARG_RETRY_DELAY: &str = "ldap-retry-delay";
pub const ARG_NO_TLS_VERIFY: &str = "ldap-no-tls-verify";

#[derive(Debug, Clone)]
pub struct Options {
    pub server: String,
    pub domain: String,
    pub search_base: String,
    pub operator_group: String,
    pub vip_group: String,
    pub privilege_attribute: String,
    pub privilege_sentinel: String,
    pub email_domain: Option<String>,
    pub connect_timeout_seconds: u64,
    pub receive_timeout_seconds: u64,
    pub retries: u32,
    pub retry_delay_seconds: u64,
    pub no_tls_verify: bool,
}

impl Options {
    /// Parse directory arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing or empty.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_required = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_u64 = |id: &str| matches.get_one::<u64>(id).copied().unwrap_or_default();

        Ok(Self {
            server: read_required(ARG_LDAP_SERVER)?,
            domain: read_required(ARG_LDAP_DOMAIN)?,
            search_base: read_required(ARG_LDAP_SEARCH_BASE)?,
            operator_group: read_required(ARG_OPERATOR_GROUP)?,
            vip_group: read_required(ARG_VIP_GROUP)?,
            privilege_attribute: read_required(ARG_PRIVILEGE_ATTRIBUTE)?,
            privilege_sentinel: read_required(ARG_PRIVILEGE_SENTINEL)?,
            email_domain: matches
                .get_one::<String>(ARG_EMAIL_DOMAIN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            connect_timeout_seconds: read_u64(ARG_CONNECT_TIMEOUT),
            receive_timeout_seconds: read_u64(ARG_RECEIVE_TIMEOUT),
            retries: matches.get_one::<u32>(ARG_RETRIES).copied().unwrap_or(1),
            retry_delay_seconds: read_u64(ARG_RETRY_DELAY),
            no_tls_verify: matches.get_flag(ARG_NO_TLS_VERIFY),
        })
    }

    /// Build the directory config from the parsed options.
    ///
    /// # Errors
    /// Returns an error if the server is not a usable LDAPS endpoint.
    pub fn config(&self) -> Result<DirectoryConfig> {
        let config = DirectoryConfig::new(
            &self.server,
            &self.domain,
            &self.search_base,
            &self.operator_group,
            &self.vip_group,
        )
        .with_context(|| format!("invalid --{ARG_LDAP_SERVER}"))?
        .with_privilege_marker(
            self.privilege_attribute.clone(),
            self.privilege_sentinel.clone(),
        )
        .with_connect_timeout_seconds(self.connect_timeout_seconds)
        .with_receive_timeout_seconds(self.receive_timeout_seconds)
        .with_retry(RetryPolicy::new(
            self.retries,
            Duration::from_secs(self.retry_delay_seconds),
        ))
        .with_no_tls_verify(self.no_tls_verify);

        Ok(match &self.email_domain {
            Some(domain) => config.with_email_domain(domain),
            None => config,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_endpoint_args(command);
    let command = with_policy_args(command);
    with_connection_args(command)
}

fn with_endpoint_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LDAP_SERVER)
                .long(ARG_LDAP_SERVER)
                .help("Directory server, example: dc01.corp.example or ldaps://dc01.corp.example:636")
                .env("RESETDESK_LDAP_SERVER")
                .required(true),
        )
        .arg(
            Arg::new(ARG_LDAP_DOMAIN)
                .long(ARG_LDAP_DOMAIN)
                .help("Directory domain, its first label prefixes bind names (DOMAIN\\account)")
                .env("RESETDESK_LDAP_DOMAIN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_LDAP_SEARCH_BASE)
                .long(ARG_LDAP_SEARCH_BASE)
                .help("Search base DN, example: DC=corp,DC=example")
                .env("RESETDESK_LDAP_SEARCH_BASE")
                .required(true),
        )
}

fn with_policy_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OPERATOR_GROUP)
                .long(ARG_OPERATOR_GROUP)
                .help("DN of the group whose members may sponsor resets")
                .env("RESETDESK_OPERATOR_GROUP")
                .required(true),
        )
        .arg(
            Arg::new(ARG_VIP_GROUP)
                .long(ARG_VIP_GROUP)
                .help("DN of the group whose members can never be reset here")
                .env("RESETDESK_VIP_GROUP")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PRIVILEGE_ATTRIBUTE)
                .long(ARG_PRIVILEGE_ATTRIBUTE)
                .help("Attribute marking privileged accounts")
                .env("RESETDESK_PRIVILEGE_ATTRIBUTE")
                .default_value("adminCount"),
        )
        .arg(
            Arg::new(ARG_PRIVILEGE_SENTINEL)
                .long(ARG_PRIVILEGE_SENTINEL)
                .help("Value of the privilege attribute that marks an account as privileged")
                .env("RESETDESK_PRIVILEGE_SENTINEL")
                .default_value("1"),
        )
        .arg(
            Arg::new(ARG_EMAIL_DOMAIN)
                .long(ARG_EMAIL_DOMAIN)
                .help("Mail domain used when a sponsor has no mail attribute (default: the directory domain)")
                .env("RESETDESK_EMAIL_DOMAIN"),
        )
}

fn with_connection_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CONNECT_TIMEOUT)
                .long(ARG_CONNECT_TIMEOUT)
                .help("Directory connect timeout in seconds")
                .env("RESETDESK_LDAP_CONNECT_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RECEIVE_TIMEOUT)
                .long(ARG_RECEIVE_TIMEOUT)
                .help("Directory operation timeout in seconds")
                .env("RESETDESK_LDAP_RECEIVE_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RETRIES)
                .long(ARG_RETRIES)
                .help("Connection attempts before the directory is reported unreachable")
                .env("RESETDESK_LDAP_RETRIES")
                .default_value("3")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_RETRY_DELAY)
                .long(ARG_RETRY_DELAY)
                .help("Delay between connection attempts in seconds")
                .env("RESETDESK_LDAP_RETRY_DELAY")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_NO_TLS_VERIFY)
                .long(ARG_NO_TLS_VERIFY)
                .help("Skip directory certificate verification (test environments only)")
                .env("RESETDESK_LDAP_NO_TLS_VERIFY")
                .action(ArgAction::SetTrue),
        )
}

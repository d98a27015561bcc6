use crate::notify::MailConfig;
use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_STARTTLS: &str = "smtp-starttls";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_TIMEOUT: &str = "smtp-timeout";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_OPS_ADDRESS: &str = "ops-address";

#[derive(Debug, Clone)]
pub struct Options {
    pub host: Option<String>,
    pub port: u16,
    pub starttls: bool,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub timeout_seconds: u64,
    pub from: String,
    pub ops_address: String,
}

impl Options {
    /// Parse mail arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };
        let read_required = |id: &str| {
            get_non_empty(id).ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            host: get_non_empty(ARG_SMTP_HOST),
            port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(25),
            starttls: matches.get_flag(ARG_SMTP_STARTTLS),
            username: get_non_empty(ARG_SMTP_USERNAME),
            password: get_non_empty(ARG_SMTP_PASSWORD).map(SecretString::from),
            timeout_seconds: matches
                .get_one::<u64>(ARG_SMTP_TIMEOUT)
                .copied()
                .unwrap_or(30),
            from: read_required(ARG_MAIL_FROM)?,
            ops_address: read_required(ARG_OPS_ADDRESS)?,
        })
    }

    #[must_use]
    pub fn config(&self) -> MailConfig {
        let mut config = MailConfig::new(&self.from, &self.ops_address)
            .with_port(self.port)
            .with_starttls(self.starttls)
            .with_timeout_seconds(self.timeout_seconds);
        if let Some(host) = &self.host {
            config = config.with_relay(host);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(username, password.clone());
        }
        config
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host; without it notifications are only logged")
                .env("RESETDESK_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("RESETDESK_SMTP_PORT")
                .default_value("25")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_STARTTLS)
                .long(ARG_SMTP_STARTTLS)
                .help("Require STARTTLS on the relay connection")
                .env("RESETDESK_SMTP_STARTTLS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP relay username")
                .env("RESETDESK_SMTP_USERNAME")
                .requires(ARG_SMTP_PASSWORD),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP relay password")
                .env("RESETDESK_SMTP_PASSWORD")
                .hide_env_values(true)
                .requires(ARG_SMTP_USERNAME),
        )
        .arg(
            Arg::new(ARG_SMTP_TIMEOUT)
                .long(ARG_SMTP_TIMEOUT)
                .help("SMTP relay timeout in seconds")
                .env("RESETDESK_SMTP_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address of notification mail")
                .env("RESETDESK_MAIL_FROM")
                .required(true),
        )
        .arg(
            Arg::new(ARG_OPS_ADDRESS)
                .long(ARG_OPS_ADDRESS)
                .help("Operations address copied on every notification")
                .env("RESETDESK_OPS_ADDRESS")
                .required(true),
        )
}

use crate::api::session::SessionConfig;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub ttl_seconds: u64,
    pub cookie_secure: bool,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(28_800),
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
        }
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_ttl_seconds(self.ttl_seconds)
            .with_cookie_secure(self.cookie_secure)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("RESETDESK_SESSION_TTL_SECONDS")
                .default_value("28800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve behind HTTPS)")
                .env("RESETDESK_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_RECORDS_DIR: &str = "records-dir";

#[derive(Debug, Clone)]
pub struct Options {
    pub dir: PathBuf,
}

impl Options {
    /// Parse record storage arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the directory is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let dir = matches
            .get_one::<String>(ARG_RECORDS_DIR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_RECORDS_DIR}"))?;

        Ok(Self {
            dir: PathBuf::from(dir),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_RECORDS_DIR)
            .long(ARG_RECORDS_DIR)
            .help("Directory where approved reset requests are written")
            .env("RESETDESK_RECORDS_DIR")
            .default_value("requests"),
    )
}

//! Command-line argument dispatch.
//!
//! Validated matches are turned into typed configuration and wrapped in the
//! action to execute.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{directory, mail, records, session, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let directory = directory::Options::parse(matches)?.config()?;
    let mail = mail::Options::parse(matches)?.config();
    let records = records::Options::parse(matches)?;
    let session = session::Options::parse(matches).config();

    Ok(Action::Server(Args {
        port,
        directory,
        mail,
        records_dir: records.dir,
        session,
    }))
}

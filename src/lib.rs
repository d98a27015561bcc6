//! # Resetdesk (sponsored password resets)
//!
//! `resetdesk` lets an operator ("sponsor") file a password-reset request on
//! behalf of another directory account. Nothing is reset here: approved
//! requests are written to disk for the help desk and announced by mail.
//!
//! ## Flow
//!
//! 1. The sponsor signs in with directory credentials. The bind happens as the
//!    sponsor, and only members of the operator group get a session.
//! 2. On submission the sponsor's password is asked again, a fresh directory
//!    session is opened, and the request runs through the eligibility gates
//!    (target exists, is not VIP or privileged, employee id and department
//!    match).
//! 3. An approved request is recorded as one JSON file, then a notification
//!    goes to the sponsor with the operations address in copy. A failed
//!    notification leaves the record in place and is reported as a warning.
//!
//! ## Directory queries fail closed
//!
//! A query that errors is treated as the answer that blocks the request. Only
//! connection-level failures are surfaced as errors.

pub mod api;
pub mod cli;
pub mod directory;
pub mod eligibility;
pub mod model;
pub mod notify;
pub mod portal;
pub mod record;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

use crate::{
    api::{self, session::SessionConfig, session::SessionStore},
    directory::{DirectoryConfig, LdapConnector},
    notify::{MailConfig, Notifier},
    portal::Portal,
    record::RequestRecorder,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub directory: DirectoryConfig,
    pub mail: MailConfig,
    pub records_dir: PathBuf,
    pub session: SessionConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the notifier cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let directory = Arc::new(args.directory);
    let connector = Arc::new(LdapConnector::new(Arc::clone(&directory)));
    let notifier = Notifier::from_config(&args.mail).context("Failed to configure notifications")?;
    let recorder = RequestRecorder::new(args.records_dir);

    let portal = Arc::new(Portal::new(connector, directory, recorder, notifier));
    let sessions = Arc::new(SessionStore::new(args.session));

    api::serve(args.port, portal, sessions).await
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        directory = args.directory.url(),
        search_base = args.directory.search_base(),
        retries = args.directory.retry().max_attempts(),
        smtp_host = args.mail.host().unwrap_or("none"),
        smtp_port = args.mail.port(),
        starttls = args.mail.starttls(),
        records_dir = %args.records_dir.display(),
        session_ttl_seconds = args.session.ttl().as_secs(),
        "Starting resetdesk"
    );
}

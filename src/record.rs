//! Durable record of approved reset requests.
//!
//! One JSON file per approved request, named
//! `<YYYYMMDD_HHMMSS>_password_reset_<sponsor>_<target>.json`. Files are
//! created exclusively and never rewritten.

use crate::model::{ResetRequest, Sponsor};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, info, instrument};
use utoipa::ToSchema;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize reset record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk body of an approved request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedRecord {
    #[serde(rename = "samAccountName")]
    pub sponsor: String,
    #[serde(rename = "email")]
    pub sponsor_email: String,
    #[serde(rename = "user_samAccountName")]
    pub target: String,
    #[serde(rename = "serviceCode")]
    pub service_code: String,
    #[serde(rename = "employeeID")]
    pub employee_id: String,
}

impl ApprovedRecord {
    #[must_use]
    pub fn new(sponsor: &Sponsor, request: &ResetRequest) -> Self {
        Self {
            sponsor: sponsor.account.to_string(),
            sponsor_email: sponsor.email.clone(),
            target: request.target.to_string(),
            service_code: request.service_code.clone(),
            employee_id: request.employee_id.clone(),
        }
    }
}

/// Where and when a record was written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecordReceipt {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[schema(value_type = String)]
    pub created_at: DateTime<Local>,
}

#[derive(Clone, Debug)]
pub struct RequestRecorder {
    root: PathBuf,
}

impl RequestRecorder {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the record for an approved request, stamped with the current time.
    ///
    /// # Errors
    /// Returns `RecordError` if the directory cannot be created, the file
    /// already exists or cannot be written.
    pub async fn record(
        &self,
        sponsor: &Sponsor,
        request: &ResetRequest,
    ) -> Result<RecordReceipt, RecordError> {
        self.record_at(sponsor, request, Local::now()).await
    }

    #[instrument(skip_all, fields(sponsor = %sponsor.account, target = %request.target))]
    pub(crate) async fn record_at(
        &self,
        sponsor: &Sponsor,
        request: &ResetRequest,
        created_at: DateTime<Local>,
    ) -> Result<RecordReceipt, RecordError> {
        let file_name = file_name(created_at, sponsor, request);
        let path = self.root.join(&file_name);
        let body = serde_json::to_vec(&ApprovedRecord::new(sponsor, request))?;

        if let Err(err) = write_new(&self.root, &path, &body).await {
            error!(path = %path.display(), "failed to write reset record: {err}");
            return Err(RecordError::Io { path, source: err });
        }

        info!(path = %path.display(), "reset record written");

        Ok(RecordReceipt {
            file_name,
            path,
            created_at,
        })
    }
}

fn file_name(created_at: DateTime<Local>, sponsor: &Sponsor, request: &ResetRequest) -> String {
    format!(
        "{}_password_reset_{}_{}.json",
        created_at.format(TIMESTAMP_FORMAT),
        sponsor.account,
        request.target
    )
}

async fn write_new(root: &Path, path: &Path, body: &[u8]) -> io::Result<()> {
    write_new_with(root, path, |mut file| async move {
        file.write_all(body).await?;
        file.sync_all().await
    })
    .await
}

/// Create `path` exclusively and fill it; a failed fill removes the file.
async fn write_new_with<F, Fut>(root: &Path, path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(fs::File) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    fs::create_dir_all(root).await?;
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    if let Err(err) = fill(file).await {
        if let Err(cleanup) = fs::remove_file(path).await {
            error!(path = %path.display(), "failed to remove partial record: {cleanup}");
        }
        return Err(err);
    }
    Ok(())
}

//! Single-file HTTP transfer: optional existence probe, then a streamed PUT

use anyhow::{Context, Result};
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::CONTENT_LENGTH;
use reqwest::StatusCode;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::logger::Logger;
use crate::manifest::TransferRecord;
use crate::progress::{FileProgress, ProgressReader};

/// Result of one transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub succeeded: bool,
    /// Sync mode found the file already present; nothing was sent
    pub skipped: bool,
    /// Empty on success
    pub detail: String,
}

impl TransferOutcome {
    pub fn uploaded() -> Self {
        Self {
            succeeded: true,
            skipped: false,
            detail: String::new(),
        }
    }

    pub fn skipped() -> Self {
        Self {
            succeeded: true,
            skipped: true,
            detail: String::new(),
        }
    }

    pub fn failed(detail: impl fmt::Display) -> Self {
        Self {
            succeeded: false,
            skipped: false,
            detail: detail.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Error reading {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to upload {name}: {source}")]
    Transport {
        name: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("({status}) Failed to upload {name}: {body}")]
    Status {
        status: u16,
        name: String,
        body: String,
    },
}

/// Executes one attempt for one record. Shared by all scheduler workers.
pub trait Transfer: Send + Sync {
    fn transfer(&self, record: &TransferRecord, progress: &Arc<FileProgress>) -> TransferOutcome;
}

/// Build the HTTP client shared by every worker of a run.
///
/// `timeout` of `None` disables the per-request timeout, so a large upload
/// is never cut off by a client default.
pub fn http_client(timeout: Option<Duration>) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Uploads records with `PUT {base_url}{relative_name}`
#[derive(Clone)]
pub struct HttpUploader {
    client: Client,
    base_url: String,
    sync: bool,
    logger: Arc<dyn Logger>,
}

impl HttpUploader {
    pub fn new(client: Client, base_url: impl Into<String>, sync: bool, logger: Arc<dyn Logger>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            sync,
            logger,
        }
    }

    /// Plain concatenation; the base is expected to end with '/' already
    pub fn destination(&self, record: &TransferRecord) -> String {
        format!("{}{}", self.base_url, record.relative_name)
    }

    pub fn upload(&self, record: &TransferRecord, progress: &Arc<FileProgress>) -> TransferOutcome {
        let url = self.destination(record);

        if self.sync && self.already_present(&url, record.size) {
            progress.advance_to(record.size);
            self.logger.skipped(&url, record.size);
            return TransferOutcome::skipped();
        }

        match self.put(&url, record, progress) {
            Ok(()) => {
                self.logger.upload_done(&url, record.size);
                TransferOutcome::uploaded()
            }
            Err(e) => TransferOutcome::failed(e),
        }
    }

    /// GET probe: present means 200 with a Content-Length equal to `size`.
    /// Any failure reads as "not present".
    fn already_present(&self, url: &str, size: u64) -> bool {
        let response = match self.client.get(url).send() {
            Ok(r) => r,
            Err(_) => return false,
        };
        let present = response.status() == StatusCode::OK && response.content_length() == Some(size);
        drain(response);
        present
    }

    fn put(&self, url: &str, record: &TransferRecord, progress: &Arc<FileProgress>) -> Result<(), UploadError> {
        let file = File::open(&record.source_path).map_err(|source| UploadError::Open {
            path: record.source_path.clone(),
            source,
        })?;

        let request = if record.size == 0 {
            self.client.put(url).header(CONTENT_LENGTH, 0u64)
        } else {
            let reader = ProgressReader::new(file, Arc::clone(progress));
            self.client.put(url).body(Body::sized(reader, record.size))
        };

        let response = request.send().map_err(|source| UploadError::Transport {
            name: record.relative_name.clone(),
            source,
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                name: record.relative_name.clone(),
                body,
            });
        }
        drain(response);
        Ok(())
    }
}

impl Transfer for HttpUploader {
    fn transfer(&self, record: &TransferRecord, progress: &Arc<FileProgress>) -> TransferOutcome {
        self.upload(record, progress)
    }
}

/// Read the rest of a response so its connection returns to the pool
fn drain(mut response: Response) {
    let _ = io::copy(&mut response, &mut io::sink());
}

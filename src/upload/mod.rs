//! Multi-file upload workflow
//!
//! The pieces, leaves first: [`scan`] turns paths into candidates,
//! [`selection`] tracks them, [`conflict`] asks the server about name
//! clashes, [`transfer`] moves the bytes, [`progress`] and [`poll`] follow
//! the transfer, and [`session`] sequences all of them as one state machine.

pub mod conflict;
pub mod poll;
pub mod progress;
pub mod scan;
pub mod selection;
pub mod service;
pub mod session;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use selection::SelectionRegistry;
pub use service::{HttpUploadService, UploadService};
pub use session::{SessionController, WorkflowState};
pub use transfer::{TransferStrategy, TransportKind};

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where the bytes of a candidate live
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<Vec<u8>>),
}

/// A locally selected file. The name is the key within a session.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub size: u64,
    pub source: FileSource,
}

impl FileCandidate {
    pub fn from_path(name: impl Into<String>, size: u64, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            size,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: FileSource::Memory(Arc::new(data)),
        }
    }

    /// Read the whole file into memory
    pub async fn read_all(&self) -> Result<Vec<u8>, UploadError> {
        match &self.source {
            FileSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| UploadError::Io {
                        name: self.name.clone(),
                        source,
                    })
            }
            FileSource::Memory(data) => Ok(data.as_ref().clone()),
        }
    }
}

/// Server classification of the names about to be uploaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConflictReport {
    pub existing_names: BTreeSet<String>,
    pub invalid_names: BTreeSet<String>,
    pub session_active: bool,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.existing_names.is_empty() || !self.invalid_names.is_empty()
    }
}

/// One answer of the progress endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressSnapshot {
    /// One-based index of the file the server is currently writing
    pub current_file: u32,
    pub percent: u8,
    pub running: bool,
    /// Bytes of the request as seen by the server, 0 while unknown
    pub content_length: u64,
}

/// Response body of the upload request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferOutcome {
    pub success: bool,
    pub message: String,
    pub stacktrace: String,
    pub request_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server answered {status} for {url}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to read {name}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{total} bytes selected, binary transport holds at most {limit} in memory")]
    TooLargeForMemory { total: u64, limit: u64 },

    #[error("upload canceled")]
    Canceled,
}

impl UploadError {
    /// Render the error and its causes, one per line
    pub fn trace(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            let _ = write!(out, "\ncaused by: {}", err);
            cause = err.source();
        }
        if let UploadError::Status { body, .. } = self {
            if !body.is_empty() {
                let _ = write!(out, "\n\n{}", body);
            }
        }
        out
    }
}

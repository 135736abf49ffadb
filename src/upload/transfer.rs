//! Byte transfer strategies
//!
//! Two ways to get the same multipart request to the server:
//! - [`FormSubmitStrategy`] streams each file straight from disk as a
//!   regular multipart form.
//! - [`BinaryPostStrategy`] reads every file into memory first, assembles
//!   the multipart body itself and posts it as one raw request.
//!
//! Files are always written in the order of [`UploadRequest::files`], which
//! the session fills in display order so server progress indices line up.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::service::decode_json;
use super::{FileCandidate, FileSource, TransferOutcome, UploadError};

const PARALLEL_READS: usize = 4;
const FILE_FIELD: &str = "file";
const TARGET_FOLDER_FIELD: &str = "targetFolder";

/// Everything a strategy needs for one upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub target_folder: String,
    pub files: Vec<FileCandidate>,
}

#[async_trait]
pub trait TransferStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `on_loading` is called with `true` while files are read from local
    /// disk before sending and with `false` once reading is done.
    async fn upload(
        &self,
        request: UploadRequest,
        on_loading: &(dyn Fn(bool) + Send + Sync),
    ) -> Result<TransferOutcome, UploadError>;
}

/// Transport preference from config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Binary post when the selection fits in memory, form submit otherwise
    #[default]
    Auto,
    Form,
    Binary,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Auto => "auto",
            TransportKind::Form => "form",
            TransportKind::Binary => "binary",
        }
    }

    /// Parse from name (case-insensitive), unknown names fall back to auto
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "form" | "multipart" => TransportKind::Form,
            "binary" | "raw" => TransportKind::Binary,
            _ => TransportKind::Auto,
        }
    }

    /// Resolve `Auto` against the bytes known at construction time
    pub fn resolve(self, known_bytes: u64, max_in_memory: u64) -> TransportKind {
        match self {
            TransportKind::Auto if known_bytes <= max_in_memory => TransportKind::Binary,
            TransportKind::Auto => TransportKind::Form,
            other => other,
        }
    }
}

/// Pick the strategy once for the lifetime of a dialog
pub fn select_strategy(
    kind: TransportKind,
    known_bytes: u64,
    max_in_memory: u64,
    client: reqwest::Client,
    url: String,
) -> Arc<dyn TransferStrategy> {
    let resolved = kind.resolve(known_bytes, max_in_memory);
    tracing::info!(
        "Transport {} resolved to {} ({} bytes known)",
        kind.name(),
        resolved.name(),
        known_bytes
    );
    match resolved {
        TransportKind::Binary => {
            Arc::new(BinaryPostStrategy::new(client, url).with_memory_limit(max_in_memory))
        }
        _ => Arc::new(FormSubmitStrategy::new(client, url)),
    }
}

pub struct FormSubmitStrategy {
    client: reqwest::Client,
    url: String,
}

impl FormSubmitStrategy {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    async fn part_for(&self, file: &FileCandidate) -> Result<Part, UploadError> {
        let part = match &file.source {
            FileSource::Path(path) => {
                let handle =
                    tokio::fs::File::open(path)
                        .await
                        .map_err(|source| UploadError::Io {
                            name: file.name.clone(),
                            source,
                        })?;
                let body = reqwest::Body::wrap_stream(ReaderStream::new(handle));
                Part::stream_with_length(body, file.size)
            }
            FileSource::Memory(data) => Part::bytes(data.as_ref().clone()),
        };

        part.file_name(file.name.clone())
            .mime_str("application/octet-stream")
            .map_err(|source| UploadError::Http {
                url: self.url.clone(),
                source,
            })
    }
}

#[async_trait]
impl TransferStrategy for FormSubmitStrategy {
    fn name(&self) -> &'static str {
        "form"
    }

    async fn upload(
        &self,
        request: UploadRequest,
        _on_loading: &(dyn Fn(bool) + Send + Sync),
    ) -> Result<TransferOutcome, UploadError> {
        let mut form = Form::new().text(TARGET_FOLDER_FIELD, request.target_folder.clone());
        for file in &request.files {
            form = form.part(FILE_FIELD, self.part_for(file).await?);
        }

        tracing::info!(
            "Submitting {} file(s) as multipart form to {}",
            request.files.len(),
            self.url
        );
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: self.url.clone(),
                source,
            })?;
        decode_json(&self.url, response).await
    }
}

pub struct BinaryPostStrategy {
    client: reqwest::Client,
    url: String,
    max_in_memory: u64,
}

impl BinaryPostStrategy {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self {
            client,
            url,
            max_in_memory: u64::MAX,
        }
    }

    /// Refuse requests whose files add up to more than `limit` bytes
    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.max_in_memory = limit;
        self
    }

    async fn read_files(files: Vec<FileCandidate>) -> Result<Vec<(String, Vec<u8>)>, UploadError> {
        // buffered keeps the input order
        stream::iter(files)
            .map(|file| async move {
                let data = file.read_all().await?;
                Ok::<_, UploadError>((file.name, data))
            })
            .buffered(PARALLEL_READS)
            .try_collect()
            .await
    }
}

#[async_trait]
impl TransferStrategy for BinaryPostStrategy {
    fn name(&self) -> &'static str {
        "binary"
    }

    async fn upload(
        &self,
        request: UploadRequest,
        on_loading: &(dyn Fn(bool) + Send + Sync),
    ) -> Result<TransferOutcome, UploadError> {
        let total: u64 = request.files.iter().map(|file| file.size).sum();
        if total > self.max_in_memory {
            return Err(UploadError::TooLargeForMemory {
                total,
                limit: self.max_in_memory,
            });
        }

        on_loading(true);
        let contents = Self::read_files(request.files.clone()).await;
        on_loading(false);
        let contents = contents?;

        let boundary = format!("----bulkup{}", Uuid::new_v4().simple());
        let body = assemble_multipart(&boundary, &request.target_folder, &contents);
        tracing::info!(
            "Posting {} file(s), {} byte body to {}",
            contents.len(),
            body.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: self.url.clone(),
                source,
            })?;
        decode_json(&self.url, response).await
    }
}

/// Build a `multipart/form-data` body: the target folder field, then one
/// part per file in the given order.
pub fn assemble_multipart(boundary: &str, target_folder: &str, files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let payload: usize = files.iter().map(|(_, data)| data.len()).sum();
    let mut body = Vec::with_capacity(payload + 256 * (files.len() + 1));

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary, TARGET_FOLDER_FIELD, target_folder
        )
        .as_bytes(),
    );

    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary,
                FILE_FIELD,
                escape_quoted(name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

/// Percent-encode the characters that would break a quoted header value
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

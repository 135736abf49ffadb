//! Remote operations used by the upload workflow

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ConflictReport, ProgressSnapshot, UploadError};

/// Server side of the workflow. Injected so tests can script answers.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn check_upload_files(
        &self,
        names: &[String],
        target_folder: &str,
    ) -> Result<ConflictReport, UploadError>;

    async fn get_upload_progress_info(&self) -> Result<ProgressSnapshot, UploadError>;

    async fn cancel_upload(&self) -> Result<(), UploadError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    names: &'a [String],
    target_folder: &'a str,
}

/// JSON over HTTP, one path per operation under a common base URL
#[derive(Debug, Clone)]
pub struct HttpUploadService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUploadService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|source| UploadError::Http {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn upload_url(&self) -> String {
        self.url("upload")
    }
}

#[async_trait]
impl UploadService for HttpUploadService {
    async fn check_upload_files(
        &self,
        names: &[String],
        target_folder: &str,
    ) -> Result<ConflictReport, UploadError> {
        let url = self.url("check");
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&CheckRequest {
                names,
                target_folder,
            })
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: url.clone(),
                source,
            })?;
        decode_json(&url, response).await
    }

    async fn get_upload_progress_info(&self) -> Result<ProgressSnapshot, UploadError> {
        let url = self.url("progress");
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: url.clone(),
                source,
            })?;
        decode_json(&url, response).await
    }

    async fn cancel_upload(&self) -> Result<(), UploadError> {
        let url = self.url("cancel");
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                url,
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

/// Read a JSON body, turning non-2xx answers into [`UploadError::Status`]
pub(crate) async fn decode_json<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, UploadError> {
    let status = response.status();
    let body = response.text().await.map_err(|source| UploadError::Http {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        return Err(UploadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|source| UploadError::Decode {
        url: url.to_string(),
        source,
    })
}

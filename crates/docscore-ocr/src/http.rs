//! HTTP client for the OCR job service.
//!
//! A document is submitted as a text-output job, then polled until the job
//! finishes, fails, or the poll budget runs out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use docscore_core::config::OcrSecrets;
use docscore_core::{BoxError, TextExtractor};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_POLLS: u32 = 150;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR job {id} failed: {reason}")]
    JobFailed { id: String, reason: String },
    #[error("OCR job {id} still unfinished after {polls} polls")]
    Timeout { id: String, polls: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Deserialize)]
struct JobCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: JobState,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the OCR service's job endpoints.
pub struct OcrClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl OcrClient {
    /// `base_url` like `https://ocr.example.com` (a trailing slash is dropped).
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn from_secrets(secrets: &OcrSecrets) -> Self {
        Self::new(secrets.url.clone(), secrets.api_key.clone())
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Submit `path` and wait for its plain-text result.
    pub async fn extract_text(&self, path: &Path) -> Result<String, OcrError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| OcrError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let id = self.submit(bytes).await?;
        info!(job = %id, file = %path.display(), "submitted OCR job");
        self.wait(&id).await
    }

    async fn submit(&self, bytes: Vec<u8>) -> Result<String, OcrError> {
        let url = format!("{}/jobs?output_format=txt", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        let created: JobCreated = serde_json::from_str(&checked_body(resp).await?)?;
        Ok(created.id)
    }

    async fn wait(&self, id: &str) -> Result<String, OcrError> {
        let url = format!("{}/jobs/{id}", self.base_url);
        for poll in 1..=self.max_polls {
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let status: JobStatus = serde_json::from_str(&checked_body(resp).await?)?;

            match status.status {
                JobState::Done => {
                    return status.result.ok_or_else(|| OcrError::JobFailed {
                        id: id.to_string(),
                        reason: "finished without a result".into(),
                    });
                }
                JobState::Failed => {
                    return Err(OcrError::JobFailed {
                        id: id.to_string(),
                        reason: status.error.unwrap_or_else(|| "unknown error".into()),
                    });
                }
                JobState::Pending | JobState::Running => {
                    debug!(job = %id, poll, state = ?status.status, "OCR job not finished");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(OcrError::Timeout {
            id: id.to_string(),
            polls: self.max_polls,
        })
    }
}

async fn checked_body(resp: reqwest::Response) -> Result<String, OcrError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(OcrError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.text().await?)
}

#[async_trait]
impl TextExtractor for OcrClient {
    async fn extract(&self, path: &Path) -> Result<String, BoxError> {
        Ok(self.extract_text(path).await?)
    }
}

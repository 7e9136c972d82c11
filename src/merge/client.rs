use super::artifact::MergeArtifact;
use crate::models::{SourceFile, TrackFormat};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Error as ReqwestError};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("trackmix/", env!("CARGO_PKG_VERSION"));
const FALLBACK_MESSAGE: &str = "Failed to combine GPX files.";

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("{0}")]
    Rejected(String),
    #[error("Merge service returned status {0}")]
    Status(u16),
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),
    #[error("File too large: {0}")]
    FileTooLarge(String),
}

impl MergeError {
    /// Message shown to the user: the service's own message when it gave one
    pub fn user_message(&self) -> String {
        match self {
            MergeError::Rejected(_)
            | MergeError::InvalidFileType(_)
            | MergeError::FileTooLarge(_) => self.to_string(),
            MergeError::Request(_) | MergeError::Status(_) => FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Whether the service should join all tracks into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Keep each input as its own track in the combined file
    #[default]
    Separate,
    /// Merge all inputs into a single track
    Merged,
}

impl MergeMode {
    pub fn as_flag(&self) -> &'static str {
        match self {
            MergeMode::Separate => "false",
            MergeMode::Merged => "true",
        }
    }
}

/// Reject files the merge service would refuse, before sending anything
pub fn preflight(files: &[SourceFile], max_bytes: u64) -> Result<(), MergeError> {
    for file in files {
        if file.format() == TrackFormat::Unrecognized {
            return Err(MergeError::InvalidFileType(file.name.clone()));
        }
        if file.size() > max_bytes {
            return Err(MergeError::FileTooLarge(file.name.clone()));
        }
    }
    Ok(())
}

/// Trait for the merge collaborator (allows mocking for tests)
#[async_trait::async_trait]
pub trait MergeClient: Send + Sync {
    async fn merge(
        &self,
        files: &[SourceFile],
        mode: MergeMode,
    ) -> Result<MergeArtifact, MergeError>;
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct HttpMergeClient {
    client: Client,
    base_url: String,
}

impl HttpMergeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MergeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl MergeClient for HttpMergeClient {
    async fn merge(
        &self,
        files: &[SourceFile],
        mode: MergeMode,
    ) -> Result<MergeArtifact, MergeError> {
        let url = format!("{}/upload", self.base_url);

        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.name.clone())
                .mime_str("application/octet-stream")?;
            form = form.part("files", part);
        }
        form = form.text("merge", mode.as_flag());

        info!("Requesting merge of {} files ({:?})", files.len(), mode);

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        let body = response.bytes().await?;

        // The service may report errors as JSON even with a success status
        if is_json || !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&body) {
                warn!("Merge rejected: {}", err.error);
                return Err(MergeError::Rejected(err.error));
            }
        }

        if !status.is_success() {
            warn!("Merge failed with status {}", status);
            return Err(MergeError::Status(status.as_u16()));
        }

        debug!("Merge returned {} bytes", body.len());
        Ok(MergeArtifact::new(body.to_vec()))
    }
}

use crate::models::SourceFile;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Error as ReqwestError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("trackmix/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("Conversion service returned status {0}")]
    Status(u16),
    #[error("Conversion service returned an empty track")]
    EmptyResponse,
}

/// Trait for the conversion collaborator (allows mocking for tests)
#[async_trait::async_trait]
pub trait ConversionClient: Send + Sync {
    /// Convert a binary track file into GPX text
    async fn convert(&self, file: &SourceFile) -> Result<String, ConversionError>;
}

#[derive(Clone)]
pub struct HttpConversionClient {
    client: Client,
    base_url: String,
}

impl HttpConversionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConversionError> {
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
impl ConversionClient for HttpConversionClient {
    async fn convert(&self, file: &SourceFile) -> Result<String, ConversionError> {
        let url = format!("{}/convert-fit", self.base_url);

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        debug!("Converting {} ({} bytes)", file.name, file.size());

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!("Conversion of {} failed with status {}", file.name, status);
            return Err(ConversionError::Status(status));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(ConversionError::EmptyResponse);
        }

        Ok(text)
    }
}

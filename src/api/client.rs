use std::future::Future;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::types::{GenerateResponse, NotesResponse, StatusResponse, UploadResponse};
use crate::document::Document;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// The four remote operations the lifecycle depends on.
///
/// Implementations are stateless: each call succeeds or fails on its own.
/// The orchestrator is generic over this trait so tests can script the
/// backend without a network.
pub trait JobApi: Send + Sync + 'static {
    /// Upload a document. Processing starts on the server as soon as this returns.
    fn submit_document(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<UploadResponse, ApiError>> + Send;

    /// Read the current status of a job. Idempotent.
    fn read_status(
        &self,
        doc_id: &str,
    ) -> impl Future<Output = Result<StatusResponse, ApiError>> + Send;

    /// Ask the server to generate notes for a `ready` document.
    fn start_generation(
        &self,
        doc_id: &str,
    ) -> impl Future<Output = Result<GenerateResponse, ApiError>> + Send;

    /// Fetch the generated notes of a `completed` document.
    fn fetch_result(
        &self,
        doc_id: &str,
    ) -> impl Future<Output = Result<NotesResponse, ApiError>> + Send;
}

/// Timeouts for [`HttpJobApi`].
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(120),
        }
    }
}

/// [`JobApi`] over HTTP against the notes backend.
pub struct HttpJobApi {
    client: Client,
    base_url: String,
}

/// Messages used when an error response has no usable `detail`.
#[derive(Debug, Clone, Copy)]
struct Fallback {
    /// The body is not JSON at all.
    unreadable: &'static str,
    /// JSON, but `detail` is missing or blank.
    no_detail: &'static str,
}

impl Fallback {
    const fn same(message: &'static str) -> Self {
        Self {
            unreadable: message,
            no_detail: message,
        }
    }
}

const UPLOAD_FAILED: Fallback = Fallback::same("Upload failed");
const STATUS_FAILED: Fallback = Fallback::same("Failed to check status");
const GENERATION_FAILED: Fallback = Fallback {
    unreadable: "Generation failed",
    no_detail: "Note generation failed",
};
const NOTES_FAILED: Fallback = Fallback::same("Failed to fetch notes");

impl HttpJobApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, HttpTimeouts::default())
    }

    pub fn with_timeouts(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Pull the server's `detail` message out of an error response.
async fn failure_message(response: Response, fallback: Fallback) -> String {
    let body = response.bytes().await.unwrap_or_default();
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return fallback.unreadable.to_string();
    };
    json.get("detail")
        .and_then(serde_json::Value::as_str)
        .filter(|d| !d.trim().is_empty())
        .map_or_else(|| fallback.no_detail.to_string(), str::to_string)
}

async fn remote_error(response: Response, fallback: Fallback) -> ApiError {
    let status = response.status().as_u16();
    let message = failure_message(response, fallback).await;
    ApiError::Remote { status, message }
}

impl JobApi for HttpJobApi {
    async fn submit_document(&self, document: &Document) -> Result<UploadResponse, ApiError> {
        let part = Part::bytes(document.bytes().to_vec())
            .file_name(document.filename().to_string())
            .mime_str(document.mime_type())?;
        let form = Form::new().part("file", part);

        debug!(filename = document.filename(), bytes = document.len(), "uploading document");
        let response = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(remote_error(response, UPLOAD_FAILED).await);
        }
        Self::decode(response).await
    }

    async fn read_status(&self, doc_id: &str) -> Result<StatusResponse, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/status/{doc_id}")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(remote_error(response, STATUS_FAILED).await);
        }
        Self::decode(response).await
    }

    async fn start_generation(&self, doc_id: &str) -> Result<GenerateResponse, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/api/notes/generate/{doc_id}")))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::CONFLICT {
            return Err(ApiError::Precondition(
                failure_message(response, GENERATION_FAILED).await,
            ));
        }
        if !status.is_success() {
            return Err(remote_error(response, GENERATION_FAILED).await);
        }
        Self::decode(response).await
    }

    async fn fetch_result(&self, doc_id: &str) -> Result<NotesResponse, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/notes/{doc_id}")))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(
                failure_message(response, NOTES_FAILED).await,
            ));
        }
        if !status.is_success() {
            return Err(remote_error(response, NOTES_FAILED).await);
        }
        Self::decode(response).await
    }
}

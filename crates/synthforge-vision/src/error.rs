//! Error types for the extraction stage

use std::path::PathBuf;
use std::time::Duration;
use synthforge_core::ValidationError;
use thiserror::Error;

/// Any failure between "here is a video" and "here is a valid document".
/// Each one aborts the run: nothing downstream is trustworthy without a base document.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("video not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("failed to read video {path}: {source}")]
    ReadVideo { path: PathBuf, source: std::io::Error },

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {endpoint} failed: {source}")]
    Http { endpoint: String, source: reqwest::Error },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Service { endpoint: String, status: u16, body: String },

    #[error("upload start did not return a session URL")]
    UploadSession,

    #[error("uploaded video {name} entered state {state}")]
    ProcessingFailed { name: String, state: String },

    #[error("uploaded video {name} still processing after {waited:?}")]
    ProcessingTimeout { name: String, waited: Duration },

    #[error("model returned no content (reason: {})", .reason.as_deref().unwrap_or("unspecified"))]
    EmptyResponse { reason: Option<String> },

    #[error("model response is not valid JSON: {source}")]
    MalformedJson { source: serde_json::Error, raw: String },

    #[error("model response does not match the document schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error(transparent)]
    InvalidDocument(#[from] ValidationError),
}

impl ExtractionError {
    /// Raw model output, when the failure happened after a reply arrived
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ExtractionError::MalformedJson { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

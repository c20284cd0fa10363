//! Error types for the generation, emission and render stages

use std::path::PathBuf;
use std::time::Duration;
use synthforge_core::{ConfigError, DocumentError, ValidationError};
use synthforge_vision::ExtractionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RandomizeError {
    #[error("variation count must be at least 1")]
    ZeroCount,

    #[error("base document is invalid: {0}")]
    InvalidBase(#[source] ValidationError),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum EmissionError {
    #[error("objects {first:?} and {second:?} both map to prim name {prim}")]
    DuplicatePrimName { first: String, second: String, prim: String },

    #[error("non-finite value at {field}")]
    NonFinite { field: String },

    #[error("failed to write script {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

/// Per-script render failure. Never aborts a batch.
#[derive(Error, Debug)]
pub enum RenderInvocationError {
    #[error("Isaac Sim python not found{}; set ISAAC_SIM_PYTHON", .executable.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    ToolMissing { executable: Option<PathBuf> },

    #[error("failed to start {executable}: {source}")]
    Spawn { executable: PathBuf, source: std::io::Error },

    #[error("{script} exited with {}: {stderr}", .code.map(|c| format!("code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    Failed { script: PathBuf, code: Option<i32>, stderr: String },

    #[error("{script} timed out after {after:?}")]
    Timeout { script: PathBuf, after: Duration },

    #[error("{script} finished but {output} was not produced")]
    NoOutput { script: PathBuf, output: PathBuf },

    #[error("failed to prepare {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Randomize(#[from] RandomizeError),

    #[error(transparent)]
    Emission(#[from] EmissionError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to serialize run manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

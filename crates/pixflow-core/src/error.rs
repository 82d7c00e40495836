//! Error types for the Pixflow batch pipeline.
//!
//! Errors are split by blast radius: [`PipelineError`] covers failures scoped to
//! a single work item or to stage coordination, [`ConfigError`] covers loading
//! settings, and [`PixflowError`] is what the public facade returns.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::types::Stage;

/// Top-level error type for Pixflow operations.
#[derive(Error, Debug)]
pub enum PixflowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Submission rejected before any record was created
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// No process record exists for this id
    #[error("Process not found: {0}")]
    NotFound(Uuid),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors.
///
/// Everything except `NoWorkers` and `WorkerLost` is an item error: it is
/// counted against its stage and never stops the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network-level fetch failure (DNS, connect, body read)
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Server answered with a non-success status
    #[error("Fetch failed for {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {item} after {timeout_ms}ms")]
    Timeout {
        item: String,
        stage: Stage,
        timeout_ms: u64,
    },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Image encoding or writing failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Source image has dimensions the transform cannot work with
    #[error("Invalid dimensions for {path}: {width}x{height}")]
    InvalidDimensions {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    /// Filesystem failure while persisting an artifact
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transform panicked while handling this item
    #[error("Worker panicked on {item}: {message}")]
    Panicked { item: String, message: String },

    /// A stage was asked to process items with no workers to run them
    #[error("{stage} stage has {pending} pending items but 0 workers")]
    NoWorkers { stage: Stage, pending: usize },

    /// A worker task died outside the per-item boundary
    #[error("{stage} worker lost: {message}")]
    WorkerLost { stage: Stage, message: String },
}

impl PipelineError {
    /// Whether this error is fatal to the whole run rather than one item.
    pub fn is_orchestration(&self) -> bool {
        matches!(
            self,
            PipelineError::NoWorkers { .. } | PipelineError::WorkerLost { .. }
        )
    }
}

/// Convenience type alias for Pixflow results.
pub type Result<T> = std::result::Result<T, PixflowError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

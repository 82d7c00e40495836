//! Core data types for the Pixflow pipeline.
//!
//! These types describe a submitted batch and everything recorded about it
//! while it runs: the request, per-stage results, per-stage failures, and the
//! terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// A batch submission: the images to fetch and how many workers each stage gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Source URLs, one per image
    pub urls: Vec<String>,

    /// Worker count per stage
    pub workers: WorkerCounts,
}

/// Per-stage worker counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub download: usize,
    pub resize: usize,
    pub reformat: usize,
    /// Accepted and stored, but no stage consumes it yet
    #[serde(default)]
    pub watermark: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            download: 4,
            resize: 2,
            reformat: 2,
            watermark: 0,
        }
    }
}

impl WorkerCounts {
    /// Worker count configured for a stage.
    pub fn for_stage(&self, stage: Stage) -> usize {
        match stage {
            Stage::Download => self.download,
            Stage::Resize => self.resize,
            Stage::Reformat => self.reformat,
        }
    }
}

/// Acknowledgement returned by a submission, before any stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub process_id: Uuid,
    pub message: String,
}

/// One of the three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Download,
    Resize,
    Reformat,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Download, Stage::Resize, Stage::Reformat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Resize => "resize",
            Stage::Reformat => "reformat",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a process record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Running,
    Completed,
    Failed,
}

impl ProcessStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessStatus::Running)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::Running => "RUNNING",
            ProcessStatus::Completed => "COMPLETED",
            ProcessStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A successfully fetched and stored source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    /// URL the bytes came from
    pub source_url: String,
    /// Where the bytes were written
    pub stored_path: PathBuf,
    /// Size of the stored file in bytes
    pub size_bytes: u64,
    pub elapsed_ms: u64,
    pub worker: String,
    pub timestamp: DateTime<Utc>,
}

/// A successfully resized artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeResult {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub original: Dimensions,
    pub resized: Dimensions,
    pub elapsed_ms: u64,
    pub worker: String,
    pub timestamp: DateTime<Utc>,
}

/// A re-encoded artifact, or a no-op record when it was already canonical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReformatResult {
    pub source_path: PathBuf,
    /// Same as `source_path` when `converted` is false
    pub output_path: PathBuf,
    /// Detected encoding of the source ("jpeg", "png", ...)
    pub original_format: String,
    pub new_format: String,
    pub converted: bool,
    pub elapsed_ms: u64,
    pub worker: String,
    pub timestamp: DateTime<Utc>,
}

/// Identifying detail for one failed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    /// URL or artifact path of the item
    pub item: String,
    pub reason: String,
    pub worker: String,
    pub timestamp: DateTime<Utc>,
}

/// Error accounting for one stage.
///
/// `count` is authoritative; `details` is capped and stops growing once full.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageErrors {
    pub count: u64,
    pub details: Vec<ItemFailure>,
}

/// Everything known about one submitted pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub process_id: Uuid,
    pub status: ProcessStatus,
    pub start_time: DateTime<Utc>,
    /// Set exactly once, when the status becomes terminal
    pub end_time: Option<DateTime<Utc>>,
    /// The request exactly as submitted
    pub request: ProcessRequest,

    pub downloads: Vec<DownloadResult>,
    pub download_errors: StageErrors,

    pub resizes: Vec<ResizeResult>,
    pub resize_errors: StageErrors,

    pub reformats: Vec<ReformatResult>,
    pub reformat_errors: StageErrors,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProcessRecord {
    /// A fresh record in the RUNNING state with empty collections.
    pub fn new(process_id: Uuid, request: ProcessRequest) -> Self {
        Self {
            process_id,
            status: ProcessStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            request,
            downloads: Vec::new(),
            download_errors: StageErrors::default(),
            resizes: Vec::new(),
            resize_errors: StageErrors::default(),
            reformats: Vec::new(),
            reformat_errors: StageErrors::default(),
            error_message: None,
        }
    }

    /// Number of successful results recorded for a stage.
    pub fn result_count(&self, stage: Stage) -> usize {
        match stage {
            Stage::Download => self.downloads.len(),
            Stage::Resize => self.resizes.len(),
            Stage::Reformat => self.reformats.len(),
        }
    }

    pub fn errors(&self, stage: Stage) -> &StageErrors {
        match stage {
            Stage::Download => &self.download_errors,
            Stage::Resize => &self.resize_errors,
            Stage::Reformat => &self.reformat_errors,
        }
    }

    pub(crate) fn errors_mut(&mut self, stage: Stage) -> &mut StageErrors {
        match stage {
            Stage::Download => &mut self.download_errors,
            Stage::Resize => &mut self.resize_errors,
            Stage::Reformat => &mut self.reformat_errors,
        }
    }

    /// Stored paths of every successful download, in completion order.
    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.downloads.iter().map(|d| d.stored_path.clone()).collect()
    }

    /// Output paths of every successful resize, in completion order.
    pub fn resized_paths(&self) -> Vec<PathBuf> {
        self.resizes.iter().map(|r| r.output_path.clone()).collect()
    }
}

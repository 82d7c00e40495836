//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Flat directory every stage writes its artifacts into
    pub storage_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("storage/downloads"),
        }
    }
}

/// Download stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: format!("pixflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Resize stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Output width; height follows the source aspect ratio
    pub target_width: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self { target_width: 800 }
    }
}

/// Limits applied to submissions and to the process record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upper bound on any single stage's worker count
    pub max_workers_per_stage: usize,

    /// How many failed items are kept with detail per stage
    pub max_failure_details: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_workers_per_stage: 64,
            max_failure_details: 100,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

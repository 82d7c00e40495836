//! Config values that can be overridden per invocation.

use clap::Args;
use pixflow_core::Config;
use std::path::{Path, PathBuf};

/// Flags layered over the config file, shared by `run` and `config`.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Output width for the resize stage
    #[arg(long)]
    pub target_width: Option<u32>,

    /// Directory artifacts are written to
    #[arg(long, env = "PIXFLOW_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Per-URL fetch timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    /// Write every flag that was given into `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(width) = self.target_width {
            config.resize.target_width = width;
        }
        if let Some(dir) = &self.storage_dir {
            config.general.storage_dir = expand(dir);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.fetch.timeout_ms = timeout_ms;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target_width.is_none() && self.storage_dir.is_none() && self.timeout_ms.is_none()
    }
}

/// `~` expansion for user-supplied paths.
pub fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

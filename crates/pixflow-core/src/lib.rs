//! Pixflow Core - staged batch pipeline for fetching and normalizing images.
//!
//! A submitted batch of image URLs runs through three stages, each with its
//! own pool of workers:
//!
//! ```text
//! URLs → Download → Resize (fixed width) → Reformat (PNG) → artifacts
//! ```
//!
//! Every run is tracked by a [`ProcessRecord`] that can be queried while the
//! batch is still in flight.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixflow_core::{Config, Pixflow, ProcessRequest, WorkerCounts};
//!
//! #[tokio::main]
//! async fn main() -> pixflow_core::Result<()> {
//!     let pixflow = Pixflow::new(Config::load()?)?;
//!
//!     let submission = pixflow.submit(ProcessRequest {
//!         urls: vec!["https://example.com/cat.jpg".into()],
//!         workers: WorkerCounts::default(),
//!     })?;
//!     let record = pixflow.wait(&submission.process_id).await?;
//!     println!("{} resized", record.resizes.len());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult, PixflowError, Result};
pub use pipeline::{Fetcher, HttpFetcher, Orchestrator, StageSummary, StageTransform, WorkQueue};
pub use store::{Outcome, ProcessStore};
pub use types::{
    Dimensions, DownloadResult, ItemFailure, ProcessRecord, ProcessRequest, ProcessStatus,
    ReformatResult, ResizeResult, Stage, StageErrors, Submission, WorkerCounts,
};

use std::sync::Arc;
use uuid::Uuid;

use pipeline::{Downloader, Reformatter, Resizer, Validator};
use scheduler::Scheduler;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Acknowledgement text returned with every accepted submission.
pub const SUBMISSION_MESSAGE: &str = "Processing started";

/// Pixflow service - the main entry point for submitting and tracking batches.
pub struct Pixflow {
    config: Config,
    store: Arc<ProcessStore>,
    orchestrator: Arc<Orchestrator>,
    validator: Validator,
    scheduler: Scheduler,
}

impl Pixflow {
    /// Create a service that fetches over HTTP.
    ///
    /// Must be called from within a tokio runtime; submitted runs are spawned
    /// onto it.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a service with a custom fetch primitive.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            PixflowError::Config(ConfigError::ValidationError(format!(
                "Pixflow must be created inside a tokio runtime: {e}"
            )))
        })?;

        let store = Arc::new(ProcessStore::new(config.limits.max_failure_details));
        let orchestrator = Orchestrator::new(
            store.clone(),
            Downloader::new(fetcher, config.storage_dir(), config.fetch_timeout()),
            Resizer::new(config.resize.target_width),
            Reformatter::new(),
        );
        tracing::debug!(
            "Initializing Pixflow v{} (storage: {:?})",
            VERSION,
            config.storage_dir()
        );

        Ok(Self {
            validator: Validator::new(config.limits.clone()),
            config,
            store,
            orchestrator: Arc::new(orchestrator),
            scheduler: Scheduler::new(runtime),
        })
    }

    /// Accept a batch and start it in the background.
    ///
    /// Returns as soon as the record exists; no stage has run yet.
    pub fn submit(&self, request: ProcessRequest) -> Result<Submission> {
        self.validator.validate(&request)?;

        let process_id = self.store.create(request.clone());
        let orchestrator = self.orchestrator.clone();
        self.scheduler.spawn(process_id, async move {
            orchestrator.run_pipeline(request, process_id).await;
        });

        tracing::info!(%process_id, "Submission accepted");
        Ok(Submission {
            process_id,
            message: SUBMISSION_MESSAGE.to_string(),
        })
    }

    /// Current snapshot of a run.
    pub fn status(&self, process_id: &Uuid) -> Result<ProcessRecord> {
        self.store.snapshot(process_id)
    }

    /// Wait for a run to reach a terminal status and return its final snapshot.
    ///
    /// Safe to call from several tasks at once; every caller gets the
    /// terminal record.
    pub async fn wait(&self, process_id: &Uuid) -> Result<ProcessRecord> {
        if !self.store.contains(process_id) {
            return Err(PixflowError::NotFound(*process_id));
        }
        if let Err(e) = self.scheduler.wait(process_id).await {
            tracing::error!(%process_id, "Pipeline task failed: {e}");
            self.store.finish(
                process_id,
                Outcome::Failed(format!("pipeline task failed: {e}")),
            )?;
        }
        self.store.wait_terminal(process_id).await
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs still in flight.
    pub fn active_runs(&self) -> usize {
        self.scheduler.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_pixflow_new() {
        let pixflow = Pixflow::new(Config::default()).unwrap();
        assert_eq!(pixflow.config().resize.target_width, 800);
        assert_eq!(pixflow.active_runs(), 0);
    }

    #[test]
    fn test_pixflow_requires_runtime() {
        let err = Pixflow::new(Config::default()).err().unwrap();
        assert!(err.to_string().contains("tokio runtime"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.resize.target_width = 0;
        assert!(matches!(
            Pixflow::new(config),
            Err(PixflowError::Config(ConfigError::ValidationError(_)))
        ));
    }

    #[tokio::test]
    async fn test_status_of_unknown_id() {
        let pixflow = Pixflow::new(Config::default()).unwrap();
        let id = Uuid::new_v4();
        assert!(matches!(pixflow.status(&id), Err(PixflowError::NotFound(x)) if x == id));
        assert!(matches!(pixflow.wait(&id).await, Err(PixflowError::NotFound(_))));
    }
}

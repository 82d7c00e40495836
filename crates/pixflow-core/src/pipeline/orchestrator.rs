//! Pipeline orchestration - sequences download, resize, and reformat.
//!
//! Each stage runs to completion before the next starts, and only the
//! successful artifacts of one stage are handed to the next. Item failures
//! stay inside their stage; anything that breaks the sequencing itself fails
//! the whole run.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use uuid::Uuid;

use super::download::Downloader;
use super::pool::{StagePool, StageSummary};
use super::reformat::Reformatter;
use super::resize::Resizer;
use super::stage::StageTransform;
use crate::error::Result;
use crate::store::{Outcome, ProcessStore};
use crate::types::{ItemFailure, ProcessRequest, ProcessStatus, Stage};

/// Runs the three stages for one process record.
pub struct Orchestrator {
    store: Arc<ProcessStore>,
    downloader: Arc<Downloader>,
    resizer: Arc<Resizer>,
    reformatter: Arc<Reformatter>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ProcessStore>,
        downloader: Downloader,
        resizer: Resizer,
        reformatter: Reformatter,
    ) -> Self {
        Self {
            store,
            downloader: Arc::new(downloader),
            resizer: Arc::new(resizer),
            reformatter: Arc::new(reformatter),
        }
    }

    /// Run every stage for `process_id` and finalize its record.
    ///
    /// The record ends COMPLETED if all stages ran, FAILED if coordination
    /// broke (including a panic here), and gets its `end_time` either way.
    /// Returns the terminal status, or `None` if the record does not exist.
    pub async fn run_pipeline(
        &self,
        request: ProcessRequest,
        process_id: Uuid,
    ) -> Option<ProcessStatus> {
        if !self.store.contains(&process_id) {
            tracing::error!(%process_id, "No record for pipeline, not starting");
            return None;
        }
        tracing::info!(%process_id, urls = request.urls.len(), "Pipeline started");
        self.finish_with(process_id, self.run_stages(&request, process_id))
            .await
    }

    /// Drive `stages` to the end and record how it went, even if it panics.
    async fn finish_with<F>(&self, process_id: Uuid, stages: F) -> Option<ProcessStatus>
    where
        F: Future<Output = Result<()>>,
    {
        let outcome = match AssertUnwindSafe(stages).catch_unwind().await {
            Ok(Ok(())) => Outcome::Completed,
            Ok(Err(e)) => {
                tracing::error!(%process_id, "Pipeline failed: {e}");
                Outcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::error!(%process_id, "Pipeline panicked");
                Outcome::Failed("pipeline coordination panicked".to_string())
            }
        };

        match self.store.finish(&process_id, outcome) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%process_id, "Record was already finalized"),
            Err(e) => {
                tracing::error!(%process_id, "Cannot finalize record: {e}");
                return None;
            }
        }

        let status = self.store.snapshot(&process_id).ok().map(|r| r.status);
        if let Some(status) = status {
            tracing::info!(%process_id, %status, "Pipeline finished");
        }
        status
    }

    async fn run_stages(&self, request: &ProcessRequest, id: Uuid) -> Result<()> {
        let workers = &request.workers;

        self.run_stage(
            id,
            &self.downloader,
            request.urls.clone(),
            workers.download,
            ProcessStore::push_download,
        )
        .await?;

        let downloaded = self.store.snapshot(&id)?.downloaded_paths();
        self.run_stage(
            id,
            &self.resizer,
            downloaded,
            workers.resize,
            ProcessStore::push_resize,
        )
        .await?;

        let resized = self.store.snapshot(&id)?.resized_paths();
        self.run_stage(
            id,
            &self.reformatter,
            resized,
            workers.reformat,
            ProcessStore::push_reformat,
        )
        .await?;

        Ok(())
    }

    /// Run one stage, routing outputs through `push` and failures into the
    /// stage's error accounting.
    async fn run_stage<T, P>(
        &self,
        id: Uuid,
        transform: &Arc<T>,
        items: Vec<T::Input>,
        worker_count: usize,
        push: P,
    ) -> Result<StageSummary>
    where
        T: StageTransform,
        P: Fn(&ProcessStore, &Uuid, T::Output) -> Result<()> + Send + Sync + 'static,
    {
        let stage: Stage = transform.stage();

        let on_success = {
            let store = self.store.clone();
            move |output: T::Output| {
                if let Err(e) = push(&*store, &id, output) {
                    tracing::error!(process_id = %id, %stage, "Cannot record result: {e}");
                }
            }
        };
        let on_error = {
            let store = self.store.clone();
            move |failure: ItemFailure| {
                if let Err(e) = store.record_failure(&id, stage, failure) {
                    tracing::error!(process_id = %id, %stage, "Cannot record failure: {e}");
                }
            }
        };

        let summary = StagePool::new(transform.clone(), worker_count)
            .run(items, on_success, on_error)
            .await?;
        Ok(summary)
    }
}

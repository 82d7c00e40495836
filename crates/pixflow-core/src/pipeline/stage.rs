//! The per-item transform contract shared by every stage.

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::types::Stage;

/// One stage's per-item operation.
///
/// Implementations handle a single input and either produce an output record
/// or fail with an item-scoped [`PipelineError`](crate::error::PipelineError).
/// They never touch the process store; the worker pool routes outputs and
/// failures there.
#[async_trait]
pub trait StageTransform: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// The stage this transform implements.
    fn stage(&self) -> Stage;

    /// Identifier recorded for the item if it fails.
    fn describe(&self, input: &Self::Input) -> String;

    /// Process one item. `worker` is the identity of the calling worker.
    async fn apply(&self, input: Self::Input, worker: &str) -> PipelineResult<Self::Output>;
}

/// Name of the `index`th worker of a stage, e.g. `download-2`.
pub fn worker_name(stage: Stage, index: usize) -> String {
    format!("{stage}-{index}")
}

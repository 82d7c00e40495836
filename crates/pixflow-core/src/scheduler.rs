//! Background execution of submitted runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

/// Spawns one task per process id on a tokio runtime and keeps its handle.
///
/// The submitting caller never waits on the task; [`wait`](Self::wait) is for
/// callers that explicitly want the run to finish.
pub struct Scheduler {
    runtime: Handle,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start `task` in the background.
    pub fn spawn<F>(&self, id: Uuid, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(task);
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(id, handle);
    }

    /// Wait for the task of `id` to finish.
    ///
    /// Returns immediately if there is no task for `id`, or it was already
    /// reaped after finishing.
    pub async fn wait(&self, id: &Uuid) -> Result<(), JoinError> {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        match handle {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    }

    /// Number of tasks not yet finished.
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }
}

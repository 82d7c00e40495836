//! In-memory, process-keyed state for every submitted run.
//!
//! The id map is locked only to look up or insert a record handle. Each
//! record sits behind its own mutex, so workers of one run never contend with
//! another run, and every mutation is a single short critical section.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{PixflowError, Result};
use crate::types::{
    DownloadResult, ItemFailure, ProcessRecord, ProcessRequest, ProcessStatus, ReformatResult,
    ResizeResult, Stage,
};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(String),
}

/// A record plus a channel announcing its status changes.
struct Entry {
    record: Mutex<ProcessRecord>,
    status: watch::Sender<ProcessStatus>,
}

type RecordHandle = Arc<Entry>;

/// Shared store of process records.
///
/// Only exposes atomic operations; callers never get a mutable reference to
/// a record.
pub struct ProcessStore {
    records: RwLock<HashMap<Uuid, RecordHandle>>,
    max_failure_details: usize,
}

impl ProcessStore {
    /// Create an empty store keeping at most `max_failure_details` failed
    /// items with detail per stage.
    pub fn new(max_failure_details: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_failure_details,
        }
    }

    /// Insert a fresh RUNNING record and return its id.
    pub fn create(&self, request: ProcessRequest) -> Uuid {
        let id = Uuid::new_v4();
        let record = ProcessRecord::new(id, request);
        let (status, _) = watch::channel(record.status);
        let entry = Entry {
            record: Mutex::new(record),
            status,
        };
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(id, Arc::new(entry));
        id
    }

    pub fn push_download(&self, id: &Uuid, result: DownloadResult) -> Result<()> {
        self.update(id, |record| record.downloads.push(result))
    }

    pub fn push_resize(&self, id: &Uuid, result: ResizeResult) -> Result<()> {
        self.update(id, |record| record.resizes.push(result))
    }

    pub fn push_reformat(&self, id: &Uuid, result: ReformatResult) -> Result<()> {
        self.update(id, |record| record.reformats.push(result))
    }

    /// Count a failed item against `stage`, keeping its detail while there is room.
    pub fn record_failure(&self, id: &Uuid, stage: Stage, failure: ItemFailure) -> Result<()> {
        let cap = self.max_failure_details;
        self.update(id, |record| {
            let errors = record.errors_mut(stage);
            errors.count += 1;
            if errors.details.len() < cap {
                errors.details.push(failure);
            }
        })
    }

    /// Move a RUNNING record to its terminal status and stamp `end_time`.
    ///
    /// Returns `Ok(false)` without touching the record if it was already
    /// terminal.
    pub fn finish(&self, id: &Uuid, outcome: Outcome) -> Result<bool> {
        let handle = self.handle(id)?;
        let mut record = lock(&handle);
        if record.status.is_terminal() {
            return Ok(false);
        }
        match outcome {
            Outcome::Completed => record.status = ProcessStatus::Completed,
            Outcome::Failed(message) => {
                record.status = ProcessStatus::Failed;
                record.error_message = Some(message);
            }
        }
        record.end_time = Some(Utc::now());
        // Published after the record is terminal.
        handle.status.send_replace(record.status);
        Ok(true)
    }

    /// A consistent copy of the record as it is right now.
    pub fn snapshot(&self, id: &Uuid) -> Result<ProcessRecord> {
        let handle = self.handle(id)?;
        let record = lock(&handle);
        Ok(record.clone())
    }

    /// Wait until the record is terminal and return its final snapshot.
    ///
    /// Any number of callers may wait on the same id.
    pub async fn wait_terminal(&self, id: &Uuid) -> Result<ProcessRecord> {
        let mut status = self.handle(id)?.status.subscribe();
        // The sender lives in the store entry, which is never removed.
        let _ = status.wait_for(|s| s.is_terminal()).await;
        self.snapshot(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, id: &Uuid) -> Result<RecordHandle> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(id).cloned().ok_or(PixflowError::NotFound(*id))
    }

    fn update<R>(&self, id: &Uuid, f: impl FnOnce(&mut ProcessRecord) -> R) -> Result<R> {
        let handle = self.handle(id)?;
        let mut record = lock(&handle);
        Ok(f(&mut record))
    }
}

impl Default for ProcessStore {
    fn default() -> Self {
        Self::new(100)
    }
}

// A panic while holding the lock cannot leave a record half-written: every
// mutation above is a single push or assignment.
fn lock(entry: &Entry) -> MutexGuard<'_, ProcessRecord> {
    entry.record.lock().unwrap_or_else(|e| e.into_inner())
}

//! Fixed-size worker pool that drives one stage over a batch of items.
//!
//! Each worker claims items from a shared [`WorkQueue`] until it comes back
//! empty. A failing item (error or panic inside the transform) is reported
//! through `on_error` and the worker moves on to the next one.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;

use super::queue::{DoneGuard, WorkQueue};
use super::stage::{worker_name, StageTransform};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ItemFailure, Stage};

/// Counts for one completed stage run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Runs a [`StageTransform`] over a batch with `worker_count` parallel workers.
pub struct StagePool<T: StageTransform> {
    transform: Arc<T>,
    worker_count: usize,
}

impl<T: StageTransform> StagePool<T> {
    pub fn new(transform: Arc<T>, worker_count: usize) -> Self {
        Self {
            transform,
            worker_count,
        }
    }

    /// Attempt every item exactly once and wait for all workers to exit.
    ///
    /// `on_success` receives each output, `on_error` each failed item. Calls
    /// arrive from several tasks at once and in no particular order.
    ///
    /// Fails only at the stage level: no workers for a non-empty batch, or a
    /// worker task that died outside the per-item boundary.
    pub async fn run<S, E>(
        &self,
        items: Vec<T::Input>,
        on_success: S,
        on_error: E,
    ) -> PipelineResult<StageSummary>
    where
        S: Fn(T::Output) + Send + Sync + 'static,
        E: Fn(ItemFailure) + Send + Sync + 'static,
    {
        let stage = self.transform.stage();
        let submitted = items.len();
        let start = Instant::now();

        if submitted == 0 {
            tracing::debug!(%stage, "No items, skipping stage");
            return Ok(StageSummary {
                stage,
                submitted,
                succeeded: 0,
                failed: 0,
                elapsed: start.elapsed(),
            });
        }
        if self.worker_count == 0 {
            return Err(PipelineError::NoWorkers {
                stage,
                pending: submitted,
            });
        }

        let queue: Arc<WorkQueue<T::Input>> = Arc::new(items.into_iter().collect());
        let tally = Arc::new(Tally::default());
        let on_success = Arc::new(on_success);
        let on_error = Arc::new(on_error);

        tracing::info!(
            %stage,
            items = submitted,
            workers = self.worker_count,
            "Starting stage"
        );

        let handles: Vec<_> = (0..self.worker_count)
            .map(|index| {
                let worker = Worker {
                    name: worker_name(stage, index),
                    queue: queue.clone(),
                    transform: self.transform.clone(),
                    tally: tally.clone(),
                };
                let on_success = on_success.clone();
                let on_error = on_error.clone();
                tokio::spawn(async move { worker.run(&*on_success, &*on_error).await })
            })
            .collect();

        let mut lost = None;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(%stage, "Worker task failed: {e}");
                lost.get_or_insert_with(|| e.to_string());
            }
        }
        if let Some(message) = lost {
            return Err(PipelineError::WorkerLost { stage, message });
        }

        // Every worker has exited, so this only confirms the barrier.
        queue.join().await;

        let summary = StageSummary {
            stage,
            submitted,
            succeeded: tally.succeeded.load(Ordering::SeqCst),
            failed: tally.failed.load(Ordering::SeqCst),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            %stage,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Stage finished in {:?}",
            summary.elapsed
        );
        Ok(summary)
    }
}

#[derive(Default)]
struct Tally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

struct Worker<T: StageTransform> {
    name: String,
    queue: Arc<WorkQueue<T::Input>>,
    transform: Arc<T>,
    tally: Arc<Tally>,
}

impl<T: StageTransform> Worker<T> {
    async fn run<S, E>(self, on_success: &S, on_error: &E)
    where
        S: Fn(T::Output),
        E: Fn(ItemFailure),
    {
        let stage = self.transform.stage();
        let mut handled = 0usize;

        while let Some(item) = self.queue.try_dequeue() {
            let _done = DoneGuard::new(&self.queue);
            let label = self.transform.describe(&item);
            tracing::debug!(%stage, worker = %self.name, item = %label, "Processing");

            let result = AssertUnwindSafe(self.transform.apply(item, &self.name))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(PipelineError::Panicked {
                        item: label.clone(),
                        message: panic_message(&*panic),
                    })
                });

            match result {
                Ok(output) => {
                    self.tally.succeeded.fetch_add(1, Ordering::SeqCst);
                    on_success(output);
                }
                Err(e) => {
                    tracing::warn!(%stage, worker = %self.name, item = %label, "Item failed: {e}");
                    self.tally.failed.fetch_add(1, Ordering::SeqCst);
                    on_error(ItemFailure {
                        item: label,
                        reason: e.to_string(),
                        worker: self.name.clone(),
                        timestamp: Utc::now(),
                    });
                }
            }
            handled += 1;
        }

        tracing::debug!(%stage, worker = %self.name, handled, "Queue empty, worker exiting");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Doubles its input; fails on multiples of `fail_every` and panics on `panic_on`.
    struct Doubler {
        fail_every: Option<u32>,
        panic_on: Option<u32>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Doubler {
        fn new() -> Self {
            Self {
                fail_every: None,
                panic_on: None,
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StageTransform for Doubler {
        type Input = u32;
        type Output = (u32, String);

        fn stage(&self) -> Stage {
            Stage::Resize
        }

        fn describe(&self, input: &u32) -> String {
            format!("item-{input}")
        }

        async fn apply(&self, input: u32, worker: &str) -> PipelineResult<(u32, String)> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic_on == Some(input) {
                panic!("transform exploded on {input}");
            }
            if let Some(n) = self.fail_every {
                if input % n == 0 {
                    return Err(PipelineError::Decode {
                        path: format!("{input}.png").into(),
                        message: "bad header".to_string(),
                    });
                }
            }
            Ok((input * 2, worker.to_string()))
        }
    }

    type Collected = (Arc<Mutex<Vec<(u32, String)>>>, Arc<Mutex<Vec<ItemFailure>>>);

    async fn run(doubler: Doubler, items: Vec<u32>, workers: usize) -> (PipelineResult<StageSummary>, Collected) {
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let pool = StagePool::new(Arc::new(doubler), workers);
        let summary = {
            let outputs = outputs.clone();
            let failures = failures.clone();
            pool.run(
                items,
                move |out| outputs.lock().unwrap().push(out),
                move |f| failures.lock().unwrap().push(f),
            )
            .await
        };
        (summary, (outputs, failures))
    }

    #[tokio::test]
    async fn test_every_item_attempted_once() {
        let items: Vec<u32> = (1..=50).collect();
        let (summary, (outputs, failures)) = run(Doubler::new(), items, 4).await;
        let summary = summary.unwrap();

        assert_eq!(summary.submitted, 50);
        assert_eq!(summary.succeeded, 50);
        assert_eq!(summary.failed, 0);

        let values: HashSet<u32> = outputs.lock().unwrap().iter().map(|(v, _)| *v).collect();
        let expected: HashSet<u32> = (1..=50).map(|v| v * 2).collect();
        assert_eq!(values, expected);
        assert!(failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successes_plus_errors_equal_submitted() {
        let mut doubler = Doubler::new();
        doubler.fail_every = Some(3);
        let (summary, (outputs, failures)) = run(doubler, (1..=30).collect(), 3).await;
        let summary = summary.unwrap();

        assert_eq!(summary.succeeded + summary.failed, 30);
        assert_eq!(summary.failed, 10);
        assert_eq!(outputs.lock().unwrap().len(), 20);

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 10);
        assert!(failures.iter().all(|f| f.reason.contains("bad header")));
        assert!(failures.iter().any(|f| f.item == "item-3"));
    }

    #[tokio::test]
    async fn test_panic_is_contained_to_its_item() {
        let mut doubler = Doubler::new();
        doubler.panic_on = Some(5);
        let (summary, (outputs, failures)) = run(doubler, (1..=10).collect(), 2).await;
        let summary = summary.unwrap();

        assert_eq!(summary.succeeded, 9);
        assert_eq!(summary.failed, 1);
        assert_eq!(outputs.lock().unwrap().len(), 9);
        let failures = failures.lock().unwrap();
        assert_eq!(failures[0].item, "item-5");
        assert!(failures[0].reason.contains("transform exploded"));
    }

    #[tokio::test]
    async fn test_workers_run_in_parallel_up_to_count() {
        let mut doubler = Doubler::new();
        doubler.delay = Duration::from_millis(20);
        let doubler = Arc::new(doubler);
        let pool = StagePool::new(doubler.clone(), 4);

        let summary = pool.run((0..16).collect(), |_| {}, |_| {}).await.unwrap();
        assert_eq!(summary.succeeded, 16);

        let peak = doubler.max_in_flight.load(Ordering::SeqCst);
        assert!(peak > 1, "expected concurrent workers, peak was {peak}");
        assert!(peak <= 4, "more items in flight than workers: {peak}");
    }

    #[tokio::test]
    async fn test_worker_identity_is_reported() {
        let (summary, (outputs, _)) = run(Doubler::new(), vec![1, 2, 3], 1).await;
        summary.unwrap();
        assert!(outputs
            .lock()
            .unwrap()
            .iter()
            .all(|(_, worker)| worker == "resize-0"));
    }

    #[tokio::test]
    async fn test_zero_workers_with_items_is_rejected() {
        let (summary, _) = run(Doubler::new(), vec![1, 2], 0).await;
        match summary {
            Err(PipelineError::NoWorkers { stage, pending }) => {
                assert_eq!(stage, Stage::Resize);
                assert_eq!(pending, 2);
            }
            other => panic!("expected NoWorkers, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds_with_zero_workers() {
        let (summary, _) = run(Doubler::new(), vec![], 0).await;
        let summary = summary.unwrap();
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.succeeded + summary.failed, 0);
    }

    #[tokio::test]
    async fn test_more_workers_than_items() {
        let (summary, (outputs, _)) = run(Doubler::new(), vec![1, 2], 8).await;
        assert_eq!(summary.unwrap().succeeded, 2);
        assert_eq!(outputs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_callback_reports_worker_lost() {
        let pool = StagePool::new(Arc::new(Doubler::new()), 2);
        let result = pool
            .run((1..=4).collect(), |_| panic!("result sink broke"), |_| {})
            .await;

        let err = result.unwrap_err();
        assert!(err.is_orchestration());
        match err {
            PipelineError::WorkerLost { stage, message } => {
                assert_eq!(stage, Stage::Resize);
                assert!(!message.is_empty());
            }
            other => panic!("expected WorkerLost, got {other:?}"),
        }
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*boxed), "unknown panic payload");
    }
}

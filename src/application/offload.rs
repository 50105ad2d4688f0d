// Offload coordinator - picks inline vs worker execution and always resolves
use crate::application::transform_executor::{run_inline, InlineExecutor, TransformExecutor};
use crate::application::transform_venue::{TransformOutcome, TransformVenue, Venue};
use crate::domain::point::{AggregationPeriod, FilterSpec, Point};
use crate::infrastructure::config::OffloadSettings;
use crate::infrastructure::worker::WorkerHandle;
use crate::infrastructure::worker_protocol::{
    validate_reply, AggregatePayload, FilterPayload, ReplyOutcome, WorkerRequest,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Why an offloaded request fell back to inline execution. Never returned
/// to callers; only logged.
#[derive(Debug, Error, PartialEq)]
pub enum OffloadFailure {
    #[error("worker reported an error: {0}")]
    WorkerError(String),

    #[error("no worker reply within {0:?}")]
    Timeout(Duration),

    #[error("worker channel closed")]
    Disconnected,

    #[error("worker reply did not match the request")]
    MismatchedReply,
}

enum WorkerSlot {
    /// Not started yet; spawned on first large request.
    Idle,
    Running(Arc<WorkerHandle>),
    /// Disabled by config or failed to spawn.
    Unavailable,
    Disposed,
}

/// Lifecycle of one request:
///
/// `submitted -> inline -> done` when the input is at or below the threshold
/// or no worker is available, otherwise
/// `submitted -> dispatched -> done` on a matching worker result, or
/// `submitted -> dispatched -> fallback inline -> done` on a worker error,
/// a mismatched reply or the timeout.
pub struct OffloadCoordinator {
    settings: OffloadSettings,
    executor: Arc<dyn TransformExecutor>,
    worker: Mutex<WorkerSlot>,
    next_request_id: AtomicU64,
}

impl OffloadCoordinator {
    pub fn new(settings: OffloadSettings) -> Self {
        Self::with_executor(settings, Arc::new(InlineExecutor))
    }

    /// `executor` is what the worker thread runs; the inline path always
    /// uses the pure transforms directly.
    pub fn with_executor(settings: OffloadSettings, executor: Arc<dyn TransformExecutor>) -> Self {
        let slot = if settings.worker_enabled {
            WorkerSlot::Idle
        } else {
            WorkerSlot::Unavailable
        };
        Self {
            settings,
            executor,
            worker: Mutex::new(slot),
            next_request_id: AtomicU64::new(1),
        }
    }

    fn slot(&self) -> MutexGuard<'_, WorkerSlot> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Running worker, spawning it on first use.
    fn acquire_worker(&self) -> Option<Arc<WorkerHandle>> {
        let mut slot = self.slot();
        if let WorkerSlot::Running(worker) = &*slot {
            return Some(worker.clone());
        }
        if !matches!(*slot, WorkerSlot::Idle) {
            return None;
        }

        match WorkerHandle::spawn(self.executor.clone()) {
            Ok(worker) => {
                let worker = Arc::new(worker);
                *slot = WorkerSlot::Running(worker.clone());
                Some(worker)
            }
            Err(e) => {
                tracing::warn!("transform worker unavailable, running inline: {}", e);
                *slot = WorkerSlot::Unavailable;
                None
            }
        }
    }

    /// Forget a worker whose channel closed so the next request can start a fresh one.
    fn release_worker(&self, dead: &Arc<WorkerHandle>) {
        let mut slot = self.slot();
        let is_current = matches!(&*slot, WorkerSlot::Running(current) if Arc::ptr_eq(current, dead));
        if is_current && !dead.is_terminated() {
            *slot = WorkerSlot::Idle;
        }
    }

    #[cfg(test)]
    pub fn is_worker_running(&self) -> bool {
        matches!(&*self.slot(), WorkerSlot::Running(_))
    }

    /// Worker replies discarded because their request had already resolved.
    #[cfg(test)]
    pub fn late_replies(&self) -> u64 {
        match &*self.slot() {
            WorkerSlot::Running(worker) => worker.late_replies(),
            _ => 0,
        }
    }

    /// Terminate the worker. Later requests run inline.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.slot(), WorkerSlot::Disposed);
        if let WorkerSlot::Running(worker) = previous {
            tracing::debug!(late_replies = worker.late_replies(), "disposing transform worker");
            worker.terminate();
        }
    }

    async fn execute(&self, request: WorkerRequest) -> TransformOutcome {
        let request_id = request.request_id();
        let size = request.point_count();

        if size <= self.settings.threshold {
            return TransformOutcome {
                points: run_inline(&request),
                venue: Venue::Inline,
            };
        }
        let Some(worker) = self.acquire_worker() else {
            tracing::debug!(request_id, size, "no worker available, running inline");
            return TransformOutcome {
                points: run_inline(&request),
                venue: Venue::Inline,
            };
        };

        tracing::debug!(request_id, size, "dispatching transform to worker");
        match self.dispatch(&worker, &request).await {
            Ok(points) => TransformOutcome {
                points,
                venue: Venue::Worker,
            },
            Err(failure) => {
                tracing::warn!(request_id, "offloaded transform failed, running inline: {}", failure);
                TransformOutcome {
                    points: run_inline(&request),
                    venue: Venue::Fallback,
                }
            }
        }
    }

    async fn dispatch(
        &self,
        worker: &Arc<WorkerHandle>,
        request: &WorkerRequest,
    ) -> Result<Vec<Point>, OffloadFailure> {
        let request_id = request.request_id();
        let kind = request.kind();
        let reply = worker
            .submit(request.clone())
            .map_err(|_| OffloadFailure::Disconnected)?;

        let timeout = self.settings.timeout();
        match tokio::time::timeout(timeout, reply).await {
            Err(_) => {
                // From here on the router has nowhere to deliver this id.
                worker.abandon(request_id);
                Err(OffloadFailure::Timeout(timeout))
            }
            Ok(Err(_)) => {
                self.release_worker(worker);
                Err(OffloadFailure::Disconnected)
            }
            Ok(Ok(response)) => match validate_reply(kind, request_id, response) {
                ReplyOutcome::Result(points) => Ok(points),
                ReplyOutcome::Failed(message) => Err(OffloadFailure::WorkerError(message)),
                ReplyOutcome::Mismatched => Err(OffloadFailure::MismatchedReply),
            },
        }
    }
}

#[async_trait]
impl TransformVenue for OffloadCoordinator {
    async fn filter(&self, points: Arc<[Point]>, spec: FilterSpec) -> TransformOutcome {
        let request_id = self.next_request_id();
        self.execute(WorkerRequest::Filter {
            request_id,
            payload: FilterPayload { points, spec },
        })
        .await
    }

    async fn aggregate(&self, points: Arc<[Point]>, period: AggregationPeriod) -> TransformOutcome {
        let request_id = self.next_request_id();
        self.execute(WorkerRequest::Aggregate {
            request_id,
            payload: AggregatePayload { points, period },
        })
        .await
    }
}

impl Drop for OffloadCoordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}

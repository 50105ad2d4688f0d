// Auxiliary transform worker - one dedicated thread, replies routed by request id
use crate::application::transform_executor::TransformExecutor;
use crate::infrastructure::worker_protocol::{RequestId, WorkerRequest, WorkerResponse};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type ReplyWaiters = HashMap<RequestId, oneshot::Sender<WorkerResponse>>;

#[derive(Debug, Error)]
#[error("transform worker has terminated")]
pub struct WorkerTerminated;

/// Handle to the single worker thread.
///
/// Requests are queued on an unbounded channel and processed one at a time,
/// in submission order. Each submitted request registers a one-shot waiter
/// keyed by its id; the reply router resolves a waiter at most once and
/// discards replies whose waiter is gone (abandoned after a timeout).
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    waiters: Arc<Mutex<ReplyWaiters>>,
    terminated: Arc<AtomicBool>,
    late_replies: Arc<AtomicU64>,
    router: JoinHandle<()>,
}

impl WorkerHandle {
    /// Starts the worker thread and its reply router. Must run inside a tokio runtime.
    pub fn spawn(executor: Arc<dyn TransformExecutor>) -> std::io::Result<Self> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<WorkerResponse>();
        let terminated = Arc::new(AtomicBool::new(false));

        let stop = terminated.clone();
        thread::Builder::new()
            .name("transform-worker".to_string())
            .spawn(move || {
                while let Some(request) = request_rx.blocking_recv() {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let reply = execute_guarded(executor.as_ref(), &request);
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                tracing::debug!("transform worker thread exiting");
            })?;

        let waiters = Arc::new(Mutex::new(ReplyWaiters::new()));
        let late_replies = Arc::new(AtomicU64::new(0));
        let router = tokio::spawn(route_replies(reply_rx, waiters.clone(), late_replies.clone()));

        tracing::info!("transform worker started");
        Ok(Self {
            requests: request_tx,
            waiters,
            terminated,
            late_replies,
            router,
        })
    }

    fn waiters(&self) -> MutexGuard<'_, ReplyWaiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `request` and return the receiver its reply will arrive on.
    pub fn submit(
        &self,
        request: WorkerRequest,
    ) -> Result<oneshot::Receiver<WorkerResponse>, WorkerTerminated> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(WorkerTerminated);
        }

        let request_id = request.request_id();
        let (tx, rx) = oneshot::channel();
        self.waiters().insert(request_id, tx);

        if self.requests.send(request).is_err() {
            self.waiters().remove(&request_id);
            return Err(WorkerTerminated);
        }
        Ok(rx)
    }

    /// Close the completion gate for `request_id`. Returns false when the
    /// reply was already delivered.
    pub fn abandon(&self, request_id: RequestId) -> bool {
        self.waiters().remove(&request_id).is_some()
    }

    /// Replies that arrived after their request was abandoned.
    pub fn late_replies(&self) -> u64 {
        self.late_replies.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.waiters().len()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Stop the worker. Queued requests are skipped and every outstanding
    /// waiter is dropped, which wakes its caller with a closed channel.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.router.abort();
        self.waiters().clear();
        tracing::info!("transform worker terminated");
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn execute_guarded(executor: &dyn TransformExecutor, request: &WorkerRequest) -> WorkerResponse {
    panic::catch_unwind(AssertUnwindSafe(|| executor.execute(request))).unwrap_or_else(|cause| {
        let message = cause
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string());
        WorkerResponse::Error {
            request_id: request.request_id(),
            message,
        }
    })
}

async fn route_replies(
    mut replies: mpsc::UnboundedReceiver<WorkerResponse>,
    waiters: Arc<Mutex<ReplyWaiters>>,
    late_replies: Arc<AtomicU64>,
) {
    while let Some(reply) = replies.recv().await {
        let request_id = reply.request_id();
        let waiter = waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);

        match waiter {
            Some(tx) => {
                // Receiver may already be gone if the caller gave up; either way the gate is closed.
                let _ = tx.send(reply);
            }
            None => {
                late_replies.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(request_id, "discarding late worker reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transform_executor::InlineExecutor;
    use crate::domain::point::{FilterSpec, Point};
    use crate::infrastructure::worker_protocol::FilterPayload;
    use std::time::Duration;

    fn filter_request(request_id: RequestId) -> WorkerRequest {
        WorkerRequest::Filter {
            request_id,
            payload: FilterPayload {
                points: vec![Point::new(1, 10.0), Point::new(2, 20.0)].into(),
                spec: FilterSpec {
                    min_value: Some(15.0),
                    ..Default::default()
                },
            },
        }
    }

    struct Panicking;

    impl TransformExecutor for Panicking {
        fn execute(&self, _request: &WorkerRequest) -> WorkerResponse {
            panic!("transform exploded");
        }
    }

    struct Sleepy(Duration);

    impl TransformExecutor for Sleepy {
        fn execute(&self, request: &WorkerRequest) -> WorkerResponse {
            thread::sleep(self.0);
            InlineExecutor.execute(request)
        }
    }

    #[tokio::test]
    async fn test_replies_are_correlated() {
        let worker = WorkerHandle::spawn(Arc::new(InlineExecutor)).unwrap();
        let first = worker.submit(filter_request(1)).unwrap();
        let second = worker.submit(filter_request(2)).unwrap();

        assert_eq!(second.await.unwrap().request_id(), 2);
        assert_eq!(first.await.unwrap().request_id(), 1);
        assert_eq!(worker.pending(), 0);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_reply() {
        let worker = WorkerHandle::spawn(Arc::new(Panicking)).unwrap();
        let reply = worker.submit(filter_request(5)).unwrap().await.unwrap();
        assert_eq!(
            reply,
            WorkerResponse::Error {
                request_id: 5,
                message: "transform exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_abandoned_reply_is_discarded() {
        let worker = WorkerHandle::spawn(Arc::new(Sleepy(Duration::from_millis(100)))).unwrap();
        let reply = worker.submit(filter_request(8)).unwrap();
        assert!(worker.abandon(8));
        drop(reply);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(worker.late_replies(), 1);
        assert_eq!(worker.pending(), 0);
    }

    #[tokio::test]
    async fn test_terminate_wakes_waiters_and_rejects_submissions() {
        let worker = WorkerHandle::spawn(Arc::new(Sleepy(Duration::from_millis(100)))).unwrap();
        let reply = worker.submit(filter_request(1)).unwrap();
        worker.terminate();

        assert!(reply.await.is_err());
        assert!(worker.is_terminated());
        assert!(worker.submit(filter_request(2)).is_err());
    }
}

// Executes worker requests - the same pure transforms on either venue
use crate::domain::aggregate::aggregate;
use crate::domain::filter::filter;
use crate::domain::point::Point;
use crate::infrastructure::worker_protocol::{WorkerRequest, WorkerResponse};

/// Runs a request to completion on whatever thread calls it.
pub trait TransformExecutor: Send + Sync {
    fn execute(&self, request: &WorkerRequest) -> WorkerResponse;
}

/// The transform a request asks for, computed directly. Both the worker and
/// the inline fallback go through here.
pub fn run_inline(request: &WorkerRequest) -> Vec<Point> {
    match request {
        WorkerRequest::Aggregate { payload, .. } => aggregate(&payload.points, &payload.period),
        WorkerRequest::Filter { payload, .. } => filter(&payload.points, &payload.spec),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl TransformExecutor for InlineExecutor {
    fn execute(&self, request: &WorkerRequest) -> WorkerResponse {
        let payload = run_inline(request);
        match request {
            WorkerRequest::Aggregate { request_id, .. } => WorkerResponse::AggregateResult {
                request_id: *request_id,
                payload,
            },
            WorkerRequest::Filter { request_id, .. } => WorkerResponse::FilterResult {
                request_id: *request_id,
                payload,
            },
        }
    }
}

// Worker message protocol - closed tagged unions exchanged with the transform worker
use crate::domain::point::{AggregationPeriod, FilterSpec, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePayload {
    pub points: Arc<[Point]>,
    pub period: AggregationPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPayload {
    pub points: Arc<[Point]>,
    pub spec: FilterSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkerRequest {
    Aggregate {
        request_id: RequestId,
        payload: AggregatePayload,
    },
    Filter {
        request_id: RequestId,
        payload: FilterPayload,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Aggregate,
    Filter,
}

impl WorkerRequest {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerRequest::Aggregate { request_id, .. } | WorkerRequest::Filter { request_id, .. } => {
                *request_id
            }
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            WorkerRequest::Aggregate { .. } => RequestKind::Aggregate,
            WorkerRequest::Filter { .. } => RequestKind::Filter,
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            WorkerRequest::Aggregate { payload, .. } => payload.points.len(),
            WorkerRequest::Filter { payload, .. } => payload.points.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkerResponse {
    AggregateResult {
        request_id: RequestId,
        payload: Vec<Point>,
    },
    FilterResult {
        request_id: RequestId,
        payload: Vec<Point>,
    },
    Error {
        request_id: RequestId,
        message: String,
    },
}

impl WorkerResponse {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerResponse::AggregateResult { request_id, .. }
            | WorkerResponse::FilterResult { request_id, .. }
            | WorkerResponse::Error { request_id, .. } => *request_id,
        }
    }
}

/// What a reply means for the request it answers.
#[derive(Debug, PartialEq)]
pub enum ReplyOutcome {
    Result(Vec<Point>),
    Failed(String),
    Mismatched,
}

/// Check a reply against the request it claims to answer before consuming it.
pub fn validate_reply(kind: RequestKind, request_id: RequestId, response: WorkerResponse) -> ReplyOutcome {
    if response.request_id() != request_id {
        return ReplyOutcome::Mismatched;
    }
    match (kind, response) {
        (RequestKind::Aggregate, WorkerResponse::AggregateResult { payload, .. })
        | (RequestKind::Filter, WorkerResponse::FilterResult { payload, .. }) => ReplyOutcome::Result(payload),
        (_, WorkerResponse::Error { message, .. }) => ReplyOutcome::Failed(message),
        _ => ReplyOutcome::Mismatched,
    }
}

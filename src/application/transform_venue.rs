// Venue abstraction the pipeline depends on
use crate::domain::point::{AggregationPeriod, FilterSpec, Point};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Where a transform actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Inline,
    Worker,
    /// Dispatched to the worker, then recomputed inline after an error or timeout.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub points: Vec<Point>,
    pub venue: Venue,
}

/// Runs filter/aggregate somewhere and always yields a result. The result
/// must not depend on the venue chosen.
#[async_trait]
pub trait TransformVenue: Send + Sync {
    async fn filter(&self, points: Arc<[Point]>, spec: FilterSpec) -> TransformOutcome;

    async fn aggregate(&self, points: Arc<[Point]>, period: AggregationPeriod) -> TransformOutcome;
}

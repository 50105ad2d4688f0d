// Transform pipeline - filter, aggregate, then prepare for display
use crate::application::transform_venue::{TransformVenue, Venue};
use crate::domain::indicators::{bounds, decimate, ema, moving_average, render_budget};
use crate::domain::point::{AggregationKind, AggregationPeriod, Bounds, FilterSpec, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformRequest {
    pub filters: FilterSpec,
    pub aggregation: Option<AggregationKind>,
    pub max_points: Option<usize>,
    pub moving_average_period: Option<usize>,
    pub ema_period: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedView {
    /// Display series after decimation.
    pub points: Vec<Point>,
    pub bounds: Bounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_average: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema: Option<Vec<Point>>,
    /// Length of the series before decimation.
    pub total_points: usize,
    /// Venue of the last offloadable step, if any ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<Venue>,
}

#[derive(Clone)]
pub struct TransformPipeline {
    venue: Arc<dyn TransformVenue>,
    chart_width: usize,
}

impl TransformPipeline {
    pub fn new(venue: Arc<dyn TransformVenue>, chart_width: usize) -> Self {
        Self { venue, chart_width }
    }

    pub async fn run(&self, points: Arc<[Point]>, request: &TransformRequest) -> TransformedView {
        let mut venue = None;

        let filtered: Arc<[Point]> = if request.filters.is_empty() {
            points
        } else {
            let outcome = self.venue.filter(points, request.filters.clone()).await;
            venue = Some(outcome.venue);
            outcome.points.into()
        };

        let series: Arc<[Point]> = match request.aggregation {
            Some(kind) => {
                let outcome = self
                    .venue
                    .aggregate(filtered, AggregationPeriod::from(kind))
                    .await;
                venue = Some(outcome.venue);
                outcome.points.into()
            }
            None => filtered,
        };

        let max_points = request
            .max_points
            .unwrap_or_else(|| render_budget(self.chart_width));
        let display = decimate(&series, max_points);

        TransformedView {
            bounds: bounds(&display),
            moving_average: request.moving_average_period.map(|p| moving_average(&series, p)),
            ema: request.ema_period.map(|p| ema(&series, p)),
            total_points: series.len(),
            points: display,
            venue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::offload::OffloadCoordinator;
    use crate::infrastructure::config::OffloadSettings;

    fn pipeline() -> TransformPipeline {
        let coordinator = Arc::new(OffloadCoordinator::new(OffloadSettings::default()));
        TransformPipeline::new(coordinator, 800)
    }

    fn ramp(count: i64) -> Arc<[Point]> {
        (0..count)
            .map(|i| Point::new(i * 100, i as f64))
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn test_empty_request_only_decimates() {
        let view = pipeline().run(ramp(4000), &TransformRequest::default()).await;
        assert_eq!(view.total_points, 4000);
        assert!(view.points.len() <= 1600);
        assert_eq!(view.venue, None);
        assert!(view.moving_average.is_none());
        assert!(view.ema.is_none());
    }

    #[tokio::test]
    async fn test_filter_aggregate_and_indicators() {
        let request = TransformRequest {
            filters: FilterSpec {
                min_value: Some(100.0),
                ..Default::default()
            },
            aggregation: Some(AggregationKind::OneMinute),
            moving_average_period: Some(2),
            ema_period: Some(2),
            ..Default::default()
        };
        // Values 100..1299 sit at 10s..129.9s: buckets at 0, 60s and 120s.
        let view = pipeline().run(ramp(1300), &request).await;

        assert_eq!(view.venue, Some(Venue::Inline));
        let stamps: Vec<i64> = view.points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![0, 60_000, 120_000]);
        let counted: u64 = view.points.iter().filter_map(Point::original_count).sum();
        assert_eq!(counted, 1200);

        assert_eq!(view.moving_average.as_ref().map(Vec::len), Some(2));
        assert_eq!(view.ema.as_ref().map(Vec::len), Some(3));
        assert_eq!(view.bounds.min_x, 0.0);
        assert_eq!(view.bounds.max_x, 120_000.0);
    }

    #[tokio::test]
    async fn test_explicit_point_budget() {
        let request = TransformRequest {
            max_points: Some(10),
            ..Default::default()
        };
        let view = pipeline().run(ramp(100), &request).await;
        assert_eq!(view.points.len(), 10);
        assert_eq!(view.total_points, 100);
    }
}

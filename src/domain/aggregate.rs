// Fixed-width time bucket averaging
use super::point::{AggregationPeriod, Metadata, Point, META_AGGREGATED, META_ORIGINAL_COUNT};
use serde_json::Value;
use std::collections::BTreeMap;

/// Left-closed bucket containing `timestamp`.
pub fn bucket_key(timestamp: i64, period: &AggregationPeriod) -> i64 {
    let width = i64::try_from(period.milliseconds.get()).unwrap_or(i64::MAX);
    timestamp.div_euclid(width) * width
}

/// One mean point per non-empty bucket, ascending by bucket start. Each
/// output point records how many inputs it absorbed in `originalCount`.
pub fn aggregate(points: &[Point], period: &AggregationPeriod) -> Vec<Point> {
    let mut buckets: BTreeMap<i64, (f64, u64)> = BTreeMap::new();
    for point in points {
        let entry = buckets.entry(bucket_key(point.timestamp, period)).or_insert((0.0, 0));
        entry.0 += point.value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(timestamp, (sum, count))| {
            let mut metadata = Metadata::new();
            metadata.insert(META_AGGREGATED.to_string(), Value::Bool(true));
            metadata.insert(META_ORIGINAL_COUNT.to_string(), Value::from(count));
            Point::new(timestamp, sum / count as f64).with_metadata(metadata)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::point::AggregationKind;

    fn one_minute() -> AggregationPeriod {
        AggregationKind::OneMinute.into()
    }

    #[test]
    fn test_single_bucket_mean() {
        let data = vec![
            Point::new(1000, 10.0),
            Point::new(1100, 20.0),
            Point::new(1200, 30.0),
            Point::new(2000, 40.0),
            Point::new(2100, 50.0),
        ];
        let aggregated = aggregate(&data, &one_minute());
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].timestamp, 0);
        assert_eq!(aggregated[0].value, 30.0);
        assert_eq!(aggregated[0].original_count(), Some(5));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[], &one_minute()).is_empty());
    }

    #[test]
    fn test_sorted_output_and_count_conservation() {
        // Deliberately out of order across several buckets.
        let data = vec![
            Point::new(185_000, 4.0),
            Point::new(5_000, 1.0),
            Point::new(125_000, 3.0),
            Point::new(65_000, 2.0),
            Point::new(59_999, 5.0),
            Point::new(60_000, 6.0),
        ];
        let aggregated = aggregate(&data, &one_minute());
        let stamps: Vec<i64> = aggregated.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![0, 60_000, 120_000, 180_000]);

        let total: u64 = aggregated.iter().filter_map(Point::original_count).sum();
        assert_eq!(total, data.len() as u64);
        assert_eq!(aggregated[0].value, 3.0);
        assert_eq!(aggregated[1].value, 4.0);
    }

    #[test]
    fn test_bucket_key_is_left_closed() {
        let period = one_minute();
        assert_eq!(bucket_key(0, &period), 0);
        assert_eq!(bucket_key(59_999, &period), 0);
        assert_eq!(bucket_key(60_000, &period), 60_000);
    }
}

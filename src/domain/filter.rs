// Predicate-based point selection
use super::point::{FilterSpec, Point};

/// Repair malformed bounds instead of rejecting the request: non-finite
/// bounds are dropped and inverted bounds are swapped.
pub fn sanitize(spec: &FilterSpec) -> FilterSpec {
    let mut spec = spec.clone();

    if spec.min_value.is_some_and(|v| !v.is_finite()) {
        tracing::warn!(min_value = ?spec.min_value, "filter minValue is not a finite number, ignoring");
        spec.min_value = None;
    }
    if spec.max_value.is_some_and(|v| !v.is_finite()) {
        tracing::warn!(max_value = ?spec.max_value, "filter maxValue is not a finite number, ignoring");
        spec.max_value = None;
    }
    if let (Some(min), Some(max)) = (spec.min_value, spec.max_value) {
        if min > max {
            tracing::warn!(min, max, "filter minValue is greater than maxValue, swapping");
            spec.min_value = Some(max);
            spec.max_value = Some(min);
        }
    }

    spec
}

fn matches(point: &Point, spec: &FilterSpec) -> bool {
    if !point.value.is_finite() {
        return false;
    }
    // Uncategorised points are never excluded by a category set.
    if let (Some(categories), Some(category)) = (&spec.categories, &point.category) {
        if !categories.contains(category) {
            return false;
        }
    }
    if spec.min_value.is_some_and(|min| point.value < min) {
        return false;
    }
    if spec.max_value.is_some_and(|max| point.value > max) {
        return false;
    }
    if let Some(range) = spec.time_range {
        if point.timestamp < range.start || point.timestamp > range.end {
            return false;
        }
    }
    true
}

/// Stable subset of `points` satisfying every predicate present in `spec`.
/// An empty spec returns the input unchanged.
pub fn filter(points: &[Point], spec: &FilterSpec) -> Vec<Point> {
    if spec.is_empty() {
        return points.to_vec();
    }
    let spec = sanitize(spec);
    points.iter().filter(|p| matches(p, &spec)).cloned().collect()
}

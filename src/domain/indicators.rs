// Render-prep transforms: decimation, bounds and moving averages
use super::point::{Bounds, Point};

/// Display budget for a chart `width_px` wide: two points per pixel.
pub fn render_budget(width_px: usize) -> usize {
    width_px.saturating_mul(2)
}

/// Uniform-stride subsample keeping every `ceil(len / max_points)`-th point.
///
/// No averaging or interpolation happens, so a spike that falls between two
/// sampled indices is dropped. That is the accepted price for O(n/k) output.
/// `max_points == 0` yields nothing.
pub fn decimate(points: &[Point], max_points: usize) -> Vec<Point> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    if max_points == 0 {
        return Vec::new();
    }
    let step = points.len().div_ceil(max_points);
    points.iter().step_by(step).cloned().collect()
}

/// Single pass min/max of timestamp and value; all zeros when empty.
pub fn bounds(points: &[Point]) -> Bounds {
    let Some(first) = points.first() else {
        return Bounds::default();
    };

    let seed = Bounds {
        min_x: first.timestamp as f64,
        max_x: first.timestamp as f64,
        min_y: first.value,
        max_y: first.value,
    };
    points.iter().skip(1).fold(seed, |b, p| {
        let x = p.timestamp as f64;
        Bounds {
            min_x: b.min_x.min(x),
            max_x: b.max_x.max(x),
            min_y: b.min_y.min(p.value),
            max_y: b.max_y.max(p.value),
        }
    })
}

/// Trailing simple moving average. Yields `len - period + 1` points, the
/// first stamped with the timestamp of `points[period - 1]`.
pub fn moving_average(points: &[Point], period: usize) -> Vec<Point> {
    if period == 0 || points.len() < period {
        return Vec::new();
    }
    points
        .windows(period)
        .map(|window| {
            let sum: f64 = window.iter().map(|p| p.value).sum();
            let last = &window[period - 1];
            Point::new(last.timestamp, sum / period as f64)
        })
        .collect()
}

/// Exponential moving average seeded with the first value. Unlike
/// [`moving_average`] this emits one point per input point; callers align
/// the two series by timestamp, not by index.
pub fn ema(points: &[Point], period: usize) -> Vec<Point> {
    if period == 0 || points.len() < period {
        return Vec::new();
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut current = points[0].value;

    let mut out = Vec::with_capacity(points.len());
    out.push(Point::new(points[0].timestamp, current));
    for point in &points[1..] {
        current = (point.value - current) * multiplier + current;
        out.push(Point::new(point.timestamp, current));
    }
    out
}

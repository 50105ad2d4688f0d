// Retained live window - bounded most-recent point buffer
use super::point::Point;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_CAPACITY: usize = 10_000;

/// Keeps at most `capacity` most-recent points. Appending past the cap drops
/// the oldest points for good.
#[derive(Debug, Clone)]
pub struct RetainedWindow {
    capacity: usize,
    points: VecDeque<Point>,
}

impl RetainedWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity.min(DEFAULT_WINDOW_CAPACITY)),
        }
    }

    pub fn push(&mut self, point: Point) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = Point>) {
        for point in points {
            self.push(point);
        }
    }

    /// Drop everything and start over from `points` (still capped).
    pub fn replace(&mut self, points: Vec<Point>) {
        self.points.clear();
        self.extend(points);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<Point> {
        self.points.iter().cloned().collect()
    }
}

impl Default for RetainedWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let mut window = RetainedWindow::new(3);
        window.extend((0..5).map(|i| Point::new(i * 100, i as f64)));
        assert_eq!(window.len(), 3);
        let stamps: Vec<i64> = window.to_vec().iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![200, 300, 400]);
        assert_eq!(window.last().map(|p| p.timestamp), Some(400));
    }

    #[test]
    fn test_default_capacity() {
        let mut window = RetainedWindow::default();
        assert_eq!(window.capacity(), 10_000);
        window.replace((0..10_050).map(|i| Point::new(i, 1.0)).collect());
        assert_eq!(window.len(), 10_000);
        assert_eq!(window.to_vec()[0].timestamp, 50);
    }

    #[test]
    fn test_clear() {
        let mut window = RetainedWindow::new(10);
        window.push(Point::new(1, 1.0));
        window.clear();
        assert!(window.is_empty());
        assert!(window.last().is_none());
    }
}

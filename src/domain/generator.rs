// Synthetic signal generator: trend + sinusoid + uniform noise
use super::error::ValidationError;
use super::point::{Metadata, Point, META_ERROR, META_GENERATED};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;
use std::f64::consts::PI;

/// Spacing between consecutive points of the initial dataset and the live stream.
pub const POINT_SPACING_MS: i64 = 100;

/// Upper bound on `generate_initial_dataset`.
pub const MAX_INITIAL_POINTS: usize = 100_000;

/// Largest `t` (seconds) fed into the model; keeps `trend * t` well inside f64 range.
const MAX_SAFE_SECONDS: f64 = 9_007_199_254_740_991.0 / 1000.0;

const SINE_AMPLITUDE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorState {
    pub base_value: f64,
    /// Drift per second.
    pub trend: f64,
    pub noise_amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            base_value: 100.0,
            trend: 0.1,
            noise_amplitude: 10.0,
            frequency: 0.001,
            phase: 0.0,
        }
    }
}

/// Owns its state and noise source exclusively. Generation never touches
/// `state`; only the RNG advances between calls.
#[derive(Debug)]
pub struct Generator<R = StdRng> {
    state: GeneratorState,
    rng: R,
}

impl Generator<StdRng> {
    pub fn new(state: GeneratorState) -> Self {
        Self::with_rng(state, StdRng::from_os_rng())
    }

    #[cfg(test)]
    pub fn seeded(state: GeneratorState, seed: u64) -> Self {
        Self::with_rng(state, StdRng::seed_from_u64(seed))
    }
}

impl Default for Generator<StdRng> {
    fn default() -> Self {
        Self::new(GeneratorState::default())
    }
}

impl<R: Rng> Generator<R> {
    pub fn with_rng(state: GeneratorState, rng: R) -> Self {
        Self { state, rng }
    }

    #[cfg(test)]
    pub fn state(&self) -> &GeneratorState {
        &self.state
    }

    pub fn generate_point(
        &mut self,
        timestamp: i64,
        category: Option<&str>,
    ) -> Result<Point, ValidationError> {
        if timestamp < 0 {
            return Err(ValidationError::InvalidTimestamp(timestamp as f64));
        }

        let t = (timestamp as f64 / 1000.0).min(MAX_SAFE_SECONDS);
        let s = &self.state;
        let trend = s.base_value + s.trend * t;
        let wave = (2.0 * PI * s.frequency * t + s.phase).sin() * SINE_AMPLITUDE;
        let noise = (self.rng.random::<f64>() - 0.5) * s.noise_amplitude;
        let raw = trend + wave + noise;

        let mut metadata = Metadata::new();
        metadata.insert(META_GENERATED.to_string(), Value::Bool(true));

        // f64::max swallows NaN, so check before clamping.
        let value = if raw.is_finite() {
            (raw.max(0.0) * 100.0).round() / 100.0
        } else {
            tracing::warn!(timestamp, "generated non-finite value, using base value");
            metadata.insert(
                META_ERROR.to_string(),
                Value::String("Invalid value generated, used baseValue".to_string()),
            );
            s.base_value
        };

        let point = Point::new(timestamp, value).with_metadata(metadata);
        Ok(match category {
            Some(category) => point.with_category(category),
            None => point,
        })
    }

    /// Points every `interval_ms` from `start` through `end` inclusive.
    pub fn generate_batch(
        &mut self,
        start: i64,
        end: i64,
        interval_ms: i64,
        category: Option<&str>,
    ) -> Result<Vec<Point>, ValidationError> {
        if interval_ms <= 0 {
            return Err(ValidationError::InvalidInterval(interval_ms));
        }
        if start < 0 {
            return Err(ValidationError::InvalidTimestamp(start as f64));
        }
        if start > end {
            return Ok(Vec::new());
        }

        let len = end
            .checked_sub(start)
            .map_or(MAX_INITIAL_POINTS, |span| (span / interval_ms) as usize + 1);
        let mut points = Vec::with_capacity(len.min(MAX_INITIAL_POINTS));
        let mut timestamp = start;
        while timestamp <= end {
            points.push(self.generate_point(timestamp, category)?);
            match timestamp.checked_add(interval_ms) {
                Some(next) => timestamp = next,
                None => break,
            }
        }
        Ok(points)
    }

    pub fn generate_initial_dataset(&mut self, count: i64) -> Result<Vec<Point>, ValidationError> {
        self.generate_initial_dataset_at(count, chrono::Utc::now().timestamp_millis())
    }

    /// `count` points spaced 100ms apart, the last one stamped `now`.
    pub fn generate_initial_dataset_at(
        &mut self,
        count: i64,
        now: i64,
    ) -> Result<Vec<Point>, ValidationError> {
        if count < 0 {
            return Err(ValidationError::InvalidCount(count as f64));
        }
        let requested = count as usize;
        let count = requested.min(MAX_INITIAL_POINTS);
        if count != requested {
            tracing::warn!(requested, limit = count, "initial dataset count clamped");
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        // Anchor at zero rather than fail when `now` is too early for the full span.
        let span = (count as i64 - 1) * POINT_SPACING_MS;
        let start = now.saturating_sub(span).max(0);
        let end = start.saturating_add(span);
        self.generate_batch(start, end, POINT_SPACING_MS, None)
    }

    /// Continue from `previous`, or anchor on the wall clock when there is none.
    pub fn generate_next_point(&mut self, previous: Option<&Point>) -> Result<Point, ValidationError> {
        let timestamp = match previous {
            Some(p) => p
                .timestamp
                .checked_add(POINT_SPACING_MS)
                .ok_or(ValidationError::InvalidTimestamp(p.timestamp as f64))?,
            None => chrono::Utc::now().timestamp_millis(),
        };
        self.generate_point(timestamp, None)
    }
}

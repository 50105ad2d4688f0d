// Point and transform-request domain models
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU64;

pub type Metadata = BTreeMap<String, Value>;

pub const META_GENERATED: &str = "generated";
pub const META_ERROR: &str = "error";
pub const META_AGGREGATED: &str = "aggregated";
pub const META_ORIGINAL_COUNT: &str = "originalCount";

/// A single observation. Points are never mutated after they are produced;
/// transforms always build new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub timestamp: i64,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Point {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            value,
            category: None,
            metadata: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[cfg(test)]
    fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Number of raw points folded into this one by aggregation.
    #[cfg(test)]
    pub fn original_count(&self) -> Option<u64> {
        self.meta(META_ORIGINAL_COUNT).and_then(Value::as_u64)
    }

    /// True when generation overflowed and the point fell back to the base value.
    #[cfg(test)]
    pub fn is_degraded(&self) -> bool {
        self.meta(META_ERROR).is_some()
    }
}

/// Min/max of timestamp (x) and value (y) over a point set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Inclusive time interval in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.categories.is_none()
            && self.min_value.is_none()
            && self.max_value.is_none()
            && self.time_range.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "1hour")]
    OneHour,
}

impl AggregationKind {
    pub fn label(&self) -> &'static str {
        match self {
            AggregationKind::OneMinute => "1 Minute",
            AggregationKind::FiveMinutes => "5 Minutes",
            AggregationKind::OneHour => "1 Hour",
        }
    }

    pub fn milliseconds(&self) -> NonZeroU64 {
        let ms = match self {
            AggregationKind::OneMinute => 60_000,
            AggregationKind::FiveMinutes => 5 * 60_000,
            AggregationKind::OneHour => 60 * 60_000,
        };
        NonZeroU64::new(ms).unwrap_or(NonZeroU64::MIN)
    }
}

/// Bucket width used by the aggregator. `milliseconds` is non-zero by type,
/// so a deserialized period can never cause a zero-width bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPeriod {
    #[serde(rename = "type")]
    pub kind: AggregationKind,
    pub label: String,
    pub milliseconds: NonZeroU64,
}

impl From<AggregationKind> for AggregationPeriod {
    fn from(kind: AggregationKind) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            milliseconds: kind.milliseconds(),
        }
    }
}

// Validation failures surfaced to callers of the generator
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid timestamp: {0}. Timestamp must be a non-negative finite number")]
    InvalidTimestamp(f64),

    #[error("invalid count: {0}. Count must be a non-negative integer")]
    InvalidCount(f64),

    #[error("invalid interval: {0}ms. Interval must be positive")]
    InvalidInterval(i64),
}

/// Convert a raw (possibly fractional or non-finite) timestamp from an
/// external caller into epoch milliseconds.
pub fn validate_timestamp(raw: f64) -> Result<i64, ValidationError> {
    if !raw.is_finite() || raw < 0.0 || raw > i64::MAX as f64 {
        return Err(ValidationError::InvalidTimestamp(raw));
    }
    Ok(raw.trunc() as i64)
}

/// Convert a raw count into a non-negative integer.
pub fn validate_count(raw: f64) -> Result<usize, ValidationError> {
    if !raw.is_finite() || raw < 0.0 || raw.fract() != 0.0 {
        return Err(ValidationError::InvalidCount(raw));
    }
    Ok(raw as usize)
}

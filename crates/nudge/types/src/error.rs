//! Error types for metrics validation.

use thiserror::Error;

/// Reasons a [`MetricsSnapshot`](crate::MetricsSnapshot) is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// A required numeric field was absent.
    #[error("required metric `{0}` is missing")]
    Missing(&'static str),

    /// A numeric field was below zero.
    #[error("metric `{field}` must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// A numeric field was NaN or infinite.
    #[error("metric `{0}` is not a finite number")]
    NotFinite(&'static str),
}

/// Result type for metrics validation.
pub type MetricsResult<T> = Result<T, MetricsError>;

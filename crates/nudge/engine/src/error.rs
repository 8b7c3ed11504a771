//! Error types for the insight engine.

use nudge_types::InsightId;
use thiserror::Error;

/// A rule-local failure. Never escapes the rule set.
#[derive(Debug, Clone, Error)]
#[error("rule `{rule}` failed: {message}")]
pub struct RuleError {
    pub rule: String,
    pub message: String,
}

impl RuleError {
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Result type for a single rule evaluation.
pub type RuleResult<T> = Result<T, RuleError>;

/// Storage-layer errors for persisted insight records and audit events.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by the state synchronizer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The requested transition is not allowed from the record's status.
    #[error("invalid transition for {insight_id}: cannot {action} a {status} insight")]
    InvalidTransition {
        insight_id: InsightId,
        action: &'static str,
        status: String,
    },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

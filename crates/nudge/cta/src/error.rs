//! Error types for CTA configuration.

use nudge_types::CtaIntent;
use thiserror::Error;

/// CTA errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CtaError {
    /// A visible intent was configured without somewhere to send the user.
    #[error("intent {intent} has no action target")]
    MissingTarget { intent: CtaIntent },

    #[error("invalid target for {intent}: {reason}")]
    InvalidTarget { intent: CtaIntent, reason: String },
}

/// Result type for CTA operations.
pub type CtaResult<T> = Result<T, CtaError>;

//! Error types for the diagnostic layer.

use thiserror::Error;

/// Export rejections. Always hard errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// Live transport targets are never allowed.
    #[error("unsafe export target `{0}`: only static file formats are permitted")]
    UnsafeTarget(String),

    #[error("unsupported export target `{0}` (expected json, csv or pdf_metadata)")]
    UnsupportedTarget(String),

    #[error("export artifact is missing the disclaimer")]
    MissingDisclaimer,

    #[error("export artifact is missing the retention notice")]
    MissingRetentionNotice,

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Ledger storage errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("ledger backend error: {0}")]
    Backend(String),

    #[error("duplicate ledger event: {0}")]
    DuplicateEvent(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            ExportError::UnsafeTarget("webhook".into()).to_string(),
            "unsafe export target `webhook`: only static file formats are permitted"
        );
        assert!(ExportError::UnsupportedTarget("xml".into())
            .to_string()
            .contains("pdf_metadata"));
        assert_eq!(
            LedgerError::Backend("lock poisoned".into()).to_string(),
            "ledger backend error: lock poisoned"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExportError>();
        assert_send_sync::<LedgerError>();
    }
}

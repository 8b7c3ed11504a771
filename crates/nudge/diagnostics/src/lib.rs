//! # nudge-diagnostics
//!
//! Read-only observers of decision outcomes, for human review.
//!
//! ```text
//!   exposures / actions / dismissals
//!                │
//!                ▼
//!   ┌──────────────────────┐     ┌──────────────────┐
//!   │ memory (ledger)      │────▶│ analytics        │──┐
//!   └──────────────────────┘     └──────────────────┘  │
//!   ┌──────────────────────┐                           ├──▶ admin ──▶ export
//!   │ lifecycle classifier │───────────────────────────┘    (json | csv | pdf_metadata)
//!   └──────────────────────┘
//! ```
//!
//! Nothing in this crate is reachable from the decision crates: they do not
//! depend on it. In addition every public entry point calls
//! [`guard::assert_outside_decision_path`], which panics if a decision stage
//! is open on the current thread.

#![deny(unsafe_code)]

pub mod admin;
pub mod analytics;
pub mod config;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod memory;

// ── Re-exports ─────────────────────────────────────────────────────────

pub use admin::{
    compose, export, export_to, summarize_governance, verify_export, AdminInputs, AdminSnapshot,
    ExportArtifact, ExportTarget, GovernanceSummary, LayerAvailability, DISCLAIMER,
    RETENTION_NOTICE, SNAPSHOT_VERSION,
};
pub use analytics::{
    analyze_window, build_analytics, fatigue_severity, AnalyticsSnapshot, ComplianceFlag,
    FatigueReport, FatigueSeverity, FlagSeverity, RiskCategory, TimeWindow, Trend, WindowCounts,
    WindowReport,
};
pub use config::{AnalyticsConfig, DiagnosticsConfig, GovernanceThresholds, LifecycleThresholds};
pub use error::{ExportError, ExportResult, LedgerError, LedgerResult};
pub use guard::{assert_outside_decision_path, catch_violation};
pub use lifecycle::{classify, LifecycleSignals, LifecycleSnapshot, LifecycleState, SignalBucket};
pub use memory::{
    record_action, record_dismissal, record_exposure, replay, risk_flags, DismissReason,
    GovernanceMemory, InMemoryLedger, LedgerEvent, LedgerEventKind, MemoryKey, MemoryLedger,
    MemoryRecord, RiskFlag, UserAction,
};

//! # nudge-engine
//!
//! Decides which insight notifications a user sees right now, and records
//! what happened to them afterwards.
//!
//! ## Pipeline
//!
//! ```text
//!  MetricsSnapshot ──validate──▶ RuleSet ──▶ CooldownPolicy ──▶ keep shown
//!                                                                   │
//!     Vec<Insight> ◀── strip reasons ◀── cap_session ◀── sort ◀── dedup
//! ```
//!
//! Every stage is a pure function of its inputs and the caller-supplied
//! `now`. The pipeline never writes state; [`StateSynchronizer`] is the only
//! writer and applies the create, shown, dismiss, snooze and resolve
//! transitions against an [`InsightStateStore`].
//!
//! ## Cooldown
//!
//! Dismissals walk a ladder (1, 3, 7 then 30 days by default). A strictly
//! more severe trigger (lower priority number) overrides an active cooldown,
//! but never a snooze or the daily frequency cap.

#![deny(unsafe_code)]

pub mod audit;
pub mod cap;
pub mod config;
pub mod cooldown;
pub mod dedup;
pub mod error;
pub mod explain;
pub mod pipeline;
pub mod resolve;
pub mod rules;
pub mod store;
pub mod sync;

// ── Re-exports ─────────────────────────────────────────────────────────

pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, NullAuditSink, Transition};
pub use cap::cap_session;
pub use config::PipelineConfig;
pub use cooldown::{mark_shown, snooze, CooldownPolicy};
pub use dedup::{dedup_by_id, sort_by_priority, Ranked};
pub use error::{
    EngineError, EngineResult, RuleError, RuleResult, StorageError, StorageResult,
};
pub use explain::{explain, Explanation, StateSummary, TriggerExplanation, WhyNow};
pub use pipeline::InsightPipeline;
pub use resolve::{AutoResolveRule, AutoResolveSet, Resolution};
pub use rules::{default_rules, Comparison, InsightRule, RuleSet, TriggerContext};
pub use store::{InMemoryInsightStateStore, InsightStateStore};
pub use sync::StateSynchronizer;

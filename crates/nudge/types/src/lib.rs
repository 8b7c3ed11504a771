//! # nudge-types
//!
//! Frozen types shared by the decision layer (`nudge-engine`, `nudge-cta`)
//! and the diagnostic layer (`nudge-diagnostics`).
//!
//! Decision crates produce these types; diagnostic crates only read them.
//! Nothing in this crate performs I/O or reads the wall clock: every
//! timestamp is supplied by the caller.
//!
//! ## Layering
//!
//! ```text
//!                 ┌────────────────┐
//!                 │  nudge-types   │  metrics, insight, cooldown state,
//!                 │                │  CTA intent, confidence, boundary
//!                 └───────┬────────┘
//!          ┌──────────────┼──────────────────┐
//!          ▼              ▼                  ▼
//!   ┌─────────────┐ ┌───────────┐   ┌───────────────────┐
//!   │nudge-engine │ │ nudge-cta │◀──│ nudge-diagnostics │
//!   └─────────────┘ └───────────┘   └───────────────────┘
//!      decision        decision          read-only
//! ```
//!
//! The decision crates never depend on `nudge-diagnostics`. At runtime the
//! [`boundary`] module additionally tracks which decision stage is on the
//! current thread so diagnostics can refuse to run inside one.

#![deny(unsafe_code)]

pub mod boundary;
pub mod confidence;
pub mod cooldown;
pub mod error;
pub mod insight;
pub mod intent;
pub mod metrics;

// ── Re-exports ─────────────────────────────────────────────────────────

pub use boundary::{active_decision_stage, DecisionScope, DecisionStage, IsolationViolation};
pub use confidence::ConfidenceLevel;
pub use cooldown::{CooldownState, DecisionReason, InsightRecord, InsightStatus};
pub use error::{MetricsError, MetricsResult};
pub use insight::{Insight, InsightId, InsightKind, Priority};
pub use intent::CtaIntent;
pub use metrics::{MetricsSnapshot, ValidMetrics};

//! Lifecycle classifier.
//!
//! Raw signals are normalized into buckets, then exactly one of eight states
//! is chosen, first match wins:
//!
//! ```text
//! CHURNED > DORMANT > AT_RISK > POWER_USER > ACTIVE > ACTIVATING > ONBOARDING > NEW_USER
//! ```
//!
//! A missing signal is `unknown`, which is distinct from a zero value.
//! Snapshots are derived on demand and are never authoritative.

use std::fmt;

use chrono::{DateTime, Utc};
use nudge_types::ConfidenceLevel;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BucketBounds, LifecycleThresholds};
use crate::guard::assert_outside_decision_path;

// ── Signals ────────────────────────────────────────────────────────────

/// Raw lifecycle signals. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSignals {
    pub signup_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub sessions_30d: Option<u32>,
    pub key_actions_30d: Option<u32>,
    pub activation_completed: Option<bool>,
    pub revenue_30d: Option<f64>,
}

/// Signal names, in the order they are reported.
pub const SIGNAL_NAMES: [&str; 6] = [
    "signup_at",
    "last_active_at",
    "sessions_30d",
    "key_actions_30d",
    "activation_completed",
    "revenue_30d",
];

impl LifecycleSignals {
    fn presence(&self) -> [bool; 6] {
        [
            self.signup_at.is_some(),
            self.last_active_at.is_some(),
            self.sessions_30d.is_some(),
            self.key_actions_30d.is_some(),
            self.activation_completed.is_some(),
            // Negative or non-finite revenue is unusable.
            self.revenue_30d.is_some_and(|r| r.is_finite() && r >= 0.0),
        ]
    }
}

/// Normalized signal level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalBucket {
    Low,
    Medium,
    High,
    Unknown,
}

impl SignalBucket {
    fn from_value(value: Option<f64>, bounds: &BucketBounds) -> Self {
        match value {
            Some(v) if !v.is_finite() || v < 0.0 => Self::Unknown,
            Some(v) if v < bounds.low_below => Self::Low,
            Some(v) if v < bounds.high_from => Self::Medium,
            Some(_) => Self::High,
            None => Self::Unknown,
        }
    }

    fn at_least_medium(&self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }
}

impl fmt::Display for SignalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Signals after bucketing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignals {
    pub tenure: SignalBucket,
    /// Whole days since last activity. `None` when unknown.
    pub inactive_days: Option<i64>,
    pub sessions: SignalBucket,
    pub key_actions: SignalBucket,
    pub activation: Option<bool>,
    pub revenue: SignalBucket,
}

/// Bucket raw signals relative to `now`.
pub fn normalize(
    signals: &LifecycleSignals,
    now: DateTime<Utc>,
    thresholds: &LifecycleThresholds,
) -> NormalizedSignals {
    assert_outside_decision_path("lifecycle::normalize");
    let days_since = |at: DateTime<Utc>| (now - at).num_days().max(0);
    NormalizedSignals {
        tenure: SignalBucket::from_value(
            signals.signup_at.map(|at| days_since(at) as f64),
            &thresholds.tenure_days,
        ),
        inactive_days: signals.last_active_at.map(days_since),
        sessions: SignalBucket::from_value(
            signals.sessions_30d.map(f64::from),
            &thresholds.sessions_30d,
        ),
        key_actions: SignalBucket::from_value(
            signals.key_actions_30d.map(f64::from),
            &thresholds.key_actions_30d,
        ),
        activation: signals.activation_completed,
        revenue: SignalBucket::from_value(signals.revenue_30d, &thresholds.revenue_30d),
    }
}

// ── States ─────────────────────────────────────────────────────────────

/// Lifecycle state, declared in resolution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Churned,
    Dormant,
    AtRisk,
    PowerUser,
    Active,
    Activating,
    Onboarding,
    NewUser,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Churned => write!(f, "CHURNED"),
            Self::Dormant => write!(f, "DORMANT"),
            Self::AtRisk => write!(f, "AT_RISK"),
            Self::PowerUser => write!(f, "POWER_USER"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Activating => write!(f, "ACTIVATING"),
            Self::Onboarding => write!(f, "ONBOARDING"),
            Self::NewUser => write!(f, "NEW_USER"),
        }
    }
}

fn resolve_state(s: &NormalizedSignals, t: &LifecycleThresholds) -> LifecycleState {
    let inactive = s.inactive_days;
    if inactive.is_some_and(|d| d >= t.churned_after_days) {
        return LifecycleState::Churned;
    }
    if inactive.is_some_and(|d| d >= t.dormant_after_days) {
        return LifecycleState::Dormant;
    }
    let established = s.tenure.at_least_medium();
    if inactive.is_some_and(|d| d >= t.at_risk_after_days)
        || (established && s.sessions == SignalBucket::Low)
    {
        return LifecycleState::AtRisk;
    }
    let heavy_use = s.sessions == SignalBucket::High && s.key_actions == SignalBucket::High;
    // High-revenue accounts need only steady use.
    let paying_regular = s.revenue == SignalBucket::High
        && s.sessions.at_least_medium()
        && s.key_actions.at_least_medium();
    if heavy_use || paying_regular {
        return LifecycleState::PowerUser;
    }
    if s.activation == Some(true) && (s.sessions.at_least_medium() || s.key_actions.at_least_medium())
    {
        return LifecycleState::Active;
    }
    if s.activation != Some(true)
        && (s.key_actions != SignalBucket::Unknown || s.sessions.at_least_medium())
        && s.tenure != SignalBucket::Unknown
    {
        return LifecycleState::Activating;
    }
    if s.tenure == SignalBucket::Low {
        return LifecycleState::Onboarding;
    }
    LifecycleState::NewUser
}

// ── Snapshot ───────────────────────────────────────────────────────────

/// Derived lifecycle view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub state: LifecycleState,
    pub confidence: ConfidenceLevel,
    pub signals_used: Vec<String>,
    pub signals_missing: Vec<String>,
    pub normalized: NormalizedSignals,
    pub computed_at: DateTime<Utc>,
}

/// Classify a user at `now`.
pub fn classify(
    signals: &LifecycleSignals,
    now: DateTime<Utc>,
    thresholds: &LifecycleThresholds,
) -> LifecycleSnapshot {
    assert_outside_decision_path("lifecycle::classify");
    let normalized = normalize(signals, now, thresholds);
    let state = resolve_state(&normalized, thresholds);

    let (used, missing): (Vec<_>, Vec<_>) = SIGNAL_NAMES
        .iter()
        .zip(signals.presence())
        .partition(|(_, present)| *present);
    let signals_used: Vec<String> = used.into_iter().map(|(n, _)| n.to_string()).collect();
    let signals_missing: Vec<String> = missing.into_iter().map(|(n, _)| n.to_string()).collect();
    let confidence = ConfidenceLevel::from_unknown_count(signals_missing.len());

    debug!(
        state = %state,
        confidence = %confidence,
        missing = signals_missing.len(),
        "lifecycle classified"
    );
    LifecycleSnapshot {
        state,
        confidence,
        signals_used,
        signals_missing,
        normalized,
        computed_at: now,
    }
}

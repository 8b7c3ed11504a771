//! Persisted per-(user, insight) state.
//!
//! [`CooldownState`] drives show/hide decisions. [`InsightRecord`] is the
//! shape held by the external store: the cooldown state plus lifecycle
//! bookkeeping. Transitions live in `nudge-engine`; this module only defines
//! the data.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::insight::{InsightId, Priority};

// ── Cooldown State ─────────────────────────────────────────────────────

/// Suppression state for one insight and one user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownState {
    pub dismissed_at: Option<DateTime<Utc>>,
    pub dismiss_count: u32,
    /// Replaced only on dismissal.
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Most urgent priority ever dismissed. Only ever tightens.
    pub last_severity: Option<Priority>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub last_shown_at: Option<DateTime<Utc>>,
    /// Shows on the UTC day of `last_shown_at`.
    pub shown_count_today: u32,
}

impl CooldownState {
    /// Shows already counted against `now`'s UTC day.
    pub fn shown_on_day_of(&self, now: DateTime<Utc>) -> u32 {
        match self.last_shown_at {
            Some(shown) if shown.date_naive() == now.date_naive() => self.shown_count_today,
            _ => 0,
        }
    }

    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }

    pub fn is_cooling_down_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

// ── Insight Status ─────────────────────────────────────────────────────

/// Lifecycle status of a persisted insight record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Active,
    Dismissed,
    /// Terminal. A resolved id never renders again.
    Resolved,
}

impl fmt::Display for InsightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Dismissed => write!(f, "dismissed"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

// ── Persisted Record ───────────────────────────────────────────────────

/// Store row keyed by `(user_id, insight_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub user_id: String,
    pub insight_id: InsightId,
    pub status: InsightStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolution_context: Option<serde_json::Value>,
    #[serde(flatten)]
    pub cooldown: CooldownState,
}

impl InsightRecord {
    /// A fresh active record, first seen at `now`.
    pub fn new(user_id: impl Into<String>, insight_id: InsightId, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            insight_id,
            status: InsightStatus::Active,
            first_seen_at: now,
            last_seen_at: now,
            resolved_at: None,
            resolution_context: None,
            cooldown: CooldownState::default(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == InsightStatus::Resolved
    }
}

// ── Decision Reason ────────────────────────────────────────────────────

/// Why the cooldown evaluator showed or hid a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    FirstTime,
    Snoozed,
    FrequencyCapped,
    SeverityEscalated,
    CooldownActive,
    CooldownExpired,
    Resolved,
}

impl DecisionReason {
    /// Whether this reason means the candidate is shown.
    pub fn is_show(&self) -> bool {
        match self {
            Self::FirstTime | Self::SeverityEscalated | Self::CooldownExpired => true,
            Self::Snoozed | Self::FrequencyCapped | Self::CooldownActive | Self::Resolved => false,
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstTime => write!(f, "first_time"),
            Self::Snoozed => write!(f, "snoozed"),
            Self::FrequencyCapped => write!(f, "frequency_capped"),
            Self::SeverityEscalated => write!(f, "severity_escalated"),
            Self::CooldownActive => write!(f, "cooldown_active"),
            Self::CooldownExpired => write!(f, "cooldown_expired"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn shown_count_resets_on_new_day() {
        let state = CooldownState {
            last_shown_at: Some(t0()),
            shown_count_today: 2,
            ..CooldownState::default()
        };
        assert_eq!(state.shown_on_day_of(t0() + Duration::hours(3)), 2);
        assert_eq!(state.shown_on_day_of(t0() + Duration::days(1)), 0);
    }

    #[test]
    fn snooze_and_cooldown_are_strictly_future() {
        let state = CooldownState {
            snoozed_until: Some(t0()),
            cooldown_until: Some(t0()),
            ..CooldownState::default()
        };
        assert!(state.is_snoozed_at(t0() - Duration::seconds(1)));
        assert!(!state.is_snoozed_at(t0()));
        assert!(!state.is_cooling_down_at(t0()));
    }

    #[test]
    fn record_round_trips_flattened() {
        let mut record = InsightRecord::new("u1", InsightId::new("zero_revenue"), t0());
        record.cooldown.dismiss_count = 2;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["dismiss_count"], 2);
        assert_eq!(json["status"], "active");
        let back: InsightRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn reason_show_partition() {
        assert!(DecisionReason::FirstTime.is_show());
        assert!(DecisionReason::SeverityEscalated.is_show());
        assert!(!DecisionReason::CooldownActive.is_show());
        assert!(!DecisionReason::Resolved.is_show());
        assert_eq!(DecisionReason::FrequencyCapped.to_string(), "frequency_capped");
    }
}

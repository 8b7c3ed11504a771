//! Cooldown / escalation / snooze state machine.
//!
//! Evaluation order, first match wins:
//!
//! 1. no prior state                         → show, `first_time`
//! 2. record resolved                        → hide, `resolved`
//! 3. `snoozed_until` in the future          → hide, `snoozed`
//! 4. shown today ≥ daily cap                → hide, `frequency_capped`
//! 5. priority < stored `last_severity`      → show, `severity_escalated`
//! 6. `cooldown_until` in the future         → hide, `cooldown_active`
//! 7. otherwise                              → show, `cooldown_expired`
//!
//! Transitions ([`CooldownPolicy::dismiss`], [`snooze`], [`mark_shown`]) are
//! pure: they return a new state and never touch storage.

use chrono::{DateTime, Duration, Utc};
use nudge_types::{
    CooldownState, DecisionReason, DecisionScope, DecisionStage, Insight, InsightRecord, Priority,
};
use tracing::debug;

use crate::config::{PipelineConfig, DEFAULT_COOLDOWN_LADDER_DAYS};

/// Cooldown evaluator and dismissal transition.
#[derive(Clone, Debug, PartialEq)]
pub struct CooldownPolicy {
    daily_frequency_cap: u32,
    ladder_days: Vec<u32>,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl CooldownPolicy {
    /// Build from configuration. An empty ladder falls back to the default.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let ladder_days = if config.cooldown_ladder_days.is_empty() {
            DEFAULT_COOLDOWN_LADDER_DAYS.to_vec()
        } else {
            config.cooldown_ladder_days.clone()
        };
        Self {
            daily_frequency_cap: config.daily_frequency_cap,
            ladder_days,
        }
    }

    pub fn daily_frequency_cap(&self) -> u32 {
        self.daily_frequency_cap
    }

    pub fn ladder_days(&self) -> &[u32] {
        &self.ladder_days
    }

    /// Cooldown applied by the next dismissal after `prior_dismissals`.
    ///
    /// Clamped at the last rung of the ladder.
    pub fn cooldown_length(&self, prior_dismissals: u32) -> Duration {
        let idx = (prior_dismissals as usize).min(self.ladder_days.len().saturating_sub(1));
        let days = self.ladder_days.get(idx).copied().unwrap_or(1);
        Duration::days(i64::from(days))
    }

    /// Decide whether `candidate` may show given its persisted record.
    pub fn evaluate(
        &self,
        candidate: &Insight,
        record: Option<&InsightRecord>,
        now: DateTime<Utc>,
    ) -> DecisionReason {
        let _scope = DecisionScope::enter(DecisionStage::CooldownEvaluation);
        let reason = self.decide(candidate.priority, record, now);
        debug!(
            insight_id = %candidate.id,
            priority = candidate.priority,
            reason = %reason,
            "cooldown evaluated"
        );
        reason
    }

    fn decide(
        &self,
        priority: Priority,
        record: Option<&InsightRecord>,
        now: DateTime<Utc>,
    ) -> DecisionReason {
        let Some(record) = record else {
            return DecisionReason::FirstTime;
        };
        if record.is_resolved() {
            return DecisionReason::Resolved;
        }

        let state = &record.cooldown;
        if state.is_snoozed_at(now) {
            return DecisionReason::Snoozed;
        }
        if state.shown_on_day_of(now) >= self.daily_frequency_cap {
            return DecisionReason::FrequencyCapped;
        }
        if state.last_severity.is_some_and(|last| priority < last) {
            return DecisionReason::SeverityEscalated;
        }
        if state.is_cooling_down_at(now) {
            return DecisionReason::CooldownActive;
        }
        DecisionReason::CooldownExpired
    }

    /// State after the user dismisses an insight shown at `priority`.
    ///
    /// The cooldown is read from the ladder at the prior dismissal count and
    /// `last_severity` tightens to the more urgent of old and new.
    pub fn dismiss(
        &self,
        state: &CooldownState,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> CooldownState {
        let cooldown = self.cooldown_length(state.dismiss_count);
        CooldownState {
            dismissed_at: Some(now),
            dismiss_count: state.dismiss_count.saturating_add(1),
            cooldown_until: Some(now + cooldown),
            last_severity: Some(match state.last_severity {
                Some(prev) => prev.min(priority),
                None => priority,
            }),
            ..state.clone()
        }
    }
}

/// State after the user snoozes an insight until `until`.
pub fn snooze(state: &CooldownState, until: DateTime<Utc>) -> CooldownState {
    CooldownState {
        snoozed_until: Some(until),
        ..state.clone()
    }
}

/// State after an insight is rendered at `now`.
///
/// The daily counter restarts at 1 on a new UTC day.
pub fn mark_shown(state: &CooldownState, now: DateTime<Utc>) -> CooldownState {
    CooldownState {
        last_shown_at: Some(now),
        shown_count_today: state.shown_on_day_of(now).saturating_add(1),
        ..state.clone()
    }
}

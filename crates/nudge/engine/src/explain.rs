//! Why an insight is on screen right now.
//!
//! Pure formatting over already-known data. Never touches persistence and
//! returns the same explanation for the same inputs.

use std::fmt;

use chrono::{DateTime, Utc};
use nudge_types::{Insight, InsightId, InsightRecord, InsightStatus, MetricsSnapshot};
use serde::{Deserialize, Serialize};

use crate::rules::{ids, Comparison, TriggerContext};

// ── Why Now ────────────────────────────────────────────────────────────

/// Headline reason, chosen first-match from
/// `first_time` > `cooldown_expired` > `rule_still_true`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhyNow {
    FirstTime,
    CooldownExpired,
    RuleStillTrue,
}

impl fmt::Display for WhyNow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstTime => write!(f, "first_time"),
            Self::CooldownExpired => write!(f, "cooldown_expired"),
            Self::RuleStillTrue => write!(f, "rule_still_true"),
        }
    }
}

// ── Explanation ────────────────────────────────────────────────────────

/// What fired the insight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerExplanation {
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
    /// Current value of the metric, when the metrics are valid.
    pub observed: Option<f64>,
}

/// Persisted state as seen by the explanation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub status: Option<InsightStatus>,
    pub dismiss_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub last_shown_at: Option<DateTime<Utc>>,
}

/// Structured explanation for one insight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub insight_id: InsightId,
    pub trigger: TriggerExplanation,
    pub current_state: StateSummary,
    pub why_now: WhyNow,
    pub reason: String,
    pub recommendation: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Explain why `insight` is being shown at `now`.
pub fn explain(
    insight: &Insight,
    metrics: &MetricsSnapshot,
    record: Option<&InsightRecord>,
    trigger: &TriggerContext,
    now: DateTime<Utc>,
) -> Explanation {
    let observed = metrics
        .validate()
        .ok()
        .and_then(|m| m.value_of(&trigger.metric));

    let why_now = why_now(record, now);
    let reason = reason_text(why_now, trigger, observed);

    Explanation {
        insight_id: insight.id.clone(),
        trigger: TriggerExplanation {
            metric: trigger.metric.clone(),
            comparison: trigger.comparison,
            threshold: trigger.threshold,
            observed,
        },
        current_state: summarize(record),
        why_now,
        reason,
        recommendation: recommendation_for(&insight.id).map(str::to_string),
        generated_at: now,
    }
}

fn why_now(record: Option<&InsightRecord>, now: DateTime<Utc>) -> WhyNow {
    let Some(record) = record else {
        return WhyNow::FirstTime;
    };
    match record.cooldown.cooldown_until {
        Some(until) if until <= now => WhyNow::CooldownExpired,
        _ => WhyNow::RuleStillTrue,
    }
}

fn reason_text(why_now: WhyNow, trigger: &TriggerContext, observed: Option<f64>) -> String {
    let condition = match (trigger.comparison, observed) {
        (Comparison::Present, _) => format!("{} is set", trigger.metric),
        (_, Some(value)) => format!(
            "{} is {} (threshold {} {})",
            trigger.metric,
            format_value(value),
            trigger.comparison,
            format_value(trigger.threshold)
        ),
        (_, None) => format!("{} matched its threshold", trigger.metric),
    };
    match why_now {
        WhyNow::FirstTime => format!("Shown for the first time because {condition}."),
        WhyNow::CooldownExpired => {
            format!("Shown again after its cooldown ended because {condition}.")
        }
        WhyNow::RuleStillTrue => format!("Still shown because {condition}."),
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn summarize(record: Option<&InsightRecord>) -> StateSummary {
    match record {
        Some(r) => StateSummary {
            status: Some(r.status),
            dismiss_count: r.cooldown.dismiss_count,
            cooldown_until: r.cooldown.cooldown_until,
            snoozed_until: r.cooldown.snoozed_until,
            last_shown_at: r.cooldown.last_shown_at,
        },
        None => StateSummary {
            status: None,
            dismiss_count: 0,
            cooldown_until: None,
            snoozed_until: None,
            last_shown_at: None,
        },
    }
}

fn recommendation_for(id: &InsightId) -> Option<&'static str> {
    match id.as_str() {
        ids::FAILED_PAYMENTS => Some("Review failed payments and ask affected customers to update their card."),
        ids::HIGH_REFUNDS => Some("Check recent refund reasons for a product or fulfilment problem."),
        ids::NO_SALES_TODAY => Some("Share a product link or run a short promotion."),
        ids::ZERO_REVENUE => Some("Publish your first product and share your store link."),
        _ => None,
    }
}

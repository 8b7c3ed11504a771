//! Auto-resolve rules.
//!
//! Decide whether the condition behind an active insight has cleared. A
//! resolved record is terminal: the id never renders again for that user.

use nudge_types::{DecisionScope, DecisionStage, InsightRecord, InsightStatus, ValidMetrics};
use serde::{Deserialize, Serialize};

use crate::rules::ids;

/// Evidence that an insight's condition cleared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub rule: String,
    pub metric: String,
    pub observed: f64,
    pub condition: String,
}

/// Resolution check for one insight id.
pub trait AutoResolveRule: Send + Sync {
    fn insight_id(&self) -> &'static str;

    /// `Some` when the triggering condition no longer holds.
    fn check(&self, metrics: &ValidMetrics) -> Option<Resolution>;
}

/// Metric-threshold resolution: cleared when `metric` satisfies `cleared`.
struct ThresholdResolve {
    insight_id: &'static str,
    metric: &'static str,
    condition: &'static str,
    cleared: fn(f64) -> bool,
}

impl AutoResolveRule for ThresholdResolve {
    fn insight_id(&self) -> &'static str {
        self.insight_id
    }

    fn check(&self, metrics: &ValidMetrics) -> Option<Resolution> {
        let observed = metrics.value_of(self.metric)?;
        (self.cleared)(observed).then(|| Resolution {
            rule: self.insight_id.to_string(),
            metric: self.metric.to_string(),
            observed,
            condition: self.condition.to_string(),
        })
    }
}

/// Default resolution registry.
pub fn default_resolvers() -> Vec<Box<dyn AutoResolveRule>> {
    vec![
        Box::new(ThresholdResolve {
            insight_id: ids::FAILED_PAYMENTS,
            metric: "failedPayments7d",
            condition: "failedPayments7d == 0",
            cleared: |v| v == 0.0,
        }),
        Box::new(ThresholdResolve {
            insight_id: ids::HIGH_REFUNDS,
            metric: "refundRatio",
            condition: "refundRatio < 0.05",
            cleared: |v| v < 0.05,
        }),
        Box::new(ThresholdResolve {
            insight_id: ids::NO_SALES_TODAY,
            metric: "todayRevenue",
            condition: "todayRevenue > 0",
            cleared: |v| v > 0.0,
        }),
        Box::new(ThresholdResolve {
            insight_id: ids::ZERO_REVENUE,
            metric: "totalRevenue",
            condition: "totalRevenue > 0",
            cleared: |v| v > 0.0,
        }),
    ]
}

/// Collection of auto-resolve rules keyed by insight id.
pub struct AutoResolveSet {
    rules: Vec<Box<dyn AutoResolveRule>>,
}

impl Default for AutoResolveSet {
    fn default() -> Self {
        Self::new(default_resolvers())
    }
}

impl AutoResolveSet {
    pub fn new(rules: Vec<Box<dyn AutoResolveRule>>) -> Self {
        Self { rules }
    }

    /// Check one record. Only active records are considered.
    pub fn check(&self, record: &InsightRecord, metrics: &ValidMetrics) -> Option<Resolution> {
        if record.status != InsightStatus::Active {
            return None;
        }
        let _scope = DecisionScope::enter(DecisionStage::AutoResolve);
        self.rules
            .iter()
            .find(|r| r.insight_id() == record.insight_id.as_str())
            .and_then(|r| r.check(metrics))
    }
}

//! Insight pipeline: the only sanctioned way to obtain renderable insights.
//!
//! ## Stages
//!
//! ```text
//! metrics ──validate──▶ rules ──▶ cooldown ──▶ keep shown ──▶ dedup
//!                                                              │
//!      Vec<Insight> ◀── strip reasons ◀── cap ◀── sort by priority
//! ```
//!
//! A single `now` is threaded through every stage, so a run is a pure
//! function of `(metrics, records, now, max_per_session)`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nudge_types::{
    DecisionReason, DecisionScope, DecisionStage, Insight, InsightId, InsightRecord,
    MetricsSnapshot, Priority,
};
use tracing::{debug, warn};

use crate::cap::cap_session;
use crate::config::PipelineConfig;
use crate::cooldown::CooldownPolicy;
use crate::dedup::{dedup_by_id, sort_by_priority, Ranked};
use crate::rules::RuleSet;

// ── Evaluated Insight ──────────────────────────────────────────────────

/// A candidate paired with the reason it was shown. Internal to the pipeline.
#[derive(Clone, Debug)]
struct EvaluatedInsight {
    insight: Insight,
    decision_reason: DecisionReason,
}

impl Ranked for EvaluatedInsight {
    fn insight_id(&self) -> &InsightId {
        &self.insight.id
    }

    fn priority(&self) -> Priority {
        self.insight.priority
    }
}

// ── Pipeline ───────────────────────────────────────────────────────────

/// Composes the rule set, cooldown evaluator, dedup, sort and cap.
pub struct InsightPipeline {
    rules: RuleSet,
    cooldown: CooldownPolicy,
    config: PipelineConfig,
}

impl Default for InsightPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl InsightPipeline {
    /// Pipeline with the default rule registry.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_rules(RuleSet::default(), config)
    }

    pub fn with_rules(rules: RuleSet, config: PipelineConfig) -> Self {
        Self {
            cooldown: CooldownPolicy::from_config(&config),
            rules,
            config,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn cooldown(&self) -> &CooldownPolicy {
        &self.cooldown
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with the configured session cap.
    pub fn run_default(
        &self,
        metrics: &MetricsSnapshot,
        records: &[InsightRecord],
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        self.run(metrics, records, now, self.config.max_per_session)
    }

    /// Evaluate metrics against one user's persisted records.
    ///
    /// Invalid metrics fail closed: the result is empty. When `records`
    /// holds more than one row for an id, the first one wins.
    pub fn run(
        &self,
        metrics: &MetricsSnapshot,
        records: &[InsightRecord],
        now: DateTime<Utc>,
        max_per_session: i64,
    ) -> Vec<Insight> {
        let _scope = DecisionScope::enter(DecisionStage::Pipeline);

        let metrics = match metrics.validate() {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "invalid metrics; returning no insights");
                return Vec::new();
            }
        };

        let mut by_id: HashMap<&InsightId, &InsightRecord> = HashMap::with_capacity(records.len());
        for record in records {
            by_id.entry(&record.insight_id).or_insert(record);
        }

        let shown: Vec<EvaluatedInsight> = self
            .rules
            .evaluate(&metrics)
            .into_iter()
            .filter_map(|insight| {
                let record = by_id.get(&insight.id).copied();
                let reason = self.cooldown.evaluate(&insight, record, now);
                reason.is_show().then_some(EvaluatedInsight {
                    insight,
                    decision_reason: reason,
                })
            })
            .collect();

        let mut unique = dedup_by_id(shown);
        sort_by_priority(&mut unique);
        let capped = cap_session(unique, max_per_session);

        capped
            .into_iter()
            .map(|evaluated| {
                debug!(
                    insight_id = %evaluated.insight.id,
                    reason = %evaluated.decision_reason,
                    "insight surfaced"
                );
                evaluated.insight
            })
            .collect()
    }
}

/// Run the default pipeline.
pub fn run(
    metrics: &MetricsSnapshot,
    records: &[InsightRecord],
    now: DateTime<Utc>,
    max_per_session: i64,
) -> Vec<Insight> {
    InsightPipeline::default().run(metrics, records, now, max_per_session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::mark_shown;
    use crate::error::RuleResult;
    use crate::rules::{Comparison, InsightRule, TriggerContext};
    use chrono::{Duration, TimeZone};
    use nudge_types::{CooldownState, InsightKind, ValidMetrics};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
    }

    fn busy_store() -> MetricsSnapshot {
        // failed_payments(1), high_refunds(2), no_sales_today(5), best_seller(8)
        MetricsSnapshot::new(0.0, 100.0, Some("mug"), 4.0, 40.0)
    }

    fn ids(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|i| i.id.as_str()).collect()
    }

    /// Emits a fixed id at a fixed priority.
    struct Fixed(&'static str, Priority);

    impl InsightRule for Fixed {
        fn id(&self) -> &'static str {
            self.0
        }
        fn evaluate(&self, _: &ValidMetrics) -> RuleResult<Option<Insight>> {
            Ok(Some(Insight::new(self.0, InsightKind::Info, self.0, "", self.1)))
        }
        fn trigger(&self) -> TriggerContext {
            TriggerContext::new("totalRevenue", Comparison::Present, 0.0)
        }
    }

    #[test]
    fn orders_by_priority_and_caps() {
        let out = run(&busy_store(), &[], t0(), 3);
        assert_eq!(ids(&out), vec!["failed_payments", "high_refunds", "no_sales_today"]);
    }

    #[test]
    fn invalid_metrics_fail_closed() {
        let metrics = MetricsSnapshot {
            refunded_amount_7d: Some(-1.0),
            ..busy_store()
        };
        assert!(run(&metrics, &[], t0(), 3).is_empty());
    }

    #[test]
    fn suppressed_insights_free_up_slots() {
        let policy = CooldownPolicy::default();
        let dismissed = InsightRecord {
            cooldown: policy.dismiss(&CooldownState::default(), 1, t0()),
            ..InsightRecord::new("u1", InsightId::new("failed_payments"), t0())
        };
        let out = run(&busy_store(), &[dismissed], t0() + Duration::hours(1), 3);
        assert_eq!(ids(&out), vec!["high_refunds", "no_sales_today", "best_seller"]);
    }

    #[test]
    fn frequency_capped_insight_hidden_same_day() {
        let shown = InsightRecord {
            cooldown: mark_shown(&CooldownState::default(), t0()),
            ..InsightRecord::new("u1", InsightId::new("high_refunds"), t0())
        };
        let out = run(&busy_store(), &[shown], t0() + Duration::hours(2), 10);
        assert!(!ids(&out).contains(&"high_refunds"));
    }

    #[test]
    fn duplicate_rule_ids_collapse_to_most_urgent() {
        let pipeline = InsightPipeline::with_rules(
            RuleSet::new(vec![
                Box::new(Fixed("dup", 4)),
                Box::new(Fixed("other", 3)),
                Box::new(Fixed("dup", 2)),
            ]),
            PipelineConfig::default(),
        );
        let out = pipeline.run(&busy_store(), &[], t0(), 10);
        assert_eq!(ids(&out), vec!["dup", "other"]);
        assert_eq!(out[0].priority, 2);
    }

    #[test]
    fn run_default_uses_configured_cap() {
        let pipeline = InsightPipeline::new(PipelineConfig {
            max_per_session: 1,
            ..PipelineConfig::default()
        });
        assert_eq!(pipeline.run_default(&busy_store(), &[], t0()).len(), 1);
    }

    #[test]
    fn scope_is_released_after_run() {
        let _ = run(&busy_store(), &[], t0(), 3);
        assert_eq!(nudge_types::active_decision_stage(), None);
    }
}

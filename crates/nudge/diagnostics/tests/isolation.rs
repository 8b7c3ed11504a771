//! Diagnostics must refuse to run from inside any decision stage.

use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, TimeZone, Utc};
use nudge_diagnostics::{
    analyze_window, build_analytics, catch_violation, classify, compose, export, export_to,
    record_exposure, replay, summarize_governance, verify_export, AdminInputs, AnalyticsConfig,
    ExportTarget, GovernanceThresholds, LifecycleSignals, LifecycleThresholds, MemoryKey,
    MemoryRecord, TimeWindow,
};
use nudge_engine::{Comparison, InsightPipeline, InsightRule, RuleResult, RuleSet, TriggerContext};
use nudge_types::{
    active_decision_stage, CtaIntent, DecisionScope, DecisionStage, Insight, IsolationViolation,
    MetricsSnapshot, ValidMetrics,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
}

/// A rule that reaches into diagnostics.
struct LeakyRule;

impl InsightRule for LeakyRule {
    fn id(&self) -> &'static str {
        "leaky"
    }

    fn evaluate(&self, _: &ValidMetrics) -> RuleResult<Option<Insight>> {
        let _ = classify(&LifecycleSignals::default(), now(), &LifecycleThresholds::default());
        Ok(None)
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("totalRevenue", Comparison::Present, 0.0)
    }
}

#[test]
fn every_stage_is_guarded() {
    let stages = [
        DecisionStage::Pipeline,
        DecisionStage::RuleEvaluation,
        DecisionStage::CooldownEvaluation,
        DecisionStage::AutoResolve,
        DecisionStage::IntentResolution,
        DecisionStage::ContractBuilding,
    ];
    for stage in stages {
        let violation = catch_violation(|| {
            let _scope = DecisionScope::enter(stage);
            classify(&LifecycleSignals::default(), now(), &LifecycleThresholds::default())
        })
        .unwrap_err();
        assert_eq!(violation.stage, stage);
        assert_eq!(violation.entry_point, "lifecycle::classify");
        assert_eq!(active_decision_stage(), None);
    }
}

#[test]
fn memory_and_export_are_guarded() {
    let violation = catch_violation(|| {
        let _scope = DecisionScope::enter(DecisionStage::CooldownEvaluation);
        let key = MemoryKey::new("u1", CtaIntent::PayNow, "banner");
        record_exposure(&MemoryRecord::new(key, now()), now())
    })
    .unwrap_err();
    assert_eq!(violation.entry_point, "memory::record_exposure");

    let snapshot = compose(AdminInputs::default(), now());
    let violation = catch_violation(AssertUnwindSafe(|| {
        let _scope = DecisionScope::enter(DecisionStage::ContractBuilding);
        export(&snapshot, ExportTarget::Json)
    }))
    .unwrap_err();
    assert_eq!(violation.entry_point, "admin::export");
}

/// Run `f` inside `stage` and return the entry point that refused it.
fn refused_entry_point<R: std::fmt::Debug>(stage: DecisionStage, f: impl FnOnce() -> R) -> &'static str {
    let violation = catch_violation(AssertUnwindSafe(|| {
        let _scope = DecisionScope::enter(stage);
        f()
    }))
    .unwrap_err();
    assert_eq!(violation.stage, stage);
    violation.entry_point
}

#[test]
fn export_entry_points_guard_before_touching_input() {
    let snapshot = compose(AdminInputs::default(), now());
    let artifact = export(&snapshot, ExportTarget::Csv).unwrap();

    // An unknown target must not short-circuit into an export error.
    assert_eq!(
        refused_entry_point(DecisionStage::ContractBuilding, || export_to(&snapshot, "xml")),
        "admin::export_to"
    );
    assert_eq!(
        refused_entry_point(DecisionStage::ContractBuilding, || export_to(&snapshot, "webhook")),
        "admin::export_to"
    );
    assert_eq!(
        refused_entry_point(DecisionStage::Pipeline, || verify_export(&artifact)),
        "admin::verify_export"
    );
}

#[test]
fn analytics_and_admin_builders_are_guarded() {
    let thresholds = GovernanceThresholds::default();
    let config = AnalyticsConfig::default();
    let window = TimeWindow::ending_at(now(), chrono::Duration::days(7));

    assert_eq!(
        refused_entry_point(DecisionStage::RuleEvaluation, || analyze_window(&[], window, &config)),
        "analytics::analyze_window"
    );
    assert_eq!(
        refused_entry_point(DecisionStage::CooldownEvaluation, || {
            build_analytics(&[], &[], now(), &thresholds, &config)
        }),
        "analytics::build_analytics"
    );
    assert_eq!(
        refused_entry_point(DecisionStage::AutoResolve, || summarize_governance(&[], &thresholds)),
        "admin::summarize_governance"
    );
    assert_eq!(
        refused_entry_point(DecisionStage::IntentResolution, || {
            compose(AdminInputs::default(), now())
        }),
        "admin::compose"
    );
    assert_eq!(
        refused_entry_point(DecisionStage::Pipeline, || replay(&[])),
        "memory::replay"
    );
    assert_eq!(active_decision_stage(), None);
}

#[test]
fn rule_calling_diagnostics_fails_the_whole_run() {
    // Not swallowed like an ordinary rule crash.
    let pipeline = InsightPipeline::with_rules(
        RuleSet::new(vec![Box::new(LeakyRule)]),
        Default::default(),
    );
    let metrics = MetricsSnapshot::new(1.0, 10.0, None, 0.0, 0.0);
    let payload = panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(&metrics, &[], now(), 3)))
        .unwrap_err();
    let violation = payload.downcast_ref::<IsolationViolation>().unwrap();
    assert_eq!(violation.stage, DecisionStage::RuleEvaluation);
    assert_eq!(active_decision_stage(), None);
}

#[test]
fn diagnostics_run_after_decisions_complete() {
    let metrics = MetricsSnapshot::new(0.0, 0.0, None, 0.0, 0.0);
    let shown = InsightPipeline::default().run(&metrics, &[], now(), 3);
    assert_eq!(shown.len(), 1);

    let snapshot = compose(AdminInputs::default(), now());
    assert_eq!(snapshot.layers.missing(), 3);
}

#[test]
fn cta_outcome_feeds_the_ledger() {
    let intent = nudge_cta::resolve_intent(
        &nudge_cta::Subscription::new(nudge_cta::SubscriptionStatus::PastDue),
        None,
        None,
    );
    let contract = nudge_cta::build_contract(intent);
    assert!(contract.visible());

    let key = MemoryKey::new("u1", contract.intent(), "billing_banner");
    let record = record_exposure(&MemoryRecord::new(key, now()), now());
    assert_eq!(record.key.intent, CtaIntent::PayNow);
}

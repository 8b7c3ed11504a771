//! Insight rule set.
//!
//! Each rule maps validated metrics to at most one candidate insight. Rules
//! are independent and side-effect free; they run in registration order and
//! a failing rule (error or panic) only drops its own candidate.
//!
//! ## Registry
//!
//! | Order | Id                | Kind    | Priority     |
//! |-------|-------------------|---------|--------------|
//! | 1     | `failed_payments` | warning | 1 (≥3) / 3   |
//! | 2     | `high_refunds`    | warning | 2 (≥25%) / 4 |
//! | 3     | `no_sales_today`  | info    | 5            |
//! | 4     | `zero_revenue`    | info    | 6            |
//! | 5     | `strong_day`      | success | 7            |
//! | 6     | `best_seller`     | success | 8            |
//!
//! Ids are append-only: a retired rule keeps its id reserved.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use nudge_types::{
    DecisionScope, DecisionStage, Insight, InsightId, InsightKind, IsolationViolation, ValidMetrics,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RuleResult;

// ── Registry Ids ───────────────────────────────────────────────────────

/// Stable insight ids.
pub mod ids {
    pub const FAILED_PAYMENTS: &str = "failed_payments";
    pub const HIGH_REFUNDS: &str = "high_refunds";
    pub const NO_SALES_TODAY: &str = "no_sales_today";
    pub const ZERO_REVENUE: &str = "zero_revenue";
    pub const STRONG_DAY: &str = "strong_day";
    pub const BEST_SELLER: &str = "best_seller";
}

// ── Trigger Context ────────────────────────────────────────────────────

/// Comparison a rule applies between a metric and its threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterOrEqual,
    GreaterThan,
    Equal,
    LessThan,
    Present,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GreaterOrEqual => write!(f, ">="),
            Self::GreaterThan => write!(f, ">"),
            Self::Equal => write!(f, "=="),
            Self::LessThan => write!(f, "<"),
            Self::Present => write!(f, "present"),
        }
    }
}

/// The metric, threshold and comparison behind a rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// Wire name of the metric (e.g. `failedPayments7d`).
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl TriggerContext {
    pub fn new(metric: &str, comparison: Comparison, threshold: f64) -> Self {
        Self {
            metric: metric.to_string(),
            comparison,
            threshold,
        }
    }

    /// `"failedPayments7d >= 1"`, or `"bestSellingProduct present"`.
    pub fn describe(&self) -> String {
        match self.comparison {
            Comparison::Present => format!("{} {}", self.metric, self.comparison),
            _ => format!("{} {} {}", self.metric, self.comparison, self.threshold),
        }
    }
}

// ── Rule Trait ─────────────────────────────────────────────────────────

/// A single insight rule.
pub trait InsightRule: Send + Sync {
    /// Registry id of the insight this rule produces.
    fn id(&self) -> &'static str;

    /// Evaluate the rule. `Ok(None)` means the condition does not hold.
    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>>;

    /// The condition this rule checks.
    fn trigger(&self) -> TriggerContext;
}

// ── Rules ──────────────────────────────────────────────────────────────

/// Failed payments in the trailing 7 days.
pub struct FailedPaymentsRule;

impl FailedPaymentsRule {
    const SEVERE_AT: f64 = 3.0;
}

impl InsightRule for FailedPaymentsRule {
    fn id(&self) -> &'static str {
        ids::FAILED_PAYMENTS
    }

    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>> {
        let failed = metrics.failed_payments_7d();
        if failed < 1.0 {
            return Ok(None);
        }
        let priority = if failed >= Self::SEVERE_AT { 1 } else { 3 };
        let count = failed.floor() as u64;
        let noun = if count == 1 { "payment" } else { "payments" };
        Ok(Some(
            Insight::new(
                ids::FAILED_PAYMENTS,
                InsightKind::Warning,
                "Payments are failing",
                format!("{count} {noun} failed in the last 7 days."),
                priority,
            )
            .with_meta("failedPayments7d", count),
        ))
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("failedPayments7d", Comparison::GreaterOrEqual, 1.0)
    }
}

/// Refunds eating into revenue.
pub struct HighRefundsRule;

impl HighRefundsRule {
    const WATCH_RATIO: f64 = 0.10;
    const SEVERE_RATIO: f64 = 0.25;
}

impl InsightRule for HighRefundsRule {
    fn id(&self) -> &'static str {
        ids::HIGH_REFUNDS
    }

    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>> {
        let Some(ratio) = metrics.refund_ratio() else {
            return Ok(None);
        };
        if ratio < Self::WATCH_RATIO {
            return Ok(None);
        }
        let priority = if ratio >= Self::SEVERE_RATIO { 2 } else { 4 };
        let percent = (ratio * 100.0).round();
        Ok(Some(
            Insight::new(
                ids::HIGH_REFUNDS,
                InsightKind::Warning,
                "Refunds are high",
                format!(
                    "{:.2} refunded in the last 7 days ({percent}% of total revenue).",
                    metrics.refunded_amount_7d()
                ),
                priority,
            )
            .with_meta("refundRatio", ratio)
            .with_meta("refundedAmount7d", metrics.refunded_amount_7d()),
        ))
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("refundRatio", Comparison::GreaterOrEqual, Self::WATCH_RATIO)
    }
}

/// An established store with nothing sold today.
pub struct NoSalesTodayRule;

impl InsightRule for NoSalesTodayRule {
    fn id(&self) -> &'static str {
        ids::NO_SALES_TODAY
    }

    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>> {
        if metrics.total_revenue() <= 0.0 || metrics.today_revenue() > 0.0 {
            return Ok(None);
        }
        Ok(Some(Insight::new(
            ids::NO_SALES_TODAY,
            InsightKind::Info,
            "No sales yet today",
            "Nothing has sold today. Sharing a product link can help.",
            5,
        )))
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("todayRevenue", Comparison::Equal, 0.0)
    }
}

/// No revenue at all yet.
pub struct ZeroRevenueRule;

impl InsightRule for ZeroRevenueRule {
    fn id(&self) -> &'static str {
        ids::ZERO_REVENUE
    }

    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>> {
        if metrics.total_revenue() > 0.0 {
            return Ok(None);
        }
        Ok(Some(Insight::new(
            ids::ZERO_REVENUE,
            InsightKind::Info,
            "Make your first sale",
            "Your store has no revenue yet. Publish a product to get started.",
            6,
        )))
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("totalRevenue", Comparison::Equal, 0.0)
    }
}

/// Today is an outsized share of lifetime revenue.
pub struct StrongDayRule;

impl StrongDayRule {
    const SHARE: f64 = 0.20;
}

impl InsightRule for StrongDayRule {
    fn id(&self) -> &'static str {
        ids::STRONG_DAY
    }

    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>> {
        let Some(share) = metrics.today_share() else {
            return Ok(None);
        };
        if share < Self::SHARE || metrics.today_revenue() <= 0.0 {
            return Ok(None);
        }
        Ok(Some(
            Insight::new(
                ids::STRONG_DAY,
                InsightKind::Success,
                "Strong day",
                format!(
                    "{:.2} earned today, {}% of your total revenue.",
                    metrics.today_revenue(),
                    (share * 100.0).round()
                ),
                7,
            )
            .with_meta("todayShare", share),
        ))
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("todayShare", Comparison::GreaterOrEqual, Self::SHARE)
    }
}

/// A best-selling product exists.
pub struct BestSellerRule;

impl InsightRule for BestSellerRule {
    fn id(&self) -> &'static str {
        ids::BEST_SELLER
    }

    fn evaluate(&self, metrics: &ValidMetrics) -> RuleResult<Option<Insight>> {
        if metrics.total_revenue() <= 0.0 {
            return Ok(None);
        }
        let Some(product) = metrics.best_selling_product() else {
            return Ok(None);
        };
        Ok(Some(
            Insight::new(
                ids::BEST_SELLER,
                InsightKind::Success,
                "Your best seller",
                format!("{product} is your best-selling product."),
                8,
            )
            .with_meta("product", product),
        ))
    }

    fn trigger(&self) -> TriggerContext {
        TriggerContext::new("bestSellingProduct", Comparison::Present, 0.0)
    }
}

/// The default registry, in registration order.
pub fn default_rules() -> Vec<Box<dyn InsightRule>> {
    vec![
        Box::new(FailedPaymentsRule),
        Box::new(HighRefundsRule),
        Box::new(NoSalesTodayRule),
        Box::new(ZeroRevenueRule),
        Box::new(StrongDayRule),
        Box::new(BestSellerRule),
    ]
}

// ── Rule Set ───────────────────────────────────────────────────────────

/// Ordered collection of rules.
pub struct RuleSet {
    rules: Vec<Box<dyn InsightRule>>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Box<dyn InsightRule>>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> Vec<InsightId> {
        self.rules.iter().map(|r| InsightId::new(r.id())).collect()
    }

    /// Trigger condition of the rule registered under `id`.
    pub fn trigger_for(&self, id: &InsightId) -> Option<TriggerContext> {
        self.rules
            .iter()
            .find(|r| r.id() == id.as_str())
            .map(|r| r.trigger())
    }

    /// Run every rule in order and collect their candidates.
    ///
    /// A rule that errors or panics contributes nothing; the rest still run.
    /// An [`IsolationViolation`] is the exception and propagates.
    pub fn evaluate(&self, metrics: &ValidMetrics) -> Vec<Insight> {
        let _scope = DecisionScope::enter(DecisionStage::RuleEvaluation);
        let mut candidates = Vec::new();

        for rule in &self.rules {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(metrics)));
            match outcome {
                Ok(Ok(Some(insight))) => {
                    debug!(rule = rule.id(), priority = insight.priority, "rule fired");
                    candidates.push(insight);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(rule = rule.id(), error = %e, "rule failed; skipping");
                }
                Err(payload) if payload.is::<IsolationViolation>() => {
                    panic::resume_unwind(payload);
                }
                Err(payload) => {
                    warn!(
                        rule = rule.id(),
                        panic = panic_message(payload.as_ref()),
                        "rule panicked; skipping"
                    );
                }
            }
        }

        candidates
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

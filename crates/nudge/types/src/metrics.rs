//! Business metrics consumed by the rule set.
//!
//! [`MetricsSnapshot`] is the raw payload supplied by the metrics source and
//! may have missing or malformed fields. [`ValidMetrics`] can only be obtained
//! through [`MetricsSnapshot::validate`], so rules never see invalid input.

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, MetricsResult};

// ── Raw Snapshot ───────────────────────────────────────────────────────

/// Metrics payload as delivered by the metrics source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Revenue booked today.
    #[serde(default)]
    pub today_revenue: Option<f64>,
    /// Lifetime revenue.
    #[serde(default)]
    pub total_revenue: Option<f64>,
    /// Reference to the best-selling product, if any sales exist.
    #[serde(default)]
    pub best_selling_product: Option<String>,
    /// Failed payments over the trailing 7 days.
    #[serde(default, rename = "failedPayments7d")]
    pub failed_payments_7d: Option<f64>,
    /// Refunded amount over the trailing 7 days.
    #[serde(default, rename = "refundedAmount7d")]
    pub refunded_amount_7d: Option<f64>,
}

impl MetricsSnapshot {
    /// Build a snapshot with every required field present.
    pub fn new(
        today_revenue: f64,
        total_revenue: f64,
        best_selling_product: Option<&str>,
        failed_payments_7d: f64,
        refunded_amount_7d: f64,
    ) -> Self {
        Self {
            today_revenue: Some(today_revenue),
            total_revenue: Some(total_revenue),
            best_selling_product: best_selling_product.map(str::to_string),
            failed_payments_7d: Some(failed_payments_7d),
            refunded_amount_7d: Some(refunded_amount_7d),
        }
    }

    /// Check every required numeric field is present, finite and non-negative.
    ///
    /// Validation runs once per evaluation, before any rule sees the data.
    pub fn validate(&self) -> MetricsResult<ValidMetrics> {
        Ok(ValidMetrics {
            today_revenue: required("todayRevenue", self.today_revenue)?,
            total_revenue: required("totalRevenue", self.total_revenue)?,
            best_selling_product: self
                .best_selling_product
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            failed_payments_7d: required("failedPayments7d", self.failed_payments_7d)?,
            refunded_amount_7d: required("refundedAmount7d", self.refunded_amount_7d)?,
        })
    }
}

fn required(field: &'static str, value: Option<f64>) -> MetricsResult<f64> {
    let value = value.ok_or(MetricsError::Missing(field))?;
    if !value.is_finite() {
        return Err(MetricsError::NotFinite(field));
    }
    if value < 0.0 {
        return Err(MetricsError::Negative { field, value });
    }
    Ok(value)
}

// ── Validated Metrics ──────────────────────────────────────────────────

/// Metrics that passed validation. Immutable.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMetrics {
    today_revenue: f64,
    total_revenue: f64,
    best_selling_product: Option<String>,
    #[serde(rename = "failedPayments7d")]
    failed_payments_7d: f64,
    #[serde(rename = "refundedAmount7d")]
    refunded_amount_7d: f64,
}

impl ValidMetrics {
    pub fn today_revenue(&self) -> f64 {
        self.today_revenue
    }

    pub fn total_revenue(&self) -> f64 {
        self.total_revenue
    }

    pub fn best_selling_product(&self) -> Option<&str> {
        self.best_selling_product.as_deref()
    }

    pub fn failed_payments_7d(&self) -> f64 {
        self.failed_payments_7d
    }

    pub fn refunded_amount_7d(&self) -> f64 {
        self.refunded_amount_7d
    }

    /// Share of lifetime revenue refunded in the trailing window.
    ///
    /// `None` when there is no revenue to compare against.
    pub fn refund_ratio(&self) -> Option<f64> {
        (self.total_revenue > 0.0).then(|| self.refunded_amount_7d / self.total_revenue)
    }

    /// Share of lifetime revenue booked today. `None` without revenue.
    pub fn today_share(&self) -> Option<f64> {
        (self.total_revenue > 0.0).then(|| self.today_revenue / self.total_revenue)
    }

    /// Look up a numeric metric by its wire name.
    pub fn value_of(&self, metric: &str) -> Option<f64> {
        match metric {
            "todayRevenue" => Some(self.today_revenue),
            "totalRevenue" => Some(self.total_revenue),
            "failedPayments7d" => Some(self.failed_payments_7d),
            "refundedAmount7d" => Some(self.refunded_amount_7d),
            "refundRatio" => self.refund_ratio(),
            "todayShare" => self.today_share(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_snapshot_passes() {
        let m = MetricsSnapshot::new(10.0, 100.0, Some("sku-1"), 0.0, 5.0)
            .validate()
            .unwrap();
        assert_eq!(m.total_revenue(), 100.0);
        assert_eq!(m.best_selling_product(), Some("sku-1"));
        assert_eq!(m.refund_ratio(), Some(0.05));
    }

    #[test]
    fn missing_field_rejected() {
        let snapshot = MetricsSnapshot {
            total_revenue: None,
            ..MetricsSnapshot::new(1.0, 1.0, None, 0.0, 0.0)
        };
        assert_eq!(
            snapshot.validate(),
            Err(MetricsError::Missing("totalRevenue"))
        );
    }

    #[test]
    fn negative_field_rejected() {
        let snapshot = MetricsSnapshot::new(1.0, 1.0, None, -1.0, 0.0);
        assert!(matches!(
            snapshot.validate(),
            Err(MetricsError::Negative {
                field: "failedPayments7d",
                ..
            })
        ));
    }

    #[test]
    fn nan_rejected() {
        let snapshot = MetricsSnapshot::new(f64::NAN, 1.0, None, 0.0, 0.0);
        assert_eq!(
            snapshot.validate(),
            Err(MetricsError::NotFinite("todayRevenue"))
        );
    }

    #[test]
    fn blank_product_is_treated_as_absent() {
        let m = MetricsSnapshot::new(0.0, 5.0, Some("   "), 0.0, 0.0)
            .validate()
            .unwrap();
        assert_eq!(m.best_selling_product(), None);
    }

    #[test]
    fn ratios_need_revenue() {
        let m = MetricsSnapshot::new(0.0, 0.0, None, 0.0, 3.0)
            .validate()
            .unwrap();
        assert_eq!(m.refund_ratio(), None);
        assert_eq!(m.today_share(), None);
        assert_eq!(m.value_of("refundedAmount7d"), Some(3.0));
        assert_eq!(m.value_of("unknown"), None);
    }

    #[test]
    fn deserializes_wire_names() {
        let json = r#"{
            "todayRevenue": 12.5,
            "totalRevenue": 400,
            "bestSellingProduct": null,
            "failedPayments7d": 3,
            "refundedAmount7d": 0
        }"#;
        let snapshot: MetricsSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.failed_payments_7d, Some(3.0));
        assert!(snapshot.validate().is_ok());
    }
}

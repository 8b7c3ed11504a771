//! Diagnostic thresholds.
//!
//! These only shape descriptive output. Nothing here feeds back into a
//! decision.

use serde::{Deserialize, Serialize};

/// Risk-flag thresholds for the exposure ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceThresholds {
    /// Lifetime exposures at which a record is flagged as over-exposed.
    pub excessive_exposure: u32,
    /// Exposures since the last action at which fatigue is flagged.
    pub fatigue_exposures_without_action: u32,
    /// Re-exposures after a dismissal at which the dismissal counts as ignored.
    pub ignored_dismissal_reexposures: u32,
}

impl Default for GovernanceThresholds {
    fn default() -> Self {
        Self {
            excessive_exposure: 10,
            fatigue_exposures_without_action: 5,
            ignored_dismissal_reexposures: 1,
        }
    }
}

/// Analytics window and dismissal-spike tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Default reporting window, in days.
    pub window_days: u32,
    /// Relative change below which a trend is reported as flat.
    pub trend_tolerance: f64,
    /// Dismissal rate at which a window is flagged.
    pub dismissal_spike_rate: f64,
    /// Minimum exposures in a window before rates are flagged.
    pub min_exposures_for_flags: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            trend_tolerance: 0.10,
            dismissal_spike_rate: 0.5,
            min_exposures_for_flags: 4,
        }
    }
}

/// Bucket boundaries for lifecycle signals. Values below `low_below` are
/// `low`, below `high_from` are `medium`, the rest `high`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketBounds {
    pub low_below: f64,
    pub high_from: f64,
}

impl BucketBounds {
    pub const fn new(low_below: f64, high_from: f64) -> Self {
        Self {
            low_below,
            high_from,
        }
    }
}

/// Lifecycle classifier thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleThresholds {
    /// Days since signup.
    pub tenure_days: BucketBounds,
    /// Sessions in the trailing 30 days.
    pub sessions_30d: BucketBounds,
    /// Key actions in the trailing 30 days.
    pub key_actions_30d: BucketBounds,
    /// Revenue in the trailing 30 days.
    pub revenue_30d: BucketBounds,
    /// Inactivity, in days, at which a user is at risk.
    pub at_risk_after_days: i64,
    pub dormant_after_days: i64,
    pub churned_after_days: i64,
}

impl Default for LifecycleThresholds {
    fn default() -> Self {
        Self {
            tenure_days: BucketBounds::new(7.0, 60.0),
            sessions_30d: BucketBounds::new(4.0, 15.0),
            key_actions_30d: BucketBounds::new(5.0, 30.0),
            revenue_30d: BucketBounds::new(1.0, 500.0),
            at_risk_after_days: 14,
            dormant_after_days: 30,
            churned_after_days: 90,
        }
    }
}

/// Everything the diagnostic layer can be tuned with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub governance: GovernanceThresholds,
    pub analytics: AnalyticsConfig,
    pub lifecycle: LifecycleThresholds,
}

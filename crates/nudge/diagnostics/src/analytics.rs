//! Fatigue and compliance analytics over the exposure ledger.
//!
//! Everything here is descriptive. Reports say what happened; they never
//! recommend or trigger a change in what users are shown.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AnalyticsConfig, GovernanceThresholds};
use crate::guard::assert_outside_decision_path;
use crate::memory::{risk_flags, LedgerEvent, LedgerEventKind, MemoryKey, MemoryRecord, RiskFlag};

// ── Windows ────────────────────────────────────────────────────────────

/// Half-open interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window of `length` ending at `end`.
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    /// The equal-length window immediately before this one.
    pub fn preceding(&self) -> Self {
        Self::ending_at(self.start, self.end - self.start)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Raw counts inside one window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub exposures: u64,
    pub actions: u64,
    pub dismissals: u64,
}

impl WindowCounts {
    fn tally<'a>(events: impl IntoIterator<Item = &'a LedgerEvent>, window: &TimeWindow) -> Self {
        let mut counts = Self::default();
        for event in events.into_iter().filter(|e| window.contains(e.at)) {
            match event.kind {
                LedgerEventKind::Exposure => counts.exposures += 1,
                LedgerEventKind::Action { .. } => counts.actions += 1,
                LedgerEventKind::Dismissal { .. } => counts.dismissals += 1,
            }
        }
        counts
    }

    /// Actions per exposure. `None` without exposures.
    pub fn action_rate(&self) -> Option<f64> {
        rate(self.actions, self.exposures)
    }

    /// Dismissals per exposure. `None` without exposures.
    pub fn dismissal_rate(&self) -> Option<f64> {
        rate(self.dismissals, self.exposures)
    }
}

fn rate(numerator: u64, denominator: u64) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

/// Direction of change against the preceding window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
    /// One of the windows has nothing to compare.
    Insufficient,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
            Self::Flat => write!(f, "flat"),
            Self::Insufficient => write!(f, "insufficient"),
        }
    }
}

fn trend(current: Option<f64>, previous: Option<f64>, tolerance: f64) -> Trend {
    match (current, previous) {
        (Some(c), Some(p)) => {
            let baseline = p.abs().max(f64::EPSILON);
            let change = (c - p) / baseline;
            if p == 0.0 && c == 0.0 {
                Trend::Flat
            } else if change > tolerance {
                Trend::Rising
            } else if change < -tolerance {
                Trend::Falling
            } else {
                Trend::Flat
            }
        }
        _ => Trend::Insufficient,
    }
}

/// Rates and trends for one window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: TimeWindow,
    pub counts: WindowCounts,
    pub previous: WindowCounts,
    pub action_rate: Option<f64>,
    pub dismissal_rate: Option<f64>,
    pub exposure_trend: Trend,
    pub action_rate_trend: Trend,
    pub dismissal_rate_trend: Trend,
}

/// Aggregate `events` over `window` and compare with the window before it.
pub fn analyze_window(
    events: &[LedgerEvent],
    window: TimeWindow,
    config: &AnalyticsConfig,
) -> WindowReport {
    assert_outside_decision_path("analytics::analyze_window");
    let counts = WindowCounts::tally(events, &window);
    let previous = WindowCounts::tally(events, &window.preceding());
    WindowReport {
        window,
        counts,
        previous,
        action_rate: counts.action_rate(),
        dismissal_rate: counts.dismissal_rate(),
        exposure_trend: trend(
            Some(counts.exposures as f64),
            Some(previous.exposures as f64),
            config.trend_tolerance,
        ),
        action_rate_trend: trend(
            counts.action_rate(),
            previous.action_rate(),
            config.trend_tolerance,
        ),
        dismissal_rate_trend: trend(
            counts.dismissal_rate(),
            previous.dismissal_rate(),
            config.trend_tolerance,
        ),
    }
}

// ── Fatigue ────────────────────────────────────────────────────────────

/// Descriptive fatigue level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueSeverity {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl fmt::Display for FatigueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Low => write!(f, "low"),
            Self::Moderate => write!(f, "moderate"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Fatigue for one ledger key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FatigueReport {
    pub key: MemoryKey,
    pub severity: FatigueSeverity,
    pub exposures_since_action: u32,
    pub description: String,
}

/// Severity scales with exposures since the last action, measured in
/// multiples of the fatigue threshold. An ignored dismissal is at least
/// `high`.
pub fn fatigue_severity(record: &MemoryRecord, thresholds: &GovernanceThresholds) -> FatigueSeverity {
    assert_outside_decision_path("analytics::fatigue_severity");
    let limit = thresholds.fatigue_exposures_without_action.max(1);
    let n = record.exposures_since_action;
    let by_exposure = if n >= limit.saturating_mul(3) {
        FatigueSeverity::Critical
    } else if n >= limit.saturating_mul(2) {
        FatigueSeverity::High
    } else if n >= limit {
        FatigueSeverity::Moderate
    } else if n.saturating_mul(2) >= limit {
        FatigueSeverity::Low
    } else {
        FatigueSeverity::None
    };

    let ignored = record
        .exposures_since_dismissal
        .is_some_and(|n| n >= thresholds.ignored_dismissal_reexposures);
    if ignored {
        by_exposure.max(FatigueSeverity::High)
    } else {
        by_exposure
    }
}

fn fatigue_report(record: &MemoryRecord, thresholds: &GovernanceThresholds) -> FatigueReport {
    let severity = fatigue_severity(record, thresholds);
    let description = match record.last_action_at {
        Some(at) => format!(
            "{} exposures since the last action at {}",
            record.exposures_since_action,
            at.to_rfc3339()
        ),
        None => format!(
            "{} exposures with no recorded action",
            record.exposures_since_action
        ),
    };
    FatigueReport {
        key: record.key.clone(),
        severity,
        exposures_since_action: record.exposures_since_action,
        description,
    }
}

// ── Compliance Flags ───────────────────────────────────────────────────

/// Category of a compliance flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    ExcessiveExposure,
    Fatigue,
    IgnoredDismissal,
    DismissalSpike,
}

impl From<RiskFlag> for RiskCategory {
    fn from(flag: RiskFlag) -> Self {
        match flag {
            RiskFlag::ExcessiveExposure => Self::ExcessiveExposure,
            RiskFlag::Fatigue => Self::Fatigue,
            RiskFlag::IgnoredDismissal => Self::IgnoredDismissal,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcessiveExposure => write!(f, "excessive_exposure"),
            Self::Fatigue => write!(f, "fatigue"),
            Self::IgnoredDismissal => write!(f, "ignored_dismissal"),
            Self::DismissalSpike => write!(f, "dismissal_spike"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for FlagSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A descriptive compliance finding. Carries no remediation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFlag {
    pub category: RiskCategory,
    pub severity: FlagSeverity,
    /// `None` for window-level findings.
    pub key: Option<MemoryKey>,
    pub detail: String,
}

fn record_flags(record: &MemoryRecord, thresholds: &GovernanceThresholds) -> Vec<ComplianceFlag> {
    risk_flags(record, thresholds)
        .into_iter()
        .map(|flag| {
            let (severity, detail) = match flag {
                RiskFlag::ExcessiveExposure => {
                    let severity = if record.exposure_count
                        >= thresholds.excessive_exposure.saturating_mul(2)
                    {
                        FlagSeverity::Critical
                    } else {
                        FlagSeverity::Warning
                    };
                    (severity, format!("{} lifetime exposures", record.exposure_count))
                }
                RiskFlag::Fatigue => (
                    FlagSeverity::Warning,
                    format!(
                        "{} exposures without an action",
                        record.exposures_since_action
                    ),
                ),
                RiskFlag::IgnoredDismissal => (
                    FlagSeverity::Critical,
                    format!(
                        "shown {} times after being dismissed",
                        record.exposures_since_dismissal.unwrap_or(0)
                    ),
                ),
            };
            ComplianceFlag {
                category: flag.into(),
                severity,
                key: Some(record.key.clone()),
                detail,
            }
        })
        .collect()
}

fn window_flags(report: &WindowReport, config: &AnalyticsConfig) -> Option<ComplianceFlag> {
    let rate = report.dismissal_rate?;
    if report.counts.exposures < config.min_exposures_for_flags || rate < config.dismissal_spike_rate
    {
        return None;
    }
    Some(ComplianceFlag {
        category: RiskCategory::DismissalSpike,
        severity: FlagSeverity::Warning,
        key: None,
        detail: format!(
            "{:.0}% of {} exposures dismissed in the window",
            rate * 100.0,
            report.counts.exposures
        ),
    })
}

// ── Snapshot ───────────────────────────────────────────────────────────

/// Everything analytics knows at `generated_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window: WindowReport,
    /// Non-`none` fatigue reports, most severe first.
    pub fatigue: Vec<FatigueReport>,
    /// Compliance flags, most severe first.
    pub flags: Vec<ComplianceFlag>,
}

impl AnalyticsSnapshot {
    pub fn worst_fatigue(&self) -> FatigueSeverity {
        self.fatigue
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(FatigueSeverity::None)
    }

    pub fn critical_flags(&self) -> usize {
        self.flags
            .iter()
            .filter(|f| f.severity == FlagSeverity::Critical)
            .count()
    }
}

/// Build an analytics snapshot over the configured window ending at `now`.
pub fn build_analytics(
    records: &[MemoryRecord],
    events: &[LedgerEvent],
    now: DateTime<Utc>,
    thresholds: &GovernanceThresholds,
    config: &AnalyticsConfig,
) -> AnalyticsSnapshot {
    assert_outside_decision_path("analytics::build_analytics");
    let window = TimeWindow::ending_at(now, Duration::days(i64::from(config.window_days.max(1))));
    let report = analyze_window(events, window, config);

    let mut fatigue: Vec<FatigueReport> = records
        .iter()
        .map(|r| fatigue_report(r, thresholds))
        .filter(|f| f.severity != FatigueSeverity::None)
        .collect();
    fatigue.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.key.cmp(&b.key)));

    let mut flags: Vec<ComplianceFlag> = records
        .iter()
        .flat_map(|r| record_flags(r, thresholds))
        .chain(window_flags(&report, config))
        .collect();
    flags.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.key.cmp(&b.key))
    });

    AnalyticsSnapshot {
        generated_at: now,
        window: report,
        fatigue,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{record_dismissal, record_exposure, UserAction};
    use chrono::TimeZone;
    use nudge_types::CtaIntent;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap()
    }

    fn key(user: &str) -> MemoryKey {
        MemoryKey::new(user, CtaIntent::Upgrade, "sidebar")
    }

    fn event(kind: LedgerEventKind, days_ago: i64) -> LedgerEvent {
        LedgerEvent::new(key("u1"), kind, t0() - Duration::days(days_ago))
    }

    fn with_exposures(n: u32) -> MemoryRecord {
        (0..n).fold(MemoryRecord::new(key("u1"), t0()), |r, _| {
            record_exposure(&r, t0())
        })
    }

    #[test]
    fn window_bounds_are_half_open() {
        let w = TimeWindow::ending_at(t0(), Duration::days(7));
        assert!(w.contains(t0() - Duration::days(7)));
        assert!(!w.contains(t0()));
        assert_eq!(w.preceding().end, w.start);
        assert_eq!(w.preceding().end - w.preceding().start, Duration::days(7));
    }

    #[test]
    fn rates_and_trends() {
        let mut events = Vec::new();
        // Previous window: 4 exposures, 2 actions.
        for _ in 0..4 {
            events.push(event(LedgerEventKind::Exposure, 10));
        }
        for _ in 0..2 {
            events.push(event(
                LedgerEventKind::Action {
                    action: UserAction::Clicked,
                },
                10,
            ));
        }
        // Current window: 8 exposures, 1 action, 2 dismissals.
        for _ in 0..8 {
            events.push(event(LedgerEventKind::Exposure, 2));
        }
        events.push(event(
            LedgerEventKind::Action {
                action: UserAction::Clicked,
            },
            1,
        ));
        for _ in 0..2 {
            events.push(event(LedgerEventKind::Dismissal { reason: None }, 1));
        }

        let window = TimeWindow::ending_at(t0(), Duration::days(7));
        let report = analyze_window(&events, window, &AnalyticsConfig::default());
        assert_eq!(
            report.counts,
            WindowCounts {
                exposures: 8,
                actions: 1,
                dismissals: 2
            }
        );
        assert_eq!(report.previous.exposures, 4);
        assert_eq!(report.action_rate, Some(0.125));
        assert_eq!(report.exposure_trend, Trend::Rising);
        assert_eq!(report.action_rate_trend, Trend::Falling);
        assert_eq!(report.dismissal_rate_trend, Trend::Rising);
    }

    #[test]
    fn empty_windows_have_no_rates() {
        let window = TimeWindow::ending_at(t0(), Duration::days(7));
        let report = analyze_window(&[], window, &AnalyticsConfig::default());
        assert_eq!(report.action_rate, None);
        assert_eq!(report.action_rate_trend, Trend::Insufficient);
        assert_eq!(report.exposure_trend, Trend::Flat);
    }

    #[test]
    fn exposures_dropping_to_zero_are_falling() {
        let events: Vec<LedgerEvent> = (0..10)
            .map(|_| event(LedgerEventKind::Exposure, 10))
            .collect();
        let window = TimeWindow::ending_at(t0(), Duration::days(7));
        let report = analyze_window(&events, window, &AnalyticsConfig::default());
        assert_eq!(report.previous.exposures, 10);
        assert_eq!(report.counts.exposures, 0);
        assert_eq!(report.exposure_trend, Trend::Falling);
    }

    #[test]
    fn exposures_rising_from_zero_are_rising() {
        let events: Vec<LedgerEvent> = (0..5)
            .map(|_| event(LedgerEventKind::Exposure, 2))
            .collect();
        let window = TimeWindow::ending_at(t0(), Duration::days(7));
        let report = analyze_window(&events, window, &AnalyticsConfig::default());
        assert_eq!(report.previous.exposures, 0);
        assert_eq!(report.exposure_trend, Trend::Rising);
    }

    #[test]
    fn fatigue_scale() {
        let t = GovernanceThresholds::default();
        assert_eq!(fatigue_severity(&with_exposures(2), &t), FatigueSeverity::None);
        assert_eq!(fatigue_severity(&with_exposures(3), &t), FatigueSeverity::Low);
        assert_eq!(fatigue_severity(&with_exposures(5), &t), FatigueSeverity::Moderate);
        assert_eq!(fatigue_severity(&with_exposures(10), &t), FatigueSeverity::High);
        assert_eq!(fatigue_severity(&with_exposures(15), &t), FatigueSeverity::Critical);
    }

    #[test]
    fn ignored_dismissal_is_at_least_high() {
        let t = GovernanceThresholds::default();
        let r = record_dismissal(&with_exposures(1), None, t0());
        let r = record_exposure(&r, t0() + Duration::hours(1));
        assert_eq!(fatigue_severity(&r, &t), FatigueSeverity::High);
    }

    #[test]
    fn snapshot_orders_flags_by_severity() {
        let t = GovernanceThresholds::default();
        let ignored = record_exposure(
            &record_dismissal(&with_exposures(1), None, t0()),
            t0() + Duration::hours(1),
        );
        let tired = with_exposures(6);
        let snapshot = build_analytics(
            &[tired, ignored],
            &[],
            t0(),
            &t,
            &AnalyticsConfig::default(),
        );
        assert_eq!(snapshot.flags[0].severity, FlagSeverity::Critical);
        assert_eq!(snapshot.flags[0].category, RiskCategory::IgnoredDismissal);
        assert_eq!(snapshot.critical_flags(), 1);
        assert_eq!(snapshot.worst_fatigue(), FatigueSeverity::High);
        assert!(snapshot.flags.iter().any(|f| f.category == RiskCategory::Fatigue));
    }

    #[test]
    fn dismissal_spike_flagged() {
        let mut events: Vec<LedgerEvent> =
            (0..4).map(|_| event(LedgerEventKind::Exposure, 1)).collect();
        events.extend((0..3).map(|_| event(LedgerEventKind::Dismissal { reason: None }, 1)));
        let snapshot = build_analytics(
            &[],
            &events,
            t0(),
            &GovernanceThresholds::default(),
            &AnalyticsConfig::default(),
        );
        assert_eq!(snapshot.flags.len(), 1);
        assert_eq!(snapshot.flags[0].category, RiskCategory::DismissalSpike);
        assert!(snapshot.flags[0].key.is_none());
    }
}

//! Admin composer and export.
//!
//! Combines governance, analytics and lifecycle views into one versioned
//! snapshot for human review. Any layer may be missing; the snapshot says
//! so through `layers`, `overall_confidence` and `warnings`.
//!
//! Exports are static artifacts only (`json`, `csv`, `pdf_metadata`) and
//! always carry [`DISCLAIMER`] and [`RETENTION_NOTICE`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use nudge_types::ConfidenceLevel;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analytics::{AnalyticsSnapshot, FatigueSeverity};
use crate::config::GovernanceThresholds;
use crate::error::{ExportError, ExportResult};
use crate::guard::assert_outside_decision_path;
use crate::lifecycle::LifecycleSnapshot;
use crate::memory::{risk_flags, MemoryKey, MemoryRecord, RiskFlag};

/// Current admin snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

pub const DISCLAIMER: &str = "Diagnostic data only. These figures describe past exposure and \
engagement and do not drive or change what any user is shown.";

pub const RETENTION_NOTICE: &str = "Retain this export for no longer than 90 days and delete \
it once the review it was produced for is complete.";

// ── Governance Summary ─────────────────────────────────────────────────

/// A ledger key with at least one risk flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlaggedKey {
    pub key: MemoryKey,
    pub flags: Vec<RiskFlag>,
}

/// Aggregate view of the exposure ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceSummary {
    pub records: usize,
    pub total_exposures: u64,
    pub total_actions: u64,
    pub total_dismissals: u64,
    pub flagged: Vec<FlaggedKey>,
}

/// Summarize ledger records.
pub fn summarize_governance(
    records: &[MemoryRecord],
    thresholds: &GovernanceThresholds,
) -> GovernanceSummary {
    assert_outside_decision_path("admin::summarize_governance");
    let flagged = records
        .iter()
        .filter_map(|r| {
            let flags = risk_flags(r, thresholds);
            (!flags.is_empty()).then(|| FlaggedKey {
                key: r.key.clone(),
                flags,
            })
        })
        .collect();
    GovernanceSummary {
        records: records.len(),
        total_exposures: records.iter().map(|r| u64::from(r.exposure_count)).sum(),
        total_actions: records.iter().map(|r| u64::from(r.action_count)).sum(),
        total_dismissals: records.iter().map(|r| u64::from(r.dismissal_count)).sum(),
        flagged,
    }
}

// ── Snapshot ───────────────────────────────────────────────────────────

/// Which layers contributed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerAvailability {
    pub governance: bool,
    pub analytics: bool,
    pub lifecycle: bool,
}

impl LayerAvailability {
    pub fn missing(&self) -> usize {
        [self.governance, self.analytics, self.lifecycle]
            .iter()
            .filter(|present| !**present)
            .count()
    }
}

/// Versioned cross-layer view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminSnapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub layers: LayerAvailability,
    pub overall_confidence: ConfidenceLevel,
    pub governance: Option<GovernanceSummary>,
    pub analytics: Option<AnalyticsSnapshot>,
    pub lifecycle: Option<LifecycleSnapshot>,
    pub warnings: Vec<String>,
}

/// Inputs to [`compose`]. Absent layers are `None`.
#[derive(Clone, Debug, Default)]
pub struct AdminInputs {
    pub governance: Option<GovernanceSummary>,
    pub analytics: Option<AnalyticsSnapshot>,
    pub lifecycle: Option<LifecycleSnapshot>,
}

/// Overall confidence: every layer present caps at the lifecycle confidence;
/// one layer missing caps at medium; two or more missing is low.
fn overall_confidence(layers: &LayerAvailability, lifecycle: Option<&LifecycleSnapshot>) -> ConfidenceLevel {
    let cap = match layers.missing() {
        0 => ConfidenceLevel::High,
        1 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    };
    match lifecycle {
        Some(l) => cap.min(l.confidence),
        None => cap,
    }
}

fn warnings_for(inputs: &AdminInputs) -> Vec<String> {
    let mut warnings = Vec::new();
    match &inputs.governance {
        None => warnings.push("Governance data unavailable.".to_string()),
        Some(g) if g.records == 0 => {
            warnings.push("Governance ledger is empty.".to_string())
        }
        Some(g) if !g.flagged.is_empty() => warnings.push(format!(
            "{} exposure record(s) carry risk flags.",
            g.flagged.len()
        )),
        Some(_) => {}
    }
    match &inputs.analytics {
        None => warnings.push("Analytics data unavailable.".to_string()),
        Some(a) => {
            let critical = a.critical_flags();
            if critical > 0 {
                warnings.push(format!("{critical} critical compliance flag(s)."));
            }
            if a.worst_fatigue() >= FatigueSeverity::High {
                warnings.push(format!("Fatigue reaches {}.", a.worst_fatigue()));
            }
        }
    }
    match &inputs.lifecycle {
        None => warnings.push("Lifecycle classification unavailable.".to_string()),
        Some(l) if l.confidence < ConfidenceLevel::High => warnings.push(format!(
            "Lifecycle state {} has {} confidence; missing: {}.",
            l.state,
            l.confidence,
            l.signals_missing.join(", ")
        )),
        Some(_) => {}
    }
    warnings
}

/// Compose an admin snapshot at `now`.
pub fn compose(inputs: AdminInputs, now: DateTime<Utc>) -> AdminSnapshot {
    assert_outside_decision_path("admin::compose");
    let layers = LayerAvailability {
        governance: inputs.governance.is_some(),
        analytics: inputs.analytics.is_some(),
        lifecycle: inputs.lifecycle.is_some(),
    };
    let overall_confidence = overall_confidence(&layers, inputs.lifecycle.as_ref());
    let warnings = warnings_for(&inputs);

    AdminSnapshot {
        version: SNAPSHOT_VERSION,
        generated_at: now,
        layers,
        overall_confidence,
        governance: inputs.governance,
        analytics: inputs.analytics,
        lifecycle: inputs.lifecycle,
        warnings,
    }
}

// ── Export ─────────────────────────────────────────────────────────────

/// Permitted export formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportTarget {
    Json,
    Csv,
    PdfMetadata,
}

impl ExportTarget {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json | Self::PdfMetadata => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::PdfMetadata => write!(f, "pdf_metadata"),
        }
    }
}

const UNSAFE_TARGETS: [&str; 4] = ["api", "webhook", "http", "stream"];

impl FromStr for ExportTarget {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "pdf_metadata" => Ok(Self::PdfMetadata),
            other
                if UNSAFE_TARGETS.contains(&other)
                    || other.starts_with("http://")
                    || other.starts_with("https://") =>
            {
                Err(ExportError::UnsafeTarget(s.to_string()))
            }
            _ => Err(ExportError::UnsupportedTarget(s.to_string())),
        }
    }
}

/// A rendered export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub target: ExportTarget,
    pub content_type: String,
    pub disclaimer: String,
    pub retention_notice: String,
    pub body: String,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    disclaimer: &'a str,
    retention_notice: &'a str,
    snapshot: &'a AdminSnapshot,
}

#[derive(Serialize)]
struct PdfMetadata<'a> {
    title: String,
    subject: &'a str,
    keywords: Vec<String>,
    created_at: DateTime<Utc>,
    snapshot_version: u32,
    overall_confidence: ConfidenceLevel,
    warnings: &'a [String],
    disclaimer: &'a str,
    retention_notice: &'a str,
}

/// Export `snapshot` to the target named by `target`.
pub fn export_to(snapshot: &AdminSnapshot, target: &str) -> ExportResult<ExportArtifact> {
    assert_outside_decision_path("admin::export_to");
    export(snapshot, target.parse()?)
}

/// Export `snapshot` as `target`, then verify the artifact.
pub fn export(snapshot: &AdminSnapshot, target: ExportTarget) -> ExportResult<ExportArtifact> {
    assert_outside_decision_path("admin::export");
    let body = match target {
        ExportTarget::Json => serde_json::to_string_pretty(&JsonExport {
            disclaimer: DISCLAIMER,
            retention_notice: RETENTION_NOTICE,
            snapshot,
        })?,
        ExportTarget::Csv => render_csv(snapshot),
        ExportTarget::PdfMetadata => serde_json::to_string_pretty(&PdfMetadata {
            title: format!("Diagnostics snapshot {}", snapshot.generated_at.to_rfc3339()),
            subject: "Insight and CTA exposure diagnostics",
            keywords: vec![
                "diagnostics".to_string(),
                format!("confidence:{}", snapshot.overall_confidence),
                format!("version:{}", snapshot.version),
            ],
            created_at: snapshot.generated_at,
            snapshot_version: snapshot.version,
            overall_confidence: snapshot.overall_confidence,
            warnings: &snapshot.warnings,
            disclaimer: DISCLAIMER,
            retention_notice: RETENTION_NOTICE,
        })?,
    };

    let artifact = ExportArtifact {
        target,
        content_type: target.content_type().to_string(),
        disclaimer: DISCLAIMER.to_string(),
        retention_notice: RETENTION_NOTICE.to_string(),
        body,
    };
    verify_export(&artifact)?;
    info!(
        target = %target,
        bytes = artifact.body.len(),
        version = snapshot.version,
        "diagnostics exported"
    );
    Ok(artifact)
}

/// Check that an artifact carries both notices, in its fields and its body.
pub fn verify_export(artifact: &ExportArtifact) -> ExportResult<()> {
    assert_outside_decision_path("admin::verify_export");
    if artifact.disclaimer != DISCLAIMER || !artifact.body.contains(DISCLAIMER) {
        return Err(ExportError::MissingDisclaimer);
    }
    if artifact.retention_notice != RETENTION_NOTICE || !artifact.body.contains(RETENTION_NOTICE) {
        return Err(ExportError::MissingRetentionNotice);
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(snapshot: &AdminSnapshot) -> String {
    let mut rows: Vec<[String; 4]> = Vec::new();
    for warning in &snapshot.warnings {
        rows.push(["warning".into(), String::new(), String::new(), warning.clone()]);
    }
    if let Some(g) = &snapshot.governance {
        for flagged in &g.flagged {
            for flag in &flagged.flags {
                rows.push([
                    "risk_flag".into(),
                    flag.to_string(),
                    flagged.key.to_string(),
                    String::new(),
                ]);
            }
        }
    }
    if let Some(a) = &snapshot.analytics {
        for flag in &a.flags {
            rows.push([
                format!("compliance_{}", flag.severity),
                flag.category.to_string(),
                flag.key.as_ref().map(ToString::to_string).unwrap_or_default(),
                flag.detail.clone(),
            ]);
        }
    }
    if let Some(l) = &snapshot.lifecycle {
        rows.push([
            "lifecycle".into(),
            l.state.to_string(),
            l.confidence.to_string(),
            l.signals_missing.join(" "),
        ]);
    }

    let mut out = String::new();
    out.push_str(&format!("# {DISCLAIMER}\n"));
    out.push_str(&format!("# {RETENTION_NOTICE}\n"));
    out.push_str(&format!(
        "# version={} generated_at={} overall_confidence={}\n",
        snapshot.version,
        snapshot.generated_at.to_rfc3339(),
        snapshot.overall_confidence
    ));
    out.push_str("kind,category,subject,detail\n");
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

//! Subcommand bodies. Each returns the text printed to stdout.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use nudge_cta::{
    build_contract_with, resolve_with_reason, CapabilityResult, CtaContract, ErrorSignal,
    ResolvedIntent, Subscription,
};
use nudge_diagnostics::{
    build_analytics, classify, compose, export_to, replay, summarize_governance, AdminInputs,
    ExportArtifact, LedgerEvent, LifecycleSignals,
};
use nudge_engine::{explain as explain_insight, InsightPipeline};
use nudge_types::{InsightId, InsightRecord, MetricsSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::NudgeConfig;

/// Body of `--input` for the `cta` subcommand.
#[derive(Debug, Deserialize)]
pub(crate) struct CtaInput {
    pub subscription: Subscription,
    #[serde(default)]
    pub capability: Option<CapabilityResult>,
    #[serde(default)]
    pub error: Option<ErrorSignal>,
}

#[derive(Serialize)]
struct CtaOutput<'a> {
    resolved: ResolvedIntent,
    contract: &'a CtaContract,
}

pub(crate) fn run(
    config: &NudgeConfig,
    metrics: &Path,
    states: Option<&Path>,
    now: DateTime<Utc>,
    max_per_session: Option<i64>,
) -> Result<String> {
    let metrics: MetricsSnapshot = read_json(metrics)?;
    let records = read_records(states)?;

    let pipeline = InsightPipeline::new(config.pipeline.clone());
    let cap = max_per_session.unwrap_or(config.pipeline.max_per_session);
    let insights = pipeline.run(&metrics, &records, now, cap);
    info!(surfaced = insights.len(), cap, "pipeline run complete");

    Ok(serde_json::to_string_pretty(&insights)?)
}

pub(crate) fn explain(
    config: &NudgeConfig,
    insight_id: &str,
    metrics: &Path,
    states: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<String> {
    let metrics: MetricsSnapshot = read_json(metrics)?;
    let records = read_records(states)?;
    let id = InsightId::new(insight_id);

    let pipeline = InsightPipeline::new(config.pipeline.clone());
    let Some(trigger) = pipeline.rules().trigger_for(&id) else {
        bail!("unknown insight id `{insight_id}`");
    };
    let valid = metrics
        .validate()
        .with_context(|| format!("cannot explain `{insight_id}`"))?;
    let Some(insight) = pipeline
        .rules()
        .evaluate(&valid)
        .into_iter()
        .find(|i| i.id == id)
    else {
        bail!("insight `{insight_id}` does not fire for these metrics");
    };

    let record = records.iter().find(|r| r.insight_id == id);
    let explanation = explain_insight(&insight, &metrics, record, &trigger, now);
    Ok(serde_json::to_string_pretty(&explanation)?)
}

pub(crate) fn cta(config: &NudgeConfig, input: &Path) -> Result<String> {
    let input: CtaInput = read_json(input)?;
    let resolved = resolve_with_reason(
        &input.subscription,
        input.capability.as_ref(),
        input.error.as_ref(),
    );
    let contract = build_contract_with(resolved.intent, &config.cta);
    Ok(serde_json::to_string_pretty(&CtaOutput {
        resolved,
        contract: &contract,
    })?)
}

pub(crate) fn lifecycle(config: &NudgeConfig, signals: &Path, now: DateTime<Utc>) -> Result<String> {
    let signals: LifecycleSignals = read_json(signals)?;
    let snapshot = classify(&signals, now, &config.diagnostics.lifecycle);
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

pub(crate) fn admin_export(
    config: &NudgeConfig,
    events: Option<&Path>,
    signals: Option<&Path>,
    target: &str,
    now: DateTime<Utc>,
) -> Result<ExportArtifact> {
    let diagnostics = &config.diagnostics;

    let (governance, analytics) = match events {
        Some(path) => {
            let events: Vec<LedgerEvent> = read_json(path)?;
            let records = replay(&events);
            (
                Some(summarize_governance(&records, &diagnostics.governance)),
                Some(build_analytics(
                    &records,
                    &events,
                    now,
                    &diagnostics.governance,
                    &diagnostics.analytics,
                )),
            )
        }
        None => (None, None),
    };
    let lifecycle = match signals {
        Some(path) => {
            let signals: LifecycleSignals = read_json(path)?;
            Some(classify(&signals, now, &diagnostics.lifecycle))
        }
        None => None,
    };

    let snapshot = compose(
        AdminInputs {
            governance,
            analytics,
            lifecycle,
        },
        now,
    );
    let artifact = export_to(&snapshot, target)
        .with_context(|| format!("exporting admin snapshot as `{target}`"))?;
    info!(
        target = %artifact.target,
        warnings = snapshot.warnings.len(),
        "admin snapshot exported"
    );
    Ok(artifact)
}

pub(crate) fn write_artifact(path: &Path, artifact: &ExportArtifact) -> Result<()> {
    std::fs::write(path, &artifact.body)
        .with_context(|| format!("writing {}", path.display()))
}

// ── Input helpers ──────────────────────────────────────────────────────

fn read_records(states: Option<&Path>) -> Result<Vec<InsightRecord>> {
    match states {
        Some(path) => read_json(path),
        None => Ok(Vec::new()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_json(&text, &path.display().to_string())
}

fn parse_json<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).with_context(|| format!("parsing {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_types::CtaIntent;

    #[test]
    fn cta_input_accepts_missing_optionals() {
        let input: CtaInput =
            parse_json(r#"{ "subscription": { "status": "past_due" } }"#, "cta input").unwrap();
        assert!(input.capability.is_none());
        let resolved = resolve_with_reason(&input.subscription, None, None);
        assert_eq!(resolved.intent, CtaIntent::PayNow);
    }

    #[test]
    fn parse_errors_name_the_source() {
        let err = parse_json::<MetricsSnapshot>("{ not json", "metrics.json").unwrap_err();
        assert!(err.to_string().contains("metrics.json"));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let err = read_json::<MetricsSnapshot>(Path::new("/nonexistent/metrics.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/metrics.json"));
    }
}

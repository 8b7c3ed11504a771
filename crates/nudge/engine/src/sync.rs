//! State synchronizer — the only component that writes insight records.
//!
//! Each operation is a sequential read-modify-write against the store for
//! one `(user, insight)` key. The caller is expected to be the sole writer
//! for that key within a request. Audit events are written best-effort after
//! the store write succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nudge_types::{Insight, InsightId, InsightRecord, InsightStatus, MetricsSnapshot};
use tracing::{info, warn};

use crate::audit::{record_best_effort, AuditEvent, AuditSink, NullAuditSink, Transition};
use crate::cooldown::{mark_shown, snooze, CooldownPolicy};
use crate::error::{EngineError, EngineResult};
use crate::resolve::AutoResolveSet;
use crate::store::InsightStateStore;

/// Applies create / shown / dismiss / snooze / resolve transitions.
pub struct StateSynchronizer {
    store: Arc<dyn InsightStateStore>,
    audit: Arc<dyn AuditSink>,
    policy: CooldownPolicy,
    resolvers: AutoResolveSet,
}

impl StateSynchronizer {
    /// Synchronizer with the default policy and resolvers and no audit sink.
    pub fn new(store: Arc<dyn InsightStateStore>) -> Self {
        Self {
            store,
            audit: Arc::new(NullAuditSink),
            policy: CooldownPolicy::default(),
            resolvers: AutoResolveSet::default(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_policy(mut self, policy: CooldownPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolvers(mut self, resolvers: AutoResolveSet) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Every persisted record for `user_id`, ready to pass to the pipeline.
    pub fn load(&self, user_id: &str) -> EngineResult<Vec<InsightRecord>> {
        Ok(self.store.list_for_user(user_id)?)
    }

    /// Record that `insights` were rendered to `user_id` at `now`.
    ///
    /// Creates missing records. Resolved records are left untouched.
    pub fn record_shown(
        &self,
        user_id: &str,
        insights: &[Insight],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<InsightRecord>> {
        let mut updated = Vec::with_capacity(insights.len());
        for insight in insights {
            let (mut record, created) = self.load_or_create(user_id, &insight.id, now)?;
            if record.is_resolved() {
                warn!(
                    user_id,
                    insight_id = %insight.id,
                    "resolved insight reported as shown; ignoring"
                );
                continue;
            }

            record.cooldown = mark_shown(&record.cooldown, now);
            record.status = InsightStatus::Active;
            record.last_seen_at = now;
            self.store.upsert(record.clone())?;

            if created {
                self.audit(AuditEvent::new(user_id, &insight.id, Transition::Created, now));
            }
            self.audit(
                AuditEvent::new(user_id, &insight.id, Transition::Shown, now).with_detail(
                    serde_json::json!({
                        "priority": insight.priority,
                        "shown_count_today": record.cooldown.shown_count_today,
                    }),
                ),
            );
            updated.push(record);
        }
        Ok(updated)
    }

    /// Dismiss `insight` for `user_id`, starting the next cooldown rung.
    pub fn dismiss(
        &self,
        user_id: &str,
        insight: &Insight,
        now: DateTime<Utc>,
    ) -> EngineResult<InsightRecord> {
        let (mut record, _) = self.load_or_create(user_id, &insight.id, now)?;
        ensure_not_resolved(&record, "dismiss")?;

        record.cooldown = self.policy.dismiss(&record.cooldown, insight.priority, now);
        record.status = InsightStatus::Dismissed;
        record.last_seen_at = now;
        self.store.upsert(record.clone())?;

        info!(
            user_id,
            insight_id = %insight.id,
            dismiss_count = record.cooldown.dismiss_count,
            cooldown_until = ?record.cooldown.cooldown_until,
            "insight dismissed"
        );
        self.audit(
            AuditEvent::new(user_id, &insight.id, Transition::Dismissed, now).with_detail(
                serde_json::json!({
                    "dismiss_count": record.cooldown.dismiss_count,
                    "cooldown_until": record.cooldown.cooldown_until,
                    "last_severity": record.cooldown.last_severity,
                }),
            ),
        );
        Ok(record)
    }

    /// Snooze `insight_id` for `user_id` until `until`.
    pub fn snooze(
        &self,
        user_id: &str,
        insight_id: &InsightId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<InsightRecord> {
        let (mut record, _) = self.load_or_create(user_id, insight_id, now)?;
        ensure_not_resolved(&record, "snooze")?;

        record.cooldown = snooze(&record.cooldown, until);
        record.last_seen_at = now;
        self.store.upsert(record.clone())?;

        info!(user_id, insight_id = %insight_id, snoozed_until = %until, "insight snoozed");
        self.audit(
            AuditEvent::new(user_id, insight_id, Transition::Snoozed, now)
                .with_detail(serde_json::json!({ "snoozed_until": until })),
        );
        Ok(record)
    }

    /// Resolve every active record whose condition has cleared.
    ///
    /// Invalid metrics resolve nothing.
    pub fn resolve_cleared(
        &self,
        user_id: &str,
        metrics: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<InsightRecord>> {
        let metrics = match metrics.validate() {
            Ok(m) => m,
            Err(e) => {
                warn!(user_id, error = %e, "invalid metrics; skipping auto-resolve");
                return Ok(Vec::new());
            }
        };

        let mut resolved = Vec::new();
        for mut record in self.store.list_for_user(user_id)? {
            let Some(resolution) = self.resolvers.check(&record, &metrics) else {
                continue;
            };
            let context = serde_json::to_value(&resolution).unwrap_or(serde_json::Value::Null);
            record.status = InsightStatus::Resolved;
            record.resolved_at = Some(now);
            record.resolution_context = Some(context.clone());
            self.store.upsert(record.clone())?;

            info!(
                user_id,
                insight_id = %record.insight_id,
                condition = %resolution.condition,
                "insight auto-resolved"
            );
            self.audit(
                AuditEvent::new(user_id, &record.insight_id, Transition::Resolved, now)
                    .with_detail(context),
            );
            resolved.push(record);
        }
        Ok(resolved)
    }

    fn load_or_create(
        &self,
        user_id: &str,
        insight_id: &InsightId,
        now: DateTime<Utc>,
    ) -> EngineResult<(InsightRecord, bool)> {
        Ok(match self.store.get(user_id, insight_id)? {
            Some(record) => (record, false),
            None => (InsightRecord::new(user_id, insight_id.clone(), now), true),
        })
    }

    fn audit(&self, event: AuditEvent) {
        record_best_effort(self.audit.as_ref(), event);
    }
}

fn ensure_not_resolved(record: &InsightRecord, action: &'static str) -> EngineResult<()> {
    if record.is_resolved() {
        return Err(EngineError::InvalidTransition {
            insight_id: record.insight_id.clone(),
            action,
            status: record.status.to_string(),
        });
    }
    Ok(())
}

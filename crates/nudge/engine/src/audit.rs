//! Best-effort audit trail for state transitions.
//!
//! Audit writes never block or fail a decision: [`record_best_effort`] logs
//! sink failures as warnings and moves on.

use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use nudge_types::InsightId;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// A state transition applied by the synchronizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Created,
    Shown,
    Dismissed,
    Snoozed,
    Resolved,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Shown => write!(f, "shown"),
            Self::Dismissed => write!(f, "dismissed"),
            Self::Snoozed => write!(f, "snoozed"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// One audit entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: String,
    pub insight_id: InsightId,
    pub transition: Transition,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        user_id: &str,
        insight_id: &InsightId,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            insight_id: insight_id.clone(),
            transition,
            at,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn write(&self, event: AuditEvent) -> StorageResult<()>;
}

/// Write an event, swallowing and logging any failure.
pub fn record_best_effort(sink: &dyn AuditSink, event: AuditEvent) {
    let transition = event.transition;
    let insight_id = event.insight_id.clone();
    if let Err(e) = sink.write(event) {
        warn!(
            insight_id = %insight_id,
            transition = %transition,
            error = %e,
            "audit write failed; continuing"
        );
    }
}

/// In-memory sink for tests and offline runs.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event written so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, event: AuditEvent) -> StorageResult<()> {
        self.events
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Sink that discards everything.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn write(&self, _event: AuditEvent) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn write(&self, _event: AuditEvent) -> StorageResult<()> {
            Err(StorageError::Backend("disk full".into()))
        }
    }

    fn event(t: Transition) -> AuditEvent {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        AuditEvent::new("u1", &InsightId::new("zero_revenue"), t, at)
    }

    #[test]
    fn memory_sink_collects() {
        let sink = MemoryAuditSink::new();
        record_best_effort(&sink, event(Transition::Created));
        record_best_effort(&sink, event(Transition::Shown));
        let transitions: Vec<Transition> = sink.events().iter().map(|e| e.transition).collect();
        assert_eq!(transitions, vec![Transition::Created, Transition::Shown]);
    }

    #[test]
    fn failures_are_swallowed() {
        // Must not panic or propagate.
        record_best_effort(&FailingSink, event(Transition::Dismissed));
    }

    #[test]
    fn event_serializes_transition_name() {
        let json = serde_json::to_value(event(Transition::Resolved)).unwrap();
        assert_eq!(json["transition"], "resolved");
    }
}

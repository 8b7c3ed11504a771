//! Governance memory — the exposure ledger.
//!
//! One [`MemoryRecord`] per `(user, intent, surface)`. The `record_*`
//! functions are pure: they take a record and return the next one. Each
//! update also has a matching append-only [`LedgerEvent`] so analytics can
//! look at activity over time.
//!
//! [`GovernanceMemory`] wraps a [`MemoryLedger`] backend and applies updates
//! best-effort; a failing backend is logged and never surfaces to callers.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use nudge_types::CtaIntent;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::GovernanceThresholds;
use crate::error::{LedgerError, LedgerResult};
use crate::guard::assert_outside_decision_path;

// ── Keys ───────────────────────────────────────────────────────────────

/// Ledger key: who saw which intent where.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryKey {
    pub user_id: String,
    pub intent: CtaIntent,
    /// Named UI location, e.g. `dashboard_banner`.
    pub surface: String,
}

impl MemoryKey {
    pub fn new(user_id: impl Into<String>, intent: CtaIntent, surface: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            intent,
            surface: surface.into(),
        }
    }
}

impl fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.intent, self.surface)
    }
}

/// Engagement with a CTA.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Clicked,
    Completed,
}

/// Why a CTA was dismissed, when the user said.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    NotNow,
    NotRelevant,
    AlreadyHandled,
    TooFrequent,
    #[serde(other)]
    Other,
}

// ── Record ─────────────────────────────────────────────────────────────

/// Exposure history for one key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: MemoryKey,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub exposure_count: u32,
    /// Exposures since the most recent action (or since first seen).
    pub exposures_since_action: u32,
    pub action_count: u32,
    pub last_action: Option<UserAction>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub dismissal_count: u32,
    pub last_dismissed_at: Option<DateTime<Utc>>,
    pub dismiss_reason: Option<DismissReason>,
    /// Exposures after the most recent dismissal. `None` until dismissed.
    pub exposures_since_dismissal: Option<u32>,
}

impl MemoryRecord {
    /// An empty record, before any exposure.
    pub fn new(key: MemoryKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            first_seen_at: now,
            last_seen_at: now,
            exposure_count: 0,
            exposures_since_action: 0,
            action_count: 0,
            last_action: None,
            last_action_at: None,
            dismissal_count: 0,
            last_dismissed_at: None,
            dismiss_reason: None,
            exposures_since_dismissal: None,
        }
    }
}

/// The record after one more exposure at `now`.
pub fn record_exposure(record: &MemoryRecord, now: DateTime<Utc>) -> MemoryRecord {
    assert_outside_decision_path("memory::record_exposure");
    MemoryRecord {
        first_seen_at: if record.exposure_count == 0 {
            now
        } else {
            record.first_seen_at
        },
        last_seen_at: now,
        exposure_count: record.exposure_count.saturating_add(1),
        exposures_since_action: record.exposures_since_action.saturating_add(1),
        exposures_since_dismissal: record
            .exposures_since_dismissal
            .map(|n| n.saturating_add(1)),
        ..record.clone()
    }
}

/// The record after the user acts on the CTA.
pub fn record_action(record: &MemoryRecord, action: UserAction, now: DateTime<Utc>) -> MemoryRecord {
    assert_outside_decision_path("memory::record_action");
    MemoryRecord {
        action_count: record.action_count.saturating_add(1),
        last_action: Some(action),
        last_action_at: Some(now),
        exposures_since_action: 0,
        ..record.clone()
    }
}

/// The record after the user dismisses the CTA.
pub fn record_dismissal(
    record: &MemoryRecord,
    reason: Option<DismissReason>,
    now: DateTime<Utc>,
) -> MemoryRecord {
    assert_outside_decision_path("memory::record_dismissal");
    MemoryRecord {
        dismissal_count: record.dismissal_count.saturating_add(1),
        last_dismissed_at: Some(now),
        dismiss_reason: reason.or(record.dismiss_reason),
        exposures_since_dismissal: Some(0),
        ..record.clone()
    }
}

// ── Risk Flags ─────────────────────────────────────────────────────────

/// Descriptive risk derived from a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    ExcessiveExposure,
    Fatigue,
    IgnoredDismissal,
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcessiveExposure => write!(f, "excessive_exposure"),
            Self::Fatigue => write!(f, "fatigue"),
            Self::IgnoredDismissal => write!(f, "ignored_dismissal"),
        }
    }
}

/// Risk flags for a record, in a fixed order.
pub fn risk_flags(record: &MemoryRecord, thresholds: &GovernanceThresholds) -> Vec<RiskFlag> {
    assert_outside_decision_path("memory::risk_flags");
    let mut flags = Vec::new();
    if record.exposure_count >= thresholds.excessive_exposure {
        flags.push(RiskFlag::ExcessiveExposure);
    }
    if record.exposures_since_action >= thresholds.fatigue_exposures_without_action {
        flags.push(RiskFlag::Fatigue);
    }
    if record
        .exposures_since_dismissal
        .is_some_and(|n| n >= thresholds.ignored_dismissal_reexposures)
    {
        flags.push(RiskFlag::IgnoredDismissal);
    }
    flags
}

// ── Ledger Events ──────────────────────────────────────────────────────

/// What happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    Exposure,
    Action { action: UserAction },
    Dismissal { reason: Option<DismissReason> },
}

/// One append-only ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: Uuid,
    pub key: MemoryKey,
    pub kind: LedgerEventKind,
    pub at: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn new(key: MemoryKey, kind: LedgerEventKind, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            kind,
            at,
        }
    }

    /// Apply this event to `record`.
    pub fn apply(&self, record: &MemoryRecord) -> MemoryRecord {
        match self.kind {
            LedgerEventKind::Exposure => record_exposure(record, self.at),
            LedgerEventKind::Action { action } => record_action(record, action, self.at),
            LedgerEventKind::Dismissal { reason } => record_dismissal(record, reason, self.at),
        }
    }
}

/// Rebuild records by folding events in timestamp order.
pub fn replay(events: &[LedgerEvent]) -> Vec<MemoryRecord> {
    assert_outside_decision_path("memory::replay");
    let mut ordered: Vec<&LedgerEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.at);

    let mut records: BTreeMap<MemoryKey, MemoryRecord> = BTreeMap::new();
    for event in ordered {
        let current = records
            .remove(&event.key)
            .unwrap_or_else(|| MemoryRecord::new(event.key.clone(), event.at));
        records.insert(event.key.clone(), event.apply(&current));
    }
    records.into_values().collect()
}

// ── Ledger Storage ─────────────────────────────────────────────────────

/// Backing store for records and events.
pub trait MemoryLedger: Send + Sync {
    fn get(&self, key: &MemoryKey) -> LedgerResult<Option<MemoryRecord>>;

    fn put(&self, record: MemoryRecord) -> LedgerResult<()>;

    /// Drop the record for `key`, if any.
    fn remove(&self, key: &MemoryKey) -> LedgerResult<()>;

    /// Append an event. Events are never rewritten.
    fn append(&self, event: LedgerEvent) -> LedgerResult<()>;

    /// All records, ordered by key.
    fn records(&self) -> LedgerResult<Vec<MemoryRecord>>;

    /// All events, in append order.
    fn events(&self) -> LedgerResult<Vec<LedgerEvent>>;
}

/// In-memory ledger.
#[derive(Default)]
pub struct InMemoryLedger {
    records: RwLock<BTreeMap<MemoryKey, MemoryRecord>>,
    events: RwLock<EventLog>,
}

#[derive(Default)]
struct EventLog {
    events: Vec<LedgerEvent>,
    ids: HashSet<Uuid>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> LedgerError {
    LedgerError::Backend(format!("{what} lock poisoned"))
}

impl MemoryLedger for InMemoryLedger {
    fn get(&self, key: &MemoryKey) -> LedgerResult<Option<MemoryRecord>> {
        let records = self.records.read().map_err(|_| poisoned("records"))?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, record: MemoryRecord) -> LedgerResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned("records"))?;
        records.insert(record.key.clone(), record);
        Ok(())
    }

    fn remove(&self, key: &MemoryKey) -> LedgerResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned("records"))?;
        records.remove(key);
        Ok(())
    }

    fn append(&self, event: LedgerEvent) -> LedgerResult<()> {
        let mut log = self.events.write().map_err(|_| poisoned("events"))?;
        if !log.ids.insert(event.id) {
            return Err(LedgerError::DuplicateEvent(event.id.to_string()));
        }
        log.events.push(event);
        Ok(())
    }

    fn records(&self) -> LedgerResult<Vec<MemoryRecord>> {
        let records = self.records.read().map_err(|_| poisoned("records"))?;
        Ok(records.values().cloned().collect())
    }

    fn events(&self) -> LedgerResult<Vec<LedgerEvent>> {
        let log = self.events.read().map_err(|_| poisoned("events"))?;
        Ok(log.events.clone())
    }
}

// ── Governance Memory ──────────────────────────────────────────────────

/// Best-effort writer over a [`MemoryLedger`].
pub struct GovernanceMemory {
    ledger: Arc<dyn MemoryLedger>,
}

impl GovernanceMemory {
    pub fn new(ledger: Arc<dyn MemoryLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn MemoryLedger> {
        &self.ledger
    }

    /// Record an exposure. Returns the updated record, or `None` if the
    /// ledger failed.
    pub fn observe_exposure(&self, key: MemoryKey, now: DateTime<Utc>) -> Option<MemoryRecord> {
        self.observe(LedgerEvent::new(key, LedgerEventKind::Exposure, now))
    }

    pub fn observe_action(
        &self,
        key: MemoryKey,
        action: UserAction,
        now: DateTime<Utc>,
    ) -> Option<MemoryRecord> {
        self.observe(LedgerEvent::new(key, LedgerEventKind::Action { action }, now))
    }

    pub fn observe_dismissal(
        &self,
        key: MemoryKey,
        reason: Option<DismissReason>,
        now: DateTime<Utc>,
    ) -> Option<MemoryRecord> {
        self.observe(LedgerEvent::new(key, LedgerEventKind::Dismissal { reason }, now))
    }

    fn observe(&self, event: LedgerEvent) -> Option<MemoryRecord> {
        assert_outside_decision_path("memory::observe");
        let key = event.key.clone();
        match self.try_observe(event) {
            Ok(record) => {
                debug!(key = %key, exposures = record.exposure_count, "ledger updated");
                Some(record)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "ledger write failed; continuing");
                None
            }
        }
    }

    /// Record first, then event. A failed append rolls the record back so
    /// the stored records always equal a replay of the stored events.
    fn try_observe(&self, event: LedgerEvent) -> LedgerResult<MemoryRecord> {
        let key = event.key.clone();
        let previous = self.ledger.get(&key)?;
        let current = previous
            .clone()
            .unwrap_or_else(|| MemoryRecord::new(key.clone(), event.at));
        let next = event.apply(&current);

        self.ledger.put(next.clone())?;
        if let Err(e) = self.ledger.append(event) {
            let restored = match previous {
                Some(record) => self.ledger.put(record),
                None => self.ledger.remove(&key),
            };
            if let Err(restore_err) = restored {
                warn!(key = %key, error = %restore_err, "ledger rollback failed");
            }
            return Err(e);
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
    }

    fn key() -> MemoryKey {
        MemoryKey::new("u1", CtaIntent::Upgrade, "dashboard_banner")
    }

    fn exposed(n: u32) -> MemoryRecord {
        (0..n).fold(MemoryRecord::new(key(), t0()), |r, i| {
            record_exposure(&r, t0() + Duration::hours(i64::from(i)))
        })
    }

    #[test]
    fn exposures_accumulate_without_mutation() {
        let before = MemoryRecord::new(key(), t0());
        let after = record_exposure(&before, t0() + Duration::minutes(5));
        assert_eq!(before.exposure_count, 0);
        assert_eq!(after.exposure_count, 1);
        assert_eq!(after.first_seen_at, t0() + Duration::minutes(5));

        let later = record_exposure(&after, t0() + Duration::hours(1));
        assert_eq!(later.first_seen_at, after.first_seen_at);
        assert_eq!(later.last_seen_at, t0() + Duration::hours(1));
    }

    #[test]
    fn action_resets_fatigue_counter() {
        let r = exposed(4);
        assert_eq!(r.exposures_since_action, 4);
        let r = record_action(&r, UserAction::Clicked, t0() + Duration::days(1));
        assert_eq!(r.exposures_since_action, 0);
        assert_eq!(r.last_action, Some(UserAction::Clicked));
        assert_eq!(r.exposure_count, 4);
    }

    #[test]
    fn flags_follow_thresholds() {
        let t = GovernanceThresholds::default();
        assert!(risk_flags(&exposed(4), &t).is_empty());
        assert_eq!(risk_flags(&exposed(5), &t), vec![RiskFlag::Fatigue]);
        assert_eq!(
            risk_flags(&exposed(10), &t),
            vec![RiskFlag::ExcessiveExposure, RiskFlag::Fatigue]
        );
    }

    #[test]
    fn dismissal_ignored_after_reexposure() {
        let t = GovernanceThresholds::default();
        let dismissed = record_dismissal(&exposed(1), Some(DismissReason::NotNow), t0());
        assert!(!risk_flags(&dismissed, &t).contains(&RiskFlag::IgnoredDismissal));

        let reexposed = record_exposure(&dismissed, t0() + Duration::days(1));
        assert!(risk_flags(&reexposed, &t).contains(&RiskFlag::IgnoredDismissal));
        assert_eq!(reexposed.dismiss_reason, Some(DismissReason::NotNow));
    }

    #[test]
    fn replay_matches_incremental_updates() {
        let events = vec![
            LedgerEvent::new(key(), LedgerEventKind::Exposure, t0() + Duration::hours(2)),
            LedgerEvent::new(key(), LedgerEventKind::Exposure, t0()),
            LedgerEvent::new(
                key(),
                LedgerEventKind::Dismissal { reason: None },
                t0() + Duration::hours(3),
            ),
        ];
        let records = replay(&events);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exposure_count, 2);
        assert_eq!(records[0].first_seen_at, t0());
        assert_eq!(records[0].dismissal_count, 1);
    }

    #[test]
    fn governance_memory_persists_records_and_events() {
        let memory = GovernanceMemory::new(Arc::new(InMemoryLedger::new()));
        memory.observe_exposure(key(), t0());
        memory.observe_exposure(key(), t0() + Duration::hours(1));
        let record = memory
            .observe_action(key(), UserAction::Completed, t0() + Duration::hours(2))
            .unwrap();
        assert_eq!(record.exposure_count, 2);
        assert_eq!(record.action_count, 1);
        assert_eq!(memory.ledger().events().unwrap().len(), 3);
        assert_eq!(memory.ledger().records().unwrap(), vec![record]);
    }

    struct BrokenLedger;

    impl MemoryLedger for BrokenLedger {
        fn get(&self, _: &MemoryKey) -> LedgerResult<Option<MemoryRecord>> {
            Err(LedgerError::Backend("offline".into()))
        }
        fn put(&self, _: MemoryRecord) -> LedgerResult<()> {
            Err(LedgerError::Backend("offline".into()))
        }
        fn remove(&self, _: &MemoryKey) -> LedgerResult<()> {
            Err(LedgerError::Backend("offline".into()))
        }
        fn append(&self, _: LedgerEvent) -> LedgerResult<()> {
            Err(LedgerError::Backend("offline".into()))
        }
        fn records(&self) -> LedgerResult<Vec<MemoryRecord>> {
            Ok(Vec::new())
        }
        fn events(&self) -> LedgerResult<Vec<LedgerEvent>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn ledger_failures_are_swallowed() {
        let memory = GovernanceMemory::new(Arc::new(BrokenLedger));
        assert!(memory.observe_exposure(key(), t0()).is_none());
    }

    /// Delegates to an in-memory ledger, failing one kind of write on demand.
    #[derive(Default)]
    struct FlakyLedger {
        inner: InMemoryLedger,
        fail_put: std::sync::atomic::AtomicBool,
        fail_append: std::sync::atomic::AtomicBool,
    }

    impl FlakyLedger {
        fn failing(flag: &std::sync::atomic::AtomicBool) -> bool {
            flag.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl MemoryLedger for FlakyLedger {
        fn get(&self, key: &MemoryKey) -> LedgerResult<Option<MemoryRecord>> {
            self.inner.get(key)
        }
        fn put(&self, record: MemoryRecord) -> LedgerResult<()> {
            if Self::failing(&self.fail_put) {
                return Err(LedgerError::Backend("put rejected".into()));
            }
            self.inner.put(record)
        }
        fn remove(&self, key: &MemoryKey) -> LedgerResult<()> {
            self.inner.remove(key)
        }
        fn append(&self, event: LedgerEvent) -> LedgerResult<()> {
            if Self::failing(&self.fail_append) {
                return Err(LedgerError::Backend("append rejected".into()));
            }
            self.inner.append(event)
        }
        fn records(&self) -> LedgerResult<Vec<MemoryRecord>> {
            self.inner.records()
        }
        fn events(&self) -> LedgerResult<Vec<LedgerEvent>> {
            self.inner.events()
        }
    }

    fn replay_matches_records(ledger: &dyn MemoryLedger) {
        let events = ledger.events().unwrap();
        assert_eq!(replay(&events), ledger.records().unwrap());
    }

    #[test]
    fn failed_put_leaves_no_orphan_event() {
        use std::sync::atomic::Ordering;

        let ledger = Arc::new(FlakyLedger::default());
        let memory = GovernanceMemory::new(ledger.clone());
        memory.observe_exposure(key(), t0()).unwrap();

        ledger.fail_put.store(true, Ordering::SeqCst);
        assert!(memory.observe_exposure(key(), t0() + Duration::hours(1)).is_none());

        assert_eq!(ledger.events().unwrap().len(), 1);
        assert_eq!(ledger.get(&key()).unwrap().unwrap().exposure_count, 1);
        replay_matches_records(ledger.as_ref());
    }

    #[test]
    fn failed_append_rolls_back_the_record() {
        use std::sync::atomic::Ordering;

        let ledger = Arc::new(FlakyLedger::default());
        let memory = GovernanceMemory::new(ledger.clone());
        memory.observe_exposure(key(), t0()).unwrap();

        ledger.fail_append.store(true, Ordering::SeqCst);
        assert!(memory
            .observe_action(key(), UserAction::Clicked, t0() + Duration::hours(1))
            .is_none());
        let other = MemoryKey::new("u2", CtaIntent::PayNow, "billing_banner");
        assert!(memory.observe_exposure(other.clone(), t0()).is_none());

        assert_eq!(ledger.get(&key()).unwrap().unwrap().action_count, 0);
        assert!(ledger.get(&other).unwrap().is_none());
        replay_matches_records(ledger.as_ref());
    }

    #[test]
    fn duplicate_events_rejected() {
        let ledger = InMemoryLedger::new();
        let event = LedgerEvent::new(key(), LedgerEventKind::Exposure, t0());
        ledger.append(event.clone()).unwrap();
        assert!(matches!(
            ledger.append(event),
            Err(LedgerError::DuplicateEvent(_))
        ));
    }
}

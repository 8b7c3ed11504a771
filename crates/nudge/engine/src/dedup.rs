//! Deduplication and priority ordering.
//!
//! [`dedup_by_id`] collapses candidates sharing an id into the most urgent
//! one. It does not promise any output order; [`sort_by_priority`] is the
//! only place ordering is decided.

use std::collections::HashMap;

use nudge_types::{Insight, InsightId, Priority};

/// Anything carrying an insight id and a priority.
pub trait Ranked {
    fn insight_id(&self) -> &InsightId;
    fn priority(&self) -> Priority;
}

impl Ranked for Insight {
    fn insight_id(&self) -> &InsightId {
        &self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

/// Keep one entry per id: the numerically lowest priority, ties going to the
/// entry seen first.
pub fn dedup_by_id<T: Ranked>(items: Vec<T>) -> Vec<T> {
    let mut slot_of: HashMap<InsightId, usize> = HashMap::with_capacity(items.len());
    let mut kept: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        match slot_of.get(item.insight_id()) {
            Some(&slot) => {
                if item.priority() < kept[slot].priority() {
                    kept[slot] = item;
                }
            }
            None => {
                slot_of.insert(item.insight_id().clone(), kept.len());
                kept.push(item);
            }
        }
    }

    kept
}

/// Stable sort by ascending priority.
pub fn sort_by_priority<T: Ranked>(items: &mut [T]) {
    items.sort_by_key(|item| item.priority());
}

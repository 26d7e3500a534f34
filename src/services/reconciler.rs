//! Reconciliation of successive snapshots into the tracked set.
//!
//! Reconciliation is total: it cannot fail. Failed acquisitions never reach
//! this module, the tracker skips it and keeps the previous set.

use crate::models::ReviewItem;
use serde::Serialize;
use std::collections::HashSet;

/// Ordered review items from the most recent successful snapshot.
///
/// Order is the order the API returned (most recently updated first); it is
/// never re-sorted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TrackedSet {
    items: Vec<ReviewItem>,
}

impl TrackedSet {
    pub fn new(items: Vec<ReviewItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn get(&self, id: i64) -> Option<&ReviewItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> HashSet<i64> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of reconciling a snapshot against the previous tracked set.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// The new tracked set (the snapshot without repeated IDs, order preserved).
    pub next: TrackedSet,

    /// Items whose ID was not tracked before, in snapshot order.
    pub arrived: Vec<ReviewItem>,

    /// Every ID in the snapshot; snoozes outside this set are pruned.
    pub still_valid_ids: HashSet<i64>,
}

/// Reconcile `snapshot` against `previous`.
///
/// Arrival is decided by ID alone: an item whose ID was already tracked is
/// never "arrived", even if its title or size metrics changed.
pub fn reconcile(previous: &TrackedSet, snapshot: Vec<ReviewItem>) -> Reconciliation {
    let known = previous.ids();

    // A search page can repeat an item; keep its first occurrence only.
    let mut still_valid_ids = HashSet::with_capacity(snapshot.len());
    let next: Vec<ReviewItem> = snapshot
        .into_iter()
        .filter(|item| still_valid_ids.insert(item.id))
        .collect();

    let arrived = next
        .iter()
        .filter(|item| !known.contains(&item.id))
        .cloned()
        .collect();

    Reconciliation {
        next: TrackedSet::new(next),
        arrived,
        still_valid_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attention::AttentionState;
    use crate::services::snooze_registry::SnoozeRegistry;

    fn pr(id: i64) -> ReviewItem {
        ReviewItem::new(
            id,
            format!("PR {}", id),
            format!("https://github.com/acme/app/pull/{}", id),
            "octocat",
            id,
        )
    }

    fn ids(items: &[ReviewItem]) -> Vec<i64> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_arrival_detection() {
        let previous = TrackedSet::new(vec![pr(1), pr(2)]);
        let result = reconcile(&previous, vec![pr(2), pr(3)]);

        assert_eq!(ids(result.next.items()), vec![2, 3]);
        assert_eq!(ids(&result.arrived), vec![3]);
        assert_eq!(result.still_valid_ids, [2, 3].into_iter().collect());
    }

    #[test]
    fn test_unchanged_snapshot_has_no_arrivals() {
        let previous = TrackedSet::new(vec![pr(1), pr(2), pr(3)]);
        let result = reconcile(&previous, previous.items().to_vec());

        assert!(result.arrived.is_empty());
        assert_eq!(result.next.ids(), previous.ids());
    }

    #[test]
    fn test_content_change_is_not_an_arrival() {
        let previous = TrackedSet::new(vec![pr(1)]);
        let mut changed = pr(1);
        changed.title = "PR 1 (rebased)".to_string();
        changed.additions = Some(40);
        changed.deletions = Some(2);

        let result = reconcile(&previous, vec![changed.clone()]);

        assert!(result.arrived.is_empty());
        // New content replaces the old item wholesale
        assert_eq!(result.next.get(1), Some(&changed));
    }

    #[test]
    fn test_empty_snapshot() {
        let previous = TrackedSet::new(vec![pr(1), pr(2)]);
        let result = reconcile(&previous, Vec::new());

        assert!(result.next.is_empty());
        assert!(result.arrived.is_empty());
        assert!(result.still_valid_ids.is_empty());
    }

    #[test]
    fn test_first_snapshot_is_all_arrivals() {
        let result = reconcile(&TrackedSet::default(), vec![pr(5), pr(4)]);
        assert_eq!(ids(&result.arrived), vec![5, 4]);
    }

    #[test]
    fn test_order_preserved_as_received() {
        let previous = TrackedSet::new(vec![pr(1), pr(2), pr(3)]);
        let result = reconcile(&previous, vec![pr(3), pr(1), pr(2)]);
        assert_eq!(ids(result.next.items()), vec![3, 1, 2]);
    }

    #[test]
    fn test_duplicate_in_snapshot_arrives_once() {
        let result = reconcile(&TrackedSet::default(), vec![pr(8), pr(8)]);
        assert_eq!(ids(&result.arrived), vec![8]);
    }

    #[test]
    fn test_duplicate_in_snapshot_tracked_once() {
        let previous = TrackedSet::new(vec![pr(1)]);
        let mut repeat = pr(2);
        repeat.title = "PR 2 (second hit)".to_string();

        let result = reconcile(&previous, vec![pr(2), pr(1), repeat, pr(1)]);

        // First occurrence wins, order as received
        assert_eq!(ids(result.next.items()), vec![2, 1]);
        assert_eq!(result.next.get(2).map(|i| i.title.as_str()), Some("PR 2"));
        assert_eq!(ids(&result.arrived), vec![2]);

        let attention = AttentionState::compute(&result.next, &SnoozeRegistry::new());
        assert_eq!(attention.active_count, 2);
    }
}

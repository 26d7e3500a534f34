//! Time-bounded suppression of review items.
//!
//! The registry is plain owned state: it never reads the clock itself, every
//! operation takes `now` from the caller. The tracker actor is its only owner.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Default snooze duration (1 hour).
pub const DEFAULT_SNOOZE_SECS: u64 = 3600;

/// Mapping from review item ID to the instant its snooze ends.
#[derive(Debug, Clone, Default)]
pub struct SnoozeRegistry {
    entries: HashMap<i64, Instant>,
}

impl SnoozeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snooze `id` until `now + duration`.
    ///
    /// Re-snoozing an already snoozed item resets its expiry (last write wins).
    /// A duration past what `Instant` can represent saturates to the latest
    /// representable expiry instead of panicking. Returns the new expiry.
    pub fn snooze(&mut self, id: i64, now: Instant, duration: Duration) -> Instant {
        let until = now
            .checked_add(duration)
            .unwrap_or_else(|| latest_instant(now));
        self.entries.insert(id, until);
        until
    }

    /// Remove a snooze early. Returns whether one existed.
    pub fn unsnooze(&mut self, id: i64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Drop every entry whose expiry is at or before `now`.
    ///
    /// Returns the IDs that were removed.
    pub fn expire(&mut self, now: Instant) -> Vec<i64> {
        let expired: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            self.entries.remove(id);
        }

        expired
    }

    /// Drop every entry whose ID is not in `valid_ids`.
    ///
    /// Returns the IDs that were removed.
    pub fn prune(&mut self, valid_ids: &HashSet<i64>) -> Vec<i64> {
        let stale: Vec<i64> = self
            .entries
            .keys()
            .filter(|id| !valid_ids.contains(id))
            .copied()
            .collect();

        for id in &stale {
            self.entries.remove(id);
        }

        stale
    }

    pub fn is_snoozed(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    /// When the snooze on `id` ends, if it is snoozed.
    pub fn expiry(&self, id: i64) -> Option<Instant> {
        self.entries.get(&id).copied()
    }

    /// The earliest expiry in the registry.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The latest instant reachable from `now`, found by halving the step.
fn latest_instant(now: Instant) -> Instant {
    let mut latest = now;
    let mut step = Duration::MAX;
    while step > Duration::ZERO {
        match latest.checked_add(step) {
            Some(later) => latest = later,
            None => step /= 2,
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(DEFAULT_SNOOZE_SECS);

    #[test]
    fn test_expiry_boundary() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        registry.snooze(5, t, HOUR);

        assert!(registry.expire(t + Duration::from_secs(3599)).is_empty());
        assert!(registry.is_snoozed(5));

        assert_eq!(registry.expire(t + Duration::from_secs(3601)), vec![5]);
        assert!(!registry.is_snoozed(5));
    }

    #[test]
    fn test_expire_at_exact_instant() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        registry.snooze(1, t, HOUR);

        assert_eq!(registry.expire(t + HOUR), vec![1]);
    }

    #[test]
    fn test_resnooze_resets_expiry() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        registry.snooze(9, t, HOUR);
        let later = t + Duration::from_secs(1800);
        let until = registry.snooze(9, later, HOUR);

        assert_eq!(until, later + HOUR);
        assert_eq!(registry.len(), 1);
        // The first snooze would have ended here
        assert!(registry.expire(t + HOUR).is_empty());
        assert!(registry.is_snoozed(9));
    }

    #[test]
    fn test_prune_keeps_only_valid_ids() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        let t1 = registry.snooze(1, t, HOUR);
        let t2 = registry.snooze(2, t, HOUR * 2);

        let valid: HashSet<i64> = [2, 3].into_iter().collect();
        let removed = registry.prune(&valid);

        assert_eq!(removed, vec![1]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.expiry(2), Some(t2));
        assert_ne!(registry.expiry(2), Some(t1));
        assert!(!registry.is_snoozed(1));
    }

    #[test]
    fn test_prune_with_empty_snapshot_clears_everything() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        registry.snooze(1, t, HOUR);
        registry.snooze(2, t, HOUR);

        registry.prune(&HashSet::new());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_operations_are_idempotent() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();

        assert!(!registry.unsnooze(3));
        assert!(registry.expire(t).is_empty());
        assert!(registry.prune(&HashSet::new()).is_empty());

        registry.snooze(3, t, HOUR);
        assert!(registry.unsnooze(3));
        assert!(!registry.unsnooze(3));
    }

    #[test]
    fn test_huge_duration_does_not_overflow() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        let until = registry.snooze(4, t, Duration::MAX);

        assert!(until > t + HOUR);
        assert!(registry.is_snoozed(4));
        assert!(registry.expire(t + HOUR).is_empty());
        assert_eq!(registry.next_expiry(), Some(until));
    }

    #[test]
    fn test_next_expiry_is_earliest() {
        let t = Instant::now();
        let mut registry = SnoozeRegistry::new();
        assert!(registry.next_expiry().is_none());

        registry.snooze(1, t, HOUR * 2);
        registry.snooze(2, t, HOUR);
        assert_eq!(registry.next_expiry(), Some(t + HOUR));
    }
}

//! Attention state: the single signal every presentation layer reads.

use crate::services::reconciler::TrackedSet;
use crate::services::snooze_registry::SnoozeRegistry;
use serde::Serialize;

/// Whether anything needs the user's review right now, and how much.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionState {
    /// Tracked items that are not snoozed.
    pub active_count: usize,

    /// `active_count > 0`.
    pub has_active: bool,
}

impl AttentionState {
    /// Derive the state from the tracked set and snooze registry.
    ///
    /// Callers must run this after every reconciliation and every registry
    /// mutation; the result is never cached across a mutation.
    pub fn compute(tracked: &TrackedSet, snoozes: &SnoozeRegistry) -> Self {
        let active_count = tracked
            .items()
            .iter()
            .filter(|item| !snoozes.is_snoozed(item.id))
            .count();

        Self {
            active_count,
            has_active: active_count > 0,
        }
    }

    /// Short status used for logs and the terminal light.
    pub fn label(&self) -> &'static str {
        if self.has_active {
            "REVIEWS NEEDED"
        } else {
            "ALL CLEAR"
        }
    }
}

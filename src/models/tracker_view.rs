//! Read model published by the review tracker.
//!
//! Presentation layers receive a fresh `TrackerView` after every mutation
//! and never touch the tracker's state directly.

use crate::error::AcquisitionError;
use crate::models::ReviewItem;
use crate::services::attention::AttentionState;
use crate::services::tracker_events::{PollOutcome, PollPhase};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tracked item together with its snooze state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedItemView {
    #[serde(flatten)]
    pub item: ReviewItem,

    /// Whether the item is currently snoozed.
    pub snoozed: bool,

    /// Wall-clock time the snooze ends, if snoozed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<DateTime<Utc>>,
}

/// Poll diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStatus {
    /// Current phase of the poll cycle.
    pub phase: PollPhase,

    /// When the most recent poll started.
    pub last_poll_started: Option<DateTime<Utc>>,

    /// When the most recent successful poll completed.
    pub last_success_at: Option<DateTime<Utc>>,

    /// The most recent acquisition error; cleared by the next success.
    pub last_error: Option<AcquisitionError>,

    /// Polls started since launch.
    pub poll_count: u64,

    /// Polls that failed since launch.
    pub failure_count: u64,

    /// Summary of the most recent successful poll.
    pub last_outcome: Option<PollOutcome>,
}

/// Everything presentation needs: the ordered list, the attention signal
/// and poll diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerView {
    pub items: Vec<TrackedItemView>,
    pub attention: AttentionState,
    pub status: PollStatus,

    /// Number of snoozed items.
    pub snoozed_count: usize,
}

impl TrackerView {
    pub fn get(&self, id: i64) -> Option<&TrackedItemView> {
        self.items.iter().find(|view| view.item.id == id)
    }

    pub fn is_snoozed(&self, id: i64) -> bool {
        self.get(id).is_some_and(|view| view.snoozed)
    }

    /// Browser URL of a tracked item.
    pub fn item_url(&self, id: i64) -> Option<&str> {
        self.get(id).map(|view| view.item.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> TrackerView {
        let item = |id: i64, snoozed: bool| TrackedItemView {
            item: ReviewItem::new(id, "t", format!("https://github.com/a/b/pull/{}", id), "mona", id),
            snoozed,
            snoozed_until: None,
        };
        TrackerView {
            items: vec![item(1, false), item(2, true)],
            attention: AttentionState {
                active_count: 1,
                has_active: true,
            },
            status: PollStatus::default(),
            snoozed_count: 1,
        }
    }

    #[test]
    fn test_lookup() {
        let view = view();
        assert_eq!(view.item_url(2), Some("https://github.com/a/b/pull/2"));
        assert!(view.item_url(3).is_none());
        assert!(view.is_snoozed(2));
        assert!(!view.is_snoozed(1));
        assert!(!view.is_snoozed(3));
    }

    #[test]
    fn test_item_view_flattens() {
        let json = serde_json::to_value(&view().items[1]).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["snoozed"], true);
        assert!(json.get("snoozed_until").is_none());
    }
}

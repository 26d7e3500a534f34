//! Poll cycle phases and the payloads the tracker hands to collaborators.
//!
//! The phases mirror the tracker's state machine:
//! `Idle -> Polling -> (Reconciling -> Notifying -> Idle) | Idle`.

use crate::models::ReviewItem;
use serde::Serialize;

/// Phase of the poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// Waiting for the next tick or a manual trigger.
    #[default]
    Idle,

    /// A snapshot fetch is in flight.
    Polling,

    /// Merging a snapshot into the tracked set.
    Reconciling,

    /// Handing newly arrived items to the notifier.
    Notifying,
}

impl std::fmt::Display for PollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Reconciling => write!(f, "reconciling"),
            Self::Notifying => write!(f, "notifying"),
        }
    }
}

/// What started a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollTrigger {
    /// The periodic interval fired.
    Scheduled,

    /// `trigger_poll_now` was called.
    Manual,

    /// A manual trigger arrived mid-poll and was queued behind it.
    Queued,
}

impl std::fmt::Display for PollTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
            Self::Queued => write!(f, "queued"),
        }
    }
}

/// Summary of one successful poll, for logging and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome {
    /// Poll sequence number.
    pub seq: u64,

    /// What started the poll.
    pub trigger: PollTrigger,

    /// Items in the new tracked set.
    pub item_count: usize,

    /// Items that were not tracked before.
    pub arrived_count: usize,

    /// Snoozes dropped because their item left the snapshot.
    pub pruned_snoozes: usize,

    /// Fetch duration in milliseconds.
    pub duration_ms: i64,
}

/// A user-facing alert for newly arrived review requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrivalNotification {
    /// Notification title.
    pub title: String,

    /// Notification body.
    pub body: String,

    /// Item to open when the alert is clicked (absent for summaries).
    pub item_id: Option<i64>,

    /// Browser URL for the item (absent for summaries).
    pub url: Option<String>,
}

/// Above this many arrivals in one poll, a single summary is sent instead.
pub const MAX_INDIVIDUAL_NOTIFICATIONS: usize = 3;

impl ArrivalNotification {
    /// Alert for a single review request.
    pub fn for_item(item: &ReviewItem) -> Self {
        let body = match item.change_summary() {
            Some(changes) => format!("{} by @{} ({})", item.title, item.author, changes),
            None => format!("{} by @{}", item.title, item.author),
        };

        Self {
            title: format!("Review requested: #{}", item.number),
            body,
            item_id: Some(item.id),
            url: Some(item.url.clone()),
        }
    }

    /// Alerts for a batch of arrivals: one per item, or one summary when
    /// there are more than [`MAX_INDIVIDUAL_NOTIFICATIONS`].
    pub fn for_arrivals(items: &[ReviewItem]) -> Vec<Self> {
        if items.len() > MAX_INDIVIDUAL_NOTIFICATIONS {
            vec![Self {
                title: format!("{} new review requests", items.len()),
                body: items
                    .iter()
                    .map(|item| item.title.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                item_id: None,
                url: None,
            }]
        } else {
            items.iter().map(Self::for_item).collect()
        }
    }
}

//! Background review tracker.
//!
//! This module owns the poll cycle:
//! - Scheduled polling at a fixed interval, plus manual triggers
//! - Reconciliation of each snapshot into the tracked set
//! - Snooze bookkeeping (expiry and pruning)
//! - Attention state recompute and publication to presentation
//! - Handing newly arrived items to the notifier
//!
//! All state lives in a single task. Commands arrive over an mpsc channel,
//! fetches run in their own task and report back over a second channel, so
//! a slow fetch never blocks snoozing and no two reconciliations can overlap.

use crate::error::{AcquisitionError, AppError};
use crate::models::{PollStatus, ReviewItem, TrackedItemView, TrackerView};
use crate::services::attention::AttentionState;
use crate::services::reconciler::{self, Reconciliation, TrackedSet};
use crate::services::snapshot_source::{Notifier, SnapshotSource};
use crate::services::snooze_registry::{SnoozeRegistry, DEFAULT_SNOOZE_SECS};
use crate::services::tracker_events::{PollOutcome, PollPhase, PollTrigger};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default poll interval in seconds (1 minute).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default upper bound on a single snapshot fetch, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;

/// Longest accepted poll interval and fetch timeout (1 day).
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Longest accepted snooze (7 days).
pub const MAX_SNOOZE_SECS: u64 = 7 * 86_400;

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 16;

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Poll interval in seconds.
    pub poll_interval_secs: u64,

    /// How long a snooze lasts, in seconds.
    pub snooze_duration_secs: u64,

    /// Give up on a fetch after this many seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            snooze_duration_secs: DEFAULT_SNOOZE_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        for (value, max, field) in self.bounded_fields() {
            if value == 0 {
                return Err(AppError::config_field("must be at least 1 second", field));
            }
            if value > max {
                return Err(AppError::config_field(
                    format!("must be at most {} seconds", max),
                    field,
                ));
            }
        }
        Ok(())
    }

    /// Force every value into its accepted range.
    ///
    /// The tracker runs on the clamped copy, so a config that skipped
    /// [`TrackerConfig::validate`] still cannot overflow its timers.
    pub fn clamped(&self) -> Self {
        let clamp = |value: u64, max: u64, field: &str| {
            let clamped = value.clamp(1, max);
            if clamped != value {
                log::warn!("[tracker] {}={} out of range, using {}", field, value, clamped);
            }
            clamped
        };

        Self {
            poll_interval_secs: clamp(
                self.poll_interval_secs,
                MAX_POLL_INTERVAL_SECS,
                "poll_interval_secs",
            ),
            snooze_duration_secs: clamp(
                self.snooze_duration_secs,
                MAX_SNOOZE_SECS,
                "snooze_duration_secs",
            ),
            fetch_timeout_secs: clamp(
                self.fetch_timeout_secs,
                MAX_POLL_INTERVAL_SECS,
                "fetch_timeout_secs",
            ),
        }
    }

    fn bounded_fields(&self) -> [(u64, u64, &'static str); 3] {
        [
            (self.poll_interval_secs, MAX_POLL_INTERVAL_SECS, "poll_interval_secs"),
            (self.snooze_duration_secs, MAX_SNOOZE_SECS, "snooze_duration_secs"),
            (self.fetch_timeout_secs, MAX_POLL_INTERVAL_SECS, "fetch_timeout_secs"),
        ]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn snooze_duration(&self) -> Duration {
        Duration::from_secs(self.snooze_duration_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Commands that can be sent to the tracker.
#[derive(Debug)]
pub enum TrackerCommand {
    /// Poll now (queued behind an in-flight poll).
    PollNow,

    /// Snooze an item for the configured duration.
    Snooze(i64),

    /// End an item's snooze early.
    Unsnooze(i64),

    /// Replace the configuration.
    UpdateConfig(TrackerConfig),

    /// Stop the tracker.
    Stop,
}

/// Lightweight handle for controlling the background tracker.
///
/// Cloneable; all clones talk to the same tracker task.
#[derive(Clone)]
pub struct TrackerHandle {
    /// Command channel sender.
    command_tx: mpsc::Sender<TrackerCommand>,

    /// Latest published view.
    view_rx: watch::Receiver<TrackerView>,

    /// Stops the tracker task.
    cancel: CancellationToken,
}

impl TrackerHandle {
    async fn send(&self, command: TrackerCommand) -> Result<(), AppError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| AppError::EngineStopped)
    }

    /// Poll now. A poll already in flight is not interrupted; this one runs
    /// right after it.
    pub async fn trigger_poll_now(&self) -> Result<(), AppError> {
        self.send(TrackerCommand::PollNow).await
    }

    /// Snooze a tracked item.
    pub async fn snooze_item(&self, id: i64) -> Result<(), AppError> {
        self.ensure_tracked(id)?;
        self.send(TrackerCommand::Snooze(id)).await
    }

    /// End a snooze early.
    pub async fn unsnooze_item(&self, id: i64) -> Result<(), AppError> {
        self.send(TrackerCommand::Unsnooze(id)).await
    }

    /// Update the tracker configuration.
    pub async fn update_config(&self, config: TrackerConfig) -> Result<(), AppError> {
        config.validate()?;
        self.send(TrackerCommand::UpdateConfig(config)).await
    }

    /// Look up the browser URL of a tracked item. Does not mutate anything.
    pub fn open_item(&self, id: i64) -> Result<String, AppError> {
        self.view_rx
            .borrow()
            .item_url(id)
            .map(str::to_string)
            .ok_or_else(|| AppError::not_found_with_id("review item", id.to_string()))
    }

    /// Current view (items, attention state, diagnostics).
    pub fn view(&self) -> TrackerView {
        self.view_rx.borrow().clone()
    }

    pub fn attention(&self) -> AttentionState {
        self.view_rx.borrow().attention
    }

    /// The most recent acquisition error, if the last poll failed.
    pub fn last_error(&self) -> Option<AcquisitionError> {
        self.view_rx.borrow().status.last_error.clone()
    }

    /// A receiver that wakes on every published change.
    pub fn subscribe(&self) -> watch::Receiver<TrackerView> {
        self.view_rx.clone()
    }

    /// Wait until the published view satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&TrackerView) -> bool,
    ) -> Result<TrackerView, AppError> {
        let mut rx = self.view_rx.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| AppError::EngineStopped)?;
        Ok(view.clone())
    }

    /// Stop the tracker and wait for its task to exit.
    ///
    /// A fetch in flight is abandoned; its result is discarded.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.command_tx.closed().await;
    }

    fn ensure_tracked(&self, id: i64) -> Result<(), AppError> {
        if self.view_rx.borrow().get(id).is_some() {
            Ok(())
        } else {
            Err(AppError::not_found_with_id("review item", id.to_string()))
        }
    }
}

/// Result of a fetch, delivered back to the tracker task.
struct FetchCompletion {
    seq: u64,
    trigger: PollTrigger,
    duration: Duration,
    result: Result<Vec<ReviewItem>, AcquisitionError>,
}

/// Background review tracker.
///
/// Sole owner of the tracked set and the snooze registry.
pub struct ReviewTracker {
    source: Arc<dyn SnapshotSource>,
    notifier: Arc<dyn Notifier>,
    config: TrackerConfig,

    tracked: TrackedSet,
    snoozes: SnoozeRegistry,
    status: PollStatus,
    last_attention: AttentionState,

    /// Sequence number of the last poll started.
    poll_seq: u64,

    /// Sequence number of the poll currently in flight.
    in_flight: Option<u64>,

    /// A manual trigger arrived while polling.
    poll_queued: bool,

    view_tx: watch::Sender<TrackerView>,
}

impl ReviewTracker {
    /// Create a tracker with empty state. Call [`ReviewTracker::start`] to run it.
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        notifier: Arc<dyn Notifier>,
        config: TrackerConfig,
    ) -> (Self, watch::Receiver<TrackerView>) {
        let (view_tx, view_rx) = watch::channel(TrackerView::default());
        let tracker = Self {
            source,
            notifier,
            config: config.clamped(),
            tracked: TrackedSet::default(),
            snoozes: SnoozeRegistry::new(),
            status: PollStatus::default(),
            last_attention: AttentionState::default(),
            poll_seq: 0,
            in_flight: None,
            poll_queued: false,
            view_tx,
        };
        (tracker, view_rx)
    }

    /// Spawn the tracker loop and return a handle to it.
    ///
    /// The first poll runs immediately, then every `poll_interval_secs`.
    pub fn start(
        source: Arc<dyn SnapshotSource>,
        notifier: Arc<dyn Notifier>,
        config: TrackerConfig,
    ) -> TrackerHandle {
        let (tracker, view_rx) = Self::new(source, notifier, config);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();

        tokio::spawn(tracker.run(command_rx, cancel.clone()));

        TrackerHandle {
            command_tx,
            view_rx,
            cancel,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<TrackerCommand>, cancel: CancellationToken) {
        let (fetch_tx, mut fetched) = mpsc::channel::<FetchCompletion>(1);

        let mut interval = time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "[tracker] Started, polling every {}s, snoozing for {}s",
            self.config.poll_interval_secs,
            self.config.snooze_duration_secs
        );

        loop {
            let next_expiry = self.snoozes.next_expiry();
            // Only awaited when a snooze is pending
            let wake_at = next_expiry
                .map(time::Instant::from_std)
                .unwrap_or_else(time::Instant::now);

            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    self.expire_snoozes();
                    self.start_poll(PollTrigger::Scheduled, &fetch_tx);
                }
                Some(completion) = fetched.recv() => {
                    self.finish_poll(completion);
                    if self.poll_queued {
                        self.poll_queued = false;
                        self.start_poll(PollTrigger::Queued, &fetch_tx);
                    }
                }
                _ = time::sleep_until(wake_at), if next_expiry.is_some() => {
                    self.expire_snoozes();
                }
                command = commands.recv() => match command {
                    Some(TrackerCommand::PollNow) => {
                        log::info!("[tracker] Manual poll requested");
                        self.start_poll(PollTrigger::Manual, &fetch_tx);
                    }
                    Some(TrackerCommand::Snooze(id)) => self.snooze(id),
                    Some(TrackerCommand::Unsnooze(id)) => self.unsnooze(id),
                    Some(TrackerCommand::UpdateConfig(config)) => {
                        interval = self.apply_config(config);
                    }
                    Some(TrackerCommand::Stop) | None => break,
                },
            }
        }

        if let Some(seq) = self.in_flight {
            log::debug!("[tracker] Abandoning in-flight poll #{}", seq);
        }
        log::info!("[tracker] Stopped");
    }

    /// Enter `Polling` and spawn the fetch, unless a poll is already in flight.
    fn start_poll(&mut self, trigger: PollTrigger, fetch_tx: &mpsc::Sender<FetchCompletion>) {
        if let Some(seq) = self.in_flight {
            match trigger {
                PollTrigger::Scheduled => {
                    log::debug!("[tracker] Tick skipped, poll #{} still in flight", seq);
                }
                _ => {
                    log::debug!("[tracker] Poll #{} in flight, queueing another", seq);
                    self.poll_queued = true;
                }
            }
            return;
        }

        self.poll_seq += 1;
        let seq = self.poll_seq;
        self.in_flight = Some(seq);
        self.status.poll_count += 1;
        self.status.last_poll_started = Some(Utc::now());
        self.set_phase(PollPhase::Polling);
        self.publish();

        log::info!("[tracker] Poll #{} ({}) checking for pending reviews...", seq, trigger);

        let source = Arc::clone(&self.source);
        let fetch_tx = fetch_tx.clone();
        let timeout = self.config.fetch_timeout();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = match time::timeout(timeout, source.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(AcquisitionError::network(format!(
                    "Snapshot fetch timed out after {}s",
                    timeout.as_secs()
                ))),
            };

            // The tracker may have stopped meanwhile; then nobody is listening.
            let _ = fetch_tx
                .send(FetchCompletion {
                    seq,
                    trigger,
                    duration: started.elapsed(),
                    result,
                })
                .await;
        });
    }

    /// Apply a fetch result: reconcile on success, keep everything on failure.
    fn finish_poll(&mut self, completion: FetchCompletion) {
        if self.in_flight != Some(completion.seq) {
            log::warn!("[tracker] Ignoring result of stale poll #{}", completion.seq);
            return;
        }
        self.in_flight = None;

        let snapshot = match completion.result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!(
                    "[tracker] Poll #{} failed ({}): {}; keeping {} tracked reviews",
                    completion.seq,
                    e.kind(),
                    e,
                    self.tracked.len()
                );
                self.status.failure_count += 1;
                self.status.last_error = Some(e);
                self.set_phase(PollPhase::Idle);
                self.publish();
                return;
            }
        };

        self.set_phase(PollPhase::Reconciling);
        let Reconciliation {
            next,
            arrived,
            still_valid_ids,
        } = reconciler::reconcile(&self.tracked, snapshot);
        self.tracked = next;

        let pruned = self.snoozes.prune(&still_valid_ids);
        if !pruned.is_empty() {
            log::info!(
                "[tracker] Removed {} snoozes for completed/closed PRs",
                pruned.len()
            );
        }
        self.snoozes.expire(Instant::now());

        let outcome = PollOutcome {
            seq: completion.seq,
            trigger: completion.trigger,
            item_count: self.tracked.len(),
            arrived_count: arrived.len(),
            pruned_snoozes: pruned.len(),
            duration_ms: completion.duration.as_millis() as i64,
        };
        log::info!(
            "[tracker] Poll #{} complete: found {} pending reviews, {} new ({}ms)",
            outcome.seq,
            outcome.item_count,
            outcome.arrived_count,
            outcome.duration_ms
        );
        for (index, item) in self.tracked.items().iter().enumerate() {
            log::debug!("[tracker]   {}. {} (#{})", index + 1, item.title, item.id);
        }

        self.status.last_success_at = Some(Utc::now());
        self.status.last_error = None;
        self.status.last_outcome = Some(outcome);

        self.set_phase(PollPhase::Notifying);
        self.publish();

        if !arrived.is_empty() {
            self.notifier.notify(&arrived);
        }

        self.set_phase(PollPhase::Idle);
        self.publish();
    }

    fn snooze(&mut self, id: i64) {
        if !self.tracked.contains(id) {
            log::warn!("[tracker] Ignoring snooze for untracked review {}", id);
            return;
        }

        self.snoozes
            .snooze(id, Instant::now(), self.config.snooze_duration());
        if let Some(item) = self.tracked.get(id) {
            log::info!(
                "[tracker] Snoozing PR for {}s: {}",
                self.config.snooze_duration_secs,
                item.title
            );
        }
        self.publish();
    }

    fn unsnooze(&mut self, id: i64) {
        if self.snoozes.unsnooze(id) {
            log::info!("[tracker] Unsnoozed review {}", id);
            self.publish();
        }
    }

    fn expire_snoozes(&mut self) {
        let expired = self.snoozes.expire(Instant::now());
        if expired.is_empty() {
            return;
        }

        for id in &expired {
            match self.tracked.get(*id) {
                Some(item) => log::info!("[tracker] Auto-unsnoozing PR: {}", item.title),
                None => log::info!("[tracker] Auto-unsnoozing review {}", id),
            }
        }
        self.publish();
    }

    /// Swap in a new configuration and return the rebuilt interval timer.
    ///
    /// The next scheduled poll is one full new interval away; existing
    /// snooze expiries are kept.
    fn apply_config(&mut self, config: TrackerConfig) -> time::Interval {
        log::info!(
            "[tracker] Config updated, interval={}s, snooze={}s",
            config.poll_interval_secs,
            config.snooze_duration_secs
        );
        self.config = config.clamped();

        let period = self.config.poll_interval();
        let now = time::Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    fn set_phase(&mut self, phase: PollPhase) {
        if self.status.phase != phase {
            log::debug!("[tracker] {} -> {}", self.status.phase, phase);
            self.status.phase = phase;
        }
    }

    /// Recompute attention state and publish a fresh view.
    fn publish(&mut self) {
        let attention = AttentionState::compute(&self.tracked, &self.snoozes);
        if attention != self.last_attention {
            log::info!(
                "[tracker] Light status: {} ({} active reviews, {} snoozed)",
                attention.label(),
                attention.active_count,
                self.snoozes.len()
            );
            self.last_attention = attention;
        }

        let now = Instant::now();
        let wall_now = Utc::now();
        let items = self
            .tracked
            .items()
            .iter()
            .map(|item| {
                let until = self.snoozes.expiry(item.id);
                TrackedItemView {
                    item: item.clone(),
                    snoozed: until.is_some(),
                    snoozed_until: until.and_then(|until| {
                        let remaining = until.saturating_duration_since(now);
                        chrono::Duration::from_std(remaining)
                            .ok()
                            .and_then(|remaining| wall_now.checked_add_signed(remaining))
                    }),
                }
            })
            .collect();

        self.view_tx.send_replace(TrackerView {
            items,
            attention,
            status: self.status.clone(),
            snoozed_count: self.snoozes.len(),
        });
    }
}

//! Business logic services.
//!
//! The review tracker and the pieces it is built from (reconciler, snooze
//! registry, attention calculator), plus the collaborators it is wired to at
//! runtime: the GitHub snapshot source, keychain credentials and notifiers.
//!
//! Everything except `github_client` and `credentials` is free of I/O and
//! can be tested with in-memory sources.

pub mod attention;
pub mod credentials;
pub mod github_client;
pub mod notifier;
pub mod reconciler;
pub mod snapshot_source;
pub mod snooze_registry;
pub mod tracker;
pub mod tracker_events;

pub use attention::AttentionState;
pub use credentials::CredentialService;
pub use github_client::GitHubClient;
pub use reconciler::{reconcile, TrackedSet};
pub use snapshot_source::{GitHubSnapshotSource, Notifier, SnapshotSource, TokenSource};
pub use snooze_registry::SnoozeRegistry;
pub use tracker::{ReviewTracker, TrackerConfig, TrackerHandle};

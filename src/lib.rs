//! PR Review Light - tracks GitHub pull requests awaiting your review.
//!
//! The core is the [`services::tracker`] actor: it polls a
//! [`services::snapshot_source::SnapshotSource`] on a fixed interval,
//! reconciles each snapshot into the tracked set, expires and prunes
//! snoozes, and publishes a [`models::TrackerView`] whose attention state
//! drives every presentation layer.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use error::{AcquisitionError, AcquisitionErrorKind, AppError};
pub use models::{ReviewItem, TrackerView};
pub use services::{ReviewTracker, TrackerConfig, TrackerHandle};

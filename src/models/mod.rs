//! Data models for the application.
//!
//! These are plain values: review items as fetched from GitHub and the read
//! model the tracker publishes to presentation.

pub mod review_item;
pub mod tracker_view;

// Re-exports for convenient access
pub use review_item::ReviewItem;
pub use tracker_view::{PollStatus, TrackedItemView, TrackerView};

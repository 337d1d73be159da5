//! Service trackers for the lodestar registry.
//!
//! A [`ServiceTracker`](tracker::ServiceTracker) follows the services that
//! match a filter as they are registered, modified and unregistered, keeps
//! them resolved and ranked, and drives an optional
//! [`TrackerCustomizer`](customizer::TrackerCustomizer).
//!
//! - [`tracker`] - The tracker and its lifecycle
//! - [`options`] - What to track and which hooks to run
//! - [`customizer`] - Hook trait and closure-based implementation
//! - [`error`] - Tracker errors
//!
//! # Selection
//!
//! Among tracked services the one with the highest `service.ranking` is
//! selected; ties go to the lowest (oldest) service id. The `set` hook fires
//! whenever the selection changes, with `None` once nothing is tracked.

/// Tracker customization hooks.
pub mod customizer;

/// Tracker errors.
pub mod error;

/// Tracker configuration.
pub mod options;

mod tracked;

/// The service tracker.
pub mod tracker;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::customizer::{CallbackCustomizer, TrackerCustomizer};
    pub use crate::error::{CustomizerError, TrackerError};
    pub use crate::options::TrackerOptions;
    pub use crate::tracker::{ServiceTracker, TrackerState};
}

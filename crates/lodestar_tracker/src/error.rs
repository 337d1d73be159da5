//! Tracker errors.

use lodestar_filter::FilterError;
use lodestar_registry::error::RegistryError;

/// Errors returned by [`ServiceTracker`](crate::tracker::ServiceTracker).
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The tracker filter could not be parsed.
    #[error("invalid tracker filter: {0}")]
    Filter(#[from] FilterError),

    /// A registry call failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The options did not name a service or a filter.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The tracker is not in a state that allows the operation.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// Error a [`TrackerCustomizer`](crate::customizer::TrackerCustomizer) hook
/// may return.
///
/// The tracker logs it and carries on; a failing `adding` hook vetoes the
/// service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CustomizerError(String);

impl CustomizerError {
    /// Creates an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

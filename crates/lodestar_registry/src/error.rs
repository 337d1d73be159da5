//! Registry errors.

use lodestar_filter::FilterError;

use crate::service::ServiceId;

/// Errors returned by registry operations.
///
/// Misuse such as a double unregister or a usage-count underflow is logged
/// and reported here; none of these conditions poison the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// An argument was empty or belongs to a different module.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The operation does not apply in the current state, e.g. the
    /// registration is already gone.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A filter string could not be parsed.
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    /// A service factory failed to produce an instance.
    #[error("failed to resolve service {service_id}: {reason}")]
    Resolution {
        /// The registration whose factory failed.
        service_id: ServiceId,
        /// The factory's error message.
        reason: String,
    },
}

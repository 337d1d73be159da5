//! # Lodestar
//!
//! An in-process service registry. Modules publish services under a name
//! with a set of string properties; other modules look them up with
//! LDAP-style filters, hold counted references to them and follow the
//! best-ranked match with a service tracker.
//!
//! | Crate | Provides |
//! |-------|----------|
//! | [`lodestar_filter`] | Filter parsing and matching |
//! | [`lodestar_registry`] | Registrations, references, usage counting and change events |
//! | [`lodestar_tracker`] | Live, ranked views over the registry |
//!
//! # Example
//!
//! ```
//! use lodestar::prelude::*;
//!
//! let registry = ServiceRegistry::new();
//! let provider = ModuleId::new(1);
//! let consumer = ModuleId::new(2);
//!
//! let tracker = ServiceTracker::for_service(registry.clone(), consumer, "clock").unwrap();
//! tracker.open().unwrap();
//!
//! registry
//!     .register_service(provider, "clock", 42_u64, Properties::from([(SERVICE_RANKING, "3")]))
//!     .unwrap();
//!
//! let ticks = tracker.service().and_then(|service| service.downcast_ref::<u64>().copied());
//! assert_eq!(ticks, Some(42));
//! ```

/// Filter expressions.
pub use lodestar_filter;

/// The service registry.
pub use lodestar_registry;

/// Service trackers.
pub use lodestar_tracker;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use lodestar_filter::{Filter, FilterError, PropertyLookup};
    pub use lodestar_registry::prelude::*;
    pub use lodestar_tracker::prelude::*;
}

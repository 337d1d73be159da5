//! In-process service registry for lodestar.
//!
//! Modules publish services under a name with a set of properties, and
//! other modules look them up by name and [filter](lodestar_filter::Filter),
//! resolve them through counted [`ServiceReference`](reference::ServiceReference)s,
//! and observe changes through service listeners.
//!
//! - [`module`] - Module identities
//! - [`properties`] - Ordered property maps and well-known keys
//! - [`service`] - Service objects, factories and ids
//! - [`registration`] - Provider-side registration handles
//! - [`reference`] - Consumer-side references with reference and usage counts
//! - [`event`] - Change notifications and listener fan-out
//! - [`registry`] - The registry itself
//! - [`config`] - Registry configuration
//! - [`error`] - Registry errors
//!
//! # Lifecycle
//!
//! ```text
//! provider                         registry                        consumer
//!    │ register ─────────────────────▶│── Registered ────────────────▶│
//!    │                                │◀── get_service_references ────│
//!    │                                │◀── get_service ───────────────│
//!    │ unregister ───────────────────▶│── Unregistering ─────────────▶│
//!    │                                │   references invalidated      │
//! ```

/// Registry configuration.
pub mod config;

/// Registry errors.
pub mod error;

/// Change notifications and listeners.
pub mod event;

/// Module identities.
pub mod module;

/// Service properties.
pub mod properties;

/// Consumer-side service references.
pub mod reference;

/// Provider-side registration handles.
pub mod registration;

/// The service registry.
pub mod registry;

/// Service objects and factories.
pub mod service;

pub use lodestar_filter;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::error::RegistryError;
    pub use crate::event::{ListenerId, ServiceEvent, ServiceEventKind};
    pub use crate::module::ModuleId;
    pub use crate::properties::{OBJECT_CLASS, Properties, SERVICE_ID, SERVICE_RANKING};
    pub use crate::reference::ServiceReference;
    pub use crate::registration::{RegistrationState, ServiceRegistration};
    pub use crate::registry::ServiceRegistry;
    pub use crate::service::{
        FactoryError, Service, ServiceFactory, ServiceId, ServiceInstance, ServiceObject,
    };
}

//! Service objects and factories.
//!
//! A registration publishes either one shared instance or a
//! [`ServiceFactory`] that produces an instance per consuming module.
//! Instances are type-erased as [`ServiceInstance`] and recovered with
//! `downcast_arc` or `downcast_ref`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lodestar_registry::service::ServiceInstance;
//!
//! struct Greeter(&'static str);
//!
//! let erased: ServiceInstance = Arc::new(Greeter("hi"));
//! let greeter = erased.downcast_arc::<Greeter>().ok().unwrap();
//! assert_eq!(greeter.0, "hi");
//! ```

use core::fmt;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};

use crate::module::ModuleId;
use crate::registration::ServiceRegistration;

// ─────────────────────────────────────────────────────────────────────────────
// ServiceId
// ─────────────────────────────────────────────────────────────────────────────

/// Registration id.
///
/// Assigned by the registry in increasing order starting at 1 and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(u64);

impl ServiceId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Marker trait for anything that can be published as a service.
///
/// Implemented for every `Send + Sync + 'static` type.
pub trait Service: DowncastSync {}

impl<T: Send + Sync + 'static> Service for T {}

impl_downcast!(sync Service);

/// A resolved, type-erased service object.
pub type ServiceInstance = Arc<dyn Service>;

/// Error a [`ServiceFactory`] reports when it cannot produce an instance.
pub type FactoryError = Box<dyn core::error::Error + Send + Sync>;

/// Produces a service instance per consuming module.
///
/// The registry calls [`get_service`](Self::get_service) when a consumer's
/// usage count goes from 0 to 1, and [`unget_service`](Self::unget_service)
/// when it drops back to 0. Both run outside the registry lock.
/// `get_service` runs while the consumer's reference is locked, so it must
/// neither resolve that reference again nor unregister its own registration.
pub trait ServiceFactory: Send + Sync + 'static {
    /// Creates the instance handed to `consumer`.
    ///
    /// # Errors
    ///
    /// Any error is surfaced to the caller of `get_service` as
    /// [`RegistryError::Resolution`](crate::error::RegistryError::Resolution).
    fn get_service(
        &self,
        consumer: ModuleId,
        registration: &ServiceRegistration,
    ) -> Result<ServiceInstance, FactoryError>;

    /// Releases an instance previously produced for `consumer`.
    fn unget_service(
        &self,
        consumer: ModuleId,
        registration: &ServiceRegistration,
        service: ServiceInstance,
    ) {
        let _ = (consumer, registration, service);
    }
}

/// What a registration publishes.
#[derive(Clone)]
pub enum ServiceObject {
    /// One instance shared by every consumer.
    Instance(ServiceInstance),
    /// A factory invoked per consumer.
    Factory(Arc<dyn ServiceFactory>),
}

impl ServiceObject {
    /// Wraps a concrete value as a shared instance.
    #[must_use]
    pub fn instance<S: Service>(service: S) -> Self {
        ServiceObject::Instance(Arc::new(service))
    }

    /// Wraps a factory.
    #[must_use]
    pub fn factory<F: ServiceFactory>(factory: F) -> Self {
        ServiceObject::Factory(Arc::new(factory))
    }

    /// Returns true for factory registrations.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        matches!(self, ServiceObject::Factory(_))
    }
}

impl fmt::Debug for ServiceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceObject::Instance(_) => f.write_str("Instance"),
            ServiceObject::Factory(_) => f.write_str("Factory"),
        }
    }
}

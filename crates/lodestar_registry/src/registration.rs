//! Registrations published into a [`ServiceRegistry`].
//!
//! A [`ServiceRegistration`] is the provider's handle to a published service.
//! It moves through three states:
//!
//! ```text
//! Valid ──unregister──▶ Unregistering ──listeners notified──▶ Invalid
//! ```
//!
//! Properties stay readable while `Unregistering`, so listeners can inspect
//! what is going away.

use core::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::RegistryError;
use crate::module::ModuleId;
use crate::properties::{OBJECT_CLASS, Properties, SERVICE_ID};
use crate::registry::ServiceRegistry;
use crate::service::{ServiceId, ServiceObject};

/// Lifecycle state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Published and resolvable.
    Valid,
    /// Removed from the registry; listeners are being notified.
    Unregistering,
    /// Fully unregistered.
    Invalid,
}

pub(crate) struct RegistrationInner {
    id: ServiceId,
    service_name: String,
    owner: ModuleId,
    object: ServiceObject,
    properties: RwLock<Properties>,
    state: Mutex<RegistrationState>,
    registry: Weak<ServiceRegistry>,
}

/// Handle to a published service.
///
/// Cloning the handle is cheap and does not affect the registration.
/// Two handles are equal when they refer to the same registration.
#[derive(Clone)]
pub struct ServiceRegistration {
    inner: Arc<RegistrationInner>,
}

impl ServiceRegistration {
    pub(crate) fn new(
        id: ServiceId,
        service_name: &str,
        owner: ModuleId,
        object: ServiceObject,
        mut properties: Properties,
        registry: Weak<ServiceRegistry>,
    ) -> Self {
        inject_identity(&mut properties, service_name, id);
        Self {
            inner: Arc::new(RegistrationInner {
                id,
                service_name: service_name.to_owned(),
                owner,
                object,
                properties: RwLock::new(properties),
                state: Mutex::new(RegistrationState::Valid),
                registry,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RegistrationInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<RegistrationInner>) -> Self {
        Self { inner }
    }

    /// The registration id.
    #[must_use]
    pub fn id(&self) -> ServiceId {
        self.inner.id
    }

    /// The name the service was registered under.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// The providing module.
    #[must_use]
    pub fn owner(&self) -> ModuleId {
        self.inner.owner
    }

    /// A snapshot of the current properties.
    #[must_use]
    pub fn properties(&self) -> Properties {
        self.inner.properties.read().clone()
    }

    /// A single property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        self.inner.properties.read().get(key).map(str::to_owned)
    }

    /// The current ranking.
    #[must_use]
    pub fn ranking(&self) -> i64 {
        self.inner.properties.read().ranking()
    }

    /// Evaluates `f` against the live properties without cloning them.
    pub fn with_properties<R>(&self, f: impl FnOnce(&Properties) -> R) -> R {
        f(&self.inner.properties.read())
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RegistrationState {
        *self.inner.state.lock()
    }

    /// Returns true until unregistration has completed.
    ///
    /// A registration that is still notifying its `Unregistering` listeners
    /// counts as valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state() != RegistrationState::Invalid
    }

    /// What this registration publishes.
    #[must_use]
    pub fn object(&self) -> &ServiceObject {
        &self.inner.object
    }

    /// Moves from `Valid` to `Unregistering`. Returns false if the
    /// registration was not `Valid`.
    pub(crate) fn begin_unregister(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state != RegistrationState::Valid {
            return false;
        }
        *state = RegistrationState::Unregistering;
        true
    }

    pub(crate) fn invalidate(&self) {
        *self.inner.state.lock() = RegistrationState::Invalid;
    }

    /// Replaces the properties, keeping the injected identity, and returns
    /// the previous ones.
    pub(crate) fn replace_properties(&self, mut properties: Properties) -> Properties {
        inject_identity(&mut properties, &self.inner.service_name, self.inner.id);
        core::mem::replace(&mut *self.inner.properties.write(), properties)
    }

    fn registry(&self) -> Result<Arc<ServiceRegistry>, RegistryError> {
        self.inner.registry.upgrade().ok_or_else(|| {
            RegistryError::IllegalState(format!(
                "registry of service {} has been dropped",
                self.inner.id
            ))
        })
    }

    /// Replaces the properties and notifies listeners with
    /// [`Modified`](crate::event::ServiceEventKind::Modified).
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalState`] if the registration is no longer
    /// valid.
    pub fn set_properties(&self, properties: Properties) -> Result<(), RegistryError> {
        self.registry()?.set_properties(self, properties)
    }

    /// Unregisters the service.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalState`] if it was already unregistered.
    pub fn unregister(&self) -> Result<(), RegistryError> {
        self.registry()?.unregister(self)
    }
}

fn inject_identity(properties: &mut Properties, service_name: &str, id: ServiceId) {
    properties.insert(OBJECT_CLASS, service_name);
    properties.insert(SERVICE_ID, id.get().to_string());
}

impl PartialEq for ServiceRegistration {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ServiceRegistration {}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("id", &self.inner.id)
            .field("service_name", &self.inner.service_name)
            .field("owner", &self.inner.owner)
            .field("object", &self.inner.object)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(props: Properties) -> ServiceRegistration {
        ServiceRegistration::new(
            ServiceId::new(3),
            "calc",
            ModuleId::new(1),
            ServiceObject::instance(()),
            props,
            Weak::new(),
        )
    }

    #[test]
    fn identity_is_injected_and_survives_replacement() {
        let reg = registration(Properties::from([("objectClass", "spoofed")]));
        assert_eq!(reg.property(OBJECT_CLASS).as_deref(), Some("calc"));
        assert_eq!(reg.property(SERVICE_ID).as_deref(), Some("3"));

        let previous = reg.replace_properties(Properties::from([("mode", "fast")]));
        assert_eq!(previous.get("mode"), None);
        assert_eq!(reg.property("mode").as_deref(), Some("fast"));
        assert_eq!(reg.property(SERVICE_ID).as_deref(), Some("3"));
    }

    #[test]
    fn state_moves_forward_only_once() {
        let reg = registration(Properties::new());
        assert!(reg.begin_unregister());
        assert_eq!(reg.state(), RegistrationState::Unregistering);
        assert!(reg.is_valid());
        assert!(!reg.begin_unregister());

        reg.invalidate();
        assert!(!reg.is_valid());
    }

    #[test]
    fn detached_registration_reports_missing_registry() {
        let reg = registration(Properties::new());
        assert!(matches!(
            reg.unregister(),
            Err(RegistryError::IllegalState(_))
        ));
    }
}

//! The service registry.
//!
//! [`ServiceRegistry`] stores registrations, assigns ids, hands out
//! [`ServiceReference`]s and resolves service instances through them.
//!
//! # Locking
//!
//! All registration and reference tables live behind one [`RwLock`].
//! Mutations take it exclusively, queries that only read take it shared.
//! Change notifications are dispatched after the lock has been released, so
//! a listener may call back into the registry. Factory callbacks run under
//! the consuming reference's own lock, never under the registry lock.
//!
//! # Example
//!
//! ```
//! use lodestar_registry::prelude::*;
//!
//! struct Adder;
//! impl Adder {
//!     fn add(&self, a: i32, b: i32) -> i32 { a + b }
//! }
//!
//! let registry = ServiceRegistry::new();
//! let provider = ModuleId::new(1);
//! let consumer = ModuleId::new(2);
//!
//! let registration = registry
//!     .register_service(provider, "calc", Adder, Properties::new())
//!     .unwrap();
//!
//! let refs = registry.get_service_references(consumer, Some("calc"), None).unwrap();
//! let service = registry.get_service(consumer, &refs[0]).unwrap().unwrap();
//! assert_eq!(service.downcast_ref::<Adder>().unwrap().add(2, 3), 5);
//!
//! registry.unget_service(consumer, &refs[0]).unwrap();
//! registry.unget_service_reference(consumer, &refs[0]).unwrap();
//! registration.unregister().unwrap();
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use lodestar_filter::Filter;
use parking_lot::RwLock;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::event::{ListenerId, ServiceEvent, ServiceEventKind, ServiceListeners};
use crate::module::ModuleId;
use crate::properties::Properties;
use crate::reference::ServiceReference;
use crate::registration::{RegistrationState, ServiceRegistration};
use crate::service::{Service, ServiceFactory, ServiceId, ServiceInstance, ServiceObject};

// ─────────────────────────────────────────────────────────────────────────────
// RegistryState
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RegistryState {
    current_id: u64,
    registrations: BTreeMap<ServiceId, ServiceRegistration>,
    by_owner: HashMap<ModuleId, Vec<ServiceId>>,
    references: HashMap<ModuleId, HashMap<ServiceId, ServiceReference>>,
    listener_hooks: Vec<ServiceId>,
}

impl RegistryState {
    fn is_registered(&self, registration: &ServiceRegistration) -> bool {
        self.registrations
            .get(&registration.id())
            .is_some_and(|stored| stored == registration)
    }

    /// Returns the owner's reference for `registration`, retained, creating
    /// it when none exists or the existing one was already destroyed.
    fn reference_for(
        &mut self,
        owner: ModuleId,
        registration: &ServiceRegistration,
    ) -> ServiceReference {
        let table = self.references.entry(owner).or_default();
        if let Some(existing) = table.get(&registration.id())
            && existing.retain()
        {
            return existing.clone();
        }

        let created = ServiceReference::new(owner, registration);
        table.insert(registration.id(), created.clone());
        tracing::debug!(
            service_id = %registration.id(),
            consumer = %owner,
            "service reference created"
        );
        created
    }

    fn forget_reference(&mut self, reference: &ServiceReference) {
        let owner = reference.consumer();
        let Some(table) = self.references.get_mut(&owner) else {
            return;
        };
        if table
            .get(&reference.service_id())
            .is_some_and(|stored| stored.same_handle(reference))
        {
            table.remove(&reference.service_id());
        }
        if table.is_empty() {
            self.references.remove(&owner);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// In-process registry of named services.
///
/// Always used behind an [`Arc`]: registrations keep a weak link back to
/// the registry so they can unregister themselves.
pub struct ServiceRegistry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    listeners: ServiceListeners,
    self_ref: Weak<ServiceRegistry>,
}

impl ServiceRegistry {
    /// Creates a registry with the default configuration.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates a registry with the given configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            state: RwLock::new(RegistryState::default()),
            listeners: ServiceListeners::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Publishes `object` under `service_name` on behalf of `owner`.
    ///
    /// The registry assigns the next id and injects it, together with the
    /// service name, into `properties`. Listeners receive
    /// [`Registered`](ServiceEventKind::Registered) after the registration is
    /// visible to queries.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalArgument`] if `service_name` is empty.
    pub fn register(
        &self,
        owner: ModuleId,
        service_name: &str,
        object: ServiceObject,
        properties: Properties,
    ) -> Result<ServiceRegistration, RegistryError> {
        if service_name.is_empty() {
            return Err(RegistryError::IllegalArgument(
                "service name must not be empty".into(),
            ));
        }

        let registration = {
            let mut state = self.state.write();
            state.current_id += 1;
            let id = ServiceId::new(state.current_id);

            let registration = ServiceRegistration::new(
                id,
                service_name,
                owner,
                object,
                properties,
                self.self_ref.clone(),
            );
            state.registrations.insert(id, registration.clone());
            state.by_owner.entry(owner).or_default().push(id);
            if service_name == self.config.hook_service_name() {
                state.listener_hooks.push(id);
            }
            registration
        };

        tracing::debug!(
            service_id = %registration.id(),
            service_name,
            owner = %owner,
            "service registered"
        );

        self.listeners.dispatch(&ServiceEvent::new(
            ServiceEventKind::Registered,
            registration.clone(),
        ));
        Ok(registration)
    }

    /// Publishes a single shared instance.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_service<S: Service>(
        &self,
        owner: ModuleId,
        service_name: &str,
        service: S,
        properties: Properties,
    ) -> Result<ServiceRegistration, RegistryError> {
        self.register(
            owner,
            service_name,
            ServiceObject::instance(service),
            properties,
        )
    }

    /// Publishes a factory that creates one instance per consumer.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_factory<F: ServiceFactory>(
        &self,
        owner: ModuleId,
        service_name: &str,
        factory: F,
        properties: Properties,
    ) -> Result<ServiceRegistration, RegistryError> {
        self.register(
            owner,
            service_name,
            ServiceObject::factory(factory),
            properties,
        )
    }

    /// Unregisters a service.
    ///
    /// Listeners receive [`Unregistering`](ServiceEventKind::Unregistering)
    /// while the properties are still readable. Afterwards every reference
    /// bound to the registration is invalidated and the registration is
    /// marked invalid.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalState`] if the registration is not (or no
    /// longer) registered here.
    pub fn unregister(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        let bound = {
            let mut state = self.state.write();
            if !state.is_registered(registration) || !registration.begin_unregister() {
                drop(state);
                tracing::warn!(
                    service_id = %registration.id(),
                    service_name = registration.service_name(),
                    "service is not registered"
                );
                return Err(RegistryError::IllegalState(format!(
                    "service {} is not registered",
                    registration.id()
                )));
            }

            let id = registration.id();
            state.registrations.remove(&id);
            if let Some(owned) = state.by_owner.get_mut(&registration.owner()) {
                owned.retain(|owned_id| *owned_id != id);
                if owned.is_empty() {
                    state.by_owner.remove(&registration.owner());
                }
            }
            state.listener_hooks.retain(|hook_id| *hook_id != id);

            state
                .references
                .values()
                .filter_map(|table| table.get(&id).cloned())
                .collect::<Vec<_>>()
        };

        tracing::debug!(
            service_id = %registration.id(),
            service_name = registration.service_name(),
            owner = %registration.owner(),
            references = bound.len(),
            "service unregistering"
        );

        self.listeners.dispatch(&ServiceEvent::new(
            ServiceEventKind::Unregistering,
            registration.clone(),
        ));

        for reference in &bound {
            reference.invalidate();
        }
        registration.invalidate();
        Ok(())
    }

    /// Replaces a registration's properties and notifies listeners with
    /// [`Modified`](ServiceEventKind::Modified).
    ///
    /// The replacement is committed under the registry lock, so it either
    /// lands before a concurrent [`unregister`](Self::unregister) takes the
    /// registration out or fails.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalState`] if the registration is not valid.
    pub fn set_properties(
        &self,
        registration: &ServiceRegistration,
        properties: Properties,
    ) -> Result<(), RegistryError> {
        let previous = {
            let state = self.state.write();
            if registration.state() != RegistrationState::Valid
                || !state.is_registered(registration)
            {
                return Err(RegistryError::IllegalState(format!(
                    "cannot modify service {}: not registered",
                    registration.id()
                )));
            }
            registration.replace_properties(properties)
        };
        tracing::debug!(service_id = %registration.id(), "service properties modified");

        self.listeners
            .dispatch(&ServiceEvent::modified(registration.clone(), previous));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    /// Returns retained references for every registration matching
    /// `service_name` and `filter`, in id order.
    ///
    /// Either condition may be omitted. With neither, every registered
    /// service is returned. Each returned reference must eventually be
    /// released with [`unget_service_reference`](Self::unget_service_reference).
    ///
    /// # Errors
    ///
    /// [`RegistryError::Filter`] if `filter` does not parse.
    pub fn get_service_references(
        &self,
        owner: ModuleId,
        service_name: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Vec<ServiceReference>, RegistryError> {
        let filter = filter.map(Filter::parse).transpose()?;
        Ok(self.find_references(owner, service_name, filter.as_ref()))
    }

    /// Like [`get_service_references`](Self::get_service_references) with an
    /// already parsed filter.
    #[must_use]
    pub fn find_references(
        &self,
        owner: ModuleId,
        service_name: Option<&str>,
        filter: Option<&Filter>,
    ) -> Vec<ServiceReference> {
        let mut state = self.state.write();

        let matching: Vec<ServiceRegistration> = state
            .registrations
            .values()
            .filter(|registration| {
                service_name.is_none_or(|name| registration.service_name() == name)
                    && filter.is_none_or(|filter| {
                        registration.with_properties(|props| filter.matches(props))
                    })
            })
            .cloned()
            .collect();

        matching
            .iter()
            .map(|registration| state.reference_for(owner, registration))
            .collect()
    }

    /// Returns a retained reference for one registration.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalState`] if the registration is not registered.
    pub fn service_reference(
        &self,
        owner: ModuleId,
        registration: &ServiceRegistration,
    ) -> Result<ServiceReference, RegistryError> {
        let mut state = self.state.write();
        if !state.is_registered(registration) {
            return Err(RegistryError::IllegalState(format!(
                "service {} is not registered",
                registration.id()
            )));
        }
        Ok(state.reference_for(owner, registration))
    }

    /// Returns the registration with `id`, if registered.
    #[must_use]
    pub fn registration(&self, id: ServiceId) -> Option<ServiceRegistration> {
        self.state.read().registrations.get(&id).cloned()
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().registrations.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().registrations.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reference counting
    // ─────────────────────────────────────────────────────────────────────

    /// Increments a reference's reference count.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalArgument`] if `reference` belongs to another
    /// module, [`RegistryError::IllegalState`] if it was already destroyed.
    pub fn retain_service_reference(
        &self,
        owner: ModuleId,
        reference: &ServiceReference,
    ) -> Result<(), RegistryError> {
        check_owner(owner, reference)?;
        if reference.retain() {
            Ok(())
        } else {
            Err(RegistryError::IllegalState(format!(
                "reference to service {} is already destroyed",
                reference.service_id()
            )))
        }
    }

    /// Decrements a reference's reference count. Returns true when this call
    /// destroyed the reference.
    ///
    /// Destroying a reference whose service is still in use is logged as a
    /// warning. The outstanding uses are dropped and a factory instance is
    /// handed back to its factory.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalArgument`] if `reference` belongs to another
    /// module, [`RegistryError::IllegalState`] if it was already destroyed.
    pub fn unget_service_reference(
        &self,
        owner: ModuleId,
        reference: &ServiceReference,
    ) -> Result<bool, RegistryError> {
        check_owner(owner, reference)?;
        let destroyed = reference.release()?;
        if destroyed {
            self.state.write().forget_reference(reference);
            if let Some(leaked) = reference.discard_usage() {
                hand_back(owner, reference, leaked);
            }
        }
        Ok(destroyed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Service resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Resolves the service behind `reference` and increments its usage
    /// count.
    ///
    /// The first call for a reference resolves the instance, invoking the
    /// factory for factory registrations. Later calls return the cached
    /// instance until the usage count drops back to zero. Returns `Ok(None)`
    /// without touching the usage count when the registration is gone.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::IllegalArgument`] if `reference` belongs to another
    ///   module.
    /// - [`RegistryError::IllegalState`] if the reference was destroyed.
    /// - [`RegistryError::Resolution`] if the factory fails.
    pub fn get_service(
        &self,
        owner: ModuleId,
        reference: &ServiceReference,
    ) -> Result<Option<ServiceInstance>, RegistryError> {
        check_owner(owner, reference)?;
        if reference.is_destroyed() {
            return Err(RegistryError::IllegalState(format!(
                "reference to service {} is already destroyed",
                reference.service_id()
            )));
        }

        let instance = reference.acquire_service(|registration| match registration.object() {
            ServiceObject::Instance(instance) => Ok(Arc::clone(instance)),
            ServiceObject::Factory(factory) => factory
                .get_service(owner, registration)
                .map_err(|err| {
                    tracing::error!(
                        service_id = %registration.id(),
                        service_name = registration.service_name(),
                        consumer = %owner,
                        error = %err,
                        "service factory failed"
                    );
                    RegistryError::Resolution {
                        service_id: registration.id(),
                        reason: err.to_string(),
                    }
                }),
        })?;
        if instance.is_none() {
            tracing::debug!(
                service_id = %reference.service_id(),
                consumer = %owner,
                "service no longer available"
            );
        }
        Ok(instance)
    }

    /// Decrements the usage count of `reference`.
    ///
    /// When it reaches zero the cached instance is dropped and, for factory
    /// registrations that still exist, handed back to the factory.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IllegalArgument`] if `reference` belongs to another
    /// module, [`RegistryError::IllegalState`] if the usage count is already
    /// zero.
    pub fn unget_service(
        &self,
        owner: ModuleId,
        reference: &ServiceReference,
    ) -> Result<(), RegistryError> {
        check_owner(owner, reference)?;
        if let Some(instance) = reference.release_service()? {
            hand_back(owner, reference, instance);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Module queries
    // ─────────────────────────────────────────────────────────────────────

    /// Returns retained references to every registration carrying the
    /// configured listener hook service name.
    #[must_use]
    pub fn listener_hooks(&self, owner: ModuleId) -> Vec<ServiceReference> {
        let mut state = self.state.write();
        let hooks: Vec<ServiceRegistration> = state
            .listener_hooks
            .iter()
            .filter_map(|id| state.registrations.get(id).cloned())
            .collect();
        hooks
            .iter()
            .map(|registration| state.reference_for(owner, registration))
            .collect()
    }

    /// Returns retained references, held by `owner`, to the services
    /// `owner` itself registered.
    #[must_use]
    pub fn registered_services(&self, owner: ModuleId) -> Vec<ServiceReference> {
        let mut state = self.state.write();
        let owned: Vec<ServiceRegistration> = state
            .by_owner
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|id| state.registrations.get(id).cloned())
            .collect();
        owned
            .iter()
            .map(|registration| state.reference_for(owner, registration))
            .collect()
    }

    /// Returns the live references `owner` currently holds, in id order.
    ///
    /// The returned handles are not retained.
    #[must_use]
    pub fn services_in_use(&self, owner: ModuleId) -> Vec<ServiceReference> {
        let state = self.state.read();
        let mut references: Vec<ServiceReference> = state
            .references
            .get(&owner)
            .into_iter()
            .flat_map(|table| table.values())
            .filter(|reference| !reference.is_destroyed())
            .cloned()
            .collect();
        references.sort_by_key(ServiceReference::service_id);
        references
    }

    /// Returns the modules holding a live reference to `registration`.
    #[must_use]
    pub fn using_modules(&self, registration: &ServiceRegistration) -> Vec<ModuleId> {
        let state = self.state.read();
        let mut modules: Vec<ModuleId> = state
            .references
            .iter()
            .filter(|(_, table)| {
                table
                    .get(&registration.id())
                    .is_some_and(|reference| !reference.is_destroyed())
            })
            .map(|(owner, _)| *owner)
            .collect();
        modules.sort();
        modules
    }

    // ─────────────────────────────────────────────────────────────────────
    // Owner cleanup
    // ─────────────────────────────────────────────────────────────────────

    /// Unregisters every service `owner` still has registered.
    ///
    /// Returns how many were unregistered.
    pub fn clear_registrations(&self, owner: ModuleId) -> usize {
        let remaining: Vec<ServiceRegistration> = {
            let state = self.state.read();
            state
                .by_owner
                .get(&owner)
                .into_iter()
                .flatten()
                .filter_map(|id| state.registrations.get(id).cloned())
                .collect()
        };

        let mut cleared = 0;
        for registration in &remaining {
            if self.config.warn_on_dangling() {
                tracing::warn!(
                    service_id = %registration.id(),
                    service_name = registration.service_name(),
                    owner = %owner,
                    "dangling service registration"
                );
            }
            if self.unregister(registration).is_ok() {
                cleared += 1;
            }
        }
        cleared
    }

    /// Drops every usage and reference count `owner` still holds.
    ///
    /// Returns how many references were released.
    pub fn clear_references(&self, owner: ModuleId) -> usize {
        let Some(table) = self.state.write().references.remove(&owner) else {
            return 0;
        };

        let mut released = 0;
        for reference in table.into_values() {
            if reference.is_destroyed() {
                continue;
            }

            if self.config.warn_on_dangling() {
                tracing::warn!(
                    service_id = %reference.service_id(),
                    service_name = reference.service_name(),
                    consumer = %owner,
                    usage_count = reference.usage_count(),
                    reference_count = reference.reference_count(),
                    "dangling service reference"
                );
            }

            while reference.usage_count() > 0 {
                if self.unget_service(owner, &reference).is_err() {
                    break;
                }
            }
            while let Ok(destroyed) = reference.release() {
                if destroyed {
                    break;
                }
            }
            if let Some(leaked) = reference.discard_usage() {
                hand_back(owner, &reference, leaked);
            }
            released += 1;
        }
        released
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listeners
    // ─────────────────────────────────────────────────────────────────────

    /// Adds a change listener, optionally restricted by a filter.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Filter`] if `filter` does not parse.
    pub fn add_service_listener(
        &self,
        owner: ModuleId,
        filter: Option<&str>,
        listener: impl Fn(&ServiceEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId, RegistryError> {
        let filter = filter.map(Filter::parse).transpose()?;
        Ok(self.add_listener(owner, filter, listener))
    }

    /// Adds a change listener with an already parsed filter.
    pub fn add_listener(
        &self,
        owner: ModuleId,
        filter: Option<Filter>,
        listener: impl Fn(&ServiceEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.listeners.add(owner, filter, listener);
        tracing::debug!(listener = %id, owner = %owner, "service listener added");
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_service_listener(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        if removed {
            tracing::debug!(listener = %id, "service listener removed");
        }
        removed
    }

    /// Removes every listener added by `owner`, returning how many.
    pub fn remove_service_listeners(&self, owner: ModuleId) -> usize {
        self.listeners.remove_owned_by(owner)
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Returns a released instance to its factory, if the registration still
/// exists and is a factory. Plain instances are simply dropped.
fn hand_back(owner: ModuleId, reference: &ServiceReference, instance: ServiceInstance) {
    if let Some(registration) = reference.registration()
        && let ServiceObject::Factory(factory) = registration.object()
    {
        factory.unget_service(owner, &registration, instance);
    }
}

fn check_owner(owner: ModuleId, reference: &ServiceReference) -> Result<(), RegistryError> {
    if reference.consumer() == owner {
        return Ok(());
    }
    Err(RegistryError::IllegalArgument(format!(
        "reference to service {} belongs to {}, not {}",
        reference.service_id(),
        reference.consumer(),
        owner
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{OBJECT_CLASS, SERVICE_ID};

    const PROVIDER: ModuleId = ModuleId::new(1);
    const CONSUMER: ModuleId = ModuleId::new(2);

    #[test]
    fn ids_start_at_one_and_increase() {
        let registry = ServiceRegistry::new();
        let a = registry
            .register_service(PROVIDER, "a", (), Properties::new())
            .unwrap();
        let b = registry
            .register_service(PROVIDER, "b", (), Properties::new())
            .unwrap();

        assert_eq!(a.id(), ServiceId::new(1));
        assert_eq!(b.id(), ServiceId::new(2));
        assert_eq!(a.property(SERVICE_ID).as_deref(), Some("1"));
        assert_eq!(b.property(OBJECT_CLASS).as_deref(), Some("b"));
    }

    #[test]
    fn ids_are_not_reused_after_unregister() {
        let registry = ServiceRegistry::new();
        let a = registry
            .register_service(PROVIDER, "a", (), Properties::new())
            .unwrap();
        a.unregister().unwrap();
        let b = registry
            .register_service(PROVIDER, "a", (), Properties::new())
            .unwrap();
        assert_eq!(b.id(), ServiceId::new(2));
    }

    #[test]
    fn empty_service_name_is_rejected() {
        let registry = ServiceRegistry::new();
        let err = registry
            .register_service(PROVIDER, "", (), Properties::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::IllegalArgument(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn repeated_lookup_returns_the_same_reference() {
        let registry = ServiceRegistry::new();
        registry
            .register_service(PROVIDER, "calc", (), Properties::new())
            .unwrap();

        let first = registry.find_references(CONSUMER, Some("calc"), None);
        let second = registry.find_references(CONSUMER, Some("calc"), None);

        assert!(first[0].same_handle(&second[0]));
        assert_eq!(first[0].reference_count(), 2);
    }

    #[test]
    fn destroyed_reference_is_replaced_on_next_lookup() {
        let registry = ServiceRegistry::new();
        registry
            .register_service(PROVIDER, "calc", (), Properties::new())
            .unwrap();

        let first = registry.find_references(CONSUMER, None, None).remove(0);
        assert!(registry.unget_service_reference(CONSUMER, &first).unwrap());

        let second = registry.find_references(CONSUMER, None, None).remove(0);
        assert!(!second.same_handle(&first));
        assert_eq!(second.reference_count(), 1);
        assert_eq!(registry.services_in_use(CONSUMER).len(), 1);
    }

    #[test]
    fn foreign_owner_is_rejected() {
        let registry = ServiceRegistry::new();
        registry
            .register_service(PROVIDER, "calc", (), Properties::new())
            .unwrap();
        let reference = registry.find_references(CONSUMER, None, None).remove(0);

        let other = ModuleId::new(99);
        assert!(matches!(
            registry.get_service(other, &reference),
            Err(RegistryError::IllegalArgument(_))
        ));
        assert!(matches!(
            registry.retain_service_reference(other, &reference),
            Err(RegistryError::IllegalArgument(_))
        ));
        assert_eq!(reference.reference_count(), 1);
    }

    #[test]
    fn hook_service_name_is_configurable() {
        let registry =
            ServiceRegistry::with_config(RegistryConfig::default().with_hook_service_name("hooks"));
        registry
            .register_service(PROVIDER, "hooks", (), Properties::new())
            .unwrap();
        registry
            .register_service(PROVIDER, "listener_hook_service", (), Properties::new())
            .unwrap();

        let hooks = registry.listener_hooks(CONSUMER);
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].service_name(), "hooks");
    }

    #[test]
    fn set_properties_on_unregistered_service_fails() {
        let registry = ServiceRegistry::new();
        let reg = registry
            .register_service(PROVIDER, "calc", (), Properties::new())
            .unwrap();
        reg.unregister().unwrap();

        assert!(matches!(
            reg.set_properties(Properties::new()),
            Err(RegistryError::IllegalState(_))
        ));
    }
}

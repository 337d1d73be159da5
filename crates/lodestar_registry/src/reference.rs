//! Service references.
//!
//! A [`ServiceReference`] binds one consuming module to one registration.
//! The registry hands out at most one live reference per
//! `(consumer, registration)` pair and guards it with two independent
//! counters:
//!
//! - **reference count**: keeps the reference itself alive. Changed with
//!   [`retain_service_reference`] and [`unget_service_reference`].
//! - **usage count**: keeps the resolved service instance cached. Changed
//!   with [`get_service`] and [`unget_service`].
//!
//! When the registration is unregistered the reference is invalidated. It
//! stays inspectable (id, consumer, reference count) but can no longer
//! resolve a service or read properties.
//!
//! Cloning a `ServiceReference` copies the handle only. The counters are
//! explicit and are never changed by `Clone` or `Drop`.
//!
//! [`retain_service_reference`]: crate::registry::ServiceRegistry::retain_service_reference
//! [`unget_service_reference`]: crate::registry::ServiceRegistry::unget_service_reference
//! [`get_service`]: crate::registry::ServiceRegistry::get_service
//! [`unget_service`]: crate::registry::ServiceRegistry::unget_service

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::RegistryError;
use crate::module::ModuleId;
use crate::properties::Properties;
use crate::registration::{RegistrationInner, RegistrationState, ServiceRegistration};
use crate::service::{ServiceId, ServiceInstance};

#[derive(Default)]
struct Usage {
    count: usize,
    cached: Option<ServiceInstance>,
}

struct ReferenceInner {
    consumer: ModuleId,
    provider: ModuleId,
    service_id: ServiceId,
    service_name: String,
    registration: RwLock<Weak<RegistrationInner>>,
    ref_count: AtomicUsize,
    usage: Mutex<Usage>,
}

/// A consumer's handle to a registration.
#[derive(Clone)]
pub struct ServiceReference {
    inner: Arc<ReferenceInner>,
}

impl ServiceReference {
    /// Creates a reference with a reference count of 1.
    pub(crate) fn new(consumer: ModuleId, registration: &ServiceRegistration) -> Self {
        Self {
            inner: Arc::new(ReferenceInner {
                consumer,
                provider: registration.owner(),
                service_id: registration.id(),
                service_name: registration.service_name().to_owned(),
                registration: RwLock::new(registration.downgrade()),
                ref_count: AtomicUsize::new(1),
                usage: Mutex::new(Usage::default()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────

    /// The registration id this reference is bound to.
    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        self.inner.service_id
    }

    /// The module this reference was issued to.
    #[must_use]
    pub fn consumer(&self) -> ModuleId {
        self.inner.consumer
    }

    /// The module that registered the service.
    #[must_use]
    pub fn provider(&self) -> ModuleId {
        self.inner.provider
    }

    /// The registered service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Returns true if both handles point to the same reference object.
    #[must_use]
    pub fn same_handle(&self, other: &ServiceReference) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration access
    // ─────────────────────────────────────────────────────────────────────

    /// The bound registration, or `None` once invalidated.
    #[must_use]
    pub fn registration(&self) -> Option<ServiceRegistration> {
        self.inner
            .registration
            .read()
            .upgrade()
            .map(ServiceRegistration::from_inner)
    }

    /// Returns true while the bound registration has not finished
    /// unregistering.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.registration()
            .is_some_and(|registration| registration.state() != RegistrationState::Invalid)
    }

    /// A property of the bound registration.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        self.registration()?.property(key)
    }

    /// A snapshot of the bound registration's properties.
    #[must_use]
    pub fn properties(&self) -> Option<Properties> {
        self.registration().as_ref().map(ServiceRegistration::properties)
    }

    /// Property keys of the bound registration, empty once invalidated.
    #[must_use]
    pub fn property_keys(&self) -> Vec<String> {
        self.registration()
            .map(|registration| {
                registration.with_properties(|props| props.keys().map(str::to_owned).collect())
            })
            .unwrap_or_default()
    }

    /// The current ranking, 0 once invalidated.
    #[must_use]
    pub fn ranking(&self) -> i64 {
        self.registration()
            .as_ref()
            .map_or(0, ServiceRegistration::ranking)
    }

    /// Clears the back-reference to the registration.
    ///
    /// Taken under the usage lock so no resolution can start against a
    /// registration that is being invalidated.
    pub(crate) fn invalidate(&self) {
        let _usage = self.inner.usage.lock();
        *self.inner.registration.write() = Weak::new();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reference count
    // ─────────────────────────────────────────────────────────────────────

    /// The current reference count. 0 means the reference was destroyed.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.inner.ref_count.load(AtomicOrdering::Acquire)
    }

    /// Returns true once the reference count has reached zero.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.reference_count() == 0
    }

    /// Increments the reference count unless it already reached zero.
    pub(crate) fn retain(&self) -> bool {
        self.inner
            .ref_count
            .fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |count| {
                (count > 0).then_some(count + 1)
            })
            .is_ok()
    }

    /// Decrements the reference count and reports whether the reference was
    /// destroyed by this call.
    pub(crate) fn release(&self) -> Result<bool, RegistryError> {
        let previous = self
            .inner
            .ref_count
            .fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |count| {
                count.checked_sub(1)
            })
            .map_err(|_| {
                tracing::warn!(
                    service_id = %self.inner.service_id,
                    consumer = %self.inner.consumer,
                    "release of an already destroyed service reference"
                );
                RegistryError::IllegalState(format!(
                    "reference to service {} is already destroyed",
                    self.inner.service_id
                ))
            })?;

        if previous != 1 {
            return Ok(false);
        }

        let usage_count = self.usage_count();
        if usage_count > 0 {
            tracing::warn!(
                service_id = %self.inner.service_id,
                consumer = %self.inner.consumer,
                usage_count,
                "service reference destroyed while its service is still in use"
            );
        }

        tracing::debug!(
            service_id = %self.inner.service_id,
            consumer = %self.inner.consumer,
            "service reference destroyed"
        );
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Usage count
    // ─────────────────────────────────────────────────────────────────────

    /// The number of outstanding `get_service` calls.
    #[must_use]
    pub fn usage_count(&self) -> usize {
        self.inner.usage.lock().count
    }

    /// Increments the usage count, resolving the instance with `resolve` on
    /// the 0 to 1 transition.
    ///
    /// Returns `Ok(None)` without counting when the registration is gone or
    /// has finished unregistering. The count is unchanged if `resolve` fails.
    pub(crate) fn acquire_service(
        &self,
        resolve: impl FnOnce(&ServiceRegistration) -> Result<ServiceInstance, RegistryError>,
    ) -> Result<Option<ServiceInstance>, RegistryError> {
        let mut usage = self.inner.usage.lock();
        let Some(registration) = self.registration().filter(ServiceRegistration::is_valid) else {
            return Ok(None);
        };

        let cached = if usage.count > 0 {
            usage.cached.clone()
        } else {
            None
        };
        let instance = match cached {
            Some(instance) => instance,
            None => {
                let resolved = resolve(&registration)?;
                usage.cached = Some(Arc::clone(&resolved));
                resolved
            }
        };
        usage.count += 1;
        Ok(Some(instance))
    }

    /// Drops every outstanding use, returning the cached instance if there
    /// was one.
    pub(crate) fn discard_usage(&self) -> Option<ServiceInstance> {
        let mut usage = self.inner.usage.lock();
        usage.count = 0;
        usage.cached.take()
    }

    /// Decrements the usage count. On the 1 to 0 transition the cached
    /// instance is returned so the caller can release it.
    pub(crate) fn release_service(&self) -> Result<Option<ServiceInstance>, RegistryError> {
        let mut usage = self.inner.usage.lock();
        if usage.count == 0 {
            drop(usage);
            tracing::warn!(
                service_id = %self.inner.service_id,
                consumer = %self.inner.consumer,
                "usage count underflow on service reference"
            );
            return Err(RegistryError::IllegalState(format!(
                "service {} is not in use by {}",
                self.inner.service_id, self.inner.consumer
            )));
        }

        usage.count -= 1;
        if usage.count == 0 {
            return Ok(usage.cached.take());
        }
        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

/// Orders two registrations best first: higher ranking wins, then the
/// lower (older) id. Equal ids are always equal.
#[must_use]
pub fn compare_ranking(a: (ServiceId, i64), b: (ServiceId, i64)) -> Ordering {
    let ((id_a, rank_a), (id_b, rank_b)) = (a, b);
    if id_a == id_b {
        return Ordering::Equal;
    }
    rank_b.cmp(&rank_a).then(id_a.cmp(&id_b))
}

impl PartialEq for ServiceReference {
    /// References are equal when they are bound to the same registration.
    fn eq(&self, other: &Self) -> bool {
        self.inner.service_id == other.inner.service_id
    }
}

impl Eq for ServiceReference {}

impl Hash for ServiceReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.service_id.hash(state);
    }
}

impl PartialOrd for ServiceReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceReference {
    /// Best first. See [`compare_ranking`].
    fn cmp(&self, other: &Self) -> Ordering {
        compare_ranking(
            (self.service_id(), self.ranking()),
            (other.service_id(), other.ranking()),
        )
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("service_id", &self.inner.service_id)
            .field("service_name", &self.inner.service_name)
            .field("consumer", &self.inner.consumer)
            .field("reference_count", &self.reference_count())
            .field("usage_count", &self.usage_count())
            .finish()
    }
}

//! Registry change notifications.
//!
//! The registry publishes every change through one path,
//! [`ServiceListeners::dispatch`], which always runs after the registry lock
//! has been released. Listeners may therefore call back into the registry
//! from inside their callback.
//!
//! Each listener can carry a filter. Events for registrations whose
//! properties do not match are skipped, except that a
//! [`Modified`](ServiceEventKind::Modified) change which makes a previously
//! matching registration stop matching is delivered as
//! [`ModifiedEndMatch`](ServiceEventKind::ModifiedEndMatch).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use lodestar_registry::prelude::*;
//!
//! let registry = ServiceRegistry::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! registry
//!     .add_service_listener(ModuleId::FRAMEWORK, Some("(objectClass=calc)"), move |event| {
//!         if event.kind == ServiceEventKind::Registered {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!         }
//!     })
//!     .unwrap();
//!
//! registry.register_service(ModuleId::new(1), "calc", 42_u32, Properties::new()).unwrap();
//! registry.register_service(ModuleId::new(1), "other", 1_u32, Properties::new()).unwrap();
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use lodestar_filter::Filter;
use parking_lot::RwLock;

use crate::module::ModuleId;
use crate::properties::Properties;
use crate::registration::ServiceRegistration;

// ─────────────────────────────────────────────────────────────────────────────
// ServiceEvent
// ─────────────────────────────────────────────────────────────────────────────

/// The kind of change a [`ServiceEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    /// A service was registered.
    Registered,
    /// A service's properties changed.
    Modified,
    /// A service's properties changed so that it no longer matches the
    /// listener's filter.
    ModifiedEndMatch,
    /// A service is being unregistered. Its properties are still readable.
    Unregistering,
}

/// A change delivered to service listeners.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    /// What happened.
    pub kind: ServiceEventKind,
    /// The registration concerned.
    pub registration: ServiceRegistration,
    /// The properties before a `Modified` change.
    pub previous_properties: Option<Properties>,
}

impl ServiceEvent {
    pub(crate) fn new(kind: ServiceEventKind, registration: ServiceRegistration) -> Self {
        Self {
            kind,
            registration,
            previous_properties: None,
        }
    }

    pub(crate) fn modified(registration: ServiceRegistration, previous: Properties) -> Self {
        Self {
            kind: ServiceEventKind::Modified,
            registration,
            previous_properties: Some(previous),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceListeners
// ─────────────────────────────────────────────────────────────────────────────

/// Handle identifying a registered service listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type ListenerFn = dyn Fn(&ServiceEvent) + Send + Sync;

struct ListenerEntry {
    id: ListenerId,
    owner: ModuleId,
    filter: Option<Filter>,
    callback: Box<ListenerFn>,
}

impl ListenerEntry {
    /// Decides which event, if any, this listener receives.
    fn deliverable(&self, event: &ServiceEvent) -> Option<ServiceEventKind> {
        let Some(filter) = &self.filter else {
            return Some(event.kind);
        };

        if event.registration.with_properties(|props| filter.matches(props)) {
            return Some(event.kind);
        }

        let was_matching = event.kind == ServiceEventKind::Modified
            && event
                .previous_properties
                .as_ref()
                .is_some_and(|previous| filter.matches(previous));
        was_matching.then_some(ServiceEventKind::ModifiedEndMatch)
    }
}

/// Ordered set of service listeners.
///
/// Listeners are invoked in the order they were added. Dispatch works on a
/// snapshot, so listeners added or removed during a dispatch take effect
/// from the next event on.
#[derive(Default)]
pub struct ServiceListeners {
    entries: RwLock<Vec<Arc<ListenerEntry>>>,
    next_id: AtomicU64,
}

impl ServiceListeners {
    /// Creates an empty listener set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(
        &self,
        owner: ModuleId,
        filter: Option<Filter>,
        callback: impl Fn(&ServiceEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.entries.write().push(Arc::new(ListenerEntry {
            id,
            owner,
            filter,
            callback: Box::new(callback),
        }));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Removes every listener added by `owner`, returning how many.
    pub(crate) fn remove_owned_by(&self, owner: ModuleId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.owner != owner);
        before - entries.len()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Delivers `event` to every listener whose filter accepts it.
    ///
    /// Must be called without holding the registry lock. A panicking
    /// listener is logged and does not prevent delivery to the others.
    pub(crate) fn dispatch(&self, event: &ServiceEvent) {
        let snapshot: Vec<Arc<ListenerEntry>> = self.entries.read().clone();

        for entry in snapshot {
            let Some(kind) = entry.deliverable(event) else {
                continue;
            };

            let outcome = if kind == event.kind {
                catch_unwind(AssertUnwindSafe(|| (entry.callback)(event)))
            } else {
                let end_match = ServiceEvent {
                    kind,
                    ..event.clone()
                };
                catch_unwind(AssertUnwindSafe(|| (entry.callback)(&end_match)))
            };

            if outcome.is_err() {
                tracing::error!(
                    listener = %entry.id,
                    owner = %entry.owner,
                    service_id = %event.registration.id(),
                    kind = ?event.kind,
                    "service listener panicked"
                );
            }
        }
    }
}

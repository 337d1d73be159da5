//! The service tracker.
//!
//! A [`ServiceTracker`] keeps a live, ranked view of the services matching
//! its filter. Opening it installs a registry listener and then takes a
//! snapshot of the registry; services seen by both are tracked once. From
//! then on:
//!
//! | registry event | tracker reaction |
//! |----------------|------------------|
//! | `Registered` | resolve, `adding`, track, `added` |
//! | `Modified` | `modified` if tracked, otherwise track it |
//! | `ModifiedEndMatch` | untrack |
//! | `Unregistering` | untrack |
//!
//! Untracking removes the entry, calls `removed`, waits for in-flight
//! [`use_services`](ServiceTracker::use_services) calls, then releases the
//! service and the reference. After every change the highest-ranked service
//! is recomputed and `set` fires if it changed.
//!
//! # States
//!
//! ```text
//! Created ──open──▶ Open ──close──▶ Closed
//! ```
//!
//! A closed tracker cannot be reopened. Dropping a tracker closes it.
//!
//! # Example
//!
//! ```
//! use lodestar_registry::prelude::*;
//! use lodestar_tracker::prelude::*;
//!
//! let registry = ServiceRegistry::new();
//! let provider = ModuleId::new(1);
//! let consumer = ModuleId::new(2);
//!
//! registry.register_service(provider, "greeter", "hello", Properties::new()).unwrap();
//!
//! let tracker = ServiceTracker::new(
//!     registry.clone(),
//!     consumer,
//!     TrackerOptions::new("greeter"),
//! ).unwrap();
//! tracker.open().unwrap();
//!
//! let greeting = tracker.use_highest_ranking(|service, _props| {
//!     assert_eq!(service.downcast_ref::<&str>(), Some(&"hello"));
//! });
//! assert!(greeting);
//!
//! tracker.close();
//! assert_eq!(tracker.tracked_count(), 0);
//! ```

use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use lodestar_filter::Filter;
use lodestar_registry::event::{ListenerId, ServiceEvent, ServiceEventKind};
use lodestar_registry::module::ModuleId;
use lodestar_registry::properties::Properties;
use lodestar_registry::reference::ServiceReference;
use lodestar_registry::registration::RegistrationState;
use lodestar_registry::registry::ServiceRegistry;
use lodestar_registry::service::{ServiceId, ServiceInstance};
use parking_lot::{Mutex, RwLock};

use crate::customizer::TrackerCustomizer;
use crate::error::{CustomizerError, TrackerError};
use crate::options::TrackerOptions;
use crate::tracked::{EntryUse, TrackedEntry};

/// Lifecycle state of a [`ServiceTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Constructed, not yet opened.
    Created,
    /// Tracking.
    Open,
    /// Closed for good.
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// TrackerShared
// ─────────────────────────────────────────────────────────────────────────────

/// The selected service id and how often it has changed.
#[derive(Default)]
struct Selection {
    id: Option<ServiceId>,
    generation: u64,
}

struct TrackerShared {
    registry: Arc<ServiceRegistry>,
    owner: ModuleId,
    filter: Filter,
    customizer: Option<Arc<dyn TrackerCustomizer>>,
    state: Mutex<TrackerState>,
    listener: Mutex<Option<ListenerId>>,
    entries: RwLock<Vec<Arc<TrackedEntry>>>,
    /// Held only to compare and swap the selection, never across `set`.
    selection: Mutex<Selection>,
}

impl TrackerShared {
    fn is_open(&self) -> bool {
        *self.state.lock() == TrackerState::Open
    }

    fn is_tracked(&self, id: ServiceId) -> bool {
        self.entries
            .read()
            .iter()
            .any(|entry| entry.service_id() == id)
    }

    /// Runs a customizer hook, logging errors and panics.
    fn guarded<R>(
        &self,
        hook: &'static str,
        service_id: Option<ServiceId>,
        call: impl FnOnce(&dyn TrackerCustomizer) -> Result<R, CustomizerError>,
    ) -> Option<Result<R, ()>> {
        let customizer = self.customizer.as_deref()?;
        let outcome = match catch_unwind(AssertUnwindSafe(|| call(customizer))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::error!(
                    hook,
                    service_id = ?service_id.map(ServiceId::get),
                    consumer = %self.owner,
                    error = %err,
                    "tracker customizer failed"
                );
                Err(())
            }
            Err(_) => {
                tracing::error!(
                    hook,
                    service_id = ?service_id.map(ServiceId::get),
                    consumer = %self.owner,
                    "tracker customizer panicked"
                );
                Err(())
            }
        };
        Some(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event handling
    // ─────────────────────────────────────────────────────────────────────

    fn handle_event(&self, event: &ServiceEvent) {
        if !self.is_open() {
            return;
        }

        let id = event.registration.id();
        match event.kind {
            ServiceEventKind::Modified if self.is_tracked(id) => self.modified(id),
            ServiceEventKind::Registered | ServiceEventKind::Modified => {
                match self
                    .registry
                    .service_reference(self.owner, &event.registration)
                {
                    Ok(reference) => self.track(reference),
                    Err(err) => tracing::debug!(
                        service_id = %id,
                        error = %err,
                        "service vanished before it could be tracked"
                    ),
                }
            }
            ServiceEventKind::ModifiedEndMatch | ServiceEventKind::Unregistering => {
                self.untrack(id);
            }
        }
    }

    /// Tracks a service. `reference` must already be retained on the
    /// tracker's behalf; ownership of that retain passes to the entry.
    fn track(&self, reference: ServiceReference) {
        let id = reference.service_id();
        if self.is_tracked(id) {
            self.release_reference(&reference);
            return;
        }

        let service = match self.registry.get_service(self.owner, &reference) {
            Ok(Some(service)) => service,
            Ok(None) => {
                self.release_reference(&reference);
                return;
            }
            Err(err) => {
                tracing::error!(
                    service_id = %id,
                    consumer = %self.owner,
                    error = %err,
                    "tracker could not resolve service"
                );
                self.release_reference(&reference);
                return;
            }
        };

        let service = match self.guarded("adding", Some(id), |c| {
            c.adding(&reference, Arc::clone(&service))
        }) {
            None => Some(service),
            Some(Ok(customized)) => customized,
            Some(Err(())) => None,
        };
        let Some(service) = service else {
            tracing::debug!(service_id = %id, consumer = %self.owner, "service vetoed by tracker customizer");
            self.release_service(&reference);
            self.release_reference(&reference);
            return;
        };

        let entry = Arc::new(TrackedEntry::new(reference, service));
        {
            let mut entries = self.entries.write();
            if entries.iter().any(|existing| existing.service_id() == id) {
                drop(entries);
                self.release_service(&entry.reference);
                self.release_reference(&entry.reference);
                return;
            }
            entries.push(Arc::clone(&entry));
        }

        tracing::debug!(
            service_id = %id,
            service_name = entry.reference.service_name(),
            consumer = %self.owner,
            "service tracked"
        );

        let _ = self.guarded("added", Some(id), |c| {
            c.added(&entry.reference, &entry.service)
        });
        self.update_selection();

        // The service may have started unregistering, or the tracker may
        // have closed, while it was being added.
        let unregistering = entry
            .reference
            .registration()
            .is_none_or(|registration| registration.state() != RegistrationState::Valid);
        if unregistering || !self.is_open() {
            self.untrack(id);
        }
    }

    fn modified(&self, id: ServiceId) {
        let entry = self
            .entries
            .read()
            .iter()
            .find(|entry| entry.service_id() == id)
            .cloned();
        let Some(entry) = entry else {
            return;
        };

        entry.refresh_ranking();
        let _ = self.guarded("modified", Some(id), |c| {
            c.modified(&entry.reference, &entry.service)
        });
        self.update_selection();
    }

    fn untrack(&self, id: ServiceId) {
        let entry = {
            let mut entries = self.entries.write();
            let Some(position) = entries.iter().position(|entry| entry.service_id() == id) else {
                return;
            };
            entries.remove(position)
        };

        let _ = self.guarded("removed", Some(id), |c| {
            c.removed(&entry.reference, &entry.service)
        });
        self.update_selection();

        entry.wait_idle();
        self.release_service(&entry.reference);
        self.release_reference(&entry.reference);

        tracing::debug!(service_id = %id, consumer = %self.owner, "service untracked");
    }

    fn release_service(&self, reference: &ServiceReference) {
        if let Err(err) = self.registry.unget_service(self.owner, reference) {
            tracing::warn!(
                service_id = %reference.service_id(),
                error = %err,
                "tracker could not release service"
            );
        }
    }

    fn release_reference(&self, reference: &ServiceReference) {
        if let Err(err) = self.registry.unget_service_reference(self.owner, reference) {
            tracing::warn!(
                service_id = %reference.service_id(),
                error = %err,
                "tracker could not release reference"
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────

    fn highest(&self) -> Option<Arc<TrackedEntry>> {
        self.entries
            .read()
            .iter()
            .min_by(|a, b| a.compare(b))
            .cloned()
    }

    /// Recomputes the highest-ranked entry and fires `set` if it changed.
    ///
    /// `set` runs without any tracker lock held. A call whose selection was
    /// already replaced by another thread is skipped.
    fn update_selection(&self) {
        let (best, best_id, generation) = {
            let mut selection = self.selection.lock();
            let best = self.highest();
            let best_id = best.as_ref().map(|entry| entry.service_id());
            if best_id == selection.id {
                return;
            }
            selection.id = best_id;
            selection.generation += 1;
            (best, best_id, selection.generation)
        };

        tracing::debug!(
            service_id = ?best_id.map(ServiceId::get),
            consumer = %self.owner,
            "tracker selection changed"
        );

        if self.selection.lock().generation != generation {
            tracing::debug!(
                service_id = ?best_id.map(ServiceId::get),
                consumer = %self.owner,
                "tracker selection superseded before set"
            );
            return;
        }
        let _ = self.guarded("set", best_id, |c| {
            c.set(best.as_ref().map(|entry| &entry.service))
        });
    }

    /// Entries sorted best first, each with a use registered.
    fn begin_uses(&self) -> Vec<EntryUse> {
        let entries = self.entries.read();
        let mut sorted: Vec<&Arc<TrackedEntry>> = entries.iter().collect();
        sorted.sort_by(|a, b| a.compare(b));
        sorted.into_iter().map(TrackedEntry::begin_use).collect()
    }

    fn sorted_entries(&self) -> Vec<Arc<TrackedEntry>> {
        let mut entries = self.entries.read().clone();
        entries.sort_by(|a, b| a.compare(b));
        entries
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceTracker
// ─────────────────────────────────────────────────────────────────────────────

/// Live, ranked view of the services matching a filter.
pub struct ServiceTracker {
    shared: Arc<TrackerShared>,
}

impl ServiceTracker {
    /// Creates a tracker for `owner`. Call [`open`](Self::open) to start
    /// tracking.
    ///
    /// # Errors
    ///
    /// [`TrackerError::Filter`] or [`TrackerError::IllegalArgument`] if the
    /// options do not produce a valid filter.
    pub fn new(
        registry: Arc<ServiceRegistry>,
        owner: ModuleId,
        options: TrackerOptions,
    ) -> Result<Self, TrackerError> {
        let filter = options.filter().inspect_err(|err| {
            tracing::error!(consumer = %owner, error = %err, "cannot create service tracker");
        })?;

        Ok(Self {
            shared: Arc::new(TrackerShared {
                registry,
                owner,
                filter,
                customizer: options.into_customizer(),
                state: Mutex::new(TrackerState::Created),
                listener: Mutex::new(None),
                entries: RwLock::new(Vec::new()),
                selection: Mutex::new(Selection::default()),
            }),
        })
    }

    /// Creates a tracker for every service registered under `service_name`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn for_service(
        registry: Arc<ServiceRegistry>,
        owner: ModuleId,
        service_name: &str,
    ) -> Result<Self, TrackerError> {
        Self::new(registry, owner, TrackerOptions::new(service_name))
    }

    /// Starts tracking.
    ///
    /// # Errors
    ///
    /// [`TrackerError::IllegalState`] if the tracker was already opened or
    /// closed.
    pub fn open(&self) -> Result<(), TrackerError> {
        let shared = &self.shared;
        {
            let mut state = shared.state.lock();
            if *state != TrackerState::Created {
                return Err(TrackerError::IllegalState(format!(
                    "tracker cannot be opened from {:?}",
                    *state
                )));
            }
            *state = TrackerState::Open;
        }

        let weak: Weak<TrackerShared> = Arc::downgrade(shared);
        let listener = shared.registry.add_listener(
            shared.owner,
            Some(shared.filter.clone()),
            move |event| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_event(event);
                }
            },
        );
        *shared.listener.lock() = Some(listener);

        let initial = shared
            .registry
            .find_references(shared.owner, None, Some(&shared.filter));
        tracing::debug!(
            filter = %shared.filter,
            consumer = %shared.owner,
            initial = initial.len(),
            "service tracker opened"
        );
        for reference in initial {
            shared.track(reference);
        }
        Ok(())
    }

    /// Stops tracking and releases every tracked service.
    ///
    /// Entries are released lowest-ranked first, so `set` fires once with
    /// `None` at the end if a service was selected. Closing twice is a no-op.
    ///
    /// Must not be called from inside a [`use_services`](Self::use_services)
    /// closure of the same tracker.
    pub fn close(&self) {
        let shared = &self.shared;
        {
            let mut state = shared.state.lock();
            if *state == TrackerState::Closed {
                return;
            }
            *state = TrackerState::Closed;
        }

        if let Some(listener) = shared.listener.lock().take() {
            shared.registry.remove_service_listener(listener);
        }

        let mut remaining = shared.sorted_entries();
        remaining.reverse();
        for entry in remaining {
            shared.untrack(entry.service_id());
        }

        tracing::debug!(
            filter = %shared.filter,
            consumer = %shared.owner,
            "service tracker closed"
        );
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        *self.shared.state.lock()
    }

    /// The effective filter.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.shared.filter
    }

    /// The module this tracker acts for.
    #[must_use]
    pub fn owner(&self) -> ModuleId {
        self.shared.owner
    }

    /// Number of tracked services.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.shared.entries.read().len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// The highest-ranked tracked service.
    #[must_use]
    pub fn service(&self) -> Option<ServiceInstance> {
        self.shared
            .highest()
            .map(|entry| Arc::clone(&entry.service))
    }

    /// All tracked services, best first.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceInstance> {
        self.shared
            .sorted_entries()
            .iter()
            .map(|entry| Arc::clone(&entry.service))
            .collect()
    }

    /// The reference of the highest-ranked tracked service.
    ///
    /// The handle is the tracker's own and is not retained for the caller.
    #[must_use]
    pub fn service_reference(&self) -> Option<ServiceReference> {
        self.shared
            .highest()
            .map(|entry| entry.reference.clone())
    }

    /// References of all tracked services, best first.
    #[must_use]
    pub fn service_references(&self) -> Vec<ServiceReference> {
        self.shared
            .sorted_entries()
            .iter()
            .map(|entry| entry.reference.clone())
            .collect()
    }

    /// The tracked service bound to `reference`, if tracked.
    #[must_use]
    pub fn service_for(&self, reference: &ServiceReference) -> Option<ServiceInstance> {
        self.shared
            .entries
            .read()
            .iter()
            .find(|entry| entry.service_id() == reference.service_id())
            .map(|entry| Arc::clone(&entry.service))
    }

    /// Calls `f` with the highest-ranked service and its properties.
    ///
    /// The service is not released while `f` runs, even if it is
    /// unregistered concurrently. Returns false if nothing is tracked.
    pub fn use_highest_ranking(&self, f: impl FnOnce(&ServiceInstance, &Properties)) -> bool {
        let guard = self
            .shared
            .entries
            .read()
            .iter()
            .min_by(|a, b| a.compare(b))
            .map(TrackedEntry::begin_use);
        let Some(guard) = guard else {
            return false;
        };
        let entry = guard.entry();
        let properties = entry.reference.properties().unwrap_or_default();
        f(&entry.service, &properties);
        true
    }

    /// Calls `f` with every tracked service, best first. Returns how many
    /// were visited.
    pub fn use_services(&self, mut f: impl FnMut(&ServiceInstance, &Properties)) -> usize {
        let guards = self.shared.begin_uses();
        for guard in &guards {
            let entry = guard.entry();
            let properties = entry.reference.properties().unwrap_or_default();
            f(&entry.service, &properties);
        }
        guards.len()
    }
}

impl Drop for ServiceTracker {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ServiceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTracker")
            .field("filter", &self.shared.filter.to_string())
            .field("owner", &self.shared.owner)
            .field("state", &self.state())
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

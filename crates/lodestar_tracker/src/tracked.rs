//! Tracked entries.
//!
//! A [`TrackedEntry`] holds the tracker's reference, the resolved (possibly
//! customized) instance and the ranking it was last seen with. Callers that
//! borrow the instance outside the tracker lock register a use; removal
//! waits until every use has ended before the service is released.

use core::cmp::Ordering;
use core::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use lodestar_registry::reference::{ServiceReference, compare_ranking};
use lodestar_registry::service::{ServiceId, ServiceInstance};
use parking_lot::{Condvar, Mutex};

pub(crate) struct TrackedEntry {
    pub(crate) reference: ServiceReference,
    pub(crate) service: ServiceInstance,
    ranking: AtomicI64,
    uses: Mutex<usize>,
    idle: Condvar,
}

impl TrackedEntry {
    pub(crate) fn new(reference: ServiceReference, service: ServiceInstance) -> Self {
        let ranking = reference.ranking();
        Self {
            reference,
            service,
            ranking: AtomicI64::new(ranking),
            uses: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    pub(crate) fn service_id(&self) -> ServiceId {
        self.reference.service_id()
    }

    pub(crate) fn ranking(&self) -> i64 {
        self.ranking.load(AtomicOrdering::Acquire)
    }

    /// Re-reads the ranking from the registration's properties.
    pub(crate) fn refresh_ranking(&self) {
        self.ranking
            .store(self.reference.ranking(), AtomicOrdering::Release);
    }

    /// Best first: higher ranking, then lower id.
    pub(crate) fn compare(&self, other: &TrackedEntry) -> Ordering {
        compare_ranking(
            (self.service_id(), self.ranking()),
            (other.service_id(), other.ranking()),
        )
    }

    /// Registers a use. The returned guard ends it on drop.
    pub(crate) fn begin_use(self: &Arc<Self>) -> EntryUse {
        *self.uses.lock() += 1;
        EntryUse {
            entry: Arc::clone(self),
        }
    }

    /// Blocks until no use is in flight.
    pub(crate) fn wait_idle(&self) {
        let mut uses = self.uses.lock();
        while *uses > 0 {
            self.idle.wait(&mut uses);
        }
    }
}

/// An in-flight use of a tracked entry.
pub(crate) struct EntryUse {
    entry: Arc<TrackedEntry>,
}

impl EntryUse {
    pub(crate) fn entry(&self) -> &TrackedEntry {
        &self.entry
    }
}

impl Drop for EntryUse {
    fn drop(&mut self) {
        let mut uses = self.entry.uses.lock();
        *uses -= 1;
        if *uses == 0 {
            self.entry.idle.notify_all();
        }
    }
}

//! Shared test utilities for `lodestar_registry` integration tests.
//!
//! Import via `mod common;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lodestar_registry::prelude::*;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

pub const PROVIDER: ModuleId = ModuleId::new(1);
pub const CONSUMER: ModuleId = ModuleId::new(2);

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq)]
pub struct Calculator {
    pub label: &'static str,
}

#[derive(Default)]
pub struct FactoryCounters {
    pub gets: AtomicUsize,
    pub ungets: AtomicUsize,
}

impl FactoryCounters {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn ungets(&self) -> usize {
        self.ungets.load(Ordering::SeqCst)
    }
}

/// Factory producing a fresh `Calculator` per consumer and counting calls.
pub struct CountingFactory {
    pub counters: Arc<FactoryCounters>,
    pub fail: bool,
}

impl CountingFactory {
    pub fn new() -> (Self, Arc<FactoryCounters>) {
        let counters = Arc::new(FactoryCounters::default());
        (
            Self {
                counters: Arc::clone(&counters),
                fail: false,
            },
            counters,
        )
    }

    pub fn failing() -> Self {
        Self {
            counters: Arc::new(FactoryCounters::default()),
            fail: true,
        }
    }
}

impl ServiceFactory for CountingFactory {
    fn get_service(
        &self,
        _consumer: ModuleId,
        _registration: &ServiceRegistration,
    ) -> Result<ServiceInstance, FactoryError> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("factory refused".into());
        }
        Ok(Arc::new(Calculator { label: "factory" }))
    }

    fn unget_service(
        &self,
        _consumer: ModuleId,
        _registration: &ServiceRegistration,
        _service: ServiceInstance,
    ) {
        self.counters.ungets.fetch_add(1, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT CAPTURE
// ═══════════════════════════════════════════════════════════════════════════════

pub type EventLog = Arc<Mutex<Vec<(ServiceEventKind, ServiceId)>>>;

/// Records every event the registry delivers for `filter`.
pub fn record_events(registry: &ServiceRegistry, filter: Option<&str>) -> EventLog {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    registry
        .add_service_listener(ModuleId::FRAMEWORK, filter, move |event| {
            sink.lock().push((event.kind, event.registration.id()));
        })
        .unwrap();
    log
}

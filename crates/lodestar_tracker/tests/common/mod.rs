//! Shared test utilities for `lodestar_tracker` integration tests.
//!
//! Import via `mod common;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

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

/// A service identified by a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Named(pub &'static str);

/// The label of a `Named` service.
pub fn label(service: &ServiceInstance) -> &'static str {
    service
        .downcast_ref::<Named>()
        .map_or("<unknown>", |named| named.0)
}

/// Registers `Named(name)` under `service_name` with an optional ranking.
pub fn register(
    registry: &ServiceRegistry,
    service_name: &str,
    name: &'static str,
    ranking: Option<i64>,
) -> ServiceRegistration {
    let mut props = Properties::new();
    if let Some(ranking) = ranking {
        props.insert(SERVICE_RANKING, ranking.to_string());
    }
    registry
        .register_service(PROVIDER, service_name, Named(name), props)
        .unwrap()
}

/// Ordered record of customizer calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Drains and returns the recorded calls.
pub fn take(log: &CallLog) -> Vec<String> {
    core::mem::take(&mut *log.lock())
}

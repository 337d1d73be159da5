//! Behavioural tests for `lodestar_tracker`.

mod common;

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{CONSUMER, CallLog, Named, call_log, init_tracing, label, register, take};
use lodestar_registry::prelude::*;
use lodestar_tracker::prelude::*;

/// Options whose hooks append `hook:label` entries to `log`.
fn logging_options(service_name: &str, log: &CallLog) -> TrackerOptions {
    let (added, modified, removed, set) = (
        Arc::clone(log),
        Arc::clone(log),
        Arc::clone(log),
        Arc::clone(log),
    );
    TrackerOptions::new(service_name)
        .on_added(move |_, service| added.lock().push(format!("added:{}", label(service))))
        .on_modified(move |_, service| {
            modified.lock().push(format!("modified:{}", label(service)));
        })
        .on_removed(move |_, service| {
            removed.lock().push(format!("removed:{}", label(service)));
        })
        .on_set(move |service| {
            set.lock()
                .push(format!("set:{}", service.map_or("none", label)));
        })
}

fn open_tracker(registry: &Arc<ServiceRegistry>, options: TrackerOptions) -> ServiceTracker {
    let tracker = ServiceTracker::new(Arc::clone(registry), CONSUMER, options).unwrap();
    tracker.open().unwrap();
    tracker
}

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn set_follows_ranking_and_age() {
    init_tracing();
    let registry = ServiceRegistry::new();
    let log = call_log();

    register(&registry, "calc", "svc1", None);
    let tracker = open_tracker(&registry, logging_options("calc", &log));
    assert_eq!(take(&log), ["added:svc1", "set:svc1"]);

    let svc3 = register(&registry, "calc", "svc3", Some(10));
    assert_eq!(take(&log), ["added:svc3", "set:svc3"]);

    register(&registry, "calc", "svc4", Some(10));
    assert_eq!(take(&log), ["added:svc4"]);

    svc3.unregister().unwrap();
    assert_eq!(take(&log), ["removed:svc3", "set:svc4"]);

    assert_eq!(tracker.tracked_count(), 2);
    assert_eq!(label(&tracker.service().unwrap()), "svc4");
}

#[test]
fn set_none_when_last_service_leaves() {
    let registry = ServiceRegistry::new();
    let log = call_log();
    let _tracker = open_tracker(&registry, logging_options("calc", &log));
    assert!(take(&log).is_empty());

    let only = register(&registry, "calc", "only", None);
    only.unregister().unwrap();
    assert_eq!(
        take(&log),
        ["added:only", "set:only", "removed:only", "set:none"]
    );
}

#[test]
fn ranking_change_reselects() {
    let registry = ServiceRegistry::new();
    let log = call_log();

    register(&registry, "calc", "a", Some(5));
    let b = register(&registry, "calc", "b", Some(1));
    let tracker = open_tracker(&registry, logging_options("calc", &log));
    take(&log);

    b.set_properties(Properties::from([(SERVICE_RANKING, "9")]))
        .unwrap();
    assert_eq!(take(&log), ["modified:b", "set:b"]);

    let order: Vec<_> = tracker.services().iter().map(label).collect();
    assert_eq!(order, ["b", "a"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Matching
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn extra_filter_narrows_and_modification_ends_match() {
    let registry = ServiceRegistry::new();
    let log = call_log();
    let tracker = open_tracker(
        &registry,
        logging_options("calc", &log).with_filter("(mode=fast)"),
    );

    let fast = registry
        .register_service(
            ModuleId::new(1),
            "calc",
            Named("fast"),
            Properties::from([("mode", "fast")]),
        )
        .unwrap();
    registry
        .register_service(
            ModuleId::new(1),
            "calc",
            Named("slow"),
            Properties::from([("mode", "slow")]),
        )
        .unwrap();
    assert_eq!(tracker.tracked_count(), 1);
    take(&log);

    fast.set_properties(Properties::from([("mode", "slow")]))
        .unwrap();
    assert_eq!(take(&log), ["removed:fast", "set:none"]);
    assert_eq!(tracker.tracked_count(), 0);

    fast.set_properties(Properties::from([("mode", "fast")]))
        .unwrap();
    assert_eq!(take(&log), ["added:fast", "set:fast"]);
}

#[test]
fn filter_only_tracker_spans_service_names() {
    let registry = ServiceRegistry::new();
    registry
        .register_service(ModuleId::new(1), "a", Named("a"), Properties::from([("tier", "gold")]))
        .unwrap();
    registry
        .register_service(ModuleId::new(1), "b", Named("b"), Properties::from([("tier", "gold")]))
        .unwrap();
    registry
        .register_service(ModuleId::new(1), "c", Named("c"), Properties::new())
        .unwrap();

    let tracker = open_tracker(&registry, TrackerOptions::with_filter_only("(tier=gold)"));
    let labels: Vec<_> = tracker.services().iter().map(label).collect();
    assert_eq!(labels, ["a", "b"]);
}

#[test]
fn snapshot_and_events_do_not_double_track() {
    let registry = ServiceRegistry::new();
    register(&registry, "calc", "early", None);
    let tracker = open_tracker(&registry, TrackerOptions::new("calc"));
    register(&registry, "calc", "late", None);

    assert_eq!(tracker.tracked_count(), 2);
    let refs = tracker.service_references();
    assert_eq!(refs.len(), 2);
    for reference in &refs {
        assert_eq!(reference.reference_count(), 1);
        assert_eq!(reference.usage_count(), 1);
    }
    assert_eq!(
        tracker.service_for(&refs[1]).map(|service| label(&service)),
        Some("late")
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Customizer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn adding_can_veto_and_replace() {
    let registry = ServiceRegistry::new();
    let options = TrackerOptions::new("calc").on_adding(|reference, service| {
        match reference.property("kind").as_deref() {
            Some("blocked") => None,
            Some("wrapped") => Some(Arc::new(Named("wrapper")) as ServiceInstance),
            _ => Some(service),
        }
    });
    let tracker = open_tracker(&registry, options);

    registry
        .register_service(
            ModuleId::new(1),
            "calc",
            Named("blocked"),
            Properties::from([("kind", "blocked")]),
        )
        .unwrap();
    registry
        .register_service(
            ModuleId::new(1),
            "calc",
            Named("inner"),
            Properties::from([("kind", "wrapped")]),
        )
        .unwrap();

    assert_eq!(tracker.tracked_count(), 1);
    assert_eq!(label(&tracker.service().unwrap()), "wrapper");

    // The vetoed service was released again.
    let in_use = registry.services_in_use(CONSUMER);
    assert_eq!(in_use.len(), 1);
    assert_eq!(in_use[0].service_id(), ServiceId::new(2));
}

struct Failing {
    removed: Arc<AtomicUsize>,
}

impl TrackerCustomizer for Failing {
    fn added(
        &self,
        _reference: &ServiceReference,
        _service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        panic!("added hook exploded");
    }

    fn removed(
        &self,
        _reference: &ServiceReference,
        _service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        Err(CustomizerError::new("cannot remove"))
    }
}

#[test]
fn failing_customizer_does_not_corrupt_bookkeeping() {
    init_tracing();
    let registry = ServiceRegistry::new();
    let removed = Arc::new(AtomicUsize::new(0));
    let tracker = open_tracker(
        &registry,
        TrackerOptions::new("calc").with_customizer(Failing {
            removed: Arc::clone(&removed),
        }),
    );

    let reg = register(&registry, "calc", "svc", None);
    assert_eq!(tracker.tracked_count(), 1);

    reg.unregister().unwrap();
    assert_eq!(removed.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.tracked_count(), 0);
    assert!(registry.services_in_use(CONSUMER).is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn close_releases_everything_and_sets_none_once() {
    let registry = ServiceRegistry::new();
    let log = call_log();
    register(&registry, "calc", "low", Some(1));
    register(&registry, "calc", "high", Some(9));

    let tracker = open_tracker(&registry, logging_options("calc", &log));
    assert_eq!(registry.listener_count(), 1);
    take(&log);

    tracker.close();
    assert_eq!(tracker.state(), TrackerState::Closed);
    assert_eq!(take(&log), ["removed:low", "removed:high", "set:none"]);
    assert_eq!(tracker.tracked_count(), 0);
    assert_eq!(registry.listener_count(), 0);
    assert!(registry.services_in_use(CONSUMER).is_empty());

    register(&registry, "calc", "after", None);
    assert_eq!(tracker.tracked_count(), 0);
    assert!(take(&log).is_empty());
}

#[test]
fn open_is_allowed_only_once() {
    let registry = ServiceRegistry::new();
    let tracker = ServiceTracker::for_service(Arc::clone(&registry), CONSUMER, "calc").unwrap();
    assert_eq!(tracker.state(), TrackerState::Created);

    tracker.open().unwrap();
    assert!(matches!(tracker.open(), Err(TrackerError::IllegalState(_))));

    tracker.close();
    tracker.close();
    assert!(matches!(tracker.open(), Err(TrackerError::IllegalState(_))));
}

#[test]
fn dropping_an_open_tracker_closes_it() {
    let registry = ServiceRegistry::new();
    register(&registry, "calc", "svc", None);
    {
        let tracker = open_tracker(&registry, TrackerOptions::new("calc"));
        assert_eq!(tracker.tracked_count(), 1);
    }
    assert_eq!(registry.listener_count(), 0);
    assert!(registry.services_in_use(CONSUMER).is_empty());
}

#[test]
fn invalid_filter_fails_construction() {
    let registry = ServiceRegistry::new();
    let err = ServiceTracker::new(
        Arc::clone(&registry),
        CONSUMER,
        TrackerOptions::new("calc").with_filter("(&(a=1)"),
    )
    .unwrap_err();
    assert!(matches!(err, TrackerError::Filter(_)));
    assert_eq!(registry.listener_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Use
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn use_services_visits_best_first() {
    let registry = ServiceRegistry::new();
    register(&registry, "calc", "mid", Some(5));
    register(&registry, "calc", "top", Some(7));
    register(&registry, "calc", "low", None);
    let tracker = open_tracker(&registry, TrackerOptions::new("calc"));

    let mut seen = Vec::new();
    let visited = tracker.use_services(|service, props| {
        seen.push((label(service), props.ranking()));
    });
    assert_eq!(visited, 3);
    assert_eq!(seen, [("top", 7), ("mid", 5), ("low", 0)]);

    let mut best = None;
    assert!(tracker.use_highest_ranking(|service, props| {
        best = Some((label(service), props.get(OBJECT_CLASS).map(str::to_owned)));
    }));
    assert_eq!(best, Some(("top", Some("calc".to_owned()))));
}

#[test]
fn use_on_empty_tracker_reports_nothing() {
    let registry = ServiceRegistry::new();
    let tracker = open_tracker(&registry, TrackerOptions::new("calc"));
    assert!(!tracker.use_highest_ranking(|_, _| panic!("nothing to use")));
    assert_eq!(tracker.use_services(|_, _| panic!("nothing to use")), 0);
    assert!(tracker.service().is_none());
    assert!(tracker.service_reference().is_none());
}

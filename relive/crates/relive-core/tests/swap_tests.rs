//! Swap transaction tests: identity, state transfer, schema changes,
//! rollback and the delete-phase leak.

mod common;

use std::sync::Arc;

use common::*;
use relive_core::{
    FaultKind, Object, ObjectFactory, ObjectId, PropertyPass, Severity, SimpleFactory, SwapConfig,
    SwapError, SwapPhase,
};
use serde::{Deserialize, Serialize};

#[test]
fn test_counter_gains_label_and_keeps_counts() {
    let (mut fx, ctor, ids) = SwapFixture::with_counters(&[1, 2, 3]);

    let report = fx.swap(vec![counter_v2()]).unwrap();

    assert_eq!(report.instances_swapped, 3);
    assert_eq!(fx.registry.all_instances_of(ctor), ids);
    let counts: Vec<_> = ids.iter().map(|&id| fx.count_v2(id).unwrap()).collect();
    assert_eq!(counts, vec![1, 2, 3]);
    for &id in &ids {
        assert_eq!(fx.registry.resolve_as::<CounterV2>(id).unwrap().label, "");
    }
    assert!(report.property_errors.is_empty());
}

#[test]
fn test_identity_survives_with_holes() {
    let (mut fx, ctor, ids) = SwapFixture::with_counters(&[10, 20, 30]);
    fx.registry.destroy(ids[1]).unwrap();

    fx.swap(vec![counter_v2()]).unwrap();

    let constructor = fx.registry.get(ctor).unwrap();
    assert_eq!(constructor.slot_count(), 3);
    assert_eq!(constructor.live_count(), 2);
    assert_eq!(fx.count_v2(ids[0]), Some(10));
    assert!(fx.registry.resolve(ids[1]).is_none());
    assert_eq!(fx.count_v2(ids[2]), Some(30));

    // The emptied slot is still the next one handed out.
    let reused = fx.registry.construct(ctor).unwrap();
    assert_eq!(reused, ids[1]);
}

#[test]
fn test_removed_property_is_simply_absent() {
    let (mut fx, _, ids) = SwapFixture::with_counters(&[4]);
    fx.swap(vec![counter_v2()]).unwrap();
    fx.registry.resolve_as_mut::<CounterV2>(ids[0]).unwrap().label = "hot".to_string();

    let report = fx.swap(vec![counter_label_only()]).unwrap();

    assert!(report.is_clean());
    let counter = fx.registry.resolve_as::<CounterLabelOnly>(ids[0]).unwrap();
    assert_eq!(counter.label, "hot");
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Anchor {
    x: f64,
    y: f64,
}

#[derive(Debug, Default)]
struct Waypoint {
    name: String,
    speed: f64,
    anchor: Anchor,
    tags: Vec<String>,
}

impl Object for Waypoint {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("name", &mut self.name);
        pass.property("speed", &mut self.speed);
        pass.property("anchor", &mut self.anchor);
        pass.property("tags", &mut self.tags);
    }
}

fn waypoint() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Waypoint", "src/waypoint.rs", |_| Box::new(Waypoint::default())).shared()
}

#[test]
fn test_structured_properties_survive() {
    let mut fx = SwapFixture::new();
    let ctor = fx.registry.register(waypoint()).unwrap();
    let id = fx.registry.construct(ctor).unwrap();
    {
        let point = fx.registry.resolve_as_mut::<Waypoint>(id).unwrap();
        point.name = "dock".to_string();
        point.speed = 2.5;
        point.anchor = Anchor { x: -1.0, y: 4.25 };
        point.tags = vec!["water".to_string(), "slow".to_string()];
    }

    let report = fx.swap(vec![waypoint()]).unwrap();

    assert!(report.is_clean());
    let point = fx.registry.resolve_as::<Waypoint>(id).unwrap();
    assert_eq!(point.name, "dock");
    assert_eq!(point.speed, 2.5);
    assert_eq!(point.anchor, Anchor { x: -1.0, y: 4.25 });
    assert_eq!(point.tags, vec!["water", "slow"]);
}

#[test]
fn test_reload_init_is_not_first_time() {
    let (mut fx, _, ids) = SwapFixture::with_counters(&[1]);
    assert_eq!(fx.registry.resolve_as::<CounterV1>(ids[0]).unwrap().inits, vec![true]);

    fx.swap(vec![counter_v1()]).unwrap();

    assert_eq!(fx.registry.resolve_as::<CounterV1>(ids[0]).unwrap().inits, vec![false]);
}

#[test]
fn test_fault_in_construct_new_rolls_back() {
    let (mut fx, ctor, ids) = SwapFixture::with_counters(&[1, 2, 3]);
    let before = Arc::clone(fx.registry.get(ctor).unwrap().factory());

    let err = fx.swap(vec![counter_bad_construct(), gadget()]).unwrap_err();

    match &err {
        SwapError::Faulted { phase, fault } => {
            assert_eq!(*phase, SwapPhase::ConstructNew);
            assert_eq!(fault.kind, FaultKind::Panic);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(Arc::ptr_eq(fx.registry.get(ctor).unwrap().factory(), &before));
    let counts: Vec<_> = ids.iter().map(|&id| fx.count_v1(id).unwrap()).collect();
    assert_eq!(counts, vec![1, 2, 3]);

    // The added type was tombstoned and its name released.
    assert!(fx.registry.lookup("Gadget").is_none());
    assert_eq!(fx.registry.len(), 1);
    assert_eq!(fx.registry.id_count(), 2);
    assert!(fx.sink.contains(Severity::Error, "CONSTRUCT_NEW"));
    assert_eq!(fx.coordinator.rollbacks(), 1);
}

#[test]
fn test_fault_in_serialize_out_rolls_back() {
    let mut fx = SwapFixture::new();
    let ctor = fx.registry.register(counter_bad_save()).unwrap();
    let id = fx.registry.construct(ctor).unwrap();
    fx.registry.resolve_as_mut::<CounterBadSave>(id).unwrap().count = 7;
    let before = Arc::clone(fx.registry.get(ctor).unwrap().factory());

    let err = fx.swap(vec![counter_v2(), gadget()]).unwrap_err();

    assert_eq!(err.phase(), Some(SwapPhase::SerializeOut));
    assert!(Arc::ptr_eq(fx.registry.get(ctor).unwrap().factory(), &before));
    let old = fx.registry.resolve_as::<CounterBadSave>(id).unwrap();
    assert_eq!(old.count, 7);
    // Nothing was saved, so nothing is replayed into the old instances.
    assert_eq!(old.inits, vec![true]);
    assert!(fx.registry.lookup("Gadget").is_none());
    assert!(fx.sink.contains(Severity::Error, "SERIALIZE_OUT"));
    assert_eq!(fx.coordinator.rollbacks(), 1);
}

#[test]
fn test_fault_in_serialize_in_rolls_back() {
    let (mut fx, ctor, ids) = SwapFixture::with_counters(&[5, 6]);

    let err = fx.swap(vec![counter_bad_load()]).unwrap_err();

    assert_eq!(err.phase(), Some(SwapPhase::SerializeIn));
    assert_eq!(fx.registry.all_instances_of(ctor), ids);
    assert_eq!(fx.count_v1(ids[0]), Some(5));
    assert_eq!(fx.count_v1(ids[1]), Some(6));

    // Old instances were re-initialized after the rollback.
    let inits = &fx.registry.resolve_as::<CounterV1>(ids[0]).unwrap().inits;
    assert_eq!(inits, &vec![true, false]);
}

#[test]
fn test_fault_in_auto_construct_rolls_back() {
    let (mut fx, ctor, ids) = SwapFixture::with_counters(&[3]);
    let before = Arc::clone(fx.registry.get(ctor).unwrap().factory());

    let err = fx.swap(vec![counter_v2(), settings_bad_construct()]).unwrap_err();

    assert_eq!(err.phase(), Some(SwapPhase::AutoConstructSingletons));
    assert!(Arc::ptr_eq(fx.registry.get(ctor).unwrap().factory(), &before));
    assert_eq!(fx.count_v1(ids[0]), Some(3));
    assert_eq!(fx.count_v2(ids[0]), None);
    assert!(fx.registry.lookup("Settings").is_none());
    assert_eq!(fx.registry.len(), 1);
    assert!(fx.sink.contains(Severity::Error, "AUTO_CONSTRUCT_SINGLETONS"));
}

#[test]
fn test_fault_in_init_rolls_back() {
    let (mut fx, _, ids) = SwapFixture::with_counters(&[8]);

    let err = fx.swap(vec![counter_bad_init()]).unwrap_err();

    assert_eq!(err.phase(), Some(SwapPhase::InitAndVerify));
    assert_eq!(fx.count_v1(ids[0]), Some(8));
}

#[test]
fn test_rollback_discards_added_singleton() {
    let (mut fx, _, _) = SwapFixture::with_counters(&[1]);

    let err = fx.swap(vec![settings(), counter_bad_init()]).unwrap_err();

    assert_eq!(err.phase(), Some(SwapPhase::InitAndVerify));
    assert!(fx.registry.lookup("Settings").is_none());
    assert_eq!(fx.registry.instance_count(), 1);
}

#[test]
fn test_fault_in_delete_old_is_a_leak_not_a_rollback() {
    let mut fx = SwapFixture::new();
    let ctor = fx.registry.register(brittle()).unwrap();
    let first = fx.registry.construct(ctor).unwrap();
    fx.registry.construct(ctor).unwrap();
    fx.registry.resolve_as_mut::<Brittle>(first).unwrap().hits = 9;

    let report = fx.swap(vec![sturdy()]).unwrap();

    assert_eq!(report.leaks.len(), 1);
    assert_eq!(report.leaks[0].constructor, ctor);
    assert_eq!(report.leaks[0].instances, 2);
    assert_eq!(fx.registry.resolve_as::<Sturdy>(first).unwrap().hits, 9);
    assert!(fx.sink.contains(Severity::Error, "DELETE_OLD"));
    assert_eq!(fx.coordinator.rollbacks(), 0);
}

#[test]
fn test_auto_construct_singleton_on_add() {
    let mut fx = SwapFixture::new();

    let report = fx.swap(vec![settings()]).unwrap();

    assert_eq!(report.singletons_constructed.len(), 1);
    let id: ObjectId = report.singletons_constructed[0];
    let settings = fx.registry.resolve_as::<Settings>(id).unwrap();
    assert_eq!(settings.first_init, Some(true));

    // Present already: the next swap leaves it alone.
    let again = fx.swap(vec![common::settings()]).unwrap();
    assert!(again.singletons_constructed.is_empty());
    assert_eq!(fx.registry.all_instances_of(id.constructor), vec![id]);
    assert_eq!(fx.registry.construct(id.constructor).unwrap(), id);
}

#[test]
fn test_self_verify_on_clean_types_finds_nothing() {
    let mut fx = SwapFixture::with_config(SwapConfig { self_verify: true });
    let ctor = fx.registry.register(counter_v1()).unwrap();
    fx.registry.construct(ctor).unwrap();

    let report = fx.swap(vec![counter_v2()]).unwrap();

    assert!(report.verify_mismatches.is_empty());
    assert!(report.is_clean());
}

#[cfg(unix)]
#[test]
fn test_hardware_trap_in_constructor_rolls_back() {
    let (mut fx, _, ids) = SwapFixture::with_counters(&[42]);
    let trapping = SimpleFactory::new("Counter", COUNTER_SOURCE, |_| -> Box<dyn Object> {
        unsafe {
            libc::raise(libc::SIGSEGV);
        }
        Box::new(CounterV2::default())
    })
    .shared();

    let err = fx.swap(vec![trapping]).unwrap_err();

    match err {
        SwapError::Faulted { phase, fault } => {
            assert_eq!(phase, SwapPhase::ConstructNew);
            assert!(matches!(fault.kind, FaultKind::AccessViolation(_)));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.count_v1(ids[0]), Some(42));
}

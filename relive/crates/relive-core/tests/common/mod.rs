//! Shared fixtures for swap tests.
//!
//! Every `Counter*` type registers under the name `"Counter"`, so swapping
//! one factory for another models editing and rebuilding `counter.rs`.

#![allow(dead_code)]

use std::sync::Arc;

use relive_core::{
    ConstructorId, MemorySink, Object, ObjectFactory, ObjectId, PropertyPass, Registry,
    SimpleFactory, SingletonMode, SwapConfig, SwapCoordinator,
};

pub const COUNTER_SOURCE: &str = "src/counter.rs";

/// First version: just a count.
#[derive(Debug, Default)]
pub struct CounterV1 {
    pub count: i64,
    pub inits: Vec<bool>,
}

impl Object for CounterV1 {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("count", &mut self.count);
    }

    fn init(&mut self, first_time: bool) {
        self.inits.push(first_time);
    }
}

/// Second version: adds a label defaulting to "".
#[derive(Debug, Default)]
pub struct CounterV2 {
    pub count: i64,
    pub label: String,
}

impl Object for CounterV2 {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("count", &mut self.count);
        pass.property("label", &mut self.label);
    }
}

/// Third version: drops the count again.
#[derive(Debug, Default)]
pub struct CounterLabelOnly {
    pub label: String,
}

impl Object for CounterLabelOnly {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("label", &mut self.label);
    }
}

/// Panics while loading its state.
#[derive(Debug, Default)]
pub struct CounterBadLoad {
    pub count: i64,
}

impl Object for CounterBadLoad {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        if pass.is_loading() {
            panic!("serialize-in bug");
        }
        pass.property("count", &mut self.count);
    }
}

/// Panics while saving its state.
#[derive(Debug, Default)]
pub struct CounterBadSave {
    pub count: i64,
    pub inits: Vec<bool>,
}

impl Object for CounterBadSave {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        if !pass.is_loading() {
            panic!("serialize-out bug");
        }
        pass.property("count", &mut self.count);
    }

    fn init(&mut self, first_time: bool) {
        self.inits.push(first_time);
    }
}

/// Panics on reload initialization.
#[derive(Debug, Default)]
pub struct CounterBadInit {
    pub count: i64,
}

impl Object for CounterBadInit {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("count", &mut self.count);
    }

    fn init(&mut self, _first_time: bool) {
        panic!("init bug");
    }
}

/// Panics when dropped.
#[derive(Debug, Default)]
pub struct Brittle {
    pub hits: u32,
}

impl Object for Brittle {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("hits", &mut self.hits);
    }
}

impl Drop for Brittle {
    fn drop(&mut self) {
        panic!("destructor bug");
    }
}

#[derive(Debug, Default)]
pub struct Sturdy {
    pub hits: u32,
}

impl Object for Sturdy {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
        pass.property("hits", &mut self.hits);
    }
}

/// Auto-constructed singleton.
#[derive(Debug, Default)]
pub struct Settings {
    pub first_init: Option<bool>,
}

impl Object for Settings {
    fn serialize(&mut self, _pass: &mut PropertyPass<'_>) {}

    fn init(&mut self, first_time: bool) {
        self.first_init.get_or_insert(first_time);
    }
}

pub fn counter_v1() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| Box::new(CounterV1::default())).shared()
}

pub fn counter_v2() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| Box::new(CounterV2::default())).shared()
}

pub fn counter_label_only() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| Box::new(CounterLabelOnly::default())).shared()
}

pub fn counter_bad_construct() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| -> Box<dyn Object> {
        panic!("constructor bug")
    })
    .shared()
}

pub fn counter_bad_load() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| Box::new(CounterBadLoad::default())).shared()
}

pub fn counter_bad_save() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| Box::new(CounterBadSave::default())).shared()
}

pub fn counter_bad_init() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Counter", COUNTER_SOURCE, |_| Box::new(CounterBadInit::default())).shared()
}

pub fn brittle() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Hinge", "src/hinge.rs", |_| Box::new(Brittle::default())).shared()
}

pub fn sturdy() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Hinge", "src/hinge.rs", |_| Box::new(Sturdy::default())).shared()
}

pub fn settings() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Settings", "src/settings.rs", |_| Box::new(Settings::default()))
        .singleton(SingletonMode::AutoConstruct)
        .shared()
}

pub fn settings_bad_construct() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Settings", "src/settings.rs", |_| -> Box<dyn Object> {
        panic!("settings constructor bug")
    })
    .singleton(SingletonMode::AutoConstruct)
    .shared()
}

pub fn gadget() -> Arc<dyn ObjectFactory> {
    SimpleFactory::new("Gadget", "src/gadget.rs", |_| Box::new(Sturdy::default())).shared()
}

/// Registry, coordinator and the sink the coordinator reports to.
pub struct SwapFixture {
    pub registry: Registry,
    pub coordinator: SwapCoordinator,
    pub sink: Arc<MemorySink>,
}

impl SwapFixture {
    pub fn new() -> Self {
        Self::with_config(SwapConfig::default())
    }

    pub fn with_config(config: SwapConfig) -> Self {
        let sink = Arc::new(MemorySink::new());
        Self {
            registry: Registry::new(),
            coordinator: SwapCoordinator::new(config, sink.clone()),
            sink,
        }
    }

    /// Register Counter v1 with one instance per entry of `counts`.
    pub fn with_counters(counts: &[i64]) -> (Self, ConstructorId, Vec<ObjectId>) {
        let mut fixture = Self::new();
        let ctor = fixture
            .registry
            .register(counter_v1())
            .expect("Counter registers once");
        let ids = counts
            .iter()
            .map(|&count| {
                let id = fixture.registry.construct(ctor).expect("constructor exists");
                fixture
                    .registry
                    .resolve_as_mut::<CounterV1>(id)
                    .expect("fresh instance resolves")
                    .count = count;
                id
            })
            .collect();
        (fixture, ctor, ids)
    }

    pub fn swap(&mut self, factories: Vec<Arc<dyn ObjectFactory>>) -> relive_core::error::SwapResult<relive_core::SwapReport> {
        self.coordinator.swap(&mut self.registry, factories)
    }

    pub fn count_v1(&self, id: ObjectId) -> Option<i64> {
        self.registry.resolve_as::<CounterV1>(id).map(|c| c.count)
    }

    pub fn count_v2(&self, id: ObjectId) -> Option<i64> {
        self.registry.resolve_as::<CounterV2>(id).map(|c| c.count)
    }
}

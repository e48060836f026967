//! Swap Coordinator - Replacing Live Types
//!
//! A swap installs a batch of factories into the registry as one
//! transaction. Factories whose type name is already registered replace that
//! Constructor; the rest are added under fresh ids.
//!
//! ```text
//!  SERIALIZE_OUT ─► CONSTRUCT_NEW ─► SERIALIZE_IN ─► AUTO_CONSTRUCT_SINGLETONS
//!                                                              │
//!                         done ◄── DELETE_OLD ◄── INIT_AND_VERIFY
//! ```
//!
//! Each phase runs under its own fault guard. A fault in any phase before
//! DELETE_OLD rolls the registry back to the previous Constructor set: new
//! Constructors are discarded, old ones reinstalled, additions tombstoned,
//! and (unless SERIALIZE_OUT itself faulted) the saved state is loaded back
//! into the old instances, which are then re-initialized. A fault in
//! DELETE_OLD does not roll back; the remaining old instances are leaked and
//! reported.
//!
//! Objects dropped or touched after a fault are never dropped again outside
//! a guard: anything the fault may have left half-destroyed is leaked.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use relive_guard::GuardError;
use serde_json::Value;

use crate::config::SwapConfig;
use crate::constructor::Constructor;
use crate::error::{SwapError, SwapResult};
use crate::ids::{ConstructorId, ObjectId};
use crate::logging::{FacadeSink, LogSink};
use crate::object::{Object, ObjectFactory, SingletonMode};
use crate::property::{PassMode, PropertyBag, PropertyError, PropertyPass};
use crate::registry::Registry;

/// Phases of a swap, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapPhase {
    SerializeOut,
    ConstructNew,
    SerializeIn,
    AutoConstructSingletons,
    InitAndVerify,
    DeleteOld,
}

impl SwapPhase {
    pub const ALL: [SwapPhase; 6] = [
        SwapPhase::SerializeOut,
        SwapPhase::ConstructNew,
        SwapPhase::SerializeIn,
        SwapPhase::AutoConstructSingletons,
        SwapPhase::InitAndVerify,
        SwapPhase::DeleteOld,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SwapPhase::SerializeOut => "SERIALIZE_OUT",
            SwapPhase::ConstructNew => "CONSTRUCT_NEW",
            SwapPhase::SerializeIn => "SERIALIZE_IN",
            SwapPhase::AutoConstructSingletons => "AUTO_CONSTRUCT_SINGLETONS",
            SwapPhase::InitAndVerify => "INIT_AND_VERIFY",
            SwapPhase::DeleteOld => "DELETE_OLD",
        }
    }

    /// Whether a fault in this phase rolls the swap back.
    pub fn rolls_back(self) -> bool {
        self != SwapPhase::DeleteOld
    }
}

impl std::fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Constructor whose factory a swap replaced.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub id: ConstructorId,
    pub before: Arc<dyn ObjectFactory>,
    pub after: Arc<dyn ObjectFactory>,
}

/// A Constructor a swap registered for the first time.
#[derive(Debug, Clone)]
pub struct Addition {
    pub id: ConstructorId,
    pub factory: Arc<dyn ObjectFactory>,
}

/// The delta produced by one successful swap.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub replaced: Vec<Replacement>,
    pub added: Vec<Addition>,
}

impl Generation {
    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty() && self.added.is_empty()
    }

    /// Factories that were live before the swap, for undo.
    pub fn before_factories(&self) -> Vec<Arc<dyn ObjectFactory>> {
        self.replaced.iter().map(|r| Arc::clone(&r.before)).collect()
    }

    /// Factories the swap installed over existing types, for redo.
    pub fn after_factories(&self) -> Vec<Arc<dyn ObjectFactory>> {
        self.replaced.iter().map(|r| Arc::clone(&r.after)).collect()
    }
}

/// A property whose value changed across a save/load/save round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyMismatch {
    pub object: ObjectId,
    pub property: String,
    pub first: Option<Value>,
    pub second: Option<Value>,
}

/// Old instances abandoned by a fault in DELETE_OLD.
#[derive(Debug, Clone)]
pub struct DeleteLeak {
    pub constructor: ConstructorId,
    pub instances: usize,
    pub fault: relive_guard::FaultInfo,
}

/// Outcome of a successful swap.
#[derive(Debug, Clone, Default)]
pub struct SwapReport {
    pub generation: Generation,
    /// Old instances replaced by new ones.
    pub instances_swapped: usize,
    pub singletons_constructed: Vec<ObjectId>,
    pub timings: Vec<(SwapPhase, Duration)>,
    pub property_errors: Vec<PropertyError>,
    pub verify_mismatches: Vec<VerifyMismatch>,
    pub leaks: Vec<DeleteLeak>,
}

impl SwapReport {
    /// No property errors, verification findings or leaks.
    pub fn is_clean(&self) -> bool {
        self.property_errors.is_empty() && self.verify_mismatches.is_empty() && self.leaks.is_empty()
    }

    pub fn duration(&self, phase: SwapPhase) -> Option<Duration> {
        self.timings
            .iter()
            .find(|(recorded, _)| *recorded == phase)
            .map(|(_, duration)| *duration)
    }
}

/// Swap bookkeeping the rollback path needs.
#[derive(Default)]
struct Transaction {
    bag: PropertyBag,
    /// Old Constructors taken out of the registry, in replacement order.
    retired: Vec<Constructor>,
    added: Vec<ConstructorId>,
    auto_constructed: Vec<ObjectId>,
    instances_swapped: usize,
    property_errors: Vec<PropertyError>,
    verify_mismatches: Vec<VerifyMismatch>,
    timings: Vec<(SwapPhase, Duration)>,
}

impl Transaction {
    fn is_retired(&self, id: ConstructorId) -> bool {
        self.retired.iter().any(|old| old.id() == id)
    }
}

/// Runs swap transactions against a [`Registry`].
pub struct SwapCoordinator {
    config: SwapConfig,
    sink: Arc<dyn LogSink>,
    swaps_completed: u64,
    rollbacks: u64,
}

impl SwapCoordinator {
    pub fn new(config: SwapConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            sink,
            swaps_completed: 0,
            rollbacks: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SwapConfig::default(), Arc::new(FacadeSink))
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn set_self_verify(&mut self, enabled: bool) {
        self.config.self_verify = enabled;
    }

    pub fn swaps_completed(&self) -> u64 {
        self.swaps_completed
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks
    }

    /// Install `factories` into `registry`.
    ///
    /// # Errors
    /// - [`SwapError::NestedGuard`] when called inside a guarded call
    /// - [`SwapError::Faulted`] when a phase faulted; the registry holds the
    ///   pre-swap Constructor set again
    pub fn swap(
        &mut self,
        registry: &mut Registry,
        factories: Vec<Arc<dyn ObjectFactory>>,
    ) -> SwapResult<SwapReport> {
        if relive_guard::is_guarding() {
            self.sink
                .error(format_args!("swap rejected: already inside a guarded call"));
            return Err(SwapError::NestedGuard);
        }

        let factories = self.dedupe(factories);
        if factories.is_empty() {
            return Ok(SwapReport::default());
        }

        let mut replacing = Vec::new();
        let mut adding = Vec::new();
        for factory in factories {
            match registry.lookup(factory.type_name()) {
                Some(id) => replacing.push((id, factory)),
                None => adding.push(factory),
            }
        }

        let mut txn = Transaction::default();
        match self.run_phases(registry, &mut txn, replacing, adding) {
            Ok(()) => Ok(self.commit(registry, txn)),
            Err((phase, err)) => {
                self.rollback(registry, txn, phase, &err);
                Err(err)
            },
        }
    }

    /// Phases up to and including INIT_AND_VERIFY.
    fn run_phases(
        &self,
        registry: &mut Registry,
        txn: &mut Transaction,
        replacing: Vec<(ConstructorId, Arc<dyn ObjectFactory>)>,
        adding: Vec<Arc<dyn ObjectFactory>>,
    ) -> Result<(), (SwapPhase, SwapError)> {
        let Transaction {
            bag,
            retired,
            added,
            auto_constructed,
            instances_swapped,
            property_errors,
            verify_mismatches,
            timings,
        } = txn;

        // SERIALIZE_OUT: save every instance of every replaced type.
        guarded(SwapPhase::SerializeOut, timings, || {
            for (id, _) in &replacing {
                if let Some(old) = registry.get_mut(*id) {
                    serialize_all(old, bag, PassMode::Save, property_errors);
                }
            }
        })?;

        // CONSTRUCT_NEW: new Constructors take over the old ids and slot
        // layouts, then build one instance per occupied slot.
        for (id, factory) in replacing {
            let Some(old) = registry.get(id) else {
                continue;
            };
            let new = Constructor::replacement_for(old, factory);
            if let Some(old) = registry.replace(new) {
                retired.push(old);
            }
        }
        for factory in adding {
            added.push(registry.insert_new(factory));
        }
        guarded(SwapPhase::ConstructNew, timings, || {
            for old in retired.iter() {
                let Some(new) = registry.get_mut(old.id()) else {
                    continue;
                };
                for instance in old.instance_ids() {
                    new.fill_slot(instance.slot);
                    *instances_swapped += 1;
                }
            }
        })?;

        // SERIALIZE_IN
        guarded(SwapPhase::SerializeIn, timings, || {
            for old in retired.iter() {
                if let Some(new) = registry.get_mut(old.id()) {
                    serialize_all(new, bag, PassMode::Load, property_errors);
                }
            }
        })?;

        guarded(SwapPhase::AutoConstructSingletons, timings, || {
            for constructor in registry.iter_mut() {
                if constructor.singleton_mode() == SingletonMode::AutoConstruct
                    && constructor.live_count() == 0
                {
                    let (id, _) = constructor.construct();
                    auto_constructed.push(id);
                }
            }
        })?;

        let self_verify = self.config.self_verify;
        guarded(SwapPhase::InitAndVerify, timings, || {
            for constructor in registry.iter_mut() {
                for id in constructor.instance_ids() {
                    if let Some(object) = constructor.get_mut(id.slot) {
                        object.init(auto_constructed.contains(&id));
                    }
                }
            }

            if !self_verify {
                return;
            }
            let fresh = retired
                .iter()
                .flat_map(|old| old.instance_ids())
                .chain(auto_constructed.iter().copied());
            for id in fresh {
                if let Some(object) = registry.resolve_mut(id) {
                    verify_round_trip(object, id, verify_mismatches, property_errors);
                }
            }
        })?;

        Ok(())
    }

    /// DELETE_OLD and the report.
    fn commit(&mut self, registry: &Registry, mut txn: Transaction) -> SwapReport {
        let mut generation = Generation::default();
        for old in &txn.retired {
            if let Some(new) = registry.get(old.id()) {
                generation.replaced.push(Replacement {
                    id: old.id(),
                    before: Arc::clone(old.factory()),
                    after: Arc::clone(new.factory()),
                });
            }
        }
        for &id in &txn.added {
            if let Some(constructor) = registry.get(id) {
                generation.added.push(Addition {
                    id,
                    factory: Arc::clone(constructor.factory()),
                });
            }
        }

        let mut leaks = Vec::new();
        for mut old in mem::take(&mut txn.retired) {
            let id = old.id();
            let mut pending = old.live_count();
            let outcome = guarded(SwapPhase::DeleteOld, &mut txn.timings, || {
                while let Some(object) = old.pop_instance() {
                    drop(object);
                    pending -= 1;
                }
            });
            if let Err((_, err)) = outcome {
                let fault = match err {
                    SwapError::Faulted { fault, .. } => fault,
                    _ => relive_guard::FaultInfo::unknown(),
                };
                self.sink.error(format_args!(
                    "DELETE_OLD faulted for {} ({}): {}; leaking {} old instance(s)",
                    old.name(),
                    id,
                    fault,
                    pending
                ));
                leaks.push(DeleteLeak {
                    constructor: id,
                    instances: pending,
                    fault,
                });
                mem::forget(old);
            }
        }

        for error in &txn.property_errors {
            self.sink.warning(format_args!("{}", error));
        }
        for mismatch in &txn.verify_mismatches {
            self.sink.warning(format_args!(
                "{}: property `{}` does not survive a save/load round trip ({:?} then {:?})",
                mismatch.object, mismatch.property, mismatch.first, mismatch.second
            ));
        }

        self.swaps_completed += 1;
        self.sink.info(format_args!(
            "swap complete: {} constructor(s) replaced, {} added, {} instance(s) swapped",
            generation.replaced.len(),
            generation.added.len(),
            txn.instances_swapped
        ));

        SwapReport {
            generation,
            instances_swapped: txn.instances_swapped,
            singletons_constructed: txn.auto_constructed,
            timings: txn.timings,
            property_errors: txn.property_errors,
            verify_mismatches: txn.verify_mismatches,
            leaks,
        }
    }

    fn rollback(&mut self, registry: &mut Registry, mut txn: Transaction, phase: SwapPhase, err: &SwapError) {
        self.rollbacks += 1;
        self.sink
            .error(format_args!("{}; restoring previous constructors", err));

        // Singletons constructed into surviving Constructors.
        let mut orphans: Vec<Box<dyn Object>> = Vec::new();
        for &id in &txn.auto_constructed {
            if txn.added.contains(&id.constructor) || txn.is_retired(id.constructor) {
                continue;
            }
            if let Some(object) = registry
                .get_mut(id.constructor)
                .and_then(|constructor| constructor.take(id.slot))
            {
                orphans.push(object);
            }
        }

        let mut discarded = Vec::new();
        let restored: Vec<ConstructorId> = txn.retired.iter().map(Constructor::id).collect();
        for old in mem::take(&mut txn.retired) {
            if let Some(new) = registry.replace(old) {
                discarded.push(new);
            }
        }
        for id in mem::take(&mut txn.added) {
            if let Some(constructor) = registry.tombstone(id) {
                discarded.push(constructor);
            }
        }

        let discard = relive_guard::run(|| {
            while let Some(object) = orphans.pop() {
                drop(object);
            }
            for constructor in discarded.iter_mut() {
                while let Some(object) = constructor.pop_instance() {
                    drop(object);
                }
            }
        });
        if let Err(err) = discard {
            self.sink.warning(format_args!(
                "discarding new instances faulted ({}); leaking them",
                err
            ));
            mem::forget(orphans);
            mem::forget(discarded);
        }

        if phase == SwapPhase::SerializeOut {
            return;
        }

        let bag = &mut txn.bag;
        let mut errors = Vec::new();
        let replay = relive_guard::run(|| {
            for &id in &restored {
                if let Some(old) = registry.get_mut(id) {
                    serialize_all(old, bag, PassMode::Load, &mut errors);
                }
            }
            for constructor in registry.iter_mut() {
                for id in constructor.instance_ids() {
                    if let Some(object) = constructor.get_mut(id.slot) {
                        object.init(false);
                    }
                }
            }
        });
        match replay {
            Ok(()) => self.sink.info(format_args!(
                "rolled back to {} previous constructor(s)",
                restored.len()
            )),
            Err(err) => self.sink.error(format_args!(
                "restoring state after rollback faulted: {}",
                err
            )),
        }
    }

    /// Keep the last factory for each type name.
    fn dedupe(&self, factories: Vec<Arc<dyn ObjectFactory>>) -> Vec<Arc<dyn ObjectFactory>> {
        let mut kept: Vec<Arc<dyn ObjectFactory>> = Vec::with_capacity(factories.len());
        for factory in factories {
            if let Some(existing) = kept
                .iter_mut()
                .find(|earlier| earlier.type_name() == factory.type_name())
            {
                self.sink.warning(format_args!(
                    "constructor `{}` exported twice; using the last one",
                    factory.type_name()
                ));
                *existing = factory;
            } else {
                kept.push(factory);
            }
        }
        kept
    }
}

impl Default for SwapCoordinator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Run one phase under the guard and record how long it took.
fn guarded<R>(
    phase: SwapPhase,
    timings: &mut Vec<(SwapPhase, Duration)>,
    work: impl FnOnce() -> R,
) -> Result<R, (SwapPhase, SwapError)> {
    let started = Instant::now();
    let outcome = relive_guard::run(work);
    let elapsed = started.elapsed();
    match timings.iter_mut().find(|(recorded, _)| *recorded == phase) {
        Some((_, total)) => *total += elapsed,
        None => timings.push((phase, elapsed)),
    }

    outcome.map_err(|err| {
        let err = match err {
            GuardError::Faulted(fault) | GuardError::Skipped(fault) => SwapError::Faulted { phase, fault },
            other => SwapError::Guard(other),
        };
        (phase, err)
    })
}

fn serialize_all(
    constructor: &mut Constructor,
    bag: &mut PropertyBag,
    mode: PassMode,
    errors: &mut Vec<PropertyError>,
) {
    for id in constructor.instance_ids() {
        if let Some(object) = constructor.get_mut(id.slot) {
            serialize_one(object, id, bag, mode, errors);
        }
    }
}

fn serialize_one(
    object: &mut dyn Object,
    id: ObjectId,
    bag: &mut PropertyBag,
    mode: PassMode,
    errors: &mut Vec<PropertyError>,
) {
    let mut pass = PropertyPass::new(bag, mode, id);
    object.serialize(&mut pass);
    errors.extend(pass.finish());
}

/// Save, load the saved values back, save again, and compare.
fn verify_round_trip(
    object: &mut dyn Object,
    id: ObjectId,
    mismatches: &mut Vec<VerifyMismatch>,
    errors: &mut Vec<PropertyError>,
) {
    let mut first = PropertyBag::new();
    let mut second = PropertyBag::new();
    serialize_one(object, id, &mut first, PassMode::Save, errors);
    serialize_one(object, id, &mut first, PassMode::Load, errors);
    serialize_one(object, id, &mut second, PassMode::Save, errors);

    for (name, value) in first.properties(id) {
        let again = second.get(id, name);
        if again != Some(value) {
            mismatches.push(VerifyMismatch {
                object: id,
                property: name.to_string(),
                first: Some(value.clone()),
                second: again.cloned(),
            });
        }
    }
    for (name, value) in second.properties(id) {
        if first.get(id, name).is_none() {
            mismatches.push(VerifyMismatch {
                object: id,
                property: name.to_string(),
                first: None,
                second: Some(value.clone()),
            });
        }
    }
}

//! Constructor - Instance Storage for One Type
//!
//! A Constructor pairs a factory with the dense slot table of its live
//! instances. Slots are addressed by [`PerTypeId`]; destroying an instance
//! leaves its slot empty and pushes it on a free list, so the next
//! construction reuses it.
//!
//! ```text
//!  slots: [ Some(a) | None | Some(c) | Some(d) ]      free: [1]
//!             0:0     0:1     0:2       0:3
//! ```
//!
//! A swap keeps this layout: the replacement Constructor has the same slot
//! table length, the same free list and a new instance in each occupied slot.

use std::path::Path;
use std::sync::Arc;

use crate::ids::{ConstructorId, ObjectId, PerTypeId};
use crate::index::Idx;
use crate::object::{IncludeDecl, Object, ObjectFactory, SingletonMode};

pub struct Constructor {
    id: ConstructorId,
    factory: Arc<dyn ObjectFactory>,
    slots: Vec<Option<Box<dyn Object>>>,
    free: Vec<PerTypeId>,
}

impl Constructor {
    pub(crate) fn new(id: ConstructorId, factory: Arc<dyn ObjectFactory>) -> Self {
        Self {
            id,
            factory,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// An empty Constructor with `old`'s slot layout and a new factory.
    /// Slots are filled with [`Constructor::fill_slot`].
    pub(crate) fn replacement_for(old: &Constructor, factory: Arc<dyn ObjectFactory>) -> Self {
        let mut slots = Vec::with_capacity(old.slots.len());
        slots.resize_with(old.slots.len(), || None);
        Self {
            id: old.id,
            factory,
            slots,
            free: old.free.clone(),
        }
    }

    pub fn id(&self) -> ConstructorId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.factory.type_name()
    }

    pub fn factory(&self) -> &Arc<dyn ObjectFactory> {
        &self.factory
    }

    pub fn source_file(&self) -> &Path {
        self.factory.source_file()
    }

    pub fn includes(&self) -> &[IncludeDecl] {
        self.factory.includes()
    }

    pub fn link_libraries(&self) -> &[String] {
        self.factory.link_libraries()
    }

    pub fn singleton_mode(&self) -> SingletonMode {
        self.factory.singleton_mode()
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton_mode().is_singleton()
    }

    /// Length of the slot table, occupied or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Ids of occupied slots, in slot order.
    pub fn instance_ids(&self) -> Vec<ObjectId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(idx, _)| ObjectId::new(self.id, PerTypeId::from_usize(idx)))
            .collect()
    }

    /// Every slot in order; destroyed slots are `None`.
    pub fn slots(&self) -> impl Iterator<Item = Option<&(dyn Object + 'static)>> {
        self.slots.iter().map(|slot| slot.as_deref())
    }

    pub fn get(&self, slot: PerTypeId) -> Option<&(dyn Object + 'static)> {
        self.slots.get(slot.index()).and_then(|slot| slot.as_deref())
    }

    pub fn get_mut(&mut self, slot: PerTypeId) -> Option<&mut (dyn Object + 'static)> {
        match self.slots.get_mut(slot.index()) {
            Some(Some(object)) => Some(object.as_mut()),
            _ => None,
        }
    }

    /// Construct an instance in a recycled or new slot.
    ///
    /// A singleton Constructor that already holds an instance returns that
    /// instance's id and constructs nothing. The second value reports
    /// whether a new instance was created.
    pub(crate) fn construct(&mut self) -> (ObjectId, bool) {
        if self.is_singleton() {
            if let Some(existing) = self.instance_ids().first() {
                return (*existing, false);
            }
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                PerTypeId::from_usize(self.slots.len() - 1)
            },
        };
        let id = ObjectId::new(self.id, slot);
        let object = self.factory.construct(id);
        self.slots[slot.index()] = Some(object);
        (id, true)
    }

    /// Construct the replacement for an instance that lived in `slot`.
    pub(crate) fn fill_slot(&mut self, slot: PerTypeId) {
        let id = ObjectId::new(self.id, slot);
        let object = self.factory.construct(id);
        if let Some(entry) = self.slots.get_mut(slot.index()) {
            *entry = Some(object);
        }
    }

    /// Remove the instance in `slot` and recycle the slot.
    pub(crate) fn take(&mut self, slot: PerTypeId) -> Option<Box<dyn Object>> {
        let object = self.slots.get_mut(slot.index())?.take()?;
        self.free.push(slot);
        Some(object)
    }

    /// Remove the highest occupied instance without recycling its slot.
    /// Used when tearing a Constructor down one instance at a time.
    pub(crate) fn pop_instance(&mut self) -> Option<Box<dyn Object>> {
        self.slots.iter_mut().rev().find_map(Option::take)
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("slots", &self.slots.len())
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::SimpleFactory;
    use crate::property::PropertyPass;

    struct Probe;

    impl Object for Probe {
        fn serialize(&mut self, _pass: &mut PropertyPass<'_>) {}
    }

    fn probe_factory(mode: SingletonMode) -> Arc<dyn ObjectFactory> {
        SimpleFactory::new("Probe", "src/probe.rs", |_| Box::new(Probe))
            .singleton(mode)
            .shared()
    }

    #[test]
    fn test_destroyed_slot_is_recycled() {
        let mut ctor = Constructor::new(ConstructorId(0), probe_factory(SingletonMode::None));
        let (a, _) = ctor.construct();
        let (b, _) = ctor.construct();
        assert!(ctor.take(a.slot).is_some());
        assert_eq!(ctor.live_count(), 1);

        let (c, created) = ctor.construct();
        assert!(created);
        assert_eq!(c.slot, a.slot);
        assert_eq!(ctor.instance_ids(), vec![c, b]);
        assert_eq!(ctor.slot_count(), 2);
    }

    #[test]
    fn test_singleton_returns_existing() {
        let mut ctor = Constructor::new(ConstructorId(4), probe_factory(SingletonMode::Singleton));
        let (first, created) = ctor.construct();
        let (second, again) = ctor.construct();
        assert!(created);
        assert!(!again);
        assert_eq!(first, second);
        assert_eq!(ctor.live_count(), 1);
    }

    #[test]
    fn test_replacement_preserves_layout() {
        let mut old = Constructor::new(ConstructorId(1), probe_factory(SingletonMode::None));
        let (a, _) = old.construct();
        old.construct();
        old.construct();
        old.take(a.slot);

        let mut new = Constructor::replacement_for(&old, probe_factory(SingletonMode::None));
        assert_eq!(new.slot_count(), 3);
        assert_eq!(new.live_count(), 0);
        for id in old.instance_ids() {
            new.fill_slot(id.slot);
        }
        assert_eq!(new.instance_ids(), old.instance_ids());

        // The free list carried over, so slot 0 is reused first.
        let (next, _) = new.construct();
        assert_eq!(next.slot, a.slot);
    }

    #[test]
    fn test_pop_instance_drains_from_the_end() {
        let mut ctor = Constructor::new(ConstructorId(0), probe_factory(SingletonMode::None));
        ctor.construct();
        ctor.construct();
        assert!(ctor.pop_instance().is_some());
        assert!(ctor.pop_instance().is_some());
        assert!(ctor.pop_instance().is_none());
        assert_eq!(ctor.slot_count(), 2);
    }
}

//! Constructor Registry
//!
//! Maps type names and [`ConstructorId`]s to Constructors and resolves
//! [`ObjectId`]s to live instances.
//!
//! Ids are assigned in registration order and never reused. An id whose
//! Constructor was removed (an addition rolled back by a failed swap) stays
//! as an empty tombstone, so ids recorded in history keep pointing at the
//! same type or at nothing.
//!
//! Resolution is the only way to reach an instance from an id, and it is
//! expected to fail sometimes: the instance may have been destroyed. Hold the
//! id, resolve at the point of use, and do not keep the reference across a
//! point where a swap can run.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::constructor::Constructor;
use crate::error::{RegistryError, RegistryResult};
use crate::ids::{ConstructorId, ObjectId};
use crate::index::IndexVec;
use crate::object::{Object, ObjectFactory};

#[derive(Default)]
pub struct Registry {
    constructors: IndexVec<ConstructorId, Option<Constructor>>,
    by_name: FxHashMap<String, ConstructorId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a brand-new type.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyRegistered`] when the name is taken; a new
    /// implementation of an existing type is installed by a swap instead.
    pub fn register(&mut self, factory: Arc<dyn ObjectFactory>) -> RegistryResult<ConstructorId> {
        if let Some(&id) = self.by_name.get(factory.type_name()) {
            return Err(RegistryError::AlreadyRegistered {
                name: factory.type_name().to_string(),
                id,
            });
        }
        Ok(self.insert_new(factory))
    }

    pub fn lookup(&self, name: &str) -> Option<ConstructorId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: ConstructorId) -> Option<&Constructor> {
        self.constructors.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ConstructorId) -> Option<&mut Constructor> {
        self.constructors.get_mut(id).and_then(Option::as_mut)
    }

    /// Live instances of `id`; empty for unknown ids.
    pub fn all_instances_of(&self, id: ConstructorId) -> Vec<ObjectId> {
        self.get(id).map(Constructor::instance_ids).unwrap_or_default()
    }

    pub fn resolve(&self, id: ObjectId) -> Option<&(dyn Object + 'static)> {
        self.get(id.constructor)?.get(id.slot)
    }

    pub fn resolve_mut(&mut self, id: ObjectId) -> Option<&mut (dyn Object + 'static)> {
        self.get_mut(id.constructor)?.get_mut(id.slot)
    }

    /// Resolve and downcast to a concrete type.
    pub fn resolve_as<T: Object>(&self, id: ObjectId) -> Option<&T> {
        let object: &(dyn Any + 'static) = self.resolve(id)?;
        object.downcast_ref::<T>()
    }

    pub fn resolve_as_mut<T: Object>(&mut self, id: ObjectId) -> Option<&mut T> {
        let object: &mut (dyn Any + 'static) = self.resolve_mut(id)?;
        object.downcast_mut::<T>()
    }

    /// Construct a new instance of `id` and send it its first `init`.
    ///
    /// For a singleton that already has an instance, the existing id is
    /// returned and nothing is constructed or initialized.
    pub fn construct(&mut self, id: ConstructorId) -> RegistryResult<ObjectId> {
        let constructor = self
            .get_mut(id)
            .ok_or(RegistryError::UnknownConstructor(id))?;
        let (object_id, created) = constructor.construct();
        if created {
            if let Some(object) = constructor.get_mut(object_id.slot) {
                object.init(true);
            }
        }
        Ok(object_id)
    }

    pub fn construct_by_name(&mut self, name: &str) -> RegistryResult<ObjectId> {
        let id = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;
        self.construct(id)
    }

    /// Destroy an instance and recycle its slot.
    pub fn destroy(&mut self, id: ObjectId) -> RegistryResult<()> {
        let object = self
            .get_mut(id.constructor)
            .and_then(|constructor| constructor.take(id.slot))
            .ok_or(RegistryError::UnknownObject(id))?;
        drop(object);
        Ok(())
    }

    /// Number of ids assigned so far, tombstones included.
    pub fn id_count(&self) -> usize {
        self.constructors.len()
    }

    /// Number of registered (non-tombstone) Constructors.
    pub fn len(&self) -> usize {
        self.constructors.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constructor> {
        self.constructors.iter().filter_map(Option::as_ref)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Constructor> {
        self.constructors
            .iter_enumerated_mut()
            .filter_map(|(_, slot)| slot.as_mut())
    }

    /// Ids of registered Constructors, in id order.
    pub fn ids(&self) -> Vec<ConstructorId> {
        self.iter().map(Constructor::id).collect()
    }

    /// Total live instances across all Constructors.
    pub fn instance_count(&self) -> usize {
        self.iter().map(Constructor::live_count).sum()
    }

    pub(crate) fn insert_new(&mut self, factory: Arc<dyn ObjectFactory>) -> ConstructorId {
        let id = self.constructors.next_index();
        self.by_name.insert(factory.type_name().to_string(), id);
        self.constructors.push(Some(Constructor::new(id, factory)));
        log::debug!("registered constructor {} as {}", self.name_of(id), id);
        id
    }

    /// Swap the Constructor stored at `constructor.id()`, returning the
    /// previous occupant.
    pub(crate) fn replace(&mut self, constructor: Constructor) -> Option<Constructor> {
        let id = constructor.id();
        let slot = self.constructors.get_mut(id)?;
        self.by_name.insert(constructor.name().to_string(), id);
        slot.replace(constructor)
    }

    /// Remove the Constructor at `id`, leaving a tombstone.
    pub(crate) fn tombstone(&mut self, id: ConstructorId) -> Option<Constructor> {
        let constructor = self.constructors.get_mut(id)?.take()?;
        if self.by_name.get(constructor.name()) == Some(&id) {
            self.by_name.remove(constructor.name());
        }
        Some(constructor)
    }

    fn name_of(&self, id: ConstructorId) -> &str {
        self.get(id).map(Constructor::name).unwrap_or("<tombstone>")
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

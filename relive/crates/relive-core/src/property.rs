//! PropertyBag - State Transfer Across a Swap
//!
//! The bag is the only channel through which an instance's state crosses a
//! swap. Old instances write their properties into it by name, replacement
//! instances read them back by name, and the bag is dropped when the swap
//! ends.
//!
//! ```text
//!   old Counter 0:1 ──save──►  (0:1, "count") = 2  ──load──►  new Counter 0:1
//!                              (0:1, "speed") = 1.5 ──load──► (no such field:
//!                                                              ignored)
//! ```
//!
//! Values are stored as `serde_json::Value`, so any `Serialize` +
//! `DeserializeOwned` field can be a property, including nested structs.
//! A property missing from the bag leaves the field at its constructed
//! default. A stored value that no longer decodes into the field's type is
//! treated the same way and reported as a [`PropertyError`].

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::ids::ObjectId;

/// Direction of a serialization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    Save,
    Load,
}

/// Property values keyed by owner and property name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropertyBag {
    values: FxHashMap<ObjectId, IndexMap<String, Value>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, owner: ObjectId, name: &str, value: Value) {
        self.values
            .entry(owner)
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn get(&self, owner: ObjectId, name: &str) -> Option<&Value> {
        self.values.get(&owner).and_then(|props| props.get(name))
    }

    /// Properties of `owner` in the order they were saved.
    pub fn properties(&self, owner: ObjectId) -> impl Iterator<Item = (&str, &Value)> {
        self.values
            .get(&owner)
            .into_iter()
            .flat_map(|props| props.iter().map(|(name, value)| (name.as_str(), value)))
    }

    pub fn contains_owner(&self, owner: ObjectId) -> bool {
        self.values.contains_key(&owner)
    }

    pub fn remove_owner(&mut self, owner: ObjectId) -> Option<IndexMap<String, Value>> {
        self.values.remove(&owner)
    }

    /// Total number of stored properties.
    pub fn len(&self) -> usize {
        self.values.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// A property that could not be transferred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("{owner}: property `{name}` could not be saved: {reason}")]
    Encode {
        owner: ObjectId,
        name: String,
        reason: String,
    },

    #[error("{owner}: property `{name}` kept its default, stored value does not fit: {reason}")]
    Decode {
        owner: ObjectId,
        name: String,
        reason: String,
    },
}

impl PropertyError {
    pub fn owner(&self) -> ObjectId {
        match self {
            PropertyError::Encode { owner, .. } | PropertyError::Decode { owner, .. } => *owner,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PropertyError::Encode { name, .. } | PropertyError::Decode { name, .. } => name,
        }
    }
}

/// One instance's view of the bag during a save or load pass.
///
/// Handed to [`Object::serialize`](crate::Object::serialize); the same
/// method serves both directions.
pub struct PropertyPass<'a> {
    bag: &'a mut PropertyBag,
    mode: PassMode,
    owner: ObjectId,
    errors: Vec<PropertyError>,
}

impl<'a> PropertyPass<'a> {
    pub fn new(bag: &'a mut PropertyBag, mode: PassMode, owner: ObjectId) -> Self {
        Self {
            bag,
            mode,
            owner,
            errors: Vec::new(),
        }
    }

    pub fn mode(&self) -> PassMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.mode == PassMode::Load
    }

    pub fn is_saving(&self) -> bool {
        self.mode == PassMode::Save
    }

    /// Identity of the instance being serialized.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Save `value` under `name`, or overwrite it from the bag when loading.
    pub fn property<T>(&mut self, name: &str, value: &mut T)
    where
        T: Serialize + DeserializeOwned,
    {
        match self.mode {
            PassMode::Save => match serde_json::to_value(&*value) {
                Ok(encoded) => self.bag.set(self.owner, name, encoded),
                Err(err) => self.errors.push(PropertyError::Encode {
                    owner: self.owner,
                    name: name.to_string(),
                    reason: err.to_string(),
                }),
            },
            PassMode::Load => {
                let Some(stored) = self.bag.get(self.owner, name) else {
                    return;
                };
                match T::deserialize(stored) {
                    Ok(decoded) => *value = decoded,
                    Err(err) => self.errors.push(PropertyError::Decode {
                        owner: self.owner,
                        name: name.to_string(),
                        reason: err.to_string(),
                    }),
                }
            },
        }
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[PropertyError] {
        &self.errors
    }

    pub fn finish(self) -> Vec<PropertyError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ConstructorId, PerTypeId};
    use serde::Deserialize;

    fn owner(slot: u32) -> ObjectId {
        ObjectId::new(ConstructorId(0), PerTypeId(slot))
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Tint {
        r: u8,
        g: u8,
        b: u8,
    }

    #[test]
    fn test_save_then_load_restores_values() {
        let mut bag = PropertyBag::new();
        let mut count = 7i64;
        let mut ratio = 0.25f64;
        let mut name = "probe".to_string();
        let mut tint = Tint { r: 1, g: 2, b: 3 };

        let mut save = PropertyPass::new(&mut bag, PassMode::Save, owner(0));
        save.property("count", &mut count);
        save.property("ratio", &mut ratio);
        save.property("name", &mut name);
        save.property("tint", &mut tint);
        assert!(save.finish().is_empty());
        assert_eq!(bag.len(), 4);

        let (mut count2, mut ratio2, mut name2, mut tint2) = (0i64, 0.0f64, String::new(), Tint::default());
        let mut load = PropertyPass::new(&mut bag, PassMode::Load, owner(0));
        load.property("count", &mut count2);
        load.property("ratio", &mut ratio2);
        load.property("name", &mut name2);
        load.property("tint", &mut tint2);
        assert!(load.finish().is_empty());

        assert_eq!((count2, ratio2, name2, tint2), (count, ratio, name, tint));
    }

    #[test]
    fn test_missing_property_keeps_default() {
        let mut bag = PropertyBag::new();
        let mut label = "default".to_string();
        let mut load = PropertyPass::new(&mut bag, PassMode::Load, owner(1));
        load.property("label", &mut label);
        assert!(load.finish().is_empty());
        assert_eq!(label, "default");
    }

    #[test]
    fn test_type_mismatch_is_reported_and_ignored() {
        let mut bag = PropertyBag::new();
        bag.set(owner(2), "count", Value::String("many".to_string()));

        let mut count = 5u32;
        let mut load = PropertyPass::new(&mut bag, PassMode::Load, owner(2));
        load.property("count", &mut count);
        let errors = load.finish();

        assert_eq!(count, 5);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PropertyError::Decode { .. }));
        assert_eq!(errors[0].name(), "count");
        assert_eq!(errors[0].owner(), owner(2));
    }

    #[test]
    fn test_properties_keep_save_order_per_owner() {
        let mut bag = PropertyBag::new();
        bag.set(owner(0), "b", Value::from(1));
        bag.set(owner(0), "a", Value::from(2));
        bag.set(owner(1), "c", Value::from(3));

        let names: Vec<_> = bag.properties(owner(0)).map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(bag.contains_owner(owner(1)));
        assert_eq!(bag.properties(owner(9)).count(), 0);
    }
}

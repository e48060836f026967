//! Stable object identity.
//!
//! An [`ObjectId`] names one live instance as (constructor, slot). It is the
//! only form in which one object may hold on to another: the pair stays the
//! same when the instance behind it is replaced by a swap, while the memory
//! address does not.

use std::fmt;

use crate::index::define_idx;

define_idx!(
    /// Index of a Constructor in the registry. Assigned monotonically and
    /// never reused.
    ConstructorId
);

define_idx!(
    /// Index of an instance slot inside one Constructor.
    PerTypeId
);

/// Identity of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub constructor: ConstructorId,
    pub slot: PerTypeId,
}

impl ObjectId {
    pub fn new(constructor: ConstructorId, slot: PerTypeId) -> Self {
        Self { constructor, slot }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.constructor.0, self.slot.0)
    }
}

impl fmt::Display for ConstructorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Ids are passed by value everywhere.
static_assertions::assert_eq_size!(ObjectId, u64);
static_assertions::assert_impl_all!(ObjectId: Copy, Send, Sync);

//! Typed index vectors.
//!
//! Constructor ids and per-type slot ids index different tables; keeping
//! them as distinct types stops one from being used to index the other.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A type usable as an [`IndexVec`] index.
pub trait Idx: Copy + Eq {
    fn from_usize(idx: usize) -> Self;

    fn index(self) -> usize;
}

/// A `Vec<T>` indexed by `I` instead of `usize`.
#[derive(Clone)]
pub struct IndexVec<I, T> {
    raw: Vec<T>,
    _marker: PhantomData<fn(&I)>,
}

impl<I, T> IndexVec<I, T> {
    #[inline]
    pub fn new() -> Self {
        Self {
            raw: Vec::new(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.raw.iter()
    }
}

impl<I: Idx, T> IndexVec<I, T> {
    /// Append `value`, returning its index.
    #[inline]
    pub fn push(&mut self, value: T) -> I {
        let idx = I::from_usize(self.raw.len());
        self.raw.push(value);
        idx
    }

    /// Index the next `push` will return.
    #[inline]
    pub fn next_index(&self) -> I {
        I::from_usize(self.raw.len())
    }

    #[inline]
    pub fn get(&self, index: I) -> Option<&T> {
        self.raw.get(index.index())
    }

    #[inline]
    pub fn get_mut(&mut self, index: I) -> Option<&mut T> {
        self.raw.get_mut(index.index())
    }

    pub fn iter_enumerated(&self) -> impl Iterator<Item = (I, &T)> {
        self.raw
            .iter()
            .enumerate()
            .map(|(idx, value)| (I::from_usize(idx), value))
    }

    pub fn iter_enumerated_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.raw
            .iter_mut()
            .enumerate()
            .map(|(idx, value)| (I::from_usize(idx), value))
    }

    pub fn indices(&self) -> impl Iterator<Item = I> {
        (0..self.raw.len()).map(I::from_usize)
    }
}

impl<I: Idx, T> Index<I> for IndexVec<I, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: I) -> &T {
        &self.raw[index.index()]
    }
}

impl<I: Idx, T> IndexMut<I> for IndexVec<I, T> {
    #[inline]
    fn index_mut(&mut self, index: I) -> &mut T {
        &mut self.raw[index.index()]
    }
}

impl<I, T> Default for IndexVec<I, T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Define a `u32` newtype implementing [`Idx`].
macro_rules! define_idx {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $crate::index::Idx for $name {
            fn from_usize(idx: usize) -> Self {
                assert!(idx <= u32::MAX as usize, "index {} exceeds u32::MAX", idx);
                $name(idx as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

pub(crate) use define_idx;

#[cfg(test)]
mod tests {
    use super::*;

    define_idx!(TestId);

    #[test]
    fn test_push_returns_sequential_ids() {
        let mut vec: IndexVec<TestId, &str> = IndexVec::new();
        assert_eq!(vec.next_index(), TestId(0));
        let a = vec.push("a");
        let b = vec.push("b");
        assert_eq!((a, b), (TestId(0), TestId(1)));
        assert_eq!(vec[b], "b");
        assert_eq!(vec.get(TestId(2)), None);
    }

    #[test]
    fn test_iter_enumerated() {
        let mut vec: IndexVec<TestId, u8> = IndexVec::new();
        vec.push(10);
        vec.push(20);
        let pairs: Vec<_> = vec.iter_enumerated().map(|(id, v)| (id.0, *v)).collect();
        assert_eq!(pairs, vec![(0, 10), (1, 20)]);
        assert_eq!(vec.indices().count(), 2);
    }
}

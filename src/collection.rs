//! Backing collections: the containers that hold the values of a single key.
//!
//! A [`ValueMultimap`](crate::ValueMultimap) never stores values itself. Each key owns one backing
//! collection, produced on demand by the map's factory, and the collection type decides the
//! per-key semantics: a [`Vec`] keeps insertion order and duplicates, a [`HashSet`] or
//! [`BTreeSet`] silently drops duplicates, and so on.
//!
//! [`ReadOnly`] wraps any backing collection and rejects all mutation. Maps refuse to be
//! configured with a factory that produces one.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};

use crate::error::{Error, Result};


/// A mutable collection that can hold the values of one key.
pub trait BackingCollection<V> {
    /// Adds a value. Returns whether the collection changed.
    fn insert(&mut self, value: V) -> Result<bool>;

    /// Removes one occurrence of a value. Returns whether a value was removed.
    fn remove(&mut self, value: &V) -> Result<bool>;

    fn contains(&self, value: &V) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_>;

    /// Whether [`insert`](Self::insert) and [`remove`](Self::remove) are rejected.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Clones every value into `destination`, starting at `offset`.
    ///
    /// Fails with [`Error::OutOfRange`] without touching `destination` if it is too short.
    fn copy_to(&self, destination: &mut [V], offset: usize) -> Result<()>
            where V: Clone {
        let required = self.len();
        let fits = offset.checked_add(required)
            .map(|end| end <= destination.len())
            .unwrap_or(false);
        if !fits {
            return Err(Error::OutOfRange {
                offset,
                required,
                available: destination.len(),
            });
        }
        for (slot, value) in destination[offset..].iter_mut().zip(self.iter()) {
            *slot = value.clone();
        }
        Ok(())
    }
}


impl<V: PartialEq> BackingCollection<V> for Vec<V> {
    fn insert(&mut self, value: V) -> Result<bool> {
        Vec::push(self, value);
        Ok(true)
    }

    fn remove(&mut self, value: &V) -> Result<bool> {
        match self.as_slice().iter().position(|v| v == value) {
            Some(index) => {
                Vec::remove(self, index);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    fn contains(&self, value: &V) -> bool {
        self.as_slice().contains(value)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        Box::new(self.as_slice().iter())
    }
}

impl<V: PartialEq> BackingCollection<V> for VecDeque<V> {
    fn insert(&mut self, value: V) -> Result<bool> {
        VecDeque::push_back(self, value);
        Ok(true)
    }

    fn remove(&mut self, value: &V) -> Result<bool> {
        let position = VecDeque::iter(self).position(|v| v == value);
        match position {
            Some(index) => Ok(VecDeque::remove(self, index).is_some()),
            None => Ok(false),
        }
    }

    fn contains(&self, value: &V) -> bool {
        VecDeque::contains(self, value)
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        Box::new(VecDeque::iter(self))
    }
}

impl<V: Eq + Hash, S: BuildHasher> BackingCollection<V> for HashSet<V, S> {
    fn insert(&mut self, value: V) -> Result<bool> {
        Ok(HashSet::insert(self, value))
    }

    fn remove(&mut self, value: &V) -> Result<bool> {
        Ok(HashSet::remove(self, value))
    }

    fn contains(&self, value: &V) -> bool {
        HashSet::contains(self, value)
    }

    fn len(&self) -> usize {
        HashSet::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        Box::new(HashSet::iter(self))
    }
}

impl<V: Ord> BackingCollection<V> for BTreeSet<V> {
    fn insert(&mut self, value: V) -> Result<bool> {
        Ok(BTreeSet::insert(self, value))
    }

    fn remove(&mut self, value: &V) -> Result<bool> {
        Ok(BTreeSet::remove(self, value))
    }

    fn contains(&self, value: &V) -> bool {
        BTreeSet::contains(self, value)
    }

    fn len(&self) -> usize {
        BTreeSet::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        Box::new(BTreeSet::iter(self))
    }
}


/// A backing collection that refuses every mutation.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ReadOnly<C> {
    inner: C,
}
impl<C> ReadOnly<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}
impl<V, C: BackingCollection<V>> BackingCollection<V> for ReadOnly<C> {
    fn insert(&mut self, _value: V) -> Result<bool> {
        Err(Error::UnsupportedOperation("insert into a read-only collection"))
    }

    fn remove(&mut self, _value: &V) -> Result<bool> {
        Err(Error::UnsupportedOperation("remove from a read-only collection"))
    }

    fn contains(&self, value: &V) -> bool {
        self.inner.contains(value)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        self.inner.iter()
    }

    fn is_read_only(&self) -> bool {
        true
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_keeps_duplicates_and_order() {
        let mut values: Vec<i32> = Vec::new();
        assert!(BackingCollection::insert(&mut values, 3).unwrap());
        assert!(BackingCollection::insert(&mut values, 1).unwrap());
        assert!(BackingCollection::insert(&mut values, 3).unwrap());
        assert_eq!(BackingCollection::len(&values), 3);

        assert!(BackingCollection::remove(&mut values, &3).unwrap());
        assert_eq!(values, vec![1, 3]);
        assert!(!BackingCollection::remove(&mut values, &7).unwrap());
    }

    #[test]
    fn test_sets_deduplicate() {
        let mut hashed: HashSet<&str> = HashSet::new();
        assert!(BackingCollection::insert(&mut hashed, "a").unwrap());
        assert!(!BackingCollection::insert(&mut hashed, "a").unwrap());
        assert_eq!(BackingCollection::len(&hashed), 1);

        let mut ordered: BTreeSet<u8> = BTreeSet::new();
        for v in [5, 2, 5, 9] {
            BackingCollection::insert(&mut ordered, v).unwrap();
        }
        let collected: Vec<u8> = BackingCollection::iter(&ordered).copied().collect();
        assert_eq!(collected, vec![2, 5, 9]);
    }

    #[test]
    fn test_deque_remove_first_match() {
        let mut values: VecDeque<char> = VecDeque::new();
        for c in ['x', 'y', 'x'] {
            BackingCollection::insert(&mut values, c).unwrap();
        }
        assert!(BackingCollection::remove(&mut values, &'x').unwrap());
        assert_eq!(values, VecDeque::from(vec!['y', 'x']));
        assert!(BackingCollection::contains(&values, &'x'));
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let mut frozen = ReadOnly::new(vec![1, 2]);
        assert!(frozen.is_read_only());
        assert_eq!(
            frozen.insert(3),
            Err(Error::UnsupportedOperation("insert into a read-only collection")),
        );
        assert!(matches!(frozen.remove(&1), Err(Error::UnsupportedOperation(_))));
        assert_eq!(frozen.len(), 2);
        assert!(frozen.contains(&2));
        assert_eq!(frozen.into_inner(), vec![1, 2]);
    }

    #[test]
    fn test_copy_to_bounds() {
        let values = vec![10, 20, 30];
        let mut destination = [0; 5];
        values.copy_to(&mut destination, 2).unwrap();
        assert_eq!(destination, [0, 0, 10, 20, 30]);

        let mut short = [7; 4];
        let err = values.copy_to(&mut short, 2).unwrap_err();
        assert_eq!(err, Error::OutOfRange { offset: 2, required: 3, available: 4 });
        assert_eq!(short, [7; 4]);

        let mut empty: [i32; 0] = [];
        assert!(values.copy_to(&mut empty, usize::MAX).is_err());
    }
}

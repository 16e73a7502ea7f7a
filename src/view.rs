use std::fmt;
use std::marker::PhantomData;

use crate::collection::BackingCollection;
use crate::error::{Error, Result};


/// The values stored under one key of a [`ValueMultimap`](crate::ValueMultimap).
///
/// A `ValueCollection` is owned by its map and handed out by reference, so it always shows the
/// current values of its key. It behaves as a read-only collection: the
/// [`BackingCollection`] mutators fail with [`Error::UnsupportedOperation`]. Values only enter
/// and leave through the map, which keeps the map's version counter authoritative.
pub struct ValueCollection<K, V, C> {
    key: K,
    values: C,
    _value: PhantomData<fn() -> V>,
}
impl<K, V, C> ValueCollection<K, V, C> {
    pub(crate) fn new(key: K, values: C) -> Self {
        Self {
            key,
            values,
            _value: PhantomData,
        }
    }

    /// The key these values belong to.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Read access to the backing collection, e.g. to use a [`Vec`] as a slice.
    pub fn backing(&self) -> &C {
        &self.values
    }
}
impl<K, V, C: BackingCollection<V>> ValueCollection<K, V, C> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.values.contains(value)
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        self.values.iter()
    }

    pub fn copy_to(&self, destination: &mut [V], offset: usize) -> Result<()>
            where V: Clone {
        self.values.copy_to(destination, offset)
    }

    pub(crate) fn insert_internal(&mut self, value: V) -> Result<bool> {
        self.values.insert(value)
    }

    pub(crate) fn remove_internal(&mut self, value: &V) -> Result<bool> {
        self.values.remove(value)
    }

    pub(crate) fn is_backing_read_only(&self) -> bool {
        self.values.is_read_only()
    }
}
impl<K, V, C: BackingCollection<V>> BackingCollection<V> for ValueCollection<K, V, C> {
    fn insert(&mut self, _value: V) -> Result<bool> {
        Err(Error::UnsupportedOperation("values must be added through the map"))
    }

    fn remove(&mut self, _value: &V) -> Result<bool> {
        Err(Error::UnsupportedOperation("values must be removed through the map"))
    }

    fn contains(&self, value: &V) -> bool {
        self.values.contains(value)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        self.values.iter()
    }

    fn is_read_only(&self) -> bool {
        true
    }
}
impl<K: Clone, V, C: Clone> Clone for ValueCollection<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            values: self.values.clone(),
            _value: PhantomData,
        }
    }
}
impl<K: fmt::Debug, V: fmt::Debug, C: BackingCollection<V>> fmt::Debug for ValueCollection<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCollection")
            .field("key", &self.key)
            .field("values", &DebugValues::<V, C>(&self.values, PhantomData))
            .finish()
    }
}
impl<'a, K, V, C: BackingCollection<V>> IntoIterator for &'a ValueCollection<K, V, C> {
    type Item = &'a V;
    type IntoIter = Box<dyn Iterator<Item = &'a V> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}


struct DebugValues<'a, V, C>(&'a C, PhantomData<fn() -> V>);
impl<'a, V: fmt::Debug, C: BackingCollection<V>> fmt::Debug for DebugValues<'a, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter())
            .finish()
    }
}

use std::fmt;
use std::iter;
use std::marker::PhantomData;

use crate::collection::BackingCollection;
use crate::cursor::{Cursor, Groupings, Groups, Iter};
use crate::equality::KeyEquality;
use crate::value_multimap::ValueMultimap;
use crate::view::ValueCollection;


/// A read-only grouping view of a [`ValueMultimap`]: key to sequence of values.
///
/// Unlike [`ValueMultimap::get`], asking a `Lookup` for an absent key yields an empty sequence.
pub struct Lookup<'m, K, V, C, E, F> {
    map: &'m ValueMultimap<K, V, C, E, F>,
}
impl<'m, K, V, C, E, F> Lookup<'m, K, V, C, E, F> {
    pub(crate) fn new(map: &'m ValueMultimap<K, V, C, E, F>) -> Self {
        Self {
            map,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Groupings<'m, K, V, C> {
        Iter::new(self.map)
    }

    /// A detached cursor over the groupings; advance it with the underlying map.
    pub fn cursor(&self) -> Cursor<Groups> {
        Cursor::new(self.map.id(), self.map.version())
    }
}
impl<'m, K, V, C, E, F> Lookup<'m, K, V, C, E, F>
        where C: BackingCollection<V>, E: KeyEquality<K>, F: Fn() -> C {
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// The values of `key`, empty if the key is absent.
    pub fn get(&self, key: &K) -> Box<dyn Iterator<Item = &'m V> + 'm> {
        match self.map.try_get(key) {
            Some(values) => values.iter(),
            None => Box::new(iter::empty()),
        }
    }
}
impl<'m, K, V, C, E, F> Clone for Lookup<'m, K, V, C, E, F> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'m, K, V, C, E, F> Copy for Lookup<'m, K, V, C, E, F> {}
impl<'m, K, V, C, E, F> IntoIterator for Lookup<'m, K, V, C, E, F> {
    type Item = Grouping<'m, K, V, C>;
    type IntoIter = Groupings<'m, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
impl<'a, 'm, K, V, C, E, F> IntoIterator for &'a Lookup<'m, K, V, C, E, F> {
    type Item = Grouping<'m, K, V, C>;
    type IntoIter = Groupings<'m, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


/// A key together with its values, as produced by a [`Lookup`].
pub struct Grouping<'m, K, V, C> {
    key: &'m K,
    values: &'m C,
    _value: PhantomData<fn() -> V>,
}
impl<'m, K, V, C> Grouping<'m, K, V, C> {
    pub(crate) fn new(entry: &'m ValueCollection<K, V, C>) -> Self {
        Self {
            key: entry.key(),
            values: entry.backing(),
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &'m K {
        self.key
    }
}
impl<'m, K, V, C: BackingCollection<V>> Grouping<'m, K, V, C> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.values.contains(value)
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &'m V> + 'm> {
        self.values.iter()
    }
}
impl<'m, K, V, C> Clone for Grouping<'m, K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'m, K, V, C> Copy for Grouping<'m, K, V, C> {}
impl<'m, K, V: 'm, C: BackingCollection<V>> IntoIterator for Grouping<'m, K, V, C> {
    type Item = &'m V;
    type IntoIter = Box<dyn Iterator<Item = &'m V> + 'm>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
impl<'m, K: fmt::Debug, V: fmt::Debug, C: BackingCollection<V>> fmt::Debug for Grouping<'m, K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grouping")
            .field("key", self.key)
            .field("values", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

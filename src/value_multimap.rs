use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashTable;
use tracing::{debug, warn};

use crate::collection::BackingCollection;
use crate::cursor::{Cursor, Entries, Iter, Keys, Pairs, Values};
use crate::equality::{DefaultEquality, KeyEquality};
use crate::error::{Error, Result};
use crate::lookup::Lookup;
use crate::view::ValueCollection;


/// A map in which every key owns a collection of values.
///
/// * `C` is the backing collection each key's values live in. It is produced by a factory
///   (`F`) whenever a key is added, and decides whether duplicates are kept or dropped.
/// * `E` decides which keys are the same key.
///
/// Every structural mutation increments the map's version, which invalidates outstanding
/// [`Cursor`]s. Keys without values never exist: removing the last value of a key removes
/// the key.
///
/// ```
/// use valuemultimap::ValueMultimap;
///
/// let mut map: ValueMultimap<&str, i32> = ValueMultimap::new();
/// map.add("a", 1).unwrap();
/// map.add("a", 2).unwrap();
/// map.add("b", 3).unwrap();
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get(&"a").unwrap().len(), 2);
///
/// map.remove(&"a", &1).unwrap();
/// map.remove(&"a", &2).unwrap();
/// assert!(!map.contains_key(&"a"));
/// ```
pub struct ValueMultimap<K, V, C = Vec<V>, E = DefaultEquality, F = fn() -> C> {
    entries: Vec<ValueCollection<K, V, C>>,
    index: HashTable<usize>,
    equality: E,
    factory: F,
    id: u64,
    version: u64,
}


/// Read access to the dense entry table, shared by cursors of every projection.
pub(crate) trait EntryTable<K, V, C> {
    fn id(&self) -> u64;
    fn version(&self) -> u64;
    fn entry_count(&self) -> usize;
    fn entry_at(&self, position: usize) -> Option<&ValueCollection<K, V, C>>;
}
impl<K, V, C, E, F> EntryTable<K, V, C> for ValueMultimap<K, V, C, E, F> {
    fn id(&self) -> u64 {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_at(&self, position: usize) -> Option<&ValueCollection<K, V, C>> {
        self.entries.get(position)
    }
}


static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(0);


fn read_only_factory() -> Error {
    Error::InvalidConfiguration("backing collection factory produces read-only collections".to_owned())
}


impl<K, V, C, E, F> ValueMultimap<K, V, C, E, F> {
    fn assemble(capacity: usize, equality: E, factory: F) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashTable::with_capacity(capacity),
            equality,
            factory,
            id: NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
        }
    }

    /// The number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tells maps apart; cursors refuse to walk a map other than their own.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Incremented on every structural mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn equality(&self) -> &E {
        &self.equality
    }

    /// A detached cursor over `(key, values)` pairs; see [`Cursor`].
    pub fn cursor(&self) -> Cursor<Pairs> {
        Cursor::new(self.id, self.version)
    }

    pub fn iter(&self) -> Entries<'_, K, V, C> {
        Iter::new(self)
    }

    pub fn keys(&self) -> Keys<'_, K, V, C> {
        Iter::new(self)
    }

    /// The value collections, in the same order as [`keys`](Self::keys).
    pub fn values(&self) -> Values<'_, K, V, C> {
        Iter::new(self)
    }

    /// A read-only grouping view of the whole map.
    pub fn lookup(&self) -> Lookup<'_, K, V, C, E, F> {
        Lookup::new(self)
    }

    /// Removes every key in one mutation.
    pub fn clear(&mut self) {
        debug!("clearing {} keys", self.entries.len());
        self.entries.clear();
        self.index.clear();
        self.version += 1;
    }
}

impl<K, V, C> ValueMultimap<K, V, C>
        where C: BackingCollection<V> + Default, DefaultEquality: KeyEquality<K> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_equality(capacity, DefaultEquality::default())
    }

    /// Builds a map from `(key, values)` groups.
    ///
    /// Unlike [`FromIterator`], a value the backing collection rejects fails the whole
    /// construction.
    pub fn from_groups<I, G>(groups: I) -> Result<Self>
            where I: IntoIterator<Item = (K, G)>, G: IntoIterator<Item = V> {
        let mut map = Self::new();
        for (key, values) in groups {
            map.add_range(key, values)?;
        }
        Ok(map)
    }
}

impl<K, V, C, E> ValueMultimap<K, V, C, E>
        where C: BackingCollection<V> + Default, E: KeyEquality<K> {
    pub fn with_equality(equality: E) -> Self {
        Self::with_capacity_and_equality(0, equality)
    }

    pub fn with_capacity_and_equality(capacity: usize, equality: E) -> Self {
        Self::assemble(capacity, equality, <C as Default>::default as fn() -> C)
    }
}

impl<K, V, C, F> ValueMultimap<K, V, C, DefaultEquality, F>
        where C: BackingCollection<V>, F: Fn() -> C, DefaultEquality: KeyEquality<K> {
    /// Builds a map whose backing collections come from `factory`.
    ///
    /// Fails with [`Error::InvalidConfiguration`] if the factory produces read-only collections.
    pub fn with_factory(factory: F) -> Result<Self> {
        Self::with_options(0, DefaultEquality::default(), factory)
    }
}

impl<K, V, C, E, F> ValueMultimap<K, V, C, E, F>
        where C: BackingCollection<V>, E: KeyEquality<K>, F: Fn() -> C {
    /// Builds a map with every construction parameter given explicitly.
    ///
    /// The factory is probed once; if the collection it produces is read-only the map is not
    /// built and [`Error::InvalidConfiguration`] is returned.
    pub fn with_options(capacity: usize, equality: E, factory: F) -> Result<Self> {
        let probe = factory();
        if probe.is_read_only() {
            warn!("rejecting a backing collection factory that produces read-only collections");
            return Err(read_only_factory());
        }
        Ok(Self::assemble(capacity, equality, factory))
    }

    /// Like [`from_groups`](ValueMultimap::from_groups), with explicit equality and factory.
    pub fn from_groups_with<I, G>(groups: I, equality: E, factory: F) -> Result<Self>
            where I: IntoIterator<Item = (K, G)>, G: IntoIterator<Item = V> {
        let mut map = Self::with_options(0, equality, factory)?;
        for (key, values) in groups {
            map.add_range(key, values)?;
        }
        Ok(map)
    }

    fn find(&self, key: &K) -> Option<usize> {
        let hash = self.equality.hash_key(key);
        self.index
            .find(hash, |&position| self.equality.keys_equal(self.entries[position].key(), key))
            .copied()
    }

    fn push_entry(&mut self, key: K, values: C) {
        let hash = self.equality.hash_key(&key);
        let position = self.entries.len();
        self.entries.push(ValueCollection::new(key, values));

        let Self { entries, index, equality, .. } = self;
        index.insert_unique(hash, position, |&p| equality.hash_key(entries[p].key()));
    }

    fn remove_entry_at(&mut self, position: usize) -> ValueCollection<K, V, C> {
        let hash = self.equality.hash_key(self.entries[position].key());
        if let Ok(slot) = self.index.find_entry(hash, |&p| p == position) {
            slot.remove();
        }

        let removed = self.entries.swap_remove(position);
        if position < self.entries.len() {
            // the former last entry now lives at `position`
            let moved_from = self.entries.len();
            let moved_hash = self.equality.hash_key(self.entries[position].key());
            if let Some(slot) = self.index.find_mut(moved_hash, |&p| p == moved_from) {
                *slot = position;
            }
        }
        removed
    }

    /// Adds a value under a key, creating the key if necessary.
    ///
    /// The version is incremented even if the backing collection drops the value as a
    /// duplicate.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        match self.find(&key) {
            Some(position) => {
                self.entries[position].insert_internal(value)?;
            },
            None => {
                let mut values = (self.factory)();
                values.insert(value)?;
                self.push_entry(key, values);
            },
        }
        self.version += 1;
        Ok(())
    }

    /// Adds several values under one key as a single mutation.
    ///
    /// An empty `values` does not create the key, but still counts as a mutation.
    ///
    /// If the backing collection rejects a value, the error is returned. For a new key nothing is
    /// stored; for an existing key the values accepted before the failure stay, and the version
    /// is incremented as long as at least one of them was.
    pub fn add_range<I: IntoIterator<Item = V>>(&mut self, key: K, values: I) -> Result<()> {
        match self.find(&key) {
            Some(position) => {
                let entry = &mut self.entries[position];
                if entry.is_backing_read_only() {
                    return Err(read_only_factory());
                }
                let mut touched = false;
                for value in values {
                    if let Err(e) = entry.insert_internal(value) {
                        if touched {
                            self.version += 1;
                        }
                        return Err(e);
                    }
                    touched = true;
                }
            },
            None => {
                let mut collection = (self.factory)();
                if collection.is_read_only() {
                    return Err(read_only_factory());
                }
                for value in values {
                    collection.insert(value)?;
                }
                if !collection.is_empty() {
                    self.push_entry(key, collection);
                }
            },
        }
        self.version += 1;
        Ok(())
    }

    /// Removes a key with all of its values. Returns whether the key was present.
    ///
    /// The version only changes if something was removed.
    pub fn remove_key(&mut self, key: &K) -> bool {
        match self.find(key) {
            Some(position) => {
                self.remove_entry_at(position);
                self.version += 1;
                true
            },
            None => false,
        }
    }

    /// Removes one occurrence of `value` under `key`, and the key itself once it has no values
    /// left. Returns whether a value was removed.
    pub fn remove(&mut self, key: &K, value: &V) -> Result<bool> {
        let position = match self.find(key) {
            Some(p) => p,
            None => return Ok(false),
        };
        if !self.entries[position].remove_internal(value)? {
            return Ok(false);
        }
        if self.entries[position].is_empty() {
            self.remove_entry_at(position);
        }
        self.version += 1;
        Ok(true)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.try_get(key)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    /// Whether any key holds `value`. Scans every value collection.
    pub fn contains_value(&self, value: &V) -> bool {
        self.entries
            .iter()
            .any(|values| values.contains(value))
    }

    /// The values of a key, or [`Error::KeyNotFound`].
    pub fn get(&self, key: &K) -> Result<&ValueCollection<K, V, C>> {
        self.try_get(key)
            .ok_or(Error::KeyNotFound)
    }

    pub fn try_get(&self, key: &K) -> Option<&ValueCollection<K, V, C>> {
        let position = self.find(key)?;
        Some(&self.entries[position])
    }
}

impl<K, V, C> Default for ValueMultimap<K, V, C>
        where C: BackingCollection<V> + Default, DefaultEquality: KeyEquality<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Values the backing collection rejects are logged and skipped. Use
/// [`add`](ValueMultimap::add) directly to see the error.
impl<K, V, C, E, F> Extend<(K, V)> for ValueMultimap<K, V, C, E, F>
        where C: BackingCollection<V>, E: KeyEquality<K>, F: Fn() -> C {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            if let Err(e) = self.add(k, v) {
                warn!("dropping value while extending map: {}", e);
            }
        }
    }
}

/// Values the backing collection rejects are logged and skipped; use
/// [`from_groups`](ValueMultimap::from_groups) or
/// [`from_groups_with`](ValueMultimap::from_groups_with) when a collection can fail.
impl<K, V, C> FromIterator<(K, V)> for ValueMultimap<K, V, C>
        where C: BackingCollection<V> + Default, DefaultEquality: KeyEquality<K> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'m, K, V, C, E, F> IntoIterator for &'m ValueMultimap<K, V, C, E, F> {
    type Item = (&'m K, &'m ValueCollection<K, V, C>);
    type IntoIter = Entries<'m, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, C, E, F> fmt::Debug for ValueMultimap<K, V, C, E, F>
        where K: fmt::Debug, V: fmt::Debug, C: BackingCollection<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|values| (values.key(), values)))
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use super::*;
    use crate::collection::ReadOnly;
    use crate::equality::AsciiCaseInsensitive;

    fn sorted(values: &ValueCollection<&'static str, i32, Vec<i32>>) -> Vec<i32> {
        let mut ret: Vec<i32> = values.iter().copied().collect();
        ret.sort();
        ret
    }

    #[test]
    fn test_add_get_remove() {
        let mut map: ValueMultimap<&str, i32> = ValueMultimap::new();
        map.add("a", 1).unwrap();
        map.add("a", 2).unwrap();
        map.add("b", 3).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(sorted(map.get(&"a").unwrap()), vec![1, 2]);

        assert!(map.remove(&"a", &1).unwrap());
        assert_eq!(sorted(map.get(&"a").unwrap()), vec![2]);
        assert!(map.remove(&"a", &2).unwrap());
        assert!(!map.contains_key(&"a"));
        assert_eq!(map.get(&"a").unwrap_err(), Error::KeyNotFound);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_version_bumps() {
        let mut map: ValueMultimap<&str, i32> = ValueMultimap::new();
        assert_eq!(map.version(), 0);
        map.add("a", 1).unwrap();
        map.add("a", 1).unwrap();
        assert_eq!(map.version(), 2);

        map.add_range("b", vec![1, 2, 3]).unwrap();
        assert_eq!(map.version(), 3);

        assert!(!map.remove_key(&"zzz"));
        assert!(!map.remove(&"a", &99).unwrap());
        assert!(!map.remove(&"zzz", &1).unwrap());
        assert_eq!(map.version(), 3);

        assert!(map.remove_key(&"b"));
        assert_eq!(map.version(), 4);

        assert!(map.contains(&"a", &1));
        assert!(map.contains_value(&1));
        assert_eq!(map.version(), 4);

        map.clear();
        assert_eq!(map.version(), 5);
        assert!(map.is_empty());
    }

    #[test]
    fn test_add_range_empty_creates_nothing() {
        let mut map: ValueMultimap<&str, i32> = ValueMultimap::new();
        map.add_range("a", Vec::new()).unwrap();
        assert!(!map.contains_key(&"a"));
        assert_eq!(map.version(), 1);
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut map: ValueMultimap<u32, u32> = ValueMultimap::new();
        for k in 0..50 {
            map.add(k, k * 10).unwrap();
        }
        for k in (0..50).step_by(3) {
            assert!(map.remove_key(&k));
        }
        for k in 0..50 {
            assert_eq!(map.contains_key(&k), k % 3 != 0, "key {}", k);
            if k % 3 != 0 {
                assert!(map.get(&k).unwrap().contains(&(k * 10)));
                assert_eq!(*map.get(&k).unwrap().key(), k);
            }
        }
        assert_eq!(map.keys().count(), map.len());
    }

    #[test]
    fn test_try_get_same_instance() {
        let mut map: ValueMultimap<&str, i32> = ValueMultimap::new();
        map.add("a", 1).unwrap();
        assert!(map.try_get(&"b").is_none());
        let by_get = map.get(&"a").unwrap();
        let by_try_get = map.try_get(&"a").unwrap();
        assert!(std::ptr::eq(by_get, by_try_get));
    }

    #[test]
    fn test_set_factory_deduplicates() {
        let mut map = ValueMultimap::<&str, i32, HashSet<i32>, _, _>::with_factory(HashSet::new).unwrap();
        map.add("a", 1).unwrap();
        map.add("a", 1).unwrap();
        assert_eq!(map.get(&"a").unwrap().len(), 1);
        assert_eq!(map.version(), 2);

        assert!(map.remove(&"a", &1).unwrap());
        assert!(!map.contains_key(&"a"));
    }

    #[test]
    fn test_read_only_factory_rejected() {
        let result = ValueMultimap::<&str, i32, ReadOnly<Vec<i32>>, _, _>::with_factory(|| ReadOnly::new(Vec::new()));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = ValueMultimap::<&str, i32, _, _, _>::from_groups_with(
            vec![("a", vec![1])],
            DefaultEquality::new(),
            || ReadOnly::new(Vec::<i32>::new()),
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_custom_equality() {
        let mut map: ValueMultimap<String, &str, BTreeSet<&str>, AsciiCaseInsensitive> =
            ValueMultimap::with_capacity_and_equality(8, AsciiCaseInsensitive::new());
        map.add("Users".to_owned(), "id").unwrap();
        map.add("USERS".to_owned(), "name").unwrap();
        map.add("orders".to_owned(), "id").unwrap();
        assert_eq!(map.len(), 2);

        let users = map.get(&"users".to_owned()).unwrap();
        assert_eq!(users.key(), "Users");
        assert_eq!(users.iter().copied().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_from_groups_and_iter_order() {
        let map: ValueMultimap<&str, i32> = ValueMultimap::from_groups(vec![
            ("x", vec![1, 2]),
            ("y", vec![]),
            ("z", vec![3]),
        ]).unwrap();
        let keys: Vec<&str> = map.keys().copied().collect();
        assert_eq!(keys, vec!["x", "z"]);
        let counts: Vec<usize> = map.values().map(|v| v.len()).collect();
        assert_eq!(counts, vec![2, 1]);
        for ((key, values), other_key) in map.iter().zip(map.keys()) {
            assert_eq!(key, other_key);
            assert_eq!(values.key(), key);
        }
    }

    #[test]
    fn test_from_iterator_and_debug() {
        let map: ValueMultimap<char, u8> = vec![('a', 1), ('b', 2), ('a', 3)].into_iter().collect();
        assert_eq!(format!("{:?}", map), "{'a': ValueCollection { key: 'a', values: [1, 3] }, 'b': ValueCollection { key: 'b', values: [2] }}");
    }
}

//! Fail-fast iteration over a [`ValueMultimap`].
//!
//! A [`Cursor`] walks the entries of a map without borrowing it. Every step hands the map back
//! in, and the cursor compares the map's version with the version it captured when it was
//! created. If the map was structurally modified in the meantime, the step fails with
//! [`Error::ConcurrentModification`] instead of producing inconsistent results.
//!
//! ```text
//! BeforeFirst --advance--> During --advance--> ... --advance--> AfterLast
//!      ^                                                            |
//!      +----------------------------reset---------------------------+
//! ```
//!
//! A cursor is parameterized by a [`Projection`] that decides what each entry looks like to the
//! caller. The borrowing iterators returned by [`ValueMultimap::iter`], [`ValueMultimap::keys`],
//! [`ValueMultimap::values`] and [`Lookup::iter`](crate::Lookup::iter) are thin wrappers around
//! the same state machine.

use std::marker::PhantomData;

use tracing::debug;

use crate::error::{Error, Result};
use crate::lookup::Grouping;
use crate::value_multimap::{EntryTable, ValueMultimap};
use crate::view::ValueCollection;


/// The position of a [`Cursor`] relative to the entries of its map.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CursorState {
    BeforeFirst,
    During,
    AfterLast,
    Disposed,
}


/// Turns a map entry into the item a cursor yields.
pub trait Projection<K, V, C> {
    type Item<'m> where K: 'm, V: 'm, C: 'm;

    fn project<'m>(entry: &'m ValueCollection<K, V, C>) -> Self::Item<'m>;
}

/// Yields `(key, values)` pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pairs;
impl<K, V, C> Projection<K, V, C> for Pairs {
    type Item<'m> = (&'m K, &'m ValueCollection<K, V, C>) where K: 'm, V: 'm, C: 'm;

    fn project<'m>(entry: &'m ValueCollection<K, V, C>) -> Self::Item<'m> {
        (entry.key(), entry)
    }
}

/// Yields keys only.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeysOnly;
impl<K, V, C> Projection<K, V, C> for KeysOnly {
    type Item<'m> = &'m K where K: 'm, V: 'm, C: 'm;

    fn project<'m>(entry: &'m ValueCollection<K, V, C>) -> Self::Item<'m> {
        entry.key()
    }
}

/// Yields value collections only.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValuesOnly;
impl<K, V, C> Projection<K, V, C> for ValuesOnly {
    type Item<'m> = &'m ValueCollection<K, V, C> where K: 'm, V: 'm, C: 'm;

    fn project<'m>(entry: &'m ValueCollection<K, V, C>) -> Self::Item<'m> {
        entry
    }
}

/// Yields [`Grouping`]s, as seen through a [`Lookup`](crate::Lookup).
#[derive(Clone, Copy, Debug, Default)]
pub struct Groups;
impl<K, V, C> Projection<K, V, C> for Groups {
    type Item<'m> = Grouping<'m, K, V, C> where K: 'm, V: 'm, C: 'm;

    fn project<'m>(entry: &'m ValueCollection<K, V, C>) -> Self::Item<'m> {
        Grouping::new(entry)
    }
}


/// A detached, version-checked cursor over the entries of a map.
#[derive(Clone, Debug)]
pub struct Cursor<P> {
    origin: u64,
    version: u64,
    state: CursorState,
    position: usize,
    _projection: PhantomData<fn() -> P>,
}
impl<P> Cursor<P> {
    pub(crate) fn new(origin: u64, version: u64) -> Self {
        Self {
            origin,
            version,
            state: CursorState::BeforeFirst,
            position: 0,
            _projection: PhantomData,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Moves to the next entry of `map`.
    ///
    /// Returns `Ok(false)` once the entries are exhausted, and keeps doing so on further calls.
    pub fn advance<K, V, C, E, F>(&mut self, map: &ValueMultimap<K, V, C, E, F>) -> Result<bool> {
        self.step(map)
    }

    /// The entry produced by the last successful [`advance`](Self::advance).
    pub fn current<'m, K, V, C, E, F>(&self, map: &'m ValueMultimap<K, V, C, E, F>) -> Result<P::Item<'m>>
            where P: Projection<K, V, C> {
        self.read(map)
    }

    /// Rewinds to before the first entry.
    pub fn reset<K, V, C, E, F>(&mut self, map: &ValueMultimap<K, V, C, E, F>) -> Result<()> {
        if self.state == CursorState::Disposed {
            return Err(Error::InvalidState(CursorState::Disposed));
        }
        self.check(map.id(), map.version())?;
        self.state = CursorState::BeforeFirst;
        self.position = 0;
        Ok(())
    }

    /// Retires the cursor. Every later call fails with [`Error::InvalidState`].
    pub fn dispose(&mut self) {
        self.state = CursorState::Disposed;
    }

    fn check(&self, origin: u64, actual: u64) -> Result<()> {
        if self.origin != origin {
            debug!("cursor of map {} used on map {}", self.origin, origin);
            return Err(Error::InvalidState(self.state));
        }
        if self.version != actual {
            debug!("cursor at version {} used on map at version {}", self.version, actual);
            return Err(Error::ConcurrentModification {
                expected: self.version,
                actual,
            });
        }
        Ok(())
    }

    pub(crate) fn step<K, V, C>(&mut self, table: &dyn EntryTable<K, V, C>) -> Result<bool> {
        let next = match self.state {
            CursorState::BeforeFirst => 0,
            CursorState::During => self.position + 1,
            CursorState::AfterLast => {
                self.check(table.id(), table.version())?;
                return Ok(false);
            },
            CursorState::Disposed => return Err(Error::InvalidState(CursorState::Disposed)),
        };
        self.check(table.id(), table.version())?;

        if next < table.entry_count() {
            self.position = next;
            self.state = CursorState::During;
            Ok(true)
        } else {
            self.state = CursorState::AfterLast;
            Ok(false)
        }
    }

    pub(crate) fn read<'m, K, V, C>(&self, table: &'m dyn EntryTable<K, V, C>) -> Result<P::Item<'m>>
            where P: Projection<K, V, C>, K: 'm, V: 'm, C: 'm {
        if self.state != CursorState::During {
            return Err(Error::InvalidState(self.state));
        }
        // the entry at our position may be a different one after a mutation
        self.check(table.id(), table.version())?;
        table.entry_at(self.position)
            .map(|entry| P::project(entry))
            .ok_or(Error::InvalidState(self.state))
    }

    fn remaining(&self, entry_count: usize) -> usize {
        match self.state {
            CursorState::BeforeFirst => entry_count,
            CursorState::During => entry_count.saturating_sub(self.position + 1),
            CursorState::AfterLast | CursorState::Disposed => 0,
        }
    }
}


/// A borrowing iterator over a map, driven by a [`Cursor`].
///
/// The borrow keeps the map from changing, so the cursor's version check never trips here.
pub struct Iter<'m, K, V, C, P> {
    table: &'m dyn EntryTable<K, V, C>,
    cursor: Cursor<P>,
}
impl<'m, K, V, C, P> Iter<'m, K, V, C, P> {
    pub(crate) fn new(table: &'m dyn EntryTable<K, V, C>) -> Self {
        Self {
            table,
            cursor: Cursor::new(table.id(), table.version()),
        }
    }
}
impl<'m, K, V, C, P> Iterator for Iter<'m, K, V, C, P>
        where P: Projection<K, V, C>, K: 'm, V: 'm, C: 'm {
    type Item = P::Item<'m>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.step(self.table) {
            Ok(true) => self.cursor.read(self.table).ok(),
            _ => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cursor.remaining(self.table.entry_count());
        (remaining, Some(remaining))
    }
}
impl<'m, K, V, C, P> Clone for Iter<'m, K, V, C, P> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            cursor: Cursor {
                origin: self.cursor.origin,
                version: self.cursor.version,
                state: self.cursor.state,
                position: self.cursor.position,
                _projection: PhantomData,
            },
        }
    }
}

pub type Entries<'m, K, V, C> = Iter<'m, K, V, C, Pairs>;
pub type Keys<'m, K, V, C> = Iter<'m, K, V, C, KeysOnly>;
pub type Values<'m, K, V, C> = Iter<'m, K, V, C, ValuesOnly>;
pub type Groupings<'m, K, V, C> = Iter<'m, K, V, C, Groups>;


#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValueMultimap<&'static str, i32> {
        let mut map = ValueMultimap::new();
        map.add("a", 1).unwrap();
        map.add("a", 2).unwrap();
        map.add("b", 3).unwrap();
        map
    }

    #[test]
    fn test_state_machine() {
        let map = sample();
        let mut cursor = map.cursor();
        assert_eq!(cursor.state(), CursorState::BeforeFirst);
        assert_eq!(cursor.current(&map).unwrap_err(), Error::InvalidState(CursorState::BeforeFirst));

        assert!(cursor.advance(&map).unwrap());
        assert_eq!(cursor.state(), CursorState::During);
        let (key, values) = cursor.current(&map).unwrap();
        assert_eq!(*key, "a");
        assert_eq!(values.len(), 2);

        assert!(cursor.advance(&map).unwrap());
        assert_eq!(*cursor.current(&map).unwrap().0, "b");

        assert!(!cursor.advance(&map).unwrap());
        assert_eq!(cursor.state(), CursorState::AfterLast);
        assert!(!cursor.advance(&map).unwrap());
        assert_eq!(cursor.current(&map).unwrap_err(), Error::InvalidState(CursorState::AfterLast));

        cursor.reset(&map).unwrap();
        assert_eq!(cursor.state(), CursorState::BeforeFirst);
        assert!(cursor.advance(&map).unwrap());
    }

    #[test]
    fn test_mutation_invalidates() {
        let mut map = sample();
        let mut cursor = map.cursor();
        assert!(cursor.advance(&map).unwrap());

        map.add("c", 4).unwrap();
        assert!(matches!(cursor.advance(&map), Err(Error::ConcurrentModification { .. })));
        assert!(matches!(cursor.reset(&map), Err(Error::ConcurrentModification { .. })));
        assert!(matches!(cursor.current(&map), Err(Error::ConcurrentModification { .. })));
    }

    #[test]
    fn test_disposed() {
        let map = sample();
        let mut cursor = map.cursor();
        cursor.advance(&map).unwrap();
        cursor.dispose();
        assert_eq!(cursor.advance(&map), Err(Error::InvalidState(CursorState::Disposed)));
        assert_eq!(cursor.reset(&map), Err(Error::InvalidState(CursorState::Disposed)));
        assert!(matches!(cursor.current(&map), Err(Error::InvalidState(CursorState::Disposed))));
    }

    #[test]
    fn test_cursor_bound_to_its_map() {
        let map = sample();
        let mut other: ValueMultimap<&str, i32> = ValueMultimap::new();
        other.add("zzz", 1).unwrap();
        other.add("zzz", 2).unwrap();
        other.add("yyy", 3).unwrap();
        assert_eq!(map.version(), other.version());

        let mut cursor = map.cursor();
        assert_eq!(cursor.advance(&other), Err(Error::InvalidState(CursorState::BeforeFirst)));
        assert_eq!(cursor.reset(&other), Err(Error::InvalidState(CursorState::BeforeFirst)));

        assert!(cursor.advance(&map).unwrap());
        assert!(matches!(cursor.current(&other), Err(Error::InvalidState(CursorState::During))));
        assert_eq!(*cursor.current(&map).unwrap().0, "a");
    }

    #[test]
    fn test_iter_size_hint() {
        let map = sample();
        let mut keys = map.keys();
        assert_eq!(keys.size_hint(), (2, Some(2)));
        keys.next();
        assert_eq!(keys.size_hint(), (1, Some(1)));
        keys.next();
        assert_eq!(keys.next(), None);
        assert_eq!(keys.size_hint(), (0, Some(0)));
    }
}

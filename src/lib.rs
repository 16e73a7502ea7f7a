//! An in-memory map in which every key owns a collection of values.
//!
//! [`ValueMultimap`] stores each key's values in a [`BackingCollection`] produced by a
//! factory, hands them out as read-only [`ValueCollection`]s, versions every structural change
//! so that a detached [`Cursor`] can fail fast, and offers a [`Lookup`] view that groups values
//! by key.

pub mod collection;
pub mod cursor;
pub mod equality;
pub mod error;
pub mod lookup;
pub mod value_multimap;
pub mod view;


pub use crate::collection::{BackingCollection, ReadOnly};
pub use crate::cursor::{Cursor, CursorState, Groups, KeysOnly, Pairs, Projection, ValuesOnly};
pub use crate::equality::{AsciiCaseInsensitive, DefaultEquality, KeyEquality};
pub use crate::error::{Error, Result};
pub use crate::lookup::{Grouping, Lookup};
pub use crate::value_multimap::ValueMultimap;
pub use crate::view::ValueCollection;

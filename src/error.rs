use thiserror::Error;

use crate::cursor::CursorState;


/// Everything that can go wrong when operating on a [`ValueMultimap`](crate::ValueMultimap),
/// one of its value collections or one of its cursors.
///
/// All errors are raised before any change to the map takes place; a failed operation leaves
/// the map exactly as it was.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// The key is not present in the map.
    #[error("the given key is not present in the map")]
    KeyNotFound,

    /// The destination slice cannot hold the values starting at the requested offset.
    #[error("destination of length {available} cannot hold {required} values at offset {offset}")]
    OutOfRange {
        /// Where the caller asked the copy to start.
        offset: usize,
        /// How many values would have been written.
        required: usize,
        /// The length of the destination slice.
        available: usize,
    },

    /// The map was configured with a backing-collection factory whose output is read-only.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A mutating operation was attempted on a read-only collection.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// A cursor was used in a state that does not permit the operation.
    #[error("cursor is in state {0:?}, which does not permit this operation")]
    InvalidState(CursorState),

    /// The map was structurally modified after the cursor captured its version.
    #[error("map was modified during iteration (cursor version {expected}, map version {actual})")]
    ConcurrentModification {
        expected: u64,
        actual: u64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = Error::OutOfRange { offset: 2, required: 3, available: 4 };
        assert_eq!(err.to_string(), "destination of length 4 cannot hold 3 values at offset 2");

        let err = Error::ConcurrentModification { expected: 1, actual: 2 };
        assert!(err.to_string().contains("cursor version 1"));

        let err = Error::InvalidState(CursorState::BeforeFirst);
        assert!(err.to_string().contains("BeforeFirst"));
    }
}

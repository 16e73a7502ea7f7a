//! Key equality strategies.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};


/// Decides which keys are the same key.
///
/// Implementations must be consistent: keys that compare equal must hash equally.
pub trait KeyEquality<K> {
    fn hash_key(&self, key: &K) -> u64;
    fn keys_equal(&self, left: &K, right: &K) -> bool;
}


/// Equality as defined by the key's own [`Eq`] and [`Hash`] implementations.
#[derive(Clone, Debug, Default)]
pub struct DefaultEquality<S = RandomState> {
    hash_builder: S,
}
impl DefaultEquality {
    pub fn new() -> Self {
        Self::default()
    }
}
impl<S> DefaultEquality<S> {
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            hash_builder,
        }
    }
}
impl<K: Hash + Eq, S: BuildHasher> KeyEquality<K> for DefaultEquality<S> {
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    fn keys_equal(&self, left: &K, right: &K) -> bool {
        left == right
    }
}


/// Compares string keys while ignoring ASCII case, the way SQL treats unquoted identifiers.
#[derive(Clone, Debug, Default)]
pub struct AsciiCaseInsensitive {
    hash_builder: RandomState,
}
impl AsciiCaseInsensitive {
    pub fn new() -> Self {
        Self::default()
    }
}
impl<K: AsRef<str>> KeyEquality<K> for AsciiCaseInsensitive {
    fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        for b in key.as_ref().bytes() {
            hasher.write_u8(b.to_ascii_lowercase());
        }
        // terminator, like str's own Hash impl
        hasher.write_u8(0xFF);
        hasher.finish()
    }

    fn keys_equal(&self, left: &K, right: &K) -> bool {
        left.as_ref().eq_ignore_ascii_case(right.as_ref())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_equality() {
        let equality = DefaultEquality::new();
        assert!(equality.keys_equal(&"users", &"users"));
        assert!(!equality.keys_equal(&"users", &"Users"));
        assert_eq!(equality.hash_key(&42u32), equality.hash_key(&42u32));
    }

    #[test]
    fn test_case_insensitive() {
        let equality = AsciiCaseInsensitive::new();
        let lower = String::from("order_items");
        let upper = String::from("ORDER_Items");
        assert!(equality.keys_equal(&lower, &upper));
        assert_eq!(equality.hash_key(&lower), equality.hash_key(&upper));
        assert!(!equality.keys_equal(&lower, &String::from("orders")));
    }
}

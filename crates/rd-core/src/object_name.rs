//! Precomputed string hashes used as registry keys.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// Fowler-Noll-Vo 1a hash of `bytes`.
#[must_use]
pub const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash = (hash ^ bytes[i] as u64).wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Name of a driver object, hashed once at construction.
///
/// Equality and ordering only look at the hash, which keeps map lookups
/// cheap. The source string is kept for display.
#[derive(Clone)]
pub struct ObjectName {
    hash: u64,
    name: Arc<str>,
}

impl ObjectName {
    /// Hashes `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            hash: fnv1a(name.as_bytes()),
            name: Arc::from(name),
        }
    }

    /// The numeric hash.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.hash
    }

    /// The string this name was built from.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ObjectName {}

impl PartialOrd for ObjectName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectName({:?}, {:#018x})", self.name, self.hash)
    }
}

impl From<&str> for ObjectName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ObjectName {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn equality_follows_hash() {
        let a = ObjectName::new("MainWindow");
        let b = ObjectName::from(String::from("MainWindow"));
        let c = ObjectName::new("Other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "MainWindow");
        assert_eq!(a.to_string(), "MainWindow");
    }

    #[test]
    fn usable_as_ordered_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ObjectName::new("a"), 1);
        map.insert(ObjectName::new("b"), 2);
        map.insert(ObjectName::new("a"), 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&ObjectName::new("a")], 3);
    }
}

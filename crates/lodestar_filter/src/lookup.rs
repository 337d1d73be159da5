//! Property sources a [`Filter`](crate::Filter) can be evaluated against.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::{BTreeMap, HashMap};

/// Read access to a string-to-string property map.
///
/// Lookups are case-sensitive. Implemented for the standard map types so
/// filters can be exercised without a registry.
pub trait PropertyLookup {
    /// Returns the value stored under `key`, if any.
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl<T: PropertyLookup + ?Sized> PropertyLookup for &T {
    fn lookup(&self, key: &str) -> Option<&str> {
        (**self).lookup(key)
    }
}

impl<K, V, S> PropertyLookup for HashMap<K, V, S>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    S: BuildHasher,
{
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(AsRef::as_ref)
    }
}

impl<K, V> PropertyLookup for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(AsRef::as_ref)
    }
}

impl<K, V> PropertyLookup for [(K, V)]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn lookup(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_ref())
    }
}

impl<K, V, const N: usize> PropertyLookup for [(K, V); N]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn lookup(&self, key: &str) -> Option<&str> {
        self.as_slice().lookup(key)
    }
}

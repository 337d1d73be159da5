//! Service properties.
//!
//! [`Properties`] is an insertion-ordered, case-sensitive string map. The
//! registry injects [`OBJECT_CLASS`] and [`SERVICE_ID`] into every
//! registration's properties, and [`SERVICE_RANKING`] orders competing
//! providers.

use indexmap::IndexMap;
use lodestar_filter::PropertyLookup;

use crate::service::ServiceId;

/// Property holding the registered service name.
pub const OBJECT_CLASS: &str = "objectClass";

/// Property holding the registration id.
pub const SERVICE_ID: &str = "service.id";

/// Property holding the integer ranking. Higher wins.
pub const SERVICE_RANKING: &str = "service.ranking";

/// Ordered, case-sensitive `String -> String` map attached to a registration.
///
/// # Example
///
/// ```
/// use lodestar_registry::properties::{Properties, SERVICE_RANKING};
///
/// let props = Properties::new()
///     .with("lang", "en")
///     .with(SERVICE_RANKING, "10");
///
/// assert_eq!(props.get("lang"), Some("en"));
/// assert_eq!(props.ranking(), 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: IndexMap<String, String>,
}

impl Properties {
    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a property, returning the previous value.
    ///
    /// Replacing an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The [`SERVICE_RANKING`] value, or 0 when absent or not an integer.
    #[must_use]
    pub fn ranking(&self) -> i64 {
        self.get(SERVICE_RANKING)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    /// The [`SERVICE_ID`] value, if present and numeric.
    #[must_use]
    pub fn service_id(&self) -> Option<ServiceId> {
        self.get(SERVICE_ID)
            .and_then(|raw| raw.parse().ok())
            .map(ServiceId::new)
    }

    /// The [`OBJECT_CLASS`] value.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.get(OBJECT_CLASS)
    }
}

impl PropertyLookup for Properties {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Properties {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Extend<(String, String)> for Properties {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

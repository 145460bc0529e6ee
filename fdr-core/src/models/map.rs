use std::hash::Hash;

/// An insertion-ordered hash map, defaulting to values of f64.
///
/// Iteration order feeds directly into the row and column order of the dispatch
/// program, into the order bids are offered to the demand model, and into the
/// layout of the bid log. Repeated runs must produce identical programs and files,
/// so we replace std::collections::HashMap with indexmap::IndexMap. This is an
/// implementation detail, so it is wrapped in a newtype.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Map<K: Eq + Hash, V = f64>(indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>);

impl<K: Eq + Hash, V> Map<K, V> {
    /// Create an empty map with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self(indexmap::IndexMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ))
    }
}

impl<K: Eq + Hash> Map<K, f64> {
    /// Add `value` to the entry for `key`, starting from zero if it is absent
    pub fn accumulate(&mut self, key: K, value: f64) {
        *self.0.entry(key).or_insert(0.0) += value;
    }

    /// The value for `key`, or zero if it is absent
    pub fn value_or_zero<Q>(&self, key: &Q) -> f64
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.0.get(key).copied().unwrap_or(0.0)
    }
}

impl<K: Eq + Hash, V> Default for Map<K, V> {
    fn default() -> Self {
        Self(indexmap::IndexMap::default())
    }
}

impl<K: Eq + Hash, V> std::ops::Deref for Map<K, V> {
    type Target = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Eq + Hash, V> std::ops::DerefMut for Map<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Eq + Hash, V> IntoIterator for Map<K, V> {
    type Item = (K, V);
    type IntoIter = indexmap::map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, K: Eq + Hash, V> IntoIterator for &'a Map<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = indexmap::map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(indexmap::IndexMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let map: Map<&str, f64> = [("z", 1.0), ("a", 2.0), ("m", 3.0)].into_iter().collect();
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn accumulates_from_zero() {
        let mut map = Map::<&str>::default();
        map.accumulate("x", 1.5);
        map.accumulate("x", 2.0);
        assert_eq!(map.value_or_zero("x"), 3.5);
        assert_eq!(map.value_or_zero("y"), 0.0);
    }
}

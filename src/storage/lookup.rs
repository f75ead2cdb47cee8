//! Entry-keyed lookups.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;

/// Ordered `u64 -> i64` map keyed by entry id.
///
/// Values are raw 64-bit payloads: container ids, `i64` sort values,
/// `f64::to_bits` or `f32::to_bits` reinterpreted as `i64`.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    values: BTreeMap<u64, i64>,
}

impl Lookup {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<i64> {
        self.values.get(&key).copied()
    }

    /// Resolve every key in `keys`, writing `default` for missing ones.
    pub fn get_all(&self, keys: &[u64], out: &mut Vec<i64>, default: i64) {
        out.clear();
        out.extend(keys.iter().map(|k| self.get(*k).unwrap_or(default)));
    }

    pub fn insert(&mut self, key: u64, value: i64) -> Option<i64> {
        self.values.insert(key, value)
    }

    pub fn remove(&mut self, key: u64) -> Option<i64> {
        self.values.remove(&key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u64, i64> {
        self.values.iter()
    }

    /// Keys strictly greater than `after` (all keys when `None`), ascending.
    pub fn keys_after(&self, after: Option<u64>) -> impl Iterator<Item = u64> + '_ {
        let lower = match after {
            Some(a) => Bound::Excluded(a),
            None => Bound::Unbounded,
        };
        self.values
            .range((lower, Bound::Unbounded))
            .map(|(k, _)| *k)
    }
}

//! Ordered term trees.
//!
//! A [`TermTree`] maps a term key to a [`TermTreeValue`]: the packed postings
//! value plus the id of the container holding the term's dictionary bytes
//! (textual trees only). Keys are raw bytes, `i64`, or [`DoubleKey`], an
//! order-preserving encoding of `f64`.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::Arc;

use crate::storage::ContainerId;

/// Value stored for each key of a term tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermTreeValue {
    /// Packed postings reference (see `index::postings::PostingList`).
    pub postings: i64,
    /// Container holding the term bytes, `0` for numeric trees.
    pub term_id: ContainerId,
}

/// Ordered map from term key to postings.
#[derive(Debug, Clone)]
pub struct TermTree<K> {
    entries: BTreeMap<K, TermTreeValue>,
}

impl<K: Ord> Default for TermTree<K> {
    fn default() -> Self {
        TermTree {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> TermTree<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<TermTreeValue>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: K, value: TermTreeValue) -> Option<TermTreeValue> {
        self.entries.insert(key, value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<TermTreeValue>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, TermTreeValue> {
        self.entries.iter()
    }
}

/// IEEE-754 `f64` folded into a `u64` whose unsigned order matches numeric
/// order. Negative zero is folded onto positive zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoubleKey(u64);

const SIGN_BIT: u64 = 1 << 63;

impl DoubleKey {
    pub fn new(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        let bits = value.to_bits();
        if bits & SIGN_BIT != 0 {
            DoubleKey(!bits)
        } else {
            DoubleKey(bits | SIGN_BIT)
        }
    }

    pub fn value(self) -> f64 {
        if self.0 & SIGN_BIT != 0 {
            f64::from_bits(self.0 & !SIGN_BIT)
        } else {
            f64::from_bits(!self.0)
        }
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }
}

impl From<f64> for DoubleKey {
    fn from(value: f64) -> Self {
        DoubleKey::new(value)
    }
}

/// All term trees of a store, grouped by key type.
#[derive(Debug, Clone, Default)]
pub struct TreeCatalog {
    text: BTreeMap<String, Arc<TermTree<Vec<u8>>>>,
    longs: BTreeMap<String, Arc<TermTree<i64>>>,
    doubles: BTreeMap<String, Arc<TermTree<DoubleKey>>>,
}

/// Key types that can address a term tree.
pub trait TreeKey: Ord + Clone + Debug + Send + Sync + 'static {
    fn trees(catalog: &TreeCatalog) -> &BTreeMap<String, Arc<TermTree<Self>>>;

    fn trees_mut(catalog: &mut TreeCatalog) -> &mut BTreeMap<String, Arc<TermTree<Self>>>;
}

impl TreeKey for Vec<u8> {
    fn trees(catalog: &TreeCatalog) -> &BTreeMap<String, Arc<TermTree<Self>>> {
        &catalog.text
    }

    fn trees_mut(catalog: &mut TreeCatalog) -> &mut BTreeMap<String, Arc<TermTree<Self>>> {
        &mut catalog.text
    }
}

impl TreeKey for i64 {
    fn trees(catalog: &TreeCatalog) -> &BTreeMap<String, Arc<TermTree<Self>>> {
        &catalog.longs
    }

    fn trees_mut(catalog: &mut TreeCatalog) -> &mut BTreeMap<String, Arc<TermTree<Self>>> {
        &mut catalog.longs
    }
}

impl TreeKey for DoubleKey {
    fn trees(catalog: &TreeCatalog) -> &BTreeMap<String, Arc<TermTree<Self>>> {
        &catalog.doubles
    }

    fn trees_mut(catalog: &mut TreeCatalog) -> &mut BTreeMap<String, Arc<TermTree<Self>>> {
        &mut catalog.doubles
    }
}

#[derive(Debug, Clone)]
enum Position<K> {
    Start,
    AtOrPast(K),
    After(K),
}

/// Iteration order of a [`TreeIterator`], selected at compile time.
pub trait IterationDirection: Debug + Default + Copy + Send + Sync + 'static {
    const IS_FORWARD: bool;

    /// First entry at `from` or beyond it in iteration order.
    fn step<'a, K: Ord>(
        entries: &'a BTreeMap<K, TermTreeValue>,
        from: Bound<&K>,
    ) -> Option<(&'a K, &'a TermTreeValue)>;
}

/// Ascending key order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Forward;

/// Descending key order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Backward;

impl IterationDirection for Forward {
    const IS_FORWARD: bool = true;

    fn step<'a, K: Ord>(
        entries: &'a BTreeMap<K, TermTreeValue>,
        from: Bound<&K>,
    ) -> Option<(&'a K, &'a TermTreeValue)> {
        entries.range((from, Bound::Unbounded)).next()
    }
}

impl IterationDirection for Backward {
    const IS_FORWARD: bool = false;

    fn step<'a, K: Ord>(
        entries: &'a BTreeMap<K, TermTreeValue>,
        from: Bound<&K>,
    ) -> Option<(&'a K, &'a TermTreeValue)> {
        entries.range((Bound::Unbounded, from)).next_back()
    }
}

/// Restartable cursor over a term tree snapshot.
///
/// `seek(k)` positions the cursor so the next `move_next` yields the first
/// key at or past `k` in iteration order (`>= k` forward, `<= k` backward).
#[derive(Debug, Clone)]
pub struct TreeIterator<K, D> {
    tree: Arc<TermTree<K>>,
    position: Position<K>,
    _direction: PhantomData<D>,
}

impl<K: TreeKey, D: IterationDirection> TreeIterator<K, D> {
    pub fn new(tree: Arc<TermTree<K>>) -> Self {
        TreeIterator {
            tree,
            position: Position::Start,
            _direction: PhantomData,
        }
    }

    pub fn reset(&mut self) {
        self.position = Position::Start;
    }

    pub fn seek(&mut self, key: K) {
        self.position = Position::AtOrPast(key);
    }

    pub fn move_next(&mut self) -> Option<(K, TermTreeValue)> {
        let from = match &self.position {
            Position::Start => Bound::Unbounded,
            Position::AtOrPast(key) => Bound::Included(key),
            Position::After(key) => Bound::Excluded(key),
        };
        let (key, value) = D::step(&self.tree.entries, from)?;
        let key = key.clone();
        let value = *value;
        self.position = Position::After(key.clone());
        Some((key, value))
    }

    pub fn tree(&self) -> &TermTree<K> {
        &self.tree
    }
}

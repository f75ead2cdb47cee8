//! Per-kind sort keys.
//!
//! A comparer fetches the keys of a whole batch of entries at once, then the
//! batch is ordered through an index permutation over those keys. Entries
//! with no value for the sort field compare greater than any value.

use std::cmp::Ordering;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::index::names;
use crate::search::matches::QueryMatch;
use crate::search::sorting::spatial::{GeoPoint, SpatialUnits, distance};
use crate::storage::{Lookup, ReadTransaction};

/// Score every entry starts from, so document boosts of entries the inner
/// match does not score still apply.
pub const INITIAL_SCORE: f32 = f32::EPSILON;

/// Bytes of a term used as its fast sort key.
const PREFIX_BYTES: usize = 6;
const PREFIX_MAX: u64 = (1 << (PREFIX_BYTES * 8)) - 1;
const INDEX_BITS: u32 = 16;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Largest batch the packed term sort can address.
pub const MAX_PACKED_BATCH: usize = 1 << INDEX_BITS;

pub trait EntryComparer {
    type Key: Clone;

    /// Push the key of every entry of `entries`, in order, to `keys`.
    fn fetch_keys(
        &mut self,
        matched: &mut dyn QueryMatch,
        entries: &[u64],
        keys: &mut Vec<Self::Key>,
    ) -> Result<()>;

    /// Ascending order of two keys.
    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Stable permutation of `keys` in the requested direction.
    fn sort_permutation(&self, keys: &[Self::Key], ascending: bool, permutation: &mut Vec<usize>) {
        stable_permutation(keys, permutation, |a, b| directed(self.compare(a, b), ascending));
    }
}

pub(crate) fn directed(ordering: Ordering, ascending: bool) -> Ordering {
    if ascending { ordering } else { ordering.reverse() }
}

pub(crate) fn stable_permutation<K>(
    keys: &[K],
    permutation: &mut Vec<usize>,
    mut compare: impl FnMut(&K, &K) -> Ordering,
) {
    permutation.clear();
    permutation.extend(0..keys.len());
    permutation.sort_by(|&a, &b| compare(&keys[a], &keys[b]));
}

fn missing_last<T>(a: &Option<T>, b: &Option<T>, compare: impl FnOnce(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_terms(a: &Option<Vec<u8>>, b: &Option<Vec<u8>>) -> Ordering {
    missing_last(a, b, |a, b| a.cmp(b))
}

/// Natural order: runs of ASCII digits compare by numeric value, everything
/// else byte by byte. Equal strings differing only in leading zeros fall
/// back to byte order.
pub fn alphanumeric_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let end_a = digit_run_end(a, i);
            let end_b = digit_run_end(b, j);
            let num_a = trim_leading_zeros(&a[i..end_a]);
            let num_b = trim_leading_zeros(&b[j..end_b]);
            let ordering = num_a.len().cmp(&num_b.len()).then_with(|| num_a.cmp(num_b));
            if ordering != Ordering::Equal {
                return ordering;
            }
            i = end_a;
            j = end_b;
        } else {
            let ordering = a[i].cmp(&b[j]);
            if ordering != Ordering::Equal {
                return ordering;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j)).then_with(|| a.cmp(b))
}

fn digit_run_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |p| start + p)
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len());
    &digits[first..]
}

/// Sort term of each entry, through the field's term-id lookup and one
/// batched container read.
fn fetch_terms(
    snapshot: &ReadTransaction,
    term_ids: Option<&Lookup>,
    ids: &mut Vec<u64>,
    entries: &[u64],
    keys: &mut Vec<Option<Vec<u8>>>,
) -> Result<()> {
    let Some(term_ids) = term_ids else {
        keys.extend(entries.iter().map(|_| None));
        return Ok(());
    };
    ids.clear();
    ids.extend(
        entries
            .iter()
            .map(|&entry| term_ids.get(entry).map_or(0, |id| id as u64)),
    );
    let mut terms = Vec::with_capacity(ids.len());
    snapshot.containers().get_all(ids, &mut terms)?;
    keys.extend(terms.into_iter().map(|term| term.map(<[u8]>::to_vec)));
    Ok(())
}

fn term_prefix(term: Option<&[u8]>) -> u64 {
    match term {
        None => PREFIX_MAX,
        Some(term) => {
            let mut buf = [0u8; 8];
            let n = term.len().min(PREFIX_BYTES);
            buf[8 - PREFIX_BYTES..8 - PREFIX_BYTES + n].copy_from_slice(&term[..n]);
            BigEndian::read_u64(&buf)
        }
    }
}

/// Orders by the raw bytes of the entry's smallest term in the field.
#[derive(Debug)]
pub struct TermComparer {
    snapshot: ReadTransaction,
    term_ids: Option<Arc<Lookup>>,
    ids: Vec<u64>,
}

impl TermComparer {
    pub fn new(snapshot: &ReadTransaction, field: &str) -> Self {
        TermComparer {
            snapshot: snapshot.clone(),
            term_ids: snapshot.lookup(&names::term_ids(field)),
            ids: Vec::new(),
        }
    }
}

impl EntryComparer for TermComparer {
    type Key = Option<Vec<u8>>;

    fn fetch_keys(&mut self, _: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        fetch_terms(&self.snapshot, self.term_ids.as_deref(), &mut self.ids, entries, keys)
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        compare_terms(a, b)
    }

    /// Sorts packed `prefix << 16 | index` words, then re-sorts only the
    /// groups whose prefixes collide with the full comparator.
    fn sort_permutation(&self, keys: &[Self::Key], ascending: bool, permutation: &mut Vec<usize>) {
        if keys.len() > MAX_PACKED_BATCH {
            stable_permutation(keys, permutation, |a, b| directed(compare_terms(a, b), ascending));
            return;
        }

        let mut packed: Vec<u64> = keys
            .iter()
            .enumerate()
            .map(|(idx, key)| {
                let prefix = term_prefix(key.as_deref());
                let prefix = if ascending { prefix } else { PREFIX_MAX - prefix };
                (prefix << INDEX_BITS) | idx as u64
            })
            .collect();
        packed.sort_unstable();

        permutation.clear();
        let mut start = 0;
        while start < packed.len() {
            let prefix = packed[start] >> INDEX_BITS;
            let mut end = start + 1;
            while end < packed.len() && packed[end] >> INDEX_BITS == prefix {
                end += 1;
            }
            permutation.extend(packed[start..end].iter().map(|p| (p & INDEX_MASK) as usize));
            if end - start > 1 {
                permutation[start..end]
                    .sort_by(|&a, &b| directed(compare_terms(&keys[a], &keys[b]), ascending));
            }
            start = end;
        }
    }
}

/// Natural ("file 2" before "file 10") order of the entry's sort term.
#[derive(Debug)]
pub struct AlphanumericComparer {
    snapshot: ReadTransaction,
    term_ids: Option<Arc<Lookup>>,
    ids: Vec<u64>,
}

impl AlphanumericComparer {
    pub fn new(snapshot: &ReadTransaction, field: &str) -> Self {
        AlphanumericComparer {
            snapshot: snapshot.clone(),
            term_ids: snapshot.lookup(&names::term_ids(field)),
            ids: Vec::new(),
        }
    }
}

impl EntryComparer for AlphanumericComparer {
    type Key = Option<Vec<u8>>;

    fn fetch_keys(&mut self, _: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        fetch_terms(&self.snapshot, self.term_ids.as_deref(), &mut self.ids, entries, keys)
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        missing_last(a, b, |a, b| alphanumeric_cmp(a, b))
    }
}

#[derive(Debug)]
pub struct LongComparer {
    values: Option<Arc<Lookup>>,
}

impl LongComparer {
    pub fn new(snapshot: &ReadTransaction, field: &str) -> Self {
        LongComparer {
            values: snapshot.lookup(&names::long_values(field)),
        }
    }
}

impl EntryComparer for LongComparer {
    type Key = Option<i64>;

    fn fetch_keys(&mut self, _: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        let values = self.values.as_deref();
        keys.extend(entries.iter().map(|&e| values.and_then(|v| v.get(e))));
        Ok(())
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        missing_last(a, b, Ord::cmp)
    }
}

#[derive(Debug)]
pub struct DoubleComparer {
    values: Option<Arc<Lookup>>,
}

impl DoubleComparer {
    pub fn new(snapshot: &ReadTransaction, field: &str) -> Self {
        DoubleComparer {
            values: snapshot.lookup(&names::double_values(field)),
        }
    }
}

impl EntryComparer for DoubleComparer {
    type Key = Option<f64>;

    fn fetch_keys(&mut self, _: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        let values = self.values.as_deref();
        keys.extend(
            entries
                .iter()
                .map(|&e| values.and_then(|v| v.get(e)).map(|bits| f64::from_bits(bits as u64))),
        );
        Ok(())
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        missing_last(a, b, f64::total_cmp)
    }
}

/// Relevance order. Higher scores come first when ascending.
#[derive(Debug)]
pub struct ScoreComparer {
    boosts: Option<Arc<Lookup>>,
}

impl ScoreComparer {
    pub fn new(snapshot: &ReadTransaction) -> Self {
        ScoreComparer {
            boosts: snapshot
                .lookup(names::DOCUMENT_BOOSTS)
                .filter(|boosts| !boosts.is_empty()),
        }
    }
}

impl EntryComparer for ScoreComparer {
    type Key = f32;

    fn fetch_keys(&mut self, matched: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        let start = keys.len();
        keys.resize(start + entries.len(), INITIAL_SCORE);
        let scores = &mut keys[start..];
        matched.score(entries, scores, 1.0)?;

        if let Some(boosts) = &self.boosts {
            for (entry, score) in entries.iter().zip(scores.iter_mut()) {
                if let Some(bits) = boosts.get(*entry) {
                    *score *= f32::from_bits(bits as u32);
                }
            }
        }
        Ok(())
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        b.total_cmp(a)
    }
}

/// Distance from a reference point. Entries without coordinates sort last
/// in either direction.
#[derive(Debug)]
pub struct SpatialComparer {
    latitudes: Option<Arc<Lookup>>,
    longitudes: Option<Arc<Lookup>>,
    center: GeoPoint,
    round: f64,
    units: SpatialUnits,
    ascending: bool,
}

impl SpatialComparer {
    pub fn new(
        snapshot: &ReadTransaction,
        field: &str,
        center: GeoPoint,
        round: f64,
        units: SpatialUnits,
        ascending: bool,
    ) -> Self {
        SpatialComparer {
            latitudes: snapshot.lookup(&names::latitudes(field)),
            longitudes: snapshot.lookup(&names::longitudes(field)),
            center,
            round,
            units,
            ascending,
        }
    }

    fn point(&self, entry: u64) -> Option<GeoPoint> {
        let lat = self.latitudes.as_ref()?.get(entry)?;
        let lon = self.longitudes.as_ref()?.get(entry)?;
        Some(GeoPoint {
            lat: f64::from_bits(lat as u64),
            lon: f64::from_bits(lon as u64),
        })
    }
}

impl EntryComparer for SpatialComparer {
    type Key = f64;

    fn fetch_keys(&mut self, _: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        let missing = if self.ascending { f64::INFINITY } else { f64::NEG_INFINITY };
        keys.extend(entries.iter().map(|&entry| {
            self.point(entry)
                .map_or(missing, |point| distance(&self.center, &point, self.round, self.units))
        }));
        Ok(())
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        a.total_cmp(b)
    }
}

/// Shuffled order that only depends on the seed and the entry id.
#[derive(Debug)]
pub struct RandomComparer {
    seed: u64,
}

impl RandomComparer {
    pub fn new(seed: u64) -> Self {
        RandomComparer { seed }
    }
}

impl EntryComparer for RandomComparer {
    type Key = u64;

    fn fetch_keys(&mut self, _: &mut dyn QueryMatch, entries: &[u64], keys: &mut Vec<Self::Key>) -> Result<()> {
        keys.extend(
            entries
                .iter()
                .map(|&entry| StdRng::seed_from_u64(self.seed ^ entry).random::<u64>()),
        );
        Ok(())
    }

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
        a.cmp(b)
    }
}

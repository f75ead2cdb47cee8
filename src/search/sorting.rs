//! Ordering of query results.
//!
//! [`SortingMatch`] drains its inner match, sorts the entries in batches of
//! `sort_batch_size` (keys fetched per batch, see [`comparers`]) and merges
//! the sorted runs. Its `fill` yields entries in sort order rather than in
//! ascending id order. Ties keep ascending entry id order.

use std::cmp::Ordering;
use std::fmt;

use log::debug;

use crate::error::{Result, TesseraError};
use crate::search::cancellation::CancellationToken;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::{FILL_BATCH_SIZE, QueryCountConfidence, QueryMatch, retain_entries};
use crate::storage::ReadTransaction;

pub mod comparers;
pub mod spatial;

use comparers::{
    AlphanumericComparer, DoubleComparer, EntryComparer, LongComparer, RandomComparer, ScoreComparer,
    SpatialComparer, TermComparer, directed,
};
use spatial::GeoPoint;
pub use spatial::SpatialUnits;

/// What entries are ordered by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortFieldType {
    /// Raw bytes of the smallest term of the field.
    Term,
    Long,
    Double,
    /// Relevance; higher scores first.
    Score,
    /// Natural order of the field's term, digit runs compared numerically.
    Alphanumeric,
    /// Distance between the field's point and a reference point.
    Spatial {
        latitude: f64,
        longitude: f64,
        round: f64,
        units: SpatialUnits,
    },
    /// Seeded shuffle.
    Random { seed: u64 },
}

/// A requested sort: field, kind and direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMetadata {
    /// Sort field; `None` for score and random sorts.
    pub field: Option<String>,
    pub ascending: bool,
    pub field_type: SortFieldType,
}

impl OrderMetadata {
    fn on_field(field: &str, field_type: SortFieldType) -> Self {
        OrderMetadata {
            field: Some(field.to_string()),
            ascending: true,
            field_type,
        }
    }

    pub fn term(field: &str) -> Self {
        Self::on_field(field, SortFieldType::Term)
    }

    pub fn long(field: &str) -> Self {
        Self::on_field(field, SortFieldType::Long)
    }

    pub fn double(field: &str) -> Self {
        Self::on_field(field, SortFieldType::Double)
    }

    pub fn alphanumeric(field: &str) -> Self {
        Self::on_field(field, SortFieldType::Alphanumeric)
    }

    /// Distance of `field`'s point from `(latitude, longitude)`.
    pub fn spatial(field: &str, latitude: f64, longitude: f64, round: f64, units: SpatialUnits) -> Self {
        Self::on_field(
            field,
            SortFieldType::Spatial {
                latitude,
                longitude,
                round,
                units,
            },
        )
    }

    pub fn score() -> Self {
        OrderMetadata {
            field: None,
            ascending: true,
            field_type: SortFieldType::Score,
        }
    }

    pub fn random(seed: u64) -> Self {
        OrderMetadata {
            field: None,
            ascending: true,
            field_type: SortFieldType::Random { seed },
        }
    }

    /// Reverse the direction.
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or_default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let needs_field = !matches!(
            self.field_type,
            SortFieldType::Score | SortFieldType::Random { .. }
        );
        if needs_field && self.field_name().is_empty() {
            return Err(TesseraError::query(format!("sort by {self} requires a field")));
        }
        if let SortFieldType::Spatial {
            latitude,
            longitude,
            round,
            ..
        } = self.field_type
        {
            GeoPoint::new(latitude, longitude)?;
            if !round.is_finite() || round < 0.0 {
                return Err(TesseraError::query(format!(
                    "spatial sort rounding must be a finite non-negative number, got {round}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for OrderMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field_name();
        match self.field_type {
            SortFieldType::Term => write!(f, "{field}")?,
            SortFieldType::Long => write!(f, "{field} as long")?,
            SortFieldType::Double => write!(f, "{field} as double")?,
            SortFieldType::Score => f.write_str("score()")?,
            SortFieldType::Alphanumeric => write!(f, "alphanumeric({field})")?,
            SortFieldType::Spatial {
                latitude,
                longitude,
                round,
                units,
            } => write!(
                f,
                "spatial(point: ({latitude}, {longitude}), round: {round}, units: {units})"
            )?,
            SortFieldType::Random { .. } => f.write_str("Random")?,
        }
        if !self.ascending {
            f.write_str(" desc")?;
        }
        Ok(())
    }
}

/// Entries of an inner match in the requested order.
#[derive(Debug)]
pub struct SortingMatch<M> {
    inner: M,
    order: OrderMetadata,
    snapshot: ReadTransaction,
    batch_size: usize,
    cancellation: CancellationToken,
    sorted: Option<Vec<u64>>,
    /// `sorted`, ascending, for `and_with`.
    members: Vec<u64>,
    position: usize,
}

impl<M: QueryMatch> SortingMatch<M> {
    pub fn new(
        inner: M,
        order: OrderMetadata,
        snapshot: ReadTransaction,
        batch_size: usize,
        cancellation: CancellationToken,
    ) -> Self {
        SortingMatch {
            inner,
            order,
            snapshot,
            batch_size: batch_size.max(1),
            cancellation,
            sorted: None,
            members: Vec::new(),
            position: 0,
        }
    }

    pub fn order(&self) -> &OrderMetadata {
        &self.order
    }

    fn materialize(&mut self) -> Result<()> {
        if self.sorted.is_some() {
            return Ok(());
        }

        let mut entries = Vec::new();
        let mut buffer = vec![0u64; FILL_BATCH_SIZE];
        loop {
            self.cancellation.check("sorting match")?;
            let n = self.inner.fill(&mut buffer)?;
            if n == 0 {
                break;
            }
            entries.extend_from_slice(&buffer[..n]);
        }

        let sorter = BatchSorter {
            batch_size: self.batch_size,
            ascending: self.order.ascending,
            cancellation: &self.cancellation,
        };
        let snapshot = &self.snapshot;
        let field = self.order.field.as_deref().unwrap_or_default();
        let inner = &mut self.inner;

        let sorted = match self.order.field_type {
            SortFieldType::Term => sorter.sort(TermComparer::new(snapshot, field), inner, &entries)?,
            SortFieldType::Long => sorter.sort(LongComparer::new(snapshot, field), inner, &entries)?,
            SortFieldType::Double => sorter.sort(DoubleComparer::new(snapshot, field), inner, &entries)?,
            SortFieldType::Score => sorter.sort(ScoreComparer::new(snapshot), inner, &entries)?,
            SortFieldType::Alphanumeric => {
                sorter.sort(AlphanumericComparer::new(snapshot, field), inner, &entries)?
            }
            SortFieldType::Spatial {
                latitude,
                longitude,
                round,
                units,
            } => {
                let center = GeoPoint::new(latitude, longitude)?;
                let comparer =
                    SpatialComparer::new(snapshot, field, center, round, units, self.order.ascending);
                sorter.sort(comparer, inner, &entries)?
            }
            SortFieldType::Random { seed } => sorter.sort(RandomComparer::new(seed), inner, &entries)?,
        };

        debug!("sorted {} entries by {}", sorted.len(), self.order);
        self.members = entries;
        self.members.sort_unstable();
        self.sorted = Some(sorted);
        Ok(())
    }
}

struct BatchSorter<'a> {
    batch_size: usize,
    ascending: bool,
    cancellation: &'a CancellationToken,
}

impl BatchSorter<'_> {
    fn sort<C: EntryComparer, M: QueryMatch>(&self, mut comparer: C, matched: &mut M, entries: &[u64]) -> Result<Vec<u64>> {
        let mut runs: Vec<Vec<(u64, C::Key)>> = Vec::new();
        let mut keys = Vec::with_capacity(self.batch_size.min(entries.len()));
        let mut permutation = Vec::new();

        for batch in entries.chunks(self.batch_size) {
            self.cancellation.check("sorting match")?;
            keys.clear();
            comparer.fetch_keys(&mut *matched, batch, &mut keys)?;
            comparer.sort_permutation(&keys, self.ascending, &mut permutation);
            runs.push(permutation.iter().map(|&i| (batch[i], keys[i].clone())).collect());
        }

        while runs.len() > 1 {
            self.cancellation.check("sorting match")?;
            let mut merged = Vec::with_capacity(runs.len().div_ceil(2));
            let mut pairs = runs.into_iter();
            while let Some(left) = pairs.next() {
                match pairs.next() {
                    Some(right) => merged.push(self.merge(&comparer, left, right)),
                    None => merged.push(left),
                }
            }
            runs = merged;
        }

        Ok(runs
            .pop()
            .map(|run| run.into_iter().map(|(entry, _)| entry).collect())
            .unwrap_or_default())
    }

    /// Stable merge: on equal keys the left run goes first.
    fn merge<C: EntryComparer>(
        &self,
        comparer: &C,
        left: Vec<(u64, C::Key)>,
        right: Vec<(u64, C::Key)>,
    ) -> Vec<(u64, C::Key)> {
        let mut out = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        loop {
            let take_left = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => directed(comparer.compare(&r.1, &l.1), self.ascending) != Ordering::Less,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            out.extend(if take_left { left.next() } else { right.next() });
        }
        out
    }
}

impl<M: QueryMatch> QueryMatch for SortingMatch<M> {
    fn count(&self) -> u64 {
        match &self.sorted {
            Some(sorted) => sorted.len() as u64,
            None => self.inner.count(),
        }
    }

    fn confidence(&self) -> QueryCountConfidence {
        if self.sorted.is_some() {
            QueryCountConfidence::High
        } else {
            self.inner.confidence()
        }
    }

    fn is_boosting(&self) -> bool {
        self.inner.is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        self.materialize()?;
        let sorted = self.sorted.as_deref().unwrap_or_default();
        let n = (sorted.len() - self.position).min(out.len());
        out[..n].copy_from_slice(&sorted[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        self.materialize()?;
        let members = &self.members;
        Ok(retain_entries(buffer, len, |e| members.binary_search(&e).is_ok()))
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.inner.score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("Sorting")
            .with_parameter("order", &self.order)
            .with_parameter("batch_size", self.batch_size)
            .with_child(self.inner.inspect())
    }
}

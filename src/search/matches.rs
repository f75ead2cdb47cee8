//! Composable query matches.
//!
//! A [`QueryMatch`] is a lazily evaluated set of entry ids. Matches are
//! pulled in batches with [`fill`](QueryMatch::fill) and filtered against
//! each other with [`and_with`](QueryMatch::and_with), which never disturbs
//! the match's own fill position. Unless a match documents otherwise, every
//! `fill` call yields ascending, distinct ids greater than those of the
//! previous call.
//!
//! Matches are stateful iterators: one query execution per thread, each
//! with its own instances.

use std::fmt::Debug;

use crate::error::Result;
use crate::search::inspect::QueryInspectionNode;

pub mod all_entries;
pub mod boolean;
pub mod boosting;
pub mod memoization;
pub mod multi_term;
pub mod term;
pub mod unary;

pub use all_entries::AllEntriesMatch;
pub use boolean::{AndMatch, AndNotMatch, OrMatch};
pub use boosting::BoostingMatch;
pub use memoization::MemoizationMatch;
pub use multi_term::MultiTermMatch;
pub use term::TermMatch;
pub use unary::{UnaryMatch, UnaryMatchOperation};

/// Batch size used when a match drains another one.
pub(crate) const FILL_BATCH_SIZE: usize = 1024;

/// How far [`QueryMatch::count`] can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryCountConfidence {
    /// Loose upper bound.
    Low,
    /// Estimate from exact inputs.
    Normal,
    /// Exact.
    High,
}

/// A set of matching entry ids.
pub trait QueryMatch: Send + Debug {
    /// Number of matches, or an upper bound per [`confidence`](Self::confidence).
    fn count(&self) -> u64;

    fn confidence(&self) -> QueryCountConfidence;

    /// Whether scoring this match produces anything but the baseline.
    fn is_boosting(&self) -> bool {
        false
    }

    /// Write the next matches into `out`, returning how many were written.
    /// Zero means the match is exhausted.
    fn fill(&mut self, out: &mut [u64]) -> Result<usize>;

    /// Keep the entries of `buffer[..len]` (ascending, distinct) that this
    /// match contains, compacted to the front. Returns the new length.
    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize>;

    /// Add this match's relevance, multiplied by `boost_factor`, to the
    /// scores of the given entries.
    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        let _ = (entries, scores, boost_factor);
        Ok(())
    }

    fn inspect(&self) -> QueryInspectionNode;

    /// Drain every remaining match.
    fn collect_all(&mut self) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        let mut buffer = vec![0u64; FILL_BATCH_SIZE];
        loop {
            let n = self.fill(&mut buffer)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buffer[..n]);
        }
    }
}

impl<M: QueryMatch + ?Sized> QueryMatch for Box<M> {
    fn count(&self) -> u64 {
        (**self).count()
    }

    fn confidence(&self) -> QueryCountConfidence {
        (**self).confidence()
    }

    fn is_boosting(&self) -> bool {
        (**self).is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        (**self).fill(out)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        (**self).and_with(buffer, len)
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        (**self).score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        (**self).inspect()
    }
}

/// Matches nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMatch;

impl QueryMatch for EmptyMatch {
    fn count(&self) -> u64 {
        0
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::High
    }

    fn fill(&mut self, _out: &mut [u64]) -> Result<usize> {
        Ok(0)
    }

    fn and_with(&mut self, _buffer: &mut [u64], _len: usize) -> Result<usize> {
        Ok(0)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("Empty")
    }
}

/// Keep the entries of `buffer[..len]` for which `keep` holds, preserving
/// order. Returns the new length.
pub(crate) fn retain_entries(buffer: &mut [u64], len: usize, mut keep: impl FnMut(u64) -> bool) -> usize {
    let mut write = 0;
    for read in 0..len {
        let entry = buffer[read];
        if keep(entry) {
            buffer[write] = entry;
            write += 1;
        }
    }
    write
}

/// Union of two ascending, distinct slices.
pub(crate) fn union_sorted(a: &[u64], b: &[u64], out: &mut Vec<u64>) {
    out.clear();
    out.reserve(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_entries() {
        let mut buffer = [1, 2, 3, 4, 5, 0, 0];
        let len = retain_entries(&mut buffer, 5, |e| e % 2 == 1);
        assert_eq!(&buffer[..len], &[1, 3, 5]);
    }

    #[test]
    fn test_union_sorted() {
        let mut out = Vec::new();
        union_sorted(&[1, 4, 9], &[2, 4, 10, 11], &mut out);
        assert_eq!(out, vec![1, 2, 4, 9, 10, 11]);

        union_sorted(&[], &[3], &mut out);
        assert_eq!(out, vec![3]);
    }

    #[test]
    fn test_empty_match() {
        let mut empty = EmptyMatch;
        assert_eq!(empty.collect_all().unwrap(), Vec::<u64>::new());
        let mut buffer = [1, 2];
        assert_eq!(empty.and_with(&mut buffer, 2).unwrap(), 0);
    }
}

//! Per-entry filters over an inner match.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::index::entry_terms::EntryTermsRecord;
use crate::index::names;
use crate::search::inspect::{QueryInspectionNode, display_term};
use crate::search::matches::{QueryCountConfidence, QueryMatch};
use crate::storage::{Lookup, ReadTransaction};

/// Comparison operators of range and unary queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryMatchOperation {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// The entry holds every one of a list of terms.
    AllIn,
}

impl fmt::Display for UnaryMatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnaryMatchOperation::GreaterThan => "GreaterThan",
            UnaryMatchOperation::GreaterThanOrEqual => "GreaterThanOrEqual",
            UnaryMatchOperation::LessThan => "LessThan",
            UnaryMatchOperation::LessThanOrEqual => "LessThanOrEqual",
            UnaryMatchOperation::AllIn => "AllIn",
        };
        f.write_str(name)
    }
}

/// Entries of an inner match that pass a check against their own indexed
/// terms.
///
/// Each candidate's entry-terms record is read and checked in turn. This is
/// linear in the number of candidates but needs no combinator tree, however
/// many terms are required.
#[derive(Debug)]
pub struct UnaryMatch<M> {
    inner: M,
    operation: UnaryMatchOperation,
    snapshot: ReadTransaction,
    entry_terms: Option<Arc<Lookup>>,
    field: String,
    terms: Vec<Vec<u8>>,
}

impl<M: QueryMatch> UnaryMatch<M> {
    /// Keep the entries of `inner` whose `field` holds all of `terms`.
    pub fn all_in(inner: M, snapshot: ReadTransaction, field: &str, mut terms: Vec<Vec<u8>>) -> Self {
        terms.sort_unstable();
        terms.dedup();
        let entry_terms = snapshot.lookup(names::ENTRY_TERMS);
        UnaryMatch {
            inner,
            operation: UnaryMatchOperation::AllIn,
            snapshot,
            entry_terms,
            field: field.to_string(),
            terms,
        }
    }

    pub fn operation(&self) -> UnaryMatchOperation {
        self.operation
    }

    fn holds_all_terms(&self, entry_id: u64) -> Result<bool> {
        let Some(container) = self.entry_terms.as_ref().and_then(|l| l.get(entry_id)) else {
            return Ok(false);
        };
        let record = EntryTermsRecord::decode(self.snapshot.container(container as u64)?)?;
        Ok(record
            .field(&self.field)
            .is_some_and(|field| self.terms.iter().all(|term| field.contains_term(term))))
    }

    fn filter(&self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let mut write = 0;
        for read in 0..len {
            let entry = buffer[read];
            if self.holds_all_terms(entry)? {
                buffer[write] = entry;
                write += 1;
            }
        }
        Ok(write)
    }
}

impl<M: QueryMatch> QueryMatch for UnaryMatch<M> {
    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::Low
    }

    fn is_boosting(&self) -> bool {
        self.inner.is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        loop {
            let n = self.inner.fill(out)?;
            if n == 0 {
                return Ok(0);
            }
            let kept = self.filter(out, n)?;
            if kept > 0 {
                return Ok(kept);
            }
        }
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let len = self.inner.and_with(buffer, len)?;
        self.filter(buffer, len)
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.inner.score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        let terms: Vec<String> = self.terms.iter().map(|t| display_term(t)).collect();
        QueryInspectionNode::new("Unary")
            .with_parameter("operation", self.operation)
            .with_parameter("field", &self.field)
            .with_parameter("terms", terms.join(", "))
            .with_child(self.inner.inspect())
    }
}

//! Term providers: restartable cursors over a field's term tree that yield
//! the terms matching one query shape.
//!
//! Providers are consumed by [`MultiTermMatch`](crate::search::matches::MultiTermMatch),
//! which unions the postings of every term they yield. They are not thread
//! safe; each query execution owns its providers.

use std::fmt::Debug;

use crate::error::Result;
use crate::search::cancellation::CancellationToken;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::TermMatch;
use crate::storage::{ReadTransaction, TermTreeValue};

pub mod exists;
pub mod in_terms;
pub mod range;
pub mod scan;
pub mod starts_with;

pub use exists::ExistsTermProvider;
pub use in_terms::InTermProvider;
pub use range::{
    DoubleRangeProvider, Exclusive, Inclusive, LongRangeProvider, RangeBound, RangeKey,
    RangeProvider, TermRangeProvider,
};
pub use scan::{ScanTermProvider, TermFilter};
pub use starts_with::StartsWithTermProvider;

/// Snapshot and field a provider reads from.
#[derive(Debug, Clone)]
pub struct TermContext {
    snapshot: ReadTransaction,
    field: String,
    cancellation: CancellationToken,
}

impl TermContext {
    pub fn new(snapshot: ReadTransaction, field: &str, cancellation: CancellationToken) -> Self {
        TermContext {
            snapshot,
            field: field.to_string(),
            cancellation,
        }
    }

    pub fn snapshot(&self) -> &ReadTransaction {
        &self.snapshot
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Open the postings of a term yielded by a provider.
    pub fn term_match(&self, term: Vec<u8>, value: TermTreeValue) -> Result<TermMatch> {
        TermMatch::new(&self.snapshot, &self.field, term, Some(value))
    }
}

/// A lazily advancing sequence of matching terms.
pub trait TermProvider: Send + Debug {
    /// Rewind to the first matching term.
    fn reset(&mut self);

    /// Advance to the next matching term, returning its textual form and
    /// tree value.
    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>>;

    fn context(&self) -> &TermContext;

    fn inspect(&self) -> QueryInspectionNode;

    /// Advance and open the next term's postings.
    fn next(&mut self) -> Result<Option<TermMatch>> {
        match self.next_term()? {
            Some((term, value)) => self.context().term_match(term, value).map(Some),
            None => Ok(None),
        }
    }
}

impl<P: TermProvider + ?Sized> TermProvider for Box<P> {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>> {
        (**self).next_term()
    }

    fn context(&self) -> &TermContext {
        (**self).context()
    }

    fn inspect(&self) -> QueryInspectionNode {
        (**self).inspect()
    }
}

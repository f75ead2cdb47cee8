//! Union of the postings of every term a provider yields.

use log::trace;

use crate::error::Result;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::{QueryCountConfidence, QueryMatch, retain_entries, union_sorted};
use crate::search::providers::TermProvider;

/// Entries of any term produced by `P`.
///
/// The union is built on first use, one term at a time: only the current
/// term's postings and the accumulated result are held in memory. The
/// cancellation token of the provider's context is checked between terms.
#[derive(Debug)]
pub struct MultiTermMatch<P> {
    provider: P,
    upper_bound: u64,
    entries: Option<Vec<u64>>,
    position: usize,
}

impl<P: TermProvider> MultiTermMatch<P> {
    /// `upper_bound` is reported by [`count`](QueryMatch::count) until the
    /// union has been built.
    pub fn new(provider: P, upper_bound: u64) -> Self {
        MultiTermMatch {
            provider,
            upper_bound,
            entries: None,
            position: 0,
        }
    }

    fn materialize(&mut self) -> Result<()> {
        if self.entries.is_some() {
            return Ok(());
        }

        let cancellation = self.provider.context().cancellation().clone();
        let mut accumulated = Vec::new();
        let mut current = Vec::new();
        let mut merged = Vec::new();
        let mut terms = 0usize;

        self.provider.reset();
        while let Some(term) = self.provider.next()? {
            cancellation.check("multi-term match")?;
            current.clear();
            term.append_all(&mut current);
            union_sorted(&accumulated, &current, &mut merged);
            std::mem::swap(&mut accumulated, &mut merged);
            terms += 1;
        }

        trace!(
            "multi-term match on '{}': {terms} terms, {} entries",
            self.provider.context().field(),
            accumulated.len()
        );
        self.entries = Some(accumulated);
        Ok(())
    }

    fn entries(&self) -> &[u64] {
        self.entries.as_deref().unwrap_or_default()
    }
}

impl<P: TermProvider> QueryMatch for MultiTermMatch<P> {
    fn count(&self) -> u64 {
        match &self.entries {
            Some(entries) => entries.len() as u64,
            None => self.upper_bound,
        }
    }

    fn confidence(&self) -> QueryCountConfidence {
        if self.entries.is_some() {
            QueryCountConfidence::High
        } else {
            QueryCountConfidence::Low
        }
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        self.materialize()?;
        let entries = self.entries();
        let n = (entries.len() - self.position).min(out.len());
        out[..n].copy_from_slice(&entries[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        self.materialize()?;
        let entries = self.entries();
        Ok(retain_entries(buffer, len, |e| entries.binary_search(&e).is_ok()))
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.materialize()?;
        let matched = self.entries();
        for (entry, score) in entries.iter().zip(scores.iter_mut()) {
            if matched.binary_search(entry).is_ok() {
                *score += boost_factor;
            }
        }
        Ok(())
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("MultiTerm")
            .with_parameter("count", self.count())
            .with_child(self.provider.inspect())
    }
}

//! Replayable, buffered matches.

use crate::error::Result;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::{QueryCountConfidence, QueryMatch, retain_entries};

/// Drains its inner match once and replays the results in ascending order
/// as often as needed.
#[derive(Debug)]
pub struct MemoizationMatch<M> {
    inner: M,
    results: Option<Vec<u64>>,
    position: usize,
}

impl<M: QueryMatch> MemoizationMatch<M> {
    pub fn new(inner: M) -> Self {
        MemoizationMatch {
            inner,
            results: None,
            position: 0,
        }
    }

    /// All results, ascending.
    pub fn results(&mut self) -> Result<&[u64]> {
        if self.results.is_none() {
            let mut results = self.inner.collect_all()?;
            results.sort_unstable();
            results.dedup();
            self.results = Some(results);
        }
        Ok(self.results.as_deref().unwrap_or_default())
    }

    /// Rewind so the next `fill` starts from the first result again.
    pub fn replay(&mut self) {
        self.position = 0;
    }
}

impl<M: QueryMatch> QueryMatch for MemoizationMatch<M> {
    fn count(&self) -> u64 {
        match &self.results {
            Some(results) => results.len() as u64,
            None => self.inner.count(),
        }
    }

    fn confidence(&self) -> QueryCountConfidence {
        if self.results.is_some() {
            QueryCountConfidence::High
        } else {
            self.inner.confidence()
        }
    }

    fn is_boosting(&self) -> bool {
        self.inner.is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        let position = self.position;
        let results = self.results()?;
        let n = (results.len() - position).min(out.len());
        out[..n].copy_from_slice(&results[position..position + n]);
        self.position += n;
        Ok(n)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let results = self.results()?;
        Ok(retain_entries(buffer, len, |e| results.binary_search(&e).is_ok()))
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.inner.score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("Memoization").with_child(self.inner.inspect())
    }
}

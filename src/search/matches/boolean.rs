//! Boolean combinations of two matches.

use crate::error::Result;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::{
    FILL_BATCH_SIZE, QueryCountConfidence, QueryMatch, retain_entries, union_sorted,
};

/// Entries matched by both sides.
#[derive(Debug)]
pub struct AndMatch<L, R> {
    left: L,
    right: R,
}

impl<L: QueryMatch, R: QueryMatch> AndMatch<L, R> {
    /// Results are pulled from `left` and filtered by `right`, so `left`
    /// should be the smaller side.
    pub fn new(left: L, right: R) -> Self {
        AndMatch { left, right }
    }
}

impl<L: QueryMatch, R: QueryMatch> QueryMatch for AndMatch<L, R> {
    fn count(&self) -> u64 {
        self.left.count().min(self.right.count())
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::Low
    }

    fn is_boosting(&self) -> bool {
        self.left.is_boosting() || self.right.is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        loop {
            let n = self.left.fill(out)?;
            if n == 0 {
                return Ok(0);
            }
            let kept = self.right.and_with(out, n)?;
            if kept > 0 {
                return Ok(kept);
            }
        }
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let len = self.left.and_with(buffer, len)?;
        self.right.and_with(buffer, len)
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.left.score(entries, scores, boost_factor)?;
        self.right.score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("And")
            .with_child(self.left.inspect())
            .with_child(self.right.inspect())
    }
}

/// Buffered read side of an [`OrMatch`].
#[derive(Debug)]
struct Stream<M> {
    inner: M,
    buffer: Vec<u64>,
    pos: usize,
    len: usize,
    exhausted: bool,
}

impl<M: QueryMatch> Stream<M> {
    fn new(inner: M) -> Self {
        Stream {
            inner,
            buffer: Vec::new(),
            pos: 0,
            len: 0,
            exhausted: false,
        }
    }

    fn peek(&mut self) -> Result<Option<u64>> {
        if self.pos == self.len && !self.exhausted {
            if self.buffer.is_empty() {
                self.buffer = vec![0; FILL_BATCH_SIZE];
            }
            self.len = self.inner.fill(&mut self.buffer)?;
            self.pos = 0;
            self.exhausted = self.len == 0;
        }
        Ok((self.pos < self.len).then(|| self.buffer[self.pos]))
    }

    fn advance(&mut self) {
        self.pos += 1;
    }
}

/// Entries matched by either side.
#[derive(Debug)]
pub struct OrMatch<L, R> {
    left: Stream<L>,
    right: Stream<R>,
}

impl<L: QueryMatch, R: QueryMatch> OrMatch<L, R> {
    pub fn new(left: L, right: R) -> Self {
        OrMatch {
            left: Stream::new(left),
            right: Stream::new(right),
        }
    }
}

impl<L: QueryMatch, R: QueryMatch> QueryMatch for OrMatch<L, R> {
    fn count(&self) -> u64 {
        self.left.inner.count().saturating_add(self.right.inner.count())
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::Low
    }

    fn is_boosting(&self) -> bool {
        self.left.inner.is_boosting() || self.right.inner.is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        let mut written = 0;
        while written < out.len() {
            let next = match (self.left.peek()?, self.right.peek()?) {
                (None, None) => break,
                (Some(a), None) => {
                    self.left.advance();
                    a
                }
                (None, Some(b)) => {
                    self.right.advance();
                    b
                }
                (Some(a), Some(b)) => {
                    if a <= b {
                        self.left.advance();
                    }
                    if b <= a {
                        self.right.advance();
                    }
                    a.min(b)
                }
            };
            out[written] = next;
            written += 1;
        }
        Ok(written)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let mut other = buffer[..len].to_vec();
        let left = self.left.inner.and_with(buffer, len)?;
        let right = self.right.inner.and_with(&mut other, len)?;

        let mut merged = Vec::with_capacity(left + right);
        union_sorted(&buffer[..left], &other[..right], &mut merged);
        buffer[..merged.len()].copy_from_slice(&merged);
        Ok(merged.len())
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.left.inner.score(entries, scores, boost_factor)?;
        self.right.inner.score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("Or")
            .with_child(self.left.inner.inspect())
            .with_child(self.right.inner.inspect())
    }
}

/// Entries of `left` that `right` does not match.
#[derive(Debug)]
pub struct AndNotMatch<L, R> {
    left: L,
    right: R,
    scratch: Vec<u64>,
}

impl<L: QueryMatch, R: QueryMatch> AndNotMatch<L, R> {
    pub fn new(left: L, right: R) -> Self {
        AndNotMatch {
            left,
            right,
            scratch: Vec::new(),
        }
    }

    fn exclude(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(&buffer[..len]);
        let excluded = self.right.and_with(&mut self.scratch, len)?;
        let excluded = &self.scratch[..excluded];
        Ok(retain_entries(buffer, len, |entry| {
            excluded.binary_search(&entry).is_err()
        }))
    }
}

impl<L: QueryMatch, R: QueryMatch> QueryMatch for AndNotMatch<L, R> {
    fn count(&self) -> u64 {
        self.left.count()
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::Low
    }

    fn is_boosting(&self) -> bool {
        self.left.is_boosting()
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        loop {
            let n = self.left.fill(out)?;
            if n == 0 {
                return Ok(0);
            }
            let kept = self.exclude(out, n)?;
            if kept > 0 {
                return Ok(kept);
            }
        }
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let len = self.left.and_with(buffer, len)?;
        self.exclude(buffer, len)
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.left.score(entries, scores, boost_factor)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("AndNot")
            .with_child(self.left.inspect())
            .with_child(self.right.inspect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory match over a fixed ascending list, filled `batch` at a time.
    #[derive(Debug)]
    pub(crate) struct ListMatch {
        entries: Vec<u64>,
        pos: usize,
        batch: usize,
    }

    impl ListMatch {
        pub(crate) fn new(entries: &[u64], batch: usize) -> Self {
            ListMatch {
                entries: entries.to_vec(),
                pos: 0,
                batch,
            }
        }
    }

    impl QueryMatch for ListMatch {
        fn count(&self) -> u64 {
            self.entries.len() as u64
        }

        fn confidence(&self) -> QueryCountConfidence {
            QueryCountConfidence::High
        }

        fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
            let n = (self.entries.len() - self.pos).min(out.len()).min(self.batch);
            out[..n].copy_from_slice(&self.entries[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
            Ok(retain_entries(buffer, len, |e| self.entries.binary_search(&e).is_ok()))
        }

        fn inspect(&self) -> QueryInspectionNode {
            QueryInspectionNode::new("List")
        }
    }

    #[test]
    fn test_and() {
        let mut and = AndMatch::new(ListMatch::new(&[1, 2, 3, 5, 8], 2), ListMatch::new(&[2, 3, 4, 8], 1));
        assert_eq!(and.collect_all().unwrap(), vec![2, 3, 8]);
    }

    #[test]
    fn test_and_skips_empty_batches() {
        let mut and = AndMatch::new(ListMatch::new(&[1, 2, 3, 4, 9], 1), ListMatch::new(&[9], 1));
        let mut out = [0u64; 8];
        assert_eq!(and.fill(&mut out).unwrap(), 1);
        assert_eq!(out[0], 9);
        assert_eq!(and.fill(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_or_merges_streams() {
        let mut or = OrMatch::new(ListMatch::new(&[1, 4, 6], 1), ListMatch::new(&[2, 4, 7, 9], 3));
        let mut out = [0u64; 3];
        assert_eq!(or.fill(&mut out).unwrap(), 3);
        assert_eq!(out, [1, 2, 4]);
        assert_eq!(or.collect_all().unwrap(), vec![6, 7, 9]);

        let mut buffer = [1, 2, 3, 7, 10];
        let len = or.and_with(&mut buffer, 5).unwrap();
        assert_eq!(&buffer[..len], &[1, 2, 7]);
    }

    #[test]
    fn test_and_not() {
        let mut and_not = AndNotMatch::new(ListMatch::new(&[1, 2, 3, 4, 5], 2), ListMatch::new(&[1, 2, 4], 8));
        assert_eq!(and_not.collect_all().unwrap(), vec![3, 5]);

        let mut buffer = [2, 3, 6];
        let len = and_not.and_with(&mut buffer, 3).unwrap();
        assert_eq!(&buffer[..len], &[3]);
    }
}

//! Query-level boosts.

use crate::error::Result;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::{QueryCountConfidence, QueryMatch};

/// Scales the relevance contributed by its inner match.
#[derive(Debug)]
pub struct BoostingMatch<M> {
    inner: M,
    boost: f32,
}

impl<M: QueryMatch> BoostingMatch<M> {
    pub fn new(inner: M, boost: f32) -> Self {
        BoostingMatch { inner, boost }
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }
}

impl<M: QueryMatch> QueryMatch for BoostingMatch<M> {
    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn confidence(&self) -> QueryCountConfidence {
        self.inner.confidence()
    }

    fn is_boosting(&self) -> bool {
        true
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        self.inner.fill(out)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        self.inner.and_with(buffer, len)
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        self.inner.score(entries, scores, boost_factor * self.boost)
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("Boost")
            .with_parameter("boost", self.boost)
            .with_child(self.inner.inspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::matches::boolean::tests::ListMatch;
    use crate::search::matches::OrMatch;

    /// Adds the boost factor to every entry it holds.
    #[derive(Debug)]
    struct Scored(ListMatch, Vec<u64>);

    impl QueryMatch for Scored {
        fn count(&self) -> u64 {
            self.0.count()
        }

        fn confidence(&self) -> QueryCountConfidence {
            self.0.confidence()
        }

        fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
            self.0.fill(out)
        }

        fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
            self.0.and_with(buffer, len)
        }

        fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
            for (entry, score) in entries.iter().zip(scores.iter_mut()) {
                if self.1.contains(entry) {
                    *score += boost_factor;
                }
            }
            Ok(())
        }

        fn inspect(&self) -> QueryInspectionNode {
            self.0.inspect()
        }
    }

    #[test]
    fn test_boost_scales_only_its_subtree() {
        let boosted = BoostingMatch::new(Scored(ListMatch::new(&[1], 8), vec![1]), 3.0);
        let plain = Scored(ListMatch::new(&[2], 8), vec![2]);
        let mut or = OrMatch::new(boosted, plain);
        assert!(or.is_boosting());

        let mut scores = [0.0f32; 2];
        or.score(&[1, 2], &mut scores, 1.0).unwrap();
        assert_eq!(scores, [3.0, 1.0]);
    }
}

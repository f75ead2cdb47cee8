//! Range providers over textual and numeric term trees.
//!
//! Bound inclusivity and iteration direction are type parameters, so every
//! combination is compiled into its own loop.

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::Result;
use crate::index::{is_reserved_term, names};
use crate::search::inspect::{QueryInspectionNode, display_term};
use crate::search::providers::{TermContext, TermProvider};
use crate::storage::{DoubleKey, Forward, IterationDirection, TermTreeValue, TreeIterator, TreeKey};

/// Key of a term tree a range can be evaluated over.
pub trait RangeKey: TreeKey {
    /// Name of the tree holding this key type for `field`.
    fn tree_name(field: &str) -> String;

    /// Canonical textual form of the key.
    fn term_bytes(&self) -> Vec<u8>;

    /// Reserved keys never satisfy a range.
    fn is_reserved(&self) -> bool {
        false
    }
}

impl RangeKey for Vec<u8> {
    fn tree_name(field: &str) -> String {
        names::terms(field)
    }

    fn term_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn is_reserved(&self) -> bool {
        is_reserved_term(self)
    }
}

impl RangeKey for i64 {
    fn tree_name(field: &str) -> String {
        names::long_terms(field)
    }

    fn term_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl RangeKey for DoubleKey {
    fn tree_name(field: &str) -> String {
        names::double_terms(field)
    }

    fn term_bytes(&self) -> Vec<u8> {
        self.value().to_string().into_bytes()
    }
}

/// Inclusivity of one end of a range.
pub trait RangeBound: Debug + Default + Copy + Send + Sync + 'static {
    const INCLUSIVE: bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Inclusive;

#[derive(Debug, Default, Clone, Copy)]
pub struct Exclusive;

impl RangeBound for Inclusive {
    const INCLUSIVE: bool = true;
}

impl RangeBound for Exclusive {
    const INCLUSIVE: bool = false;
}

/// Terms between `low` (bound `L`) and `high` (bound `R`), visited in
/// direction `D`. A missing bound leaves that end open.
#[derive(Debug)]
pub struct RangeProvider<K, L, R, D = Forward> {
    context: TermContext,
    iterator: Option<TreeIterator<K, D>>,
    low: Option<K>,
    high: Option<K>,
    empty: bool,
    started: bool,
    done: bool,
    _bounds: PhantomData<(L, R)>,
}

pub type TermRangeProvider<L, R, D = Forward> = RangeProvider<Vec<u8>, L, R, D>;
pub type LongRangeProvider<L, R, D = Forward> = RangeProvider<i64, L, R, D>;
pub type DoubleRangeProvider<L, R, D = Forward> = RangeProvider<DoubleKey, L, R, D>;

impl<K, L, R, D> RangeProvider<K, L, R, D>
where
    K: RangeKey,
    L: RangeBound,
    R: RangeBound,
    D: IterationDirection,
{
    pub fn new(context: TermContext, low: Option<K>, high: Option<K>) -> Self {
        let iterator = context
            .snapshot()
            .tree::<K>(&K::tree_name(context.field()))
            .map(TreeIterator::new);
        let empty = match (&low, &high) {
            (Some(low), Some(high)) => low > high || (low == high && !(L::INCLUSIVE && R::INCLUSIVE)),
            _ => false,
        };
        RangeProvider {
            context,
            iterator,
            low,
            high,
            empty,
            started: false,
            done: empty,
            _bounds: PhantomData,
        }
    }

    fn past_end(&self, key: &K) -> bool {
        if D::IS_FORWARD {
            self.high
                .as_ref()
                .is_some_and(|high| key > high || (key == high && !R::INCLUSIVE))
        } else {
            self.low
                .as_ref()
                .is_some_and(|low| key < low || (key == low && !L::INCLUSIVE))
        }
    }

    fn excluded_start(&self, key: &K) -> bool {
        if D::IS_FORWARD {
            !L::INCLUSIVE && self.low.as_ref() == Some(key)
        } else {
            !R::INCLUSIVE && self.high.as_ref() == Some(key)
        }
    }
}

impl<K, L, R, D> TermProvider for RangeProvider<K, L, R, D>
where
    K: RangeKey,
    L: RangeBound,
    R: RangeBound,
    D: IterationDirection,
{
    fn reset(&mut self) {
        self.started = false;
        self.done = self.empty;
    }

    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>> {
        if self.done {
            return Ok(None);
        }
        let Some(mut iterator) = self.iterator.take() else {
            self.done = true;
            return Ok(None);
        };

        if !self.started {
            self.started = true;
            let start = if D::IS_FORWARD { &self.low } else { &self.high };
            match start {
                Some(key) => iterator.seek(key.clone()),
                None => iterator.reset(),
            }
        }

        let mut found = None;
        while let Some((key, value)) = iterator.move_next() {
            if key.is_reserved() || self.excluded_start(&key) {
                continue;
            }
            if self.past_end(&key) {
                break;
            }
            found = Some((key.term_bytes(), value));
            break;
        }

        self.iterator = Some(iterator);
        self.done = found.is_none();
        Ok(found)
    }

    fn context(&self) -> &TermContext {
        &self.context
    }

    fn inspect(&self) -> QueryInspectionNode {
        let bound = |key: &Option<K>| match key {
            Some(key) => display_term(&key.term_bytes()),
            None => "*".to_string(),
        };
        QueryInspectionNode::new("Range")
            .with_parameter("field", self.context.field())
            .with_parameter("low", bound(&self.low))
            .with_parameter("high", bound(&self.high))
            .with_parameter("low_inclusive", L::INCLUSIVE)
            .with_parameter("high_inclusive", R::INCLUSIVE)
            .with_parameter("forward", D::IS_FORWARD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::NULL_VALUE_TERM;
    use crate::search::cancellation::CancellationToken;
    use crate::storage::{Backward, StorageConfig, StorageEnvironment};
    use proptest::prelude::*;

    fn value() -> TermTreeValue {
        TermTreeValue {
            postings: 4,
            term_id: 0,
        }
    }

    fn long_context(keys: &[i64]) -> TermContext {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let tree = txn.tree_mut::<i64>(&names::long_terms("n"));
        for key in keys {
            tree.insert(*key, value());
        }
        txn.commit().unwrap();
        TermContext::new(env.read_transaction(), "n", CancellationToken::new())
    }

    fn drain<P: TermProvider>(provider: &mut P) -> Vec<String> {
        std::iter::from_fn(|| provider.next_term().unwrap())
            .map(|(term, _)| String::from_utf8(term).unwrap())
            .collect()
    }

    #[test]
    fn test_text_range_skips_reserved_terms() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let tree = txn.tree_mut::<Vec<u8>>(&names::terms("name"));
        for term in [&b"ann"[..], b"bob", b"cid", NULL_VALUE_TERM] {
            tree.insert(term.to_vec(), value());
        }
        txn.commit().unwrap();
        let context = TermContext::new(env.read_transaction(), "name", CancellationToken::new());

        let mut open = TermRangeProvider::<Exclusive, Inclusive>::new(context.clone(), Some(b"ann".to_vec()), None);
        assert_eq!(drain(&mut open), ["bob", "cid"]);

        let mut backward =
            TermRangeProvider::<Inclusive, Inclusive, Backward>::new(context, None, Some(b"bz".to_vec()));
        assert_eq!(drain(&mut backward), ["bob", "ann"]);
        backward.reset();
        assert_eq!(drain(&mut backward), ["bob", "ann"]);
    }

    #[test]
    fn test_long_range_formats_terms() {
        let context = long_context(&[-5, 0, 10, 15, 20]);
        let mut provider = LongRangeProvider::<Inclusive, Exclusive>::new(context, Some(0), Some(15));
        assert_eq!(drain(&mut provider), ["0", "10"]);
    }

    #[test]
    fn test_degenerate_ranges_are_empty() {
        let context = long_context(&[1, 2, 3]);
        let mut provider = LongRangeProvider::<Inclusive, Exclusive>::new(context.clone(), Some(2), Some(2));
        assert!(drain(&mut provider).is_empty());
        let mut provider = LongRangeProvider::<Inclusive, Inclusive>::new(context.clone(), Some(3), Some(1));
        assert!(drain(&mut provider).is_empty());
        let mut provider = LongRangeProvider::<Inclusive, Inclusive>::new(context, Some(2), Some(2));
        assert_eq!(drain(&mut provider), ["2"]);
    }

    #[test]
    fn test_missing_tree_is_empty() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let context = TermContext::new(env.read_transaction(), "nothing", CancellationToken::new());
        let mut provider = DoubleRangeProvider::<Inclusive, Inclusive>::new(context, None, None);
        assert!(drain(&mut provider).is_empty());
    }

    fn expected(keys: &[i64], low: Option<i64>, high: Option<i64>, low_inc: bool, high_inc: bool) -> Vec<String> {
        let mut keys: Vec<i64> = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter()
            .filter(|k| low.is_none_or(|l| if low_inc { *k >= l } else { *k > l }))
            .filter(|k| high.is_none_or(|h| if high_inc { *k <= h } else { *k < h }))
            .map(|k| k.to_string())
            .collect()
    }

    fn run<L: RangeBound, R: RangeBound>(
        context: &TermContext,
        low: Option<i64>,
        high: Option<i64>,
    ) -> (Vec<String>, Vec<String>) {
        let mut forward = LongRangeProvider::<L, R, Forward>::new(context.clone(), low, high);
        let mut backward = LongRangeProvider::<L, R, Backward>::new(context.clone(), low, high);
        (drain(&mut forward), drain(&mut backward))
    }

    proptest! {
        #[test]
        fn prop_range_yields_exactly_the_bounded_terms(
            keys in prop::collection::vec(-50i64..50, 0..40),
            low in prop::option::of(-60i64..60),
            high in prop::option::of(-60i64..60),
            low_inc in any::<bool>(),
            high_inc in any::<bool>(),
        ) {
            let context = long_context(&keys);
            let (forward, backward) = match (low_inc, high_inc) {
                (true, true) => run::<Inclusive, Inclusive>(&context, low, high),
                (true, false) => run::<Inclusive, Exclusive>(&context, low, high),
                (false, true) => run::<Exclusive, Inclusive>(&context, low, high),
                (false, false) => run::<Exclusive, Exclusive>(&context, low, high),
            };

            let want = expected(&keys, low, high, low_inc, high_inc);
            prop_assert_eq!(&forward, &want);
            let mut reversed = want.clone();
            reversed.reverse();
            prop_assert_eq!(&backward, &reversed);
        }
    }
}

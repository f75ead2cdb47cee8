//! Full-scan providers.
//!
//! Suffix, substring and pattern filters cannot use the tree order, so
//! they visit every term of the field. The cost grows with the number of
//! distinct terms, not with the number of matches.

use regex::bytes::Regex;

use crate::error::Result;
use crate::index::{is_reserved_term, names};
use crate::search::inspect::{QueryInspectionNode, display_term};
use crate::search::providers::{TermContext, TermProvider};
use crate::storage::{Forward, TermTreeValue, TreeIterator};

/// Predicate applied to every term of a scan.
#[derive(Debug, Clone)]
pub enum TermFilter {
    EndsWith(Vec<u8>),
    NotEndsWith(Vec<u8>),
    Contains(Vec<u8>),
    Regex(Regex),
}

impl TermFilter {
    pub fn matches(&self, term: &[u8]) -> bool {
        match self {
            TermFilter::EndsWith(suffix) => term.ends_with(suffix),
            TermFilter::NotEndsWith(suffix) => !term.ends_with(suffix),
            TermFilter::Contains(needle) => {
                needle.is_empty() || term.windows(needle.len()).any(|w| w == needle.as_slice())
            }
            TermFilter::Regex(regex) => regex.is_match(term),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TermFilter::EndsWith(_) => "EndsWith",
            TermFilter::NotEndsWith(_) => "NotEndsWith",
            TermFilter::Contains(_) => "Contains",
            TermFilter::Regex(_) => "Regex",
        }
    }

    fn argument(&self) -> String {
        match self {
            TermFilter::EndsWith(v) | TermFilter::NotEndsWith(v) | TermFilter::Contains(v) => {
                display_term(v)
            }
            TermFilter::Regex(regex) => regex.as_str().to_string(),
        }
    }
}

/// Every non-reserved term accepted by a [`TermFilter`], ascending.
#[derive(Debug)]
pub struct ScanTermProvider {
    context: TermContext,
    iterator: Option<TreeIterator<Vec<u8>, Forward>>,
    filter: TermFilter,
}

impl ScanTermProvider {
    pub fn new(context: TermContext, filter: TermFilter) -> Self {
        let iterator = context
            .snapshot()
            .tree::<Vec<u8>>(&names::terms(context.field()))
            .map(TreeIterator::new);
        ScanTermProvider {
            context,
            iterator,
            filter,
        }
    }
}

impl TermProvider for ScanTermProvider {
    fn reset(&mut self) {
        if let Some(iterator) = self.iterator.as_mut() {
            iterator.reset();
        }
    }

    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>> {
        let Some(iterator) = self.iterator.as_mut() else {
            return Ok(None);
        };
        while let Some((term, value)) = iterator.move_next() {
            if !is_reserved_term(&term) && self.filter.matches(&term) {
                return Ok(Some((term, value)));
            }
        }
        Ok(None)
    }

    fn context(&self) -> &TermContext {
        &self.context
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new(self.filter.name())
            .with_parameter("field", self.context.field())
            .with_parameter("value", self.filter.argument())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EMPTY_STRING_TERM;
    use crate::search::cancellation::CancellationToken;
    use crate::storage::{StorageConfig, StorageEnvironment};

    fn context() -> TermContext {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let tree = txn.tree_mut::<Vec<u8>>(&names::terms("name"));
        for term in [&b"alpha"[..], b"beta", b"gamma", b"delta", EMPTY_STRING_TERM] {
            tree.insert(
                term.to_vec(),
                TermTreeValue {
                    postings: 4,
                    term_id: 0,
                },
            );
        }
        txn.commit().unwrap();
        TermContext::new(env.read_transaction(), "name", CancellationToken::new())
    }

    fn terms(filter: TermFilter) -> Vec<String> {
        let mut provider = ScanTermProvider::new(context(), filter);
        std::iter::from_fn(|| provider.next_term().unwrap())
            .map(|(t, _)| String::from_utf8(t).unwrap())
            .collect()
    }

    #[test]
    fn test_filters() {
        assert_eq!(terms(TermFilter::EndsWith(b"ta".to_vec())), ["beta", "delta"]);
        assert_eq!(terms(TermFilter::NotEndsWith(b"ta".to_vec())), ["alpha", "gamma"]);
        assert_eq!(terms(TermFilter::Contains(b"mm".to_vec())), ["gamma"]);
        assert_eq!(terms(TermFilter::Contains(Vec::new())).len(), 4);
        assert_eq!(
            terms(TermFilter::Regex(Regex::new("^[ab]").unwrap())),
            ["alpha", "beta"]
        );
    }
}

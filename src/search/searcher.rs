//! Index searcher: builds matches over one committed snapshot.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use regex::bytes::Regex;
use serde::Serialize;

use crate::analysis::analyzer::AnalyzerBuffers;
use crate::error::{Result, TesseraError};
use crate::index::entry_terms::EntryTermsRecord;
use crate::index::fields::{IndexFieldsMapping, PersistedField, analyze_single_term, load_catalog};
use crate::index::postings::PostingList;
use crate::index::stored::{StoredField, decode_records, read_field};
use crate::index::writer::decode_entry;
use crate::index::{NULL_VALUE_TERM, names};
use crate::search::cancellation::CancellationToken;
use crate::search::config::IndexSearcherConfig;
use crate::search::matches::{
    AllEntriesMatch, AndMatch, AndNotMatch, BoostingMatch, EmptyMatch, MemoizationMatch, MultiTermMatch,
    OrMatch, QueryMatch, TermMatch, UnaryMatch, UnaryMatchOperation,
};
use crate::search::providers::{
    Exclusive, ExistsTermProvider, InTermProvider, Inclusive, RangeKey, RangeProvider, ScanTermProvider,
    StartsWithTermProvider, TermContext, TermFilter, TermProvider,
};
use crate::search::sorting::{OrderMetadata, SortingMatch};
use crate::storage::{DoubleKey, Forward, ReadTransaction, StorageEnvironment, TreeIterator};

/// Term counts up to which `in`/`all in` queries build a balanced tree of
/// binary matches.
const BINARY_TREE_THRESHOLD: usize = 4;

/// Match over several terms; the concrete shape depends on the term count.
pub type BoxedMatch = Box<dyn QueryMatch>;

/// Match over every term a provider yields.
pub type ProviderMatch = MultiTermMatch<Box<dyn TermProvider>>;

/// A value that can bound a range query.
pub trait RangeValue {
    type Key: RangeKey + 'static;

    /// Term tree key of this value for `field`.
    fn into_key(self, searcher: &IndexSearcher, field: &str) -> Result<Self::Key>;
}

impl RangeValue for i64 {
    type Key = i64;

    fn into_key(self, _: &IndexSearcher, _: &str) -> Result<i64> {
        Ok(self)
    }
}

impl RangeValue for f64 {
    type Key = DoubleKey;

    fn into_key(self, _: &IndexSearcher, field: &str) -> Result<DoubleKey> {
        if self.is_nan() {
            return Err(TesseraError::query(format!("NaN is not a valid range bound for field '{field}'")));
        }
        Ok(DoubleKey::new(self))
    }
}

impl RangeValue for &str {
    type Key = Vec<u8>;

    fn into_key(self, searcher: &IndexSearcher, field: &str) -> Result<Vec<u8>> {
        searcher.normalize_term(field, self.as_bytes())
    }
}

/// One entry as seen by [`IndexSearcher::debug_dump`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDump {
    pub entry_id: u64,
    pub key: String,
    pub terms: EntryTermsRecord,
}

/// Read side of an index.
///
/// A searcher pins the snapshot current at construction; writers
/// committing later are not observed. Matches it builds are independent
/// and may be executed on other threads.
pub struct IndexSearcher {
    snapshot: ReadTransaction,
    mapping: Arc<IndexFieldsMapping>,
    config: IndexSearcherConfig,
    buffers: Mutex<AnalyzerBuffers>,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for IndexSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSearcher")
            .field("fields", &self.mapping.len())
            .field("config", &self.config)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

impl IndexSearcher {
    pub fn new(env: &StorageEnvironment, mapping: Arc<IndexFieldsMapping>) -> Self {
        IndexSearcher {
            snapshot: env.read_transaction(),
            mapping,
            config: IndexSearcherConfig::default(),
            buffers: Mutex::new(AnalyzerBuffers::default()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: IndexSearcherConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Use `token` to cancel query construction and execution.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &IndexSearcherConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn snapshot(&self) -> &ReadTransaction {
        &self.snapshot
    }

    pub fn term_context(&self, field: &str) -> TermContext {
        TermContext::new(self.snapshot.clone(), field, self.cancellation.clone())
    }

    /// Turn a query value into the term it was indexed under, using the
    /// field's analyzer when it has one.
    fn normalize_term(&self, field: &str, value: &[u8]) -> Result<Vec<u8>> {
        let analyzer = self
            .mapping
            .get_by_name(field)
            .and_then(|binding| binding.analyzer.as_deref());
        let mut buffers = self.buffers.lock();
        analyze_single_term(field, analyzer, &mut buffers, value)
    }

    /// Like [`normalize_term`](Self::normalize_term), but an empty pattern
    /// stays empty.
    fn normalize_pattern(&self, field: &str, value: &[u8]) -> Result<Vec<u8>> {
        if value.is_empty() {
            return Ok(Vec::new());
        }
        self.normalize_term(field, value)
    }

    fn upper_bound(&self) -> u64 {
        self.number_of_entries()
    }

    fn provider_match(&self, provider: Box<dyn TermProvider>) -> ProviderMatch {
        MultiTermMatch::new(provider, self.upper_bound())
    }

    // ------------------------------------------------------------------
    // Term queries
    // ------------------------------------------------------------------

    /// Entries whose `field` holds `value`.
    pub fn term_query(&self, field: &str, value: impl AsRef<[u8]>) -> Result<TermMatch> {
        let term = self.normalize_term(field, value.as_ref())?;
        self.raw_term_query(field, term)
    }

    fn raw_term_query(&self, field: &str, term: Vec<u8>) -> Result<TermMatch> {
        let value = self
            .snapshot
            .tree::<Vec<u8>>(&names::terms(field))
            .and_then(|tree| tree.get(term.as_slice()));
        TermMatch::new(&self.snapshot, field, term, value)
    }

    /// Entries where `field` was written as null.
    pub fn null_query(&self, field: &str) -> Result<TermMatch> {
        self.raw_term_query(field, NULL_VALUE_TERM.to_vec())
    }

    /// Entries whose `field` holds the long `value`.
    pub fn long_query(&self, field: &str, value: i64) -> Result<TermMatch> {
        let postings = self
            .snapshot
            .tree::<i64>(&names::long_terms(field))
            .and_then(|tree| tree.get(&value));
        TermMatch::new(&self.snapshot, field, value.term_bytes(), postings)
    }

    /// Entries whose `field` holds the double `value`.
    pub fn double_query(&self, field: &str, value: f64) -> Result<TermMatch> {
        let key = value.into_key(self, field)?;
        let postings = self
            .snapshot
            .tree::<DoubleKey>(&names::double_terms(field))
            .and_then(|tree| tree.get(&key));
        TermMatch::new(&self.snapshot, field, key.term_bytes(), postings)
    }

    /// Persisted postings of a term, as indexed.
    pub fn term_postings(&self, field: &str, term: &[u8]) -> Option<PostingList> {
        let value = self.snapshot.tree::<Vec<u8>>(&names::terms(field))?.get(term)?;
        PostingList::unpack(value.postings).ok()
    }

    pub fn number_of_documents_under_specific_term(&self, field: &str, value: impl AsRef<[u8]>) -> Result<u64> {
        let term = self.normalize_term(field, value.as_ref())?;
        match self.term_postings(field, &term) {
            Some(postings) => postings.count(&self.snapshot),
            None => Ok(0),
        }
    }

    // ------------------------------------------------------------------
    // Multi-term queries
    // ------------------------------------------------------------------

    /// Entries holding any of `values`.
    pub fn in_query<V: AsRef<[u8]>>(&self, field: &str, values: &[V]) -> Result<BoxedMatch> {
        let mut terms = values
            .iter()
            .map(|value| self.normalize_term(field, value.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        terms.sort_unstable();
        terms.dedup();

        match terms.len() {
            0 => Ok(Box::new(EmptyMatch)),
            1 => Ok(Box::new(self.raw_term_query(field, terms.remove(0))?)),
            n if n <= BINARY_TREE_THRESHOLD => {
                let matches = terms
                    .into_iter()
                    .map(|term| self.raw_term_query(field, term).map(|m| Box::new(m) as BoxedMatch))
                    .collect::<Result<Vec<_>>>()?;
                Ok(reduce_balanced(matches, |l, r| Box::new(OrMatch::new(l, r))))
            }
            _ => {
                let provider = InTermProvider::new(self.term_context(field), terms);
                Ok(Box::new(self.provider_match(Box::new(provider))))
            }
        }
    }

    /// Entries holding every one of `values`.
    ///
    /// The rarest terms are intersected with a balanced tree of AND matches;
    /// the rest are checked per candidate so the tree depth stays bounded.
    pub fn all_in_query<V: AsRef<[u8]>>(&self, field: &str, values: &[V]) -> Result<BoxedMatch> {
        let mut terms = values
            .iter()
            .map(|value| self.normalize_term(field, value.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        terms.sort_unstable();
        terms.dedup();
        if terms.is_empty() {
            return Ok(Box::new(EmptyMatch));
        }

        let mut counted = Vec::with_capacity(terms.len());
        for term in terms {
            self.cancellation.check("all in query")?;
            let count = match self.term_postings(field, &term) {
                Some(postings) => postings.count(&self.snapshot)?,
                None => 0,
            };
            if count == 0 {
                debug!("all in query on '{field}': a term has no entries");
                return Ok(Box::new(EmptyMatch));
            }
            counted.push((count, term));
        }
        counted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let rest: Vec<Vec<u8>> = counted
            .split_off(counted.len().min(BINARY_TREE_THRESHOLD))
            .into_iter()
            .map(|(_, term)| term)
            .collect();
        let matches = counted
            .into_iter()
            .map(|(_, term)| self.raw_term_query(field, term).map(|m| Box::new(m) as BoxedMatch))
            .collect::<Result<Vec<_>>>()?;
        let tree = reduce_balanced(matches, |l, r| Box::new(AndMatch::new(l, r)));

        if rest.is_empty() {
            return Ok(tree);
        }
        Ok(Box::new(UnaryMatch::all_in(tree, self.snapshot.clone(), field, rest)))
    }

    /// Live entries holding none of `values`.
    pub fn not_in_query<V: AsRef<[u8]>>(&self, field: &str, values: &[V]) -> Result<AndNotMatch<AllEntriesMatch, BoxedMatch>> {
        let excluded = self.in_query(field, values)?;
        Ok(AndNotMatch::new(self.all_entries(), excluded))
    }

    // ------------------------------------------------------------------
    // Range queries
    // ------------------------------------------------------------------

    /// Entries with a value of `field` between `low` and `high`. `left`
    /// must be `GreaterThan` or `GreaterThanOrEqual`, `right` `LessThan` or
    /// `LessThanOrEqual`; a `None` bound leaves that end open.
    pub fn range_query<V: RangeValue>(
        &self,
        field: &str,
        low: Option<V>,
        high: Option<V>,
        left: UnaryMatchOperation,
        right: UnaryMatchOperation,
    ) -> Result<ProviderMatch> {
        let low = low.map(|v| v.into_key(self, field)).transpose()?;
        let high = high.map(|v| v.into_key(self, field)).transpose()?;
        let provider = range_provider(self.term_context(field), low, high, left, right)?;
        Ok(self.provider_match(provider))
    }

    /// Inclusive range.
    pub fn between_query<V: RangeValue>(&self, field: &str, low: V, high: V) -> Result<ProviderMatch> {
        self.range_query(
            field,
            Some(low),
            Some(high),
            UnaryMatchOperation::GreaterThanOrEqual,
            UnaryMatchOperation::LessThanOrEqual,
        )
    }

    pub fn greater_than<V: RangeValue>(&self, field: &str, value: V) -> Result<ProviderMatch> {
        self.range_query(
            field,
            Some(value),
            None,
            UnaryMatchOperation::GreaterThan,
            UnaryMatchOperation::LessThanOrEqual,
        )
    }

    pub fn greater_than_or_equal<V: RangeValue>(&self, field: &str, value: V) -> Result<ProviderMatch> {
        self.range_query(
            field,
            Some(value),
            None,
            UnaryMatchOperation::GreaterThanOrEqual,
            UnaryMatchOperation::LessThanOrEqual,
        )
    }

    pub fn less_than<V: RangeValue>(&self, field: &str, value: V) -> Result<ProviderMatch> {
        self.range_query(
            field,
            None,
            Some(value),
            UnaryMatchOperation::GreaterThanOrEqual,
            UnaryMatchOperation::LessThan,
        )
    }

    pub fn less_than_or_equal<V: RangeValue>(&self, field: &str, value: V) -> Result<ProviderMatch> {
        self.range_query(
            field,
            None,
            Some(value),
            UnaryMatchOperation::GreaterThanOrEqual,
            UnaryMatchOperation::LessThanOrEqual,
        )
    }

    // ------------------------------------------------------------------
    // Term shape queries
    // ------------------------------------------------------------------

    pub fn starts_with(&self, field: &str, prefix: impl AsRef<[u8]>) -> Result<ProviderMatch> {
        let prefix = self.normalize_pattern(field, prefix.as_ref())?;
        let provider = StartsWithTermProvider::new(self.term_context(field), prefix);
        Ok(self.provider_match(Box::new(provider)))
    }

    pub fn ends_with(&self, field: &str, suffix: impl AsRef<[u8]>) -> Result<ProviderMatch> {
        let suffix = self.normalize_pattern(field, suffix.as_ref())?;
        Ok(self.scan(field, TermFilter::EndsWith(suffix)))
    }

    /// Entries with a term of `field` that does not end with `suffix`.
    pub fn not_ends_with(&self, field: &str, suffix: impl AsRef<[u8]>) -> Result<ProviderMatch> {
        let suffix = self.normalize_pattern(field, suffix.as_ref())?;
        Ok(self.scan(field, TermFilter::NotEndsWith(suffix)))
    }

    pub fn contains(&self, field: &str, needle: impl AsRef<[u8]>) -> Result<ProviderMatch> {
        let needle = self.normalize_pattern(field, needle.as_ref())?;
        Ok(self.scan(field, TermFilter::Contains(needle)))
    }

    /// Entries with a term of `field` matched by `pattern`.
    pub fn regex(&self, field: &str, pattern: &str) -> Result<ProviderMatch> {
        let regex = Regex::new(pattern)
            .map_err(|e| TesseraError::query(format!("invalid regex '{pattern}' for field '{field}': {e}")))?;
        Ok(self.scan(field, TermFilter::Regex(regex)))
    }

    fn scan(&self, field: &str, filter: TermFilter) -> ProviderMatch {
        let provider = ScanTermProvider::new(self.term_context(field), filter);
        self.provider_match(Box::new(provider))
    }

    /// Entries with any value in `field`, null and empty values included.
    pub fn exists(&self, field: &str) -> ProviderMatch {
        let provider = ExistsTermProvider::new(self.term_context(field));
        self.provider_match(Box::new(provider))
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    pub fn all_entries(&self) -> AllEntriesMatch {
        AllEntriesMatch::new(&self.snapshot)
    }

    pub fn and<L: QueryMatch, R: QueryMatch>(&self, left: L, right: R) -> Result<AndMatch<L, R>> {
        self.cancellation.check("and")?;
        Ok(AndMatch::new(left, right))
    }

    pub fn or<L: QueryMatch, R: QueryMatch>(&self, left: L, right: R) -> Result<OrMatch<L, R>> {
        self.cancellation.check("or")?;
        Ok(OrMatch::new(left, right))
    }

    pub fn and_not<L: QueryMatch, R: QueryMatch>(&self, left: L, right: R) -> Result<AndNotMatch<L, R>> {
        self.cancellation.check("and not")?;
        Ok(AndNotMatch::new(left, right))
    }

    /// Scale the relevance `inner` contributes to score sorting.
    pub fn boost<M: QueryMatch>(&self, inner: M, boost: f32) -> Result<BoostingMatch<M>> {
        if !boost.is_finite() || boost < 0.0 {
            return Err(TesseraError::query(format!(
                "boost must be a finite non-negative number, got {boost}"
            )));
        }
        Ok(BoostingMatch::new(inner, boost))
    }

    pub fn memoize<M: QueryMatch>(&self, inner: M) -> MemoizationMatch<M> {
        MemoizationMatch::new(inner)
    }

    pub fn order_by<M: QueryMatch>(&self, inner: M, order: OrderMetadata) -> Result<SortingMatch<M>> {
        order.validate()?;
        Ok(SortingMatch::new(
            inner,
            order,
            self.snapshot.clone(),
            self.config.sort_batch_size,
            self.cancellation.clone(),
        ))
    }

    // ------------------------------------------------------------------
    // Entry access
    // ------------------------------------------------------------------

    pub fn number_of_entries(&self) -> u64 {
        self.snapshot
            .lookup(names::ENTRIES)
            .map_or(0, |entries| entries.len() as u64)
    }

    /// Key the entry was indexed under.
    pub fn entry_key(&self, entry_id: u64) -> Result<Option<String>> {
        let Some(container) = self.snapshot.lookup(names::ENTRIES).and_then(|l| l.get(entry_id)) else {
            return Ok(None);
        };
        let (key, _) = decode_entry(self.snapshot.container(container as u64)?)?;
        Ok(Some(key.to_string()))
    }

    /// Stored values of `field`, in the order they were written.
    pub fn stored_values(&self, entry_id: u64, field: &str) -> Result<Option<StoredField>> {
        let Some(container) = self
            .snapshot
            .lookup(names::STORED_FIELDS)
            .and_then(|l| l.get(entry_id))
        else {
            return Ok(None);
        };
        let records = decode_records(self.snapshot.container(container as u64)?)?;
        read_field(&self.snapshot, &records, field)
    }

    /// Terms the entry was indexed under, per field.
    pub fn entry_terms(&self, entry_id: u64) -> Result<Option<EntryTermsRecord>> {
        let Some(container) = self
            .snapshot
            .lookup(names::ENTRY_TERMS)
            .and_then(|l| l.get(entry_id))
        else {
            return Ok(None);
        };
        EntryTermsRecord::decode(self.snapshot.container(container as u64)?).map(Some)
    }

    /// Every entry with its key and terms. Refused above
    /// `max_entries_for_debug_dump` entries.
    pub fn debug_dump(&self) -> Result<Vec<EntryDump>> {
        let total = self.number_of_entries();
        if total > self.config.max_entries_for_debug_dump {
            warn!(
                "debug dump refused: {total} entries exceed the limit of {}",
                self.config.max_entries_for_debug_dump
            );
            return Err(TesseraError::resource_exhausted(format!(
                "debug dump of {total} entries exceeds max_entries_for_debug_dump ({})",
                self.config.max_entries_for_debug_dump
            )));
        }

        let Some(entries) = self.snapshot.lookup(names::ENTRIES) else {
            return Ok(Vec::new());
        };
        let mut dump = Vec::with_capacity(total as usize);
        for (&entry_id, &container) in entries.iter() {
            self.cancellation.check("debug dump")?;
            let (key, _) = decode_entry(self.snapshot.container(container as u64)?)?;
            dump.push(EntryDump {
                entry_id,
                key: key.to_string(),
                terms: self.entry_terms(entry_id)?.unwrap_or_default(),
            });
        }
        Ok(dump)
    }

    pub fn documents_are_boosted(&self) -> bool {
        self.snapshot
            .lookup(names::DOCUMENT_BOOSTS)
            .is_some_and(|boosts| !boosts.is_empty())
    }

    /// Up to `limit` suggestion terms of `field` starting with `prefix`,
    /// most frequent first.
    pub fn suggest(&self, field: &str, prefix: &str, limit: usize) -> Vec<(String, i64)> {
        let Some(tree) = self.snapshot.tree::<Vec<u8>>(&names::suggestions(field)) else {
            return Vec::new();
        };
        let mut iterator = TreeIterator::<Vec<u8>, Forward>::new(tree);
        iterator.seek(prefix.as_bytes().to_vec());

        let mut found = Vec::new();
        while let Some((term, value)) = iterator.move_next() {
            if !term.starts_with(prefix.as_bytes()) {
                break;
            }
            found.push((String::from_utf8_lossy(&term).into_owned(), value.postings));
        }
        found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        found.truncate(limit);
        found
    }

    /// Fields written to the index so far.
    pub fn indexed_fields(&self) -> Result<Vec<PersistedField>> {
        load_catalog(&self.snapshot)
    }
}

/// Pairwise reduce `items` into a balanced tree.
fn reduce_balanced(mut items: Vec<BoxedMatch>, combine: impl Fn(BoxedMatch, BoxedMatch) -> BoxedMatch) -> BoxedMatch {
    while items.len() > 1 {
        let mut next = Vec::with_capacity(items.len().div_ceil(2));
        let mut pairs = items.into_iter();
        while let Some(left) = pairs.next() {
            match pairs.next() {
                Some(right) => next.push(combine(left, right)),
                None => next.push(left),
            }
        }
        items = next;
    }
    items.pop().unwrap_or_else(|| Box::new(EmptyMatch))
}

fn range_provider<K: RangeKey + 'static>(
    context: TermContext,
    low: Option<K>,
    high: Option<K>,
    left: UnaryMatchOperation,
    right: UnaryMatchOperation,
) -> Result<Box<dyn TermProvider>> {
    use UnaryMatchOperation::*;
    Ok(match (left, right) {
        (GreaterThan, LessThan) => Box::new(RangeProvider::<K, Exclusive, Exclusive, Forward>::new(context, low, high)),
        (GreaterThan, LessThanOrEqual) => {
            Box::new(RangeProvider::<K, Exclusive, Inclusive, Forward>::new(context, low, high))
        }
        (GreaterThanOrEqual, LessThan) => {
            Box::new(RangeProvider::<K, Inclusive, Exclusive, Forward>::new(context, low, high))
        }
        (GreaterThanOrEqual, LessThanOrEqual) => {
            Box::new(RangeProvider::<K, Inclusive, Inclusive, Forward>::new(context, low, high))
        }
        (left, right) => {
            return Err(TesseraError::query(format!(
                "unsupported range operators: {left} and {right}"
            )));
        }
    })
}

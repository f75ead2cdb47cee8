//! Per-commit accumulation of terms and their entry modifications.

use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::analyzer::Analyzer;
use crate::index::fields::{FieldIndexingMode, IndexFieldBinding, PersistedField};
use crate::storage::DoubleKey;

/// Term slot used by removals, which are not tied to a pending entry.
pub const NO_SLOT: u32 = u32::MAX;

/// One addition or removal of an entry for a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermEntry {
    pub entry_id: u64,
    /// Index of the entry in the writer's pending list, [`NO_SLOT`] for
    /// removals.
    pub term_slot: u32,
    pub frequency: u16,
    pub removal: bool,
}

/// Ordered modifications of one term's postings collected during a commit.
#[derive(Debug, Clone, Default)]
pub struct EntriesModifications {
    entries: Vec<TermEntry>,
}

impl EntriesModifications {
    /// Record an occurrence of the term in `entry_id`. Back-to-back
    /// additions of the same entry only bump its frequency.
    pub fn add(&mut self, entry_id: u64, term_slot: u32) {
        if let Some(last) = self.entries.last_mut() {
            if !last.removal && last.entry_id == entry_id {
                last.frequency = last.frequency.saturating_add(1);
                return;
            }
        }
        self.entries.push(TermEntry {
            entry_id,
            term_slot,
            frequency: 1,
            removal: false,
        });
    }

    pub fn remove(&mut self, entry_id: u64) {
        self.entries.push(TermEntry {
            entry_id,
            term_slot: NO_SLOT,
            frequency: 0,
            removal: true,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TermEntry] {
        &self.entries
    }

    /// Distinct added entries, ascending.
    pub fn additions(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self
            .entries
            .iter()
            .filter(|e| !e.removal)
            .map(|e| e.entry_id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Distinct removed entries that are not also added, ascending.
    pub fn removals(&self, additions: &[u64]) -> Vec<u64> {
        let mut out: Vec<u64> = self
            .entries
            .iter()
            .filter(|e| e.removal && additions.binary_search(&e.entry_id).is_err())
            .map(|e| e.entry_id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// A field being indexed by the current writer: its options plus the
/// terms accumulated since the writer was opened.
#[derive(Clone)]
pub struct IndexedField {
    pub name: String,
    /// `None` for dynamic fields.
    pub field_id: Option<u32>,
    pub mode: FieldIndexingMode,
    pub analyzer: Option<Arc<dyn Analyzer>>,
    pub should_store: bool,
    pub has_suggestions: bool,
    pub has_multiple_terms: bool,

    textual_index: AHashMap<Vec<u8>, usize>,
    textual: Vec<(Vec<u8>, EntriesModifications)>,
    longs: AHashMap<i64, EntriesModifications>,
    doubles: AHashMap<DoubleKey, EntriesModifications>,
    /// Search mode: entry -> positions in `textual`, in token order.
    entry_to_terms: AHashMap<u64, Vec<u32>>,
    suggestions: AHashMap<Vec<u8>, i64>,
    spatial: Vec<(u64, f64, f64)>,
}

impl std::fmt::Debug for IndexedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedField")
            .field("name", &self.name)
            .field("field_id", &self.field_id)
            .field("mode", &self.mode)
            .field("analyzer", &self.analyzer.as_ref().map(|a| a.name()))
            .field("textual_terms", &self.textual.len())
            .field("long_terms", &self.longs.len())
            .field("double_terms", &self.doubles.len())
            .finish()
    }
}

impl IndexedField {
    pub fn from_binding(binding: &IndexFieldBinding) -> Self {
        let mut field = IndexedField::dynamic(binding.name.clone());
        field.field_id = Some(binding.field_id);
        field.mode = binding.mode;
        field.analyzer = binding.analyzer.clone();
        field.should_store = binding.should_store;
        field.has_suggestions = binding.has_suggestions;
        field
    }

    /// Exact-mode field known only by name.
    pub fn dynamic(name: String) -> Self {
        IndexedField {
            name,
            field_id: None,
            mode: FieldIndexingMode::Exact,
            analyzer: None,
            should_store: false,
            has_suggestions: false,
            has_multiple_terms: false,
            textual_index: AHashMap::new(),
            textual: Vec::new(),
            longs: AHashMap::new(),
            doubles: AHashMap::new(),
            entry_to_terms: AHashMap::new(),
            suggestions: AHashMap::new(),
            spatial: Vec::new(),
        }
    }

    fn textual_slot(&mut self, term: &[u8]) -> usize {
        if let Some(&idx) = self.textual_index.get(term) {
            return idx;
        }
        let idx = self.textual.len();
        self.textual_index.insert(term.to_vec(), idx);
        self.textual.push((term.to_vec(), EntriesModifications::default()));
        idx
    }

    /// Add `term` for `entry_id`, returning the term's position.
    pub fn insert_text(&mut self, entry_id: u64, term_slot: u32, term: &[u8]) -> usize {
        let idx = self.textual_slot(term);
        self.textual[idx].1.add(entry_id, term_slot);
        if self.has_suggestions && !crate::index::is_reserved_term(term) {
            *self.suggestions.entry(term.to_vec()).or_default() += 1;
        }
        idx
    }

    pub fn insert_long(&mut self, entry_id: u64, term_slot: u32, value: i64) {
        self.longs.entry(value).or_default().add(entry_id, term_slot);
    }

    pub fn insert_double(&mut self, entry_id: u64, term_slot: u32, value: f64) {
        self.doubles
            .entry(DoubleKey::new(value))
            .or_default()
            .add(entry_id, term_slot);
    }

    /// Remember that the next token of `entry_id` is the term at `idx`.
    pub fn record_token(&mut self, entry_id: u64, idx: usize) {
        self.entry_to_terms
            .entry(entry_id)
            .or_default()
            .push(idx as u32);
    }

    pub fn remove_text(&mut self, entry_id: u64, term: &[u8]) {
        let idx = self.textual_slot(term);
        self.textual[idx].1.remove(entry_id);
        if self.has_suggestions && !crate::index::is_reserved_term(term) {
            *self.suggestions.entry(term.to_vec()).or_default() -= 1;
        }
    }

    pub fn remove_long(&mut self, entry_id: u64, value: i64) {
        self.longs.entry(value).or_default().remove(entry_id);
    }

    pub fn remove_double(&mut self, entry_id: u64, value: f64) {
        self.doubles
            .entry(DoubleKey::new(value))
            .or_default()
            .remove(entry_id);
    }

    pub fn add_spatial(&mut self, entry_id: u64, latitude: f64, longitude: f64) {
        self.spatial.push((entry_id, latitude, longitude));
    }

    pub fn textual(&self) -> &[(Vec<u8>, EntriesModifications)] {
        &self.textual
    }

    pub fn term(&self, idx: usize) -> &[u8] {
        &self.textual[idx].0
    }

    pub fn longs(&self) -> &AHashMap<i64, EntriesModifications> {
        &self.longs
    }

    pub fn doubles(&self) -> &AHashMap<DoubleKey, EntriesModifications> {
        &self.doubles
    }

    /// Token order of `entry_id` as positions into [`textual`](Self::textual).
    pub fn token_order(&self, entry_id: u64) -> Option<&[u32]> {
        self.entry_to_terms.get(&entry_id).map(Vec::as_slice)
    }

    pub fn suggestions(&self) -> &AHashMap<Vec<u8>, i64> {
        &self.suggestions
    }

    pub fn spatial(&self) -> &[(u64, f64, f64)] {
        &self.spatial
    }

    pub fn is_empty(&self) -> bool {
        self.textual.is_empty()
            && self.longs.is_empty()
            && self.doubles.is_empty()
            && self.spatial.is_empty()
    }

    pub fn to_persisted(&self) -> PersistedField {
        PersistedField {
            name: self.name.clone(),
            field_id: self.field_id,
            mode: self.mode,
            should_store: self.should_store,
            has_suggestions: self.has_suggestions,
            has_multiple_terms: self.has_multiple_terms,
        }
    }
}

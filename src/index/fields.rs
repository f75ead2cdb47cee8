//! Field bindings: how each field of an entry is indexed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::standard::StandardAnalyzer;
use crate::analysis::analyzer::{Analyzer, AnalyzerBuffers};
use crate::error::{Result, TesseraError};
use crate::index::{EMPTY_STRING_TERM, check_value_term, names};
use crate::storage::StoreState;

/// How values of a field become terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldIndexingMode {
    /// The value (optionally normalized by a single-term analyzer) is the term.
    #[default]
    Exact,
    /// The value is tokenized; every token is a term.
    Search,
    /// Not indexed. Values may still be stored.
    No,
}

/// Binding of a field id to its name and indexing options.
#[derive(Clone)]
pub struct IndexFieldBinding {
    /// Stable id used by entry documents.
    pub field_id: u32,
    /// Field name used by queries and storage names.
    pub name: String,
    pub mode: FieldIndexingMode,
    /// Analyzer applied to textual values before indexing.
    pub analyzer: Option<Arc<dyn Analyzer>>,
    /// Whether the original values are kept for retrieval.
    pub should_store: bool,
    /// Whether raw terms feed the field's suggestion tree.
    pub has_suggestions: bool,
}

impl std::fmt::Debug for IndexFieldBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexFieldBinding")
            .field("field_id", &self.field_id)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("analyzer", &self.analyzer.as_ref().map(|a| a.name()))
            .field("should_store", &self.should_store)
            .field("has_suggestions", &self.has_suggestions)
            .finish()
    }
}

impl IndexFieldBinding {
    /// Exact-mode field without analyzer.
    pub fn new<S: Into<String>>(field_id: u32, name: S) -> Self {
        IndexFieldBinding {
            field_id,
            name: name.into(),
            mode: FieldIndexingMode::Exact,
            analyzer: None,
            should_store: false,
            has_suggestions: false,
        }
    }

    /// Search-mode field tokenized with [`StandardAnalyzer`].
    pub fn search<S: Into<String>>(field_id: u32, name: S) -> Self {
        IndexFieldBinding::new(field_id, name)
            .with_mode(FieldIndexingMode::Search)
            .with_analyzer(Arc::new(StandardAnalyzer::new()))
    }

    pub fn with_mode(mut self, mode: FieldIndexingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Set whether values of this field are stored.
    pub fn stored(mut self, stored: bool) -> Self {
        self.should_store = stored;
        self
    }

    /// Set whether this field feeds suggestions.
    pub fn suggestions(mut self, suggestions: bool) -> Self {
        self.has_suggestions = suggestions;
        self
    }
}

/// Normalize `value` into exactly one term.
///
/// Without an analyzer the value is the term. An analyzer producing no
/// token maps to [`EMPTY_STRING_TERM`]; more than one token is a usage
/// error naming the tokens.
pub fn analyze_single_term(
    field: &str,
    analyzer: Option<&dyn Analyzer>,
    buffers: &mut AnalyzerBuffers,
    value: &[u8],
) -> Result<Vec<u8>> {
    let Some(analyzer) = analyzer else {
        if value.is_empty() {
            return Ok(EMPTY_STRING_TERM.to_vec());
        }
        check_value_term(field, value)?;
        return Ok(value.to_vec());
    };

    match buffers.run(analyzer, value)? {
        0 => Ok(EMPTY_STRING_TERM.to_vec()),
        1 => {
            let term = buffers.token_bytes(0);
            check_value_term(field, term)?;
            Ok(term.to_vec())
        }
        count => {
            let tokens: Vec<String> = (0..count)
                .map(|i| String::from_utf8_lossy(buffers.token_bytes(i)).into_owned())
                .collect();
            Err(TesseraError::analysis(format!(
                "field '{field}': analyzer '{}' produced {count} tokens where a single term is required: [{}]",
                analyzer.name(),
                tokens.join(", ")
            )))
        }
    }
}

/// The set of known fields of an index, addressable by id and by name.
#[derive(Debug, Clone, Default)]
pub struct IndexFieldsMapping {
    bindings: Vec<IndexFieldBinding>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl IndexFieldsMapping {
    pub fn new() -> Self {
        IndexFieldsMapping::default()
    }

    /// Add a field. Ids and names must be unique and names non-empty.
    pub fn add(&mut self, binding: IndexFieldBinding) -> Result<()> {
        if binding.name.is_empty() {
            return Err(TesseraError::field("Field name cannot be empty"));
        }
        if self.by_id.contains_key(&binding.field_id) {
            return Err(TesseraError::field(format!(
                "Field id {} already exists",
                binding.field_id
            )));
        }
        if self.by_name.contains_key(&binding.name) {
            return Err(TesseraError::field(format!(
                "Field '{}' already exists",
                binding.name
            )));
        }

        let idx = self.bindings.len();
        self.by_id.insert(binding.field_id, idx);
        self.by_name.insert(binding.name.clone(), idx);
        self.bindings.push(binding);
        Ok(())
    }

    pub fn get(&self, field_id: u32) -> Option<&IndexFieldBinding> {
        self.by_id.get(&field_id).map(|i| &self.bindings[*i])
    }

    pub fn get_by_name(&self, name: &str) -> Option<&IndexFieldBinding> {
        self.by_name.get(name).map(|i| &self.bindings[*i])
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, IndexFieldBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Catalog record of a field that has been written to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedField {
    pub name: String,
    /// `None` for dynamic fields.
    pub field_id: Option<u32>,
    pub mode: FieldIndexingMode,
    pub should_store: bool,
    pub has_suggestions: bool,
    /// Some entry produced more than one term for this field.
    pub has_multiple_terms: bool,
}

/// Read the field catalog of a snapshot; empty when nothing was committed.
pub fn load_catalog(state: &StoreState) -> Result<Vec<PersistedField>> {
    match state.metadata(names::FIELDS_CATALOG) {
        Some(bytes) => Ok(bincode::deserialize(bytes)?),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn encode_catalog(fields: &[PersistedField]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(fields)?)
}

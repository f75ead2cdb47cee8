//! Index writer implementation.
//!
//! One [`IndexWriter`] owns one write transaction. Entries are indexed into
//! per-field term buffers and only reach the term trees when
//! [`commit`](IndexWriter::commit) runs; dropping the writer or calling
//! [`rollback`](IndexWriter::rollback) discards everything.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::{debug, info};

use crate::analysis::analyzer::AnalyzerBuffers;
use crate::document::entry::IndexEntryReader;
use crate::error::{Result, TesseraError};
use crate::index::builder::IndexEntryBuilder;
use crate::index::config::{IndexWriterConfig, WriterStats};
use crate::index::entry_terms::EntryTermsRecord;
use crate::index::fields::{IndexFieldsMapping, PersistedField, encode_catalog, load_catalog};
use crate::index::merger::{TermMerger, prepare_fields};
use crate::index::names;
use crate::index::postings::validate_entry_id;
use crate::index::stored::decode_records;
use crate::index::term_buffer::{IndexedField, NO_SLOT};
use crate::storage::{StorageEnvironment, StoreState, TermTreeValue, WriteTransaction};
use crate::util::varint::{VarIntCursor, encode_bytes};

// ============================================================================
// Index writer
// ============================================================================

/// Writer for one batch of index changes.
pub struct IndexWriter {
    /// The write transaction all changes go through.
    pub(super) txn: WriteTransaction,

    /// Known fields of the index.
    pub(super) mapping: Arc<IndexFieldsMapping>,

    /// Writer configuration.
    config: IndexWriterConfig,

    /// Fields touched by this writer, mapped ones first.
    pub(super) fields: Vec<IndexedField>,
    by_id: AHashMap<u32, usize>,
    by_name: AHashMap<String, usize>,

    /// Field catalog as of the start of the transaction.
    catalog: Vec<PersistedField>,

    /// Analyzer buffers shared by every field and entry.
    pub(super) buffers: AnalyzerBuffers,

    /// Entries indexed by this writer; the position is the entry's term slot.
    pending: Vec<u64>,
    pending_ids: AHashSet<u64>,

    /// Entries deleted by this writer.
    deleted: AHashSet<u64>,

    /// Writer statistics.
    pub(super) stats: WriterStats,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("config", &self.config)
            .field("fields", &self.fields.len())
            .field("pending_entries", &self.pending.len())
            .field("deleted_entries", &self.deleted.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open a writer, waiting for any other writer of `env` to finish.
    pub fn new(
        env: &StorageEnvironment,
        mapping: Arc<IndexFieldsMapping>,
        config: IndexWriterConfig,
    ) -> Result<Self> {
        let txn = env.write_transaction();
        let catalog = load_catalog(&txn)?;

        let mut fields = Vec::with_capacity(mapping.len());
        let mut by_id = AHashMap::new();
        let mut by_name = AHashMap::new();
        for binding in mapping.iter() {
            let mut field = IndexedField::from_binding(binding);
            if let Some(persisted) = catalog.iter().find(|p| p.name == binding.name) {
                field.has_multiple_terms = persisted.has_multiple_terms;
            }
            by_id.insert(binding.field_id, fields.len());
            by_name.insert(binding.name.clone(), fields.len());
            fields.push(field);
        }

        let buffers = AnalyzerBuffers::with_capacity(
            config.initial_words_buffer_size,
            config.initial_tokens_buffer_size,
        );

        Ok(IndexWriter {
            txn,
            mapping,
            config,
            fields,
            by_id,
            by_name,
            catalog,
            buffers,
            pending: Vec::new(),
            pending_ids: AHashSet::new(),
            deleted: AHashSet::new(),
            stats: WriterStats::default(),
        })
    }

    pub fn config(&self) -> &IndexWriterConfig {
        &self.config
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Index an entry under a freshly allocated entry id.
    pub fn index(&mut self, key: &str, data: &[u8]) -> Result<u64> {
        let entry_id = self.txn.allocate_entry_id();
        self.index_entry(entry_id, key, data)
    }

    /// Index `data` (an [`IndexEntryWriter`](crate::document::entry::IndexEntryWriter)
    /// image) under `entry_id`.
    pub fn index_entry(&mut self, entry_id: u64, key: &str, data: &[u8]) -> Result<u64> {
        let reader = IndexEntryReader::new(data)?;
        let mut builder = self.entry_builder(entry_id, key, data)?;
        builder.write_document(&reader)?;
        builder.finish()
    }

    /// Start an entry whose fields the caller writes one by one.
    pub fn entry_builder(
        &mut self,
        entry_id: u64,
        key: &str,
        data: &[u8],
    ) -> Result<IndexEntryBuilder<'_>> {
        validate_entry_id(entry_id)?;
        if self.pending_ids.contains(&entry_id) {
            return Err(TesseraError::invalid_operation(format!(
                "entry {entry_id} was already indexed by this writer"
            )));
        }
        let exists = self
            .txn
            .lookup(names::ENTRIES)
            .is_some_and(|l| l.get(entry_id).is_some());
        if exists {
            return Err(TesseraError::invalid_operation(format!(
                "entry {entry_id} is already indexed; delete it first"
            )));
        }

        let term_slot = u32::try_from(self.pending.len())
            .ok()
            .filter(|slot| *slot != NO_SLOT)
            .ok_or_else(|| TesseraError::resource_exhausted("too many entries in one batch"))?;

        let mut record = Vec::with_capacity(key.len() + data.len() + 4);
        encode_bytes(key.as_bytes(), &mut record);
        record.extend_from_slice(data);
        let container = self.txn.allocate(&record);
        self.txn
            .lookup_mut(names::ENTRIES)
            .insert(entry_id, container as i64);
        self.txn.reserve_entry_id(entry_id);

        self.pending.push(entry_id);
        self.pending_ids.insert(entry_id);
        Ok(IndexEntryBuilder::new(self, entry_id, term_slot))
    }

    /// Remove a committed entry. Returns `false` when the entry does not
    /// exist or was already deleted by this writer.
    pub fn try_delete_entry(&mut self, entry_id: u64) -> Result<bool> {
        if self.pending_ids.contains(&entry_id) {
            return Err(TesseraError::invalid_operation(format!(
                "entry {entry_id} was indexed by this writer and cannot be deleted before commit"
            )));
        }
        if self.deleted.contains(&entry_id) {
            return Ok(false);
        }
        let Some(container) = take_lookup(&mut self.txn, names::ENTRIES, entry_id) else {
            return Ok(false);
        };
        self.txn.delete_container(container as u64)?;

        if let Some(container) = take_lookup(&mut self.txn, names::ENTRY_TERMS, entry_id) {
            let record = EntryTermsRecord::decode(self.txn.container(container as u64)?)?;
            self.txn.delete_container(container as u64)?;
            for terms in &record.fields {
                let idx = self.field_index_by_name(&terms.field)?;
                let field = &mut self.fields[idx];
                for (term, _) in &terms.terms {
                    field.remove_text(entry_id, term);
                }
                for value in &terms.longs {
                    field.remove_long(entry_id, *value);
                }
                for value in &terms.doubles {
                    field.remove_double(entry_id, *value);
                }
            }
        }

        if let Some(container) = take_lookup(&mut self.txn, names::STORED_FIELDS, entry_id) {
            let records = decode_records(self.txn.container(container as u64)?)?;
            for record in records.iter().filter(|r| r.container != 0) {
                self.txn.delete_container(record.container)?;
            }
            self.txn.delete_container(container as u64)?;
        }
        take_lookup(&mut self.txn, names::DOCUMENT_BOOSTS, entry_id);

        let mut field_names: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        field_names.extend(self.catalog.iter().map(|p| p.name.clone()));
        field_names.sort_unstable();
        field_names.dedup();
        for name in &field_names {
            for lookup in [
                names::term_ids(name),
                names::long_values(name),
                names::double_values(name),
                names::latitudes(name),
                names::longitudes(name),
            ] {
                take_lookup(&mut self.txn, &lookup, entry_id);
            }
        }

        self.deleted.insert(entry_id);
        self.stats.entries_deleted += 1;
        debug!("deleted entry {entry_id}");
        Ok(true)
    }

    /// Merge all buffered changes and commit the transaction.
    pub fn commit(self) -> Result<WriterStats> {
        let IndexWriter {
            mut txn,
            config,
            fields,
            mut catalog,
            pending,
            mut stats,
            ..
        } = self;

        let prepared = prepare_fields(&fields, config.parallel_sort_threshold);
        {
            let mut merger = TermMerger::new(&mut txn, config.small_postings_capacity, &mut stats);
            for field in &prepared {
                merger.merge_field(field)?;
            }
        }

        write_entry_records(&mut txn, &fields, &pending)?;
        for field in &fields {
            write_spatial(&mut txn, field);
            write_suggestions(&mut txn, field);
        }

        for field in fields.iter().filter(|f| !f.is_empty() || f.field_id.is_some()) {
            let persisted = field.to_persisted();
            match catalog.iter_mut().find(|p| p.name == persisted.name) {
                Some(existing) => {
                    let has_multiple_terms = existing.has_multiple_terms || persisted.has_multiple_terms;
                    *existing = persisted;
                    existing.has_multiple_terms = has_multiple_terms;
                }
                None => catalog.push(persisted),
            }
        }
        catalog.sort_by(|a, b| a.name.cmp(&b.name));
        txn.set_metadata(names::FIELDS_CATALOG, encode_catalog(&catalog)?);

        txn.commit()?;
        info!(
            "committed {} entries ({} deleted): {} terms added, {} updated, {} removed",
            stats.entries_indexed,
            stats.entries_deleted,
            stats.terms_added,
            stats.terms_updated,
            stats.terms_removed
        );
        Ok(stats)
    }

    /// Discard all changes.
    pub fn rollback(self) {
        debug!(
            "rolling back writer with {} pending entries",
            self.pending.len()
        );
        self.txn.rollback();
    }

    pub(crate) fn field_index(&self, field_id: u32) -> Result<usize> {
        self.by_id
            .get(&field_id)
            .copied()
            .ok_or_else(|| TesseraError::field(format!("Unknown field id {field_id}")))
    }

    /// Index of the field called `name`, creating a dynamic field on first
    /// use.
    pub(crate) fn field_index_by_name(&mut self, name: &str) -> Result<usize> {
        if let Some(&idx) = self.by_name.get(name) {
            return Ok(idx);
        }
        if name.is_empty() {
            return Err(TesseraError::field("Field name cannot be empty"));
        }

        let mut field = IndexedField::dynamic(name.to_string());
        if let Some(persisted) = self.catalog.iter().find(|p| p.name == name) {
            field.mode = persisted.mode;
            field.should_store = persisted.should_store;
            field.has_suggestions = persisted.has_suggestions;
            field.has_multiple_terms = persisted.has_multiple_terms;
        }
        let idx = self.fields.len();
        self.fields.push(field);
        self.by_name.insert(name.to_string(), idx);
        Ok(idx)
    }
}

/// Remove `entry_id` from a lookup, if both exist.
fn take_lookup(txn: &mut WriteTransaction, name: &str, entry_id: u64) -> Option<i64> {
    txn.lookup(name)?.get(entry_id)?;
    txn.lookup_mut(name).remove(entry_id)
}

/// Write the entry-terms record of every pending entry, and the per-field
/// sort lookups derived from it.
fn write_entry_records(txn: &mut StoreState, fields: &[IndexedField], pending: &[u64]) -> Result<()> {
    let mut records = vec![EntryTermsRecord::default(); pending.len()];

    for field in fields {
        for (term, mods) in field.textual() {
            for entry in mods.entries().iter().filter(|e| !e.removal) {
                records[entry.term_slot as usize]
                    .field_mut(&field.name)
                    .terms
                    .push((term.clone(), entry.frequency));
            }
        }
        for (value, mods) in field.longs() {
            for entry in mods.entries().iter().filter(|e| !e.removal) {
                records[entry.term_slot as usize]
                    .field_mut(&field.name)
                    .longs
                    .push(*value);
            }
        }
        for (value, mods) in field.doubles() {
            for entry in mods.entries().iter().filter(|e| !e.removal) {
                records[entry.term_slot as usize]
                    .field_mut(&field.name)
                    .doubles
                    .push(value.value());
            }
        }
    }

    for (slot, record) in records.iter_mut().enumerate() {
        let entry_id = pending[slot];
        record.normalize();

        for field in fields {
            if let Some(order) = field.token_order(entry_id) {
                record
                    .field_mut(&field.name)
                    .set_token_order(order.iter().map(|pos| field.term(*pos as usize)));
            }
        }

        for terms in &record.fields {
            if let Some((term, _)) = terms.terms.first() {
                let tree = txn.tree::<Vec<u8>>(&names::terms(&terms.field));
                let term_id = tree.and_then(|t| t.get(term.as_slice())).map(|v| v.term_id);
                if let Some(term_id) = term_id {
                    txn.lookup_mut(&names::term_ids(&terms.field))
                        .insert(entry_id, term_id as i64);
                }
            }
            if let Some(value) = terms.longs.first() {
                txn.lookup_mut(&names::long_values(&terms.field))
                    .insert(entry_id, *value);
            }
            if let Some(value) = terms.doubles.first() {
                txn.lookup_mut(&names::double_values(&terms.field))
                    .insert(entry_id, value.to_bits() as i64);
            }
        }

        let container = txn.allocate(&record.encode());
        txn.lookup_mut(names::ENTRY_TERMS)
            .insert(entry_id, container as i64);
    }
    Ok(())
}

fn write_spatial(txn: &mut StoreState, field: &IndexedField) {
    if field.spatial().is_empty() {
        return;
    }
    let latitudes = names::latitudes(&field.name);
    let longitudes = names::longitudes(&field.name);
    for &(entry_id, latitude, longitude) in field.spatial() {
        txn.lookup_mut(&latitudes)
            .insert(entry_id, latitude.to_bits() as i64);
        txn.lookup_mut(&longitudes)
            .insert(entry_id, longitude.to_bits() as i64);
    }
}

/// Suggestion trees keep each raw term's occurrence count in the postings
/// slot.
fn write_suggestions(txn: &mut StoreState, field: &IndexedField) {
    if field.suggestions().is_empty() {
        return;
    }
    let tree = txn.tree_mut::<Vec<u8>>(&names::suggestions(&field.name));
    for (term, delta) in field.suggestions() {
        let count = tree.get(term.as_slice()).map_or(0, |v| v.postings) + delta;
        if count > 0 {
            tree.insert(
                term.clone(),
                TermTreeValue {
                    postings: count,
                    term_id: 0,
                },
            );
        } else {
            tree.remove(term.as_slice());
        }
    }
}

/// Split an entries container into the entry key and its document bytes.
pub(crate) fn decode_entry(bytes: &[u8]) -> Result<(&str, &[u8])> {
    let mut cursor = VarIntCursor::new(bytes);
    let key = std::str::from_utf8(cursor.read_bytes()?)
        .map_err(|e| TesseraError::format(format!("entry key is not UTF-8: {e}")))?;
    Ok((key, &bytes[cursor.position()..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::entry::{FieldValue, IndexEntryWriter};
    use crate::index::fields::IndexFieldBinding;
    use crate::storage::StorageConfig;

    fn setup() -> (StorageEnvironment, Arc<IndexFieldsMapping>) {
        let mut mapping = IndexFieldsMapping::new();
        mapping.add(IndexFieldBinding::new(0, "status")).unwrap();
        mapping
            .add(IndexFieldBinding::search(1, "body").stored(true))
            .unwrap();
        (StorageEnvironment::new(StorageConfig::default()), Arc::new(mapping))
    }

    fn doc(status: &str, body: &str) -> Vec<u8> {
        let mut writer = IndexEntryWriter::new();
        writer.write(0, FieldValue::Text(status.as_bytes())).unwrap();
        writer.write(1, FieldValue::Text(body.as_bytes())).unwrap();
        writer.finish()
    }

    #[test]
    fn test_entry_record_and_lookups() {
        let (env, mapping) = setup();
        let mut writer = IndexWriter::new(&env, mapping, IndexWriterConfig::default()).unwrap();
        let id = writer.index("docs/1", &doc("active", "The quick fox, the end")).unwrap();
        let stats = writer.commit().unwrap();
        assert_eq!(stats.entries_indexed, 1);

        let snapshot = env.read_transaction();
        let container = snapshot.lookup(names::ENTRY_TERMS).unwrap().get(id).unwrap();
        let record = EntryTermsRecord::decode(snapshot.container(container as u64).unwrap()).unwrap();

        let body = record.field("body").unwrap();
        assert_eq!(body.terms.len(), 4);
        assert_eq!(
            body.terms.iter().find(|(t, _)| t == b"the").map(|(_, f)| *f),
            Some(2)
        );
        let tokens: Vec<&[u8]> = body.tokens().collect();
        assert_eq!(tokens, vec![&b"the"[..], b"quick", b"fox", b"the", b"end"]);

        let entry = snapshot.lookup(names::ENTRIES).unwrap().get(id).unwrap();
        let (key, _) = decode_entry(snapshot.container(entry as u64).unwrap()).unwrap();
        assert_eq!(key, "docs/1");

        let catalog = load_catalog(&snapshot).unwrap();
        assert!(catalog.iter().any(|f| f.name == "body" && f.has_multiple_terms));
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let (env, mapping) = setup();
        let mut writer = IndexWriter::new(&env, mapping, IndexWriterConfig::default()).unwrap();
        writer.index_entry(7, "a", &doc("x", "y")).unwrap();
        let err = writer.index_entry(7, "a", &doc("x", "y")).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidOperation(_)));
        assert!(writer.try_delete_entry(7).is_err());
        assert!(writer.index_entry(0, "zero", &doc("x", "y")).is_err());
    }

    #[test]
    fn test_rollback_leaves_store_untouched() {
        let (env, mapping) = setup();
        let mut writer = IndexWriter::new(&env, mapping, IndexWriterConfig::default()).unwrap();
        writer.index("a", &doc("x", "y")).unwrap();
        writer.rollback();

        let snapshot = env.read_transaction();
        assert!(snapshot.lookup(names::ENTRIES).is_none());
        assert!(snapshot.tree::<Vec<u8>>(&names::terms("status")).is_none());
    }

    #[test]
    fn test_unknown_field_id() {
        let (env, mapping) = setup();
        let mut writer = IndexWriter::new(&env, mapping, IndexWriterConfig::default()).unwrap();
        let mut builder = writer.entry_builder(1, "a", &[]).unwrap();
        let err = builder.write(42, b"v").unwrap_err();
        assert_eq!(err.to_string(), "Field error: Unknown field id 42");
    }
}

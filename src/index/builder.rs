//! Write-side facade for one entry.
//!
//! An [`IndexEntryBuilder`] is borrowed from the [`IndexWriter`] for a
//! single entry. Each write normalizes or analyzes the value into terms for
//! the field's term buffer and, for stored fields, keeps the original value.
//! Values written between [`increment_list`](IndexEntryBuilder::increment_list)
//! and [`decrement_list`](IndexEntryBuilder::decrement_list) are tagged as
//! list members so retrieval can rebuild the array.

use std::sync::Arc;

use crate::document::entry::{EntryReader, FieldValue};
use crate::document::field_type::IndexEntryFieldType;
use crate::error::{Result, TesseraError};
use crate::index::fields::{FieldIndexingMode, analyze_single_term};
use crate::index::stored::{StoredFieldRecord, StoredFieldType, encode_records, encode_tuple, make_tag};
use crate::index::writer::IndexWriter;
use crate::index::{EMPTY_STRING_TERM, NULL_VALUE_TERM, check_value_term, names};

/// Builder for the fields of one entry. Call [`finish`](Self::finish) once
/// all fields are written.
#[derive(Debug)]
pub struct IndexEntryBuilder<'w> {
    writer: &'w mut IndexWriter,
    entry_id: u64,
    term_slot: u32,
    building_list: u32,
    sequence: u32,
    stored: Vec<StoredFieldRecord>,
    boost: Option<f32>,
}

impl<'w> IndexEntryBuilder<'w> {
    pub(crate) fn new(writer: &'w mut IndexWriter, entry_id: u64, term_slot: u32) -> Self {
        IndexEntryBuilder {
            writer,
            entry_id,
            term_slot,
            building_list: 0,
            sequence: 0,
            stored: Vec::new(),
            boost: None,
        }
    }

    pub fn entry_id(&self) -> u64 {
        self.entry_id
    }

    /// Set the document boost used by score sorting.
    pub fn boost(&mut self, boost: f32) -> Result<&mut Self> {
        if !boost.is_finite() || boost < 0.0 {
            return Err(TesseraError::invalid_operation(format!(
                "document boost must be a finite non-negative number, got {boost}"
            )));
        }
        self.boost = Some(boost);
        Ok(self)
    }

    /// Enter list context.
    pub fn increment_list(&mut self) {
        self.building_list += 1;
    }

    /// Leave list context.
    pub fn decrement_list(&mut self) -> Result<()> {
        if self.building_list == 0 {
            return Err(TesseraError::invalid_operation(
                "decrement_list called outside of a list",
            ));
        }
        self.building_list -= 1;
        Ok(())
    }

    /// Write a textual value.
    pub fn write(&mut self, field_id: u32, value: &[u8]) -> Result<()> {
        let idx = self.writer.field_index(field_id)?;
        self.write_text(idx, value)
    }

    /// Write a textual value to a field known only by name. The field is
    /// created in exact mode on first use.
    pub fn write_dynamic(&mut self, name: &str, value: &[u8]) -> Result<()> {
        let idx = self.writer.field_index_by_name(name)?;
        self.write_text(idx, value)
    }

    /// Write a value with its string, long and double forms. All three are
    /// indexed under the same entry so ranges over either numeric type agree.
    pub fn write_tuple(&mut self, field_id: u32, text: &[u8], long: i64, double: f64) -> Result<()> {
        let idx = self.writer.field_index(field_id)?;
        self.index_text(idx, text)?;

        let (entry_id, slot) = (self.entry_id, self.term_slot);
        let field = &mut self.writer.fields[idx];
        if field.mode != FieldIndexingMode::No {
            field.insert_long(entry_id, slot, long);
            field.insert_double(entry_id, slot, double);
        }
        if field.should_store {
            let payload = encode_tuple(text, long, double);
            self.store(idx, StoredFieldType::TUPLE, Some(&payload));
        }
        Ok(())
    }

    /// Write an explicit null, indexed under [`NULL_VALUE_TERM`].
    pub fn write_null(&mut self, field_id: u32) -> Result<()> {
        let idx = self.writer.field_index(field_id)?;
        let (entry_id, slot) = (self.entry_id, self.term_slot);
        let field = &mut self.writer.fields[idx];
        if field.mode != FieldIndexingMode::No {
            field.insert_text(entry_id, slot, NULL_VALUE_TERM);
        }
        if field.should_store {
            self.store(idx, StoredFieldType::NULL, None);
        }
        Ok(())
    }

    /// Store an opaque value. Raw values are never indexed and are always
    /// stored.
    pub fn write_raw(&mut self, field_id: u32, value: &[u8]) -> Result<()> {
        let idx = self.writer.field_index(field_id)?;
        self.store(idx, StoredFieldType::RAW, Some(value));
        Ok(())
    }

    /// Record a point for distance sorting.
    pub fn write_spatial(&mut self, field_id: u32, latitude: f64, longitude: f64) -> Result<()> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(TesseraError::field(format!(
                "field {field_id}: invalid coordinates ({latitude}, {longitude})"
            )));
        }
        let idx = self.writer.field_index(field_id)?;
        self.writer.fields[idx].add_spatial(self.entry_id, latitude, longitude);
        Ok(())
    }

    /// Write one value of any shape.
    pub fn write_value(&mut self, field_id: u32, value: FieldValue<'_>) -> Result<()> {
        match value {
            FieldValue::Null => self.write_null(field_id),
            FieldValue::Text(text) => self.write(field_id, text),
            FieldValue::Tuple { text, long, double } => self.write_tuple(field_id, text, long, double),
            FieldValue::Raw(bytes) => self.write_raw(field_id, bytes),
            FieldValue::Spatial {
                latitude,
                longitude,
            } => self.write_spatial(field_id, latitude, longitude),
        }
    }

    /// Write every mapped field present in `reader`. Absent fields are
    /// skipped; list fields are written value by value in list context.
    pub fn write_document<R: EntryReader + ?Sized>(&mut self, reader: &R) -> Result<()> {
        let mapping = Arc::clone(&self.writer.mapping);
        for binding in mapping.iter() {
            let field_id = binding.field_id;
            let ty = reader.field_type(field_id);
            if ty.contains(IndexEntryFieldType::INVALID) {
                continue;
            }

            if ty.contains(IndexEntryFieldType::LIST) {
                self.increment_list();
                for value in reader.read_many(field_id)? {
                    self.write_value(field_id, value)?;
                }
                self.decrement_list()?;
            } else if let Some(value) = reader.read(field_id)? {
                self.write_value(field_id, value)?;
            }
        }
        Ok(())
    }

    /// Persist stored values and the boost, returning the entry id.
    pub fn finish(self) -> Result<u64> {
        if self.building_list != 0 {
            return Err(TesseraError::invalid_operation(format!(
                "entry {} finished inside {} unclosed list(s)",
                self.entry_id, self.building_list
            )));
        }

        let txn = &mut self.writer.txn;
        if !self.stored.is_empty() {
            let container = txn.allocate(&encode_records(&self.stored));
            txn.lookup_mut(names::STORED_FIELDS)
                .insert(self.entry_id, container as i64);
        }
        if let Some(boost) = self.boost {
            txn.lookup_mut(names::DOCUMENT_BOOSTS)
                .insert(self.entry_id, boost.to_bits() as i64);
        }
        self.writer.stats.entries_indexed += 1;
        Ok(self.entry_id)
    }

    fn write_text(&mut self, idx: usize, value: &[u8]) -> Result<()> {
        self.index_text(idx, value)?;
        if self.writer.fields[idx].should_store {
            if value.is_empty() {
                self.store(idx, StoredFieldType::EMPTY, None);
            } else {
                self.store(idx, StoredFieldType::TERM, Some(value));
            }
        }
        Ok(())
    }

    fn index_text(&mut self, idx: usize, value: &[u8]) -> Result<()> {
        let (entry_id, slot) = (self.entry_id, self.term_slot);
        let in_list = self.building_list > 0;
        let writer = &mut *self.writer;
        let field = &mut writer.fields[idx];

        match field.mode {
            FieldIndexingMode::No => {}
            FieldIndexingMode::Exact => {
                let term = analyze_single_term(
                    &field.name,
                    field.analyzer.as_deref(),
                    &mut writer.buffers,
                    value,
                )?;
                field.insert_text(entry_id, slot, &term);
                if in_list {
                    field.has_multiple_terms = true;
                }
            }
            FieldIndexingMode::Search => {
                let Some(analyzer) = field.analyzer.clone() else {
                    check_value_term(&field.name, value)?;
                    let term = if value.is_empty() { EMPTY_STRING_TERM } else { value };
                    let pos = field.insert_text(entry_id, slot, term);
                    field.record_token(entry_id, pos);
                    return Ok(());
                };

                let count = writer.buffers.run(analyzer.as_ref(), value)?;
                for i in 0..count {
                    check_value_term(&field.name, writer.buffers.token_bytes(i))?;
                }
                if count == 0 {
                    field.insert_text(entry_id, slot, EMPTY_STRING_TERM);
                }
                for i in 0..count {
                    let pos = field.insert_text(entry_id, slot, writer.buffers.token_bytes(i));
                    field.record_token(entry_id, pos);
                }
                if count > 1 || in_list {
                    field.has_multiple_terms = true;
                }
            }
        }
        Ok(())
    }

    fn store(&mut self, idx: usize, ty: StoredFieldType, payload: Option<&[u8]>) {
        let ty = if self.building_list > 0 {
            ty | StoredFieldType::LIST
        } else {
            ty
        };
        let container = match payload {
            Some(bytes) => self.writer.txn.allocate(bytes),
            None => 0,
        };
        self.stored.push(StoredFieldRecord {
            field: self.writer.fields[idx].name.clone(),
            tag: make_tag(self.sequence, ty),
            container,
        });
        self.sequence += 1;
    }
}

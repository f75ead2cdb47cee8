//! Index entry documents.
//!
//! An index entry is the byte image of one document version as the index
//! writer consumes it: a list of field records keyed by field id, each
//! carrying an [`IndexEntryFieldType`] and its value(s). The writer only
//! talks to documents through the [`EntryReader`](entry::EntryReader) trait,
//! so any format exposing field types and values can be indexed.
//!
//! # Example
//!
//! ```
//! use tessera::document::entry::{EntryReader, FieldValue, IndexEntryReader, IndexEntryWriter};
//! use tessera::document::field_type::IndexEntryFieldType;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let mut writer = IndexEntryWriter::new();
//! writer.write(0, FieldValue::Text(b"active"))?;
//! writer.write_list(1, &[FieldValue::Text(b"a"), FieldValue::Text(b"b")])?;
//! let bytes = writer.finish();
//!
//! let reader = IndexEntryReader::new(&bytes)?;
//! assert_eq!(reader.field_type(0), IndexEntryFieldType::SIMPLE);
//! assert!(reader.field_type(1).contains(IndexEntryFieldType::LIST));
//! assert_eq!(reader.read(0)?, Some(FieldValue::Text(b"active")));
//! assert_eq!(reader.read_many(1)?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod field_type;

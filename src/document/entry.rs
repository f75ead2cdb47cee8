//! Entry byte format: writer, reader and the reader trait consumed by the
//! index writer.

use std::collections::BTreeMap;

use crate::document::field_type::IndexEntryFieldType;
use crate::error::{Result, TesseraError};
use crate::util::varint::{VarIntCursor, encode_bytes, encode_fixed_u64, encode_i64, encode_u64};

/// One value of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Null,
    /// String value; zero length means an empty value.
    Text(&'a [u8]),
    /// String form with its long and double interpretations.
    Tuple { text: &'a [u8], long: i64, double: f64 },
    /// Opaque blob.
    Raw(&'a [u8]),
    /// Geographic point in degrees.
    Spatial { latitude: f64, longitude: f64 },
}

impl FieldValue<'_> {
    pub fn field_type(&self) -> IndexEntryFieldType {
        match self {
            FieldValue::Null => IndexEntryFieldType::NULL,
            FieldValue::Text(bytes) if bytes.is_empty() => IndexEntryFieldType::EMPTY,
            FieldValue::Text(_) => IndexEntryFieldType::SIMPLE,
            FieldValue::Tuple { .. } => IndexEntryFieldType::TUPLE,
            FieldValue::Raw(_) => IndexEntryFieldType::RAW,
            FieldValue::Spatial { .. } => IndexEntryFieldType::SPATIAL,
        }
    }
}

/// Read access to the fields of one index entry.
pub trait EntryReader {
    /// Shape of the field; [`IndexEntryFieldType::INVALID`] when absent.
    fn field_type(&self, field_id: u32) -> IndexEntryFieldType;

    /// Single value of a non-list field.
    fn read(&self, field_id: u32) -> Result<Option<FieldValue<'_>>>;

    /// All values of a list field, in insertion order. A scalar field reads
    /// as a one-element list.
    fn read_many(&self, field_id: u32) -> Result<Vec<FieldValue<'_>>>;
}

/// Builds the byte image of an index entry.
#[derive(Debug, Default)]
pub struct IndexEntryWriter {
    fields: BTreeMap<u32, Vec<u8>>,
}

impl IndexEntryWriter {
    pub fn new() -> Self {
        IndexEntryWriter::default()
    }

    pub fn write(&mut self, field_id: u32, value: FieldValue<'_>) -> Result<&mut Self> {
        let mut record = Vec::new();
        let ty = value.field_type();
        record.push(ty.bits());
        encode_value(&value, &mut record);
        self.insert(field_id, record)
    }

    pub fn write_list(&mut self, field_id: u32, values: &[FieldValue<'_>]) -> Result<&mut Self> {
        let mut ty = IndexEntryFieldType::LIST;
        let mut items = Vec::new();
        for value in values {
            let item_ty = value.field_type();
            if item_ty.contains(IndexEntryFieldType::SPATIAL) {
                return Err(TesseraError::field(format!(
                    "field {field_id}: spatial values cannot be list items"
                )));
            }
            if item_ty.contains(IndexEntryFieldType::TUPLE) {
                ty |= IndexEntryFieldType::TUPLE;
            }
            items.push(item_ty.bits());
            encode_value(value, &mut items);
        }

        let mut record = vec![ty.bits()];
        encode_u64(values.len() as u64, &mut record);
        record.extend_from_slice(&items);
        self.insert(field_id, record)
    }

    fn insert(&mut self, field_id: u32, record: Vec<u8>) -> Result<&mut Self> {
        if self.fields.insert(field_id, record).is_some() {
            return Err(TesseraError::field(format!(
                "field {field_id} written twice in one entry"
            )));
        }
        Ok(self)
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_u64(self.fields.len() as u64, &mut out);
        for (field_id, record) in self.fields {
            encode_u64(field_id as u64, &mut out);
            out.extend_from_slice(&record);
        }
        out
    }
}

fn encode_value(value: &FieldValue<'_>, out: &mut Vec<u8>) {
    match value {
        FieldValue::Null => {}
        FieldValue::Text(bytes) => {
            if !bytes.is_empty() {
                encode_bytes(bytes, out);
            }
        }
        FieldValue::Raw(bytes) => encode_bytes(bytes, out),
        FieldValue::Tuple { text, long, double } => {
            encode_bytes(text, out);
            encode_i64(*long, out);
            encode_fixed_u64(double.to_bits(), out);
        }
        FieldValue::Spatial {
            latitude,
            longitude,
        } => {
            encode_fixed_u64(latitude.to_bits(), out);
            encode_fixed_u64(longitude.to_bits(), out);
        }
    }
}

fn decode_value<'a>(ty: IndexEntryFieldType, cursor: &mut VarIntCursor<'a>) -> Result<FieldValue<'a>> {
    let value = if ty.contains(IndexEntryFieldType::NULL) {
        FieldValue::Null
    } else if ty.contains(IndexEntryFieldType::EMPTY) {
        FieldValue::Text(&[])
    } else if ty.contains(IndexEntryFieldType::RAW) {
        FieldValue::Raw(cursor.read_bytes()?)
    } else if ty.contains(IndexEntryFieldType::TUPLE) {
        FieldValue::Tuple {
            text: cursor.read_bytes()?,
            long: cursor.read_i64()?,
            double: f64::from_bits(cursor.read_fixed_u64()?),
        }
    } else if ty.contains(IndexEntryFieldType::SPATIAL) {
        FieldValue::Spatial {
            latitude: f64::from_bits(cursor.read_fixed_u64()?),
            longitude: f64::from_bits(cursor.read_fixed_u64()?),
        }
    } else {
        FieldValue::Text(cursor.read_bytes()?)
    };
    Ok(value)
}

#[derive(Debug, Clone)]
enum ParsedField<'a> {
    Single(FieldValue<'a>),
    List(Vec<FieldValue<'a>>),
}

/// Parsed view over an entry produced by [`IndexEntryWriter`].
#[derive(Debug, Clone)]
pub struct IndexEntryReader<'a> {
    fields: BTreeMap<u32, (IndexEntryFieldType, ParsedField<'a>)>,
}

impl<'a> IndexEntryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = VarIntCursor::new(bytes);
        let mut fields = BTreeMap::new();

        if bytes.is_empty() {
            return Ok(IndexEntryReader { fields });
        }

        let count = cursor.read_u64()?;
        for _ in 0..count {
            let field_id = u32::try_from(cursor.read_u64()?)
                .map_err(|_| TesseraError::format("entry field id out of range"))?;
            let ty = read_type(&mut cursor, field_id)?;

            let parsed = if ty.contains(IndexEntryFieldType::LIST) {
                let items = cursor.read_u64()? as usize;
                let mut values = Vec::with_capacity(items.min(1024));
                for _ in 0..items {
                    let item_ty = read_type(&mut cursor, field_id)?;
                    values.push(decode_value(item_ty, &mut cursor)?);
                }
                ParsedField::List(values)
            } else {
                ParsedField::Single(decode_value(ty, &mut cursor)?)
            };
            fields.insert(field_id, (ty, parsed));
        }

        if !cursor.is_empty() {
            return Err(TesseraError::format(format!(
                "trailing bytes after entry at offset {}",
                cursor.position()
            )));
        }
        Ok(IndexEntryReader { fields })
    }

    /// Ids of all fields present in the entry, ascending.
    pub fn field_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }
}

fn read_type(cursor: &mut VarIntCursor<'_>, field_id: u32) -> Result<IndexEntryFieldType> {
    let raw = cursor.read_u8()?;
    IndexEntryFieldType::from_bits(raw).ok_or_else(|| {
        TesseraError::format(format!("field {field_id}: unknown field type flags {raw:#04x}"))
    })
}

impl EntryReader for IndexEntryReader<'_> {
    fn field_type(&self, field_id: u32) -> IndexEntryFieldType {
        self.fields
            .get(&field_id)
            .map_or(IndexEntryFieldType::INVALID, |(ty, _)| *ty)
    }

    fn read(&self, field_id: u32) -> Result<Option<FieldValue<'_>>> {
        match self.fields.get(&field_id) {
            None => Ok(None),
            Some((_, ParsedField::Single(value))) => Ok(Some(*value)),
            Some((_, ParsedField::List(_))) => Err(TesseraError::field(format!(
                "field {field_id} is a list; read it with read_many"
            ))),
        }
    }

    fn read_many(&self, field_id: u32) -> Result<Vec<FieldValue<'_>>> {
        Ok(match self.fields.get(&field_id) {
            None => Vec::new(),
            Some((_, ParsedField::Single(value))) => vec![*value],
            Some((_, ParsedField::List(values))) => values.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_with_every_shape() {
        let mut writer = IndexEntryWriter::new();
        writer.write(1, FieldValue::Text(b"hello")).unwrap();
        writer.write(2, FieldValue::Text(b"")).unwrap();
        writer.write(3, FieldValue::Null).unwrap();
        writer
            .write(
                4,
                FieldValue::Tuple {
                    text: b"10",
                    long: 10,
                    double: 10.0,
                },
            )
            .unwrap();
        writer.write(5, FieldValue::Raw(b"{\"a\":1}")).unwrap();
        writer
            .write(
                6,
                FieldValue::Spatial {
                    latitude: 32.1,
                    longitude: 34.8,
                },
            )
            .unwrap();
        writer
            .write_list(
                7,
                &[
                    FieldValue::Text(b"x"),
                    FieldValue::Null,
                    FieldValue::Tuple {
                        text: b"-3",
                        long: -3,
                        double: -3.0,
                    },
                ],
            )
            .unwrap();
        let bytes = writer.finish();
        let reader = IndexEntryReader::new(&bytes).unwrap();

        assert_eq!(reader.field_type(1), IndexEntryFieldType::SIMPLE);
        assert_eq!(reader.field_type(2), IndexEntryFieldType::EMPTY);
        assert_eq!(reader.field_type(3), IndexEntryFieldType::NULL);
        assert_eq!(reader.field_type(9), IndexEntryFieldType::INVALID);
        assert_eq!(
            reader.field_type(7),
            IndexEntryFieldType::LIST | IndexEntryFieldType::TUPLE
        );

        assert_eq!(reader.read(2).unwrap(), Some(FieldValue::Text(b"")));
        assert_eq!(
            reader.read(6).unwrap(),
            Some(FieldValue::Spatial {
                latitude: 32.1,
                longitude: 34.8
            })
        );
        assert!(reader.read(7).is_err());

        let items = reader.read_many(7).unwrap();
        assert_eq!(items[1], FieldValue::Null);
        assert_eq!(
            items[2],
            FieldValue::Tuple {
                text: b"-3",
                long: -3,
                double: -3.0
            }
        );
        assert_eq!(reader.field_ids().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut writer = IndexEntryWriter::new();
        writer.write(1, FieldValue::Text(b"a")).unwrap();
        assert!(writer.write(1, FieldValue::Text(b"b")).is_err());
    }

    #[test]
    fn test_corrupted_entry_is_format_error() {
        let mut writer = IndexEntryWriter::new();
        writer.write(1, FieldValue::Text(b"hello")).unwrap();
        let mut bytes = writer.finish();
        bytes.truncate(bytes.len() - 2);

        let err = IndexEntryReader::new(&bytes).unwrap_err();
        assert!(matches!(err, TesseraError::Format(_)));

        let err = IndexEntryReader::new(&[1, 1, 0x40]).unwrap_err();
        assert!(err.to_string().contains("unknown field type flags"));
    }
}

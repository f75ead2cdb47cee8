//! Stored field values.
//!
//! Every stored value gets a record `(field, tag, container)` in its entry's
//! stored-fields container. The tag carries the value type in its low bits
//! and the value's insertion sequence number in its high bits, so values of
//! a list field are replayed in their original order.

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{Result, TesseraError};
use crate::storage::{ContainerId, StoreState};
use crate::util::varint::{VarIntCursor, encode_bytes, encode_u64};

bitflags! {
    /// Type bits of a stored value tag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StoredFieldType: u64 {
        const NULL = 1 << 3;
        const EMPTY = 1 << 4;
        const TERM = 1 << 5;
        const RAW = 1 << 6;
        /// The value was written while building a list.
        const LIST = 1 << 7;
        const TUPLE = 1 << 8;
    }
}

const TAG_MARKER: u64 = 0b110;
const TAG_MARKER_MASK: u64 = 0b111;
const SEQUENCE_SHIFT: u32 = 10;
const TYPE_MASK: u64 = (1 << SEQUENCE_SHIFT) - 1;

pub fn make_tag(sequence: u32, ty: StoredFieldType) -> u64 {
    ((sequence as u64) << SEQUENCE_SHIFT) | ty.bits() | TAG_MARKER
}

/// Split a tag into its sequence number and value type.
pub fn parse_tag(tag: u64) -> Result<(u32, StoredFieldType)> {
    let bad_tag = || TesseraError::format(format!("unrecognized stored value type tag {tag:#x}"));

    if tag & TAG_MARKER_MASK != TAG_MARKER {
        return Err(bad_tag());
    }
    let ty = StoredFieldType::from_bits(tag & TYPE_MASK & !TAG_MARKER_MASK).ok_or_else(bad_tag)?;
    let kind = ty - StoredFieldType::LIST;
    let valid = [
        StoredFieldType::NULL,
        StoredFieldType::EMPTY,
        StoredFieldType::TERM,
        StoredFieldType::RAW,
        StoredFieldType::TUPLE,
    ];
    if !valid.contains(&kind) {
        return Err(bad_tag());
    }
    let sequence = u32::try_from(tag >> SEQUENCE_SHIFT).map_err(|_| bad_tag())?;
    Ok((sequence, ty))
}

/// One stored value reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFieldRecord {
    pub field: String,
    pub tag: u64,
    /// `0` for null and empty values.
    pub container: ContainerId,
}

pub(crate) fn encode_records(records: &[StoredFieldRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_u64(records.len() as u64, &mut out);
    for record in records {
        encode_bytes(record.field.as_bytes(), &mut out);
        encode_u64(record.tag, &mut out);
        encode_u64(record.container, &mut out);
    }
    out
}

pub(crate) fn decode_records(bytes: &[u8]) -> Result<Vec<StoredFieldRecord>> {
    let mut cursor = VarIntCursor::new(bytes);
    let count = cursor.read_u64()? as usize;
    let mut records = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let field = std::str::from_utf8(cursor.read_bytes()?)
            .map_err(|e| TesseraError::format(format!("stored field name is not UTF-8: {e}")))?
            .to_string();
        let tag = cursor.read_u64()?;
        let container = cursor.read_u64()?;
        records.push(StoredFieldRecord {
            field,
            tag,
            container,
        });
    }
    Ok(records)
}

/// Container payload of a tuple value: long, double, then the text.
pub(crate) fn encode_tuple(text: &[u8], long: i64, double: f64) -> Vec<u8> {
    let mut out = vec![0u8; 16];
    LittleEndian::write_i64(&mut out[..8], long);
    LittleEndian::write_f64(&mut out[8..16], double);
    out.extend_from_slice(text);
    out
}

/// A stored value as written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StoredValue {
    Null,
    Empty,
    Term(Vec<u8>),
    Raw(Vec<u8>),
    Tuple { text: Vec<u8>, long: i64, double: f64 },
}

/// All stored values of one field of an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredField {
    /// Values were written as a list.
    pub is_list: bool,
    /// Values in insertion order.
    pub values: Vec<StoredValue>,
}

/// Resolve the stored values of `field` from an entry's records.
pub(crate) fn read_field(
    state: &StoreState,
    records: &[StoredFieldRecord],
    field: &str,
) -> Result<Option<StoredField>> {
    let mut values = Vec::new();
    let mut is_list = false;

    for record in records.iter().filter(|r| r.field == field) {
        let (sequence, ty) = parse_tag(record.tag)?;
        is_list |= ty.contains(StoredFieldType::LIST);

        let kind = ty - StoredFieldType::LIST;
        let value = if kind == StoredFieldType::NULL {
            StoredValue::Null
        } else if kind == StoredFieldType::EMPTY {
            StoredValue::Empty
        } else if kind == StoredFieldType::TERM {
            StoredValue::Term(state.container(record.container)?.to_vec())
        } else if kind == StoredFieldType::RAW {
            StoredValue::Raw(state.container(record.container)?.to_vec())
        } else {
            let bytes = state.container(record.container)?;
            if bytes.len() < 16 {
                return Err(TesseraError::format(format!(
                    "stored tuple of field '{field}' is {} bytes",
                    bytes.len()
                )));
            }
            StoredValue::Tuple {
                long: LittleEndian::read_i64(&bytes[..8]),
                double: LittleEndian::read_f64(&bytes[8..16]),
                text: bytes[16..].to_vec(),
            }
        };
        values.push((sequence, value));
    }

    if values.is_empty() {
        return Ok(None);
    }
    values.sort_by_key(|(sequence, _)| *sequence);
    Ok(Some(StoredField {
        is_list,
        values: values.into_iter().map(|(_, v)| v).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageEnvironment};

    #[test]
    fn test_tag_round_trip() {
        let tag = make_tag(5, StoredFieldType::TERM | StoredFieldType::LIST);
        let (sequence, ty) = parse_tag(tag).unwrap();
        assert_eq!(sequence, 5);
        assert_eq!(ty, StoredFieldType::TERM | StoredFieldType::LIST);
    }

    #[test]
    fn test_bad_tags_are_format_errors() {
        // Missing marker bits.
        let err = parse_tag(StoredFieldType::TERM.bits()).unwrap_err();
        assert!(matches!(err, TesseraError::Format(_)));
        assert!(err.to_string().contains("unrecognized stored value type tag"));
        // Two value kinds at once.
        assert!(parse_tag(make_tag(0, StoredFieldType::TERM | StoredFieldType::RAW)).is_err());
        // List flag alone.
        assert!(parse_tag(make_tag(0, StoredFieldType::LIST)).is_err());
    }

    #[test]
    fn test_read_field_replays_sequence_order() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let b = txn.allocate(b"b");
        let a = txn.allocate(b"a");
        let tuple = txn.allocate(&encode_tuple(b"7", 7, 7.5));

        let list = StoredFieldType::LIST;
        let records = vec![
            StoredFieldRecord {
                field: "tags".into(),
                tag: make_tag(2, StoredFieldType::TERM | list),
                container: b,
            },
            StoredFieldRecord {
                field: "n".into(),
                tag: make_tag(3, StoredFieldType::TUPLE),
                container: tuple,
            },
            StoredFieldRecord {
                field: "tags".into(),
                tag: make_tag(0, StoredFieldType::TERM | list),
                container: a,
            },
            StoredFieldRecord {
                field: "tags".into(),
                tag: make_tag(1, StoredFieldType::NULL | list),
                container: 0,
            },
        ];
        let records = decode_records(&encode_records(&records)).unwrap();

        let tags = read_field(&txn, &records, "tags").unwrap().unwrap();
        assert!(tags.is_list);
        assert_eq!(
            tags.values,
            vec![
                StoredValue::Term(b"a".to_vec()),
                StoredValue::Null,
                StoredValue::Term(b"b".to_vec())
            ]
        );

        let n = read_field(&txn, &records, "n").unwrap().unwrap();
        assert_eq!(
            n.values,
            vec![StoredValue::Tuple {
                text: b"7".to_vec(),
                long: 7,
                double: 7.5
            }]
        );
        assert!(read_field(&txn, &records, "missing").unwrap().is_none());
    }
}

//! Postings representations and the small-postings codec.
//!
//! A term's postings live in one of three shapes, chosen by the number of
//! entries and whether their encoding fits the small capacity:
//!
//! | shape    | tag | payload                                   |
//! |----------|-----|-------------------------------------------|
//! | `Single` | 0   | the entry id itself                       |
//! | `Small`  | 1   | container with zig-zag varint deltas      |
//! | `Set`    | 2   | container with the posting set state block |
//!
//! The tag lives in the low two bits of the value stored in the term tree.
//! Everything outside [`PostingList::pack`] and [`PostingList::unpack`]
//! works with the enum.

use crate::error::{Result, TesseraError};
use crate::storage::{ContainerId, StoreState};
use crate::util::varint::{VarIntCursor, encode_i64, zigzag_encode};

/// Largest entry id that still packs into a term tree value.
pub const MAX_ENTRY_ID: u64 = (1 << 61) - 1;

const TAG_BITS: u32 = 2;
const TAG_MASK: i64 = 0b11;
const TAG_SINGLE: i64 = 0;
const TAG_SMALL: i64 = 1;
const TAG_SET: i64 = 2;

/// Persisted postings of one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingList {
    /// Exactly one entry, stored inline.
    Single(u64),
    /// Delta-encoded blob in a container.
    Small(ContainerId),
    /// Posting set whose state block lives in a container.
    Set(ContainerId),
}

impl PostingList {
    pub fn pack(self) -> i64 {
        let (payload, tag) = match self {
            PostingList::Single(entry_id) => (entry_id, TAG_SINGLE),
            PostingList::Small(id) => (id, TAG_SMALL),
            PostingList::Set(id) => (id, TAG_SET),
        };
        ((payload as i64) << TAG_BITS) | tag
    }

    pub fn unpack(value: i64) -> Result<Self> {
        let payload = (value >> TAG_BITS) as u64;
        match value & TAG_MASK {
            TAG_SINGLE => Ok(PostingList::Single(payload)),
            TAG_SMALL => Ok(PostingList::Small(payload)),
            TAG_SET => Ok(PostingList::Set(payload)),
            tag => Err(TesseraError::format(format!(
                "unknown postings tag {tag} in term value {value:#x}"
            ))),
        }
    }

    /// Number of entries, reading containers as needed.
    pub fn count(self, state: &StoreState) -> Result<u64> {
        Ok(match self {
            PostingList::Single(_) => 1,
            PostingList::Small(id) => small_len(state.container(id)?)? as u64,
            PostingList::Set(id) => state.posting_set(id)?.len(),
        })
    }

    /// Append all entries, ascending, to `out`.
    pub fn read_into(self, state: &StoreState, out: &mut Vec<u64>) -> Result<()> {
        match self {
            PostingList::Single(entry_id) => out.push(entry_id),
            PostingList::Small(id) => decode_small(state.container(id)?, out)?,
            PostingList::Set(id) => out.extend(state.posting_set(id)?.iter_after(None)),
        }
        Ok(())
    }
}

/// Check that `entry_id` can be stored in postings.
pub fn validate_entry_id(entry_id: u64) -> Result<()> {
    if entry_id == 0 || entry_id > MAX_ENTRY_ID {
        return Err(TesseraError::invalid_operation(format!(
            "entry id {entry_id} is outside 1..={MAX_ENTRY_ID}"
        )));
    }
    Ok(())
}

/// Encoded size of `entries` (ascending, distinct) as small postings.
pub fn small_encoded_len(entries: &[u64]) -> usize {
    let mut len = 0;
    let mut prev = 0u64;
    for (i, &entry) in entries.iter().enumerate() {
        let value = if i == 0 { entry } else { entry - prev };
        len += varint_len(zigzag_encode(value as i64));
        prev = entry;
    }
    len
}

fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Zig-zag delta encode ascending `entries` into `out`, stopping as soon as
/// the encoding would exceed `capacity` bytes.
///
/// The first value is absolute, the rest are deltas from their predecessor.
/// Zero deltas (repeated entries) are dropped. Returns `false` when the
/// entries do not fit; `out` then holds a partial encoding.
pub fn encode_small(entries: &[u64], capacity: usize, out: &mut Vec<u8>) -> bool {
    out.clear();
    let mut prev = None;
    for &entry in entries {
        let value = match prev {
            None => entry,
            Some(p) if entry == p => continue,
            Some(p) => entry - p,
        };
        let encoded = zigzag_encode(value as i64);
        if out.len() + varint_len(encoded) > capacity {
            return false;
        }
        encode_i64(value as i64, out);
        prev = Some(entry);
    }
    true
}

/// Decode a small postings blob into absolute entry ids.
pub fn decode_small(bytes: &[u8], out: &mut Vec<u64>) -> Result<()> {
    let mut cursor = VarIntCursor::new(bytes);
    let mut current = 0u64;
    let mut first = true;
    while !cursor.is_empty() {
        let value = cursor.read_i64()?;
        if value < 0 || (!first && value == 0) {
            return Err(TesseraError::format(format!(
                "small postings blob has a non-ascending delta {value} at offset {}",
                cursor.position()
            )));
        }
        current = if first { value as u64 } else { current + value as u64 };
        first = false;
        out.push(current);
    }
    Ok(())
}

fn small_len(bytes: &[u8]) -> Result<usize> {
    let mut cursor = VarIntCursor::new(bytes);
    let mut len = 0;
    while !cursor.is_empty() {
        cursor.read_u64()?;
        len += 1;
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_unpack() {
        for list in [
            PostingList::Single(1),
            PostingList::Single(MAX_ENTRY_ID),
            PostingList::Small(42),
            PostingList::Set(7),
        ] {
            assert_eq!(PostingList::unpack(list.pack()).unwrap(), list);
        }
        assert_eq!(PostingList::Small(1).pack(), 0b101);
        assert!(PostingList::unpack(0b11).is_err());
    }

    #[test]
    fn test_validate_entry_id() {
        assert!(validate_entry_id(1).is_ok());
        assert!(validate_entry_id(MAX_ENTRY_ID).is_ok());
        assert!(validate_entry_id(0).is_err());
        assert!(validate_entry_id(MAX_ENTRY_ID + 1).is_err());
    }

    #[test]
    fn test_small_encoding_layout() {
        let mut out = Vec::new();
        assert!(encode_small(&[100, 101, 101, 105], 32, &mut out));
        // 100 -> zigzag 200 (2 bytes), deltas 1 and 4 -> 2 and 8.
        assert_eq!(out, vec![0xC8, 0x01, 0x02, 0x08]);

        let mut decoded = Vec::new();
        decode_small(&out, &mut decoded).unwrap();
        assert_eq!(decoded, vec![100, 101, 105]);
        assert_eq!(small_len(&out).unwrap(), 3);
    }

    #[test]
    fn test_small_encoding_overflow() {
        let entries: Vec<u64> = (1..=50).collect();
        let mut out = Vec::new();
        assert!(!encode_small(&entries, 32, &mut out));
        assert!(encode_small(&entries[..5], 32, &mut out));
    }

    #[test]
    fn test_decode_rejects_negative_delta() {
        let mut blob = Vec::new();
        encode_i64(10, &mut blob);
        encode_i64(-3, &mut blob);
        assert!(decode_small(&blob, &mut Vec::new()).is_err());
    }

    proptest! {
        #[test]
        fn prop_small_fit_depends_only_on_encoded_len(
            mut entries in prop::collection::vec(1u64..1_000_000, 1..64),
            capacity in 1usize..128,
        ) {
            entries.sort_unstable();
            entries.dedup();

            let mut out = Vec::new();
            let fits = encode_small(&entries, capacity, &mut out);
            prop_assert_eq!(fits, small_encoded_len(&entries) <= capacity);

            if fits {
                let mut decoded = Vec::new();
                decode_small(&out, &mut decoded).unwrap();
                prop_assert_eq!(decoded, entries);
            }
        }
    }
}

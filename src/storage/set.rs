//! Persistent posting sets.
//!
//! A set is addressed through a container holding its [`SetState`]: the
//! root of the backing sorted structure and the number of entries. The
//! container id never changes for the life of the set, so a term tree entry
//! pointing at it stays valid while the set grows or shrinks.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, TesseraError};

/// Fixed-size description of a persistent set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetState {
    pub root: u64,
    pub count: u64,
}

impl SetState {
    /// Serialized size in bytes.
    pub const SIZE: usize = 16;

    pub fn write_to(&self, out: &mut [u8]) -> Result<()> {
        if out.len() != Self::SIZE {
            return Err(TesseraError::format(format!(
                "set state block must be {} bytes, got {}",
                Self::SIZE,
                out.len()
            )));
        }
        LittleEndian::write_u64(&mut out[..8], self.root);
        LittleEndian::write_u64(&mut out[8..], self.count);
        Ok(())
    }

    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(TesseraError::format(format!(
                "set state block must be {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        Ok(SetState {
            root: LittleEndian::read_u64(&bytes[..8]),
            count: LittleEndian::read_u64(&bytes[8..]),
        })
    }
}

/// Read-only view of a posting set in a snapshot.
#[derive(Debug, Clone)]
pub struct PostingSet {
    state: SetState,
    entries: Arc<BTreeSet<u64>>,
}

impl PostingSet {
    pub(crate) fn new(state: SetState, entries: Arc<BTreeSet<u64>>) -> Self {
        PostingSet { state, entries }
    }

    pub fn state(&self) -> SetState {
        self.state
    }

    pub fn len(&self) -> u64 {
        self.state.count
    }

    pub fn is_empty(&self) -> bool {
        self.state.count == 0
    }

    pub fn contains(&self, entry_id: u64) -> bool {
        self.entries.contains(&entry_id)
    }

    /// Entries strictly greater than `after`, ascending.
    pub fn iter_after(&self, after: Option<u64>) -> impl Iterator<Item = u64> + '_ {
        let lower = match after {
            Some(a) => Bound::Excluded(a),
            None => Bound::Unbounded,
        };
        self.entries.range((lower, Bound::Unbounded)).copied()
    }
}

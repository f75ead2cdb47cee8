//! Field type flags reported by entry readers.

use bitflags::bitflags;

bitflags! {
    /// Shape of one field inside an index entry.
    ///
    /// A plain scalar has no flag set ([`IndexEntryFieldType::SIMPLE`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IndexEntryFieldType: u8 {
        /// Explicit null value.
        const NULL = 1 << 0;
        /// Zero-length value.
        const EMPTY = 1 << 1;
        /// Multiple values.
        const LIST = 1 << 2;
        /// Value carries string, long and double forms.
        const TUPLE = 1 << 3;
        /// Opaque blob, stored but never tokenized.
        const RAW = 1 << 4;
        /// Geographic point.
        const SPATIAL = 1 << 5;
        /// Field absent or unreadable.
        const INVALID = 1 << 7;
    }
}

impl IndexEntryFieldType {
    /// Plain single value.
    pub const SIMPLE: IndexEntryFieldType = IndexEntryFieldType::empty();
}

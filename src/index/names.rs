//! Names of the trees, lookups and metadata keys an index occupies in its
//! storage environment.

/// Entry id -> container with the entry's key and document bytes.
pub const ENTRIES: &str = "entries";

/// Entry id -> container with the entry's terms record.
pub const ENTRY_TERMS: &str = "entry-terms";

/// Entry id -> container with the entry's stored field records.
pub const STORED_FIELDS: &str = "stored-fields";

/// Entry id -> document boost (`f32` bits).
pub const DOCUMENT_BOOSTS: &str = "document-boosts";

/// Metadata key of the persisted field catalog.
pub const FIELDS_CATALOG: &str = "fields-catalog";

/// Textual term tree of a field.
pub fn terms(field: &str) -> String {
    format!("terms/{field}")
}

pub fn long_terms(field: &str) -> String {
    format!("longs/{field}")
}

pub fn double_terms(field: &str) -> String {
    format!("doubles/{field}")
}

/// Entry id -> term dictionary container, for sorting by term.
pub fn term_ids(field: &str) -> String {
    format!("term-ids/{field}")
}

pub fn long_values(field: &str) -> String {
    format!("long-values/{field}")
}

pub fn double_values(field: &str) -> String {
    format!("double-values/{field}")
}

pub fn latitudes(field: &str) -> String {
    format!("latitudes/{field}")
}

pub fn longitudes(field: &str) -> String {
    format!("longitudes/{field}")
}

/// Raw term -> occurrence count, for suggestion-enabled fields.
pub fn suggestions(field: &str) -> String {
    format!("suggestions/{field}")
}

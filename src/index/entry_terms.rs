//! Per-entry record of the terms an entry was indexed under.
//!
//! Written at commit for every indexed entry. Deletion replays it to know
//! which postings to shrink; the `AllIn` match and the debug dump read it to
//! inspect an entry without walking term trees.

use serde::Serialize;

use crate::error::{Result, TesseraError};
use crate::util::varint::{VarIntCursor, encode_bytes, encode_fixed_u64, encode_i64, encode_u64};

/// Terms of one field of an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryFieldTerms {
    pub field: String,
    /// Distinct textual terms, ascending, with their frequency in the entry.
    pub terms: Vec<(Vec<u8>, u16)>,
    /// Distinct long values, ascending.
    pub longs: Vec<i64>,
    /// Distinct double values, ascending.
    pub doubles: Vec<f64>,
    /// Search mode only: positions into `terms`, in token order.
    pub token_order: Vec<u32>,
}

impl EntryFieldTerms {
    pub fn contains_term(&self, term: &[u8]) -> bool {
        self.terms
            .binary_search_by(|(t, _)| t.as_slice().cmp(term))
            .is_ok()
    }

    /// Record the token order of a normalized field. Tokens that are not
    /// among the field's terms are ignored.
    pub fn set_token_order<'t>(&mut self, tokens: impl Iterator<Item = &'t [u8]>) {
        let terms = &self.terms;
        self.token_order = tokens
            .filter_map(|token| {
                terms
                    .binary_search_by(|(t, _)| t.as_slice().cmp(token))
                    .ok()
                    .map(|i| i as u32)
            })
            .collect();
    }

    /// Terms in the order the analyzer produced them.
    pub fn tokens(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.token_order
            .iter()
            .filter_map(|i| self.terms.get(*i as usize).map(|(t, _)| t.as_slice()))
    }
}

/// All terms of an entry, one [`EntryFieldTerms`] per field, by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryTermsRecord {
    pub fields: Vec<EntryFieldTerms>,
}

impl EntryTermsRecord {
    pub fn field(&self, name: &str) -> Option<&EntryFieldTerms> {
        self.fields
            .binary_search_by(|f| f.field.as_str().cmp(name))
            .ok()
            .map(|i| &self.fields[i])
    }

    /// Field record for `name`, inserted in name order when missing.
    pub fn field_mut(&mut self, name: &str) -> &mut EntryFieldTerms {
        let idx = match self.fields.binary_search_by(|f| f.field.as_str().cmp(name)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.fields.insert(
                    idx,
                    EntryFieldTerms {
                        field: name.to_string(),
                        ..Default::default()
                    },
                );
                idx
            }
        };
        &mut self.fields[idx]
    }

    /// Sort and deduplicate every field's values, merging frequencies of
    /// repeated terms.
    pub fn normalize(&mut self) {
        for field in &mut self.fields {
            field.terms.sort_by(|a, b| a.0.cmp(&b.0));
            let mut merged: Vec<(Vec<u8>, u16)> = Vec::with_capacity(field.terms.len());
            for (term, freq) in field.terms.drain(..) {
                match merged.last_mut() {
                    Some(last) if last.0 == term => last.1 = last.1.saturating_add(freq),
                    _ => merged.push((term, freq)),
                }
            }
            field.terms = merged;

            field.longs.sort_unstable();
            field.longs.dedup();
            field.doubles.sort_by(f64::total_cmp);
            field.doubles.dedup();
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_u64(self.fields.len() as u64, &mut out);
        for field in &self.fields {
            encode_bytes(field.field.as_bytes(), &mut out);

            encode_u64(field.terms.len() as u64, &mut out);
            for (term, freq) in &field.terms {
                encode_bytes(term, &mut out);
                encode_u64(*freq as u64, &mut out);
            }

            encode_u64(field.longs.len() as u64, &mut out);
            for value in &field.longs {
                encode_i64(*value, &mut out);
            }

            encode_u64(field.doubles.len() as u64, &mut out);
            for value in &field.doubles {
                encode_fixed_u64(value.to_bits(), &mut out);
            }

            encode_u64(field.token_order.len() as u64, &mut out);
            for pos in &field.token_order {
                encode_u64(*pos as u64, &mut out);
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = VarIntCursor::new(bytes);
        let count = cursor.read_u64()? as usize;
        let mut fields = Vec::with_capacity(count.min(256));

        for _ in 0..count {
            let field = std::str::from_utf8(cursor.read_bytes()?)
                .map_err(|e| TesseraError::format(format!("entry terms field name: {e}")))?
                .to_string();

            let n = cursor.read_u64()? as usize;
            let mut terms = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                let term = cursor.read_bytes()?.to_vec();
                let freq = u16::try_from(cursor.read_u64()?)
                    .map_err(|_| TesseraError::format("term frequency out of range"))?;
                terms.push((term, freq));
            }

            let n = cursor.read_u64()? as usize;
            let mut longs = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                longs.push(cursor.read_i64()?);
            }

            let n = cursor.read_u64()? as usize;
            let mut doubles = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                doubles.push(f64::from_bits(cursor.read_fixed_u64()?));
            }

            let n = cursor.read_u64()? as usize;
            let mut token_order = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                let pos = cursor.read_u64()?;
                if pos as usize >= terms.len() {
                    return Err(TesseraError::format(format!(
                        "token position {pos} out of range for field '{field}'"
                    )));
                }
                token_order.push(pos as u32);
            }

            fields.push(EntryFieldTerms {
                field,
                terms,
                longs,
                doubles,
                token_order,
            });
        }

        if !cursor.is_empty() {
            return Err(TesseraError::format("trailing bytes after entry terms record"));
        }
        Ok(EntryTermsRecord { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_and_token_order() {
        let mut record = EntryTermsRecord::default();
        let body = record.field_mut("body");
        body.terms = vec![
            (b"quick".to_vec(), 1),
            (b"brown".to_vec(), 1),
            (b"quick".to_vec(), 1),
        ];
        record.field_mut("age").longs = vec![30, 10, 30];

        record.normalize();
        let tokens: [&[u8]; 4] = [b"quick", b"brown", b"quick", b"fox"];
        record.field_mut("body").set_token_order(tokens.into_iter());

        assert_eq!(record.fields[0].field, "age");
        assert_eq!(record.field("age").unwrap().longs, vec![10, 30]);

        let body = record.field("body").unwrap();
        assert_eq!(
            body.terms,
            vec![(b"brown".to_vec(), 1), (b"quick".to_vec(), 2)]
        );
        assert_eq!(body.token_order, vec![1, 0, 1]);
        let tokens: Vec<&[u8]> = body.tokens().collect();
        assert_eq!(tokens, vec![&b"quick"[..], b"brown", b"quick"]);
        assert!(body.contains_term(b"brown"));
        assert!(!body.contains_term(b"fox"));
    }

    #[test]
    fn test_encode_decode() {
        let mut record = EntryTermsRecord::default();
        let field = record.field_mut("n");
        field.terms = vec![(b"10".to_vec(), 1)];
        field.longs = vec![10];
        field.doubles = vec![10.0];
        record.normalize();

        let decoded = EntryTermsRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);

        let mut bytes = record.encode();
        bytes.push(0);
        assert!(EntryTermsRecord::decode(&bytes).is_err());
    }
}

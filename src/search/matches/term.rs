//! Postings of a single term.

use crate::error::Result;
use crate::index::postings::{PostingList, decode_small};
use crate::search::inspect::{QueryInspectionNode, display_term};
use crate::search::matches::{QueryCountConfidence, QueryMatch, retain_entries};
use crate::storage::{PostingSet, StoreState, TermTreeValue};

#[derive(Debug, Clone)]
enum TermPostings {
    Empty,
    Single(u64),
    Small(Vec<u64>),
    Set(PostingSet),
}

/// Every entry indexed under one term of one field.
#[derive(Debug, Clone)]
pub struct TermMatch {
    field: String,
    term: Vec<u8>,
    postings: TermPostings,
    count: u64,
    /// Last entry handed out by `fill`.
    last: Option<u64>,
    exhausted: bool,
}

impl TermMatch {
    /// Open the postings referenced by a term tree value. `None` yields an
    /// empty match.
    pub fn new(
        state: &StoreState,
        field: &str,
        term: Vec<u8>,
        value: Option<TermTreeValue>,
    ) -> Result<Self> {
        let postings = match value {
            None => TermPostings::Empty,
            Some(value) => match PostingList::unpack(value.postings)? {
                PostingList::Single(entry_id) => TermPostings::Single(entry_id),
                PostingList::Small(container) => {
                    let mut entries = Vec::new();
                    decode_small(state.container(container)?, &mut entries)?;
                    TermPostings::Small(entries)
                }
                PostingList::Set(container) => TermPostings::Set(state.posting_set(container)?),
            },
        };
        let count = match &postings {
            TermPostings::Empty => 0,
            TermPostings::Single(_) => 1,
            TermPostings::Small(entries) => entries.len() as u64,
            TermPostings::Set(set) => set.len(),
        };
        Ok(TermMatch {
            field: field.to_string(),
            term,
            postings,
            count,
            last: None,
            exhausted: count == 0,
        })
    }

    pub fn term(&self) -> &[u8] {
        &self.term
    }

    pub fn contains(&self, entry_id: u64) -> bool {
        match &self.postings {
            TermPostings::Empty => false,
            TermPostings::Single(id) => *id == entry_id,
            TermPostings::Small(entries) => entries.binary_search(&entry_id).is_ok(),
            TermPostings::Set(set) => set.contains(entry_id),
        }
    }

    /// Append every entry of the term, ascending, regardless of the fill
    /// position.
    pub fn append_all(&self, out: &mut Vec<u64>) {
        match &self.postings {
            TermPostings::Empty => {}
            TermPostings::Single(id) => out.push(*id),
            TermPostings::Small(entries) => out.extend_from_slice(entries),
            TermPostings::Set(set) => out.extend(set.iter_after(None)),
        }
    }
}

impl QueryMatch for TermMatch {
    fn count(&self) -> u64 {
        self.count
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::High
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        if self.exhausted || out.is_empty() {
            return Ok(0);
        }

        let written = match &self.postings {
            TermPostings::Empty => 0,
            TermPostings::Single(id) => {
                out[0] = *id;
                1
            }
            TermPostings::Small(entries) => {
                let start = match self.last {
                    Some(last) => entries.partition_point(|e| *e <= last),
                    None => 0,
                };
                let n = (entries.len() - start).min(out.len());
                out[..n].copy_from_slice(&entries[start..start + n]);
                n
            }
            TermPostings::Set(set) => {
                let mut n = 0;
                for (slot, entry) in out.iter_mut().zip(set.iter_after(self.last)) {
                    *slot = entry;
                    n += 1;
                }
                n
            }
        };

        if written == 0 {
            self.exhausted = true;
        } else {
            self.last = Some(out[written - 1]);
            if matches!(self.postings, TermPostings::Single(_)) {
                self.exhausted = true;
            }
        }
        Ok(written)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        Ok(retain_entries(buffer, len, |entry| self.contains(entry)))
    }

    fn score(&mut self, entries: &[u64], scores: &mut [f32], boost_factor: f32) -> Result<()> {
        for (entry, score) in entries.iter().zip(scores.iter_mut()) {
            if self.contains(*entry) {
                *score += boost_factor;
            }
        }
        Ok(())
    }

    fn inspect(&self) -> QueryInspectionNode {
        let representation = match &self.postings {
            TermPostings::Empty => "Empty",
            TermPostings::Single(_) => "Single",
            TermPostings::Small(_) => "Small",
            TermPostings::Set(_) => "Set",
        };
        QueryInspectionNode::new("Term")
            .with_parameter("field", &self.field)
            .with_parameter("term", display_term(&self.term))
            .with_parameter("postings", representation)
            .with_parameter("count", self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::postings::encode_small;
    use crate::storage::{StorageConfig, StorageEnvironment};

    fn value(postings: PostingList) -> Option<TermTreeValue> {
        Some(TermTreeValue {
            postings: postings.pack(),
            term_id: 0,
        })
    }

    #[test]
    fn test_fill_each_representation_in_batches() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();

        let mut blob = Vec::new();
        assert!(encode_small(&[2, 5, 9], 32, &mut blob));
        let small = txn.allocate(&blob);
        let set = txn.create_set(&(1..=10).collect::<Vec<_>>()).unwrap();

        let mut single = TermMatch::new(&txn, "f", b"a".to_vec(), value(PostingList::Single(7))).unwrap();
        assert_eq!(single.collect_all().unwrap(), vec![7]);

        let mut small = TermMatch::new(&txn, "f", b"b".to_vec(), value(PostingList::Small(small))).unwrap();
        let mut out = [0u64; 2];
        assert_eq!(small.fill(&mut out).unwrap(), 2);
        assert_eq!(out, [2, 5]);
        assert_eq!(small.fill(&mut out).unwrap(), 1);
        assert_eq!(out[0], 9);
        assert_eq!(small.fill(&mut out).unwrap(), 0);

        let mut set = TermMatch::new(&txn, "f", b"c".to_vec(), value(PostingList::Set(set))).unwrap();
        assert_eq!(set.count(), 10);
        let mut out = [0u64; 4];
        assert_eq!(set.fill(&mut out).unwrap(), 4);
        assert_eq!(set.collect_all().unwrap(), vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_and_with_keeps_fill_position() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let set = txn.create_set(&[2, 4, 6, 8]).unwrap();
        let mut term = TermMatch::new(&txn, "f", b"x".to_vec(), value(PostingList::Set(set))).unwrap();

        let mut out = [0u64; 1];
        term.fill(&mut out).unwrap();

        let mut buffer = [1, 2, 3, 4, 8];
        let len = term.and_with(&mut buffer, 5).unwrap();
        assert_eq!(&buffer[..len], &[2, 4, 8]);
        assert_eq!(term.collect_all().unwrap(), vec![4, 6, 8]);
    }

    #[test]
    fn test_missing_term_is_empty() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let snapshot = env.read_transaction();
        let mut term = TermMatch::new(&snapshot, "f", b"nope".to_vec(), None).unwrap();
        assert_eq!(term.count(), 0);
        assert!(term.collect_all().unwrap().is_empty());
    }
}

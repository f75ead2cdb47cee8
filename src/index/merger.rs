//! Commit merge: folding buffered term modifications into the term trees.
//!
//! Fields are prepared in parallel (their distinct terms extracted and
//! sorted), then merged one after another so every tree receives its keys
//! in strictly ascending order.

use log::{debug, trace};
use rayon::prelude::*;

use crate::error::Result;
use crate::index::config::WriterStats;
use crate::index::names;
use crate::index::postings::{PostingList, decode_small, encode_small};
use crate::index::term_buffer::{EntriesModifications, IndexedField};
use crate::storage::{DoubleKey, StoreState, TermTreeValue, TreeKey};

/// Terms of one field, sorted and ready to merge.
#[derive(Debug)]
pub(crate) struct PreparedField<'a> {
    pub name: &'a str,
    pub textual: Vec<(&'a [u8], &'a EntriesModifications)>,
    pub longs: Vec<(i64, &'a EntriesModifications)>,
    pub doubles: Vec<(DoubleKey, &'a EntriesModifications)>,
}

/// Extract and sort the terms of every non-empty field, in parallel.
/// Fields come back ordered by name.
pub(crate) fn prepare_fields(fields: &[IndexedField], parallel_threshold: usize) -> Vec<PreparedField<'_>> {
    let mut prepared: Vec<PreparedField<'_>> = fields
        .par_iter()
        .filter(|field| !field.is_empty())
        .map(|field| prepare_field(field, parallel_threshold))
        .collect();
    prepared.sort_by(|a, b| a.name.cmp(b.name));
    prepared
}

fn prepare_field(field: &IndexedField, parallel_threshold: usize) -> PreparedField<'_> {
    let mut textual: Vec<_> = field
        .textual()
        .iter()
        .map(|(term, mods)| (term.as_slice(), mods))
        .collect();
    sort_terms(&mut textual, parallel_threshold);

    let mut longs: Vec<_> = field.longs().iter().map(|(k, m)| (*k, m)).collect();
    sort_terms(&mut longs, parallel_threshold);

    let mut doubles: Vec<_> = field.doubles().iter().map(|(k, m)| (*k, m)).collect();
    sort_terms(&mut doubles, parallel_threshold);

    PreparedField {
        name: &field.name,
        textual,
        longs,
        doubles,
    }
}

fn sort_terms<K: Ord + Send, V: Send>(terms: &mut [(K, V)], parallel_threshold: usize) {
    if terms.len() >= parallel_threshold {
        terms.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
    } else {
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    }
}

/// Tree keys the merger can write. Textual keys also get a dictionary
/// container holding the term bytes, used by term sorting.
pub(crate) trait MergeKey: TreeKey {
    fn dictionary_bytes(&self) -> Option<&[u8]> {
        None
    }
}

impl MergeKey for Vec<u8> {
    fn dictionary_bytes(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl MergeKey for i64 {}

impl MergeKey for DoubleKey {}

/// Applies prepared fields to the store.
pub(crate) struct TermMerger<'a> {
    state: &'a mut StoreState,
    capacity: usize,
    stats: &'a mut WriterStats,
    scratch: Vec<u8>,
    entries: Vec<u64>,
}

impl<'a> TermMerger<'a> {
    pub fn new(state: &'a mut StoreState, capacity: usize, stats: &'a mut WriterStats) -> Self {
        TermMerger {
            state,
            capacity,
            stats,
            scratch: Vec::with_capacity(capacity),
            entries: Vec::new(),
        }
    }

    pub fn merge_field(&mut self, field: &PreparedField<'_>) -> Result<()> {
        self.merge_terms(
            &names::terms(field.name),
            field.textual.iter().map(|(term, mods)| (term.to_vec(), *mods)),
        )?;
        self.merge_terms(
            &names::long_terms(field.name),
            field.longs.iter().map(|(key, mods)| (*key, *mods)),
        )?;
        self.merge_terms(
            &names::double_terms(field.name),
            field.doubles.iter().map(|(key, mods)| (*key, *mods)),
        )?;

        debug!(
            "merged field '{}': {} textual, {} long, {} double terms",
            field.name,
            field.textual.len(),
            field.longs.len(),
            field.doubles.len()
        );
        Ok(())
    }

    fn merge_terms<'m, K: MergeKey>(
        &mut self,
        tree: &str,
        terms: impl Iterator<Item = (K, &'m EntriesModifications)>,
    ) -> Result<()> {
        for (key, mods) in terms {
            let additions = mods.additions();
            let removals = mods.removals(&additions);
            self.merge_term(tree, key, &additions, &removals)?;
        }
        Ok(())
    }

    /// Merge one term. `additions` and `removals` are ascending, distinct
    /// and disjoint.
    pub fn merge_term<K: MergeKey>(
        &mut self,
        tree: &str,
        key: K,
        additions: &[u64],
        removals: &[u64],
    ) -> Result<()> {
        let existing = self.state.tree::<K>(tree).and_then(|t| t.get(&key));

        let Some(existing) = existing else {
            if additions.is_empty() {
                return Ok(());
            }
            self.entries.clear();
            self.entries.extend_from_slice(additions);
            let list = self.add_new_term()?;
            let term_id = match key.dictionary_bytes() {
                Some(bytes) => self.state.allocate(bytes),
                None => 0,
            };
            trace!("new term {key:?} in '{tree}' as {list:?}");
            self.state.tree_mut::<K>(tree).insert(
                key,
                TermTreeValue {
                    postings: list.pack(),
                    term_id,
                },
            );
            self.stats.terms_added += 1;
            return Ok(());
        };

        let previous = PostingList::unpack(existing.postings)?;
        match previous {
            PostingList::Single(entry_id) => {
                if removals.is_empty() && additions.len() == 1 && additions[0] == entry_id {
                    return Ok(());
                }
                self.entries.clear();
                self.entries.push(entry_id);
                self.combine(additions, removals);
                self.replace_postings(tree, key, existing, previous)
            }
            PostingList::Small(container) => {
                self.entries.clear();
                decode_small(self.state.container(container)?, &mut self.entries)?;
                self.state.delete_container(container)?;
                self.combine(additions, removals);
                self.replace_postings(tree, key, existing, previous)
            }
            PostingList::Set(container) => {
                if additions.is_empty() && removals.is_empty() {
                    return Ok(());
                }
                let state = self.state.update_set(container, additions, removals)?;
                if state.count == 0 {
                    self.state.delete_set(container)?;
                    return self.remove_term(tree, &key, existing);
                }
                self.stats.terms_updated += 1;

                // A shrunk set may fit a smaller representation again.
                if state.count as usize <= self.capacity {
                    self.entries.clear();
                    self.entries
                        .extend(self.state.posting_set(container)?.iter_after(None));
                    if let Some(list) = self.try_compact()? {
                        self.state.delete_set(container)?;
                        trace!("term {key:?} in '{tree}': {previous:?} -> {list:?}");
                        self.state.tree_mut::<K>(tree).insert(
                            key,
                            TermTreeValue {
                                postings: list.pack(),
                                term_id: existing.term_id,
                            },
                        );
                        return Ok(());
                    }
                }
                self.stats.set_postings += 1;
                Ok(())
            }
        }
    }

    /// `entries := (entries ∪ additions) \ removals`, ascending and distinct.
    fn combine(&mut self, additions: &[u64], removals: &[u64]) {
        self.entries.extend_from_slice(additions);
        self.entries.sort_unstable();
        self.entries.dedup();
        if !removals.is_empty() {
            self.entries.retain(|e| removals.binary_search(e).is_err());
        }
    }

    fn replace_postings<K: MergeKey>(
        &mut self,
        tree: &str,
        key: K,
        existing: TermTreeValue,
        previous: PostingList,
    ) -> Result<()> {
        if self.entries.is_empty() {
            return self.remove_term(tree, &key, existing);
        }
        let list = self.add_new_term()?;
        trace!("term {key:?} in '{tree}': {previous:?} -> {list:?}");
        self.state.tree_mut::<K>(tree).insert(
            key,
            TermTreeValue {
                postings: list.pack(),
                term_id: existing.term_id,
            },
        );
        self.stats.terms_updated += 1;
        Ok(())
    }

    fn remove_term<K: MergeKey>(&mut self, tree: &str, key: &K, existing: TermTreeValue) -> Result<()> {
        self.state.tree_mut::<K>(tree).remove(key);
        if existing.term_id != 0 {
            self.state.delete_container(existing.term_id)?;
        }
        trace!("removed term {key:?} from '{tree}'");
        self.stats.terms_removed += 1;
        Ok(())
    }

    /// Persist `self.entries` (ascending, distinct, non-empty) in the
    /// smallest representation that holds them.
    fn add_new_term(&mut self) -> Result<PostingList> {
        if let Some(list) = self.try_compact()? {
            return Ok(list);
        }
        let container = self.state.create_set(&self.entries)?;
        self.stats.set_postings += 1;
        Ok(PostingList::Set(container))
    }

    fn try_compact(&mut self) -> Result<Option<PostingList>> {
        if self.entries.len() == 1 {
            self.stats.single_postings += 1;
            return Ok(Some(PostingList::Single(self.entries[0])));
        }
        if encode_small(&self.entries, self.capacity, &mut self.scratch) {
            let container = self.state.allocate(&self.scratch);
            self.stats.small_postings += 1;
            return Ok(Some(PostingList::Small(container)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageEnvironment};

    fn postings(state: &StoreState, key: &[u8]) -> Option<(PostingList, Vec<u64>)> {
        let value = state.tree::<Vec<u8>>("t")?.get(key)?;
        let list = PostingList::unpack(value.postings).unwrap();
        let mut entries = Vec::new();
        list.read_into(state, &mut entries).unwrap();
        Some((list, entries))
    }

    #[test]
    fn test_representation_follows_cardinality() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let mut stats = WriterStats::default();
        let mut merger = TermMerger::new(&mut txn, 32, &mut stats);

        merger.merge_term("t", b"x".to_vec(), &[1], &[]).unwrap();
        assert!(matches!(postings(merger.state, b"x"), Some((PostingList::Single(1), _))));

        merger.merge_term("t", b"x".to_vec(), &[2, 3], &[]).unwrap();
        let (list, entries) = postings(merger.state, b"x").unwrap();
        assert!(matches!(list, PostingList::Small(_)));
        assert_eq!(entries, vec![1, 2, 3]);

        let more: Vec<u64> = (4..=50).collect();
        merger.merge_term("t", b"x".to_vec(), &more, &[]).unwrap();
        let (list, entries) = postings(merger.state, b"x").unwrap();
        assert!(matches!(list, PostingList::Set(_)));
        assert_eq!(entries, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_readdition_is_noop() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let mut stats = WriterStats::default();
        let mut merger = TermMerger::new(&mut txn, 32, &mut stats);

        merger.merge_term("t", b"x".to_vec(), &[9], &[]).unwrap();
        merger.merge_term("t", b"x".to_vec(), &[9], &[]).unwrap();
        drop(merger);
        assert_eq!(stats.terms_added, 1);
        assert_eq!(stats.terms_updated, 0);
    }

    #[test]
    fn test_removals_shrink_and_delete() {
        let env = StorageEnvironment::new(StorageConfig::default());
        let mut txn = env.write_transaction();
        let mut stats = WriterStats::default();
        let mut merger = TermMerger::new(&mut txn, 32, &mut stats);

        let all: Vec<u64> = (1..=40).collect();
        merger.merge_term("t", b"x".to_vec(), &all, &[]).unwrap();
        assert!(matches!(postings(merger.state, b"x"), Some((PostingList::Set(_), _))));

        let gone: Vec<u64> = (3..=40).collect();
        merger.merge_term("t", b"x".to_vec(), &[], &gone).unwrap();
        let (list, entries) = postings(merger.state, b"x").unwrap();
        assert!(matches!(list, PostingList::Small(_)));
        assert_eq!(entries, vec![1, 2]);

        merger.merge_term("t", b"x".to_vec(), &[], &[1]).unwrap();
        assert!(matches!(postings(merger.state, b"x"), Some((PostingList::Single(2), _))));

        merger.merge_term("t", b"x".to_vec(), &[], &[2]).unwrap();
        assert!(postings(merger.state, b"x").is_none());
        drop(merger);
        assert_eq!(stats.terms_removed, 1);
        // Postings blobs, set blocks and the term dictionary are all freed.
        assert_eq!(txn.containers().len(), 0);
    }

    #[test]
    fn test_prepared_terms_are_ascending() {
        let mut field = IndexedField::dynamic("f".to_string());
        for (slot, term) in [&b"delta"[..], b"alpha", b"charlie", b"bravo"].iter().enumerate() {
            field.insert_text(slot as u64 + 1, slot as u32, term);
            field.insert_long(slot as u64 + 1, slot as u32, 10 - slot as i64);
        }

        for threshold in [1, usize::MAX] {
            let prepared = prepare_fields(std::slice::from_ref(&field), threshold);
            let keys: Vec<&[u8]> = prepared[0].textual.iter().map(|(t, _)| *t).collect();
            assert_eq!(keys, vec![&b"alpha"[..], b"bravo", b"charlie", b"delta"]);
            assert!(prepared[0].longs.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }
}

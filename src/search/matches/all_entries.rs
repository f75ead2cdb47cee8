//! Every live entry of the index.

use std::sync::Arc;

use crate::error::Result;
use crate::index::names;
use crate::search::inspect::QueryInspectionNode;
use crate::search::matches::{QueryCountConfidence, QueryMatch, retain_entries};
use crate::storage::{Lookup, StoreState};

#[derive(Debug, Clone)]
pub struct AllEntriesMatch {
    entries: Option<Arc<Lookup>>,
    last: Option<u64>,
    done: bool,
}

impl AllEntriesMatch {
    pub fn new(state: &StoreState) -> Self {
        let entries = state.lookup(names::ENTRIES);
        AllEntriesMatch {
            done: entries.is_none(),
            entries,
            last: None,
        }
    }
}

impl QueryMatch for AllEntriesMatch {
    fn count(&self) -> u64 {
        self.entries.as_ref().map_or(0, |l| l.len() as u64)
    }

    fn confidence(&self) -> QueryCountConfidence {
        QueryCountConfidence::High
    }

    fn fill(&mut self, out: &mut [u64]) -> Result<usize> {
        let Some(entries) = self.entries.as_ref().filter(|_| !self.done) else {
            return Ok(0);
        };
        let mut n = 0;
        for (slot, entry) in out.iter_mut().zip(entries.keys_after(self.last)) {
            *slot = entry;
            n += 1;
        }
        if n == 0 {
            self.done = true;
        } else {
            self.last = Some(out[n - 1]);
        }
        Ok(n)
    }

    fn and_with(&mut self, buffer: &mut [u64], len: usize) -> Result<usize> {
        let Some(entries) = self.entries.as_ref() else {
            return Ok(0);
        };
        Ok(retain_entries(buffer, len, |e| entries.get(e).is_some()))
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("AllEntries").with_parameter("count", self.count())
    }
}

//! Paged blob allocator.
//!
//! Containers are addressed by a non-zero [`ContainerId`]. Slots are grouped
//! into pages held behind `Arc`, so cloning the store for a new write
//! transaction is proportional to the number of pages and a mutation only
//! copies the page it touches.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::StorageError;

/// Identifier of an allocated container. Zero is never allocated.
pub type ContainerId = u64;

#[derive(Debug, Clone, Default)]
struct ContainerPage {
    slots: Vec<Option<Box<[u8]>>>,
    live: usize,
}

/// Copy-on-write container allocator.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    page_slots: u64,
    pages: BTreeMap<u64, Arc<ContainerPage>>,
    next_id: ContainerId,
    live: usize,
}

impl ContainerStore {
    pub fn new(page_slots: usize) -> Self {
        ContainerStore {
            page_slots: page_slots.max(1) as u64,
            pages: BTreeMap::new(),
            next_id: 1,
            live: 0,
        }
    }

    /// Number of live containers.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn locate(&self, id: ContainerId) -> (u64, usize) {
        (id / self.page_slots, (id % self.page_slots) as usize)
    }

    /// Allocate a zero-filled container of `size` bytes and hand back its
    /// writable span.
    pub fn allocate(&mut self, size: usize) -> (ContainerId, &mut [u8]) {
        let id = self.next_id;
        self.next_id += 1;
        self.live += 1;

        let (page_no, slot) = self.locate(id);
        let page_slots = self.page_slots as usize;
        let page = Arc::make_mut(self.pages.entry(page_no).or_insert_with(|| {
            Arc::new(ContainerPage {
                slots: vec![None; page_slots],
                live: 0,
            })
        }));
        page.live += 1;
        let data = page.slots[slot].insert(vec![0u8; size].into_boxed_slice());
        (id, data)
    }

    /// Allocate a container holding a copy of `bytes`.
    pub fn store(&mut self, bytes: &[u8]) -> ContainerId {
        let (id, span) = self.allocate(bytes.len());
        span.copy_from_slice(bytes);
        id
    }

    pub fn get(&self, id: ContainerId) -> Result<&[u8], StorageError> {
        let (page_no, slot) = self.locate(id);
        self.pages
            .get(&page_no)
            .and_then(|page| page.slots.get(slot))
            .and_then(|slot| slot.as_deref())
            .ok_or(StorageError::ContainerNotFound(id))
    }

    pub fn get_mut(&mut self, id: ContainerId) -> Result<&mut [u8], StorageError> {
        let (page_no, slot) = self.locate(id);
        let page = self
            .pages
            .get_mut(&page_no)
            .ok_or(StorageError::ContainerNotFound(id))?;
        if page.slots.get(slot).is_none_or(|s| s.is_none()) {
            return Err(StorageError::ContainerNotFound(id));
        }
        Arc::make_mut(page).slots[slot]
            .as_deref_mut()
            .ok_or(StorageError::ContainerNotFound(id))
    }

    pub fn delete(&mut self, id: ContainerId) -> Result<(), StorageError> {
        let (page_no, slot) = self.locate(id);
        let page = self
            .pages
            .get_mut(&page_no)
            .ok_or(StorageError::ContainerNotFound(id))?;
        if page.slots.get(slot).is_none_or(|s| s.is_none()) {
            return Err(StorageError::ContainerNotFound(id));
        }

        let page = Arc::make_mut(page);
        page.slots[slot] = None;
        page.live -= 1;
        self.live -= 1;
        if page.live == 0 {
            self.pages.remove(&page_no);
        }
        Ok(())
    }

    /// Batched read. Id `0` resolves to `None`; any other missing id is an
    /// error.
    pub fn get_all<'a>(
        &'a self,
        ids: &[ContainerId],
        out: &mut Vec<Option<&'a [u8]>>,
    ) -> Result<(), StorageError> {
        out.clear();
        out.reserve(ids.len());
        for &id in ids {
            if id == 0 {
                out.push(None);
            } else {
                out.push(Some(self.get(id)?));
            }
        }
        Ok(())
    }
}

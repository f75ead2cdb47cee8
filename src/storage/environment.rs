//! Store state and transaction lifecycle.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::Result;
use crate::storage::tree::TreeCatalog;
use crate::storage::{
    ContainerId, ContainerStore, Lookup, PostingSet, SetState, StorageConfig, StorageError,
    TermTree, TreeKey,
};

/// Everything a transaction can see: containers, term trees, lookups, sets
/// and small metadata blobs.
///
/// Read accessors take `&self` and are available on both transaction kinds;
/// mutators take `&mut self` and are only reachable through a
/// [`WriteTransaction`].
#[derive(Debug, Clone)]
pub struct StoreState {
    containers: ContainerStore,
    trees: TreeCatalog,
    lookups: BTreeMap<String, Arc<Lookup>>,
    sets: BTreeMap<u64, Arc<BTreeSet<u64>>>,
    metadata: BTreeMap<String, Vec<u8>>,
    next_set_root: u64,
    next_entry_id: u64,
}

impl StoreState {
    fn new(config: &StorageConfig) -> Self {
        StoreState {
            containers: ContainerStore::new(config.container_page_slots),
            trees: TreeCatalog::default(),
            lookups: BTreeMap::new(),
            sets: BTreeMap::new(),
            metadata: BTreeMap::new(),
            next_set_root: 1,
            next_entry_id: 1,
        }
    }

    pub fn containers(&self) -> &ContainerStore {
        &self.containers
    }

    pub fn container(&self, id: ContainerId) -> Result<&[u8]> {
        Ok(self.containers.get(id)?)
    }

    pub fn tree<K: TreeKey>(&self, name: &str) -> Option<Arc<TermTree<K>>> {
        K::trees(&self.trees).get(name).cloned()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Lookup>> {
        self.lookups.get(name).cloned()
    }

    pub fn metadata(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(Vec::as_slice)
    }

    /// Open the posting set whose state block lives in `container_id`.
    pub fn posting_set(&self, container_id: ContainerId) -> Result<PostingSet> {
        let state = SetState::read_from(self.containers.get(container_id)?)?;
        let entries = self
            .sets
            .get(&state.root)
            .cloned()
            .ok_or(StorageError::SetNotFound(state.root))?;
        Ok(PostingSet::new(state, entries))
    }

    pub fn allocate(&mut self, bytes: &[u8]) -> ContainerId {
        self.containers.store(bytes)
    }

    pub fn allocate_span(&mut self, size: usize) -> (ContainerId, &mut [u8]) {
        self.containers.allocate(size)
    }

    pub fn container_mut(&mut self, id: ContainerId) -> Result<&mut [u8]> {
        Ok(self.containers.get_mut(id)?)
    }

    pub fn delete_container(&mut self, id: ContainerId) -> Result<()> {
        Ok(self.containers.delete(id)?)
    }

    /// Mutable access to a term tree, created empty on first use.
    pub fn tree_mut<K: TreeKey>(&mut self, name: &str) -> &mut TermTree<K> {
        Arc::make_mut(K::trees_mut(&mut self.trees).entry(name.to_string()).or_default())
    }

    /// Mutable access to a lookup, created empty on first use.
    pub fn lookup_mut(&mut self, name: &str) -> &mut Lookup {
        Arc::make_mut(self.lookups.entry(name.to_string()).or_default())
    }

    pub fn set_metadata(&mut self, key: &str, value: Vec<u8>) {
        self.metadata.insert(key.to_string(), value);
    }

    /// Create a posting set holding `entries` and return the id of its state
    /// container.
    pub fn create_set(&mut self, entries: &[u64]) -> Result<ContainerId> {
        let root = self.next_set_root;
        self.next_set_root += 1;

        let set: BTreeSet<u64> = entries.iter().copied().collect();
        let state = SetState {
            root,
            count: set.len() as u64,
        };
        self.sets.insert(root, Arc::new(set));

        let (id, span) = self.containers.allocate(SetState::SIZE);
        state.write_to(span)?;
        trace!("created posting set {root} with {} entries", state.count);
        Ok(id)
    }

    /// Union `additions` into the set, then drop `removals`, and persist the
    /// new state block in place.
    pub fn update_set(
        &mut self,
        container_id: ContainerId,
        additions: &[u64],
        removals: &[u64],
    ) -> Result<SetState> {
        let mut state = SetState::read_from(self.containers.get(container_id)?)?;
        let set = self
            .sets
            .get_mut(&state.root)
            .ok_or(StorageError::SetNotFound(state.root))?;
        let set = Arc::make_mut(set);
        set.extend(additions.iter().copied());
        for entry in removals {
            set.remove(entry);
        }
        state.count = set.len() as u64;

        state.write_to(self.containers.get_mut(container_id)?)?;
        Ok(state)
    }

    pub fn delete_set(&mut self, container_id: ContainerId) -> Result<()> {
        let state = SetState::read_from(self.containers.get(container_id)?)?;
        self.sets.remove(&state.root);
        self.containers.delete(container_id)?;
        Ok(())
    }

    /// Hand out the next entry id.
    pub fn allocate_entry_id(&mut self) -> u64 {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        id
    }

    /// Make sure future allocations never return `entry_id`.
    pub fn reserve_entry_id(&mut self, entry_id: u64) {
        self.next_entry_id = self.next_entry_id.max(entry_id.saturating_add(1));
    }
}

#[derive(Debug)]
struct EnvironmentInner {
    config: StorageConfig,
    committed: RwLock<Arc<StoreState>>,
    writer_active: Mutex<bool>,
    writer_released: Condvar,
}

/// Owner of one store: hands out snapshot readers and a single writer.
#[derive(Debug, Clone)]
pub struct StorageEnvironment {
    inner: Arc<EnvironmentInner>,
}

impl StorageEnvironment {
    pub fn new(config: StorageConfig) -> Self {
        let state = StoreState::new(&config);
        StorageEnvironment {
            inner: Arc::new(EnvironmentInner {
                config,
                committed: RwLock::new(Arc::new(state)),
                writer_active: Mutex::new(false),
                writer_released: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    /// Snapshot of the last committed state.
    pub fn read_transaction(&self) -> ReadTransaction {
        ReadTransaction {
            state: Arc::clone(&self.inner.committed.read()),
        }
    }

    /// Open the write transaction, waiting for any active writer to finish.
    pub fn write_transaction(&self) -> WriteTransaction {
        let mut active = self.inner.writer_active.lock();
        while *active {
            self.inner.writer_released.wait(&mut active);
        }
        *active = true;
        drop(active);
        self.begin_write()
    }

    /// Open the write transaction, failing if another writer is active.
    pub fn try_write_transaction(&self) -> Result<WriteTransaction> {
        let mut active = self.inner.writer_active.lock();
        if *active {
            return Err(StorageError::WriterBusy.into());
        }
        *active = true;
        drop(active);
        Ok(self.begin_write())
    }

    fn begin_write(&self) -> WriteTransaction {
        let state = StoreState::clone(&self.inner.committed.read());
        WriteTransaction {
            env: Arc::clone(&self.inner),
            state,
        }
    }
}

/// Immutable snapshot of a committed state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReadTransaction {
    state: Arc<StoreState>,
}

impl Deref for ReadTransaction {
    type Target = StoreState;

    fn deref(&self) -> &StoreState {
        &self.state
    }
}

/// Private working copy of the store. Changes become visible to new read
/// transactions only after [`WriteTransaction::commit`]; dropping the
/// transaction discards them.
#[derive(Debug)]
pub struct WriteTransaction {
    env: Arc<EnvironmentInner>,
    state: StoreState,
}

impl WriteTransaction {
    pub fn commit(mut self) -> Result<()> {
        let empty = StoreState::new(&self.env.config);
        let state = std::mem::replace(&mut self.state, empty);
        debug!(
            "committing write transaction: {} containers, {} lookups",
            state.containers.len(),
            state.lookups.len()
        );
        *self.env.committed.write() = Arc::new(state);
        Ok(())
    }

    /// Discard all changes.
    pub fn rollback(self) {
        debug!("rolling back write transaction");
    }

    /// Snapshot of the transaction's own uncommitted state.
    pub fn snapshot(&self) -> ReadTransaction {
        ReadTransaction {
            state: Arc::new(self.state.clone()),
        }
    }
}

impl Deref for WriteTransaction {
    type Target = StoreState;

    fn deref(&self) -> &StoreState {
        &self.state
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut StoreState {
        &mut self.state
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        *self.env.writer_active.lock() = false;
        self.env.writer_released.notify_one();
    }
}

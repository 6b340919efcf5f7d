use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use chainlog_types::Block;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// In-memory, `BTreeMap`-based block store.
///
/// Intended for tests and embedding. Records live behind a `RwLock`; the
/// map's key order gives `list_ordered` for free. `fail_next_puts` makes the
/// next writes fail without touching the map, to exercise error paths.
pub struct InMemoryBlockStore {
    blocks: RwLock<BTreeMap<u64, Block>>,
    failing_puts: AtomicU32,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(BTreeMap::new()),
            failing_puts: AtomicU32::new(0),
        }
    }

    /// Make the next `count` calls to `put` fail with [`StoreError::Injected`].
    pub fn fail_next_puts(&self, count: u32) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Block stored under `index`, if any.
    pub fn get(&self, index: u64) -> StoreResult<Option<Block>> {
        let map = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(&index).cloned())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn put(&self, index: u64, block: &Block) -> StoreResult<()> {
        if block.index() != index {
            return Err(StoreError::IndexMismatch {
                key: index,
                record: block.index(),
            });
        }
        if self.take_injected_failure() {
            return Err(StoreError::Injected(format!("put of block {index}")));
        }

        let mut map = self.blocks.write().map_err(|_| StoreError::LockPoisoned)?;
        if map.contains_key(&index) {
            return Err(StoreError::AlreadyExists { index });
        }
        map.insert(index, block.clone());
        Ok(())
    }

    fn list_ordered(&self) -> StoreResult<Vec<Block>> {
        let map = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.values().cloned().collect())
    }

    fn len(&self) -> StoreResult<u64> {
        let map = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.len() as u64)
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blocks.read().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(index: u64) -> Block {
        Block::with_timestamp(index, 100 + index, json!({"n": index}), "0")
    }

    #[test]
    fn put_and_list_in_index_order() {
        let store = InMemoryBlockStore::new();
        for i in [2, 0, 1] {
            store.put(i, &block(i)).unwrap();
        }
        let indices: Vec<u64> = store.list_ordered().unwrap().iter().map(Block::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn put_is_write_once() {
        let store = InMemoryBlockStore::new();
        store.put(0, &block(0)).unwrap();
        let err = store.put(0, &block(0)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { index: 0 }));
    }

    #[test]
    fn put_rejects_mismatched_key() {
        let store = InMemoryBlockStore::new();
        let err = store.put(4, &block(3)).unwrap_err();
        assert!(matches!(err, StoreError::IndexMismatch { key: 4, record: 3 }));
        assert!(store.get(4).unwrap().is_none());
    }

    #[test]
    fn injected_failures_leave_store_untouched() {
        let store = InMemoryBlockStore::new();
        store.fail_next_puts(2);
        assert!(matches!(store.put(0, &block(0)), Err(StoreError::Injected(_))));
        assert!(matches!(store.put(0, &block(0)), Err(StoreError::Injected(_))));
        assert_eq!(store.len().unwrap(), 0);

        store.put(0, &block(0)).unwrap();
        assert_eq!(store.get(0).unwrap(), Some(block(0)));
    }

    #[test]
    fn works_through_arc() {
        let store = std::sync::Arc::new(InMemoryBlockStore::new());
        let handle: &dyn BlockStore = &store;
        handle.put(0, &block(0)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(handle.describe(), "memory");
    }
}

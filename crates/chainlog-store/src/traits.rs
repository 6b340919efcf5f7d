use std::sync::Arc;

use chainlog_types::Block;

use crate::error::StoreResult;

/// Write-once block storage keyed by index.
///
/// All implementations must satisfy these invariants:
/// - `put` is all-or-nothing: after an error, no record for that index is
///   visible to `list_ordered`, now or after a restart.
/// - `put` never overwrites. An existing index yields
///   [`crate::StoreError::AlreadyExists`].
/// - `list_ordered` returns blocks sorted by ascending index.
/// - Stored hashes are returned verbatim, never recomputed.
pub trait BlockStore: Send + Sync {
    /// Make the storage location usable (create directories, open files).
    ///
    /// Called once by the ledger before anything else. Must be idempotent.
    fn initialize(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Persist `block` under `index`.
    fn put(&self, index: u64, block: &Block) -> StoreResult<()>;

    /// Every persisted block, in ascending index order.
    fn list_ordered(&self) -> StoreResult<Vec<Block>>;

    /// Number of persisted blocks.
    ///
    /// Default implementation enumerates everything. Backends may override.
    fn len(&self) -> StoreResult<u64> {
        Ok(self.list_ordered()?.len() as u64)
    }

    /// Short human-readable description (backend and location).
    fn describe(&self) -> String;
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn initialize(&self) -> StoreResult<()> {
        (**self).initialize()
    }

    fn put(&self, index: u64, block: &Block) -> StoreResult<()> {
        (**self).put(index, block)
    }

    fn list_ordered(&self) -> StoreResult<Vec<Block>> {
        (**self).list_ordered()
    }

    fn len(&self) -> StoreResult<u64> {
        (**self).len()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: BlockStore + ?Sized> BlockStore for Box<S> {
    fn initialize(&self) -> StoreResult<()> {
        (**self).initialize()
    }

    fn put(&self, index: u64, block: &Block) -> StoreResult<()> {
        (**self).put(index, block)
    }

    fn list_ordered(&self) -> StoreResult<Vec<Block>> {
        (**self).list_ordered()
    }

    fn len(&self) -> StoreResult<u64> {
        (**self).len()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

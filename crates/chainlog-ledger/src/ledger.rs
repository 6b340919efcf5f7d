use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chainlog_store::BlockStore;
use chainlog_types::{Block, ChainVerifier, CorruptionError, IntegrityReport};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{LedgerError, LedgerResult};
use crate::options::LedgerOptions;
use crate::status::LedgerStatus;

/// Hash-chained, append-only ledger over a [`BlockStore`].
///
/// # Concurrency
///
/// `append` is a read-tail-then-write-next operation. The `writer` mutex is
/// held from reading the tail until the new block is committed to memory, and
/// it is the only serialization point in the ledger. The committed chain sits
/// behind an `RwLock` that is write-locked only for the final push, so
/// readers (`verify`, `audit`, `blocks`, ...) see a consistent snapshot and
/// proceed while an append is persisting.
///
/// # Durability
///
/// A block is persisted before it is committed to memory. If the store
/// rejects the write, the in-memory chain is unchanged and the error is
/// returned to the caller.
pub struct Ledger<S: BlockStore> {
    store: S,
    options: LedgerOptions,
    writer: Mutex<()>,
    state: RwLock<ChainState>,
}

struct ChainState {
    status: LedgerStatus,
    blocks: Vec<Block>,
}

impl ChainState {
    fn require(
        &self,
        operation: &'static str,
        allowed: fn(LedgerStatus) -> bool,
    ) -> LedgerResult<()> {
        if allowed(self.status) {
            Ok(())
        } else {
            Err(LedgerError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }
}

impl<S: BlockStore> Ledger<S> {
    /// An `Uninitialized` ledger. Call [`Ledger::load`] before use.
    pub fn new(store: S, options: LedgerOptions) -> Self {
        Self {
            store,
            options,
            writer: Mutex::new(()),
            state: RwLock::new(ChainState {
                status: LedgerStatus::Uninitialized,
                blocks: Vec::new(),
            }),
        }
    }

    /// Build and load a ledger in one step.
    pub fn open(store: S, options: LedgerOptions) -> LedgerResult<Self> {
        let ledger = Self::new(store, options);
        ledger.load()?;
        Ok(ledger)
    }

    /// Load the persisted chain, bootstrapping genesis on empty storage.
    ///
    /// On success the ledger is `Ready`. Storage failures leave it `Failed`.
    /// With `verify_on_load`, a chain that fails verification leaves it
    /// `Corrupted` and the corruption is returned.
    pub fn load(&self) -> LedgerResult<()> {
        let _writer = self.writer.lock().map_err(|_| LedgerError::LockPoisoned)?;
        {
            let mut state = self.write_state()?;
            state.require("load", |s| s == LedgerStatus::Uninitialized)?;
            state.status = LedgerStatus::Loading;
        }

        let loaded = self.read_or_bootstrap();
        let mut state = self.write_state()?;
        match loaded {
            Ok(blocks) => {
                state.blocks = blocks;
                state.status = LedgerStatus::Ready;
            }
            Err(e) => {
                error!(store = %self.store.describe(), error = %e, "ledger load failed");
                state.status = LedgerStatus::Failed;
                return Err(e);
            }
        }
        drop(state);

        if self.options.verify_on_load {
            self.verify()?;
        }
        Ok(())
    }

    fn read_or_bootstrap(&self) -> LedgerResult<Vec<Block>> {
        self.store.initialize().map_err(LedgerError::Bootstrap)?;

        let mut blocks = self.store.list_ordered().map_err(LedgerError::Storage)?;
        if blocks.is_empty() {
            let genesis = Block::genesis();
            self.store
                .put(genesis.index(), &genesis)
                .map_err(LedgerError::Bootstrap)?;
            info!(store = %self.store.describe(), hash = %genesis.hash(), "genesis block created");
            return Ok(vec![genesis]);
        }

        blocks.sort_by_key(Block::index);
        info!(
            store = %self.store.describe(),
            blocks = blocks.len(),
            tail = blocks.last().map(Block::short_hash).unwrap_or_default(),
            "ledger loaded"
        );
        Ok(blocks)
    }

    /// Append `data` as the next block and return it.
    ///
    /// The returned block's hash is the audit reference for the event.
    pub fn append(&self, data: Value) -> LedgerResult<Block> {
        let _writer = self.writer.lock().map_err(|_| LedgerError::LockPoisoned)?;

        let (index, previous_hash) = {
            let state = self.read_state()?;
            state.require("append", |s| s == LedgerStatus::Ready)?;
            let last = state.blocks.last().ok_or(LedgerError::EmptyChain)?;
            let next = last
                .index()
                .checked_add(1)
                .ok_or(LedgerError::IndexExhausted { last: last.index() })?;
            (next, last.hash().to_owned())
        };

        let block = Block::new(index, data, previous_hash);
        self.store.put(index, &block).map_err(LedgerError::Storage)?;

        self.write_state()?.blocks.push(block.clone());
        debug!(index, hash = %block.hash(), "block appended");
        Ok(block)
    }

    /// The tail block.
    pub fn last_block(&self) -> LedgerResult<Block> {
        let state = self.readable_state("read")?;
        state.blocks.last().cloned().ok_or(LedgerError::EmptyChain)
    }

    /// Verify the whole chain, failing at the first broken block.
    ///
    /// A failure moves the ledger to `Corrupted`; it will accept no more
    /// appends. Corruption is never repaired.
    pub fn verify(&self) -> LedgerResult<()> {
        let outcome = {
            let state = self.readable_state("verify")?;
            ChainVerifier::verify(&state.blocks)
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(corruption) => {
                self.mark_corrupted(&corruption)?;
                Err(LedgerError::Corruption(corruption))
            }
        }
    }

    /// Audit the whole chain, listing every violation.
    ///
    /// Unlike [`Ledger::verify`], this does not change the ledger's status.
    pub fn audit(&self) -> LedgerResult<IntegrityReport> {
        let state = self.readable_state("audit")?;
        Ok(ChainVerifier::report(&state.blocks))
    }

    pub fn status(&self) -> LedgerResult<LedgerStatus> {
        Ok(self.read_state()?.status)
    }

    /// Number of committed blocks, genesis included.
    pub fn len(&self) -> LedgerResult<u64> {
        Ok(self.readable_state("read")?.blocks.len() as u64)
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Block at chain position `index`.
    pub fn get(&self, index: u64) -> LedgerResult<Option<Block>> {
        let state = self.readable_state("read")?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| state.blocks.get(i))
            .cloned())
    }

    /// Block whose stored hash equals `hash`.
    pub fn find_by_hash(&self, hash: &str) -> LedgerResult<Option<Block>> {
        let state = self.readable_state("read")?;
        Ok(state.blocks.iter().find(|b| b.hash() == hash).cloned())
    }

    /// Blocks with positions in `from..=to`. Out-of-range bounds are clamped.
    pub fn range(&self, from: u64, to: u64) -> LedgerResult<Vec<Block>> {
        let state = self.readable_state("read")?;
        let len = state.blocks.len();
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(len);
        let end = usize::try_from(to)
            .unwrap_or(usize::MAX)
            .saturating_add(1)
            .min(len);
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(state.blocks[start..end].to_vec())
    }

    /// Snapshot of the whole committed chain.
    pub fn blocks(&self) -> LedgerResult<Vec<Block>> {
        Ok(self.readable_state("read")?.blocks.clone())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    fn mark_corrupted(&self, corruption: &CorruptionError) -> LedgerResult<()> {
        let mut state = self.write_state()?;
        if state.status != LedgerStatus::Corrupted {
            error!(
                store = %self.store.describe(),
                index = corruption.index,
                invariant = %corruption.invariant,
                detail = %corruption.detail,
                "ledger integrity check failed; refusing further appends"
            );
        }
        state.status = LedgerStatus::Corrupted;
        Ok(())
    }

    fn readable_state(
        &self,
        operation: &'static str,
    ) -> LedgerResult<RwLockReadGuard<'_, ChainState>> {
        let state = self.read_state()?;
        state.require(operation, LedgerStatus::is_readable)?;
        Ok(state)
    }

    fn read_state(&self) -> LedgerResult<RwLockReadGuard<'_, ChainState>> {
        self.state.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_state(&self) -> LedgerResult<RwLockWriteGuard<'_, ChainState>> {
        self.state.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl<S: BlockStore> std::fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Ledger");
        d.field("store", &self.store.describe());
        if let Ok(state) = self.state.read() {
            d.field("status", &state.status)
                .field("blocks", &state.blocks.len());
        }
        d.finish()
    }
}

use chainlog_store::StoreError;
use chainlog_types::CorruptionError;

use crate::status::LedgerStatus;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Storage could not be made usable, or genesis could not be persisted.
    #[error("ledger bootstrap failed: {0}")]
    Bootstrap(#[source] StoreError),

    /// A block record could not be read or written. Nothing was committed.
    #[error("ledger storage error: {0}")]
    Storage(#[source] StoreError),

    /// The chain violates an invariant and must not be trusted.
    #[error(transparent)]
    Corruption(#[from] CorruptionError),

    /// The operation is not allowed in the ledger's current state.
    #[error("cannot {operation} while ledger is {status}")]
    InvalidState {
        operation: &'static str,
        status: LedgerStatus,
    },

    #[error("ledger chain is empty")]
    EmptyChain,

    /// The tail index is `u64::MAX`; no further block can be numbered.
    #[error("block index space exhausted after index {last}")]
    IndexExhausted { last: u64 },

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    /// Returns `true` if the failure means the chain itself is untrusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corruption(_)
                | Self::InvalidState {
                    status: LedgerStatus::Corrupted,
                    ..
                }
        )
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

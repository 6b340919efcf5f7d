/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record already exists for this index. Blocks are write-once.
    #[error("block {index} is already persisted")]
    AlreadyExists { index: u64 },

    /// The key a block was written under differs from its own index.
    #[error("block with index {record} cannot be stored under key {key}")]
    IndexMismatch { key: u64, record: u64 },

    /// A persisted record cannot be decoded.
    #[error("malformed record at {location}: {reason}")]
    Malformed { location: String, reason: String },

    /// A complete log frame failed its integrity check.
    #[error("corrupt log frame at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The store was used before `initialize`.
    #[error("store is not initialized")]
    NotInitialized,

    /// A store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Failure injected by a test backend.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

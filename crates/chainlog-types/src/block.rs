use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::hasher::BlockHasher;

/// `previous_hash` sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Payload message of the genesis block.
pub const GENESIS_MESSAGE: &str = "Genesis Block";

/// One immutable, hash-linked ledger entry.
///
/// Blocks built from fresh data compute their own hash. Blocks rebuilt from
/// storage (via serde or [`Block::from_parts`]) keep the stored hash verbatim,
/// so tampering stays detectable by [`crate::ChainVerifier`].
///
/// Persisted form:
/// ```json
/// {"index": 1, "timestamp": 1700000000000, "data": {..}, "previous_hash": "..", "hash": ".."}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    /// Milliseconds since the UNIX epoch.
    timestamp: u64,
    data: Value,
    previous_hash: String,
    hash: String,
}

impl Block {
    /// Build a block stamped with the current time.
    pub fn new(index: u64, data: Value, previous_hash: impl Into<String>) -> Self {
        Self::with_timestamp(index, now_millis(), data, previous_hash)
    }

    /// Build a block with an explicit timestamp.
    pub fn with_timestamp(
        index: u64,
        timestamp: u64,
        data: Value,
        previous_hash: impl Into<String>,
    ) -> Self {
        let previous_hash = previous_hash.into();
        let hash = BlockHasher::block_hash(index, timestamp, &data, &previous_hash);
        Self {
            index,
            timestamp,
            data,
            previous_hash,
            hash,
        }
    }

    /// The genesis block: index 0, sentinel previous hash, fixed payload.
    pub fn genesis() -> Self {
        Self::new(
            0,
            json!({ "message": GENESIS_MESSAGE }),
            GENESIS_PREVIOUS_HASH,
        )
    }

    /// Rebuild a block from persisted fields. The hash is not recomputed.
    pub fn from_parts(
        index: u64,
        timestamp: u64,
        data: Value,
        previous_hash: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp,
            data,
            previous_hash: previous_hash.into(),
            hash: hash.into(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// The stored hash, as constructed or as read from storage.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Hash recomputed from the block's current contents.
    pub fn recompute_hash(&self) -> String {
        BlockHasher::block_hash(self.index, self.timestamp, &self.data, &self.previous_hash)
    }

    /// Returns `true` if the stored hash matches the contents.
    pub fn is_hash_valid(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    /// Creation time as a UTC datetime, if the timestamp is representable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// First 12 hex characters of the hash, for display.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..12).unwrap_or(&self.hash)
    }
}

/// Wall-clock milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

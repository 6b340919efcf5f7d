use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::{write_str, write_value};

/// SHA-256 block hasher.
///
/// A block's hash is the lowercase hex SHA-256 digest of the canonical JSON
/// encoding of `{data, index, previous_hash, timestamp}`. The stored `hash`
/// field itself is never part of the preimage.
pub struct BlockHasher;

impl BlockHasher {
    /// Length of a hex-encoded digest.
    pub const HEX_LEN: usize = 64;

    /// Canonical preimage for a block's header fields.
    ///
    /// Equal to `canonical_json(&json!({"index": .., "timestamp": .., "data": ..,
    /// "previous_hash": ..}))`, written directly so `data` is not cloned.
    pub fn preimage(index: u64, timestamp: u64, data: &Value, previous_hash: &str) -> String {
        let mut out = String::with_capacity(128);
        out.push_str("{\"data\":");
        write_value(data, &mut out);
        out.push_str(",\"index\":");
        out.push_str(&index.to_string());
        out.push_str(",\"previous_hash\":");
        write_str(previous_hash, &mut out);
        out.push_str(",\"timestamp\":");
        out.push_str(&timestamp.to_string());
        out.push('}');
        out
    }

    /// Hash a block's header fields.
    pub fn block_hash(index: u64, timestamp: u64, data: &Value, previous_hash: &str) -> String {
        Self::digest_hex(Self::preimage(index, timestamp, data, previous_hash).as_bytes())
    }

    /// Raw SHA-256 of `bytes`, hex-encoded.
    pub fn digest_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Returns `true` if `s` has the shape of a block hash.
    pub fn is_well_formed(s: &str) -> bool {
        s.len() == Self::HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

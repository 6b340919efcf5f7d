//! Foundation types for chainlog, a hash-chained append-only event ledger.
//!
//! This crate is storage-agnostic. It provides:
//! - [`Block`]: one immutable, self-verifying ledger entry
//! - Canonical JSON encoding with recursively sorted keys
//! - SHA-256 block hashing ([`BlockHasher`])
//! - Chain verification ([`ChainVerifier`]) with typed corruption reports
//!
//! # Chain invariants
//!
//! 1. The first block has index `0`; every later block has `previous.index + 1`.
//! 2. The genesis block's `previous_hash` is the sentinel `"0"`.
//! 3. Every non-genesis block's `previous_hash` equals the previous block's hash.
//! 4. Every block's stored hash equals the hash recomputed from its contents.

pub mod block;
pub mod canonical;
pub mod hasher;
pub mod verify;

pub use block::{now_millis, Block, GENESIS_MESSAGE, GENESIS_PREVIOUS_HASH};
pub use canonical::{canonical_bytes, canonical_json};
pub use hasher::BlockHasher;
pub use verify::{ChainVerifier, CorruptionError, IntegrityReport, Invariant};

//! Durable, write-once storage for chainlog blocks.
//!
//! A store holds one record per block, keyed by the block's index, and can
//! enumerate every record in ascending index order so a ledger can be
//! rebuilt after a restart.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`InMemoryBlockStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`DirectoryBlockStore`] -- one `block_<index>.json` file per block
//! - [`LogFileBlockStore`] -- single append-only file of CRC-framed records
//!
//! # Design Rules
//!
//! 1. Records are write-once. Writing an index twice is an error.
//! 2. A write either lands completely or not at all.
//! 3. The store never interprets block contents or verifies hashes.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod directory;
pub mod error;
pub mod logfile;
pub mod memory;
pub mod traits;

pub use directory::DirectoryBlockStore;
pub use error::{StoreError, StoreResult};
pub use logfile::LogFileBlockStore;
pub use memory::InMemoryBlockStore;
pub use traits::BlockStore;

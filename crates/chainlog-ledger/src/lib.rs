//! Hash-chained, append-only event ledger.
//!
//! This crate is the heart of chainlog. It provides:
//! - [`Ledger`]: owns the chain and its [`BlockStore`], bootstraps genesis,
//!   serializes appends, and verifies integrity
//! - [`LedgerStatus`]: the per-instance lifecycle state machine
//! - [`LedgerOptions`]: serde-loadable behaviour switches
//! - [`LedgerError`]: typed bootstrap, storage, and corruption failures
//!
//! A service owns one `Ledger` (usually behind an `Arc`) and hands it to the
//! code that records business events. Nothing here is global.

pub mod error;
pub mod ledger;
pub mod options;
pub mod status;

pub use chainlog_store::BlockStore;
pub use chainlog_types::{Block, CorruptionError, IntegrityReport, Invariant};
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use options::LedgerOptions;
pub use status::LedgerStatus;

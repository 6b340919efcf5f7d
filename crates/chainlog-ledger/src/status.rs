use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one ledger instance.
///
/// ```text
/// Uninitialized -> Loading -> Ready -> Corrupted
///                          \-> Failed
/// ```
///
/// `Failed` and `Corrupted` are terminal. Only `Ready` accepts appends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
    Corrupted,
}

impl LedgerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Corrupted)
    }

    /// Whether the in-memory chain is populated and may be read.
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Ready | Self::Corrupted)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Corrupted => "corrupted",
        };
        f.write_str(s)
    }
}

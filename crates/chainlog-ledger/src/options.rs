use serde::{Deserialize, Serialize};

/// Behaviour switches for a [`crate::Ledger`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerOptions {
    /// Run full verification after `load` and refuse appends if it fails.
    pub verify_on_load: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            verify_on_load: true,
        }
    }
}

impl LedgerOptions {
    /// Options that trust persisted hashes until `verify` is called.
    pub fn trusting() -> Self {
        Self {
            verify_on_load: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_verifies_on_load() {
        assert!(LedgerOptions::default().verify_on_load);
        assert!(!LedgerOptions::trusting().verify_on_load);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let options: LedgerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, LedgerOptions::default());
    }
}

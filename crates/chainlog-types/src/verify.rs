use std::fmt;

use serde::Serialize;

use crate::block::{Block, GENESIS_PREVIOUS_HASH};

/// The chain invariant a block violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    /// Index is not `0` for the first block or `previous.index + 1` after it.
    Sequence,
    /// Genesis block does not carry the `"0"` previous-hash sentinel.
    GenesisSentinel,
    /// `previous_hash` does not equal the previous block's hash.
    Linkage,
    /// Stored hash differs from the hash recomputed from the contents.
    Hash,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequence => "non-contiguous index",
            Self::GenesisSentinel => "genesis sentinel missing",
            Self::Linkage => "broken hash link",
            Self::Hash => "hash mismatch",
        };
        f.write_str(s)
    }
}

/// A block at `index` (its position in the chain) violates `invariant`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("chain corrupted at index {index}: {invariant} ({detail})")]
pub struct CorruptionError {
    pub index: u64,
    pub invariant: Invariant,
    pub detail: String,
}

/// Result of a full, non fail-fast chain audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub block_count: u64,
    pub tail_hash: Option<String>,
    pub violations: Vec<CorruptionError>,
}

impl IntegrityReport {
    /// Returns `true` if no violations were found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The first violation, which is what fail-fast verification reports.
    pub fn first_violation(&self) -> Option<&CorruptionError> {
        self.violations.first()
    }

    /// Chain positions with at least one violation, deduplicated.
    pub fn corrupted_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.violations.iter().map(|v| v.index).collect();
        indices.dedup();
        indices
    }
}

/// Hash chain integrity verifier.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a whole chain from genesis to tail.
    ///
    /// Stops at the first failing block and reports its position together
    /// with the invariant that broke. An empty slice is valid.
    pub fn verify(blocks: &[Block]) -> Result<(), CorruptionError> {
        let mut previous: Option<&Block> = None;
        for (position, block) in blocks.iter().enumerate() {
            Self::verify_link(previous, block, position as u64)?;
            previous = Some(block);
        }
        Ok(())
    }

    /// Check one block against its predecessor.
    ///
    /// Invariants are checked in order: sequence, genesis sentinel, linkage,
    /// hash. `position` is the block's offset in the chain and is what errors
    /// report.
    pub fn verify_link(
        previous: Option<&Block>,
        block: &Block,
        position: u64,
    ) -> Result<(), CorruptionError> {
        match Self::violations_for(previous, block, position).into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Audit a whole chain, collecting every violation instead of stopping.
    pub fn report(blocks: &[Block]) -> IntegrityReport {
        let mut violations = Vec::new();
        let mut previous: Option<&Block> = None;
        for (position, block) in blocks.iter().enumerate() {
            violations.extend(Self::violations_for(previous, block, position as u64));
            previous = Some(block);
        }

        IntegrityReport {
            block_count: blocks.len() as u64,
            tail_hash: blocks.last().map(|b| b.hash().to_owned()),
            violations,
        }
    }

    fn violations_for(
        previous: Option<&Block>,
        block: &Block,
        position: u64,
    ) -> Vec<CorruptionError> {
        let mut found = Vec::new();
        let violation = |invariant, detail: String| CorruptionError {
            index: position,
            invariant,
            detail,
        };

        let expected_index = previous.map_or(0, |p| p.index().saturating_add(1));
        if block.index() != expected_index {
            found.push(violation(
                Invariant::Sequence,
                format!("expected index {expected_index}, found {}", block.index()),
            ));
        }

        match previous {
            None => {
                if block.previous_hash() != GENESIS_PREVIOUS_HASH {
                    found.push(violation(
                        Invariant::GenesisSentinel,
                        format!("previous_hash is {:?}", block.previous_hash()),
                    ));
                }
            }
            Some(prev) => {
                if block.previous_hash() != prev.hash() {
                    found.push(violation(
                        Invariant::Linkage,
                        format!(
                            "previous_hash {} does not match {}",
                            block.previous_hash(),
                            prev.hash()
                        ),
                    ));
                }
            }
        }

        let computed = block.recompute_hash();
        if computed != block.hash() {
            found.push(violation(
                Invariant::Hash,
                format!("stored {}, computed {computed}", block.hash()),
            ));
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_chain(count: usize) -> Vec<Block> {
        let mut chain = vec![Block::with_timestamp(0, 1, json!({"message": "Genesis Block"}), "0")];
        for i in 1..count {
            let prev = chain[i - 1].hash().to_owned();
            chain.push(Block::with_timestamp(i as u64, 1 + i as u64, json!({"n": i}), prev));
        }
        chain
    }

    fn tamper_data(block: &Block, data: serde_json::Value) -> Block {
        Block::from_parts(
            block.index(),
            block.timestamp(),
            data,
            block.previous_hash(),
            block.hash(),
        )
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(ChainVerifier::verify(&[]).is_ok());
        assert!(ChainVerifier::report(&[]).is_valid());
    }

    #[test]
    fn valid_chain_passes() {
        let chain = build_chain(10);
        assert!(ChainVerifier::verify(&chain).is_ok());
        let report = ChainVerifier::report(&chain);
        assert!(report.is_valid());
        assert_eq!(report.block_count, 10);
        assert_eq!(report.tail_hash.as_deref(), Some(chain[9].hash()));
    }

    #[test]
    fn genesis_without_sentinel_fails() {
        let chain = vec![Block::with_timestamp(0, 1, json!({}), "abc")];
        let err = ChainVerifier::verify(&chain).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.invariant, Invariant::GenesisSentinel);
    }

    #[test]
    fn first_block_must_have_index_zero() {
        let chain = vec![Block::with_timestamp(1, 1, json!({}), "0")];
        let err = ChainVerifier::verify(&chain).unwrap_err();
        assert_eq!(err.invariant, Invariant::Sequence);
    }

    #[test]
    fn index_gap_detected() {
        let mut chain = build_chain(3);
        let prev = chain[1].hash().to_owned();
        chain[2] = Block::with_timestamp(5, 3, json!({"n": 2}), prev);
        let err = ChainVerifier::verify(&chain).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.invariant, Invariant::Sequence);
    }

    #[test]
    fn broken_link_detected() {
        let mut chain = build_chain(3);
        chain[2] = Block::with_timestamp(2, 3, json!({"n": 2}), "f".repeat(64));
        let err = ChainVerifier::verify(&chain).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.invariant, Invariant::Linkage);
    }

    #[test]
    fn tampered_data_reported_at_exactly_that_index() {
        let mut chain = build_chain(5);
        chain[2] = tamper_data(&chain[2], json!({"n": 999}));

        let err = ChainVerifier::verify(&chain).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.invariant, Invariant::Hash);

        let report = ChainVerifier::report(&chain);
        assert_eq!(report.corrupted_indices(), vec![2]);
        assert_eq!(report.first_violation(), Some(&err));
    }

    #[test]
    fn rehashed_tamper_breaks_next_link() {
        let mut chain = build_chain(4);
        let b = &chain[1];
        let forged =
            Block::with_timestamp(b.index(), b.timestamp(), json!("forged"), b.previous_hash());
        chain[1] = forged;

        let err = ChainVerifier::verify(&chain).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.invariant, Invariant::Linkage);
    }

    #[test]
    fn report_collects_all_violations() {
        let mut chain = build_chain(6);
        chain[1] = tamper_data(&chain[1], json!("x"));
        chain[4] = tamper_data(&chain[4], json!("y"));
        let report = ChainVerifier::report(&chain);
        assert!(!report.is_valid());
        assert_eq!(report.corrupted_indices(), vec![1, 4]);
    }

    #[test]
    fn corruption_error_display() {
        let err = CorruptionError {
            index: 3,
            invariant: Invariant::Hash,
            detail: "stored a, computed b".into(),
        };
        assert_eq!(
            err.to_string(),
            "chain corrupted at index 3: hash mismatch (stored a, computed b)"
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn payload() -> impl Strategy<Value = serde_json::Value> {
            prop_oneof![
                any::<i64>().prop_map(|n| json!({"amount": n})),
                any::<f64>()
                    .prop_filter("finite", |f| f.is_finite())
                    .prop_map(|f| json!({"fund_amount": f, "nested": [f, {"f": f}]})),
                "[a-z]{0,12}".prop_map(|s| json!({"event": s})),
                (any::<bool>(), "[a-z]{1,6}").prop_map(|(flag, key)| {
                    let mut map = serde_json::Map::new();
                    map.insert(key, json!({"flag": flag}));
                    serde_json::Value::Object(map)
                }),
            ]
        }

        proptest! {
            #[test]
            fn any_built_chain_verifies(payloads in prop::collection::vec(payload(), 0..24)) {
                let mut chain = vec![Block::genesis()];
                for data in payloads {
                    let last = chain.last().unwrap();
                    let next = Block::new(last.index() + 1, data, last.hash());
                    chain.push(next);
                }
                prop_assert!(ChainVerifier::verify(&chain).is_ok());
                for pair in chain.windows(2) {
                    prop_assert_eq!(pair[1].previous_hash(), pair[0].hash());
                }
            }

            #[test]
            fn chain_verifies_after_json_round_trip(
                payloads in prop::collection::vec(payload(), 1..12)
            ) {
                let mut chain = vec![Block::genesis()];
                for data in payloads {
                    let last = chain.last().unwrap();
                    let next = Block::new(last.index() + 1, data, last.hash());
                    chain.push(next);
                }
                let encoded = serde_json::to_string(&chain).unwrap();
                let reloaded: Vec<Block> = serde_json::from_str(&encoded).unwrap();
                prop_assert_eq!(&reloaded, &chain);
                prop_assert!(ChainVerifier::verify(&reloaded).is_ok());
            }
        }
    }
}

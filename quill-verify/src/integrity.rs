//! Whole-chain integrity verification.
//!
//! Walks the chain from genesis, recomputing each block's hash, checking
//! its link to the previous block and re-verifying every entry signature.
//! Stops at the first failure. Read-only: nothing is repaired or mutated.

use quill_core::{Block, Error, Hash, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Why a block failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum IntegrityFailure {
    /// The block's index does not match its position.
    IndexMismatch {
        /// Position in the chain.
        expected: u64,
        /// Index recorded in the block.
        found: u64,
    },
    /// The stored hash does not match the recomputed one.
    HashMismatch {
        /// Hash recomputed from the block contents.
        computed: Hash,
        /// Hash stored in the block.
        stored: Hash,
    },
    /// `previousHash` does not match the preceding block's hash.
    BrokenLink {
        /// Hash of the preceding block, zero for genesis.
        expected: Hash,
        /// `previousHash` recorded in the block.
        found: Hash,
    },
    /// An entry's signature does not verify.
    #[serde(rename_all = "camelCase")]
    BadSignature {
        /// Position of the entry in the block.
        entry_index: usize,
        /// Key of the entry.
        key: String,
    },
}

impl std::fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityFailure::IndexMismatch { expected, found } => {
                write!(f, "index mismatch: expected {expected}, found {found}")
            }
            IntegrityFailure::HashMismatch { computed, stored } => {
                write!(f, "hash mismatch: computed {computed}, stored {stored}")
            }
            IntegrityFailure::BrokenLink { expected, found } => {
                write!(f, "broken link: expected previous {expected}, found {found}")
            }
            IntegrityFailure::BadSignature { entry_index, key } => {
                write!(f, "bad signature on entry {entry_index} ({key})")
            }
        }
    }
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Whether every block passed.
    pub valid: bool,
    /// Index of the first block that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_bad_block_index: Option<u64>,
    /// Reason the first bad block failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<IntegrityFailure>,
    /// Blocks that passed before the scan stopped.
    pub blocks_checked: usize,
    /// Entries whose signatures were verified.
    pub entries_checked: usize,
}

impl IntegrityReport {
    fn valid(blocks_checked: usize, entries_checked: usize) -> Self {
        Self {
            valid: true,
            first_bad_block_index: None,
            failure: None,
            blocks_checked,
            entries_checked,
        }
    }

    fn invalid(
        position: usize,
        failure: IntegrityFailure,
        blocks_checked: usize,
        entries_checked: usize,
    ) -> Self {
        Self {
            valid: false,
            first_bad_block_index: Some(position as u64),
            failure: Some(failure),
            blocks_checked,
            entries_checked,
        }
    }

    /// Convert a failed report into an integrity error.
    pub fn into_result(self) -> Result<Self> {
        match (&self.first_bad_block_index, &self.failure) {
            (Some(index), Some(failure)) => Err(Error::integrity(format!(
                "block {index} failed verification: {failure}"
            ))),
            _ => Ok(self),
        }
    }
}

/// Verifies hash chaining and signatures over a whole chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Verify a chain, genesis first.
    pub fn verify(chain: &[Block]) -> IntegrityReport {
        let mut entries_checked = 0;
        let mut previous = Hash::ZERO;

        for (position, block) in chain.iter().enumerate() {
            if let Err(failure) = Self::check_block(position, block, &previous, &mut entries_checked)
            {
                warn!(
                    block_index = position,
                    failure = %failure,
                    "Chain integrity check failed"
                );
                return IntegrityReport::invalid(position, failure, position, entries_checked);
            }
            previous = block.hash;
        }

        debug!(
            blocks = chain.len(),
            entries = entries_checked,
            "Chain integrity verified"
        );
        IntegrityReport::valid(chain.len(), entries_checked)
    }

    fn check_block(
        position: usize,
        block: &Block,
        previous: &Hash,
        entries_checked: &mut usize,
    ) -> std::result::Result<(), IntegrityFailure> {
        let expected = position as u64;
        if block.index != expected {
            return Err(IntegrityFailure::IndexMismatch {
                expected,
                found: block.index,
            });
        }

        let computed = block.compute_hash();
        if computed != block.hash {
            return Err(IntegrityFailure::HashMismatch {
                computed,
                stored: block.hash,
            });
        }

        if block.previous_hash != *previous {
            return Err(IntegrityFailure::BrokenLink {
                expected: *previous,
                found: block.previous_hash,
            });
        }

        for (entry_index, entry) in block.entries.iter().enumerate() {
            if entry.verify_signature().is_err() {
                return Err(IntegrityFailure::BadSignature {
                    entry_index,
                    key: entry.key.clone(),
                });
            }
            *entries_checked += 1;
        }

        Ok(())
    }
}

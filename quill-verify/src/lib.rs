//! Verification for the quill ledger.
//!
//! Two layers of checking:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     VERIFICATION LAYER                              │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │ INTEGRITY                                                     │  │
//! │  │  - Recompute every block hash                                 │  │
//! │  │  - Check previous-hash linkage from genesis                   │  │
//! │  │  - Re-verify every entry signature                            │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │ INVARIANTS                                                    │  │
//! │  │  - Append-only transitions (monotonic height and entries)     │  │
//! │  │  - One block per mine, head hash advances                     │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use quill_core::{now_millis, Block, BlockBuilder};
//! use quill_verify::{verify_transition, ChainInvariants, ChainSummary, IntegrityVerifier};
//!
//! let genesis = Block::genesis(now_millis());
//! let next = BlockBuilder::new().parent(&genesis).build();
//! let chain = vec![genesis, next];
//!
//! assert!(IntegrityVerifier::verify(&chain).valid);
//!
//! let before = ChainSummary::of(&chain[..1]).unwrap();
//! let after = ChainSummary::of(&chain).unwrap();
//! assert!(verify_transition(&before, &after, &ChainInvariants::all()).is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod integrity;
pub mod invariants;

pub use integrity::{IntegrityFailure, IntegrityReport, IntegrityVerifier};
pub use invariants::{
    ChainInvariants, ChainSummary, ConsecutiveHeight, HeadAdvances, Invariant,
    InvariantViolation, MonotonicEntries, MonotonicHeight,
};

/// Verify a state transition satisfies all invariants.
pub fn verify_transition<S>(
    old_state: &S,
    new_state: &S,
    invariants: &ChainInvariants,
) -> Result<(), InvariantViolation>
where
    S: ChainStats,
{
    invariants.verify_transition(old_state, new_state)
}

/// Chain state that invariants can inspect.
pub trait ChainStats {
    /// Index of the head block.
    fn height(&self) -> u64;

    /// Hash of the head block.
    fn head_hash(&self) -> quill_core::Hash;

    /// Total entry count.
    fn entry_count(&self) -> u64;
}

//! Chain invariants checked across state transitions.

use quill_core::{Block, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ChainStats;

/// An invariant that must hold for the chain.
pub trait Invariant<S> {
    /// Name of this invariant.
    fn name(&self) -> &str;

    /// Check if the invariant holds across a transition.
    fn check_transition(&self, old: &S, new: &S) -> Result<(), InvariantViolation>;
}

/// Violation of an invariant.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("invariant '{name}' violated: {message}")]
pub struct InvariantViolation {
    /// Invariant name.
    pub name: String,
    /// Violation message.
    pub message: String,
    /// Height of the new state, if known.
    pub state_height: Option<u64>,
}

impl InvariantViolation {
    /// Create a new violation.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            state_height: None,
        }
    }

    /// Add state height context.
    pub fn at_height(mut self, height: u64) -> Self {
        self.state_height = Some(height);
        self
    }
}

impl From<InvariantViolation> for quill_core::Error {
    fn from(v: InvariantViolation) -> Self {
        quill_core::Error::integrity(v.to_string())
    }
}

/// Invariant: chain height never decreases.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicHeight;

impl<S: ChainStats> Invariant<S> for MonotonicHeight {
    fn name(&self) -> &str {
        "monotonic_height"
    }

    fn check_transition(&self, old: &S, new: &S) -> Result<(), InvariantViolation> {
        if new.height() < old.height() {
            Err(InvariantViolation::new(
                "monotonic_height",
                format!("height decreased: {} -> {}", old.height(), new.height()),
            )
            .at_height(new.height()))
        } else {
            Ok(())
        }
    }
}

/// Invariant: one mine adds exactly one block.
#[derive(Debug, Clone, Copy)]
pub struct ConsecutiveHeight;

impl<S: ChainStats> Invariant<S> for ConsecutiveHeight {
    fn name(&self) -> &str {
        "consecutive_height"
    }

    fn check_transition(&self, old: &S, new: &S) -> Result<(), InvariantViolation> {
        if new.height() != old.height() + 1 {
            Err(InvariantViolation::new(
                "consecutive_height",
                format!(
                    "height gap: {} -> {} (expected {})",
                    old.height(),
                    new.height(),
                    old.height() + 1
                ),
            )
            .at_height(new.height()))
        } else {
            Ok(())
        }
    }
}

/// Invariant: mined entries are never removed.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicEntries;

impl<S: ChainStats> Invariant<S> for MonotonicEntries {
    fn name(&self) -> &str {
        "monotonic_entries"
    }

    fn check_transition(&self, old: &S, new: &S) -> Result<(), InvariantViolation> {
        if new.entry_count() < old.entry_count() {
            Err(InvariantViolation::new(
                "monotonic_entries",
                format!(
                    "entry count decreased: {} -> {}",
                    old.entry_count(),
                    new.entry_count()
                ),
            )
            .at_height(new.height()))
        } else {
            Ok(())
        }
    }
}

/// Invariant: a new block moves the head hash.
#[derive(Debug, Clone, Copy)]
pub struct HeadAdvances;

impl<S: ChainStats> Invariant<S> for HeadAdvances {
    fn name(&self) -> &str {
        "head_advances"
    }

    fn check_transition(&self, old: &S, new: &S) -> Result<(), InvariantViolation> {
        if new.height() > old.height() && new.head_hash() == old.head_hash() {
            Err(
                InvariantViolation::new("head_advances", "height grew but head hash unchanged")
                    .at_height(new.height()),
            )
        } else {
            Ok(())
        }
    }
}

/// Collection of chain invariants.
#[derive(Debug, Clone, Default)]
pub struct ChainInvariants {
    /// Enable monotonic height check.
    pub monotonic_height: bool,
    /// Enable consecutive height check.
    pub consecutive_height: bool,
    /// Enable monotonic entries check.
    pub monotonic_entries: bool,
    /// Enable head advance check.
    pub head_advances: bool,
}

impl ChainInvariants {
    /// Create an empty invariant set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with all invariants enabled.
    pub fn all() -> Self {
        Self {
            monotonic_height: true,
            consecutive_height: true,
            monotonic_entries: true,
            head_advances: true,
        }
    }

    /// Require monotonic height.
    pub fn require_monotonic_height(mut self) -> Self {
        self.monotonic_height = true;
        self
    }

    /// Require consecutive heights.
    pub fn require_consecutive_height(mut self) -> Self {
        self.consecutive_height = true;
        self
    }

    /// Require monotonic entries.
    pub fn require_monotonic_entries(mut self) -> Self {
        self.monotonic_entries = true;
        self
    }

    /// Require the head hash to move with the height.
    pub fn require_head_advances(mut self) -> Self {
        self.head_advances = true;
        self
    }

    /// Verify a state transition.
    pub fn verify_transition<S: ChainStats>(
        &self,
        old: &S,
        new: &S,
    ) -> Result<(), InvariantViolation> {
        if self.monotonic_height {
            MonotonicHeight.check_transition(old, new)?;
        }
        if self.consecutive_height {
            ConsecutiveHeight.check_transition(old, new)?;
        }
        if self.monotonic_entries {
            MonotonicEntries.check_transition(old, new)?;
        }
        if self.head_advances {
            HeadAdvances.check_transition(old, new)?;
        }
        Ok(())
    }
}

/// Point-in-time summary of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSummary {
    /// Index of the head block.
    pub height: u64,
    /// Hash of the head block.
    pub head_hash: Hash,
    /// Entries across every block.
    pub entries: u64,
}

impl ChainSummary {
    /// Summarize a block sequence. Returns `None` for an empty slice.
    pub fn of(chain: &[Block]) -> Option<Self> {
        let head = chain.last()?;
        Some(Self {
            height: head.index,
            head_hash: head.hash,
            entries: chain.iter().map(|b| b.len() as u64).sum(),
        })
    }
}

impl ChainStats for ChainSummary {
    fn height(&self) -> u64 {
        self.height
    }

    fn head_hash(&self) -> Hash {
        self.head_hash
    }

    fn entry_count(&self) -> u64 {
        self.entries
    }
}

//! Token records.
//!
//! A token is a derived view: its balance is the sum of mint entries minus
//! the sum of burn entries for its id found by replaying the chain. The
//! records here never act as a source of truth on their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location of a mined entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRef {
    /// Index of the block holding the entry.
    pub block_index: u64,
    /// Position of the entry inside the block.
    pub entry_index: usize,
    /// The entry's key.
    pub key: String,
}

impl EntryRef {
    pub fn new(block_index: u64, entry_index: usize, key: impl Into<String>) -> Self {
        Self {
            block_index,
            entry_index,
            key: key.into(),
        }
    }
}

/// A named balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub owner: String,
    pub balance: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub minted_at: DateTime<Utc>,
    /// Every mint/burn entry applied to this token, in chain order.
    pub history: Vec<EntryRef>,
}

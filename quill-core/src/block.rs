//! Block types for quill.
//!
//! Blocks batch entries together and link to form the chain. A block's
//! hash covers its index, previous hash, timestamp, every entry (signature
//! included) and nonce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{hash, Hash};
use crate::entry::{now_millis, Entry};

/// An immutable batch of entries chained to its predecessor by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Position in the chain. Genesis is 0.
    pub index: u64,

    /// When the block was mined, as Unix millis.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Entries in mempool order.
    pub entries: Vec<Entry>,

    /// Hash of the preceding block, [`Hash::ZERO`] for genesis.
    pub previous_hash: Hash,

    /// Hash of this block's contents.
    pub hash: Hash,

    /// Fixed work parameter; no proof-of-work is required.
    pub nonce: u64,
}

impl Block {
    /// Create a genesis block at the given time.
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        BlockBuilder::new().timestamp(timestamp).build()
    }

    /// Recompute this block's hash from its contents.
    pub fn compute_hash(&self) -> Hash {
        compute_block_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.entries,
            self.nonce,
        )
    }

    /// Check that the stored hash matches the contents.
    pub fn hash_is_valid(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Check if this is a genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Number of entries in this block.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the block carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Helper for hashing.
#[derive(Serialize)]
struct HashableBlock<'a> {
    index: u64,
    previous_hash: &'a [u8; 32],
    timestamp_ms: i64,
    entries: Vec<Vec<u8>>,
    nonce: u64,
}

/// `H(index || previousHash || timestamp || canonical(entries) || nonce)`.
pub fn compute_block_hash(
    index: u64,
    previous_hash: &Hash,
    timestamp: DateTime<Utc>,
    entries: &[Entry],
    nonce: u64,
) -> Hash {
    let hashable = HashableBlock {
        index,
        previous_hash: previous_hash.as_bytes(),
        timestamp_ms: timestamp.timestamp_millis(),
        entries: entries.iter().map(Entry::sealed_bytes).collect(),
        nonce,
    };
    let bytes = bincode::serialize(&hashable).expect("serialization should not fail");
    hash(&bytes)
}

/// Builder for creating blocks.
pub struct BlockBuilder {
    parent: Option<(u64, Hash)>,
    entries: Vec<Entry>,
    timestamp: Option<DateTime<Utc>>,
    nonce: u64,
}

impl BlockBuilder {
    /// Create a new block builder. Without a parent it builds a genesis block.
    pub fn new() -> Self {
        Self {
            parent: None,
            entries: Vec::new(),
            timestamp: None,
            nonce: 0,
        }
    }

    /// Set the parent block.
    pub fn parent(mut self, parent: &Block) -> Self {
        self.parent = Some((parent.index, parent.hash));
        self
    }

    /// Add entries.
    pub fn entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = entries;
        self
    }

    /// Set the timestamp (defaults to now).
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Build the block, computing its hash.
    pub fn build(self) -> Block {
        let (index, previous_hash) = match self.parent {
            Some((parent_index, parent_hash)) => (parent_index + 1, parent_hash),
            None => (0, Hash::ZERO),
        };
        let timestamp = self.timestamp.unwrap_or_else(now_millis);
        let hash = compute_block_hash(index, &previous_hash, timestamp, &self.entries, self.nonce);

        Block {
            index,
            timestamp,
            entries: self.entries,
            previous_hash,
            hash,
            nonce: self.nonce,
        }
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Mempool for pending ledger entries.
//!
//! The mempool holds entries waiting to be mined:
//! - Insertion-order queue (entries are mined in the order they arrived)
//! - Duplicate key detection among pending entries only
//! - Structural and signature validation on admission
//! - A hard size limit (audit records are never evicted)

use std::collections::{HashSet, VecDeque};

use quill_core::{Entry, EntryCodec, Error, Result, SignatureVerifier};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the mempool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of pending entries.
    pub max_size: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self { max_size: 10_000 }
    }
}

/// Mempool for pending entries.
#[derive(Debug)]
pub struct Mempool {
    /// Configuration.
    config: MempoolConfig,
    /// Validator for admitted entries.
    codec: EntryCodec,
    /// Pending entries in arrival order.
    queue: VecDeque<Entry>,
    /// Index for O(1) duplicate key detection.
    keys: HashSet<String>,
}

impl Mempool {
    /// Create a new mempool for a chain validated by `codec`.
    pub fn new(config: MempoolConfig, codec: EntryCodec) -> Self {
        Self {
            config,
            codec,
            queue: VecDeque::new(),
            keys: HashSet::new(),
        }
    }

    /// Get the number of pending entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if the pool is full.
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.config.max_size
    }

    /// Maximum number of pending entries.
    pub fn capacity(&self) -> usize {
        self.config.max_size
    }

    /// Check if an entry with this key is pending.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Add a signed entry to the pool.
    ///
    /// Fails with a validation error for a malformed entry or a full pool,
    /// a signature error for a missing or mismatched signature, and a
    /// duplicate key error if the key is already pending.
    pub fn add(&mut self, entry: Entry) -> Result<()> {
        self.codec.validate(&entry)?;
        SignatureVerifier::check(&entry)?;

        if self.contains(&entry.key) {
            return Err(Error::duplicate_key(entry.key));
        }
        if self.is_full() {
            return Err(Error::mempool_full(self.config.max_size));
        }

        debug!(key = %entry.key, entry_type = %entry.entry_type(), "entry admitted to mempool");
        self.keys.insert(entry.key.clone());
        self.queue.push_back(entry);
        Ok(())
    }

    /// Re-admit pending entries recovered from a snapshot.
    ///
    /// Entries go through the same signature and uniqueness checks as
    /// [`Mempool::add`]. The timestamp window is not re-checked, since a
    /// snapshot may legitimately be older than the skew guard allows.
    pub fn restore(&mut self, entries: Vec<Entry>) -> Result<()> {
        for entry in entries {
            SignatureVerifier::check(&entry)?;
            if self.contains(&entry.key) {
                return Err(Error::duplicate_key(entry.key));
            }
            if self.is_full() {
                return Err(Error::mempool_full(self.config.max_size));
            }
            self.keys.insert(entry.key.clone());
            self.queue.push_back(entry);
        }
        Ok(())
    }

    /// Remove and return every pending entry in arrival order.
    pub fn drain(&mut self) -> Vec<Entry> {
        self.keys.clear();
        self.queue.drain(..).collect()
    }

    /// Copy of every pending entry in arrival order.
    pub fn peek(&self) -> Vec<Entry> {
        self.queue.iter().cloned().collect()
    }

    /// Iterate over pending entries without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.queue.iter()
    }
}

//! In-memory chain storage.
//!
//! `ChainStore` holds the ordered, append-only sequence of blocks. It always
//! contains at least the genesis block, and it only grows: there is no
//! update or delete operation.

use std::collections::HashMap;

use quill_core::{Block, Entry, EntryRef, Error, Hash, Result};
use tracing::debug;

/// The chain of mined blocks, genesis first.
#[derive(Debug, Clone)]
pub struct ChainStore {
    /// Blocks in index order.
    blocks: Vec<Block>,
    /// Block hash to index.
    by_hash: HashMap<Hash, u64>,
    /// Running count of mined entries.
    total_entries: usize,
}

impl ChainStore {
    /// Start a chain from a genesis block.
    pub fn new(genesis: Block) -> Result<Self> {
        if !genesis.is_genesis() || !genesis.previous_hash.is_zero() {
            return Err(Error::integrity(format!(
                "block {} is not a genesis block",
                genesis.index
            )));
        }
        Ok(Self::from_parts(vec![genesis]))
    }

    /// Rebuild a store from previously persisted blocks.
    ///
    /// Hashes and links are not checked here, so a tampered
    /// snapshot can still be loaded and inspected with the integrity
    /// verifier. Only the shape needed to keep appending is required: the
    /// chain must be non-empty.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::integrity("chain has no genesis block"));
        }
        Ok(Self::from_parts(blocks))
    }

    fn from_parts(blocks: Vec<Block>) -> Self {
        let by_hash = blocks.iter().map(|b| (b.hash, b.index)).collect();
        let total_entries = blocks.iter().map(Block::len).sum();
        Self {
            blocks,
            by_hash,
            total_entries,
        }
    }

    /// Append a block to the head of the chain.
    ///
    /// Rejects with an integrity error unless the block directly follows the
    /// current head: next index, previous hash equal to the head's hash, and
    /// a stored hash that matches its contents.
    pub fn append(&mut self, block: Block) -> Result<()> {
        let head = self.head();
        let expected_index = head.index + 1;

        if block.index != expected_index {
            return Err(Error::integrity(format!(
                "block index mismatch: expected {expected_index}, got {}",
                block.index
            )));
        }
        if block.previous_hash != head.hash {
            return Err(Error::integrity(format!(
                "invalid previous hash at block {}: expected {}, got {}",
                block.index, head.hash, block.previous_hash
            )));
        }
        if !block.hash_is_valid() {
            return Err(Error::integrity(format!(
                "block {} hash does not match its contents",
                block.index
            )));
        }

        debug!(height = block.index, entries = block.len(), "block appended");
        self.total_entries += block.len();
        self.by_hash.insert(block.hash, block.index);
        self.blocks.push(block);
        Ok(())
    }

    /// Get a block by index.
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Get a block by hash.
    pub fn get_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.by_hash.get(hash).and_then(|i| self.get(*i))
    }

    /// Every block, genesis first.
    pub fn all(&self) -> &[Block] {
        &self.blocks
    }

    /// The most recent block.
    pub fn head(&self) -> &Block {
        // Both constructors require a genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// The first block.
    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the chain holds no blocks. Never true once constructed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of entries across every block.
    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    /// Every mined entry with the given key, in chain order.
    pub fn find_entries(&self, key: &str) -> Vec<(EntryRef, &Entry)> {
        self.blocks
            .iter()
            .flat_map(|block| {
                block
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.key == key)
                    .map(move |(i, e)| (EntryRef::new(block.index, i, &e.key), e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{now_millis, BlockBuilder, OnboardingPayload, Payload, SecretKey};

    fn test_entry(key: &SecretKey, entry_key: &str) -> Entry {
        Entry::builder()
            .key(entry_key)
            .payload(Payload::Onboarding(OnboardingPayload {
                client_id: "client".into(),
                client_name: None,
                tier: None,
            }))
            .now()
            .sign(key)
            .unwrap()
    }

    fn test_chain() -> ChainStore {
        ChainStore::new(Block::genesis(now_millis())).unwrap()
    }

    #[test]
    fn test_chain_store_initial() {
        let chain = test_chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.head().index, 0);
        assert_eq!(chain.total_entries(), 0);
        assert_eq!(chain.genesis(), chain.head());
    }

    #[test]
    fn test_rejects_non_genesis_start() {
        let genesis = Block::genesis(now_millis());
        let block1 = BlockBuilder::new().parent(&genesis).build();

        assert!(ChainStore::new(block1).is_err());
    }

    #[test]
    fn test_append_sequence() {
        let mut chain = test_chain();
        let key = SecretKey::generate();

        let block1 = BlockBuilder::new()
            .parent(chain.head())
            .entries(vec![test_entry(&key, "a"), test_entry(&key, "b")])
            .build();
        chain.append(block1.clone()).unwrap();

        let block2 = BlockBuilder::new()
            .parent(chain.head())
            .entries(vec![test_entry(&key, "c")])
            .build();
        chain.append(block2).unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.head().index, 2);
        assert_eq!(chain.total_entries(), 3);
        assert_eq!(chain.get(1), Some(&block1));
        assert_eq!(chain.get_by_hash(&block1.hash), Some(&block1));
        assert!(chain.get(9).is_none());
    }

    #[test]
    fn test_append_wrong_index() {
        let mut chain = test_chain();
        let stale = BlockBuilder::new().build();

        let err = chain.append(stale).unwrap_err();

        assert!(matches!(err, Error::Integrity { .. }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_append_wrong_parent() {
        let mut chain = test_chain();
        let other_genesis = Block::genesis(now_millis() - chrono::Duration::seconds(5));
        let orphan = BlockBuilder::new().parent(&other_genesis).build();

        let err = chain.append(orphan).unwrap_err();

        assert!(matches!(err, Error::Integrity { .. }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_append_tampered_block() {
        let mut chain = test_chain();
        let key = SecretKey::generate();
        let mut block = BlockBuilder::new()
            .parent(chain.head())
            .entries(vec![test_entry(&key, "a")])
            .build();
        block.entries[0].key = "b".into();

        assert!(chain.append(block).is_err());
    }

    #[test]
    fn test_find_entries_across_blocks() {
        let mut chain = test_chain();
        let key = SecretKey::generate();

        for _ in 0..2 {
            let block = BlockBuilder::new()
                .parent(chain.head())
                .entries(vec![test_entry(&key, "other"), test_entry(&key, "shared")])
                .build();
            chain.append(block).unwrap();
        }

        let found = chain.find_entries("shared");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, EntryRef::new(1, 1, "shared"));
        assert_eq!(found[1].0, EntryRef::new(2, 1, "shared"));
        assert!(chain.find_entries("missing").is_empty());
    }

    #[test]
    fn test_from_blocks_skips_verification() {
        let mut genesis = Block::genesis(now_millis());
        genesis.hash = quill_core::hash(b"tampered");

        let chain = ChainStore::from_blocks(vec![genesis]).unwrap();

        assert_eq!(chain.len(), 1);
        assert!(ChainStore::from_blocks(Vec::new()).is_err());
    }
}

//! Block mining.
//!
//! The miner drains the mempool into exactly one new block, appends it to
//! the chain and replays its token effects. Mining an empty mempool still
//! produces a valid empty block. There is no proof-of-work: the nonce is
//! fixed by configuration.

use quill_core::{now_millis, Block, BlockBuilder, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mempool::Mempool;
use crate::store::ChainStore;
use crate::tokens::{RejectedEffect, TokenLedger};

/// Configuration for the block miner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Nonce written into every block.
    pub nonce: u64,
}

/// Outcome of a mine.
#[derive(Debug, Clone)]
pub struct MineResult {
    /// The block that was appended.
    pub block: Block,
    /// Token effects in the block that the token view refused.
    pub rejected_effects: Vec<RejectedEffect>,
}

/// Batches pending entries into blocks.
#[derive(Debug, Clone, Default)]
pub struct BlockMiner {
    config: MinerConfig,
}

impl BlockMiner {
    /// Create a new block miner.
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Get the miner configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Mine every pending entry into a new block on top of `chain`.
    ///
    /// Either the whole mempool lands in the appended block, or the chain is
    /// untouched and the entries are put back in the mempool.
    pub fn mine(
        &self,
        mempool: &mut Mempool,
        chain: &mut ChainStore,
        tokens: &mut TokenLedger,
    ) -> Result<MineResult> {
        let entries = mempool.drain();
        let block = BlockBuilder::new()
            .parent(chain.head())
            .entries(entries)
            .timestamp(now_millis())
            .nonce(self.config.nonce)
            .build();

        if let Err(e) = chain.append(block.clone()) {
            mempool.restore(block.entries)?;
            return Err(e);
        }

        let rejected_effects = tokens.apply_block(&block);

        info!(
            height = block.index,
            entries = block.len(),
            rejected = rejected_effects.len(),
            hash = %block.hash,
            "Mined block"
        );

        Ok(MineResult {
            block,
            rejected_effects,
        })
    }
}

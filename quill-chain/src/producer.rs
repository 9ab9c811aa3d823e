//! Periodic mining policy.
//!
//! Mining is normally an explicit call. The auto-miner layers a timer on
//! top of that primitive:
//! - Mines at a configured interval
//! - Skips empty mempools unless configured otherwise
//! - Forwards mined blocks to a channel
//! - Stops on a shutdown signal

use std::sync::Arc;
use std::time::Duration;

use quill_core::{Block, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::miner::MineResult;

/// Configuration for the auto-miner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Interval between mining attempts.
    pub block_interval: Duration,
    /// Whether to mine when nothing is pending.
    pub mine_empty_blocks: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            block_interval: Duration::from_secs(1),
            mine_empty_blocks: false,
        }
    }
}

/// Something the auto-miner can drive.
pub trait MiningTarget: Send + Sync + 'static {
    /// Number of entries waiting to be mined.
    fn pending_len(&self) -> usize;

    /// Mine every pending entry into a new block.
    fn mine(&self) -> Result<MineResult>;
}

/// Mines blocks on a timer.
pub struct AutoMiner<T: MiningTarget> {
    target: Arc<T>,
    config: ProducerConfig,
}

impl<T: MiningTarget> AutoMiner<T> {
    /// Create a new auto-miner for `target`.
    pub fn new(target: Arc<T>, config: ProducerConfig) -> Self {
        Self { target, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Try to mine a block.
    ///
    /// Returns `None` when nothing is pending and empty blocks are disabled.
    pub fn try_mine(&self) -> Result<Option<MineResult>> {
        mine_once(&*self.target, self.config.mine_empty_blocks)
    }

    /// Run the mining loop until shutdown.
    ///
    /// Mined blocks are sent to `blocks_tx`; the loop also stops if the
    /// receiver is dropped. Each mine runs on the blocking pool, since a
    /// target may persist a snapshot (fsync, retry sleeps) before returning.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>, blocks_tx: mpsc::Sender<Block>) {
        let mut ticker = interval(self.config.block_interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Auto-miner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let target = Arc::clone(&self.target);
                    let mine_empty = self.config.mine_empty_blocks;
                    let outcome =
                        task::spawn_blocking(move || mine_once(&*target, mine_empty)).await;
                    match outcome {
                        Ok(Ok(Some(result))) => {
                            if blocks_tx.send(result.block).await.is_err() {
                                warn!("Block receiver dropped");
                                break;
                            }
                        }
                        Ok(Ok(None)) => {}
                        Ok(Err(e)) => {
                            warn!(error = %e, "Failed to mine block");
                        }
                        Err(e) => {
                            warn!(error = %e, "Mining task aborted");
                        }
                    }
                }
            }
        }
    }
}

fn mine_once<T: MiningTarget>(target: &T, mine_empty: bool) -> Result<Option<MineResult>> {
    if target.pending_len() == 0 && !mine_empty {
        debug!("No pending entries, skipping block");
        return Ok(None);
    }
    target.mine().map(Some)
}

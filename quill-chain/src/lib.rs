//! Chain operations for the quill ledger.
//!
//! This crate provides the in-memory ledger machinery:
//! - Mempool (pending entries, duplicate key detection)
//! - Block miner (drains the mempool into one chained block)
//! - Chain store (append-only block sequence)
//! - Token ledger (balances replayed from mint/burn entries)
//! - Auto-miner (optional timer-based mining)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      AutoMiner                          │
//! │  (Optional timer that triggers mining)                  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     BlockMiner                          │
//! │  (Drain mempool, build block, append, replay tokens)    │
//! └─────────────────────────────────────────────────────────┘
//!          │                 │                  │
//!          ▼                 ▼                  ▼
//! ┌────────────────┐ ┌────────────────┐ ┌────────────────┐
//! │    Mempool     │ │   ChainStore   │ │  TokenLedger   │
//! │ (pending keys) │ │ (append-only)  │ │ (derived view) │
//! └────────────────┘ └────────────────┘ └────────────────┘
//! ```

mod mempool;
mod miner;
mod producer;
mod store;
mod tokens;

pub use mempool::{Mempool, MempoolConfig};
pub use miner::{BlockMiner, MineResult, MinerConfig};
pub use producer::{AutoMiner, MiningTarget, ProducerConfig};
pub use store::ChainStore;
pub use tokens::{RejectedEffect, TokenLedger};

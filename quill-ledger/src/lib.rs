//! quill ledger - the append-only audit ledger facade.
//!
//! [`LedgerService`] is the only entry point callers need. It builds
//! typed, signed entries, queues them, mines them into hash-chained
//! blocks, keeps the token view in step and persists the whole state to
//! one snapshot file.
//!
//! # Example
//!
//! ```
//! use quill_ledger::{LedgerService, LedgerStats};
//!
//! let ledger = LedgerService::in_memory()?;
//!
//! ledger.record_transaction("tx-1", "A", "B", 100)?;
//! ledger.mint_client_token("client123", 1000)?;
//! ledger.force_mine_block()?;
//!
//! assert_eq!(
//!     ledger.get_blockchain_stats(),
//!     LedgerStats { blocks: 2, entries: 2, tokens: 1, pending: 0 }
//! );
//! assert_eq!(ledger.balance_of("client123"), 1000);
//! assert!(ledger.verify_blockchain_integrity().valid);
//! # Ok::<(), quill_core::Error>(())
//! ```

pub mod config;
mod service;
pub mod value;

pub use config::{ConfigError, LedgerConfig};
pub use service::{LedgerService, LedgerStats};
pub use value::{ValueConfig, ValueInputs, ValueOracle};

pub use quill_chain::{AutoMiner, MineResult, ProducerConfig, RejectedEffect};
pub use quill_core::{Error, ErrorCode, Result};
pub use quill_verify::{IntegrityFailure, IntegrityReport};

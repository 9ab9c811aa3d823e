//! Storage layer for quill.
//!
//! Persists the whole ledger state as one JSON snapshot file:
//! - Chain (every block, genesis first)
//! - Token view
//! - Pending entries
//!
//! # Atomic saves
//!
//! Saves write a sibling temp file, `fsync` it, then rename it over the
//! live snapshot, so readers only ever see a complete document.
//!
//! ```no_run
//! use quill_core::now_millis;
//! use quill_storage::{PersistenceGateway, RetryPolicy};
//!
//! let gateway = PersistenceGateway::new("./data/ledger.json", RetryPolicy::default());
//!
//! // Absent file: start from genesis. Corrupt file: fatal error.
//! let snapshot = gateway.load_or_genesis(now_millis())?;
//! gateway.save(&snapshot)?;
//! # Ok::<(), quill_core::Error>(())
//! ```

mod retry;
pub mod snapshot;

pub use retry::RetryPolicy;
pub use snapshot::{LedgerSnapshot, PersistenceGateway, SNAPSHOT_VERSION};

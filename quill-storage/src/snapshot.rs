//! Atomic snapshot persistence.
//!
//! The whole ledger state is written as one JSON document. Saves never
//! touch the live file directly: the snapshot is written to a sibling temp
//! file, flushed to disk, then renamed over the target.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "chainId": "quill-local",
//!   "chain": [ ...blocks, genesis first... ],
//!   "tokens": [ ...token records... ],
//!   "pendingEntries": [ ...entries not yet mined... ]
//! }
//! ```
//!
//! `version` and `chainId` are optional on read.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use quill_core::{Block, Entry, Error, ErrorCode, Result, Token};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::retry::RetryPolicy;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Serialized ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Chain identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Every block, genesis first.
    pub chain: Vec<Block>,
    /// Token view at save time.
    #[serde(default)]
    pub tokens: Vec<Token>,
    /// Entries not yet mined.
    #[serde(default)]
    pub pending_entries: Vec<Entry>,
}

impl LedgerSnapshot {
    /// A fresh state holding only a genesis block.
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            chain_id: None,
            chain: vec![Block::genesis(timestamp)],
            tokens: Vec::new(),
            pending_entries: Vec::new(),
        }
    }

    /// Set the chain id.
    pub fn with_chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    /// Check the structural minimum needed to resume from this state.
    ///
    /// Hashes and signatures are not checked; that is the integrity
    /// verifier's job.
    pub fn validate(&self) -> Result<()> {
        if self.version > SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {} (newest known is {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        if self.chain.is_empty() {
            return Err(corrupt("snapshot has no genesis block"));
        }
        Ok(())
    }
}

fn corrupt(message: impl Into<String>) -> Error {
    Error::Persistence {
        code: ErrorCode::StorageCorruption,
        message: message.into(),
        source: None,
    }
}

/// Reads and writes the snapshot file for one ledger.
#[derive(Debug, Clone)]
pub struct PersistenceGateway {
    path: PathBuf,
    retry: RetryPolicy,
}

impl PersistenceGateway {
    /// Create a gateway for the snapshot at `path`.
    pub fn new(path: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            path: path.into(),
            retry,
        }
    }

    /// Path of the live snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the temp file used during saves.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Check if a snapshot file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Atomically replace the snapshot file with `snapshot`.
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let start = Instant::now();
        let data = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();

        self.retry.run("snapshot write", ErrorCode::StorageWrite, || {
            write_atomic(&self.path, &tmp, &data)
        })?;

        info!(
            path = %self.path.display(),
            bytes = data.len(),
            blocks = snapshot.chain.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot, or `None` if no file exists.
    ///
    /// A file that exists but cannot be parsed is a fatal persistence
    /// error; history is never silently discarded.
    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        let start = Instant::now();
        let data = self
            .retry
            .run("snapshot read", ErrorCode::StorageRead, || {
                match fs::read(&self.path) {
                    Ok(data) => Ok(Some(data)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e),
                }
            })?;

        let Some(data) = data else {
            debug!(path = %self.path.display(), "No snapshot file");
            return Ok(None);
        };

        let snapshot: LedgerSnapshot = serde_json::from_slice(&data).map_err(|e| {
            Error::corrupt_snapshot(
                format!("cannot parse snapshot {}: {e}", self.path.display()),
                e,
            )
        })?;
        snapshot.validate()?;

        info!(
            path = %self.path.display(),
            bytes = data.len(),
            blocks = snapshot.chain.len(),
            pending = snapshot.pending_entries.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// Load the snapshot, or a fresh genesis state if no file exists.
    pub fn load_or_genesis(&self, genesis_time: DateTime<Utc>) -> Result<LedgerSnapshot> {
        Ok(self
            .load()?
            .unwrap_or_else(|| LedgerSnapshot::genesis(genesis_time)))
    }
}

fn write_atomic(path: &Path, tmp: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let result = (|| {
        let mut file = File::create(tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

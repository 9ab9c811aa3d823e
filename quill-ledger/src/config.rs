//! Ledger configuration.
//!
//! Loaded from a JSON file, then optionally overridden from the
//! environment:
//! - `QUILL_SNAPSHOT_PATH` (snapshot file location)
//! - `QUILL_SIGNING_KEY` (hex-encoded 32-byte Ed25519 seed)
//! - `QUILL_VERIFY_ON_MINE` (`true`/`false`/`1`/`0`)

use std::path::{Path, PathBuf};

use quill_chain::{MempoolConfig, MinerConfig, ProducerConfig};
use quill_core::SecretKey;
use quill_storage::RetryPolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::value::ValueConfig;

/// Environment variable overriding [`LedgerConfig::snapshot_path`].
pub const ENV_SNAPSHOT_PATH: &str = "QUILL_SNAPSHOT_PATH";
/// Environment variable overriding [`LedgerConfig::signing_key`].
pub const ENV_SIGNING_KEY: &str = "QUILL_SIGNING_KEY";
/// Environment variable overriding [`LedgerConfig::verify_on_mine`].
pub const ENV_VERIFY_ON_MINE: &str = "QUILL_VERIFY_ON_MINE";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<ConfigError> for quill_core::Error {
    fn from(e: ConfigError) -> Self {
        quill_core::Error::validation(format!("invalid configuration: {e}"))
    }
}

/// Configuration for one ledger instance.
///
/// Custom `Debug` implementation redacts `signing_key`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Chain identifier written into snapshots.
    pub chain_id: String,
    /// Snapshot file. `None` keeps the ledger in memory only.
    pub snapshot_path: Option<PathBuf>,
    /// Hex-encoded 32-byte signing seed. `None` generates an ephemeral key.
    pub signing_key: Option<String>,
    /// Verify the whole chain before every mine.
    pub verify_on_mine: bool,
    /// Save a snapshot after every mine.
    pub autosave: bool,
    /// Mempool limits.
    pub mempool: MempoolConfig,
    /// Block miner settings.
    pub miner: MinerConfig,
    /// Periodic mining policy.
    pub producer: ProducerConfig,
    /// Snapshot I/O retry policy.
    pub retry: RetryPolicy,
    /// Ecosystem value coefficients.
    pub value: ValueConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain_id: "quill-local".into(),
            snapshot_path: None,
            signing_key: None,
            verify_on_mine: false,
            autosave: true,
            mempool: MempoolConfig::default(),
            miner: MinerConfig::default(),
            producer: ProducerConfig::default(),
            retry: RetryPolicy::default(),
            value: ValueConfig::default(),
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("chain_id", &self.chain_id)
            .field("snapshot_path", &self.snapshot_path)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "[REDACTED]"))
            .field("verify_on_mine", &self.verify_on_mine)
            .field("autosave", &self.autosave)
            .field("mempool", &self.mempool)
            .field("miner", &self.miner)
            .field("producer", &self.producer)
            .field("retry", &self.retry)
            .field("value", &self.value)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file(path)?.with_env_overrides()
    }

    /// Apply `QUILL_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(ENV_SNAPSHOT_PATH).filter(|s| !s.is_empty()) {
            self.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(key) = lookup(ENV_SIGNING_KEY).filter(|s| !s.is_empty()) {
            self.signing_key = Some(key);
        }
        if let Some(raw) = lookup(ENV_VERIFY_ON_MINE) {
            self.verify_on_mine = parse_bool(ENV_VERIFY_ON_MINE, &raw)?;
        }
        Ok(self)
    }

    /// Set the snapshot path.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Set the signing key from raw seed bytes.
    pub fn with_signing_key(mut self, key: &SecretKey) -> Self {
        self.signing_key = Some(hex::encode(key.as_bytes()));
        self
    }

    /// Check limits and coefficients.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "chain_id".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.mempool.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mempool.max_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        self.value.validate()
    }

    /// Resolve the ledger signing identity.
    ///
    /// Without a configured key an ephemeral one is generated; entries it
    /// signs still verify after a restart because each entry embeds its
    /// signer.
    pub fn resolve_signing_key(&self) -> Result<SecretKey, ConfigError> {
        match &self.signing_key {
            Some(hex_seed) => {
                SecretKey::from_hex(hex_seed).map_err(|e| ConfigError::InvalidValue {
                    field: "signing_key".into(),
                    reason: e.to_string(),
                })
            }
            None => {
                warn!("No signing key configured, generating an ephemeral ledger identity");
                Ok(SecretKey::generate())
            }
        }
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.into(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();

        assert_eq!(config.chain_id, "quill-local");
        assert!(config.snapshot_path.is_none());
        assert!(config.autosave);
        assert!(!config.verify_on_mine);
        assert_eq!(config.miner.nonce, 0);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quill.json");
        std::fs::write(
            &path,
            r#"{ "chain_id": "academy", "verify_on_mine": true, "mempool": { "max_size": 5 } }"#,
        )
        .unwrap();

        let config = LedgerConfig::from_file(&path).unwrap();

        assert_eq!(config.chain_id, "academy");
        assert!(config.verify_on_mine);
        assert_eq!(config.mempool.max_size, 5);
        assert_eq!(config.value, ValueConfig::default());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            LedgerConfig::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(
            LedgerConfig::from_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let key = SecretKey::generate();
        let seed = hex::encode(key.as_bytes());

        let config = LedgerConfig::default()
            .with_overrides_from(lookup(&[
                (ENV_SNAPSHOT_PATH, "/var/lib/quill/ledger.json"),
                (ENV_SIGNING_KEY, seed.as_str()),
                (ENV_VERIFY_ON_MINE, "TRUE"),
            ]))
            .unwrap();

        assert_eq!(
            config.snapshot_path.as_deref(),
            Some(Path::new("/var/lib/quill/ledger.json"))
        );
        assert!(config.verify_on_mine);
        assert_eq!(
            config.resolve_signing_key().unwrap().public_key(),
            key.public_key()
        );
    }

    #[test]
    fn test_bad_bool_override() {
        let err = LedgerConfig::default()
            .with_overrides_from(lookup(&[(ENV_VERIFY_ON_MINE, "sometimes")]))
            .unwrap_err();

        assert!(err.to_string().contains(ENV_VERIFY_ON_MINE));
    }

    #[test]
    fn test_bad_signing_key() {
        let config = LedgerConfig {
            signing_key: Some("abcd".into()),
            ..Default::default()
        };

        assert!(config.resolve_signing_key().is_err());
    }

    #[test]
    fn test_zero_mempool_rejected() {
        let mut config = LedgerConfig::default();
        config.mempool.max_size = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LedgerConfig::default().with_signing_key(&SecretKey::generate());
        let debug = format!("{config:?}");

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(config.signing_key.as_deref().unwrap()));
    }
}

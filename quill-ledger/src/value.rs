//! Ecosystem value heuristic.
//!
//! A dashboard number derived from chain statistics:
//!
//! ```text
//! value = base
//!       + per_entry      * total_entries
//!       + per_block      * total_blocks ^ block_exponent
//!       + per_token_unit * total_minted
//! ```
//!
//! `total_minted` counts every accepted mint, so a burn never lowers it.
//! With every coefficient non-negative the value never decreases as the
//! ledger grows. It has no settlement meaning.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Coefficients for [`ValueOracle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    /// Constant floor.
    pub base: f64,
    /// Weight of each mined entry.
    pub per_entry: f64,
    /// Weight of the block count after exponentiation.
    pub per_block: f64,
    /// Exponent applied to the block count.
    pub block_exponent: f64,
    /// Weight of each token unit ever minted.
    pub per_token_unit: f64,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            base: 1_000.0,
            per_entry: 10.0,
            per_block: 100.0,
            block_exponent: 1.5,
            per_token_unit: 0.01,
        }
    }
}

impl ValueConfig {
    /// Check every coefficient is finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("value.base", self.base),
            ("value.per_entry", self.per_entry),
            ("value.per_block", self.per_block),
            ("value.block_exponent", self.block_exponent),
            ("value.per_token_unit", self.per_token_unit),
        ];
        for (field, v) in fields {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: format!("must be a finite non-negative number, got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Chain statistics the oracle reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueInputs {
    pub total_entries: u64,
    pub total_blocks: u64,
    pub total_minted: u64,
}

/// Computes the ecosystem value from chain statistics.
#[derive(Debug, Clone)]
pub struct ValueOracle {
    config: ValueConfig,
}

impl ValueOracle {
    /// Create an oracle, rejecting negative or non-finite coefficients.
    pub fn new(config: ValueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the coefficients.
    pub fn config(&self) -> &ValueConfig {
        &self.config
    }

    /// Ecosystem value for the given statistics.
    pub fn ecosystem_value(&self, inputs: &ValueInputs) -> f64 {
        let c = &self.config;
        c.base
            + c.per_entry * inputs.total_entries as f64
            + c.per_block * (inputs.total_blocks as f64).powf(c.block_exponent)
            + c.per_token_unit * inputs.total_minted as f64
    }
}

impl Default for ValueOracle {
    fn default() -> Self {
        Self {
            config: ValueConfig::default(),
        }
    }
}

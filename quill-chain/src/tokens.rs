//! Token balance view.
//!
//! `TokenLedger` is materialized from the mint and burn entries recorded in
//! the chain. A burn that would overdraw a token is refused here while the
//! entry itself stays in its block: the chain records the attempt, and the
//! view records only effects that were valid.

use std::collections::BTreeMap;

use quill_core::{Block, Entry, EntryRef, Error, Payload, Result, Token};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A token effect the ledger refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEffect {
    /// Where the refused entry lives in the chain.
    pub entry: EntryRef,
    /// Token the entry targeted.
    pub token_id: String,
    /// Why the effect was refused.
    pub reason: String,
}

/// Token balances keyed by token id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLedger {
    tokens: BTreeMap<String, Token>,
    /// Units ever minted. Burns never lower it.
    minted: u64,
}

impl TokenLedger {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one entry's balance effect.
    ///
    /// Mint creates the token on first sight and increments it afterwards.
    /// Burn decrements and fails with a validation error if the balance
    /// would go negative. Other entry types have no effect.
    pub fn apply_entry(&mut self, entry: &Entry, at: EntryRef) -> Result<()> {
        match &entry.payload {
            Payload::Mint(mint) => {
                let token = self
                    .tokens
                    .entry(mint.token_id.clone())
                    .or_insert_with(|| Token {
                        id: mint.token_id.clone(),
                        owner: mint.owner.clone(),
                        balance: 0,
                        minted_at: entry.timestamp,
                        history: Vec::new(),
                    });
                token.balance = token.balance.checked_add(mint.amount).ok_or_else(|| {
                    Error::validation(format!("mint would overflow token {}", mint.token_id))
                })?;
                token.history.push(at);
                self.minted = self.minted.saturating_add(mint.amount);
            }
            Payload::Burn(burn) => {
                let token = self.tokens.get_mut(&burn.token_id).ok_or_else(|| {
                    Error::insufficient_balance(&burn.token_id, 0, burn.amount)
                })?;
                if token.balance < burn.amount {
                    return Err(Error::insufficient_balance(
                        &burn.token_id,
                        token.balance,
                        burn.amount,
                    ));
                }
                token.balance -= burn.amount;
                token.history.push(at);
            }
            _ => {}
        }
        Ok(())
    }

    /// Apply every entry of a block in order.
    ///
    /// Refused effects are logged and returned; the block is never refused.
    pub fn apply_block(&mut self, block: &Block) -> Vec<RejectedEffect> {
        let mut rejected = Vec::new();
        for (i, entry) in block.entries.iter().enumerate() {
            let at = EntryRef::new(block.index, i, &entry.key);
            if let Err(e) = self.apply_entry(entry, at.clone()) {
                let token_id = match &entry.payload {
                    Payload::Mint(m) => m.token_id.clone(),
                    Payload::Burn(b) => b.token_id.clone(),
                    _ => String::new(),
                };
                warn!(
                    height = block.index,
                    entry_index = i,
                    key = %entry.key,
                    token_id = %token_id,
                    error = %e,
                    "token effect rejected"
                );
                rejected.push(RejectedEffect {
                    entry: at,
                    token_id,
                    reason: e.to_string(),
                });
            }
        }
        rejected
    }

    /// Replay a chain from genesis into a fresh view.
    pub fn rebuild_from_chain(chain: &[Block]) -> Self {
        Self::replay(chain).0
    }

    /// Replay a chain and also report every refused effect.
    pub fn replay(chain: &[Block]) -> (Self, Vec<RejectedEffect>) {
        let mut ledger = Self::new();
        let rejected = chain
            .iter()
            .flat_map(|block| ledger.apply_block(block))
            .collect();
        (ledger, rejected)
    }

    /// Balance of a token, zero if it was never minted.
    pub fn balance_of(&self, id: &str) -> u64 {
        self.tokens.get(id).map_or(0, |t| t.balance)
    }

    /// Get a token record.
    pub fn get(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Every token, ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// Sum of every token balance.
    pub fn total_supply(&self) -> u64 {
        self.tokens
            .values()
            .fold(0u64, |acc, t| acc.saturating_add(t.balance))
    }

    /// Sum of every accepted mint, burned units included.
    pub fn total_minted(&self) -> u64 {
        self.minted
    }

    /// Number of tokens ever minted.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if no token was ever minted.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

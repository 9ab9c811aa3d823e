//! The ledger facade.
//!
//! `LedgerService` owns one chain, its token view and its mempool behind a
//! single-writer, multi-reader lock. Every caller-facing operation goes
//! through here; nothing outside this module touches the chain directly.
//!
//! Lock order for writers is always `writer` then `state`. Readers only
//! take `state` and therefore see either the whole of a mutation or none
//! of it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{FairMutex, RwLock, RwLockWriteGuard};
use quill_chain::{BlockMiner, ChainStore, MineResult, Mempool, MiningTarget, TokenLedger};
use quill_core::{
    now_millis, Block, BurnPayload, ComplianceCheckPayload, CredentialIssuePayload, Entry,
    EntryCodec, EntryRef, Error, GenericAuditPayload, MintPayload, OnboardingPayload, Payload,
    PublicKey, Result, SignatureVerifier, Token, TransactionPayload,
};
use quill_storage::{LedgerSnapshot, PersistenceGateway, SNAPSHOT_VERSION};
use quill_verify::{ChainInvariants, ChainSummary, IntegrityReport, IntegrityVerifier};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::value::{ValueInputs, ValueOracle};

/// Ledger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Blocks in the chain, genesis included.
    pub blocks: usize,
    /// Mined entries across every block.
    pub entries: usize,
    /// Distinct token ids.
    pub tokens: usize,
    /// Entries waiting to be mined.
    pub pending: usize,
}

struct LedgerState {
    chain: ChainStore,
    tokens: TokenLedger,
    mempool: Mempool,
}

impl LedgerState {
    fn snapshot(&self, chain_id: &str) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            chain_id: Some(chain_id.to_string()),
            chain: self.chain.all().to_vec(),
            tokens: self.tokens.all().cloned().collect(),
            pending_entries: self.mempool.peek(),
        }
    }

    fn summary(&self) -> Result<ChainSummary> {
        ChainSummary::of(self.chain.all())
            .ok_or_else(|| Error::internal("chain has no genesis block"))
    }
}

/// The audit ledger.
///
/// Construct once per snapshot file and share it as `Arc<LedgerService>`.
pub struct LedgerService {
    state: RwLock<LedgerState>,
    /// Serializes mutations in arrival order.
    writer: FairMutex<()>,
    signer: SignatureVerifier,
    miner: BlockMiner,
    invariants: ChainInvariants,
    oracle: ValueOracle,
    gateway: Option<PersistenceGateway>,
    config: LedgerConfig,
    seq: AtomicU64,
}

impl LedgerService {
    /// Open the ledger described by `config`.
    ///
    /// With a snapshot path the stored state is loaded, or a fresh genesis
    /// chain is created (and saved, if autosave is on) when the file does
    /// not exist yet. A file that exists but cannot be read is an error.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let key = config.resolve_signing_key()?;
        let oracle = ValueOracle::new(config.value.clone())?;

        let gateway = config
            .snapshot_path
            .as_ref()
            .map(|path| PersistenceGateway::new(path, config.retry.clone()));

        let (snapshot, fresh) = match &gateway {
            Some(gw) => match gw.load()? {
                Some(snapshot) => (snapshot, false),
                None => (LedgerSnapshot::genesis(now_millis()), true),
            },
            None => (LedgerSnapshot::genesis(now_millis()), true),
        };

        if let Some(stored) = snapshot.chain_id.as_deref() {
            if stored != config.chain_id {
                warn!(
                    stored,
                    configured = %config.chain_id,
                    "Snapshot chain id differs from configuration"
                );
            }
        }

        let state = Self::restore_state(&config, snapshot)?;
        let service = Self {
            state: RwLock::new(state),
            writer: FairMutex::new(()),
            signer: SignatureVerifier::new(key),
            miner: BlockMiner::new(config.miner.clone()),
            invariants: ChainInvariants::all(),
            oracle,
            gateway,
            config,
            seq: AtomicU64::new(0),
        };

        if fresh && service.config.autosave && service.gateway.is_some() {
            service.save()?;
        }

        let stats = service.get_blockchain_stats();
        info!(
            chain_id = %service.config.chain_id,
            blocks = stats.blocks,
            entries = stats.entries,
            pending = stats.pending,
            signer = %service.signer.public_key().to_hex(),
            "Ledger opened"
        );
        Ok(service)
    }

    /// A ledger with default settings and no snapshot file.
    pub fn in_memory() -> Result<Self> {
        Self::open(LedgerConfig::default())
    }

    fn restore_state(config: &LedgerConfig, snapshot: LedgerSnapshot) -> Result<LedgerState> {
        let LedgerSnapshot {
            chain,
            tokens: stored_tokens,
            pending_entries,
            ..
        } = snapshot;

        let chain = ChainStore::from_blocks(chain)?;
        let (tokens, rejected) = TokenLedger::replay(chain.all());
        if !rejected.is_empty() {
            debug!(rejected = rejected.len(), "Replayed chain contains refused token effects");
        }
        if !stored_tokens.iter().eq(tokens.all()) {
            warn!("Stored token view diverges from chain replay, using replayed balances");
        }

        let codec = EntryCodec::new(chain.genesis().timestamp);
        let mut mempool = Mempool::new(config.mempool.clone(), codec);
        mempool.restore(pending_entries)?;

        Ok(LedgerState {
            chain,
            tokens,
            mempool,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Public key every new entry is signed with.
    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Sign an entry and queue it for mining.
    pub fn add_entry(&self, key: impl Into<String>, payload: Payload) -> Result<Entry> {
        let _writer = self.writer.lock();

        let entry = self
            .signer
            .sign(Entry::builder().key(key).payload(payload).now())?;
        self.state.write().mempool.add(entry.clone())?;

        debug!(key = %entry.key, entry_type = %entry.entry_type(), "Entry queued");
        Ok(entry)
    }

    /// Record a value transfer.
    pub fn record_transaction(
        &self,
        key: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: u64,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::Transaction(TransactionPayload {
                from: from.into(),
                to: to.into(),
                amount,
                currency: None,
            }),
        )
    }

    /// Record a compliance check outcome.
    pub fn record_compliance_check(
        &self,
        key: impl Into<String>,
        subject: impl Into<String>,
        check_type: impl Into<String>,
        passed: bool,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::ComplianceCheck(ComplianceCheckPayload {
                subject: subject.into(),
                check_type: check_type.into(),
                passed,
                details: None,
            }),
        )
    }

    /// Record a client onboarding.
    pub fn record_onboarding(
        &self,
        key: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::Onboarding(OnboardingPayload {
                client_id: client_id.into(),
                client_name: None,
                tier: None,
            }),
        )
    }

    /// Record a credential issued to a holder.
    pub fn record_credential_issue(
        &self,
        key: impl Into<String>,
        credential_id: impl Into<String>,
        holder: impl Into<String>,
        issuer: impl Into<String>,
        credential_type: impl Into<String>,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::CredentialIssue(CredentialIssuePayload {
                credential_id: credential_id.into(),
                holder: holder.into(),
                issuer: issuer.into(),
                credential_type: credential_type.into(),
            }),
        )
    }

    /// Record any other auditable action.
    pub fn record_audit(
        &self,
        key: impl Into<String>,
        action: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::GenericAudit(GenericAuditPayload {
                action: action.into(),
                details,
            }),
        )
    }

    /// Queue a mint of `amount` units of `token_id` for `owner`.
    pub fn mint_token(
        &self,
        key: impl Into<String>,
        token_id: impl Into<String>,
        owner: impl Into<String>,
        amount: u64,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::Mint(MintPayload {
                token_id: token_id.into(),
                owner: owner.into(),
                amount,
            }),
        )
    }

    /// Mint a client's own token, keyed automatically.
    ///
    /// The token id and owner are both `client_id`.
    pub fn mint_client_token(&self, client_id: &str, amount: u64) -> Result<Entry> {
        let key = format!(
            "mint-{client_id}-{}-{}",
            now_millis().timestamp_millis(),
            self.seq.fetch_add(1, Ordering::Relaxed)
        );
        self.mint_token(key, client_id, client_id, amount)
    }

    /// Queue a burn of `amount` units of `token_id`.
    ///
    /// Overdrawing is not checked here: the entry is recorded when mined and
    /// its balance effect is refused by the token view.
    pub fn burn_token(
        &self,
        key: impl Into<String>,
        token_id: impl Into<String>,
        amount: u64,
    ) -> Result<Entry> {
        self.add_entry(
            key,
            Payload::Burn(BurnPayload {
                token_id: token_id.into(),
                amount,
            }),
        )
    }

    /// Mine every pending entry into a new block.
    ///
    /// Mining an empty mempool produces an empty block. With autosave on,
    /// the new state is written before returning; a failed save is reported
    /// as an error but the block stays mined.
    pub fn force_mine_block(&self) -> Result<MineResult> {
        let _writer = self.writer.lock();
        let mut guard = self.state.write();

        if self.config.verify_on_mine {
            IntegrityVerifier::verify(guard.chain.all()).into_result()?;
        }

        let before = guard.summary()?;
        let state = &mut *guard;
        let result = self
            .miner
            .mine(&mut state.mempool, &mut state.chain, &mut state.tokens)?;
        let after = guard.summary()?;
        self.invariants.verify_transition(&before, &after)?;

        if let Some(gateway) = self.gateway.as_ref().filter(|_| self.config.autosave) {
            let snapshot = RwLockWriteGuard::downgrade(guard).snapshot(&self.config.chain_id);
            gateway.save(&snapshot)?;
        }

        Ok(result)
    }

    /// Write the current state to the snapshot file.
    pub fn save(&self) -> Result<()> {
        let Some(gateway) = &self.gateway else {
            return Err(Error::persistence_write("ledger has no snapshot path"));
        };
        let _writer = self.writer.lock();
        let snapshot = self.snapshot();
        gateway.save(&snapshot)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The full ledger state as it would be saved.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().snapshot(&self.config.chain_id)
    }

    /// Up to `limit` blocks starting at index `start`.
    pub fn get_blocks(&self, start: u64, limit: usize) -> Vec<Block> {
        let state = self.state.read();
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        state
            .chain
            .all()
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Get a block by index.
    pub fn get_block(&self, index: u64) -> Option<Block> {
        self.state.read().chain.get(index).cloned()
    }

    /// The newest block.
    pub fn head(&self) -> Block {
        self.state.read().chain.head().clone()
    }

    /// Every block, genesis first.
    pub fn export_chain(&self) -> Vec<Block> {
        self.state.read().chain.all().to_vec()
    }

    /// Every token record, ordered by id.
    pub fn export_tokens(&self) -> Vec<Token> {
        self.state.read().tokens.all().cloned().collect()
    }

    /// Get a token record.
    pub fn get_token(&self, id: &str) -> Option<Token> {
        self.state.read().tokens.get(id).cloned()
    }

    /// Balance of a token, zero if it was never minted.
    pub fn balance_of(&self, id: &str) -> u64 {
        self.state.read().tokens.balance_of(id)
    }

    /// Sum of every token balance.
    pub fn total_token_supply(&self) -> u64 {
        self.state.read().tokens.total_supply()
    }

    /// Every mined entry with this key, oldest first.
    pub fn find_entries(&self, key: &str) -> Vec<(EntryRef, Entry)> {
        self.state
            .read()
            .chain
            .find_entries(key)
            .into_iter()
            .map(|(at, entry)| (at, entry.clone()))
            .collect()
    }

    /// Entries waiting to be mined, in arrival order.
    pub fn get_pending_entries(&self) -> Vec<Entry> {
        self.state.read().mempool.peek()
    }

    /// Block, entry, token and pending counts.
    pub fn get_blockchain_stats(&self) -> LedgerStats {
        let state = self.state.read();
        LedgerStats {
            blocks: state.chain.len(),
            entries: state.chain.total_entries(),
            tokens: state.tokens.len(),
            pending: state.mempool.len(),
        }
    }

    /// The ecosystem value heuristic over current statistics.
    pub fn get_ecosystem_value(&self) -> f64 {
        let inputs = {
            let state = self.state.read();
            ValueInputs {
                total_entries: state.chain.total_entries() as u64,
                total_blocks: state.chain.len() as u64,
                total_minted: state.tokens.total_minted(),
            }
        };
        self.oracle.ecosystem_value(&inputs)
    }

    /// Recheck every hash, link and signature in the chain.
    pub fn verify_blockchain_integrity(&self) -> IntegrityReport {
        IntegrityVerifier::verify(self.state.read().chain.all())
    }
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("config", &self.config)
            .field("stats", &self.get_blockchain_stats())
            .finish_non_exhaustive()
    }
}

impl MiningTarget for LedgerService {
    fn pending_len(&self) -> usize {
        self.state.read().mempool.len()
    }

    fn mine(&self) -> Result<MineResult> {
        self.force_mine_block()
    }
}

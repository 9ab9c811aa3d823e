//! quill benchmarks.
//!
//! Every bench binary links this library so that all measurements run
//! under mimalloc. Shared fixtures for building signed entries and
//! pre-mined ledgers live here too.

use mimalloc::MiMalloc;
use quill_core::{Entry, MintPayload, OnboardingPayload, Payload, SecretKey};
use quill_ledger::LedgerService;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// A signed mint entry for benchmark input.
pub fn mint_entry(key: &SecretKey, n: u64) -> Entry {
    Entry::builder()
        .key(format!("mint-{n}"))
        .payload(Payload::Mint(MintPayload {
            token_id: format!("client-{}", n % 50),
            owner: format!("client-{}", n % 50),
            amount: 1 + n % 1000,
        }))
        .now()
        .sign(key)
        .expect("benchmark entry is well formed")
}

/// A signed onboarding entry for benchmark input.
pub fn onboarding_entry(key: &SecretKey, n: u64) -> Entry {
    Entry::builder()
        .key(format!("onboarding-{n}"))
        .payload(Payload::Onboarding(OnboardingPayload {
            client_id: format!("client-{n}"),
            client_name: Some(format!("Client {n}")),
            tier: Some("standard".into()),
        }))
        .now()
        .sign(key)
        .expect("benchmark entry is well formed")
}

/// An in-memory ledger with `blocks` mined blocks of `per_block` entries.
pub fn populated_ledger(blocks: u64, per_block: u64) -> LedgerService {
    let ledger = LedgerService::in_memory().expect("default config is valid");
    for b in 0..blocks {
        for i in 0..per_block {
            let n = b * per_block + i;
            if n % 2 == 0 {
                ledger
                    .mint_token(format!("mint-{n}"), format!("client-{}", n % 50), "bench", 10)
                    .expect("mint is well formed");
            } else {
                ledger
                    .record_onboarding(format!("onboarding-{n}"), format!("client-{n}"))
                    .expect("onboarding is well formed");
            }
        }
        ledger.force_mine_block().expect("in-memory mine succeeds");
    }
    ledger
}

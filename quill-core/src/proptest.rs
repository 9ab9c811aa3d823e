//! Property-based tests for core types.
//!
//! Uses proptest to verify invariants hold for arbitrary inputs.

use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::block::{compute_block_hash, Block, BlockBuilder};
use crate::crypto::{hash, Hash, SecretKey};
use crate::entry::{
    now_millis, BurnPayload, ComplianceCheckPayload, CredentialIssuePayload, Entry,
    GenericAuditPayload, MintPayload, OnboardingPayload, Payload, TransactionPayload,
};

// ============================================================================
// Arbitrary Implementations
// ============================================================================

fn arb_bytes32() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

fn arb_hash() -> impl Strategy<Value = Hash> {
    arb_bytes32().prop_map(Hash::from_bytes)
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,15}"
}

/// Generate arbitrary well-formed payloads of every type.
fn arb_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        (arb_name(), arb_name(), 1u64..1_000_000, prop::option::of("[A-Z]{3}"))
            .prop_filter("parties differ", |(from, to, _, _)| from != to)
            .prop_map(|(from, to, amount, currency)| {
                Payload::Transaction(TransactionPayload {
                    from,
                    to,
                    amount,
                    currency,
                })
            }),
        (arb_name(), arb_name(), any::<bool>()).prop_map(|(subject, check_type, passed)| {
            Payload::ComplianceCheck(ComplianceCheckPayload {
                subject,
                check_type,
                passed,
                details: None,
            })
        }),
        (arb_name(), prop::option::of(arb_name())).prop_map(|(client_id, tier)| {
            Payload::Onboarding(OnboardingPayload {
                client_id,
                client_name: None,
                tier,
            })
        }),
        (arb_name(), arb_name(), 1u64..1_000_000).prop_map(|(token_id, owner, amount)| {
            Payload::Mint(MintPayload {
                token_id,
                owner,
                amount,
            })
        }),
        (arb_name(), 1u64..1_000_000)
            .prop_map(|(token_id, amount)| Payload::Burn(BurnPayload { token_id, amount })),
        (arb_name(), arb_name(), arb_name(), arb_name()).prop_map(
            |(credential_id, holder, issuer, credential_type)| {
                Payload::CredentialIssue(CredentialIssuePayload {
                    credential_id,
                    holder,
                    issuer,
                    credential_type,
                })
            }
        ),
        (arb_name(), prop::collection::btree_map(arb_name(), arb_name(), 0..4)).prop_map(
            |(action, details): (String, BTreeMap<String, String>)| {
                Payload::GenericAudit(GenericAuditPayload { action, details })
            }
        ),
    ]
}

fn sign(key: &SecretKey, entry_key: &str, payload: Payload) -> Entry {
    Entry::builder()
        .key(entry_key)
        .payload(payload)
        .now()
        .sign(key)
        .expect("signing should succeed")
}

// ============================================================================
// Property Tests: Hash
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Hash determinism: hash(data) always produces same result
    #[test]
    fn prop_hash_deterministic(data in prop::collection::vec(any::<u8>(), 0..1000)) {
        prop_assert_eq!(hash(&data), hash(&data));
    }

    /// Hash avalanche: a one-byte change produces a different output
    #[test]
    fn prop_hash_avalanche(data in prop::collection::vec(any::<u8>(), 1..100)) {
        let mut modified = data.clone();
        modified[0] = modified[0].wrapping_add(1);
        prop_assert_ne!(hash(&data), hash(&modified));
    }

    /// Hash hex roundtrip: from_hex(h.to_hex()) == h
    #[test]
    fn prop_hash_hex_roundtrip(h in arb_hash()) {
        let restored = Hash::from_hex(&h.to_hex()).expect("hex roundtrip should succeed");
        prop_assert_eq!(h, restored);
    }
}

// ============================================================================
// Property Tests: Entries
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every well-formed payload produces an entry whose signature verifies.
    #[test]
    fn prop_signed_entry_verifies(payload in arb_payload(), entry_key in arb_name()) {
        let key = SecretKey::generate();
        let entry = sign(&key, &entry_key, payload);

        prop_assert!(entry.payload.validate().is_ok());
        prop_assert!(entry.verify_signature().is_ok());
    }

    /// Swapping the payload of a signed entry breaks its signature.
    #[test]
    fn prop_payload_swap_breaks_signature(a in arb_payload(), b in arb_payload()) {
        prop_assume!(a != b);
        let key = SecretKey::generate();
        let mut entry = sign(&key, "k", a);

        entry.payload = b;

        prop_assert!(entry.verify_signature().is_err());
    }

    /// JSON reload keeps the entry byte-identical for signing purposes.
    #[test]
    fn prop_json_reload_preserves_signature(payload in arb_payload()) {
        let key = SecretKey::generate();
        let entry = sign(&key, "k", payload);

        let json = serde_json::to_string(&entry).expect("serialize should succeed");
        let restored: Entry = serde_json::from_str(&json).expect("deserialize should succeed");

        prop_assert_eq!(entry.canonical_bytes(), restored.canonical_bytes());
        prop_assert!(restored.verify_signature().is_ok());
    }
}

// ============================================================================
// Property Tests: Blocks
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Hashing identical block contents twice yields identical hashes.
    #[test]
    fn prop_block_hash_deterministic(
        payloads in prop::collection::vec(arb_payload(), 0..8),
        index in 0u64..10_000,
        nonce in any::<u64>(),
        previous in arb_hash(),
    ) {
        let key = SecretKey::generate();
        let entries: Vec<Entry> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| sign(&key, &format!("e{i}"), p))
            .collect();
        let ts = now_millis();

        prop_assert_eq!(
            compute_block_hash(index, &previous, ts, &entries, nonce),
            compute_block_hash(index, &previous, ts, &entries, nonce)
        );
    }

    /// Replacing any entry of a built block invalidates its stored hash.
    #[test]
    fn prop_entry_replacement_invalidates_block(
        payloads in prop::collection::vec(arb_payload(), 1..6),
        replacement in arb_payload(),
        pick in any::<prop::sample::Index>(),
    ) {
        let key = SecretKey::generate();
        let entries: Vec<Entry> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| sign(&key, &format!("e{i}"), p))
            .collect();
        let genesis = Block::genesis(now_millis());
        let mut block = BlockBuilder::new().parent(&genesis).entries(entries).build();
        prop_assert!(block.hash_is_valid());

        let i = pick.index(block.entries.len());
        prop_assume!(block.entries[i].payload != replacement);
        block.entries[i].payload = replacement;

        prop_assert!(!block.hash_is_valid());
    }
}

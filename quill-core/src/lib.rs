//! quill core - fundamental types for the quill audit ledger.
//!
//! - [`crypto`] - hashing (BLAKE3) and signatures (Ed25519)
//! - [`entry`] - signed, typed audit entries and their codec
//! - [`block`] - blocks that batch entries and chain by hash
//! - [`token`] - token records derived from mint/burn entries
//! - [`signer`] - the ledger-wide signing identity
//!
//! # Example
//!
//! ```rust
//! use quill_core::{
//!     block::BlockBuilder,
//!     crypto::SecretKey,
//!     entry::{Entry, MintPayload, Payload},
//!     Block,
//! };
//!
//! let key = SecretKey::generate();
//!
//! let entry = Entry::builder()
//!     .key("mint-client123")
//!     .payload(Payload::Mint(MintPayload {
//!         token_id: "client123".into(),
//!         owner: "client123".into(),
//!         amount: 1000,
//!     }))
//!     .now()
//!     .sign(&key)
//!     .unwrap();
//!
//! let genesis = Block::genesis(quill_core::entry::now_millis());
//! let block = BlockBuilder::new()
//!     .parent(&genesis)
//!     .entries(vec![entry])
//!     .build();
//!
//! assert_eq!(block.previous_hash, genesis.hash);
//! assert!(block.hash_is_valid());
//! ```

pub mod block;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod signer;
pub mod token;

#[cfg(test)]
mod proptest;

pub use block::{compute_block_hash, Block, BlockBuilder};
pub use crypto::{hash, hash_all, Hash, PublicKey, SecretKey, Sig};
pub use entry::{
    now_millis, BurnPayload, ComplianceCheckPayload, CredentialIssuePayload, Entry, EntryCodec,
    EntryType, GenericAuditPayload, MintPayload, OnboardingPayload, Payload, TransactionPayload,
    UnsignedEntry,
};
pub use error::{Error, ErrorCode, Result};
pub use signer::SignatureVerifier;
pub use token::{EntryRef, Token};

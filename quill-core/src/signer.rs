//! Entry signing and verification.
//!
//! The ledger uses one Ed25519 identity for every entry it creates. The
//! signature covers [`Entry::canonical_bytes`], binding key, type, payload
//! and timestamp to the signer.

use crate::crypto::{PublicKey, SecretKey, Sig};
use crate::entry::{Entry, EntryCodec, UnsignedEntry};
use crate::error::Result;

/// Signs entries on creation and verifies them on demand.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: SecretKey,
}

impl SignatureVerifier {
    /// Create a verifier around the ledger-wide signing key.
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Public half of the ledger identity.
    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Produce the signature for an entry's canonical bytes.
    pub fn sign_bytes(&self, entry: &Entry) -> Sig {
        self.key.sign(&EntryCodec::encode(entry))
    }

    /// Sign an unsigned entry.
    pub fn sign(&self, entry: UnsignedEntry) -> Result<Entry> {
        entry.sign(&self.key)
    }

    /// Check an entry's signature against its embedded signer.
    pub fn verify(entry: &Entry) -> bool {
        entry.verify_signature().is_ok()
    }

    /// Like [`SignatureVerifier::verify`] but reports why it failed.
    pub fn check(entry: &Entry) -> Result<()> {
        entry.verify_signature()
    }
}

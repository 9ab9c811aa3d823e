//! Ledger entries.
//!
//! An entry is the atomic unit of the quill ledger: one signed audit
//! record with a typed tag. Entries are immutable once mined.
//!
//! The tag and its payload are a single closed enum ([`Payload`]), so a
//! payload can never disagree with its type. In JSON the pair is written
//! as `"type": "...", "payload": {...}` next to the other entry fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, SecretKey, Sig};
use crate::error::{Error, Result};

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum serialized size of a single entry in bytes.
pub const MAX_ENTRY_SIZE: usize = 1024 * 1024;

/// Maximum clock skew tolerated for entry timestamps.
pub const MAX_FUTURE_SKEW_MINUTES: i64 = 5;

/// Current time truncated to millisecond precision.
///
/// Entry and block timestamps are stored as Unix milliseconds; truncating
/// at creation keeps in-memory and reloaded values identical.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

/// The closed set of entry tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Transaction,
    ComplianceCheck,
    Onboarding,
    Mint,
    Burn,
    CredentialIssue,
    GenericAudit,
}

impl EntryType {
    /// Every tag, in declaration order.
    pub const ALL: [EntryType; 7] = [
        EntryType::Transaction,
        EntryType::ComplianceCheck,
        EntryType::Onboarding,
        EntryType::Mint,
        EntryType::Burn,
        EntryType::CredentialIssue,
        EntryType::GenericAudit,
    ];

    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Transaction => "transaction",
            EntryType::ComplianceCheck => "compliance-check",
            EntryType::Onboarding => "onboarding",
            EntryType::Mint => "mint",
            EntryType::Burn => "burn",
            EntryType::CredentialIssue => "credential-issue",
            EntryType::GenericAudit => "generic-audit",
        }
    }

    /// Whether entries of this type affect token balances.
    pub fn is_token_effect(&self) -> bool {
        matches!(self, EntryType::Mint | EntryType::Burn)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntryType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown entry type: {s}")))
    }
}

/// A value transfer between two parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    pub from: String,
    pub to: String,
    pub amount: u64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// The outcome of a compliance check against a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheckPayload {
    pub subject: String,
    pub check_type: String,
    pub passed: bool,
    #[serde(default)]
    pub details: Option<String>,
}

/// A client joining the ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingPayload {
    pub client_id: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

/// Creation of token units for a token id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintPayload {
    pub token_id: String,
    pub owner: String,
    pub amount: u64,
}

/// Destruction of token units for a token id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnPayload {
    pub token_id: String,
    pub amount: u64,
}

/// Issuance of a credential to a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialIssuePayload {
    pub credential_id: String,
    pub holder: String,
    pub issuer: String,
    pub credential_type: String,
}

/// Any other audit record (appeals, proctoring, graduation, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericAuditPayload {
    pub action: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// Entry payload, tagged by its [`EntryType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Payload {
    Transaction(TransactionPayload),
    ComplianceCheck(ComplianceCheckPayload),
    Onboarding(OnboardingPayload),
    Mint(MintPayload),
    Burn(BurnPayload),
    CredentialIssue(CredentialIssuePayload),
    GenericAudit(GenericAuditPayload),
}

impl Payload {
    /// The tag of this payload.
    pub fn entry_type(&self) -> EntryType {
        match self {
            Payload::Transaction(_) => EntryType::Transaction,
            Payload::ComplianceCheck(_) => EntryType::ComplianceCheck,
            Payload::Onboarding(_) => EntryType::Onboarding,
            Payload::Mint(_) => EntryType::Mint,
            Payload::Burn(_) => EntryType::Burn,
            Payload::CredentialIssue(_) => EntryType::CredentialIssue,
            Payload::GenericAudit(_) => EntryType::GenericAudit,
        }
    }

    /// Check the shape implied by the tag.
    pub fn validate(&self) -> Result<()> {
        match self {
            Payload::Transaction(tx) => {
                require_non_empty("transaction.from", &tx.from)?;
                require_non_empty("transaction.to", &tx.to)?;
                require_positive("transaction.amount", tx.amount)?;
                if tx.from == tx.to {
                    return Err(Error::validation(
                        "transaction.from and transaction.to must differ",
                    ));
                }
            }
            Payload::ComplianceCheck(check) => {
                require_non_empty("compliance-check.subject", &check.subject)?;
                require_non_empty("compliance-check.checkType", &check.check_type)?;
            }
            Payload::Onboarding(onboarding) => {
                require_non_empty("onboarding.clientId", &onboarding.client_id)?;
            }
            Payload::Mint(mint) => {
                require_non_empty("mint.tokenId", &mint.token_id)?;
                require_non_empty("mint.owner", &mint.owner)?;
                require_positive("mint.amount", mint.amount)?;
            }
            Payload::Burn(burn) => {
                require_non_empty("burn.tokenId", &burn.token_id)?;
                require_positive("burn.amount", burn.amount)?;
            }
            Payload::CredentialIssue(cred) => {
                require_non_empty("credential-issue.credentialId", &cred.credential_id)?;
                require_non_empty("credential-issue.holder", &cred.holder)?;
                require_non_empty("credential-issue.issuer", &cred.issuer)?;
                require_non_empty("credential-issue.credentialType", &cred.credential_type)?;
            }
            Payload::GenericAudit(audit) => {
                require_non_empty("generic-audit.action", &audit.action)?;
            }
        }
        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_positive(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::validation(format!("{field} must be greater than zero")));
    }
    Ok(())
}

/// A signed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Caller-chosen label. Unique among pending entries only.
    pub key: String,

    /// Tag and payload.
    #[serde(flatten)]
    pub payload: Payload,

    /// When the entry was created, as Unix millis.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Public key of the ledger identity that signed the entry.
    pub signer: PublicKey,

    /// Signature over [`Entry::canonical_bytes`].
    pub signature: Sig,
}

impl Entry {
    /// Start a new unsigned entry.
    pub fn builder() -> UnsignedEntry {
        UnsignedEntry::default()
    }

    /// The entry's tag.
    pub fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }

    /// Canonical bytes covering `key`, `type`, `payload` and `timestamp`.
    ///
    /// This is what the ledger identity signs.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        signing_bytes(&self.key, &self.payload, self.timestamp)
    }

    /// Canonical bytes of the whole entry, signer and signature included.
    ///
    /// Block hashes cover these bytes, so any out-of-band change to a mined
    /// entry changes its block's hash.
    pub fn sealed_bytes(&self) -> Vec<u8> {
        let sealed = SealedEntry {
            key: &self.key,
            entry_type: self.entry_type(),
            payload: &self.payload,
            timestamp_ms: self.timestamp.timestamp_millis(),
            signer: self.signer.as_bytes(),
            signature: &self.signature.to_bytes(),
        };
        bincode::serialize(&sealed).expect("serialization should not fail")
    }

    /// Check the signature against the embedded signer.
    pub fn verify_signature(&self) -> Result<()> {
        if self.signature.is_empty() {
            return Err(Error::signature(format!("entry {} is not signed", self.key)));
        }
        self.signer
            .verify(&self.canonical_bytes(), &self.signature)
            .map_err(|_| Error::signature(format!("signature mismatch on entry {}", self.key)))
    }
}

fn signing_bytes(key: &str, payload: &Payload, timestamp: DateTime<Utc>) -> Vec<u8> {
    let signable = SignableEntry {
        key,
        entry_type: payload.entry_type(),
        payload,
        timestamp_ms: timestamp.timestamp_millis(),
    };
    bincode::serialize(&signable).expect("serialization should not fail")
}

/// Helper for signing (excludes signer and signature).
#[derive(Serialize)]
struct SignableEntry<'a> {
    key: &'a str,
    entry_type: EntryType,
    payload: &'a Payload,
    timestamp_ms: i64,
}

/// Helper for block hashing (everything).
#[derive(Serialize)]
struct SealedEntry<'a> {
    key: &'a str,
    entry_type: EntryType,
    payload: &'a Payload,
    timestamp_ms: i64,
    signer: [u8; 32],
    signature: &'a [u8],
}

/// An entry that has not been signed yet.
#[derive(Debug, Clone, Default)]
pub struct UnsignedEntry {
    key: Option<String>,
    payload: Option<Payload>,
    timestamp: Option<DateTime<Utc>>,
}

impl UnsignedEntry {
    /// Set the key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the payload.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Use the current time as timestamp.
    pub fn now(mut self) -> Self {
        self.timestamp = Some(now_millis());
        self
    }

    /// Canonical bytes the signature will cover.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let (key, payload, timestamp) = self.parts()?;
        Ok(signing_bytes(key, payload, timestamp))
    }

    /// Sign and produce the finished entry.
    pub fn sign(self, key: &SecretKey) -> Result<Entry> {
        let canonical = self.canonical_bytes()?;
        let signature = key.sign(&canonical);
        let (entry_key, payload, timestamp) = self.into_parts()?;

        Ok(Entry {
            key: entry_key,
            payload,
            timestamp,
            signer: key.public_key(),
            signature,
        })
    }

    fn parts(&self) -> Result<(&str, &Payload, DateTime<Utc>)> {
        let key = self.key.as_deref().ok_or_else(|| Error::validation("missing key"))?;
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| Error::validation("missing payload"))?;
        let timestamp = self
            .timestamp
            .ok_or_else(|| Error::validation("missing timestamp"))?;
        Ok((key, payload, timestamp))
    }

    fn into_parts(self) -> Result<(String, Payload, DateTime<Utc>)> {
        let key = self.key.ok_or_else(|| Error::validation("missing key"))?;
        let payload = self.payload.ok_or_else(|| Error::validation("missing payload"))?;
        let timestamp = self
            .timestamp
            .ok_or_else(|| Error::validation("missing timestamp"))?;
        Ok((key, payload, timestamp))
    }
}

/// Canonical serialization and structural validation of entries.
///
/// Pure: no clocks other than the skew guard, no state beyond the chain's
/// genesis time.
#[derive(Debug, Clone, Copy)]
pub struct EntryCodec {
    genesis_time: DateTime<Utc>,
    max_future_skew: Duration,
}

impl EntryCodec {
    /// Create a codec for a chain whose genesis block has the given timestamp.
    pub fn new(genesis_time: DateTime<Utc>) -> Self {
        Self {
            genesis_time,
            max_future_skew: Duration::minutes(MAX_FUTURE_SKEW_MINUTES),
        }
    }

    /// Genesis time this codec validates against.
    pub fn genesis_time(&self) -> DateTime<Utc> {
        self.genesis_time
    }

    /// Canonical bytes of an entry (the signed portion).
    pub fn encode(entry: &Entry) -> Vec<u8> {
        entry.canonical_bytes()
    }

    /// Validate an entry's structure.
    ///
    /// Checks the key, the payload shape and the timestamp window. Signature
    /// checks belong to [`crate::SignatureVerifier`].
    pub fn validate(&self, entry: &Entry) -> Result<()> {
        if entry.key.trim().is_empty() {
            return Err(Error::validation("entry key must not be empty"));
        }
        if entry.key.len() > MAX_KEY_LEN {
            return Err(Error::validation(format!(
                "entry key is {} bytes, limit is {MAX_KEY_LEN}",
                entry.key.len()
            )));
        }

        entry.payload.validate()?;

        if entry.timestamp < self.genesis_time {
            return Err(Error::validation(format!(
                "entry {} is timestamped before chain genesis",
                entry.key
            )));
        }
        if entry.timestamp > Utc::now() + self.max_future_skew {
            return Err(Error::validation(format!(
                "entry {} is timestamped in the future",
                entry.key
            )));
        }

        let size = entry.sealed_bytes().len();
        if size > MAX_ENTRY_SIZE {
            return Err(Error::validation(format!(
                "entry too large: {size} bytes exceeds limit {MAX_ENTRY_SIZE}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint(token_id: &str, amount: u64) -> Payload {
        Payload::Mint(MintPayload {
            token_id: token_id.into(),
            owner: "owner".into(),
            amount,
        })
    }

    fn signed(key: &SecretKey, entry_key: &str, payload: Payload) -> Entry {
        Entry::builder()
            .key(entry_key)
            .payload(payload)
            .now()
            .sign(key)
            .unwrap()
    }

    #[test]
    fn test_entry_signature_verifies() {
        let key = SecretKey::generate();
        let entry = signed(&key, "mint-1", mint("client123", 1000));

        assert_eq!(entry.entry_type(), EntryType::Mint);
        assert_eq!(entry.signer, key.public_key());
        assert!(entry.verify_signature().is_ok());
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let key = SecretKey::generate();
        let mut entry = signed(&key, "mint-1", mint("client123", 1000));

        entry.payload = mint("client123", 1_000_000);

        assert!(matches!(
            entry.verify_signature(),
            Err(Error::Signature { .. })
        ));
    }

    #[test]
    fn test_unsigned_entry_is_rejected() {
        let key = SecretKey::generate();
        let mut entry = signed(&key, "mint-1", mint("client123", 1));
        entry.signature = Sig::empty();

        let err = entry.verify_signature().unwrap_err();
        assert!(err.to_string().contains("not signed"));
    }

    #[test]
    fn test_canonical_bytes_are_deterministic() {
        let key = SecretKey::generate();
        let ts = now_millis();
        let a = Entry::builder()
            .key("k")
            .payload(mint("t", 5))
            .timestamp(ts)
            .sign(&key)
            .unwrap();
        let b = Entry::builder()
            .key("k")
            .payload(mint("t", 5))
            .timestamp(ts)
            .sign(&key)
            .unwrap();

        assert_eq!(EntryCodec::encode(&a), EntryCodec::encode(&b));
        assert_eq!(a.sealed_bytes(), b.sealed_bytes());
    }

    #[test]
    fn test_type_is_bound_into_canonical_bytes() {
        let key = SecretKey::generate();
        let ts = now_millis();
        let m = Entry::builder()
            .key("k")
            .payload(mint("t", 5))
            .timestamp(ts)
            .sign(&key)
            .unwrap();
        let b = Entry::builder()
            .key("k")
            .payload(Payload::Burn(BurnPayload {
                token_id: "t".into(),
                amount: 5,
            }))
            .timestamp(ts)
            .sign(&key)
            .unwrap();

        assert_ne!(m.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn test_builder_requires_all_fields() {
        let key = SecretKey::generate();
        assert!(Entry::builder().payload(mint("t", 1)).now().sign(&key).is_err());
        assert!(Entry::builder().key("k").now().sign(&key).is_err());
        assert!(Entry::builder().key("k").payload(mint("t", 1)).sign(&key).is_err());
    }

    #[test]
    fn test_json_shape() {
        let key = SecretKey::generate();
        let entry = signed(&key, "mint-1", mint("client123", 1000));

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["key"], "mint-1");
        assert_eq!(value["type"], "mint");
        assert_eq!(value["payload"]["tokenId"], "client123");
        assert_eq!(value["payload"]["amount"], 1000);
        assert!(value["timestamp"].is_i64());
        assert!(value["signer"].is_string());
        assert!(value["signature"].is_string());

        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
        assert!(back.verify_signature().is_ok());
    }

    #[test]
    fn test_unknown_type_is_rejected_on_parse() {
        let key = SecretKey::generate();
        let entry = signed(&key, "mint-1", mint("client123", 1000));
        let mut value = serde_json::to_value(&entry).unwrap();
        value["type"] = "teleport".into();

        assert!(serde_json::from_value::<Entry>(value).is_err());
    }

    #[test]
    fn test_entry_type_from_str() {
        for t in EntryType::ALL {
            assert_eq!(t.as_str().parse::<EntryType>().unwrap(), t);
        }
        assert!("nope".parse::<EntryType>().is_err());
        assert!(EntryType::Burn.is_token_effect());
        assert!(!EntryType::Onboarding.is_token_effect());
    }

    #[test]
    fn test_codec_rejects_empty_key() {
        let key = SecretKey::generate();
        let codec = EntryCodec::new(now_millis() - Duration::hours(1));
        let mut entry = signed(&key, "x", mint("t", 1));
        entry.key = "   ".into();

        assert!(matches!(codec.validate(&entry), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_codec_rejects_bad_payload_shapes() {
        let codec = EntryCodec::new(now_millis() - Duration::hours(1));
        let key = SecretKey::generate();

        let zero_mint = signed(&key, "m", mint("t", 0));
        assert!(codec.validate(&zero_mint).is_err());

        let self_transfer = signed(
            &key,
            "tx",
            Payload::Transaction(TransactionPayload {
                from: "A".into(),
                to: "A".into(),
                amount: 1,
                currency: None,
            }),
        );
        assert!(codec.validate(&self_transfer).is_err());

        let no_action = signed(
            &key,
            "audit",
            Payload::GenericAudit(GenericAuditPayload {
                action: String::new(),
                details: BTreeMap::new(),
            }),
        );
        assert!(codec.validate(&no_action).is_err());
    }

    #[test]
    fn test_codec_rejects_pre_genesis_timestamp() {
        let key = SecretKey::generate();
        let genesis = now_millis();
        let codec = EntryCodec::new(genesis);

        let entry = Entry::builder()
            .key("old")
            .payload(mint("t", 1))
            .timestamp(genesis - Duration::seconds(10))
            .sign(&key)
            .unwrap();

        assert!(codec.validate(&entry).is_err());
    }

    #[test]
    fn test_codec_rejects_future_timestamp() {
        let key = SecretKey::generate();
        let codec = EntryCodec::new(now_millis() - Duration::hours(1));

        let entry = Entry::builder()
            .key("future")
            .payload(mint("t", 1))
            .timestamp(now_millis() + Duration::hours(1))
            .sign(&key)
            .unwrap();

        assert!(codec.validate(&entry).is_err());
    }

    #[test]
    fn test_codec_accepts_well_formed_entry() {
        let key = SecretKey::generate();
        let codec = EntryCodec::new(now_millis() - Duration::hours(1));
        let entry = signed(
            &key,
            "cred-1",
            Payload::CredentialIssue(CredentialIssuePayload {
                credential_id: "cred-1".into(),
                holder: "alice".into(),
                issuer: "academy".into(),
                credential_type: "diploma".into(),
            }),
        );

        assert!(codec.validate(&entry).is_ok());
    }
}

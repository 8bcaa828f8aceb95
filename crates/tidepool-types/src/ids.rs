//! Identifiers used throughout Tidepool.
//!
//! None of these are generated internally: every identifier either comes
//! from an external chain (`TxId`, `Address`, `Chain`) or from the
//! membership collaborator (`NodeAddress`, `PubKey`). Constructors
//! normalize and validate so that equality is plain structural equality.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{constants, Result, TidepoolError};

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// External-chain transaction hash.
///
/// Stored uppercase so that comparisons are case-insensitive. Accepts
/// 64 hex characters, or 66 with an `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    /// Sentinel for transactions synthesized internally.
    pub const BLANK: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// Parse a chain-native transaction hash.
    pub fn new(hash: &str) -> Result<Self> {
        let hash = hash.trim();
        let digits = match hash.len() {
            64 => hash,
            66 if hash.starts_with("0x") || hash.starts_with("0X") => &hash[2..],
            _ => return Err(TidepoolError::InvalidTxId(hash.to_string())),
        };
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TidepoolError::InvalidTxId(hash.to_string()));
        }
        Ok(Self(hash.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn blank() -> Self {
        Self(Self::BLANK.to_string())
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0 == Self::BLANK
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxId {
    type Error = TidepoolError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> Self {
        id.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PubKey
// ---------------------------------------------------------------------------

/// Custody public key identifying a vault. Serialized as lowercase hex.
///
/// The signature scheme behind the key is a collaborator concern; here it
/// is an opaque byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PubKey(Vec<u8>);

impl PubKey {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|_| TidepoolError::InvalidPubKey(s.to_string()))?;
        if bytes.is_empty() {
            return Err(TidepoolError::InvalidPubKey(s.to_string()));
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// First four bytes in hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(4)])
    }
}

impl TryFrom<String> for PubKey {
    type Error = TidepoolError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<PubKey> for String {
    fn from(pk: PubKey) -> Self {
        hex::encode(pk.0)
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

// ---------------------------------------------------------------------------
// NodeAddress
// ---------------------------------------------------------------------------

/// Account address of a validator node; the identity that signs observations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn new(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TidepoolError::NotAuthorized(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = TidepoolError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<NodeAddress> for String {
    fn from(addr: NodeAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An address on an external chain.
///
/// Case is preserved: some chains (base58) are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty()
            || s.len() > constants::MAX_ADDRESS_LEN
            || !s.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(TidepoolError::InvalidAddress(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = TidepoolError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// External or native chain identifier, e.g. `BNB`, `BTC`, `ETH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chain(String);

impl Chain {
    pub fn new(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TidepoolError::InvalidAsset(s.to_string()));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn bnb() -> Self {
        Self("BNB".to_string())
    }

    #[must_use]
    pub fn btc() -> Self {
        Self("BTC".to_string())
    }

    #[must_use]
    pub fn eth() -> Self {
        Self("ETH".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Chain {
    type Error = TidepoolError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> Self {
        chain.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
impl TxId {
    pub fn random() -> Self {
        Self(hex::encode_upper(rand::random::<[u8; 32]>()))
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl PubKey {
    pub fn random() -> Self {
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&rand::random::<[u8; 32]>());
        Self(bytes)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl NodeAddress {
    pub fn random() -> Self {
        Self(format!("tide{}", hex::encode(rand::random::<[u8; 16]>())))
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Address {
    pub fn random() -> Self {
        Self(format!("bnb{}", hex::encode(rand::random::<[u8; 19]>())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "a1c7d97d5db51ffdbc3fe29fff6adaa2daf112d2ceaada0902822333a59bd218";

    #[test]
    fn tx_id_uppercases_and_compares_case_insensitively() {
        let lower = TxId::new(HASH).unwrap();
        let upper = TxId::new(&HASH.to_uppercase()).unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), HASH.to_uppercase());
    }

    #[test]
    fn tx_id_accepts_eth_prefix() {
        let id = TxId::new(&format!("0x{HASH}")).unwrap();
        assert_eq!(id.as_str().len(), 66);
    }

    #[test]
    fn tx_id_rejects_bad_length_and_alphabet() {
        assert!(TxId::new("abc").is_err());
        assert!(TxId::new(&format!("zz{}", &HASH[2..])).is_err());
        assert!(TxId::new(&format!("1x{HASH}")).is_err());
    }

    #[test]
    fn blank_tx_id() {
        assert!(TxId::blank().is_blank());
        assert!(!TxId::random().is_blank());
        assert_eq!(TxId::new(TxId::BLANK).unwrap(), TxId::blank());
    }

    #[test]
    fn pubkey_hex_roundtrip() {
        let pk = PubKey::random();
        let back = PubKey::from_hex(&pk.to_string()).unwrap();
        assert_eq!(pk, back);
        assert!(PubKey::from_hex("not-hex").is_err());
        assert!(PubKey::from_hex("").is_err());
    }

    #[test]
    fn address_validation() {
        assert!(Address::new("bnb1lejrrtta9cgr49fuh7ktu3sddhe0ff7wenlpn6").is_ok());
        assert!(Address::new("bad_DES").is_err());
        assert!(Address::new("").is_err());
        assert!(Address::new(&"a".repeat(129)).is_err());
    }

    #[test]
    fn chain_is_uppercased() {
        assert_eq!(Chain::new("bnb").unwrap(), Chain::bnb());
        assert!(Chain::new("b.n").is_err());
    }

    #[test]
    fn serde_roundtrips_normalize() {
        let json = format!("\"{HASH}\"");
        let id: TxId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, TxId::new(HASH).unwrap());

        let bad: std::result::Result<Address, _> = serde_json::from_str("\"bad_DES\"");
        assert!(bad.is_err());

        let pk = PubKey::random();
        let json = serde_json::to_string(&pk).unwrap();
        let back: PubKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, back);
    }
}

//! Fixed-size identifiers: 32-byte ids, 20-byte short ids, and node ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cb58::{self, Cb58Error, CHECKSUM_SIZE};

/// Length of a transaction, chain or asset id.
pub const ID_LEN: usize = 32;

/// Length of an owner address or node id payload.
pub const SHORT_ID_LEN: usize = 20;

/// Textual prefix of a node id.
pub const NODE_ID_PREFIX: &str = "NodeID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid id length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("chain id must decode to {expected} bytes, got {0}", expected = ID_LEN + CHECKSUM_SIZE)]
    ChainIdWrongLength(usize),

    #[error("chain id checksum mismatch")]
    ChainIdBadChecksum,

    #[error("invalid NodeID tag")]
    InvalidNodeIdTag,

    #[error("NodeID is not in cb58 format (decoded {0} bytes)")]
    InvalidNodeIdLength(usize),

    #[error("hex decode error: {0}")]
    Hex(String),

    #[error("cb58 error: {0}")]
    Cb58(#[from] Cb58Error),
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], IdError> {
    bytes.try_into().map_err(|_| IdError::WrongLength {
        expected: N,
        got: bytes.len(),
    })
}

// ─── Id ─────────────────────────────────────────────────────────────────────

/// A 32-byte identifier (transaction, blockchain, asset or subnet id).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(pub [u8; ID_LEN]);

impl Id {
    pub const fn new(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        Ok(Self(to_array(bytes)?))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; ID_LEN]
    }

    pub fn to_cb58(&self) -> String {
        cb58::encode(&self.0)
    }

    pub fn from_cb58(s: &str) -> Result<Self, IdError> {
        Self::from_slice(&cb58::decode(s)?)
    }

    /// Strict parse used for caller-supplied chain ids.
    ///
    /// A truncated or padded id yields `ChainIdWrongLength`; an id of the
    /// right length whose checksum does not match (or that is not valid
    /// Base58 at all) yields `ChainIdBadChecksum`.
    pub fn from_cb58_checked(s: &str) -> Result<Self, IdError> {
        let raw = cb58::decode_unchecked(s).map_err(|_| IdError::ChainIdBadChecksum)?;
        if raw.len() != ID_LEN + CHECKSUM_SIZE {
            return Err(IdError::ChainIdWrongLength(raw.len()));
        }
        let payload = cb58::verify(&raw).map_err(|_| IdError::ChainIdBadChecksum)?;
        Self::from_slice(&payload)
    }
}

impl From<[u8; ID_LEN]> for Id {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cb58())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_cb58())
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cb58(s)
    }
}

impl TryFrom<String> for Id {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_cb58(&s)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.to_cb58()
    }
}

// ─── ShortId ────────────────────────────────────────────────────────────────

/// A 20-byte owner address payload (hash of a compressed secp256k1 key).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortId(pub [u8; SHORT_ID_LEN]);

impl ShortId {
    pub const fn new(bytes: [u8; SHORT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        Ok(Self(to_array(bytes)?))
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_ID_LEN] {
        &self.0
    }

    /// The all-zero id, which marks an untagged signature slot.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; SHORT_ID_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| IdError::Hex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; SHORT_ID_LEN]> for ShortId {
    fn from(bytes: [u8; SHORT_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortId({})", self.to_hex())
    }
}

impl TryFrom<String> for ShortId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ShortId> for String {
    fn from(id: ShortId) -> Self {
        id.to_hex()
    }
}

// ─── NodeId ─────────────────────────────────────────────────────────────────

/// A validator node id, textually `NodeID-<cb58 of 20 bytes>`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(pub [u8; SHORT_ID_LEN]);

impl NodeId {
    pub const fn new(bytes: [u8; SHORT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        Ok(Self(to_array(bytes)?))
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_ID_LEN] {
        &self.0
    }

    /// Parse and validate the textual form.
    ///
    /// Checks, in order: the `NodeID-` tag, the decoded length of the cb58
    /// suffix (20 payload bytes + 4 checksum bytes), then the checksum.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let suffix = s
            .strip_prefix(NODE_ID_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or(IdError::InvalidNodeIdTag)?;
        let raw = cb58::decode_unchecked(suffix).map_err(|_| IdError::InvalidNodeIdLength(0))?;
        if raw.len() != SHORT_ID_LEN + CHECKSUM_SIZE {
            return Err(IdError::InvalidNodeIdLength(raw.len()));
        }
        Self::from_slice(&cb58::verify(&raw)?)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", NODE_ID_PREFIX, cb58::encode(&self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_cb58_roundtrip() {
        let id = Id::new([0x42; 32]);
        let text = id.to_cb58();
        assert_eq!(Id::from_cb58(&text).unwrap(), id);
        assert_eq!(text.parse::<Id>().unwrap(), id);
    }

    #[test]
    fn test_id_wrong_length() {
        assert_eq!(
            Id::from_slice(&[0u8; 31]),
            Err(IdError::WrongLength { expected: 32, got: 31 })
        );
    }

    #[test]
    fn test_chain_id_checked_ok() {
        let id = Id::from_cb58_checked("yH8D7ThNJkxmtkuv2jgBa4P1Rn3Qpr4pPr7QYNfcdoS6k6HWp").unwrap();
        assert_eq!(
            hex::encode(id.as_bytes()),
            "7fc93d85c6d62c5b2ac0b519c87010ea5294012d1e407030d6acd0021cac10d5"
        );
    }

    #[test]
    fn test_chain_id_truncated() {
        let text = cb58::encode(&[9u8; 20]);
        assert_eq!(Id::from_cb58_checked(&text), Err(IdError::ChainIdWrongLength(24)));
    }

    #[test]
    fn test_chain_id_corrupted() {
        let mut raw = cb58::decode_unchecked(&Id::new([3; 32]).to_cb58()).unwrap();
        raw[0] ^= 0xff;
        let corrupted = bs58::encode(raw).into_string();
        assert_eq!(Id::from_cb58_checked(&corrupted), Err(IdError::ChainIdBadChecksum));
    }

    #[test]
    fn test_short_id_hex() {
        let id = ShortId::new([0xab; 20]);
        assert_eq!(ShortId::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(ShortId::from_hex(&format!("0x{}", id.to_hex())).unwrap(), id);
        assert!(ShortId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_node_id_roundtrip() {
        let node = NodeId::new([0x11; 20]);
        let text = node.to_string();
        assert!(text.starts_with("NodeID-"));
        assert_eq!(NodeId::parse(&text).unwrap(), node);
    }

    #[test]
    fn test_node_id_bad_tag() {
        let text = NodeId::new([0x11; 20]).to_string().replacen("NodeID", "NodeXX", 1);
        assert_eq!(NodeId::parse(&text), Err(IdError::InvalidNodeIdTag));
        assert_eq!(NodeId::parse(""), Err(IdError::InvalidNodeIdTag));
        let no_dash = NodeId::new([0x11; 20]).to_string().replacen("NodeID-", "NodeIDx", 1);
        assert_eq!(NodeId::parse(&no_dash), Err(IdError::InvalidNodeIdTag));
        let bare = NodeId::new([0x11; 20]).to_string().replacen("NodeID-", "NodeID", 1);
        assert_eq!(NodeId::parse(&bare), Err(IdError::InvalidNodeIdTag));
    }

    #[test]
    fn test_node_id_bad_length() {
        let text = format!("NodeID-{}", cb58::encode(&[0x11; 19]));
        assert_eq!(NodeId::parse(&text), Err(IdError::InvalidNodeIdLength(23)));
    }

    #[test]
    fn test_id_serde_as_cb58() {
        let id = Id::new([1; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_cb58()));
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

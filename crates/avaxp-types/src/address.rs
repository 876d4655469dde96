//! Chain address formatting and parsing.
//!
//! Platform-chain owner addresses are 20-byte short ids rendered as
//! `<alias>-<bech32(hrp, bytes)>`, e.g. `P-fuji1...`. EVM-chain accounts are
//! rendered as `0x` followed by 40 lowercase hex characters.

use std::fmt;
use std::str::FromStr;

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::ids::{ShortId, SHORT_ID_LEN};

/// Separator between the chain alias and the bech32 body.
pub const ALIAS_SEPARATOR: char = '-';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be a non-empty string")]
    Empty,

    #[error("invalid human readable part: {0}")]
    InvalidHrp(String),

    #[error("bech32 error: {0}")]
    Bech32(String),

    #[error("address hrp mismatch: expected {expected}, got {got}")]
    HrpMismatch { expected: String, got: String },

    #[error("invalid address length: expected {SHORT_ID_LEN} bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid EVM address: {0}")]
    InvalidEvmAddress(String),

    #[error("public key must be 65 uncompressed bytes, got {0}")]
    InvalidPublicKey(usize),
}

/// Format an owner address as `<alias>-<bech32>`.
pub fn format_address(alias: &str, hrp: &str, address: &ShortId) -> Result<String, AddressError> {
    let hrp = Hrp::parse(hrp).map_err(|e| AddressError::InvalidHrp(e.to_string()))?;
    let body = bech32::encode::<Bech32>(hrp, address.as_bytes())
        .map_err(|e| AddressError::Bech32(e.to_string()))?;
    Ok(format!("{}{}{}", alias, ALIAS_SEPARATOR, body))
}

/// Parse `<alias>-<bech32>` (the alias is optional) into its short id.
///
/// The decoded human readable part must equal `expected_hrp`.
pub fn parse_address(address: &str, expected_hrp: &str) -> Result<ShortId, AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    let body = match address.split_once(ALIAS_SEPARATOR) {
        Some((_, body)) => body,
        None => address,
    };
    let (hrp, data) = bech32::decode(body).map_err(|e| AddressError::Bech32(e.to_string()))?;
    if hrp.as_str() != expected_hrp {
        return Err(AddressError::HrpMismatch {
            expected: expected_hrp.to_string(),
            got: hrp.as_str().to_string(),
        });
    }
    ShortId::from_slice(&data).map_err(|_| AddressError::InvalidLength(data.len()))
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

// ─── EVM addresses ──────────────────────────────────────────────────────────

/// A 20-byte EVM account address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress(pub [u8; SHORT_ID_LEN]);

impl EvmAddress {
    pub const fn new(bytes: [u8; SHORT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_ID_LEN] {
        &self.0
    }

    /// Derive the account address from a 65-byte uncompressed public key.
    pub fn from_public_key(uncompressed: &[u8]) -> Result<Self, AddressError> {
        if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
            return Err(AddressError::InvalidPublicKey(uncompressed.len()));
        }
        let hash = keccak256(&uncompressed[1..]);
        let mut out = [0u8; SHORT_ID_LEN];
        out.copy_from_slice(&hash[12..]);
        Ok(Self(out))
    }

    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::InvalidEvmAddress(s.to_string()))?;
        let bytes = hex::decode(body).map_err(|_| AddressError::InvalidEvmAddress(s.to_string()))?;
        let arr: [u8; SHORT_ID_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidEvmAddress(s.to_string()))?;
        Ok(Self(arr))
    }

    /// The same 20 bytes viewed as an owner short id.
    pub fn to_short_id(&self) -> ShortId {
        ShortId::new(self.0)
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", self)
    }
}

impl FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EvmAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<EvmAddress> for String {
    fn from(a: EvmAddress) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_roundtrip() {
        let id = ShortId::new([0x3c; 20]);
        let text = format_address("P", "fuji", &id).unwrap();
        assert!(text.starts_with("P-fuji1"));
        assert_eq!(parse_address(&text, "fuji").unwrap(), id);
    }

    #[test]
    fn test_parse_without_alias() {
        let id = ShortId::new([0x01; 20]);
        let text = format_address("P", "avax", &id).unwrap();
        let body = text.trim_start_matches("P-");
        assert_eq!(parse_address(body, "avax").unwrap(), id);
    }

    #[test]
    fn test_parse_wrong_hrp() {
        let text = format_address("P", "avax", &ShortId::new([2; 20])).unwrap();
        assert!(matches!(
            parse_address(&text, "fuji"),
            Err(AddressError::HrpMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_address("", "fuji"), Err(AddressError::Empty));
    }

    #[test]
    fn test_evm_address_parse_display() {
        let text = "0x8db97c7cece249c2b98bdc0226cc4c2a57bf52fc";
        let addr = EvmAddress::parse(text).unwrap();
        assert_eq!(addr.to_string(), text);
        assert!(EvmAddress::parse("8db97c7cece249c2b98bdc0226cc4c2a57bf52fc").is_err());
        assert!(EvmAddress::parse("0x1234").is_err());
    }

    #[test]
    fn test_evm_address_rejects_compressed_key() {
        assert_eq!(
            EvmAddress::from_public_key(&[2u8; 33]),
            Err(AddressError::InvalidPublicKey(33))
        );
    }
}

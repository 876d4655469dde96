//! cb58 encoding: Base58 over the payload followed by a 4-byte checksum.
//!
//! The checksum is the last four bytes of SHA-256 over the payload. This is
//! the text form used for transaction ids, chain ids, asset ids and node ids.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Size of the trailing checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Cb58Error {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("cb58 string too short ({0} bytes, need more than 4)")]
    TooShort(usize),

    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// Last four bytes of SHA-256 over `payload`.
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let hash = Sha256::digest(payload);
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&hash[hash.len() - CHECKSUM_SIZE..]);
    out
}

/// Encode a payload to cb58.
pub fn encode(payload: &[u8]) -> String {
    let mut with_checksum = Vec::with_capacity(payload.len() + CHECKSUM_SIZE);
    with_checksum.extend_from_slice(payload);
    with_checksum.extend_from_slice(&checksum(payload));
    bs58::encode(with_checksum).into_string()
}

/// Decode the raw Base58 layer without checking the checksum.
///
/// Returned bytes still include the 4 checksum bytes; callers that need to
/// tell a truncated id from a corrupted one inspect the length first.
pub fn decode_unchecked(encoded: &str) -> Result<Vec<u8>, Cb58Error> {
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| Cb58Error::InvalidBase58(e.to_string()))
}

/// Split a decoded buffer into payload and checksum, verifying the checksum.
pub fn verify(decoded: &[u8]) -> Result<Vec<u8>, Cb58Error> {
    if decoded.len() <= CHECKSUM_SIZE {
        return Err(Cb58Error::TooShort(decoded.len()));
    }
    let (payload, sum) = decoded.split_at(decoded.len() - CHECKSUM_SIZE);
    if checksum(payload) != sum {
        return Err(Cb58Error::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

/// Decode a cb58 string, verifying and stripping the checksum.
pub fn decode(encoded: &str) -> Result<Vec<u8>, Cb58Error> {
    verify(&decode_unchecked(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_id_encoding() {
        assert_eq!(encode(&[0u8; 32]), "11111111111111111111111111111111LpoYY");
    }

    #[test]
    fn test_roundtrip() {
        let data = (0..32u8).collect::<Vec<_>>();
        let encoded = encode(&data);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_known_chain_id() {
        let decoded = decode("2q9e4r6Mu3U68nU1fYjgbR6JvwrRx36CohpAX5UQxse55x1Q5").unwrap();
        assert_eq!(
            hex::encode(decoded),
            "0427d4b22a2a78bcddd456742caf91b56badbff985ee19aef14573e7343fd652"
        );
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut raw = decode_unchecked(&encode(&[7u8; 32])).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(verify(&raw), Err(Cb58Error::ChecksumMismatch));
    }

    #[test]
    fn test_invalid_characters() {
        assert!(matches!(decode("0OIl"), Err(Cb58Error::InvalidBase58(_))));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(verify(&[1, 2, 3]), Err(Cb58Error::TooShort(3)));
    }
}

//! Key holder collaborator.
//!
//! The signing coordinator only needs a handle that can sign a 32-byte hash
//! and report its addresses; raw key material never leaves the holder.
//! `PrivateKey` is the in-process secp256k1 implementation.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use avaxp_types::{cb58, format_address, EvmAddress, ShortId};

use crate::types::SIGNATURE_LEN;
use crate::TxError;

/// Anything that can sign on behalf of one owner address.
pub trait Keys {
    /// 65-byte recoverable signature `r ‖ s ‖ recovery_id` over `hash`.
    fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN], TxError>;

    /// Compressed SEC1 public key.
    fn public_key(&self) -> Vec<u8>;

    /// Platform-chain owner address.
    fn address(&self) -> ShortId;

    /// EVM-chain account address.
    fn evm_address(&self) -> EvmAddress;

    /// `<alias>-<bech32>` form of `address()`.
    fn address_string(&self, hrp: &str, alias: &str) -> Result<String, TxError> {
        Ok(format_address(alias, hrp, &self.address())?)
    }
}

/// ripemd160(sha256(compressed public key)).
pub fn address_of(key: &VerifyingKey) -> ShortId {
    let compressed = key.to_encoded_point(true);
    let sha = Sha256::digest(compressed.as_bytes());
    let hash = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash);
    ShortId::new(out)
}

/// keccak256 of the uncompressed public key, last 20 bytes.
pub fn evm_address_of(key: &VerifyingKey) -> Result<EvmAddress, TxError> {
    let uncompressed = key.to_encoded_point(false);
    Ok(EvmAddress::from_public_key(uncompressed.as_bytes())?)
}

/// Recover the public key that produced a 65-byte signature over `hash`.
pub fn recover_signer(hash: &[u8; 32], sig: &[u8; SIGNATURE_LEN]) -> Result<VerifyingKey, TxError> {
    let signature = Signature::from_slice(&sig[..64])
        .map_err(|e| TxError::Invalid(format!("malformed signature: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(sig[64])
        .ok_or_else(|| TxError::Invalid(format!("invalid recovery id {}", sig[64])))?;
    VerifyingKey::recover_from_prehash(hash, &signature, recovery_id)
        .map_err(|e| TxError::Invalid(format!("signature recovery failed: {}", e)))
}

/// Text prefix of a cb58-encoded private key.
pub const PRIVATE_KEY_PREFIX: &str = "PrivateKey-";

/// A secp256k1 private key held in memory.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let inner = SigningKey::from_slice(bytes)
            .map_err(|_| TxError::Invalid("invalid private key".into()))?;
        Ok(Self { inner })
    }

    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| TxError::Invalid("private key is not hex".into()))?;
        Self::from_bytes(&bytes)
    }

    /// Wallet export form, `PrivateKey-<cb58>`.
    pub fn from_cb58(s: &str) -> Result<Self, TxError> {
        let encoded = s.strip_prefix(PRIVATE_KEY_PREFIX).ok_or_else(|| {
            TxError::Invalid(format!("private key must start with {}", PRIVATE_KEY_PREFIX))
        })?;
        let bytes = cb58::decode(encoded)
            .map_err(|e| TxError::Invalid(format!("private key is not cb58: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn random() -> Self {
        Self {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.inner.verifying_key()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.address())
    }
}

impl Keys for PrivateKey {
    fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN], TxError> {
        let (signature, recovery_id) = self
            .inner
            .sign_prehash_recoverable(hash)
            .map_err(|e| TxError::Invalid(format!("signing failed: {}", e)))?;
        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }

    fn address(&self) -> ShortId {
        address_of(self.verifying_key())
    }

    fn evm_address(&self) -> EvmAddress {
        let uncompressed = self.verifying_key().to_encoded_point(false);
        // A point encoded uncompressed is always 65 bytes with a 0x04 tag.
        EvmAddress::from_public_key(uncompressed.as_bytes()).unwrap_or_default()
    }
}

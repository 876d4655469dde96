//! Multisig transaction construction, signing, and parsing.
//!
//! Builds 2-of-3 threshold transactions for the Platform chain (staking,
//! atomic import/export) and the EVM chain (atomic import/export), places
//! each owner's signature slot by address rather than by call order, and
//! round-trips transactions through their canonical byte form so partially
//! signed transactions can move between independent signers.

pub mod types;
pub mod packer;
pub mod codec;
pub mod utxo;
pub mod credential;
pub mod assemble;
pub mod fee;
pub mod builder;
pub mod atomic;
pub mod stake;
pub mod sign;
pub mod keys;
pub mod analysis;

pub use types::{
    BaseTx, Credential, EvmInput, EvmOutput, OutputOwners, ProofOfPossession, SignatureSlot,
    Transaction, TransferableInput, TransferableOutput, UnsignedTx, Validator,
};
pub use utxo::{OutputKind, RawUtxo, Utxo, UtxoSet};
pub use credential::{AddressSlotMap, CanonicalSigners};
pub use assemble::{Assembled, InputOutputAssembler};
pub use fee::Fee;
pub use builder::{BuildCommon, BuilderConfig, TransactionBuilder, TxKind};
pub use atomic::{ExportInCBuilder, ExportInPBuilder, ImportInCBuilder, ImportInPBuilder};
pub use stake::{
    DelegatorBuilder, PermissionlessDelegatorBuilder, PermissionlessValidatorBuilder,
    StakeCommon, StakeFields, ValidatorBuilder,
};
pub use keys::{Keys, PrivateKey};
pub use analysis::{OutputSummary, StakingSummary, TxExplanation};

use avaxp_types::{AddressError, IdError, NetworkError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    // ─── UTXO input validation ──────────────────────────────────────────────
    #[error("UTXOs are required")]
    UtxosEmpty,

    #[error("UTXO is missing required field: {0}")]
    UtxoMissingField(&'static str),

    #[error("threshold is inconsistent: builder expects {expected}, UTXO has {got}")]
    ThresholdInconsistent { expected: u32, got: u32 },

    #[error("addresses are inconsistent for UTXO {0}")]
    AddressesInconsistent(String),

    #[error("insufficient funds: have {total}, need {target}")]
    InsufficientFunds { total: u64, target: u64 },

    // ─── Parameter validation ───────────────────────────────────────────────
    #[error("node id must start with NodeID")]
    InvalidNodeIdTag,

    #[error("node id is not in cb58 format (decoded {0} bytes)")]
    InvalidNodeIdLength(usize),

    #[error("start time {start} is too soon, earliest allowed is {earliest}")]
    StartTimeTooSoon { start: u64, earliest: u64 },

    #[error("stake duration {duration}s is shorter than the minimum {min}s")]
    StakeDurationTooShort { duration: u64, min: u64 },

    #[error("stake duration {duration}s is longer than the maximum {max}s")]
    StakeDurationTooLong { duration: u64, max: u64 },

    #[error("end time must be after start time")]
    EndBeforeStart,

    #[error("stake amount {amount} is below the minimum {min}")]
    StakeAmountBelowMinimum { amount: u64, min: u64 },

    #[error("delegation fee {fee}% is below the minimum {min}%")]
    DelegationFeeBelowMinimum { fee: u32, min: u32 },

    #[error("chain id must decode to 36 bytes, got {0}")]
    ChainIdWrongLength(usize),

    #[error("chain id checksum is invalid")]
    ChainIdBadChecksum,

    #[error("required field is not set: {0}")]
    MissingField(&'static str),

    // ─── Signing ────────────────────────────────────────────────────────────
    #[error("key with address {0} cannot sign this transaction")]
    KeyCannotSign(String),

    #[error("address {0} has already signed this transaction")]
    DuplicateSignature(String),

    // ─── Codec ──────────────────────────────────────────────────────────────
    #[error("unrecognized transaction format (type id {0:#x})")]
    UnrecognizedTransactionFormat(u32),

    #[error("raw transaction is empty")]
    RawTransactionEmpty,

    #[error("raw transaction is not hex")]
    RawTransactionNotHex,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("network config error: {0}")]
    Network(#[from] NetworkError),
}

impl From<IdError> for TxError {
    fn from(e: IdError) -> Self {
        match e {
            IdError::ChainIdWrongLength(n) => TxError::ChainIdWrongLength(n),
            IdError::ChainIdBadChecksum => TxError::ChainIdBadChecksum,
            IdError::InvalidNodeIdTag => TxError::InvalidNodeIdTag,
            IdError::InvalidNodeIdLength(n) => TxError::InvalidNodeIdLength(n),
            other => TxError::Invalid(other.to_string()),
        }
    }
}

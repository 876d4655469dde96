//! Fee accounting.
//!
//! The Platform chain charges a fixed per-transaction fee taken from
//! `NetworkParams::tx_fee`. The EVM chain's atomic transactions are metered
//! per byte of the fully serialized (credential-bearing) transaction, so the
//! fee is only known once the input/output set is final.

use serde::Serialize;

use crate::TxError;

/// Fee charged by a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Fee {
    pub fee: u64,
    /// Per-byte rate, for byte-metered transactions.
    pub fee_rate: Option<u64>,
    /// Measured size the fee was computed from.
    pub byte_size: Option<u32>,
}

impl Fee {
    /// A fixed network fee.
    pub fn fixed(fee: u64) -> Self {
        Self {
            fee,
            fee_rate: None,
            byte_size: None,
        }
    }

    /// `fee_rate * byte_size`.
    pub fn metered(fee_rate: u64, byte_size: usize) -> Result<Self, TxError> {
        let size = u32::try_from(byte_size)
            .map_err(|_| TxError::Invalid(format!("transaction size {} overflows", byte_size)))?;
        let fee = fee_rate
            .checked_mul(u64::from(size))
            .ok_or_else(|| TxError::Invalid("fee overflows u64".into()))?;
        Ok(Self {
            fee,
            fee_rate: Some(fee_rate),
            byte_size: Some(size),
        })
    }

    /// Fee recovered from an already-built transaction that must not change.
    pub fn frozen(fee: u64) -> Self {
        Self {
            fee,
            fee_rate: None,
            byte_size: None,
        }
    }

    /// A frozen byte-metered fee. The rate is reported only when `fee` is an
    /// exact multiple of `byte_size`, i.e. when it is the rate actually paid.
    pub fn frozen_metered(fee: u64, byte_size: usize) -> Self {
        let size = u32::try_from(byte_size).ok().filter(|s| *s > 0);
        let fee_rate = size
            .map(u64::from)
            .filter(|s| fee % s == 0)
            .map(|s| fee / s);
        Self {
            fee,
            fee_rate,
            byte_size: size,
        }
    }
}

/// Add two amounts, failing on overflow.
pub(crate) fn checked_add(a: u64, b: u64) -> Result<u64, TxError> {
    a.checked_add(b)
        .ok_or_else(|| TxError::Invalid("amount overflows u64".into()))
}

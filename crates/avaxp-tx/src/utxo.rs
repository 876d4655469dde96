//! Spendable outputs.
//!
//! UTXOs arrive from an external indexer as loosely typed records
//! (`RawUtxo`), are validated into `Utxo`, and are grouped into a `UtxoSet`
//! checked against the builder's threshold. The set is spent in full: the
//! caller pre-selects which outputs fund a transaction.

use serde::{Deserialize, Serialize};

use avaxp_types::{cb58, parse_address, Id, ShortId};

use crate::types::platform_type;
use crate::TxError;

/// Kind of output a UTXO holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// secp256k1 transfer output.
    Transfer,
}

impl OutputKind {
    pub fn from_type_id(id: u32) -> Result<Self, TxError> {
        match id {
            platform_type::SECP_TRANSFER_OUTPUT => Ok(OutputKind::Transfer),
            other => Err(TxError::Invalid(format!("unsupported UTXO output type {}", other))),
        }
    }
}

/// UTXO record as delivered by the indexer, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawUtxo {
    #[serde(rename = "outputID", default)]
    pub output_id: Option<u32>,
    /// Decimal string.
    #[serde(default)]
    pub amount: Option<String>,
    /// cb58 transaction id.
    #[serde(default)]
    pub txid: Option<String>,
    /// cb58 of the 4-byte big-endian index; a decimal string is also accepted.
    #[serde(default)]
    pub outputidx: Option<String>,
    /// bech32 (`P-fuji1...`) or hex owner addresses.
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub locktime: u64,
}

/// A validated spendable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub output_kind: OutputKind,
    pub amount: u64,
    pub tx_id: Id,
    pub output_index: u32,
    pub threshold: u32,
    /// Owner addresses in on-chain order.
    pub addresses: Vec<ShortId>,
    pub locktime: u64,
}

impl Utxo {
    /// A transfer output owned by `addresses`.
    pub fn transfer(
        tx_id: Id,
        output_index: u32,
        amount: u64,
        threshold: u32,
        addresses: Vec<ShortId>,
    ) -> Self {
        Self {
            output_kind: OutputKind::Transfer,
            amount,
            tx_id,
            output_index,
            threshold,
            addresses,
            locktime: 0,
        }
    }

    /// Validate an indexer record. Owner addresses are decoded against `hrp`.
    pub fn from_raw(raw: &RawUtxo, hrp: &str) -> Result<Self, TxError> {
        let output_id = raw.output_id.ok_or(TxError::UtxoMissingField("outputID"))?;
        let amount = raw.amount.as_deref().ok_or(TxError::UtxoMissingField("amount"))?;
        let txid = raw.txid.as_deref().ok_or(TxError::UtxoMissingField("txid"))?;
        let outputidx = raw
            .outputidx
            .as_deref()
            .ok_or(TxError::UtxoMissingField("outputidx"))?;

        let amount = amount
            .parse::<u64>()
            .map_err(|_| TxError::Invalid(format!("UTXO amount is not a number: {}", amount)))?;
        let output_index = parse_output_index(outputidx)?;
        let tx_id = Id::from_cb58(txid)?;
        let addresses = raw
            .addresses
            .iter()
            .map(|a| decode_owner(a, hrp))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            output_kind: OutputKind::from_type_id(output_id)?,
            amount,
            tx_id,
            output_index,
            threshold: raw.threshold,
            addresses,
            locktime: raw.locktime,
        })
    }

    /// `txid:index`, used in error messages and logs.
    pub fn utxo_id(&self) -> String {
        format!("{}:{}", self.tx_id, self.output_index)
    }
}

fn parse_output_index(text: &str) -> Result<u32, TxError> {
    if let Ok(bytes) = cb58::decode(text) {
        let be: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            TxError::Invalid(format!(
                "UTXO output index must decode to 4 bytes, got {}",
                bytes.len()
            ))
        })?;
        return Ok(u32::from_be_bytes(be));
    }
    text.parse::<u32>()
        .map_err(|_| TxError::Invalid(format!("UTXO output index is not valid: {}", text)))
}

fn decode_owner(address: &str, hrp: &str) -> Result<ShortId, TxError> {
    match parse_address(address, hrp) {
        Ok(id) => Ok(id),
        Err(bech32_err) => ShortId::from_hex(address).map_err(|_| TxError::Address(bech32_err)),
    }
}

/// UTXOs validated against a builder threshold.
#[derive(Debug, Clone)]
pub struct UtxoSet {
    utxos: Vec<Utxo>,
}

impl UtxoSet {
    /// Fails with `UtxosEmpty`, `ThresholdInconsistent`, or
    /// `AddressesInconsistent` (fewer owners than the threshold).
    pub fn new(utxos: Vec<Utxo>, threshold: u32) -> Result<Self, TxError> {
        if utxos.is_empty() {
            return Err(TxError::UtxosEmpty);
        }
        for utxo in &utxos {
            if utxo.threshold != threshold {
                return Err(TxError::ThresholdInconsistent {
                    expected: threshold,
                    got: utxo.threshold,
                });
            }
            if utxo.addresses.len() < threshold as usize {
                return Err(TxError::AddressesInconsistent(utxo.utxo_id()));
            }
        }
        Ok(Self { utxos })
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.utxos.iter()
    }

    /// Ordered by (tx id, output index), the on-chain input order.
    pub fn sorted(&self) -> Vec<&Utxo> {
        let mut out: Vec<&Utxo> = self.utxos.iter().collect();
        out.sort_by(|a, b| (a.tx_id, a.output_index).cmp(&(b.tx_id, b.output_index)));
        out
    }

    pub fn total(&self) -> Result<u64, TxError> {
        self.utxos.iter().try_fold(0u64, |acc, u| {
            acc.checked_add(u.amount)
                .ok_or_else(|| TxError::Invalid("UTXO total overflows u64".into()))
        })
    }
}

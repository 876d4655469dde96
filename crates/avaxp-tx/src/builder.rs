//! Transaction builders: shared configuration and the typed factory.
//!
//! Every builder owns a `BuilderConfig` (network, signers, UTXOs, memo,
//! recovery flag) plus its own optional fields, set with consuming setters
//! and validated when `build()` runs. `TransactionBuilder` is the sum of all
//! builders, created either empty for a `TxKind` or re-initialised from a
//! raw transaction so a later signer can continue where an earlier one
//! stopped.

use std::time::{SystemTime, UNIX_EPOCH};

use avaxp_types::network::MULTISIG_THRESHOLD;
use avaxp_types::{Id, NetworkParams, ShortId};

use crate::assemble::InputOutputAssembler;
use crate::atomic::{ExportInCBuilder, ExportInPBuilder, ImportInCBuilder, ImportInPBuilder};
use crate::codec;
use crate::credential::CanonicalSigners;
use crate::stake::{
    DelegatorBuilder, PermissionlessDelegatorBuilder, PermissionlessValidatorBuilder,
    ValidatorBuilder,
};
use crate::types::{
    BaseTx, OutputOwners, Transaction, TransferableInput, TransferableOutput, UnsignedTx, VmFormat,
};
use crate::utxo::{RawUtxo, Utxo, UtxoSet};
use crate::TxError;

// ─── Shared Configuration ───────────────────────────────────────────────────

/// Fields every builder carries.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub params: NetworkParams,
    pub signers: Option<CanonicalSigners>,
    /// Sign with the backup key in place of the primary key.
    pub recovery: bool,
    pub utxos: Vec<Utxo>,
    pub memo: Vec<u8>,
    pub locktime: u64,
    /// Unix seconds; the system clock when unset.
    pub now: Option<u64>,
    /// Transaction this builder was initialised from.
    pub existing: Option<Transaction>,
}

impl BuilderConfig {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            params,
            signers: None,
            recovery: false,
            utxos: Vec::new(),
            memo: Vec::new(),
            locktime: 0,
            now: None,
            existing: None,
        }
    }

    /// Config for a builder re-initialised from `tx`.
    ///
    /// The transaction must belong to this network and to the chain the
    /// builder targets.
    pub fn from_existing(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let expected_chain = match tx.unsigned.format() {
            VmFormat::Platform => params.p_chain_id,
            VmFormat::Evm => params.c_chain_id,
        };
        if tx.unsigned.network_id() != params.network_id {
            return Err(TxError::Invalid(format!(
                "network id mismatch: expected {}, got {}",
                params.network_id,
                tx.unsigned.network_id()
            )));
        }
        if tx.unsigned.blockchain_id() != expected_chain {
            return Err(TxError::Invalid(format!(
                "blockchain id mismatch: expected {}, got {}",
                expected_chain,
                tx.unsigned.blockchain_id()
            )));
        }
        let mut config = Self::new(params);
        config.memo = tx.unsigned.memo().to_vec();
        config.existing = Some(tx);
        Ok(config)
    }

    pub fn signers(&self) -> Result<&CanonicalSigners, TxError> {
        self.signers.as_ref().ok_or(TxError::MissingField("signers"))
    }

    pub fn utxo_set(&self) -> Result<UtxoSet, TxError> {
        UtxoSet::new(self.utxos.clone(), MULTISIG_THRESHOLD)
    }

    pub fn assembler(&self) -> Result<InputOutputAssembler<'_>, TxError> {
        Ok(InputOutputAssembler::new(self.signers()?, self.params.asset_id)
            .recovery(self.recovery)
            .locktime(self.locktime))
    }

    pub fn now(&self) -> u64 {
        self.now.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
    }

    /// True when re-initialised from an existing transaction.
    pub fn is_reinit(&self) -> bool {
        self.existing.is_some()
    }

    /// The existing transaction if it carries credentials; it must then be
    /// reused as-is so that signatures already applied stay valid.
    pub fn frozen(&self) -> Option<&Transaction> {
        let tx = self.existing.as_ref().filter(|tx| tx.has_credentials())?;
        log::debug!(
            "reusing credential-bearing {:?} transaction, fee frozen at {}",
            TxKind::of(&tx.unsigned),
            tx.fee_amount()
        );
        Some(tx)
    }

    /// Platform-chain base transaction.
    pub fn base_tx(
        &self,
        outputs: Vec<TransferableOutput>,
        inputs: Vec<TransferableInput>,
    ) -> BaseTx {
        BaseTx {
            network_id: self.params.network_id,
            blockchain_id: self.params.p_chain_id,
            outputs,
            inputs,
            memo: self.memo.clone(),
        }
    }

    /// Owner set paying `addresses`, or the canonical signers when empty.
    pub fn owners(&self, addresses: &[ShortId]) -> Result<OutputOwners, TxError> {
        let mut addresses = if addresses.is_empty() {
            self.signers()?.sorted()
        } else {
            addresses.to_vec()
        };
        addresses.sort();
        addresses.dedup();
        Ok(OutputOwners {
            locktime: 0,
            threshold: MULTISIG_THRESHOLD.min(addresses.len() as u32),
            addresses,
        })
    }
}

/// Parse a caller-supplied chain id, keeping the two failure modes apart.
pub(crate) fn parse_chain_id(text: Option<&str>) -> Result<Id, TxError> {
    let text = text.ok_or(TxError::MissingField("externalChainId"))?;
    Ok(Id::from_cb58_checked(text)?)
}

/// Error for a transaction handed to the builder of another kind.
pub(crate) fn wrong_kind(expected: &str, tx: &Transaction) -> TxError {
    TxError::Invalid(format!(
        "expected {} transaction, got type id {:#x}",
        expected,
        tx.unsigned.type_id()
    ))
}

/// Setters shared by every builder.
pub trait BuildCommon: Sized {
    fn config(&self) -> &BuilderConfig;
    fn config_mut(&mut self) -> &mut BuilderConfig;

    /// Canonical `[primary, counterparty, backup]` owners.
    fn set_signers(mut self, signers: CanonicalSigners) -> Self {
        self.config_mut().signers = Some(signers);
        self
    }

    /// Canonical owners from bech32 addresses.
    fn set_owner_addresses<S: AsRef<str>>(self, addresses: &[S]) -> Result<Self, TxError> {
        let signers = CanonicalSigners::from_addresses(addresses, &self.config().params.hrp)?;
        Ok(self.set_signers(signers))
    }

    fn set_recovery_mode(mut self, recovery: bool) -> Self {
        self.config_mut().recovery = recovery;
        self
    }

    fn set_utxos(mut self, utxos: Vec<Utxo>) -> Self {
        self.config_mut().utxos = utxos;
        self
    }

    /// Validate indexer records and use them as the UTXOs to spend.
    fn set_raw_utxos(self, raw: &[RawUtxo]) -> Result<Self, TxError> {
        let hrp = self.config().params.hrp.clone();
        let utxos = raw
            .iter()
            .map(|r| Utxo::from_raw(r, &hrp))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.set_utxos(utxos))
    }

    fn set_memo(mut self, memo: &[u8]) -> Self {
        self.config_mut().memo = memo.to_vec();
        self
    }

    fn set_locktime(mut self, locktime: u64) -> Self {
        self.config_mut().locktime = locktime;
        self
    }

    /// Override the clock used for start-time validation.
    fn set_now(mut self, unix_seconds: u64) -> Self {
        self.config_mut().now = Some(unix_seconds);
        self
    }
}

// ─── Factory ────────────────────────────────────────────────────────────────

/// Every buildable transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Validator,
    Delegator,
    PermissionlessValidator,
    PermissionlessDelegator,
    ExportInP,
    ImportInP,
    ExportInC,
    ImportInC,
}

impl TxKind {
    pub fn of(tx: &UnsignedTx) -> Self {
        match tx {
            UnsignedTx::AddValidator(_) => TxKind::Validator,
            UnsignedTx::AddDelegator(_) => TxKind::Delegator,
            UnsignedTx::AddPermissionlessValidator(_) => TxKind::PermissionlessValidator,
            UnsignedTx::AddPermissionlessDelegator(_) => TxKind::PermissionlessDelegator,
            UnsignedTx::PlatformExport(_) => TxKind::ExportInP,
            UnsignedTx::PlatformImport(_) => TxKind::ImportInP,
            UnsignedTx::EvmExport(_) => TxKind::ExportInC,
            UnsignedTx::EvmImport(_) => TxKind::ImportInC,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TxKind::Validator => "AddValidator",
            TxKind::Delegator => "AddDelegator",
            TxKind::PermissionlessValidator => "AddPermissionlessValidator",
            TxKind::PermissionlessDelegator => "AddPermissionlessDelegator",
            TxKind::ExportInP => "Export",
            TxKind::ImportInP => "Import",
            TxKind::ExportInC => "ExportInC",
            TxKind::ImportInC => "ImportInC",
        }
    }
}

/// A builder of any kind.
#[derive(Debug, Clone)]
pub enum TransactionBuilder {
    Validator(ValidatorBuilder),
    Delegator(DelegatorBuilder),
    PermissionlessValidator(PermissionlessValidatorBuilder),
    PermissionlessDelegator(PermissionlessDelegatorBuilder),
    ExportInP(ExportInPBuilder),
    ImportInP(ImportInPBuilder),
    ExportInC(ExportInCBuilder),
    ImportInC(ImportInCBuilder),
}

impl TransactionBuilder {
    /// An empty builder of `kind`.
    pub fn new(kind: TxKind, params: NetworkParams) -> Self {
        match kind {
            TxKind::Validator => Self::Validator(ValidatorBuilder::new(params)),
            TxKind::Delegator => Self::Delegator(DelegatorBuilder::new(params)),
            TxKind::PermissionlessValidator => {
                Self::PermissionlessValidator(PermissionlessValidatorBuilder::new(params))
            }
            TxKind::PermissionlessDelegator => {
                Self::PermissionlessDelegator(PermissionlessDelegatorBuilder::new(params))
            }
            TxKind::ExportInP => Self::ExportInP(ExportInPBuilder::new(params)),
            TxKind::ImportInP => Self::ImportInP(ImportInPBuilder::new(params)),
            TxKind::ExportInC => Self::ExportInC(ExportInCBuilder::new(params)),
            TxKind::ImportInC => Self::ImportInC(ImportInCBuilder::new(params)),
        }
    }

    /// Parse a raw hex transaction and re-initialise the matching builder.
    pub fn from_raw(params: NetworkParams, raw: &str) -> Result<Self, TxError> {
        let tx = codec::parse_hex(raw)?;
        Self::from_tx(params, tx)
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let kind = TxKind::of(&tx.unsigned);
        log::debug!("initialising {} builder from existing transaction", kind.name());
        Ok(match kind {
            TxKind::Validator => Self::Validator(ValidatorBuilder::from_tx(params, tx)?),
            TxKind::Delegator => Self::Delegator(DelegatorBuilder::from_tx(params, tx)?),
            TxKind::PermissionlessValidator => {
                Self::PermissionlessValidator(PermissionlessValidatorBuilder::from_tx(params, tx)?)
            }
            TxKind::PermissionlessDelegator => {
                Self::PermissionlessDelegator(PermissionlessDelegatorBuilder::from_tx(params, tx)?)
            }
            TxKind::ExportInP => Self::ExportInP(ExportInPBuilder::from_tx(params, tx)?),
            TxKind::ImportInP => Self::ImportInP(ImportInPBuilder::from_tx(params, tx)?),
            TxKind::ExportInC => Self::ExportInC(ExportInCBuilder::from_tx(params, tx)?),
            TxKind::ImportInC => Self::ImportInC(ImportInCBuilder::from_tx(params, tx)?),
        })
    }

    pub fn kind(&self) -> TxKind {
        match self {
            Self::Validator(_) => TxKind::Validator,
            Self::Delegator(_) => TxKind::Delegator,
            Self::PermissionlessValidator(_) => TxKind::PermissionlessValidator,
            Self::PermissionlessDelegator(_) => TxKind::PermissionlessDelegator,
            Self::ExportInP(_) => TxKind::ExportInP,
            Self::ImportInP(_) => TxKind::ImportInP,
            Self::ExportInC(_) => TxKind::ExportInC,
            Self::ImportInC(_) => TxKind::ImportInC,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        match self {
            Self::Validator(b) => b.config(),
            Self::Delegator(b) => b.config(),
            Self::PermissionlessValidator(b) => b.config(),
            Self::PermissionlessDelegator(b) => b.config(),
            Self::ExportInP(b) => b.config(),
            Self::ImportInP(b) => b.config(),
            Self::ExportInC(b) => b.config(),
            Self::ImportInC(b) => b.config(),
        }
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        match self {
            Self::Validator(b) => b.build(),
            Self::Delegator(b) => b.build(),
            Self::PermissionlessValidator(b) => b.build(),
            Self::PermissionlessDelegator(b) => b.build(),
            Self::ExportInP(b) => b.build(),
            Self::ImportInP(b) => b.build(),
            Self::ExportInC(b) => b.build(),
            Self::ImportInC(b) => b.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NetworkParams {
        NetworkParams::avax_fuji().unwrap()
    }

    #[test]
    fn test_new_matches_kind() {
        for kind in [
            TxKind::Validator,
            TxKind::Delegator,
            TxKind::PermissionlessValidator,
            TxKind::PermissionlessDelegator,
            TxKind::ExportInP,
            TxKind::ImportInP,
            TxKind::ExportInC,
            TxKind::ImportInC,
        ] {
            assert_eq!(TransactionBuilder::new(kind, params()).kind(), kind);
        }
    }

    #[test]
    fn test_parse_chain_id_errors() {
        assert!(matches!(parse_chain_id(None), Err(TxError::MissingField(_))));
        let truncated = avaxp_types::cb58::encode(&[1u8; 20]);
        assert!(matches!(
            parse_chain_id(Some(&truncated)),
            Err(TxError::ChainIdWrongLength(24))
        ));
        let good = Id::new([1u8; 32]).to_cb58();
        let mut corrupted: Vec<char> = good.chars().collect();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == '2' { '3' } else { '2' };
        let corrupted: String = corrupted.into_iter().collect();
        assert!(matches!(
            parse_chain_id(Some(&corrupted)),
            Err(TxError::ChainIdBadChecksum)
        ));
        assert_eq!(parse_chain_id(Some(&good)).unwrap(), Id::new([1u8; 32]));
    }

    #[test]
    fn test_owners_default_to_signers() {
        let signers = CanonicalSigners::from_owner_keys(&[
            ShortId::new([3; 20]),
            ShortId::new([1; 20]),
            ShortId::new([2; 20]),
        ])
        .unwrap();
        let mut config = BuilderConfig::new(params());
        config.signers = Some(signers.clone());
        let owners = config.owners(&[]).unwrap();
        assert_eq!(owners.addresses, signers.sorted());
        assert_eq!(owners.threshold, 2);

        let single = config.owners(&[ShortId::new([9; 20])]).unwrap();
        assert_eq!(single.threshold, 1);
    }

    #[test]
    fn test_from_raw_rejects_garbage() {
        assert!(matches!(
            TransactionBuilder::from_raw(params(), ""),
            Err(TxError::RawTransactionEmpty)
        ));
        assert!(matches!(
            TransactionBuilder::from_raw(params(), "not hex"),
            Err(TxError::RawTransactionNotHex)
        ));
    }
}

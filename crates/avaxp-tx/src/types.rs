//! Typed transaction structures.
//!
//! In-memory model of the Platform-chain and EVM-chain atomic/staking
//! transactions, their credentials, and the signature-slot representation
//! used while a transaction is partially signed.

use avaxp_types::{EvmAddress, Id, NodeId, ShortId};

use crate::fee::Fee;

// ─── Transaction Constants ──────────────────────────────────────────────────

/// Codec version prefix of every encoding.
pub const CODEC_VERSION: u16 = 0;

/// Length of a recoverable secp256k1 signature (r ‖ s ‖ v).
pub const SIGNATURE_LEN: usize = 65;

/// Leading zero bytes of a placeholder signature; the expected signer's
/// 20-byte address fills the remainder.
pub const PLACEHOLDER_ZEROS: usize = 45;

/// Type ids of the Platform VM codec.
pub mod platform_type {
    pub const SECP_TRANSFER_INPUT: u32 = 0x05;
    pub const SECP_TRANSFER_OUTPUT: u32 = 0x07;
    pub const SECP_CREDENTIAL: u32 = 0x09;
    pub const SECP_OUTPUT_OWNERS: u32 = 0x0b;
    pub const ADD_VALIDATOR: u32 = 0x0c;
    pub const ADD_DELEGATOR: u32 = 0x0e;
    pub const IMPORT: u32 = 0x11;
    pub const EXPORT: u32 = 0x12;
    pub const ADD_PERMISSIONLESS_VALIDATOR: u32 = 0x19;
    pub const ADD_PERMISSIONLESS_DELEGATOR: u32 = 0x1a;
    pub const PROOF_OF_POSSESSION: u32 = 0x1c;
}

/// Type ids of the EVM atomic codec.
pub mod evm_type {
    pub const IMPORT: u32 = 0x00;
    pub const EXPORT: u32 = 0x01;
}

/// BLS public key length.
pub const BLS_PUBLIC_KEY_LEN: usize = 48;

/// BLS signature length.
pub const BLS_SIGNATURE_LEN: usize = 96;

// ─── Signatures & Credentials ───────────────────────────────────────────────

/// One signature position inside a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureSlot {
    /// A real recoverable signature.
    Filled([u8; SIGNATURE_LEN]),
    /// Not yet signed; holds the address expected to sign here.
    Awaiting(ShortId),
}

impl SignatureSlot {
    /// Wire form: the signature, or 45 zero bytes followed by the address.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        match self {
            SignatureSlot::Filled(sig) => *sig,
            SignatureSlot::Awaiting(addr) => {
                let mut out = [0u8; SIGNATURE_LEN];
                out[PLACEHOLDER_ZEROS..].copy_from_slice(addr.as_bytes());
                out
            }
        }
    }

    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        if bytes[..PLACEHOLDER_ZEROS].iter().all(|b| *b == 0) {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&bytes[PLACEHOLDER_ZEROS..]);
            SignatureSlot::Awaiting(ShortId::new(addr))
        } else {
            SignatureSlot::Filled(bytes)
        }
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, SignatureSlot::Awaiting(_))
    }
}

/// Signatures authorizing one input, ordered by ascending owner index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub slots: Vec<SignatureSlot>,
}

impl Credential {
    pub fn new(slots: Vec<SignatureSlot>) -> Self {
        Self { slots }
    }

    /// True once no slot is awaiting a signature.
    pub fn is_complete(&self) -> bool {
        !self.slots.iter().any(SignatureSlot::is_awaiting)
    }

    pub fn awaiting(&self) -> impl Iterator<Item = &ShortId> {
        self.slots.iter().filter_map(|s| match s {
            SignatureSlot::Awaiting(addr) => Some(addr),
            SignatureSlot::Filled(_) => None,
        })
    }

    pub fn filled(&self) -> impl Iterator<Item = &[u8; SIGNATURE_LEN]> {
        self.slots.iter().filter_map(|s| match s {
            SignatureSlot::Filled(sig) => Some(sig),
            SignatureSlot::Awaiting(_) => None,
        })
    }
}

// ─── Inputs & Outputs ───────────────────────────────────────────────────────

/// Spendable amount locked to a threshold of owner addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableOutput {
    pub asset_id: Id,
    pub amount: u64,
    pub locktime: u64,
    pub threshold: u32,
    /// Sorted ascending.
    pub addresses: Vec<ShortId>,
}

/// Reference to a UTXO being spent plus the owner indices that sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableInput {
    pub tx_id: Id,
    pub output_index: u32,
    pub asset_id: Id,
    pub amount: u64,
    /// Ascending positions in the UTXO's owner list.
    pub sig_indices: Vec<u32>,
}

/// Owner set without an amount (reward owners).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    pub addresses: Vec<ShortId>,
}

/// Credit to an EVM account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmOutput {
    pub address: EvmAddress,
    pub amount: u64,
    pub asset_id: Id,
}

/// Debit from an EVM account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmInput {
    pub address: EvmAddress,
    pub amount: u64,
    pub asset_id: Id,
    pub nonce: u64,
}

// ─── Platform Transactions ──────────────────────────────────────────────────

/// Fields shared by every Platform-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub outputs: Vec<TransferableOutput>,
    pub inputs: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub node_id: NodeId,
    pub start: u64,
    pub end: u64,
    pub weight: u64,
}

/// BLS key registration of a permissionless validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfPossession {
    pub public_key: [u8; BLS_PUBLIC_KEY_LEN],
    pub signature: [u8; BLS_SIGNATURE_LEN],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
    /// Delegation fee in units of 1/10,000 of a percent.
    pub shares: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDelegatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPermissionlessValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub signer: ProofOfPossession,
    pub stake: Vec<TransferableOutput>,
    pub validator_rewards_owner: OutputOwners,
    pub delegator_rewards_owner: OutputOwners,
    pub shares: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPermissionlessDelegatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
}

/// Platform-chain import of atomic UTXOs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformImportTx {
    pub base: BaseTx,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
}

/// Platform-chain export into atomic memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformExportTx {
    pub base: BaseTx,
    pub destination_chain: Id,
    pub exported_outputs: Vec<TransferableOutput>,
}

// ─── EVM Transactions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmImportTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
    pub outs: Vec<EvmOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmExportTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub destination_chain: Id,
    pub ins: Vec<EvmInput>,
    pub exported_outputs: Vec<TransferableOutput>,
}

// ─── Core Transaction Types ─────────────────────────────────────────────────

/// Which virtual machine's codec a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmFormat {
    Platform,
    Evm,
}

/// The unsigned body of any supported transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTx {
    AddValidator(AddValidatorTx),
    AddDelegator(AddDelegatorTx),
    AddPermissionlessValidator(AddPermissionlessValidatorTx),
    AddPermissionlessDelegator(AddPermissionlessDelegatorTx),
    PlatformImport(PlatformImportTx),
    PlatformExport(PlatformExportTx),
    EvmImport(EvmImportTx),
    EvmExport(EvmExportTx),
}

impl UnsignedTx {
    pub fn format(&self) -> VmFormat {
        match self {
            UnsignedTx::EvmImport(_) | UnsignedTx::EvmExport(_) => VmFormat::Evm,
            _ => VmFormat::Platform,
        }
    }

    pub fn type_id(&self) -> u32 {
        match self {
            UnsignedTx::AddValidator(_) => platform_type::ADD_VALIDATOR,
            UnsignedTx::AddDelegator(_) => platform_type::ADD_DELEGATOR,
            UnsignedTx::AddPermissionlessValidator(_) => platform_type::ADD_PERMISSIONLESS_VALIDATOR,
            UnsignedTx::AddPermissionlessDelegator(_) => platform_type::ADD_PERMISSIONLESS_DELEGATOR,
            UnsignedTx::PlatformImport(_) => platform_type::IMPORT,
            UnsignedTx::PlatformExport(_) => platform_type::EXPORT,
            UnsignedTx::EvmImport(_) => evm_type::IMPORT,
            UnsignedTx::EvmExport(_) => evm_type::EXPORT,
        }
    }

    pub fn base(&self) -> Option<&BaseTx> {
        match self {
            UnsignedTx::AddValidator(tx) => Some(&tx.base),
            UnsignedTx::AddDelegator(tx) => Some(&tx.base),
            UnsignedTx::AddPermissionlessValidator(tx) => Some(&tx.base),
            UnsignedTx::AddPermissionlessDelegator(tx) => Some(&tx.base),
            UnsignedTx::PlatformImport(tx) => Some(&tx.base),
            UnsignedTx::PlatformExport(tx) => Some(&tx.base),
            UnsignedTx::EvmImport(_) | UnsignedTx::EvmExport(_) => None,
        }
    }

    pub fn network_id(&self) -> u32 {
        match self {
            UnsignedTx::EvmImport(tx) => tx.network_id,
            UnsignedTx::EvmExport(tx) => tx.network_id,
            other => other.base().map(|b| b.network_id).unwrap_or_default(),
        }
    }

    pub fn blockchain_id(&self) -> Id {
        match self {
            UnsignedTx::EvmImport(tx) => tx.blockchain_id,
            UnsignedTx::EvmExport(tx) => tx.blockchain_id,
            other => other.base().map(|b| b.blockchain_id).unwrap_or_default(),
        }
    }

    pub fn memo(&self) -> &[u8] {
        self.base().map(|b| b.memo.as_slice()).unwrap_or(&[])
    }

    pub fn validator(&self) -> Option<&Validator> {
        match self {
            UnsignedTx::AddValidator(tx) => Some(&tx.validator),
            UnsignedTx::AddDelegator(tx) => Some(&tx.validator),
            UnsignedTx::AddPermissionlessValidator(tx) => Some(&tx.validator),
            UnsignedTx::AddPermissionlessDelegator(tx) => Some(&tx.validator),
            _ => None,
        }
    }

    /// UTXO inputs in credential order: base inputs, then imported inputs.
    pub fn utxo_inputs(&self) -> Vec<&TransferableInput> {
        let mut out: Vec<&TransferableInput> = Vec::new();
        if let Some(base) = self.base() {
            out.extend(base.inputs.iter());
        }
        match self {
            UnsignedTx::PlatformImport(tx) => out.extend(tx.imported_inputs.iter()),
            UnsignedTx::EvmImport(tx) => out.extend(tx.imported_inputs.iter()),
            _ => {}
        }
        out
    }

    /// Number of credentials a fully formed transaction carries.
    pub fn credential_count(&self) -> usize {
        match self {
            UnsignedTx::EvmExport(tx) => tx.ins.len(),
            other => other.utxo_inputs().len(),
        }
    }

    /// Sum of every amount consumed.
    pub fn consumed(&self) -> u64 {
        let utxo: u64 = self.utxo_inputs().iter().map(|i| i.amount).sum();
        match self {
            UnsignedTx::EvmExport(tx) => utxo + tx.ins.iter().map(|i| i.amount).sum::<u64>(),
            _ => utxo,
        }
    }

    /// Sum of every amount produced, including locked stake.
    pub fn produced(&self) -> u64 {
        let base: u64 = self
            .base()
            .map(|b| b.outputs.iter().map(|o| o.amount).sum())
            .unwrap_or(0);
        let sum = |outs: &[TransferableOutput]| outs.iter().map(|o| o.amount).sum::<u64>();
        base + match self {
            UnsignedTx::AddValidator(tx) => sum(&tx.stake),
            UnsignedTx::AddDelegator(tx) => sum(&tx.stake),
            UnsignedTx::AddPermissionlessValidator(tx) => sum(&tx.stake),
            UnsignedTx::AddPermissionlessDelegator(tx) => sum(&tx.stake),
            UnsignedTx::PlatformExport(tx) => sum(&tx.exported_outputs),
            UnsignedTx::EvmExport(tx) => sum(&tx.exported_outputs),
            UnsignedTx::EvmImport(tx) => tx.outs.iter().map(|o| o.amount).sum(),
            UnsignedTx::PlatformImport(_) => 0,
        }
    }

    /// Amount burned as fee.
    pub fn burned(&self) -> u64 {
        self.consumed().saturating_sub(self.produced())
    }
}

/// An unsigned body plus one credential per signed input.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub unsigned: UnsignedTx,
    pub credentials: Vec<Credential>,
    /// Fee details known to whoever produced this value. Not encoded.
    pub fee: Fee,
}

impl Transaction {
    pub fn new(unsigned: UnsignedTx, credentials: Vec<Credential>, fee: Fee) -> Self {
        Self {
            unsigned,
            credentials,
            fee,
        }
    }

    /// True when the transaction carries a credential section.
    pub fn has_credentials(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// True when any slot holds a real signature.
    pub fn has_signatures(&self) -> bool {
        self.credentials.iter().any(|c| c.filled().next().is_some())
    }

    /// True when every credential is complete.
    pub fn is_fully_signed(&self) -> bool {
        self.has_credentials() && self.credentials.iter().all(Credential::is_complete)
    }

    pub fn fee_amount(&self) -> u64 {
        self.unsigned.burned()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.unsigned == other.unsigned && self.credentials == other.credentials
    }
}

impl Eq for Transaction {}

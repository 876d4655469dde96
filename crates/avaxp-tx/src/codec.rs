//! Transaction codec: canonical byte form and parsing.
//!
//! Both virtual machines share the layout `codec_version: u16 ‖ type_id: u32 ‖
//! body`, optionally followed by the credential section. The type id alone
//! decides which VM and which transaction the bytes hold, so detection is a
//! single table lookup rather than trial parsing.

use sha2::{Digest, Sha256};

use avaxp_types::{cb58, Id};

use crate::fee::Fee;
use crate::packer::{Cursor, Packer};
use crate::types::*;
use crate::TxError;

// ─── Format Detection ───────────────────────────────────────────────────────

/// Map a type id to its VM. Platform ids are tried first, then EVM ids.
pub fn format_of(type_id: u32) -> Result<VmFormat, TxError> {
    use platform_type::*;
    match type_id {
        ADD_VALIDATOR | ADD_DELEGATOR | IMPORT | EXPORT | ADD_PERMISSIONLESS_VALIDATOR
        | ADD_PERMISSIONLESS_DELEGATOR => Ok(VmFormat::Platform),
        evm_type::IMPORT | evm_type::EXPORT => Ok(VmFormat::Evm),
        other => Err(TxError::UnrecognizedTransactionFormat(other)),
    }
}

/// Read the codec version and type tag at the fixed header position.
pub fn detect_format(bytes: &[u8]) -> Result<(VmFormat, u32), TxError> {
    let mut c = Cursor::new(bytes);
    read_codec_version(&mut c)?;
    let type_id = c.read_u32()?;
    Ok((format_of(type_id)?, type_id))
}

fn read_codec_version(c: &mut Cursor) -> Result<(), TxError> {
    let version = c.read_u16()?;
    if version != CODEC_VERSION {
        return Err(TxError::Codec(format!("unsupported codec version {}", version)));
    }
    Ok(())
}

// ─── Serialization ──────────────────────────────────────────────────────────

fn pack_output(p: &mut Packer, o: &TransferableOutput) {
    p.pack_id(&o.asset_id);
    p.pack_u32(platform_type::SECP_TRANSFER_OUTPUT);
    p.pack_u64(o.amount);
    p.pack_u64(o.locktime);
    p.pack_u32(o.threshold);
    p.pack_vec(&o.addresses, |p, a| p.pack_short_id(a));
}

fn pack_input(p: &mut Packer, i: &TransferableInput) {
    p.pack_id(&i.tx_id);
    p.pack_u32(i.output_index);
    p.pack_id(&i.asset_id);
    p.pack_u32(platform_type::SECP_TRANSFER_INPUT);
    p.pack_u64(i.amount);
    p.pack_vec(&i.sig_indices, |p, idx| p.pack_u32(*idx));
}

fn pack_owners(p: &mut Packer, o: &OutputOwners) {
    p.pack_u32(platform_type::SECP_OUTPUT_OWNERS);
    p.pack_u64(o.locktime);
    p.pack_u32(o.threshold);
    p.pack_vec(&o.addresses, |p, a| p.pack_short_id(a));
}

fn pack_base(p: &mut Packer, b: &BaseTx) {
    p.pack_u32(b.network_id);
    p.pack_id(&b.blockchain_id);
    p.pack_vec(&b.outputs, pack_output);
    p.pack_vec(&b.inputs, pack_input);
    p.pack_bytes(&b.memo);
}

fn pack_validator(p: &mut Packer, v: &Validator) {
    p.pack_fixed(v.node_id.as_bytes());
    p.pack_u64(v.start);
    p.pack_u64(v.end);
    p.pack_u64(v.weight);
}

fn pack_credential(p: &mut Packer, c: &Credential) {
    p.pack_u32(platform_type::SECP_CREDENTIAL);
    p.pack_vec(&c.slots, |p, s| p.pack_fixed(&s.to_bytes()));
}

fn pack_unsigned(p: &mut Packer, tx: &UnsignedTx) {
    p.pack_u32(tx.type_id());
    match tx {
        UnsignedTx::AddValidator(tx) => {
            pack_base(p, &tx.base);
            pack_validator(p, &tx.validator);
            p.pack_vec(&tx.stake, pack_output);
            pack_owners(p, &tx.rewards_owner);
            p.pack_u32(tx.shares);
        }
        UnsignedTx::AddDelegator(tx) => {
            pack_base(p, &tx.base);
            pack_validator(p, &tx.validator);
            p.pack_vec(&tx.stake, pack_output);
            pack_owners(p, &tx.rewards_owner);
        }
        UnsignedTx::AddPermissionlessValidator(tx) => {
            pack_base(p, &tx.base);
            pack_validator(p, &tx.validator);
            p.pack_id(&tx.subnet_id);
            p.pack_u32(platform_type::PROOF_OF_POSSESSION);
            p.pack_fixed(&tx.signer.public_key);
            p.pack_fixed(&tx.signer.signature);
            p.pack_vec(&tx.stake, pack_output);
            pack_owners(p, &tx.validator_rewards_owner);
            pack_owners(p, &tx.delegator_rewards_owner);
            p.pack_u32(tx.shares);
        }
        UnsignedTx::AddPermissionlessDelegator(tx) => {
            pack_base(p, &tx.base);
            pack_validator(p, &tx.validator);
            p.pack_id(&tx.subnet_id);
            p.pack_vec(&tx.stake, pack_output);
            pack_owners(p, &tx.rewards_owner);
        }
        UnsignedTx::PlatformImport(tx) => {
            pack_base(p, &tx.base);
            p.pack_id(&tx.source_chain);
            p.pack_vec(&tx.imported_inputs, pack_input);
        }
        UnsignedTx::PlatformExport(tx) => {
            pack_base(p, &tx.base);
            p.pack_id(&tx.destination_chain);
            p.pack_vec(&tx.exported_outputs, pack_output);
        }
        UnsignedTx::EvmImport(tx) => {
            p.pack_u32(tx.network_id);
            p.pack_id(&tx.blockchain_id);
            p.pack_id(&tx.source_chain);
            p.pack_vec(&tx.imported_inputs, pack_input);
            p.pack_vec(&tx.outs, |p, o| {
                p.pack_fixed(o.address.as_bytes());
                p.pack_u64(o.amount);
                p.pack_id(&o.asset_id);
            });
        }
        UnsignedTx::EvmExport(tx) => {
            p.pack_u32(tx.network_id);
            p.pack_id(&tx.blockchain_id);
            p.pack_id(&tx.destination_chain);
            p.pack_vec(&tx.ins, |p, i| {
                p.pack_fixed(i.address.as_bytes());
                p.pack_u64(i.amount);
                p.pack_id(&i.asset_id);
                p.pack_u64(i.nonce);
            });
            p.pack_vec(&tx.exported_outputs, pack_output);
        }
    }
}

/// `codec_version ‖ unsigned tx`: the bytes that get hashed for signing.
pub fn serialize_unsigned(tx: &UnsignedTx) -> Vec<u8> {
    let mut p = Packer::with_capacity(512);
    p.pack_u16(CODEC_VERSION);
    pack_unsigned(&mut p, tx);
    p.into_bytes()
}

/// Full signed form, credential placeholders included.
pub fn serialize(tx: &Transaction) -> Vec<u8> {
    let mut p = Packer::with_capacity(1024);
    p.pack_u16(CODEC_VERSION);
    pack_unsigned(&mut p, &tx.unsigned);
    p.pack_vec(&tx.credentials, pack_credential);
    p.into_bytes()
}

// ─── Parsing ────────────────────────────────────────────────────────────────

fn read_output(c: &mut Cursor) -> Result<TransferableOutput, TxError> {
    let asset_id = c.read_id()?;
    c.expect_type_id(platform_type::SECP_TRANSFER_OUTPUT, "transfer output")?;
    Ok(TransferableOutput {
        asset_id,
        amount: c.read_u64()?,
        locktime: c.read_u64()?,
        threshold: c.read_u32()?,
        addresses: c.read_vec(|c| c.read_short_id())?,
    })
}

fn read_input(c: &mut Cursor) -> Result<TransferableInput, TxError> {
    let tx_id = c.read_id()?;
    let output_index = c.read_u32()?;
    let asset_id = c.read_id()?;
    c.expect_type_id(platform_type::SECP_TRANSFER_INPUT, "transfer input")?;
    Ok(TransferableInput {
        tx_id,
        output_index,
        asset_id,
        amount: c.read_u64()?,
        sig_indices: c.read_vec(|c| c.read_u32())?,
    })
}

fn read_owners(c: &mut Cursor) -> Result<OutputOwners, TxError> {
    c.expect_type_id(platform_type::SECP_OUTPUT_OWNERS, "output owners")?;
    Ok(OutputOwners {
        locktime: c.read_u64()?,
        threshold: c.read_u32()?,
        addresses: c.read_vec(|c| c.read_short_id())?,
    })
}

fn read_base(c: &mut Cursor) -> Result<BaseTx, TxError> {
    Ok(BaseTx {
        network_id: c.read_u32()?,
        blockchain_id: c.read_id()?,
        outputs: c.read_vec(read_output)?,
        inputs: c.read_vec(read_input)?,
        memo: c.read_len_prefixed()?,
    })
}

fn read_validator(c: &mut Cursor) -> Result<Validator, TxError> {
    Ok(Validator {
        node_id: c.read_node_id()?,
        start: c.read_u64()?,
        end: c.read_u64()?,
        weight: c.read_u64()?,
    })
}

fn read_credential(c: &mut Cursor) -> Result<Credential, TxError> {
    c.expect_type_id(platform_type::SECP_CREDENTIAL, "credential")?;
    let slots = c.read_vec(|c| Ok(SignatureSlot::from_bytes(c.read_array::<SIGNATURE_LEN>()?)))?;
    Ok(Credential::new(slots))
}

fn read_platform(c: &mut Cursor, type_id: u32) -> Result<UnsignedTx, TxError> {
    use platform_type::*;
    Ok(match type_id {
        ADD_VALIDATOR => UnsignedTx::AddValidator(AddValidatorTx {
            base: read_base(c)?,
            validator: read_validator(c)?,
            stake: c.read_vec(read_output)?,
            rewards_owner: read_owners(c)?,
            shares: c.read_u32()?,
        }),
        ADD_DELEGATOR => UnsignedTx::AddDelegator(AddDelegatorTx {
            base: read_base(c)?,
            validator: read_validator(c)?,
            stake: c.read_vec(read_output)?,
            rewards_owner: read_owners(c)?,
        }),
        ADD_PERMISSIONLESS_VALIDATOR => {
            let base = read_base(c)?;
            let validator = read_validator(c)?;
            let subnet_id = c.read_id()?;
            c.expect_type_id(PROOF_OF_POSSESSION, "proof of possession")?;
            let signer = ProofOfPossession {
                public_key: c.read_array::<BLS_PUBLIC_KEY_LEN>()?,
                signature: c.read_array::<BLS_SIGNATURE_LEN>()?,
            };
            UnsignedTx::AddPermissionlessValidator(AddPermissionlessValidatorTx {
                base,
                validator,
                subnet_id,
                signer,
                stake: c.read_vec(read_output)?,
                validator_rewards_owner: read_owners(c)?,
                delegator_rewards_owner: read_owners(c)?,
                shares: c.read_u32()?,
            })
        }
        ADD_PERMISSIONLESS_DELEGATOR => {
            UnsignedTx::AddPermissionlessDelegator(AddPermissionlessDelegatorTx {
                base: read_base(c)?,
                validator: read_validator(c)?,
                subnet_id: c.read_id()?,
                stake: c.read_vec(read_output)?,
                rewards_owner: read_owners(c)?,
            })
        }
        IMPORT => UnsignedTx::PlatformImport(PlatformImportTx {
            base: read_base(c)?,
            source_chain: c.read_id()?,
            imported_inputs: c.read_vec(read_input)?,
        }),
        EXPORT => UnsignedTx::PlatformExport(PlatformExportTx {
            base: read_base(c)?,
            destination_chain: c.read_id()?,
            exported_outputs: c.read_vec(read_output)?,
        }),
        other => return Err(TxError::UnrecognizedTransactionFormat(other)),
    })
}

fn read_evm(c: &mut Cursor, type_id: u32) -> Result<UnsignedTx, TxError> {
    Ok(match type_id {
        evm_type::IMPORT => UnsignedTx::EvmImport(EvmImportTx {
            network_id: c.read_u32()?,
            blockchain_id: c.read_id()?,
            source_chain: c.read_id()?,
            imported_inputs: c.read_vec(read_input)?,
            outs: c.read_vec(|c| {
                Ok(EvmOutput {
                    address: c.read_evm_address()?,
                    amount: c.read_u64()?,
                    asset_id: c.read_id()?,
                })
            })?,
        }),
        evm_type::EXPORT => UnsignedTx::EvmExport(EvmExportTx {
            network_id: c.read_u32()?,
            blockchain_id: c.read_id()?,
            destination_chain: c.read_id()?,
            ins: c.read_vec(|c| {
                Ok(EvmInput {
                    address: c.read_evm_address()?,
                    amount: c.read_u64()?,
                    asset_id: c.read_id()?,
                    nonce: c.read_u64()?,
                })
            })?,
            exported_outputs: c.read_vec(read_output)?,
        }),
        other => return Err(TxError::UnrecognizedTransactionFormat(other)),
    })
}

/// Parse signed or bare-unsigned transaction bytes.
///
/// The bytes may carry the 4-byte checksum suffix of the broadcast text form;
/// it is stripped when the plain parse leaves exactly those bytes over.
pub fn parse(bytes: &[u8]) -> Result<Transaction, TxError> {
    if bytes.is_empty() {
        return Err(TxError::RawTransactionEmpty);
    }
    match parse_exact(bytes) {
        Ok(tx) => Ok(tx),
        Err(e) => match strip_checksum(bytes) {
            Some(payload) => parse_exact(payload),
            None => Err(e),
        },
    }
}

fn strip_checksum(bytes: &[u8]) -> Option<&[u8]> {
    let split = bytes.len().checked_sub(cb58::CHECKSUM_SIZE)?;
    let (payload, sum) = bytes.split_at(split);
    (cb58::checksum(payload)[..] == *sum).then_some(payload)
}

fn parse_exact(bytes: &[u8]) -> Result<Transaction, TxError> {
    let mut c = Cursor::new(bytes);
    read_codec_version(&mut c)?;
    let type_id = c.read_u32()?;
    let unsigned = match format_of(type_id)? {
        VmFormat::Platform => read_platform(&mut c, type_id)?,
        VmFormat::Evm => read_evm(&mut c, type_id)?,
    };

    let credentials = if c.is_empty() {
        log::warn!("transaction type {:#x} has no credential section", type_id);
        Vec::new()
    } else {
        c.read_vec(read_credential)?
    };
    if !c.is_empty() {
        return Err(TxError::Codec(format!(
            "{} trailing bytes after transaction",
            c.remaining()
        )));
    }
    if !credentials.is_empty() && credentials.len() != unsigned.credential_count() {
        return Err(TxError::Codec(format!(
            "expected {} credentials, found {}",
            unsigned.credential_count(),
            credentials.len()
        )));
    }

    let fee = Fee::frozen(unsigned.burned());
    Ok(Transaction::new(unsigned, credentials, fee))
}

/// Parse hex text, with or without a `0x` prefix.
pub fn parse_hex(raw: &str) -> Result<Transaction, TxError> {
    let raw = raw.trim();
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    if body.is_empty() {
        return Err(TxError::RawTransactionEmpty);
    }
    let bytes = hex::decode(body).map_err(|_| TxError::RawTransactionNotHex)?;
    parse(&bytes)
}

// ─── Transaction helpers ────────────────────────────────────────────────────

impl Transaction {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        parse(bytes)
    }

    pub fn from_hex(raw: &str) -> Result<Self, TxError> {
        parse_hex(raw)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serialize(self)
    }

    /// `0x`-prefixed hex of the signed bytes.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Broadcast text form: the signed bytes followed by `cb58::checksum`
    /// of them, hex encoded with a `0x` prefix.
    pub fn to_checksummed_hex(&self) -> String {
        let mut bytes = self.to_bytes();
        let sum = cb58::checksum(&bytes);
        bytes.extend_from_slice(&sum);
        format!("0x{}", hex::encode(bytes))
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        serialize_unsigned(&self.unsigned)
    }

    /// Message every credential signs.
    pub fn signing_hash(&self) -> [u8; 32] {
        Sha256::digest(self.unsigned_bytes()).into()
    }

    pub fn id(&self) -> Id {
        Id::new(Sha256::digest(self.to_bytes()).into())
    }

    /// cb58 of the transaction id.
    pub fn id_string(&self) -> String {
        cb58::encode(self.id().as_bytes())
    }
}

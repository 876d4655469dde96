//! Two-phase cross-chain transfers.
//!
//! An export moves funds out of a chain into the shared atomic memory tagged
//! with the destination chain; the matching import consumes those atomic
//! UTXOs on the destination chain. The Platform chain charges its fixed fee.
//! The EVM chain meters by byte: a provisional body is built with a zero fee
//! to measure its size, the fee is derived from that size, and the body is
//! rebuilt with the fee applied. Neither step changes the encoded size, since
//! only amounts move and placeholders are as wide as signatures.
//!
//! A builder re-initialised from a transaction that already carries
//! credentials returns that transaction unchanged, so its fee cannot drift
//! away from what existing signatures commit to.

use avaxp_types::{EvmAddress, Id, NetworkParams};

use crate::builder::{parse_chain_id, wrong_kind, BuildCommon, BuilderConfig};
use crate::fee::{checked_add, Fee};
use crate::types::{
    Credential, EvmExportTx, EvmImportTx, EvmInput, EvmOutput, PlatformExportTx,
    PlatformImportTx, SignatureSlot, Transaction, UnsignedTx,
};
use crate::TxError;

/// Amount left for the recipient once `fee` is paid out of `total`.
fn after_fee(total: u64, fee: u64) -> Result<u64, TxError> {
    match total.checked_sub(fee) {
        Some(rest) if rest > 0 => Ok(rest),
        _ => Err(TxError::InsufficientFunds {
            total,
            target: checked_add(fee, 1)?,
        }),
    }
}

/// Reuse a credential-bearing EVM transaction, reporting the fee it burns.
fn frozen_metered(config: &BuilderConfig) -> Option<Transaction> {
    let mut tx = config.frozen()?.clone();
    tx.fee = Fee::frozen_metered(tx.fee_amount(), tx.to_bytes().len());
    Some(tx)
}

// ─── Export from P ──────────────────────────────────────────────────────────

/// Platform-chain export into atomic memory.
#[derive(Debug, Clone)]
pub struct ExportInPBuilder {
    config: BuilderConfig,
    amount: Option<u64>,
    destination_chain: Option<String>,
}

impl ExportInPBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            amount: None,
            destination_chain: None,
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::PlatformExport(body) = &tx.unsigned else {
            return Err(wrong_kind("export", &tx));
        };
        let amount = body.exported_outputs.iter().map(|o| o.amount).sum();
        let destination = body.destination_chain.to_cb58();
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            amount: Some(amount),
            destination_chain: Some(destination),
        })
    }

    /// Amount credited to the destination chain, fee excluded.
    pub fn set_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// cb58 id of the chain that will import the funds.
    pub fn set_destination_chain(mut self, chain_id: &str) -> Self {
        self.destination_chain = Some(chain_id.to_string());
        self
    }

    pub fn amount(&self) -> Option<u64> {
        self.amount
    }

    pub fn destination_chain(&self) -> Option<&str> {
        self.destination_chain.as_deref()
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = self.config.frozen() {
            return Ok(tx.clone());
        }
        let amount = positive_amount(self.amount)?;
        let destination_chain = parse_chain_id(self.destination_chain.as_deref())?;
        let fee = self.config.params.tx_fee;

        let assembler = self.config.assembler()?;
        let assembled = assembler.assemble(&self.config.utxo_set()?, checked_add(amount, fee)?)?;
        let unsigned = UnsignedTx::PlatformExport(PlatformExportTx {
            base: self.config.base_tx(assembled.outputs, assembled.inputs),
            destination_chain,
            exported_outputs: vec![assembler.output(amount)],
        });
        log::debug!("export {} to {} with fee {}", amount, destination_chain, fee);
        Ok(Transaction::new(unsigned, assembled.credentials, Fee::fixed(fee)))
    }
}

impl BuildCommon for ExportInPBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

// ─── Import into P ──────────────────────────────────────────────────────────

/// Platform-chain import of atomic UTXOs back to the signers.
#[derive(Debug, Clone)]
pub struct ImportInPBuilder {
    config: BuilderConfig,
    source_chain: Option<String>,
}

impl ImportInPBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            source_chain: None,
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::PlatformImport(body) = &tx.unsigned else {
            return Err(wrong_kind("import", &tx));
        };
        let source = body.source_chain.to_cb58();
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            source_chain: Some(source),
        })
    }

    /// cb58 id of the chain the atomic UTXOs were exported from.
    pub fn set_source_chain(mut self, chain_id: &str) -> Self {
        self.source_chain = Some(chain_id.to_string());
        self
    }

    pub fn source_chain(&self) -> Option<&str> {
        self.source_chain.as_deref()
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = self.config.frozen() {
            return Ok(tx.clone());
        }
        let source_chain = parse_chain_id(self.source_chain.as_deref())?;
        let fee = self.config.params.tx_fee;

        let assembler = self.config.assembler()?;
        let (inputs, credentials, total) = assembler.spend_all(&self.config.utxo_set()?)?;
        let amount = after_fee(total, fee)?;
        let unsigned = UnsignedTx::PlatformImport(PlatformImportTx {
            base: self.config.base_tx(vec![assembler.output(amount)], Vec::new()),
            source_chain,
            imported_inputs: inputs,
        });
        log::debug!("import {} from {} with fee {}", amount, source_chain, fee);
        Ok(Transaction::new(unsigned, credentials, Fee::fixed(fee)))
    }
}

impl BuildCommon for ImportInPBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

// ─── Import into C ──────────────────────────────────────────────────────────

/// EVM-chain import of atomic UTXOs into one account.
#[derive(Debug, Clone)]
pub struct ImportInCBuilder {
    config: BuilderConfig,
    to: Option<String>,
    source_chain: Option<String>,
    fee_rate: Option<u64>,
}

impl ImportInCBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            to: None,
            source_chain: None,
            fee_rate: None,
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::EvmImport(body) = &tx.unsigned else {
            return Err(wrong_kind("EVM import", &tx));
        };
        let to = body.outs.first().map(|o| o.address.to_string());
        let source = body.source_chain.to_cb58();
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            to,
            source_chain: Some(source),
            fee_rate: None,
        })
    }

    /// `0x` address of the credited EVM account.
    pub fn set_to(mut self, address: &str) -> Self {
        self.to = Some(address.to_string());
        self
    }

    pub fn set_source_chain(mut self, chain_id: &str) -> Self {
        self.source_chain = Some(chain_id.to_string());
        self
    }

    /// Per-byte fee rate, overriding the network default.
    pub fn set_fee_rate(mut self, fee_rate: u64) -> Self {
        self.fee_rate = Some(fee_rate);
        self
    }

    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn source_chain(&self) -> Option<&str> {
        self.source_chain.as_deref()
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate.unwrap_or(self.config.params.evm_fee_rate)
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = frozen_metered(&self.config) {
            return Ok(tx);
        }
        let fee_rate = self.fee_rate();
        let to = EvmAddress::parse(self.to.as_deref().ok_or(TxError::MissingField("to"))?)?;
        let source_chain = parse_chain_id(self.source_chain.as_deref())?;

        let assembler = self.config.assembler()?;
        let (inputs, credentials, total) = assembler.spend_all(&self.config.utxo_set()?)?;
        let body = |amount: u64| {
            UnsignedTx::EvmImport(EvmImportTx {
                network_id: self.config.params.network_id,
                blockchain_id: self.config.params.c_chain_id,
                source_chain,
                imported_inputs: inputs.clone(),
                outs: vec![EvmOutput {
                    address: to,
                    amount,
                    asset_id: self.config.params.asset_id,
                }],
            })
        };

        let provisional = Transaction::new(body(total), credentials, Fee::default());
        let fee = Fee::metered(fee_rate, provisional.to_bytes().len())?;
        let amount = after_fee(total, fee.fee)?;
        log::debug!(
            "import into C: {} bytes at {} per byte, fee {}",
            provisional.to_bytes().len(),
            fee_rate,
            fee.fee
        );
        Ok(Transaction::new(body(amount), provisional.credentials, fee))
    }
}

impl BuildCommon for ImportInCBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

// ─── Export from C ──────────────────────────────────────────────────────────

/// EVM-chain export from one account into atomic memory.
///
/// The exported output is owned by the canonical signers; only the EVM
/// account signs, so the single credential holds one slot for it.
#[derive(Debug, Clone)]
pub struct ExportInCBuilder {
    config: BuilderConfig,
    amount: Option<u64>,
    nonce: Option<u64>,
    from: Option<String>,
    destination_chain: Option<String>,
    fee_rate: Option<u64>,
}

impl ExportInCBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            amount: None,
            nonce: None,
            from: None,
            destination_chain: None,
            fee_rate: None,
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::EvmExport(body) = &tx.unsigned else {
            return Err(wrong_kind("EVM export", &tx));
        };
        let amount = body.exported_outputs.iter().map(|o| o.amount).sum();
        let input = body.ins.first();
        let nonce = input.map(|i| i.nonce);
        let from = input.map(|i| i.address.to_string());
        let destination = body.destination_chain.to_cb58();
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            amount: Some(amount),
            nonce,
            from,
            destination_chain: Some(destination),
            fee_rate: None,
        })
    }

    pub fn set_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Account nonce of the sender.
    pub fn set_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// `0x` address of the debited EVM account.
    pub fn set_from(mut self, address: &str) -> Self {
        self.from = Some(address.to_string());
        self
    }

    pub fn set_destination_chain(mut self, chain_id: &str) -> Self {
        self.destination_chain = Some(chain_id.to_string());
        self
    }

    pub fn set_fee_rate(mut self, fee_rate: u64) -> Self {
        self.fee_rate = Some(fee_rate);
        self
    }

    pub fn amount(&self) -> Option<u64> {
        self.amount
    }

    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    /// Sender address as set.
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn destination_chain(&self) -> Option<&str> {
        self.destination_chain.as_deref()
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate.unwrap_or(self.config.params.evm_fee_rate)
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = frozen_metered(&self.config) {
            return Ok(tx);
        }
        let fee_rate = self.fee_rate();
        let amount = positive_amount(self.amount)?;
        let nonce = self.nonce.ok_or(TxError::MissingField("nonce"))?;
        let from = EvmAddress::parse(self.from.as_deref().ok_or(TxError::MissingField("from"))?)?;
        let destination_chain = parse_chain_id(self.destination_chain.as_deref())?;

        let exported = self.config.assembler()?.output(amount);
        let asset_id: Id = self.config.params.asset_id;
        let body = |debit: u64| {
            UnsignedTx::EvmExport(EvmExportTx {
                network_id: self.config.params.network_id,
                blockchain_id: self.config.params.c_chain_id,
                destination_chain,
                ins: vec![EvmInput {
                    address: from,
                    amount: debit,
                    asset_id,
                    nonce,
                }],
                exported_outputs: vec![exported.clone()],
            })
        };
        let credentials = vec![Credential::new(vec![SignatureSlot::Awaiting(from.to_short_id())])];

        let provisional = Transaction::new(body(amount), credentials, Fee::default());
        let fee = Fee::metered(fee_rate, provisional.to_bytes().len())?;
        let debit = checked_add(amount, fee.fee)?;
        log::debug!(
            "export from C: {} bytes at {} per byte, fee {}, debit {} at nonce {}",
            provisional.to_bytes().len(),
            fee_rate,
            fee.fee,
            debit,
            nonce
        );
        Ok(Transaction::new(body(debit), provisional.credentials, fee))
    }
}

impl BuildCommon for ExportInCBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

fn positive_amount(amount: Option<u64>) -> Result<u64, TxError> {
    match amount.ok_or(TxError::MissingField("amount"))? {
        0 => Err(TxError::Invalid("amount must be positive".into())),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CanonicalSigners;
    use crate::utxo::Utxo;
    use avaxp_types::ShortId;

    fn params() -> NetworkParams {
        NetworkParams::avax_fuji().unwrap()
    }

    fn signers() -> CanonicalSigners {
        CanonicalSigners::from_owner_keys(&[
            ShortId::new([0x31; 20]),
            ShortId::new([0x12; 20]),
            ShortId::new([0x23; 20]),
        ])
        .unwrap()
    }

    fn utxos(amounts: &[u64]) -> Vec<Utxo> {
        let owners = signers().as_slice().to_vec();
        amounts
            .iter()
            .enumerate()
            .map(|(i, a)| Utxo::transfer(Id::new([i as u8 + 1; 32]), 0, *a, 2, owners.clone()))
            .collect()
    }

    fn chain() -> String {
        Id::new([0x44; 32]).to_cb58()
    }

    #[test]
    fn test_export_in_p() {
        let tx = ExportInPBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[1_000_000_000, 1_000_000_000]))
            .set_amount(1_500_000_000)
            .set_destination_chain(&chain())
            .build()
            .unwrap();
        let UnsignedTx::PlatformExport(body) = &tx.unsigned else {
            panic!("wrong kind");
        };
        assert_eq!(body.exported_outputs[0].amount, 1_500_000_000);
        assert_eq!(body.exported_outputs[0].addresses, signers().sorted());
        assert_eq!(body.base.outputs[0].amount, 499_000_000);
        assert_eq!(tx.fee.fee, 1_000_000);
        assert_eq!(tx.fee_amount(), 1_000_000);
        assert_eq!(tx.credentials.len(), 2);
    }

    #[test]
    fn test_export_in_p_missing_fields() {
        let b = ExportInPBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[10]));
        assert!(matches!(b.build(), Err(TxError::MissingField("amount"))));
        assert!(matches!(
            b.set_amount(5).build(),
            Err(TxError::MissingField("externalChainId"))
        ));
    }

    #[test]
    fn test_import_in_p() {
        let tx = ImportInPBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[600_000_000, 400_000_000]))
            .set_source_chain(&params().c_chain_id.to_cb58())
            .build()
            .unwrap();
        let UnsignedTx::PlatformImport(body) = &tx.unsigned else {
            panic!("wrong kind");
        };
        assert!(body.base.inputs.is_empty());
        assert_eq!(body.imported_inputs.len(), 2);
        assert_eq!(body.base.outputs[0].amount, 999_000_000);
        assert_eq!(tx.fee_amount(), 1_000_000);
    }

    #[test]
    fn test_import_in_p_dust_fails() {
        let err = ImportInPBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[1_000_000]))
            .set_source_chain(&chain())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            TxError::InsufficientFunds {
                total: 1_000_000,
                target: 1_000_001
            }
        ));
    }

    #[test]
    fn test_import_in_c_metered_fee() {
        let tx = ImportInCBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[50_000_000]))
            .set_source_chain(&params().p_chain_id.to_cb58())
            .set_to("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf")
            .set_fee_rate(25)
            .build()
            .unwrap();
        let size = tx.to_bytes().len() as u64;
        assert_eq!(tx.fee.fee, 25 * size);
        assert_eq!(tx.fee.byte_size, Some(size as u32));
        assert_eq!(tx.fee_amount(), tx.fee.fee);
        let UnsignedTx::EvmImport(body) = &tx.unsigned else {
            panic!("wrong kind");
        };
        assert_eq!(body.outs[0].amount, 50_000_000 - 25 * size);
        assert_eq!(body.blockchain_id, params().c_chain_id);
    }

    #[test]
    fn test_import_in_c_default_rate() {
        let b = ImportInCBuilder::new(params());
        assert_eq!(b.fee_rate(), params().evm_fee_rate);
    }

    #[test]
    fn test_export_in_c() {
        let from = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";
        let tx = ExportInCBuilder::new(params())
            .set_signers(signers())
            .set_amount(1_000_000_000)
            .set_nonce(7)
            .set_from(from)
            .set_destination_chain(&params().p_chain_id.to_cb58())
            .set_fee_rate(25)
            .build()
            .unwrap();
        let UnsignedTx::EvmExport(body) = &tx.unsigned else {
            panic!("wrong kind");
        };
        let size = tx.to_bytes().len() as u64;
        assert_eq!(body.ins[0].amount, 1_000_000_000 + 25 * size);
        assert_eq!(body.ins[0].nonce, 7);
        assert_eq!(body.exported_outputs[0].amount, 1_000_000_000);
        assert_eq!(tx.fee_amount(), 25 * size);
        let expected = EvmAddress::parse(from).unwrap().to_short_id();
        assert_eq!(
            tx.credentials,
            vec![Credential::new(vec![SignatureSlot::Awaiting(expected)])]
        );
    }

    #[test]
    fn test_export_in_c_requires_nonce() {
        let err = ExportInCBuilder::new(params())
            .set_signers(signers())
            .set_amount(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, TxError::MissingField("nonce")));
    }

    #[test]
    fn test_reinit_with_credentials_freezes_fee() {
        let built = ImportInCBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[50_000_000]))
            .set_source_chain(&chain())
            .set_to("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf")
            .set_fee_rate(25)
            .build()
            .unwrap();
        let parsed = Transaction::from_bytes(&built.to_bytes()).unwrap();
        let rebuilt = ImportInCBuilder::from_tx(params(), parsed)
            .unwrap()
            .set_fee_rate(40)
            .build()
            .unwrap();
        assert_eq!(rebuilt, built);
        assert_eq!(rebuilt.fee.fee, built.fee.fee);
        assert_eq!(rebuilt.fee.fee_rate, Some(25));
        assert_eq!(rebuilt.fee.byte_size, built.fee.byte_size);
    }

    #[test]
    fn test_from_tx_recovers_fields() {
        let built = ExportInPBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[1_000_000_000]))
            .set_amount(3)
            .set_destination_chain(&chain())
            .build()
            .unwrap();
        let b = ExportInPBuilder::from_tx(params(), built).unwrap();
        assert_eq!(b.amount(), Some(3));
        assert_eq!(b.destination_chain(), Some(chain().as_str()));
    }

    #[test]
    fn test_from_tx_wrong_kind() {
        let built = ExportInPBuilder::new(params())
            .set_signers(signers())
            .set_utxos(utxos(&[1_000_000_000]))
            .set_amount(3)
            .set_destination_chain(&chain())
            .build()
            .unwrap();
        assert!(ImportInPBuilder::from_tx(params(), built).is_err());
    }
}

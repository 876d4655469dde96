//! Human-readable transaction summaries.

use serde::Serialize;

use avaxp_types::network::SHARES_PER_PERCENT;
use avaxp_types::{format_address, Id, NetworkParams, ShortId};

use crate::builder::TxKind;
use crate::types::{OutputOwners, Transaction, TransferableOutput, UnsignedTx};
use crate::TxError;

/// One output as shown to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSummary {
    /// Bech32 owner addresses, or a single `0x` account on the EVM chain.
    pub addresses: Vec<String>,
    pub amount: u64,
    pub threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingSummary {
    pub node_id: String,
    pub start_time: u64,
    pub end_time: u64,
    pub stake_amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_fee_rate: Option<u32>,
    pub reward_addresses: Vec<String>,
}

/// Summary of what a transaction does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxExplanation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload outputs: stake, exported funds, or the imported credit.
    pub outputs: Vec<OutputSummary>,
    pub output_amount: u64,
    pub change_outputs: Vec<OutputSummary>,
    pub change_amount: u64,
    pub fee: u64,
    pub memo: String,
    pub signatures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staking: Option<StakingSummary>,
}

impl TxExplanation {
    pub fn to_json(&self) -> Result<String, TxError> {
        serde_json::to_string_pretty(self).map_err(|e| TxError::Invalid(e.to_string()))
    }
}

struct Formatter<'a> {
    params: &'a NetworkParams,
}

impl Formatter<'_> {
    /// Chain alias for addresses living on `chain`.
    fn alias(&self, chain: Id) -> &str {
        if chain == self.params.c_chain_id {
            "C"
        } else {
            &self.params.alias
        }
    }

    fn addresses(&self, chain: Id, addresses: &[ShortId]) -> Result<Vec<String>, TxError> {
        addresses
            .iter()
            .map(|a| format_address(self.alias(chain), &self.params.hrp, a).map_err(TxError::from))
            .collect()
    }

    fn output(&self, chain: Id, o: &TransferableOutput) -> Result<OutputSummary, TxError> {
        Ok(OutputSummary {
            addresses: self.addresses(chain, &o.addresses)?,
            amount: o.amount,
            threshold: o.threshold,
        })
    }

    fn outputs(&self, chain: Id, outs: &[TransferableOutput]) -> Result<Vec<OutputSummary>, TxError> {
        outs.iter().map(|o| self.output(chain, o)).collect()
    }

    fn owners(&self, owners: &OutputOwners) -> Result<Vec<String>, TxError> {
        self.addresses(self.params.p_chain_id, &owners.addresses)
    }
}

impl Transaction {
    /// Summarize the transaction with addresses rendered for `params`.
    pub fn explain(&self, params: &NetworkParams) -> Result<TxExplanation, TxError> {
        let f = Formatter { params };
        let p_chain = params.p_chain_id;
        let base_outputs = self
            .unsigned
            .base()
            .map(|b| b.outputs.as_slice())
            .unwrap_or(&[]);

        let (outputs, change_outputs) = match &self.unsigned {
            UnsignedTx::AddValidator(tx) => {
                (f.outputs(p_chain, &tx.stake)?, f.outputs(p_chain, base_outputs)?)
            }
            UnsignedTx::AddDelegator(tx) => {
                (f.outputs(p_chain, &tx.stake)?, f.outputs(p_chain, base_outputs)?)
            }
            UnsignedTx::AddPermissionlessValidator(tx) => {
                (f.outputs(p_chain, &tx.stake)?, f.outputs(p_chain, base_outputs)?)
            }
            UnsignedTx::AddPermissionlessDelegator(tx) => {
                (f.outputs(p_chain, &tx.stake)?, f.outputs(p_chain, base_outputs)?)
            }
            UnsignedTx::PlatformExport(tx) => (
                f.outputs(tx.destination_chain, &tx.exported_outputs)?,
                f.outputs(p_chain, base_outputs)?,
            ),
            UnsignedTx::PlatformImport(_) => (f.outputs(p_chain, base_outputs)?, Vec::new()),
            UnsignedTx::EvmExport(tx) => (
                f.outputs(tx.destination_chain, &tx.exported_outputs)?,
                Vec::new(),
            ),
            UnsignedTx::EvmImport(tx) => (
                tx.outs
                    .iter()
                    .map(|o| OutputSummary {
                        addresses: vec![o.address.to_string()],
                        amount: o.amount,
                        threshold: 1,
                    })
                    .collect(),
                Vec::new(),
            ),
        };

        let staking = match &self.unsigned {
            UnsignedTx::AddValidator(tx) => {
                Some((&tx.validator, Some(tx.shares), &tx.rewards_owner))
            }
            UnsignedTx::AddDelegator(tx) => Some((&tx.validator, None, &tx.rewards_owner)),
            UnsignedTx::AddPermissionlessValidator(tx) => {
                Some((&tx.validator, Some(tx.shares), &tx.validator_rewards_owner))
            }
            UnsignedTx::AddPermissionlessDelegator(tx) => {
                Some((&tx.validator, None, &tx.rewards_owner))
            }
            _ => None,
        }
        .map(|(v, shares, owners)| -> Result<StakingSummary, TxError> {
            Ok(StakingSummary {
                node_id: v.node_id.to_string(),
                start_time: v.start,
                end_time: v.end,
                stake_amount: v.weight,
                delegation_fee_rate: shares.map(|s| s / SHARES_PER_PERCENT),
                reward_addresses: f.owners(owners)?,
            })
        })
        .transpose()?;

        let output_amount = outputs.iter().map(|o| o.amount).sum();
        let change_amount = change_outputs.iter().map(|o| o.amount).sum();
        Ok(TxExplanation {
            id: self.id_string(),
            kind: TxKind::of(&self.unsigned).name().to_string(),
            outputs,
            output_amount,
            change_outputs,
            change_amount,
            fee: self.fee_amount(),
            memo: String::from_utf8_lossy(self.unsigned.memo()).into_owned(),
            signatures: self.credentials.iter().map(|c| c.filled().count()).sum(),
            staking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::ExportInPBuilder;
    use crate::builder::BuildCommon;
    use crate::credential::CanonicalSigners;
    use crate::utxo::Utxo;

    fn signers() -> CanonicalSigners {
        CanonicalSigners::from_owner_keys(&[
            ShortId::new([1; 20]),
            ShortId::new([2; 20]),
            ShortId::new([3; 20]),
        ])
        .unwrap()
    }

    fn export() -> (NetworkParams, Transaction) {
        let params = NetworkParams::avax_fuji().unwrap();
        let owners = signers().as_slice().to_vec();
        let tx = ExportInPBuilder::new(params.clone())
            .set_signers(signers())
            .set_utxos(vec![Utxo::transfer(Id::new([9; 32]), 0, 1_000_000_000, 2, owners)])
            .set_memo(b"hello")
            .set_amount(400_000_000)
            .set_destination_chain(&params.c_chain_id.to_cb58())
            .build()
            .unwrap();
        (params, tx)
    }

    #[test]
    fn test_explain_export() {
        let (params, tx) = export();
        let e = tx.explain(&params).unwrap();
        assert_eq!(e.kind, "Export");
        assert_eq!(e.output_amount, 400_000_000);
        assert_eq!(e.change_amount, 599_000_000);
        assert_eq!(e.fee, 1_000_000);
        assert_eq!(e.memo, "hello");
        assert_eq!(e.signatures, 0);
        assert!(e.staking.is_none());
        assert!(e.outputs[0].addresses[0].starts_with("C-fuji1"));
        assert!(e.change_outputs[0].addresses[0].starts_with("P-fuji1"));
        assert_eq!(e.id, tx.id_string());
    }

    #[test]
    fn test_explain_json() {
        let (params, tx) = export();
        let json = tx.explain(&params).unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "Export");
        assert_eq!(value["outputAmount"], 400_000_000);
        assert!(value.get("staking").is_none());
    }
}

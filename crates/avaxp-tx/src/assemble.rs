//! Turn a UTXO set and a target amount into inputs, credentials and change.

use avaxp_types::network::MULTISIG_THRESHOLD;
use avaxp_types::Id;

use crate::credential::{credential_for, CanonicalSigners};
use crate::types::{Credential, TransferableInput, TransferableOutput};
use crate::utxo::UtxoSet;
use crate::TxError;

/// Inputs spending every UTXO, plus the change output if any.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub inputs: Vec<TransferableInput>,
    /// One per input, same order.
    pub credentials: Vec<Credential>,
    /// The change output, or empty when the inputs match the target exactly.
    pub outputs: Vec<TransferableOutput>,
    pub total: u64,
    pub change: u64,
}

pub struct InputOutputAssembler<'a> {
    signers: &'a CanonicalSigners,
    recovery: bool,
    asset_id: Id,
    locktime: u64,
}

impl<'a> InputOutputAssembler<'a> {
    pub fn new(signers: &'a CanonicalSigners, asset_id: Id) -> Self {
        Self {
            signers,
            recovery: false,
            asset_id,
            locktime: 0,
        }
    }

    pub fn recovery(mut self, recovery: bool) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn locktime(mut self, locktime: u64) -> Self {
        self.locktime = locktime;
        self
    }

    /// An output paying the canonical signers at the wallet threshold.
    pub fn output(&self, amount: u64) -> TransferableOutput {
        TransferableOutput {
            asset_id: self.asset_id,
            amount,
            locktime: self.locktime,
            threshold: MULTISIG_THRESHOLD,
            addresses: self.signers.sorted(),
        }
    }

    /// Spend every UTXO, in (tx id, output index) order.
    ///
    /// Returns the inputs, their placeholder credentials, and the total.
    pub fn spend_all(
        &self,
        utxos: &UtxoSet,
    ) -> Result<(Vec<TransferableInput>, Vec<Credential>, u64), TxError> {
        let total = utxos.total()?;
        let mut inputs = Vec::with_capacity(utxos.len());
        let mut credentials = Vec::with_capacity(utxos.len());
        for utxo in utxos.sorted() {
            let (sig_indices, credential) = credential_for(utxo, self.signers, self.recovery)?;
            inputs.push(TransferableInput {
                tx_id: utxo.tx_id,
                output_index: utxo.output_index,
                asset_id: self.asset_id,
                amount: utxo.amount,
                sig_indices,
            });
            credentials.push(credential);
        }
        Ok((inputs, credentials, total))
    }

    /// Spend every UTXO toward `target`, returning the remainder as change.
    pub fn assemble(&self, utxos: &UtxoSet, target: u64) -> Result<Assembled, TxError> {
        let (inputs, credentials, total) = self.spend_all(utxos)?;
        let change = total
            .checked_sub(target)
            .ok_or(TxError::InsufficientFunds { total, target })?;
        let outputs = if change > 0 {
            vec![self.output(change)]
        } else {
            Vec::new()
        };
        log::debug!(
            "assembled {} inputs, total {}, target {}, change {}",
            inputs.len(),
            total,
            target,
            change
        );
        Ok(Assembled {
            inputs,
            credentials,
            outputs,
            total,
            change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::Utxo;
    use avaxp_types::ShortId;

    fn signers() -> CanonicalSigners {
        CanonicalSigners::from_owner_keys(&[
            ShortId::new([3; 20]),
            ShortId::new([1; 20]),
            ShortId::new([2; 20]),
        ])
        .unwrap()
    }

    fn utxos(s: &CanonicalSigners) -> UtxoSet {
        let owners = s.as_slice().to_vec();
        UtxoSet::new(
            (0..3u8)
                .map(|i| Utxo::transfer(Id::new([10 - i; 32]), 0, 1_000_000_000, 2, owners.clone()))
                .collect(),
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_change_output() {
        let s = signers();
        let a = InputOutputAssembler::new(&s, Id::new([0x3d; 32]))
            .assemble(&utxos(&s), 2_001_000_000)
            .unwrap();
        assert_eq!(a.inputs.len(), 3);
        assert_eq!(a.credentials.len(), 3);
        assert_eq!(a.change, 999_000_000);
        assert_eq!(a.outputs.len(), 1);
        assert_eq!(a.outputs[0].amount, 999_000_000);
        assert_eq!(a.outputs[0].addresses, s.sorted());
        assert_eq!(a.outputs[0].threshold, 2);
    }

    #[test]
    fn test_exact_target_has_no_change() {
        let s = signers();
        let a = InputOutputAssembler::new(&s, Id::default())
            .assemble(&utxos(&s), 3_000_000_000)
            .unwrap();
        assert!(a.outputs.is_empty());
        assert_eq!(a.change, 0);
    }

    #[test]
    fn test_insufficient_funds() {
        let s = signers();
        let err = InputOutputAssembler::new(&s, Id::default())
            .assemble(&utxos(&s), 3_000_000_001)
            .unwrap_err();
        assert!(matches!(
            err,
            TxError::InsufficientFunds {
                total: 3_000_000_000,
                target: 3_000_000_001
            }
        ));
    }

    #[test]
    fn test_inputs_sorted_by_tx_id() {
        let s = signers();
        let a = InputOutputAssembler::new(&s, Id::default())
            .assemble(&utxos(&s), 0)
            .unwrap();
        let ids: Vec<Id> = a.inputs.iter().map(|i| i.tx_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_recovery_changes_only_first_role() {
        let s = signers();
        let set = utxos(&s);
        let normal = InputOutputAssembler::new(&s, Id::default())
            .assemble(&set, 0)
            .unwrap();
        let recovery = InputOutputAssembler::new(&s, Id::default())
            .recovery(true)
            .assemble(&set, 0)
            .unwrap();
        assert_eq!(normal.credentials[0].slots.len(), recovery.credentials[0].slots.len());
        assert_eq!(normal.outputs, recovery.outputs);
        assert_eq!(normal.inputs[0].sig_indices, vec![0, 1]);
        assert_eq!(recovery.inputs[0].sig_indices, vec![1, 2]);
    }
}

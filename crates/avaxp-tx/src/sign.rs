//! Signing coordinator.
//!
//! Each credential slot that still awaits a signature names the address
//! expected to fill it, so a key signs exactly the slots carrying its own
//! address (platform address, or the EVM account for EVM-chain inputs). The
//! order in which the participants sign therefore never affects the result.
//! Every input signs the same message, the hash of the unsigned bytes.
//!
//! A slot awaiting the zero address is untagged: it belongs to whichever
//! owner has no tagged slot in that credential and has not signed it yet.

use avaxp_types::ShortId;

use crate::keys::{address_of, evm_address_of, recover_signer, Keys};
use crate::types::{SignatureSlot, Transaction, UnsignedTx};
use crate::TxError;

impl Transaction {
    /// Fill every slot awaiting `key`, or the untagged slot of a credential
    /// that names no slot for it.
    ///
    /// Fails with `DuplicateSignature` when the key already signed and has
    /// nothing left to fill, and with `KeyCannotSign` when no slot names it.
    /// Nothing is modified on failure.
    pub fn sign<K: Keys + ?Sized>(&mut self, key: &K) -> Result<&mut Self, TxError> {
        if !self.has_credentials() {
            return Err(TxError::Invalid("transaction has no credentials to sign".into()));
        }
        let address = key.address();
        let evm = key.evm_address().to_short_id();
        let hash = self.signing_hash();

        let untagged =
            |slot: &SignatureSlot| matches!(slot, SignatureSlot::Awaiting(a) if a.is_zero());
        let signed = if self.credentials.iter().any(|c| c.slots.iter().any(untagged)) {
            self.signers()?
        } else {
            Vec::new()
        };

        let mut plan = Vec::new();
        for (c, credential) in self.credentials.iter().enumerate() {
            let before = plan.len();
            for (s, slot) in credential.slots.iter().enumerate() {
                if let SignatureSlot::Awaiting(expected) = slot {
                    if *expected == address || *expected == evm {
                        plan.push((c, s));
                    }
                }
            }
            let signed_here = signed.get(c).map_or(false, |r| r.contains(&address));
            if plan.len() == before && !signed_here {
                if let Some(s) = credential.slots.iter().position(untagged) {
                    plan.push((c, s));
                }
            }
        }

        if plan.is_empty() {
            let signed = if signed.is_empty() { self.signers()? } else { signed };
            let already = signed
                .iter()
                .flatten()
                .any(|a| *a == address || *a == evm);
            return Err(if already {
                TxError::DuplicateSignature(address.to_hex())
            } else {
                TxError::KeyCannotSign(address.to_hex())
            });
        }

        let signature = key.sign_hash(&hash)?;
        log::debug!(
            "key {} fills {} slot(s) of tx {}",
            address,
            plan.len(),
            self.id_string()
        );
        for (c, s) in plan {
            self.credentials[c].slots[s] = SignatureSlot::Filled(signature);
        }
        Ok(self)
    }

    /// Addresses recovered from the filled slots of each credential.
    ///
    /// EVM-chain export credentials report EVM accounts (as 20-byte ids),
    /// everything else reports platform addresses.
    pub fn signers(&self) -> Result<Vec<Vec<ShortId>>, TxError> {
        let hash = self.signing_hash();
        let evm = matches!(self.unsigned, UnsignedTx::EvmExport(_));
        self.credentials
            .iter()
            .map(|credential| {
                credential
                    .filled()
                    .map(|sig| -> Result<ShortId, TxError> {
                        let key = recover_signer(&hash, sig)?;
                        if evm {
                            Ok(evm_address_of(&key)?.to_short_id())
                        } else {
                            Ok(address_of(&key))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }

    /// True when every slot holds a signature that recovers to a key.
    ///
    /// For EVM-chain exports the recovered account must also match the input
    /// it authorizes.
    pub fn verify_signatures(&self) -> bool {
        if !self.is_fully_signed() || self.credentials.len() != self.unsigned.credential_count() {
            return false;
        }
        let signers = match self.signers() {
            Ok(signers) => signers,
            Err(e) => {
                log::warn!("signature verification failed: {}", e);
                return false;
            }
        };
        for recovered in &signers {
            for (i, a) in recovered.iter().enumerate() {
                if recovered[i + 1..].contains(a) {
                    return false;
                }
            }
        }
        if let UnsignedTx::EvmExport(tx) = &self.unsigned {
            return tx
                .ins
                .iter()
                .zip(&signers)
                .all(|(input, recovered)| recovered == &vec![input.address.to_short_id()]);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::Fee;
    use crate::keys::PrivateKey;
    use crate::types::{
        BaseTx, Credential, EvmExportTx, EvmInput, PlatformExportTx, TransferableInput,
        TransferableOutput,
    };
    use avaxp_types::Id;

    fn key(n: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[n; 32]).unwrap()
    }

    fn platform_tx(slots: &[ShortId]) -> Transaction {
        let unsigned = UnsignedTx::PlatformExport(PlatformExportTx {
            base: BaseTx {
                network_id: 5,
                blockchain_id: Id::default(),
                outputs: vec![],
                inputs: vec![TransferableInput {
                    tx_id: Id::new([1; 32]),
                    output_index: 0,
                    asset_id: Id::new([2; 32]),
                    amount: 100,
                    sig_indices: vec![0, 1],
                }],
                memo: vec![],
            },
            destination_chain: Id::new([3; 32]),
            exported_outputs: vec![TransferableOutput {
                asset_id: Id::new([2; 32]),
                amount: 90,
                locktime: 0,
                threshold: 2,
                addresses: vec![],
            }],
        });
        let credential = Credential::new(slots.iter().copied().map(SignatureSlot::Awaiting).collect());
        Transaction::new(unsigned, vec![credential], Fee::fixed(10))
    }

    #[test]
    fn test_sign_fills_matching_slot() {
        let (a, b) = (key(1), key(2));
        let mut tx = platform_tx(&[a.address(), b.address()]);
        tx.sign(&b).unwrap();
        assert!(tx.credentials[0].slots[0].is_awaiting());
        assert!(!tx.credentials[0].slots[1].is_awaiting());
        assert!(!tx.verify_signatures());
        tx.sign(&a).unwrap();
        assert!(tx.is_fully_signed());
        assert!(tx.verify_signatures());
        assert_eq!(tx.signers().unwrap(), vec![vec![a.address(), b.address()]]);
    }

    #[test]
    fn test_sign_order_independent() {
        let (a, b) = (key(1), key(2));
        let mut first = platform_tx(&[a.address(), b.address()]);
        first.sign(&a).unwrap().sign(&b).unwrap();
        let mut second = platform_tx(&[a.address(), b.address()]);
        second.sign(&b).unwrap().sign(&a).unwrap();
        assert_eq!(first.to_hex(), second.to_hex());
    }

    #[test]
    fn test_outsider_cannot_sign() {
        let (a, b) = (key(1), key(2));
        let mut tx = platform_tx(&[a.address(), b.address()]);
        let before = tx.clone();
        assert!(matches!(tx.sign(&key(3)), Err(TxError::KeyCannotSign(_))));
        assert_eq!(tx, before);
    }

    #[test]
    fn test_duplicate_signature() {
        let (a, b) = (key(1), key(2));
        let mut tx = platform_tx(&[a.address(), b.address()]);
        tx.sign(&a).unwrap();
        assert!(matches!(tx.sign(&a), Err(TxError::DuplicateSignature(_))));
    }

    #[test]
    fn test_sign_survives_roundtrip() {
        let (a, b) = (key(1), key(2));
        let mut tx = platform_tx(&[a.address(), b.address()]);
        tx.sign(&a).unwrap();
        let mut parsed = Transaction::from_hex(&tx.to_hex()).unwrap();
        parsed.sign(&b).unwrap();
        assert!(parsed.verify_signatures());
    }

    #[test]
    fn test_untagged_slot_filled_by_other_owner() {
        let (a, b) = (key(1), key(2));
        let mut tx = platform_tx(&[ShortId::default(), a.address()]);
        tx.sign(&a).unwrap();
        assert!(tx.credentials[0].slots[0].is_awaiting());
        assert!(matches!(tx.sign(&a), Err(TxError::DuplicateSignature(_))));
        tx.sign(&b).unwrap();
        assert!(tx.verify_signatures());
        assert_eq!(tx.signers().unwrap(), vec![vec![b.address(), a.address()]]);
        assert!(matches!(tx.sign(&key(3)), Err(TxError::KeyCannotSign(_))));
    }

    #[test]
    fn test_unsigned_has_nothing_to_sign() {
        let mut tx = platform_tx(&[]);
        tx.credentials.clear();
        assert!(matches!(tx.sign(&key(1)), Err(TxError::Invalid(_))));
    }

    #[test]
    fn test_evm_export_signed_by_account() {
        let sender = key(4);
        let account = sender.evm_address();
        let unsigned = UnsignedTx::EvmExport(EvmExportTx {
            network_id: 5,
            blockchain_id: Id::new([7; 32]),
            destination_chain: Id::default(),
            ins: vec![EvmInput {
                address: account,
                amount: 100,
                asset_id: Id::new([2; 32]),
                nonce: 0,
            }],
            exported_outputs: vec![],
        });
        let credential = Credential::new(vec![SignatureSlot::Awaiting(account.to_short_id())]);
        let mut tx = Transaction::new(unsigned, vec![credential], Fee::default());
        assert!(matches!(tx.sign(&key(5)), Err(TxError::KeyCannotSign(_))));
        tx.sign(&sender).unwrap();
        assert!(tx.verify_signatures());
        assert_eq!(tx.signers().unwrap(), vec![vec![account.to_short_id()]]);
    }
}

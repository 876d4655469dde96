//! Signature-slot assignment for multisig inputs.
//!
//! A wallet is owned by three keys in a fixed canonical order
//! `[primary, counterparty, backup]`, and every spend needs two of them: the
//! "first" role (primary, or backup when recovering) and the counterparty.
//! Each UTXO lists its owners in its own on-chain order, so for every input
//! the two roles are located in that list, the input's signature indices are
//! those positions in ascending order, and the credential gets one
//! placeholder per position naming the address expected to sign there.

use avaxp_types::network::{MULTISIG_SIGNERS, MULTISIG_THRESHOLD};
use avaxp_types::{parse_address, ShortId};

use crate::types::{Credential, SignatureSlot};
use crate::utxo::Utxo;
use crate::TxError;

/// Canonical index of the primary (user) key.
pub const PRIMARY: usize = 0;
/// Canonical index of the counterparty (HSM) key.
pub const COUNTERPARTY: usize = 1;
/// Canonical index of the backup key.
pub const BACKUP: usize = 2;

/// The wallet's three owner addresses in key-ceremony order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSigners {
    addresses: [ShortId; MULTISIG_SIGNERS],
}

impl CanonicalSigners {
    /// Exactly three distinct addresses, `[primary, counterparty, backup]`.
    pub fn from_owner_keys(keys: &[ShortId]) -> Result<Self, TxError> {
        let addresses: [ShortId; MULTISIG_SIGNERS] = keys.try_into().map_err(|_| {
            TxError::Invalid(format!(
                "expected {} owner addresses, got {}",
                MULTISIG_SIGNERS,
                keys.len()
            ))
        })?;
        for (i, a) in addresses.iter().enumerate() {
            if addresses[i + 1..].contains(a) {
                return Err(TxError::Invalid(format!("duplicate owner address {}", a)));
            }
        }
        Ok(Self { addresses })
    }

    /// Parse bech32 owner addresses (`P-fuji1...`).
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S], hrp: &str) -> Result<Self, TxError> {
        let keys = addresses
            .iter()
            .map(|a| parse_address(a.as_ref(), hrp))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_owner_keys(&keys)
    }

    pub fn primary(&self) -> &ShortId {
        &self.addresses[PRIMARY]
    }

    pub fn counterparty(&self) -> &ShortId {
        &self.addresses[COUNTERPARTY]
    }

    pub fn backup(&self) -> &ShortId {
        &self.addresses[BACKUP]
    }

    pub fn as_slice(&self) -> &[ShortId] {
        &self.addresses
    }

    /// Canonical index filling the first role.
    pub fn first_role(recovery: bool) -> usize {
        if recovery {
            BACKUP
        } else {
            PRIMARY
        }
    }

    /// Canonical indices that sign, first role then counterparty.
    pub fn roles(recovery: bool) -> [usize; MULTISIG_THRESHOLD as usize] {
        [Self::first_role(recovery), COUNTERPARTY]
    }

    pub fn get(&self, index: usize) -> Option<&ShortId> {
        self.addresses.get(index)
    }

    /// All three addresses sorted ascending, the order outputs list them in.
    pub fn sorted(&self) -> Vec<ShortId> {
        let mut out = self.addresses.to_vec();
        out.sort();
        out
    }
}

/// Per-UTXO mapping from signing roles to owner-list positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSlotMap {
    /// `(canonical index, owner index)`, ascending by owner index.
    entries: Vec<(usize, u32)>,
}

impl AddressSlotMap {
    /// Owner-list position of a canonical signer, if it signs this input.
    pub fn owner_index(&self, signer: usize) -> Option<u32> {
        self.entries
            .iter()
            .find(|(s, _)| *s == signer)
            .map(|(_, o)| *o)
    }

    /// The input's signature indices, ascending.
    pub fn sig_indices(&self) -> Vec<u32> {
        self.entries.iter().map(|(_, o)| *o).collect()
    }

    /// Canonical signers in slot order.
    pub fn signer_order(&self) -> Vec<usize> {
        self.entries.iter().map(|(s, _)| *s).collect()
    }

    /// One `Awaiting` slot per signing role, in slot order.
    pub fn placeholders(&self, signers: &CanonicalSigners) -> Credential {
        Credential::new(
            self.entries
                .iter()
                .filter_map(|(s, _)| signers.get(*s).copied())
                .map(SignatureSlot::Awaiting)
                .collect(),
        )
    }
}

/// Locate the signing roles in `utxo`'s owner list.
///
/// Fails with `ThresholdInconsistent` unless the UTXO threshold equals the
/// wallet threshold, and with `AddressesInconsistent` when a role's address
/// is not among the owners.
pub fn slot_map(
    utxo: &Utxo,
    signers: &CanonicalSigners,
    recovery: bool,
) -> Result<AddressSlotMap, TxError> {
    if utxo.threshold != MULTISIG_THRESHOLD {
        return Err(TxError::ThresholdInconsistent {
            expected: MULTISIG_THRESHOLD,
            got: utxo.threshold,
        });
    }
    let mut entries = Vec::with_capacity(MULTISIG_THRESHOLD as usize);
    for signer in CanonicalSigners::roles(recovery) {
        let address = signers
            .get(signer)
            .ok_or_else(|| TxError::AddressesInconsistent(utxo.utxo_id()))?;
        let owner = utxo
            .addresses
            .iter()
            .position(|a| a == address)
            .ok_or_else(|| TxError::AddressesInconsistent(utxo.utxo_id()))?;
        entries.push((signer, owner as u32));
    }
    entries.sort_by_key(|(_, owner)| *owner);
    log::debug!(
        "slot map for {} (recovery={}): {:?}",
        utxo.utxo_id(),
        recovery,
        entries
    );
    Ok(AddressSlotMap { entries })
}

/// Signature indices and placeholder credential for one UTXO.
pub fn credential_for(
    utxo: &Utxo,
    signers: &CanonicalSigners,
    recovery: bool,
) -> Result<(Vec<u32>, Credential), TxError> {
    let map = slot_map(utxo, signers, recovery)?;
    Ok((map.sig_indices(), map.placeholders(signers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avaxp_types::Id;

    fn signers() -> CanonicalSigners {
        CanonicalSigners::from_owner_keys(&[
            ShortId::new([0xa1; 20]),
            ShortId::new([0xc2; 20]),
            ShortId::new([0xb3; 20]),
        ])
        .unwrap()
    }

    fn utxo(owners: Vec<ShortId>) -> Utxo {
        Utxo::transfer(Id::new([4; 32]), 0, 1_000, 2, owners)
    }

    fn permutations(v: &[ShortId]) -> Vec<Vec<ShortId>> {
        if v.len() <= 1 {
            return vec![v.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..v.len() {
            let mut rest = v.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_signers_validation() {
        assert!(CanonicalSigners::from_owner_keys(&[ShortId::new([1; 20])]).is_err());
        let dup = ShortId::new([1; 20]);
        assert!(CanonicalSigners::from_owner_keys(&[dup, dup, ShortId::new([2; 20])]).is_err());
    }

    #[test]
    fn test_placeholder_follows_owner_order() {
        let s = signers();
        // counterparty listed before primary
        let u = utxo(vec![*s.counterparty(), *s.backup(), *s.primary()]);
        let (indices, cred) = credential_for(&u, &s, false).unwrap();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(
            cred.slots,
            vec![
                SignatureSlot::Awaiting(*s.counterparty()),
                SignatureSlot::Awaiting(*s.primary()),
            ]
        );
    }

    #[test]
    fn test_slot_stability_under_permutation() {
        let s = signers();
        for recovery in [false, true] {
            for owners in permutations(s.as_slice()) {
                let u = utxo(owners.clone());
                let (indices, cred) = credential_for(&u, &s, recovery).unwrap();
                assert_eq!(indices.len(), 2);
                assert!(indices[0] < indices[1]);
                for (slot, idx) in cred.slots.iter().zip(&indices) {
                    assert_eq!(slot, &SignatureSlot::Awaiting(owners[*idx as usize]));
                }
            }
        }
    }

    #[test]
    fn test_recovery_uses_backup() {
        let s = signers();
        let u = utxo(s.as_slice().to_vec());
        let map = slot_map(&u, &s, true).unwrap();
        assert_eq!(map.owner_index(BACKUP), Some(2));
        assert_eq!(map.owner_index(COUNTERPARTY), Some(1));
        assert_eq!(map.owner_index(PRIMARY), None);
        assert_eq!(map.signer_order(), vec![COUNTERPARTY, BACKUP]);
    }

    #[test]
    fn test_missing_owner() {
        let s = signers();
        let u = utxo(vec![*s.primary(), ShortId::new([9; 20]), *s.backup()]);
        assert!(matches!(
            slot_map(&u, &s, false),
            Err(TxError::AddressesInconsistent(_))
        ));
        // recovery needs the backup and counterparty, the latter is missing too
        assert!(slot_map(&u, &s, true).is_err());
    }

    #[test]
    fn test_threshold_mismatch() {
        let s = signers();
        let mut u = utxo(s.as_slice().to_vec());
        u.threshold = 3;
        assert!(matches!(
            slot_map(&u, &s, false),
            Err(TxError::ThresholdInconsistent { expected: 2, got: 3 })
        ));
    }
}

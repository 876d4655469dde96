//! Per-network constants used by the transaction builders.
//!
//! Values can come from the built-in presets or from a JSON document with
//! the same field names (ids in cb58 text form).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{Id, IdError};

/// One day in seconds.
pub const DAY: u64 = 24 * 60 * 60;

/// One nano-unit of the native asset is 1e-9 of a whole coin.
pub const NANO_PER_COIN: u64 = 1_000_000_000;

/// Signature threshold for every wallet output.
pub const MULTISIG_THRESHOLD: u32 = 2;

/// Number of owner keys in a wallet.
pub const MULTISIG_SIGNERS: usize = 3;

/// Delegation fee shares are expressed in units of 1/10,000 of a percent.
pub const SHARES_PER_PERCENT: u32 = 10_000;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid network config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid id in network config: {0}")]
    Id(#[from] IdError),
}

/// Constants that differ between networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network_id: u32,
    /// Bech32 human readable part of owner addresses.
    pub hrp: String,
    /// Chain alias used in address strings ("P").
    pub alias: String,
    pub p_chain_id: Id,
    pub c_chain_id: Id,
    /// Native asset id.
    pub asset_id: Id,
    /// Fixed fee on the platform chain.
    pub tx_fee: u64,
    pub min_validator_stake: u64,
    pub min_delegator_stake: u64,
    /// Seconds.
    pub min_stake_duration: u64,
    /// Seconds.
    pub max_stake_duration: u64,
    /// Percent.
    pub min_delegation_fee: u32,
    /// Fee per byte on the EVM chain.
    pub evm_fee_rate: u64,
}

impl NetworkParams {
    pub fn avax_mainnet() -> Result<Self, NetworkError> {
        Ok(Self {
            network_id: 1,
            hrp: "avax".to_string(),
            alias: "P".to_string(),
            p_chain_id: Id::default(),
            c_chain_id: "2q9e4r6Mu3U68nU1fYjgbR6JvwrRx36CohpAX5UQxse55x1Q5".parse()?,
            asset_id: "FvwEAhmxKfeiG8SnEvq42hc6whRyY3EFYAvebMqDNDGCgxN5Z".parse()?,
            tx_fee: 1_000_000,
            min_validator_stake: 2_000 * NANO_PER_COIN,
            min_delegator_stake: 25 * NANO_PER_COIN,
            min_stake_duration: 14 * DAY,
            max_stake_duration: 365 * DAY,
            min_delegation_fee: 2,
            evm_fee_rate: 25,
        })
    }

    pub fn avax_fuji() -> Result<Self, NetworkError> {
        Ok(Self {
            network_id: 5,
            hrp: "fuji".to_string(),
            alias: "P".to_string(),
            p_chain_id: Id::default(),
            c_chain_id: "yH8D7ThNJkxmtkuv2jgBa4P1Rn3Qpr4pPr7QYNfcdoS6k6HWp".parse()?,
            asset_id: "U8iRqJoiJm8xZHAacmvYyZVwqQx6uDNtQeP3CQ6fcgQk3JqnK".parse()?,
            tx_fee: 1_000_000,
            min_validator_stake: NANO_PER_COIN,
            min_delegator_stake: NANO_PER_COIN,
            min_stake_duration: 14 * DAY,
            max_stake_duration: 365 * DAY,
            min_delegation_fee: 2,
            evm_fee_rate: 25,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, NetworkError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        // Every field is a plain number, string, or cb58 string.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_parse() {
        let main = NetworkParams::avax_mainnet().unwrap();
        assert_eq!(main.network_id, 1);
        assert!(main.p_chain_id.is_empty());
        assert!(!main.c_chain_id.is_empty());

        let fuji = NetworkParams::avax_fuji().unwrap();
        assert_eq!(fuji.hrp, "fuji");
        assert_ne!(fuji.asset_id, main.asset_id);
    }

    #[test]
    fn test_json_roundtrip() {
        let fuji = NetworkParams::avax_fuji().unwrap();
        let json = fuji.to_json();
        assert!(json.contains("\"p_chain_id\": \"11111111111111111111111111111111LpoYY\""));
        assert_eq!(NetworkParams::from_json(&json).unwrap(), fuji);
    }

    #[test]
    fn test_json_bad_id() {
        let fuji = NetworkParams::avax_fuji().unwrap();
        let json = fuji.to_json().replace("11111111111111111111111111111111LpoYY", "1111");
        assert!(NetworkParams::from_json(&json).is_err());
    }
}

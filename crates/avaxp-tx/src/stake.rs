//! Staking transaction builders.
//!
//! All four builders share the validator window and stake amount
//! (`StakeFields`), validated in a fixed order when `build()` runs: node id,
//! start time, end after start, duration bounds (non-permissionless only),
//! minimum stake, then the delegation fee for validators. The stake is
//! locked in its own output owned by the signers; whatever the inputs hold
//! beyond stake and fee comes back as change.

use avaxp_types::network::{DAY, SHARES_PER_PERCENT};
use avaxp_types::{parse_address, Id, NetworkParams, NodeId, ShortId};

use crate::builder::{wrong_kind, BuildCommon, BuilderConfig};
use crate::fee::{checked_add, Fee};
use crate::types::{
    AddDelegatorTx, AddPermissionlessDelegatorTx, AddPermissionlessValidatorTx, AddValidatorTx,
    BaseTx, Credential, ProofOfPossession, Transaction, TransferableOutput, UnsignedTx, Validator,
    BLS_PUBLIC_KEY_LEN, BLS_SIGNATURE_LEN,
};
use crate::TxError;

// ─── Shared Stake Fields ────────────────────────────────────────────────────

/// Validator window, stake and reward destination.
#[derive(Debug, Clone, Default)]
pub struct StakeFields {
    node_id: Option<String>,
    start: Option<u64>,
    end: Option<u64>,
    stake_amount: Option<u64>,
    reward_addresses: Vec<ShortId>,
}

impl StakeFields {
    fn from_validator(validator: &Validator, reward_addresses: &[ShortId]) -> Self {
        Self {
            node_id: Some(validator.node_id.to_string()),
            start: Some(validator.start),
            end: Some(validator.end),
            stake_amount: Some(validator.weight),
            reward_addresses: reward_addresses.to_vec(),
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn stake_amount(&self) -> Option<u64> {
        self.stake_amount
    }

    pub fn reward_addresses(&self) -> &[ShortId] {
        &self.reward_addresses
    }

    /// Check every field and produce the validator record.
    ///
    /// `bounded` applies the network's min/max stake duration.
    fn validate(
        &self,
        config: &BuilderConfig,
        min_stake: u64,
        bounded: bool,
    ) -> Result<Validator, TxError> {
        let node_id = NodeId::parse(self.node_id.as_deref().ok_or(TxError::MissingField("nodeId"))?)?;
        let start = self.start.ok_or(TxError::MissingField("startTime"))?;
        let end = self.end.ok_or(TxError::MissingField("endTime"))?;
        let weight = self.stake_amount.ok_or(TxError::MissingField("stakeAmount"))?;
        let params = &config.params;

        if !config.is_reinit() {
            let earliest = checked_add(config.now(), DAY)?;
            if start < earliest {
                return Err(TxError::StartTimeTooSoon { start, earliest });
            }
        }
        if end <= start {
            return Err(TxError::EndBeforeStart);
        }
        let duration = end - start;
        if bounded {
            if duration < params.min_stake_duration {
                return Err(TxError::StakeDurationTooShort {
                    duration,
                    min: params.min_stake_duration,
                });
            }
            if duration > params.max_stake_duration {
                return Err(TxError::StakeDurationTooLong {
                    duration,
                    max: params.max_stake_duration,
                });
            }
        }
        if weight < min_stake {
            return Err(TxError::StakeAmountBelowMinimum {
                amount: weight,
                min: min_stake,
            });
        }
        Ok(Validator {
            node_id,
            start,
            end,
            weight,
        })
    }
}

/// Setters shared by the staking builders.
pub trait StakeCommon: BuildCommon {
    fn stake_fields(&self) -> &StakeFields;
    fn stake_fields_mut(&mut self) -> &mut StakeFields;

    /// `NodeID-<cb58>`; validated at build time.
    fn set_node_id(mut self, node_id: &str) -> Self {
        self.stake_fields_mut().node_id = Some(node_id.to_string());
        self
    }

    /// Unix seconds.
    fn set_start_time(mut self, start: u64) -> Self {
        self.stake_fields_mut().start = Some(start);
        self
    }

    /// Unix seconds.
    fn set_end_time(mut self, end: u64) -> Self {
        self.stake_fields_mut().end = Some(end);
        self
    }

    fn set_stake_amount(mut self, amount: u64) -> Self {
        self.stake_fields_mut().stake_amount = Some(amount);
        self
    }

    /// Reward owners as bech32 addresses; the signers when never set.
    fn set_reward_addresses<S: AsRef<str>>(mut self, addresses: &[S]) -> Result<Self, TxError> {
        let hrp = self.config().params.hrp.clone();
        let parsed = addresses
            .iter()
            .map(|a| parse_address(a.as_ref(), &hrp))
            .collect::<Result<Vec<_>, _>>()?;
        self.stake_fields_mut().reward_addresses = parsed;
        Ok(self)
    }
}

struct StakeParts {
    base: BaseTx,
    stake: Vec<TransferableOutput>,
    credentials: Vec<Credential>,
}

/// Spend the UTXOs toward `weight` plus the fixed fee.
fn assemble_stake(config: &BuilderConfig, weight: u64) -> Result<StakeParts, TxError> {
    let fee = config.params.tx_fee;
    let assembler = config.assembler()?;
    let assembled = assembler.assemble(&config.utxo_set()?, checked_add(weight, fee)?)?;
    log::debug!(
        "stake {} with fee {}, change {}",
        weight,
        fee,
        assembled.change
    );
    Ok(StakeParts {
        base: config.base_tx(assembled.outputs, assembled.inputs),
        stake: vec![assembler.output(weight)],
        credentials: assembled.credentials,
    })
}

/// Delegation shares out of 1_000_000, checked against the network minimum.
fn check_delegation_fee(shares: Option<u64>, params: &NetworkParams) -> Result<u32, TxError> {
    let shares = shares.ok_or(TxError::MissingField("delegationFeeRate"))?;
    let per_percent = u64::from(SHARES_PER_PERCENT);
    if shares < u64::from(params.min_delegation_fee) * per_percent {
        return Err(TxError::DelegationFeeBelowMinimum {
            fee: u32::try_from(shares / per_percent).unwrap_or(u32::MAX),
            min: params.min_delegation_fee,
        });
    }
    u32::try_from(shares)
        .map_err(|_| TxError::Invalid(format!("delegation fee of {} shares overflows", shares)))
}

fn decode_fixed<const N: usize>(hex_str: Option<&str>, what: &'static str) -> Result<[u8; N], TxError> {
    let text = hex_str.ok_or(TxError::MissingField(what))?;
    let bytes = hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|_| TxError::Invalid(format!("{} is not hex", what)))?;
    bytes.as_slice().try_into().map_err(|_| {
        TxError::Invalid(format!("{} must be {} bytes, got {}", what, N, bytes.len()))
    })
}

// ─── Validator ──────────────────────────────────────────────────────────────

/// Primary-network validator.
#[derive(Debug, Clone)]
pub struct ValidatorBuilder {
    config: BuilderConfig,
    stake: StakeFields,
    delegation_shares: Option<u64>,
}

impl ValidatorBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            stake: StakeFields::default(),
            delegation_shares: None,
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::AddValidator(body) = &tx.unsigned else {
            return Err(wrong_kind("add validator", &tx));
        };
        let stake = StakeFields::from_validator(&body.validator, &body.rewards_owner.addresses);
        let delegation_shares = Some(u64::from(body.shares));
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            stake,
            delegation_shares,
        })
    }

    /// Percent of delegator rewards kept by the validator.
    pub fn set_delegation_fee_rate(mut self, percent: u32) -> Self {
        self.delegation_shares = Some(u64::from(percent) * u64::from(SHARES_PER_PERCENT));
        self
    }

    /// Same fee as raw shares out of 1_000_000.
    pub fn set_delegation_shares(mut self, shares: u32) -> Self {
        self.delegation_shares = Some(u64::from(shares));
        self
    }

    /// Whole percent, rounded down.
    pub fn delegation_fee_rate(&self) -> Option<u32> {
        self.delegation_shares
            .and_then(|s| u32::try_from(s / u64::from(SHARES_PER_PERCENT)).ok())
    }

    pub fn delegation_shares(&self) -> Option<u64> {
        self.delegation_shares
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = self.config.frozen() {
            return Ok(tx.clone());
        }
        let params = &self.config.params;
        let validator = self.stake.validate(&self.config, params.min_validator_stake, true)?;
        let shares = check_delegation_fee(self.delegation_shares, params)?;
        let rewards_owner = self.config.owners(&self.stake.reward_addresses)?;
        let parts = assemble_stake(&self.config, validator.weight)?;

        let unsigned = UnsignedTx::AddValidator(AddValidatorTx {
            base: parts.base,
            validator,
            stake: parts.stake,
            rewards_owner,
            shares,
        });
        Ok(Transaction::new(unsigned, parts.credentials, Fee::fixed(params.tx_fee)))
    }
}

impl BuildCommon for ValidatorBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

impl StakeCommon for ValidatorBuilder {
    fn stake_fields(&self) -> &StakeFields {
        &self.stake
    }

    fn stake_fields_mut(&mut self) -> &mut StakeFields {
        &mut self.stake
    }
}

// ─── Delegator ──────────────────────────────────────────────────────────────

/// Primary-network delegator.
#[derive(Debug, Clone)]
pub struct DelegatorBuilder {
    config: BuilderConfig,
    stake: StakeFields,
}

impl DelegatorBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            stake: StakeFields::default(),
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::AddDelegator(body) = &tx.unsigned else {
            return Err(wrong_kind("add delegator", &tx));
        };
        let stake = StakeFields::from_validator(&body.validator, &body.rewards_owner.addresses);
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            stake,
        })
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = self.config.frozen() {
            return Ok(tx.clone());
        }
        let params = &self.config.params;
        let validator = self.stake.validate(&self.config, params.min_delegator_stake, true)?;
        let rewards_owner = self.config.owners(&self.stake.reward_addresses)?;
        let parts = assemble_stake(&self.config, validator.weight)?;

        let unsigned = UnsignedTx::AddDelegator(AddDelegatorTx {
            base: parts.base,
            validator,
            stake: parts.stake,
            rewards_owner,
        });
        Ok(Transaction::new(unsigned, parts.credentials, Fee::fixed(params.tx_fee)))
    }
}

impl BuildCommon for DelegatorBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

impl StakeCommon for DelegatorBuilder {
    fn stake_fields(&self) -> &StakeFields {
        &self.stake
    }

    fn stake_fields_mut(&mut self) -> &mut StakeFields {
        &mut self.stake
    }
}

// ─── Permissionless Validator ───────────────────────────────────────────────

/// Primary-network validator registered with a BLS key.
#[derive(Debug, Clone)]
pub struct PermissionlessValidatorBuilder {
    config: BuilderConfig,
    stake: StakeFields,
    delegation_shares: Option<u64>,
    bls_public_key: Option<String>,
    bls_signature: Option<String>,
}

impl PermissionlessValidatorBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            stake: StakeFields::default(),
            delegation_shares: None,
            bls_public_key: None,
            bls_signature: None,
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::AddPermissionlessValidator(body) = &tx.unsigned else {
            return Err(wrong_kind("add permissionless validator", &tx));
        };
        let stake =
            StakeFields::from_validator(&body.validator, &body.validator_rewards_owner.addresses);
        let delegation_shares = Some(u64::from(body.shares));
        let bls_public_key = Some(hex::encode(body.signer.public_key));
        let bls_signature = Some(hex::encode(body.signer.signature));
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            stake,
            delegation_shares,
            bls_public_key,
            bls_signature,
        })
    }

    pub fn set_delegation_fee_rate(mut self, percent: u32) -> Self {
        self.delegation_shares = Some(u64::from(percent) * u64::from(SHARES_PER_PERCENT));
        self
    }

    pub fn set_delegation_shares(mut self, shares: u32) -> Self {
        self.delegation_shares = Some(u64::from(shares));
        self
    }

    /// Hex-encoded 48-byte BLS public key.
    pub fn set_bls_public_key(mut self, key: &str) -> Self {
        self.bls_public_key = Some(key.to_string());
        self
    }

    /// Hex-encoded 96-byte proof of possession.
    pub fn set_bls_signature(mut self, signature: &str) -> Self {
        self.bls_signature = Some(signature.to_string());
        self
    }

    pub fn delegation_fee_rate(&self) -> Option<u32> {
        self.delegation_shares
            .and_then(|s| u32::try_from(s / u64::from(SHARES_PER_PERCENT)).ok())
    }

    pub fn delegation_shares(&self) -> Option<u64> {
        self.delegation_shares
    }

    pub fn bls_public_key(&self) -> Option<&str> {
        self.bls_public_key.as_deref()
    }

    pub fn bls_signature(&self) -> Option<&str> {
        self.bls_signature.as_deref()
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = self.config.frozen() {
            return Ok(tx.clone());
        }
        let params = &self.config.params;
        let validator = self.stake.validate(&self.config, params.min_validator_stake, false)?;
        let shares = check_delegation_fee(self.delegation_shares, params)?;
        let signer = ProofOfPossession {
            public_key: decode_fixed::<BLS_PUBLIC_KEY_LEN>(
                self.bls_public_key.as_deref(),
                "blsPublicKey",
            )?,
            signature: decode_fixed::<BLS_SIGNATURE_LEN>(
                self.bls_signature.as_deref(),
                "blsSignature",
            )?,
        };
        let rewards_owner = self.config.owners(&self.stake.reward_addresses)?;
        let parts = assemble_stake(&self.config, validator.weight)?;

        let unsigned = UnsignedTx::AddPermissionlessValidator(AddPermissionlessValidatorTx {
            base: parts.base,
            validator,
            subnet_id: Id::default(),
            signer,
            stake: parts.stake,
            validator_rewards_owner: rewards_owner.clone(),
            delegator_rewards_owner: rewards_owner,
            shares,
        });
        Ok(Transaction::new(unsigned, parts.credentials, Fee::fixed(params.tx_fee)))
    }
}

impl BuildCommon for PermissionlessValidatorBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

impl StakeCommon for PermissionlessValidatorBuilder {
    fn stake_fields(&self) -> &StakeFields {
        &self.stake
    }

    fn stake_fields_mut(&mut self) -> &mut StakeFields {
        &mut self.stake
    }
}

// ─── Permissionless Delegator ───────────────────────────────────────────────

/// Primary-network delegator in the permissionless format.
#[derive(Debug, Clone)]
pub struct PermissionlessDelegatorBuilder {
    config: BuilderConfig,
    stake: StakeFields,
}

impl PermissionlessDelegatorBuilder {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            config: BuilderConfig::new(params),
            stake: StakeFields::default(),
        }
    }

    pub fn from_tx(params: NetworkParams, tx: Transaction) -> Result<Self, TxError> {
        let UnsignedTx::AddPermissionlessDelegator(body) = &tx.unsigned else {
            return Err(wrong_kind("add permissionless delegator", &tx));
        };
        let stake = StakeFields::from_validator(&body.validator, &body.rewards_owner.addresses);
        Ok(Self {
            config: BuilderConfig::from_existing(params, tx)?,
            stake,
        })
    }

    pub fn build(&self) -> Result<Transaction, TxError> {
        if let Some(tx) = self.config.frozen() {
            return Ok(tx.clone());
        }
        let params = &self.config.params;
        let validator = self.stake.validate(&self.config, params.min_delegator_stake, false)?;
        let rewards_owner = self.config.owners(&self.stake.reward_addresses)?;
        let parts = assemble_stake(&self.config, validator.weight)?;

        let unsigned = UnsignedTx::AddPermissionlessDelegator(AddPermissionlessDelegatorTx {
            base: parts.base,
            validator,
            subnet_id: Id::default(),
            stake: parts.stake,
            rewards_owner,
        });
        Ok(Transaction::new(unsigned, parts.credentials, Fee::fixed(params.tx_fee)))
    }
}

impl BuildCommon for PermissionlessDelegatorBuilder {
    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }
}

impl StakeCommon for PermissionlessDelegatorBuilder {
    fn stake_fields(&self) -> &StakeFields {
        &self.stake
    }

    fn stake_fields_mut(&mut self) -> &mut StakeFields {
        &mut self.stake
    }
}

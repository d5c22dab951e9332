//! State types of the stake pool program, decoded client side

use {
    crate::{
        borsh::{try_from_slice_strict, try_from_slice_unchecked},
        error::{Result, StakePoolClientError},
        find_stake_program_address, find_transient_stake_program_address,
    },
    borsh::{BorshDeserialize, BorshSerialize},
    solana_program::{
        clock::{Epoch, UnixTimestamp},
        pubkey::Pubkey,
    },
};

/// Enum representing the account type managed by the program
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub enum AccountType {
    /// If the account has not been initialized, the enum will be 0
    #[default]
    Uninitialized,
    /// Stake pool
    StakePool,
    /// Validator stake list
    ValidatorList,
}

/// Fee rate as a ratio, minted on deposits and withdrawals
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct Fee {
    /// denominator of the fee ratio
    pub denominator: u64,
    /// numerator of the fee ratio
    pub numerator: u64,
}

impl Fee {
    /// Applies the fee ratio to an amount, rounding down. A zero denominator
    /// means no fee.
    pub fn apply(&self, amount: u64) -> Option<u64> {
        if self.denominator == 0 {
            return Some(0);
        }
        u64::try_from(
            (amount as u128)
                .checked_mul(self.numerator as u128)?
                .checked_div(self.denominator as u128)?,
        )
        .ok()
    }
}

/// Lockup that all stakes in the pool must have.
///
/// The program stores `unix_timestamp` as a signed 64-bit value; the byte
/// layout is identical to an unsigned read, only the interpretation differs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct Lockup {
    /// UnixTimestamp at which this stake will allow withdrawal, unless the
    /// transaction is signed by the custodian
    pub unix_timestamp: UnixTimestamp,
    /// epoch height at which this stake will allow withdrawal, unless the
    /// transaction is signed by the custodian
    pub epoch: Epoch,
    /// custodian signature on a transaction exempts the operation from
    /// lockup constraints
    pub custodian: Pubkey,
}

/// Initialized program details.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct StakePool {
    /// Account type, must be StakePool currently
    pub account_type: AccountType,

    /// Manager authority, allows for updating the staker, manager, and fee
    /// account
    pub manager: Pubkey,

    /// Staker authority, allows for adding and removing validators, and
    /// managing stake distribution
    pub staker: Pubkey,

    /// Stake deposit authority, defaults to the program address derived from
    /// `[stake_pool_address, "deposit"]`
    pub stake_deposit_authority: Pubkey,

    /// Stake withdrawal authority bump seed
    /// for `create_program_address(&[state::StakePool account, "withdraw"])`
    pub stake_withdraw_bump_seed: u8,

    /// Validator stake list storage account
    pub validator_list: Pubkey,

    /// Reserve stake account, holds deactivated stake
    pub reserve_stake: Pubkey,

    /// Pool Mint
    pub pool_mint: Pubkey,

    /// Manager fee account
    pub manager_fee_account: Pubkey,

    /// Pool token program id
    pub token_program_id: Pubkey,

    /// Total stake under management.
    /// Note that if `last_update_epoch` does not match the current epoch then
    /// this field may not be accurate
    pub total_lamports: u64,

    /// Total supply of pool tokens (should always match the supply in the Pool
    /// Mint)
    pub pool_token_supply: u64,

    /// Last epoch the `total_lamports` field was updated
    pub last_update_epoch: u64,

    /// Lockup that all stakes in the pool must have
    pub lockup: Lockup,

    /// Fee taken as a proportion of rewards each epoch
    pub epoch_fee: Fee,

    /// Fee for next epoch
    pub next_epoch_fee: Option<Fee>,

    /// Preferred deposit validator vote account pubkey
    pub preferred_deposit_validator_vote_address: Option<Pubkey>,

    /// Preferred withdraw validator vote account pubkey
    pub preferred_withdraw_validator_vote_address: Option<Pubkey>,

    /// Fee assessed on stake deposits
    pub stake_deposit_fee: Fee,

    /// Fee assessed on withdrawals
    pub stake_withdrawal_fee: Fee,

    /// Future stake withdrawal fee, to be set for the following epoch
    pub next_stake_withdrawal_fee: Option<Fee>,

    /// Percentage (0 - 100) of stake deposit fees paid out to referrers
    pub stake_referral_fee: u8,

    /// If set, `DepositSol` requires a signature from this authority
    pub sol_deposit_authority: Option<Pubkey>,

    /// Fee assessed on SOL deposits
    pub sol_deposit_fee: Fee,

    /// Percentage (0 - 100) of SOL deposit fees paid out to referrers
    pub sol_referral_fee: u8,
}

impl StakePool {
    /// Decodes stake pool account data, ignoring trailing bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        try_from_slice_unchecked(data)
    }

    /// Decodes stake pool account data, rejecting trailing bytes
    pub fn decode_strict(data: &[u8]) -> Result<Self> {
        try_from_slice_strict(data)
    }

    /// Encodes the stake pool with the program's byte layout
    pub fn encode(&self) -> Result<Vec<u8>> {
        borsh::to_vec(self).map_err(|err| StakePoolClientError::SchemaMismatch(err.to_string()))
    }

    /// Check if StakePool is actually initialized as a stake pool
    pub fn is_valid(&self) -> bool {
        self.account_type == AccountType::StakePool
    }

    /// Pool balances are only meaningful once updated for the current epoch
    pub fn is_up_to_date(&self, current_epoch: Epoch) -> bool {
        self.last_update_epoch == current_epoch
    }

    /// Fails unless the pool was updated in `current_epoch`
    pub fn check_up_to_date(&self, current_epoch: Epoch) -> Result<()> {
        if self.is_up_to_date(current_epoch) {
            Ok(())
        } else {
            Err(StakePoolClientError::StakePoolNotUpdated {
                last_update_epoch: self.last_update_epoch,
                current_epoch,
            })
        }
    }

    /// calculate the pool tokens that should be minted for a deposit of
    /// `stake_lamports`
    pub fn calc_pool_tokens_for_deposit(&self, stake_lamports: u64) -> Option<u64> {
        if self.total_lamports == 0 || self.pool_token_supply == 0 {
            return Some(stake_lamports);
        }
        u64::try_from(
            (stake_lamports as u128)
                .checked_mul(self.pool_token_supply as u128)?
                .checked_div(self.total_lamports as u128)?,
        )
        .ok()
    }

    /// calculate lamports amount on withdrawal
    pub fn calc_lamports_withdraw_amount(&self, pool_tokens: u64) -> Option<u64> {
        let numerator = (pool_tokens as u128).checked_mul(self.total_lamports as u128)?;
        let denominator = self.pool_token_supply as u128;
        if denominator == 0 || numerator < denominator {
            Some(0)
        } else {
            u64::try_from(numerator.checked_div(denominator)?).ok()
        }
    }

    /// calculate the pool tokens that `lamports` of stake are worth, rounding
    /// down. An empty pool converts to zero.
    pub fn calc_pool_tokens_for_lamports(&self, lamports: u64) -> Option<u64> {
        if self.total_lamports == 0 {
            return Some(0);
        }
        u64::try_from(
            (lamports as u128)
                .checked_mul(self.pool_token_supply as u128)?
                .checked_div(self.total_lamports as u128)?,
        )
        .ok()
    }
}

/// Storage list for all validator stake accounts in the pool.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct ValidatorList {
    /// Data outside of the validator list, separated out for cheaper
    /// deserializations
    pub header: ValidatorListHeader,

    /// List of stake info for each validator in the pool
    pub validators: Vec<ValidatorStakeInfo>,
}

/// Helper type to deserialize just the start of a ValidatorList
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct ValidatorListHeader {
    /// Account type, must be ValidatorList currently
    pub account_type: AccountType,

    /// Maximum allowable number of validators
    pub max_validators: u32,
}

/// Status of the stake account in the validator list, for accounting
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub enum StakeStatus {
    /// Stake account is active, there may be a transient stake as well
    #[default]
    Active,
    /// Only transient stake account exists, when a transient stake is
    /// deactivating during validator removal
    DeactivatingTransient,
    /// No more validator stake accounts exist, entry ready for removal during
    /// `UpdateStakePoolBalance`
    ReadyForRemoval,
}

/// Information about a validator in the pool
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct ValidatorStakeInfo {
    /// Amount of active stake delegated to this validator, minus the minimum
    /// required stake amount of rent-exemption + `crate::MINIMUM_STAKE_BALANCE`
    pub active_stake_lamports: u64,

    /// Amount of transient stake delegated to this validator
    pub transient_stake_lamports: u64,

    /// Last epoch the active and transient stake lamports fields were updated
    pub last_update_epoch: u64,

    /// Status of the validator stake account
    pub status: StakeStatus,

    /// Validator vote account address
    pub vote_account_address: Pubkey,
}

impl ValidatorStakeInfo {
    /// Packed length of a single entry
    pub const LEN: usize = 8 + 8 + 8 + 1 + 32;

    /// Get the total lamports delegated to this validator (active and
    /// transient)
    pub fn stake_lamports(&self) -> u64 {
        self.active_stake_lamports
            .saturating_add(self.transient_stake_lamports)
    }

    /// Address of the validator stake account owned by the pool
    pub fn stake_address(&self, program_id: &Pubkey, stake_pool_address: &Pubkey) -> Pubkey {
        find_stake_program_address(program_id, &self.vote_account_address, stake_pool_address).0
    }

    /// Address of the transient stake account used while stake moves
    pub fn transient_stake_address(
        &self,
        program_id: &Pubkey,
        stake_pool_address: &Pubkey,
    ) -> Pubkey {
        find_transient_stake_program_address(
            program_id,
            &self.vote_account_address,
            stake_pool_address,
        )
        .0
    }
}

impl ValidatorList {
    /// Create an empty instance containing space for `max_validators`
    pub fn new(max_validators: u32) -> Self {
        Self {
            header: ValidatorListHeader {
                account_type: AccountType::ValidatorList,
                max_validators,
            },
            validators: Vec::with_capacity(max_validators as usize),
        }
    }

    /// Calculate the number of validator entries that fit in the provided
    /// length
    pub fn calculate_max_validators(buffer_length: usize) -> usize {
        let header_size = 1 + 4 + 4;
        buffer_length.saturating_sub(header_size) / ValidatorStakeInfo::LEN
    }

    /// Get the byte size for a list containing up to `max_validators`
    pub fn size_with_max_validators(max_validators: usize) -> usize {
        1 + 4 + 4 + ValidatorStakeInfo::LEN * max_validators
    }

    /// Decodes validator list account data, ignoring the unused tail of the
    /// allocation
    pub fn decode(data: &[u8]) -> Result<Self> {
        try_from_slice_unchecked(data)
    }

    /// Decodes validator list account data, rejecting trailing bytes
    pub fn decode_strict(data: &[u8]) -> Result<Self> {
        try_from_slice_strict(data)
    }

    /// Encodes the validator list with the program's byte layout
    pub fn encode(&self) -> Result<Vec<u8>> {
        borsh::to_vec(self).map_err(|err| StakePoolClientError::SchemaMismatch(err.to_string()))
    }

    /// Check if contains validator with particular pubkey
    pub fn contains(&self, vote_account_address: &Pubkey) -> bool {
        self.find(vote_account_address).is_some()
    }

    /// Check if contains validator with particular pubkey
    pub fn find(&self, vote_account_address: &Pubkey) -> Option<&ValidatorStakeInfo> {
        self.validators
            .iter()
            .find(|x| x.vote_account_address == *vote_account_address)
    }

    /// Check if validator stake list is actually initialized as a validator
    /// stake list
    pub fn is_valid(&self) -> bool {
        self.header.account_type == AccountType::ValidatorList
    }
}

/// Any account owned by the stake pool program
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StakePoolAccount {
    /// Main pool account
    StakePool(Box<StakePool>),
    /// Validator list account
    ValidatorList(ValidatorList),
}

impl StakePoolAccount {
    /// Decodes account data by its leading account type, ignoring trailing
    /// bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let account_type: AccountType = try_from_slice_unchecked(data)?;
        match account_type {
            AccountType::StakePool => Ok(Self::StakePool(Box::new(StakePool::decode(data)?))),
            AccountType::ValidatorList => Ok(Self::ValidatorList(ValidatorList::decode(data)?)),
            AccountType::Uninitialized => Err(StakePoolClientError::SchemaMismatch(
                "uninitialized account".to_string(),
            )),
        }
    }

    /// Encodes the account with the program's byte layout
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::StakePool(stake_pool) => stake_pool.encode(),
            Self::ValidatorList(validator_list) => validator_list.encode(),
        }
    }
}

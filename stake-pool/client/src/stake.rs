//! Native stake accounts as seen by the pool client

use {
    crate::error::{Result, StakePoolClientError},
    solana_program::{
        pubkey::Pubkey,
        stake::state::{Delegation, Meta, StakeStateV2},
    },
};

/// Offset of the staker authority in stake account data
pub const STAKE_ACCOUNT_STAKER_OFFSET: usize = 12;

/// Offset of the withdrawer authority in stake account data, used as a
/// memcmp filter to find every stake account the pool controls
pub const STAKE_ACCOUNT_WITHDRAWER_OFFSET: usize = 44;

/// A native stake account fetched from the ledger, with its balance
#[derive(Clone, Debug, PartialEq)]
pub struct NativeStakeAccount {
    /// Address of the stake account
    pub address: Pubkey,
    /// Total balance, including the rent-exempt reserve
    pub lamports: u64,
    /// Authorities and lockup, absent for uninitialized accounts
    pub meta: Option<Meta>,
    /// Delegation, absent unless the account is delegated
    pub delegation: Option<Delegation>,
}

impl NativeStakeAccount {
    /// Build from an already parsed stake state
    pub fn new(address: Pubkey, lamports: u64, stake_state: &StakeStateV2) -> Self {
        Self {
            address,
            lamports,
            meta: stake_state.meta(),
            delegation: stake_state.delegation(),
        }
    }

    /// Parse raw stake account data
    pub fn from_account_data(address: Pubkey, lamports: u64, data: &[u8]) -> Result<Self> {
        let stake_state: StakeStateV2 = bincode::deserialize(data).map_err(|err| {
            StakePoolClientError::DecodeError(format!(
                "Invalid stake account {}: {}",
                address, err
            ))
        })?;
        Ok(Self::new(address, lamports, &stake_state))
    }

    /// Authority allowed to delegate and deactivate
    pub fn staker(&self) -> Option<Pubkey> {
        self.meta.map(|meta| meta.authorized.staker)
    }

    /// Authority allowed to withdraw and split
    pub fn withdrawer(&self) -> Option<Pubkey> {
        self.meta.map(|meta| meta.authorized.withdrawer)
    }

    /// Vote account the stake is delegated to
    pub fn voter(&self) -> Option<Pubkey> {
        self.delegation.map(|delegation| delegation.voter_pubkey)
    }

    /// Rent-exempt reserve recorded in the account
    pub fn rent_exempt_reserve(&self) -> Option<u64> {
        self.meta.map(|meta| meta.rent_exempt_reserve)
    }
}

/// Keep only the stake accounts whose withdrawer is `withdraw_authority`
pub fn filter_by_withdraw_authority(
    accounts: Vec<NativeStakeAccount>,
    withdraw_authority: &Pubkey,
) -> Vec<NativeStakeAccount> {
    accounts
        .into_iter()
        .filter(|account| account.withdrawer().as_ref() == Some(withdraw_authority))
        .collect()
}

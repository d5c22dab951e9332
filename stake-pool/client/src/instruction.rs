//! Instruction types

#![allow(clippy::too_many_arguments)]

use {
    crate::{
        error::{Result, StakePoolClientError},
        find_stake_program_address, find_transient_stake_program_address,
    },
    solana_program::{
        instruction::{AccountMeta, Instruction},
        pubkey::Pubkey,
        stake, system_program, sysvar,
    },
};

/// Address of the native stake config account
pub const STAKE_CONFIG_ID: Pubkey =
    solana_program::pubkey!("StakeConfig11111111111111111111111111111111");

/// Instructions of the StakePool program that this client can build.
/// Discriminants follow the program's instruction table.
#[repr(C)]
#[derive(Clone, Debug, PartialEq)]
pub enum StakePoolInstruction {
    ///   (Staker only) Increase stake on a validator from the reserve account
    ///
    ///   0. `[]` Stake pool
    ///   1. `[s]` Stake pool staker
    ///   2. `[]` Stake pool withdraw authority
    ///   3. `[w]` Validator list
    ///   4. `[w]` Stake pool reserve stake
    ///   5. `[w]` Transient stake account
    ///   6. `[]` Validator vote account to delegate to
    ///   7. `[]` Clock sysvar
    ///   8. `[]` Rent sysvar
    ///   9. `[]` Stake History sysvar
    ///  10. `[]` Stake Config sysvar
    ///  11. `[]` System program
    ///  12. `[]` Stake program
    ///   userdata: lamports to increase stake by
    IncreaseValidatorStake(u64),

    ///  Updates balances of validator and transient stake accounts in the pool
    ///
    ///  0. `[]` Stake pool
    ///  1. `[]` Stake pool withdraw authority
    ///  2. `[w]` Validator stake list storage account
    ///  3. `[w]` Reserve stake account
    ///  4. `[]` Sysvar clock
    ///  5. `[]` Sysvar stake history
    ///  6. `[]` Stake program
    ///  7. ..7+2N ` [] N pairs of validator and transient stake accounts
    UpdateValidatorListBalance {
        /// Index to start updating on the validator list
        start_index: u32,
        /// If true, don't try merging transient stake accounts into the reserve
        /// or validator stake account
        no_merge: bool,
    },

    ///   Updates total pool balance based on balances in the reserve and
    ///   validator list
    ///
    ///   0. `[w]` Stake pool
    ///   1. `[]` Stake pool withdraw authority
    ///   2. `[w]` Validator stake list storage account
    ///   3. `[]` Reserve stake account
    ///   4. `[w]` Account to receive pool fee tokens
    ///   5. `[w]` Pool mint account
    ///   6. `[]` Sysvar clock
    ///   7. `[]` Pool token program
    UpdateStakePoolBalance,

    ///   Cleans up validator stake account entries marked as `ReadyForRemoval`
    ///
    ///   0. `[]` Stake pool
    ///   1. `[w]` Validator stake list storage account
    CleanupRemovedValidatorEntries,

    ///   Deposit some stake into the pool. The output is a "pool" token
    ///   representing ownership into the pool. Inputs are converted to the
    ///   current ratio.
    ///
    ///   0. `[w]` Stake pool
    ///   1. `[w]` Validator stake list storage account
    ///   2. `[]` Stake pool deposit authority
    ///   3. `[]` Stake pool withdraw authority
    ///   4. `[w]` Stake account to join the pool (withdraw authority for the
    ///      stake account should be first set to the stake pool deposit
    ///      authority)
    ///   5. `[w]` Validator stake account for the stake account to be merged
    ///      with
    ///   6. `[w]` Reserve stake account, to withdraw rent exempt reserve
    ///   7. `[w]` User account to receive pool tokens
    ///   8. `[w]` Account to receive pool fee tokens
    ///   9. `[w]` Account to receive a portion of pool fee tokens as referral
    ///      fees
    ///  10. `[w]` Pool token mint account
    ///  11. `[]` Sysvar clock account
    ///  12. `[]` Sysvar stake history account
    ///  13. `[]` Pool token program id
    ///  14. `[]` Stake program id
    DepositStake,

    ///   Withdraw the token from the pool at the current ratio.
    ///
    ///   0. `[w]` Stake pool
    ///   1. `[w]` Validator stake list storage account
    ///   2. `[]` Stake pool withdraw authority
    ///   3. `[w]` Validator or reserve stake account to split
    ///   4. `[w]` Uninitialized stake account to receive withdrawal
    ///   5. `[]` User account to set as a new withdraw authority
    ///   6. `[s]` User transfer authority, for pool token account
    ///   7. `[w]` User account with pool tokens to burn from
    ///   8. `[w]` Account to receive pool fee tokens
    ///   9. `[w]` Pool token mint account
    ///  10. `[]` Sysvar clock account
    ///  11. `[]` Pool token program id
    ///  12. `[]` Stake program id
    ///   userdata: amount of pool tokens to withdraw
    WithdrawStake(u64),

    ///   Deposit SOL directly into the pool's reserve account. The output is a
    ///   "pool" token representing ownership into the pool. Inputs are
    ///   converted to the current ratio.
    ///
    ///   0. `[w]` Stake pool
    ///   1. `[]` Stake pool withdraw authority
    ///   2. `[w]` Reserve stake account, to deposit SOL
    ///   3. `[s]` Account providing the lamports to be deposited into the pool
    ///   4. `[w]` User account to receive pool tokens
    ///   5. `[w]` Account to receive pool fee tokens
    ///   6. `[w]` Account to receive a portion of pool fee tokens as referral
    ///      fees
    ///   7. `[w]` Pool token mint account
    ///   8. `[]` Sysvar clock account
    ///   9. `[]` System program account
    ///  10. `[]` Pool token program id
    ///  11. `[s]` (Optional) Stake pool sol deposit authority
    ///   userdata: amount of lamports to deposit
    DepositSol(u64),
}

impl StakePoolInstruction {
    /// Opcode of `IncreaseValidatorStake`
    pub const INCREASE_VALIDATOR_STAKE: u8 = 5;
    /// Opcode of `UpdateValidatorListBalance`
    pub const UPDATE_VALIDATOR_LIST_BALANCE: u8 = 7;
    /// Opcode of `UpdateStakePoolBalance`
    pub const UPDATE_STAKE_POOL_BALANCE: u8 = 8;
    /// Opcode of `CleanupRemovedValidatorEntries`
    pub const CLEANUP_REMOVED_VALIDATOR_ENTRIES: u8 = 9;
    /// Opcode of `DepositStake`
    pub const DEPOSIT_STAKE: u8 = 10;
    /// Opcode of `WithdrawStake`
    pub const WITHDRAW_STAKE: u8 = 11;
    /// Opcode of `DepositSol`
    pub const DEPOSIT_SOL: u8 = 15;

    /// Opcode selecting this instruction in the program
    pub fn opcode(&self) -> u8 {
        match self {
            Self::IncreaseValidatorStake(_) => Self::INCREASE_VALIDATOR_STAKE,
            Self::UpdateValidatorListBalance { .. } => Self::UPDATE_VALIDATOR_LIST_BALANCE,
            Self::UpdateStakePoolBalance => Self::UPDATE_STAKE_POOL_BALANCE,
            Self::CleanupRemovedValidatorEntries => Self::CLEANUP_REMOVED_VALIDATOR_ENTRIES,
            Self::DepositStake => Self::DEPOSIT_STAKE,
            Self::WithdrawStake(_) => Self::WITHDRAW_STAKE,
            Self::DepositSol(_) => Self::DEPOSIT_SOL,
        }
    }

    /// Packs the instruction into the byte buffer the program expects:
    /// opcode followed by little-endian fields
    pub fn pack(&self) -> Vec<u8> {
        let mut output = vec![self.opcode()];
        match self {
            Self::IncreaseValidatorStake(amount)
            | Self::WithdrawStake(amount)
            | Self::DepositSol(amount) => {
                output.extend_from_slice(&amount.to_le_bytes());
            }
            Self::UpdateValidatorListBalance {
                start_index,
                no_merge,
            } => {
                output.extend_from_slice(&start_index.to_le_bytes());
                output.push(u8::from(*no_merge));
            }
            Self::UpdateStakePoolBalance
            | Self::CleanupRemovedValidatorEntries
            | Self::DepositStake => {}
        }
        output
    }

    /// Unpacks a byte buffer into a [StakePoolInstruction]
    pub fn unpack(input: &[u8]) -> Result<Self> {
        let (&opcode, rest) = input
            .split_first()
            .ok_or_else(|| StakePoolClientError::InvalidInstruction("empty".to_string()))?;
        let instruction = match opcode {
            Self::INCREASE_VALIDATOR_STAKE => Self::IncreaseValidatorStake(unpack_u64(rest)?),
            Self::UPDATE_VALIDATOR_LIST_BALANCE => {
                let start_index = rest
                    .get(..4)
                    .and_then(|slice| slice.try_into().ok())
                    .map(u32::from_le_bytes)
                    .ok_or_else(|| short_input(opcode))?;
                let no_merge = match rest.get(4) {
                    Some(0) => false,
                    Some(1) => true,
                    Some(flag) => {
                        return Err(StakePoolClientError::InvalidInstruction(format!(
                            "invalid no_merge flag {}",
                            flag
                        )))
                    }
                    None => return Err(short_input(opcode)),
                };
                Self::UpdateValidatorListBalance {
                    start_index,
                    no_merge,
                }
            }
            Self::UPDATE_STAKE_POOL_BALANCE => Self::UpdateStakePoolBalance,
            Self::CLEANUP_REMOVED_VALIDATOR_ENTRIES => Self::CleanupRemovedValidatorEntries,
            Self::DEPOSIT_STAKE => Self::DepositStake,
            Self::WITHDRAW_STAKE => Self::WithdrawStake(unpack_u64(rest)?),
            Self::DEPOSIT_SOL => Self::DepositSol(unpack_u64(rest)?),
            _ => {
                return Err(StakePoolClientError::InvalidInstruction(format!(
                    "unsupported opcode {}",
                    opcode
                )))
            }
        };
        Ok(instruction)
    }
}

fn short_input(opcode: u8) -> StakePoolClientError {
    StakePoolClientError::InvalidInstruction(format!("data too short for opcode {}", opcode))
}

fn unpack_u64(input: &[u8]) -> Result<u64> {
    input
        .get(..8)
        .and_then(|slice| slice.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| StakePoolClientError::InvalidInstruction("expected u64".to_string()))
}

/// Creates `IncreaseValidatorStake` instruction (rebalance from reserve
/// account to transient account)
pub fn increase_validator_stake(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    staker: &Pubkey,
    stake_pool_withdraw_authority: &Pubkey,
    validator_list: &Pubkey,
    reserve_stake: &Pubkey,
    transient_stake: &Pubkey,
    validator: &Pubkey,
    lamports: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*stake_pool, false),
        AccountMeta::new_readonly(*staker, true),
        AccountMeta::new_readonly(*stake_pool_withdraw_authority, false),
        AccountMeta::new(*validator_list, false),
        AccountMeta::new(*reserve_stake, false),
        AccountMeta::new(*transient_stake, false),
        AccountMeta::new_readonly(*validator, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(sysvar::stake_history::id(), false),
        AccountMeta::new_readonly(STAKE_CONFIG_ID, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(stake::program::id(), false),
    ];
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::IncreaseValidatorStake(lamports).pack(),
    }
}

/// Creates `UpdateValidatorListBalance` instruction (update validator stake
/// account balances) for a contiguous chunk of the validator list
pub fn update_validator_list_balance(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    stake_pool_withdraw_authority: &Pubkey,
    validator_list_address: &Pubkey,
    reserve_stake: &Pubkey,
    validator_vote_accounts: &[Pubkey],
    start_index: u32,
    no_merge: bool,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new_readonly(*stake_pool, false),
        AccountMeta::new_readonly(*stake_pool_withdraw_authority, false),
        AccountMeta::new(*validator_list_address, false),
        AccountMeta::new(*reserve_stake, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::stake_history::id(), false),
        AccountMeta::new_readonly(stake::program::id(), false),
    ];
    accounts.append(
        &mut validator_vote_accounts
            .iter()
            .flat_map(|vote_account_address| {
                let (validator_stake_account, _) =
                    find_stake_program_address(program_id, vote_account_address, stake_pool);
                let (transient_stake_account, _) = find_transient_stake_program_address(
                    program_id,
                    vote_account_address,
                    stake_pool,
                );
                vec![
                    AccountMeta::new(validator_stake_account, false),
                    AccountMeta::new(transient_stake_account, false),
                ]
            })
            .collect::<Vec<AccountMeta>>(),
    );
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::UpdateValidatorListBalance {
            start_index,
            no_merge,
        }
        .pack(),
    }
}

/// Creates `UpdateStakePoolBalance` instruction (pool balance from the stake
/// account list balances)
pub fn update_stake_pool_balance(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    withdraw_authority: &Pubkey,
    validator_list_storage: &Pubkey,
    reserve_stake: &Pubkey,
    manager_fee_account: &Pubkey,
    stake_pool_mint: &Pubkey,
    token_program_id: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*stake_pool, false),
        AccountMeta::new_readonly(*withdraw_authority, false),
        AccountMeta::new(*validator_list_storage, false),
        AccountMeta::new_readonly(*reserve_stake, false),
        AccountMeta::new(*manager_fee_account, false),
        AccountMeta::new(*stake_pool_mint, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::UpdateStakePoolBalance.pack(),
    }
}

/// Creates `CleanupRemovedValidatorEntries` instruction (removes entries from
/// the validator list)
pub fn cleanup_removed_validator_entries(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    validator_list_storage: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*stake_pool, false),
        AccountMeta::new(*validator_list_storage, false),
    ];
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::CleanupRemovedValidatorEntries.pack(),
    }
}

/// Creates a `DepositStake` instruction. The stake account must already be
/// authorized to the pool's deposit authority.
pub fn deposit_stake(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    validator_list_storage: &Pubkey,
    stake_pool_deposit_authority: &Pubkey,
    stake_pool_withdraw_authority: &Pubkey,
    deposit_stake_address: &Pubkey,
    validator_stake_account: &Pubkey,
    reserve_stake_account: &Pubkey,
    pool_tokens_to: &Pubkey,
    manager_fee_account: &Pubkey,
    referrer_pool_tokens_account: &Pubkey,
    pool_mint: &Pubkey,
    token_program_id: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*stake_pool, false),
        AccountMeta::new(*validator_list_storage, false),
        AccountMeta::new_readonly(*stake_pool_deposit_authority, false),
        AccountMeta::new_readonly(*stake_pool_withdraw_authority, false),
        AccountMeta::new(*deposit_stake_address, false),
        AccountMeta::new(*validator_stake_account, false),
        AccountMeta::new(*reserve_stake_account, false),
        AccountMeta::new(*pool_tokens_to, false),
        AccountMeta::new(*manager_fee_account, false),
        AccountMeta::new(*referrer_pool_tokens_account, false),
        AccountMeta::new(*pool_mint, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::stake_history::id(), false),
        AccountMeta::new_readonly(*token_program_id, false),
        AccountMeta::new_readonly(stake::program::id(), false),
    ];
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::DepositStake.pack(),
    }
}

/// Creates a `DepositSol` instruction. `sol_deposit_authority` must be given
/// when the pool requires one.
pub fn deposit_sol(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    stake_pool_withdraw_authority: &Pubkey,
    reserve_stake_account: &Pubkey,
    lamports_from: &Pubkey,
    pool_tokens_to: &Pubkey,
    manager_fee_account: &Pubkey,
    referrer_pool_tokens_account: &Pubkey,
    pool_mint: &Pubkey,
    token_program_id: &Pubkey,
    sol_deposit_authority: Option<&Pubkey>,
    lamports: u64,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(*stake_pool, false),
        AccountMeta::new_readonly(*stake_pool_withdraw_authority, false),
        AccountMeta::new(*reserve_stake_account, false),
        AccountMeta::new(*lamports_from, true),
        AccountMeta::new(*pool_tokens_to, false),
        AccountMeta::new(*manager_fee_account, false),
        AccountMeta::new(*referrer_pool_tokens_account, false),
        AccountMeta::new(*pool_mint, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    if let Some(sol_deposit_authority) = sol_deposit_authority {
        accounts.push(AccountMeta::new_readonly(*sol_deposit_authority, true));
    }
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::DepositSol(lamports).pack(),
    }
}

/// Creates a `WithdrawStake` instruction.
pub fn withdraw_stake(
    program_id: &Pubkey,
    stake_pool: &Pubkey,
    validator_list_storage: &Pubkey,
    stake_pool_withdraw: &Pubkey,
    stake_to_split: &Pubkey,
    stake_to_receive: &Pubkey,
    user_stake_authority: &Pubkey,
    user_transfer_authority: &Pubkey,
    user_pool_token_account: &Pubkey,
    manager_fee_account: &Pubkey,
    pool_mint: &Pubkey,
    token_program_id: &Pubkey,
    amount: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*stake_pool, false),
        AccountMeta::new(*validator_list_storage, false),
        AccountMeta::new_readonly(*stake_pool_withdraw, false),
        AccountMeta::new(*stake_to_split, false),
        AccountMeta::new(*stake_to_receive, false),
        AccountMeta::new_readonly(*user_stake_authority, false),
        AccountMeta::new_readonly(*user_transfer_authority, true),
        AccountMeta::new(*user_pool_token_account, false),
        AccountMeta::new(*manager_fee_account, false),
        AccountMeta::new(*pool_mint, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(*token_program_id, false),
        AccountMeta::new_readonly(stake::program::id(), false),
    ];
    Instruction {
        program_id: *program_id,
        accounts,
        data: StakePoolInstruction::WithdrawStake(amount).pack(),
    }
}

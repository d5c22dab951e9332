//! Deposit transactions: stake accounts and plain SOL

#![allow(clippy::too_many_arguments)]

use {
    crate::{
        error::{Result, StakePoolClientError},
        find_deposit_authority_program_address, find_stake_program_address,
        find_withdraw_authority_program_address,
        instruction::{deposit_sol, deposit_stake},
        stake::NativeStakeAccount,
        state::{StakePool, ValidatorList},
    },
    log::{debug, info},
    solana_program::{
        instruction::Instruction,
        pubkey::Pubkey,
        stake::{self, state::StakeAuthorize},
        system_instruction,
    },
    solana_sdk::signature::{Keypair, Signer},
};

/// Instructions moving a delegated stake account into the pool. The stake
/// account's current authority must sign.
///
/// The account must be delegated to a validator that is part of the pool.
/// `referrer_pool_tokens_account` defaults to `pool_tokens_to`.
pub fn deposit_stake_with_authorize(
    program_id: &Pubkey,
    stake_pool_address: &Pubkey,
    stake_pool: &StakePool,
    validator_list: &ValidatorList,
    deposit_stake_account: &NativeStakeAccount,
    deposit_stake_authority: &Pubkey,
    pool_tokens_to: &Pubkey,
    referrer_pool_tokens_account: Option<&Pubkey>,
) -> Result<Vec<Instruction>> {
    let vote_account = deposit_stake_account
        .voter()
        .ok_or(StakePoolClientError::InvalidStakeAccount(
            deposit_stake_account.address,
        ))?;
    if !validator_list.contains(&vote_account) {
        debug!(
            "Vote account {} of stake account {} is not in the pool",
            vote_account, deposit_stake_account.address
        );
        return Err(StakePoolClientError::InvalidStakeAccount(
            deposit_stake_account.address,
        ));
    }

    let (deposit_authority, _) =
        find_deposit_authority_program_address(program_id, stake_pool_address);
    let (withdraw_authority, _) =
        find_withdraw_authority_program_address(program_id, stake_pool_address);
    let (validator_stake_account, _) =
        find_stake_program_address(program_id, &vote_account, stake_pool_address);

    info!(
        "Depositing stake account {} into validator stake account {}",
        deposit_stake_account.address, validator_stake_account
    );

    Ok(vec![
        stake::instruction::authorize(
            &deposit_stake_account.address,
            deposit_stake_authority,
            &deposit_authority,
            StakeAuthorize::Staker,
            None,
        ),
        stake::instruction::authorize(
            &deposit_stake_account.address,
            deposit_stake_authority,
            &deposit_authority,
            StakeAuthorize::Withdrawer,
            None,
        ),
        deposit_stake(
            program_id,
            stake_pool_address,
            &stake_pool.validator_list,
            &deposit_authority,
            &withdraw_authority,
            &deposit_stake_account.address,
            &validator_stake_account,
            &stake_pool.reserve_stake,
            pool_tokens_to,
            &stake_pool.manager_fee_account,
            referrer_pool_tokens_account.unwrap_or(pool_tokens_to),
            &stake_pool.pool_mint,
            &stake_pool.token_program_id,
        ),
    ])
}

/// SOL deposit instructions with the ephemeral account that must co-sign
#[derive(Debug)]
pub struct DepositSolInstructions {
    /// Transfer to the ephemeral account, then the deposit
    pub instructions: Vec<Instruction>,
    /// Account funding the deposit
    pub ephemeral_keypair: Keypair,
}

/// Instructions depositing `lamports` from `from` into the pool reserve.
/// The lamports transit through a fresh ephemeral account.
///
/// If the pool restricts SOL deposits, its `sol_deposit_authority` is added
/// as a signer and must sign as well.
pub fn deposit_sol_with_transfer(
    program_id: &Pubkey,
    stake_pool_address: &Pubkey,
    stake_pool: &StakePool,
    from: &Pubkey,
    pool_tokens_to: &Pubkey,
    referrer_pool_tokens_account: Option<&Pubkey>,
    lamports: u64,
) -> Result<DepositSolInstructions> {
    if lamports == 0 {
        return Err(StakePoolClientError::InvalidAmount);
    }

    let (withdraw_authority, _) =
        find_withdraw_authority_program_address(program_id, stake_pool_address);
    let ephemeral_keypair = Keypair::new();

    info!(
        "Depositing {} lamports into stake pool {} through {}",
        lamports,
        stake_pool_address,
        ephemeral_keypair.pubkey()
    );

    let instructions = vec![
        system_instruction::transfer(from, &ephemeral_keypair.pubkey(), lamports),
        deposit_sol(
            program_id,
            stake_pool_address,
            &withdraw_authority,
            &stake_pool.reserve_stake,
            &ephemeral_keypair.pubkey(),
            pool_tokens_to,
            &stake_pool.manager_fee_account,
            referrer_pool_tokens_account.unwrap_or(pool_tokens_to),
            &stake_pool.pool_mint,
            &stake_pool.token_program_id,
            stake_pool.sol_deposit_authority.as_ref(),
            lamports,
        ),
    ];

    Ok(DepositSolInstructions {
        instructions,
        ephemeral_keypair,
    })
}

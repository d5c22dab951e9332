//! Delegation of idle reserve lamports to a validator near the end of an
//! epoch

use {
    crate::{
        config::StakePoolConfig,
        error::{Result, StakePoolClientError},
        find_stake_program_address, find_withdraw_authority_program_address,
        instruction::increase_validator_stake,
        state::{StakePool, ValidatorList},
        MINIMUM_STAKE_BALANCE,
    },
    log::{debug, info},
    solana_program::{instruction::Instruction, pubkey::Pubkey},
};

/// Lamports to move from the reserve to a validator, if any.
///
/// Nothing is planned until at most `slots_left_threshold` slots remain in
/// the epoch. The reserve keeps two rent-exempt reserves plus
/// `MINIMUM_STAKE_BALANCE`, one for itself and one for the new transient
/// stake account.
pub fn plan_reserve_increase(
    reserve_lamports: u64,
    stake_rent_exempt_lamports: u64,
    slots_in_epoch: u64,
    slot_index: u64,
    slots_left_threshold: u64,
) -> Option<u64> {
    if slots_in_epoch.saturating_sub(slot_index) > slots_left_threshold {
        return None;
    }
    let minimum_reserve_balance = stake_rent_exempt_lamports
        .checked_mul(2)?
        .checked_add(MINIMUM_STAKE_BALANCE)?;
    reserve_lamports
        .checked_sub(minimum_reserve_balance)
        .filter(|lamports| *lamports > 0)
}

/// Creates the `IncreaseValidatorStake` instruction moving `lamports` from
/// the reserve to `vote_account`'s transient stake account. The pool staker
/// must sign.
///
/// Returns no instruction while the validator still has transient stake,
/// since only one transient account may exist at a time.
pub fn increase_validator_stake_instructions(
    program_id: &Pubkey,
    stake_pool_address: &Pubkey,
    stake_pool: &StakePool,
    validator_list: &ValidatorList,
    vote_account: &Pubkey,
    lamports: u64,
) -> Result<Vec<Instruction>> {
    if lamports == 0 {
        return Err(StakePoolClientError::InvalidAmount);
    }
    let validator_stake_info = validator_list.find(vote_account).ok_or_else(|| {
        let (stake_address, _) =
            find_stake_program_address(program_id, vote_account, stake_pool_address);
        StakePoolClientError::InvalidStakeAccount(stake_address)
    })?;
    if validator_stake_info.transient_stake_lamports > 0 {
        info!(
            "Validator {} already has {} transient lamports, skipping increase",
            vote_account, validator_stake_info.transient_stake_lamports
        );
        return Ok(vec![]);
    }

    let (withdraw_authority, _) =
        find_withdraw_authority_program_address(program_id, stake_pool_address);
    let transient_stake_address =
        validator_stake_info.transient_stake_address(program_id, stake_pool_address);

    info!(
        "Increasing stake on validator {} by {} lamports",
        vote_account, lamports
    );
    Ok(vec![increase_validator_stake(
        program_id,
        stake_pool_address,
        &stake_pool.staker,
        &withdraw_authority,
        &stake_pool.validator_list,
        &stake_pool.reserve_stake,
        &transient_stake_address,
        vote_account,
        lamports,
    )])
}

/// Rebalance step for a configured pool: delegates the reserve surplus to
/// the configured vote account, or the pool's preferred deposit validator,
/// once the epoch is close enough to its end.
pub fn rebalance_instructions(
    config: &StakePoolConfig,
    stake_pool: &StakePool,
    validator_list: &ValidatorList,
    reserve_lamports: u64,
    stake_rent_exempt_lamports: u64,
    slots_in_epoch: u64,
    slot_index: u64,
) -> Result<Vec<Instruction>> {
    if config.disable_rebalance {
        debug!("Rebalance disabled");
        return Ok(vec![]);
    }
    let Some(vote_account) = config
        .preferred_vote_account
        .or(stake_pool.preferred_deposit_validator_vote_address)
    else {
        info!(
            "No preferred validator for stake pool {}, skipping rebalance",
            config.stake_pool_address
        );
        return Ok(vec![]);
    };

    match plan_reserve_increase(
        reserve_lamports,
        stake_rent_exempt_lamports,
        slots_in_epoch,
        slot_index,
        config.rebalance_slots_left,
    ) {
        Some(lamports) => increase_validator_stake_instructions(
            &config.program_id,
            &config.stake_pool_address,
            stake_pool,
            validator_list,
            &vote_account,
            lamports,
        ),
        None => {
            debug!(
                "Nothing to rebalance: reserve {} lamports, slot {} of {}",
                reserve_lamports, slot_index, slots_in_epoch
            );
            Ok(vec![])
        }
    }
}

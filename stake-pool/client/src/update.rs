//! Epoch update of a stake pool, split to fit the program's compute limits

use {
    crate::{
        error::{Result, StakePoolClientError},
        find_withdraw_authority_program_address,
        instruction::{
            cleanup_removed_validator_entries, update_stake_pool_balance,
            update_validator_list_balance,
        },
        state::{StakePool, ValidatorList},
        MAX_VALIDATORS_TO_UPDATE,
    },
    log::info,
    solana_program::{clock::Epoch, instruction::Instruction, pubkey::Pubkey},
};

/// Instructions needed to bring a pool up to date. The list updates must be
/// submitted and committed one after another, in index order, and all of them
/// must land before `final_instructions` are sent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateInstructions {
    /// One validator list balance update per chunk of validators, in list
    /// order. Each one must be committed before the next is submitted.
    pub update_list_instructions: Vec<Instruction>,
    /// Pool balance update followed by the list cleanup, the only
    /// instructions that may be sent together
    pub final_instructions: Vec<Instruction>,
}

impl UpdateInstructions {
    /// Nothing to send
    pub fn is_empty(&self) -> bool {
        self.update_list_instructions.is_empty() && self.final_instructions.is_empty()
    }
}

/// Creates all `UpdateValidatorListBalance` and `UpdateStakePoolBalance`
/// instructions for fully updating a stake pool each epoch. Returns no
/// instructions if the pool was already updated in `current_epoch`.
///
/// Each list update depends on the on-chain state left by the previous one:
/// submit them one at a time in the returned order, wait for each to commit,
/// then send the two final instructions together.
pub fn update_stake_pool(
    program_id: &Pubkey,
    stake_pool: &StakePool,
    validator_list: &ValidatorList,
    stake_pool_address: &Pubkey,
    current_epoch: Epoch,
    no_merge: bool,
) -> Result<UpdateInstructions> {
    if stake_pool.is_up_to_date(current_epoch) {
        info!(
            "Stake pool {} balances are up to date, no update required.",
            stake_pool_address
        );
        return Ok(UpdateInstructions::default());
    }

    let vote_accounts: Vec<Pubkey> = validator_list
        .validators
        .iter()
        .map(|item| item.vote_account_address)
        .collect();

    let (withdraw_authority, _) =
        find_withdraw_authority_program_address(program_id, stake_pool_address);

    let mut update_list_instructions = vec![];
    for (i, chunk) in vote_accounts.chunks(MAX_VALIDATORS_TO_UPDATE).enumerate() {
        let start_index = i
            .checked_mul(MAX_VALIDATORS_TO_UPDATE)
            .and_then(|index| u32::try_from(index).ok())
            .ok_or(StakePoolClientError::CalculationFailure)?;
        update_list_instructions.push(update_validator_list_balance(
            program_id,
            stake_pool_address,
            &withdraw_authority,
            &stake_pool.validator_list,
            &stake_pool.reserve_stake,
            chunk,
            start_index,
            no_merge,
        ));
    }

    let final_instructions = vec![
        update_stake_pool_balance(
            program_id,
            stake_pool_address,
            &withdraw_authority,
            &stake_pool.validator_list,
            &stake_pool.reserve_stake,
            &stake_pool.manager_fee_account,
            &stake_pool.pool_mint,
            &stake_pool.token_program_id,
        ),
        cleanup_removed_validator_entries(
            program_id,
            stake_pool_address,
            &stake_pool.validator_list,
        ),
    ];

    info!(
        "Updating stake pool {} from epoch {} to {}: {} validators in {} list updates",
        stake_pool_address,
        stake_pool.last_update_epoch,
        current_epoch,
        vote_accounts.len(),
        update_list_instructions.len(),
    );

    Ok(UpdateInstructions {
        update_list_instructions,
        final_instructions,
    })
}

#![deny(missing_docs)]

//! Client-side helpers for a pool of stake: account decoding, program
//! address derivation, withdrawal planning and instruction assembly

pub mod borsh;
pub mod config;
pub mod deposit;
pub mod error;
pub mod instruction;
pub mod rebalance;
pub mod stake;
pub mod state;
pub mod update;
pub mod withdraw;

// Export current sdk types for downstream users building with a different sdk
// version
pub use solana_program;
use solana_program::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

/// Seed for deposit authority seed
const AUTHORITY_DEPOSIT: &[u8] = b"deposit";

/// Seed for withdraw authority seed
const AUTHORITY_WITHDRAW: &[u8] = b"withdraw";

/// Seed for transient stake account
const TRANSIENT_STAKE_SEED_PREFIX: &[u8] = b"transient";

/// Lamports that must stay delegated in a validator stake account on top of
/// its rent-exempt reserve
pub const MINIMUM_STAKE_BALANCE: u64 = LAMPORTS_PER_SOL;

/// Maximum amount of validator stake accounts to update per
/// `UpdateValidatorListBalance` instruction, based on compute limits.
/// Must match the program.
pub const MAX_VALIDATORS_TO_UPDATE: usize = 5;

/// Size of a native stake account, used to compute its rent-exempt reserve
pub const STAKE_STATE_LEN: usize = 200;

/// Finds a valid program address and its bump seed for the given seeds
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(seeds, program_id)
}

/// Generates the deposit authority program address for the stake pool
pub fn find_deposit_authority_program_address(
    program_id: &Pubkey,
    stake_pool_address: &Pubkey,
) -> (Pubkey, u8) {
    find_program_address(
        &[stake_pool_address.as_ref(), AUTHORITY_DEPOSIT],
        program_id,
    )
}

/// Generates the withdraw authority program address for the stake pool
pub fn find_withdraw_authority_program_address(
    program_id: &Pubkey,
    stake_pool_address: &Pubkey,
) -> (Pubkey, u8) {
    find_program_address(
        &[stake_pool_address.as_ref(), AUTHORITY_WITHDRAW],
        program_id,
    )
}

/// Generates the stake program address for a validator's vote account
pub fn find_stake_program_address(
    program_id: &Pubkey,
    vote_account_address: &Pubkey,
    stake_pool_address: &Pubkey,
) -> (Pubkey, u8) {
    find_program_address(
        &[vote_account_address.as_ref(), stake_pool_address.as_ref()],
        program_id,
    )
}

/// Generates the transient stake program address for a validator's vote
/// account
pub fn find_transient_stake_program_address(
    program_id: &Pubkey,
    vote_account_address: &Pubkey,
    stake_pool_address: &Pubkey,
) -> (Pubkey, u8) {
    find_program_address(
        &[
            TRANSIENT_STAKE_SEED_PREFIX,
            vote_account_address.as_ref(),
            stake_pool_address.as_ref(),
        ],
        program_id,
    )
}

#[cfg(test)]
mod test {
    use {super::*, solana_program::pubkey};

    const PROGRAM_ID: Pubkey = pubkey!("SPoo1xuN9wGpxNjGnPNbRPtpQ7mHgKM8d9BeFC549Jy");

    #[test]
    fn validator_stake_account_derivation() {
        let vote = Pubkey::new_unique();
        let stake_pool = Pubkey::new_unique();
        let function_derived = find_stake_program_address(&PROGRAM_ID, &vote, &stake_pool);
        let hand_derived =
            Pubkey::find_program_address(&[vote.as_ref(), stake_pool.as_ref()], &PROGRAM_ID);
        assert_eq!(function_derived, hand_derived);
    }

    #[test]
    fn transient_stake_account_derivation() {
        let vote = Pubkey::new_unique();
        let stake_pool = Pubkey::new_unique();
        let function_derived =
            find_transient_stake_program_address(&PROGRAM_ID, &vote, &stake_pool);
        let hand_derived = Pubkey::find_program_address(
            &[b"transient", vote.as_ref(), stake_pool.as_ref()],
            &PROGRAM_ID,
        );
        assert_eq!(function_derived, hand_derived);
        assert_ne!(
            function_derived.0,
            find_stake_program_address(&PROGRAM_ID, &vote, &stake_pool).0
        );
    }

    #[test]
    fn authority_derivation() {
        let stake_pool = Pubkey::new_unique();
        let (deposit, deposit_bump) =
            find_deposit_authority_program_address(&PROGRAM_ID, &stake_pool);
        let (withdraw, withdraw_bump) =
            find_withdraw_authority_program_address(&PROGRAM_ID, &stake_pool);
        assert_ne!(deposit, withdraw);
        assert_eq!(
            Pubkey::create_program_address(
                &[stake_pool.as_ref(), b"deposit", &[deposit_bump]],
                &PROGRAM_ID
            )
            .unwrap(),
            deposit
        );
        assert_eq!(
            Pubkey::create_program_address(
                &[stake_pool.as_ref(), b"withdraw", &[withdraw_bump]],
                &PROGRAM_ID
            )
            .unwrap(),
            withdraw
        );
        assert!(!withdraw.is_on_curve());
    }

    #[test]
    fn derivation_is_deterministic() {
        let stake_pool = Pubkey::new_unique();
        assert_eq!(
            find_withdraw_authority_program_address(&PROGRAM_ID, &stake_pool),
            find_withdraw_authority_program_address(&PROGRAM_ID, &stake_pool),
        );
    }
}

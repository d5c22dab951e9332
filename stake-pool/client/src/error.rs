//! Error types

use {
    solana_program::{program_error::ProgramError, pubkey::Pubkey},
    thiserror::Error,
};

/// Errors that may be returned while decoding pool state or assembling
/// instructions for the stake pool program.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StakePoolClientError {
    /// Account data is too short or otherwise cannot be read.
    #[error("Unable to decode account data: {0}")]
    DecodeError(String),
    /// Account data carries an unexpected discriminant, option flag, account
    /// type or length.
    #[error("Account data does not match the expected layout: {0}")]
    SchemaMismatch(String),
    /// The pool stake accounts cannot cover the requested amount.
    #[error(
        "No stake accounts found in this pool with enough balance to withdraw {requested} pool tokens, {remaining} left uncovered"
    )]
    InsufficientPoolLiquidity {
        /// Pool tokens requested
        requested: u64,
        /// Pool tokens that no stake account could cover
        remaining: u64,
    },
    /// No stake account passed the minimum balance filter.
    #[error("No eligible stake accounts found in this pool")]
    NoEligibleStakeAccounts,
    /// The pool must be updated for the current epoch first.
    #[error("Stake pool was last updated in epoch {last_update_epoch}, current epoch is {current_epoch}")]
    StakePoolNotUpdated {
        /// Epoch stored in the pool
        last_update_epoch: u64,
        /// Epoch of the cluster
        current_epoch: u64,
    },
    /// Requested amount must be positive.
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    /// A checked calculation overflowed.
    #[error("Calculation failure")]
    CalculationFailure,
    /// Instruction data does not decode to a supported instruction.
    #[error("Invalid instruction data: {0}")]
    InvalidInstruction(String),
    /// Account is not a stake account owned by the expected authority.
    #[error("Invalid stake account {0}")]
    InvalidStakeAccount(Pubkey),
    /// Error returned by a native or token instruction builder.
    #[error(transparent)]
    Program(#[from] ProgramError),
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, StakePoolClientError>;

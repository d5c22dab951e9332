//! Selection of pool stake accounts to satisfy a withdrawal, and assembly of
//! the withdraw transaction

#![allow(clippy::too_many_arguments)]

use {
    crate::{
        error::{Result, StakePoolClientError},
        find_withdraw_authority_program_address,
        instruction::withdraw_stake,
        stake::{filter_by_withdraw_authority, NativeStakeAccount},
        state::StakePool,
        MINIMUM_STAKE_BALANCE, STAKE_STATE_LEN,
    },
    log::{debug, info},
    solana_program::{
        clock::Epoch, instruction::Instruction, pubkey::Pubkey, stake, system_instruction,
    },
    solana_sdk::signature::{Keypair, Signer},
};

/// One stake account to split from, and the pool tokens to burn for it
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WithdrawAccount {
    /// Pool stake account (validator or reserve) to split from
    pub stake_address: Pubkey,
    /// Pool tokens converted from this account
    pub pool_amount: u64,
}

/// Picks the pool stake accounts to withdraw `pool_amount` pool tokens from.
///
/// Validator stake accounts must keep `rent_exempt + MINIMUM_STAKE_BALANCE`
/// lamports and the reserve must keep `rent_exempt`. Validator accounts are
/// drained largest first; the reserve is only used last. Either the whole
/// amount is covered or nothing is returned.
///
/// The pool must have been updated for the current epoch, otherwise the
/// exchange rate used here is stale.
pub fn prepare_withdraw_accounts(
    stake_pool: &StakePool,
    pool_amount: u64,
    stake_account_rent_exempt_lamports: u64,
    pool_stake_accounts: &[NativeStakeAccount],
) -> Result<Vec<WithdrawAccount>> {
    if pool_amount == 0 {
        return Err(StakePoolClientError::InvalidAmount);
    }

    let is_reserve = |account: &NativeStakeAccount| account.address == stake_pool.reserve_stake;
    let minimum_balance = |account: &NativeStakeAccount| {
        if is_reserve(account) {
            stake_account_rent_exempt_lamports
        } else {
            stake_account_rent_exempt_lamports.saturating_add(MINIMUM_STAKE_BALANCE)
        }
    };

    let mut candidates: Vec<&NativeStakeAccount> = pool_stake_accounts
        .iter()
        .filter(|account| account.lamports > minimum_balance(account))
        .collect();
    if candidates.is_empty() {
        return Err(StakePoolClientError::NoEligibleStakeAccounts);
    }

    // High available lamports first, reserve last
    candidates.sort_by(|a, b| {
        is_reserve(a)
            .cmp(&is_reserve(b))
            .then_with(|| b.lamports.cmp(&a.lamports))
    });

    let mut withdraw_from = vec![];
    let mut remaining_amount = pool_amount;
    for account in candidates {
        let available_lamports = account.lamports - minimum_balance(account);
        let available_for_withdrawal = stake_pool
            .calc_pool_tokens_for_lamports(available_lamports)
            .ok_or(StakePoolClientError::CalculationFailure)?;
        let withdraw_amount = available_for_withdrawal.min(remaining_amount);
        if withdraw_amount == 0 {
            debug!(
                "Skipping stake account {}: {} lamports available convert to no pool tokens",
                account.address, available_lamports
            );
            continue;
        }

        debug!(
            "Withdrawing {} pool tokens from stake account {}",
            withdraw_amount, account.address
        );
        withdraw_from.push(WithdrawAccount {
            stake_address: account.address,
            pool_amount: withdraw_amount,
        });
        remaining_amount -= withdraw_amount;

        if remaining_amount == 0 {
            break;
        }
    }

    // Not enough stake to withdraw the specified amount
    if remaining_amount > 0 {
        return Err(StakePoolClientError::InsufficientPoolLiquidity {
            requested: pool_amount,
            remaining: remaining_amount,
        });
    }

    Ok(withdraw_from)
}

/// Instructions for a withdrawal, with the fresh keypairs that must co-sign
#[derive(Debug)]
pub struct WithdrawInstructions {
    /// Token approval, then a create-account and withdraw pair per source
    /// stake account
    pub instructions: Vec<Instruction>,
    /// Accounts receiving the split stake, one per source stake account
    pub new_stake_keypairs: Vec<Keypair>,
    /// Delegate approved to burn the pool tokens
    pub user_transfer_authority: Keypair,
    /// The selected source accounts
    pub withdraw_accounts: Vec<WithdrawAccount>,
}

/// Builds the full withdrawal: approve a fresh transfer authority for
/// `pool_amount`, then for every selected pool stake account create a new
/// stake account owned by `user` and withdraw into it.
///
/// `pool_stake_accounts` may contain any stake accounts; only those whose
/// withdrawer is the pool withdraw authority are considered.
pub fn withdraw_stake_with_plan(
    program_id: &Pubkey,
    stake_pool_address: &Pubkey,
    stake_pool: &StakePool,
    current_epoch: Epoch,
    pool_amount: u64,
    user: &Pubkey,
    user_pool_token_account: &Pubkey,
    stake_account_rent_exempt_lamports: u64,
    pool_stake_accounts: Vec<NativeStakeAccount>,
) -> Result<WithdrawInstructions> {
    stake_pool.check_up_to_date(current_epoch)?;

    let (pool_withdraw_authority, _) =
        find_withdraw_authority_program_address(program_id, stake_pool_address);
    let pool_stake_accounts =
        filter_by_withdraw_authority(pool_stake_accounts, &pool_withdraw_authority);
    if pool_stake_accounts.is_empty() {
        return Err(StakePoolClientError::NoEligibleStakeAccounts);
    }

    let withdraw_accounts = prepare_withdraw_accounts(
        stake_pool,
        pool_amount,
        stake_account_rent_exempt_lamports,
        &pool_stake_accounts,
    )?;

    let user_transfer_authority = Keypair::new();
    let mut instructions = vec![spl_token::instruction::approve(
        &stake_pool.token_program_id,
        user_pool_token_account,
        &user_transfer_authority.pubkey(),
        user,
        &[],
        pool_amount,
    )?];

    let mut new_stake_keypairs = Vec::with_capacity(withdraw_accounts.len());
    for withdraw_account in &withdraw_accounts {
        let stake_receiver = Keypair::new();
        info!(
            "Withdrawing from account {}, {} pool tokens, about {} lamports, into new account {}",
            withdraw_account.stake_address,
            withdraw_account.pool_amount,
            stake_pool
                .calc_lamports_withdraw_amount(withdraw_account.pool_amount)
                .unwrap_or_default(),
            stake_receiver.pubkey(),
        );

        instructions.push(system_instruction::create_account(
            user,
            &stake_receiver.pubkey(),
            stake_account_rent_exempt_lamports,
            STAKE_STATE_LEN as u64,
            &stake::program::id(),
        ));
        instructions.push(withdraw_stake(
            program_id,
            stake_pool_address,
            &stake_pool.validator_list,
            &pool_withdraw_authority,
            &withdraw_account.stake_address,
            &stake_receiver.pubkey(),
            user,
            &user_transfer_authority.pubkey(),
            user_pool_token_account,
            &stake_pool.manager_fee_account,
            &stake_pool.pool_mint,
            &stake_pool.token_program_id,
            withdraw_account.pool_amount,
        ));
        new_stake_keypairs.push(stake_receiver);
    }

    Ok(WithdrawInstructions {
        instructions,
        new_stake_keypairs,
        user_transfer_authority,
        withdraw_accounts,
    })
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{instruction::StakePoolInstruction, state::AccountType},
        solana_program::native_token::LAMPORTS_PER_SOL,
        test_case::test_case,
    };

    const RENT_EXEMPT: u64 = 2_282_880;

    fn stake_pool(total_lamports: u64, pool_token_supply: u64) -> StakePool {
        StakePool {
            account_type: AccountType::StakePool,
            reserve_stake: Pubkey::new_unique(),
            total_lamports,
            pool_token_supply,
            ..StakePool::default()
        }
    }

    fn account(address: Pubkey, lamports: u64) -> NativeStakeAccount {
        NativeStakeAccount {
            address,
            lamports,
            meta: None,
            delegation: None,
        }
    }

    fn validator(lamports: u64) -> NativeStakeAccount {
        account(Pubkey::new_unique(), lamports)
    }

    #[test]
    fn draws_from_validator_before_reserve() {
        let stake_pool = stake_pool(100 * LAMPORTS_PER_SOL, 100 * LAMPORTS_PER_SOL);
        let reserve = account(stake_pool.reserve_stake, 5 * LAMPORTS_PER_SOL);
        let validator = validator(10 * LAMPORTS_PER_SOL);
        let plan = prepare_withdraw_accounts(
            &stake_pool,
            3 * LAMPORTS_PER_SOL,
            RENT_EXEMPT,
            &[reserve, validator.clone()],
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![WithdrawAccount {
                stake_address: validator.address,
                pool_amount: 3 * LAMPORTS_PER_SOL,
            }]
        );
    }

    #[test]
    fn reserve_is_last_even_when_largest() {
        let stake_pool = stake_pool(1_000 * LAMPORTS_PER_SOL, 1_000 * LAMPORTS_PER_SOL);
        let reserve = account(stake_pool.reserve_stake, 500 * LAMPORTS_PER_SOL);
        let small = validator(2 * LAMPORTS_PER_SOL);
        let large = validator(4 * LAMPORTS_PER_SOL);
        let plan = prepare_withdraw_accounts(
            &stake_pool,
            10 * LAMPORTS_PER_SOL,
            RENT_EXEMPT,
            &[reserve.clone(), small.clone(), large.clone()],
        )
        .unwrap();
        let order: Vec<Pubkey> = plan.iter().map(|w| w.stake_address).collect();
        assert_eq!(order, vec![large.address, small.address, reserve.address]);

        // validators are left with exactly their minimum
        let floor = RENT_EXEMPT + MINIMUM_STAKE_BALANCE;
        assert_eq!(plan[0].pool_amount, large.lamports - floor);
        assert_eq!(plan[1].pool_amount, small.lamports - floor);
        let total: u64 = plan.iter().map(|w| w.pool_amount).sum();
        assert_eq!(total, 10 * LAMPORTS_PER_SOL);
        assert!(plan[2].pool_amount <= reserve.lamports - RENT_EXEMPT);
    }

    #[test]
    fn reserve_only_keeps_rent_exempt() {
        let stake_pool = stake_pool(10 * LAMPORTS_PER_SOL, 10 * LAMPORTS_PER_SOL);
        let reserve = reserve(&stake_pool, RENT_EXEMPT + 500);
        let plan = prepare_withdraw_accounts(
            &stake_pool,
            500,
            RENT_EXEMPT,
            std::slice::from_ref(&reserve),
        )
        .unwrap();
        assert_eq!(plan[0].pool_amount, 500);
        assert_eq!(
            prepare_withdraw_accounts(&stake_pool, 501, RENT_EXEMPT, &[reserve]),
            Err(StakePoolClientError::InsufficientPoolLiquidity {
                requested: 501,
                remaining: 1,
            })
        );
    }

    fn reserve(stake_pool: &StakePool, lamports: u64) -> NativeStakeAccount {
        account(stake_pool.reserve_stake, lamports)
    }

    #[test]
    fn insufficient_liquidity_returns_no_plan() {
        let stake_pool = stake_pool(100 * LAMPORTS_PER_SOL, 100 * LAMPORTS_PER_SOL);
        let accounts = [
            validator(3 * LAMPORTS_PER_SOL),
            reserve(&stake_pool, 2 * LAMPORTS_PER_SOL),
        ];
        let surplus = (3 * LAMPORTS_PER_SOL - RENT_EXEMPT - MINIMUM_STAKE_BALANCE)
            + (2 * LAMPORTS_PER_SOL - RENT_EXEMPT);
        assert!(prepare_withdraw_accounts(&stake_pool, surplus, RENT_EXEMPT, &accounts).is_ok());
        assert_eq!(
            prepare_withdraw_accounts(&stake_pool, surplus + 1, RENT_EXEMPT, &accounts),
            Err(StakePoolClientError::InsufficientPoolLiquidity {
                requested: surplus + 1,
                remaining: 1,
            })
        );
    }

    #[test_case(&[]; "no accounts")]
    #[test_case(&[RENT_EXEMPT + MINIMUM_STAKE_BALANCE]; "validator at floor")]
    #[test_case(&[1, RENT_EXEMPT]; "dust")]
    fn no_eligible_accounts(balances: &[u64]) {
        let stake_pool = stake_pool(100, 100);
        let accounts: Vec<NativeStakeAccount> =
            balances.iter().map(|lamports| validator(*lamports)).collect();
        assert_eq!(
            prepare_withdraw_accounts(&stake_pool, 1, RENT_EXEMPT, &accounts),
            Err(StakePoolClientError::NoEligibleStakeAccounts)
        );
    }

    #[test]
    fn validator_floor_is_one_sol() {
        assert_eq!(MINIMUM_STAKE_BALANCE, LAMPORTS_PER_SOL);
        let stake_pool = stake_pool(100 * LAMPORTS_PER_SOL, 100 * LAMPORTS_PER_SOL);

        // a lamport floor would leave this account withdrawable
        let below_floor = validator(RENT_EXEMPT + LAMPORTS_PER_SOL - 1);
        assert_eq!(
            prepare_withdraw_accounts(&stake_pool, 1, RENT_EXEMPT, &[below_floor]),
            Err(StakePoolClientError::NoEligibleStakeAccounts)
        );

        let above_floor = validator(RENT_EXEMPT + LAMPORTS_PER_SOL + 1);
        let plan =
            prepare_withdraw_accounts(&stake_pool, 1, RENT_EXEMPT, &[above_floor]).unwrap();
        assert_eq!(plan[0].pool_amount, 1);
    }

    #[test]
    fn reserve_at_rent_exempt_is_not_eligible() {
        let stake_pool = stake_pool(100, 100);
        let reserve = reserve(&stake_pool, RENT_EXEMPT);
        assert_eq!(
            prepare_withdraw_accounts(&stake_pool, 1, RENT_EXEMPT, &[reserve]),
            Err(StakePoolClientError::NoEligibleStakeAccounts)
        );
    }

    #[test]
    fn zero_amount_rejected() {
        let stake_pool = stake_pool(100, 100);
        assert_eq!(
            prepare_withdraw_accounts(&stake_pool, 0, RENT_EXEMPT, &[validator(u64::MAX)]),
            Err(StakePoolClientError::InvalidAmount)
        );
    }

    #[test]
    fn empty_pool_converts_nothing() {
        let stake_pool = stake_pool(0, 0);
        assert_eq!(
            prepare_withdraw_accounts(
                &stake_pool,
                1,
                RENT_EXEMPT,
                &[validator(10 * LAMPORTS_PER_SOL)]
            ),
            Err(StakePoolClientError::InsufficientPoolLiquidity {
                requested: 1,
                remaining: 1,
            })
        );
    }

    #[test]
    fn appreciated_pool_converts_fewer_tokens() {
        // 2 lamports per pool token
        let stake_pool = stake_pool(200 * LAMPORTS_PER_SOL, 100 * LAMPORTS_PER_SOL);
        let validator = validator(RENT_EXEMPT + MINIMUM_STAKE_BALANCE + 1_001);
        let reserve = reserve(&stake_pool, RENT_EXEMPT + 4_000);
        let plan = prepare_withdraw_accounts(
            &stake_pool,
            1_500,
            RENT_EXEMPT,
            &[reserve.clone(), validator.clone()],
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![
                WithdrawAccount {
                    stake_address: validator.address,
                    pool_amount: 500,
                },
                WithdrawAccount {
                    stake_address: reserve.address,
                    pool_amount: 1_000,
                },
            ]
        );
    }

    #[test]
    fn skips_accounts_worth_less_than_a_token() {
        // 1_000 lamports per pool token
        let stake_pool = stake_pool(1_000_000, 1_000);
        let rich = validator(RENT_EXEMPT + MINIMUM_STAKE_BALANCE + 5_000);
        let poor = validator(RENT_EXEMPT + MINIMUM_STAKE_BALANCE + 999);
        let reserve = reserve(&stake_pool, RENT_EXEMPT + 2_000);
        let plan = prepare_withdraw_accounts(
            &stake_pool,
            7,
            RENT_EXEMPT,
            &[poor, reserve.clone(), rich.clone()],
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![
                WithdrawAccount {
                    stake_address: rich.address,
                    pool_amount: 5,
                },
                WithdrawAccount {
                    stake_address: reserve.address,
                    pool_amount: 2,
                },
            ]
        );
    }

    #[test]
    fn equal_balances_keep_input_order() {
        let stake_pool = stake_pool(100 * LAMPORTS_PER_SOL, 100 * LAMPORTS_PER_SOL);
        let first = validator(3 * LAMPORTS_PER_SOL);
        let second = validator(3 * LAMPORTS_PER_SOL);
        let plan = prepare_withdraw_accounts(
            &stake_pool,
            LAMPORTS_PER_SOL,
            RENT_EXEMPT,
            &[first.clone(), second],
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].stake_address, first.address);
    }

    mod composition {
        use {
            super::*,
            solana_program::stake::state::{Authorized, Lockup, Meta, StakeStateV2},
        };

        fn pool_account(withdrawer: &Pubkey, address: Pubkey, lamports: u64) -> NativeStakeAccount {
            NativeStakeAccount::new(
                address,
                lamports,
                &StakeStateV2::Initialized(Meta {
                    rent_exempt_reserve: RENT_EXEMPT,
                    authorized: Authorized {
                        staker: *withdrawer,
                        withdrawer: *withdrawer,
                    },
                    lockup: Lockup::default(),
                }),
            )
        }

        #[test]
        fn builds_approve_and_withdraw_pairs() {
            let program_id = Pubkey::new_unique();
            let stake_pool_address = Pubkey::new_unique();
            let (withdraw_authority, _) =
                find_withdraw_authority_program_address(&program_id, &stake_pool_address);
            let stake_pool = StakePool {
                last_update_epoch: 7,
                token_program_id: spl_token::id(),
                validator_list: Pubkey::new_unique(),
                pool_mint: Pubkey::new_unique(),
                manager_fee_account: Pubkey::new_unique(),
                ..super::stake_pool(100 * LAMPORTS_PER_SOL, 100 * LAMPORTS_PER_SOL)
            };
            let first = Pubkey::new_unique();
            let accounts = vec![
                pool_account(&withdraw_authority, first, 2 * LAMPORTS_PER_SOL),
                pool_account(
                    &withdraw_authority,
                    stake_pool.reserve_stake,
                    10 * LAMPORTS_PER_SOL,
                ),
                // not controlled by the pool
                pool_account(&Pubkey::new_unique(), Pubkey::new_unique(), 50 * LAMPORTS_PER_SOL),
            ];
            let user = Pubkey::new_unique();
            let user_pool_token_account = Pubkey::new_unique();
            let pool_amount = 3 * LAMPORTS_PER_SOL;

            let result = withdraw_stake_with_plan(
                &program_id,
                &stake_pool_address,
                &stake_pool,
                7,
                pool_amount,
                &user,
                &user_pool_token_account,
                RENT_EXEMPT,
                accounts,
            )
            .unwrap();

            assert_eq!(result.withdraw_accounts.len(), 2);
            assert_eq!(result.withdraw_accounts[0].stake_address, first);
            assert_eq!(
                result.withdraw_accounts[1].stake_address,
                stake_pool.reserve_stake
            );
            assert_eq!(result.instructions.len(), 1 + 2 * 2);
            assert_eq!(result.new_stake_keypairs.len(), 2);

            let approve = &result.instructions[0];
            assert_eq!(approve.program_id, spl_token::id());
            assert_eq!(
                approve.accounts[1].pubkey,
                result.user_transfer_authority.pubkey()
            );

            for (i, withdraw_account) in result.withdraw_accounts.iter().enumerate() {
                let create = &result.instructions[1 + 2 * i];
                let withdraw = &result.instructions[2 + 2 * i];
                let receiver = result.new_stake_keypairs[i].pubkey();
                assert_eq!(create.accounts[1].pubkey, receiver);
                assert_eq!(withdraw.program_id, program_id);
                assert_eq!(withdraw.accounts[2].pubkey, withdraw_authority);
                assert_eq!(withdraw.accounts[3].pubkey, withdraw_account.stake_address);
                assert_eq!(withdraw.accounts[4].pubkey, receiver);
                assert_eq!(
                    withdraw.accounts[6].pubkey,
                    result.user_transfer_authority.pubkey()
                );
                assert_eq!(
                    StakePoolInstruction::unpack(&withdraw.data).unwrap(),
                    StakePoolInstruction::WithdrawStake(withdraw_account.pool_amount)
                );
            }
        }

        #[test]
        fn stale_pool_is_rejected() {
            let stake_pool = StakePool {
                last_update_epoch: 6,
                ..super::stake_pool(100, 100)
            };
            let result = withdraw_stake_with_plan(
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &stake_pool,
                7,
                10,
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                RENT_EXEMPT,
                vec![],
            );
            assert!(matches!(
                result,
                Err(StakePoolClientError::StakePoolNotUpdated {
                    last_update_epoch: 6,
                    current_epoch: 7
                })
            ));
        }

        #[test]
        fn foreign_accounts_only() {
            let stake_pool = super::stake_pool(100, 100);
            let result = withdraw_stake_with_plan(
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &stake_pool,
                0,
                10,
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                RENT_EXEMPT,
                vec![pool_account(
                    &Pubkey::new_unique(),
                    Pubkey::new_unique(),
                    100 * LAMPORTS_PER_SOL,
                )],
            );
            assert!(matches!(
                result,
                Err(StakePoolClientError::NoEligibleStakeAccounts)
            ));
        }
    }
}

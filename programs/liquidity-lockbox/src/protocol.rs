//! Deposit, withdraw and redemption planning against a lockbox.
//!
//! Every operation validates its inputs before touching the ledger or the
//! pool. The caller is responsible for discarding all effects when an
//! operation returns an error: on chain the runtime does this, off chain
//! [`crate::registry::LockboxVault`] stages and commits.

use anchor_lang::prelude::*;
use anchor_spl::associated_token::get_associated_token_address;

use crate::engine::{PoolEngine, TokenAmounts, TokenLedger};
use crate::fees::{settle_fees, FeeSplit};
use crate::quote::{decrease_liquidity_quote_by_liquidity, validate_tick_range};
use crate::state::{LiquidityLockbox, LockboxPosition};
use crate::LockboxError;

/// Accounts supplied by the depositor.
#[derive(Clone, Copy, Debug)]
pub struct DepositAccounts {
    pub depositor: Pubkey,
    pub position: Pubkey,
    pub position_mint: Pubkey,
    pub position_token_account: Pubkey,
    pub custody_account: Pubkey,
    pub bridged_token_account: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositReceipt {
    pub index: u32,
    pub liquidity: u64,
}

/// Accounts supplied by the claim holder.
#[derive(Clone, Copy, Debug)]
pub struct WithdrawAccounts {
    pub owner: Pubkey,
    pub bridged_token_account: Pubkey,
    pub token_owner_account_a: Pubkey,
    pub token_owner_account_b: Pubkey,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub index: u32,
    pub amount: u64,
    pub token_min_a: u64,
    pub token_min_b: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub index: u32,
    /// Liquidity removed, equal to the claims burned.
    pub liquidity: u64,
    /// Principal released by the pool, before the protocol fee.
    pub withdrawn: TokenAmounts,
    /// Trading fees swept to the fee collectors.
    pub collected: TokenAmounts,
    pub split: FeeSplit,
    pub remaining_liquidity: u128,
}

/// One position to draw from when redeeming a claim amount.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedemptionLeg {
    pub index: u32,
    pub position_account: Pubkey,
    pub custody_account: Pubkey,
    pub liquidity: u64,
}

/// Takes custody of a pool position and mints claims equal to its liquidity.
///
/// `record` is the empty slot for index `id`; it is only written once every
/// check has passed.
#[allow(clippy::too_many_arguments)]
pub fn deposit<E: PoolEngine + TokenLedger>(
    env: &mut E,
    lockbox_key: &Pubkey,
    lockbox: &mut LiquidityLockbox,
    record: &mut LockboxPosition,
    record_bump: u8,
    accounts: &DepositAccounts,
    id: u32,
    liquidity_hint: u64,
) -> Result<DepositReceipt> {
    require!(lockbox.num_positions == id, LockboxError::WrongPositionId);

    let position = env.position(&accounts.position)?;
    require_keys_eq!(position.whirlpool, lockbox.whirlpool, LockboxError::WrongWhirlpool);
    require_keys_eq!(
        env.position_address(&position.position_mint),
        accounts.position,
        LockboxError::WrongPositionPDA
    );

    require_keys_eq!(accounts.position_mint, position.position_mint, LockboxError::MintMismatch);
    require_keys_eq!(
        env.mint_of(&accounts.position_token_account)?,
        position.position_mint,
        LockboxError::MintMismatch
    );
    require_keys_eq!(
        env.mint_of(&accounts.bridged_token_account)?,
        lockbox.bridged_token_mint,
        LockboxError::MintMismatch
    );

    require_keys_eq!(
        get_associated_token_address(lockbox_key, &position.position_mint),
        accounts.custody_account,
        LockboxError::BadCustody
    );
    require_keys_eq!(env.owner_of(&accounts.custody_account)?, *lockbox_key, LockboxError::BadCustody);
    require_keys_eq!(
        env.mint_of(&accounts.custody_account)?,
        position.position_mint,
        LockboxError::BadCustody
    );

    require!(env.balance_of(&accounts.custody_account)? == 0, LockboxError::AlreadyDeposited);
    require!(
        env.balance_of(&accounts.position_token_account)? == 1
            && env.owner_of(&accounts.position_token_account)? == accounts.depositor,
        LockboxError::NotAPosition
    );

    let pool = env.pool()?;
    validate_tick_range(position.tick_lower_index, position.tick_upper_index, pool.tick_spacing)?;
    require!(position.liquidity > 0, LockboxError::LiquidityZero);
    let liquidity =
        u64::try_from(position.liquidity).map_err(|_| error!(LockboxError::LiquidityOverflow))?;

    if liquidity != liquidity_hint {
        msg!(
            "Deposit hint {} differs from position liquidity {}",
            liquidity_hint,
            liquidity
        );
    }

    let index = lockbox.register_position(position.liquidity)?;
    env.transfer(&accounts.position_token_account, &accounts.custody_account, 1)?;
    env.close_account(&accounts.position_token_account, &accounts.depositor)?;
    record.initialize(
        *lockbox_key,
        index,
        record_bump,
        accounts.position,
        accounts.custody_account,
        &position,
    );
    env.mint_to(&lockbox.bridged_token_mint, &accounts.bridged_token_account, liquidity)?;

    Ok(DepositReceipt { index, liquidity })
}

/// Redeems up to `request.amount` claims against the record at `request.index`.
pub fn withdraw<E: PoolEngine + TokenLedger>(
    env: &mut E,
    lockbox_key: &Pubkey,
    lockbox: &mut LiquidityLockbox,
    record: &mut LockboxPosition,
    accounts: &WithdrawAccounts,
    request: &WithdrawRequest,
) -> Result<WithdrawReceipt> {
    require!(
        request.index < lockbox.num_positions
            && record.index == request.index
            && record.lockbox == *lockbox_key,
        LockboxError::UnknownPosition
    );

    require!(request.amount > 0, LockboxError::LiquidityZero);
    let liquidity = u128::from(request.amount).min(record.liquidity);
    require!(liquidity > 0, LockboxError::LiquidityZero);
    // Bounded by `request.amount`
    let claims = liquidity as u64;

    require_keys_eq!(
        env.mint_of(&accounts.bridged_token_account)?,
        lockbox.bridged_token_mint,
        LockboxError::MintMismatch
    );
    require_keys_eq!(
        env.owner_of(&accounts.bridged_token_account)?,
        accounts.owner,
        LockboxError::WrongOwner
    );
    require!(
        env.balance_of(&accounts.bridged_token_account)? >= claims,
        LockboxError::InsufficientClaim
    );

    let pool = env.pool()?;
    require_keys_eq!(
        env.mint_of(&accounts.token_owner_account_a)?,
        pool.token_mint_a,
        LockboxError::MintMismatch
    );
    require_keys_eq!(
        env.mint_of(&accounts.token_owner_account_b)?,
        pool.token_mint_b,
        LockboxError::MintMismatch
    );

    let quote = decrease_liquidity_quote_by_liquidity(
        &pool,
        record.tick_lower_index,
        record.tick_upper_index,
        liquidity,
        lockbox.quote_slippage_bps,
    )?;
    require!(
        quote.token_min_a >= request.token_min_a && quote.token_min_b >= request.token_min_b,
        LockboxError::SlippageExceeded
    );

    env.burn(&accounts.bridged_token_account, claims)?;

    let collected = env.collect_fees(
        &record.position_account,
        &lockbox.fee_collector_token_account_a,
        &lockbox.fee_collector_token_account_b,
    )?;

    let withdrawn = env.decrease_liquidity(
        &record.position_account,
        liquidity,
        quote.token_min_a,
        quote.token_min_b,
        &lockbox.token_account_a,
        &lockbox.token_account_b,
    )?;

    let split = settle_fees(withdrawn.token_a, withdrawn.token_b, lockbox.fee_rate_bps)?;
    let transfers = [
        (lockbox.token_account_a, lockbox.fee_collector_token_account_a, split.fee_a),
        (lockbox.token_account_a, accounts.token_owner_account_a, split.payout_a),
        (lockbox.token_account_b, lockbox.fee_collector_token_account_b, split.fee_b),
        (lockbox.token_account_b, accounts.token_owner_account_b, split.payout_b),
    ];
    for (source, destination, amount) in transfers {
        if amount > 0 {
            env.transfer(&source, &destination, amount)?;
        }
    }

    record.release_liquidity(liquidity)?;
    lockbox.release_liquidity(liquidity)?;
    if record.is_depleted() && lockbox.first_available_index == record.index {
        lockbox.first_available_index = record.index + 1;
    }

    Ok(WithdrawReceipt {
        index: record.index,
        liquidity: claims,
        withdrawn,
        collected,
        split,
        remaining_liquidity: record.liquidity,
    })
}

/// Splits `amount` across records starting at the lockbox's first available
/// index. `records` must be in ascending index order; depleted records and
/// records below the cursor are skipped.
pub fn plan_redemption<'a, I>(
    lockbox: &LiquidityLockbox,
    records: I,
    amount: u64,
) -> Result<Vec<RedemptionLeg>>
where
    I: IntoIterator<Item = &'a LockboxPosition>,
{
    require!(amount > 0, LockboxError::LiquidityZero);
    require!(
        u128::from(amount) <= lockbox.total_liquidity,
        LockboxError::AmountExceedsTotalLiquidity
    );

    let mut legs = Vec::new();
    let mut remaining = u128::from(amount);
    let mut previous: Option<u32> = None;
    for record in records {
        require!(
            previous.map_or(true, |index| record.index > index),
            LockboxError::UnknownPosition
        );
        previous = Some(record.index);

        if record.index < lockbox.first_available_index || record.is_depleted() {
            continue;
        }

        let liquidity = remaining.min(record.liquidity);
        legs.push(RedemptionLeg {
            index: record.index,
            position_account: record.position_account,
            custody_account: record.custody_account,
            // Bounded by `amount`
            liquidity: liquidity as u64,
        });
        remaining -= liquidity;
        if remaining == 0 {
            return Ok(legs);
        }
    }

    err!(LockboxError::AmountExceedsTotalLiquidity)
}

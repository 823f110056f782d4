//! Increase/decrease liquidity quotes against a pool snapshot.

use anchor_lang::prelude::*;

use crate::engine::PoolSnapshot;
use crate::math::{
    get_amounts_for_liquidity, get_liquidity_from_amount_a, get_liquidity_from_amount_b,
    is_valid_tick_index, sqrt_price_from_tick_index,
};
use crate::{LockboxError, BPS_DENOMINATOR};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IncreaseLiquidityQuote {
    pub liquidity: u128,
    pub token_est_a: u64,
    pub token_est_b: u64,
    pub token_max_a: u64,
    pub token_max_b: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecreaseLiquidityQuote {
    pub liquidity: u128,
    pub token_est_a: u64,
    pub token_est_b: u64,
    pub token_min_a: u64,
    pub token_min_b: u64,
}

pub fn validate_tick_range(tick_lower_index: i32, tick_upper_index: i32, tick_spacing: u16) -> Result<()> {
    let spacing = i32::from(tick_spacing);
    require!(
        spacing > 0
            && tick_lower_index < tick_upper_index
            && is_valid_tick_index(tick_lower_index)
            && is_valid_tick_index(tick_upper_index)
            && tick_lower_index % spacing == 0
            && tick_upper_index % spacing == 0,
        LockboxError::InvalidRange
    );
    Ok(())
}

/// Widest usable range for `tick_spacing`.
pub fn full_range_tick_indexes(tick_spacing: u16) -> (i32, i32) {
    let spacing = i32::from(tick_spacing.max(1));
    let upper = crate::math::MAX_TICK_INDEX / spacing * spacing;
    (-upper, upper)
}

pub fn validate_slippage(slippage_bps: u16) -> Result<()> {
    require!(u64::from(slippage_bps) <= BPS_DENOMINATOR, LockboxError::InvalidSlippage);
    Ok(())
}

/// Applies `slippage_bps` to an estimate: widened upward for maxima,
/// narrowed downward for minima.
pub fn adjust_for_slippage(estimate: u64, slippage_bps: u16, upward: bool) -> Result<u64> {
    validate_slippage(slippage_bps)?;

    let bps = u128::from(slippage_bps);
    let denominator = u128::from(BPS_DENOMINATOR);
    let estimate = u128::from(estimate);
    let adjusted = if upward {
        (estimate * (denominator + bps)).div_ceil(denominator)
    } else {
        estimate * (denominator - bps) / denominator
    };
    u64::try_from(adjusted).map_err(|_| error!(LockboxError::MathOverflow))
}

/// Quote for adding liquidity funded by `input_amount` of one token.
///
/// When the range straddles the current price the input token alone fixes
/// the liquidity; the other side is derived from it.
pub fn increase_liquidity_quote_by_input_token(
    pool: &PoolSnapshot,
    tick_lower_index: i32,
    tick_upper_index: i32,
    input_amount: u64,
    input_is_a: bool,
    slippage_bps: u16,
) -> Result<IncreaseLiquidityQuote> {
    validate_tick_range(tick_lower_index, tick_upper_index, pool.tick_spacing)?;
    validate_slippage(slippage_bps)?;

    let sqrt_price_lower = sqrt_price_from_tick_index(tick_lower_index)?;
    let sqrt_price_upper = sqrt_price_from_tick_index(tick_upper_index)?;
    let sqrt_price = pool.sqrt_price;

    let liquidity = if sqrt_price <= sqrt_price_lower {
        // Only token A is accepted below the range
        if input_is_a {
            get_liquidity_from_amount_a(sqrt_price_lower, sqrt_price_upper, input_amount)?
        } else {
            0
        }
    } else if sqrt_price < sqrt_price_upper {
        if input_is_a {
            get_liquidity_from_amount_a(sqrt_price, sqrt_price_upper, input_amount)?
        } else {
            get_liquidity_from_amount_b(sqrt_price_lower, sqrt_price, input_amount)?
        }
    } else if input_is_a {
        0
    } else {
        get_liquidity_from_amount_b(sqrt_price_lower, sqrt_price_upper, input_amount)?
    };

    if liquidity == 0 {
        return Ok(IncreaseLiquidityQuote::default());
    }

    let (token_est_a, token_est_b) =
        get_amounts_for_liquidity(sqrt_price, tick_lower_index, tick_upper_index, liquidity, true)?;

    Ok(IncreaseLiquidityQuote {
        liquidity,
        token_est_a,
        token_est_b,
        token_max_a: adjust_for_slippage(token_est_a, slippage_bps, true)?,
        token_max_b: adjust_for_slippage(token_est_b, slippage_bps, true)?,
    })
}

/// Quote for removing `liquidity` from a position spanning the given range.
pub fn decrease_liquidity_quote_by_liquidity(
    pool: &PoolSnapshot,
    tick_lower_index: i32,
    tick_upper_index: i32,
    liquidity: u128,
    slippage_bps: u16,
) -> Result<DecreaseLiquidityQuote> {
    validate_tick_range(tick_lower_index, tick_upper_index, pool.tick_spacing)?;
    validate_slippage(slippage_bps)?;

    if liquidity == 0 {
        return Ok(DecreaseLiquidityQuote::default());
    }

    let (token_est_a, token_est_b) = get_amounts_for_liquidity(
        pool.sqrt_price,
        tick_lower_index,
        tick_upper_index,
        liquidity,
        false,
    )?;

    Ok(DecreaseLiquidityQuote {
        liquidity,
        token_est_a,
        token_est_b,
        token_min_a: adjust_for_slippage(token_est_a, slippage_bps, false)?,
        token_min_b: adjust_for_slippage(token_est_b, slippage_bps, false)?,
    })
}

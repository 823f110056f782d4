//! Q64.64 concentrated-liquidity math.
//!
//! Square-root prices are unsigned Q64.64 fixed point numbers, matching the
//! Whirlpool program's representation. Intermediates that can exceed 128 bits
//! are carried in `U256`.

use alloy_primitives::U256;
use anchor_lang::prelude::*;

use crate::LockboxError;

pub const MIN_TICK_INDEX: i32 = -443_636;
pub const MAX_TICK_INDEX: i32 = 443_636;

pub const MIN_SQRT_PRICE_X64: u128 = 4_295_048_016;
pub const MAX_SQRT_PRICE_X64: u128 = 79_226_673_515_401_279_992_447_579_055;

/// 1.0 in Q64.64.
pub const Q64: u128 = 1 << 64;

// 2^128 / sqrt(1.0001^(2^i)), Q128.128
const TICK_RATIO_FACTORS: [u128; 19] = [
    0xfffcb933bd6fad37aa2d162d1a594001,
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
];

pub fn is_valid_tick_index(tick_index: i32) -> bool {
    (MIN_TICK_INDEX..=MAX_TICK_INDEX).contains(&tick_index)
}

/// Returns sqrt(1.0001^tick_index) as Q64.64.
pub fn sqrt_price_from_tick_index(tick_index: i32) -> Result<u128> {
    require!(is_valid_tick_index(tick_index), LockboxError::InvalidRange);

    let abs_tick = tick_index.unsigned_abs();
    let mut ratio: Option<u128> = None;
    for (bit, factor) in TICK_RATIO_FACTORS.iter().enumerate() {
        if abs_tick & (1 << bit) != 0 {
            ratio = Some(match ratio {
                None => *factor,
                Some(current) => mul_shr_128(current, *factor)?,
            });
        }
    }

    let Some(ratio) = ratio else {
        return Ok(Q64);
    };

    // Q128.128 -> Q64.64, rounding up
    let below_one = (ratio >> 64) + u128::from(ratio as u64 != 0);
    if tick_index > 0 {
        Ok(u128::MAX / below_one)
    } else {
        Ok(below_one)
    }
}

/// Amount of token A spanned by `liquidity` between two sqrt prices.
///
/// `liquidity * (upper - lower) * 2^64 / (upper * lower)`
pub fn get_amount_a_delta(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u64> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if liquidity == 0 || lower == upper {
        return Ok(0);
    }

    let numerator = U256::from(liquidity)
        .checked_mul(U256::from(upper - lower))
        .ok_or_else(|| error!(LockboxError::MathOverflow))?;
    let denominator = U256::from(lower) * U256::from(upper);
    let amount = mul_div(numerator, U256::from(Q64), denominator, round_up)?;
    to_u64(amount)
}

/// Amount of token B spanned by `liquidity` between two sqrt prices.
///
/// `liquidity * (upper - lower) / 2^64`
pub fn get_amount_b_delta(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u64> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if liquidity == 0 || lower == upper {
        return Ok(0);
    }

    let amount = mul_div(
        U256::from(liquidity),
        U256::from(upper - lower),
        U256::from(Q64),
        round_up,
    )?;
    to_u64(amount)
}

/// Token amounts represented by `liquidity` over `[tick_lower, tick_upper)`
/// at the current `sqrt_price`.
pub fn get_amounts_for_liquidity(
    sqrt_price: u128,
    tick_lower_index: i32,
    tick_upper_index: i32,
    liquidity: u128,
    round_up: bool,
) -> Result<(u64, u64)> {
    let sqrt_price_lower = sqrt_price_from_tick_index(tick_lower_index)?;
    let sqrt_price_upper = sqrt_price_from_tick_index(tick_upper_index)?;

    if sqrt_price <= sqrt_price_lower {
        // Below the range: everything sits in token A
        let amount_a = get_amount_a_delta(sqrt_price_lower, sqrt_price_upper, liquidity, round_up)?;
        Ok((amount_a, 0))
    } else if sqrt_price < sqrt_price_upper {
        let amount_a = get_amount_a_delta(sqrt_price, sqrt_price_upper, liquidity, round_up)?;
        let amount_b = get_amount_b_delta(sqrt_price_lower, sqrt_price, liquidity, round_up)?;
        Ok((amount_a, amount_b))
    } else {
        // Above the range: everything sits in token B
        let amount_b = get_amount_b_delta(sqrt_price_lower, sqrt_price_upper, liquidity, round_up)?;
        Ok((0, amount_b))
    }
}

/// Liquidity supplied by `amount_a` of token A between two sqrt prices, rounded down.
pub fn get_liquidity_from_amount_a(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    amount_a: u64,
) -> Result<u128> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if lower == upper {
        return Ok(0);
    }

    let price_product = (U256::from(lower) * U256::from(upper)) >> 64;
    let liquidity = mul_div(
        U256::from(amount_a),
        price_product,
        U256::from(upper - lower),
        false,
    )?;
    to_u128(liquidity)
}

/// Liquidity supplied by `amount_b` of token B between two sqrt prices, rounded down.
pub fn get_liquidity_from_amount_b(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    amount_b: u64,
) -> Result<u128> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if lower == upper {
        return Ok(0);
    }

    let liquidity = mul_div(
        U256::from(amount_b),
        U256::from(Q64),
        U256::from(upper - lower),
        false,
    )?;
    to_u128(liquidity)
}

fn ordered(a: u128, b: u128) -> (u128, u128) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

fn mul_shr_128(a: u128, b: u128) -> Result<u128> {
    to_u128((U256::from(a) * U256::from(b)) >> 128)
}

fn mul_div(a: U256, b: U256, denominator: U256, round_up: bool) -> Result<U256> {
    require!(!denominator.is_zero(), LockboxError::MathOverflow);

    let product = a
        .checked_mul(b)
        .ok_or_else(|| error!(LockboxError::MathOverflow))?;
    let quotient = product / denominator;
    if round_up && !(product % denominator).is_zero() {
        Ok(quotient + U256::from(1u64))
    } else {
        Ok(quotient)
    }
}

fn to_u128(value: U256) -> Result<u128> {
    let limbs = value.as_limbs();
    require!(limbs[2] == 0 && limbs[3] == 0, LockboxError::MathOverflow);
    Ok(u128::from(limbs[0]) | (u128::from(limbs[1]) << 64))
}

fn to_u64(value: U256) -> Result<u64> {
    u64::try_from(to_u128(value)?).map_err(|_| error!(LockboxError::MathOverflow))
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

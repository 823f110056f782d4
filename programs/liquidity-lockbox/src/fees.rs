use anchor_lang::prelude::*;

use crate::{LockboxError, BPS_DENOMINATOR};

/// Protocol cut and holder payout for one withdrawal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee_a: u64,
    pub fee_b: u64,
    pub payout_a: u64,
    pub payout_b: u64,
}

pub fn validate_fee_rate(fee_rate_bps: u16) -> Result<()> {
    require!(u64::from(fee_rate_bps) <= BPS_DENOMINATOR, LockboxError::InvalidFeeRate);
    Ok(())
}

pub fn settle_fees(amount_a: u64, amount_b: u64, fee_rate_bps: u16) -> Result<FeeSplit> {
    validate_fee_rate(fee_rate_bps)?;

    let fee_a = fee_for(amount_a, fee_rate_bps);
    let fee_b = fee_for(amount_b, fee_rate_bps);
    Ok(FeeSplit {
        fee_a,
        fee_b,
        payout_a: amount_a - fee_a,
        payout_b: amount_b - fee_b,
    })
}

// Never exceeds `amount` while the rate is at most 100%.
fn fee_for(amount: u64, fee_rate_bps: u16) -> u64 {
    (u128::from(amount) * u128::from(fee_rate_bps) / u128::from(BPS_DENOMINATOR)) as u64
}

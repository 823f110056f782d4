use anchor_lang::prelude::*;

use crate::engine::PositionInfo;
use crate::{LockboxError, LOCKBOX_SEED, POSITION_RECORD_SEED};

/// Run-time configuration fixed when a lockbox is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockboxConfig {
    pub whirlpool_program: Pubkey,
    pub whirlpool: Pubkey,
    pub bridged_token_mint: Pubkey,
    pub token_account_a: Pubkey,
    pub token_account_b: Pubkey,
    pub fee_collector_token_account_a: Pubkey,
    pub fee_collector_token_account_b: Pubkey,
    pub fee_rate_bps: u16,
    pub quote_slippage_bps: u16,
}

// Vault state, one per bridged mint
#[account]
#[derive(Default, Debug, PartialEq, Eq)]
pub struct LiquidityLockbox {
    pub bump: [u8; 1],
    pub whirlpool_program: Pubkey,
    pub whirlpool: Pubkey,
    pub bridged_token_mint: Pubkey,

    // Receiving accounts for withdrawn principal
    pub token_account_a: Pubkey,
    pub token_account_b: Pubkey,

    // Protocol fee destinations
    pub fee_collector_token_account_a: Pubkey,
    pub fee_collector_token_account_b: Pubkey,

    pub fee_rate_bps: u16,
    pub quote_slippage_bps: u16,

    // Sum of liquidity over all records, equal to the bridged token supply
    pub total_liquidity: u128,
    pub num_positions: u32,
    pub first_available_index: u32,
}

impl LiquidityLockbox {
    pub const SIZE: usize = 8 + // discriminator
        1 +                     // bump
        32 * 7 +                // pubkeys
        2 + 2 +                 // fee rate + quote slippage
        16 +                    // total liquidity
        4 + 4;                  // num positions + first available index

    /// Signer seeds of the lockbox PDA for `bridged_token_mint`.
    pub fn signer_seeds<'a>(bridged_token_mint: &'a Pubkey, bump: &'a [u8; 1]) -> [&'a [u8]; 3] {
        [LOCKBOX_SEED, bridged_token_mint.as_ref(), bump]
    }

    pub fn address(program_id: &Pubkey, bridged_token_mint: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[LOCKBOX_SEED, bridged_token_mint.as_ref()], program_id)
    }

    pub fn initialize(&mut self, bump: u8, config: &LockboxConfig) -> Result<()> {
        crate::fees::validate_fee_rate(config.fee_rate_bps)?;
        crate::quote::validate_slippage(config.quote_slippage_bps)?;

        self.bump = [bump];
        self.whirlpool_program = config.whirlpool_program;
        self.whirlpool = config.whirlpool;
        self.bridged_token_mint = config.bridged_token_mint;
        self.token_account_a = config.token_account_a;
        self.token_account_b = config.token_account_b;
        self.fee_collector_token_account_a = config.fee_collector_token_account_a;
        self.fee_collector_token_account_b = config.fee_collector_token_account_b;
        self.fee_rate_bps = config.fee_rate_bps;
        self.quote_slippage_bps = config.quote_slippage_bps;
        self.total_liquidity = 0;
        self.num_positions = 0;
        self.first_available_index = 0;

        Ok(())
    }

    /// Reserves the next record index and accounts for its liquidity.
    pub fn register_position(&mut self, liquidity: u128) -> Result<u32> {
        let index = self.num_positions;
        let total_liquidity = self
            .total_liquidity
            .checked_add(liquidity)
            .ok_or_else(|| error!(LockboxError::LiquidityOverflow))?;
        let num_positions = index
            .checked_add(1)
            .ok_or_else(|| error!(LockboxError::MathOverflow))?;

        self.total_liquidity = total_liquidity;
        self.num_positions = num_positions;
        Ok(index)
    }

    pub fn release_liquidity(&mut self, liquidity: u128) -> Result<()> {
        self.total_liquidity = self
            .total_liquidity
            .checked_sub(liquidity)
            .ok_or_else(|| error!(LockboxError::LiquidityUnderflow))?;
        Ok(())
    }
}

// One record per admitted position
#[account]
#[derive(Default, Debug, PartialEq, Eq)]
pub struct LockboxPosition {
    pub lockbox: Pubkey,
    pub index: u32,
    pub bump: [u8; 1],
    pub position_account: Pubkey,
    pub position_mint: Pubkey,
    pub custody_account: Pubkey,
    pub liquidity: u128,
    pub tick_lower_index: i32,
    pub tick_upper_index: i32,
}

impl LockboxPosition {
    pub const SIZE: usize = 8 + // discriminator
        32 + 4 + 1 +            // lockbox + index + bump
        32 * 3 +                // position, mint, custody
        16 +                    // liquidity
        4 + 4;                  // tick range

    pub fn address(program_id: &Pubkey, lockbox: &Pubkey, index: u32) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[POSITION_RECORD_SEED, lockbox.as_ref(), &index.to_be_bytes()],
            program_id,
        )
    }

    pub fn initialize(
        &mut self,
        lockbox: Pubkey,
        index: u32,
        bump: u8,
        position_account: Pubkey,
        custody_account: Pubkey,
        position: &PositionInfo,
    ) {
        self.lockbox = lockbox;
        self.index = index;
        self.bump = [bump];
        self.position_account = position_account;
        self.position_mint = position.position_mint;
        self.custody_account = custody_account;
        self.liquidity = position.liquidity;
        self.tick_lower_index = position.tick_lower_index;
        self.tick_upper_index = position.tick_upper_index;
    }

    pub fn is_depleted(&self) -> bool {
        self.liquidity == 0
    }

    pub fn release_liquidity(&mut self, liquidity: u128) -> Result<()> {
        self.liquidity = self
            .liquidity
            .checked_sub(liquidity)
            .ok_or_else(|| error!(LockboxError::LiquidityUnderflow))?;
        Ok(())
    }
}

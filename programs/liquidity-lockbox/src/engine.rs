//! Collaborator seams: the liquidity-pool engine and the token ledger.
//!
//! The lockbox protocol is written against these traits. On chain they are
//! implemented by [`crate::cpi_env::LockboxCpi`], which issues CPIs to the
//! Whirlpool and SPL Token programs.

use anchor_lang::prelude::*;

/// Read-only view of the pool a lockbox serves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub whirlpool: Pubkey,
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub tick_spacing: u16,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
}

/// Read-only view of a pool position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub whirlpool: Pubkey,
    pub position_mint: Pubkey,
    pub liquidity: u128,
    pub tick_lower_index: i32,
    pub tick_upper_index: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenAmounts {
    pub token_a: u64,
    pub token_b: u64,
}

pub trait PoolEngine {
    fn pool(&self) -> Result<PoolSnapshot>;

    fn position(&self, position: &Pubkey) -> Result<PositionInfo>;

    /// Deterministic position account address for `position_mint`.
    fn position_address(&self, position_mint: &Pubkey) -> Pubkey;

    /// Fails when the required input exceeds either maximum.
    fn increase_liquidity(
        &mut self,
        position: &Pubkey,
        liquidity: u128,
        token_max_a: u64,
        token_max_b: u64,
    ) -> Result<TokenAmounts>;

    /// Fails when either output falls short of its minimum. Proceeds are
    /// credited to `destination_a` and `destination_b`.
    fn decrease_liquidity(
        &mut self,
        position: &Pubkey,
        liquidity: u128,
        token_min_a: u64,
        token_min_b: u64,
        destination_a: &Pubkey,
        destination_b: &Pubkey,
    ) -> Result<TokenAmounts>;

    /// Moves accrued trading fees of `position` to the destinations.
    fn collect_fees(
        &mut self,
        position: &Pubkey,
        destination_a: &Pubkey,
        destination_b: &Pubkey,
    ) -> Result<TokenAmounts>;
}

pub trait TokenLedger {
    fn balance_of(&self, account: &Pubkey) -> Result<u64>;

    fn mint_of(&self, account: &Pubkey) -> Result<Pubkey>;

    fn owner_of(&self, account: &Pubkey) -> Result<Pubkey>;

    fn mint_to(&mut self, mint: &Pubkey, destination: &Pubkey, amount: u64) -> Result<()>;

    fn transfer(&mut self, source: &Pubkey, destination: &Pubkey, amount: u64) -> Result<()>;

    fn burn(&mut self, account: &Pubkey, amount: u64) -> Result<()>;

    /// Closes an empty token account, returning its rent to `destination`.
    fn close_account(&mut self, account: &Pubkey, destination: &Pubkey) -> Result<()>;
}

//! In-memory stand-in for the SPL Token program and a single Whirlpool.

use std::collections::HashMap;

use anchor_lang::prelude::*;
use anchor_spl::associated_token::get_associated_token_address;

use crate::engine::{PoolEngine, PoolSnapshot, PositionInfo, TokenAmounts, TokenLedger};
use crate::math::{get_amounts_for_liquidity, Q64};
use crate::whirlpool::{position_address, WHIRLPOOL_PROGRAM_ID};

/// Full range for the simulated pool's tick spacing of 64.
pub const FULL_RANGE: (i32, i32) = (-443_584, 443_584);

/// Whirlpool `TokenMinSubceeded`.
pub const TOKEN_MIN_SUBCEEDED: u32 = 6018;
/// Whirlpool `TokenMaxExceeded`.
pub const TOKEN_MAX_EXCEEDED: u32 = 6017;
/// SPL Token `NonNativeHasBalance`.
pub const NON_NATIVE_HAS_BALANCE: u32 = 11;

const POOL_VAULT_FUNDING: u64 = u64::MAX / 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimTokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimPosition {
    pub info: PositionInfo,
    pub fees_owed_a: u64,
    pub fees_owed_b: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedChain {
    pub accounts: HashMap<Pubkey, SimTokenAccount>,
    pub supplies: HashMap<Pubkey, u64>,
    pub pool: PoolSnapshot,
    pub pool_vault_a: Pubkey,
    pub pool_vault_b: Pubkey,
    pub positions: HashMap<Pubkey, SimPosition>,
    /// Price the pool moves to right before the next liquidity decrease.
    pub pending_sqrt_price: Option<u128>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        let mut chain = Self {
            accounts: HashMap::new(),
            supplies: HashMap::new(),
            pool: PoolSnapshot {
                whirlpool: Pubkey::new_unique(),
                sqrt_price: Q64,
                tick_current_index: 0,
                tick_spacing: 64,
                token_mint_a: Pubkey::default(),
                token_mint_b: Pubkey::default(),
            },
            pool_vault_a: Pubkey::default(),
            pool_vault_b: Pubkey::default(),
            positions: HashMap::new(),
            pending_sqrt_price: None,
        };

        let whirlpool = chain.pool.whirlpool;
        chain.pool.token_mint_a = chain.create_mint();
        chain.pool.token_mint_b = chain.create_mint();
        chain.pool_vault_a = chain.create_token_account(chain.pool.token_mint_a, whirlpool);
        chain.pool_vault_b = chain.create_token_account(chain.pool.token_mint_b, whirlpool);
        chain.credit(chain.pool_vault_a, POOL_VAULT_FUNDING);
        chain.credit(chain.pool_vault_b, POOL_VAULT_FUNDING);
        chain
    }

    pub fn create_mint(&mut self) -> Pubkey {
        let mint = Pubkey::new_unique();
        self.supplies.insert(mint, 0);
        mint
    }

    pub fn create_token_account(&mut self, mint: Pubkey, owner: Pubkey) -> Pubkey {
        let account = Pubkey::new_unique();
        self.insert_token_account(account, mint, owner);
        account
    }

    pub fn create_associated_token_account(&mut self, mint: Pubkey, owner: Pubkey) -> Pubkey {
        let account = get_associated_token_address(&owner, &mint);
        self.insert_token_account(account, mint, owner);
        account
    }

    fn insert_token_account(&mut self, account: Pubkey, mint: Pubkey, owner: Pubkey) {
        self.accounts.entry(account).or_insert(SimTokenAccount {
            mint,
            owner,
            amount: 0,
        });
    }

    fn credit(&mut self, account: Pubkey, amount: u64) {
        if let Some(token_account) = self.accounts.get_mut(&account) {
            token_account.amount += amount;
            *self.supplies.entry(token_account.mint).or_default() += amount;
        }
    }

    pub fn supply(&self, mint: &Pubkey) -> u64 {
        self.supplies.get(mint).copied().unwrap_or_default()
    }

    /// Opens a position in the pool and hands its single token to `owner`.
    ///
    /// Returns (position, position mint, owner's token account).
    pub fn open_position(
        &mut self,
        owner: Pubkey,
        tick_lower_index: i32,
        tick_upper_index: i32,
        liquidity: u128,
    ) -> (Pubkey, Pubkey, Pubkey) {
        let position_mint = self.create_mint();
        let token_account = self.create_associated_token_account(position_mint, owner);
        self.credit(token_account, 1);

        let position = position_address(&WHIRLPOOL_PROGRAM_ID, &position_mint);
        self.positions.insert(
            position,
            SimPosition {
                info: PositionInfo {
                    whirlpool: self.pool.whirlpool,
                    position_mint,
                    liquidity,
                    tick_lower_index,
                    tick_upper_index,
                },
                fees_owed_a: 0,
                fees_owed_b: 0,
            },
        );
        (position, position_mint, token_account)
    }

    pub fn move_position_to_pool(&mut self, position: &Pubkey, whirlpool: Pubkey) {
        if let Some(entry) = self.positions.get_mut(position) {
            entry.info.whirlpool = whirlpool;
        }
    }

    /// Registers a copy of `position` under a non-canonical address.
    pub fn alias_position(&mut self, position: &Pubkey) -> Pubkey {
        let alias = Pubkey::new_unique();
        if let Some(entry) = self.positions.get(position).copied() {
            self.positions.insert(alias, entry);
        }
        alias
    }

    pub fn accrue_fees(&mut self, position: &Pubkey, fee_a: u64, fee_b: u64) {
        if let Some(entry) = self.positions.get_mut(position) {
            entry.fees_owed_a += fee_a;
            entry.fees_owed_b += fee_b;
        }
    }

    fn token_account(&self, account: &Pubkey) -> Result<&SimTokenAccount> {
        self.accounts
            .get(account)
            .ok_or_else(|| ProgramError::UninitializedAccount.into())
    }

    fn token_account_mut(&mut self, account: &Pubkey) -> Result<&mut SimTokenAccount> {
        self.accounts
            .get_mut(account)
            .ok_or_else(|| ProgramError::UninitializedAccount.into())
    }

    fn position_mut(&mut self, position: &Pubkey) -> Result<&mut SimPosition> {
        self.positions
            .get_mut(position)
            .ok_or_else(|| ProgramError::UninitializedAccount.into())
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenLedger for SimulatedChain {
    fn balance_of(&self, account: &Pubkey) -> Result<u64> {
        Ok(self.token_account(account)?.amount)
    }

    fn mint_of(&self, account: &Pubkey) -> Result<Pubkey> {
        Ok(self.token_account(account)?.mint)
    }

    fn owner_of(&self, account: &Pubkey) -> Result<Pubkey> {
        Ok(self.token_account(account)?.owner)
    }

    fn mint_to(&mut self, mint: &Pubkey, destination: &Pubkey, amount: u64) -> Result<()> {
        let supply = self
            .supply(mint)
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        let token_account = self.token_account_mut(destination)?;
        if token_account.mint != *mint {
            return Err(ProgramError::InvalidAccountData.into());
        }
        token_account.amount += amount;
        self.supplies.insert(*mint, supply);
        Ok(())
    }

    fn transfer(&mut self, source: &Pubkey, destination: &Pubkey, amount: u64) -> Result<()> {
        let from = *self.token_account(source)?;
        let to = *self.token_account(destination)?;
        if from.mint != to.mint {
            return Err(ProgramError::InvalidAccountData.into());
        }
        if from.amount < amount {
            return Err(ProgramError::InsufficientFunds.into());
        }
        self.token_account_mut(source)?.amount -= amount;
        self.token_account_mut(destination)?.amount += amount;
        Ok(())
    }

    fn burn(&mut self, account: &Pubkey, amount: u64) -> Result<()> {
        let token_account = self.token_account_mut(account)?;
        if token_account.amount < amount {
            return Err(ProgramError::InsufficientFunds.into());
        }
        token_account.amount -= amount;
        let mint = token_account.mint;
        *self.supplies.entry(mint).or_default() -= amount;
        Ok(())
    }

    fn close_account(&mut self, account: &Pubkey, _destination: &Pubkey) -> Result<()> {
        if self.token_account(account)?.amount != 0 {
            return Err(ProgramError::Custom(NON_NATIVE_HAS_BALANCE).into());
        }
        self.accounts.remove(account);
        Ok(())
    }
}

impl PoolEngine for SimulatedChain {
    fn pool(&self) -> Result<PoolSnapshot> {
        Ok(self.pool)
    }

    fn position(&self, position: &Pubkey) -> Result<PositionInfo> {
        self.positions
            .get(position)
            .map(|entry| entry.info)
            .ok_or_else(|| ProgramError::UninitializedAccount.into())
    }

    fn position_address(&self, position_mint: &Pubkey) -> Pubkey {
        position_address(&WHIRLPOOL_PROGRAM_ID, position_mint)
    }

    fn increase_liquidity(
        &mut self,
        position: &Pubkey,
        liquidity: u128,
        token_max_a: u64,
        token_max_b: u64,
    ) -> Result<TokenAmounts> {
        let sqrt_price = self.pool.sqrt_price;
        let entry = self.position_mut(position)?;
        let (token_a, token_b) = get_amounts_for_liquidity(
            sqrt_price,
            entry.info.tick_lower_index,
            entry.info.tick_upper_index,
            liquidity,
            true,
        )?;
        if token_a > token_max_a || token_b > token_max_b {
            return Err(ProgramError::Custom(TOKEN_MAX_EXCEEDED).into());
        }
        entry.info.liquidity = entry
            .info
            .liquidity
            .checked_add(liquidity)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(TokenAmounts { token_a, token_b })
    }

    fn decrease_liquidity(
        &mut self,
        position: &Pubkey,
        liquidity: u128,
        token_min_a: u64,
        token_min_b: u64,
        destination_a: &Pubkey,
        destination_b: &Pubkey,
    ) -> Result<TokenAmounts> {
        if let Some(sqrt_price) = self.pending_sqrt_price.take() {
            self.pool.sqrt_price = sqrt_price;
        }

        let sqrt_price = self.pool.sqrt_price;
        let entry = self.position_mut(position)?;
        let (token_a, token_b) = get_amounts_for_liquidity(
            sqrt_price,
            entry.info.tick_lower_index,
            entry.info.tick_upper_index,
            liquidity,
            false,
        )?;
        if token_a < token_min_a || token_b < token_min_b {
            return Err(ProgramError::Custom(TOKEN_MIN_SUBCEEDED).into());
        }
        entry.info.liquidity = entry
            .info
            .liquidity
            .checked_sub(liquidity)
            .ok_or(ProgramError::ArithmeticOverflow)?;

        let (vault_a, vault_b) = (self.pool_vault_a, self.pool_vault_b);
        self.transfer(&vault_a, destination_a, token_a)?;
        self.transfer(&vault_b, destination_b, token_b)?;
        Ok(TokenAmounts { token_a, token_b })
    }

    fn collect_fees(
        &mut self,
        position: &Pubkey,
        destination_a: &Pubkey,
        destination_b: &Pubkey,
    ) -> Result<TokenAmounts> {
        let entry = self.position_mut(position)?;
        let collected = TokenAmounts {
            token_a: std::mem::take(&mut entry.fees_owed_a),
            token_b: std::mem::take(&mut entry.fees_owed_b),
        };

        let (vault_a, vault_b) = (self.pool_vault_a, self.pool_vault_b);
        self.transfer(&vault_a, destination_a, collected.token_a)?;
        self.transfer(&vault_b, destination_b, collected.token_b)?;
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_increase_then_decrease_round_trips_liquidity() {
        let mut chain = SimulatedChain::new();
        let owner = Pubkey::new_unique();
        let (position, _, _) = chain.open_position(owner, -6_400, 6_400, 0);
        let dest_a = chain.create_token_account(chain.pool.token_mint_a, owner);
        let dest_b = chain.create_token_account(chain.pool.token_mint_b, owner);

        let added = chain.increase_liquidity(&position, 1_000_000, u64::MAX, u64::MAX).unwrap();
        let removed = chain
            .decrease_liquidity(&position, 1_000_000, 0, 0, &dest_a, &dest_b)
            .unwrap();

        assert!(removed.token_a <= added.token_a && added.token_a - removed.token_a <= 1);
        assert!(removed.token_b <= added.token_b && added.token_b - removed.token_b <= 1);
        assert_eq!(chain.position(&position).unwrap().liquidity, 0);
        assert_eq!(chain.balance_of(&dest_a).unwrap(), removed.token_a);
    }

    #[rstest]
    fn test_increase_respects_maxima() {
        let mut chain = SimulatedChain::new();
        let (position, _, _) = chain.open_position(Pubkey::new_unique(), -6_400, 6_400, 0);
        let err = chain.increase_liquidity(&position, 1_000_000, 1, 1).unwrap_err();
        assert_eq!(err, ProgramError::Custom(TOKEN_MAX_EXCEEDED).into());
    }

    #[rstest]
    fn test_close_account_requires_empty_balance() {
        let mut chain = SimulatedChain::new();
        let owner = Pubkey::new_unique();
        let (_, position_mint, token_account) = chain.open_position(owner, -6_400, 6_400, 1);
        let custody = chain.create_token_account(position_mint, Pubkey::new_unique());

        assert_eq!(
            chain.close_account(&token_account, &owner).unwrap_err(),
            ProgramError::Custom(NON_NATIVE_HAS_BALANCE).into()
        );
        chain.transfer(&token_account, &custody, 1).unwrap();
        chain.close_account(&token_account, &owner).unwrap();
        assert!(chain.balance_of(&token_account).is_err());
    }

    #[rstest]
    fn test_transfer_rejects_overdraft() {
        let mut chain = SimulatedChain::new();
        let mint = chain.create_mint();
        let from = chain.create_token_account(mint, Pubkey::new_unique());
        let to = chain.create_token_account(mint, Pubkey::new_unique());
        assert_eq!(
            chain.transfer(&from, &to, 1).unwrap_err(),
            ProgramError::InsufficientFunds.into()
        );
    }
}

//! On-chain collaborator environment: the engine and ledger traits backed by
//! CPIs into the Whirlpool and SPL Token programs.

use anchor_lang::error::ErrorCode;
use anchor_lang::prelude::*;
use anchor_spl::token::{self, Burn, CloseAccount, MintTo, TokenAccount, Transfer};
use solana_program::program::{invoke, invoke_signed};

use crate::engine::{PoolEngine, PoolSnapshot, PositionInfo, TokenAmounts, TokenLedger};
use crate::whirlpool::{self, ModifyLiquidityKeys, PositionData, WhirlpoolData};
use crate::LockboxError;

/// Position-specific Whirlpool accounts needed to modify liquidity.
#[derive(Clone, Copy, Debug)]
pub struct PoolCpiAccounts {
    pub position_token_account: Pubkey,
    pub tick_array_lower: Pubkey,
    pub tick_array_upper: Pubkey,
}

pub struct LockboxCpi<'a, 'info> {
    token_program: AccountInfo<'info>,
    whirlpool_program: AccountInfo<'info>,
    whirlpool: Pubkey,
    lockbox: AccountInfo<'info>,
    lockbox_seeds: &'a [&'a [u8]],
    user: AccountInfo<'info>,
    accounts: Vec<AccountInfo<'info>>,
    pool_accounts: Option<PoolCpiAccounts>,
}

impl<'a, 'info> LockboxCpi<'a, 'info> {
    /// `accounts` lists every other account the instruction may touch.
    pub fn new(
        token_program: AccountInfo<'info>,
        whirlpool_program: AccountInfo<'info>,
        whirlpool: Pubkey,
        lockbox: AccountInfo<'info>,
        lockbox_seeds: &'a [&'a [u8]],
        user: AccountInfo<'info>,
        mut accounts: Vec<AccountInfo<'info>>,
    ) -> Self {
        accounts.extend([
            token_program.clone(),
            whirlpool_program.clone(),
            lockbox.clone(),
            user.clone(),
        ]);
        Self {
            token_program,
            whirlpool_program,
            whirlpool,
            lockbox,
            lockbox_seeds,
            user,
            accounts,
            pool_accounts: None,
        }
    }

    pub fn with_pool_accounts(mut self, pool_accounts: PoolCpiAccounts) -> Self {
        self.pool_accounts = Some(pool_accounts);
        self
    }

    fn account(&self, key: &Pubkey) -> Result<&AccountInfo<'info>> {
        self.accounts
            .iter()
            .find(|info| info.key == key)
            .ok_or_else(|| error!(ErrorCode::AccountNotEnoughKeys))
    }

    fn token_account(&self, key: &Pubkey) -> Result<TokenAccount> {
        let info = self.account(key)?;
        require_keys_eq!(*info.owner, token::ID, ErrorCode::AccountOwnedByWrongProgram);
        let data = info.try_borrow_data()?;
        TokenAccount::try_deserialize(&mut &data[..])
    }

    fn whirlpool_data(&self) -> Result<WhirlpoolData> {
        let info = self.account(&self.whirlpool)?;
        require_keys_eq!(*info.owner, *self.whirlpool_program.key, LockboxError::WrongOwner);
        let data = info.try_borrow_data()?;
        WhirlpoolData::try_from_slice(&data)
    }

    fn pool_accounts(&self) -> Result<PoolCpiAccounts> {
        self.pool_accounts
            .ok_or_else(|| error!(ErrorCode::AccountNotEnoughKeys))
    }

    fn modify_liquidity_keys(
        &self,
        position: &Pubkey,
        owner_account_a: &Pubkey,
        owner_account_b: &Pubkey,
    ) -> Result<ModifyLiquidityKeys> {
        let pool = self.whirlpool_data()?;
        let pool_accounts = self.pool_accounts()?;
        Ok(ModifyLiquidityKeys {
            whirlpool: self.whirlpool,
            token_program: *self.token_program.key,
            position_authority: *self.lockbox.key,
            position: *position,
            position_token_account: pool_accounts.position_token_account,
            token_owner_account_a: *owner_account_a,
            token_owner_account_b: *owner_account_b,
            token_vault_a: pool.token_vault_a,
            token_vault_b: pool.token_vault_b,
            tick_array_lower: pool_accounts.tick_array_lower,
            tick_array_upper: pool_accounts.tick_array_upper,
        })
    }

    fn balances(&self, account_a: &Pubkey, account_b: &Pubkey) -> Result<(u64, u64)> {
        Ok((self.balance_of(account_a)?, self.balance_of(account_b)?))
    }
}

fn delta(before: u64, after: u64) -> Result<u64> {
    after
        .checked_sub(before)
        .ok_or_else(|| error!(LockboxError::MathOverflow))
}

impl TokenLedger for LockboxCpi<'_, '_> {
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
        let mint_instruction = MintTo {
            mint: self.account(mint)?.clone(),
            to: self.account(destination)?.clone(),
            authority: self.lockbox.clone(),
        };
        let signer = &[self.lockbox_seeds];

        token::mint_to(
            CpiContext::new_with_signer(self.token_program.clone(), mint_instruction, signer),
            amount,
        )
    }

    fn transfer(&mut self, source: &Pubkey, destination: &Pubkey, amount: u64) -> Result<()> {
        let from_lockbox = self.token_account(source)?.owner == *self.lockbox.key;
        let authority = if from_lockbox {
            self.lockbox.clone()
        } else {
            self.user.clone()
        };
        let transfer_instruction = Transfer {
            from: self.account(source)?.clone(),
            to: self.account(destination)?.clone(),
            authority,
        };

        if from_lockbox {
            let signer = &[self.lockbox_seeds];
            token::transfer(
                CpiContext::new_with_signer(self.token_program.clone(), transfer_instruction, signer),
                amount,
            )
        } else {
            token::transfer(
                CpiContext::new(self.token_program.clone(), transfer_instruction),
                amount,
            )
        }
    }

    fn burn(&mut self, account: &Pubkey, amount: u64) -> Result<()> {
        let mint = self.token_account(account)?.mint;
        let burn_instruction = Burn {
            mint: self.account(&mint)?.clone(),
            from: self.account(account)?.clone(),
            authority: self.user.clone(),
        };

        token::burn(
            CpiContext::new(self.token_program.clone(), burn_instruction),
            amount,
        )
    }

    fn close_account(&mut self, account: &Pubkey, destination: &Pubkey) -> Result<()> {
        let close_instruction = CloseAccount {
            account: self.account(account)?.clone(),
            destination: self.account(destination)?.clone(),
            authority: self.user.clone(),
        };

        token::close_account(CpiContext::new(self.token_program.clone(), close_instruction))
    }
}

impl PoolEngine for LockboxCpi<'_, '_> {
    fn pool(&self) -> Result<PoolSnapshot> {
        let pool = self.whirlpool_data()?;
        Ok(PoolSnapshot {
            whirlpool: self.whirlpool,
            sqrt_price: pool.sqrt_price,
            tick_current_index: pool.tick_current_index,
            tick_spacing: pool.tick_spacing,
            token_mint_a: pool.token_mint_a,
            token_mint_b: pool.token_mint_b,
        })
    }

    fn position(&self, position: &Pubkey) -> Result<PositionInfo> {
        let info = self.account(position)?;
        require_keys_eq!(*info.owner, *self.whirlpool_program.key, LockboxError::WrongOwner);
        let data = info.try_borrow_data()?;
        let position = PositionData::try_from_slice(&data)?;
        Ok(PositionInfo {
            whirlpool: position.whirlpool,
            position_mint: position.position_mint,
            liquidity: position.liquidity,
            tick_lower_index: position.tick_lower_index,
            tick_upper_index: position.tick_upper_index,
        })
    }

    fn position_address(&self, position_mint: &Pubkey) -> Pubkey {
        whirlpool::position_address(self.whirlpool_program.key, position_mint)
    }

    /// No lockbox instruction adds liquidity to a custodied position.
    fn increase_liquidity(
        &mut self,
        _position: &Pubkey,
        _liquidity: u128,
        _token_max_a: u64,
        _token_max_b: u64,
    ) -> Result<TokenAmounts> {
        err!(LockboxError::IncreaseNotSupported)
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
        let keys = self.modify_liquidity_keys(position, destination_a, destination_b)?;
        let before = self.balances(destination_a, destination_b)?;

        let ix = whirlpool::decrease_liquidity_ix(
            *self.whirlpool_program.key,
            &keys,
            liquidity,
            token_min_a,
            token_min_b,
        );
        invoke_signed(&ix, &self.accounts, &[self.lockbox_seeds])?;

        let after = self.balances(destination_a, destination_b)?;
        Ok(TokenAmounts {
            token_a: delta(before.0, after.0)?,
            token_b: delta(before.1, after.1)?,
        })
    }

    fn collect_fees(
        &mut self,
        position: &Pubkey,
        destination_a: &Pubkey,
        destination_b: &Pubkey,
    ) -> Result<TokenAmounts> {
        let pool = self.whirlpool_data()?;
        let pool_accounts = self.pool_accounts()?;
        let program_id = *self.whirlpool_program.key;
        let before = self.balances(destination_a, destination_b)?;

        let update_ix = whirlpool::update_fees_and_rewards_ix(
            program_id,
            self.whirlpool,
            *position,
            pool_accounts.tick_array_lower,
            pool_accounts.tick_array_upper,
        );
        invoke(&update_ix, &self.accounts)?;

        let collect_ix = whirlpool::collect_fees_ix(
            program_id,
            self.whirlpool,
            *self.lockbox.key,
            *position,
            pool_accounts.position_token_account,
            *destination_a,
            pool.token_vault_a,
            *destination_b,
            pool.token_vault_b,
            *self.token_program.key,
        );
        invoke_signed(&collect_ix, &self.accounts, &[self.lockbox_seeds])?;

        let after = self.balances(destination_a, destination_b)?;
        Ok(TokenAmounts {
            token_a: delta(before.0, after.0)?,
            token_b: delta(before.1, after.1)?,
        })
    }
}

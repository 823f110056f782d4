use anchor_lang::prelude::*;
use anchor_lang::solana_program::program_option::COption;
use anchor_spl::associated_token::AssociatedToken;
use anchor_spl::token::{Mint, Token, TokenAccount};

pub mod cpi_env;
pub mod engine;
pub mod fees;
pub mod math;
pub mod protocol;
pub mod quote;
pub mod registry;
pub mod state;
pub mod whirlpool;

#[cfg(test)]
pub mod testing;

use crate::cpi_env::{LockboxCpi, PoolCpiAccounts};
use crate::protocol::{DepositAccounts, RedemptionLeg, WithdrawAccounts, WithdrawRequest};
use crate::state::{LiquidityLockbox, LockboxConfig, LockboxPosition};
use crate::whirlpool::WhirlpoolData;

declare_id!("7ahQGWysExobjeZ91RTsNqTCN3kWyHGZ43ud2vB7VVoZ");

#[program]
pub mod liquidity_lockbox {
    use super::*;

    pub fn initialize(
        ctx: Context<InitializeLockbox>,
        fee_rate_bps: u16,
        quote_slippage_bps: u16,
    ) -> Result<()> {
        let lockbox_key = ctx.accounts.lockbox.key();
        let bridged_token_mint = &ctx.accounts.bridged_token_mint;
        require!(
            bridged_token_mint.mint_authority == COption::Some(lockbox_key)
                && bridged_token_mint.supply == 0,
            LockboxError::WrongBridgedMint
        );

        let pool = {
            let data = ctx.accounts.whirlpool.try_borrow_data()?;
            WhirlpoolData::try_from_slice(&data)?
        };
        require_keys_eq!(pool.token_mint_a, ctx.accounts.token_mint_a.key(), LockboxError::MintMismatch);
        require_keys_eq!(pool.token_mint_b, ctx.accounts.token_mint_b.key(), LockboxError::MintMismatch);

        let config = LockboxConfig {
            whirlpool_program: ctx.accounts.whirlpool_program.key(),
            whirlpool: ctx.accounts.whirlpool.key(),
            bridged_token_mint: bridged_token_mint.key(),
            token_account_a: ctx.accounts.token_account_a.key(),
            token_account_b: ctx.accounts.token_account_b.key(),
            fee_collector_token_account_a: ctx.accounts.fee_collector_token_account_a.key(),
            fee_collector_token_account_b: ctx.accounts.fee_collector_token_account_b.key(),
            fee_rate_bps,
            quote_slippage_bps,
        };
        ctx.accounts.lockbox.initialize(ctx.bumps.lockbox, &config)?;

        emit!(LockboxInitialized {
            lockbox: lockbox_key,
            bridged_token_mint: config.bridged_token_mint,
            whirlpool: config.whirlpool,
            fee_rate_bps,
            quote_slippage_bps,
        });

        Ok(())
    }

    pub fn deposit(ctx: Context<DepositPositionForLiquidity>, id: u32, liquidity_hint: u64) -> Result<()> {
        let lockbox_key = ctx.accounts.lockbox.key();
        let bridged_token_mint = ctx.accounts.lockbox.bridged_token_mint;
        let bump = ctx.accounts.lockbox.bump;
        let seeds = LiquidityLockbox::signer_seeds(&bridged_token_mint, &bump);
        let lockbox_seeds: &[&[u8]] = &seeds;

        let mut env = LockboxCpi::new(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.whirlpool_program.to_account_info(),
            ctx.accounts.whirlpool.key(),
            ctx.accounts.lockbox.to_account_info(),
            lockbox_seeds,
            ctx.accounts.position_authority.to_account_info(),
            vec![
                ctx.accounts.whirlpool.to_account_info(),
                ctx.accounts.position.to_account_info(),
                ctx.accounts.position_mint.to_account_info(),
                ctx.accounts.position_token_account.to_account_info(),
                ctx.accounts.custody_account.to_account_info(),
                ctx.accounts.bridged_token_mint.to_account_info(),
                ctx.accounts.bridged_token_account.to_account_info(),
            ],
        );

        let accounts = DepositAccounts {
            depositor: ctx.accounts.position_authority.key(),
            position: ctx.accounts.position.key(),
            position_mint: ctx.accounts.position_mint.key(),
            position_token_account: ctx.accounts.position_token_account.key(),
            custody_account: ctx.accounts.custody_account.key(),
            bridged_token_account: ctx.accounts.bridged_token_account.key(),
        };

        let receipt = protocol::deposit(
            &mut env,
            &lockbox_key,
            &mut ctx.accounts.lockbox,
            &mut ctx.accounts.lockbox_position,
            ctx.bumps.lockbox_position,
            &accounts,
            id,
            liquidity_hint,
        )?;

        emit!(DepositEvent {
            lockbox: lockbox_key,
            depositor: accounts.depositor,
            index: receipt.index,
            position: accounts.position,
            liquidity: receipt.liquidity,
            total_liquidity: ctx.accounts.lockbox.total_liquidity,
        });

        Ok(())
    }

    pub fn withdraw(
        ctx: Context<WithdrawLiquidityForTokens>,
        index: u32,
        amount: u64,
        token_min_a: u64,
        token_min_b: u64,
    ) -> Result<()> {
        let lockbox_key = ctx.accounts.lockbox.key();
        let bridged_token_mint = ctx.accounts.lockbox.bridged_token_mint;
        let bump = ctx.accounts.lockbox.bump;
        let seeds = LiquidityLockbox::signer_seeds(&bridged_token_mint, &bump);
        let lockbox_seeds: &[&[u8]] = &seeds;

        let pool_accounts = PoolCpiAccounts {
            position_token_account: ctx.accounts.custody_account.key(),
            tick_array_lower: ctx.accounts.tick_array_lower.key(),
            tick_array_upper: ctx.accounts.tick_array_upper.key(),
        };
        let mut env = LockboxCpi::new(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.whirlpool_program.to_account_info(),
            ctx.accounts.whirlpool.key(),
            ctx.accounts.lockbox.to_account_info(),
            lockbox_seeds,
            ctx.accounts.signer.to_account_info(),
            vec![
                ctx.accounts.whirlpool.to_account_info(),
                ctx.accounts.bridged_token_mint.to_account_info(),
                ctx.accounts.bridged_token_account.to_account_info(),
                ctx.accounts.position.to_account_info(),
                ctx.accounts.custody_account.to_account_info(),
                ctx.accounts.token_account_a.to_account_info(),
                ctx.accounts.token_account_b.to_account_info(),
                ctx.accounts.fee_collector_token_account_a.to_account_info(),
                ctx.accounts.fee_collector_token_account_b.to_account_info(),
                ctx.accounts.token_owner_account_a.to_account_info(),
                ctx.accounts.token_owner_account_b.to_account_info(),
                ctx.accounts.token_vault_a.to_account_info(),
                ctx.accounts.token_vault_b.to_account_info(),
                ctx.accounts.tick_array_lower.to_account_info(),
                ctx.accounts.tick_array_upper.to_account_info(),
            ],
        )
        .with_pool_accounts(pool_accounts);

        let accounts = WithdrawAccounts {
            owner: ctx.accounts.signer.key(),
            bridged_token_account: ctx.accounts.bridged_token_account.key(),
            token_owner_account_a: ctx.accounts.token_owner_account_a.key(),
            token_owner_account_b: ctx.accounts.token_owner_account_b.key(),
        };
        let request = WithdrawRequest {
            index,
            amount,
            token_min_a,
            token_min_b,
        };

        let receipt = protocol::withdraw(
            &mut env,
            &lockbox_key,
            &mut ctx.accounts.lockbox,
            &mut ctx.accounts.lockbox_position,
            &accounts,
            &request,
        )?;

        emit!(WithdrawEvent {
            lockbox: lockbox_key,
            owner: accounts.owner,
            index: receipt.index,
            liquidity: receipt.liquidity,
            amount_a: receipt.split.payout_a,
            amount_b: receipt.split.payout_b,
            fee_a: receipt.split.fee_a,
            fee_b: receipt.split.fee_b,
            remaining_liquidity: receipt.remaining_liquidity,
        });

        Ok(())
    }

    /// Lists the positions and per-position liquidity that redeem `amount`.
    /// Position records are passed as remaining accounts in index order.
    pub fn get_liquidity_amounts_and_positions(
        ctx: Context<LiquidityLockboxState>,
        amount: u64,
    ) -> Result<Vec<RedemptionLeg>> {
        let lockbox_key = ctx.accounts.lockbox.key();

        let mut records = Vec::with_capacity(ctx.remaining_accounts.len());
        for info in ctx.remaining_accounts {
            require_keys_eq!(*info.owner, crate::ID, LockboxError::UnknownPosition);
            let record = LockboxPosition::try_deserialize(&mut &info.try_borrow_data()?[..])?;
            require_keys_eq!(record.lockbox, lockbox_key, LockboxError::UnknownPosition);
            records.push(record);
        }

        protocol::plan_redemption(&ctx.accounts.lockbox, &records, amount)
    }
}

// Account contexts

#[derive(Accounts)]
pub struct InitializeLockbox<'info> {
    #[account(mut)]
    pub signer: Signer<'info>,

    pub bridged_token_mint: Box<Account<'info, Mint>>,

    #[account(
        init,
        payer = signer,
        space = LiquidityLockbox::SIZE,
        seeds = [LOCKBOX_SEED, bridged_token_mint.key().as_ref()],
        bump,
    )]
    pub lockbox: Box<Account<'info, LiquidityLockbox>>,

    /// CHECK: Pinned to the Whirlpool program id
    #[account(address = whirlpool::WHIRLPOOL_PROGRAM_ID)]
    pub whirlpool_program: UncheckedAccount<'info>,

    /// CHECK: Decoded in the handler
    #[account(owner = whirlpool_program.key() @ LockboxError::WrongOwner)]
    pub whirlpool: UncheckedAccount<'info>,

    pub token_mint_a: Box<Account<'info, Mint>>,
    pub token_mint_b: Box<Account<'info, Mint>>,

    #[account(
        init,
        payer = signer,
        associated_token::mint = token_mint_a,
        associated_token::authority = lockbox,
    )]
    pub token_account_a: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = signer,
        associated_token::mint = token_mint_b,
        associated_token::authority = lockbox,
    )]
    pub token_account_b: Box<Account<'info, TokenAccount>>,

    #[account(constraint = fee_collector_token_account_a.mint == token_mint_a.key() @ LockboxError::WrongFeeCollector)]
    pub fee_collector_token_account_a: Box<Account<'info, TokenAccount>>,

    #[account(
        constraint = fee_collector_token_account_b.mint == token_mint_b.key() @ LockboxError::WrongFeeCollector,
        constraint = fee_collector_token_account_b.key() != fee_collector_token_account_a.key() @ LockboxError::WrongFeeCollector,
    )]
    pub fee_collector_token_account_b: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(id: u32)]
pub struct DepositPositionForLiquidity<'info> {
    #[account(mut)]
    pub position_authority: Signer<'info>,

    #[account(
        mut,
        seeds = [LOCKBOX_SEED, lockbox.bridged_token_mint.as_ref()],
        bump = lockbox.bump[0],
    )]
    pub lockbox: Box<Account<'info, LiquidityLockbox>>,

    /// CHECK: Whirlpool position, decoded and verified against the pool
    pub position: UncheckedAccount<'info>,

    pub position_mint: Box<Account<'info, Mint>>,

    #[account(mut)]
    pub position_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = position_authority,
        associated_token::mint = position_mint,
        associated_token::authority = lockbox,
    )]
    pub custody_account: Box<Account<'info, TokenAccount>>,

    #[account(mut, address = lockbox.bridged_token_mint @ LockboxError::WrongBridgedMint)]
    pub bridged_token_mint: Box<Account<'info, Mint>>,

    #[account(mut)]
    pub bridged_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = position_authority,
        space = LockboxPosition::SIZE,
        seeds = [POSITION_RECORD_SEED, lockbox.key().as_ref(), &id.to_be_bytes()],
        bump,
    )]
    pub lockbox_position: Box<Account<'info, LockboxPosition>>,

    /// CHECK: Pinned to the lockbox pool
    #[account(address = lockbox.whirlpool @ LockboxError::WrongWhirlpool)]
    pub whirlpool: UncheckedAccount<'info>,

    /// CHECK: Pinned to the lockbox configuration
    #[account(address = lockbox.whirlpool_program)]
    pub whirlpool_program: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(index: u32)]
pub struct WithdrawLiquidityForTokens<'info> {
    pub signer: Signer<'info>,

    #[account(
        mut,
        seeds = [LOCKBOX_SEED, lockbox.bridged_token_mint.as_ref()],
        bump = lockbox.bump[0],
    )]
    pub lockbox: Box<Account<'info, LiquidityLockbox>>,

    /// CHECK: Pinned to the lockbox pool
    #[account(mut, address = lockbox.whirlpool @ LockboxError::WrongWhirlpool)]
    pub whirlpool: UncheckedAccount<'info>,

    #[account(mut, address = lockbox.bridged_token_mint @ LockboxError::WrongBridgedMint)]
    pub bridged_token_mint: Box<Account<'info, Mint>>,

    #[account(
        mut,
        constraint = bridged_token_account.owner == signer.key() @ LockboxError::WrongOwner,
    )]
    pub bridged_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [POSITION_RECORD_SEED, lockbox.key().as_ref(), &index.to_be_bytes()],
        bump = lockbox_position.bump[0],
    )]
    pub lockbox_position: Box<Account<'info, LockboxPosition>>,

    /// CHECK: Must be the position held by the record
    #[account(mut, address = lockbox_position.position_account @ LockboxError::UnknownPosition)]
    pub position: UncheckedAccount<'info>,

    #[account(address = lockbox_position.custody_account @ LockboxError::BadCustody)]
    pub custody_account: Box<Account<'info, TokenAccount>>,

    #[account(mut, address = lockbox.token_account_a)]
    pub token_account_a: Box<Account<'info, TokenAccount>>,

    #[account(mut, address = lockbox.token_account_b)]
    pub token_account_b: Box<Account<'info, TokenAccount>>,

    #[account(mut, address = lockbox.fee_collector_token_account_a @ LockboxError::WrongFeeCollector)]
    pub fee_collector_token_account_a: Box<Account<'info, TokenAccount>>,

    #[account(mut, address = lockbox.fee_collector_token_account_b @ LockboxError::WrongFeeCollector)]
    pub fee_collector_token_account_b: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub token_owner_account_a: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub token_owner_account_b: Box<Account<'info, TokenAccount>>,

    /// CHECK: Pool vault, validated by the Whirlpool program
    #[account(mut)]
    pub token_vault_a: UncheckedAccount<'info>,

    /// CHECK: Pool vault, validated by the Whirlpool program
    #[account(mut)]
    pub token_vault_b: UncheckedAccount<'info>,

    /// CHECK: Tick array, validated by the Whirlpool program
    #[account(mut)]
    pub tick_array_lower: UncheckedAccount<'info>,

    /// CHECK: Tick array, validated by the Whirlpool program
    #[account(mut)]
    pub tick_array_upper: UncheckedAccount<'info>,

    /// CHECK: Pinned to the lockbox configuration
    #[account(address = lockbox.whirlpool_program)]
    pub whirlpool_program: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct LiquidityLockboxState<'info> {
    pub lockbox: Box<Account<'info, LiquidityLockbox>>,
}

// Constants
pub const LOCKBOX_SEED: &[u8] = b"liquidity_lockbox";
pub const POSITION_RECORD_SEED: &[u8] = b"lockbox_position";

pub const BPS_DENOMINATOR: u64 = 10_000;

// Events
#[event]
pub struct LockboxInitialized {
    pub lockbox: Pubkey,
    pub bridged_token_mint: Pubkey,
    pub whirlpool: Pubkey,
    pub fee_rate_bps: u16,
    pub quote_slippage_bps: u16,
}

#[event]
pub struct DepositEvent {
    pub lockbox: Pubkey,
    pub depositor: Pubkey,
    pub index: u32,
    pub position: Pubkey,
    pub liquidity: u64,
    pub total_liquidity: u128,
}

#[event]
pub struct WithdrawEvent {
    pub lockbox: Pubkey,
    pub owner: Pubkey,
    pub index: u32,
    pub liquidity: u64,
    pub amount_a: u64,
    pub amount_b: u64,
    pub fee_a: u64,
    pub fee_b: u64,
    pub remaining_liquidity: u128,
}

// Error codes
#[error_code]
pub enum LockboxError {
    #[msg("Token account does not hold exactly one position token of the depositor")]
    NotAPosition,

    #[msg("Custody account is not the lockbox associated token account for the position")]
    BadCustody,

    #[msg("Token mint mismatch")]
    MintMismatch,

    #[msg("Unknown position")]
    UnknownPosition,

    #[msg("Position is already in custody")]
    AlreadyDeposited,

    #[msg("Invalid tick range")]
    InvalidRange,

    #[msg("Wrong whirlpool")]
    WrongWhirlpool,

    #[msg("Wrong position PDA")]
    WrongPositionPDA,

    #[msg("Wrong position id")]
    WrongPositionId,

    #[msg("Wrong account owner")]
    WrongOwner,

    #[msg("Bridged token mint must be owned by the lockbox with zero supply")]
    WrongBridgedMint,

    #[msg("Wrong fee collector")]
    WrongFeeCollector,

    #[msg("Fee rate above 100%")]
    InvalidFeeRate,

    #[msg("Slippage above 100%")]
    InvalidSlippage,

    #[msg("Liquidity is zero")]
    LiquidityZero,

    #[msg("Wrong position header")]
    WrongPositionHeader,

    #[msg("Insufficient bridged token balance")]
    InsufficientClaim,

    #[msg("Quoted amounts below requested minimum")]
    SlippageExceeded,

    #[msg("Amount exceeds total liquidity")]
    AmountExceedsTotalLiquidity,

    #[msg("Liquidity overflow")]
    LiquidityOverflow,

    #[msg("Liquidity underflow")]
    LiquidityUnderflow,

    #[msg("Math overflow")]
    MathOverflow,

    #[msg("Registered liquidity does not match the bridged token supply")]
    PegViolation,

    #[msg("Liquidity increases are not routed through the lockbox")]
    IncreaseNotSupported,
}

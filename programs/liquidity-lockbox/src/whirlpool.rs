//! Minimal Whirlpool program interface: account decoding, PDA derivation and
//! instruction builders for the handful of instructions the lockbox issues.

use anchor_lang::prelude::*;
use anchor_lang::pubkey;
use solana_program::instruction::{AccountMeta, Instruction};

use crate::LockboxError;

pub const WHIRLPOOL_PROGRAM_ID: Pubkey = pubkey!("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc");

pub const POSITION_SEED: &[u8] = b"position";

/// sha256("account:Whirlpool")[..8]
pub const WHIRLPOOL_DISCRIMINATOR: [u8; 8] = [63, 149, 209, 12, 225, 128, 99, 9];
/// sha256("account:Position")[..8]
pub const POSITION_DISCRIMINATOR: [u8; 8] = [170, 188, 143, 228, 122, 64, 247, 208];

pub const WHIRLPOOL_LEN: usize = 653;
pub const POSITION_LEN: usize = 216;

const IX_DECREASE_LIQUIDITY: [u8; 8] = [160, 38, 208, 111, 104, 91, 44, 1];
const IX_UPDATE_FEES_AND_REWARDS: [u8; 8] = [154, 230, 250, 13, 236, 209, 75, 223];
const IX_COLLECT_FEES: [u8; 8] = [164, 152, 207, 99, 30, 186, 19, 182];

/// The fields of a Whirlpool account the lockbox reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WhirlpoolData {
    pub tick_spacing: u16,
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub token_mint_a: Pubkey,
    pub token_vault_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub token_vault_b: Pubkey,
}

impl WhirlpoolData {
    pub fn try_from_slice(data: &[u8]) -> Result<Self> {
        require!(
            data.len() >= WHIRLPOOL_LEN && data[..8] == WHIRLPOOL_DISCRIMINATOR,
            LockboxError::WrongWhirlpool
        );

        Ok(Self {
            tick_spacing: u16::from_le_bytes(read_array(data, 41)),
            sqrt_price: u128::from_le_bytes(read_array(data, 65)),
            tick_current_index: i32::from_le_bytes(read_array(data, 81)),
            token_mint_a: Pubkey::new_from_array(read_array(data, 101)),
            token_vault_a: Pubkey::new_from_array(read_array(data, 133)),
            token_mint_b: Pubkey::new_from_array(read_array(data, 181)),
            token_vault_b: Pubkey::new_from_array(read_array(data, 213)),
        })
    }
}

/// The fields of a Whirlpool position account the lockbox reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionData {
    pub whirlpool: Pubkey,
    pub position_mint: Pubkey,
    pub liquidity: u128,
    pub tick_lower_index: i32,
    pub tick_upper_index: i32,
}

impl PositionData {
    pub fn try_from_slice(data: &[u8]) -> Result<Self> {
        require!(
            data.len() >= POSITION_LEN && data[..8] == POSITION_DISCRIMINATOR,
            LockboxError::WrongPositionHeader
        );

        Ok(Self {
            whirlpool: Pubkey::new_from_array(read_array(data, 8)),
            position_mint: Pubkey::new_from_array(read_array(data, 40)),
            liquidity: u128::from_le_bytes(read_array(data, 72)),
            tick_lower_index: i32::from_le_bytes(read_array(data, 88)),
            tick_upper_index: i32::from_le_bytes(read_array(data, 92)),
        })
    }
}

// Callers check the length first.
fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

/// Address of the position account for `position_mint`.
pub fn position_address(whirlpool_program: &Pubkey, position_mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[POSITION_SEED, position_mint.as_ref()], whirlpool_program).0
}

/// Accounts shared by increase_liquidity and decrease_liquidity.
#[derive(Clone, Copy, Debug)]
pub struct ModifyLiquidityKeys {
    pub whirlpool: Pubkey,
    pub token_program: Pubkey,
    pub position_authority: Pubkey,
    pub position: Pubkey,
    pub position_token_account: Pubkey,
    pub token_owner_account_a: Pubkey,
    pub token_owner_account_b: Pubkey,
    pub token_vault_a: Pubkey,
    pub token_vault_b: Pubkey,
    pub tick_array_lower: Pubkey,
    pub tick_array_upper: Pubkey,
}

impl ModifyLiquidityKeys {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.whirlpool, false),
            AccountMeta::new_readonly(self.token_program, false),
            AccountMeta::new_readonly(self.position_authority, true),
            AccountMeta::new(self.position, false),
            AccountMeta::new_readonly(self.position_token_account, false),
            AccountMeta::new(self.token_owner_account_a, false),
            AccountMeta::new(self.token_owner_account_b, false),
            AccountMeta::new(self.token_vault_a, false),
            AccountMeta::new(self.token_vault_b, false),
            AccountMeta::new(self.tick_array_lower, false),
            AccountMeta::new(self.tick_array_upper, false),
        ]
    }
}

fn modify_liquidity_data(discriminator: [u8; 8], liquidity: u128, token_a: u64, token_b: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + 16 + 8 + 8);
    data.extend_from_slice(&discriminator);
    data.extend_from_slice(&liquidity.to_le_bytes());
    data.extend_from_slice(&token_a.to_le_bytes());
    data.extend_from_slice(&token_b.to_le_bytes());
    data
}

pub fn decrease_liquidity_ix(
    program_id: Pubkey,
    keys: &ModifyLiquidityKeys,
    liquidity: u128,
    token_min_a: u64,
    token_min_b: u64,
) -> Instruction {
    Instruction {
        program_id,
        accounts: keys.to_account_metas(),
        data: modify_liquidity_data(IX_DECREASE_LIQUIDITY, liquidity, token_min_a, token_min_b),
    }
}

pub fn update_fees_and_rewards_ix(
    program_id: Pubkey,
    whirlpool: Pubkey,
    position: Pubkey,
    tick_array_lower: Pubkey,
    tick_array_upper: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(whirlpool, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(tick_array_lower, false),
            AccountMeta::new_readonly(tick_array_upper, false),
        ],
        data: IX_UPDATE_FEES_AND_REWARDS.to_vec(),
    }
}

/// Fee proceeds go to `token_owner_account_a/b`; for the lockbox those are
/// the configured fee collectors.
#[allow(clippy::too_many_arguments)]
pub fn collect_fees_ix(
    program_id: Pubkey,
    whirlpool: Pubkey,
    position_authority: Pubkey,
    position: Pubkey,
    position_token_account: Pubkey,
    token_owner_account_a: Pubkey,
    token_vault_a: Pubkey,
    token_owner_account_b: Pubkey,
    token_vault_b: Pubkey,
    token_program: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new_readonly(whirlpool, false),
            AccountMeta::new_readonly(position_authority, true),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(position_token_account, false),
            AccountMeta::new(token_owner_account_a, false),
            AccountMeta::new(token_vault_a, false),
            AccountMeta::new(token_owner_account_b, false),
            AccountMeta::new(token_vault_b, false),
            AccountMeta::new_readonly(token_program, false),
        ],
        data: IX_COLLECT_FEES.to_vec(),
    }
}

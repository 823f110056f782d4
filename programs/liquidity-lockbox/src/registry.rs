//! Off-chain lockbox handle: the vault state and its position records held
//! together, with all-or-nothing deposit and withdraw.

use anchor_lang::prelude::*;

use crate::engine::{PoolEngine, TokenLedger};
use crate::protocol::{
    self, DepositAccounts, DepositReceipt, RedemptionLeg, WithdrawAccounts, WithdrawReceipt,
    WithdrawRequest,
};
use crate::state::{LiquidityLockbox, LockboxConfig, LockboxPosition};
use crate::LockboxError;

/// Append-only store of position records, addressed by index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionArena {
    records: Vec<LockboxPosition>,
}

impl PositionArena {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&LockboxPosition> {
        self.records.get(index as usize)
    }

    fn get_mut(&mut self, index: u32) -> Option<&mut LockboxPosition> {
        self.records.get_mut(index as usize)
    }

    fn push(&mut self, record: LockboxPosition) {
        self.records.push(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockboxPosition> {
        self.records.iter()
    }

    pub fn total_liquidity(&self) -> u128 {
        self.records.iter().map(|record| record.liquidity).sum()
    }
}

/// A lockbox outside the chain substrate.
///
/// Each mutating call runs against copies of the vault state, the affected
/// record and the environment, and commits them only when the call succeeds.
/// Callers that share a vault across threads hold it behind a lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockboxVault {
    key: Pubkey,
    state: LiquidityLockbox,
    positions: PositionArena,
}

impl LockboxVault {
    pub fn new(config: &LockboxConfig) -> Result<Self> {
        let (key, bump) = LiquidityLockbox::address(&crate::ID, &config.bridged_token_mint);
        let mut state = LiquidityLockbox::default();
        state.initialize(bump, config)?;

        Ok(Self {
            key,
            state,
            positions: PositionArena::default(),
        })
    }

    /// Address of the lockbox account.
    pub fn key(&self) -> Pubkey {
        self.key
    }

    pub fn state(&self) -> &LiquidityLockbox {
        &self.state
    }

    pub fn positions(&self) -> &PositionArena {
        &self.positions
    }

    pub fn position(&self, index: u32) -> Option<&LockboxPosition> {
        self.positions.get(index)
    }

    pub fn deposit<E>(
        &mut self,
        env: &mut E,
        accounts: &DepositAccounts,
        id: u32,
        liquidity_hint: u64,
    ) -> Result<DepositReceipt>
    where
        E: PoolEngine + TokenLedger + Clone,
    {
        let mut staged_env = env.clone();
        let mut staged_state = self.state.clone();
        let mut record = LockboxPosition::default();
        let (_, bump) = LockboxPosition::address(&crate::ID, &self.key, id);

        let receipt = protocol::deposit(
            &mut staged_env,
            &self.key,
            &mut staged_state,
            &mut record,
            bump,
            accounts,
            id,
            liquidity_hint,
        )?;

        *env = staged_env;
        self.state = staged_state;
        self.positions.push(record);
        Ok(receipt)
    }

    pub fn withdraw<E>(
        &mut self,
        env: &mut E,
        accounts: &WithdrawAccounts,
        request: &WithdrawRequest,
    ) -> Result<WithdrawReceipt>
    where
        E: PoolEngine + TokenLedger + Clone,
    {
        let mut record = self
            .positions
            .get(request.index)
            .cloned()
            .ok_or_else(|| error!(LockboxError::UnknownPosition))?;
        let mut staged_env = env.clone();
        let mut staged_state = self.state.clone();

        let receipt = protocol::withdraw(
            &mut staged_env,
            &self.key,
            &mut staged_state,
            &mut record,
            accounts,
            request,
        )?;

        let slot = self
            .positions
            .get_mut(request.index)
            .ok_or_else(|| error!(LockboxError::UnknownPosition))?;
        *slot = record;
        *env = staged_env;
        self.state = staged_state;
        Ok(receipt)
    }

    pub fn plan_redemption(&self, amount: u64) -> Result<Vec<RedemptionLeg>> {
        protocol::plan_redemption(&self.state, self.positions.iter(), amount)
    }

    /// Checks that registered liquidity, the sum over records and the
    /// outstanding claim supply all agree.
    pub fn verify_peg(&self, claim_supply: u64) -> Result<()> {
        require!(
            self.state.total_liquidity == self.positions.total_liquidity()
                && self.state.total_liquidity == u128::from(claim_supply)
                && self.state.num_positions as usize == self.positions.len(),
            LockboxError::PegViolation
        );
        Ok(())
    }
}

//! Pause, cancellation and pro-rata refunds

use solana_program::pubkey::Pubkey;

use crate::error::LmsrMarketError;
use crate::state::{Market, MarketStatus, Position};
use crate::utils::{mul_div_floor, safe_sub_u64};

impl Market {
    fn ensure_operator(&self, caller: &Pubkey) -> Result<(), LmsrMarketError> {
        if !self.is_operator(caller) {
            return Err(LmsrMarketError::Unauthorized);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), LmsrMarketError> {
        match self.status {
            MarketStatus::Resolved => Err(LmsrMarketError::MarketAlreadyResolved),
            MarketStatus::Cancelled => Err(LmsrMarketError::MarketCancelled),
            MarketStatus::Trading => Ok(()),
        }
    }

    /// Freeze trading. Balances and resolution are untouched.
    pub fn pause(&mut self, caller: &Pubkey, current_time: i64) -> Result<(), LmsrMarketError> {
        self.ensure_operator(caller)?;
        self.ensure_open()?;
        if self.is_paused {
            return Err(LmsrMarketError::MarketPaused);
        }
        self.is_paused = true;
        self.updated_at = current_time;
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Pubkey, current_time: i64) -> Result<(), LmsrMarketError> {
        self.ensure_operator(caller)?;
        self.ensure_open()?;
        if !self.is_paused {
            return Err(LmsrMarketError::MarketNotPaused);
        }
        self.is_paused = false;
        self.updated_at = current_time;
        Ok(())
    }

    /// Stop the market for good and open refunds
    pub fn cancel(&mut self, caller: &Pubkey, current_time: i64) -> Result<(), LmsrMarketError> {
        self.ensure_operator(caller)?;
        self.ensure_open()?;
        self.status = MarketStatus::Cancelled;
        self.updated_at = current_time;
        Ok(())
    }

    /// Refund `position` would receive: its share of what remains in the
    /// pool, weighted by total cost basis across all outcomes
    pub fn refundable(&self, position: &Position) -> Result<u64, LmsrMarketError> {
        if self.status != MarketStatus::Cancelled {
            return Err(LmsrMarketError::MarketNotCancelled);
        }
        self.check_position(position)?;
        if position.has_claimed_refund {
            return Err(LmsrMarketError::AlreadyClaimed);
        }
        if position.total_cost_basis == 0 || self.total_cost_basis == 0 {
            return Err(LmsrMarketError::NothingToRefund);
        }

        mul_div_floor(
            position.total_cost_basis,
            self.settlement_pool,
            self.total_cost_basis,
        )
    }

    /// Pay out a cancellation refund, once per holder. Returns the amount.
    pub fn refund(
        &mut self,
        position: &mut Position,
        current_time: i64,
    ) -> Result<u64, LmsrMarketError> {
        let amount = self.refundable(position)?;

        let pool_after = safe_sub_u64(self.settlement_pool, amount)?;
        let basis_after = safe_sub_u64(self.total_cost_basis, position.total_cost_basis)?;
        let mut q_after = self.q.clone();
        for (q, held) in q_after.iter_mut().zip(position.shares.iter()) {
            *q = safe_sub_u64(*q, *held)?;
        }
        let received_after = position
            .payout_received
            .checked_add(amount)
            .ok_or(LmsrMarketError::NumericOverflow)?;

        self.settlement_pool = pool_after;
        self.total_cost_basis = basis_after;
        self.q = q_after;
        self.updated_at = current_time;

        position.shares.iter_mut().for_each(|s| *s = 0);
        position.cost_basis.iter_mut().for_each(|c| *c = 0);
        position.total_cost_basis = 0;
        position.has_claimed_refund = true;
        position.payout_received = received_after;
        position.updated_at = current_time;

        Ok(amount)
    }
}

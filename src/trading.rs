//! Buy and sell against the LMSR book
//!
//! Every operation validates and computes all new figures before touching
//! the market or the position, so a failed call leaves both unchanged. The
//! returned receipt tells the processor how much collateral has to move.

use crate::error::LmsrMarketError;
use crate::lmsr;
use crate::state::{Market, MarketStatus, Position};
use crate::utils::{mul_div_floor, safe_add_u64, safe_sub_u64};

/// Outcome of a committed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeReceipt {
    pub outcome: u8,
    pub shares: u64,
    /// Collateral paid in (buy) or paid out (sell)
    pub amount: u64,
    /// Uncapped LMSR figure the amount was derived from
    pub lmsr_amount: u64,
    /// `b` after the trade
    pub new_liquidity: u64,
}

/// Sell quote after the solvency cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellQuote {
    pub refund: u64,
    pub lmsr_refund: u64,
    /// Seller's cost basis attributable to the shares sold
    pub pro_rata_basis: u64,
}

impl Market {
    /// Trading requires an unpaused market before its resolution time
    pub fn ensure_tradeable(&self, current_time: i64) -> Result<(), LmsrMarketError> {
        match self.status {
            MarketStatus::Resolved => return Err(LmsrMarketError::MarketAlreadyResolved),
            MarketStatus::Cancelled => return Err(LmsrMarketError::MarketCancelled),
            MarketStatus::Trading => {}
        }
        if self.is_paused {
            return Err(LmsrMarketError::MarketPaused);
        }
        if current_time >= self.resolution_time {
            return Err(LmsrMarketError::TradingClosed);
        }
        Ok(())
    }

    pub fn validate_outcome(&self, outcome: u8) -> Result<usize, LmsrMarketError> {
        let index = outcome as usize;
        if index >= self.q.len() {
            return Err(LmsrMarketError::InvalidOutcomeIndex);
        }
        Ok(index)
    }

    /// Current probability of `outcome`
    pub fn price(&self, outcome: u8) -> Result<u64, LmsrMarketError> {
        let index = self.validate_outcome(outcome)?;
        lmsr::price(&self.q, self.b, index)
    }

    /// Current probabilities of every outcome
    pub fn prices(&self) -> Result<Vec<u64>, LmsrMarketError> {
        lmsr::prices(&self.q, self.b)
    }

    pub fn quote_buy(&self, outcome: u8, shares: u64) -> Result<u64, LmsrMarketError> {
        let index = self.validate_outcome(outcome)?;
        lmsr::buy_cost(&self.q, self.b, index, shares)
    }

    /// Raw LMSR refund, before the seller-specific cap
    pub fn quote_sell(&self, outcome: u8, shares: u64) -> Result<u64, LmsrMarketError> {
        let index = self.validate_outcome(outcome)?;
        lmsr::sell_refund(&self.q, self.b, index, shares)
    }

    /// Refund `position` would actually receive:
    /// `min(lmsr refund, pro-rata cost basis, settlement pool)`
    pub fn quote_sell_for(
        &self,
        position: &Position,
        outcome: u8,
        shares: u64,
    ) -> Result<SellQuote, LmsrMarketError> {
        self.check_position(position)?;
        let index = self.validate_outcome(outcome)?;
        if shares == 0 {
            return Err(LmsrMarketError::ZeroAmount);
        }

        let held = position.shares[index];
        if shares > held {
            return Err(LmsrMarketError::InsufficientShares);
        }
        if shares > self.q[index] {
            return Err(LmsrMarketError::InsufficientLiquidity);
        }

        let lmsr_refund = lmsr::sell_refund(&self.q, self.b, index, shares)?;
        let pro_rata_basis = mul_div_floor(position.cost_basis[index], shares, held)?;
        let refund = lmsr_refund.min(pro_rata_basis).min(self.settlement_pool);

        Ok(SellQuote {
            refund,
            lmsr_refund,
            pro_rata_basis,
        })
    }

    /// Buy `shares` of `outcome`, paying at most `max_cost`
    pub fn buy(
        &mut self,
        position: &mut Position,
        outcome: u8,
        shares: u64,
        max_cost: u64,
        current_time: i64,
    ) -> Result<TradeReceipt, LmsrMarketError> {
        self.ensure_tradeable(current_time)?;
        self.check_position(position)?;
        let index = self.validate_outcome(outcome)?;
        if shares == 0 {
            return Err(LmsrMarketError::ZeroAmount);
        }

        let cost = lmsr::buy_cost(&self.q, self.b, index, shares)?;
        if cost > max_cost {
            return Err(LmsrMarketError::SlippageExceeded);
        }

        let q_after = safe_add_u64(self.q[index], shares)?;
        let pool_after = safe_add_u64(self.settlement_pool, cost)?;
        let basis_after = safe_add_u64(self.total_cost_basis, cost)?;
        let volume_after = safe_add_u64(self.total_volume, cost)?;
        let held_after = safe_add_u64(position.shares[index], shares)?;
        let holder_basis_after = safe_add_u64(position.cost_basis[index], cost)?;
        let holder_total_after = safe_add_u64(position.total_cost_basis, cost)?;

        self.q[index] = q_after;
        self.settlement_pool = pool_after;
        self.total_cost_basis = basis_after;
        self.total_volume = volume_after;
        self.updated_at = current_time;

        position.shares[index] = held_after;
        position.cost_basis[index] = holder_basis_after;
        position.total_cost_basis = holder_total_after;
        position.updated_at = current_time;

        let new_liquidity = self.refresh_liquidity();

        Ok(TradeReceipt {
            outcome,
            shares,
            amount: cost,
            lmsr_amount: cost,
            new_liquidity,
        })
    }

    /// Sell `shares` of `outcome`, receiving at least `min_refund`.
    ///
    /// The refund is capped so the pool never drops below the cost basis of
    /// the remaining holders, even after `b` has grown. Cost basis drops by
    /// the refund actually paid, so it stays net collateral paid in and a
    /// realized loss stays with the seller.
    pub fn sell(
        &mut self,
        position: &mut Position,
        outcome: u8,
        shares: u64,
        min_refund: u64,
        current_time: i64,
    ) -> Result<TradeReceipt, LmsrMarketError> {
        self.ensure_tradeable(current_time)?;
        let quote = self.quote_sell_for(position, outcome, shares)?;
        if quote.refund < min_refund {
            return Err(LmsrMarketError::SlippageExceeded);
        }
        let index = outcome as usize;

        let q_after = safe_sub_u64(self.q[index], shares)?;
        let pool_after = safe_sub_u64(self.settlement_pool, quote.refund)?;
        let basis_after = safe_sub_u64(self.total_cost_basis, quote.refund)?;
        let volume_after = safe_add_u64(self.total_volume, quote.refund)?;
        let held_after = safe_sub_u64(position.shares[index], shares)?;
        let holder_basis_after = safe_sub_u64(position.cost_basis[index], quote.refund)?;
        let holder_total_after = safe_sub_u64(position.total_cost_basis, quote.refund)?;

        self.q[index] = q_after;
        self.settlement_pool = pool_after;
        self.total_cost_basis = basis_after;
        self.total_volume = volume_after;
        self.updated_at = current_time;

        position.shares[index] = held_after;
        position.cost_basis[index] = holder_basis_after;
        position.total_cost_basis = holder_total_after;
        position.updated_at = current_time;

        let new_liquidity = self.refresh_liquidity();

        Ok(TradeReceipt {
            outcome,
            shares,
            amount: quote.refund,
            lmsr_amount: quote.lmsr_refund,
            new_liquidity,
        })
    }

    /// Recompute `b` from the pool; never drops below `initial_b`
    pub fn refresh_liquidity(&mut self) -> u64 {
        self.b = lmsr::liquidity_for_pool(self.initial_b, self.settlement_pool);
        self.b
    }
}

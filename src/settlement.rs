//! Resolution snapshot and claims
//!
//! `resolve` freezes `payout_per_share = pool * PAYOUT_PRECISION / q[winner]`
//! once. Every claim pays at that rate, so the order in which holders claim
//! does not change what any of them receives. A resolved pool leaves the
//! market through exactly one path: holder claims or a single distributor pull.

use solana_program::pubkey::Pubkey;

use crate::error::LmsrMarketError;
use crate::state::{DistributionPath, Market, MarketStatus, Position, PAYOUT_PRECISION};
use crate::utils::safe_sub_u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub winning_outcome: u8,
    /// Winning shares surrendered
    pub shares: u64,
    pub payout: u64,
}

impl Market {
    /// Winning outcome, only once resolved
    pub fn winner(&self) -> Result<usize, LmsrMarketError> {
        match (self.status, self.winning_outcome) {
            (MarketStatus::Resolved, Some(w)) => Ok(w as usize),
            (MarketStatus::Cancelled, _) => Err(LmsrMarketError::MarketCancelled),
            _ => Err(LmsrMarketError::MarketNotResolved),
        }
    }

    /// Pick the winner and freeze the payout rate. Returns the rate.
    ///
    /// With no winning shares outstanding the rate is zero and the pool
    /// stays in the market.
    pub fn resolve(
        &mut self,
        caller: &Pubkey,
        winning_outcome: u8,
        current_time: i64,
    ) -> Result<u128, LmsrMarketError> {
        if *caller != self.settlement_authority {
            return Err(LmsrMarketError::Unauthorized);
        }
        match self.status {
            MarketStatus::Resolved => return Err(LmsrMarketError::MarketAlreadyResolved),
            MarketStatus::Cancelled => return Err(LmsrMarketError::MarketCancelled),
            MarketStatus::Trading => {}
        }
        if current_time < self.resolution_time {
            return Err(LmsrMarketError::TooEarlyToResolve);
        }
        let index = self.validate_outcome(winning_outcome)?;

        let winning_shares = self.q[index];
        let payout_per_share = if winning_shares == 0 {
            0
        } else {
            (self.settlement_pool as u128) * PAYOUT_PRECISION / (winning_shares as u128)
        };

        self.status = MarketStatus::Resolved;
        self.winning_outcome = Some(winning_outcome);
        self.payout_per_share = payout_per_share;
        self.updated_at = current_time;

        Ok(payout_per_share)
    }

    /// What `position` would receive from `claim` right now
    pub fn claimable(&self, position: &Position) -> Result<(usize, u64, u64), LmsrMarketError> {
        let winner = self.winner()?;
        self.check_position(position)?;
        if position.has_claimed {
            return Err(LmsrMarketError::AlreadyClaimed);
        }

        let shares = position.shares_of(winner);
        if shares == 0 {
            return Err(LmsrMarketError::NoWinningShares);
        }

        let payout = (shares as u128)
            .checked_mul(self.payout_per_share)
            .ok_or(LmsrMarketError::NumericOverflow)?
            / PAYOUT_PRECISION;
        // rounding drift never lets a claim exceed what is left
        let payout = u64::try_from(payout)
            .unwrap_or(u64::MAX)
            .min(self.settlement_pool);

        Ok((winner, shares, payout))
    }

    /// Pay out a holder's winning shares at the frozen rate, once
    pub fn claim(
        &mut self,
        position: &mut Position,
        current_time: i64,
    ) -> Result<ClaimReceipt, LmsrMarketError> {
        self.winner()?;
        if self.distribution == DistributionPath::Distributor {
            return Err(LmsrMarketError::DistributionPathLocked);
        }
        let (winner, shares, payout) = self.claimable(position)?;

        let pool_after = safe_sub_u64(self.settlement_pool, payout)?;
        let q_after = safe_sub_u64(self.q[winner], shares)?;
        let received_after = position
            .payout_received
            .checked_add(payout)
            .ok_or(LmsrMarketError::NumericOverflow)?;

        self.settlement_pool = pool_after;
        self.q[winner] = q_after;
        self.distribution = DistributionPath::DirectClaims;
        self.updated_at = current_time;

        position.shares[winner] = 0;
        position.has_claimed = true;
        position.payout_received = received_after;
        position.updated_at = current_time;

        Ok(ClaimReceipt {
            winning_outcome: winner as u8,
            shares,
            payout,
        })
    }

    /// Hand the whole resolved pool to the registered distributor, once.
    /// Returns the amount to transfer.
    pub fn transfer_settlement_pool(
        &mut self,
        caller: &Pubkey,
        current_time: i64,
    ) -> Result<u64, LmsrMarketError> {
        self.winner()?;
        if self.distributor != Some(*caller) {
            return Err(LmsrMarketError::Unauthorized);
        }
        match self.distribution {
            DistributionPath::DirectClaims => return Err(LmsrMarketError::DistributionPathLocked),
            DistributionPath::Distributor => return Err(LmsrMarketError::PoolAlreadyTransferred),
            DistributionPath::Undecided => {}
        }
        if self.settlement_pool == 0 {
            return Err(LmsrMarketError::ZeroAmount);
        }

        let amount = self.settlement_pool;
        self.settlement_pool = 0;
        self.distribution = DistributionPath::Distributor;
        self.updated_at = current_time;

        Ok(amount)
    }
}

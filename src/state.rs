//! State definitions for the LMSR Market Program
//!
//! All account structures used by the program.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::error::LmsrMarketError;

// ============================================================================
// Discriminators
// ============================================================================

pub const CONFIG_DISCRIMINATOR: u64 = 0x4C4D_5352_5F43_4647; // "LMSR_CFG"
pub const MARKET_DISCRIMINATOR: u64 = 0x4D41524B45545F5F; // "MARKET__"
pub const POSITION_DISCRIMINATOR: u64 = 0x504F534954494F4E; // "POSITION"

// ============================================================================
// PDA Seeds
// ============================================================================

pub const CONFIG_SEED: &[u8] = b"lmsr_config";
pub const MARKET_SEED: &[u8] = b"market";
pub const MARKET_VAULT_SEED: &[u8] = b"market_vault";
pub const POSITION_SEED: &[u8] = b"position";

// ============================================================================
// Constants
// ============================================================================

/// Minimum number of outcomes (binary market)
pub const MIN_OUTCOMES: usize = 2;

/// Maximum number of outcomes per market
pub const MAX_OUTCOMES: usize = 16;

/// Maximum length of market question (bytes)
pub const MAX_QUESTION_LEN: usize = 256;

/// Maximum length of a single outcome label (bytes)
pub const MAX_OUTCOME_LABEL_LEN: usize = 32;

/// Precision of the frozen payout-per-share rate
pub const PAYOUT_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Default floor for `initial_b` (1 token at 6 decimals)
pub const DEFAULT_MIN_INITIAL_LIQUIDITY: u64 = 1_000_000;

// ============================================================================
// Enums
// ============================================================================

/// Market lifecycle status
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    /// Open for trading (subject to pause and resolution time)
    Trading = 0,
    /// Winner chosen, payout rate frozen
    Resolved = 1,
    /// Cancelled (refunds available)
    Cancelled = 2,
}

impl Default for MarketStatus {
    fn default() -> Self {
        MarketStatus::Trading
    }
}

/// How a resolved pool leaves the market. Locked by the first call that uses it.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionPath {
    Undecided = 0,
    /// Holders call `Claim` individually
    DirectClaims = 1,
    /// The registered distributor pulled the whole pool
    Distributor = 2,
}

impl Default for DistributionPath {
    fn default() -> Self {
        DistributionPath::Undecided
    }
}

// ============================================================================
// Account Structures
// ============================================================================

/// Global configuration, the registry every market is created through
///
/// PDA Seeds: ["lmsr_config"]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct ProgramConfig {
    /// Account discriminator
    pub discriminator: u64,

    /// Program administrator
    pub admin: Pubkey,

    /// Collateral mint accepted by every market
    pub collateral_mint: Pubkey,

    /// Floor applied to `initial_b` at market creation
    pub min_initial_liquidity: u64,

    /// Next market ID
    pub next_market_id: u64,

    /// Total markets created
    pub total_markets: u64,

    /// PDA bump
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 64],
}

impl ProgramConfig {
    pub const SIZE: usize = 8   // discriminator
        + 32  // admin
        + 32  // collateral_mint
        + 8   // min_initial_liquidity
        + 8   // next_market_id
        + 8   // total_markets
        + 1   // bump
        + 64; // reserved

    pub fn new(admin: Pubkey, collateral_mint: Pubkey, min_initial_liquidity: u64, bump: u8) -> Self {
        Self {
            discriminator: CONFIG_DISCRIMINATOR,
            admin,
            collateral_mint,
            min_initial_liquidity,
            next_market_id: 1,
            total_markets: 0,
            bump,
            reserved: [0u8; 64],
        }
    }
}

/// One LMSR market over N mutually exclusive outcomes
///
/// PDA Seeds: ["market", market_id.to_le_bytes()]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Market {
    /// Account discriminator
    pub discriminator: u64,

    /// Unique market ID
    pub market_id: u64,

    /// Market creator
    pub creator: Pubkey,

    /// Identity allowed to resolve (may be another program's PDA)
    pub settlement_authority: Pubkey,

    /// Only address allowed to pull the resolved pool in one transfer
    pub distributor: Option<Pubkey>,

    /// Collateral mint
    pub collateral_mint: Pubkey,

    /// Market collateral vault
    pub market_vault: Pubkey,

    /// Question text
    pub question: String,

    /// Ordered outcome labels
    pub outcomes: Vec<String>,

    /// Trading closes and resolution opens at this time (Unix timestamp)
    pub resolution_time: i64,

    /// Liquidity floor, immutable
    pub initial_b: u64,

    /// Current liquidity parameter
    pub b: u64,

    /// Outstanding shares per outcome
    pub q: Vec<u64>,

    /// Collateral held against all outstanding shares
    pub settlement_pool: u64,

    /// Sum of all holders' net paid-in collateral
    pub total_cost_basis: u64,

    /// Gross collateral traded (buys and sells)
    pub total_volume: u64,

    /// Current market status
    pub status: MarketStatus,

    /// Trading frozen by creator or authority
    pub is_paused: bool,

    /// Winning outcome index (set on resolution)
    pub winning_outcome: Option<u8>,

    /// Frozen `pool * PAYOUT_PRECISION / q[winner]`
    pub payout_per_share: u128,

    /// Which settlement path has been taken
    pub distribution: DistributionPath,

    /// Set while an outgoing transfer is in flight
    pub is_executing: bool,

    /// Market creation timestamp
    pub created_at: i64,

    /// Last update timestamp
    pub updated_at: i64,

    /// PDA bump
    pub bump: u8,

    /// Vault PDA bump
    pub vault_bump: u8,
}

impl Market {
    /// Account size for a question of `question_len` bytes and the given labels
    pub fn space(question_len: usize, outcomes: &[String]) -> usize {
        let labels: usize = outcomes.iter().map(|l| 4 + l.len()).sum();
        8   // discriminator
        + 8   // market_id
        + 32  // creator
        + 32  // settlement_authority
        + 1 + 32 // distributor (Option<Pubkey>)
        + 32  // collateral_mint
        + 32  // market_vault
        + 4 + question_len // question
        + 4 + labels // outcomes
        + 8   // resolution_time
        + 8   // initial_b
        + 8   // b
        + 4 + 8 * outcomes.len() // q
        + 8   // settlement_pool
        + 8   // total_cost_basis
        + 8   // total_volume
        + 1   // status
        + 1   // is_paused
        + 1 + 1 // winning_outcome (Option<u8>)
        + 16  // payout_per_share
        + 1   // distribution
        + 1   // is_executing
        + 8   // created_at
        + 8   // updated_at
        + 1   // bump
        + 1 // vault_bump
    }

    /// Check question, labels and resolution time of a market about to be created
    pub fn validate_params(
        question: &str,
        outcomes: &[String],
        resolution_time: i64,
        current_time: i64,
    ) -> Result<(), LmsrMarketError> {
        if question.is_empty() || question.len() > MAX_QUESTION_LEN {
            return Err(LmsrMarketError::InvalidQuestion);
        }
        if outcomes.len() < MIN_OUTCOMES || outcomes.len() > MAX_OUTCOMES {
            return Err(LmsrMarketError::InvalidOutcomeCount);
        }
        if outcomes
            .iter()
            .any(|l| l.is_empty() || l.len() > MAX_OUTCOME_LABEL_LEN)
        {
            return Err(LmsrMarketError::InvalidOutcomeLabel);
        }
        if resolution_time <= current_time {
            return Err(LmsrMarketError::InvalidResolutionTime);
        }
        Ok(())
    }

    /// Create a new market with an empty book
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_id: u64,
        creator: Pubkey,
        settlement_authority: Pubkey,
        distributor: Option<Pubkey>,
        collateral_mint: Pubkey,
        market_vault: Pubkey,
        question: String,
        outcomes: Vec<String>,
        resolution_time: i64,
        initial_b: u64,
        bump: u8,
        vault_bump: u8,
        created_at: i64,
    ) -> Result<Self, LmsrMarketError> {
        Self::validate_params(&question, &outcomes, resolution_time, created_at)?;
        if initial_b == 0 {
            return Err(LmsrMarketError::InvalidLiquidity);
        }

        let n = outcomes.len();
        Ok(Self {
            discriminator: MARKET_DISCRIMINATOR,
            market_id,
            creator,
            settlement_authority,
            distributor,
            collateral_mint,
            market_vault,
            question,
            outcomes,
            resolution_time,
            initial_b,
            b: initial_b,
            q: vec![0; n],
            settlement_pool: 0,
            total_cost_basis: 0,
            total_volume: 0,
            status: MarketStatus::Trading,
            is_paused: false,
            winning_outcome: None,
            payout_per_share: 0,
            distribution: DistributionPath::Undecided,
            is_executing: false,
            created_at,
            updated_at: created_at,
            bump,
            vault_bump,
        })
    }

    /// Number of outcomes
    pub fn num_outcomes(&self) -> usize {
        self.q.len()
    }

    pub fn is_resolved(&self) -> bool {
        self.status == MarketStatus::Resolved
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == MarketStatus::Cancelled
    }

    /// Creator or settlement authority
    pub fn is_operator(&self, caller: &Pubkey) -> bool {
        *caller == self.creator || *caller == self.settlement_authority
    }

    /// Position must belong to this market and cover all of its outcomes
    pub fn check_position(&self, position: &Position) -> Result<(), LmsrMarketError> {
        if position.discriminator != POSITION_DISCRIMINATOR
            || position.market_id != self.market_id
            || position.shares.len() != self.q.len()
            || position.cost_basis.len() != self.q.len()
        {
            return Err(LmsrMarketError::PositionMismatch);
        }
        Ok(())
    }

    pub fn ensure_not_executing(&self) -> Result<(), LmsrMarketError> {
        if self.is_executing {
            return Err(LmsrMarketError::ReentrantCall);
        }
        Ok(())
    }

    /// Raise the execution guard before an outgoing transfer
    pub fn begin_execution(&mut self) -> Result<(), LmsrMarketError> {
        self.ensure_not_executing()?;
        self.is_executing = true;
        Ok(())
    }

    pub fn end_execution(&mut self) {
        self.is_executing = false;
    }
}

/// A holder's shares and cost basis in one market, across all outcomes
///
/// PDA Seeds: ["position", market_id.to_le_bytes(), owner.key()]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Position {
    /// Account discriminator
    pub discriminator: u64,

    /// Market ID
    pub market_id: u64,

    /// Position owner
    pub owner: Pubkey,

    /// Shares held per outcome
    pub shares: Vec<u64>,

    /// Collateral paid for the currently held shares, per outcome
    pub cost_basis: Vec<u64>,

    /// Sum of `cost_basis`
    pub total_cost_basis: u64,

    /// Winnings claimed
    pub has_claimed: bool,

    /// Cancellation refund taken
    pub has_claimed_refund: bool,

    /// Collateral received from claim or refund
    pub payout_received: u64,

    /// Creation timestamp
    pub created_at: i64,

    /// Last update timestamp
    pub updated_at: i64,

    /// PDA bump
    pub bump: u8,
}

impl Position {
    /// Account size for a market with `num_outcomes` outcomes
    pub fn space(num_outcomes: usize) -> usize {
        8   // discriminator
        + 8   // market_id
        + 32  // owner
        + 4 + 8 * num_outcomes // shares
        + 4 + 8 * num_outcomes // cost_basis
        + 8   // total_cost_basis
        + 1   // has_claimed
        + 1   // has_claimed_refund
        + 8   // payout_received
        + 8   // created_at
        + 8   // updated_at
        + 1 // bump
    }

    /// Create a new empty position
    pub fn new(market_id: u64, owner: Pubkey, num_outcomes: usize, bump: u8, created_at: i64) -> Self {
        Self {
            discriminator: POSITION_DISCRIMINATOR,
            market_id,
            owner,
            shares: vec![0; num_outcomes],
            cost_basis: vec![0; num_outcomes],
            total_cost_basis: 0,
            has_claimed: false,
            has_claimed_refund: false,
            payout_received: 0,
            created_at,
            updated_at: created_at,
            bump,
        }
    }

    /// Check if position holds no shares at all
    pub fn is_empty(&self) -> bool {
        self.shares.iter().all(|&s| s == 0)
    }

    /// Shares held of one outcome (zero for an unknown index)
    pub fn shares_of(&self, outcome: usize) -> u64 {
        self.shares.get(outcome).copied().unwrap_or(0)
    }
}

// ============================================================================
// PDA helpers
// ============================================================================

pub fn find_config_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED], program_id)
}

pub fn find_market_address(program_id: &Pubkey, market_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MARKET_SEED, &market_id.to_le_bytes()], program_id)
}

pub fn find_market_vault_address(program_id: &Pubkey, market_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MARKET_VAULT_SEED, &market_id.to_le_bytes()], program_id)
}

pub fn find_position_address(program_id: &Pubkey, market_id: u64, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[POSITION_SEED, &market_id.to_le_bytes(), owner.as_ref()],
        program_id,
    )
}

// ============================================================================
// Tests
// ============================================================================

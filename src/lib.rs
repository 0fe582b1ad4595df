//! LMSR Market Program
//!
//! Automated market maker for categorical prediction markets on Solana.
//!
//! ## Architecture
//!
//! Every market quotes prices from Hanson's logarithmic market scoring rule
//! over its outstanding share vector `q`. The liquidity parameter `b` grows
//! with the collateral the market holds, so deep markets move less per trade.
//!
//! ## Key Features
//!
//! - 2 to 16 outcomes per market, one collateral mint for the whole program
//! - Buy/sell with slippage bounds, sells capped by the seller's cost basis
//! - Resolution by a per-market settlement authority
//! - Payout snapshot at resolution, so claim order never changes a payout
//! - Optional hand-off of the settlement pool to an external distributor
//! - Pause, cancellation and pro-rata refunds

pub mod cpi;
pub mod emergency;
pub mod error;
pub mod instruction;
pub mod lmsr;
pub mod math;
pub mod processor;
pub mod settlement;
pub mod state;
pub mod trading;
pub mod utils;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

// Re-export commonly used items
pub use error::LmsrMarketError;
pub use instruction::LmsrMarketInstruction;
pub use state::*;

// Program ID - will be updated after deployment
solana_program::declare_id!("LmsrMkt111111111111111111111111111111111111");

//! Error types for the LMSR Market Program

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the LMSR Market Program
#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum LmsrMarketError {
    // === General Errors (0-99) ===

    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("Invalid account data")]
    InvalidAccountData = 1,

    #[error("Account not initialized")]
    AccountNotInitialized = 2,

    #[error("Already initialized")]
    AlreadyInitialized = 3,

    #[error("Invalid signer")]
    InvalidSigner = 5,

    #[error("Unauthorized")]
    Unauthorized = 6,

    #[error("Invalid PDA")]
    InvalidPDA = 10,

    #[error("Invalid collateral mint")]
    InvalidCollateralMint = 13,

    #[error("Invalid argument")]
    InvalidArgument = 14,

    #[error("Reentrant call into an executing market")]
    ReentrantCall = 15,

    // === Market Errors (100-199) ===

    #[error("Market is paused")]
    MarketPaused = 103,

    #[error("Market is not paused")]
    MarketNotPaused = 104,

    #[error("Market already resolved")]
    MarketAlreadyResolved = 105,

    #[error("Market not resolved")]
    MarketNotResolved = 106,

    #[error("Resolution time not reached")]
    TooEarlyToResolve = 107,

    #[error("Market cancelled")]
    MarketCancelled = 108,

    #[error("Invalid resolution time")]
    InvalidResolutionTime = 109,

    #[error("Trading closed at resolution time")]
    TradingClosed = 111,

    #[error("Market not cancelled")]
    MarketNotCancelled = 114,

    #[error("Invalid market vault")]
    InvalidMarketVault = 116,

    #[error("Invalid question")]
    InvalidQuestion = 120,

    #[error("Invalid outcome count")]
    InvalidOutcomeCount = 121,

    #[error("Invalid outcome label")]
    InvalidOutcomeLabel = 122,

    #[error("Invalid liquidity parameter")]
    InvalidLiquidity = 123,

    // === Trading Errors (200-299) ===

    #[error("Invalid outcome index")]
    InvalidOutcomeIndex = 200,

    #[error("Amount must be non-zero")]
    ZeroAmount = 201,

    #[error("Slippage exceeded")]
    SlippageExceeded = 202,

    #[error("Insufficient shares")]
    InsufficientShares = 203,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity = 204,

    #[error("Position does not belong to this market")]
    PositionMismatch = 205,

    // === Settlement Errors (300-399) ===

    #[error("Already claimed")]
    AlreadyClaimed = 300,

    #[error("No winning shares")]
    NoWinningShares = 301,

    #[error("Nothing to refund")]
    NothingToRefund = 302,

    #[error("Distribution path already chosen for this market")]
    DistributionPathLocked = 303,

    #[error("Settlement pool already transferred")]
    PoolAlreadyTransferred = 304,

    // === Math Errors (500-599) ===

    #[error("Numeric overflow")]
    NumericOverflow = 500,

    #[error("Numeric underflow")]
    NumericUnderflow = 501,

    // === Token Errors (600-699) ===

    #[error("Invalid token account")]
    InvalidTokenAccount = 601,

    #[error("Token transfer failed")]
    TransferFailed = 602,
}

impl LmsrMarketError {
    /// Decode a custom program error code back into its kind
    pub fn from_code(code: u32) -> Option<Self> {
        Self::from_u32(code)
    }
}

impl From<LmsrMarketError> for ProgramError {
    fn from(e: LmsrMarketError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LmsrMarketError {
    fn type_of() -> &'static str {
        "LmsrMarketError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_code_round_trip() {
        let err: ProgramError = LmsrMarketError::SlippageExceeded.into();
        assert_eq!(err, ProgramError::Custom(202));
        assert_eq!(
            LmsrMarketError::from_code(202),
            Some(LmsrMarketError::SlippageExceeded)
        );
        assert_eq!(LmsrMarketError::from_code(9999), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(LmsrMarketError::AlreadyClaimed.to_string(), "Already claimed");
        assert_eq!(LmsrMarketError::TooEarlyToResolve.to_string(), "Resolution time not reached");
    }
}

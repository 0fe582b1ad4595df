//! Utility functions for the LMSR Market Program

use borsh::BorshDeserialize;
use solana_program::{
    account_info::AccountInfo,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::error::LmsrMarketError;

/// Deserialize account data without requiring the slice to be fully consumed,
/// so accounts with trailing padding still load.
pub fn deserialize_account<T: BorshDeserialize>(data: &[u8]) -> Result<T, ProgramError> {
    T::deserialize(&mut &data[..])
        .map_err(|_| ProgramError::InvalidAccountData)
}

/// Check if a signer is authorized
pub fn check_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        msg!("Error: {} must sign", account.key);
        return Err(LmsrMarketError::InvalidSigner.into());
    }
    Ok(())
}

/// Verify PDA derivation, returning the bump
pub fn verify_pda(
    expected: &Pubkey,
    program_id: &Pubkey,
    seeds: &[&[u8]],
) -> Result<u8, ProgramError> {
    let (pda, bump) = Pubkey::find_program_address(seeds, program_id);
    if pda != *expected {
        msg!("PDA mismatch: expected {}, got {}", pda, expected);
        return Err(LmsrMarketError::InvalidPDA.into());
    }
    Ok(bump)
}

/// Account must be owned by this program
pub fn check_program_owner(account: &AccountInfo, program_id: &Pubkey) -> ProgramResult {
    if account.owner != program_id {
        msg!("Error: {} is not owned by this program", account.key);
        return Err(LmsrMarketError::InvalidAccountData.into());
    }
    Ok(())
}

/// Get current timestamp from Clock sysvar
pub fn get_current_timestamp() -> Result<i64, ProgramError> {
    let clock = Clock::get()?;
    Ok(clock.unix_timestamp)
}

/// Create a PDA account
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    pda: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    system_program: &AccountInfo<'a>,
    seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::get()?;
    let lamports = rent.minimum_balance(space);

    invoke_signed(
        &system_instruction::create_account(
            payer.key,
            pda.key,
            lamports,
            space as u64,
            owner,
        ),
        &[payer.clone(), pda.clone(), system_program.clone()],
        &[seeds],
    )?;

    Ok(())
}

/// Safe addition for u64
pub fn safe_add_u64(a: u64, b: u64) -> Result<u64, LmsrMarketError> {
    a.checked_add(b).ok_or(LmsrMarketError::NumericOverflow)
}

/// Safe subtraction for u64
pub fn safe_sub_u64(a: u64, b: u64) -> Result<u64, LmsrMarketError> {
    a.checked_sub(b).ok_or(LmsrMarketError::NumericUnderflow)
}

/// `a * b / c` rounded down, computed in u128
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Result<u64, LmsrMarketError> {
    if c == 0 {
        return Err(LmsrMarketError::NumericOverflow);
    }
    let v = (a as u128) * (b as u128) / (c as u128);
    u64::try_from(v).map_err(|_| LmsrMarketError::NumericOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_arithmetic() {
        assert_eq!(safe_add_u64(100, 50).unwrap(), 150);
        assert_eq!(safe_add_u64(u64::MAX, 1), Err(LmsrMarketError::NumericOverflow));

        assert_eq!(safe_sub_u64(100, 50).unwrap(), 50);
        assert_eq!(safe_sub_u64(50, 100), Err(LmsrMarketError::NumericUnderflow));
    }

    #[test]
    fn test_mul_div_rounding() {
        // 700 * 1000 / 3 = 233_333.33
        assert_eq!(mul_div_floor(700, 1_000, 3).unwrap(), 233_333);
        assert_eq!(mul_div_floor(300, 1_000, 1_000).unwrap(), 300);

        // intermediate exceeds u64 but the result fits
        assert_eq!(mul_div_floor(u64::MAX, u64::MAX, u64::MAX).unwrap(), u64::MAX);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(mul_div_floor(1, 1, 0), Err(LmsrMarketError::NumericOverflow));
        assert_eq!(mul_div_floor(u64::MAX, 2, 1), Err(LmsrMarketError::NumericOverflow));
    }
}

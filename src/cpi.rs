//! SPL Token CPI helpers for the LMSR Market Program
//!
//! Collateral only ever moves between a holder's token account and the
//! market vault. The vault is owned by the market PDA, so outgoing transfers
//! are signed with the market seeds.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token::state::Account as TokenAccount;

use crate::error::LmsrMarketError;

/// Create the market vault PDA and initialize it as a token account of
/// `mint` owned by the market
#[allow(clippy::too_many_arguments)]
pub fn create_market_vault<'a>(
    payer: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    market: &AccountInfo<'a>,
    rent_sysvar: &AccountInfo<'a>,
    token_program: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    vault_seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::get()?;
    let space = TokenAccount::LEN;

    invoke_signed(
        &system_instruction::create_account(
            payer.key,
            vault.key,
            rent.minimum_balance(space),
            space as u64,
            token_program.key,
        ),
        &[payer.clone(), vault.clone(), system_program.clone()],
        &[vault_seeds],
    )?;

    invoke(
        &spl_token::instruction::initialize_account(
            token_program.key,
            vault.key,
            mint.key,
            market.key,
        )?,
        &[vault.clone(), mint.clone(), market.clone(), rent_sysvar.clone()],
    )?;

    Ok(())
}

/// Pull collateral from a holder into the vault (holder signs)
pub fn transfer_into_vault<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    msg!("CPI: Transfer {} into vault", amount);

    let ix = spl_token::instruction::transfer(
        token_program.key,
        source.key,
        vault.key,
        authority.key,
        &[],
        amount,
    )?;

    invoke(&ix, &[source.clone(), vault.clone(), authority.clone()])
        .map_err(|e| transfer_failed(e, "into vault"))
}

/// Push collateral out of the vault (market PDA signs)
pub fn transfer_from_vault<'a>(
    token_program: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    market: &AccountInfo<'a>,
    amount: u64,
    market_seeds: &[&[u8]],
) -> ProgramResult {
    msg!("CPI: Transfer {} out of vault", amount);

    let ix = spl_token::instruction::transfer(
        token_program.key,
        vault.key,
        destination.key,
        market.key,
        &[],
        amount,
    )?;

    invoke_signed(
        &ix,
        &[vault.clone(), destination.clone(), market.clone()],
        &[market_seeds],
    )
    .map_err(|e| transfer_failed(e, "out of vault"))
}

fn transfer_failed(err: ProgramError, direction: &str) -> ProgramError {
    msg!("Error: collateral transfer {} rejected: {}", direction, err);
    ProgramError::from(LmsrMarketError::TransferFailed)
}

/// Load a collateral token account and check its mint and, when given, its
/// owner and minimum balance
pub fn check_collateral_account(
    account: &AccountInfo,
    mint: &Pubkey,
    owner: Option<&Pubkey>,
    min_balance: u64,
) -> Result<TokenAccount, ProgramError> {
    if account.owner != &spl_token::id() {
        msg!("Error: {} is not a token account", account.key);
        return Err(LmsrMarketError::InvalidTokenAccount.into());
    }
    let token_account = TokenAccount::unpack(&account.data.borrow())
        .map_err(|_| ProgramError::from(LmsrMarketError::InvalidTokenAccount))?;

    if token_account.mint != *mint {
        msg!("Error: {} holds mint {}, expected {}", account.key, token_account.mint, mint);
        return Err(LmsrMarketError::InvalidCollateralMint.into());
    }
    if let Some(expected) = owner {
        if token_account.owner != *expected {
            msg!("Error: {} is not owned by {}", account.key, expected);
            return Err(LmsrMarketError::InvalidTokenAccount.into());
        }
    }
    if token_account.amount < min_balance {
        msg!("Error: balance {} below required {}", token_account.amount, min_balance);
        return Err(LmsrMarketError::TransferFailed.into());
    }

    Ok(token_account)
}

/// Verify SPL Token Program
pub fn verify_token_program(provided: &Pubkey) -> ProgramResult {
    if provided != &spl_token::id() {
        msg!("Token program mismatch: expected {}, got {}", spl_token::id(), provided);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::program_option::COption;
    use spl_token::state::AccountState;

    fn packed(mint: Pubkey, owner: Pubkey, amount: u64) -> Vec<u8> {
        let account = TokenAccount {
            mint,
            owner,
            amount,
            delegate: COption::None,
            state: AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        };
        let mut data = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(account, &mut data).unwrap();
        data
    }

    #[test]
    fn test_verify_token_program() {
        assert!(verify_token_program(&spl_token::id()).is_ok());
        assert!(verify_token_program(&Pubkey::new_unique()).is_err());
    }

    #[test]
    fn test_check_collateral_account() {
        let key = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let holder = Pubkey::new_unique();
        let token_program = spl_token::id();
        let mut lamports = 0u64;
        let mut data = packed(mint, holder, 500);
        let info = AccountInfo::new(
            &key,
            false,
            true,
            &mut lamports,
            &mut data,
            &token_program,
            false,
            0,
        );

        let loaded = check_collateral_account(&info, &mint, Some(&holder), 500).unwrap();
        assert_eq!(loaded.amount, 500);

        assert_eq!(
            check_collateral_account(&info, &mint, Some(&holder), 501).unwrap_err(),
            ProgramError::from(LmsrMarketError::TransferFailed)
        );
        assert_eq!(
            check_collateral_account(&info, &Pubkey::new_unique(), None, 0).unwrap_err(),
            ProgramError::from(LmsrMarketError::InvalidCollateralMint)
        );
        assert_eq!(
            check_collateral_account(&info, &mint, Some(&Pubkey::new_unique()), 0).unwrap_err(),
            ProgramError::from(LmsrMarketError::InvalidTokenAccount)
        );
    }

    #[test]
    fn test_rejects_account_not_owned_by_token_program() {
        let key = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let not_token_program = Pubkey::new_unique();
        let mut lamports = 0u64;
        let mut data = packed(mint, Pubkey::new_unique(), 1);
        let info = AccountInfo::new(
            &key,
            false,
            true,
            &mut lamports,
            &mut data,
            &not_token_program,
            false,
            0,
        );
        assert_eq!(
            check_collateral_account(&info, &mint, None, 0).unwrap_err(),
            ProgramError::from(LmsrMarketError::InvalidTokenAccount)
        );
    }
}

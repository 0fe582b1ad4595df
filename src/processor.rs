//! Instruction processor for the LMSR Market Program
//!
//! Handlers parse and validate accounts, run the market engine on the loaded
//! state, and write the result back before any collateral leaves or enters the
//! vault. Outgoing and incoming transfers run with `Market::is_executing`
//! committed, so nothing re-entering the market can act on it mid-transfer.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::set_return_data,
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    sysvar,
};

use crate::cpi::{
    check_collateral_account, create_market_vault, transfer_from_vault, transfer_into_vault,
    verify_token_program,
};
use crate::error::LmsrMarketError;
use crate::instruction::*;
use crate::state::{
    Market, Position, ProgramConfig, CONFIG_DISCRIMINATOR, CONFIG_SEED,
    DEFAULT_MIN_INITIAL_LIQUIDITY, MARKET_DISCRIMINATOR, MARKET_SEED, MARKET_VAULT_SEED,
    POSITION_DISCRIMINATOR, POSITION_SEED,
};
use crate::utils::{
    check_program_owner, check_signer, create_pda_account, deserialize_account,
    get_current_timestamp, safe_add_u64, verify_pda,
};

/// Process an instruction
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = LmsrMarketInstruction::try_from_slice(instruction_data)
        .map_err(|_| ProgramError::from(LmsrMarketError::InvalidInstruction))?;

    match instruction {
        // === Configuration ===
        LmsrMarketInstruction::InitializeConfig(args) => {
            msg!("Instruction: InitializeConfig");
            process_initialize_config(program_id, accounts, args)
        }
        LmsrMarketInstruction::UpdateConfig(args) => {
            msg!("Instruction: UpdateConfig");
            process_update_config(program_id, accounts, args)
        }

        // === Market Management ===
        LmsrMarketInstruction::CreateMarket(args) => {
            msg!("Instruction: CreateMarket");
            process_create_market(program_id, accounts, args)
        }

        // === Trading ===
        LmsrMarketInstruction::Buy(args) => {
            msg!("Instruction: Buy");
            process_buy(program_id, accounts, args)
        }
        LmsrMarketInstruction::Sell(args) => {
            msg!("Instruction: Sell");
            process_sell(program_id, accounts, args)
        }

        // === Settlement ===
        LmsrMarketInstruction::Resolve(args) => {
            msg!("Instruction: Resolve");
            process_resolve(program_id, accounts, args)
        }
        LmsrMarketInstruction::Claim(args) => {
            msg!("Instruction: Claim");
            process_claim(program_id, accounts, args)
        }
        LmsrMarketInstruction::TransferSettlementPool(args) => {
            msg!("Instruction: TransferSettlementPool");
            process_transfer_settlement_pool(program_id, accounts, args)
        }

        // === Emergency ===
        LmsrMarketInstruction::CancelMarket(args) => {
            msg!("Instruction: CancelMarket");
            process_cancel_market(program_id, accounts, args)
        }
        LmsrMarketInstruction::PauseMarket(args) => {
            msg!("Instruction: PauseMarket");
            process_pause_market(program_id, accounts, args)
        }
        LmsrMarketInstruction::UnpauseMarket(args) => {
            msg!("Instruction: UnpauseMarket");
            process_unpause_market(program_id, accounts, args)
        }
        LmsrMarketInstruction::Refund(args) => {
            msg!("Instruction: Refund");
            process_refund(program_id, accounts, args)
        }

        // === Read-only ===
        LmsrMarketInstruction::QuoteTrade(args) => {
            msg!("Instruction: QuoteTrade");
            process_quote_trade(program_id, accounts, args)
        }
        LmsrMarketInstruction::GetPrices(args) => {
            msg!("Instruction: GetPrices");
            process_get_prices(program_id, accounts, args)
        }
    }
}

// ============================================================================
// Shared account handling
// ============================================================================

/// Log an engine rejection and turn it into a program error
fn reject<T>(result: Result<T, LmsrMarketError>) -> Result<T, ProgramError> {
    result.map_err(|e| {
        msg!("Error: {}", e);
        e.into()
    })
}

fn save<T: BorshSerialize>(value: &T, info: &AccountInfo) -> ProgramResult {
    value.serialize(&mut *info.data.borrow_mut())?;
    Ok(())
}

fn load_config(program_id: &Pubkey, config_info: &AccountInfo) -> Result<ProgramConfig, ProgramError> {
    check_program_owner(config_info, program_id)?;
    verify_pda(config_info.key, program_id, &[CONFIG_SEED])?;

    let config = deserialize_account::<ProgramConfig>(&config_info.data.borrow())?;
    if config.discriminator != CONFIG_DISCRIMINATOR {
        msg!("Error: Invalid ProgramConfig discriminator");
        return Err(LmsrMarketError::InvalidAccountData.into());
    }
    Ok(config)
}

fn load_market(
    program_id: &Pubkey,
    market_info: &AccountInfo,
    market_id: u64,
) -> Result<Market, ProgramError> {
    check_program_owner(market_info, program_id)?;
    verify_pda(market_info.key, program_id, &[MARKET_SEED, &market_id.to_le_bytes()])?;

    let market = deserialize_account::<Market>(&market_info.data.borrow())?;
    if market.discriminator != MARKET_DISCRIMINATOR || market.market_id != market_id {
        msg!("Error: Invalid Market account");
        return Err(LmsrMarketError::InvalidAccountData.into());
    }
    Ok(market)
}

fn load_position(
    program_id: &Pubkey,
    position_info: &AccountInfo,
    market_id: u64,
    owner: &Pubkey,
) -> Result<Position, ProgramError> {
    verify_pda(
        position_info.key,
        program_id,
        &[POSITION_SEED, &market_id.to_le_bytes(), owner.as_ref()],
    )?;
    if position_info.data_is_empty() {
        msg!("Error: Position not initialized");
        return Err(LmsrMarketError::AccountNotInitialized.into());
    }
    check_program_owner(position_info, program_id)?;

    let position = deserialize_account::<Position>(&position_info.data.borrow())?;
    if position.discriminator != POSITION_DISCRIMINATOR || position.owner != *owner {
        msg!("Error: Invalid Position account");
        return Err(LmsrMarketError::InvalidAccountData.into());
    }
    Ok(position)
}

fn check_vault(market: &Market, vault_info: &AccountInfo) -> ProgramResult {
    if *vault_info.key != market.market_vault {
        msg!("Error: Invalid Market Vault");
        return Err(LmsrMarketError::InvalidMarketVault.into());
    }
    Ok(())
}

fn check_system_program(system_program_info: &AccountInfo) -> ProgramResult {
    if *system_program_info.key != solana_program::system_program::ID {
        msg!("Error: Invalid System Program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Transfer `amount` out of the vault with the execution guard committed.
/// `market` must already hold its post-operation state.
fn pay_out<'a>(
    market: &mut Market,
    market_info: &AccountInfo<'a>,
    vault_info: &AccountInfo<'a>,
    destination_info: &AccountInfo<'a>,
    token_program_info: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    reject(market.begin_execution())?;
    save(&*market, market_info)?;

    if amount > 0 {
        let market_id_bytes = market.market_id.to_le_bytes();
        let bump = [market.bump];
        let market_seeds: &[&[u8]] = &[MARKET_SEED, &market_id_bytes, &bump];
        transfer_from_vault(
            token_program_info,
            vault_info,
            destination_info,
            market_info,
            amount,
            market_seeds,
        )?;
    }

    market.end_execution();
    save(&*market, market_info)
}

// ============================================================================
// Configuration
// ============================================================================

fn process_initialize_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: InitializeConfigArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Admin (signer, payer)
    let admin_info = next_account_info(account_info_iter)?;
    check_signer(admin_info)?;

    // Account 1: ProgramConfig PDA (writable)
    let config_info = next_account_info(account_info_iter)?;

    // Account 2: Collateral Mint
    let mint_info = next_account_info(account_info_iter)?;

    // Account 3: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    check_system_program(system_program_info)?;

    let (config_pda, config_bump) = Pubkey::find_program_address(&[CONFIG_SEED], program_id);
    if *config_info.key != config_pda {
        msg!("Error: Invalid ProgramConfig PDA");
        return Err(LmsrMarketError::InvalidPDA.into());
    }
    if !config_info.data_is_empty() {
        msg!("Error: ProgramConfig already initialized");
        return Err(LmsrMarketError::AlreadyInitialized.into());
    }

    if mint_info.owner != &spl_token::id()
        || spl_token::state::Mint::unpack(&mint_info.data.borrow()).is_err()
    {
        msg!("Error: {} is not an SPL Token mint", mint_info.key);
        return Err(LmsrMarketError::InvalidCollateralMint.into());
    }
    let min_initial_liquidity = match args.min_initial_liquidity {
        0 => DEFAULT_MIN_INITIAL_LIQUIDITY,
        floor => floor,
    };

    create_pda_account(
        admin_info,
        config_info,
        ProgramConfig::SIZE,
        program_id,
        system_program_info,
        &[CONFIG_SEED, &[config_bump]],
    )?;

    let config = ProgramConfig::new(
        *admin_info.key,
        *mint_info.key,
        min_initial_liquidity,
        config_bump,
    );
    save(&config, config_info)?;

    msg!("ProgramConfig initialized");
    msg!("Admin: {}", admin_info.key);
    msg!("Collateral Mint: {}", mint_info.key);
    msg!("Min initial liquidity: {}", min_initial_liquidity);

    Ok(())
}

fn process_update_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: UpdateConfigArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Admin (signer)
    let admin_info = next_account_info(account_info_iter)?;
    check_signer(admin_info)?;

    // Account 1: ProgramConfig PDA (writable)
    let config_info = next_account_info(account_info_iter)?;
    let mut config = load_config(program_id, config_info)?;

    if config.admin != *admin_info.key {
        msg!("Error: Only the admin can update the config");
        return Err(LmsrMarketError::Unauthorized.into());
    }

    if let Some(floor) = args.min_initial_liquidity {
        if floor == 0 {
            msg!("Error: Liquidity floor must be positive");
            return Err(LmsrMarketError::InvalidLiquidity.into());
        }
        config.min_initial_liquidity = floor;
        msg!("Min initial liquidity: {}", floor);
    }
    if let Some(new_admin) = args.new_admin {
        config.admin = new_admin;
        msg!("Admin: {}", new_admin);
    }

    save(&config, config_info)
}

// ============================================================================
// Market Management
// ============================================================================

fn process_create_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: CreateMarketArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Creator (signer, payer)
    let creator_info = next_account_info(account_info_iter)?;
    check_signer(creator_info)?;

    // Account 1: ProgramConfig PDA (writable)
    let config_info = next_account_info(account_info_iter)?;
    let mut config = load_config(program_id, config_info)?;

    // Account 2: Market PDA (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 3: Market Vault PDA (writable)
    let vault_info = next_account_info(account_info_iter)?;

    // Account 4: Collateral Mint
    let mint_info = next_account_info(account_info_iter)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    // Account 6: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    check_system_program(system_program_info)?;

    // Account 7: Rent Sysvar
    let rent_info = next_account_info(account_info_iter)?;
    if !sysvar::rent::check_id(rent_info.key) {
        msg!("Error: Invalid Rent Sysvar");
        return Err(ProgramError::InvalidArgument);
    }

    if *mint_info.key != config.collateral_mint {
        msg!("Error: Collateral mint must be {}", config.collateral_mint);
        return Err(LmsrMarketError::InvalidCollateralMint.into());
    }

    let market_id = config.next_market_id;
    let market_id_bytes = market_id.to_le_bytes();

    let (market_pda, market_bump) =
        Pubkey::find_program_address(&[MARKET_SEED, &market_id_bytes], program_id);
    if *market_info.key != market_pda {
        msg!("Error: Invalid Market PDA");
        return Err(LmsrMarketError::InvalidPDA.into());
    }
    if !market_info.data_is_empty() {
        msg!("Error: Market {} already exists", market_id);
        return Err(LmsrMarketError::AlreadyInitialized.into());
    }

    let (vault_pda, vault_bump) =
        Pubkey::find_program_address(&[MARKET_VAULT_SEED, &market_id_bytes], program_id);
    if *vault_info.key != vault_pda {
        msg!("Error: Invalid Market Vault PDA");
        return Err(LmsrMarketError::InvalidPDA.into());
    }

    let current_time = get_current_timestamp()?;
    let initial_b = args.initial_b.max(config.min_initial_liquidity);
    if initial_b != args.initial_b {
        msg!("initial_b {} raised to floor {}", args.initial_b, initial_b);
    }

    let market = reject(Market::new(
        market_id,
        *creator_info.key,
        args.settlement_authority,
        args.distributor,
        config.collateral_mint,
        vault_pda,
        args.question,
        args.outcomes,
        args.resolution_time,
        initial_b,
        market_bump,
        vault_bump,
        current_time,
    ))?;

    create_pda_account(
        creator_info,
        market_info,
        Market::space(market.question.len(), &market.outcomes),
        program_id,
        system_program_info,
        &[MARKET_SEED, &market_id_bytes, &[market_bump]],
    )?;

    create_market_vault(
        creator_info,
        vault_info,
        mint_info,
        market_info,
        rent_info,
        token_program_info,
        system_program_info,
        &[MARKET_VAULT_SEED, &market_id_bytes, &[vault_bump]],
    )?;

    save(&market, market_info)?;

    config.next_market_id = safe_add_u64(config.next_market_id, 1)?;
    config.total_markets = safe_add_u64(config.total_markets, 1)?;
    save(&config, config_info)?;

    msg!("Market created successfully");
    msg!("Market ID: {}", market_id);
    msg!("Outcomes: {}", market.num_outcomes());
    msg!("Settlement Authority: {}", market.settlement_authority);
    msg!("Resolution Time: {}", market.resolution_time);
    msg!("Initial b: {}", market.initial_b);

    Ok(())
}

// ============================================================================
// Trading
// ============================================================================

fn process_buy(program_id: &Pubkey, accounts: &[AccountInfo], args: BuyArgs) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Trader (signer, payer)
    let trader_info = next_account_info(account_info_iter)?;
    check_signer(trader_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    reject(market.ensure_not_executing())?;

    // Account 2: Position PDA (writable, created on first buy)
    let position_info = next_account_info(account_info_iter)?;

    // Account 3: Trader Collateral Account (writable)
    let trader_collateral_info = next_account_info(account_info_iter)?;

    // Account 4: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;
    check_vault(&market, vault_info)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    // Account 6: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    check_system_program(system_program_info)?;

    let current_time = get_current_timestamp()?;

    let mut position = if position_info.data_is_empty() {
        let market_id_bytes = args.market_id.to_le_bytes();
        let (position_pda, position_bump) = Pubkey::find_program_address(
            &[POSITION_SEED, &market_id_bytes, trader_info.key.as_ref()],
            program_id,
        );
        if *position_info.key != position_pda {
            msg!("Error: Invalid Position PDA");
            return Err(LmsrMarketError::InvalidPDA.into());
        }
        create_pda_account(
            trader_info,
            position_info,
            Position::space(market.num_outcomes()),
            program_id,
            system_program_info,
            &[POSITION_SEED, &market_id_bytes, trader_info.key.as_ref(), &[position_bump]],
        )?;
        Position::new(
            args.market_id,
            *trader_info.key,
            market.num_outcomes(),
            position_bump,
            current_time,
        )
    } else {
        load_position(program_id, position_info, args.market_id, trader_info.key)?
    };

    let receipt = reject(market.buy(
        &mut position,
        args.outcome,
        args.shares,
        args.max_cost,
        current_time,
    ))?;

    check_collateral_account(
        trader_collateral_info,
        &market.collateral_mint,
        Some(trader_info.key),
        receipt.amount,
    )?;

    // Commit the trade, then pull collateral in under the guard
    reject(market.begin_execution())?;
    save(&market, market_info)?;
    save(&position, position_info)?;

    transfer_into_vault(
        token_program_info,
        trader_collateral_info,
        vault_info,
        trader_info,
        receipt.amount,
    )?;

    market.end_execution();
    save(&market, market_info)?;

    msg!(
        "Bought {} shares of outcome {} for {} (b = {}, pool = {})",
        receipt.shares,
        receipt.outcome,
        receipt.amount,
        receipt.new_liquidity,
        market.settlement_pool
    );

    Ok(())
}

fn process_sell(program_id: &Pubkey, accounts: &[AccountInfo], args: SellArgs) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Trader (signer)
    let trader_info = next_account_info(account_info_iter)?;
    check_signer(trader_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    reject(market.ensure_not_executing())?;

    // Account 2: Position PDA (writable)
    let position_info = next_account_info(account_info_iter)?;
    let mut position = load_position(program_id, position_info, args.market_id, trader_info.key)?;

    // Account 3: Trader Collateral Account (writable)
    let trader_collateral_info = next_account_info(account_info_iter)?;
    check_collateral_account(trader_collateral_info, &market.collateral_mint, None, 0)?;

    // Account 4: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;
    check_vault(&market, vault_info)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    let current_time = get_current_timestamp()?;

    let receipt = reject(market.sell(
        &mut position,
        args.outcome,
        args.shares,
        args.min_refund,
        current_time,
    ))?;

    save(&position, position_info)?;
    pay_out(
        &mut market,
        market_info,
        vault_info,
        trader_collateral_info,
        token_program_info,
        receipt.amount,
    )?;

    if receipt.amount < receipt.lmsr_amount {
        msg!("Refund capped from {} to {}", receipt.lmsr_amount, receipt.amount);
    }
    msg!(
        "Sold {} shares of outcome {} for {} (b = {}, pool = {})",
        receipt.shares,
        receipt.outcome,
        receipt.amount,
        receipt.new_liquidity,
        market.settlement_pool
    );

    Ok(())
}

// ============================================================================
// Settlement
// ============================================================================

fn process_resolve(program_id: &Pubkey, accounts: &[AccountInfo], args: ResolveArgs) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Settlement Authority (signer)
    let authority_info = next_account_info(account_info_iter)?;
    check_signer(authority_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    reject(market.ensure_not_executing())?;

    let current_time = get_current_timestamp()?;
    let payout_per_share =
        reject(market.resolve(authority_info.key, args.winning_outcome, current_time))?;
    save(&market, market_info)?;

    msg!("Market {} resolved", args.market_id);
    msg!("Winning outcome: {}", args.winning_outcome);
    msg!("Settlement pool: {}", market.settlement_pool);
    msg!("Payout per share (1e18): {}", payout_per_share);

    Ok(())
}

fn process_claim(program_id: &Pubkey, accounts: &[AccountInfo], args: ClaimArgs) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Holder (signer)
    let holder_info = next_account_info(account_info_iter)?;
    check_signer(holder_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    reject(market.ensure_not_executing())?;

    // Account 2: Position PDA (writable)
    let position_info = next_account_info(account_info_iter)?;
    let mut position = load_position(program_id, position_info, args.market_id, holder_info.key)?;

    // Account 3: Holder Collateral Account (writable)
    let holder_collateral_info = next_account_info(account_info_iter)?;
    check_collateral_account(holder_collateral_info, &market.collateral_mint, None, 0)?;

    // Account 4: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;
    check_vault(&market, vault_info)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    let current_time = get_current_timestamp()?;
    let receipt = reject(market.claim(&mut position, current_time))?;

    save(&position, position_info)?;
    pay_out(
        &mut market,
        market_info,
        vault_info,
        holder_collateral_info,
        token_program_info,
        receipt.payout,
    )?;

    msg!(
        "Claimed {} for {} shares of outcome {}",
        receipt.payout,
        receipt.shares,
        receipt.winning_outcome
    );

    Ok(())
}

fn process_transfer_settlement_pool(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: TransferSettlementPoolArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Distributor (signer)
    let distributor_info = next_account_info(account_info_iter)?;
    check_signer(distributor_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    reject(market.ensure_not_executing())?;

    // Account 2: Distributor Collateral Account (writable)
    let destination_info = next_account_info(account_info_iter)?;
    check_collateral_account(destination_info, &market.collateral_mint, None, 0)?;

    // Account 3: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;
    check_vault(&market, vault_info)?;

    // Account 4: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    let current_time = get_current_timestamp()?;
    let amount = reject(market.transfer_settlement_pool(distributor_info.key, current_time))?;

    pay_out(
        &mut market,
        market_info,
        vault_info,
        destination_info,
        token_program_info,
        amount,
    )?;

    msg!("Settlement pool of {} transferred to distributor {}", amount, distributor_info.key);

    Ok(())
}

// ============================================================================
// Emergency
// ============================================================================

/// Signer plus market, shared by the operator-only instructions
fn load_operator_market<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    market_id: u64,
) -> Result<(&'a AccountInfo<'b>, &'a AccountInfo<'b>, Market), ProgramError> {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Creator or Settlement Authority (signer)
    let signer_info = next_account_info(account_info_iter)?;
    check_signer(signer_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let market = load_market(program_id, market_info, market_id)?;
    reject(market.ensure_not_executing())?;

    Ok((signer_info, market_info, market))
}

fn process_cancel_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: CancelMarketArgs,
) -> ProgramResult {
    let (signer_info, market_info, mut market) =
        load_operator_market(program_id, accounts, args.market_id)?;

    let current_time = get_current_timestamp()?;
    reject(market.cancel(signer_info.key, current_time))?;
    save(&market, market_info)?;

    msg!("Market {} cancelled by {}", args.market_id, signer_info.key);
    msg!("Refundable pool: {}", market.settlement_pool);

    Ok(())
}

fn process_pause_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: PauseMarketArgs,
) -> ProgramResult {
    let (signer_info, market_info, mut market) =
        load_operator_market(program_id, accounts, args.market_id)?;

    let current_time = get_current_timestamp()?;
    reject(market.pause(signer_info.key, current_time))?;
    save(&market, market_info)?;

    msg!("Market {} paused", args.market_id);
    Ok(())
}

fn process_unpause_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: UnpauseMarketArgs,
) -> ProgramResult {
    let (signer_info, market_info, mut market) =
        load_operator_market(program_id, accounts, args.market_id)?;

    let current_time = get_current_timestamp()?;
    reject(market.unpause(signer_info.key, current_time))?;
    save(&market, market_info)?;

    msg!("Market {} unpaused", args.market_id);
    Ok(())
}

fn process_refund(program_id: &Pubkey, accounts: &[AccountInfo], args: RefundArgs) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Holder (signer)
    let holder_info = next_account_info(account_info_iter)?;
    check_signer(holder_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    reject(market.ensure_not_executing())?;

    // Account 2: Position PDA (writable)
    let position_info = next_account_info(account_info_iter)?;
    let mut position = load_position(program_id, position_info, args.market_id, holder_info.key)?;

    // Account 3: Holder Collateral Account (writable)
    let holder_collateral_info = next_account_info(account_info_iter)?;
    check_collateral_account(holder_collateral_info, &market.collateral_mint, None, 0)?;

    // Account 4: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;
    check_vault(&market, vault_info)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    let current_time = get_current_timestamp()?;
    let amount = reject(market.refund(&mut position, current_time))?;

    save(&position, position_info)?;
    pay_out(
        &mut market,
        market_info,
        vault_info,
        holder_collateral_info,
        token_program_info,
        amount,
    )?;

    msg!("Refunded {} to {}", amount, holder_info.key);
    Ok(())
}

// ============================================================================
// Read-only
// ============================================================================

fn process_quote_trade(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: QuoteTradeArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Market
    let market_info = next_account_info(account_info_iter)?;
    let market = load_market(program_id, market_info, args.market_id)?;

    // Account 1: Position PDA (optional)
    let position_info = account_info_iter.next();

    let current_time = get_current_timestamp()?;
    reject(market.ensure_tradeable(current_time))?;

    let amount = match (args.side, position_info) {
        (TradeSide::Buy, _) => reject(market.quote_buy(args.outcome, args.shares))?,
        (TradeSide::Sell, Some(info)) => {
            check_program_owner(info, program_id)?;
            let owner = deserialize_account::<Position>(&info.data.borrow())?.owner;
            let position = load_position(program_id, info, args.market_id, &owner)?;
            reject(market.quote_sell_for(&position, args.outcome, args.shares))?.refund
        }
        (TradeSide::Sell, None) => reject(market.quote_sell(args.outcome, args.shares))?,
    };

    set_return_data(&amount.try_to_vec()?);
    msg!("Quote: {:?} {} of outcome {} = {}", args.side, args.shares, args.outcome, amount);

    Ok(())
}

fn process_get_prices(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: GetPricesArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Market
    let market_info = next_account_info(account_info_iter)?;
    let market = load_market(program_id, market_info, args.market_id)?;

    let prices = reject(market.prices())?;
    set_return_data(&prices.try_to_vec()?);
    msg!("Prices: {:?}", prices);

    Ok(())
}

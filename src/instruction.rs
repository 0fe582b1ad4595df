//! Instruction definitions for the LMSR Market Program

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program, sysvar,
};
use spl_associated_token_account::get_associated_token_address;

use crate::state::{
    find_config_address, find_market_address, find_market_vault_address, find_position_address,
};

/// All instructions supported by the LMSR Market Program
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub enum LmsrMarketInstruction {
    // =========================================================================
    // Configuration
    // =========================================================================

    /// Initialize the global config
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Admin (payer)
    /// 1. `[writable]` ProgramConfig PDA
    /// 2. `[]` Collateral Mint
    /// 3. `[]` System Program
    InitializeConfig(InitializeConfigArgs),

    /// Update admin and/or liquidity floor (Admin only)
    ///
    /// Accounts:
    /// 0. `[signer]` Admin
    /// 1. `[writable]` ProgramConfig PDA
    UpdateConfig(UpdateConfigArgs),

    // =========================================================================
    // Market Management
    // =========================================================================

    /// Create a market with id `config.next_market_id`
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Creator (payer)
    /// 1. `[writable]` ProgramConfig PDA
    /// 2. `[writable]` Market PDA
    /// 3. `[writable]` Market Vault PDA
    /// 4. `[]` Collateral Mint
    /// 5. `[]` Token Program
    /// 6. `[]` System Program
    /// 7. `[]` Rent Sysvar
    CreateMarket(CreateMarketArgs),

    // =========================================================================
    // Trading
    // =========================================================================

    /// Buy shares of one outcome. Creates the Position on first use.
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Trader (payer)
    /// 1. `[writable]` Market
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Trader Collateral Account
    /// 4. `[writable]` Market Vault
    /// 5. `[]` Token Program
    /// 6. `[]` System Program
    Buy(BuyArgs),

    /// Sell shares of one outcome
    ///
    /// Accounts:
    /// 0. `[signer]` Trader
    /// 1. `[writable]` Market
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Trader Collateral Account
    /// 4. `[writable]` Market Vault
    /// 5. `[]` Token Program
    Sell(SellArgs),

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Pick the winning outcome and freeze the payout rate
    ///
    /// Accounts:
    /// 0. `[signer]` Settlement Authority
    /// 1. `[writable]` Market
    Resolve(ResolveArgs),

    /// Collect winnings at the frozen rate
    ///
    /// Accounts:
    /// 0. `[signer]` Holder
    /// 1. `[writable]` Market
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Holder Collateral Account
    /// 4. `[writable]` Market Vault
    /// 5. `[]` Token Program
    Claim(ClaimArgs),

    /// Move the whole resolved pool to the registered distributor
    ///
    /// Accounts:
    /// 0. `[signer]` Distributor
    /// 1. `[writable]` Market
    /// 2. `[writable]` Distributor Collateral Account
    /// 3. `[writable]` Market Vault
    /// 4. `[]` Token Program
    TransferSettlementPool(TransferSettlementPoolArgs),

    // =========================================================================
    // Emergency
    // =========================================================================

    /// Cancel the market and open refunds (Creator or Settlement Authority)
    ///
    /// Accounts:
    /// 0. `[signer]` Creator or Settlement Authority
    /// 1. `[writable]` Market
    CancelMarket(CancelMarketArgs),

    /// Freeze trading (Creator or Settlement Authority)
    ///
    /// Accounts:
    /// 0. `[signer]` Creator or Settlement Authority
    /// 1. `[writable]` Market
    PauseMarket(PauseMarketArgs),

    /// Resume trading (Creator or Settlement Authority)
    ///
    /// Accounts:
    /// 0. `[signer]` Creator or Settlement Authority
    /// 1. `[writable]` Market
    UnpauseMarket(UnpauseMarketArgs),

    /// Take the pro-rata refund of a cancelled market
    ///
    /// Accounts:
    /// 0. `[signer]` Holder
    /// 1. `[writable]` Market
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Holder Collateral Account
    /// 4. `[writable]` Market Vault
    /// 5. `[]` Token Program
    Refund(RefundArgs),

    // =========================================================================
    // Read-only (results via return data)
    // =========================================================================

    /// Quote a buy cost or sell refund. Return data: borsh `u64`.
    ///
    /// Accounts:
    /// 0. `[]` Market
    /// 1. `[]` Position PDA (optional; sell quotes are capped against it)
    QuoteTrade(QuoteTradeArgs),

    /// Current outcome probabilities. Return data: borsh `Vec<u64>`.
    ///
    /// Accounts:
    /// 0. `[]` Market
    GetPrices(GetPricesArgs),
}

// ============================================================================
// Argument Structs
// ============================================================================

// === Configuration ===

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct InitializeConfigArgs {
    /// Floor for every market's `initial_b`
    pub min_initial_liquidity: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct UpdateConfigArgs {
    pub new_admin: Option<Pubkey>,
    pub min_initial_liquidity: Option<u64>,
}

// === Market Management ===

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct CreateMarketArgs {
    /// Question text (max 256 bytes)
    pub question: String,
    /// Outcome labels, 2 to 16 of them (max 32 bytes each)
    pub outcomes: Vec<String>,
    /// Trading closes and resolution opens (Unix timestamp)
    pub resolution_time: i64,
    /// Requested liquidity floor, raised to the config minimum
    pub initial_b: u64,
    /// Identity allowed to resolve
    pub settlement_authority: Pubkey,
    /// Optional address allowed to pull the resolved pool
    pub distributor: Option<Pubkey>,
}

// === Trading ===

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy = 0,
    Sell = 1,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct BuyArgs {
    pub market_id: u64,
    pub outcome: u8,
    pub shares: u64,
    /// Slippage bound
    pub max_cost: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct SellArgs {
    pub market_id: u64,
    pub outcome: u8,
    pub shares: u64,
    /// Slippage bound
    pub min_refund: u64,
}

// === Settlement ===

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct ResolveArgs {
    pub market_id: u64,
    pub winning_outcome: u8,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct ClaimArgs {
    pub market_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct TransferSettlementPoolArgs {
    pub market_id: u64,
}

// === Emergency ===

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct CancelMarketArgs {
    pub market_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct PauseMarketArgs {
    pub market_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct UnpauseMarketArgs {
    pub market_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct RefundArgs {
    pub market_id: u64,
}

// === Read-only ===

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct QuoteTradeArgs {
    pub market_id: u64,
    pub side: TradeSide,
    pub outcome: u8,
    pub shares: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct GetPricesArgs {
    pub market_id: u64,
}

// ============================================================================
// Instruction Builders
// ============================================================================

fn build(
    program_id: &Pubkey,
    accounts: Vec<AccountMeta>,
    ix: LmsrMarketInstruction,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: ix.try_to_vec()?,
    })
}

/// Collateral account used for `holder` when none is given: the associated token account
pub fn holder_collateral_address(holder: &Pubkey, collateral_mint: &Pubkey) -> Pubkey {
    get_associated_token_address(holder, collateral_mint)
}

pub fn initialize_config(
    program_id: &Pubkey,
    admin: &Pubkey,
    collateral_mint: &Pubkey,
    min_initial_liquidity: u64,
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    build(
        program_id,
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(config, false),
            AccountMeta::new_readonly(*collateral_mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        LmsrMarketInstruction::InitializeConfig(InitializeConfigArgs {
            min_initial_liquidity,
        }),
    )
}

pub fn update_config(
    program_id: &Pubkey,
    admin: &Pubkey,
    args: UpdateConfigArgs,
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    build(
        program_id,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(config, false),
        ],
        LmsrMarketInstruction::UpdateConfig(args),
    )
}

/// `market_id` must be the config's current `next_market_id`
pub fn create_market(
    program_id: &Pubkey,
    creator: &Pubkey,
    collateral_mint: &Pubkey,
    market_id: u64,
    args: CreateMarketArgs,
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    let (market, _) = find_market_address(program_id, market_id);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    build(
        program_id,
        vec![
            AccountMeta::new(*creator, true),
            AccountMeta::new(config, false),
            AccountMeta::new(market, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(*collateral_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        LmsrMarketInstruction::CreateMarket(args),
    )
}

/// Market, position, holder collateral and vault, the shape shared by
/// every instruction that moves collateral for one holder
fn holder_accounts(
    program_id: &Pubkey,
    holder: &Pubkey,
    holder_collateral: &Pubkey,
    market_id: u64,
) -> Vec<AccountMeta> {
    let (market, _) = find_market_address(program_id, market_id);
    let (position, _) = find_position_address(program_id, market_id, holder);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    vec![
        AccountMeta::new(*holder, true),
        AccountMeta::new(market, false),
        AccountMeta::new(position, false),
        AccountMeta::new(*holder_collateral, false),
        AccountMeta::new(vault, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ]
}

pub fn buy(
    program_id: &Pubkey,
    trader: &Pubkey,
    trader_collateral: &Pubkey,
    args: BuyArgs,
) -> Result<Instruction, ProgramError> {
    let mut accounts = holder_accounts(program_id, trader, trader_collateral, args.market_id);
    accounts.push(AccountMeta::new_readonly(system_program::id(), false));
    build(program_id, accounts, LmsrMarketInstruction::Buy(args))
}

pub fn sell(
    program_id: &Pubkey,
    trader: &Pubkey,
    trader_collateral: &Pubkey,
    args: SellArgs,
) -> Result<Instruction, ProgramError> {
    let accounts = holder_accounts(program_id, trader, trader_collateral, args.market_id);
    build(program_id, accounts, LmsrMarketInstruction::Sell(args))
}

pub fn claim(
    program_id: &Pubkey,
    holder: &Pubkey,
    holder_collateral: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    let accounts = holder_accounts(program_id, holder, holder_collateral, market_id);
    build(program_id, accounts, LmsrMarketInstruction::Claim(ClaimArgs { market_id }))
}

pub fn refund(
    program_id: &Pubkey,
    holder: &Pubkey,
    holder_collateral: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    let accounts = holder_accounts(program_id, holder, holder_collateral, market_id);
    build(program_id, accounts, LmsrMarketInstruction::Refund(RefundArgs { market_id }))
}

/// Accounts for the authority-only instructions: signer plus market
fn operator_accounts(program_id: &Pubkey, signer: &Pubkey, market_id: u64) -> Vec<AccountMeta> {
    let (market, _) = find_market_address(program_id, market_id);
    vec![
        AccountMeta::new_readonly(*signer, true),
        AccountMeta::new(market, false),
    ]
}

pub fn resolve(
    program_id: &Pubkey,
    settlement_authority: &Pubkey,
    market_id: u64,
    winning_outcome: u8,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        operator_accounts(program_id, settlement_authority, market_id),
        LmsrMarketInstruction::Resolve(ResolveArgs {
            market_id,
            winning_outcome,
        }),
    )
}

pub fn cancel_market(
    program_id: &Pubkey,
    operator: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        operator_accounts(program_id, operator, market_id),
        LmsrMarketInstruction::CancelMarket(CancelMarketArgs { market_id }),
    )
}

pub fn pause_market(
    program_id: &Pubkey,
    operator: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        operator_accounts(program_id, operator, market_id),
        LmsrMarketInstruction::PauseMarket(PauseMarketArgs { market_id }),
    )
}

pub fn unpause_market(
    program_id: &Pubkey,
    operator: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        operator_accounts(program_id, operator, market_id),
        LmsrMarketInstruction::UnpauseMarket(UnpauseMarketArgs { market_id }),
    )
}

pub fn transfer_settlement_pool(
    program_id: &Pubkey,
    distributor: &Pubkey,
    distributor_collateral: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    let (market, _) = find_market_address(program_id, market_id);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    build(
        program_id,
        vec![
            AccountMeta::new_readonly(*distributor, true),
            AccountMeta::new(market, false),
            AccountMeta::new(*distributor_collateral, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        LmsrMarketInstruction::TransferSettlementPool(TransferSettlementPoolArgs { market_id }),
    )
}

/// Sell quotes pass the seller so the refund is capped against their position
pub fn quote_trade(
    program_id: &Pubkey,
    seller: Option<&Pubkey>,
    args: QuoteTradeArgs,
) -> Result<Instruction, ProgramError> {
    let (market, _) = find_market_address(program_id, args.market_id);
    let mut accounts = vec![AccountMeta::new_readonly(market, false)];
    if let Some(owner) = seller {
        let (position, _) = find_position_address(program_id, args.market_id, owner);
        accounts.push(AccountMeta::new_readonly(position, false));
    }
    build(program_id, accounts, LmsrMarketInstruction::QuoteTrade(args))
}

pub fn get_prices(program_id: &Pubkey, market_id: u64) -> Result<Instruction, ProgramError> {
    let (market, _) = find_market_address(program_id, market_id);
    build(
        program_id,
        vec![AccountMeta::new_readonly(market, false)],
        LmsrMarketInstruction::GetPrices(GetPricesArgs { market_id }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_market_serialization() {
        let authority = Pubkey::new_unique();
        let args = CreateMarketArgs {
            question: "Will it snow?".to_string(),
            outcomes: vec!["Yes".to_string(), "No".to_string(), "Sleet".to_string()],
            resolution_time: 1_700_000_000,
            initial_b: 5_000_000,
            settlement_authority: authority,
            distributor: None,
        };
        let ix = LmsrMarketInstruction::CreateMarket(args);
        let serialized = ix.try_to_vec().unwrap();

        let deserialized: LmsrMarketInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();
        match deserialized {
            LmsrMarketInstruction::CreateMarket(a) => {
                assert_eq!(a.outcomes.len(), 3);
                assert_eq!(a.outcomes[2], "Sleet");
                assert_eq!(a.initial_b, 5_000_000);
                assert_eq!(a.settlement_authority, authority);
                assert!(a.distributor.is_none());
            }
            _ => panic!("Wrong instruction type"),
        }
    }

    #[test]
    fn test_quote_trade_serialization() {
        let ix = LmsrMarketInstruction::QuoteTrade(QuoteTradeArgs {
            market_id: 4,
            side: TradeSide::Sell,
            outcome: 1,
            shares: 42,
        });
        let serialized = ix.try_to_vec().unwrap();

        let deserialized: LmsrMarketInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();
        match deserialized {
            LmsrMarketInstruction::QuoteTrade(a) => {
                assert_eq!(a.market_id, 4);
                assert_eq!(a.side, TradeSide::Sell);
                assert_eq!(a.shares, 42);
            }
            _ => panic!("Wrong instruction type"),
        }
    }

    #[test]
    fn test_variant_tags_are_stable() {
        let data = LmsrMarketInstruction::GetPrices(GetPricesArgs { market_id: 1 })
            .try_to_vec()
            .unwrap();
        assert_eq!(data[0], 13);
        let data = LmsrMarketInstruction::InitializeConfig(InitializeConfigArgs {
            min_initial_liquidity: 0,
        })
        .try_to_vec()
        .unwrap();
        assert_eq!(data[0], 0);
    }

    #[test]
    fn test_buy_builder_accounts() {
        let program_id = crate::id();
        let trader = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let collateral = holder_collateral_address(&trader, &mint);
        let ix = buy(
            &program_id,
            &trader,
            &collateral,
            BuyArgs {
                market_id: 2,
                outcome: 0,
                shares: 10,
                max_cost: 100,
            },
        )
        .unwrap();

        assert_eq!(ix.accounts.len(), 7);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, find_market_address(&program_id, 2).0);
        assert_eq!(ix.accounts[2].pubkey, find_position_address(&program_id, 2, &trader).0);
        assert_eq!(ix.accounts[3].pubkey, collateral);
        assert_eq!(ix.accounts[6].pubkey, system_program::id());
    }

    #[test]
    fn test_quote_builder_adds_position_for_seller() {
        let program_id = crate::id();
        let seller = Pubkey::new_unique();
        let args = QuoteTradeArgs {
            market_id: 1,
            side: TradeSide::Buy,
            outcome: 0,
            shares: 1,
        };
        assert_eq!(quote_trade(&program_id, None, args.clone()).unwrap().accounts.len(), 1);
        assert_eq!(quote_trade(&program_id, Some(&seller), args).unwrap().accounts.len(), 2);
    }
}

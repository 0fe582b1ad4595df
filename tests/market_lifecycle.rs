use borsh::BorshDeserialize;
use solana_program::{
    clock::Clock, instruction::InstructionError, program_option::COption, program_pack::Pack,
    pubkey::Pubkey, system_program,
};
use solana_program_test::{processor, BanksClientError, ProgramTest, ProgramTestContext};
use solana_sdk::{
    account::Account,
    instruction::Instruction,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};
use spl_token::state::{Account as TokenAccount, AccountState, Mint};

use lmsr_market_program::{
    error::LmsrMarketError,
    find_market_address, find_market_vault_address, find_position_address,
    instruction::{self, BuyArgs, CreateMarketArgs, QuoteTradeArgs, SellArgs, TradeSide},
    processor::process_instruction,
    utils::deserialize_account,
    Market, Position,
};

const DECIMALS: u8 = 6;
const STARTING_BALANCE: u64 = 100_000_000;
const INITIAL_B: u64 = 1_000_000;

struct Env {
    context: ProgramTestContext,
    program_id: Pubkey,
    mint: Pubkey,
    authority: Keypair,
    distributor: Keypair,
    alice: Keypair,
    bob: Keypair,
    resolution_time: i64,
}

fn funded_signer(program_test: &mut ProgramTest) -> Keypair {
    let keypair = Keypair::new();
    program_test.add_account(
        keypair.pubkey(),
        Account {
            lamports: 10_000_000_000,
            data: vec![],
            owner: system_program::id(),
            executable: false,
            rent_epoch: 0,
        },
    );
    keypair
}

fn add_token_account(program_test: &mut ProgramTest, mint: &Pubkey, owner: &Pubkey, amount: u64) {
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(
        TokenAccount {
            mint: *mint,
            owner: *owner,
            amount,
            delegate: COption::None,
            state: AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        },
        &mut data,
    )
    .unwrap();
    program_test.add_account(
        instruction::holder_collateral_address(owner, mint),
        Account {
            lamports: 1_000_000_000,
            data,
            owner: spl_token::id(),
            executable: false,
            rent_epoch: 0,
        },
    );
}

async fn send(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let blockhash = context.get_new_latest_blockhash().await.unwrap();
    let mut all_signers = vec![&context.payer];
    all_signers.extend_from_slice(signers);
    let transaction = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        &all_signers,
        blockhash,
    );
    context.banks_client.process_transaction(transaction).await
}

fn assert_program_error(result: Result<(), BanksClientError>, expected: LmsrMarketError) {
    match result {
        Err(BanksClientError::TransactionError(TransactionError::InstructionError(
            0,
            InstructionError::Custom(code),
        ))) => assert_eq!(code, expected as u32),
        other => panic!("expected {:?}, got {:?}", expected, other),
    }
}

/// Program with config initialized and market 1 created
async fn setup() -> Env {
    setup_with_distributor(false).await
}

/// Same as `setup`, optionally registering a distributor on market 1
async fn setup_with_distributor(register_distributor: bool) -> Env {
    let program_id = lmsr_market_program::id();
    let mut program_test = ProgramTest::new(
        "lmsr_market_program",
        program_id,
        processor!(process_instruction),
    );

    let mint = Pubkey::new_unique();
    let mut mint_data = vec![0u8; Mint::LEN];
    Mint::pack(
        Mint {
            mint_authority: COption::Some(Pubkey::new_unique()),
            supply: STARTING_BALANCE * 2,
            decimals: DECIMALS,
            is_initialized: true,
            freeze_authority: COption::None,
        },
        &mut mint_data,
    )
    .unwrap();
    program_test.add_account(
        mint,
        Account {
            lamports: 1_000_000_000,
            data: mint_data,
            owner: spl_token::id(),
            executable: false,
            rent_epoch: 0,
        },
    );

    let authority = Keypair::new();
    let distributor = Keypair::new();
    add_token_account(&mut program_test, &mint, &distributor.pubkey(), 0);
    let alice = funded_signer(&mut program_test);
    let bob = funded_signer(&mut program_test);
    add_token_account(&mut program_test, &mint, &alice.pubkey(), STARTING_BALANCE);
    add_token_account(&mut program_test, &mint, &bob.pubkey(), STARTING_BALANCE);

    let mut context = program_test.start_with_context().await;
    let clock: Clock = context.banks_client.get_sysvar().await.unwrap();
    let resolution_time = clock.unix_timestamp + 3_600;

    let admin = context.payer.pubkey();
    let init_ix = instruction::initialize_config(&program_id, &admin, &mint, INITIAL_B).unwrap();
    send(&mut context, &[init_ix], &[]).await.unwrap();

    let create_ix = instruction::create_market(
        &program_id,
        &admin,
        &mint,
        1,
        CreateMarketArgs {
            question: "Will the mainnet upgrade ship this quarter?".to_string(),
            outcomes: vec!["Yes".to_string(), "No".to_string()],
            resolution_time,
            initial_b: INITIAL_B,
            settlement_authority: authority.pubkey(),
            distributor: register_distributor.then(|| distributor.pubkey()),
        },
    )
    .unwrap();
    send(&mut context, &[create_ix], &[]).await.unwrap();

    Env {
        context,
        program_id,
        mint,
        authority,
        distributor,
        alice,
        bob,
        resolution_time,
    }
}

async fn load_market(env: &mut Env) -> Market {
    let (market_pda, _) = find_market_address(&env.program_id, 1);
    let account = env.context.banks_client.get_account(market_pda).await.unwrap().unwrap();
    deserialize_account::<Market>(&account.data).unwrap()
}

async fn load_position(env: &mut Env, owner: &Pubkey) -> Position {
    let (position_pda, _) = find_position_address(&env.program_id, 1, owner);
    let account = env.context.banks_client.get_account(position_pda).await.unwrap().unwrap();
    deserialize_account::<Position>(&account.data).unwrap()
}

async fn token_balance(env: &mut Env, address: Pubkey) -> u64 {
    let account = env.context.banks_client.get_account(address).await.unwrap().unwrap();
    TokenAccount::unpack(&account.data).unwrap().amount
}

async fn buy(env: &mut Env, trader: &Keypair, outcome: u8, shares: u64) -> Result<(), BanksClientError> {
    let collateral = instruction::holder_collateral_address(&trader.pubkey(), &env.mint);
    let ix = instruction::buy(
        &env.program_id,
        &trader.pubkey(),
        &collateral,
        BuyArgs {
            market_id: 1,
            outcome,
            shares,
            max_cost: u64::MAX,
        },
    )
    .unwrap();
    send(&mut env.context, &[ix], &[trader]).await
}

async fn warp_past_resolution(env: &mut Env) {
    let mut clock: Clock = env.context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp = env.resolution_time + 1;
    env.context.set_sysvar(&clock);
}

#[tokio::test]
async fn test_create_market() {
    let mut env = setup().await;
    let market = load_market(&mut env).await;

    assert_eq!(market.market_id, 1);
    assert_eq!(market.outcomes.len(), 2);
    assert_eq!(market.q, vec![0, 0]);
    assert_eq!(market.b, INITIAL_B);
    assert_eq!(market.settlement_authority, env.authority.pubkey());

    let (vault, _) = find_market_vault_address(&env.program_id, 1);
    assert_eq!(market.market_vault, vault);
    assert_eq!(token_balance(&mut env, vault).await, 0);
}

#[tokio::test]
async fn test_trade_resolve_claim() {
    let mut env = setup().await;
    let alice = env.alice.insecure_clone();
    let bob = env.bob.insecure_clone();
    let (vault, _) = find_market_vault_address(&env.program_id, 1);

    buy(&mut env, &alice, 0, 500_000).await.unwrap();
    let market = load_market(&mut env).await;
    assert_eq!(market.settlement_pool, 280_930);
    assert_eq!(market.q, vec![500_000, 0]);

    buy(&mut env, &bob, 1, 300_000).await.unwrap();
    let market = load_market(&mut env).await;
    assert_eq!(token_balance(&mut env, vault).await, market.settlement_pool);
    assert_eq!(market.total_cost_basis, market.settlement_pool);

    // Price readout through return data
    let prices_ix = instruction::get_prices(&env.program_id, 1).unwrap();
    let blockhash = env.context.get_new_latest_blockhash().await.unwrap();
    let tx = Transaction::new_signed_with_payer(
        &[prices_ix],
        Some(&env.context.payer.pubkey()),
        &[&env.context.payer],
        blockhash,
    );
    let simulation = env.context.banks_client.simulate_transaction(tx).await.unwrap();
    let return_data = simulation.simulation_details.unwrap().return_data.unwrap();
    assert_eq!(return_data.program_id, env.program_id);
    let prices = Vec::<u64>::try_from_slice(&return_data.data).unwrap();
    assert_eq!(prices.len(), 2);
    assert!(prices[0] > prices[1]);

    // Only the settlement authority resolves, and only once the deadline passes
    let early = instruction::resolve(&env.program_id, &env.authority.pubkey(), 1, 0).unwrap();
    let authority = env.authority.insecure_clone();
    assert_program_error(
        send(&mut env.context, &[early], &[&authority]).await,
        LmsrMarketError::TooEarlyToResolve,
    );

    warp_past_resolution(&mut env).await;
    assert_program_error(buy(&mut env, &alice, 0, 1_000).await, LmsrMarketError::TradingClosed);

    let by_alice = instruction::resolve(&env.program_id, &alice.pubkey(), 1, 0).unwrap();
    assert_program_error(
        send(&mut env.context, &[by_alice], &[&alice]).await,
        LmsrMarketError::Unauthorized,
    );

    let resolve_ix = instruction::resolve(&env.program_id, &authority.pubkey(), 1, 0).unwrap();
    send(&mut env.context, &[resolve_ix], &[&authority]).await.unwrap();
    let market = load_market(&mut env).await;
    assert_eq!(market.winning_outcome, Some(0));
    let pool = market.settlement_pool;

    // Bob holds no winning shares
    let bob_collateral = instruction::holder_collateral_address(&bob.pubkey(), &env.mint);
    let bob_claim = instruction::claim(&env.program_id, &bob.pubkey(), &bob_collateral, 1).unwrap();
    assert_program_error(
        send(&mut env.context, &[bob_claim], &[&bob]).await,
        LmsrMarketError::NoWinningShares,
    );

    let alice_collateral = instruction::holder_collateral_address(&alice.pubkey(), &env.mint);
    let before = token_balance(&mut env, alice_collateral).await;
    let claim_ix =
        instruction::claim(&env.program_id, &alice.pubkey(), &alice_collateral, 1).unwrap();
    send(&mut env.context, &[claim_ix.clone()], &[&alice]).await.unwrap();

    assert_eq!(token_balance(&mut env, alice_collateral).await, before + pool);
    assert_eq!(token_balance(&mut env, vault).await, 0);
    let market = load_market(&mut env).await;
    assert_eq!(market.settlement_pool, 0);
    assert!(!market.is_executing);
    assert!(load_position(&mut env, &alice.pubkey()).await.has_claimed);

    assert_program_error(
        send(&mut env.context, &[claim_ix], &[&alice]).await,
        LmsrMarketError::AlreadyClaimed,
    );
}

#[tokio::test]
async fn test_sell_and_quote() {
    let mut env = setup().await;
    let alice = env.alice.insecure_clone();
    let alice_collateral = instruction::holder_collateral_address(&alice.pubkey(), &env.mint);

    buy(&mut env, &alice, 1, 200_000).await.unwrap();
    let position = load_position(&mut env, &alice.pubkey()).await;
    assert_eq!(position.shares, vec![0, 200_000]);

    let quote_ix = instruction::quote_trade(
        &env.program_id,
        Some(&alice.pubkey()),
        QuoteTradeArgs {
            market_id: 1,
            side: TradeSide::Sell,
            outcome: 1,
            shares: 200_000,
        },
    )
    .unwrap();
    let blockhash = env.context.get_new_latest_blockhash().await.unwrap();
    let tx = Transaction::new_signed_with_payer(
        &[quote_ix],
        Some(&env.context.payer.pubkey()),
        &[&env.context.payer],
        blockhash,
    );
    let simulation = env.context.banks_client.simulate_transaction(tx).await.unwrap();
    let return_data = simulation.simulation_details.unwrap().return_data.unwrap();
    let quoted = u64::try_from_slice(&return_data.data).unwrap();
    assert!(quoted <= position.total_cost_basis);

    let before = token_balance(&mut env, alice_collateral).await;
    let greedy = instruction::sell(
        &env.program_id,
        &alice.pubkey(),
        &alice_collateral,
        SellArgs {
            market_id: 1,
            outcome: 1,
            shares: 200_000,
            min_refund: quoted + 1,
        },
    )
    .unwrap();
    assert_program_error(
        send(&mut env.context, &[greedy], &[&alice]).await,
        LmsrMarketError::SlippageExceeded,
    );

    let sell_ix = instruction::sell(
        &env.program_id,
        &alice.pubkey(),
        &alice_collateral,
        SellArgs {
            market_id: 1,
            outcome: 1,
            shares: 200_000,
            min_refund: quoted,
        },
    )
    .unwrap();
    send(&mut env.context, &[sell_ix], &[&alice]).await.unwrap();

    assert_eq!(token_balance(&mut env, alice_collateral).await, before + quoted);
    let market = load_market(&mut env).await;
    assert_eq!(market.q, vec![0, 0]);
    let (vault, _) = find_market_vault_address(&env.program_id, 1);
    assert_eq!(token_balance(&mut env, vault).await, market.settlement_pool);
}

#[tokio::test]
async fn test_cancel_and_refund() {
    let mut env = setup().await;
    let alice = env.alice.insecure_clone();
    let bob = env.bob.insecure_clone();
    let authority = env.authority.insecure_clone();

    buy(&mut env, &alice, 0, 300_000).await.unwrap();
    buy(&mut env, &bob, 1, 700_000).await.unwrap();
    let alice_basis = load_position(&mut env, &alice.pubkey()).await.total_cost_basis;
    let bob_basis = load_position(&mut env, &bob.pubkey()).await.total_cost_basis;

    let pause_ix = instruction::pause_market(&env.program_id, &authority.pubkey(), 1).unwrap();
    send(&mut env.context, &[pause_ix], &[&authority]).await.unwrap();
    assert_program_error(buy(&mut env, &alice, 0, 1_000).await, LmsrMarketError::MarketPaused);

    let cancel_ix = instruction::cancel_market(&env.program_id, &authority.pubkey(), 1).unwrap();
    send(&mut env.context, &[cancel_ix], &[&authority]).await.unwrap();
    assert!(load_market(&mut env).await.is_cancelled());

    for (holder, basis) in [(&alice, alice_basis), (&bob, bob_basis)] {
        let collateral = instruction::holder_collateral_address(&holder.pubkey(), &env.mint);
        let before = token_balance(&mut env, collateral).await;
        let refund_ix =
            instruction::refund(&env.program_id, &holder.pubkey(), &collateral, 1).unwrap();
        send(&mut env.context, &[refund_ix.clone()], &[holder]).await.unwrap();
        assert_eq!(token_balance(&mut env, collateral).await, before + basis);

        assert_program_error(
            send(&mut env.context, &[refund_ix], &[holder]).await,
            LmsrMarketError::AlreadyClaimed,
        );
    }

    let market = load_market(&mut env).await;
    assert_eq!(market.settlement_pool, 0);
    assert_eq!(market.total_cost_basis, 0);
}

#[tokio::test]
async fn test_distributor_takes_pool_and_locks_claims() {
    let mut env = setup_with_distributor(true).await;
    let alice = env.alice.insecure_clone();
    let bob = env.bob.insecure_clone();
    let authority = env.authority.insecure_clone();
    let distributor = env.distributor.insecure_clone();
    let (vault, _) = find_market_vault_address(&env.program_id, 1);

    buy(&mut env, &bob, 1, 400_000).await.unwrap();

    // Buy-side quote matches what the trade then charges
    let quote_ix = instruction::quote_trade(
        &env.program_id,
        None,
        QuoteTradeArgs {
            market_id: 1,
            side: TradeSide::Buy,
            outcome: 0,
            shares: 600_000,
        },
    )
    .unwrap();
    let blockhash = env.context.get_new_latest_blockhash().await.unwrap();
    let tx = Transaction::new_signed_with_payer(
        &[quote_ix],
        Some(&env.context.payer.pubkey()),
        &[&env.context.payer],
        blockhash,
    );
    let simulation = env.context.banks_client.simulate_transaction(tx).await.unwrap();
    let return_data = simulation.simulation_details.unwrap().return_data.unwrap();
    let quoted = u64::try_from_slice(&return_data.data).unwrap();

    // Pause blocks the buy until the market is unpaused
    let pause_ix = instruction::pause_market(&env.program_id, &authority.pubkey(), 1).unwrap();
    send(&mut env.context, &[pause_ix], &[&authority]).await.unwrap();
    assert_program_error(buy(&mut env, &alice, 0, 600_000).await, LmsrMarketError::MarketPaused);
    let unpause_ix = instruction::unpause_market(&env.program_id, &authority.pubkey(), 1).unwrap();
    send(&mut env.context, &[unpause_ix], &[&authority]).await.unwrap();

    let pool_before = load_market(&mut env).await.settlement_pool;
    buy(&mut env, &alice, 0, 600_000).await.unwrap();
    let market = load_market(&mut env).await;
    assert_eq!(market.settlement_pool, pool_before + quoted);
    assert_eq!(load_position(&mut env, &alice.pubkey()).await.total_cost_basis, quoted);

    warp_past_resolution(&mut env).await;
    let resolve_ix = instruction::resolve(&env.program_id, &authority.pubkey(), 1, 0).unwrap();
    send(&mut env.context, &[resolve_ix], &[&authority]).await.unwrap();
    let pool = load_market(&mut env).await.settlement_pool;
    assert_eq!(token_balance(&mut env, vault).await, pool);

    let distributor_collateral =
        instruction::holder_collateral_address(&distributor.pubkey(), &env.mint);

    // Only the registered distributor may pull
    let bob_collateral = instruction::holder_collateral_address(&bob.pubkey(), &env.mint);
    let by_bob =
        instruction::transfer_settlement_pool(&env.program_id, &bob.pubkey(), &bob_collateral, 1)
            .unwrap();
    assert_program_error(
        send(&mut env.context, &[by_bob], &[&bob]).await,
        LmsrMarketError::Unauthorized,
    );

    let pull_ix = instruction::transfer_settlement_pool(
        &env.program_id,
        &distributor.pubkey(),
        &distributor_collateral,
        1,
    )
    .unwrap();
    send(&mut env.context, &[pull_ix.clone()], &[&distributor]).await.unwrap();

    assert_eq!(token_balance(&mut env, distributor_collateral).await, pool);
    assert_eq!(token_balance(&mut env, vault).await, 0);
    let market = load_market(&mut env).await;
    assert_eq!(market.settlement_pool, 0);
    assert!(!market.is_executing);

    assert_program_error(
        send(&mut env.context, &[pull_ix], &[&distributor]).await,
        LmsrMarketError::PoolAlreadyTransferred,
    );

    let alice_collateral = instruction::holder_collateral_address(&alice.pubkey(), &env.mint);
    let claim_ix =
        instruction::claim(&env.program_id, &alice.pubkey(), &alice_collateral, 1).unwrap();
    assert_program_error(
        send(&mut env.context, &[claim_ix], &[&alice]).await,
        LmsrMarketError::DistributionPathLocked,
    );
    assert!(!load_position(&mut env, &alice.pubkey()).await.has_claimed);
}

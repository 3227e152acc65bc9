use solana_program::{borsh::try_from_slice_unchecked, program_pack::Pack};
use solana_program_test::*;
use solana_sdk::{
    account::Account,
    clock::Clock,
    hash::Hash,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_program,
    transaction::{Transaction, TransactionError},
};

use solotto::{
    error::LotteryError,
    instruction,
    price::PriceReading,
    process_instruction,
    state::{Config, LotteryState, Round},
    utils,
};

const SOL: u64 = 1_000_000_000;
const FIFTY_USD: u64 = 50_000_000;
// 2000 USD/SOL with 8 decimals makes 50 USD = 0.025 SOL
const SOL_PRICE: i64 = 200_000_000_000;
const ENTRY_FEE: u64 = 25_000_000;
const ORACLE_FEE: u64 = 1_000_000;
const MANAGEMENT_FEE_PERCENT: u8 = 10;
const MAX_DURATION: u64 = 3_600;

struct TestEnv {
    context: ProgramTestContext,
    program_id: Pubkey,
    owner: Keypair,
    oracle: Keypair,
    price_feed: Pubkey,
    players: Vec<Keypair>,
}

fn system_account(lamports: u64) -> Account {
    Account::new(lamports, 0, &system_program::id())
}

async fn setup(max_participants: u32, player_count: usize, fund_escrow: bool) -> TestEnv {
    setup_with_price(max_participants, player_count, fund_escrow, SOL_PRICE).await
}

// Setup program test with a funded owner, oracle, players and price feed
async fn setup_with_price(
    max_participants: u32,
    player_count: usize,
    fund_escrow: bool,
    sol_price: i64,
) -> TestEnv {
    let program_id = Pubkey::new_unique();
    let mut program_test = ProgramTest::new("solotto", program_id, processor!(process_instruction));

    let owner = Keypair::new();
    let oracle = Keypair::new();
    let price_feed = Pubkey::new_unique();
    let players: Vec<Keypair> = (0..player_count).map(|_| Keypair::new()).collect();

    program_test.add_account(owner.pubkey(), system_account(10 * SOL));
    program_test.add_account(oracle.pubkey(), system_account(SOL));
    for player in &players {
        program_test.add_account(player.pubkey(), system_account(10 * SOL));
    }

    let mut feed_data = vec![0u8; PriceReading::LEN];
    PriceReading::pack(
        PriceReading {
            price: sol_price,
            decimals: 8,
        },
        &mut feed_data,
    )
    .unwrap();
    program_test.add_account(
        price_feed,
        Account {
            lamports: SOL,
            data: feed_data,
            owner: Pubkey::new_unique(),
            executable: false,
            rent_epoch: 0,
        },
    );

    if fund_escrow {
        let (escrow, _) = utils::find_oracle_escrow_address(&program_id);
        program_test.add_account(escrow, system_account(10 * ORACLE_FEE));
    }

    let mut context = program_test.start_with_context().await;

    let init_ix = instruction::initialize_lottery(
        &program_id,
        &owner.pubkey(),
        &price_feed,
        &oracle.pubkey(),
        FIFTY_USD,
        MAX_DURATION,
        max_participants,
        MANAGEMENT_FEE_PERCENT,
        ORACLE_FEE,
        [42u8; 32],
    );
    let blockhash = context.last_blockhash;
    process(&mut context.banks_client, blockhash, &[init_ix], &[&owner])
        .await
        .unwrap();

    TestEnv {
        context,
        program_id,
        owner,
        oracle,
        price_feed,
        players,
    }
}

async fn process(
    banks_client: &mut BanksClient,
    blockhash: Hash,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let transaction = Transaction::new_signed_with_payer(
        instructions,
        Some(&signers[0].pubkey()),
        &signers.to_vec(),
        blockhash,
    );
    banks_client.process_transaction(transaction).await
}

fn assert_lottery_error(result: Result<(), BanksClientError>, expected: LotteryError) {
    assert_eq!(
        result.unwrap_err().unwrap(),
        TransactionError::InstructionError(0, InstructionError::Custom(expected as u32))
    );
}

impl TestEnv {
    async fn round(&mut self) -> Round {
        let (round_key, _) = utils::find_round_address(&self.program_id);
        let account = self
            .context
            .banks_client
            .get_account(round_key)
            .await
            .unwrap()
            .unwrap();
        try_from_slice_unchecked(&account.data).unwrap()
    }

    async fn config(&mut self) -> Config {
        let (config_key, _) = utils::find_config_address(&self.program_id);
        let account = self
            .context
            .banks_client
            .get_account(config_key)
            .await
            .unwrap()
            .unwrap();
        Config::unpack(&account.data).unwrap()
    }

    async fn balance(&mut self, key: Pubkey) -> u64 {
        self.context.banks_client.get_balance(key).await.unwrap()
    }

    // Simulate a single instruction paid by the owner and return its return data.
    // The runtime drops trailing zero bytes, so the data is padded back to `len`.
    async fn return_data(&mut self, instruction: Instruction, len: usize) -> Vec<u8> {
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&self.owner.pubkey()),
            &[&self.owner],
            self.context.last_blockhash,
        );
        let simulation = self
            .context
            .banks_client
            .simulate_transaction(transaction)
            .await
            .unwrap();
        simulation.result.unwrap().unwrap();
        let mut data = simulation
            .simulation_details
            .unwrap()
            .return_data
            .map(|return_data| return_data.data)
            .unwrap_or_default();
        assert!(data.len() <= len);
        data.resize(len, 0);
        data
    }

    async fn open_round(&mut self) {
        let ix = instruction::open_round(&self.program_id, &self.owner.pubkey());
        process(
            &mut self.context.banks_client,
            self.context.last_blockhash,
            &[ix],
            &[&self.owner],
        )
        .await
        .unwrap();
    }

    async fn enter(&mut self, player: usize, payment: u64) -> Result<(), BanksClientError> {
        let ix = instruction::enter(
            &self.program_id,
            &self.players[player].pubkey(),
            &self.price_feed,
            payment,
        );
        process(
            &mut self.context.banks_client,
            self.context.last_blockhash,
            &[ix],
            &[&self.players[player]],
        )
        .await
    }

    async fn close_round(&mut self) -> Result<(), BanksClientError> {
        let ix = instruction::close_round(
            &self.program_id,
            &self.owner.pubkey(),
            &self.oracle.pubkey(),
        );
        process(
            &mut self.context.banks_client,
            self.context.last_blockhash,
            &[ix],
            &[&self.owner],
        )
        .await
    }

    async fn perform_closure(&mut self, player: usize) -> Result<(), BanksClientError> {
        let ix = instruction::perform_closure(
            &self.program_id,
            &self.players[player].pubkey(),
            &self.oracle.pubkey(),
        );
        process(
            &mut self.context.banks_client,
            self.context.last_blockhash,
            &[ix],
            &[&self.players[player]],
        )
        .await
    }

    async fn fulfill(
        &mut self,
        signer: Option<usize>,
        winner: &Pubkey,
        request_id: [u8; 32],
        random_value: u64,
    ) -> Result<(), BanksClientError> {
        let oracle_signer = match signer {
            Some(player) => &self.players[player],
            None => &self.oracle,
        };
        let ix = instruction::fulfill_randomness(
            &self.program_id,
            &oracle_signer.pubkey(),
            &self.owner.pubkey(),
            winner,
            request_id,
            random_value,
        );
        process(
            &mut self.context.banks_client,
            self.context.last_blockhash,
            &[ix],
            &[oracle_signer],
        )
        .await
    }
}

#[tokio::test]
async fn test_initialize_lottery() {
    let mut env = setup(5, 0, true).await;

    let config = env.config().await;
    assert!(config.is_initialized);
    assert_eq!(config.owner, env.owner.pubkey());
    assert_eq!(config.oracle, env.oracle.pubkey());
    assert_eq!(config.price_feed, env.price_feed);
    assert_eq!(config.fiat_entry_fee, FIFTY_USD);
    assert_eq!(config.max_participants, 5);

    let round = env.round().await;
    assert_eq!(round.state(), LotteryState::IdleClosed);
    assert_eq!(round.participant_count(), 0);
    assert_eq!(round.latest_winner(), None);
    assert_eq!(round.pending_request_id(), None);
}

#[tokio::test]
async fn test_cant_enter_before_round_opens() {
    let mut env = setup(5, 1, true).await;

    assert_lottery_error(
        env.enter(0, ENTRY_FEE + 10_000).await,
        LotteryError::InvalidStateTransition,
    );
    assert_eq!(env.round().await.participant_count(), 0);
}

#[tokio::test]
async fn test_only_owner_opens_round() {
    let mut env = setup(5, 1, true).await;

    let ix = instruction::open_round(&env.program_id, &env.players[0].pubkey());
    let result = process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.players[0]],
    )
    .await;
    assert_lottery_error(result, LotteryError::UnauthorizedCaller);
    assert_eq!(env.round().await.state(), LotteryState::IdleClosed);
}

#[tokio::test]
async fn test_underpaid_entries_rejected() {
    let mut env = setup(5, 3, true).await;
    env.open_round().await;

    for player in 0..3 {
        let before = env.balance(env.players[player].pubkey()).await;
        assert_lottery_error(
            env.enter(player, ENTRY_FEE - 1).await,
            LotteryError::InsufficientEntryFee,
        );
        // only the transaction fee is charged
        assert!(before - env.balance(env.players[player].pubkey()).await < ENTRY_FEE - 1);
    }

    assert_eq!(env.round().await.participant_count(), 0);
    let (vault, _) = utils::find_vault_address(&env.program_id);
    assert_eq!(env.balance(vault).await, 0);
}

#[tokio::test]
async fn test_full_round_with_manual_close() {
    let mut env = setup(5, 3, true).await;
    env.open_round().await;

    for player in 0..3 {
        env.enter(player, ENTRY_FEE + 10_000).await.unwrap();
    }
    let round = env.round().await;
    assert_eq!(round.state(), LotteryState::Open);
    assert_eq!(round.participant_count(), 3);

    let (vault, _) = utils::find_vault_address(&env.program_id);
    let pot = env.balance(vault).await;
    assert_eq!(pot, 3 * (ENTRY_FEE + 10_000));

    let oracle_before = env.balance(env.oracle.pubkey()).await;
    env.close_round().await.unwrap();
    let round = env.round().await;
    assert_eq!(round.state(), LotteryState::AwaitingRandomness);
    let request_id = round.pending_request_id().unwrap();
    assert_eq!(env.balance(env.oracle.pubkey()).await, oracle_before + ORACLE_FEE);

    // entries are closed while waiting for the oracle
    assert_lottery_error(
        env.enter(0, ENTRY_FEE + 20_000).await,
        LotteryError::InvalidStateTransition,
    );

    // 777 % 3 == 0
    let winner = env.players[0].pubkey();
    let winner_before = env.balance(winner).await;
    let owner_before = env.balance(env.owner.pubkey()).await;
    env.fulfill(None, &winner, request_id, 777).await.unwrap();

    let operator_fee = pot * MANAGEMENT_FEE_PERCENT as u64 / 100;
    assert_eq!(env.balance(vault).await, 0);
    assert_eq!(env.balance(winner).await, winner_before + pot - operator_fee);
    assert_eq!(env.balance(env.owner.pubkey()).await, owner_before + operator_fee);

    let round = env.round().await;
    assert_eq!(round.state(), LotteryState::IdleClosed);
    assert_eq!(round.participant_count(), 0);
    assert_eq!(round.latest_winner(), Some(winner));
    assert_eq!(round.pending_request_id(), None);
    assert_eq!(round.round_epoch, 1);
}

#[tokio::test]
async fn test_can_pick_winner_from_five() {
    let mut env = setup(10, 5, true).await;
    env.open_round().await;
    for player in 0..5 {
        env.enter(player, ENTRY_FEE).await.unwrap();
    }
    env.close_round().await.unwrap();
    let request_id = env.round().await.pending_request_id().unwrap();

    // 777 % 5 == 2; any other account is refused
    let wrong = env.players[1].pubkey();
    assert_lottery_error(
        env.fulfill(None, &wrong, request_id, 777).await,
        LotteryError::AccountMismatch,
    );

    let winner = env.players[2].pubkey();
    env.fulfill(None, &winner, request_id, 777).await.unwrap();
    assert_eq!(env.round().await.latest_winner(), Some(winner));
}

#[tokio::test]
async fn test_fulfill_from_non_oracle_rejected() {
    let mut env = setup(5, 2, true).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();
    env.close_round().await.unwrap();
    let before = env.round().await;
    let request_id = before.pending_request_id().unwrap();

    let winner = env.players[0].pubkey();
    assert_lottery_error(
        env.fulfill(Some(1), &winner, request_id, 777).await,
        LotteryError::UnauthorizedCaller,
    );
    assert_eq!(env.round().await, before);
}

#[tokio::test]
async fn test_fulfill_is_single_use() {
    let mut env = setup(5, 1, true).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();
    env.close_round().await.unwrap();
    let request_id = env.round().await.pending_request_id().unwrap();
    let winner = env.players[0].pubkey();

    assert_lottery_error(
        env.fulfill(None, &winner, [0u8; 32], 777).await,
        LotteryError::UnknownOrCompletedRequest,
    );

    env.fulfill(None, &winner, request_id, 777).await.unwrap();
    assert_lottery_error(
        env.fulfill(None, &winner, request_id, 778).await,
        LotteryError::UnknownOrCompletedRequest,
    );
}

#[tokio::test]
async fn test_close_requires_oracle_funding() {
    let mut env = setup(5, 1, false).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();

    assert_lottery_error(env.close_round().await, LotteryError::InsufficientOracleFunding);
    let round = env.round().await;
    assert_eq!(round.state(), LotteryState::Open);
    assert_eq!(round.pending_request_id(), None);
}

#[tokio::test]
async fn test_perform_closure_on_participant_cap() {
    let mut env = setup(3, 4, true).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();

    assert_lottery_error(env.perform_closure(2).await, LotteryError::ClosureConditionsNotMet);
    assert_eq!(env.round().await.state(), LotteryState::Open);

    env.enter(1, ENTRY_FEE).await.unwrap();
    env.enter(2, ENTRY_FEE).await.unwrap();
    assert_lottery_error(
        env.enter(3, ENTRY_FEE).await,
        LotteryError::InvalidStateTransition,
    );

    env.perform_closure(3).await.unwrap();
    assert_eq!(env.round().await.state(), LotteryState::AwaitingRandomness);

    // a racing manual close finds the round already closed
    assert_lottery_error(env.close_round().await, LotteryError::InvalidStateTransition);
}

#[tokio::test]
async fn test_perform_closure_after_duration() {
    let mut env = setup(5, 2, true).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();
    let start = env.round().await.round_start_time;

    let mut clock: Clock = env.context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp = start + MAX_DURATION as i64;
    env.context.set_sysvar(&clock);

    env.perform_closure(1).await.unwrap();
    assert_eq!(env.round().await.state(), LotteryState::AwaitingRandomness);
}

#[tokio::test]
async fn test_empty_round_resets_without_payout() {
    let mut env = setup(5, 0, true).await;
    env.open_round().await;
    env.close_round().await.unwrap();
    let request_id = env.round().await.pending_request_id().unwrap();

    let owner = env.owner.pubkey();
    env.fulfill(None, &owner, request_id, 777).await.unwrap();

    let round = env.round().await;
    assert_eq!(round.state(), LotteryState::IdleClosed);
    assert_eq!(round.latest_winner(), None);
    assert_eq!(round.round_epoch, 1);
}

#[tokio::test]
async fn test_config_frozen_during_round() {
    let mut env = setup(5, 0, true).await;

    let ix = instruction::update_config(
        &env.program_id,
        &env.owner.pubkey(),
        FIFTY_USD * 2,
        MAX_DURATION,
        4,
        5,
        ORACLE_FEE,
    );
    process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.owner],
    )
    .await
    .unwrap();
    let config = env.config().await;
    assert_eq!(config.fiat_entry_fee, FIFTY_USD * 2);
    assert_eq!(config.max_participants, 4);
    assert_eq!(config.management_fee_percent, 5);

    // capacity was allocated for 5 participants
    let ix = instruction::update_config(
        &env.program_id,
        &env.owner.pubkey(),
        FIFTY_USD,
        MAX_DURATION,
        6,
        5,
        ORACLE_FEE,
    );
    let result = process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.owner],
    )
    .await;
    assert_lottery_error(result, LotteryError::InvalidConfiguration);

    env.open_round().await;
    let ix = instruction::update_config(
        &env.program_id,
        &env.owner.pubkey(),
        FIFTY_USD,
        MAX_DURATION,
        5,
        10,
        ORACLE_FEE,
    );
    let result = process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.owner],
    )
    .await;
    assert_lottery_error(result, LotteryError::InvalidStateTransition);
}

#[tokio::test]
async fn test_transfer_ownership() {
    let mut env = setup(5, 1, true).await;
    let new_owner = env.players[0].pubkey();

    let ix = instruction::transfer_ownership(&env.program_id, &env.owner.pubkey(), &new_owner);
    process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.owner],
    )
    .await
    .unwrap();
    assert_eq!(env.config().await.owner, new_owner);

    let ix = instruction::open_round(&env.program_id, &env.owner.pubkey());
    let result = process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.owner],
    )
    .await;
    assert_lottery_error(result, LotteryError::UnauthorizedCaller);
}

#[tokio::test]
async fn test_current_entry_fee_query() {
    let mut env = setup(5, 0, true).await;

    let ix = instruction::current_entry_fee(&env.program_id, &env.price_feed);
    assert_eq!(env.return_data(ix, 8).await, ENTRY_FEE.to_le_bytes().to_vec());
}

#[tokio::test]
async fn test_check_closure_query() {
    let mut env = setup(1, 1, true).await;

    let ix = instruction::check_closure(&env.program_id);
    assert_eq!(env.return_data(ix.clone(), 1).await, vec![0]);

    env.open_round().await;
    assert_eq!(env.return_data(ix.clone(), 1).await, vec![0]);

    env.enter(0, ENTRY_FEE).await.unwrap();
    assert_eq!(env.return_data(ix, 1).await, vec![1]);
}

#[tokio::test]
async fn test_non_positive_price_rejects_entries() {
    let mut env = setup_with_price(5, 1, true, 0).await;
    env.open_round().await;

    assert_lottery_error(env.enter(0, ENTRY_FEE).await, LotteryError::StalePriceFeed);
    assert_eq!(env.round().await.participant_count(), 0);
}

#[tokio::test]
async fn test_wrong_price_feed_rejected() {
    let mut env = setup(5, 1, true).await;
    env.open_round().await;

    let ix = instruction::enter(
        &env.program_id,
        &env.players[0].pubkey(),
        &Pubkey::new_unique(),
        ENTRY_FEE,
    );
    let result = process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.players[0]],
    )
    .await;
    assert_lottery_error(result, LotteryError::AccountMismatch);
    assert_eq!(env.round().await.participant_count(), 0);
}

#[tokio::test]
async fn test_perform_closure_while_idle() {
    let mut env = setup(5, 1, true).await;

    assert_lottery_error(env.perform_closure(0).await, LotteryError::InvalidStateTransition);
    assert_eq!(env.round().await.state(), LotteryState::IdleClosed);
}

#[tokio::test]
async fn test_close_returns_request_id() {
    let mut env = setup(5, 1, true).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();

    let ix = instruction::close_round(&env.program_id, &env.owner.pubkey(), &env.oracle.pubkey());
    assert_ne!(env.return_data(ix, 32).await, vec![0u8; 32]);

    // simulation leaves the round untouched
    assert_eq!(env.round().await.state(), LotteryState::Open);
    env.close_round().await.unwrap();
    assert!(env.round().await.pending_request_id().is_some());
}

#[tokio::test]
async fn test_read_only_winner_fails_transfer() {
    let mut env = setup(5, 1, true).await;
    env.open_round().await;
    env.enter(0, ENTRY_FEE).await.unwrap();
    env.close_round().await.unwrap();
    let before = env.round().await;
    let request_id = before.pending_request_id().unwrap();
    let winner = env.players[0].pubkey();

    let mut ix = instruction::fulfill_randomness(
        &env.program_id,
        &env.oracle.pubkey(),
        &env.owner.pubkey(),
        &winner,
        request_id,
        777,
    );
    ix.accounts[5].is_writable = false;
    let result = process(
        &mut env.context.banks_client,
        env.context.last_blockhash,
        &[ix],
        &[&env.oracle],
    )
    .await;
    assert_lottery_error(result, LotteryError::TransferFailed);
    assert_eq!(env.round().await, before);

    env.fulfill(None, &winner, request_id, 777).await.unwrap();
    assert_eq!(env.round().await.latest_winner(), Some(winner));
}

#[tokio::test]
async fn test_entry_must_keep_vault_rent_exempt() {
    // 60_000 USD/SOL puts 50 USD at 833_333 lamports, under the vault's rent-exempt minimum
    let mut env = setup_with_price(5, 1, true, 6_000_000_000_000).await;
    env.open_round().await;

    let ix = instruction::current_entry_fee(&env.program_id, &env.price_feed);
    assert_eq!(env.return_data(ix, 8).await, 833_333u64.to_le_bytes().to_vec());

    assert_lottery_error(env.enter(0, 850_000).await, LotteryError::InsufficientEntryFee);
    assert_eq!(env.round().await.participant_count(), 0);

    env.enter(0, 900_000).await.unwrap();
    let (vault, _) = utils::find_vault_address(&env.program_id);
    assert_eq!(env.balance(vault).await, 900_000);
}

// Solotto Lottery Program - Instruction Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    borsh::try_from_slice_unchecked,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};

use crate::{
    constants::{CONFIG_SEED, MAX_MANAGEMENT_FEE_PERCENT, MAX_PARTICIPANTS_LIMIT, ROUND_SEED, VAULT_SEED},
    error::LotteryError,
    instruction::LotteryInstruction,
    price,
    settlement::Payout,
    state::{Config, LotteryState, Round},
    utils, vrf,
};

/// Program state handler.
pub struct Processor;

impl Processor {
    /// Process a Solotto lottery instruction
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::InitializeLottery {
                fiat_entry_fee,
                max_duration,
                max_participants,
                management_fee_percent,
                oracle_fee,
                key_hash,
            } => {
                msg!("Instruction: Initialize Lottery");
                Self::process_initialize_lottery(
                    program_id,
                    accounts,
                    fiat_entry_fee,
                    max_duration,
                    max_participants,
                    management_fee_percent,
                    oracle_fee,
                    key_hash,
                )
            }
            LotteryInstruction::OpenRound => {
                msg!("Instruction: Open Round");
                Self::process_open_round(program_id, accounts)
            }
            LotteryInstruction::Enter { payment } => {
                msg!("Instruction: Enter");
                Self::process_enter(program_id, accounts, payment)
            }
            LotteryInstruction::CloseRound => {
                msg!("Instruction: Close Round");
                Self::process_closure(program_id, accounts, true)
            }
            LotteryInstruction::PerformClosure => {
                msg!("Instruction: Perform Closure");
                Self::process_closure(program_id, accounts, false)
            }
            LotteryInstruction::FulfillRandomness {
                request_id,
                random_value,
            } => {
                msg!("Instruction: Fulfill Randomness");
                Self::process_fulfill_randomness(program_id, accounts, request_id, random_value)
            }
            LotteryInstruction::CurrentEntryFee => {
                msg!("Instruction: Current Entry Fee");
                Self::process_current_entry_fee(program_id, accounts)
            }
            LotteryInstruction::CheckClosure => {
                msg!("Instruction: Check Closure");
                Self::process_check_closure(program_id, accounts)
            }
            LotteryInstruction::UpdateConfig {
                fiat_entry_fee,
                max_duration,
                max_participants,
                management_fee_percent,
                oracle_fee,
            } => {
                msg!("Instruction: Update Config");
                Self::process_update_config(
                    program_id,
                    accounts,
                    fiat_entry_fee,
                    max_duration,
                    max_participants,
                    management_fee_percent,
                    oracle_fee,
                )
            }
            LotteryInstruction::TransferOwnership => {
                msg!("Instruction: Transfer Ownership");
                Self::process_transfer_ownership(program_id, accounts)
            }
        }
    }

    /// Process InitializeLottery instruction
    ///
    /// Creates the config and round PDAs. Only succeeds once per program.
    #[allow(clippy::too_many_arguments)]
    fn process_initialize_lottery(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        fiat_entry_fee: u64,
        max_duration: u64,
        max_participants: u32,
        management_fee_percent: u8,
        oracle_fee: u64,
        key_hash: [u8; 32],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let price_feed_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;

        let (expected_config, config_bump) = utils::find_config_address(program_id);
        let (expected_round, round_bump) = utils::find_round_address(program_id);
        if *config_info.key != expected_config || *round_info.key != expected_round {
            msg!("Invalid config or round account address");
            return Err(ProgramError::InvalidArgument);
        }
        if config_info.owner == program_id || round_info.owner == program_id {
            msg!("Lottery is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        validate_parameters(fiat_entry_fee, max_participants, management_fee_percent)?;

        let rent = Rent::get()?;
        let round_space = Round::space(max_participants);

        invoke_signed(
            &system_instruction::create_account(
                owner_info.key,
                config_info.key,
                rent.minimum_balance(Config::LEN),
                Config::LEN as u64,
                program_id,
            ),
            &[
                owner_info.clone(),
                config_info.clone(),
                system_program_info.clone(),
            ],
            &[&[CONFIG_SEED, &[config_bump]]],
        )?;

        invoke_signed(
            &system_instruction::create_account(
                owner_info.key,
                round_info.key,
                rent.minimum_balance(round_space),
                round_space as u64,
                program_id,
            ),
            &[
                owner_info.clone(),
                round_info.clone(),
                system_program_info.clone(),
            ],
            &[&[ROUND_SEED, &[round_bump]]],
        )?;

        let config = Config {
            is_initialized: true,
            owner: *owner_info.key,
            price_feed: *price_feed_info.key,
            oracle: *oracle_info.key,
            key_hash,
            oracle_fee,
            fiat_entry_fee,
            max_duration,
            max_participants,
            management_fee_percent,
            vault_bump: utils::find_vault_address(program_id).1,
            escrow_bump: utils::find_oracle_escrow_address(program_id).1,
        };
        Config::pack(config, &mut config_info.data.borrow_mut())?;
        save_round(&Round::new(), round_info)?;

        msg!(
            "Lottery initialized: Owner={}, PriceFeed={}, Oracle={}, EntryFee={} (fiat 1e-6), MaxParticipants={}, Fee={}%",
            owner_info.key,
            price_feed_info.key,
            oracle_info.key,
            fiat_entry_fee,
            max_participants,
            management_fee_percent
        );
        Ok(())
    }

    fn process_open_round(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let config = load_config(program_id, config_info)?;
        let mut round = load_round(program_id, round_info)?;

        let clock = Clock::get()?;
        round.open(&config, owner_info.key, clock.unix_timestamp)?;
        save_round(&round, round_info)?;

        msg!(
            "Round opened at {} (epoch {}), closes after {}s or {} participants",
            round.round_start_time,
            round.round_epoch,
            config.max_duration,
            config.max_participants
        );
        Ok(())
    }

    /// Process Enter instruction
    ///
    /// The fee is priced from the feed at call time. Every check runs before
    /// the payment is moved into the vault.
    fn process_enter(program_id: &Pubkey, accounts: &[AccountInfo], payment: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let price_feed_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !participant_info.is_signer {
            msg!("Participant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;

        let config = load_config(program_id, config_info)?;
        let mut round = load_round(program_id, round_info)?;
        check_vault(program_id, &config, vault_info)?;

        round.ensure_accepting_entries(&config)?;

        let entry_fee = price::current_entry_fee(&config, price_feed_info)?;
        if payment < entry_fee {
            msg!(
                "Insufficient entry fee: needed {} lamports, offered {}",
                entry_fee,
                payment
            );
            return Err(LotteryError::InsufficientEntryFee.into());
        }

        let vault_minimum = Rent::get()?.minimum_balance(vault_info.data_len());
        if vault_info.lamports().saturating_add(payment) < vault_minimum {
            msg!(
                "Vault needs at least {} lamports, entry would leave {}",
                vault_minimum,
                vault_info.lamports().saturating_add(payment)
            );
            return Err(LotteryError::InsufficientEntryFee.into());
        }

        invoke(
            &system_instruction::transfer(participant_info.key, vault_info.key, payment),
            &[
                participant_info.clone(),
                vault_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        round.record_entry(&config, *participant_info.key)?;
        save_round(&round, round_info)?;

        msg!(
            "{} entered with {} SOL, {} participants",
            participant_info.key,
            utils::lamports_to_sol(payment),
            round.participant_count()
        );
        Ok(())
    }

    /// Process CloseRound and PerformClosure instructions
    ///
    /// `Open -> AwaitingRandomness`. The manual path is owner-only, the automatic
    /// path re-evaluates the closure predicate inside this instruction.
    fn process_closure(program_id: &Pubkey, accounts: &[AccountInfo], manual: bool) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let escrow_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;

        let config = load_config(program_id, config_info)?;
        let mut round = load_round(program_id, round_info)?;
        let clock = Clock::get()?;

        if manual {
            round.authorize_manual_close(&config, caller_info.key)?;
        } else {
            round
                .authorize_automatic_close(&config, clock.unix_timestamp)
                .map_err(|e| {
                    msg!(
                        "Round opened at {}, now {}, {} of {} participants",
                        round.round_start_time,
                        clock.unix_timestamp,
                        round.participant_count(),
                        config.max_participants
                    );
                    e
                })?;
        }

        let rent = Rent::get()?;
        let request = vrf::request_randomness(
            program_id,
            &config,
            &round,
            round_info,
            escrow_info,
            oracle_info,
            system_program_info,
            &rent,
            clock.slot,
        )?;
        round.await_randomness(request)?;
        save_round(&round, round_info)?;
        set_return_data(&request.request_id);

        msg!(
            "Round closed with {} participants, awaiting randomness",
            round.participant_count()
        );
        Ok(())
    }

    /// Process FulfillRandomness instruction
    ///
    /// The round is written back (winner recorded, ledger cleared, state reset)
    /// before any lamports leave the vault.
    fn process_fulfill_randomness(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: [u8; 32],
        random_value: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let owner_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !oracle_info.is_signer {
            msg!("Oracle must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;

        let config = load_config(program_id, config_info)?;
        let mut round = load_round(program_id, round_info)?;
        check_vault(program_id, &config, vault_info)?;

        let total_balance = vault_info.lamports();
        let payout = round.fulfill(
            &config,
            oracle_info.key,
            &request_id,
            random_value,
            total_balance,
        )?;

        let payout = match payout {
            Some(payout) => payout,
            None => {
                save_round(&round, round_info)?;
                msg!("{}; round reset without payout", LotteryError::NoParticipants);
                return Ok(());
            }
        };

        if *owner_info.key != config.owner {
            msg!("Fee recipient does not match the owner");
            return Err(LotteryError::AccountMismatch.into());
        }
        if *winner_info.key != payout.winner {
            msg!(
                "Winner account does not match participant #{} ({})",
                payout.winner_index,
                payout.winner
            );
            return Err(LotteryError::AccountMismatch.into());
        }

        let rent = Rent::get()?;
        check_recipients(&payout, owner_info, winner_info, &rent)?;

        save_round(&round, round_info)?;
        Self::pay_out(&config, &payout, vault_info, owner_info, winner_info, system_program_info)?;

        msg!(
            "Winner: {} (index {}), prize {} lamports, management fee {} lamports",
            payout.winner,
            payout.winner_index,
            payout.winner_prize,
            payout.operator_fee
        );
        Ok(())
    }

    fn pay_out<'a>(
        config: &Config,
        payout: &Payout,
        vault_info: &AccountInfo<'a>,
        owner_info: &AccountInfo<'a>,
        winner_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
    ) -> ProgramResult {
        let signer_seeds: &[&[u8]] = &[VAULT_SEED, &[config.vault_bump]];

        for (recipient, amount) in [(owner_info, payout.operator_fee), (winner_info, payout.winner_prize)] {
            if amount == 0 {
                continue;
            }
            invoke_signed(
                &system_instruction::transfer(vault_info.key, recipient.key, amount),
                &[
                    vault_info.clone(),
                    recipient.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            )?;
        }
        Ok(())
    }

    fn process_current_entry_fee(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let price_feed_info = next_account_info(account_info_iter)?;

        let config = load_config(program_id, config_info)?;
        let entry_fee = price::current_entry_fee(&config, price_feed_info)?;
        set_return_data(&entry_fee.to_le_bytes());
        Ok(())
    }

    fn process_check_closure(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        let config = load_config(program_id, config_info)?;
        let round = load_round(program_id, round_info)?;
        let clock = Clock::get()?;

        let should_close = round.should_close(&config, clock.unix_timestamp);
        msg!("Closure conditions met: {}", should_close);
        set_return_data(&[should_close as u8]);
        Ok(())
    }

    /// Process UpdateConfig instruction, only between rounds
    #[allow(clippy::too_many_arguments)]
    fn process_update_config(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        fiat_entry_fee: u64,
        max_duration: u64,
        max_participants: u32,
        management_fee_percent: u8,
        oracle_fee: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        let (mut config, _) = authorize_between_rounds(program_id, owner_info, config_info, round_info)?;

        validate_parameters(fiat_entry_fee, max_participants, management_fee_percent)?;
        let capacity = Round::capacity(round_info.data_len());
        if max_participants > capacity {
            msg!("Round account holds at most {} participants", capacity);
            return Err(LotteryError::InvalidConfiguration.into());
        }

        config.fiat_entry_fee = fiat_entry_fee;
        config.max_duration = max_duration;
        config.max_participants = max_participants;
        config.management_fee_percent = management_fee_percent;
        config.oracle_fee = oracle_fee;
        Config::pack(config, &mut config_info.data.borrow_mut())?;

        msg!(
            "Config updated: EntryFee={} (fiat 1e-6), MaxDuration={}s, MaxParticipants={}, Fee={}%, OracleFee={}",
            fiat_entry_fee,
            max_duration,
            max_participants,
            management_fee_percent,
            oracle_fee
        );
        Ok(())
    }

    fn process_transfer_ownership(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let new_owner_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        let (mut config, _) = authorize_between_rounds(program_id, owner_info, config_info, round_info)?;

        config.owner = *new_owner_info.key;
        Config::pack(config, &mut config_info.data.borrow_mut())?;

        msg!("Owner updated successfully to: {}", new_owner_info.key);
        Ok(())
    }
}

/// Owner signature plus an idle round, required to touch the configuration
fn authorize_between_rounds(
    program_id: &Pubkey,
    owner_info: &AccountInfo,
    config_info: &AccountInfo,
    round_info: &AccountInfo,
) -> Result<(Config, Round), ProgramError> {
    if !owner_info.is_signer {
        msg!("Owner must sign the transaction");
        return Err(ProgramError::MissingRequiredSignature);
    }

    let config = load_config(program_id, config_info)?;
    let round = load_round(program_id, round_info)?;

    if config.owner != *owner_info.key {
        msg!("Only the owner can update the lottery");
        return Err(LotteryError::UnauthorizedCaller.into());
    }
    if round.state() != LotteryState::IdleClosed {
        msg!("Configuration is frozen while a round is active");
        return Err(LotteryError::InvalidStateTransition.into());
    }
    Ok((config, round))
}

/// Every payout must land in a writable account that ends up rent-exempt.
/// Both legs are checked before any lamports move.
fn check_recipients(
    payout: &Payout,
    owner_info: &AccountInfo,
    winner_info: &AccountInfo,
    rent: &Rent,
) -> ProgramResult {
    if owner_info.key == winner_info.key {
        let credited = payout
            .operator_fee
            .checked_add(payout.winner_prize)
            .ok_or(LotteryError::ArithmeticOverflow)?;
        return check_recipient(winner_info, credited, rent);
    }
    check_recipient(owner_info, payout.operator_fee, rent)?;
    check_recipient(winner_info, payout.winner_prize, rent)
}

fn check_recipient(recipient: &AccountInfo, amount: u64, rent: &Rent) -> ProgramResult {
    if amount == 0 {
        return Ok(());
    }
    if !recipient.is_writable {
        msg!("Recipient {} is not writable", recipient.key);
        return Err(LotteryError::TransferFailed.into());
    }
    let post_balance = recipient
        .lamports()
        .checked_add(amount)
        .ok_or(LotteryError::ArithmeticOverflow)?;
    if !rent.is_exempt(post_balance, recipient.data_len()) {
        msg!(
            "Recipient {} would hold {} lamports, below the rent-exempt minimum {}",
            recipient.key,
            post_balance,
            rent.minimum_balance(recipient.data_len())
        );
        return Err(LotteryError::TransferFailed.into());
    }
    Ok(())
}

fn validate_parameters(
    fiat_entry_fee: u64,
    max_participants: u32,
    management_fee_percent: u8,
) -> Result<(), LotteryError> {
    if fiat_entry_fee == 0 {
        msg!("Entry fee must be greater than zero");
        return Err(LotteryError::InvalidConfiguration);
    }
    if max_participants == 0 || max_participants > MAX_PARTICIPANTS_LIMIT {
        msg!("Max participants must be between 1 and {}", MAX_PARTICIPANTS_LIMIT);
        return Err(LotteryError::InvalidConfiguration);
    }
    if management_fee_percent > MAX_MANAGEMENT_FEE_PERCENT {
        msg!("Management fee cannot exceed {}%", MAX_MANAGEMENT_FEE_PERCENT);
        return Err(LotteryError::InvalidConfiguration);
    }
    Ok(())
}

fn load_config(program_id: &Pubkey, config_info: &AccountInfo) -> Result<Config, ProgramError> {
    if config_info.owner != program_id {
        msg!("Config account must be owned by this program");
        return Err(ProgramError::IncorrectProgramId);
    }
    if *config_info.key != utils::find_config_address(program_id).0 {
        msg!("Invalid config account address");
        return Err(LotteryError::AccountMismatch.into());
    }
    Config::unpack(&config_info.data.borrow())
}

fn load_round(program_id: &Pubkey, round_info: &AccountInfo) -> Result<Round, ProgramError> {
    if round_info.owner != program_id {
        msg!("Round account must be owned by this program");
        return Err(ProgramError::IncorrectProgramId);
    }
    if *round_info.key != utils::find_round_address(program_id).0 {
        msg!("Invalid round account address");
        return Err(LotteryError::AccountMismatch.into());
    }
    let round: Round = try_from_slice_unchecked(&round_info.data.borrow())?;
    if !round.is_initialized {
        return Err(ProgramError::UninitializedAccount);
    }
    Ok(round)
}

fn save_round(round: &Round, round_info: &AccountInfo) -> ProgramResult {
    round.serialize(&mut &mut round_info.data.borrow_mut()[..])?;
    Ok(())
}

fn check_vault(program_id: &Pubkey, config: &Config, vault_info: &AccountInfo) -> ProgramResult {
    let expected = Pubkey::create_program_address(&[VAULT_SEED, &[config.vault_bump]], program_id)?;
    if *vault_info.key != expected {
        msg!("Vault account does not match");
        return Err(LotteryError::AccountMismatch.into());
    }
    Ok(())
}

fn check_system_program(system_program_info: &AccountInfo) -> ProgramResult {
    if *system_program_info.key != system_program::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

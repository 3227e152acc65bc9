// Solotto Lottery Program - State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{
    error::LotteryError,
    settlement::{self, Payout},
};

/// Lifecycle of a lottery round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LotteryState {
    /// No active round
    IdleClosed,
    /// Accepting entries
    Open,
    /// Closed to entries, waiting for the oracle to answer
    AwaitingRandomness,
}

/// Program configuration account
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Operator that opens and closes rounds and collects the management fee
    pub owner: Pubkey,
    /// Account holding the SOL/fiat price reading
    pub price_feed: Pubkey,
    /// Key allowed to deliver randomness
    pub oracle: Pubkey,
    /// Oracle key hash mixed into every request id
    pub key_hash: [u8; 32],
    /// Lamports paid to the oracle per randomness request
    pub oracle_fee: u64,
    /// Entry fee in fiat with `FIAT_DECIMALS` decimals
    pub fiat_entry_fee: u64,
    /// Seconds after opening at which anyone may close the round
    pub max_duration: u64,
    /// Ledger length at which anyone may close the round
    pub max_participants: u32,
    /// Share of the pot kept by the owner, in whole percent
    pub management_fee_percent: u8,
    pub vault_bump: u8,
    pub escrow_bump: u8,
}

impl Sealed for Config {}

impl IsInitialized for Config {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Config {
    const LEN: usize = 1 + 32 + 32 + 32 + 32 + 8 + 8 + 8 + 4 + 1 + 1 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Config::LEN];
        let (
            is_initialized,
            owner,
            price_feed,
            oracle,
            key_hash,
            oracle_fee,
            fiat_entry_fee,
            max_duration,
            max_participants,
            management_fee_percent,
            vault_bump,
            escrow_bump,
        ) = array_refs![src, 1, 32, 32, 32, 32, 8, 8, 8, 4, 1, 1, 1];

        let is_initialized = match is_initialized {
            [0] => false,
            [1] => true,
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Config {
            is_initialized,
            owner: Pubkey::new_from_array(*owner),
            price_feed: Pubkey::new_from_array(*price_feed),
            oracle: Pubkey::new_from_array(*oracle),
            key_hash: *key_hash,
            oracle_fee: u64::from_le_bytes(*oracle_fee),
            fiat_entry_fee: u64::from_le_bytes(*fiat_entry_fee),
            max_duration: u64::from_le_bytes(*max_duration),
            max_participants: u32::from_le_bytes(*max_participants),
            management_fee_percent: management_fee_percent[0],
            vault_bump: vault_bump[0],
            escrow_bump: escrow_bump[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Config::LEN];
        let (
            is_initialized_dst,
            owner_dst,
            price_feed_dst,
            oracle_dst,
            key_hash_dst,
            oracle_fee_dst,
            fiat_entry_fee_dst,
            max_duration_dst,
            max_participants_dst,
            management_fee_percent_dst,
            vault_bump_dst,
            escrow_bump_dst,
        ) = mut_array_refs![dst, 1, 32, 32, 32, 32, 8, 8, 8, 4, 1, 1, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        owner_dst.copy_from_slice(self.owner.as_ref());
        price_feed_dst.copy_from_slice(self.price_feed.as_ref());
        oracle_dst.copy_from_slice(self.oracle.as_ref());
        key_hash_dst.copy_from_slice(&self.key_hash);
        *oracle_fee_dst = self.oracle_fee.to_le_bytes();
        *fiat_entry_fee_dst = self.fiat_entry_fee.to_le_bytes();
        *max_duration_dst = self.max_duration.to_le_bytes();
        *max_participants_dst = self.max_participants.to_le_bytes();
        management_fee_percent_dst[0] = self.management_fee_percent;
        vault_bump_dst[0] = self.vault_bump;
        escrow_bump_dst[0] = self.escrow_bump;
    }
}

/// Correlation record for the one outstanding oracle request
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub request_id: [u8; 32],
    /// Epoch of the round that issued the request
    pub round_epoch: u64,
}

/// The singleton round aggregate.
///
/// Every transition is a guarded method: on error nothing has been mutated.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Round {
    pub is_initialized: bool,
    pub state: LotteryState,
    pub round_start_time: UnixTimestamp,
    /// Incremented on every settlement
    pub round_epoch: u64,
    /// Incremented on every randomness request
    pub request_nonce: u64,
    pub pending_request: Option<RandomnessRequest>,
    pub latest_winner: Option<Pubkey>,
    /// Entry order is ledger order, duplicates allowed
    pub participants: Vec<Pubkey>,
}

impl Round {
    /// Serialized size without participants
    pub const BASE_LEN: usize = 1 + 1 + 8 + 8 + 8 + (1 + 32 + 8) + (1 + 32) + 4;

    /// Account size needed to hold `capacity` participants
    pub fn space(capacity: u32) -> usize {
        Self::BASE_LEN + capacity as usize * 32
    }

    /// Number of participants an account of `data_len` bytes can hold
    pub fn capacity(data_len: usize) -> u32 {
        (data_len.saturating_sub(Self::BASE_LEN) / 32) as u32
    }

    pub fn new() -> Self {
        Self {
            is_initialized: true,
            state: LotteryState::IdleClosed,
            round_start_time: 0,
            round_epoch: 0,
            request_nonce: 0,
            pending_request: None,
            latest_winner: None,
            participants: Vec::new(),
        }
    }

    pub fn state(&self) -> LotteryState {
        self.state
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn latest_winner(&self) -> Option<Pubkey> {
        self.latest_winner
    }

    pub fn pending_request_id(&self) -> Option<[u8; 32]> {
        self.pending_request.map(|request| request.request_id)
    }

    /// `IdleClosed -> Open`
    pub fn open(
        &mut self,
        config: &Config,
        caller: &Pubkey,
        now: UnixTimestamp,
    ) -> Result<(), LotteryError> {
        if *caller != config.owner {
            return Err(LotteryError::UnauthorizedCaller);
        }
        if self.state != LotteryState::IdleClosed {
            return Err(LotteryError::InvalidStateTransition);
        }

        self.participants.clear();
        self.round_start_time = now;
        self.state = LotteryState::Open;
        Ok(())
    }

    /// Checks that an entry would be accepted, without touching the ledger.
    pub fn ensure_accepting_entries(&self, config: &Config) -> Result<(), LotteryError> {
        if self.state != LotteryState::Open {
            return Err(LotteryError::InvalidStateTransition);
        }
        if self.participants.len() >= config.max_participants as usize {
            return Err(LotteryError::InvalidStateTransition);
        }
        Ok(())
    }

    pub fn record_entry(&mut self, config: &Config, participant: Pubkey) -> Result<(), LotteryError> {
        self.ensure_accepting_entries(config)?;
        self.participants.push(participant);
        Ok(())
    }

    /// Pure closure predicate, callable by anyone.
    pub fn should_close(&self, config: &Config, now: UnixTimestamp) -> bool {
        if self.state != LotteryState::Open {
            return false;
        }
        let elapsed = now.saturating_sub(self.round_start_time);
        let expired = elapsed >= 0 && elapsed as u64 >= config.max_duration;
        expired || self.participants.len() >= config.max_participants as usize
    }

    /// Owner-triggered closure precondition
    pub fn authorize_manual_close(
        &self,
        config: &Config,
        caller: &Pubkey,
    ) -> Result<(), LotteryError> {
        if *caller != config.owner {
            return Err(LotteryError::UnauthorizedCaller);
        }
        if self.state != LotteryState::Open {
            return Err(LotteryError::InvalidStateTransition);
        }
        Ok(())
    }

    /// Permissionless closure precondition, evaluated at execution time
    pub fn authorize_automatic_close(
        &self,
        config: &Config,
        now: UnixTimestamp,
    ) -> Result<(), LotteryError> {
        if self.state != LotteryState::Open {
            return Err(LotteryError::InvalidStateTransition);
        }
        if !self.should_close(config, now) {
            return Err(LotteryError::ClosureConditionsNotMet);
        }
        Ok(())
    }

    /// `Open -> AwaitingRandomness`, recording the issued request
    pub fn await_randomness(&mut self, request: RandomnessRequest) -> Result<(), LotteryError> {
        if self.state != LotteryState::Open {
            return Err(LotteryError::InvalidStateTransition);
        }
        if request.round_epoch != self.round_epoch {
            return Err(LotteryError::UnknownOrCompletedRequest);
        }

        self.request_nonce = self
            .request_nonce
            .checked_add(1)
            .ok_or(LotteryError::ArithmeticOverflow)?;
        self.pending_request = Some(request);
        self.state = LotteryState::AwaitingRandomness;
        Ok(())
    }

    /// `AwaitingRandomness -> IdleClosed`.
    ///
    /// Consumes the pending request and computes the payout for a pot of `pot`
    /// lamports. Returns `None` when the ledger was empty: the round is reset and
    /// nothing is paid. Lamports must only be moved after the updated round has
    /// been written back.
    pub fn fulfill(
        &mut self,
        config: &Config,
        caller: &Pubkey,
        request_id: &[u8; 32],
        random_value: u64,
        pot: u64,
    ) -> Result<Option<Payout>, LotteryError> {
        if *caller != config.oracle {
            return Err(LotteryError::UnauthorizedCaller);
        }
        let request = match (self.state, self.pending_request) {
            (LotteryState::AwaitingRandomness, Some(request)) => request,
            _ => return Err(LotteryError::UnknownOrCompletedRequest),
        };
        if request.request_id != *request_id || request.round_epoch != self.round_epoch {
            return Err(LotteryError::UnknownOrCompletedRequest);
        }

        let payout = match settlement::plan_payout(
            &self.participants,
            random_value,
            pot,
            config.management_fee_percent,
        ) {
            Ok(payout) => Some(payout),
            Err(LotteryError::NoParticipants) => None,
            Err(e) => return Err(e),
        };
        let round_epoch = self
            .round_epoch
            .checked_add(1)
            .ok_or(LotteryError::ArithmeticOverflow)?;

        self.round_epoch = round_epoch;
        self.pending_request = None;
        if let Some(payout) = payout {
            self.latest_winner = Some(payout.winner);
        }
        self.participants.clear();
        self.state = LotteryState::IdleClosed;
        Ok(payout)
    }
}

impl Default for Round {
    fn default() -> Self {
        Self::new()
    }
}

// Solotto Lottery Program - Instructions
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;

use crate::utils;

#[derive(Clone, Debug, PartialEq)]
pub enum LotteryInstruction {
    /// Create the config and round accounts
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The owner, pays for both accounts
    /// 1. `[writable]` The config account (PDA)
    /// 2. `[writable]` The round account (PDA)
    /// 3. `[]` The price feed account
    /// 4. `[]` The oracle account
    /// 5. `[]` The system program
    InitializeLottery {
        /// Entry fee in fiat, 6 decimals (50 USD = 50_000_000)
        fiat_entry_fee: u64,
        /// Seconds after which anyone may close the round
        max_duration: u64,
        /// Ledger length after which anyone may close the round
        max_participants: u32,
        /// Owner share of the pot, in whole percent
        management_fee_percent: u8,
        /// Lamports paid to the oracle per request
        oracle_fee: u64,
        /// Oracle key hash
        key_hash: [u8; 32],
    },

    /// Open a new round (owner only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The owner
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    OpenRound,

    /// Enter the open round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    /// 3. `[writable]` The vault (PDA)
    /// 4. `[]` The price feed account
    /// 5. `[]` The system program
    Enter {
        /// Lamports paid, must cover the current entry fee
        payment: u64,
    },

    /// Close the round and request randomness (owner only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The owner
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    /// 3. `[writable]` The oracle escrow (PDA)
    /// 4. `[writable]` The oracle account
    /// 5. `[]` The system program
    CloseRound,

    /// Close the round once its duration or participant cap is reached
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    /// 3. `[writable]` The oracle escrow (PDA)
    /// 4. `[writable]` The oracle account
    /// 5. `[]` The system program
    PerformClosure,

    /// Deliver randomness and settle the round (oracle only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    /// 3. `[writable]` The vault (PDA)
    /// 4. `[writable]` The owner (management fee recipient)
    /// 5. `[writable]` The winner, `participants[random_value % len]`
    /// 6. `[]` The system program
    FulfillRandomness {
        request_id: [u8; 32],
        random_value: u64,
    },

    /// Compute the entry fee, returned as u64 LE return data
    ///
    /// Accounts expected:
    /// 0. `[]` The config account
    /// 1. `[]` The price feed account
    CurrentEntryFee,

    /// Evaluate the closure predicate, returned as one byte of return data
    ///
    /// Accounts expected:
    /// 0. `[]` The config account
    /// 1. `[]` The round account
    CheckClosure,

    /// Update round parameters between rounds (owner only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The owner
    /// 1. `[writable]` The config account
    /// 2. `[]` The round account
    UpdateConfig {
        fiat_entry_fee: u64,
        max_duration: u64,
        max_participants: u32,
        management_fee_percent: u8,
        oracle_fee: u64,
    },

    /// Hand the lottery to a new owner between rounds (owner only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The current owner
    /// 1. `[]` The new owner
    /// 2. `[writable]` The config account
    /// 3. `[]` The round account
    TransferOwnership,
}

impl LotteryInstruction {
    /// Unpacks a byte buffer into a LotteryInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (fiat_entry_fee, rest) = Self::unpack_u64(rest)?;
                let (max_duration, rest) = Self::unpack_u64(rest)?;
                let (max_participants, rest) = Self::unpack_u32(rest)?;
                let (management_fee_percent, rest) = Self::unpack_u8(rest)?;
                let (oracle_fee, rest) = Self::unpack_u64(rest)?;
                let (key_hash, _) = Self::unpack_fixed_bytes::<32>(rest)?;
                Self::InitializeLottery {
                    fiat_entry_fee,
                    max_duration,
                    max_participants,
                    management_fee_percent,
                    oracle_fee,
                    key_hash,
                }
            }
            1 => Self::OpenRound,
            2 => {
                let (payment, _) = Self::unpack_u64(rest)?;
                Self::Enter { payment }
            }
            3 => Self::CloseRound,
            4 => Self::PerformClosure,
            5 => {
                let (request_id, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (random_value, _) = Self::unpack_u64(rest)?;
                Self::FulfillRandomness {
                    request_id,
                    random_value,
                }
            }
            6 => Self::CurrentEntryFee,
            7 => Self::CheckClosure,
            8 => {
                let (fiat_entry_fee, rest) = Self::unpack_u64(rest)?;
                let (max_duration, rest) = Self::unpack_u64(rest)?;
                let (max_participants, rest) = Self::unpack_u32(rest)?;
                let (management_fee_percent, rest) = Self::unpack_u8(rest)?;
                let (oracle_fee, _) = Self::unpack_u64(rest)?;
                Self::UpdateConfig {
                    fiat_entry_fee,
                    max_duration,
                    max_participants,
                    management_fee_percent,
                    oracle_fee,
                }
            }
            9 => Self::TransferOwnership,
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a LotteryInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 + 8 + 4 + 1 + 8 + 32);
        match *self {
            Self::InitializeLottery {
                fiat_entry_fee,
                max_duration,
                max_participants,
                management_fee_percent,
                oracle_fee,
                ref key_hash,
            } => {
                buf.push(0);
                buf.extend_from_slice(&fiat_entry_fee.to_le_bytes());
                buf.extend_from_slice(&max_duration.to_le_bytes());
                buf.extend_from_slice(&max_participants.to_le_bytes());
                buf.push(management_fee_percent);
                buf.extend_from_slice(&oracle_fee.to_le_bytes());
                buf.extend_from_slice(key_hash);
            }
            Self::OpenRound => buf.push(1),
            Self::Enter { payment } => {
                buf.push(2);
                buf.extend_from_slice(&payment.to_le_bytes());
            }
            Self::CloseRound => buf.push(3),
            Self::PerformClosure => buf.push(4),
            Self::FulfillRandomness {
                ref request_id,
                random_value,
            } => {
                buf.push(5);
                buf.extend_from_slice(request_id);
                buf.extend_from_slice(&random_value.to_le_bytes());
            }
            Self::CurrentEntryFee => buf.push(6),
            Self::CheckClosure => buf.push(7),
            Self::UpdateConfig {
                fiat_entry_fee,
                max_duration,
                max_participants,
                management_fee_percent,
                oracle_fee,
            } => {
                buf.push(8);
                buf.extend_from_slice(&fiat_entry_fee.to_le_bytes());
                buf.extend_from_slice(&max_duration.to_le_bytes());
                buf.extend_from_slice(&max_participants.to_le_bytes());
                buf.push(management_fee_percent);
                buf.extend_from_slice(&oracle_fee.to_le_bytes());
            }
            Self::TransferOwnership => buf.push(9),
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let value = input
            .get(..4)
            .and_then(|slice| slice.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[4..]))
    }

    fn unpack_u8(input: &[u8]) -> Result<(u8, &[u8]), ProgramError> {
        let (value, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((*value, rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        let value = input
            .get(..N)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[N..]))
    }
}

/// Create initialize_lottery instruction
#[allow(clippy::too_many_arguments)]
pub fn initialize_lottery(
    program_id: &Pubkey,
    owner: &Pubkey,
    price_feed: &Pubkey,
    oracle: &Pubkey,
    fiat_entry_fee: u64,
    max_duration: u64,
    max_participants: u32,
    management_fee_percent: u8,
    oracle_fee: u64,
    key_hash: [u8; 32],
) -> Instruction {
    let data = LotteryInstruction::InitializeLottery {
        fiat_entry_fee,
        max_duration,
        max_participants,
        management_fee_percent,
        oracle_fee,
        key_hash,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new(utils::find_config_address(program_id).0, false),
        AccountMeta::new(utils::find_round_address(program_id).0, false),
        AccountMeta::new_readonly(*price_feed, false),
        AccountMeta::new_readonly(*oracle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create open_round instruction
pub fn open_round(program_id: &Pubkey, owner: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new_readonly(utils::find_config_address(program_id).0, false),
        AccountMeta::new(utils::find_round_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::OpenRound.pack(),
    }
}

/// Create enter instruction
pub fn enter(
    program_id: &Pubkey,
    participant: &Pubkey,
    price_feed: &Pubkey,
    payment: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*participant, true),
        AccountMeta::new_readonly(utils::find_config_address(program_id).0, false),
        AccountMeta::new(utils::find_round_address(program_id).0, false),
        AccountMeta::new(utils::find_vault_address(program_id).0, false),
        AccountMeta::new_readonly(*price_feed, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::Enter { payment }.pack(),
    }
}

fn closure_accounts(program_id: &Pubkey, caller: &Pubkey, oracle: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new_readonly(utils::find_config_address(program_id).0, false),
        AccountMeta::new(utils::find_round_address(program_id).0, false),
        AccountMeta::new(utils::find_oracle_escrow_address(program_id).0, false),
        AccountMeta::new(*oracle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ]
}

/// Create close_round instruction
pub fn close_round(program_id: &Pubkey, owner: &Pubkey, oracle: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: closure_accounts(program_id, owner, oracle),
        data: LotteryInstruction::CloseRound.pack(),
    }
}

/// Create perform_closure instruction
pub fn perform_closure(program_id: &Pubkey, caller: &Pubkey, oracle: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: closure_accounts(program_id, caller, oracle),
        data: LotteryInstruction::PerformClosure.pack(),
    }
}

/// Create fulfill_randomness instruction
pub fn fulfill_randomness(
    program_id: &Pubkey,
    oracle: &Pubkey,
    owner: &Pubkey,
    winner: &Pubkey,
    request_id: [u8; 32],
    random_value: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*oracle, true),
        AccountMeta::new_readonly(utils::find_config_address(program_id).0, false),
        AccountMeta::new(utils::find_round_address(program_id).0, false),
        AccountMeta::new(utils::find_vault_address(program_id).0, false),
        AccountMeta::new(*owner, false),
        AccountMeta::new(*winner, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::FulfillRandomness {
            request_id,
            random_value,
        }
        .pack(),
    }
}

/// Create current_entry_fee instruction
pub fn current_entry_fee(program_id: &Pubkey, price_feed: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(utils::find_config_address(program_id).0, false),
        AccountMeta::new_readonly(*price_feed, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::CurrentEntryFee.pack(),
    }
}

/// Create check_closure instruction
pub fn check_closure(program_id: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(utils::find_config_address(program_id).0, false),
        AccountMeta::new_readonly(utils::find_round_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::CheckClosure.pack(),
    }
}

/// Create update_config instruction
pub fn update_config(
    program_id: &Pubkey,
    owner: &Pubkey,
    fiat_entry_fee: u64,
    max_duration: u64,
    max_participants: u32,
    management_fee_percent: u8,
    oracle_fee: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new(utils::find_config_address(program_id).0, false),
        AccountMeta::new_readonly(utils::find_round_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::UpdateConfig {
            fiat_entry_fee,
            max_duration,
            max_participants,
            management_fee_percent,
            oracle_fee,
        }
        .pack(),
    }
}

/// Create transfer_ownership instruction
pub fn transfer_ownership(program_id: &Pubkey, owner: &Pubkey, new_owner: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new_readonly(*new_owner, false),
        AccountMeta::new(utils::find_config_address(program_id).0, false),
        AccountMeta::new_readonly(utils::find_round_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: LotteryInstruction::TransferOwnership.pack(),
    }
}

// Solotto Lottery Program
// A fiat-priced raffle settled with oracle-supplied randomness

pub mod constants;
pub mod error;
pub mod instruction;
pub mod price;
pub mod processor;
pub mod settlement;
pub mod state;
pub mod utils;

// Randomness oracle integration
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

/// Native entry used by `solana-program-test` and CPI callers
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}

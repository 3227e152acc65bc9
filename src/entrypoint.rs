// Solotto Lottery Program - Entrypoint
use solana_program::{
    account_info::AccountInfo, entrypoint, entrypoint::ProgramResult, msg,
    program_error::ProgramError, pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::{error::LotteryError, processor::Processor};

entrypoint!(process_instruction);

fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    Processor::process(program_id, accounts, instruction_data).map_err(|error| {
        match error {
            ProgramError::Custom(code) => match LotteryError::try_from(code) {
                Ok(lottery_error) => msg!("Lottery error: {}", lottery_error),
                Err(_) => msg!("Custom error: {}", code),
            },
            ref other => msg!("Program error: {}", other),
        }
        error
    })
}

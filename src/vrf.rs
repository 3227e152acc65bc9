// Randomness oracle integration for the Solotto lottery program
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    hash::hashv,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
};

use crate::{
    constants::ORACLE_ESCROW_SEED,
    error::LotteryError,
    state::{Config, RandomnessRequest, Round},
};

/// Derive the id of a randomness request.
///
/// Mixes the oracle key hash with the round account, its epoch, the request
/// nonce and the slot, so no two requests share an id.
pub fn derive_request_id(
    key_hash: &[u8; 32],
    round_key: &Pubkey,
    round_epoch: u64,
    request_nonce: u64,
    slot: u64,
) -> [u8; 32] {
    hashv(&[
        key_hash.as_ref(),
        round_key.as_ref(),
        &round_epoch.to_le_bytes(),
        &request_nonce.to_le_bytes(),
        &slot.to_le_bytes(),
    ])
    .to_bytes()
}

/// Check that the escrow can pay `oracle_fee` and stay rent-valid afterwards
pub fn ensure_oracle_funding(
    escrow_lamports: u64,
    oracle_fee: u64,
    rent: &Rent,
) -> Result<(), LotteryError> {
    let remaining = escrow_lamports
        .checked_sub(oracle_fee)
        .ok_or(LotteryError::InsufficientOracleFunding)?;
    if remaining != 0 && remaining < rent.minimum_balance(0) {
        return Err(LotteryError::InsufficientOracleFunding);
    }
    Ok(())
}

/// Pay the oracle out of the escrow and issue a request for the current round
#[allow(clippy::too_many_arguments)]
pub fn request_randomness<'a>(
    program_id: &Pubkey,
    config: &Config,
    round: &Round,
    round_info: &AccountInfo<'a>,
    escrow_info: &AccountInfo<'a>,
    oracle_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    rent: &Rent,
    slot: u64,
) -> Result<RandomnessRequest, ProgramError> {
    let expected_escrow = Pubkey::create_program_address(
        &[ORACLE_ESCROW_SEED, &[config.escrow_bump]],
        program_id,
    )?;
    if *escrow_info.key != expected_escrow {
        msg!("Oracle escrow account does not match");
        return Err(LotteryError::AccountMismatch.into());
    }
    if *oracle_info.key != config.oracle {
        msg!("Oracle account does not match config");
        return Err(LotteryError::AccountMismatch.into());
    }

    ensure_oracle_funding(escrow_info.lamports(), config.oracle_fee, rent).map_err(|e| {
        msg!(
            "Oracle escrow holds {} lamports, fee is {}",
            escrow_info.lamports(),
            config.oracle_fee
        );
        e
    })?;

    if config.oracle_fee > 0 {
        pay_oracle_fee(escrow_info, oracle_info, system_program_info, config)?;
    }

    let request_id = derive_request_id(
        &config.key_hash,
        round_info.key,
        round.round_epoch,
        round.request_nonce,
        slot,
    );
    msg!(
        "RequestedRandomness: request_id={} epoch={}",
        Pubkey::new_from_array(request_id),
        round.round_epoch
    );

    Ok(RandomnessRequest {
        request_id,
        round_epoch: round.round_epoch,
    })
}

fn pay_oracle_fee<'a>(
    escrow_info: &AccountInfo<'a>,
    oracle_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    config: &Config,
) -> ProgramResult {
    invoke_signed(
        &system_instruction::transfer(escrow_info.key, oracle_info.key, config.oracle_fee),
        &[
            escrow_info.clone(),
            oracle_info.clone(),
            system_program_info.clone(),
        ],
        &[&[ORACLE_ESCROW_SEED, &[config.escrow_bump]]],
    )
    .map_err(|e| {
        msg!("Oracle fee transfer failed: {}", e);
        LotteryError::InsufficientOracleFunding.into()
    })
}

// Solotto Lottery Program - Settlement
use solana_program::pubkey::Pubkey;

use crate::error::LotteryError;

/// Lamport movements owed once a round is settled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub winner: Pubkey,
    pub winner_index: usize,
    /// Sent to the owner
    pub operator_fee: u64,
    /// Sent to the winner
    pub winner_prize: u64,
}

/// Picks `participants[random_value % len]`.
///
/// Modulo bias is accepted: it is negligible for a 64-bit oracle value.
pub fn select_winner(
    participants: &[Pubkey],
    random_value: u64,
) -> Result<(usize, Pubkey), LotteryError> {
    if participants.is_empty() {
        return Err(LotteryError::NoParticipants);
    }
    let index = (random_value % participants.len() as u64) as usize;
    Ok((index, participants[index]))
}

/// Splits `total_balance` into `(operator_fee, winner_prize)`, flooring the fee.
pub fn split_pot(total_balance: u64, management_fee_percent: u8) -> Result<(u64, u64), LotteryError> {
    if management_fee_percent > 100 {
        return Err(LotteryError::InvalidConfiguration);
    }
    let operator_fee = (total_balance as u128)
        .checked_mul(management_fee_percent as u128)
        .ok_or(LotteryError::ArithmeticOverflow)?
        / 100;
    let operator_fee = u64::try_from(operator_fee).map_err(|_| LotteryError::ArithmeticOverflow)?;
    let winner_prize = total_balance
        .checked_sub(operator_fee)
        .ok_or(LotteryError::ArithmeticOverflow)?;
    Ok((operator_fee, winner_prize))
}

pub fn plan_payout(
    participants: &[Pubkey],
    random_value: u64,
    total_balance: u64,
    management_fee_percent: u8,
) -> Result<Payout, LotteryError> {
    let (winner_index, winner) = select_winner(participants, random_value)?;
    let (operator_fee, winner_prize) = split_pot(total_balance, management_fee_percent)?;
    Ok(Payout {
        winner,
        winner_index,
        operator_fee,
        winner_prize,
    })
}

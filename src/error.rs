// Solotto Lottery Program - Errors
use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use std::convert::TryFrom;
use thiserror::Error;

/// Errors that may be returned by the Lottery program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LotteryError {
    /// The operation is not legal in the round's current state
    #[error("Operation not allowed in the current round state")]
    InvalidStateTransition,

    /// Payment is below the entry fee computed at call time
    #[error("Payment is below the current entry fee")]
    InsufficientEntryFee,

    /// The price feed reported a non-positive price
    #[error("Price feed reading is unusable")]
    StalePriceFeed,

    /// The oracle escrow cannot cover the randomness request fee
    #[error("Oracle escrow cannot cover the randomness fee")]
    InsufficientOracleFunding,

    /// Neither the duration nor the participant cap has been reached
    #[error("Closure conditions are not met")]
    ClosureConditionsNotMet,

    /// The signer is not allowed to perform this action
    #[error("Caller is not authorized")]
    UnauthorizedCaller,

    /// The request id does not match the pending randomness request
    #[error("Unknown or already completed randomness request")]
    UnknownOrCompletedRequest,

    /// Settlement attempted with an empty ledger
    #[error("No participants in this round")]
    NoParticipants,

    /// A payout transfer could not be executed
    #[error("Transfer failed")]
    TransferFailed,

    /// Lottery parameters are out of range
    #[error("Invalid lottery configuration")]
    InvalidConfiguration,

    /// An account does not match the one recorded in the lottery state
    #[error("Account does not match the lottery state")]
    AccountMismatch,

    /// Fee or payout arithmetic overflowed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LotteryError {
    fn type_of() -> &'static str {
        "Lottery Error"
    }
}

impl TryFrom<u32> for LotteryError {
    type Error = ProgramError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        use LotteryError::*;
        Ok(match code {
            0 => InvalidStateTransition,
            1 => InsufficientEntryFee,
            2 => StalePriceFeed,
            3 => InsufficientOracleFunding,
            4 => ClosureConditionsNotMet,
            5 => UnauthorizedCaller,
            6 => UnknownOrCompletedRequest,
            7 => NoParticipants,
            8 => TransferFailed,
            9 => InvalidConfiguration,
            10 => AccountMismatch,
            11 => ArithmeticOverflow,
            _ => return Err(ProgramError::Custom(code)),
        })
    }
}

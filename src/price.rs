// Solotto Lottery Program - Fiat to lamport conversion
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    account_info::AccountInfo,
    msg,
    program_error::ProgramError,
    program_pack::{Pack, Sealed},
};

use crate::{
    constants::{FIAT_DECIMALS, NATIVE_DECIMALS},
    error::LotteryError,
    state::Config,
};

/// Latest SOL price in fiat as published by the feed account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceReading {
    /// Fiat per SOL, scaled by `10^decimals`
    pub price: i64,
    pub decimals: u8,
}

impl Sealed for PriceReading {}

impl Pack for PriceReading {
    const LEN: usize = 8 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, PriceReading::LEN];
        let (price, decimals) = array_refs![src, 8, 1];
        Ok(PriceReading {
            price: i64::from_le_bytes(*price),
            decimals: decimals[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, PriceReading::LEN];
        let (price_dst, decimals_dst) = mut_array_refs![dst, 8, 1];
        *price_dst = self.price.to_le_bytes();
        decimals_dst[0] = self.decimals;
    }
}

/// Lamports equivalent to `fiat_entry_fee` at the given reading.
///
/// `fiat * 10^decimals * 10^9 / (price * 10^6)`, truncated once at the end.
pub fn entry_fee(fiat_entry_fee: u64, reading: &PriceReading) -> Result<u64, LotteryError> {
    if reading.price <= 0 {
        return Err(LotteryError::StalePriceFeed);
    }

    let price_scale = 10u128
        .checked_pow(reading.decimals as u32)
        .ok_or(LotteryError::ArithmeticOverflow)?;
    let numerator = (fiat_entry_fee as u128)
        .checked_mul(price_scale)
        .and_then(|v| v.checked_mul(10u128.pow(NATIVE_DECIMALS)))
        .ok_or(LotteryError::ArithmeticOverflow)?;
    let denominator = (reading.price as u128)
        .checked_mul(10u128.pow(FIAT_DECIMALS))
        .ok_or(LotteryError::ArithmeticOverflow)?;

    u64::try_from(numerator / denominator).map_err(|_| LotteryError::ArithmeticOverflow)
}

/// Reads the configured feed and converts the fiat entry fee. Never cached.
pub fn current_entry_fee(config: &Config, price_feed_info: &AccountInfo) -> Result<u64, ProgramError> {
    if *price_feed_info.key != config.price_feed {
        msg!("Price feed account does not match config");
        return Err(LotteryError::AccountMismatch.into());
    }
    if price_feed_info.data_len() < PriceReading::LEN {
        msg!("Price feed account is too small");
        return Err(LotteryError::StalePriceFeed.into());
    }

    let reading = PriceReading::unpack_from_slice(&price_feed_info.data.borrow())?;
    let fee = entry_fee(config.fiat_entry_fee, &reading)?;
    msg!(
        "Entry fee: {} lamports (price {} / 10^{})",
        fee,
        reading.price,
        reading.decimals
    );
    Ok(fee)
}

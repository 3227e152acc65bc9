// Solotto Lottery Program - Utility Functions
use solana_program::pubkey::Pubkey;

use crate::constants::{CONFIG_SEED, ORACLE_ESCROW_SEED, ROUND_SEED, VAULT_SEED};

/// Find the program derived address of the config account
pub fn find_config_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED], program_id)
}

/// Find the program derived address of the round account
pub fn find_round_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ROUND_SEED], program_id)
}

/// Find the prize pool vault
pub fn find_vault_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED], program_id)
}

/// Find the escrow that prepays oracle fees
pub fn find_oracle_escrow_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ORACLE_ESCROW_SEED], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

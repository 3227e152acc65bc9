// Solotto Lottery Program - Constants

/// Seed of the configuration PDA
pub const CONFIG_SEED: &[u8] = b"config";
/// Seed of the round PDA
pub const ROUND_SEED: &[u8] = b"round";
/// Seed of the system-owned PDA that holds the prize pool
pub const VAULT_SEED: &[u8] = b"vault";
/// Seed of the system-owned PDA that prepays oracle fees
pub const ORACLE_ESCROW_SEED: &[u8] = b"oracle_escrow";

/// Lamports carry 9 decimals (1 SOL = 1_000_000_000 lamports)
pub const NATIVE_DECIMALS: u32 = 9;
/// Fiat amounts are expressed with 6 decimals (50 USD = 50_000_000)
pub const FIAT_DECIMALS: u32 = 6;

/// Upper bound on ledger capacity, keeps the round account under the CPI allocation limit
pub const MAX_PARTICIPANTS_LIMIT: u32 = 256;

/// Management fee is a whole percentage
pub const MAX_MANAGEMENT_FEE_PERCENT: u8 = 100;

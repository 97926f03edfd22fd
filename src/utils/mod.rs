//! Shared utilities
//!
//! - `address`: per-family wallet/token address format validation
//! - `chains`: static chain registry (aliases, decimals, RPC endpoints)

pub mod address;
pub mod chains;

pub use address::is_valid_address;
pub use chains::{resolve_chain, ChainFamily, ChainInfo, ScanWindow};

/// Current wall-clock time as unix seconds
#[inline]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

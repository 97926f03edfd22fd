//! Balance and transfer lookup providers
//!
//! One capability interface per concern, parameterized by chain family and
//! consulted through an ordered fallback chain (see [`fallback`]):
//! - `moralis`: primary metadata/balance/transfer REST provider (EVM)
//! - `etherscan`: Etherscan V2 balance fallback (EVM)
//! - `rpc`: public JSON-RPC last resort (EVM)
//! - `solana`: Solana JSON-RPC (base58 family)

pub mod etherscan;
pub mod fallback;
pub mod moralis;
pub mod rpc;
pub mod solana;

pub use etherscan::EtherscanProvider;
pub use fallback::{BalanceChain, ProviderSet, TransferChain};
pub use moralis::MoralisClient;
pub use rpc::PublicRpcProvider;
pub use solana::SolanaRpcProvider;

use async_trait::async_trait;

use crate::models::GateResult;
use crate::utils::chains::ChainInfo;

/// Amount the candidate must send to the verifier wallet
pub const REQUIRED_TRANSFER_AMOUNT: f64 = 1.0;

/// Normalized token balance lookup for one wallet
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Provider name for log lines
    fn name(&self) -> &'static str;

    /// Whether the required credential is present and plausible.
    /// Unconfigured providers are skipped, not counted as failures.
    fn is_configured(&self) -> bool;

    /// Whether this provider serves the given chain
    fn supports(&self, chain: &ChainInfo) -> bool;

    /// Normalized balance of `token` held by `wallet` (raw ÷ 10^decimals)
    async fn token_balance(&self, wallet: &str, token: &str, chain: &ChainInfo)
        -> GateResult<f64>;
}

/// Recent-window scan for the ownership-proof transfer
#[async_trait]
pub trait TransferProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    fn supports(&self, chain: &ChainInfo) -> bool;

    /// Whether `from_wallet` sent exactly one unit of `token` to `to_wallet`
    /// within the chain's recent-transfer window
    async fn has_qualifying_transfer(
        &self,
        from_wallet: &str,
        to_wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<bool>;
}

/// Whether a normalized amount is exactly 1.0 within one smallest unit.
/// The tolerance carries a hair of slack so boundary amounts like 1.01 at
/// two decimals are not rejected by float rounding.
#[inline]
pub fn is_unit_amount(amount: f64, decimals: u8) -> bool {
    let tolerance = crate::utils::chains::smallest_unit(decimals) * (1.0 + 1e-9);
    (amount - REQUIRED_TRANSFER_AMOUNT).abs() <= tolerance
}

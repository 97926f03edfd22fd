//! Ordered Provider Fallback Chain
//!
//! Providers are consulted in configuration order. The chain:
//! 1. Skips providers that do not serve the chain or lack a credential
//! 2. Accepts the first positive balance immediately
//! 3. Treats zero as a valid answer but keeps it as the running result,
//!    letting a later provider still report a positive balance
//! 4. Logs provider errors and falls through to the next provider
//!
//! `verify_balance` and `verify_transfer` are fail-closed: any condition
//! that prevents a definite positive answer denies verification.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::{GateError, GateResult, GroupConfig};
use crate::providers::{
    BalanceProvider, EtherscanProvider, MoralisClient, PublicRpcProvider, SolanaRpcProvider,
    TransferProvider,
};
use crate::utils::chains::{resolve_chain, ChainInfo};

// ============================================
// BALANCE CHAIN
// ============================================

/// Ordered balance lookup across the configured providers
pub struct BalanceChain {
    providers: Vec<Arc<dyn BalanceProvider>>,
}

impl BalanceChain {
    pub fn new(providers: Vec<Arc<dyn BalanceProvider>>) -> Self {
        Self { providers }
    }

    /// Normalized balance of `token` held by `wallet` on `chain`.
    ///
    /// Returns the first positive answer, otherwise the last answer any
    /// provider gave. Zero is a valid terminal result: a wallet that holds
    /// none of the token is an answer, not a failure.
    pub async fn token_balance(
        &self,
        wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<f64> {
        let mut last: Option<f64> = None;

        for provider in &self.providers {
            if !provider.supports(chain) || !provider.is_configured() {
                continue;
            }
            info!("🔍 Checking balance via {}", provider.name());
            match provider.token_balance(wallet, token, chain).await {
                Ok(balance) if balance > 0.0 => {
                    info!("✅ {} reports balance {}", provider.name(), balance);
                    return Ok(balance);
                }
                Ok(balance) => {
                    last = Some(balance);
                }
                Err(e) => {
                    warn!("⚠️ {} balance lookup failed: {}", provider.name(), e);
                }
            }
        }

        last.ok_or_else(|| {
            GateError::new(
                crate::models::ErrorCode::ProviderExhausted,
                format!("No provider could answer for chain {}", chain.canonical),
            )
        })
    }

    /// Whether `wallet` meets the group's minimum balance. Fail-closed:
    /// unknown chain or an exhausted provider chain both deny.
    pub async fn verify_balance(&self, cfg: &GroupConfig, wallet: &str) -> bool {
        let Some(chain) = resolve_chain(&cfg.chain_id) else {
            warn!("❌ Unknown chain id in group config: {}", cfg.chain_id);
            return false;
        };
        match self.token_balance(wallet, &cfg.token, &chain).await {
            Ok(balance) => {
                info!(
                    "Balance {} vs minimum {} for wallet {}",
                    balance, cfg.min_balance, wallet
                );
                balance >= cfg.min_balance
            }
            Err(e) => {
                warn!("❌ Balance verification failed closed: {}", e);
                false
            }
        }
    }
}

// ============================================
// TRANSFER CHAIN
// ============================================

/// Ordered transfer-proof scan across the configured providers
pub struct TransferChain {
    providers: Vec<Arc<dyn TransferProvider>>,
}

impl TransferChain {
    pub fn new(providers: Vec<Arc<dyn TransferProvider>>) -> Self {
        Self { providers }
    }

    /// Whether any provider can see the qualifying unit transfer.
    /// Fail-closed: errors and exhaustion both read as "not found".
    pub async fn verify_transfer(
        &self,
        cfg: &GroupConfig,
        from_wallet: &str,
    ) -> bool {
        let Some(chain) = resolve_chain(&cfg.chain_id) else {
            warn!("❌ Unknown chain id in group config: {}", cfg.chain_id);
            return false;
        };

        for provider in &self.providers {
            if !provider.supports(&chain) || !provider.is_configured() {
                continue;
            }
            info!("🔍 Scanning transfers via {}", provider.name());
            match provider
                .has_qualifying_transfer(from_wallet, &cfg.verifier, &cfg.token, &chain)
                .await
            {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!("⚠️ {} transfer scan failed: {}", provider.name(), e);
                }
            }
        }
        false
    }
}

// ============================================
// PROVIDER SET
// ============================================

/// Both chains, built once at startup from the runtime configuration
pub struct ProviderSet {
    pub balances: Arc<BalanceChain>,
    pub transfers: Arc<TransferChain>,
}

impl ProviderSet {
    /// Build the provider chains in their fixed consultation order:
    /// Moralis, then Etherscan, then public RPC for the hex family;
    /// Solana RPC for the base58 family.
    pub fn from_config(config: &AppConfig) -> Self {
        let moralis = Arc::new(MoralisClient::new(config.moralis_api_key.clone()));
        let etherscan = Arc::new(EtherscanProvider::new(
            config.etherscan_api_key.clone(),
            moralis.clone(),
        ));
        let public_rpc = Arc::new(PublicRpcProvider::new());
        let solana = Arc::new(SolanaRpcProvider::new(config.solana_rpc_url.clone()));

        let balances = BalanceChain::new(vec![
            moralis.clone() as Arc<dyn BalanceProvider>,
            etherscan,
            public_rpc,
            solana.clone() as Arc<dyn BalanceProvider>,
        ]);
        let transfers = TransferChain::new(vec![
            moralis as Arc<dyn TransferProvider>,
            solana as Arc<dyn TransferProvider>,
        ]);

        Self {
            balances: Arc::new(balances),
            transfers: Arc::new(transfers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted balance provider for chain-ordering tests
    struct FakeBalance {
        name: &'static str,
        configured: bool,
        answer: GateResult<f64>,
        calls: AtomicUsize,
    }

    impl FakeBalance {
        fn ok(name: &'static str, balance: f64) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured: true,
                answer: Ok(balance),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured: true,
                answer: Err(GateError::provider_failed("scripted failure")),
                calls: AtomicUsize::new(0),
            })
        }

        fn unconfigured(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured: false,
                answer: Ok(999.0),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BalanceProvider for FakeBalance {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn supports(&self, _chain: &ChainInfo) -> bool {
            true
        }

        async fn token_balance(
            &self,
            _wallet: &str,
            _token: &str,
            _chain: &ChainInfo,
        ) -> GateResult<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(b) => Ok(*b),
                Err(e) => Err(GateError::new(e.code, e.message.clone())),
            }
        }
    }

    fn eth() -> ChainInfo {
        resolve_chain("eth").unwrap()
    }

    fn group(min_balance: f64) -> GroupConfig {
        GroupConfig {
            chain_id: "eth".to_string(),
            token: "0xToken".to_string(),
            min_balance,
            verifier: "0xVerifier".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_positive_answer_wins() {
        let first = FakeBalance::ok("first", 5.0);
        let second = FakeBalance::ok("second", 100.0);
        let chain = BalanceChain::new(vec![first.clone(), second.clone()]);

        let balance = chain.token_balance("w", "t", &eth()).await.unwrap();
        assert_eq!(balance, 5.0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_falls_through_to_later_provider() {
        let zero = FakeBalance::ok("zero", 0.0);
        let positive = FakeBalance::ok("positive", 7.5);
        let chain = BalanceChain::new(vec![zero, positive]);

        let balance = chain.token_balance("w", "t", &eth()).await.unwrap();
        assert_eq!(balance, 7.5);
    }

    #[tokio::test]
    async fn test_trailing_zero_is_a_valid_answer() {
        let failing = FakeBalance::err("failing");
        let zero = FakeBalance::ok("zero", 0.0);
        let chain = BalanceChain::new(vec![failing, zero]);

        let balance = chain.token_balance("w", "t", &eth()).await.unwrap();
        assert_eq!(balance, 0.0);
    }

    #[tokio::test]
    async fn test_unconfigured_providers_are_skipped() {
        let skipped = FakeBalance::unconfigured("skipped");
        let answering = FakeBalance::ok("answering", 3.0);
        let chain = BalanceChain::new(vec![skipped.clone(), answering]);

        let balance = chain.token_balance("w", "t", &eth()).await.unwrap();
        assert_eq!(balance, 3.0);
        assert_eq!(skipped.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failing_is_exhausted() {
        let chain = BalanceChain::new(vec![FakeBalance::err("a"), FakeBalance::err("b")]);
        let err = chain.token_balance("w", "t", &eth()).await.unwrap_err();
        assert_eq!(err.code, crate::models::ErrorCode::ProviderExhausted);
    }

    #[tokio::test]
    async fn test_verify_balance_fail_closed() {
        // Exhausted chain denies
        let chain = BalanceChain::new(vec![FakeBalance::err("a")]);
        assert!(!chain.verify_balance(&group(1.0), "w").await);

        // Unknown chain denies even when a provider would answer
        let chain = BalanceChain::new(vec![FakeBalance::ok("a", 100.0)]);
        let mut cfg = group(1.0);
        cfg.chain_id = "dogecoin".to_string();
        assert!(!chain.verify_balance(&cfg, "w").await);
    }

    #[tokio::test]
    async fn test_verify_balance_threshold() {
        let chain = BalanceChain::new(vec![FakeBalance::ok("a", 10.0)]);
        assert!(chain.verify_balance(&group(10.0), "w").await);
        assert!(chain.verify_balance(&group(5.0), "w").await);
        assert!(!chain.verify_balance(&group(10.5), "w").await);
    }
}

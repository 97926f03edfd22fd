//! Moralis REST Provider (EVM family)
//!
//! Primary provider for the hex-address family:
//! 1. Token API - wallet ERC-20 balances, token metadata (decimals)
//! 2. Block API - date-to-block resolution for the transfer scan window
//! 3. Transfers API - recent wallet token transfers
//!
//! Every endpoint failure is converted to a `GateError` with a provider
//! code; the fallback chain decides what to do with it.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MORALIS_KEY_MIN_LEN;
use crate::models::{GateError, GateResult};
use crate::providers::{is_unit_amount, BalanceProvider, TransferProvider};
use crate::utils::chains::{normalize_raw, ChainFamily, ChainInfo, ScanWindow};

const BASE_URL: &str = "https://deep-index.moralis.io/api/v2.2";

/// Transfers fetched per scan; the window is narrow so a page is plenty
const TRANSFER_PAGE_LIMIT: u32 = 10;

// ============================================
// WIRE TYPES
// ============================================

/// Entry from GET /{wallet}/erc20
#[derive(Debug, Clone, Deserialize)]
struct TokenBalanceEntry {
    token_address: String,
    /// Raw integer balance as a decimal string
    balance: String,
    decimals: Option<u8>,
}

/// Entry from GET /erc20/metadata
#[derive(Debug, Clone, Deserialize)]
struct TokenMetadataEntry {
    /// Moralis returns decimals as a string here
    decimals: Option<String>,
}

/// Response from GET /dateToBlock
#[derive(Debug, Clone, Deserialize)]
struct DateToBlockResponse {
    block: u64,
}

/// Entry from GET /{wallet}/erc20/transfers
#[derive(Debug, Clone, Deserialize)]
struct TransferEntry {
    /// Token contract address
    address: String,
    to_address: String,
    #[allow(dead_code)]
    from_address: String,
    /// Raw integer value as a decimal string
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TransferPage {
    result: Vec<TransferEntry>,
}

// ============================================
// CLIENT
// ============================================

/// Moralis API client implementing both provider capabilities for EVM chains
pub struct MoralisClient {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl MoralisClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self { api_key, client }
    }

    fn key(&self) -> GateResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GateError::missing_credential("MORALIS_API_KEY"))
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> GateResult<T> {
        let url = format!("{}{}", BASE_URL, path);
        let response = self
            .client
            .get(&url)
            .header("X-API-Key", self.key()?)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GateError::provider_rate_limited());
        }
        if !status.is_success() {
            return Err(GateError::provider_failed(format!(
                "Moralis {} returned HTTP {}",
                path, status
            )));
        }
        Ok(response.json::<T>().await?)
    }

    /// Token decimals via metadata lookup, falling back to the chain default
    /// when the lookup fails or the payload is malformed
    pub async fn token_decimals(&self, token: &str, chain: &ChainInfo) -> u8 {
        let query = [
            ("chain", chain.canonical.to_string()),
            ("addresses[0]", token.to_string()),
        ];
        match self
            .get::<Vec<TokenMetadataEntry>>("/erc20/metadata", &query)
            .await
        {
            Ok(entries) => entries
                .first()
                .and_then(|e| e.decimals.as_deref())
                .and_then(|d| d.parse().ok())
                .unwrap_or(chain.default_decimals),
            Err(e) => {
                warn!("⚠️ Error fetching token decimals: {}", e);
                chain.default_decimals
            }
        }
    }

    /// Latest block number, resolved through the date-to-block endpoint
    async fn current_block(&self, chain: &ChainInfo) -> GateResult<u64> {
        let query = [
            ("chain", chain.canonical.to_string()),
            ("date", chrono::Utc::now().to_rfc3339()),
        ];
        let resp: DateToBlockResponse = self.get("/dateToBlock", &query).await?;
        Ok(resp.block)
    }
}

#[async_trait]
impl BalanceProvider for MoralisClient {
    fn name(&self) -> &'static str {
        "moralis"
    }

    fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| k.len() > MORALIS_KEY_MIN_LEN)
            .unwrap_or(false)
    }

    fn supports(&self, chain: &ChainInfo) -> bool {
        chain.family == ChainFamily::Evm
    }

    async fn token_balance(
        &self,
        wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<f64> {
        let query = [
            ("chain", chain.canonical.to_string()),
            ("token_addresses[0]", token.to_string()),
        ];
        let entries: Vec<TokenBalanceEntry> =
            self.get(&format!("/{}/erc20", wallet), &query).await?;

        for entry in entries {
            if entry.token_address.eq_ignore_ascii_case(token) {
                let raw: u128 = entry
                    .balance
                    .parse()
                    .map_err(|_| GateError::bad_response("Non-integer balance from Moralis"))?;
                let decimals = entry.decimals.unwrap_or(chain.default_decimals);
                return Ok(normalize_raw(raw, decimals));
            }
        }
        // Wallet holds no accounts for this token
        Ok(0.0)
    }
}

#[async_trait]
impl TransferProvider for MoralisClient {
    fn name(&self) -> &'static str {
        "moralis"
    }

    fn is_configured(&self) -> bool {
        BalanceProvider::is_configured(self)
    }

    fn supports(&self, chain: &ChainInfo) -> bool {
        chain.family == ChainFamily::Evm
    }

    async fn has_qualifying_transfer(
        &self,
        from_wallet: &str,
        to_wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<bool> {
        let current_block = self.current_block(chain).await?;
        let window = match chain.scan_window {
            ScanWindow::Blocks(n) => n,
            // EVM scans are always block-bounded; age windows belong to Solana
            ScanWindow::AgeSecs(_) => crate::utils::chains::EVM_SCAN_BLOCKS,
        };
        let from_block = current_block.saturating_sub(window);

        let decimals = self.token_decimals(token, chain).await;
        debug!("Token {} has decimals: {}", token, decimals);

        let query = [
            ("chain", chain.canonical.to_string()),
            ("from_block", from_block.to_string()),
            ("to_block", current_block.to_string()),
            ("contract_addresses[0]", token.to_string()),
            ("to_address", to_wallet.to_string()),
            ("limit", TRANSFER_PAGE_LIMIT.to_string()),
        ];
        info!(
            "🔍 Checking transfers in blocks {} to {}",
            from_block, current_block
        );
        let page: TransferPage = self
            .get(&format!("/{}/erc20/transfers", from_wallet), &query)
            .await?;

        for transfer in page.result {
            // A malformed value skips this transfer only, never the scan
            let Ok(raw) = transfer.value.parse::<u128>() else {
                warn!("⚠️ Skipping transfer with malformed value: {}", transfer.value);
                continue;
            };
            let amount = normalize_raw(raw, decimals);
            if transfer.to_address.eq_ignore_ascii_case(to_wallet)
                && transfer.address.eq_ignore_ascii_case(token)
                && is_unit_amount(amount, decimals)
            {
                info!("✅ Qualifying transfer found ({} tokens to verifier)", amount);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

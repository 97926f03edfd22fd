//! Etherscan V2 Balance Provider (EVM family)
//!
//! Fallback balance source behind Moralis. The V2 REST API returns raw
//! integer balances, so decimals come from a Moralis metadata lookup with
//! the chain default as the final fallback.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{GateError, GateResult};
use crate::providers::{BalanceProvider, MoralisClient};
use crate::utils::chains::{normalize_raw, ChainFamily, ChainInfo};

const BASE_URL: &str = "https://api.etherscan.io/v2/api";

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    /// Raw integer balance as a decimal string, or an error message
    result: String,
}

/// Etherscan V2 REST client
pub struct EtherscanProvider {
    api_key: Option<String>,
    /// Decimals source; Etherscan itself does not expose token metadata here
    metadata: Arc<MoralisClient>,
    client: reqwest::Client,
}

impl EtherscanProvider {
    pub fn new(api_key: Option<String>, metadata: Arc<MoralisClient>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            metadata,
            client,
        }
    }
}

#[async_trait]
impl BalanceProvider for EtherscanProvider {
    fn name(&self) -> &'static str {
        "etherscan"
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }

    fn supports(&self, chain: &ChainInfo) -> bool {
        chain.family == ChainFamily::Evm && chain.evm_chain_id.is_some()
    }

    async fn token_balance(
        &self,
        wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<f64> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GateError::missing_credential("ETHERSCAN_API_KEY"))?;
        let chain_id = chain
            .evm_chain_id
            .ok_or_else(|| GateError::unsupported_chain(chain.canonical))?;

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("chainid", chain_id.to_string()),
                ("module", "account".to_string()),
                ("action", "tokenbalance".to_string()),
                ("contractaddress", token.to_string()),
                ("address", wallet.to_string()),
                ("tag", "latest".to_string()),
                ("apikey", api_key.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::provider_failed(format!(
                "Etherscan returned HTTP {}",
                status
            )));
        }

        let body: EtherscanResponse = response.json().await?;
        if body.status != "1" {
            return Err(GateError::bad_response(format!(
                "Etherscan error: {}",
                body.result
            )));
        }
        let raw: u128 = body
            .result
            .parse()
            .map_err(|_| GateError::bad_response("Non-integer balance from Etherscan"))?;

        let decimals = self.metadata.token_decimals(token, chain).await;
        Ok(normalize_raw(raw, decimals))
    }
}

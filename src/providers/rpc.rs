//! Public JSON-RPC Provider (EVM family)
//!
//! Last-resort balance source that needs no credential: raw `eth_call`
//! against the chain's default public endpoint with exponential backoff
//! retry (base 500ms, doubled per attempt, ±20% jitter).
//!
//! Decimals come from the token contract itself (`decimals()`), with the
//! chain default when the call fails or returns garbage.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{GateError, GateResult};
use crate::providers::BalanceProvider;
use crate::utils::chains::{normalize_raw, ChainFamily, ChainInfo};

/// Base retry delay in milliseconds
const BASE_RETRY_MS: u64 = 500;

/// Maximum retry delay in milliseconds
const MAX_RETRY_MS: u64 = 4_000;

/// Retry attempts per call (500ms -> 1s -> 2s)
const MAX_RETRIES: u32 = 3;

/// Jitter percentage applied to retry delay
const RETRY_JITTER_PERCENT: u64 = 20;

/// `balanceOf(address)` selector
const SELECTOR_BALANCE_OF: &str = "0x70a08231";

/// `decimals()` selector
const SELECTOR_DECIMALS: &str = "0x313ce567";

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Credential-free `eth_call` provider against public endpoints
pub struct PublicRpcProvider {
    client: reqwest::Client,
}

impl PublicRpcProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Execute JSON-RPC call with exponential backoff and jitter
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> GateResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let base_delay = (BASE_RETRY_MS * 2_u64.pow(attempt - 1)).min(MAX_RETRY_MS);
                let jitter_range = (base_delay * RETRY_JITTER_PERCENT) / 100;
                let jitter: i64 =
                    rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
                let delay = (base_delay as i64 + jitter).max(50) as u64;
                debug!("⏳ RPC retry {}/{} after {}ms", attempt + 1, MAX_RETRIES, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.execute_call::<T>(url, &payload).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("⚠️ RPC call failed (attempt {}/{}): {}", attempt + 1, MAX_RETRIES, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| GateError::provider_failed("RPC exhausted all retries")))
    }

    /// Execute single RPC call
    async fn execute_call<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> GateResult<T> {
        let response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GateError::provider_rate_limited());
        }
        if !status.is_success() {
            return Err(GateError::provider_failed(format!("HTTP error: {}", status)));
        }

        let json: RpcResponse<T> = response.json().await?;
        if let Some(error) = json.error {
            return Err(GateError::provider_failed(format!(
                "RPC error: {} (code: {})",
                error.message, error.code
            )));
        }
        json.result
            .ok_or_else(|| GateError::bad_response("No result in RPC response"))
    }

    async fn eth_call(&self, url: &str, to: &str, data: String) -> GateResult<String> {
        let params = serde_json::json!([{ "to": to, "data": data }, "latest"]);
        self.call::<String>(url, "eth_call", params).await
    }

    /// Contract-reported decimals, falling back to the chain default
    async fn contract_decimals(&self, url: &str, token: &str, chain: &ChainInfo) -> u8 {
        match self.eth_call(url, token, SELECTOR_DECIMALS.to_string()).await {
            Ok(hex) => parse_hex_u128(&hex)
                .and_then(|v| u8::try_from(v).ok())
                .unwrap_or(chain.default_decimals),
            Err(e) => {
                warn!("⚠️ decimals() call failed, using chain default: {}", e);
                chain.default_decimals
            }
        }
    }
}

impl Default for PublicRpcProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// ABI-encode an address as the sole 32-byte argument
fn encode_address_arg(selector: &str, address: &str) -> String {
    let bare = address.trim_start_matches("0x").to_lowercase();
    format!("{}{:0>64}", selector, bare)
}

/// Parse a 0x-prefixed hex word, saturating above u128::MAX
fn parse_hex_u128(hex: &str) -> Option<u128> {
    let bare = hex.trim_start_matches("0x").trim_start_matches('0');
    if bare.is_empty() {
        return Some(0);
    }
    if bare.len() > 32 {
        return Some(u128::MAX);
    }
    u128::from_str_radix(bare, 16).ok()
}

#[async_trait]
impl BalanceProvider for PublicRpcProvider {
    fn name(&self) -> &'static str {
        "public-rpc"
    }

    fn is_configured(&self) -> bool {
        // No credential required
        true
    }

    fn supports(&self, chain: &ChainInfo) -> bool {
        chain.family == ChainFamily::Evm && chain.public_rpc.is_some()
    }

    async fn token_balance(
        &self,
        wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<f64> {
        let url = chain
            .public_rpc
            .ok_or_else(|| GateError::unsupported_chain(chain.canonical))?;

        let data = encode_address_arg(SELECTOR_BALANCE_OF, wallet);
        let hex = self.eth_call(url, token, data).await?;
        let raw = parse_hex_u128(&hex)
            .ok_or_else(|| GateError::bad_response(format!("Bad balanceOf word: {}", hex)))?;

        let decimals = self.contract_decimals(url, token, chain).await;
        Ok(normalize_raw(raw, decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_address_arg() {
        let data = encode_address_arg(
            SELECTOR_BALANCE_OF,
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
        );
        assert_eq!(data.len(), 10 + 64);
        assert!(data.starts_with("0x70a08231"));
        assert!(data.ends_with("7a250d5630b4cf539739df2c5dacb4c659f2488d"));
        // 24 zero-pad chars before the 40-char address
        assert_eq!(&data[10..34], "0".repeat(24));
    }

    #[test]
    fn test_parse_hex_u128() {
        assert_eq!(parse_hex_u128("0x0"), Some(0));
        assert_eq!(parse_hex_u128("0x12"), Some(18));
        assert_eq!(
            parse_hex_u128("0x0000000000000000000000000000000000000000000000000de0b6b3a7640000"),
            Some(1_000_000_000_000_000_000)
        );
        // Saturates instead of overflowing
        assert_eq!(parse_hex_u128(&format!("0x{}", "f".repeat(40))), Some(u128::MAX));
        assert_eq!(parse_hex_u128("0xzz"), None);
    }

    #[test]
    fn test_supports_only_chains_with_public_rpc() {
        let p = PublicRpcProvider::new();
        assert!(p.supports(&crate::utils::chains::resolve_chain("eth").unwrap()));
        assert!(!p.supports(&crate::utils::chains::resolve_chain("solana").unwrap()));
        assert!(p.is_configured());
    }
}

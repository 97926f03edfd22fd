//! Solana JSON-RPC Provider (base58 family)
//!
//! Both capabilities for the base58 address family over standard JSON-RPC:
//! - Balance: `getTokenAccountsByOwner` (jsonParsed), summing token-account
//!   amounts for the mint
//! - Transfer proof: `getSignaturesForAddress` bounded by a wall-clock age
//!   ceiling, then `getTransaction` per signature, comparing the verifier's
//!   pre/post token balances for the mint
//!
//! A failed fetch of any single transaction skips that signature only; the
//! scan keeps going.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{GateError, GateResult};
use crate::providers::{is_unit_amount, BalanceProvider, TransferProvider};
use crate::utils::chains::{ChainFamily, ChainInfo, ScanWindow, SOLANA_SCAN_AGE_SECS};
use crate::utils::unix_now;

/// Signatures fetched per scan; the age ceiling trims the tail
const SIGNATURE_PAGE_LIMIT: u32 = 25;

// ============================================
// WIRE TYPES (jsonParsed encoding)
// ============================================

/// Token amount as reported by the token program
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
    pub ui_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct KeyedAccountList {
    value: Vec<KeyedAccount>,
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    account: AccountEnvelope,
}

#[derive(Debug, Deserialize)]
struct AccountEnvelope {
    data: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    parsed: ParsedInfo,
}

#[derive(Debug, Deserialize)]
struct ParsedInfo {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: TokenAmount,
}

/// Entry from getSignaturesForAddress
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureInfo {
    signature: String,
    block_time: Option<i64>,
    err: Option<serde_json::Value>,
}

/// Transaction envelope from getTransaction
#[derive(Debug, Deserialize)]
struct TransactionEnvelope {
    meta: Option<TransactionMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    pre_token_balances: Option<Vec<SolanaTokenBalance>>,
    post_token_balances: Option<Vec<SolanaTokenBalance>>,
}

/// Token balance entry inside transaction metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolanaTokenBalance {
    account_index: u8,
    mint: String,
    owner: Option<String>,
    ui_token_amount: TokenAmount,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

// ============================================
// CLIENT
// ============================================

/// Solana RPC client implementing both provider capabilities
pub struct SolanaRpcProvider {
    url: String,
    client: reqwest::Client,
}

impl SolanaRpcProvider {
    /// `url_override` replaces the chain's default public endpoint
    pub fn new(url_override: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self {
            url: url_override
                .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string()),
            client,
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> GateResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        let response = self.client.post(&self.url).json(&payload).send().await?;

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

    /// Net change of `mint` held by `owner` across a transaction, if any
    fn owner_delta(meta: &TransactionMeta, mint: &str, owner: &str) -> Option<(f64, u8)> {
        let posts = meta.post_token_balances.as_deref()?;
        let pres = meta.pre_token_balances.as_deref().unwrap_or(&[]);

        for post in posts {
            if !post.mint.eq_ignore_ascii_case(mint) {
                continue;
            }
            let Some(post_owner) = post.owner.as_deref() else {
                continue;
            };
            if post_owner != owner {
                continue;
            }
            let post_amount = ui_amount(&post.ui_token_amount);
            let pre_amount = pres
                .iter()
                .find(|p| p.account_index == post.account_index)
                .map(|p| ui_amount(&p.ui_token_amount))
                .unwrap_or(0.0);
            return Some((post_amount - pre_amount, post.ui_token_amount.decimals));
        }
        None
    }
}

/// Normalized amount, recomputed from the raw string when uiAmount is null
fn ui_amount(amount: &TokenAmount) -> f64 {
    amount.ui_amount.unwrap_or_else(|| {
        amount
            .amount
            .parse::<u128>()
            .map(|raw| crate::utils::chains::normalize_raw(raw, amount.decimals))
            .unwrap_or(0.0)
    })
}

#[async_trait]
impl BalanceProvider for SolanaRpcProvider {
    fn name(&self) -> &'static str {
        "solana-rpc"
    }

    fn is_configured(&self) -> bool {
        // Public endpoint, no credential required
        true
    }

    fn supports(&self, chain: &ChainInfo) -> bool {
        chain.family == ChainFamily::Solana
    }

    async fn token_balance(
        &self,
        wallet: &str,
        token: &str,
        _chain: &ChainInfo,
    ) -> GateResult<f64> {
        let params = serde_json::json!([
            wallet,
            { "mint": token },
            { "encoding": "jsonParsed" }
        ]);
        let accounts: KeyedAccountList = self.call("getTokenAccountsByOwner", params).await?;

        // A wallet may hold several token accounts for one mint; sum them
        let total = accounts
            .value
            .iter()
            .map(|a| ui_amount(&a.account.data.parsed.info.token_amount))
            .sum();
        Ok(total)
    }
}

#[async_trait]
impl TransferProvider for SolanaRpcProvider {
    fn name(&self) -> &'static str {
        "solana-rpc"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn supports(&self, chain: &ChainInfo) -> bool {
        chain.family == ChainFamily::Solana
    }

    async fn has_qualifying_transfer(
        &self,
        from_wallet: &str,
        to_wallet: &str,
        token: &str,
        chain: &ChainInfo,
    ) -> GateResult<bool> {
        let max_age = match chain.scan_window {
            ScanWindow::AgeSecs(secs) => secs as i64,
            ScanWindow::Blocks(_) => SOLANA_SCAN_AGE_SECS as i64,
        };
        let cutoff = unix_now() - max_age;

        let params = serde_json::json!([from_wallet, { "limit": SIGNATURE_PAGE_LIMIT }]);
        let signatures: Vec<SignatureInfo> =
            self.call("getSignaturesForAddress", params).await?;

        for sig in signatures {
            if sig.err.is_some() {
                continue;
            }
            // Signatures are newest-first; past the cutoff nothing qualifies
            if let Some(block_time) = sig.block_time {
                if block_time < cutoff {
                    break;
                }
            }

            let params = serde_json::json!([
                sig.signature,
                { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
            ]);
            let tx: TransactionEnvelope = match self.call("getTransaction", params).await {
                Ok(tx) => tx,
                Err(e) => {
                    // Skip this signature, keep scanning
                    warn!("⚠️ Skipping transaction {}: {}", sig.signature, e);
                    continue;
                }
            };

            let Some(meta) = tx.meta else { continue };
            if let Some((delta, decimals)) = Self::owner_delta(&meta, token, to_wallet) {
                debug!("Verifier delta {} in tx {}", delta, sig.signature);
                if is_unit_amount(delta, decimals) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(index: u8, mint: &str, owner: &str, amount: f64, decimals: u8) -> SolanaTokenBalance {
        SolanaTokenBalance {
            account_index: index,
            mint: mint.to_string(),
            owner: Some(owner.to_string()),
            ui_token_amount: TokenAmount {
                amount: format!("{}", (amount * 10f64.powi(decimals as i32)) as u128),
                decimals,
                ui_amount: Some(amount),
            },
        }
    }

    #[test]
    fn test_owner_delta_detects_incoming_unit() {
        let meta = TransactionMeta {
            pre_token_balances: Some(vec![balance(1, "Mint", "Verifier", 4.0, 9)]),
            post_token_balances: Some(vec![balance(1, "Mint", "Verifier", 5.0, 9)]),
        };
        let (delta, decimals) = SolanaRpcProvider::owner_delta(&meta, "Mint", "Verifier").unwrap();
        assert!((delta - 1.0).abs() < 1e-9);
        assert_eq!(decimals, 9);
        assert!(is_unit_amount(delta, decimals));
    }

    #[test]
    fn test_owner_delta_missing_pre_balance_counts_from_zero() {
        let meta = TransactionMeta {
            pre_token_balances: Some(vec![]),
            post_token_balances: Some(vec![balance(2, "Mint", "Verifier", 1.0, 9)]),
        };
        let (delta, _) = SolanaRpcProvider::owner_delta(&meta, "Mint", "Verifier").unwrap();
        assert!((delta - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_owner_delta_ignores_other_mints_and_owners() {
        let meta = TransactionMeta {
            pre_token_balances: None,
            post_token_balances: Some(vec![
                balance(0, "OtherMint", "Verifier", 1.0, 9),
                balance(1, "Mint", "Someone", 1.0, 9),
            ]),
        };
        assert!(SolanaRpcProvider::owner_delta(&meta, "Mint", "Verifier").is_none());
    }

    #[test]
    fn test_ui_amount_falls_back_to_raw() {
        let amount = TokenAmount {
            amount: "2500000000".to_string(),
            decimals: 9,
            ui_amount: None,
        };
        assert!((ui_amount(&amount) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_supports_solana_only() {
        let p = SolanaRpcProvider::new(None);
        let sol = crate::utils::chains::resolve_chain("solana").unwrap();
        let eth = crate::utils::chains::resolve_chain("eth").unwrap();
        assert!(BalanceProvider::supports(&p, &sol));
        assert!(!BalanceProvider::supports(&p, &eth));
    }
}

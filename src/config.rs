//! Configuration module
//!
//! All runtime knobs come from the environment, resolved once at startup.
//! Provider credentials are optional: an absent or implausibly short key
//! simply leaves that provider unconfigured (it is skipped by the fallback
//! chain, not counted as a failure).

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the gate
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Moralis API key (primary metadata/balance/transfer provider)
    pub moralis_api_key: Option<String>,

    /// Etherscan V2 API key (EVM balance fallback)
    pub etherscan_api_key: Option<String>,

    /// Solana RPC endpoint override (defaults to the public mainnet endpoint)
    pub solana_rpc_url: Option<String>,

    /// Telegram bot token for the chat-platform client
    pub bot_token: Option<String>,

    /// Data directory for the JSON file store
    pub data_dir: PathBuf,

    /// Owner user id: bypasses verification, permanently exempt from the sweep
    pub owner_user_id: String,

    /// Interval between re-verification sweeps
    pub sweep_interval: Duration,

    /// Optional TTL for verification links; None means links never expire
    pub link_ttl_secs: Option<u64>,
}

/// Moralis keys are long JWTs; anything shorter is a paste error
pub const MORALIS_KEY_MIN_LEN: usize = 50;

/// Default sweep cadence (~16.6 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1000;

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            moralis_api_key: non_empty_env("MORALIS_API_KEY"),
            etherscan_api_key: non_empty_env("ETHERSCAN_API_KEY"),
            solana_rpc_url: non_empty_env("SOLANA_RPC_URL"),
            bot_token: non_empty_env("TELEGRAM_BOT_TOKEN"),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            owner_user_id: std::env::var("OWNER_USER_ID").unwrap_or_default(),
            sweep_interval: Duration::from_secs(
                std::env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
            link_ttl_secs: std::env::var("LINK_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Whether the Moralis credential passes the minimal sanity check
    pub fn moralis_configured(&self) -> bool {
        self.moralis_api_key
            .as_deref()
            .map(|k| k.len() > MORALIS_KEY_MIN_LEN)
            .unwrap_or(false)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            moralis_api_key: None,
            etherscan_api_key: None,
            solana_rpc_url: None,
            bot_token: None,
            data_dir: PathBuf::from("./data"),
            owner_user_id: String::new(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            link_ttl_secs: None,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moralis_sanity_check() {
        let mut cfg = AppConfig::default();
        assert!(!cfg.moralis_configured());

        cfg.moralis_api_key = Some("short".to_string());
        assert!(!cfg.moralis_configured());

        cfg.moralis_api_key = Some("x".repeat(64));
        assert!(cfg.moralis_configured());
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.sweep_interval, Duration::from_secs(1000));
        assert!(cfg.link_ttl_secs.is_none());
    }
}

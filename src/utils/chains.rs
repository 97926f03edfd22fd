//! Chain Registry - Single Source of Truth
//!
//! Static mapping from user-facing chain aliases to canonical chain
//! identifiers, plus per-chain defaults (decimals, public RPC endpoint,
//! transfer-scan window). All chain knowledge lives here; no hardcoded
//! chain values in other modules.

use serde::{Deserialize, Serialize};

/// Grouping of chains sharing an address format and balance-normalization
/// convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainFamily {
    /// Account-based, hex-40 addresses (Ethereum, BSC, Polygon, ...)
    Evm,
    /// Base58 32-byte addresses
    Solana,
}

/// How the transfer scan bounds "recent"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWindow {
    /// Fixed number of most-recent blocks
    Blocks(u64),
    /// Wall-clock age ceiling in seconds
    AgeSecs(u64),
}

/// Resolved chain descriptor handed to providers
#[derive(Debug, Clone, PartialEq)]
pub struct ChainInfo {
    /// Canonical identifier used by providers ("eth", "bsc", "polygon", "solana")
    pub canonical: &'static str,
    pub family: ChainFamily,
    /// Numeric chain id for EVM explorer APIs (None for non-EVM chains)
    pub evm_chain_id: Option<u64>,
    /// Decimals fallback when metadata lookup fails or is malformed
    pub default_decimals: u8,
    /// Default public RPC endpoint (last-resort balance provider)
    pub public_rpc: Option<&'static str>,
    /// Recent-transfer window for the ownership check
    pub scan_window: ScanWindow,
}

// ============================================
// DEFAULT SCAN WINDOWS
// ============================================

/// EVM family: last 800 blocks
pub const EVM_SCAN_BLOCKS: u64 = 800;

/// Solana family: 2.5 hours wall-clock
pub const SOLANA_SCAN_AGE_SECS: u64 = 9_000;

// ============================================
// REGISTRY
// ============================================

/// Resolve a user-facing alias to its chain descriptor.
///
/// Aliases cover common names and hex chain ids ("eth", "mainnet", "0x1",
/// "bsc", "binance", "0x38", "polygon", "matic", "0x89", "solana", "sol").
pub fn resolve_chain(alias: &str) -> Option<ChainInfo> {
    let canonical = match alias.to_lowercase().as_str() {
        "eth" | "mainnet" | "ethereum" | "0x1" => "eth",
        "bsc" | "binance" | "0x38" => "bsc",
        "polygon" | "matic" | "0x89" => "polygon",
        "solana" | "sol" => "solana",
        _ => return None,
    };
    Some(chain_info(canonical))
}

fn chain_info(canonical: &'static str) -> ChainInfo {
    match canonical {
        "solana" => ChainInfo {
            canonical,
            family: ChainFamily::Solana,
            evm_chain_id: None,
            default_decimals: 9,
            public_rpc: Some("https://api.mainnet-beta.solana.com"),
            scan_window: ScanWindow::AgeSecs(SOLANA_SCAN_AGE_SECS),
        },
        "bsc" => ChainInfo {
            canonical,
            family: ChainFamily::Evm,
            evm_chain_id: Some(56),
            default_decimals: 18,
            public_rpc: Some("https://bsc-dataseed.binance.org"),
            scan_window: ScanWindow::Blocks(EVM_SCAN_BLOCKS),
        },
        "polygon" => ChainInfo {
            canonical,
            family: ChainFamily::Evm,
            evm_chain_id: Some(137),
            default_decimals: 18,
            public_rpc: Some("https://polygon-rpc.com"),
            scan_window: ScanWindow::Blocks(EVM_SCAN_BLOCKS),
        },
        _ => ChainInfo {
            canonical: "eth",
            family: ChainFamily::Evm,
            evm_chain_id: Some(1),
            default_decimals: 18,
            public_rpc: Some("https://cloudflare-eth.com"),
            scan_window: ScanWindow::Blocks(EVM_SCAN_BLOCKS),
        },
    }
}

/// Smallest representable fractional token amount for a decimals value.
/// Used as the equality tolerance for transfer-amount matching.
#[inline]
pub fn smallest_unit(decimals: u8) -> f64 {
    10f64.powi(-(decimals as i32))
}

/// Normalize a raw integer balance to token units
#[inline]
pub fn normalize_raw(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        assert_eq!(resolve_chain("eth").unwrap().canonical, "eth");
        assert_eq!(resolve_chain("mainnet").unwrap().canonical, "eth");
        assert_eq!(resolve_chain("0x1").unwrap().canonical, "eth");
        assert_eq!(resolve_chain("BSC").unwrap().canonical, "bsc");
        assert_eq!(resolve_chain("matic").unwrap().canonical, "polygon");
        assert_eq!(resolve_chain("solana").unwrap().canonical, "solana");
        assert!(resolve_chain("dogecoin").is_none());
    }

    #[test]
    fn test_family_defaults() {
        let eth = resolve_chain("eth").unwrap();
        assert_eq!(eth.family, ChainFamily::Evm);
        assert_eq!(eth.default_decimals, 18);
        assert_eq!(eth.scan_window, ScanWindow::Blocks(800));

        assert_eq!(eth.evm_chain_id, Some(1));

        let sol = resolve_chain("sol").unwrap();
        assert_eq!(sol.family, ChainFamily::Solana);
        assert_eq!(sol.evm_chain_id, None);
        assert_eq!(sol.default_decimals, 9);
        assert_eq!(sol.scan_window, ScanWindow::AgeSecs(9_000));
    }

    #[test]
    fn test_smallest_unit() {
        assert!((smallest_unit(2) - 0.01).abs() < 1e-12);
        assert!((smallest_unit(18) - 1e-18).abs() < 1e-30);
    }

    #[test]
    fn test_normalize_raw() {
        assert!((normalize_raw(1_500_000_000_000_000_000, 18) - 1.5).abs() < 1e-9);
        assert!((normalize_raw(1_000_000_000, 9) - 1.0).abs() < 1e-9);
    }
}

//! Address format validation per chain family.
//!
//! Pure format checks with no side effects: hex-40 for the EVM family,
//! base58 decoding to exactly 32 bytes for the Solana family.

use crate::utils::chains::ChainFamily;

/// Validate a wallet/token address string for a chain family
pub fn is_valid_address(family: ChainFamily, s: &str) -> bool {
    match family {
        ChainFamily::Evm => is_valid_evm_address(s),
        ChainFamily::Solana => is_valid_solana_address(s),
    }
}

/// `^0x[0-9a-fA-F]{40}$`
pub fn is_valid_evm_address(s: &str) -> bool {
    let Some(hex) = s.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Base58 string whose decode yields exactly 32 bytes
pub fn is_valid_solana_address(s: &str) -> bool {
    match bs58::decode(s).into_vec() {
        Ok(bytes) => bytes.len() == 32,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_evm_addresses() {
        assert!(is_valid_evm_address(
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
        ));
        assert!(is_valid_evm_address(
            "0x0000000000000000000000000000000000000000"
        ));
        assert!(is_valid_evm_address(
            "0xABCDEFabcdef0123456789ABCDEFabcdef012345"
        ));
    }

    #[test]
    fn test_invalid_evm_addresses() {
        // Missing prefix
        assert!(!is_valid_evm_address(
            "7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
        ));
        // Wrong length
        assert!(!is_valid_evm_address("0x7a250d"));
        assert!(!is_valid_evm_address(
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D00"
        ));
        // Non-hex char
        assert!(!is_valid_evm_address(
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488G"
        ));
        assert!(!is_valid_evm_address(""));
    }

    #[test]
    fn test_valid_solana_addresses() {
        // Well-known 32-byte program ids
        assert!(is_valid_solana_address(
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        ));
        assert!(is_valid_solana_address(
            "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4"
        ));
    }

    #[test]
    fn test_invalid_solana_addresses() {
        // Decode error (0, O, I, l are not in the base58 alphabet)
        assert!(!is_valid_solana_address("0OIl"));
        // Decodes but wrong length
        assert!(!is_valid_solana_address("abc"));
        // EVM address is not base58-32
        assert!(!is_valid_solana_address(
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
        ));
        assert!(!is_valid_solana_address(""));
    }

    #[test]
    fn test_family_dispatch() {
        assert!(is_valid_address(
            ChainFamily::Evm,
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
        ));
        assert!(!is_valid_address(
            ChainFamily::Solana,
            "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
        ));
        assert!(is_valid_address(
            ChainFamily::Solana,
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        ));
    }
}

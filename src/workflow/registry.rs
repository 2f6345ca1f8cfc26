//! Token registry
//!
//! Static symbol → (chain, contract) table loaded from configuration.

use std::collections::HashMap;

use crate::config::TokenConfig;
use crate::core_types::{Address, ChainId, is_native_asset};

use super::error::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub symbol: String,
    pub chain_id: ChainId,
    pub contract: Address,
}

impl TokenEntry {
    /// Native asset (sentinel contract) rather than an ERC-20 contract
    pub fn is_native(&self) -> bool {
        is_native_asset(&self.contract)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, TokenEntry>,
}

impl TokenRegistry {
    pub fn new(tokens: &[TokenConfig]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                (
                    t.symbol.to_uppercase(),
                    TokenEntry {
                        symbol: t.symbol.to_uppercase(),
                        chain_id: t.chain_id.clone(),
                        contract: t.contract.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    /// Look up a token by symbol, case-insensitive
    pub fn resolve(&self, symbol: &str) -> Result<&TokenEntry, WorkflowError> {
        self.tokens
            .get(&symbol.trim().to_uppercase())
            .ok_or_else(|| WorkflowError::UnknownToken(symbol.to_string()))
    }

    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.tokens.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }
}

/// Check a 0x-prefixed 20-byte hex address
pub fn validate_address(address: &str) -> Result<(), WorkflowError> {
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| WorkflowError::InvalidAddress(address.to_string()))?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WorkflowError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

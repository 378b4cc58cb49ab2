use anyhow::{anyhow, Result};
use ethers::types::U256;

/// Format a native-currency amount (18 decimals) as a decimal string.
pub fn format_native(wei: U256) -> String {
    ethers::utils::format_units(wei, "ether").unwrap_or_else(|_| "0.0".to_string())
}

/// Format a token amount scaled by the token's declared decimals.
pub fn format_token(amount: U256, decimals: u32) -> String {
    ethers::utils::format_units(amount, decimals).unwrap_or_else(|_| "0.0".to_string())
}

/// Parse a user-entered token amount into smallest units.
///
/// Parses the decimal string directly instead of going through f64, so
/// amounts with full 18-digit precision survive intact.
pub fn parse_token_str(input: &str, decimals: u32) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("token amount cannot be empty"));
    }
    ethers::utils::parse_units(trimmed, decimals)
        .map(|pu| pu.into())
        .map_err(|e| anyhow!("invalid token amount '{}': {}", trimmed, e))
}

//! Read-only balance and allowance lookups.
//!
//! The formatted readers return "0" on failure instead of erroring: balances
//! shown at connect time are advisory, and a flaky RPC must not block the
//! session. The raw readers used on the write path stay strict; the
//! distribution pipeline re-checks authoritatively before moving funds.

use crate::contracts;
use crate::error::{classify, internal, ClassifiedError};
use crate::provider::WalletProvider;
use crate::utils;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde_json::json;
use tracing::warn;

/// Issue a read-only contract call and return the raw hex output.
pub(crate) async fn eth_call(
    provider: &dyn WalletProvider,
    to: Address,
    calldata: Vec<u8>,
) -> Result<String, ClassifiedError> {
    let params = json!([
        { "to": format!("{:?}", to), "data": contracts::to_hex_data(&calldata) },
        "latest",
    ]);
    let output = provider
        .request("eth_call", params)
        .await
        .map_err(|raw| classify(&raw))?;
    output
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ClassifiedError::Unclassified("eth_call returned non-string output".to_string()))
}

pub async fn native_balance_raw(
    provider: &dyn WalletProvider,
    address: Address,
) -> Result<U256, ClassifiedError> {
    let params = json!([format!("{:?}", address), "latest"]);
    let output = provider
        .request("eth_getBalance", params)
        .await
        .map_err(|raw| classify(&raw))?;
    let quantity = output
        .as_str()
        .ok_or_else(|| ClassifiedError::Unclassified("eth_getBalance returned non-string output".to_string()))?;
    contracts::parse_quantity(quantity).map_err(internal)
}

pub async fn token_balance_raw(
    provider: &dyn WalletProvider,
    token: Address,
    address: Address,
) -> Result<U256, ClassifiedError> {
    let calldata = contracts::encode_call(
        &contracts::erc20_balance_of(),
        &[Token::Address(address)],
    )
    .map_err(internal)?;
    let output = eth_call(provider, token, calldata).await?;
    contracts::decode_uint(&output).map_err(internal)
}

pub async fn token_decimals(
    provider: &dyn WalletProvider,
    token: Address,
) -> Result<u32, ClassifiedError> {
    let calldata = contracts::encode_call(&contracts::erc20_decimals(), &[]).map_err(internal)?;
    let output = eth_call(provider, token, calldata).await?;
    let value = contracts::decode_uint(&output).map_err(internal)?;
    Ok(value.low_u32())
}

/// Native balance as a decimal string; "0" on any read failure.
pub async fn native_balance(provider: &dyn WalletProvider, address: Address) -> String {
    match native_balance_raw(provider, address).await {
        Ok(wei) => utils::format_native(wei),
        Err(err) => {
            warn!(%err, ?address, "native balance read failed; reporting zero");
            "0".to_string()
        }
    }
}

/// Token balance scaled by the token's decimals; "0" on any read failure.
pub async fn token_balance(provider: &dyn WalletProvider, token: Address, address: Address) -> String {
    let decimals = match token_decimals(provider, token).await {
        Ok(d) => d,
        Err(err) => {
            warn!(%err, ?token, "decimals read failed; reporting zero balance");
            return "0".to_string();
        }
    };
    match token_balance_raw(provider, token, address).await {
        Ok(amount) => utils::format_token(amount, decimals),
        Err(err) => {
            warn!(%err, ?address, "token balance read failed; reporting zero");
            "0".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::testing::{selector_of, uint_word, MockProvider};

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn test_native_balance_formats_wei() {
        let provider = MockProvider::new(|method, _| match method {
            "eth_getBalance" => Ok(serde_json::json!("0xde0b6b3a7640000")),
            other => Err(ProviderError::new(None, format!("unexpected {}", other))),
        });
        let formatted = native_balance(&provider, addr(1)).await;
        assert_eq!(formatted, "1.000000000000000000");
    }

    #[tokio::test]
    async fn test_native_balance_zero_on_read_failure() {
        let provider =
            MockProvider::new(|_, _| Err(ProviderError::new(None, "rpc unreachable")));
        assert_eq!(native_balance(&provider, addr(1)).await, "0");
    }

    #[tokio::test]
    async fn test_token_balance_scales_by_decimals() {
        let provider = MockProvider::new(|method, params| match method {
            "eth_call" => {
                let sel = selector_of(params).unwrap();
                if sel == contracts::selector(&contracts::erc20_decimals()) {
                    Ok(uint_word(U256::from(6u64)))
                } else if sel == contracts::selector(&contracts::erc20_balance_of()) {
                    Ok(uint_word(U256::from(1_500_000u64)))
                } else {
                    Err(ProviderError::new(None, "unexpected selector"))
                }
            }
            other => Err(ProviderError::new(None, format!("unexpected {}", other))),
        });
        let formatted = token_balance(&provider, addr(2), addr(1)).await;
        assert_eq!(formatted, "1.500000");
    }

    #[tokio::test]
    async fn test_token_balance_zero_on_read_failure() {
        let provider =
            MockProvider::new(|_, _| Err(ProviderError::new(None, "execution reverted")));
        assert_eq!(token_balance(&provider, addr(2), addr(1)).await, "0");
    }

    #[tokio::test]
    async fn test_token_balance_raw_is_strict() {
        let provider =
            MockProvider::new(|_, _| Err(ProviderError::new(None, "execution reverted")));
        let err = token_balance_raw(&provider, addr(2), addr(1)).await.unwrap_err();
        assert!(matches!(err, ClassifiedError::Unclassified(_)));
    }
}

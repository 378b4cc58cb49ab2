//! Chain switching for the connected wallet provider.

use crate::config::NetworkConfig;
use crate::error::{classify, ClassifiedError};
use crate::provider::WalletProvider;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Delay before interactive provider requests. Wallets that serialize their
/// prompts can report "busy" if the next request lands while the previous
/// prompt is still being torn down.
pub(crate) const SETTLE_DELAY_MS: u64 = 300;

pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;
}

/// Make sure the provider is on `network`.
///
/// A fresh wallet install usually does not know about test or alternate
/// chains, so a "chain unknown" response falls back to adding the full chain
/// definition instead of failing. Any other error is classified and
/// propagated without retry.
pub async fn ensure_network(
    provider: &dyn WalletProvider,
    network: &NetworkConfig,
) -> Result<(), ClassifiedError> {
    settle().await;
    let params = json!([{ "chainId": network.chain_id_hex() }]);
    match provider.request("wallet_switchEthereumChain", params).await {
        Ok(_) => {
            info!(chain_id = network.chain_id, "wallet is on the configured chain");
            Ok(())
        }
        Err(raw) => match classify(&raw) {
            ClassifiedError::ChainUnknown => {
                warn!(
                    chain_id = network.chain_id,
                    "wallet does not know the chain; requesting addition"
                );
                add_network(provider, network).await
            }
            ClassifiedError::UserRejected => Err(ClassifiedError::ChainSwitchRejected),
            other => Err(other),
        },
    }
}

async fn add_network(
    provider: &dyn WalletProvider,
    network: &NetworkConfig,
) -> Result<(), ClassifiedError> {
    settle().await;
    let params = json!([{
        "chainId": network.chain_id_hex(),
        "chainName": network.chain_name,
        "rpcUrls": network.rpc_endpoints,
        "blockExplorerUrls": [network.block_explorer_url],
        "nativeCurrency": {
            "name": network.native_currency_symbol,
            "symbol": network.native_currency_symbol,
            "decimals": 18,
        },
    }]);
    match provider.request("wallet_addEthereumChain", params).await {
        Ok(_) => {
            info!(chain_id = network.chain_id, "chain added to wallet");
            Ok(())
        }
        Err(raw) => match classify(&raw) {
            ClassifiedError::UserRejected => Err(ClassifiedError::ChainSwitchRejected),
            other => Err(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TEST_NETWORK;
    use crate::error::{ProviderError, CODE_CHAIN_UNKNOWN, CODE_REQUEST_PENDING, CODE_USER_REJECTED};
    use crate::provider::testing::MockProvider;
    use serde_json::Value;

    #[tokio::test]
    async fn test_switch_succeeds_without_add() {
        let provider = MockProvider::new(|method, _| match method {
            "wallet_switchEthereumChain" => Ok(Value::Null),
            other => Err(ProviderError::new(None, format!("unexpected {}", other))),
        });

        ensure_network(&provider, &TEST_NETWORK).await.unwrap();
        assert_eq!(provider.count("wallet_switchEthereumChain"), 1);
        assert_eq!(provider.count("wallet_addEthereumChain"), 0);
    }

    #[tokio::test]
    async fn test_unknown_chain_falls_back_to_add_with_full_descriptor() {
        let provider = MockProvider::new(|method, _| match method {
            "wallet_switchEthereumChain" => {
                Err(ProviderError::new(CODE_CHAIN_UNKNOWN, "Unrecognized chain ID"))
            }
            "wallet_addEthereumChain" => Ok(Value::Null),
            other => Err(ProviderError::new(None, format!("unexpected {}", other))),
        });

        ensure_network(&provider, &TEST_NETWORK).await.unwrap();

        let calls = provider.calls();
        let (_, add_params) = calls
            .iter()
            .find(|(m, _)| m == "wallet_addEthereumChain")
            .expect("add-chain request issued");
        let descriptor = &add_params[0];
        assert_eq!(descriptor["chainId"], "0x61");
        assert_eq!(descriptor["chainName"], TEST_NETWORK.chain_name);
        assert_eq!(
            descriptor["rpcUrls"].as_array().unwrap().len(),
            TEST_NETWORK.rpc_endpoints.len()
        );
        assert_eq!(
            descriptor["blockExplorerUrls"][0],
            TEST_NETWORK.block_explorer_url
        );
        assert_eq!(descriptor["nativeCurrency"]["symbol"], "tBNB");
        assert_eq!(descriptor["nativeCurrency"]["decimals"], 18);
    }

    #[tokio::test]
    async fn test_switch_rejection_maps_to_chain_switch_rejected() {
        let provider = MockProvider::new(|_, _| {
            Err(ProviderError::new(CODE_USER_REJECTED, "User rejected the request."))
        });

        let err = ensure_network(&provider, &TEST_NETWORK).await.unwrap_err();
        assert_eq!(err, ClassifiedError::ChainSwitchRejected);
        assert_eq!(provider.count("wallet_addEthereumChain"), 0);
    }

    #[tokio::test]
    async fn test_add_rejection_maps_to_chain_switch_rejected() {
        let provider = MockProvider::new(|method, _| match method {
            "wallet_switchEthereumChain" => {
                Err(ProviderError::new(CODE_CHAIN_UNKNOWN, "Unrecognized chain ID"))
            }
            _ => Err(ProviderError::new(CODE_USER_REJECTED, "User rejected the request.")),
        });

        let err = ensure_network(&provider, &TEST_NETWORK).await.unwrap_err();
        assert_eq!(err, ClassifiedError::ChainSwitchRejected);
    }

    #[tokio::test]
    async fn test_busy_propagates_without_retry() {
        let provider = MockProvider::new(|_, _| {
            Err(ProviderError::new(CODE_REQUEST_PENDING, "request already pending"))
        });

        let err = ensure_network(&provider, &TEST_NETWORK).await.unwrap_err();
        assert_eq!(err, ClassifiedError::ProviderBusy);
        assert_eq!(provider.count("wallet_switchEthereumChain"), 1);
    }
}

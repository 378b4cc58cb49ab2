//! Network descriptors and distribution settings.
//!
//! Exactly two networks exist, selected by the payment mode. Settings name
//! the contract and wallet addresses the pipeline uses; a missing or
//! malformed address is rejected outright rather than defaulted, since a
//! silently wrong address would move funds to the wrong place.

use ethers::types::{Address, TxHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use url::Url;

/// Which network the platform pays out on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Live,
    Test,
}

impl PaymentMode {
    /// Parse a mode flag from configuration. Anything other than the two
    /// known values is an error, never a silent default.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(PaymentMode::Live),
            "test" => Ok(PaymentMode::Test),
            other => Err(ConfigError::UnknownPaymentMode(other.to_string())),
        }
    }
}

/// An immutable EVM network descriptor: chain ID, RPC endpoints in preference
/// order, and block explorer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub chain_name: &'static str,
    pub native_currency_symbol: &'static str,
    pub rpc_endpoints: &'static [&'static str],
    pub block_explorer_url: &'static str,
}

pub const LIVE_NETWORK: NetworkConfig = NetworkConfig {
    chain_id: 56,
    chain_name: "BNB Smart Chain",
    native_currency_symbol: "BNB",
    rpc_endpoints: &[
        "https://bsc-dataseed.binance.org",
        "https://bsc-dataseed1.defibit.io",
    ],
    block_explorer_url: "https://bscscan.com",
};

pub const TEST_NETWORK: NetworkConfig = NetworkConfig {
    chain_id: 97,
    chain_name: "BNB Smart Chain Testnet",
    native_currency_symbol: "tBNB",
    rpc_endpoints: &[
        "https://data-seed-prebsc-1-s1.binance.org:8545",
        "https://data-seed-prebsc-2-s1.binance.org:8545",
    ],
    block_explorer_url: "https://testnet.bscscan.com",
};

/// Resolve the network for a payment mode. Pure; the enum makes any input
/// outside the two valid modes unrepresentable.
pub fn resolve(mode: PaymentMode) -> &'static NetworkConfig {
    match mode {
        PaymentMode::Live => &LIVE_NETWORK,
        PaymentMode::Test => &TEST_NETWORK,
    }
}

impl NetworkConfig {
    /// Chain ID as the hex quantity wallet RPC methods expect.
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// First RPC endpoint, validated as a URL.
    pub fn primary_rpc(&self) -> Result<Url, ConfigError> {
        let raw = self
            .rpc_endpoints
            .first()
            .ok_or_else(|| ConfigError::InvalidRpcEndpoint("no endpoints configured".to_string()))?;
        Url::parse(raw).map_err(|e| ConfigError::InvalidRpcEndpoint(format!("{}: {}", raw, e)))
    }

    /// Full URL to view a transaction on the block explorer.
    pub fn tx_explorer_url(&self, hash: TxHash) -> String {
        format!("{}/tx/{:?}", self.block_explorer_url, hash)
    }

    /// Full URL to view an address on the block explorer.
    pub fn address_explorer_url(&self, address: Address) -> String {
        format!("{}/address/{:?}", self.block_explorer_url, address)
    }
}

/// Configuration failures, kept distinct from wallet errors so callers can
/// tell a deployment problem from a user/provider problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("distribution settings are missing; refusing to continue without configured addresses")]
    MissingSettings,
    #[error("unknown payment mode '{0}' (expected 'live' or 'test')")]
    UnknownPaymentMode(String),
    #[error("missing required address for {0}")]
    MissingAddress(&'static str),
    #[error("invalid address for {field}: '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("invalid RPC endpoint: {0}")]
    InvalidRpcEndpoint(String),
}

/// The addresses and mode the pipeline runs against. Supplied once per
/// session by the hosting application and treated as read-only here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSettings {
    pub payment_mode: PaymentMode,
    /// The fungible token being distributed.
    pub token_contract: Address,
    /// The contract executing the distribution.
    pub distribution_contract: Address,
    /// The platform wallet receiving the payment.
    pub beneficiary_wallet: Address,
}

impl DistributionSettings {
    /// Build settings from raw configuration values, failing closed: a
    /// missing or unparseable address is an error, never a placeholder.
    pub fn from_raw(
        payment_mode: &str,
        token_contract: Option<&str>,
        distribution_contract: Option<&str>,
        beneficiary_wallet: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let payment_mode = PaymentMode::parse(payment_mode)?;
        Ok(Self {
            payment_mode,
            token_contract: require_address("token_contract", token_contract)?,
            distribution_contract: require_address("distribution_contract", distribution_contract)?,
            beneficiary_wallet: require_address("beneficiary_wallet", beneficiary_wallet)?,
        })
    }

    pub fn network(&self) -> &'static NetworkConfig {
        resolve(self.payment_mode)
    }
}

fn require_address(field: &'static str, raw: Option<&str>) -> Result<Address, ConfigError> {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s.trim(),
        _ => {
            error!(field, "required address missing from distribution settings");
            return Err(ConfigError::MissingAddress(field));
        }
    };
    raw.parse::<Address>().map_err(|_| {
        error!(field, value = raw, "address in distribution settings does not parse");
        ConfigError::InvalidAddress {
            field,
            value: raw.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0x55d398326f99059fF775485246999027B3197955";
    const DISTRIBUTOR: &str = "0xe7deB73d0661aA3732c971Ab3d583CFCa786e0d7";
    const BENEFICIARY: &str = "0xc2D167fd7CD0dC3E0Bd61C5206295C0560e66e31";

    // ==================== resolve tests ====================

    #[test]
    fn test_resolve_live() {
        let network = resolve(PaymentMode::Live);
        assert_eq!(network.chain_id, 56);
        assert_eq!(network.native_currency_symbol, "BNB");
        assert!(!network.rpc_endpoints.is_empty());
    }

    #[test]
    fn test_resolve_test() {
        let network = resolve(PaymentMode::Test);
        assert_eq!(network.chain_id, 97);
        assert_eq!(network.block_explorer_url, "https://testnet.bscscan.com");
    }

    #[test]
    fn test_resolve_is_pure() {
        assert_eq!(resolve(PaymentMode::Live), resolve(PaymentMode::Live));
        assert_eq!(resolve(PaymentMode::Test), resolve(PaymentMode::Test));
        assert_ne!(resolve(PaymentMode::Live), resolve(PaymentMode::Test));
    }

    // ==================== PaymentMode tests ====================

    #[test]
    fn test_payment_mode_parse() {
        assert_eq!(PaymentMode::parse("live").unwrap(), PaymentMode::Live);
        assert_eq!(PaymentMode::parse(" Test ").unwrap(), PaymentMode::Test);
    }

    #[test]
    fn test_payment_mode_parse_rejects_unknown() {
        let err = PaymentMode::parse("staging").unwrap_err();
        assert_eq!(err, ConfigError::UnknownPaymentMode("staging".to_string()));
    }

    // ==================== NetworkConfig tests ====================

    #[test]
    fn test_chain_id_hex() {
        assert_eq!(LIVE_NETWORK.chain_id_hex(), "0x38");
        assert_eq!(TEST_NETWORK.chain_id_hex(), "0x61");
    }

    #[test]
    fn test_primary_rpc_parses() {
        assert!(LIVE_NETWORK.primary_rpc().is_ok());
        assert!(TEST_NETWORK.primary_rpc().is_ok());
    }

    #[test]
    fn test_tx_explorer_url() {
        let hash: TxHash = "0x1111111111111111111111111111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let url = LIVE_NETWORK.tx_explorer_url(hash);
        assert!(url.starts_with("https://bscscan.com/tx/0x1111"));
    }

    // ==================== DistributionSettings tests ====================

    #[test]
    fn test_settings_from_raw() {
        let settings = DistributionSettings::from_raw(
            "test",
            Some(TOKEN),
            Some(DISTRIBUTOR),
            Some(BENEFICIARY),
        )
        .unwrap();
        assert_eq!(settings.payment_mode, PaymentMode::Test);
        assert_eq!(settings.network().chain_id, 97);
    }

    #[test]
    fn test_settings_missing_address_fails_closed() {
        let err = DistributionSettings::from_raw("live", Some(TOKEN), None, Some(BENEFICIARY))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingAddress("distribution_contract"));

        let err =
            DistributionSettings::from_raw("live", Some("  "), Some(DISTRIBUTOR), Some(BENEFICIARY))
                .unwrap_err();
        assert_eq!(err, ConfigError::MissingAddress("token_contract"));
    }

    #[test]
    fn test_settings_invalid_address_fails_closed() {
        let err = DistributionSettings::from_raw(
            "live",
            Some(TOKEN),
            Some(DISTRIBUTOR),
            Some("not-an-address"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress {
                field: "beneficiary_wallet",
                ..
            }
        ));
    }

    #[test]
    fn test_settings_deserialize() {
        let json = format!(
            r#"{{"payment_mode":"live","token_contract":"{}","distribution_contract":"{}","beneficiary_wallet":"{}"}}"#,
            TOKEN, DISTRIBUTOR, BENEFICIARY
        );
        let settings: DistributionSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings.payment_mode, PaymentMode::Live);
        assert_eq!(settings.token_contract, TOKEN.parse().unwrap());
    }
}

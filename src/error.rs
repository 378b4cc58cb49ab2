//! Error taxonomy for the distribution core.
//! Raw provider errors are mapped into a closed set of classified errors in
//! one place so no call site has to sniff error codes itself.

use ethers::types::U256;
use std::fmt;
use thiserror::Error;

/// EIP-1193 code for a request the user rejected in the wallet.
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193 code for a chain the wallet does not recognize.
pub const CODE_CHAIN_UNKNOWN: i64 = 4902;
/// JSON-RPC code wallets return while a previous prompt is still open.
pub const CODE_REQUEST_PENDING: i64 = -32002;

/// Raw error surfaced by a wallet provider's `request` call.
///
/// EIP-1193 providers attach a numeric code; contract reverts and transport
/// failures usually carry only a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<Option<i64>>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "provider error (code {}): {}", code, self.message),
            None => write!(f, "provider error: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Closed taxonomy of failures the core reports to its caller.
/// Every variant carries its own actionable message; nothing surfaces as a
/// bare "transaction failed".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifiedError {
    #[error("the wallet is busy with a previous request; finish or dismiss it and try again")]
    ProviderBusy,
    #[error("the request was rejected in the wallet")]
    UserRejected,
    #[error("the wallet does not recognize the configured chain")]
    ChainUnknown,
    #[error("the network switch was rejected in the wallet")]
    ChainSwitchRejected,
    #[error("insufficient token balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },
    #[error("could not read the current token allowance")]
    AllowanceCheckFailed,
    #[error("the distribution contract rejected the payment during validation")]
    ValidationFailed,
    #[error("the distribution transaction reverted on-chain")]
    DistributionReverted,
    #[error("unexpected wallet error: {0}")]
    Unclassified(String),
}

/// Map a raw provider error into the closed taxonomy. Total: anything
/// unrecognized becomes `Unclassified` with the original message preserved.
pub fn classify(raw: &ProviderError) -> ClassifiedError {
    match raw.code {
        Some(CODE_USER_REJECTED) => return ClassifiedError::UserRejected,
        Some(CODE_CHAIN_UNKNOWN) => return ClassifiedError::ChainUnknown,
        Some(CODE_REQUEST_PENDING) => return ClassifiedError::ProviderBusy,
        _ => {}
    }

    let message = raw.message.to_lowercase();
    if message.contains("user rejected") || message.contains("user denied") {
        ClassifiedError::UserRejected
    } else if message.contains("already pending") || message.contains("request is pending") {
        ClassifiedError::ProviderBusy
    } else if message.contains("unrecognized chain") || message.contains("unknown chain") {
        ClassifiedError::ChainUnknown
    } else {
        ClassifiedError::Unclassified(raw.message.clone())
    }
}

/// Wrap an internal (non-provider) failure without losing its message.
pub(crate) fn internal(err: anyhow::Error) -> ClassifiedError {
    ClassifiedError::Unclassified(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_user_rejected_code() {
        let raw = ProviderError::new(CODE_USER_REJECTED, "User rejected the request.");
        assert_eq!(classify(&raw), ClassifiedError::UserRejected);
    }

    #[test]
    fn test_classify_chain_unknown_code() {
        let raw = ProviderError::new(CODE_CHAIN_UNKNOWN, "Unrecognized chain ID");
        assert_eq!(classify(&raw), ClassifiedError::ChainUnknown);
    }

    #[test]
    fn test_classify_request_pending_code() {
        let raw = ProviderError::new(CODE_REQUEST_PENDING, "Request of type 'wallet_requestPermissions' already pending");
        assert_eq!(classify(&raw), ClassifiedError::ProviderBusy);
    }

    #[test]
    fn test_classify_user_rejected_message_without_code() {
        let raw = ProviderError::new(None, "MetaMask Tx Signature: User denied transaction signature.");
        assert_eq!(classify(&raw), ClassifiedError::UserRejected);
    }

    #[test]
    fn test_classify_pending_message_without_code() {
        let raw = ProviderError::new(None, "a request is already pending for this origin");
        assert_eq!(classify(&raw), ClassifiedError::ProviderBusy);
    }

    #[test]
    fn test_classify_unknown_chain_message() {
        let raw = ProviderError::new(None, "Unrecognized chain ID \"0x61\". Try adding the chain first.");
        assert_eq!(classify(&raw), ClassifiedError::ChainUnknown);
    }

    #[test]
    fn test_classify_is_total_on_unrecognized_shapes() {
        let raw = ProviderError::new(None, "socket hang up");
        match classify(&raw) {
            ClassifiedError::Unclassified(msg) => assert_eq!(msg, "socket hang up"),
            other => panic!("expected Unclassified, got {:?}", other),
        }

        let raw = ProviderError::new(-32603, "");
        assert!(matches!(classify(&raw), ClassifiedError::Unclassified(_)));
    }

    #[test]
    fn test_insufficient_balance_message_carries_amounts() {
        let err = ClassifiedError::InsufficientBalance {
            required: U256::from(50u64),
            available: U256::from(10u64),
        };
        let text = err.to_string();
        assert!(text.contains("required 50"));
        assert!(text.contains("available 10"));
    }

    #[test]
    fn test_provider_error_display() {
        let with_code = ProviderError::new(4001, "rejected");
        assert_eq!(with_code.to_string(), "provider error (code 4001): rejected");
        let without_code = ProviderError::new(None, "timeout");
        assert_eq!(without_code.to_string(), "provider error: timeout");
    }
}

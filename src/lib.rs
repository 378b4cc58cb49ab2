//! Payment distribution core.
//!
//! Connects a user-supplied wallet, pins it to the configured network,
//! inspects balances and allowances, and runs the approve-then-distribute
//! token transfer against the distribution contract, narrating progress and
//! classifying every failure.
//!
//! The hosting application supplies a [`DistributionSettings`] (payment mode
//! plus contract addresses) and a wallet capability from
//! [`detect_providers`]; the core hands back session snapshots, a stream of
//! [`TransactionState`] updates, and on success a transaction hash.

pub mod balance;
pub mod config;
pub mod contracts;
pub mod distribute;
pub mod error;
pub mod network;
pub mod provider;
pub mod session;
pub mod utils;

pub use config::{resolve, ConfigError, DistributionSettings, NetworkConfig, PaymentMode};
pub use distribute::{
    DistributionPlan, DistributionReceipt, Narration, TransactionState, DISTRIBUTION_GAS_LIMIT,
};
pub use error::{classify, ClassifiedError, ProviderError};
pub use network::ensure_network;
pub use provider::{detect_providers, ProviderHost, WalletInfo, WalletProvider};
pub use session::{DistributionService, ServiceError, WalletSession};

//! Wallet provider capability and registry.
//!
//! The core never touches a concrete wallet type. Everything it needs is the
//! single EIP-1193-shaped `request` operation plus the identity flags used
//! for labeling; concrete providers are adapted to this trait at the boundary.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Narrow capability the core requires from a wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Issue a JSON-RPC style request (`eth_accounts`, `eth_call`,
    /// `wallet_switchEthereumChain`, ...). Interactive methods may prompt
    /// the user; the provider decides.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// Identity flags injected providers advertise. Only used for labeling;
/// nothing else in the core depends on which wallet is behind the capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderFlags {
    pub is_metamask: bool,
    pub is_coinbase_wallet: bool,
    pub is_brave_wallet: bool,
    pub is_trust: bool,
}

impl ProviderFlags {
    fn label(&self) -> (&'static str, &'static str) {
        if self.is_metamask {
            ("MetaMask", "metamask")
        } else if self.is_coinbase_wallet {
            ("Coinbase Wallet", "coinbase")
        } else if self.is_brave_wallet {
            ("Brave Wallet", "brave")
        } else if self.is_trust {
            ("Trust Wallet", "trust")
        } else {
            ("Web3 Wallet", "generic")
        }
    }
}

/// One injected provider as the host environment discovered it.
pub struct InjectedProvider {
    pub flags: ProviderFlags,
    pub capability: Arc<dyn WalletProvider>,
}

/// Host environment that may expose injected wallet capabilities.
pub trait ProviderHost {
    /// Distinct injected providers, in discovery order.
    fn injected(&self) -> Vec<InjectedProvider>;
    /// A generic capability to fall back on when nothing identifies itself.
    fn fallback(&self) -> Option<Arc<dyn WalletProvider>>;
}

/// A wallet the user can pick from.
#[derive(Clone)]
pub struct WalletInfo {
    pub name: String,
    pub icon_hint: &'static str,
    pub capability: Arc<dyn WalletProvider>,
}

/// Enumerate available wallets. Side-effect free and safe to call
/// repeatedly; the UI polls this to pick up a late wallet installation.
pub fn detect_providers(host: &dyn ProviderHost) -> Vec<WalletInfo> {
    let injected = host.injected();
    if injected.is_empty() {
        return match host.fallback() {
            Some(capability) => vec![WalletInfo {
                name: "Web3 Wallet".to_string(),
                icon_hint: "generic",
                capability,
            }],
            None => Vec::new(),
        };
    }

    injected
        .into_iter()
        .map(|provider| {
            let (name, icon_hint) = provider.flags.label();
            WalletInfo {
                name: name.to_string(),
                icon_hint,
                capability: provider.capability,
            }
        })
        .collect()
}

//! Wallet session lifecycle and the service that owns it.
//!
//! One `DistributionService` instance owns at most one live session and the
//! settings it was created with. Callers construct the service and share it;
//! there is no module-level singleton. Only this service mutates the session;
//! everything else reads snapshots.

use crate::balance;
use crate::config::{ConfigError, DistributionSettings};
use crate::distribute::{
    DistributionExecutor, DistributionPlan, DistributionReceipt, TransactionState,
};
use crate::error::{classify, ClassifiedError};
use crate::network;
use crate::provider::WalletProvider;
use ethers::types::Address;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Errors surfaced by `DistributionService` operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no active wallet session; connect a wallet first")]
    NotConnected,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Wallet(#[from] ClassifiedError),
}

/// The single live wallet session.
#[derive(Clone)]
pub struct WalletSession {
    pub provider: Arc<dyn WalletProvider>,
    pub address: Address,
    pub chain_id: u64,
    pub native_balance: String,
    pub token_balance: String,
    pub wallet_label: String,
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("native_balance", &self.native_balance)
            .field("token_balance", &self.token_balance)
            .field("wallet_label", &self.wallet_label)
            .finish()
    }
}

/// Owns the wallet session and drives connect / disconnect / distribute.
pub struct DistributionService {
    session: Mutex<Option<WalletSession>>,
    settings: Mutex<Option<DistributionSettings>>,
    connecting: AtomicBool,
}

impl Default for DistributionService {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionService {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            settings: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Snapshot of the live session, if any.
    pub async fn session(&self) -> Option<WalletSession> {
        self.session.lock().await.clone()
    }

    /// Connect a wallet and establish the session.
    ///
    /// At most one attempt may be in flight; a concurrent call fails fast
    /// with `ProviderBusy` instead of queueing behind the first. When
    /// accounts are already authorized the interactive prompt is skipped, so
    /// connecting twice never prompts the user twice.
    pub async fn connect(
        &self,
        provider: Arc<dyn WalletProvider>,
        wallet_label: &str,
        settings: Option<DistributionSettings>,
    ) -> Result<WalletSession, ServiceError> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClassifiedError::ProviderBusy.into());
        }
        let result = self.connect_inner(provider, wallet_label, settings).await;
        self.connecting.store(false, Ordering::SeqCst);
        result
    }

    async fn connect_inner(
        &self,
        provider: Arc<dyn WalletProvider>,
        wallet_label: &str,
        settings: Option<DistributionSettings>,
    ) -> Result<WalletSession, ServiceError> {
        // A payment core without configured addresses must not touch the
        // wallet at all.
        let settings = settings.ok_or(ConfigError::MissingSettings)?;
        let network = settings.network();

        // eth_accounts is non-interactive; an existing authorization is
        // reused instead of prompting again.
        let mut accounts = request_account_list(provider.as_ref(), "eth_accounts").await?;
        if accounts.is_empty() {
            info!("no authorized accounts; requesting authorization");
            network::settle().await;
            accounts = request_account_list(provider.as_ref(), "eth_requestAccounts").await?;
        }
        let address = accounts.first().copied().ok_or(ClassifiedError::UserRejected)?;

        network::ensure_network(provider.as_ref(), network).await?;

        let chain_id = read_chain_id(provider.as_ref()).await?;
        if chain_id != network.chain_id {
            warn!(
                reported = chain_id,
                configured = network.chain_id,
                "wallet reports a different chain than configured"
            );
        }

        let native_balance = balance::native_balance(provider.as_ref(), address).await;
        let token_balance =
            balance::token_balance(provider.as_ref(), settings.token_contract, address).await;

        let session = WalletSession {
            provider,
            address,
            chain_id,
            native_balance,
            token_balance,
            wallet_label: wallet_label.to_string(),
        };
        *self.session.lock().await = Some(session.clone());
        *self.settings.lock().await = Some(settings);
        info!(address = ?session.address, chain_id, wallet = wallet_label, "wallet connected");
        Ok(session)
    }

    /// Clear the session. A pure local state clear: wallets expose no
    /// disconnect call. Cached settings go too, so a stale session cannot
    /// outlive a logout.
    pub async fn disconnect(&self) {
        *self.session.lock().await = None;
        *self.settings.lock().await = None;
        info!("wallet session cleared");
    }

    /// Provider-level account change. An empty list or a different active
    /// account invalidates the session.
    pub async fn handle_accounts_changed(&self, accounts: &[Address]) {
        let mut guard = self.session.lock().await;
        let invalidated = match (guard.as_ref(), accounts.first()) {
            (Some(session), Some(active)) => *active != session.address,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if invalidated {
            warn!("active wallet account changed; clearing session");
            *guard = None;
            drop(guard);
            *self.settings.lock().await = None;
        }
    }

    /// Re-read balances for the active session on demand.
    pub async fn refresh_balances(&self) -> Result<WalletSession, ServiceError> {
        let settings = self
            .settings
            .lock()
            .await
            .ok_or(ConfigError::MissingSettings)?;
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ServiceError::NotConnected)?;
        session.native_balance =
            balance::native_balance(session.provider.as_ref(), session.address).await;
        session.token_balance = balance::token_balance(
            session.provider.as_ref(),
            settings.token_contract,
            session.address,
        )
        .await;
        Ok(session.clone())
    }

    /// Run the distribution pipeline for `plan` using the live session.
    pub async fn distribute(
        &self,
        plan: &DistributionPlan,
        progress: Option<&UnboundedSender<TransactionState>>,
    ) -> Result<DistributionReceipt, ServiceError> {
        let session = self
            .session
            .lock()
            .await
            .clone()
            .ok_or(ServiceError::NotConnected)?;
        let settings = self
            .settings
            .lock()
            .await
            .ok_or(ConfigError::MissingSettings)?;
        let executor =
            DistributionExecutor::new(session.provider.as_ref(), session.address, &settings, progress);
        Ok(executor.execute(plan).await?)
    }
}

async fn request_account_list(
    provider: &dyn WalletProvider,
    method: &str,
) -> Result<Vec<Address>, ClassifiedError> {
    let output = provider
        .request(method, json!([]))
        .await
        .map_err(|raw| classify(&raw))?;
    let entries = output.as_array().cloned().unwrap_or_default();
    let mut accounts = Vec::with_capacity(entries.len());
    for entry in entries {
        // A malformed entry is a provider fault, not a user rejection.
        let raw = entry.as_str().ok_or_else(|| {
            ClassifiedError::Unclassified(format!(
                "{} returned a non-string account entry",
                method
            ))
        })?;
        let parsed = raw.parse::<Address>().map_err(|_| {
            ClassifiedError::Unclassified(format!(
                "{} returned a malformed address '{}'",
                method, raw
            ))
        })?;
        accounts.push(parsed);
    }
    Ok(accounts)
}

async fn read_chain_id(provider: &dyn WalletProvider) -> Result<u64, ClassifiedError> {
    let output = provider
        .request("eth_chainId", json!([]))
        .await
        .map_err(|raw| classify(&raw))?;
    let raw = output
        .as_str()
        .ok_or_else(|| ClassifiedError::Unclassified("eth_chainId returned non-string output".to_string()))?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| ClassifiedError::Unclassified(format!("invalid chain id '{}': {}", raw, e)))
}

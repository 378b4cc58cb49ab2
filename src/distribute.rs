//! The approve-then-distribute payment pipeline.
//!
//! A distribution attempt is a narrated, fail-fast sequence: authoritative
//! balance check, allowance reconciliation, approval when needed, optional
//! contract-side dry run, and finally the distribution call itself. Every
//! step appends to an append-only narration so the UI can render live
//! progress, and every failure surfaces as a classified error attached to a
//! terminal state.

use crate::balance;
use crate::config::DistributionSettings;
use crate::contracts;
use crate::error::{classify, internal, ClassifiedError};
use crate::provider::WalletProvider;
use anyhow::{anyhow, Result};
use ethers::abi::Token;
use ethers::types::{Address, TxHash, U256};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Fixed gas ceiling for the distribution call. Generous on purpose: the
/// contract's cost grows with cold storage writes per recipient, which gas
/// estimation handles badly, and an out-of-gas failure still burns the fee.
pub const DISTRIBUTION_GAS_LIMIT: u64 = 3_000_000;

/// Receipt polling interval. Confirmation is bounded only by chain finality;
/// a submitted payment is never abandoned client-side.
const RECEIPT_POLL_MS: u64 = 500;

/// A validated set of recipients and amounts for one distribution call.
/// Built fresh per attempt, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    recipients: Vec<Address>,
    amounts: Vec<U256>,
    total_amount: U256,
}

impl DistributionPlan {
    pub fn new(recipients: Vec<Address>, amounts: Vec<U256>) -> Result<Self> {
        if recipients.is_empty() {
            return Err(anyhow!("a distribution plan needs at least one recipient"));
        }
        if recipients.len() != amounts.len() {
            return Err(anyhow!(
                "recipient/amount length mismatch: {} recipients, {} amounts",
                recipients.len(),
                amounts.len()
            ));
        }
        let mut total_amount = U256::zero();
        for amount in &amounts {
            total_amount = total_amount
                .checked_add(*amount)
                .ok_or_else(|| anyhow!("total amount overflows uint256"))?;
        }
        Ok(Self {
            recipients,
            amounts,
            total_amount,
        })
    }

    /// The common single-beneficiary case.
    pub fn single(recipient: Address, amount: U256) -> Self {
        Self {
            recipients: vec![recipient],
            amounts: vec![amount],
            total_amount: amount,
        }
    }

    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    pub fn amounts(&self) -> &[U256] {
        &self.amounts
    }

    pub fn total_amount(&self) -> U256 {
        self.total_amount
    }
}

/// Append-only progress log for one distribution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Narration {
    lines: Vec<String>,
}

impl Narration {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    fn push(&mut self, line: String) {
        info!("{}", line);
        self.lines.push(line);
    }
}

/// Observable state of a distribution attempt. A fresh attempt always starts
/// a new Pending cycle; Success and Error are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionState {
    Idle,
    Pending {
        narration: Vec<String>,
    },
    Success {
        hash: TxHash,
        narration: Vec<String>,
    },
    Error {
        hash: Option<TxHash>,
        narration: Vec<String>,
        error: ClassifiedError,
    },
}

/// What a successful attempt hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionReceipt {
    pub tx_hash: TxHash,
    pub narration: Vec<String>,
    pub final_token_balance: String,
}

/// Runs the two-phase pipeline for one plan against the active signer.
pub struct DistributionExecutor<'a> {
    provider: &'a dyn WalletProvider,
    signer: Address,
    settings: &'a DistributionSettings,
    progress: Option<&'a UnboundedSender<TransactionState>>,
    narration: Narration,
    last_hash: Option<TxHash>,
}

impl<'a> DistributionExecutor<'a> {
    pub fn new(
        provider: &'a dyn WalletProvider,
        signer: Address,
        settings: &'a DistributionSettings,
        progress: Option<&'a UnboundedSender<TransactionState>>,
    ) -> Self {
        Self {
            provider,
            signer,
            settings,
            progress,
            narration: Narration::default(),
            last_hash: None,
        }
    }

    /// Run the pipeline to a terminal state.
    pub async fn execute(
        mut self,
        plan: &DistributionPlan,
    ) -> Result<DistributionReceipt, ClassifiedError> {
        match self.run(plan).await {
            Ok((hash, final_token_balance)) => {
                self.emit(TransactionState::Success {
                    hash,
                    narration: self.narration.lines().to_vec(),
                });
                Ok(DistributionReceipt {
                    tx_hash: hash,
                    narration: self.narration.into_lines(),
                    final_token_balance,
                })
            }
            Err(error) => {
                warn!(%error, "distribution attempt failed");
                self.emit(TransactionState::Error {
                    hash: self.last_hash,
                    narration: self.narration.lines().to_vec(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    async fn run(&mut self, plan: &DistributionPlan) -> Result<(TxHash, String), ClassifiedError> {
        let token = self.settings.token_contract;
        let distributor = self.settings.distribution_contract;
        let total = plan.total_amount();

        // Step 1: authoritative balance check. The balance cached at connect
        // time may be stale by the time the user submits.
        self.narrate(format!("Checking token balance for {:?}...", self.signer));
        let available = balance::token_balance_raw(self.provider, token, self.signer).await?;
        if available < total {
            return Err(ClassifiedError::InsufficientBalance {
                required: total,
                available,
            });
        }
        self.narrate(format!(
            "Balance sufficient: {} available, {} required",
            available, total
        ));

        // Step 2: allowance reconciliation. A sufficient allowance must never
        // trigger a redundant approval transaction.
        self.narrate("Checking allowance granted to the distribution contract...".to_string());
        let allowance = self
            .read_allowance(token, distributor)
            .await
            .map_err(|err| {
                warn!(%err, "allowance read failed");
                ClassifiedError::AllowanceCheckFailed
            })?;
        if allowance >= total {
            self.narrate(format!(
                "Existing allowance {} covers the payment; skipping approval",
                allowance
            ));
        } else {
            // Step 3: approval, confirmed before anything else happens.
            self.narrate(format!("Approving {} tokens for distribution...", total));
            let calldata = contracts::encode_call(
                &contracts::erc20_approve(),
                &[Token::Address(distributor), Token::Uint(total)],
            )
            .map_err(internal)?;
            let approve_hash = self.send_transaction(token, calldata, None).await?;
            self.last_hash = Some(approve_hash);
            self.narrate(format!(
                "Approval submitted: {:?}; waiting for confirmation...",
                approve_hash
            ));
            if !self.wait_for_receipt(approve_hash).await? {
                return Err(ClassifiedError::Unclassified(format!(
                    "approval transaction {:?} reverted on-chain",
                    approve_hash
                )));
            }
            self.narrate(format!("Approval confirmed: {:?}", approve_hash));
        }

        // Step 4: best-effort dry run. An absent or erroring entry point is
        // ignored; only an explicit false rejects the payment.
        self.narrate("Asking the contract to validate the distribution...".to_string());
        match self.validate(plan, distributor).await {
            Ok(true) => self.narrate("Contract validation passed".to_string()),
            Ok(false) => return Err(ClassifiedError::ValidationFailed),
            Err(err) => {
                warn!(%err, "validation entry point unavailable; the contract enforces the same checks on-chain");
                self.narrate("Validation unavailable; proceeding".to_string());
            }
        }

        // Step 5: the distribution itself, with the fixed gas ceiling.
        self.narrate(format!(
            "Distributing {} to {} recipient(s)...",
            total,
            plan.recipients().len()
        ));
        let calldata = contracts::encode_call(
            &contracts::distribute_payment(),
            &[
                contracts::address_array(plan.recipients()),
                contracts::uint_array(plan.amounts()),
                Token::Uint(total),
            ],
        )
        .map_err(internal)?;
        let dist_hash = self
            .send_transaction(distributor, calldata, Some(DISTRIBUTION_GAS_LIMIT))
            .await?;
        self.last_hash = Some(dist_hash);
        self.narrate(format!(
            "Distribution submitted: {:?}; waiting for confirmation...",
            dist_hash
        ));
        if !self.wait_for_receipt(dist_hash).await? {
            return Err(ClassifiedError::DistributionReverted);
        }
        self.narrate(format!("Distribution confirmed: {:?}", dist_hash));

        // Step 6: post-check, advisory only.
        self.narrate("Reading final token balance...".to_string());
        let final_token_balance = balance::token_balance(self.provider, token, self.signer).await;
        self.narrate(format!("Remaining token balance: {}", final_token_balance));

        Ok((dist_hash, final_token_balance))
    }

    fn narrate(&mut self, line: String) {
        self.narration.push(line);
        self.emit(TransactionState::Pending {
            narration: self.narration.lines().to_vec(),
        });
    }

    fn emit(&self, state: TransactionState) {
        if let Some(progress) = self.progress {
            let _ = progress.send(state);
        }
    }

    async fn read_allowance(
        &self,
        token: Address,
        spender: Address,
    ) -> Result<U256, ClassifiedError> {
        let calldata = contracts::encode_call(
            &contracts::erc20_allowance(),
            &[Token::Address(self.signer), Token::Address(spender)],
        )
        .map_err(internal)?;
        let output = balance::eth_call(self.provider, token, calldata).await?;
        contracts::decode_uint(&output).map_err(internal)
    }

    async fn validate(
        &self,
        plan: &DistributionPlan,
        distributor: Address,
    ) -> Result<bool, ClassifiedError> {
        let calldata = contracts::encode_call(
            &contracts::validate_distribution(),
            &[
                contracts::address_array(plan.recipients()),
                contracts::uint_array(plan.amounts()),
                Token::Uint(plan.total_amount()),
            ],
        )
        .map_err(internal)?;
        let output = balance::eth_call(self.provider, distributor, calldata).await?;
        contracts::decode_bool(&output).map_err(internal)
    }

    async fn send_transaction(
        &self,
        to: Address,
        calldata: Vec<u8>,
        gas: Option<u64>,
    ) -> Result<TxHash, ClassifiedError> {
        crate::network::settle().await;
        let mut tx = json!({
            "from": format!("{:?}", self.signer),
            "to": format!("{:?}", to),
            "data": contracts::to_hex_data(&calldata),
        });
        if let Some(gas) = gas {
            tx["gas"] = Value::String(format!("0x{:x}", gas));
        }
        let output = self
            .provider
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|raw| classify(&raw))?;
        let hash = output.as_str().ok_or_else(|| {
            ClassifiedError::Unclassified("eth_sendTransaction returned non-string hash".to_string())
        })?;
        hash.parse::<TxHash>().map_err(|e| {
            ClassifiedError::Unclassified(format!("invalid transaction hash '{}': {}", hash, e))
        })
    }

    /// Poll until the receipt lands. No client-side timeout: a pending
    /// payment is either confirmed or reverted, never speculatively retried.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<bool, ClassifiedError> {
        loop {
            let output = self
                .provider
                .request("eth_getTransactionReceipt", json!([format!("{:?}", hash)]))
                .await
                .map_err(|raw| classify(&raw))?;
            if !output.is_null() {
                // Pre-Byzantium receipts carry no status field.
                let status = match output.get("status").and_then(Value::as_str) {
                    Some(status) => status,
                    None => {
                        warn!(tx = ?hash, "receipt has no status field; treating as confirmed");
                        "0x1"
                    }
                };
                return Ok(status != "0x0");
            }
            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_MS)).await;
        }
    }
}

// Send engine: drives one transfer attempt from user intent to a terminal
// outcome and reconciles it with the history store. One machine instance
// exists per open send interaction; a reopened interaction is a new
// instance and stale receipt deliveries cannot touch it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;

use crate::asset::{self, Asset};
use crate::chain::{ChainClient, FeeEstimate, ReceiptEvent, ReceiptStatus, SubmitError};
use crate::history::{HistoryStore, TransactionRecord, TxKind, TxPatch, TxStatus};
use crate::network::NetworkContext;

pub const MSG_BAD_ADDRESS: &str = "Please enter a valid recipient address";
pub const MSG_BAD_AMOUNT: &str = "Please enter a valid amount";
pub const MSG_INSUFFICIENT: &str = "Insufficient balance";
pub const MSG_REJECTED: &str = "Transaction was rejected";
pub const MSG_ONCHAIN_FAILURE: &str = "Transaction failed on chain";
pub const MSG_TIMEOUT: &str = "Timed out waiting for confirmation";

/// Raw submission errors are capped before they reach the UI.
const MAX_ERROR_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStep {
    Input,
    Confirm,
    Sending,
    Success,
    Error,
}

/// Well-formedness check for a target-chain address: `0x` + 40 hex digits.
/// Case is not checksummed here; the chain enforces the authoritative rules.
pub fn is_valid_address(s: &str) -> bool {
    let s = s.trim();
    let Some(hex_part) = s.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

pub struct SendMachine<C: ChainClient> {
    client: Arc<C>,
    history: Arc<HistoryStore>,
    network: Arc<NetworkContext>,
    asset: Asset,
    step: SendStep,
    recipient: String,
    amount: String,
    error: String,
    fee: Option<FeeEstimate>,
    tx_hash: Option<String>,
    /// Set once a receipt for `tx_hash` has been applied; later deliveries
    /// of the same hash are no-ops.
    resolved_hash: Option<String>,
    /// The (account, chain id) the pending record was written under, so the
    /// status update lands in the same partition even if the network toggles
    /// while the receipt is outstanding.
    partition: Option<(String, u64)>,
    closed: bool,
}

impl<C: ChainClient> SendMachine<C> {
    /// Open a send interaction for `asset`.
    pub fn open(
        client: Arc<C>,
        history: Arc<HistoryStore>,
        network: Arc<NetworkContext>,
        asset: Asset,
    ) -> Self {
        SendMachine {
            client,
            history,
            network,
            asset,
            step: SendStep::Input,
            recipient: String::new(),
            amount: String::new(),
            error: String::new(),
            fee: None,
            tx_hash: None,
            resolved_hash: None,
            partition: None,
            closed: false,
        }
    }

    pub fn step(&self) -> SendStep {
        self.step
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn fee_estimate(&self) -> Option<FeeEstimate> {
        self.fee
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    /// Record the entered recipient/amount and try to advance to the
    /// confirmation step. Pure local validation, no suspension. Returns
    /// whether the machine advanced; on failure the inline message is
    /// available via [`error`](Self::error) and the step stays `Input`.
    pub fn submit_input(&mut self, recipient: &str, amount: &str) -> bool {
        if self.closed || self.step != SendStep::Input {
            return false;
        }
        self.recipient = recipient.trim().to_string();
        self.amount = amount.trim().to_string();
        if !self.validate() {
            return false;
        }
        self.step = SendStep::Confirm;
        true
    }

    fn validate(&mut self) -> bool {
        if !is_valid_address(&self.recipient) {
            self.error = MSG_BAD_ADDRESS.to_string();
            return false;
        }
        let amount: f64 = match self.amount.parse() {
            Ok(a) => a,
            Err(_) => {
                self.error = MSG_BAD_AMOUNT.to_string();
                return false;
            }
        };
        if !amount.is_finite() || amount <= 0.0 {
            self.error = MSG_BAD_AMOUNT.to_string();
            return false;
        }
        // UX guard against the formatted balance; the chain enforces the
        // authoritative raw-unit check at submission.
        let balance: f64 = self.asset.balance.parse().unwrap_or(0.0);
        if amount > balance {
            self.error = MSG_INSUFFICIENT.to_string();
            return false;
        }
        self.error.clear();
        true
    }

    /// Go back from the confirmation step, keeping the entered fields.
    pub fn back(&mut self) {
        if self.step == SendStep::Confirm {
            self.step = SendStep::Input;
            self.error.clear();
        }
    }

    /// Refresh the network-fee estimate for the entered transfer. Absence of
    /// an estimate is not an error.
    pub async fn refresh_fee(&mut self) {
        let Ok(raw) = asset::parse_units(&self.amount, self.asset.decimals) else {
            self.fee = None;
            return;
        };
        self.fee = self
            .client
            .estimate_fee(&self.recipient, raw, self.network.chain_id())
            .await
            .unwrap_or(None);
    }

    /// Submit the confirmed transfer. On acceptance a `pending` record is
    /// appended to the history store and the hash retained for receipt
    /// tracking; the machine stays in `Sending` until a receipt arrives. A
    /// call outside the confirmation step, or while a prior hash is still
    /// unresolved, is a no-op.
    pub async fn confirm_send(&mut self) {
        if self.closed || self.step != SendStep::Confirm || self.tx_hash.is_some() {
            return;
        }
        self.step = SendStep::Sending;
        self.error.clear();

        let chain_id = self.network.chain_id();
        let raw = match asset::parse_units(&self.amount, self.asset.decimals) {
            Ok(raw) => raw,
            Err(e) => {
                self.fail_submission(&e.to_string());
                return;
            }
        };

        match self.client.submit_transfer(&self.recipient, raw, chain_id).await {
            Ok(hash) => {
                let from = self.client.current_account().unwrap_or_default();
                let record = TransactionRecord {
                    hash: hash.clone(),
                    from: from.clone(),
                    to: self.recipient.clone(),
                    value: self.amount.clone(),
                    symbol: self.asset.symbol.clone(),
                    timestamp: now_ms(),
                    status: TxStatus::Pending,
                    kind: TxKind::Send,
                };
                if let Err(e) = self.history.append(&from, chain_id, record) {
                    eprintln!("⚠️  Failed to record submitted transfer: {e:#}");
                }
                self.tx_hash = Some(hash);
                self.partition = Some((from, chain_id));
                crate::metrics::SEND_SUBMITTED.inc();
            }
            Err(SubmitError::Rejected) => {
                self.fail_submission(MSG_REJECTED);
            }
            Err(SubmitError::Failed(msg)) => {
                self.fail_submission(&truncated(&msg));
            }
        }
    }

    fn fail_submission(&mut self, message: &str) {
        self.step = SendStep::Error;
        self.error = message.to_string();
        crate::metrics::SEND_FAILED.inc();
    }

    /// Apply one receipt delivery. Deliveries for a foreign hash, duplicate
    /// deliveries for an already-resolved hash, and deliveries after close
    /// are all no-ops.
    pub fn on_receipt(&mut self, event: &ReceiptEvent) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let Some(hash) = self.tx_hash.clone() else {
            return Ok(());
        };
        if event.hash != hash || self.resolved_hash.as_deref() == Some(event.hash.as_str()) {
            return Ok(());
        }
        self.resolved_hash = Some(hash.clone());

        let (account, chain_id) = self
            .partition
            .clone()
            .unwrap_or_else(|| (String::new(), self.network.chain_id()));

        match event.status {
            ReceiptStatus::Success => {
                self.step = SendStep::Success;
                crate::metrics::SEND_CONFIRMED.inc();
                self.history
                    .update(&account, chain_id, &hash, TxPatch::status(TxStatus::Confirmed))?;
            }
            ReceiptStatus::Failure => {
                self.step = SendStep::Error;
                self.error = MSG_ONCHAIN_FAILURE.to_string();
                crate::metrics::SEND_FAILED.inc();
                self.history
                    .update(&account, chain_id, &hash, TxPatch::status(TxStatus::Failed))?;
            }
        }
        Ok(())
    }

    fn on_timeout(&mut self) {
        if self.closed || self.resolved_hash.is_some() || self.tx_hash.is_none() {
            return;
        }
        // The record stays pending; the chain may still confirm later.
        self.step = SendStep::Error;
        self.error = MSG_TIMEOUT.to_string();
    }

    /// From the error step only: clear the error and any held hash and
    /// return to input. The entered recipient/amount survive so the user
    /// can resubmit without re-typing.
    pub fn retry(&mut self) {
        if self.closed || self.step != SendStep::Error {
            return;
        }
        self.step = SendStep::Input;
        self.error.clear();
        self.tx_hash = None;
        self.resolved_hash = None;
        self.partition = None;
    }

    /// Full reset from any state: every transient field is cleared and the
    /// instance stops reacting to receipt deliveries. Idempotent.
    pub fn close(&mut self) {
        self.step = SendStep::Input;
        self.recipient.clear();
        self.amount.clear();
        self.error.clear();
        self.fee = None;
        self.tx_hash = None;
        self.resolved_hash = None;
        self.partition = None;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn resolved(&self) -> bool {
        self.resolved_hash.is_some()
    }
}

fn truncated(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Pump receipt deliveries into the machine until its hash resolves, the
/// interaction closes, or the bounded wait expires (`None` waits forever).
/// On expiry the machine surfaces a timeout error and the history record is
/// left pending.
pub async fn watch_receipts<C: ChainClient>(
    machine: Arc<Mutex<SendMachine<C>>>,
    mut receipts: broadcast::Receiver<ReceiptEvent>,
    timeout: Option<Duration>,
) {
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    loop {
        {
            let m = machine.lock().unwrap();
            if m.closed || m.resolved() || m.tx_hash.is_none() {
                return;
            }
        }

        let delivery = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, receipts.recv()).await {
                Ok(delivery) => delivery,
                Err(_) => {
                    machine.lock().unwrap().on_timeout();
                    return;
                }
            },
            None => receipts.recv().await,
        };

        match delivery {
            Ok(event) => {
                let mut m = machine.lock().unwrap();
                if let Err(e) = m.on_receipt(&event) {
                    eprintln!("⚠️  Failed to apply receipt for {}: {e:#}", event.hash);
                }
                if m.resolved() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

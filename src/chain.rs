// Consumed interface of the chain client / wallet-connection layer. The
// dashboard core never talks RPC directly; everything chain-side arrives
// through this trait.

use anyhow::Result;
use tokio::sync::broadcast;

use crate::asset::{format_units, NATIVE_DECIMALS};

/// Final on-chain outcome of a submitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// One delivery from the receipt stream. The stream may deliver the same
/// hash more than once; consumers must tolerate duplicates.
#[derive(Debug, Clone)]
pub struct ReceiptEvent {
    pub hash: String,
    pub status: ReceiptStatus,
}

/// Network-fee estimate in native smallest-denomination units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub raw: u128,
}

impl FeeEstimate {
    pub fn formatted(&self) -> String {
        format_units(self.raw, NATIVE_DECIMALS)
    }
}

/// A token balance as reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub symbol: String,
    pub raw: u128,
    pub decimals: u32,
    pub usd: Option<String>,
    pub contract_address: Option<String>,
}

/// Submission failures split into the one case that gets a calm, specific
/// message (the user declined to sign) and everything else.
#[derive(Debug, Clone)]
pub enum SubmitError {
    Rejected,
    Failed(String),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Rejected => write!(f, "User rejected the request"),
            SubmitError::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SubmitError {}

#[allow(async_fn_in_trait)]
pub trait ChainClient: Send + Sync {
    async fn native_balance(&self, account: &str, chain_id: u64) -> Result<u128>;

    async fn token_balances(&self, account: &str, chain_id: u64) -> Result<Vec<TokenBalance>>;

    /// May legitimately be `None` while inputs are incomplete.
    async fn estimate_fee(
        &self,
        recipient: &str,
        raw_amount: u128,
        chain_id: u64,
    ) -> Result<Option<FeeEstimate>>;

    /// Resolves once the wallet has signed and broadcast, not once confirmed.
    async fn submit_transfer(
        &self,
        recipient: &str,
        raw_amount: u128,
        chain_id: u64,
    ) -> Result<String, SubmitError>;

    /// Receipt fan-out for every transfer this client has broadcast.
    fn receipt_subscribe(&self) -> broadcast::Receiver<ReceiptEvent>;

    fn current_account(&self) -> Option<String>;

    fn is_connected(&self) -> bool;

    /// Ask the wallet to move to `chain_id`. Best-effort: callers flip their
    /// own selection regardless of the outcome.
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;
}

pub mod sim {
    //! Deterministic in-process chain backend. Lets the CLI and the
    //! integration tests drive the full submit/confirm lifecycle without a
    //! real network or a signing wallet.

    use super::*;
    use anyhow::{anyhow, bail};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Default development account, funded on both networks.
    pub const DEV_ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum SubmitOutcome {
        Confirm,
        RejectSigning,
        FailOnChain,
    }

    struct SimState {
        account: Option<String>,
        active_chain: u64,
        native: HashMap<u64, u128>,
        tokens: HashMap<u64, Vec<TokenBalance>>,
        next_submit: SubmitOutcome,
        switch_supported: bool,
        auto_receipts: bool,
        confirm_delay: Duration,
        nonce: u64,
    }

    pub struct SimChain {
        state: Mutex<SimState>,
        receipts: broadcast::Sender<ReceiptEvent>,
    }

    impl SimChain {
        pub fn new() -> Self {
            let (receipts, _) = broadcast::channel(64);
            let mut native = HashMap::new();
            // 1 BTC on each network
            native.insert(crate::config::Network::Mainnet.chain_id(), 10u128.pow(18));
            native.insert(crate::config::Network::Testnet.chain_id(), 10u128.pow(18));
            SimChain {
                state: Mutex::new(SimState {
                    account: Some(DEV_ACCOUNT.to_string()),
                    active_chain: crate::config::Network::Mainnet.chain_id(),
                    native,
                    tokens: HashMap::new(),
                    next_submit: SubmitOutcome::Confirm,
                    switch_supported: true,
                    auto_receipts: true,
                    confirm_delay: Duration::from_millis(50),
                    nonce: 0,
                }),
                receipts,
            }
        }

        pub fn fund(&self, chain_id: u64, raw: u128) {
            self.state.lock().unwrap().native.insert(chain_id, raw);
        }

        pub fn set_tokens(&self, chain_id: u64, tokens: Vec<TokenBalance>) {
            self.state.lock().unwrap().tokens.insert(chain_id, tokens);
        }

        pub fn set_account(&self, account: Option<String>) {
            self.state.lock().unwrap().account = account;
        }

        /// The next submission fails as if the user declined to sign.
        pub fn script_rejection(&self) {
            self.state.lock().unwrap().next_submit = SubmitOutcome::RejectSigning;
        }

        /// The next submission broadcasts, then its receipt reports failure.
        pub fn script_onchain_failure(&self) {
            self.state.lock().unwrap().next_submit = SubmitOutcome::FailOnChain;
        }

        pub fn set_switch_supported(&self, supported: bool) {
            self.state.lock().unwrap().switch_supported = supported;
        }

        /// Disable automatic receipt delivery; tests then call
        /// [`emit_receipt`](Self::emit_receipt) by hand.
        pub fn set_auto_receipts(&self, auto: bool) {
            self.state.lock().unwrap().auto_receipts = auto;
        }

        pub fn set_confirm_delay(&self, delay: Duration) {
            self.state.lock().unwrap().confirm_delay = delay;
        }

        pub fn active_chain(&self) -> u64 {
            self.state.lock().unwrap().active_chain
        }

        /// Push a receipt delivery to all subscribers. Duplicate deliveries
        /// are intentionally possible.
        pub fn emit_receipt(&self, hash: &str, status: ReceiptStatus) {
            let _ = self.receipts.send(ReceiptEvent {
                hash: hash.to_string(),
                status,
            });
        }

    }

    fn next_hash(recipient: &str, raw_amount: u128, chain_id: u64, nonce: u64) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(recipient.as_bytes());
        hasher.update(&raw_amount.to_le_bytes());
        hasher.update(&chain_id.to_le_bytes());
        hasher.update(&nonce.to_le_bytes());
        hasher.update(&rand::random::<u64>().to_le_bytes());
        format!("0x{}", hex::encode(hasher.finalize().as_bytes()))
    }

    impl Default for SimChain {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ChainClient for SimChain {
        async fn native_balance(&self, _account: &str, chain_id: u64) -> Result<u128> {
            Ok(*self.state.lock().unwrap().native.get(&chain_id).unwrap_or(&0))
        }

        async fn token_balances(&self, _account: &str, chain_id: u64) -> Result<Vec<TokenBalance>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .tokens
                .get(&chain_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn estimate_fee(
            &self,
            recipient: &str,
            raw_amount: u128,
            _chain_id: u64,
        ) -> Result<Option<FeeEstimate>> {
            if recipient.is_empty() || raw_amount == 0 {
                return Ok(None);
            }
            // flat 21k gas at 0.05 gwei-equivalent
            Ok(Some(FeeEstimate { raw: 21_000 * 50_000_000 }))
        }

        async fn submit_transfer(
            &self,
            recipient: &str,
            raw_amount: u128,
            chain_id: u64,
        ) -> Result<String, SubmitError> {
            let (outcome, hash, auto, delay) = {
                let mut st = self.state.lock().unwrap();
                let outcome = st.next_submit;
                st.next_submit = SubmitOutcome::Confirm;
                if outcome == SubmitOutcome::RejectSigning {
                    return Err(SubmitError::Rejected);
                }
                let balance = *st.native.get(&chain_id).unwrap_or(&0);
                if raw_amount > balance {
                    return Err(SubmitError::Failed(format!(
                        "insufficient funds: requested {raw_amount}, available {balance}"
                    )));
                }
                st.nonce += 1;
                let hash = next_hash(recipient, raw_amount, chain_id, st.nonce);
                (outcome, hash, st.auto_receipts, st.confirm_delay)
            };

            if auto {
                let status = match outcome {
                    SubmitOutcome::FailOnChain => ReceiptStatus::Failure,
                    _ => ReceiptStatus::Success,
                };
                let tx = self.receipts.clone();
                let receipt_hash = hash.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(ReceiptEvent {
                        hash: receipt_hash,
                        status,
                    });
                });
            }

            Ok(hash)
        }

        fn receipt_subscribe(&self) -> broadcast::Receiver<ReceiptEvent> {
            self.receipts.subscribe()
        }

        fn current_account(&self) -> Option<String> {
            self.state.lock().unwrap().account.clone()
        }

        fn is_connected(&self) -> bool {
            self.state.lock().unwrap().account.is_some()
        }

        async fn switch_chain(&self, chain_id: u64) -> Result<()> {
            let mut st = self.state.lock().unwrap();
            if !st.switch_supported {
                bail!("wallet does not support programmatic chain switching");
            }
            if !st.native.contains_key(&chain_id) {
                return Err(anyhow!("unknown chain id {chain_id}"));
            }
            st.active_chain = chain_id;
            Ok(())
        }
    }
}

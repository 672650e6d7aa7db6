use serde::{Serialize, Deserialize};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::storage::{Store, CF_HISTORY};

/// Persisted partitions are capped; the oldest records fall off silently.
pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// `Receive` is reserved for future symmetry; this system only ever writes
/// `Send` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Send,
    Receive,
}

/// One submitted transfer. Identity (`hash`, `timestamp`, amounts) is fixed
/// at submission; only `status` moves, exactly once, to a terminal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub symbol: String,
    pub timestamp: u64,
    pub status: TxStatus,
    #[serde(rename = "type")]
    pub kind: TxKind,
}

/// Partial update applied by `HistoryStore::update`; unset fields keep their
/// stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxPatch {
    pub status: Option<TxStatus>,
}

impl TxPatch {
    pub fn status(status: TxStatus) -> Self {
        TxPatch { status: Some(status) }
    }
}

/// Published on every mutation so reactive consumers can re-read.
#[derive(Debug, Clone)]
pub struct HistoryEvent {
    pub account: String,
    pub chain_id: u64,
}

/// Durable, per-(account, chain id) list of transaction records,
/// newest-first, with change notification.
pub struct HistoryStore {
    store: Arc<Store>,
    events: broadcast::Sender<HistoryEvent>,
}

impl HistoryStore {
    pub fn new(store: Arc<Store>) -> Self {
        let (events, _) = broadcast::channel(64);
        HistoryStore { store, events }
    }

    fn key(account: &str, chain_id: u64) -> String {
        format!("{account}:{chain_id}")
    }

    /// Newest-first records for one partition. Missing or malformed stored
    /// data reads as empty; this never errors.
    pub fn read(&self, account: &str, chain_id: u64) -> Vec<TransactionRecord> {
        if account.is_empty() {
            return Vec::new();
        }
        self.store
            .get::<Vec<TransactionRecord>>(CF_HISTORY, Self::key(account, chain_id).as_bytes())
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Prepend `record` to the partition, evicting past the cap. A missing
    /// account is a no-op: records exist only for a connected account.
    pub fn append(&self, account: &str, chain_id: u64, record: TransactionRecord) -> Result<()> {
        if account.is_empty() {
            return Ok(());
        }
        let mut records = self.read(account, chain_id);
        records.insert(0, record);
        if records.len() > HISTORY_CAP {
            crate::metrics::HISTORY_EVICTIONS
                .inc_by((records.len() - HISTORY_CAP) as u64);
            records.truncate(HISTORY_CAP);
        }
        self.store
            .put(CF_HISTORY, Self::key(account, chain_id).as_bytes(), &records)?;
        crate::metrics::HISTORY_APPENDS.inc();
        self.notify(account, chain_id);
        Ok(())
    }

    /// Merge `patch` into the record with matching `hash`. A missing record
    /// is a silent no-op; at most one record can match.
    pub fn update(
        &self,
        account: &str,
        chain_id: u64,
        hash: &str,
        patch: TxPatch,
    ) -> Result<()> {
        if account.is_empty() {
            return Ok(());
        }
        let mut records = self.read(account, chain_id);
        let Some(record) = records.iter_mut().find(|r| r.hash == hash) else {
            return Ok(());
        };
        if let Some(status) = patch.status {
            record.status = status;
        }
        self.store
            .put(CF_HISTORY, Self::key(account, chain_id).as_bytes(), &records)?;
        crate::metrics::HISTORY_UPDATES.inc();
        self.notify(account, chain_id);
        Ok(())
    }

    /// Register for change notification. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    fn notify(&self, account: &str, chain_id: u64) {
        // No subscribers is fine; send only fails when nobody listens.
        let _ = self.events.send(HistoryEvent {
            account: account.to_string(),
            chain_id,
        });
    }
}

// Library interface for the satdash wallet core
// This allows the CLI, tests and external consumers to drive the send engine

pub mod asset;
pub mod chain;
pub mod config;
pub mod history;
pub mod metrics;
pub mod network;
pub mod send;
pub mod storage;

pub use asset::Asset;
pub use chain::{ChainClient, FeeEstimate, ReceiptEvent, ReceiptStatus, SubmitError, TokenBalance};
pub use config::Network;
pub use history::{HistoryStore, TransactionRecord, TxKind, TxPatch, TxStatus};
pub use network::NetworkContext;
pub use send::{SendMachine, SendStep};
pub use storage::Store;

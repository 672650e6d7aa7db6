// History store tests: durability, ordering, the partition cap, and
// isolation between (account, chain id) partitions.

use std::sync::Arc;
use tempfile::TempDir;
use satdash::{
    config::Network,
    history::{HistoryStore, TransactionRecord, TxKind, TxPatch, TxStatus, HISTORY_CAP},
    storage::{Store, CF_HISTORY},
};

const ALICE: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const BOB: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

fn open_history(dir: &TempDir) -> (Arc<Store>, HistoryStore) {
    let store = Arc::new(
        Store::open(dir.path().join("history_db").to_str().unwrap()).expect("Failed to open store"),
    );
    let history = HistoryStore::new(store.clone());
    (store, history)
}

fn record(hash: &str, value: &str) -> TransactionRecord {
    TransactionRecord {
        hash: hash.to_string(),
        from: ALICE.to_string(),
        to: BOB.to_string(),
        value: value.to_string(),
        symbol: "BTC".to_string(),
        timestamp: 1_700_000_000_000,
        status: TxStatus::Pending,
        kind: TxKind::Send,
    }
}

#[tokio::test]
async fn test_round_trip_preserves_reverse_insertion_order() {
    println!("🧪 Testing history round trip ordering...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (_store, history) = open_history(&tmp);
    let chain = Network::Mainnet.chain_id();

    for i in 0..10 {
        history
            .append(ALICE, chain, record(&format!("0xhash{i}"), "0.1"))
            .expect("append should succeed");
    }

    let records = history.read(ALICE, chain);
    assert_eq!(records.len(), 10);
    // newest first
    assert_eq!(records[0].hash, "0xhash9");
    assert_eq!(records[9].hash, "0xhash0");

    println!("✅ History round trip ordering verified");
}

#[tokio::test]
async fn test_cap_evicts_oldest_silently() {
    println!("🧪 Testing history cap eviction...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (_store, history) = open_history(&tmp);
    let chain = Network::Mainnet.chain_id();

    for i in 0..(HISTORY_CAP + 1) {
        history
            .append(ALICE, chain, record(&format!("0xhash{i}"), "0.1"))
            .expect("append should succeed");
    }

    let records = history.read(ALICE, chain);
    assert_eq!(records.len(), HISTORY_CAP, "cap must hold at {HISTORY_CAP}");
    assert_eq!(records[0].hash, format!("0xhash{HISTORY_CAP}"));
    // the very first record fell off
    assert!(!records.iter().any(|r| r.hash == "0xhash0"));
    assert_eq!(records.last().unwrap().hash, "0xhash1");

    println!("✅ Oldest record evicted at the cap");
}

#[tokio::test]
async fn test_partition_isolation() {
    println!("🧪 Testing partition isolation...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (_store, history) = open_history(&tmp);
    let mainnet = Network::Mainnet.chain_id();
    let testnet = Network::Testnet.chain_id();

    history
        .append(ALICE, mainnet, record("0xmain1", "1"))
        .expect("append should succeed");

    assert_eq!(history.read(ALICE, mainnet).len(), 1);
    assert!(history.read(ALICE, testnet).is_empty(), "network partitions must not bleed");
    assert!(history.read(BOB, mainnet).is_empty(), "account partitions must not bleed");

    history
        .append(BOB, mainnet, record("0xbob1", "2"))
        .expect("append should succeed");
    assert_eq!(history.read(ALICE, mainnet).len(), 1);
    assert_eq!(history.read(BOB, mainnet).len(), 1);
    assert_eq!(history.read(BOB, mainnet)[0].hash, "0xbob1");

    println!("✅ Partitions are fully independent");
}

#[tokio::test]
async fn test_update_merges_status_and_ignores_missing_hash() {
    println!("🧪 Testing partial updates...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (_store, history) = open_history(&tmp);
    let chain = Network::Mainnet.chain_id();

    history
        .append(ALICE, chain, record("0xhash1", "0.5"))
        .expect("append should succeed");

    history
        .update(ALICE, chain, "0xhash1", TxPatch::status(TxStatus::Confirmed))
        .expect("update should succeed");

    let records = history.read(ALICE, chain);
    assert_eq!(records[0].status, TxStatus::Confirmed);
    // identity fields untouched
    assert_eq!(records[0].value, "0.5");
    assert_eq!(records[0].timestamp, 1_700_000_000_000);

    // unknown hash is a silent no-op
    history
        .update(ALICE, chain, "0xnope", TxPatch::status(TxStatus::Failed))
        .expect("no-op update should succeed");
    assert_eq!(history.read(ALICE, chain)[0].status, TxStatus::Confirmed);

    println!("✅ Updates merge in place and missing hashes are ignored");
}

#[tokio::test]
async fn test_malformed_stored_data_reads_as_empty() {
    println!("🧪 Testing malformed storage tolerance...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (store, history) = open_history(&tmp);
    let chain = Network::Mainnet.chain_id();

    let key = format!("{ALICE}:{chain}");
    let cf = store.db.cf_handle(CF_HISTORY).expect("history CF must exist");
    store
        .db
        .put_cf(cf, key.as_bytes(), b"definitely not json")
        .expect("raw write should succeed");

    assert!(history.read(ALICE, chain).is_empty(), "garbage must read as empty");

    // and the partition recovers on the next append
    history
        .append(ALICE, chain, record("0xfresh", "1"))
        .expect("append should succeed");
    assert_eq!(history.read(ALICE, chain).len(), 1);

    println!("✅ Malformed data tolerated as empty history");
}

#[tokio::test]
async fn test_mutations_notify_subscribers() {
    println!("🧪 Testing change notification...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (_store, history) = open_history(&tmp);
    let chain = Network::Testnet.chain_id();

    let mut rx = history.subscribe();

    history
        .append(ALICE, chain, record("0xhash1", "0.1"))
        .expect("append should succeed");
    let ev = rx.try_recv().expect("append must notify");
    assert_eq!(ev.account, ALICE);
    assert_eq!(ev.chain_id, chain);

    history
        .update(ALICE, chain, "0xhash1", TxPatch::status(TxStatus::Failed))
        .expect("update should succeed");
    assert!(rx.try_recv().is_ok(), "update must notify");

    // a no-op update stays silent
    history
        .update(ALICE, chain, "0xmissing", TxPatch::status(TxStatus::Failed))
        .expect("no-op update should succeed");
    assert!(rx.try_recv().is_err(), "no-op update must not notify");

    println!("✅ Subscribers observe every mutation");
}

#[tokio::test]
async fn test_records_survive_reopen() {
    println!("🧪 Testing durability across reopen...");

    let tmp = TempDir::new().expect("Failed to create temp dir");
    let chain = Network::Mainnet.chain_id();

    {
        let (store, history) = open_history(&tmp);
        history
            .append(ALICE, chain, record("0xpersist", "0.25"))
            .expect("append should succeed");
        store.flush().expect("flush should succeed");
    }

    let (_store, history) = open_history(&tmp);
    let records = history.read(ALICE, chain);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hash, "0xpersist");
    assert_eq!(records[0].status, TxStatus::Pending);

    println!("✅ History survives application reloads");
}

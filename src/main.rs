use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use anyhow::{anyhow, Result};

use satdash::asset;
use satdash::chain::{sim::SimChain, ChainClient};
use satdash::config::{self, Network};
use satdash::history::{HistoryStore, TxStatus};
use satdash::metrics;
use satdash::network::NetworkContext;
use satdash::send::{watch_receipts, SendMachine, SendStep};
use satdash::storage;

#[derive(Parser)]
#[command(author, version, about = "satdash wallet core v0.2")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Start on testnet regardless of the configured default
    #[arg(long, default_value_t = false)]
    testnet: bool,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show asset balances for the connected account
    Assets,
    /// Show the local transfer history for the active network
    History,
    /// Send a transfer and wait for its confirmation
    Send {
        #[arg(long)]
        to: String,
        /// Decimal amount in display units; omit with --max to send the full balance
        #[arg(long)]
        amount: Option<String>,
        #[arg(long, default_value = "BTC")]
        symbol: String,
        #[arg(long, default_value_t = false)]
        max: bool,
    },
    /// Flip the active network between mainnet and testnet
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("--- satdash wallet core ---");

    let cli = Cli::parse();

    let mut cfg = match config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("⚠️  Could not read config from '{}', using embedded defaults: {}", cli.config, e);
            const EMBEDDED_CONFIG: &str = include_str!("../config.toml");
            config::load_from_str(EMBEDDED_CONFIG)?
        }
    };

    // Relative storage paths live under the user's home directory
    if std::path::Path::new(&cfg.storage.path).is_relative() {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        let abs = std::path::Path::new(&home).join(".satdash").join(&cfg.storage.path);
        cfg.storage.path = abs.to_string_lossy().into_owned();
    }

    let store = storage::open(&cfg.storage)?;
    println!("🗄️  Database opened at '{}'", cfg.storage.path);

    metrics::serve(cfg.metrics.clone())?;

    let initial = if cli.testnet { Network::Testnet } else { cfg.network.default };
    let network = Arc::new(NetworkContext::new(initial));
    let history = Arc::new(HistoryStore::new(store.clone()));

    // The CLI runs against the in-process simulated chain; a browser build
    // swaps in a wallet-backed client behind the same trait.
    let client = Arc::new(SimChain::new());
    println!("🧪 Using the simulated chain backend ({})", network.current());

    match cli.cmd {
        Some(Cmd::Assets) => cmd_assets(&client, &network).await,
        Some(Cmd::History) => cmd_history(&client, &history, &network),
        Some(Cmd::Send { to, amount, symbol, max }) => {
            let timeout = match cfg.send.confirm_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
            cmd_send(client, history, network, &to, amount, &symbol, max, timeout).await
        }
        Some(Cmd::Toggle) => {
            let next = network.toggle(client.as_ref()).await;
            println!("🔀 Active network is now {next} (chain id {})", next.chain_id());
            Ok(())
        }
        None => {
            println!("ℹ️  No command given; try `assets`, `history`, `send` or `toggle`");
            Ok(())
        }
    }
}

async fn cmd_assets(client: &Arc<SimChain>, network: &Arc<NetworkContext>) -> Result<()> {
    let Some(account) = client.current_account() else {
        println!("🔌 No wallet connected");
        return Ok(());
    };
    let assets = asset::collect_assets(client.as_ref(), &account, network.chain_id()).await?;
    println!("👛 {account} on {}", network.current());
    for a in &assets {
        if a.balance_usd.is_empty() {
            println!("   {:<10} {:>20}  {}", a.symbol, a.balance, a.name);
        } else {
            println!("   {:<10} {:>20}  {} (${})", a.symbol, a.balance, a.name, a.balance_usd);
        }
    }
    println!("   total ≈ ${}", asset::total_usd(&assets));
    Ok(())
}

fn cmd_history(
    client: &Arc<SimChain>,
    history: &Arc<HistoryStore>,
    network: &Arc<NetworkContext>,
) -> Result<()> {
    let account = client.current_account().unwrap_or_default();
    let net = network.current();
    let records = history.read(&account, net.chain_id());
    if records.is_empty() {
        println!("📭 No transfers recorded on {net}");
        return Ok(());
    }
    println!("📜 {} transfer(s) on {net}:", records.len());
    for r in &records {
        let icon = match r.status {
            TxStatus::Pending => "⏳",
            TxStatus::Confirmed => "✅",
            TxStatus::Failed => "❌",
        };
        println!(
            "   {icon} {} {} → {}  ({} ago)\n      {}",
            r.value,
            r.symbol,
            r.to,
            ago(r.timestamp),
            net.explorer_tx_url(&r.hash),
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_send(
    client: Arc<SimChain>,
    history: Arc<HistoryStore>,
    network: Arc<NetworkContext>,
    to: &str,
    amount: Option<String>,
    symbol: &str,
    max: bool,
    timeout: Option<Duration>,
) -> Result<()> {
    if !client.is_connected() {
        println!("🔌 No wallet connected");
        return Ok(());
    }
    let account = client.current_account().unwrap_or_default();
    let chain_id = network.chain_id();

    let assets = asset::collect_assets(client.as_ref(), &account, chain_id).await?;
    let asset = assets
        .into_iter()
        .find(|a| a.symbol == symbol)
        .ok_or_else(|| anyhow!("no balance for asset '{symbol}' on {}", network.current()))?;

    let amount = if max {
        asset.balance.clone()
    } else {
        amount.ok_or_else(|| anyhow!("pass --amount or --max"))?
    };

    let mut machine = SendMachine::open(client.clone(), history, network.clone(), asset);
    if !machine.submit_input(to, &amount) {
        println!("❌ {}", machine.error());
        return Ok(());
    }

    machine.refresh_fee().await;
    if let Some(fee) = machine.fee_estimate() {
        println!("⛽ Estimated network fee: {} BTC", fee.formatted());
    }
    println!("📤 Sending {amount} {} to {to}...", machine.asset().symbol);

    machine.confirm_send().await;
    match machine.step() {
        SendStep::Error => {
            println!("❌ {}", machine.error());
            return Ok(());
        }
        SendStep::Sending => {
            let hash = machine.tx_hash().unwrap_or_default().to_string();
            println!("⏳ Broadcast as {hash}");
            println!("   {}", network.current().explorer_tx_url(&hash));
        }
        _ => {}
    }

    let receipts = client.receipt_subscribe();
    let machine = Arc::new(Mutex::new(machine));
    let watcher = tokio::spawn(watch_receipts(machine.clone(), receipts, timeout));
    watcher.await?;

    let machine = machine.lock().unwrap();
    match machine.step() {
        SendStep::Success => println!("✅ Transaction confirmed"),
        SendStep::Error => println!("❌ {}", machine.error()),
        _ => println!("⏳ Still waiting; the record stays pending"),
    }
    Ok(())
}

fn ago(timestamp_ms: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let secs = now.saturating_sub(timestamp_ms) / 1000;
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use anyhow::{Context, Result};

/// The two fixed networks the dashboard can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Chain identifier used to scope storage partitions and client calls.
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Mainnet => 31_612,
            Network::Testnet => 31_611,
        }
    }

    pub fn flipped(self) -> Network {
        match self {
            Network::Mainnet => Network::Testnet,
            Network::Testnet => Network::Mainnet,
        }
    }

    pub fn explorer_base(self) -> &'static str {
        match self {
            Network::Mainnet => "https://explorer.mezo.org",
            Network::Testnet => "https://explorer.test.mezo.org",
        }
    }

    pub fn explorer_tx_url(self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base(), hash)
    }

    pub fn explorer_address_url(self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_base(), address)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: Storage,
    #[serde(default)]
    pub network: Net,
    #[serde(default)]
    pub send: Send,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Net {
    #[serde(default = "default_network")]
    pub default: Network,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Send {
    /// How long to wait for a receipt before giving up on a submitted
    /// transfer. 0 disables the bound entirely.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_network() -> Network { Network::Mainnet }
fn default_confirm_timeout() -> u64 { 900 }
fn default_bind() -> String { "127.0.0.1:9100".into() }

impl Default for Net {
    fn default() -> Self { Net { default: default_network() } }
}

impl Default for Send {
    fn default() -> Self { Send { confirm_timeout_secs: default_confirm_timeout() } }
}

impl Default for Metrics {
    fn default() -> Self { Metrics { bind: default_bind() } }
}

/// Read the TOML file at `p` and deserialize into `Config`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("🗂️  couldn’t read config file {}", p.as_ref().display()))?;
    load_from_str(&text)
}

/// Deserialize a config from an in-memory TOML string (used for the
/// embedded fallback config).
pub fn load_from_str(text: &str) -> Result<Config> {
    toml::from_str(text).with_context(|| "📝  invalid TOML in config file".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explorer_urls_follow_network() {
        let tx = Network::Mainnet.explorer_tx_url("0xabc");
        assert_eq!(tx, "https://explorer.mezo.org/tx/0xabc");
        let addr = Network::Testnet.explorer_address_url("0xdef");
        assert_eq!(addr, "https://explorer.test.mezo.org/address/0xdef");
    }

    #[test]
    fn chain_ids_are_distinct() {
        assert_ne!(Network::Mainnet.chain_id(), Network::Testnet.chain_id());
        assert_eq!(Network::Mainnet.flipped(), Network::Testnet);
        assert_eq!(Network::Testnet.flipped(), Network::Mainnet);
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = load_from_str("[storage]\npath = \"d\"\n").unwrap();
        assert_eq!(cfg.network.default, Network::Mainnet);
        assert_eq!(cfg.send.confirm_timeout_secs, 900);
        assert_eq!(cfg.metrics.bind, "127.0.0.1:9100");
    }
}

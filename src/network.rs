use std::sync::Mutex;

use crate::chain::ChainClient;
use crate::config::Network;

/// Single source of truth for the active network selection. Constructed once
/// per session and handed to every chain-dependent component; nothing else
/// assumes a default chain id.
pub struct NetworkContext {
    current: Mutex<Network>,
}

impl NetworkContext {
    pub fn new(initial: Network) -> Self {
        NetworkContext {
            current: Mutex::new(initial),
        }
    }

    pub fn current(&self) -> Network {
        *self.current.lock().unwrap()
    }

    pub fn chain_id(&self) -> u64 {
        self.current().chain_id()
    }

    /// Flip between the two fixed networks. The local selection changes
    /// first and unconditionally; the wallet-side switch is best-effort and
    /// a refusal only earns a warning.
    pub async fn toggle<C: ChainClient>(&self, client: &C) -> Network {
        let next = {
            let mut current = self.current.lock().unwrap();
            *current = current.flipped();
            *current
        };
        if let Err(e) = client.switch_chain(next.chain_id()).await {
            eprintln!("⚠️  Wallet did not switch to {next}: {e:#}");
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::sim::SimChain;

    #[tokio::test]
    async fn toggle_flips_even_when_wallet_refuses() {
        let ctx = NetworkContext::new(Network::Mainnet);
        let client = SimChain::new();
        client.set_switch_supported(false);

        let next = ctx.toggle(&client).await;
        assert_eq!(next, Network::Testnet);
        assert_eq!(ctx.current(), Network::Testnet);
        // the wallet stayed where it was
        assert_eq!(client.active_chain(), Network::Mainnet.chain_id());

        assert_eq!(ctx.toggle(&client).await, Network::Mainnet);
    }

    #[tokio::test]
    async fn toggle_moves_the_wallet_when_supported() {
        let ctx = NetworkContext::new(Network::Mainnet);
        let client = SimChain::new();
        ctx.toggle(&client).await;
        assert_eq!(client.active_chain(), Network::Testnet.chain_id());
    }
}

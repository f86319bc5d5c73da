//! Local nonce bookkeeping for concurrent transaction submission.
//!
//! Tracks the next nonce per signer address in memory instead of re-querying
//! the node on every send, so several swaps dispatched to the same address in
//! quick succession don't race each other onto the same nonce. Seeded at
//! startup from the Store's `LatestSwapNonce` records via [`init_nonces`](
//! swapbridge_core::chain_bridge::NonceSetter::init_nonces).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use swapbridge_core::chain_bridge::NonceSetter;
use tokio::sync::Mutex;

#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<String, Arc<Mutex<u64>>>>,
}

impl PendingNonceManager {
    fn slot(&self, address: &str) -> Arc<Mutex<u64>> {
        let key = address.to_lowercase();
        self.nonces
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone()
    }
}

#[async_trait]
impl NonceSetter for PendingNonceManager {
    async fn init_nonces(&self, nonces: HashMap<String, u64>) {
        for (address, nonce) in nonces {
            *self.slot(&address).lock().await = nonce;
        }
    }

    async fn next_nonce(&self, address: &str) -> u64 {
        let slot = self.slot(address);
        let mut nonce = slot.lock().await;
        let next = *nonce;
        *nonce += 1;
        next
    }

    async fn set_nonce(&self, address: &str, nonce: u64) {
        *self.slot(address).lock().await = nonce;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn next_nonce_increments_per_address() {
        let manager = PendingNonceManager::default();
        assert_eq!(manager.next_nonce("0xabc").await, 0);
        assert_eq!(manager.next_nonce("0xABC").await, 1);
        assert_eq!(manager.next_nonce("0xdef").await, 0);
    }

    #[tokio::test]
    async fn set_nonce_overrides_the_counter() {
        let manager = PendingNonceManager::default();
        manager.next_nonce("0xabc").await;
        manager.set_nonce("0xabc", 7).await;
        assert_eq!(manager.next_nonce("0xabc").await, 7);
        assert_eq!(manager.next_nonce("0xabc").await, 8);
    }

    #[tokio::test]
    async fn init_nonces_seeds_counters_from_store() {
        let manager = PendingNonceManager::default();
        let mut seed = HashMap::new();
        seed.insert("0xabc".to_string(), 42u64);
        manager.init_nonces(seed).await;
        assert_eq!(manager.next_nonce("0xabc").await, 42);
    }
}

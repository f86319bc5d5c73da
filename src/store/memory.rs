//! In-memory [`Store`] double for worker unit tests and `proptest` runs.
//! Mirrors `SledStore`'s semantics exactly; no persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::DashSet;

use super::{Direction, MAX_LIST_LIMIT, Store, nonce_key, r_value_key};
use crate::error::StoreError;
use crate::model::{Swap, SwapKey, SwapResult, SwapResultUpdate, TxType};
use crate::status::Status;

#[derive(Default)]
pub struct InMemoryStore {
    swaps: DashMap<String, Swap>,
    results: DashMap<String, SwapResult>,
    registered: DashSet<String>,
    p2sh: DashMap<String, String>,
    scan_heights: DashMap<&'static str, u64>,
    nonces: DashMap<String, u64>,
    used_r_values: DashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add_swap(&self, swap: Swap) -> Result<(), StoreError> {
        let canonical = swap.key.canonical();
        if self.swaps.contains_key(&canonical) {
            return Err(StoreError::Duplicate(swap.key));
        }
        self.swaps.insert(canonical, swap);
        Ok(())
    }

    async fn find_swap(&self, key: &SwapKey) -> Result<Option<Swap>, StoreError> {
        Ok(self.swaps.get(&key.canonical()).map(|e| e.value().clone()))
    }

    async fn find_swaps_with_status(
        &self,
        status: Status,
        tx_type: Option<TxType>,
        since_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Swap>, StoreError> {
        let cutoff_secs = since_ms.map(|ms| ms / 1000);
        let mut out: Vec<Swap> = self
            .swaps
            .iter()
            .map(|e| e.value().clone())
            .filter(|s| s.status == status)
            .filter(|s| tx_type.is_none_or(|t| t == s.tx_type))
            .filter(|s| cutoff_secs.is_none_or(|c| s.init_time.as_secs() >= c))
            .collect();
        out.sort_by_key(|s| s.init_time);
        out.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(out)
    }

    async fn update_swap_status(
        &self,
        key: &SwapKey,
        new_status: Status,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .swaps
            .get_mut(&key.canonical())
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if new_status == Status::TxNotStable && !entry.status.can_reverify() {
            return Err(StoreError::ReverifyGuardRejected);
        }
        entry.status = new_status;
        Ok(())
    }

    async fn seed_swap_result(&self, key: SwapKey, swap_type: TxType) -> Result<(), StoreError> {
        let canonical = key.canonical();
        if self.results.contains_key(&canonical) {
            return Err(StoreError::Duplicate(key));
        }
        self.results.insert(canonical, SwapResult::seed(key, swap_type));
        Ok(())
    }

    async fn find_swap_result(&self, key: &SwapKey) -> Result<Option<SwapResult>, StoreError> {
        Ok(self
            .results
            .get(&key.canonical())
            .map(|e| e.value().clone()))
    }

    async fn find_swap_results_with_status(
        &self,
        status: Status,
        since_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<SwapResult>, StoreError> {
        let cutoff_secs = since_ms.map(|ms| ms / 1000);
        let mut out: Vec<SwapResult> = self
            .results
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.status == status)
            .filter(|r| cutoff_secs.is_none_or(|c| r.init_time.as_secs() >= c))
            .collect();
        out.sort_by_key(|r| r.init_time);
        out.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(out)
    }

    async fn update_swap_result(
        &self,
        key: &SwapKey,
        update: SwapResultUpdate,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .results
            .get_mut(&key.canonical())
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if let Some(nonce) = update.swap_nonce {
            if entry.swap_nonce > 0 {
                return Err(StoreError::ForbidUpdateNonce);
            }
            entry.swap_nonce = nonce;
        }
        if let Some(tx) = update.swap_tx {
            if entry.swap_tx.is_some() && entry.status != Status::MatchTxEmpty {
                return Err(StoreError::ForbidUpdateSwapTx);
            }
            entry.swap_tx = Some(tx);
        }
        if let Some(height) = update.swap_height {
            entry.swap_height = height;
        }
        if let Some(time) = update.swap_time {
            entry.swap_time = Some(time);
        }
        if let Some(value) = update.swap_value {
            entry.swap_value = value;
        }
        if let Some(status) = update.status {
            entry.status = status;
        }
        if let Some(memo) = update.memo {
            entry.memo = memo;
        }
        Ok(())
    }

    async fn replace_swap_result(&self, key: &SwapKey, new_tx: String) -> Result<(), StoreError> {
        let mut entry = self
            .results
            .get_mut(&key.canonical())
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if let Some(old) = entry.swap_tx.replace(new_tx) {
            entry.old_swap_txs.push(old);
        }
        Ok(())
    }

    async fn clear_for_empty(&self, key: &SwapKey) -> Result<(), StoreError> {
        let mut entry = self
            .results
            .get_mut(&key.canonical())
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        entry.swap_tx = None;
        entry.old_swap_txs.clear();
        entry.swap_height = 0;
        entry.swap_time = None;
        entry.swap_nonce = 0;
        entry.status = Status::MatchTxEmpty;
        Ok(())
    }

    async fn is_registered(&self, address: &str) -> Result<bool, StoreError> {
        Ok(self.registered.contains(&address.to_lowercase()))
    }

    async fn register_address(&self, address: &str) -> Result<(), StoreError> {
        self.registered.insert(address.to_lowercase());
        Ok(())
    }

    async fn get_p2sh_address(&self, bind: &str) -> Result<Option<String>, StoreError> {
        Ok(self.p2sh.get(&bind.to_lowercase()).map(|e| e.value().clone()))
    }

    async fn set_p2sh_address(&self, bind: &str, p2sh_address: &str) -> Result<(), StoreError> {
        self.p2sh
            .insert(bind.to_lowercase(), p2sh_address.to_string());
        Ok(())
    }

    async fn get_latest_scan_height(&self, direction: Direction) -> Result<u64, StoreError> {
        Ok(self
            .scan_heights
            .get(direction.as_str())
            .map(|e| *e.value())
            .unwrap_or(0))
    }

    async fn set_latest_scan_height(
        &self,
        direction: Direction,
        height: u64,
    ) -> Result<(), StoreError> {
        let mut entry = self.scan_heights.entry(direction.as_str()).or_insert(0);
        if height > *entry {
            *entry = height;
        }
        Ok(())
    }

    async fn get_latest_swap_nonce(
        &self,
        address: &str,
        is_swapin: bool,
    ) -> Result<u64, StoreError> {
        Ok(self
            .nonces
            .get(&nonce_key(address, is_swapin))
            .map(|e| *e.value())
            .unwrap_or(0))
    }

    async fn set_latest_swap_nonce(
        &self,
        address: &str,
        is_swapin: bool,
        nonce: u64,
    ) -> Result<(), StoreError> {
        let mut entry = self.nonces.entry(nonce_key(address, is_swapin)).or_insert(0);
        if nonce > *entry {
            *entry = nonce;
        }
        Ok(())
    }

    async fn insert_used_r_value(&self, pubkey: &str, r: &str) -> Result<(), StoreError> {
        let key = r_value_key(pubkey, r);
        if !self.used_r_values.insert(key.clone()) {
            return Err(StoreError::UsedRValueDuplicate(key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sample_swap(txid: &str) -> Swap {
        let key = SwapKey::new(txid, "eth/usdc", "0xbind");
        Swap::new_pending(key, TxType::Swapin, "0xfrom", "0xto", Decimal::ONE, "memo").unwrap()
    }

    #[tokio::test]
    async fn add_swap_rejects_duplicate_key() {
        let store = InMemoryStore::new();
        store.add_swap(sample_swap("0xtx1")).await.unwrap();
        let err = store.add_swap(sample_swap("0xtx1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn reverify_guard_blocks_non_reverifiable_status() {
        let store = InMemoryStore::new();
        let swap = sample_swap("0xtx2");
        let key = swap.key.clone();
        store.add_swap(swap).await.unwrap();
        store
            .update_swap_status(&key, Status::TxProcessed)
            .await
            .unwrap();
        let err = store
            .update_swap_status(&key, Status::TxNotStable)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ReverifyGuardRejected));
    }

    #[tokio::test]
    async fn reverify_guard_allows_from_rpc_query_error() {
        let store = InMemoryStore::new();
        let swap = sample_swap("0xtx3");
        let key = swap.key.clone();
        store.add_swap(swap).await.unwrap();
        store
            .update_swap_status(&key, Status::RpcQueryError)
            .await
            .unwrap();
        store
            .update_swap_status(&key, Status::TxNotStable)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn nonce_is_immutable_once_set() {
        let store = InMemoryStore::new();
        let key = SwapKey::new("0xtx4", "eth/usdc", "0xbind");
        store.seed_swap_result(key.clone(), TxType::Swapin).await.unwrap();
        store
            .update_swap_result(
                &key,
                SwapResultUpdate {
                    swap_nonce: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = store
            .update_swap_result(
                &key,
                SwapResultUpdate {
                    swap_nonce: Some(8),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForbidUpdateNonce));
    }

    #[tokio::test]
    async fn replace_swap_result_preserves_history() {
        let store = InMemoryStore::new();
        let key = SwapKey::new("0xtx5", "eth/usdc", "0xbind");
        store.seed_swap_result(key.clone(), TxType::Swapin).await.unwrap();
        store.replace_swap_result(&key, "0xfirst".into()).await.unwrap();
        store.replace_swap_result(&key, "0xsecond".into()).await.unwrap();
        let result = store.find_swap_result(&key).await.unwrap().unwrap();
        assert_eq!(result.swap_tx.as_deref(), Some("0xsecond"));
        assert_eq!(result.old_swap_txs, vec!["0xfirst".to_string()]);
    }

    #[tokio::test]
    async fn used_r_value_is_exclusive() {
        let store = InMemoryStore::new();
        store.insert_used_r_value("pub1", "r1").await.unwrap();
        let err = store.insert_used_r_value("pub1", "r1").await.unwrap_err();
        assert!(matches!(err, StoreError::UsedRValueDuplicate(_)));
    }

    #[tokio::test]
    async fn scan_height_is_monotonic() {
        let store = InMemoryStore::new();
        store.set_latest_scan_height(Direction::Src, 100).await.unwrap();
        store.set_latest_scan_height(Direction::Src, 50).await.unwrap();
        assert_eq!(store.get_latest_scan_height(Direction::Src).await.unwrap(), 100);
    }
}

//! `sled`-backed [`Store`]: one tree per §6 collection, JSON-encoded values
//! keyed by the lower-cased composite strings the schema specifies.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Direction, MAX_LIST_LIMIT, Store, nonce_key, r_value_key};
use crate::error::StoreError;
use crate::model::{Swap, SwapKey, SwapResult, SwapResultUpdate, TxType};
use crate::status::Status;

pub struct SledStore {
    swaps: sled::Tree,
    results: sled::Tree,
    registered: sled::Tree,
    p2sh: sled::Tree,
    scan_heights: sled::Tree,
    nonces: sled::Tree,
    used_r_values: sled::Tree,
    /// Serializes read-modify-write cycles on `results`. `sled::Tree` gives
    /// per-key atomicity via `compare_and_swap`, but our update semantics
    /// (reject-if-already-set) read several fields at once, so we take this
    /// so we take a `Mutex` around the whole read-modify-write instead.
    result_lock: Mutex<()>,
    #[allow(dead_code)]
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(Box::new(e)))?;
        let open_tree = |name: &str| -> Result<sled::Tree, StoreError> {
            db.open_tree(name).map_err(|e| StoreError::Backend(Box::new(e)))
        };
        Ok(Self {
            swaps: open_tree("swap")?,
            results: open_tree("swapresult")?,
            registered: open_tree("registeredaddress")?,
            p2sh: open_tree("p2shaddress")?,
            scan_heights: open_tree("latestscaninfo")?,
            nonces: open_tree("latestswapnonce")?,
            used_r_values: open_tree("usedrvalue")?,
            result_lock: Mutex::new(()),
            db,
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        tree: &sled::Tree,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match tree.get(key.as_bytes()).map_err(|e| StoreError::Backend(Box::new(e)))? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Backend(Box::new(e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(
        tree: &sled::Tree,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Backend(Box::new(e)))?;
        tree.insert(key.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(())
    }
}

#[async_trait]
impl Store for SledStore {
    async fn add_swap(&self, swap: Swap) -> Result<(), StoreError> {
        let canonical = swap.key.canonical();
        if Self::get_json::<Swap>(&self.swaps, &canonical)?.is_some() {
            return Err(StoreError::Duplicate(swap.key));
        }
        Self::put_json(&self.swaps, &canonical, &swap)
    }

    async fn find_swap(&self, key: &SwapKey) -> Result<Option<Swap>, StoreError> {
        Self::get_json(&self.swaps, &key.canonical())
    }

    async fn find_swaps_with_status(
        &self,
        status: Status,
        tx_type: Option<TxType>,
        since_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Swap>, StoreError> {
        let cutoff_secs = since_ms.map(|ms| ms / 1000);
        let mut out = Vec::new();
        for entry in self.swaps.iter() {
            let (_, bytes) = entry.map_err(|e| StoreError::Backend(Box::new(e)))?;
            let swap: Swap =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(Box::new(e)))?;
            if swap.status == status
                && tx_type.is_none_or(|t| t == swap.tx_type)
                && cutoff_secs.is_none_or(|c| swap.init_time.as_secs() >= c)
            {
                out.push(swap);
            }
        }
        out.sort_by_key(|s| s.init_time);
        out.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(out)
    }

    async fn update_swap_status(
        &self,
        key: &SwapKey,
        new_status: Status,
    ) -> Result<(), StoreError> {
        let canonical = key.canonical();
        let mut swap = Self::get_json::<Swap>(&self.swaps, &canonical)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if new_status == Status::TxNotStable && !swap.status.can_reverify() {
            return Err(StoreError::ReverifyGuardRejected);
        }
        swap.status = new_status;
        Self::put_json(&self.swaps, &canonical, &swap)
    }

    async fn seed_swap_result(&self, key: SwapKey, swap_type: TxType) -> Result<(), StoreError> {
        let _guard = self.result_lock.lock().await;
        let canonical = key.canonical();
        if Self::get_json::<SwapResult>(&self.results, &canonical)?.is_some() {
            return Err(StoreError::Duplicate(key));
        }
        let result = SwapResult::seed(key, swap_type);
        Self::put_json(&self.results, &canonical, &result)
    }

    async fn find_swap_result(&self, key: &SwapKey) -> Result<Option<SwapResult>, StoreError> {
        Self::get_json(&self.results, &key.canonical())
    }

    async fn find_swap_results_with_status(
        &self,
        status: Status,
        since_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<SwapResult>, StoreError> {
        let cutoff_secs = since_ms.map(|ms| ms / 1000);
        let mut out = Vec::new();
        for entry in self.results.iter() {
            let (_, bytes) = entry.map_err(|e| StoreError::Backend(Box::new(e)))?;
            let result: SwapResult =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(Box::new(e)))?;
            if result.status == status
                && cutoff_secs.is_none_or(|c| result.init_time.as_secs() >= c)
            {
                out.push(result);
            }
        }
        out.sort_by_key(|r| r.init_time);
        out.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(out)
    }

    async fn update_swap_result(
        &self,
        key: &SwapKey,
        update: SwapResultUpdate,
    ) -> Result<(), StoreError> {
        let _guard = self.result_lock.lock().await;
        let canonical = key.canonical();
        let mut result = Self::get_json::<SwapResult>(&self.results, &canonical)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if let Some(nonce) = update.swap_nonce {
            if result.swap_nonce > 0 {
                return Err(StoreError::ForbidUpdateNonce);
            }
            result.swap_nonce = nonce;
        }
        if let Some(tx) = update.swap_tx {
            if result.swap_tx.is_some() && result.status != Status::MatchTxEmpty {
                return Err(StoreError::ForbidUpdateSwapTx);
            }
            result.swap_tx = Some(tx);
        }
        if let Some(height) = update.swap_height {
            result.swap_height = height;
        }
        if let Some(time) = update.swap_time {
            result.swap_time = Some(time);
        }
        if let Some(value) = update.swap_value {
            result.swap_value = value;
        }
        if let Some(status) = update.status {
            result.status = status;
        }
        if let Some(memo) = update.memo {
            result.memo = memo;
        }
        Self::put_json(&self.results, &canonical, &result)
    }

    async fn replace_swap_result(&self, key: &SwapKey, new_tx: String) -> Result<(), StoreError> {
        let _guard = self.result_lock.lock().await;
        let canonical = key.canonical();
        let mut result = Self::get_json::<SwapResult>(&self.results, &canonical)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if let Some(old) = result.swap_tx.replace(new_tx) {
            result.old_swap_txs.push(old);
        }
        Self::put_json(&self.results, &canonical, &result)
    }

    async fn clear_for_empty(&self, key: &SwapKey) -> Result<(), StoreError> {
        let _guard = self.result_lock.lock().await;
        let canonical = key.canonical();
        let mut result = Self::get_json::<SwapResult>(&self.results, &canonical)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        result.swap_tx = None;
        result.old_swap_txs.clear();
        result.swap_height = 0;
        result.swap_time = None;
        result.swap_nonce = 0;
        result.status = Status::MatchTxEmpty;
        Self::put_json(&self.results, &canonical, &result)
    }

    async fn is_registered(&self, address: &str) -> Result<bool, StoreError> {
        Ok(self
            .registered
            .contains_key(address.to_lowercase().as_bytes())
            .map_err(|e| StoreError::Backend(Box::new(e)))?)
    }

    async fn register_address(&self, address: &str) -> Result<(), StoreError> {
        self.registered
            .insert(address.to_lowercase().as_bytes(), &[1u8][..])
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(())
    }

    async fn get_p2sh_address(&self, bind: &str) -> Result<Option<String>, StoreError> {
        Self::get_json(&self.p2sh, &bind.to_lowercase())
    }

    async fn set_p2sh_address(&self, bind: &str, p2sh_address: &str) -> Result<(), StoreError> {
        Self::put_json(&self.p2sh, &bind.to_lowercase(), &p2sh_address.to_string())
    }

    async fn get_latest_scan_height(&self, direction: Direction) -> Result<u64, StoreError> {
        Ok(Self::get_json(&self.scan_heights, direction.as_str())?.unwrap_or(0))
    }

    async fn set_latest_scan_height(
        &self,
        direction: Direction,
        height: u64,
    ) -> Result<(), StoreError> {
        let current: u64 = Self::get_json(&self.scan_heights, direction.as_str())?.unwrap_or(0);
        if height > current {
            Self::put_json(&self.scan_heights, direction.as_str(), &height)?;
        }
        Ok(())
    }

    async fn get_latest_swap_nonce(
        &self,
        address: &str,
        is_swapin: bool,
    ) -> Result<u64, StoreError> {
        Ok(Self::get_json(&self.nonces, &nonce_key(address, is_swapin))?.unwrap_or(0))
    }

    async fn set_latest_swap_nonce(
        &self,
        address: &str,
        is_swapin: bool,
        nonce: u64,
    ) -> Result<(), StoreError> {
        let key = nonce_key(address, is_swapin);
        let current: u64 = Self::get_json(&self.nonces, &key)?.unwrap_or(0);
        if nonce > current {
            Self::put_json(&self.nonces, &key, &nonce)?;
        }
        Ok(())
    }

    async fn insert_used_r_value(&self, pubkey: &str, r: &str) -> Result<(), StoreError> {
        let key = r_value_key(pubkey, r);
        let now_ms = swapbridge_types::timestamp::UnixTimestamp::now();
        let inserted = self
            .used_r_values
            .compare_and_swap(
                key.as_bytes(),
                None as Option<&[u8]>,
                Some(
                    serde_json::to_vec(&now_ms)
                        .map_err(|e| StoreError::Backend(Box::new(e)))?,
                ),
            )
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        if inserted.is_err() {
            return Err(StoreError::UsedRValueDuplicate(key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn open_temp() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn sample_swap(txid: &str) -> Swap {
        let key = SwapKey::new(txid, "eth/usdc", "0xbind");
        Swap::new_pending(key, TxType::Swapin, "0xfrom", "0xto", Decimal::ONE, "memo").unwrap()
    }

    #[tokio::test]
    async fn add_swap_round_trips() {
        let (_dir, store) = open_temp();
        let swap = sample_swap("0xtx1");
        let key = swap.key.clone();
        store.add_swap(swap.clone()).await.unwrap();
        let found = store.find_swap(&key).await.unwrap().unwrap();
        assert_eq!(found, swap);
    }

    #[tokio::test]
    async fn used_r_value_is_exclusive_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.insert_used_r_value("pub1", "r1").await.unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        let err = store.insert_used_r_value("pub1", "r1").await.unwrap_err();
        assert!(matches!(err, StoreError::UsedRValueDuplicate(_)));
    }

    #[tokio::test]
    async fn scan_height_persists_and_is_monotonic() {
        let (_dir, store) = open_temp();
        store.set_latest_scan_height(Direction::Dst, 10).await.unwrap();
        store.set_latest_scan_height(Direction::Dst, 3).await.unwrap();
        assert_eq!(store.get_latest_scan_height(Direction::Dst).await.unwrap(), 10);
    }
}

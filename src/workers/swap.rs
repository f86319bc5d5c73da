//! For each eligible deposit: build, sign, persist, then broadcast, in that
//! fixed order, serialized per destination signer.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::chain_bridge::ChainBridge;
use crate::error::{BridgeError, ChainBridgeError};
use crate::history_ring::{HistoryEntry, SwapHistoryRing};
use crate::model::{BuildTxArgs, SwapKey, SwapResultUpdate, TxType};
use crate::status::Status;
use crate::store::Store;

use super::sleep_or_cancelled;

const CACHE_CAPACITY: usize = 1000;
const DISPATCH_CHANNEL_CAPACITY: usize = 10;
const DCRM_SIGN_RETRIES: u32 = 5;
const DCRM_SIGN_BACKOFF: Duration = Duration::from_secs(1);

/// A build request dispatched to the per-signer consumer task.
struct DispatchJob {
    key: SwapKey,
    args: BuildTxArgs,
}

/// Bounded FIFO cache of `"txid:bind:isSwapin"` keys, guarding against
/// re-dispatching a swap already dispatched or in flight.
struct DispatchCache {
    set: DashSet<String>,
    order: Mutex<VecDeque<String>>,
}

impl DispatchCache {
    fn new() -> Self {
        Self {
            set: DashSet::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.set.contains(key)
    }

    /// Inserts `key`, evicting the oldest entry past capacity. Returns
    /// `false` if `key` was already present (the caller's dedup signal).
    async fn insert(&self, key: String) -> bool {
        if !self.set.insert(key.clone()) {
            return false;
        }
        let mut order = self.order.lock().await;
        order.push_back(key);
        if order.len() > CACHE_CAPACITY {
            if let Some(oldest) = order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }

    fn remove(&self, key: &str) {
        self.set.remove(key);
    }
}

/// RAII guard for step 1 of `doSwap`: removes the dispatch-cache entry on
/// drop unless [`disarm`](Self::disarm) was called, so a failed attempt
/// doesn't permanently block a retry.
struct DeferredCacheRemoval<'a> {
    cache: &'a DispatchCache,
    key: String,
    armed: bool,
}

impl<'a> DeferredCacheRemoval<'a> {
    fn new(cache: &'a DispatchCache, key: String) -> Self {
        Self {
            cache,
            key,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DeferredCacheRemoval<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.remove(&self.key);
        }
    }
}

fn dispatch_key(txid: &str, bind: &str, is_swapin: bool) -> String {
    format!("{}:{}:{}", txid, bind, is_swapin).to_lowercase()
}

pub struct SwapWorker {
    store: Arc<dyn Store>,
    bridge: Arc<dyn ChainBridge>,
    history: Arc<SwapHistoryRing>,
    tx_type: TxType,
    poll_interval: Duration,
    max_do_swap_lifetime: Duration,
    cache: Arc<DispatchCache>,
    /// pair_id -> destination signer address, used to route dispatch.
    signer_for_pair: HashMap<String, String>,
    channels: Arc<DashMap<String, mpsc::Sender<DispatchJob>>>,
}

impl SwapWorker {
    pub fn new(
        store: Arc<dyn Store>,
        bridge: Arc<dyn ChainBridge>,
        tx_type: TxType,
        poll_interval: Duration,
        max_do_swap_lifetime: Duration,
        signer_for_pair: HashMap<String, String>,
    ) -> Self {
        Self {
            store,
            bridge,
            history: Arc::new(SwapHistoryRing::new(CACHE_CAPACITY)),
            tx_type,
            poll_interval,
            max_do_swap_lifetime,
            cache: Arc::new(DispatchCache::new()),
            signer_for_pair,
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Spawns one consumer task per distinct destination signer address,
    /// then runs the poll loop until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let mut addresses: Vec<&String> = self.signer_for_pair.values().collect();
        addresses.sort();
        addresses.dedup();
        for address in addresses {
            self.spawn_consumer(address.clone(), token.clone());
        }

        loop {
            if let Err(err) = self.tick().await {
                tracing::error!(%err, "swap tick failed");
            }
            if sleep_or_cancelled(self.poll_interval, &token).await {
                break;
            }
        }
    }

    fn spawn_consumer(&self, signer_address: String, token: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<DispatchJob>(DISPATCH_CHANNEL_CAPACITY);
        self.channels.insert(signer_address.clone(), tx);

        let store = self.store.clone();
        let bridge = self.bridge.clone();
        let history = self.history.clone();
        let cache = self.cache.clone();
        let tx_type = self.tx_type;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    job = rx.recv() => {
                        let Some(job) = job else { break };
                        if let Err(err) = do_swap(
                            &store, &bridge, &history, &cache, tx_type, job,
                        )
                        .await
                        {
                            tracing::warn!(%signer_address, %err, "do_swap failed");
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    async fn tick(&self) -> Result<(), BridgeError> {
        let now = swapbridge_types::timestamp::UnixTimestamp::now();
        let since_ms = now
            .as_secs()
            .saturating_sub(self.max_do_swap_lifetime.as_secs())
            .saturating_mul(1000);
        let candidates = self
            .store
            .find_swaps_with_status(
                Status::TxNotSwapped,
                Some(self.tx_type),
                Some(since_ms),
                crate::store::MAX_LIST_LIMIT,
            )
            .await?;
        for swap in candidates {
            if let Err(err) = self.process_swap(&swap).await {
                tracing::warn!(key = ?swap.key, %err, "process_swap failed");
            }
        }
        Ok(())
    }

    async fn process_swap(&self, swap: &crate::model::Swap) -> Result<(), BridgeError> {
        let is_swapin = swap.tx_type.is_swapin();
        let dedup_key = dispatch_key(&swap.key.txid, &swap.key.bind, is_swapin);
        if self.cache.contains(&dedup_key) {
            return Err(BridgeError::AlreadySwapped);
        }

        let result = match self.store.find_swap_result(&swap.key).await? {
            Some(result) => result,
            None => return Ok(()),
        };

        if pre_reswap_guard(&result) {
            self.store
                .update_swap_status(&swap.key, Status::TxProcessed)
                .await?;
            return Err(BridgeError::AlreadySwapped);
        }
        if let Some(entry) = self
            .history
            .find(&swap.key.txid, &swap.key.bind, is_swapin)
            .await
        {
            if let Some(hash) = &entry.tx_hash {
                if self
                    .bridge
                    .get_transaction(&crate::model::TxHash(hash.clone()))
                    .await
                    .is_ok()
                {
                    return Err(BridgeError::AlreadySwapped);
                }
            }
        }

        let reverified = self
            .bridge
            .verify_transaction(&swap.key.pair_id, &swap.key.txid, swap.tx_type)
            .await
            .map_err(BridgeError::from)?;
        if reverified.value != swap.value
            || !reverified.bind.eq_ignore_ascii_case(&swap.key.bind)
        {
            return Err(BridgeError::ChainBridge(ChainBridgeError::Incompatible));
        }

        match self.bridge.token_config(&swap.key.pair_id) {
            Some(config) if !config.get("disabled").and_then(|v| v.as_bool()).unwrap_or(false) => {}
            _ => return Ok(()),
        }

        let signer_address = self
            .signer_for_pair
            .get(&swap.key.pair_id)
            .ok_or_else(|| BridgeError::NoDispatchChannel(swap.key.pair_id.clone()))?;
        let channel = self
            .channels
            .get(signer_address)
            .ok_or_else(|| BridgeError::NoDispatchChannel(signer_address.clone()))?;
        let nonce = match self.bridge.as_nonce_setter() {
            Some(setter) => Some(setter.next_nonce(signer_address).await),
            None => None,
        };
        let args = BuildTxArgs {
            txid: swap.key.txid.clone(),
            pair_id: swap.key.pair_id.clone(),
            to: swap.key.bind.clone(),
            value: reverified.value,
            memo: swap.memo.clone(),
            swap_type: swap.tx_type,
            nonce,
        };
        channel
            .send(DispatchJob {
                key: swap.key.clone(),
                args,
            })
            .await
            .map_err(|_| BridgeError::NoDispatchChannel(signer_address.clone()))?;
        Ok(())
    }
}

/// §4.3.1: true if this result is already in flight (committed or
/// previously replaced).
fn pre_reswap_guard(result: &crate::model::SwapResult) -> bool {
    result.already_in_flight()
}

async fn do_swap(
    store: &Arc<dyn Store>,
    bridge: &Arc<dyn ChainBridge>,
    history: &Arc<SwapHistoryRing>,
    cache: &Arc<DispatchCache>,
    tx_type: TxType,
    job: DispatchJob,
) -> Result<(), BridgeError> {
    let is_swapin = tx_type.is_swapin();
    let dedup_key = dispatch_key(&job.key.txid, &job.key.bind, is_swapin);
    if !cache.insert(dedup_key.clone()).await {
        return Err(BridgeError::AlreadySwapped);
    }
    let mut guard = DeferredCacheRemoval::new(cache, dedup_key);

    let raw = bridge
        .build_raw_transaction(&job.args)
        .await
        .map_err(BridgeError::from)?;

    let (signed, tx_hash) = match bridge.sign_transaction(&raw, &job.key.pair_id).await {
        Ok(signed) => signed,
        Err(ChainBridgeError::Unsupported) => {
            sign_via_dcrm(bridge.as_ref(), &raw, &job.key.pair_id).await?
        }
        Err(err) => return Err(err.into()),
    };

    let result = store
        .find_swap_result(&job.key)
        .await?
        .ok_or_else(|| crate::error::StoreError::NotFound(job.key.clone()))?;
    if pre_reswap_guard(&result) {
        return Err(BridgeError::AlreadySwapped);
    }

    let _ = &result;
    let nonce = job.args.nonce.unwrap_or(0);
    history
        .push(HistoryEntry {
            txid: job.key.txid.clone(),
            bind: job.key.bind.clone(),
            is_swapin,
            value: job.args.value,
            tx_hash: Some(tx_hash.0.clone()),
            nonce,
            swap_type: tx_type,
        })
        .await;

    store
        .update_swap_result(
            &job.key,
            SwapResultUpdate {
                swap_tx: Some(tx_hash.0.clone()),
                swap_value: Some(job.args.value),
                swap_nonce: job.args.nonce,
                status: Some(Status::MatchTxNotStable),
                ..Default::default()
            },
        )
        .await?;
    store
        .update_swap_status(&job.key, Status::TxProcessed)
        .await?;

    let sent_hash = bridge.send_transaction(&signed).await.map_err(BridgeError::from)?;
    if sent_hash != tx_hash {
        store
            .replace_swap_result(&job.key, sent_hash.0.clone())
            .await?;
    }
    guard.disarm();
    Ok(())
}

async fn sign_via_dcrm(
    bridge: &dyn ChainBridge,
    raw: &crate::model::RawTx,
    pair_id: &str,
) -> Result<(crate::model::SignedTx, crate::model::TxHash), BridgeError> {
    let mut last_err = None;
    for attempt in 0..DCRM_SIGN_RETRIES {
        match bridge
            .dcrm_sign_transaction(raw, pair_id, &serde_json::Value::Null)
            .await
        {
            Ok(signed) => return Ok(signed),
            Err(err) => {
                tracing::warn!(%attempt, %err, "dcrm sign attempt failed");
                last_err = Some(err);
                tokio::time::sleep(DCRM_SIGN_BACKOFF).await;
            }
        }
    }
    Err(last_err.unwrap_or(ChainBridgeError::Unsupported).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_key_is_lowercase_and_stable() {
        assert_eq!(dispatch_key("0xABC", "0xBIND", true), "0xabc:0xbind:true");
    }

    #[tokio::test]
    async fn dispatch_cache_evicts_oldest_past_capacity() {
        let cache = DispatchCache::new();
        for i in 0..(CACHE_CAPACITY + 5) {
            cache.insert(format!("k{i}")).await;
        }
        assert!(!cache.contains("k0"));
        assert!(cache.contains(&format!("k{}", CACHE_CAPACITY + 4)));
    }

    #[tokio::test]
    async fn deferred_removal_fires_on_drop_unless_disarmed() {
        let cache = DispatchCache::new();
        cache.insert("k1".to_string()).await;
        {
            let _guard = DeferredCacheRemoval::new(&cache, "k1".to_string());
        }
        assert!(!cache.contains("k1"));

        cache.insert("k2".to_string()).await;
        {
            let mut guard = DeferredCacheRemoval::new(&cache, "k2".to_string());
            guard.disarm();
        }
        assert!(cache.contains("k2"));
    }

    #[test]
    fn pre_reswap_guard_trips_on_any_in_flight_marker() {
        let key = SwapKey::new("0xtx", "eth/usdc", "0xbind");
        let mut result = crate::model::SwapResult::seed(key, TxType::Swapin);
        assert!(!pre_reswap_guard(&result));
        result.swap_nonce = 1;
        assert!(pre_reswap_guard(&result));
    }
}

//! Re-reads pending deposits from the source chain and classifies them,
//! seeding the initial `SwapResult` for anything credit-worthy.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use rust_decimal::Decimal;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::chain_bridge::ChainBridge;
use crate::error::ChainBridgeError;
use crate::model::TxType;
use crate::status::Status;
use crate::store::Store;

use super::sleep_or_cancelled;

/// Polls Swaps in `TxNotStable` for a single direction (swapin or swapout,
/// per `tx_type`) and reclassifies them against the chain.
pub struct VerifyWorker {
    store: Arc<dyn Store>,
    bridge: Arc<dyn ChainBridge>,
    tx_type: TxType,
    poll_interval: Duration,
    max_verify_lifetime: Duration,
    big_value_threshold: Option<Decimal>,
    blacklist: Arc<DashSet<String>>,
    started: OnceCell<()>,
}

impl VerifyWorker {
    pub fn new(
        store: Arc<dyn Store>,
        bridge: Arc<dyn ChainBridge>,
        tx_type: TxType,
        poll_interval: Duration,
        max_verify_lifetime: Duration,
        big_value_threshold: Option<Decimal>,
        blacklist: Arc<DashSet<String>>,
    ) -> Self {
        Self {
            store,
            bridge,
            tx_type,
            poll_interval,
            max_verify_lifetime,
            big_value_threshold,
            blacklist,
            started: OnceCell::new(),
        }
    }

    /// Runs the poll loop until `token` is cancelled. Idempotent: a second
    /// call is a no-op, since a direction's VerifyWorker must start at most
    /// once.
    pub async fn run(&self, token: CancellationToken) {
        if self.started.set(()).is_err() {
            tracing::warn!(tx_type = ?self.tx_type, "VerifyWorker::run called more than once; ignoring");
            return;
        }
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!(tx_type = ?self.tx_type, %err, "verify tick failed");
            }
            if sleep_or_cancelled(self.poll_interval, &token).await {
                break;
            }
        }
    }

    async fn tick(&self) -> Result<(), crate::error::StoreError> {
        let now = swapbridge_types::timestamp::UnixTimestamp::now();
        let since_ms = now
            .as_secs()
            .saturating_sub(self.max_verify_lifetime.as_secs())
            .saturating_mul(1000);
        let candidates = self
            .store
            .find_swaps_with_status(
                Status::TxNotStable,
                Some(self.tx_type),
                Some(since_ms),
                crate::store::MAX_LIST_LIMIT,
            )
            .await?;
        for swap in candidates {
            if let Err(err) = self.verify_one(&swap.key, &swap).await {
                tracing::warn!(key = ?swap.key, %err, "verify_one failed");
            }
        }
        Ok(())
    }

    async fn verify_one(
        &self,
        key: &crate::model::SwapKey,
        swap: &crate::model::Swap,
    ) -> Result<(), crate::error::StoreError> {
        if self.blacklist.contains(&swap.from.to_lowercase())
            || self.blacklist.contains(&swap.key.bind.to_lowercase())
        {
            self.store
                .update_swap_status(key, Status::SwapInBlacklist)
                .await?;
            return Ok(());
        }

        match self
            .bridge
            .verify_transaction(&key.pair_id, &key.txid, self.tx_type)
            .await
        {
            Ok(info) => {
                let over_threshold = self
                    .big_value_threshold
                    .is_some_and(|threshold| info.value > threshold);
                let status = if over_threshold {
                    Status::TxWithBigValue
                } else {
                    Status::TxNotSwapped
                };
                self.store.update_swap_status(key, status).await?;
                if !over_threshold {
                    match self.store.seed_swap_result(key.clone(), self.tx_type).await {
                        Ok(()) | Err(crate::error::StoreError::Duplicate(_)) => {}
                        Err(err) => return Err(err),
                    }
                }
            }
            Err(ChainBridgeError::TxNotStable | ChainBridgeError::TxNotFound) => {}
            Err(err) => {
                let status = map_verify_error(&err);
                self.store.update_swap_status(key, status).await?;
            }
        }
        Ok(())
    }
}

fn map_verify_error(err: &ChainBridgeError) -> Status {
    match err {
        ChainBridgeError::WithWrongMemo => Status::TxWithWrongMemo,
        ChainBridgeError::BindAddrIsContract => Status::BindAddrIsContract,
        ChainBridgeError::WithWrongValue => Status::TxWithWrongValue,
        ChainBridgeError::SenderNotRegistered => Status::TxSenderNotRegistered,
        ChainBridgeError::WithWrongSender => Status::TxWithWrongSender,
        ChainBridgeError::Incompatible => Status::TxIncompatible,
        ChainBridgeError::RpcQueryError(_) => Status::RpcQueryError,
        ChainBridgeError::BeforeInitialHeight { .. } => Status::TxVerifyFailed,
        _ => Status::TxVerifyFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildTxArgs, RawTx, SignedTx, TxHash, TxMeta, TxSwapInfo};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBridge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainBridge for ScriptedBridge {
        async fn verify_transaction(
            &self,
            pair_id: &str,
            _txid: &str,
            _tx_type: TxType,
        ) -> Result<TxSwapInfo, ChainBridgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TxSwapInfo {
                pair_id: pair_id.to_string(),
                from: "0xfrom".into(),
                bind: "0xbind".into(),
                value: Decimal::ONE,
                height: 10,
                tx_to: "0xto".into(),
                memo: String::new(),
            })
        }
        async fn build_raw_transaction(
            &self,
            _args: &BuildTxArgs,
        ) -> Result<RawTx, ChainBridgeError> {
            unreachable!()
        }
        async fn sign_transaction(
            &self,
            _raw: &RawTx,
            _pair_id: &str,
        ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
            unreachable!()
        }
        async fn send_transaction(&self, _signed: &SignedTx) -> Result<TxHash, ChainBridgeError> {
            unreachable!()
        }
        async fn get_transaction(&self, _hash: &TxHash) -> Result<TxMeta, ChainBridgeError> {
            unreachable!()
        }
        fn required_confirmations(&self) -> u64 {
            1
        }
    }

    fn sample_swap(txid: &str) -> crate::model::Swap {
        let key = crate::model::SwapKey::new(txid, "eth/usdc", "0xbind");
        crate::model::Swap::new_pending(
            key,
            TxType::Swapin,
            "0xfrom",
            "0xto",
            Decimal::ONE,
            "memo",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn successful_verify_seeds_result_and_advances_status() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let bridge: Arc<dyn ChainBridge> = Arc::new(ScriptedBridge {
            calls: AtomicUsize::new(0),
        });
        let swap = sample_swap("0xtx1");
        let key = swap.key.clone();
        store.add_swap(swap).await.unwrap();

        let worker = VerifyWorker::new(
            store.clone(),
            bridge,
            TxType::Swapin,
            Duration::from_secs(1),
            Duration::from_secs(3600),
            None,
            Arc::new(DashSet::new()),
        );
        worker.tick().await.unwrap();

        let updated = store.find_swap(&key).await.unwrap().unwrap();
        assert_eq!(updated.status, Status::TxNotSwapped);
        let result = store.find_swap_result(&key).await.unwrap().unwrap();
        assert_eq!(result.status, Status::MatchTxEmpty);
    }

    #[tokio::test]
    async fn blacklisted_sender_is_rejected_without_calling_bridge() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(ScriptedBridge {
            calls: AtomicUsize::new(0),
        });
        let swap = sample_swap("0xtx2");
        let key = swap.key.clone();
        store.add_swap(swap).await.unwrap();

        let blacklist = Arc::new(DashSet::new());
        blacklist.insert("0xfrom".to_string());
        let worker = VerifyWorker::new(
            store.clone(),
            bridge.clone(),
            TxType::Swapin,
            Duration::from_secs(1),
            Duration::from_secs(3600),
            None,
            blacklist,
        );
        worker.tick().await.unwrap();

        let updated = store.find_swap(&key).await.unwrap().unwrap();
        assert_eq!(updated.status, Status::SwapInBlacklist);
        assert_eq!(bridge.calls.load(Ordering::SeqCst), 0);
    }
}

//! Waits for destination confirmations and transitions `SwapResult` to a
//! terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chain_bridge::ChainBridge;
use crate::error::ChainBridgeError;
use crate::model::{SwapResultUpdate, TxHash};
use crate::status::Status;
use crate::store::Store;

use super::sleep_or_cancelled;

/// How long a result may sit in `MatchTxNotStable` with its tx unfindable
/// before StableWorker gives up and marks it `MatchTxEmpty` for replacement.
const NOT_FOUND_GRACE: Duration = Duration::from_secs(600);

pub struct StableWorker {
    store: Arc<dyn Store>,
    bridge: Arc<dyn ChainBridge>,
    poll_interval: Duration,
}

impl StableWorker {
    pub fn new(store: Arc<dyn Store>, bridge: Arc<dyn ChainBridge>, poll_interval: Duration) -> Self {
        Self {
            store,
            bridge,
            poll_interval,
        }
    }

    pub async fn run(&self, token: CancellationToken) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!(%err, "stable tick failed");
            }
            if sleep_or_cancelled(self.poll_interval, &token).await {
                break;
            }
        }
    }

    async fn tick(&self) -> Result<(), crate::error::StoreError> {
        let candidates = self
            .store
            .find_swap_results_with_status(Status::MatchTxNotStable, None, crate::store::MAX_LIST_LIMIT)
            .await?;
        for result in candidates {
            let Some(tx) = result.swap_tx.clone() else {
                continue;
            };
            match self.bridge.get_transaction(&TxHash(tx)).await {
                Ok(meta) if meta.reverted => {
                    self.store
                        .update_swap_result(
                            &result.key,
                            SwapResultUpdate {
                                status: Some(Status::MatchTxFailed),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                Ok(meta) if meta.confirmations >= self.bridge.required_confirmations() => {
                    self.store
                        .update_swap_result(
                            &result.key,
                            SwapResultUpdate {
                                swap_height: Some(meta.height),
                                swap_time: Some(swapbridge_types::timestamp::UnixTimestamp::now()),
                                status: Some(Status::MatchTxStable),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                Ok(_) => {
                    // Seen but not yet confirmed enough; leave in place for next tick.
                }
                Err(ChainBridgeError::TxNotFound) => {
                    let age = result
                        .swap_time
                        .map(|t| {
                            swapbridge_types::timestamp::UnixTimestamp::now()
                                .as_secs()
                                .saturating_sub(t.as_secs())
                        })
                        .unwrap_or(0);
                    if age > NOT_FOUND_GRACE.as_secs() {
                        self.store.clear_for_empty(&result.key).await?;
                    }
                }
                Err(err) => {
                    tracing::warn!(key = ?result.key, %err, "get_transaction failed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildTxArgs, RawTx, SignedTx, TxMeta, TxSwapInfo, TxType};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct StubBridge {
        confirmations: u64,
    }

    #[async_trait]
    impl ChainBridge for StubBridge {
        async fn verify_transaction(
            &self,
            _pair_id: &str,
            _txid: &str,
            _tx_type: TxType,
        ) -> Result<TxSwapInfo, ChainBridgeError> {
            unreachable!()
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
        async fn get_transaction(&self, hash: &TxHash) -> Result<TxMeta, ChainBridgeError> {
            Ok(TxMeta {
                hash: hash.clone(),
                height: 100,
                confirmations: self.confirmations,
                reverted: false,
            })
        }
        fn required_confirmations(&self) -> u64 {
            6
        }
    }

    struct NotFoundBridge;

    #[async_trait]
    impl ChainBridge for NotFoundBridge {
        async fn verify_transaction(
            &self,
            _pair_id: &str,
            _txid: &str,
            _tx_type: TxType,
        ) -> Result<TxSwapInfo, ChainBridgeError> {
            unreachable!()
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
            Err(ChainBridgeError::TxNotFound)
        }
        fn required_confirmations(&self) -> u64 {
            6
        }
    }

    #[tokio::test]
    async fn result_transitions_to_stable_once_confirmations_reached() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let bridge: Arc<dyn ChainBridge> = Arc::new(StubBridge { confirmations: 6 });
        let key = crate::model::SwapKey::new("0xtx", "eth/usdc", "0xbind");
        store
            .seed_swap_result(key.clone(), TxType::Swapin)
            .await
            .unwrap();
        store
            .update_swap_result(
                &key,
                SwapResultUpdate {
                    swap_tx: Some("0xhash".into()),
                    status: Some(Status::MatchTxNotStable),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let worker = StableWorker::new(store.clone(), bridge, Duration::from_secs(1));
        worker.tick().await.unwrap();

        let result = store.find_swap_result(&key).await.unwrap().unwrap();
        assert_eq!(result.status, Status::MatchTxStable);
        assert!(result.swap_height > 0);
    }

    #[tokio::test]
    async fn not_found_past_grace_clears_all_swap_fields() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let bridge: Arc<dyn ChainBridge> = Arc::new(NotFoundBridge);
        let key = crate::model::SwapKey::new("0xtx", "eth/usdc", "0xbind");
        store
            .seed_swap_result(key.clone(), TxType::Swapin)
            .await
            .unwrap();
        let stale_time = swapbridge_types::timestamp::UnixTimestamp::now().as_secs()
            - NOT_FOUND_GRACE.as_secs()
            - 1;
        store
            .update_swap_result(
                &key,
                SwapResultUpdate {
                    swap_tx: Some("0xhash".into()),
                    swap_height: Some(42),
                    swap_time: Some(swapbridge_types::timestamp::UnixTimestamp::from_secs(
                        stale_time,
                    )),
                    swap_nonce: Some(3),
                    status: Some(Status::MatchTxNotStable),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let worker = StableWorker::new(store.clone(), bridge, Duration::from_secs(1));
        worker.tick().await.unwrap();

        let result = store.find_swap_result(&key).await.unwrap().unwrap();
        assert_eq!(result.status, Status::MatchTxEmpty);
        assert!(result.swap_tx.is_none());
        assert!(result.old_swap_txs.is_empty());
        assert_eq!(result.swap_height, 0);
        assert!(result.swap_time.is_none());
        assert_eq!(result.swap_nonce, 0);
    }
}

//! Re-signs and rebroadcasts stuck destination transactions at the same
//! nonce, relying on the nonce invariant to guarantee at most one broadcast
//! in the replacement set can ever confirm.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chain_bridge::ChainBridge;
use crate::error::{BridgeError, ChainBridgeError};
use crate::model::BuildTxArgs;
use crate::status::Status;
use crate::store::Store;

use super::sleep_or_cancelled;

const MAX_CANDIDATES: usize = 20;

pub struct ReplaceWorker {
    store: Arc<dyn Store>,
    bridge: Arc<dyn ChainBridge>,
    poll_interval: Duration,
    ageing_threshold: Duration,
}

impl ReplaceWorker {
    pub fn new(
        store: Arc<dyn Store>,
        bridge: Arc<dyn ChainBridge>,
        poll_interval: Duration,
        ageing_threshold: Duration,
    ) -> Self {
        Self {
            store,
            bridge,
            poll_interval,
            ageing_threshold,
        }
    }

    pub async fn run(&self, token: CancellationToken) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!(%err, "replace tick failed");
            }
            if sleep_or_cancelled(self.poll_interval, &token).await {
                break;
            }
        }
    }

    async fn tick(&self) -> Result<(), BridgeError> {
        let mut candidates: Vec<_> = self
            .store
            .find_swap_results_with_status(Status::MatchTxEmpty, None, crate::store::MAX_LIST_LIMIT)
            .await?
            .into_iter()
            .filter(|r| r.swap_height == 0 && r.swap_nonce > 0)
            .collect();
        candidates.sort_by_key(|r| r.swap_nonce);
        candidates.truncate(MAX_CANDIDATES);

        let now = swapbridge_types::timestamp::UnixTimestamp::now();
        for result in candidates {
            let age = result
                .swap_time
                .map(|t| now.as_secs().saturating_sub(t.as_secs()))
                .unwrap_or(u64::MAX);
            if age < self.ageing_threshold.as_secs() {
                continue;
            }
            if let Err(err) = self.replace_one(&result).await {
                tracing::warn!(key = ?result.key, %err, "replace_one failed");
            }
        }
        Ok(())
    }

    async fn replace_one(&self, result: &crate::model::SwapResult) -> Result<(), BridgeError> {
        let args = BuildTxArgs {
            txid: result.key.txid.clone(),
            pair_id: result.key.pair_id.clone(),
            to: result.key.bind.clone(),
            value: result.swap_value,
            memo: result.memo.clone(),
            swap_type: result.swap_type,
            nonce: Some(result.swap_nonce),
        };
        let raw = self
            .bridge
            .build_raw_transaction(&args)
            .await
            .map_err(BridgeError::from)?;
        let (signed, tx_hash) = match self.bridge.sign_transaction(&raw, &result.key.pair_id).await {
            Ok(signed) => signed,
            Err(ChainBridgeError::Unsupported) => {
                self.bridge
                    .dcrm_sign_transaction(&raw, &result.key.pair_id, &serde_json::Value::Null)
                    .await
                    .map_err(BridgeError::from)?
            }
            Err(err) => return Err(err.into()),
        };
        self.store
            .replace_swap_result(&result.key, tx_hash.0.clone())
            .await?;
        let sent_hash = self
            .bridge
            .send_transaction(&signed)
            .await
            .map_err(BridgeError::from)?;
        if sent_hash != tx_hash {
            self.store
                .replace_swap_result(&result.key, sent_hash.0)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_ordered_by_nonce() {
        let mut nonces = vec![5u64, 1, 3];
        nonces.sort();
        assert_eq!(nonces, vec![1, 3, 5]);
    }
}

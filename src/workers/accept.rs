//! Responds to inbound DCRM sign requests from peers: reverifies the source
//! transaction locally and votes `AGREE`/`DISAGREE`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chain_bridge::ChainBridge;
use crate::dcrm::{DcrmClient, InboundSignRequest};
use crate::model::SwapKey;
use crate::store::Store;

use super::sleep_or_cancelled;

pub struct AcceptWorker {
    store: Arc<dyn Store>,
    bridge: Arc<dyn ChainBridge>,
    dcrm: Arc<dyn DcrmClient>,
    poll_interval: Duration,
}

impl AcceptWorker {
    pub fn new(
        store: Arc<dyn Store>,
        bridge: Arc<dyn ChainBridge>,
        dcrm: Arc<dyn DcrmClient>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            bridge,
            dcrm,
            poll_interval,
        }
    }

    pub async fn run(&self, token: CancellationToken) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!(%err, "accept tick failed");
            }
            if sleep_or_cancelled(self.poll_interval, &token).await {
                break;
            }
        }
    }

    async fn tick(&self) -> Result<(), crate::error::DcrmError> {
        let requests = self.dcrm.poll_inbound_requests().await?;
        for request in requests {
            let agree = self.should_agree(&request).await;
            if let Err(err) = self
                .dcrm
                .accept_sign(
                    &request.key_id,
                    agree,
                    &request.msg_hash,
                    &request.msg_context,
                )
                .await
            {
                tracing::warn!(key_id = %request.key_id, %err, "accept_sign failed");
            }
        }
        Ok(())
    }

    /// Reconstructs the swap this request is voting to sign for and
    /// reverifies it against the local Store + ChainBridge. `msg_context`
    /// carries the swap's composite key, one component per entry, in
    /// `(txid, pair_id, bind)` order — the same convention the dispatching
    /// node uses when it posts a sign request.
    async fn should_agree(&self, request: &InboundSignRequest) -> bool {
        let Some((txid, pair_id, bind)) = parse_context(&request.msg_context) else {
            return false;
        };
        let key = SwapKey::new(txid, pair_id, bind);
        let Ok(Some(swap)) = self.store.find_swap(&key).await else {
            return false;
        };
        let Ok(Some(result)) = self.store.find_swap_result(&key).await else {
            return false;
        };
        if result.already_in_flight() {
            return false;
        }
        match self
            .bridge
            .verify_transaction(&key.pair_id, &key.txid, swap.tx_type)
            .await
        {
            Ok(info) => info.value == swap.value && info.bind.eq_ignore_ascii_case(&swap.key.bind),
            Err(_) => false,
        }
    }
}

fn parse_context(msg_context: &[String]) -> Option<(&str, &str, &str)> {
    match msg_context {
        [txid, pair_id, bind] => Some((txid.as_str(), pair_id.as_str(), bind.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_context_requires_exactly_three_fields() {
        assert!(parse_context(&["a".into(), "b".into(), "c".into()]).is_some());
        assert!(parse_context(&["a".into(), "b".into()]).is_none());
    }
}

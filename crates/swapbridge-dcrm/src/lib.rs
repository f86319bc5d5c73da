//! `reqwest`-based JSON-RPC client for the remote DCRM/MPC threshold
//! signer, implementing `swapbridge_core::DcrmClient`.
//!
//! The DCRM wire payload (`{TxType, Key, Accept, MsgHash, MsgContext,
//! TimeStamp}`) is itself wrapped as a canonical signed raw transaction
//! before being posted — the remote node authenticates the caller by that
//! signature, not by transport-level auth. Envelope signing reuses `alloy`
//! primitives, the same stack the EVM chain adapter already depends on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::Signature;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use swapbridge_core::dcrm::{DcrmClient, GroupMember, InboundSignRequest, SignRequest, SignStatus};
use swapbridge_core::error::DcrmError;

/// The envelope's own nonce field is unrelated to any destination-chain
/// nonce; the original protocol fixes it at zero for every accept/sign call.
const ENVELOPE_NONCE: u64 = 0;

#[derive(Debug, Clone, Serialize)]
struct AcceptData<'a> {
    #[serde(rename = "TxType")]
    tx_type: &'static str,
    #[serde(rename = "Key")]
    key: &'a str,
    #[serde(rename = "Accept")]
    accept: &'static str,
    #[serde(rename = "MsgHash")]
    msg_hash: &'a [String],
    #[serde(rename = "MsgContext")]
    msg_context: &'a [String],
    #[serde(rename = "TimeStamp")]
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

fn now_ms() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}

/// Builds the canonical signed raw transaction wrapping `payload`, the way
/// `BuildDcrmRawTx` does in the original: an envelope nonce (always zero)
/// plus an opaque payload, signed with the node's own identity key.
async fn build_signed_envelope(
    signer: &PrivateKeySigner,
    payload: &[u8],
) -> Result<Vec<u8>, DcrmError> {
    let mut message = Vec::with_capacity(8 + payload.len());
    message.extend_from_slice(&ENVELOPE_NONCE.to_be_bytes());
    message.extend_from_slice(payload);
    let signature: Signature = signer
        .sign_message(&message)
        .await
        .map_err(|e| DcrmError::Malformed(e.to_string()))?;
    let mut envelope = message;
    envelope.extend_from_slice(&signature.as_bytes());
    Ok(envelope)
}

pub struct DcrmRpcClient {
    http: reqwest::Client,
    endpoint: Url,
    signer: PrivateKeySigner,
    next_id: AtomicU64,
}

impl DcrmRpcClient {
    pub fn new(endpoint: Url, signer: PrivateKeySigner) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            signer,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, DcrmError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| DcrmError::Transport(Box::new(e)))?
            .json::<JsonRpcResponse<T>>()
            .await
            .map_err(|e| DcrmError::Transport(Box::new(e)))?;
        if let Some(error) = response.error {
            return Err(DcrmError::Malformed(error.message));
        }
        response
            .result
            .ok_or_else(|| DcrmError::Malformed(format!("{method}: empty result")))
    }
}

#[async_trait]
impl DcrmClient for DcrmRpcClient {
    async fn get_enode(&self) -> Result<String, DcrmError> {
        self.call("dcrm_getEnode", json!([])).await
    }

    async fn get_enode_by_url(&self, url: &str) -> Result<String, DcrmError> {
        self.call("dcrm_getEnodeByUrl", json!([url])).await
    }

    async fn get_group_by_id(&self, group_id: &str) -> Result<Vec<GroupMember>, DcrmError> {
        self.call("dcrm_getGroupByID", json!([group_id])).await
    }

    async fn do_sign(&self, request: &SignRequest) -> Result<String, DcrmError> {
        let payload = json!({
            "TxType": "SIGN",
            "KeyID": request.key_id,
            "PubKey": request.pubkey,
            "MsgHash": request.msg_hash,
            "MsgContext": request.msg_context,
            "GroupID": request.group_id,
            "ThresHold": request.threshold,
            "Mode": request.mode,
            "TimeStamp": now_ms(),
        });
        let payload_bytes =
            serde_json::to_vec(&payload).map_err(|e| DcrmError::Malformed(e.to_string()))?;
        let raw_tx = build_signed_envelope(&self.signer, &payload_bytes).await?;
        self.call("dcrm_sign", json!([hex::encode(raw_tx)])).await
    }

    async fn get_sign_status(&self, key_id: &str) -> Result<SignStatus, DcrmError> {
        let raw: serde_json::Value = self.call("dcrm_getSignStatus", json!([key_id])).await?;
        let status = raw
            .get("Status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DcrmError::Malformed("missing Status field".into()))?;
        match status {
            "Success" => {
                let signatures = raw
                    .get("Rsv")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| DcrmError::Malformed("missing Rsv field".into()))?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Ok(SignStatus::Success(signatures))
            }
            "Failure" => Ok(SignStatus::Failure(
                raw.get("Error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("sign session failed")
                    .to_string(),
            )),
            "Timeout" => Ok(SignStatus::Timeout),
            _ => Ok(SignStatus::Pending),
        }
    }

    async fn accept_sign(
        &self,
        key_id: &str,
        agree: bool,
        msg_hash: &[String],
        msg_context: &[String],
    ) -> Result<(), DcrmError> {
        let data = AcceptData {
            tx_type: "ACCEPTSIGN",
            key: key_id,
            accept: if agree { "AGREE" } else { "DISAGREE" },
            msg_hash,
            msg_context,
            timestamp: now_ms(),
        };
        let payload = serde_json::to_vec(&data).map_err(|e| DcrmError::Malformed(e.to_string()))?;
        let raw_tx = build_signed_envelope(&self.signer, &payload).await?;
        let _: String = self
            .call("dcrm_acceptSign", json!([hex::encode(raw_tx)]))
            .await?;
        Ok(())
    }

    async fn poll_inbound_requests(&self) -> Result<Vec<InboundSignRequest>, DcrmError> {
        let raw: Vec<serde_json::Value> =
            self.call("dcrm_getCurNodeSignInfo", json!([])).await?;
        let mut requests = Vec::with_capacity(raw.len());
        for item in raw {
            let key_id = item
                .get("Key")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DcrmError::Malformed("missing Key field".into()))?
                .to_string();
            let msg_hash = item
                .get("MsgHash")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let msg_context = item
                .get("MsgContext")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            requests.push(InboundSignRequest {
                key_id,
                msg_hash,
                msg_context,
            });
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn envelope_carries_the_fixed_zero_nonce() {
        let signer = PrivateKeySigner::random();
        let envelope = build_signed_envelope(&signer, b"payload").await.unwrap();
        assert_eq!(&envelope[0..8], &0u64.to_be_bytes());
        assert_eq!(&envelope[8..15], b"payload");
    }
}

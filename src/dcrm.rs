//! The core's sole point of contact with the remote threshold-signature
//! (DCRM/MPC) signer: the `DcrmClient` contract. The concrete JSON-RPC
//! implementation lives in `swapbridge-dcrm`, grounded on this trait the
//! same way a `swapbridge-chain-*` crate grounds on `ChainBridge`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DcrmError;

/// One threshold-group member, as returned by `get_group_by_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub enode: String,
    pub pubkey: String,
}

/// A sign session's terminal or transient outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum SignStatus {
    Pending,
    /// One `r||s||v` hex signature per requested message hash.
    Success(Vec<String>),
    Failure(String),
    Timeout,
}

/// Arguments to `do_sign`, mirroring the DCRM wire payload of §6.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub key_id: String,
    pub pubkey: String,
    pub msg_hash: Vec<String>,
    pub msg_context: Vec<String>,
    pub group_id: String,
    pub threshold: String,
    pub mode: u32,
}

/// An inbound peer sign-request this node must vote on, surfaced by
/// `poll_inbound_requests` for the AcceptWorker.
#[derive(Debug, Clone)]
pub struct InboundSignRequest {
    pub key_id: String,
    pub msg_hash: Vec<String>,
    pub msg_context: Vec<String>,
}

#[async_trait]
pub trait DcrmClient: Send + Sync {
    async fn get_enode(&self) -> Result<String, DcrmError>;

    async fn get_enode_by_url(&self, url: &str) -> Result<String, DcrmError>;

    async fn get_group_by_id(&self, group_id: &str) -> Result<Vec<GroupMember>, DcrmError>;

    /// Posts a sign request. Returns the `key_id` used to poll for status.
    async fn do_sign(&self, request: &SignRequest) -> Result<String, DcrmError>;

    /// Polls a previously submitted session. Callers loop this with bounded
    /// exponential backoff until a terminal variant.
    async fn get_sign_status(&self, key_id: &str) -> Result<SignStatus, DcrmError>;

    /// Votes on an inbound peer sign-request. `agree = false` records a
    /// `DISAGREE`.
    async fn accept_sign(
        &self,
        key_id: &str,
        agree: bool,
        msg_hash: &[String],
        msg_context: &[String],
    ) -> Result<(), DcrmError>;

    /// Drains any inbound peer sign-requests addressed to this node since the
    /// last call. The AcceptWorker polling loop is the sole consumer.
    async fn poll_inbound_requests(&self) -> Result<Vec<InboundSignRequest>, DcrmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_status_success_carries_one_signature_per_hash() {
        let status = SignStatus::Success(vec!["r||s||v".to_string()]);
        match status {
            SignStatus::Success(sigs) => assert_eq!(sigs.len(), 1),
            _ => panic!("expected Success"),
        }
    }
}

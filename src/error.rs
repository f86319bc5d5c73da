//! Error taxonomy, composed at the worker boundary out of the store,
//! chain-bridge, and dcrm error types each module defines on its own.

use crate::model::SwapKey;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("swap key has an empty component: {0:?}")]
    WrongKey(SwapKey),
    #[error("duplicate record for key {0:?}")]
    Duplicate(SwapKey),
    #[error("no record found for key {0:?}")]
    NotFound(SwapKey),
    #[error("update_status to NotStable refused: current status does not permit reverify")]
    ReverifyGuardRejected,
    #[error("update_swap_result refused: swap_nonce is already set and cannot be overwritten")]
    ForbidUpdateNonce,
    #[error("update_swap_result refused: swap_tx is already set; use replace_swap_result instead")]
    ForbidUpdateSwapTx,
    #[error("(pubkey, R) pair already used: {0}")]
    UsedRValueDuplicate(String),
    #[error("storage backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
pub enum ChainBridgeError {
    #[error("source transaction not yet stable")]
    TxNotStable,
    #[error("source transaction not found")]
    TxNotFound,
    #[error("transaction memo does not match the expected bind address")]
    WithWrongMemo,
    #[error("bind address is a contract, refusing to credit it directly")]
    BindAddrIsContract,
    #[error("transaction value does not match the expected amount")]
    WithWrongValue,
    #[error("sender address is not registered for bridging")]
    SenderNotRegistered,
    #[error("transaction sender does not match the expected sender")]
    WithWrongSender,
    #[error("transaction is incompatible with this pair's expectations")]
    Incompatible,
    #[error("height {height} is before the configured initial scan height {initial}")]
    BeforeInitialHeight { height: u64, initial: u64 },
    #[error("source or destination RPC query failed")]
    RpcQueryError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("verification failed")]
    VerifyFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("no configuration found for pair {0}")]
    UnknownPair(String),
    #[error("operation is not supported by this chain adapter")]
    Unsupported,
    #[error("transaction build failed: {0}")]
    BuildFailed(String),
    #[error("transaction signing failed: {0}")]
    SignFailed(String),
    #[error("transaction broadcast failed: {0}")]
    SendFailed(String),
}

impl ChainBridgeError {
    /// Whether a later reverify of the same source transaction might succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChainBridgeError::TxNotStable
                | ChainBridgeError::TxNotFound
                | ChainBridgeError::RpcQueryError(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DcrmError {
    #[error("dcrm sign session timed out")]
    Timeout,
    #[error("dcrm sign session failed: {0}")]
    SignFailed(String),
    #[error("the returned R value has already been used")]
    ItemIsDup,
    #[error("transport error talking to the dcrm node")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("malformed dcrm response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("source or destination token for pair {0} is unknown or disabled")]
    TokenDisabled(String),
    #[error(transparent)]
    ChainBridge(#[from] ChainBridgeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Composed error returned at worker boundaries.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    ChainBridge(#[from] ChainBridgeError),
    #[error(transparent)]
    Dcrm(#[from] DcrmError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("swap already in flight or already settled")]
    AlreadySwapped,
    #[error("no dispatch channel configured for signer address {0}")]
    NoDispatchChannel(String),
    #[error("sender or bind address is blacklisted")]
    Blacklisted,
}

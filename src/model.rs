//! Swap and settlement records persisted by the [`crate::store::Store`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use swapbridge_types::timestamp::UnixTimestamp;

use crate::status::Status;

/// Direction of a swap relative to this node's pair configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    Swapin,
    Swapout,
    P2shSwapin,
}

impl TxType {
    pub fn is_swapin(self) -> bool {
        matches!(self, TxType::Swapin | TxType::P2shSwapin)
    }
}

/// The composite identity of a swap: `(TxID, PairID, Bind)`.
///
/// `Bind` is the user-declared destination-chain recipient. The canonical
/// storage key is `lower("{txid}:{pair_id}:{bind}")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapKey {
    pub txid: String,
    pub pair_id: String,
    pub bind: String,
}

impl SwapKey {
    pub fn new(
        txid: impl Into<String>,
        pair_id: impl Into<String>,
        bind: impl Into<String>,
    ) -> Self {
        Self {
            txid: txid.into(),
            pair_id: pair_id.into(),
            bind: bind.into(),
        }
    }

    /// The lower-cased `txid:pairid:bind` string used as the sled/dashmap key.
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.txid, self.pair_id, self.bind).to_lowercase()
    }
}

/// An incoming deposit as seen on the source chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap {
    pub key: SwapKey,
    pub tx_type: TxType,
    pub from: String,
    pub tx_to: String,
    pub value: Decimal,
    pub status: Status,
    pub timestamp: UnixTimestamp,
    pub memo: String,
    pub init_time: UnixTimestamp,
}

impl Swap {
    /// Constructs a new `Swap` in its initial `TxNotStable` status, as the
    /// scanner would insert it.
    pub fn new_pending(
        key: SwapKey,
        tx_type: TxType,
        from: impl Into<String>,
        tx_to: impl Into<String>,
        value: Decimal,
        memo: impl Into<String>,
    ) -> Result<Self, WrongKeyError> {
        if key.txid.is_empty() || key.pair_id.is_empty() || key.bind.is_empty() {
            return Err(WrongKeyError(key));
        }
        let now = UnixTimestamp::now();
        Ok(Self {
            key: SwapKey {
                pair_id: key.pair_id.to_lowercase(),
                ..key
            },
            tx_type,
            from: from.into(),
            tx_to: tx_to.into(),
            value,
            status: Status::TxNotStable,
            timestamp: now,
            memo: memo.into(),
            init_time: now,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("swap key has an empty component: {0:?}")]
pub struct WrongKeyError(pub SwapKey);

/// The outbound settlement record for a [`Swap`], one per swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
    pub key: SwapKey,
    /// Most recently broadcast destination-chain transaction hash.
    pub swap_tx: Option<String>,
    /// Hashes superseded by `swap_tx` during replacement, oldest first.
    pub old_swap_txs: Vec<String>,
    pub swap_height: u64,
    pub swap_time: Option<UnixTimestamp>,
    pub swap_value: Decimal,
    pub swap_type: TxType,
    /// Destination-chain nonce claimed for this settlement. Zero means unclaimed.
    pub swap_nonce: u64,
    pub status: Status,
    pub memo: String,
    /// When this result was seeded; used to bound and sort list queries.
    pub init_time: UnixTimestamp,
}

impl SwapResult {
    /// Seeds an empty result as the VerifyWorker would upon accepting a swap.
    pub fn seed(key: SwapKey, swap_type: TxType) -> Self {
        Self {
            key,
            swap_tx: None,
            old_swap_txs: Vec::new(),
            swap_height: 0,
            swap_time: None,
            swap_value: Decimal::ZERO,
            swap_type,
            swap_nonce: 0,
            status: Status::MatchTxEmpty,
            memo: String::new(),
            init_time: UnixTimestamp::now(),
        }
    }

    /// True if this record already has a claimed nonce, broadcast hash, or
    /// recorded height — i.e. some prior attempt has already committed.
    pub fn already_in_flight(&self) -> bool {
        self.swap_nonce > 0
            || self.swap_tx.is_some()
            || self.swap_height != 0
            || !self.old_swap_txs.is_empty()
    }
}

/// Optional field set applied by `Store::update_swap_result`.
#[derive(Debug, Clone, Default)]
pub struct SwapResultUpdate {
    pub swap_tx: Option<String>,
    pub swap_height: Option<u64>,
    pub swap_time: Option<UnixTimestamp>,
    pub swap_value: Option<Decimal>,
    pub swap_nonce: Option<u64>,
    pub status: Option<Status>,
    pub memo: Option<String>,
}

/// The chain-adapter's verdict on a source transaction, as returned by
/// `ChainBridge::verify_transaction`.
#[derive(Debug, Clone, PartialEq)]
pub struct TxSwapInfo {
    pub pair_id: String,
    pub from: String,
    pub bind: String,
    pub value: Decimal,
    pub height: u64,
    pub tx_to: String,
    pub memo: String,
}

/// Arguments to `ChainBridge::build_raw_transaction`.
#[derive(Debug, Clone)]
pub struct BuildTxArgs {
    /// Source-chain txid of the swap this settlement pays out, threaded into
    /// the unsigned tx so adapters can emit a stable `(txid, pair_id, bind)`
    /// DCRM sign-request context.
    pub txid: String,
    pub pair_id: String,
    pub to: String,
    pub value: Decimal,
    pub memo: String,
    pub swap_type: TxType,
    /// Destination-chain nonce to build with, pre-allocated by the caller
    /// via `NonceSetter::next_nonce` for adapters that expose it. `None` for
    /// adapters with no nonce concept (UTXO chains).
    pub nonce: Option<u64>,
}

/// An unsigned, chain-specific transaction, opaque to the core.
#[derive(Debug, Clone)]
pub struct RawTx(pub Vec<u8>);

/// A signed, chain-specific transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTx(pub Vec<u8>);

/// A chain-agnostic transaction hash, rendered as the chain's native hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `ChainBridge::get_transaction` reports about a previously broadcast tx.
#[derive(Debug, Clone)]
pub struct TxMeta {
    pub hash: TxHash,
    pub height: u64,
    pub confirmations: u64,
    pub reverted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_key_canonical_is_lowercase() {
        let key = SwapKey::new("0xABC", "ETH/USDC", "0xDEF");
        assert_eq!(key.canonical(), "0xabc:eth/usdc:0xdef");
    }

    #[test]
    fn new_pending_rejects_empty_components() {
        let key = SwapKey::new("", "eth/usdc", "0xdef");
        let result = Swap::new_pending(key, TxType::Swapin, "0xfrom", "0xto", Decimal::ONE, "");
        assert!(result.is_err());
    }

    #[test]
    fn new_pending_lowercases_pair_id() {
        let key = SwapKey::new("0xabc", "ETH/USDC", "0xdef");
        let swap =
            Swap::new_pending(key, TxType::Swapin, "0xfrom", "0xto", Decimal::ONE, "").unwrap();
        assert_eq!(swap.key.pair_id, "eth/usdc");
        assert_eq!(swap.status, Status::TxNotStable);
    }

    #[test]
    fn seeded_result_is_not_in_flight() {
        let key = SwapKey::new("0xabc", "eth/usdc", "0xdef");
        let result = SwapResult::seed(key, TxType::Swapin);
        assert!(!result.already_in_flight());
        assert_eq!(result.status, Status::MatchTxEmpty);
    }
}

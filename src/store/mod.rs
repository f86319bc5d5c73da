//! Persistent swap state: the `Store` trait and its two implementations,
//! [`sled_store::SledStore`] (production) and [`memory::InMemoryStore`]
//! (tests). One logical collection per §6's schema, one sled tree each.

mod memory;
mod sled_store;

pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Swap, SwapKey, SwapResult, SwapResultUpdate, TxType};
use crate::status::Status;

/// Hard ceiling on rows a single list query may return, regardless of the
/// `limit` a caller asks for.
pub const MAX_LIST_LIMIT: usize = 5000;

/// Which side of a pair a scan-height or nonce record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Src,
    Dst,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Src => "src",
            Direction::Dst => "dst",
        }
    }
}

/// Persistent state shared by every worker. Implementations must guarantee
/// that `update_swap_result` enforces the `SwapResult` invariants from §3
/// (nonce and swap_tx are append-only) rather than leaving that to callers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a freshly scanned deposit. Returns `StoreError::Duplicate` if
    /// its key already exists.
    async fn add_swap(&self, swap: Swap) -> Result<(), StoreError>;

    async fn find_swap(&self, key: &SwapKey) -> Result<Option<Swap>, StoreError>;

    /// Lists swaps in `status`, optionally narrowed to `tx_type`. Used by
    /// VerifyWorker's poll loop. Results are sorted by `init_time` ascending.
    /// `since_ms` (milliseconds, if set) excludes rows older than the cutoff;
    /// `limit` is clamped to `MAX_LIST_LIMIT`.
    async fn find_swaps_with_status(
        &self,
        status: Status,
        tx_type: Option<TxType>,
        since_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Swap>, StoreError>;

    /// Transitions a swap's status. Moving back to `TxNotStable` (a
    /// reverify) is only permitted when the current status
    /// `Status::can_reverify()`; violating this returns
    /// `StoreError::ReverifyGuardRejected` rather than silently applying it.
    async fn update_swap_status(&self, key: &SwapKey, new_status: Status) -> Result<(), StoreError>;

    /// Seeds the `MatchTxEmpty` result for a swap VerifyWorker has accepted.
    /// Returns `StoreError::Duplicate` if a result already exists for `key`.
    async fn seed_swap_result(&self, key: SwapKey, swap_type: TxType) -> Result<(), StoreError>;

    async fn find_swap_result(&self, key: &SwapKey) -> Result<Option<SwapResult>, StoreError>;

    /// Sorted by `init_time` ascending, bounded as in `find_swaps_with_status`.
    async fn find_swap_results_with_status(
        &self,
        status: Status,
        since_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<SwapResult>, StoreError>;

    /// Applies `update` in place. Rejects clobbering an already-set
    /// `swap_nonce` (`ForbidUpdateNonce`) or an already-set `swap_tx`
    /// (`ForbidUpdateSwapTx` — use `replace_swap_result` instead).
    async fn update_swap_result(
        &self,
        key: &SwapKey,
        update: SwapResultUpdate,
    ) -> Result<(), StoreError>;

    /// Supersedes the current `swap_tx` with `new_tx`, moving the old one
    /// into `old_swap_txs`. Used by ReplaceWorker; the nonce is unchanged.
    async fn replace_swap_result(&self, key: &SwapKey, new_tx: String) -> Result<(), StoreError>;

    /// Atomically clears `swap_tx`, `old_swap_txs`, `swap_height`,
    /// `swap_time` and `swap_nonce` and sets `status = MatchTxEmpty`. The
    /// only path permitted to clear those fields once set; StableWorker uses
    /// this instead of `update_swap_result` when a swap tx never confirms.
    async fn clear_for_empty(&self, key: &SwapKey) -> Result<(), StoreError>;

    async fn is_registered(&self, address: &str) -> Result<bool, StoreError>;

    async fn register_address(&self, address: &str) -> Result<(), StoreError>;

    async fn get_p2sh_address(&self, bind: &str) -> Result<Option<String>, StoreError>;

    async fn set_p2sh_address(&self, bind: &str, p2sh_address: &str) -> Result<(), StoreError>;

    async fn get_latest_scan_height(&self, direction: Direction) -> Result<u64, StoreError>;

    /// Monotonic: rejects (silently a no-op, not an error) attempts to set a
    /// height lower than the current one.
    async fn set_latest_scan_height(
        &self,
        direction: Direction,
        height: u64,
    ) -> Result<(), StoreError>;

    async fn get_latest_swap_nonce(
        &self,
        address: &str,
        is_swapin: bool,
    ) -> Result<u64, StoreError>;

    /// Monotonic, like `set_latest_scan_height`.
    async fn set_latest_swap_nonce(
        &self,
        address: &str,
        is_swapin: bool,
        nonce: u64,
    ) -> Result<(), StoreError>;

    /// Inserts the `(pubkey, R)` exclusion record for a fresh DCRM signature.
    /// Returns `StoreError::UsedRValueDuplicate` if this pair was already
    /// recorded — the at-most-once settlement primitive.
    async fn insert_used_r_value(&self, pubkey: &str, r: &str) -> Result<(), StoreError>;
}

/// `lower("address:isSwapin")`, the `latestswapnonce` composite key from §6.
fn nonce_key(address: &str, is_swapin: bool) -> String {
    format!("{}:{}", address, is_swapin).to_lowercase()
}

/// `lower("R:pubkey")`, the `usedrvalue` unique key from §6.
fn r_value_key(pubkey: &str, r: &str) -> String {
    format!("{}:{}", r, pubkey).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_key_is_lowercase_and_stable() {
        assert_eq!(nonce_key("0xABC", true), "0xabc:true");
        assert_eq!(nonce_key("0xabc", false), "0xabc:false");
    }

    #[test]
    fn r_value_key_orders_r_before_pubkey() {
        assert_eq!(r_value_key("PUB", "R1"), "r1:pub");
    }
}

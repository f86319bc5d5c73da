//! In-process swap history ring: SwapWorker's secondary dedup signal,
//! separate from the Store. Capacity-bounded, newest entry at the head.

use tokio::sync::RwLock;

use crate::model::TxType;

/// One settlement SwapWorker observed, or attempted and found ineffective.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub txid: String,
    pub bind: String,
    pub is_swapin: bool,
    pub value: rust_decimal::Decimal,
    /// Cleared to `None` to mark an entry observed-but-ineffective (failed
    /// or empty) rather than evicted outright — `SwapWorker`'s pre-reswap
    /// guard treats the two differently.
    pub tx_hash: Option<String>,
    pub nonce: u64,
    pub swap_type: TxType,
}

/// `Vec`-backed ring, `RwLock`-guarded per §5. Fixed capacity; inserting past
/// capacity evicts the oldest (tail) entry.
pub struct SwapHistoryRing {
    capacity: usize,
    entries: RwLock<Vec<HistoryEntry>>,
}

impl SwapHistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Pushes `entry` to the head, evicting the tail if at capacity.
    pub async fn push(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.insert(0, entry);
        if entries.len() > self.capacity {
            entries.pop();
        }
    }

    /// Finds the most recent entry for `(txid, bind, is_swapin)`, if any.
    pub async fn find(&self, txid: &str, bind: &str, is_swapin: bool) -> Option<HistoryEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| {
                e.txid.eq_ignore_ascii_case(txid)
                    && e.bind.eq_ignore_ascii_case(bind)
                    && e.is_swapin == is_swapin
            })
            .cloned()
    }

    /// Clears the `tx_hash` of the matching entry in place, marking it
    /// observed-but-ineffective without removing it from the ring.
    pub async fn mark_ineffective(&self, txid: &str, bind: &str, is_swapin: bool) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| {
            e.txid.eq_ignore_ascii_case(txid)
                && e.bind.eq_ignore_ascii_case(bind)
                && e.is_swapin == is_swapin
        }) {
            entry.tx_hash = None;
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entry(txid: &str) -> HistoryEntry {
        HistoryEntry {
            txid: txid.to_string(),
            bind: "0xbind".to_string(),
            is_swapin: true,
            value: Decimal::ONE,
            tx_hash: Some("0xhash".to_string()),
            nonce: 1,
            swap_type: TxType::Swapin,
        }
    }

    #[tokio::test]
    async fn newest_entry_is_found_first_on_duplicate_key() {
        let ring = SwapHistoryRing::new(4);
        ring.push(entry("0xtx1")).await;
        let mut second = entry("0xtx1");
        second.nonce = 2;
        ring.push(second).await;
        let found = ring.find("0xtx1", "0xbind", true).await.unwrap();
        assert_eq!(found.nonce, 2);
    }

    #[tokio::test]
    async fn eviction_drops_oldest_past_capacity() {
        let ring = SwapHistoryRing::new(2);
        ring.push(entry("0xa")).await;
        ring.push(entry("0xb")).await;
        ring.push(entry("0xc")).await;
        assert_eq!(ring.len().await, 2);
        assert!(ring.find("0xa", "0xbind", true).await.is_none());
        assert!(ring.find("0xc", "0xbind", true).await.is_some());
    }

    #[tokio::test]
    async fn mark_ineffective_clears_hash_without_removing_entry() {
        let ring = SwapHistoryRing::new(4);
        ring.push(entry("0xtx1")).await;
        ring.mark_ineffective("0xtx1", "0xbind", true).await;
        let found = ring.find("0xtx1", "0xbind", true).await.unwrap();
        assert!(found.tx_hash.is_none());
    }
}

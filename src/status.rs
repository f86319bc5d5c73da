//! Status taxonomy shared by `Swap` and `SwapResult` records.
//!
//! Values are fixed and form the Store's public schema — do not reorder.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`crate::model::Swap`] or [`crate::model::SwapResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    TxNotStable = 0,
    TxNotSwapped,
    TxProcessed,
    MatchTxNotStable,
    MatchTxStable,
    TxWithWrongMemo,
    TxWithBigValue,
    BindAddrIsContract,
    TxWithWrongValue,
    TxSenderNotRegistered,
    TxWithWrongSender,
    TxIncompatible,
    SwapInBlacklist,
    TxVerifyFailed,
    MatchTxFailed,
    MatchTxEmpty,
    RpcQueryError,
}

impl Status {
    /// Whether a row in this status may be reverified, i.e. transitioned back
    /// to `TxNotStable` by `Store::update_status`.
    pub fn can_reverify(self) -> bool {
        matches!(self, Status::RpcQueryError | Status::TxVerifyFailed)
    }

    /// Whether a row in this status may be retried without reverification
    /// (transient outcomes that a later poll is expected to resolve).
    pub fn can_retry(self) -> bool {
        matches!(
            self,
            Status::TxNotStable | Status::RpcQueryError | Status::MatchTxEmpty
        )
    }

    /// Whether this status is terminal for a `Swap` record (no further
    /// worker will act on it).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::TxProcessed
                | Status::MatchTxStable
                | Status::TxWithWrongMemo
                | Status::BindAddrIsContract
                | Status::TxWithWrongValue
                | Status::TxSenderNotRegistered
                | Status::TxWithWrongSender
                | Status::TxIncompatible
                | Status::SwapInBlacklist
                | Status::MatchTxFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverify_guard_membership() {
        assert!(Status::RpcQueryError.can_reverify());
        assert!(Status::TxVerifyFailed.can_reverify());
        assert!(!Status::TxProcessed.can_reverify());
        assert!(!Status::MatchTxStable.can_reverify());
    }

    #[test]
    fn retry_membership() {
        assert!(Status::TxNotStable.can_retry());
        assert!(Status::MatchTxEmpty.can_retry());
        assert!(!Status::TxWithBigValue.can_retry());
    }

    #[test]
    fn terminal_statuses_are_not_retryable_or_reverifiable() {
        for s in [
            Status::TxProcessed,
            Status::MatchTxStable,
            Status::SwapInBlacklist,
            Status::MatchTxFailed,
        ] {
            assert!(s.is_terminal());
            assert!(!s.can_retry());
            assert!(!s.can_reverify());
        }
    }
}

//! The core's sole point of contact with a blockchain: the `ChainBridge`
//! adapter contract, with a supertrait-on-`Arc<T>` blanket impl so a
//! trait object can be cloned and shared across worker tasks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChainBridgeError;
use crate::model::{BuildTxArgs, RawTx, SignedTx, TxHash, TxMeta, TxSwapInfo, TxType};

/// Per-chain adapter contract. The engine never imports a chain-specific
/// crate directly; it only ever holds a `dyn ChainBridge` (or, in the
/// concrete adapter crates, a type implementing it).
#[async_trait]
pub trait ChainBridge: Send + Sync {
    /// Re-reads a source transaction and classifies it for the VerifyWorker.
    /// `tx_type` distinguishes the plain-swapin path from the BTC P2SH
    /// variant, which the adapter may resolve differently.
    async fn verify_transaction(
        &self,
        pair_id: &str,
        txid: &str,
        tx_type: TxType,
    ) -> Result<TxSwapInfo, ChainBridgeError>;

    /// Builds an unsigned transaction for the given args. May consult an
    /// in-memory nonce allocator and assign a fresh nonce as a side effect.
    async fn build_raw_transaction(&self, args: &BuildTxArgs) -> Result<RawTx, ChainBridgeError>;

    /// Signs `raw` with a locally configured key for `pair_id`, if one
    /// exists. Returns `Unsupported` when this pair has no local key and the
    /// caller should fall back to `dcrm_sign_transaction`.
    async fn sign_transaction(
        &self,
        raw: &RawTx,
        pair_id: &str,
    ) -> Result<(SignedTx, TxHash), ChainBridgeError>;

    /// Signs `raw` via the adapter's configured DCRM group instead of a local
    /// key. `extra` carries whatever chain-specific context the adapter needs
    /// to build the DCRM message (sighash components, output script, etc) —
    /// the SwapWorker passes through whatever the adapter itself produced
    /// from `build_raw_transaction`. Returns `Unsupported` for adapters with
    /// no DCRM group configured.
    async fn dcrm_sign_transaction(
        &self,
        raw: &RawTx,
        pair_id: &str,
        extra: &serde_json::Value,
    ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
        let _ = (raw, pair_id, extra);
        Err(ChainBridgeError::Unsupported)
    }

    /// Broadcasts `signed` and returns the hash the network accepted. This
    /// MAY differ from the hash produced at sign time (fee bumping,
    /// malleability) — callers must compare and reconcile.
    async fn send_transaction(&self, signed: &SignedTx) -> Result<TxHash, ChainBridgeError>;

    /// Queries a previously broadcast transaction's on-chain status.
    /// Returns `ChainBridgeError::TxNotFound` if it hasn't landed yet —
    /// callers distinguish that from a hard failure.
    async fn get_transaction(&self, hash: &TxHash) -> Result<TxMeta, ChainBridgeError>;

    /// Confirmations required before a `TxMeta` is considered stable.
    fn required_confirmations(&self) -> u64;

    /// This adapter's chain-level configuration, opaque to the core. Used
    /// only for diagnostics and config-reload comparisons.
    fn chain_config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// This adapter's configuration for a given pair, if it recognizes it.
    fn token_config(&self, pair_id: &str) -> Option<serde_json::Value> {
        let _ = pair_id;
        None
    }

    /// Returns this adapter's [`NonceSetter`] capability, if it has one.
    /// Account-based chains (EVM) implement it; UTXO chains (BTC) don't and
    /// keep the default `None`.
    fn as_nonce_setter(&self) -> Option<&dyn NonceSetter> {
        None
    }

    /// Returns this adapter's [`P2shRegistrar`] capability, if it has one.
    /// Only adapters whose swapin path is P2SH-deposit-based (BTC) implement
    /// it; account-based chains keep the default `None`.
    fn as_p2sh_registrar(&self) -> Option<&dyn P2shRegistrar> {
        None
    }
}

#[async_trait]
impl<T: ChainBridge + ?Sized> ChainBridge for Arc<T> {
    async fn verify_transaction(
        &self,
        pair_id: &str,
        txid: &str,
        tx_type: TxType,
    ) -> Result<TxSwapInfo, ChainBridgeError> {
        (**self).verify_transaction(pair_id, txid, tx_type).await
    }

    async fn build_raw_transaction(&self, args: &BuildTxArgs) -> Result<RawTx, ChainBridgeError> {
        (**self).build_raw_transaction(args).await
    }

    async fn sign_transaction(
        &self,
        raw: &RawTx,
        pair_id: &str,
    ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
        (**self).sign_transaction(raw, pair_id).await
    }

    async fn dcrm_sign_transaction(
        &self,
        raw: &RawTx,
        pair_id: &str,
        extra: &serde_json::Value,
    ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
        (**self).dcrm_sign_transaction(raw, pair_id, extra).await
    }

    async fn send_transaction(&self, signed: &SignedTx) -> Result<TxHash, ChainBridgeError> {
        (**self).send_transaction(signed).await
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<TxMeta, ChainBridgeError> {
        (**self).get_transaction(hash).await
    }

    fn required_confirmations(&self) -> u64 {
        (**self).required_confirmations()
    }

    fn chain_config(&self) -> serde_json::Value {
        (**self).chain_config()
    }

    fn token_config(&self, pair_id: &str) -> Option<serde_json::Value> {
        (**self).token_config(pair_id)
    }

    fn as_nonce_setter(&self) -> Option<&dyn NonceSetter> {
        (**self).as_nonce_setter()
    }

    fn as_p2sh_registrar(&self) -> Option<&dyn P2shRegistrar> {
        (**self).as_p2sh_registrar()
    }
}

/// Optional capability for adapters whose destination chain needs local
/// nonce bookkeeping (account-based chains; UTXO chains typically don't
/// implement this).
#[async_trait]
pub trait NonceSetter: Send + Sync {
    /// Seeds the in-memory nonce counters at startup from the Store's
    /// `LatestSwapNonce` records.
    async fn init_nonces(&self, nonces: HashMap<String, u64>);

    /// Returns the nonce to use for the next transaction from `address`,
    /// without persisting it — the caller commits it via the Store once the
    /// build succeeds.
    async fn next_nonce(&self, address: &str) -> u64;

    /// Force-sets the nonce counter for `address`, used by ReplaceWorker to
    /// reuse an already-claimed nonce.
    async fn set_nonce(&self, address: &str, nonce: u64);
}

/// Optional capability for UTXO-style adapters whose swapin path is a
/// per-bind P2SH deposit address rather than a shared account address.
/// `derive_p2sh_address` is a pure function of `(pair_id, bind)`: calling it
/// twice for the same bind returns the same address, so the caller (the
/// out-of-scope scanner, or a registration step ahead of it) can call it
/// idempotently and persist the result via `Store::set_p2sh_address`. The
/// adapter also remembers the mapping itself, since `verify_transaction`
/// needs to recognize which of a P2SH transaction's outputs is a deposit
/// without the Store in hand.
pub trait P2shRegistrar: Send + Sync {
    fn derive_p2sh_address(&self, pair_id: &str, bind: &str) -> Result<String, ChainBridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildTxArgs, RawTx, SignedTx, TxHash, TxMeta, TxSwapInfo, TxType};
    use rust_decimal::Decimal;

    struct StubBridge;

    #[async_trait]
    impl ChainBridge for StubBridge {
        async fn verify_transaction(
            &self,
            pair_id: &str,
            _txid: &str,
            _tx_type: TxType,
        ) -> Result<TxSwapInfo, ChainBridgeError> {
            Ok(TxSwapInfo {
                pair_id: pair_id.to_string(),
                from: "0xfrom".into(),
                bind: "0xbind".into(),
                value: Decimal::ONE,
                height: 1,
                tx_to: "0xto".into(),
                memo: String::new(),
            })
        }

        async fn build_raw_transaction(
            &self,
            _args: &BuildTxArgs,
        ) -> Result<RawTx, ChainBridgeError> {
            Ok(RawTx(vec![]))
        }

        async fn sign_transaction(
            &self,
            _raw: &RawTx,
            _pair_id: &str,
        ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
            Ok((SignedTx(vec![]), TxHash("0xhash".into())))
        }

        async fn send_transaction(&self, _signed: &SignedTx) -> Result<TxHash, ChainBridgeError> {
            Ok(TxHash("0xhash".into()))
        }

        async fn get_transaction(&self, hash: &TxHash) -> Result<TxMeta, ChainBridgeError> {
            Ok(TxMeta {
                hash: hash.clone(),
                height: 1,
                confirmations: 1,
                reverted: false,
            })
        }

        fn required_confirmations(&self) -> u64 {
            1
        }
    }

    #[tokio::test]
    async fn arc_wrapped_bridge_forwards_calls() {
        let bridge: Arc<dyn ChainBridge> = Arc::new(StubBridge);
        let info = bridge
            .verify_transaction("eth/usdc", "0xtx", TxType::Swapin)
            .await
            .unwrap();
        assert_eq!(info.pair_id, "eth/usdc");
        assert_eq!(bridge.required_confirmations(), 1);
    }
}

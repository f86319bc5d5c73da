//! `ChainBridge` implementation for EVM-compatible chains.
//!
//! Handles a single chain's native asset plus, per configured pair, a single
//! ERC-20 contract. Transactions are built as an opaque intermediate form
//! (`RawTx`), signed either locally or via the adapter's configured DCRM
//! group, and broadcast through an `alloy` provider with automatic RPC
//! fallback across the configured endpoints.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::{Decodable2718, Encodable2718};
use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, B256, Bytes, Signature, TxKind, U256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;

use swapbridge_core::chain_bridge::{ChainBridge, NonceSetter};
use swapbridge_core::dcrm::{DcrmClient, SignRequest, SignStatus};
use swapbridge_core::error::ChainBridgeError;
use swapbridge_core::model::{BuildTxArgs, RawTx, SignedTx, TxHash, TxMeta, TxSwapInfo, TxType};
use swapbridge_core::store::Store;
use swapbridge_types::chain::ChainId;
use swapbridge_types::config::RpcConfig;

use crate::chain::config::{Eip155ChainConfig, Eip155PairConfig};
use crate::chain::erc20::IERC20;
use crate::chain::pending_nonce_manager::PendingNonceManager;
use crate::chain::types::Eip155ChainReference;

const DCRM_POLL_ATTEMPTS: u32 = 30;
const DCRM_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Wraps a plain message as a boxed `std::error::Error` for the error
/// variants that carry one instead of a bare string.
fn boxed_err(msg: impl Into<String>) -> Box<dyn std::error::Error + Send + Sync> {
    msg.into().into()
}

/// Errors constructing an [`EvmChainBridge`] from configuration.
#[derive(Debug, thiserror::Error)]
pub enum EvmBridgeConfigError {
    #[error("at least one signer must be configured")]
    NoSigners,
    #[error("invalid signer private key: {0}")]
    InvalidSigner(String),
    #[error("no stateless RPC transport configured")]
    NoTransports,
}

/// An unsigned EVM transaction, opaque to the core, encoded field-by-field so
/// it round-trips through [`RawTx`] without requiring `alloy`'s own
/// (feature-gated) `serde` support.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvmUnsignedTx {
    chain_id: u64,
    nonce: u64,
    from: String,
    to: String,
    value: String,
    input: String,
    gas_limit: u64,
    eip1559: bool,
    max_fee_per_gas: String,
    max_priority_fee_per_gas: String,
    gas_price: String,
    /// Source-chain txid this settlement pays out, carried through so the
    /// DCRM sign-request context can name `(txid, pair_id, bind)`.
    txid: String,
    bind: String,
}

impl EvmUnsignedTx {
    fn to_address(&self) -> Result<Address, ChainBridgeError> {
        Address::from_str(&self.to).map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))
    }

    fn value_u256(&self) -> Result<U256, ChainBridgeError> {
        U256::from_str(&self.value).map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))
    }

    fn input_bytes(&self) -> Result<Bytes, ChainBridgeError> {
        hex::decode(self.input.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))
    }

    fn from_address(&self) -> Result<Address, ChainBridgeError> {
        Address::from_str(&self.from).map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))
    }

    /// Builds the signable (unsigned) typed transaction and its signing hash.
    fn signable(&self) -> Result<(SignableTx, B256), ChainBridgeError> {
        let to = TxKind::Call(self.to_address()?);
        let value = self.value_u256()?;
        let input = self.input_bytes()?;
        if self.eip1559 {
            let tx = TxEip1559 {
                chain_id: self.chain_id,
                nonce: self.nonce,
                gas_limit: self.gas_limit,
                max_fee_per_gas: u128::from_str(&self.max_fee_per_gas)
                    .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?,
                max_priority_fee_per_gas: u128::from_str(&self.max_priority_fee_per_gas)
                    .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?,
                to,
                value,
                access_list: Default::default(),
                input,
            };
            let hash = tx.signature_hash();
            Ok((SignableTx::Eip1559(tx), hash))
        } else {
            let tx = TxLegacy {
                chain_id: Some(self.chain_id),
                nonce: self.nonce,
                gas_price: u128::from_str(&self.gas_price)
                    .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?,
                gas_limit: self.gas_limit,
                to,
                value,
                input,
            };
            let hash = tx.signature_hash();
            Ok((SignableTx::Legacy(tx), hash))
        }
    }
}

enum SignableTx {
    Legacy(TxLegacy),
    Eip1559(TxEip1559),
}

impl SignableTx {
    fn into_envelope(self, signature: Signature) -> TxEnvelope {
        match self {
            SignableTx::Legacy(tx) => TxEnvelope::Legacy(tx.into_signed(signature)),
            SignableTx::Eip1559(tx) => TxEnvelope::Eip1559(tx.into_signed(signature)),
        }
    }
}

/// Converts a raw on-chain integer amount into a human `Decimal`, given the
/// token's decimal places. Inverse of `Eip155TokenDeployment::parse`.
fn raw_to_decimal(raw: U256, decimals: u8) -> Decimal {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{digits:0>width$}", width = decimals + 1)
    } else {
        digits
    };
    let split_at = padded.len() - decimals;
    let rendered = if decimals == 0 {
        padded
    } else {
        format!("{}.{}", &padded[..split_at], &padded[split_at..])
    };
    Decimal::from_str(&rendered).unwrap_or(Decimal::ZERO)
}

/// Extracts the `R` scalar (first 32 bytes) from a hex-encoded `r||s||v`
/// signature string, for `UsedRValue` exclusion.
fn extract_r_hex(sig_hex: &str) -> Result<String, ChainBridgeError> {
    let trimmed = sig_hex.trim_start_matches("0x");
    trimmed
        .get(..64)
        .map(str::to_string)
        .ok_or_else(|| ChainBridgeError::SignFailed("signature too short to contain R".into()))
}

/// Recovers a deposit's declared destination (`bind`) and memo from calldata,
/// by convention: the trailing 20 bytes of input data are the bind address,
/// anything before that is the memo. Plain-value sends with no input data
/// bind to their own sender.
fn parse_bind(input: &[u8], sender: Address) -> Result<(Address, String), ChainBridgeError> {
    if input.is_empty() {
        return Ok((sender, String::new()));
    }
    if input.len() < 20 {
        return Err(ChainBridgeError::WithWrongMemo);
    }
    let split_at = input.len() - 20;
    let bind = Address::from_slice(&input[split_at..]);
    Ok((bind, hex::encode(&input[..split_at])))
}

pub struct EvmChainBridge {
    chain: Eip155ChainReference,
    eip1559: bool,
    required_confirmations: u64,
    provider: RootProvider,
    local_signers: HashMap<Address, PrivateKeySigner>,
    nonce_manager: PendingNonceManager,
    tokens: HashMap<String, Eip155PairConfig>,
    dcrm: Option<Arc<dyn DcrmClient>>,
    store: Arc<dyn Store>,
}

impl EvmChainBridge {
    /// Builds the fallback-transport RPC client, falling over to the next
    /// configured endpoint when one is unreachable or rate-limited.
    fn rpc_client(rpc: &[RpcConfig]) -> Result<RpcClient, EvmBridgeConfigError> {
        let transports = rpc
            .iter()
            .filter(|c| matches!(c.http.scheme(), "http" | "https"))
            .map(|c| {
                let rate_limit = c.rate_limit.unwrap_or(u32::MAX);
                ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(c.http.clone()))
            })
            .collect::<Vec<_>>();
        if transports.is_empty() {
            return Err(EvmBridgeConfigError::NoTransports);
        }
        let fallback = ServiceBuilder::new()
            .layer(
                FallbackLayer::default().with_active_transport_count(
                    NonZeroUsize::new(transports.len()).expect("checked non-empty above"),
                ),
            )
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    /// Constructs the bridge from chain configuration and, if this chain has
    /// at least one DCRM-signed pair, the shared DCRM client to sign through.
    pub async fn new(
        config: &Eip155ChainConfig,
        dcrm: Option<Arc<dyn DcrmClient>>,
        store: Arc<dyn Store>,
    ) -> Result<Self, EvmBridgeConfigError> {
        let chain_id = config.chain_reference().inner();
        let mut local_signers = HashMap::new();
        for key in config.signers().iter() {
            let bytes = B256::from_slice(key.inner().as_bytes());
            let signer = PrivateKeySigner::from_bytes(&bytes)
                .map_err(|e| EvmBridgeConfigError::InvalidSigner(e.to_string()))?
                .with_chain_id(Some(chain_id));
            local_signers.insert(signer.address(), signer);
        }
        if local_signers.is_empty() {
            return Err(EvmBridgeConfigError::NoSigners);
        }
        let client = Self::rpc_client(config.rpc())?;
        let provider = ProviderBuilder::default().connect_client(client);
        Ok(Self {
            chain: config.chain_reference(),
            eip1559: config.eip1559(),
            required_confirmations: config.required_confirmations(),
            provider,
            local_signers,
            nonce_manager: PendingNonceManager::default(),
            tokens: config.tokens().clone(),
            dcrm,
            store,
        })
    }

    fn pair(&self, pair_id: &str) -> Result<&Eip155PairConfig, ChainBridgeError> {
        self.tokens
            .get(pair_id)
            .ok_or_else(|| ChainBridgeError::UnknownPair(pair_id.to_string()))
    }

    fn sign_status_to_signature(
        &self,
        status: SignStatus,
    ) -> Result<Option<(Signature, String)>, ChainBridgeError> {
        match status {
            SignStatus::Success(sigs) => {
                let raw = sigs
                    .first()
                    .ok_or_else(|| ChainBridgeError::SignFailed("empty signature set".into()))?;
                let r_hex = extract_r_hex(raw)?;
                let bytes = hex::decode(raw.trim_start_matches("0x"))
                    .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
                let signature = Signature::try_from(bytes.as_slice())
                    .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
                Ok(Some((signature, r_hex)))
            }
            SignStatus::Failure(msg) => Err(ChainBridgeError::SignFailed(msg)),
            SignStatus::Timeout => {
                Err(ChainBridgeError::SignFailed("sign session timed out".into()))
            }
            SignStatus::Pending => Ok(None),
        }
    }
}

#[async_trait]
impl ChainBridge for EvmChainBridge {
    async fn verify_transaction(
        &self,
        pair_id: &str,
        txid: &str,
        _tx_type: TxType,
    ) -> Result<TxSwapInfo, ChainBridgeError> {
        let pair = self.pair(pair_id)?;
        let hash =
            B256::from_str(txid).map_err(|e| ChainBridgeError::VerifyFailed(Box::new(e)))?;
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?
            .ok_or(ChainBridgeError::TxNotFound)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?
            .ok_or(ChainBridgeError::TxNotStable)?;
        if !receipt.status() {
            return Err(ChainBridgeError::VerifyFailed(boxed_err(
                "source transaction reverted",
            )));
        }
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?;
        let height = receipt.block_number.unwrap_or(0);
        let confirmations = head.saturating_sub(height) + 1;
        if confirmations < self.required_confirmations {
            return Err(ChainBridgeError::TxNotStable);
        }

        let sender = tx.from;
        let (to, value, bind, memo) = match pair.contract {
            None => {
                let to = tx.to().ok_or(ChainBridgeError::Incompatible)?;
                if to != pair.deposit_address.0 {
                    return Err(ChainBridgeError::Incompatible);
                }
                let (bind, memo) = parse_bind(tx.input(), sender)?;
                (to, raw_to_decimal(tx.value(), 18), bind, memo)
            }
            Some(contract) => {
                let log = receipt
                    .inner
                    .logs()
                    .iter()
                    .find(|log| log.address() == contract.0)
                    .ok_or(ChainBridgeError::Incompatible)?;
                let transfer: IERC20::Transfer = log
                    .log_decode()
                    .map_err(|e| ChainBridgeError::VerifyFailed(Box::new(e)))?
                    .inner
                    .data;
                if transfer.to != pair.deposit_address.0 {
                    return Err(ChainBridgeError::Incompatible);
                }
                let (bind, memo) = parse_bind(tx.input(), sender)?;
                (
                    transfer.to,
                    raw_to_decimal(transfer.value, pair.decimals),
                    bind,
                    memo,
                )
            }
        };

        let code = self
            .provider
            .get_code_at(bind)
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?;
        if !code.is_empty() {
            return Err(ChainBridgeError::BindAddrIsContract);
        }

        Ok(TxSwapInfo {
            pair_id: pair_id.to_string(),
            from: format!("{sender:#x}"),
            bind: format!("{bind:#x}"),
            value,
            height,
            tx_to: format!("{to:#x}"),
            memo,
        })
    }

    async fn build_raw_transaction(&self, args: &BuildTxArgs) -> Result<RawTx, ChainBridgeError> {
        let pair = self.pair(&args.pair_id)?;
        let from = pair.deposit_address.0;
        let to = Address::from_str(&args.to)
            .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?;
        let nonce = match args.nonce {
            Some(nonce) => nonce,
            None => self.nonce_manager.next_nonce(&format!("{from:#x}")).await,
        };

        let (value, input, call_to) = match pair.contract {
            None => {
                let value = pair.deposit_amount(args.value)?;
                (value, Bytes::new(), to)
            }
            Some(contract) => {
                let amount = pair.deposit_amount(args.value)?;
                let call = IERC20::transferCall { to, amount };
                (U256::ZERO, Bytes::from(call.abi_encode()), contract.0)
            }
        };

        let gas_estimate_request = TransactionRequest::default()
            .with_from(from)
            .with_to(call_to)
            .with_value(value)
            .with_input(input.clone());
        let gas_limit = self
            .provider
            .estimate_gas(gas_estimate_request)
            .await
            .unwrap_or(if pair.contract.is_some() { 90_000 } else { 21_000 });

        let (max_fee_per_gas, max_priority_fee_per_gas, gas_price) = if self.eip1559 {
            let estimate = self
                .provider
                .estimate_eip1559_fees()
                .await
                .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?;
            (
                estimate.max_fee_per_gas,
                estimate.max_priority_fee_per_gas,
                0,
            )
        } else {
            let gas_price = self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?;
            (0, 0, gas_price)
        };

        let unsigned = EvmUnsignedTx {
            chain_id: self.chain.inner(),
            nonce,
            from: format!("{from:#x}"),
            to: format!("{call_to:#x}"),
            value: value.to_string(),
            input: format!("0x{}", hex::encode(&input)),
            gas_limit,
            eip1559: self.eip1559,
            max_fee_per_gas: max_fee_per_gas.to_string(),
            max_priority_fee_per_gas: max_priority_fee_per_gas.to_string(),
            gas_price: gas_price.to_string(),
            txid: args.txid.clone(),
            bind: args.to.clone(),
        };
        let bytes = serde_json::to_vec(&unsigned)
            .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?;
        Ok(RawTx(bytes))
    }

    async fn sign_transaction(
        &self,
        raw: &RawTx,
        pair_id: &str,
    ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
        let pair = self.pair(pair_id)?;
        if pair.dcrm.is_some() {
            return Err(ChainBridgeError::Unsupported);
        }
        let unsigned: EvmUnsignedTx = serde_json::from_slice(&raw.0)
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let from = unsigned.from_address()?;
        let signer = self
            .local_signers
            .get(&from)
            .ok_or(ChainBridgeError::Unsupported)?;
        let (tx, sighash) = unsigned.signable()?;
        let signature = signer
            .sign_hash(&sighash)
            .await
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let envelope = tx.into_envelope(signature);
        let encoded = envelope.encoded_2718();
        let hash = alloy_primitives::keccak256(&encoded);
        Ok((SignedTx(encoded), TxHash(format!("{hash:#x}"))))
    }

    async fn dcrm_sign_transaction(
        &self,
        raw: &RawTx,
        pair_id: &str,
        _extra: &serde_json::Value,
    ) -> Result<(SignedTx, TxHash), ChainBridgeError> {
        let pair = self.pair(pair_id)?;
        let dcrm_pair = pair.dcrm.as_ref().ok_or(ChainBridgeError::Unsupported)?;
        let dcrm = self.dcrm.as_ref().ok_or(ChainBridgeError::Unsupported)?;
        let unsigned: EvmUnsignedTx = serde_json::from_slice(&raw.0)
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let (tx, sighash) = unsigned.signable()?;

        let request = SignRequest {
            key_id: format!("{pair_id}:{}", unsigned.nonce),
            pubkey: dcrm_pair.pubkey.clone(),
            msg_hash: vec![format!("{sighash:#x}")],
            msg_context: vec![unsigned.txid.clone(), pair_id.to_string(), unsigned.bind.clone()],
            group_id: dcrm_pair.group_id.clone(),
            threshold: dcrm_pair.threshold.clone(),
            mode: dcrm_pair.mode,
        };
        let key_id = dcrm
            .do_sign(&request)
            .await
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;

        for _ in 0..DCRM_POLL_ATTEMPTS {
            let status = dcrm
                .get_sign_status(&key_id)
                .await
                .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
            if let Some((signature, r_hex)) = self.sign_status_to_signature(status)? {
                self.store
                    .insert_used_r_value(&dcrm_pair.pubkey, &r_hex)
                    .await
                    .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
                let envelope = tx.into_envelope(signature);
                let encoded = envelope.encoded_2718();
                let hash = alloy_primitives::keccak256(&encoded);
                return Ok((SignedTx(encoded), TxHash(format!("{hash:#x}"))));
            }
            tokio::time::sleep(DCRM_POLL_INTERVAL).await;
        }
        Err(ChainBridgeError::SignFailed(
            "dcrm sign session did not complete in time".into(),
        ))
    }

    async fn send_transaction(&self, signed: &SignedTx) -> Result<TxHash, ChainBridgeError> {
        let _ = TxEnvelope::decode_2718(&mut signed.0.as_slice())
            .map_err(|e| ChainBridgeError::SendFailed(e.to_string()))?;
        let pending = self
            .provider
            .send_raw_transaction(&signed.0)
            .await
            .map_err(|e| ChainBridgeError::SendFailed(e.to_string()))?;
        Ok(TxHash(format!("{:#x}", pending.tx_hash())))
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<TxMeta, ChainBridgeError> {
        let tx_hash =
            B256::from_str(&hash.0).map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?;
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?
            .ok_or(ChainBridgeError::TxNotFound)?;
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?;
        let height = receipt.block_number.unwrap_or(0);
        Ok(TxMeta {
            hash: hash.clone(),
            height,
            confirmations: head.saturating_sub(height) + 1,
            reverted: !receipt.status(),
        })
    }

    fn required_confirmations(&self) -> u64 {
        self.required_confirmations
    }

    fn chain_config(&self) -> serde_json::Value {
        serde_json::json!({
            "chain_id": ChainId::from(self.chain).to_string(),
            "eip1559": self.eip1559,
            "required_confirmations": self.required_confirmations,
        })
    }

    fn token_config(&self, pair_id: &str) -> Option<serde_json::Value> {
        self.tokens
            .get(pair_id)
            .and_then(|pair| serde_json::to_value(pair).ok())
    }

    fn as_nonce_setter(&self) -> Option<&dyn NonceSetter> {
        Some(&self.nonce_manager)
    }
}

impl Eip155PairConfig {
    fn deposit_amount(&self, value: Decimal) -> Result<U256, ChainBridgeError> {
        let token = crate::chain::types::Eip155TokenDeployment {
            chain_reference: Eip155ChainReference::new(0),
            contract: self.contract.map(|c| c.0),
            decimals: self.decimals,
        };
        token
            .parse(value.to_string().as_str())
            .map(|amount| amount.amount)
            .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_to_decimal_handles_small_and_large_values() {
        assert_eq!(
            raw_to_decimal(U256::from(1_500_000u64), 6),
            Decimal::from_str("1.5").unwrap()
        );
        assert_eq!(
            raw_to_decimal(U256::from(5u64), 6),
            Decimal::from_str("0.000005").unwrap()
        );
        assert_eq!(raw_to_decimal(U256::ZERO, 18), Decimal::ZERO);
    }

    #[test]
    fn parse_bind_defaults_to_sender_with_empty_input() {
        let sender = Address::repeat_byte(0xab);
        let (bind, memo) = parse_bind(&[], sender).unwrap();
        assert_eq!(bind, sender);
        assert!(memo.is_empty());
    }

    #[test]
    fn parse_bind_splits_trailing_address_from_memo() {
        let bind_addr = Address::repeat_byte(0xcd);
        let mut input = b"hello".to_vec();
        input.extend_from_slice(bind_addr.as_slice());
        let (bind, memo) = parse_bind(&input, Address::ZERO).unwrap();
        assert_eq!(bind, bind_addr);
        assert_eq!(memo, hex::encode(b"hello"));
    }

    #[test]
    fn parse_bind_rejects_short_input() {
        let result = parse_bind(&[1, 2, 3], Address::ZERO);
        assert!(matches!(result, Err(ChainBridgeError::WithWrongMemo)));
    }
}

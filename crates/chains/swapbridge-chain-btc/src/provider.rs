//! `ChainBridge` implementation for Bitcoin-style UTXO chains.
//!
//! Swapin deposits are identified by a per-bind P2SH address: the redeem
//! script pushes the bind address's bytes ahead of the pair's own spending
//! pubkey, so the address a user is told to pay is unique to their bind even
//! though every such address spends with the same pair key. `derive_p2sh_address`
//! (the `P2shRegistrar` capability) computes that address deterministically;
//! the out-of-scope scanner is expected to call it once per new bind and
//! persist the result via `Store::set_p2sh_address`, while this adapter keeps
//! its own reverse index so `verify_transaction` can recognize a deposit
//! output without needing the Store in hand. Outbound settlements spend the
//! pair's pooled P2WPKH `deposit_address`, signed either locally or through
//! the adapter's configured DCRM group. RPC calls go through
//! `bitcoincore-rpc`'s blocking client, run on the Tokio blocking pool to
//! keep the non-async dependency off the async worker loops.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_DROP;
use bitcoin::script::Builder;
use bitcoin::secp256k1::{self, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{
    Address, Amount, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness,
};
use bitcoincore_rpc::{Auth, Client, RpcApi};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;
use swapbridge_core::chain_bridge::{ChainBridge, P2shRegistrar};
use swapbridge_core::dcrm::{DcrmClient, SignRequest, SignStatus};
use swapbridge_core::error::ChainBridgeError;
use swapbridge_core::model::{BuildTxArgs, RawTx, SignedTx, TxHash, TxMeta, TxSwapInfo, TxType};
use swapbridge_core::store::Store;

use crate::config::{BtcChainConfig, BtcDcrmPairConfig, BtcPairConfig};

const DCRM_POLL_ATTEMPTS: u32 = 30;
const DCRM_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DUST_SATS: u64 = 546;

#[derive(Debug, thiserror::Error)]
pub enum BtcBridgeConfigError {
    #[error("invalid rpc url or credentials: {0}")]
    Rpc(#[source] bitcoincore_rpc::Error),
    #[error("invalid deposit address for pair {pair}: {source}")]
    InvalidAddress {
        pair: String,
        #[source]
        source: bitcoin::address::ParseError,
    },
    #[error("deposit address for pair {0} does not belong to the configured network")]
    WrongNetwork(String),
    #[error("invalid WIF private key for pair {pair}: {source}")]
    InvalidKey {
        pair: String,
        #[source]
        source: bitcoin::key::FromWifError,
    },
    #[error("pair {0} has neither a local private key nor a dcrm pubkey to derive P2SH addresses with")]
    NoSpendingKey(String),
    #[error("invalid dcrm pubkey hex for pair {pair}: {source}")]
    InvalidDcrmPubkeyHex {
        pair: String,
        #[source]
        source: hex::FromHexError,
    },
    #[error("invalid dcrm pubkey for pair {pair}: {source}")]
    InvalidDcrmPubkey {
        pair: String,
        #[source]
        source: bitcoin::key::FromSliceError,
    },
}

struct ResolvedPair {
    deposit_address: Address,
    local_key: Option<PrivateKey>,
    dcrm: Option<BtcDcrmPairConfig>,
    /// The pubkey embedded in every P2SH redeem script this pair derives,
    /// and the same key outbound P2WPKH spends are signed/verified against.
    spending_pubkey: PublicKey,
    disabled: bool,
}

/// Redeem script `<bind bytes> OP_DROP <pubkey> OP_CHECKSIG`, wrapped in
/// P2SH. The bind is pushed as data purely to make the address unique per
/// bind; it plays no role in spending, which always goes through `pubkey`.
fn p2sh_redeem_script(bind: &str, pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_slice(bitcoin::script::PushBytesBuf::try_from(bind.as_bytes().to_vec()).unwrap_or_default())
        .push_opcode(OP_DROP)
        .push_key(pubkey)
        .push_opcode(bitcoin::opcodes::all::OP_CHECKSIG)
        .into_script()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrevOut {
    value_sats: u64,
    script_pubkey_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BtcUnsignedTx {
    tx_hex: String,
    prevouts: Vec<PrevOut>,
    /// Source-chain txid this settlement pays out, carried through so the
    /// DCRM sign-request context can name `(txid, pair_id, bind)`.
    txid: String,
    bind: String,
}

/// Extracts the `R` scalar (first 32 bytes) from a hex-encoded signature
/// string, for `UsedRValue` exclusion.
fn extract_r_hex(sig_hex: &str) -> Result<String, ChainBridgeError> {
    let trimmed = sig_hex.trim_start_matches("0x");
    trimmed
        .get(..64)
        .map(str::to_string)
        .ok_or_else(|| ChainBridgeError::SignFailed("signature too short to contain R".into()))
}

fn decimal_to_sats(value: Decimal) -> Result<u64, ChainBridgeError> {
    let sats = (value * Decimal::from(100_000_000u64))
        .round_dp(0)
        .to_u64()
        .ok_or_else(|| ChainBridgeError::BuildFailed("amount does not fit in satoshis".into()))?;
    Ok(sats)
}

fn sats_to_decimal(sats: u64) -> Decimal {
    Decimal::from(sats) / Decimal::from(100_000_000u64)
}

pub struct BtcChainBridge {
    rpc: Arc<Client>,
    network: bitcoin::Network,
    required_confirmations: u64,
    fee_sats: u64,
    tokens: HashMap<String, ResolvedPair>,
    dcrm: Option<Arc<dyn DcrmClient>>,
    /// P2SH address (string) -> bind, populated by `derive_p2sh_address` so
    /// `verify_transaction` can recognize a deposit output. Keyed globally
    /// rather than per-pair since an address is unambiguous on its own.
    p2sh_index: DashMap<String, String>,
    /// `pair_id:bind` -> P2SH address, so re-deriving for an already-known
    /// bind is idempotent instead of minting a second address for it.
    bind_index: DashMap<String, String>,
    store: Arc<dyn Store>,
}

impl BtcChainBridge {
    pub async fn new(
        config: &BtcChainConfig,
        dcrm: Option<Arc<dyn DcrmClient>>,
        store: Arc<dyn Store>,
    ) -> Result<Self, BtcBridgeConfigError> {
        let network: bitcoin::Network = config.network.into();
        let auth = Auth::UserPass(
            config.rpc_user.inner().clone(),
            config.rpc_password.inner().clone(),
        );
        let rpc = Client::new(config.rpc_url.as_str(), auth).map_err(BtcBridgeConfigError::Rpc)?;
        let secp = Secp256k1::new();

        let mut tokens = HashMap::new();
        for (pair_id, pair) in config.tokens.iter() {
            let unchecked =
                Address::from_str(&pair.deposit_address).map_err(|source| {
                    BtcBridgeConfigError::InvalidAddress {
                        pair: pair_id.clone(),
                        source,
                    }
                })?;
            let deposit_address = unchecked
                .require_network(network)
                .map_err(|_| BtcBridgeConfigError::WrongNetwork(pair_id.clone()))?;
            let local_key = pair
                .local_private_key
                .as_ref()
                .map(|wif| {
                    PrivateKey::from_wif(wif.inner()).map_err(|source| {
                        BtcBridgeConfigError::InvalidKey {
                            pair: pair_id.clone(),
                            source,
                        }
                    })
                })
                .transpose()?;
            let spending_pubkey = match (&pair.dcrm, &local_key) {
                (Some(dcrm_pair), _) => {
                    let bytes = hex::decode(&dcrm_pair.pubkey).map_err(|source| {
                        BtcBridgeConfigError::InvalidDcrmPubkeyHex {
                            pair: pair_id.clone(),
                            source,
                        }
                    })?;
                    PublicKey::from_slice(&bytes).map_err(|source| {
                        BtcBridgeConfigError::InvalidDcrmPubkey {
                            pair: pair_id.clone(),
                            source,
                        }
                    })?
                }
                (None, Some(key)) => key.public_key(&secp),
                (None, None) => return Err(BtcBridgeConfigError::NoSpendingKey(pair_id.clone())),
            };
            tokens.insert(
                pair_id.clone(),
                ResolvedPair {
                    deposit_address,
                    local_key,
                    dcrm: pair.dcrm.clone(),
                    spending_pubkey,
                    disabled: pair.disabled,
                },
            );
        }

        Ok(Self {
            rpc: Arc::new(rpc),
            network,
            required_confirmations: config.required_confirmations,
            fee_sats: config.fee_sats,
            tokens,
            dcrm,
            p2sh_index: DashMap::new(),
            bind_index: DashMap::new(),
            store,
        })
    }

    fn pair(&self, pair_id: &str) -> Result<&ResolvedPair, ChainBridgeError> {
        self.tokens
            .get(pair_id)
            .ok_or_else(|| ChainBridgeError::UnknownPair(pair_id.to_string()))
    }

    async fn rpc_call<T, F>(&self, f: F) -> Result<T, ChainBridgeError>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> Result<T, bitcoincore_rpc::Error> + Send + 'static,
    {
        let rpc = self.rpc.clone();
        tokio::task::spawn_blocking(move || f(&rpc))
            .await
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?
            .map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))
    }

    fn sign_status_to_signatures(
        status: SignStatus,
    ) -> Result<Option<Vec<(Vec<u8>, String)>>, ChainBridgeError> {
        match status {
            SignStatus::Success(sigs) => {
                let mut decoded = Vec::with_capacity(sigs.len());
                for sig in sigs {
                    let r_hex = extract_r_hex(&sig)?;
                    let bytes = hex::decode(sig.trim_start_matches("0x"))
                        .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
                    decoded.push((bytes, r_hex));
                }
                Ok(Some(decoded))
            }
            SignStatus::Failure(msg) => Err(ChainBridgeError::SignFailed(msg)),
            SignStatus::Timeout => {
                Err(ChainBridgeError::SignFailed("sign session timed out".into()))
            }
            SignStatus::Pending => Ok(None),
        }
    }
}

impl P2shRegistrar for BtcChainBridge {
    fn derive_p2sh_address(&self, pair_id: &str, bind: &str) -> Result<String, ChainBridgeError> {
        let bind_key = format!("{pair_id}:{}", bind.to_lowercase());
        if let Some(existing) = self.bind_index.get(&bind_key) {
            return Ok(existing.clone());
        }
        let pair = self.pair(pair_id)?;
        let redeem_script = p2sh_redeem_script(bind, &pair.spending_pubkey);
        let address = Address::p2sh(&redeem_script, self.network)
            .map_err(|e| ChainBridgeError::VerifyFailed(Box::new(e)))?
            .to_string();
        self.p2sh_index.insert(address.clone(), bind.to_string());
        self.bind_index.insert(bind_key, address.clone());
        Ok(address)
    }
}

#[async_trait]
impl ChainBridge for BtcChainBridge {
    async fn verify_transaction(
        &self,
        pair_id: &str,
        txid: &str,
        tx_type: TxType,
    ) -> Result<TxSwapInfo, ChainBridgeError> {
        let pair = self.pair(pair_id)?;
        let deposit_address = pair.deposit_address.clone();
        let parsed_txid =
            Txid::from_str(txid).map_err(|e| ChainBridgeError::VerifyFailed(Box::new(e)))?;

        let info = self
            .rpc_call(move |rpc| rpc.get_raw_transaction_info(&parsed_txid, None))
            .await?;

        let confirmations = info.confirmations.unwrap_or(0) as u64;
        if confirmations == 0 || confirmations < self.required_confirmations {
            return Err(ChainBridgeError::TxNotStable);
        }
        let height = match info.blockhash {
            Some(hash) => {
                self.rpc_call(move |rpc| rpc.get_block_header_info(&hash))
                    .await?
                    .height as u64
            }
            None => return Err(ChainBridgeError::TxNotStable),
        };

        let sender = info
            .vin
            .first()
            .map(|vin| {
                format!(
                    "{}:{}",
                    vin.txid.map(|t| t.to_string()).unwrap_or_default(),
                    vin.vout.unwrap_or(0)
                )
            })
            .unwrap_or_default();

        match tx_type {
            TxType::P2shSwapin => {
                let mut matched: Option<(String, u64)> = None;
                for vout in info.vout.iter() {
                    let Ok(addr) = Address::from_script(vout.script_pub_key.script(), self.network)
                    else {
                        continue;
                    };
                    let Some(bind) = self.p2sh_index.get(&addr.to_string()).map(|e| e.clone())
                    else {
                        continue;
                    };
                    match &mut matched {
                        Some((existing_bind, sats)) if *existing_bind == bind => {
                            *sats += vout.value.to_sat();
                        }
                        Some(_) => return Err(ChainBridgeError::Incompatible),
                        None => matched = Some((bind, vout.value.to_sat())),
                    }
                }
                let (bind, credited_sats) = matched.ok_or(ChainBridgeError::TxNotFound)?;
                Ok(TxSwapInfo {
                    pair_id: pair_id.to_string(),
                    from: sender,
                    bind,
                    value: sats_to_decimal(credited_sats),
                    height,
                    tx_to: deposit_address.to_string(),
                    memo: String::new(),
                })
            }
            TxType::Swapout => {
                let payout = info
                    .vout
                    .iter()
                    .find_map(|vout| {
                        let addr =
                            Address::from_script(vout.script_pub_key.script(), self.network).ok()?;
                        (addr != deposit_address).then_some((addr, vout.value.to_sat()))
                    })
                    .ok_or(ChainBridgeError::Incompatible)?;
                Ok(TxSwapInfo {
                    pair_id: pair_id.to_string(),
                    from: deposit_address.to_string(),
                    bind: String::new(),
                    value: sats_to_decimal(payout.1),
                    height,
                    tx_to: payout.0.to_string(),
                    memo: String::new(),
                })
            }
            TxType::Swapin => Err(ChainBridgeError::Incompatible),
        }
    }

    async fn build_raw_transaction(&self, args: &BuildTxArgs) -> Result<RawTx, ChainBridgeError> {
        let pair = self.pair(&args.pair_id)?;
        let deposit_address = pair.deposit_address.clone();
        let dest_address = Address::from_str(&args.to)
            .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| ChainBridgeError::BuildFailed(e.to_string()))?;

        let amount_sats = decimal_to_sats(args.value)?;
        let target = amount_sats + self.fee_sats;

        let script_pubkey = deposit_address.script_pubkey();
        let utxos = self
            .rpc_call(move |rpc| {
                rpc.list_unspent(Some(1), None, Some(&[deposit_address.clone()]), None, None)
            })
            .await?;

        let mut selected = Vec::new();
        let mut total = 0u64;
        for utxo in utxos {
            if total >= target {
                break;
            }
            total += utxo.amount.to_sat();
            selected.push(utxo);
        }
        if total < target {
            return Err(ChainBridgeError::BuildFailed(
                "insufficient unspent outputs to cover amount and fee".into(),
            ));
        }

        let inputs: Vec<TxIn> = selected
            .iter()
            .map(|utxo| TxIn {
                previous_output: OutPoint {
                    txid: utxo.txid,
                    vout: utxo.vout,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
            .collect();
        let prevouts: Vec<PrevOut> = selected
            .iter()
            .map(|utxo| PrevOut {
                value_sats: utxo.amount.to_sat(),
                script_pubkey_hex: hex::encode(utxo.script_pub_key.as_bytes()),
            })
            .collect();

        let mut outputs = vec![TxOut {
            value: Amount::from_sat(amount_sats),
            script_pubkey: dest_address.script_pubkey(),
        }];
        let change = total - target;
        if change > DUST_SATS {
            outputs.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey,
            });
        }

        let tx = Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };

        let unsigned = BtcUnsignedTx {
            tx_hex: hex::encode(serialize(&tx)),
            prevouts,
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
        let private_key = pair.local_key.ok_or(ChainBridgeError::Unsupported)?;
        let unsigned: BtcUnsignedTx = serde_json::from_slice(&raw.0)
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let mut tx: Transaction = deserialize(
            &hex::decode(&unsigned.tx_hex).map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?,
        )
        .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;

        let secp = Secp256k1::new();
        let public_key = private_key.public_key(&secp);
        let mut cache = SighashCache::new(tx.clone());
        for (index, prevout) in unsigned.prevouts.iter().enumerate() {
            let script_code = ScriptBuf::new_p2wpkh(
                &public_key
                    .wpubkey_hash()
                    .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?,
            );
            let sighash = cache
                .p2wpkh_signature_hash(
                    index,
                    &script_code,
                    Amount::from_sat(prevout.value_sats),
                    EcdsaSighashType::All,
                )
                .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&message, &private_key.inner);
            let mut sig_bytes = signature.serialize_der().to_vec();
            sig_bytes.push(EcdsaSighashType::All as u8);
            tx.input[index].witness = Witness::p2wpkh(
                &bitcoin::ecdsa::Signature::from_slice(&sig_bytes)
                    .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?,
                &public_key.inner,
            );
        }

        let hash = tx.compute_txid();
        let encoded = serialize(&tx);
        Ok((SignedTx(encoded), TxHash(hash.to_string())))
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
        let unsigned: BtcUnsignedTx = serde_json::from_slice(&raw.0)
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let tx: Transaction = deserialize(
            &hex::decode(&unsigned.tx_hex).map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?,
        )
        .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;

        let pubkey_bytes = hex::decode(&dcrm_pair.pubkey)
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let public_key = secp256k1::PublicKey::from_slice(&pubkey_bytes)
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
        let wpubkey_hash = bitcoin::PublicKey::new(public_key)
            .wpubkey_hash()
            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;

        let mut cache = SighashCache::new(tx.clone());
        let mut sighashes = Vec::with_capacity(unsigned.prevouts.len());
        for (index, prevout) in unsigned.prevouts.iter().enumerate() {
            let script_code = ScriptBuf::new_p2wpkh(&wpubkey_hash);
            let sighash = cache
                .p2wpkh_signature_hash(
                    index,
                    &script_code,
                    Amount::from_sat(prevout.value_sats),
                    EcdsaSighashType::All,
                )
                .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
            sighashes.push(format!("0x{}", hex::encode(sighash.to_byte_array())));
        }

        let request = SignRequest {
            key_id: format!("{pair_id}:{}", tx.compute_txid()),
            pubkey: dcrm_pair.pubkey.clone(),
            msg_hash: sighashes,
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
            if let Some(signatures) = Self::sign_status_to_signatures(status)? {
                let mut tx = tx.clone();
                for (index, (mut sig_bytes, r_hex)) in signatures.into_iter().enumerate() {
                    self.store
                        .insert_used_r_value(&dcrm_pair.pubkey, &r_hex)
                        .await
                        .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?;
                    sig_bytes.push(EcdsaSighashType::All as u8);
                    tx.input[index].witness = Witness::p2wpkh(
                        &bitcoin::ecdsa::Signature::from_slice(&sig_bytes)
                            .map_err(|e| ChainBridgeError::SignFailed(e.to_string()))?,
                        &public_key,
                    );
                }
                let hash = tx.compute_txid();
                let encoded = serialize(&tx);
                return Ok((SignedTx(encoded), TxHash(hash.to_string())));
            }
            tokio::time::sleep(DCRM_POLL_INTERVAL).await;
        }
        Err(ChainBridgeError::SignFailed(
            "dcrm sign session did not complete in time".into(),
        ))
    }

    async fn send_transaction(&self, signed: &SignedTx) -> Result<TxHash, ChainBridgeError> {
        let tx: Transaction =
            deserialize(&signed.0).map_err(|e| ChainBridgeError::SendFailed(e.to_string()))?;
        let txid = self
            .rpc_call(move |rpc| rpc.send_raw_transaction(&tx))
            .await
            .map_err(|e| ChainBridgeError::SendFailed(e.to_string()))?;
        Ok(TxHash(txid.to_string()))
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<TxMeta, ChainBridgeError> {
        let txid =
            Txid::from_str(&hash.0).map_err(|e| ChainBridgeError::RpcQueryError(Box::new(e)))?;
        let info = self
            .rpc_call(move |rpc| rpc.get_raw_transaction_info(&txid, None))
            .await?;
        let confirmations = info.confirmations.unwrap_or(0) as u64;
        let height = match info.blockhash {
            Some(hash) => {
                self.rpc_call(move |rpc| rpc.get_block_header_info(&hash))
                    .await?
                    .height as u64
            }
            None => 0,
        };
        Ok(TxMeta {
            hash: hash.clone(),
            height,
            confirmations,
            reverted: false,
        })
    }

    fn required_confirmations(&self) -> u64 {
        self.required_confirmations
    }

    fn chain_config(&self) -> serde_json::Value {
        serde_json::json!({
            "network": format!("{:?}", self.network),
            "required_confirmations": self.required_confirmations,
            "fee_sats": self.fee_sats,
        })
    }

    fn token_config(&self, pair_id: &str) -> Option<serde_json::Value> {
        self.tokens.get(pair_id).map(|pair| {
            serde_json::json!({
                "deposit_address": pair.deposit_address.to_string(),
                "locally_signed": pair.local_key.is_some(),
                "dcrm": pair.dcrm,
                "spending_pubkey": pair.spending_pubkey.to_string(),
                "disabled": pair.disabled,
            })
        })
    }

    fn as_p2sh_registrar(&self) -> Option<&dyn P2shRegistrar> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_to_sats_and_back_roundtrip() {
        let value = Decimal::from_str("0.00123456").unwrap();
        let sats = decimal_to_sats(value).unwrap();
        assert_eq!(sats, 123_456);
        assert_eq!(sats_to_decimal(sats), value);
    }

    #[test]
    fn decimal_to_sats_rejects_nothing_below_one_sat_precision() {
        let value = Decimal::from_str("1").unwrap();
        assert_eq!(decimal_to_sats(value).unwrap(), 100_000_000);
    }

    fn sample_pubkey() -> PublicKey {
        let secp = Secp256k1::new();
        let key = PrivateKey::from_slice(&[0x01; 32], bitcoin::Network::Regtest).unwrap();
        key.public_key(&secp)
    }

    #[test]
    fn p2sh_address_is_deterministic_and_distinct_per_bind() {
        let pubkey = sample_pubkey();
        let addr_a1 = Address::p2sh(&p2sh_redeem_script("0xbinda", &pubkey), bitcoin::Network::Regtest)
            .unwrap();
        let addr_a2 = Address::p2sh(&p2sh_redeem_script("0xbinda", &pubkey), bitcoin::Network::Regtest)
            .unwrap();
        let addr_b = Address::p2sh(&p2sh_redeem_script("0xbindb", &pubkey), bitcoin::Network::Regtest)
            .unwrap();
        assert_eq!(addr_a1, addr_a2);
        assert_ne!(addr_a1, addr_b);
    }
}

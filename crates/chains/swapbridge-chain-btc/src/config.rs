//! Configuration for the Bitcoin-style UTXO chain adapter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use swapbridge_types::config::LiteralOrEnv;

/// Which Bitcoin-compatible network this adapter's RPC node serves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl From<BtcNetwork> for bitcoin::Network {
    fn from(value: BtcNetwork) -> Self {
        match value {
            BtcNetwork::Bitcoin => bitcoin::Network::Bitcoin,
            BtcNetwork::Testnet => bitcoin::Network::Testnet,
            BtcNetwork::Signet => bitcoin::Network::Signet,
            BtcNetwork::Regtest => bitcoin::Network::Regtest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcChainConfig {
    pub network: BtcNetwork,
    pub rpc_url: url::Url,
    pub rpc_user: LiteralOrEnv<String>,
    pub rpc_password: LiteralOrEnv<String>,
    #[serde(default = "btc_chain_config::default_required_confirmations")]
    pub required_confirmations: u64,
    /// Fixed per-transaction miner fee, in satoshis. A flat fee keeps build
    /// deterministic without depending on fee estimation being available on
    /// the configured node.
    #[serde(default = "btc_chain_config::default_fee_sats")]
    pub fee_sats: u64,
    /// Per-pair deposit address and signing configuration, keyed by `pair_id`.
    #[serde(default)]
    pub tokens: HashMap<String, BtcPairConfig>,
}

mod btc_chain_config {
    pub fn default_required_confirmations() -> u64 {
        1
    }
    pub fn default_fee_sats() -> u64 {
        2_000
    }
    pub fn default_dcrm_mode() -> u32 {
        9
    }
}

/// Configuration for a single token pair on this chain: a pooled P2WPKH
/// address outbound settlements spend from, and either a locally held key or
/// a DCRM group that also doubles as the spending key embedded in every
/// per-bind P2SH deposit address this pair derives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcPairConfig {
    /// Base58/bech32-encoded pooled address outbound settlements for this
    /// pair are spent from. Inbound deposits are never sent here directly —
    /// each bind gets its own derived P2SH address instead (see
    /// `swapbridge_core::chain_bridge::P2shRegistrar`).
    pub deposit_address: String,
    /// WIF-encoded private key, present when this pair is signed locally.
    #[serde(default)]
    pub local_private_key: Option<LiteralOrEnv<String>>,
    /// Present when this pair is signed by the remote DCRM group instead of
    /// a locally configured key.
    #[serde(default)]
    pub dcrm: Option<BtcDcrmPairConfig>,
    /// When true, SwapWorker silently skips settlement for this pair.
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcDcrmPairConfig {
    pub pubkey: String,
    pub group_id: String,
    pub threshold: String,
    #[serde(default = "btc_chain_config::default_dcrm_mode")]
    pub mode: u32,
}

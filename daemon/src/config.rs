//! Daemon configuration: CLI entry point plus the JSON config file it loads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;

use swapbridge_chain_btc::BtcChainConfig;
use swapbridge_chain_evm::chain::config::{Eip155ChainConfig, Eip155ChainConfigInner};
use swapbridge_chain_evm::chain::types::{EIP155_NAMESPACE, Eip155ChainReference};
use swapbridge_core::chain_bridge::ChainBridge;
use swapbridge_core::dcrm::DcrmClient;
use swapbridge_core::model::TxType;
use swapbridge_core::store::Store;
use swapbridge_types::chain::ChainId;
use swapbridge_types::config::LiteralOrEnv;

/// CLI arguments for the swap bridge daemon.
#[derive(Debug, Parser)]
#[command(name = "swapbridge-daemon", about = "Cross-chain swap bridge daemon")]
pub struct CliArgs {
    /// Path to the JSON config file.
    #[arg(short, long, env = "CONFIG", default_value = "config.json")]
    pub config: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {0}: {1}")]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Which storage backend persists `Swap`/`SwapResult`/address state.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Sled { path: String },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

/// Coordinates for the shared remote threshold-signature (DCRM/MPC) signer.
/// Absent when every configured pair on both chains signs with a local key.
#[derive(Debug, Clone, Deserialize)]
pub struct DcrmConfig {
    pub endpoint: url::Url,
    /// Hex private key (or `$VAR`/`${VAR}` env reference) this node signs its
    /// own accept/sign envelopes with, reusing the EVM adapter's own private
    /// key type since envelope signing goes through the same `alloy` signer.
    pub signer_key: LiteralOrEnv<swapbridge_chain_evm::chain::config::EvmPrivateKey>,
}

/// One of the two chains the daemon bridges between, tagged by adapter kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChainSlotConfig {
    Evm {
        chain_id: u64,
        #[serde(flatten)]
        inner: Eip155ChainConfigInner,
    },
    Btc(BtcChainConfig),
}

#[derive(Debug, thiserror::Error)]
pub enum ChainBuildError {
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
    #[error(transparent)]
    Evm(#[from] swapbridge_chain_evm::EvmBridgeConfigError),
    #[error(transparent)]
    Btc(#[from] swapbridge_chain_btc::BtcBridgeConfigError),
}

impl ChainSlotConfig {
    /// The `TxType` a deposit into this chain's pairs is recorded under —
    /// `Swapin` for account-based EVM deposits, `P2shSwapin` for BTC's
    /// per-bind P2SH deposit addresses.
    pub fn native_tx_type(&self) -> TxType {
        match self {
            ChainSlotConfig::Evm { .. } => TxType::Swapin,
            ChainSlotConfig::Btc(_) => TxType::P2shSwapin,
        }
    }

    pub async fn build_bridge(
        &self,
        dcrm: Option<Arc<dyn DcrmClient>>,
        store: Arc<dyn Store>,
    ) -> Result<Arc<dyn ChainBridge>, ChainBuildError> {
        match self {
            ChainSlotConfig::Evm { chain_id, inner } => {
                let chain_id = ChainId::new(EIP155_NAMESPACE, chain_id.to_string());
                let chain_reference = Eip155ChainReference::try_from(chain_id)
                    .map_err(|e| ChainBuildError::InvalidChainId(e.to_string()))?;
                let config = Eip155ChainConfig {
                    chain_reference,
                    inner: inner.clone(),
                };
                let bridge =
                    swapbridge_chain_evm::EvmChainBridge::new(&config, dcrm, store).await?;
                Ok(Arc::new(bridge))
            }
            ChainSlotConfig::Btc(config) => {
                let bridge = swapbridge_chain_btc::BtcChainBridge::new(config, dcrm, store).await?;
                Ok(Arc::new(bridge))
            }
        }
    }
}

/// Poll cadence for each of the five worker loops.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollIntervalsConfig {
    pub verify_secs: u64,
    pub swap_secs: u64,
    pub stable_secs: u64,
    pub replace_secs: u64,
    pub accept_secs: u64,
}

impl Default for PollIntervalsConfig {
    fn default() -> Self {
        Self {
            verify_secs: 10,
            swap_secs: 5,
            stable_secs: 15,
            replace_secs: 60,
            accept_secs: 5,
        }
    }
}

fn default_max_verify_lifetime_secs() -> u64 {
    86_400
}

fn default_max_do_swap_lifetime_secs() -> u64 {
    3_600
}

fn default_ageing_threshold_secs() -> u64 {
    600
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dcrm: Option<DcrmConfig>,
    pub src_chain: ChainSlotConfig,
    pub dst_chain: ChainSlotConfig,
    /// `pair_id -> destination signer address`, routing `SwapWorker`
    /// dispatch to one consumer task per signer.
    #[serde(default)]
    pub signer_for_pair: HashMap<String, String>,
    #[serde(default)]
    pub poll: PollIntervalsConfig,
    #[serde(default = "default_max_verify_lifetime_secs")]
    pub max_verify_lifetime_secs: u64,
    #[serde(default = "default_max_do_swap_lifetime_secs")]
    pub max_do_swap_lifetime_secs: u64,
    #[serde(default = "default_ageing_threshold_secs")]
    pub ageing_threshold_secs: u64,
    #[serde(default)]
    pub big_value_threshold: Option<Decimal>,
    /// Addresses VerifyWorker rejects outright.
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Config {
    /// Loads configuration from CLI arguments and the JSON file they point
    /// to. The config path defaults to `./config.json` and can be overridden
    /// via `--config`/`-c` or the `CONFIG` env var.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let config_path = cli_args
            .config
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "src_chain": {
                "kind": "btc",
                "network": "regtest",
                "rpc_url": "http://127.0.0.1:18443",
                "rpc_user": "user",
                "rpc_password": "pass",
                "tokens": {}
            },
            "dst_chain": {
                "kind": "evm",
                "chain_id": 1337,
                "signers": ["0x0101010101010101010101010101010101010101010101010101010101010101"],
                "rpc": [{"http": "http://127.0.0.1:8545"}]
            },
            "signer_for_pair": {"btc/usdc": "0x000000000000000000000000000000000000aa"}
        }"#
    }

    #[test]
    fn parses_a_two_chain_config_with_a_signer_route() {
        let config: Config = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(
            config.src_chain.native_tx_type(),
            swapbridge_core::model::TxType::P2shSwapin
        );
        assert_eq!(
            config.dst_chain.native_tx_type(),
            swapbridge_core::model::TxType::Swapin
        );
        assert_eq!(
            config.signer_for_pair.get("btc/usdc").map(String::as_str),
            Some("0x000000000000000000000000000000000000aa")
        );
    }

    #[test]
    fn rejects_a_signer_hex_string_of_the_wrong_length() {
        let json = sample_json().replace(
            "0x0101010101010101010101010101010101010101010101010101010101010101",
            "0x01",
        );
        assert!(serde_json::from_str::<Config>(&json).is_err());
    }

    #[test]
    fn poll_intervals_default_when_omitted() {
        let json = r#"{
            "src_chain": {"kind": "btc", "network": "regtest", "rpc_url": "http://127.0.0.1:18443", "rpc_user": "u", "rpc_password": "p"},
            "dst_chain": {"kind": "btc", "network": "regtest", "rpc_url": "http://127.0.0.1:18444", "rpc_user": "u", "rpc_password": "p"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.poll.verify_secs, 10);
        assert_eq!(config.poll.accept_secs, 5);
        assert!(config.dcrm.is_none());
        assert!(matches!(config.store, StoreConfig::Memory));
    }

    #[test]
    fn native_tx_type_follows_adapter_kind() {
        let btc = ChainSlotConfig::Btc(BtcChainConfig {
            network: swapbridge_chain_btc::BtcNetwork::Regtest,
            rpc_url: url::Url::parse("http://127.0.0.1:18443").unwrap(),
            rpc_user: LiteralOrEnv::from_literal("u".to_string()),
            rpc_password: LiteralOrEnv::from_literal("p".to_string()),
            required_confirmations: 1,
            fee_sats: 2_000,
            tokens: HashMap::new(),
        });
        assert_eq!(btc.native_tx_type(), TxType::P2shSwapin);
    }
}

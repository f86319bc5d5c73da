use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use swapbridge_types::chain::ChainId;
use swapbridge_types::config::{LiteralOrEnv, RpcConfig};

use crate::chain::types::ChecksummedAddress;
use crate::chain::Eip155ChainReference;

#[derive(Debug, Clone)]
pub struct Eip155ChainConfig {
    pub chain_reference: Eip155ChainReference,
    pub inner: Eip155ChainConfigInner,
}

impl Eip155ChainConfig {
    pub fn chain_id(&self) -> ChainId {
        self.chain_reference.into()
    }
    pub fn eip1559(&self) -> bool {
        self.inner.eip1559
    }
    pub fn flashblocks(&self) -> bool {
        self.inner.flashblocks
    }
    pub fn receipt_timeout_secs(&self) -> u64 {
        self.inner.receipt_timeout_secs
    }
    pub fn signers(&self) -> &Eip155SignersConfig {
        &self.inner.signers
    }
    pub fn rpc(&self) -> &Vec<RpcConfig> {
        &self.inner.rpc
    }
    pub fn chain_reference(&self) -> Eip155ChainReference {
        self.chain_reference
    }
    pub fn required_confirmations(&self) -> u64 {
        self.inner.required_confirmations
    }
    pub fn tokens(&self) -> &HashMap<String, Eip155PairConfig> {
        &self.inner.tokens
    }
}

/// Configuration specific to EVM-compatible chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eip155ChainConfigInner {
    /// Whether the chain supports EIP-1559 gas pricing.
    #[serde(default = "eip155_chain_config::default_eip1559")]
    pub eip1559: bool,
    /// Whether the chain supports flashblocks.
    #[serde(default = "eip155_chain_config::default_flashblocks")]
    pub flashblocks: bool,
    /// Signer configuration for this chain (required).
    /// Array of private keys (hex format) or env var references.
    pub signers: Eip155SignersConfig,
    /// RPC provider configuration for this chain (required).
    pub rpc: Vec<RpcConfig>,
    /// How long to wait till the transaction receipt is available (optional)
    #[serde(default = "eip155_chain_config::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Confirmations required before a destination tx counts as stable.
    #[serde(default = "eip155_chain_config::default_required_confirmations")]
    pub required_confirmations: u64,
    /// Per-pair token deployment and deposit-address configuration, keyed by
    /// `pair_id` (e.g. `"eth/usdc"`).
    #[serde(default)]
    pub tokens: HashMap<String, Eip155PairConfig>,
}

mod eip155_chain_config {
    pub fn default_eip1559() -> bool {
        true
    }
    pub fn default_flashblocks() -> bool {
        false
    }
    pub fn default_receipt_timeout_secs() -> u64 {
        30
    }
    pub fn default_required_confirmations() -> u64 {
        12
    }
    pub fn default_dcrm_mode() -> u32 {
        9
    }
}

/// Configuration for a single token pair on this chain: what asset moves
/// (native or a specific ERC-20 contract), where deposits must land, and how
/// outbound transfers on this pair get signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eip155PairConfig {
    /// `None` for the chain's native asset, `Some(contract)` for an ERC-20.
    #[serde(default)]
    pub contract: Option<ChecksummedAddress>,
    pub decimals: u8,
    /// The address deposits for this pair must be sent to, and from which
    /// outbound settlements for this pair are sent.
    pub deposit_address: ChecksummedAddress,
    /// Present when this pair is signed by the remote DCRM group instead of
    /// a locally configured key.
    #[serde(default)]
    pub dcrm: Option<Eip155DcrmPairConfig>,
    /// When true, SwapWorker silently skips settlement for this pair.
    #[serde(default)]
    pub disabled: bool,
}

/// DCRM group coordinates for a pair whose outbound signing goes through the
/// threshold signer instead of a local private key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eip155DcrmPairConfig {
    pub pubkey: String,
    pub group_id: String,
    pub threshold: String,
    #[serde(default = "eip155_chain_config::default_dcrm_mode")]
    pub mode: u32,
}

/// Configuration for EVM signers.
///
/// Deserializes an array of private key strings (hex format, 0x-prefixed) and
/// validates them as valid 32-byte private keys. The `EthereumWallet` is created
/// lazily when needed via the `wallet()` method.
///
/// Each string can be:
/// - A literal hex private key: `"0xcafe..."`
/// - An environment variable reference: `"$PRIVATE_KEY"` or `"${PRIVATE_KEY}"`
///
/// Example JSON:
/// ```json
/// {
///   "signers": [
///     "$HOT_WALLET_KEY",
///     "0xcafe000000000000000000000000000000000000000000000000000000000001"
///   ]
/// }
/// ```
pub type Eip155SignersConfig = Vec<LiteralOrEnv<EvmPrivateKey>>;

// ============================================================================
// EVM Private Key
// ============================================================================

/// A validated EVM private key (32 bytes).
///
/// This type represents a raw private key that has been validated as a proper
/// 32-byte hex value. It can be converted to a `PrivateKeySigner` when needed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    /// Get the raw 32 bytes of the private key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl PartialEq for EvmPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {}", e))
    }
}

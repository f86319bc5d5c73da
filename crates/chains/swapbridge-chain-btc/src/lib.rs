//! Bitcoin-style UTXO chain adapter for the swap bridge daemon.
//!
//! Implements `swapbridge_core::ChainBridge` for a single Bitcoin-compatible
//! RPC node: each bind address gets its own deterministically derived P2SH
//! deposit address (`P2shRegistrar::derive_p2sh_address`), and deposits to it
//! are verified by recognizing that address among a transaction's outputs.
//! Outbound settlements spend the pair's pooled P2WPKH address and are built,
//! signed (locally or through DCRM), and broadcast against that node.

pub mod config;
pub mod provider;

pub use config::{BtcChainConfig, BtcDcrmPairConfig, BtcNetwork, BtcPairConfig};
pub use provider::{BtcBridgeConfigError, BtcChainBridge};

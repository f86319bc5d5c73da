//! EVM chain adapter for the swap bridge daemon.
//!
//! Implements `swapbridge_core::ChainBridge` for EVM-compatible chains:
//! native-asset and single-ERC-20-per-pair transfers, verified and broadcast
//! through an `alloy` provider with automatic RPC fallback. Outbound
//! transactions are signed either with a locally configured key or, for
//! pairs marked as such in configuration, through the daemon's shared DCRM
//! client.
//!
//! # Modules
//!
//! - [`chain`] - chain types, configuration, the nonce manager, and the
//!   `ChainBridge` implementation itself ([`chain::provider::EvmChainBridge`])

pub mod chain;

pub use chain::provider::{EvmBridgeConfigError, EvmChainBridge};

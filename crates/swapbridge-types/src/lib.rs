#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Shared types for the swap bridge: chain identifiers, configuration
//! primitives, timestamps, and decimal amount parsing. Chain-specific
//! adapters (`swapbridge-chain-evm`, `swapbridge-chain-btc`) and the core
//! engine (`swapbridge-core`) all depend on this crate so that they agree on
//! one representation for these cross-cutting concerns.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2-style chain identifiers and the `ChainRegistry`/`FromConfig` pattern
//! - [`config`] - RPC endpoint config and `LiteralOrEnv` secret resolution
//! - [`networks`] - Registry of well-known networks, for friendlier config files
//! - [`timestamp`] - Unix timestamp newtype used on persisted records
//! - [`util`] - Base64 and decimal-amount helpers

pub mod chain;
pub mod config;
pub mod networks;
pub mod timestamp;
pub mod util;

//! EVM chain adapter.
//!
//! Implements transfer construction, signing and broadcast against
//! EVM-compatible chains (native asset or a single ERC-20 per pair), reached
//! through an `alloy` provider stack with automatic RPC fallback.
//!
//! # Submodules
//!
//! - [`types`] - Wire format types like [`ChecksummedAddress`]
//! - [`config`] - Per-chain configuration (signers, RPC endpoints)
//! - [`pending_nonce_manager`] - Local nonce tracking for concurrent sends
//! - [`provider`] - The `ChainBridge` implementation itself
//! - [`erc20`] - Minimal ERC-20 ABI bindings

pub mod config;

pub mod pending_nonce_manager;
pub use pending_nonce_manager::*;

pub mod provider;
pub use provider::*;

pub mod erc20;

pub mod types;
pub use types::*;

//! Cross-chain swap bridge daemon core.
//!
//! Owns the swap lifecycle state machine — the persistent [`store::Store`],
//! the per-chain [`chain_bridge::ChainBridge`] contract, and the workers that
//! drive a deposit from first sighting to a terminal [`status::Status`].

pub mod chain_bridge;
pub mod dcrm;
pub mod error;
pub mod history_ring;
pub mod model;
pub mod status;
pub mod store;
pub mod workers;

pub use chain_bridge::{ChainBridge, NonceSetter, P2shRegistrar};
pub use dcrm::DcrmClient;
pub use error::{BridgeError, ChainBridgeError, DcrmError, StoreError, VerifyError};
pub use model::{Swap, SwapKey, SwapResult, SwapResultUpdate, TxType};
pub use status::Status;
pub use store::{Direction, InMemoryStore, SledStore, Store};

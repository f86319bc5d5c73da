//! Cross-chain swap bridge daemon.
//!
//! Wires a persistent `Store`, a source and destination `ChainBridge`, and
//! (if configured) a shared DCRM client into the five worker loops that
//! drive a deposit from first sighting to a terminal status.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | CLI args and the JSON config file they load |
//! | [`run`] | Builds the store/bridges/workers and runs until shutdown |
//! | [`sig_down`] | `SIGTERM`/`SIGINT` to `CancellationToken` plumbing |
//!
//! # Running
//!
//! ```bash
//! cargo run --package swapbridge-daemon -- --config /path/to/config.json
//! ```

pub mod config;
pub mod run;
pub mod sig_down;

pub use run::run;

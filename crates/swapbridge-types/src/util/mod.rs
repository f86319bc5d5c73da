//! Small helper types shared across the bridge crates.
//!
//! - [`b64`] - Base64 encoding/decoding utilities
//! - [`money_amount`] - Human-readable decimal amount parsing

pub mod b64;
pub mod money_amount;

pub use b64::*;

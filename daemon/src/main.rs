//! Cross-chain swap bridge daemon entrypoint.

mod config;
mod run;
mod sig_down;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        println!("{e}");
        process::exit(1)
    }
}

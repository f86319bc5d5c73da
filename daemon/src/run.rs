//! Cross-chain swap bridge daemon entrypoint.
//!
//! Wires one `Store`, up to two `ChainBridge` adapters (source and
//! destination) and, if configured, one shared DCRM client into the five
//! worker loops, then runs until `SIGTERM`/`SIGINT`.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `RUST_LOG` controls the tracing filter, falling back to the config
//!   file's `log_filter`

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use alloy_signer_local::PrivateKeySigner;
use dashmap::DashSet;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use swapbridge_core::dcrm::DcrmClient;
use swapbridge_core::store::{InMemoryStore, SledStore, Store};
use swapbridge_core::workers::{AcceptWorker, ReplaceWorker, StableWorker, SwapWorker, VerifyWorker};
use swapbridge_dcrm::DcrmRpcClient;

use crate::config::{ChainBuildError, Config, ConfigError, StoreConfig};
use crate::sig_down::SigDown;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ChainBuild(#[from] ChainBuildError),
    #[error(transparent)]
    Store(#[from] swapbridge_core::StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid dcrm signer key: {0}")]
    DcrmSigner(String),
}

pub async fn run() -> Result<(), RunError> {
    dotenv().ok();

    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone())),
        )
        .init();

    let store: Arc<dyn Store> = match &config.store {
        StoreConfig::Sled { path } => Arc::new(SledStore::open(path)?),
        StoreConfig::Memory => Arc::new(InMemoryStore::new()),
    };

    let dcrm: Option<Arc<dyn DcrmClient>> = match &config.dcrm {
        Some(dcrm_config) => {
            let bytes = B256::from_slice(dcrm_config.signer_key.inner().as_bytes());
            let signer = PrivateKeySigner::from_bytes(&bytes)
                .map_err(|e| RunError::DcrmSigner(e.to_string()))?;
            Some(Arc::new(DcrmRpcClient::new(dcrm_config.endpoint.clone(), signer)))
        }
        None => None,
    };

    let src_bridge = config.src_chain.build_bridge(dcrm.clone(), store.clone()).await?;
    let dst_bridge = config.dst_chain.build_bridge(dcrm.clone(), store.clone()).await?;
    let deposit_tx_type = config.src_chain.native_tx_type();

    let blacklist = Arc::new(DashSet::new());
    for address in &config.blacklist {
        blacklist.insert(address.to_lowercase());
    }

    let sig_down = SigDown::try_new()?;
    let token = sig_down.cancellation_token();

    let verify_worker = Arc::new(VerifyWorker::new(
        store.clone(),
        src_bridge.clone(),
        deposit_tx_type,
        Duration::from_secs(config.poll.verify_secs),
        Duration::from_secs(config.max_verify_lifetime_secs),
        config.big_value_threshold,
        blacklist,
    ));
    let swap_worker = Arc::new(SwapWorker::new(
        store.clone(),
        dst_bridge.clone(),
        deposit_tx_type,
        Duration::from_secs(config.poll.swap_secs),
        Duration::from_secs(config.max_do_swap_lifetime_secs),
        config.signer_for_pair.clone(),
    ));
    let stable_worker = Arc::new(StableWorker::new(
        store.clone(),
        dst_bridge.clone(),
        Duration::from_secs(config.poll.stable_secs),
    ));
    let replace_worker = Arc::new(ReplaceWorker::new(
        store.clone(),
        dst_bridge.clone(),
        Duration::from_secs(config.poll.replace_secs),
        Duration::from_secs(config.ageing_threshold_secs),
    ));

    let mut handles = Vec::new();
    {
        let worker = verify_worker.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }
    {
        let worker = swap_worker.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }
    {
        let worker = stable_worker.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }
    {
        let worker = replace_worker.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }
    // AcceptWorker only makes sense when this node is itself a DCRM group
    // member it needs to vote as; skipped entirely for local-key-only setups.
    if let Some(dcrm) = dcrm.clone() {
        let accept_worker = Arc::new(AcceptWorker::new(
            store.clone(),
            src_bridge.clone(),
            dcrm,
            Duration::from_secs(config.poll.accept_secs),
        ));
        let token = token.clone();
        handles.push(tokio::spawn(async move { accept_worker.run(token).await }));
    }

    tracing::info!("swap bridge daemon started");
    sig_down.recv().await;
    tracing::info!("shutdown signal received, draining worker loops");

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

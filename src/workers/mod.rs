//! The five worker loops that drive a deposit from first sighting to a
//! terminal status. Each is its own `tokio::spawn`ed task polling
//! independently, per §5's concurrency model.

pub mod accept;
pub mod replace;
pub mod stable;
pub mod swap;
pub mod verify;

pub use accept::AcceptWorker;
pub use replace::ReplaceWorker;
pub use stable::StableWorker;
pub use swap::SwapWorker;
pub use verify::VerifyWorker;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleeps for `interval` or returns early if `token` is cancelled. Every
/// worker loop calls this between ticks rather than a bare `tokio::time::sleep`
/// so shutdown is observed promptly instead of at the next tick boundary.
pub(crate) async fn sleep_or_cancelled(interval: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        _ = token.cancelled() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_short_circuits_the_sleep() {
        let token = CancellationToken::new();
        token.cancel();
        let cancelled = sleep_or_cancelled(Duration::from_secs(3600), &token).await;
        assert!(cancelled);
    }
}

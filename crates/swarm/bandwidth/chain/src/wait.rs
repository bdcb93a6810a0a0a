use std::time::Duration;

use alloy_primitives::B256;
use tracing::{debug, trace};

use crate::{ChainBackend, ChainError, Receipt, ShutdownSignal};

/// Poll for the receipt of `hash` every `poll_interval`.
///
/// Lookup errors are logged and retried. Returns [`ChainError::Cancelled`]
/// once `shutdown` fires.
pub async fn wait_mined(
    backend: &dyn ChainBackend,
    hash: B256,
    poll_interval: Duration,
    shutdown: &ShutdownSignal,
) -> Result<Receipt, ChainError> {
    loop {
        match backend.transaction_receipt(hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => trace!(%hash, "Transaction not yet mined"),
            Err(e) => debug!(%hash, error = %e, "Receipt lookup failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.cancelled() => return Err(ChainError::Cancelled),
        }
    }
}

/// [`wait_mined`] bounded by `timeout`.
pub async fn wait_mined_with_timeout(
    backend: &dyn ChainBackend,
    hash: B256,
    poll_interval: Duration,
    timeout: Duration,
    shutdown: &ShutdownSignal,
) -> Result<Receipt, ChainError> {
    tokio::time::timeout(timeout, wait_mined(backend, hash, poll_interval, shutdown))
        .await
        .map_err(|_| ChainError::Timeout(hash))?
}

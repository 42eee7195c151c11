//! Bounded polling for sealed transactions

use super::query::{TransactionStatus, TransactionStatusSource};
use crate::config::PollPolicy;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Cooperative cancellation shared between a caller and a poll loop
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as this token
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll `source` until `tx_id` is sealed
///
/// Lookup errors count as a failed attempt and are retried. Fails with
/// `Timeout` after `policy.max_attempts` polls and with `Cancelled` as soon
/// as `cancel` fires.
#[instrument(skip(source, cancel), fields(max_attempts = policy.max_attempts))]
pub async fn wait_for_seal(
    source: &dyn TransactionStatusSource,
    tx_id: &str,
    policy: PollPolicy,
    cancel: &CancelToken,
) -> Result<TransactionStatus> {
    let cancelled = || Error::Cancelled {
        operation: format!("wait_for_seal {}", tx_id),
    };

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        match source.transaction_status(tx_id).await {
            Ok(TransactionStatus::Sealed) => {
                info!(attempt, "Transaction sealed");
                return Ok(TransactionStatus::Sealed);
            }
            Ok(TransactionStatus::Expired) => {
                return Err(Error::network(
                    "wait_for_seal",
                    format!("transaction {} expired", tx_id),
                ));
            }
            Ok(status) => debug!(attempt, ?status, "Transaction not sealed yet"),
            Err(e) => warn!(attempt, error = %e, "Transaction status lookup failed"),
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(policy.interval()) => {}
            }
        }
    }

    Err(Error::Timeout {
        operation: format!("wait_for_seal {}", tx_id),
        attempts: policy.max_attempts,
    })
}

//! Execution client contract and retry wrapper

use crate::order::Order;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Execution transport errors
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("order submission failed: {0}")]
    Submit(String),
    #[error("order cancellation failed: {0}")]
    Cancel(String),
}

/// Exchange order gateway, injected by the host
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Submit an order; returns the exchange order id.
    async fn submit_order(&self, order: &Order) -> Result<String, ExecutionError>;

    /// Cancel an order by exchange id.
    async fn cancel_order(&self, exchange_id: &str) -> Result<(), ExecutionError>;
}

/// Submit with bounded retries and doubling backoff.
pub async fn submit_with_retry(
    client: &dyn ExecutionClient,
    order: &Order,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<String, ExecutionError> {
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match client.submit_order(order).await {
            Ok(exchange_id) => return Ok(exchange_id),
            Err(e) if attempt < max_attempts => {
                warn!(
                    order_id = %order.id,
                    attempt,
                    error = %e,
                    "order submission failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

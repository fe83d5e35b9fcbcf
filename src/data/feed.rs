//! Market data feed contract
//!
//! The feed is an injected collaborator: it pushes normalized tick and
//! kline events per subscribed symbol and guarantees kline events arrive
//! in non-decreasing timestamp order per symbol.

use crate::data::{Kline, MarketTick};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Normalized market data event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    /// Instantaneous price update
    Tick(MarketTick),
    /// Closed candle
    Kline(Kline),
}

/// Market data feed collaborator
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Subscribe to the given symbols; events arrive on the returned channel.
    async fn subscribe(&self, symbols: &[String]) -> Result<mpsc::Receiver<MarketEvent>>;
}

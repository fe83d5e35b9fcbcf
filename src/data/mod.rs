//! Market data structures and feed contract

pub mod candle;
pub mod feed;

pub use candle::{Kline, KlineSeries, MarketTick};
pub use feed::{MarketDataFeed, MarketEvent};

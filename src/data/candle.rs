//! OHLCV kline and tick data structures

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Closed OHLCV candle for a fixed interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    /// Symbol (e.g., "BTC-USDT")
    pub symbol: String,
    /// Opening price
    pub open: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Volume
    pub volume: Decimal,
    /// Candle close timestamp
    pub timestamp: DateTime<Utc>,
    /// Interval (e.g., "5m", "1h", "1d")
    pub interval: String,
}

impl Kline {
    /// Create a new kline
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        timestamp: DateTime<Utc>,
        interval: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
            timestamp,
            interval: interval.into(),
        }
    }

    /// Typical price (HLC/3)
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// Instantaneous price update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    /// Symbol
    pub symbol: String,
    /// Last traded price
    pub last_price: Decimal,
    /// Tick timestamp
    pub timestamp: DateTime<Utc>,
}

impl MarketTick {
    /// Create a new tick
    pub fn new(symbol: impl Into<String>, last_price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            timestamp,
        }
    }
}

/// Ordered collection of klines for one symbol/interval
#[derive(Debug, Clone, Default)]
pub struct KlineSeries {
    klines: Vec<Kline>,
}

impl KlineSeries {
    /// Create new empty series
    pub fn new() -> Self {
        Self { klines: Vec::new() }
    }

    /// Create from vector of klines
    pub fn from_vec(klines: Vec<Kline>) -> Self {
        Self { klines }
    }

    /// Append a kline
    pub fn push(&mut self, kline: Kline) {
        self.klines.push(kline);
    }

    /// Number of klines
    pub fn len(&self) -> usize {
        self.klines.len()
    }

    /// Check if series is empty
    pub fn is_empty(&self) -> bool {
        self.klines.is_empty()
    }

    /// Last kline
    pub fn last(&self) -> Option<&Kline> {
        self.klines.last()
    }

    /// All klines
    pub fn klines(&self) -> &[Kline] {
        &self.klines
    }

    /// Sort by timestamp (oldest first)
    pub fn sort_by_time(&mut self) {
        self.klines.sort_by_key(|k| k.timestamp);
    }

    /// True when timestamps are non-decreasing
    pub fn is_time_ordered(&self) -> bool {
        self.klines
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    }
}

impl From<Vec<Kline>> for KlineSeries {
    fn from(klines: Vec<Kline>) -> Self {
        Self::from_vec(klines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kline(close: i64, minute: u32) -> Kline {
        let c = Decimal::from(close);
        Kline::new(
            "BTC-USDT",
            c,
            c + Decimal::ONE,
            c - Decimal::ONE,
            c,
            Decimal::from(100),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            "1m",
        )
    }

    #[test]
    fn test_push_and_last() {
        let mut series = KlineSeries::new();
        assert!(series.is_empty());
        series.push(kline(100, 0));
        series.push(kline(101, 1));
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, Decimal::from(101));
    }

    #[test]
    fn test_sort_restores_time_order() {
        let mut series = KlineSeries::from_vec(vec![kline(102, 2), kline(100, 0), kline(101, 1)]);
        assert!(!series.is_time_ordered());
        series.sort_by_time();
        assert!(series.is_time_ordered());
        assert_eq!(series.klines()[0].close, Decimal::from(100));
    }

    #[test]
    fn test_equal_timestamps_count_as_ordered() {
        let series = KlineSeries::from_vec(vec![kline(100, 0), kline(101, 0)]);
        assert!(series.is_time_ordered());
    }
}

//! Technical indicators
//!
//! Each indicator consumes closed klines one at a time and exposes its
//! current value once warmed up. Computation is wrapped behind the
//! [`Indicator`] trait so the cache can hold heterogeneous indicators in
//! one table keyed by [`IndicatorKind`].

pub mod adx;
pub mod atr;
pub mod bb;
pub mod cache;
pub mod ema;
pub mod keltner;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod types;
pub mod vwap;

pub use cache::IndicatorCache;
pub use types::{IndicatorKind, IndicatorSpec, IndicatorValue};

use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use ta::DataItem;

/// Incremental indicator over closed klines
pub trait Indicator: Send {
    /// Feed one closed kline.
    fn update(&mut self, kline: &Kline);

    /// Current value, or `None` while warming up.
    fn value(&self) -> Option<IndicatorValue>;

    /// True once enough klines have been consumed to produce a value.
    fn is_ready(&self) -> bool {
        self.value().is_some()
    }
}

impl IndicatorKind {
    /// Instantiate the indicator for this kind.
    pub fn build(&self) -> Result<Box<dyn Indicator>> {
        self.validate().map_err(|e| anyhow!(e))?;
        let indicator: Box<dyn Indicator> = match self {
            Self::Rsi { period } => Box::new(rsi::Rsi::new(*period)?),
            Self::Ema { period } => Box::new(ema::Ema::new(*period)?),
            Self::Sma { period } => Box::new(sma::Sma::new(*period)?),
            Self::Macd { fast, slow, signal } => {
                Box::new(macd::Macd::new(*fast, *slow, *signal)?)
            }
            Self::BollingerBands { period, std_dev } => {
                Box::new(bb::BollingerBands::new(*period, *std_dev)?)
            }
            Self::Atr { period } => Box::new(atr::Atr::new(*period)?),
            Self::Adx { period } => Box::new(adx::Adx::new(*period)),
            Self::Stochastic { period, smooth } => {
                Box::new(stochastic::Stochastic::new(*period, *smooth)?)
            }
            Self::Vwap { period } => Box::new(vwap::Vwap::new(*period)),
            Self::Keltner { period, multiplier } => {
                Box::new(keltner::Keltner::new(*period, *multiplier)?)
            }
        };
        Ok(indicator)
    }
}

/// Lossy conversion into the float domain the `ta` crate computes in.
pub(crate) fn dec_to_f64(value: Decimal) -> Option<f64> {
    value.to_f64().filter(|v| v.is_finite())
}

/// Convert a `ta` result back to an exact decimal at price precision.
/// Non-finite floats map to `None` so a bad kline never poisons a value.
pub(crate) fn f64_to_dec(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64_retain(value).map(crate::decimal::round_price)
}

/// Build a `ta::DataItem` from a kline, `None` when OHLCV is inconsistent.
pub(crate) fn data_item(kline: &Kline) -> Option<DataItem> {
    DataItem::builder()
        .open(dec_to_f64(kline.open)?)
        .high(dec_to_f64(kline.high)?)
        .low(dec_to_f64(kline.low)?)
        .close(dec_to_f64(kline.close)?)
        .volume(dec_to_f64(kline.volume)?)
        .build()
        .ok()
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// Flat-ish kline at the given close for indicator feeding in tests.
    pub fn kline_at(close: f64, minute: u32) -> Kline {
        let c = Decimal::from_f64_retain(close).unwrap();
        let spread = Decimal::new(5, 1);
        Kline::new(
            "BTC-USDT",
            c,
            c + spread,
            c - spread,
            c,
            Decimal::from(100),
            Utc.with_ymd_and_hms(2024, 1, 1, minute / 60, minute % 60, 0).unwrap(),
            "1m",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::kline_at;
    use super::*;

    #[test]
    fn test_build_all_kinds() {
        let kinds = vec![
            IndicatorKind::Rsi { period: 14 },
            IndicatorKind::Ema { period: 9 },
            IndicatorKind::Sma { period: 20 },
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
            IndicatorKind::BollingerBands {
                period: 20,
                std_dev: Decimal::from(2),
            },
            IndicatorKind::Atr { period: 14 },
            IndicatorKind::Adx { period: 14 },
            IndicatorKind::Stochastic {
                period: 14,
                smooth: 3,
            },
            IndicatorKind::Vwap { period: 14 },
            IndicatorKind::Keltner {
                period: 20,
                multiplier: Decimal::from(2),
            },
        ];
        for kind in kinds {
            assert!(kind.build().is_ok(), "failed to build {kind:?}");
        }
    }

    #[test]
    fn test_warm_up_gates_values() {
        for kind in [
            IndicatorKind::Rsi { period: 5 },
            IndicatorKind::Adx { period: 5 },
            IndicatorKind::Stochastic { period: 5, smooth: 3 },
            IndicatorKind::Vwap { period: 5 },
        ] {
            let mut indicator = kind.build().unwrap();
            let warm_up = kind.warm_up();
            for i in 0..warm_up {
                indicator.update(&kline_at(100.0 + i as f64, i as u32));
            }
            assert!(
                indicator.is_ready(),
                "{kind:?} not ready after {warm_up} klines"
            );
        }
    }

    #[test]
    fn test_data_item_rejects_inconsistent_ohlc() {
        let mut kline = kline_at(100.0, 0);
        kline.high = Decimal::from(90);
        assert!(data_item(&kline).is_none());
    }
}

//! Exponential Moving Average

use super::{dec_to_f64, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::Decimal;
use ta::indicators::ExponentialMovingAverage;
use ta::Next;

pub struct Ema {
    inner: ExponentialMovingAverage,
    warm_up: usize,
    count: usize,
    current: Option<Decimal>,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self> {
        Ok(Self {
            inner: ExponentialMovingAverage::new(period).map_err(|e| anyhow!(e.to_string()))?,
            warm_up: period,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for Ema {
    fn update(&mut self, kline: &Kline) {
        let Some(close) = dec_to_f64(kline.close) else {
            return;
        };
        let value = self.inner.next(close);
        self.count += 1;
        if self.count >= self.warm_up {
            self.current = f64_to_dec(value);
        }
    }

    fn value(&self) -> Option<IndicatorValue> {
        self.current.map(IndicatorValue::Scalar)
    }
}

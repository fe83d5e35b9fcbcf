//! Moving Average Convergence Divergence

use super::{dec_to_f64, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use ta::indicators::MovingAverageConvergenceDivergence;
use ta::Next;

pub struct Macd {
    inner: MovingAverageConvergenceDivergence,
    warm_up: usize,
    count: usize,
    current: Option<BTreeMap<String, Decimal>>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self> {
        Ok(Self {
            inner: MovingAverageConvergenceDivergence::new(fast, slow, signal)
                .map_err(|e| anyhow!(e.to_string()))?,
            warm_up: slow + signal,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for Macd {
    fn update(&mut self, kline: &Kline) {
        let Some(close) = dec_to_f64(kline.close) else {
            return;
        };
        let output = self.inner.next(close);
        self.count += 1;
        if self.count < self.warm_up {
            return;
        }
        let (Some(macd), Some(signal), Some(histogram)) = (
            f64_to_dec(output.macd),
            f64_to_dec(output.signal),
            f64_to_dec(output.histogram),
        ) else {
            return;
        };
        let mut fields = BTreeMap::new();
        fields.insert("macd".to_string(), macd);
        fields.insert("signal".to_string(), signal);
        fields.insert("histogram".to_string(), histogram);
        self.current = Some(fields);
    }

    fn value(&self) -> Option<IndicatorValue> {
        self.current.clone().map(IndicatorValue::Fields)
    }
}

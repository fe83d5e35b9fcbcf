//! Stochastic oscillator (slow %K / %D)

use super::{data_item, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use ta::indicators::{FastStochastic, SimpleMovingAverage};
use ta::Next;

pub struct Stochastic {
    fast: FastStochastic,
    k_smooth: SimpleMovingAverage,
    d_smooth: SimpleMovingAverage,
    warm_up: usize,
    count: usize,
    current: Option<BTreeMap<String, Decimal>>,
}

impl Stochastic {
    pub fn new(period: usize, smooth: usize) -> Result<Self> {
        Ok(Self {
            fast: FastStochastic::new(period).map_err(|e| anyhow!(e.to_string()))?,
            k_smooth: SimpleMovingAverage::new(smooth).map_err(|e| anyhow!(e.to_string()))?,
            d_smooth: SimpleMovingAverage::new(smooth).map_err(|e| anyhow!(e.to_string()))?,
            warm_up: period + 2 * smooth,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for Stochastic {
    fn update(&mut self, kline: &Kline) {
        let Some(item) = data_item(kline) else {
            return;
        };
        let raw_k = self.fast.next(&item);
        let k = self.k_smooth.next(raw_k);
        let d = self.d_smooth.next(k);
        self.count += 1;
        if self.count < self.warm_up {
            return;
        }
        let (Some(k), Some(d)) = (f64_to_dec(k), f64_to_dec(d)) else {
            return;
        };
        let mut fields = BTreeMap::new();
        fields.insert("k".to_string(), k);
        fields.insert("d".to_string(), d);
        self.current = Some(fields);
    }

    fn value(&self) -> Option<IndicatorValue> {
        self.current.clone().map(IndicatorValue::Fields)
    }
}

//! Average True Range

use super::{data_item, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::Decimal;
use ta::indicators::AverageTrueRange;
use ta::Next;

pub struct Atr {
    inner: AverageTrueRange,
    warm_up: usize,
    count: usize,
    current: Option<Decimal>,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self> {
        Ok(Self {
            inner: AverageTrueRange::new(period).map_err(|e| anyhow!(e.to_string()))?,
            warm_up: period + 1,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for Atr {
    fn update(&mut self, kline: &Kline) {
        let Some(item) = data_item(kline) else {
            return;
        };
        let value = self.inner.next(&item);
        self.count += 1;
        if self.count >= self.warm_up {
            self.current = f64_to_dec(value);
        }
    }

    fn value(&self) -> Option<IndicatorValue> {
        self.current.map(IndicatorValue::Scalar)
    }
}

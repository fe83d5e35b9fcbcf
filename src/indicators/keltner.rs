//! Keltner Channel

use super::{data_item, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use ta::indicators::KeltnerChannel;
use ta::Next;

pub struct Keltner {
    inner: KeltnerChannel,
    warm_up: usize,
    count: usize,
    current: Option<BTreeMap<String, Decimal>>,
}

impl Keltner {
    pub fn new(period: usize, multiplier: Decimal) -> Result<Self> {
        let multiplier = multiplier
            .to_f64()
            .ok_or_else(|| anyhow!("multiplier out of range: {multiplier}"))?;
        Ok(Self {
            inner: KeltnerChannel::new(period, multiplier).map_err(|e| anyhow!(e.to_string()))?,
            warm_up: period,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for Keltner {
    fn update(&mut self, kline: &Kline) {
        let Some(item) = data_item(kline) else {
            return;
        };
        let output = self.inner.next(&item);
        self.count += 1;
        if self.count < self.warm_up {
            return;
        }
        let (Some(upper), Some(middle), Some(lower)) = (
            f64_to_dec(output.upper),
            f64_to_dec(output.average),
            f64_to_dec(output.lower),
        ) else {
            return;
        };
        let mut fields = BTreeMap::new();
        fields.insert("upper".to_string(), upper);
        fields.insert("middle".to_string(), middle);
        fields.insert("lower".to_string(), lower);
        self.current = Some(fields);
    }

    fn value(&self) -> Option<IndicatorValue> {
        self.current.clone().map(IndicatorValue::Fields)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::kline_at;
    use super::*;

    #[test]
    fn test_channel_ordering() {
        let mut keltner = Keltner::new(10, Decimal::from(2)).unwrap();
        for i in 0..15 {
            keltner.update(&kline_at(100.0 + (i % 4) as f64, i));
        }
        let value = keltner.value().unwrap();
        assert!(value.field("upper").unwrap() > value.field("middle").unwrap());
        assert!(value.field("middle").unwrap() > value.field("lower").unwrap());
    }
}

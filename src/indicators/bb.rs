//! Bollinger Bands

use super::{dec_to_f64, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use ta::indicators::BollingerBands as TaBollingerBands;
use ta::Next;

pub struct BollingerBands {
    inner: TaBollingerBands,
    warm_up: usize,
    count: usize,
    current: Option<BTreeMap<String, Decimal>>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev: Decimal) -> Result<Self> {
        let multiplier = std_dev
            .to_f64()
            .ok_or_else(|| anyhow!("std_dev out of range: {std_dev}"))?;
        Ok(Self {
            inner: TaBollingerBands::new(period, multiplier).map_err(|e| anyhow!(e.to_string()))?,
            warm_up: period,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for BollingerBands {
    fn update(&mut self, kline: &Kline) {
        let Some(close) = dec_to_f64(kline.close) else {
            return;
        };
        let output = self.inner.next(close);
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

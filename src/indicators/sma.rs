//! Simple Moving Average

use super::{dec_to_f64, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;
use crate::Result;
use anyhow::anyhow;
use rust_decimal::Decimal;
use ta::indicators::SimpleMovingAverage;
use ta::Next;

pub struct Sma {
    inner: SimpleMovingAverage,
    warm_up: usize,
    count: usize,
    current: Option<Decimal>,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self> {
        Ok(Self {
            inner: SimpleMovingAverage::new(period).map_err(|e| anyhow!(e.to_string()))?,
            warm_up: period,
            count: 0,
            current: None,
        })
    }
}

impl Indicator for Sma {
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

#[cfg(test)]
mod tests {
    use super::super::test_util::kline_at;
    use super::*;

    #[test]
    fn test_sma_of_linear_series() {
        let mut sma = Sma::new(3).unwrap();
        for (i, close) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            sma.update(&kline_at(*close, i as u32));
        }
        // window is [2, 3, 4]
        assert_eq!(
            sma.value().unwrap().scalar().unwrap(),
            crate::decimal::round_price(Decimal::from(3)),
        );
    }
}

//! Rolling Volume Weighted Average Price
//!
//! Windowed VWAP over the last `period` klines using exact decimal sums,
//! anchored to typical price per candle.

use super::{Indicator, IndicatorValue};
use crate::data::Kline;
use crate::decimal;
use rust_decimal::Decimal;
use std::collections::VecDeque;

pub struct Vwap {
    period: usize,
    window: VecDeque<(Decimal, Decimal)>,
    pv_sum: Decimal,
    vol_sum: Decimal,
}

impl Vwap {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            pv_sum: Decimal::ZERO,
            vol_sum: Decimal::ZERO,
        }
    }
}

impl Indicator for Vwap {
    fn update(&mut self, kline: &Kline) {
        let pv = kline.typical_price() * kline.volume;
        self.window.push_back((pv, kline.volume));
        self.pv_sum += pv;
        self.vol_sum += kline.volume;
        if self.window.len() > self.period {
            if let Some((old_pv, old_vol)) = self.window.pop_front() {
                self.pv_sum -= old_pv;
                self.vol_sum -= old_vol;
            }
        }
    }

    fn value(&self) -> Option<IndicatorValue> {
        if self.window.len() < self.period {
            return None;
        }
        decimal::div(self.pv_sum, self.vol_sum)
            .ok()
            .map(|v| IndicatorValue::Scalar(decimal::round_price(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::kline_at;
    use super::*;

    #[test]
    fn test_vwap_tracks_typical_price_of_flat_series() {
        let mut vwap = Vwap::new(5);
        for i in 0..5 {
            vwap.update(&kline_at(100.0, i));
        }
        // flat series with equal volume: vwap equals the shared typical price
        let expected = decimal::round_price(kline_at(100.0, 0).typical_price());
        assert_eq!(vwap.value().unwrap().scalar().unwrap(), expected);
    }

    #[test]
    fn test_vwap_zero_volume_window_has_no_value() {
        let mut vwap = Vwap::new(2);
        for i in 0..2 {
            let mut kline = kline_at(100.0, i);
            kline.volume = Decimal::ZERO;
            vwap.update(&kline);
        }
        assert!(vwap.value().is_none());
    }
}

//! Average Directional Index
//!
//! Wilder's ADX computed incrementally: directional movement and true
//! range are smoothed over `period`, DX is derived from the directional
//! indices, and ADX is the Wilder average of the last `period` DX values.

use super::{dec_to_f64, f64_to_dec, Indicator, IndicatorValue};
use crate::data::Kline;

pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    sm_tr: f64,
    sm_plus: f64,
    sm_minus: f64,
    samples: usize,
    dx_sum: f64,
    dx_count: usize,
    adx: Option<f64>,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            sm_tr: 0.0,
            sm_plus: 0.0,
            sm_minus: 0.0,
            samples: 0,
            dx_sum: 0.0,
            dx_count: 0,
            adx: None,
        }
    }
}

impl Indicator for Adx {
    fn update(&mut self, kline: &Kline) {
        let (Some(high), Some(low), Some(close)) = (
            dec_to_f64(kline.high),
            dec_to_f64(kline.low),
            dec_to_f64(kline.close),
        ) else {
            return;
        };
        let Some((prev_high, prev_low, prev_close)) = self.prev.replace((high, low, close))
        else {
            return;
        };

        let up_move = high - prev_high;
        let down_move = prev_low - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };
        let true_range = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        self.samples += 1;
        if self.samples <= self.period {
            self.sm_tr += true_range;
            self.sm_plus += plus_dm;
            self.sm_minus += minus_dm;
            if self.samples < self.period {
                return;
            }
        } else {
            let n = self.period as f64;
            self.sm_tr = self.sm_tr - self.sm_tr / n + true_range;
            self.sm_plus = self.sm_plus - self.sm_plus / n + plus_dm;
            self.sm_minus = self.sm_minus - self.sm_minus / n + minus_dm;
        }

        if self.sm_tr == 0.0 {
            return;
        }
        let plus_di = 100.0 * self.sm_plus / self.sm_tr;
        let minus_di = 100.0 * self.sm_minus / self.sm_tr;
        let di_sum = plus_di + minus_di;
        if di_sum == 0.0 {
            return;
        }
        let dx = 100.0 * (plus_di - minus_di).abs() / di_sum;

        match self.adx {
            None => {
                self.dx_sum += dx;
                self.dx_count += 1;
                if self.dx_count == self.period {
                    self.adx = Some(self.dx_sum / self.period as f64);
                }
            }
            Some(prev) => {
                self.adx = Some((prev * (self.period as f64 - 1.0) + dx) / self.period as f64);
            }
        }
    }

    fn value(&self) -> Option<IndicatorValue> {
        self.adx.and_then(f64_to_dec).map(IndicatorValue::Scalar)
    }
}

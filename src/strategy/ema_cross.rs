//! Built-in EMA crossover strategy

use crate::config::ExitConfig;
use crate::data::Kline;
use crate::indicators::{IndicatorCache, IndicatorKind, IndicatorSpec};
use crate::portfolio::PosSide;
use crate::strategy::{
    MarketRegime, Signal, SignalAction, Strategy, StrategyMetadata, StrategyState,
};
use crate::Result;
use anyhow::bail;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Constructor parameters, deserializable from a registry params blob
#[derive(Debug, Clone, Deserialize)]
pub struct EmaCrossParams {
    #[serde(default = "default_fast")]
    pub fast: usize,
    #[serde(default = "default_slow")]
    pub slow: usize,
    #[serde(default)]
    pub take_profit_pct: Option<Decimal>,
    #[serde(default)]
    pub stop_loss_pct: Option<Decimal>,
}

fn default_fast() -> usize {
    12
}

fn default_slow() -> usize {
    26
}

impl Default for EmaCrossParams {
    fn default() -> Self {
        Self {
            fast: default_fast(),
            slow: default_slow(),
            take_profit_pct: None,
            stop_loss_pct: None,
        }
    }
}

/// Long on a golden cross, short on a death cross, flip on the opposite
/// cross while in a position.
pub struct EmaCrossStrategy {
    name: String,
    specs: Vec<IndicatorSpec>,
    exits: ExitConfig,
    warm_up: usize,
}

impl EmaCrossStrategy {
    pub fn new(params: EmaCrossParams) -> Result<Self> {
        if params.fast == 0 || params.fast >= params.slow {
            bail!(
                "ema_cross requires 0 < fast < slow, got fast={} slow={}",
                params.fast,
                params.slow
            );
        }
        let specs = vec![
            IndicatorSpec {
                id: "ema_fast".to_string(),
                kind: IndicatorKind::Ema {
                    period: params.fast,
                },
            },
            IndicatorSpec {
                id: "ema_slow".to_string(),
                kind: IndicatorKind::Ema {
                    period: params.slow,
                },
            },
        ];
        Ok(Self {
            name: format!("ema_cross_{}_{}", params.fast, params.slow),
            specs,
            exits: ExitConfig {
                take_profit_pct: params.take_profit_pct,
                stop_loss_pct: params.stop_loss_pct,
            },
            warm_up: params.slow,
        })
    }
}

impl Strategy for EmaCrossStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            name: self.name.clone(),
            regimes: vec![MarketRegime::Trending],
            warm_up: self.warm_up,
            cooldown_secs: 0,
            max_concurrent_positions: 1,
        }
    }

    fn indicators(&self) -> &[IndicatorSpec] {
        &self.specs
    }

    fn exits(&self) -> &ExitConfig {
        &self.exits
    }

    fn target_regimes(&self) -> Vec<MarketRegime> {
        vec![MarketRegime::Trending]
    }

    fn on_kline(
        &self,
        state: &mut StrategyState,
        kline: &Kline,
        cache: &IndicatorCache,
    ) -> Result<Option<Signal>> {
        let (Some(fast), Some(slow)) = (
            cache
                .get(&kline.symbol, &self.specs[0].kind)
                .and_then(|v| v.scalar()),
            cache
                .get(&kline.symbol, &self.specs[1].kind)
                .and_then(|v| v.scalar()),
        ) else {
            return Ok(None);
        };

        let crossed = state.prev_values.as_ref().and_then(|prev| {
            let prev_fast = prev.get("ema_fast")?;
            let prev_slow = prev.get("ema_slow")?;
            if prev_fast <= prev_slow && fast > slow {
                Some(true)
            } else if prev_fast >= prev_slow && fast < slow {
                Some(false)
            } else {
                None
            }
        });

        let signal = match (state.side, crossed) {
            (None, Some(true)) => Some(Signal::open(
                self.name(),
                kline.symbol.clone(),
                SignalAction::OpenLong,
                Decimal::ZERO,
                kline.close,
                0.7,
                "golden_cross",
                kline.timestamp,
            )),
            (None, Some(false)) => Some(Signal::open(
                self.name(),
                kline.symbol.clone(),
                SignalAction::OpenShort,
                Decimal::ZERO,
                kline.close,
                0.7,
                "death_cross",
                kline.timestamp,
            )),
            (Some(PosSide::Long), Some(false)) => Some(Signal::close(
                self.name(),
                kline.symbol.clone(),
                SignalAction::CloseLong,
                kline.close,
                0.7,
                "death_cross",
                kline.timestamp,
            )),
            (Some(PosSide::Short), Some(true)) => Some(Signal::close(
                self.name(),
                kline.symbol.clone(),
                SignalAction::CloseShort,
                kline.close,
                0.7,
                "golden_cross",
                kline.timestamp,
            )),
            _ => None,
        };

        let mut signal = signal;
        if let Some(signal) = signal.as_mut() {
            signal.market_context = serde_json::json!({
                "ema_fast": fast,
                "ema_slow": slow,
            });
            if signal.action.is_open() {
                state.open(signal.action.pos_side(), kline.close, kline.timestamp);
            } else {
                state.close(kline.timestamp);
            }
        }
        let mut table = BTreeMap::new();
        table.insert("ema_fast".to_string(), fast);
        table.insert("ema_slow".to_string(), slow);
        state.prev_values = Some(table);
        state.latest_price = Some(kline.close);
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn kline(close: f64, minute: u32) -> Kline {
        let c = Decimal::from_f64_retain(close).unwrap();
        Kline::new(
            "BTC-USDT",
            c,
            c + Decimal::ONE,
            c - Decimal::ONE,
            c,
            Decimal::from(100),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            "1m",
        )
    }

    #[test]
    fn test_golden_cross_opens_long() {
        let strategy = EmaCrossStrategy::new(EmaCrossParams {
            fast: 3,
            slow: 6,
            ..EmaCrossParams::default()
        })
        .unwrap();
        let cache = IndicatorCache::default();
        let mut state = StrategyState::default();

        // downtrend to pin fast below slow, then a sharp reversal
        let mut closes: Vec<f64> = (0..12).map(|i| 120.0 - 2.0 * i as f64).collect();
        closes.extend((0..8).map(|i| 98.0 + 6.0 * i as f64));

        let mut opened = None;
        for (i, close) in closes.iter().enumerate() {
            let k = kline(*close, i as u32);
            cache.on_kline(&k);
            if let Some(signal) = strategy.on_kline(&mut state, &k, &cache).unwrap() {
                opened = Some(signal);
                break;
            }
        }
        let signal = opened.expect("no cross detected");
        assert_eq!(signal.action, SignalAction::OpenLong);
        assert_eq!(signal.reason, "golden_cross");
        assert!(state.in_position());
    }

    #[test]
    fn test_rejects_degenerate_periods() {
        assert!(EmaCrossStrategy::new(EmaCrossParams {
            fast: 26,
            slow: 12,
            ..EmaCrossParams::default()
        })
        .is_err());
    }
}

//! Rule-driven strategy
//!
//! Wraps a validated [`RuleDefinition`] in the [`Strategy`] contract.
//! Evaluation order per kline: exit groups first while in a position,
//! entry groups only while flat, long before short, first match wins.

use crate::config::ExitConfig;
use crate::data::Kline;
use crate::indicators::{IndicatorCache, IndicatorSpec};
use crate::portfolio::PosSide;
use crate::strategy::rules::{build_value_table, RuleDefinition};
use crate::strategy::{
    MarketRegime, Signal, SignalAction, Strategy, StrategyMetadata, StrategyState,
};
use crate::Result;

pub struct RuleStrategy {
    definition: RuleDefinition,
    exits: ExitConfig,
    warm_up: usize,
}

impl RuleStrategy {
    /// Validate the definition and derive warm-up / exit parameters.
    pub fn new(definition: RuleDefinition) -> Result<Self> {
        definition.validate()?;
        let warm_up = definition
            .indicators
            .iter()
            .map(|spec| spec.kind.warm_up())
            .max()
            .unwrap_or(0);
        let exits = ExitConfig {
            take_profit_pct: definition.config.take_profit_pct,
            stop_loss_pct: definition.config.stop_loss_pct,
        };
        Ok(Self {
            definition,
            exits,
            warm_up,
        })
    }
}

impl Strategy for RuleStrategy {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            name: self.definition.name.clone(),
            regimes: self.target_regimes(),
            warm_up: self.warm_up,
            cooldown_secs: 0,
            max_concurrent_positions: 1,
        }
    }

    fn indicators(&self) -> &[IndicatorSpec] {
        &self.definition.indicators
    }

    fn exits(&self) -> &ExitConfig {
        &self.exits
    }

    fn target_regimes(&self) -> Vec<MarketRegime> {
        if self.definition.target_regimes.is_empty() {
            vec![MarketRegime::Any]
        } else {
            self.definition.target_regimes.clone()
        }
    }

    fn on_kline(
        &self,
        state: &mut StrategyState,
        kline: &Kline,
        cache: &IndicatorCache,
    ) -> Result<Option<Signal>> {
        // all indicators must resolve; during warm-up nothing changes,
        // including the previous-value table used for crosses
        let Some(table) = build_value_table(&self.definition.indicators, kline, cache) else {
            return Ok(None);
        };
        let prev = state.prev_values.as_ref();
        let rules = &self.definition.rules;
        let config = &self.definition.config;

        let mut signal = None;
        match state.side {
            Some(PosSide::Long) => {
                if rules
                    .exit_long
                    .as_ref()
                    .is_some_and(|g| g.evaluate(&table, prev))
                {
                    signal = Some(Signal::close(
                        self.name(),
                        kline.symbol.clone(),
                        SignalAction::CloseLong,
                        kline.close,
                        config.confidence,
                        "exit_long",
                        kline.timestamp,
                    ));
                }
            }
            Some(PosSide::Short) => {
                if rules
                    .exit_short
                    .as_ref()
                    .is_some_and(|g| g.evaluate(&table, prev))
                {
                    signal = Some(Signal::close(
                        self.name(),
                        kline.symbol.clone(),
                        SignalAction::CloseShort,
                        kline.close,
                        config.confidence,
                        "exit_short",
                        kline.timestamp,
                    ));
                }
            }
            None => {
                if rules
                    .entry_long
                    .as_ref()
                    .is_some_and(|g| g.evaluate(&table, prev))
                {
                    signal = Some(Signal::open(
                        self.name(),
                        kline.symbol.clone(),
                        SignalAction::OpenLong,
                        config.qty,
                        kline.close,
                        config.confidence,
                        "entry_long",
                        kline.timestamp,
                    ));
                } else if rules
                    .entry_short
                    .as_ref()
                    .is_some_and(|g| g.evaluate(&table, prev))
                {
                    signal = Some(Signal::open(
                        self.name(),
                        kline.symbol.clone(),
                        SignalAction::OpenShort,
                        config.qty,
                        kline.close,
                        config.confidence,
                        "entry_short",
                        kline.timestamp,
                    ));
                }
            }
        }

        if let Some(signal) = signal.as_mut() {
            signal.market_context =
                serde_json::to_value(&table).unwrap_or(serde_json::Value::Null);
            if signal.action.is_open() {
                state.open(signal.action.pos_side(), kline.close, kline.timestamp);
            } else {
                state.close(kline.timestamp);
            }
        }
        state.prev_values = Some(table);
        state.latest_price = Some(kline.close);
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::rules::{
        Comparison, Condition, ConditionGroup, LogicOp, Operand, RuleConfig, RuleSet,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn kline(close: i64, minute: u32) -> Kline {
        let c = Decimal::from(close);
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

    fn close_threshold(cmp: Comparison, value: i64) -> ConditionGroup {
        ConditionGroup {
            operator: LogicOp::And,
            conditions: vec![Condition {
                left: Operand::Field("close".to_string()),
                comparison: cmp,
                right: Operand::Value(Decimal::from(value)),
            }],
        }
    }

    fn price_band_strategy() -> RuleStrategy {
        // enter long below 95, exit long above 105
        RuleStrategy::new(RuleDefinition {
            name: "band".to_string(),
            indicators: Vec::new(),
            rules: RuleSet {
                entry_long: Some(close_threshold(Comparison::LessThan, 95)),
                exit_long: Some(close_threshold(Comparison::GreaterThan, 105)),
                ..RuleSet::default()
            },
            config: RuleConfig::default(),
            target_regimes: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_entry_then_exit_cycle() {
        let strategy = price_band_strategy();
        let cache = IndicatorCache::default();
        let mut state = StrategyState::default();

        // flat, no trigger
        let signal = strategy.on_kline(&mut state, &kline(100, 0), &cache).unwrap();
        assert!(signal.is_none());

        // dips below 95: entry
        let signal = strategy
            .on_kline(&mut state, &kline(90, 1), &cache)
            .unwrap()
            .unwrap();
        assert_eq!(signal.action, SignalAction::OpenLong);
        assert_eq!(signal.reason, "entry_long");
        assert!(state.in_position());

        // in position: entry rules are not re-evaluated
        let signal = strategy.on_kline(&mut state, &kline(92, 2), &cache).unwrap();
        assert!(signal.is_none());

        // above 105: exit
        let signal = strategy
            .on_kline(&mut state, &kline(110, 3), &cache)
            .unwrap()
            .unwrap();
        assert_eq!(signal.action, SignalAction::CloseLong);
        assert_eq!(signal.reason, "exit_long");
        assert!(signal.reduce_only);
        assert!(!state.in_position());
    }

    #[test]
    fn test_cross_uses_previous_kline() {
        let strategy = RuleStrategy::new(RuleDefinition {
            name: "cross".to_string(),
            indicators: Vec::new(),
            rules: RuleSet {
                entry_long: Some(ConditionGroup {
                    operator: LogicOp::And,
                    conditions: vec![Condition {
                        left: Operand::Field("close".to_string()),
                        comparison: Comparison::CrossesAbove,
                        right: Operand::Value(Decimal::from(100)),
                    }],
                }),
                exit_long: Some(close_threshold(Comparison::GreaterThan, 1000)),
                ..RuleSet::default()
            },
            config: RuleConfig::default(),
            target_regimes: Vec::new(),
        })
        .unwrap();
        let cache = IndicatorCache::default();
        let mut state = StrategyState::default();

        // first kline above the level: no previous table, no cross
        assert!(strategy
            .on_kline(&mut state, &kline(101, 0), &cache)
            .unwrap()
            .is_none());
        // dips below, then crosses above
        assert!(strategy
            .on_kline(&mut state, &kline(99, 1), &cache)
            .unwrap()
            .is_none());
        let signal = strategy
            .on_kline(&mut state, &kline(102, 2), &cache)
            .unwrap()
            .unwrap();
        assert_eq!(signal.action, SignalAction::OpenLong);
    }

    #[test]
    fn test_warm_up_blocks_evaluation_and_prev_table() {
        use crate::indicators::{IndicatorKind, IndicatorSpec};
        let strategy = RuleStrategy::new(RuleDefinition {
            name: "warm".to_string(),
            indicators: vec![IndicatorSpec {
                id: "sma3".to_string(),
                kind: IndicatorKind::Sma { period: 3 },
            }],
            rules: RuleSet {
                entry_long: Some(ConditionGroup {
                    operator: LogicOp::And,
                    conditions: vec![Condition {
                        left: Operand::Field("close".to_string()),
                        comparison: Comparison::GreaterThan,
                        right: Operand::Field("sma3".to_string()),
                    }],
                }),
                ..RuleSet::default()
            },
            config: RuleConfig::default(),
            target_regimes: Vec::new(),
        })
        .unwrap();
        assert_eq!(strategy.metadata().warm_up, 3);

        let cache = IndicatorCache::default();
        let mut state = StrategyState::default();
        for i in 0..2i64 {
            cache.on_kline(&kline(100 + i, i as u32));
            let signal = strategy
                .on_kline(&mut state, &kline(100 + i, i as u32), &cache)
                .unwrap();
            assert!(signal.is_none());
            assert!(state.prev_values.is_none());
        }
        // third kline: sma ready, rising closes sit above it
        cache.on_kline(&kline(103, 2));
        let signal = strategy
            .on_kline(&mut state, &kline(103, 2), &cache)
            .unwrap();
        assert!(signal.is_some());
        assert!(state.prev_values.is_some());
    }

    #[test]
    fn test_signal_carries_market_context() {
        let strategy = price_band_strategy();
        let cache = IndicatorCache::default();
        let mut state = StrategyState::default();
        let signal = strategy
            .on_kline(&mut state, &kline(90, 0), &cache)
            .unwrap()
            .unwrap();
        let close: Decimal =
            serde_json::from_value(signal.market_context.get("close").unwrap().clone()).unwrap();
        assert_eq!(close, Decimal::from(90));
        assert!(signal.market_context.get("volume").is_some());
    }
}

//! Strategy contract

use crate::config::ExitConfig;
use crate::data::{Kline, MarketTick};
use crate::decimal;
use crate::indicators::{IndicatorCache, IndicatorSpec};
use crate::portfolio::PosSide;
use crate::strategy::{Signal, SignalAction, StrategyState};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Market regime a strategy is designed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    Any,
}

/// Static strategy descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMetadata {
    pub name: String,
    /// Regimes the strategy targets
    pub regimes: Vec<MarketRegime>,
    /// Klines needed before the strategy can evaluate
    pub warm_up: usize,
    /// Minimum seconds between emitted signals, 0 for none
    pub cooldown_secs: u64,
    /// Cap on simultaneously open positions for this strategy
    pub max_concurrent_positions: usize,
}

/// A trading strategy evaluated per closed kline, with an optional
/// tick-level exit path.
///
/// Implementations hold no mutable state of their own; everything that
/// changes between evaluations lives in the caller-owned
/// [`StrategyState`], so one strategy instance can serve many symbols
/// concurrently.
pub trait Strategy: Send + Sync {
    /// Unique strategy name.
    fn name(&self) -> &str;

    /// Static descriptor.
    fn metadata(&self) -> StrategyMetadata;

    /// Indicators the strategy reads.
    fn indicators(&self) -> &[IndicatorSpec];

    /// Take-profit / stop-loss thresholds.
    fn exits(&self) -> &ExitConfig;

    /// Regimes this strategy targets.
    fn target_regimes(&self) -> Vec<MarketRegime> {
        vec![MarketRegime::Any]
    }

    /// Evaluate one closed kline. Returns at most one signal.
    fn on_kline(
        &self,
        state: &mut StrategyState,
        kline: &Kline,
        cache: &IndicatorCache,
    ) -> Result<Option<Signal>>;

    /// Evaluate one tick against take-profit / stop-loss thresholds.
    /// Only fires while the state tracks an open position.
    fn on_tick(&self, state: &mut StrategyState, tick: &MarketTick) -> Option<Signal> {
        let side = state.side?;
        let entry = state.entry_price?;
        state.latest_price = Some(tick.last_price);

        let change = decimal::pct_change_dec(entry, tick.last_price).ok()?;
        // signed move in the position's favor
        let effective = match side {
            PosSide::Long => change,
            PosSide::Short => -change,
        };
        let exits = self.exits();

        let (action, reason) = if exits
            .take_profit_pct
            .is_some_and(|tp| effective >= tp)
        {
            (close_action(side), "take_profit")
        } else if exits.stop_loss_pct.is_some_and(|sl| effective <= -sl) {
            (close_action(side), "stop_loss")
        } else {
            return None;
        };

        let mut signal = Signal::close(
            self.name(),
            tick.symbol.clone(),
            action,
            tick.last_price,
            1.0,
            reason,
            tick.timestamp,
        );
        signal.market_context = serde_json::json!({
            "entry_price": entry,
            "effective_pct": effective,
        });
        state.close(tick.timestamp);
        Some(signal)
    }
}

fn close_action(side: PosSide) -> SignalAction {
    match side {
        PosSide::Long => SignalAction::CloseLong,
        PosSide::Short => SignalAction::CloseShort,
    }
}

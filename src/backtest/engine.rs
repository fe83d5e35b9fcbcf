//! Kline replay engine
//!
//! Replays a time-ordered kline series through the full pipeline:
//! indicator cache, strategy evaluation, risk approval, simulated fills,
//! and account updates. The engine is deterministic: all timestamps come
//! from the data, fills are rule-based, and no wall clock is consulted,
//! so identical inputs produce identical results.

use crate::backtest::fill::FillSimulator;
use crate::backtest::metrics::BacktestMetrics;
use crate::config::BacktestConfig;
use crate::data::{Kline, KlineSeries, MarketTick};
use crate::decimal;
use crate::indicators::IndicatorCache;
use crate::portfolio::{Account, EquityPoint, PosSide, TradeRecord};
use crate::risk::{AccountView, RiskEngine, RiskEvent};
use crate::strategy::{Signal, SignalAction, Strategy, StrategyState};
use crate::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestStatus {
    Running,
    Completed,
    Error,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub metrics: BacktestMetrics,
    pub trades: Vec<TradeRecord>,
    pub signals: Vec<Signal>,
    pub equity_curve: Vec<EquityPoint>,
    pub risk_events: Vec<RiskEvent>,
    pub status: BacktestStatus,
}

/// Single-strategy backtest over one kline series
pub struct BacktestEngine {
    config: BacktestConfig,
    strategy: Arc<dyn Strategy>,
    risk: RiskEngine,
    account: Account,
    cache: IndicatorCache,
    states: HashMap<String, StrategyState>,
    fills: FillSimulator,
    trades: Vec<TradeRecord>,
    signals: Vec<Signal>,
    equity_curve: Vec<EquityPoint>,
    step: usize,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig, strategy: Arc<dyn Strategy>) -> Self {
        let mut risk_config = config.risk.clone();
        risk_config.leverage = config.leverage;
        risk_config.qty_step = config.qty_step;
        Self {
            risk: RiskEngine::new(risk_config, config.initial_balance),
            account: Account::new(config.initial_balance),
            cache: IndicatorCache::default(),
            states: HashMap::new(),
            fills: FillSimulator::new(config.fee_rate, config.slippage_bps),
            trades: Vec::new(),
            signals: Vec::new(),
            equity_curve: Vec::new(),
            step: 0,
            strategy,
            config,
        }
    }

    /// Replay the series to completion.
    pub fn run(self, data: &KlineSeries) -> Result<BacktestResult> {
        self.run_with_progress(data, |_, _, _| {})
    }

    /// Replay with a progress callback invoked after every kline with
    /// (processed, total, account).
    pub fn run_with_progress<F>(mut self, data: &KlineSeries, mut progress: F) -> Result<BacktestResult>
    where
        F: FnMut(usize, usize, &Account),
    {
        anyhow::ensure!(!data.is_empty(), "backtest requires at least one kline");
        anyhow::ensure!(
            data.is_time_ordered(),
            "backtest klines must be time-ordered"
        );
        info!(
            strategy = self.strategy.name(),
            klines = data.len(),
            "starting backtest"
        );
        let total = data.len();
        for (i, kline) in data.klines().iter().enumerate() {
            self.process_kline(kline);
            progress(i + 1, total, &self.account);
        }
        let last_ts = data.klines()[total - 1].timestamp;
        self.close_remaining(last_ts);
        self.equity_curve.push(self.account.equity_point(last_ts));

        let status = if self.risk.is_emergency_stopped() {
            BacktestStatus::Error
        } else {
            BacktestStatus::Completed
        };
        let metrics = BacktestMetrics::compute(
            self.config.initial_balance,
            &self.trades,
            &self.equity_curve,
            &self.config.interval,
        );
        info!(
            strategy = self.strategy.name(),
            trades = metrics.total_trades,
            final_equity = %metrics.final_equity,
            "backtest finished"
        );
        Ok(BacktestResult {
            config: self.config,
            metrics,
            trades: self.trades,
            signals: self.signals,
            equity_curve: self.equity_curve,
            risk_events: self.risk.events().to_vec(),
            status,
        })
    }

    fn process_kline(&mut self, kline: &Kline) {
        self.step += 1;
        self.cache.on_kline(kline);
        self.account.mark(&kline.symbol, kline.close);

        if self.config.funding_interval_steps > 0
            && self.step % self.config.funding_interval_steps == 0
        {
            self.account.apply_funding(self.config.funding_rate);
        }

        // tick path: one synthesized tick at the close drives TP/SL
        let tick = MarketTick::new(kline.symbol.clone(), kline.close, kline.timestamp);
        let tick_signal = {
            let state = self.states.entry(kline.symbol.clone()).or_default();
            self.strategy.on_tick(state, &tick)
        };
        if let Some(signal) = tick_signal {
            self.process_signal(signal);
        }

        // kline path: rule evaluation; a failing strategy is an error
        // event, never a crash
        let evaluated = {
            let state = self.states.entry(kline.symbol.clone()).or_default();
            self.strategy.on_kline(state, kline, &self.cache)
        };
        match evaluated {
            Ok(Some(signal)) => self.process_signal(signal),
            Ok(None) => {}
            Err(e) => {
                self.risk.record_process_error(
                    self.strategy.name(),
                    Some(kline.symbol.clone()),
                    &e.to_string(),
                    kline.timestamp,
                );
            }
        }

        self.equity_curve
            .push(self.account.equity_point(kline.timestamp));
        self.risk.update_equity(self.account.equity(), kline.timestamp);
    }

    /// Fraction-of-equity sizing for opens the strategy left unsized.
    fn size_open(&self, price: Decimal) -> Decimal {
        let notional = self.account.equity() * self.config.position_pct;
        match decimal::div(notional, price) {
            Ok(qty) => decimal::floor_to_step_dec(qty, self.config.qty_step),
            Err(_) => Decimal::ZERO,
        }
    }

    fn process_signal(&mut self, mut signal: Signal) {
        if signal.action.is_open() && signal.suggested_qty <= Decimal::ZERO {
            signal.suggested_qty = self.size_open(signal.suggested_price);
        }
        let view = AccountView {
            equity: self.account.equity(),
            available: self.account.available(),
            open_positions: self.account.open_position_count(),
            total_exposure: self.account.total_exposure(),
        };
        let approved = self.risk.approve(&mut signal, &view);
        self.signals.push(signal.clone());
        if !approved {
            return;
        }

        let side = signal.action.pos_side();
        if signal.action.is_open() {
            let fill = self.fills.execute(
                signal.action,
                signal.suggested_price,
                signal.suggested_qty,
                signal.timestamp,
            );
            self.account.open_position(
                &signal.symbol,
                side,
                fill.qty,
                fill.price,
                self.config.leverage,
                fill.fee,
                signal.timestamp,
            );
            debug!(
                symbol = %signal.symbol,
                ?side,
                qty = %fill.qty,
                price = %fill.price,
                "opened position"
            );
        } else {
            let close_qty = if signal.suggested_qty > Decimal::ZERO {
                signal.suggested_qty
            } else {
                match self.account.position(&signal.symbol, side) {
                    Some(position) => position.qty,
                    None => {
                        debug!(symbol = %signal.symbol, ?side, "close signal with no position");
                        return;
                    }
                }
            };
            let fill = self.fills.execute(
                signal.action,
                signal.suggested_price,
                close_qty,
                signal.timestamp,
            );
            self.close_and_record(&signal.strategy, &signal.symbol, side, &signal.reason, fill.price, fill.qty, fill.fee, signal.timestamp);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn close_and_record(
        &mut self,
        strategy: &str,
        symbol: &str,
        side: PosSide,
        reason: &str,
        price: Decimal,
        qty: Decimal,
        fee: Decimal,
        ts: DateTime<Utc>,
    ) {
        let Some((closed, pnl)) = self.account.close_position(symbol, side, qty, price, fee)
        else {
            return;
        };
        let pnl_percent = decimal::pct_change_dec(closed.entry_price, price)
            .map(|pct| match side {
                PosSide::Long => pct,
                PosSide::Short => -pct,
            })
            .unwrap_or(Decimal::ZERO);
        let trade = TradeRecord {
            strategy: strategy.to_string(),
            symbol: symbol.to_string(),
            side,
            qty: closed.qty,
            entry_price: closed.entry_price,
            exit_price: price,
            entry_time: closed.opened_at,
            exit_time: ts,
            pnl: decimal::round_money(pnl),
            pnl_percent,
            fee: decimal::round_money(closed.fee_paid + fee),
            funding_pnl: closed.funding_pnl,
            duration_secs: (ts - closed.opened_at).num_seconds(),
            reason: reason.to_string(),
        };
        self.risk.on_trade_closed(trade.net_pnl(), ts);
        debug!(
            symbol,
            ?side,
            pnl = %trade.pnl,
            reason,
            "closed position"
        );
        self.trades.push(trade);
    }

    /// Flatten everything still open at the last observed mark.
    fn close_remaining(&mut self, ts: DateTime<Utc>) {
        let open: Vec<(String, PosSide, Decimal, Decimal)> = self
            .account
            .positions()
            .map(|p| (p.symbol.clone(), p.side, p.qty, p.mark_price))
            .collect();
        let strategy = self.strategy.name().to_string();
        for (symbol, side, qty, mark) in open {
            let action = match side {
                PosSide::Long => SignalAction::CloseLong,
                PosSide::Short => SignalAction::CloseShort,
            };
            let fill = self.fills.execute(action, mark, qty, ts);
            self.close_and_record(
                &strategy, &symbol, side, "session_end", fill.price, fill.qty, fill.fee, ts,
            );
        }
    }
}

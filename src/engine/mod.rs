//! Live trading engine
//!
//! Wires the pipeline together for a live session: market events fan out
//! to every registered strategy, emitted signals funnel through one
//! channel into a single approval worker, and approved signals become
//! orders on the injected execution client. Funneling approvals through
//! one worker keeps risk decisions strictly ordered by signal arrival.

use crate::config::EngineConfig;
use crate::data::{Kline, MarketTick};
use crate::decimal;
use crate::indicators::IndicatorCache;
use crate::order::{submit_with_retry, ExecutionClient, ExecutionEvent, Order, OrderTracker};
use crate::persist::TradeStore;
use crate::portfolio::{Account, PosSide, TradeRecord};
use crate::risk::{AccountView, RiskEngine};
use crate::strategy::{Signal, StateKey, StateStore, Strategy};
use crate::Result;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SUBMIT_ATTEMPTS: u32 = 3;
const SUBMIT_BASE_DELAY_MS: u64 = 250;

/// One live trading session
pub struct TradingEngine {
    config: EngineConfig,
    strategies: Vec<Arc<dyn Strategy>>,
    states: StateStore,
    cache: Arc<IndicatorCache>,
    risk: Mutex<RiskEngine>,
    account: Mutex<Account>,
    tracker: Mutex<OrderTracker>,
    execution: Arc<dyn ExecutionClient>,
    store: Arc<dyn TradeStore>,
    signal_tx: mpsc::Sender<Signal>,
    signal_rx: std::sync::Mutex<Option<mpsc::Receiver<Signal>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        strategies: Vec<Arc<dyn Strategy>>,
        initial_balance: Decimal,
        execution: Arc<dyn ExecutionClient>,
        store: Arc<dyn TradeStore>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(config.signal_queue_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            risk: Mutex::new(RiskEngine::new(config.risk.clone(), initial_balance)),
            account: Mutex::new(Account::new(initial_balance)),
            tracker: Mutex::new(OrderTracker::new()),
            cache: Arc::new(IndicatorCache::new(config.max_cache_history)),
            states: StateStore::new(),
            strategies,
            execution,
            store,
            signal_tx,
            signal_rx: std::sync::Mutex::new(Some(signal_rx)),
            shutdown_tx,
            config,
        }
    }

    /// Spawn the approval worker. Signals are processed strictly in
    /// arrival order; a signal in flight finishes before shutdown takes
    /// effect. Can only be called once.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let mut rx = self
            .signal_rx
            .lock()
            .map_err(|_| anyhow!("signal receiver lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("engine already started"))?;
        let engine = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        info!(session = %self.config.session_id, "trading engine started");
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(signal) => engine.process_signal(signal).await,
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(session = %engine.config.session_id, "signal worker stopped");
        }))
    }

    /// Request worker shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.config.eval_timeout_ms)
    }

    /// Feed one closed kline: advance the cache, then evaluate every
    /// strategy against its own state slot. Waiting on a busy state slot
    /// counts against the session's evaluation timeout.
    pub async fn on_kline(&self, kline: &Kline) {
        self.cache.on_kline(kline);
        for strategy in &self.strategies {
            let key = StateKey::new(strategy.name(), &kline.symbol);
            let slot = self.states.entry(&key).await;
            let evaluated = tokio::time::timeout(self.eval_timeout(), async {
                let mut state = slot.lock().await;
                strategy.on_kline(&mut state, kline, &self.cache)
            })
            .await;
            match evaluated {
                Ok(Ok(Some(signal))) => self.emit(signal).await,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    self.record_evaluation_fault(strategy.name(), kline, &e.to_string())
                        .await;
                }
                Err(_) => {
                    self.record_evaluation_fault(strategy.name(), kline, "evaluation timed out")
                        .await;
                }
            }
        }
    }

    /// Feed one tick: drives take-profit / stop-loss exits.
    pub async fn on_market_tick(&self, tick: &MarketTick) {
        for strategy in &self.strategies {
            let key = StateKey::new(strategy.name(), &tick.symbol);
            let slot = self.states.entry(&key).await;
            let evaluated = tokio::time::timeout(self.eval_timeout(), async {
                let mut state = slot.lock().await;
                strategy.on_tick(&mut state, tick)
            })
            .await;
            match evaluated {
                Ok(Some(signal)) => self.emit(signal).await,
                Ok(None) => {}
                Err(_) => {
                    self.risk.lock().await.record_process_error(
                        strategy.name(),
                        Some(tick.symbol.clone()),
                        "tick evaluation timed out",
                        tick.timestamp,
                    );
                    self.persist_risk_events().await;
                }
            }
        }
    }

    async fn record_evaluation_fault(&self, strategy: &str, kline: &Kline, message: &str) {
        self.risk.lock().await.record_process_error(
            strategy,
            Some(kline.symbol.clone()),
            message,
            kline.timestamp,
        );
        self.persist_risk_events().await;
    }

    /// Apply an exchange execution callback to the tracked order and the
    /// account. Reduce-only fills settle into a trade record.
    pub async fn on_execution_event(&self, event: &ExecutionEvent) {
        let updated: Option<Order> = self.tracker.lock().await.apply(event).cloned();
        let Some(order) = updated else { return };
        let ExecutionEvent::Fill {
            price,
            qty,
            fee,
            timestamp,
            ..
        } = event
        else {
            return;
        };

        if order.reduce_only {
            let closed = self.account.lock().await.close_position(
                &order.symbol,
                order.pos_side,
                *qty,
                *price,
                *fee,
            );
            let Some((closed, pnl)) = closed else {
                warn!(symbol = %order.symbol, "reduce-only fill with no open position");
                return;
            };
            let pnl_percent = decimal::pct_change_dec(closed.entry_price, *price)
                .map(|pct| match order.pos_side {
                    PosSide::Long => pct,
                    PosSide::Short => -pct,
                })
                .unwrap_or(Decimal::ZERO);
            let trade = TradeRecord {
                strategy: order.strategy.clone(),
                symbol: order.symbol.clone(),
                side: order.pos_side,
                qty: closed.qty,
                entry_price: closed.entry_price,
                exit_price: *price,
                entry_time: closed.opened_at,
                exit_time: *timestamp,
                pnl: decimal::round_money(pnl),
                pnl_percent,
                fee: decimal::round_money(closed.fee_paid + *fee),
                funding_pnl: closed.funding_pnl,
                duration_secs: (*timestamp - closed.opened_at).num_seconds(),
                reason: order.reason.clone(),
            };
            self.risk
                .lock()
                .await
                .on_trade_closed(trade.net_pnl(), *timestamp);
            self.persist_risk_events().await;
            if let Err(e) = self
                .store
                .append_trade(&self.config.session_id, trade)
                .await
            {
                warn!(error = %e, "trade record not persisted");
            }
        } else {
            self.account.lock().await.open_position(
                &order.symbol,
                order.pos_side,
                *qty,
                *price,
                self.config.leverage,
                *fee,
                *timestamp,
            );
        }
    }

    /// Sample the equity curve and refresh drawdown tracking.
    pub async fn snapshot_equity(&self, ts: DateTime<Utc>) {
        let point = self.account.lock().await.equity_point(ts);
        self.risk.lock().await.update_equity(point.equity, ts);
        self.persist_risk_events().await;
        if let Err(e) = self
            .store
            .append_equity_point(&self.config.session_id, point)
            .await
        {
            warn!(error = %e, "equity point not persisted");
        }
    }

    /// Drop cache state for symbols idle since `cutoff`.
    pub async fn run_maintenance(&self, cutoff: DateTime<Utc>) {
        self.cache.evict_idle(cutoff);
        let mut tracker = self.tracker.lock().await;
        tracker.prune_terminal();
    }

    /// Orders not yet terminal.
    pub async fn open_order_count(&self) -> usize {
        self.tracker.lock().await.open_orders().len()
    }

    /// Current account equity.
    pub async fn equity(&self) -> Decimal {
        self.account.lock().await.equity()
    }

    /// Queue a signal for approval. A full queue waits up to the
    /// evaluation timeout, then drops the signal rather than blocking
    /// the market-data path; the drop is recorded in the audit trail.
    async fn emit(&self, signal: Signal) {
        let strategy = signal.strategy.clone();
        let symbol = signal.symbol.clone();
        let ts = signal.timestamp;
        match tokio::time::timeout(self.eval_timeout(), self.signal_tx.send(signal)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => warn!("signal channel closed, signal dropped"),
            Err(_) => {
                warn!(
                    %strategy,
                    %symbol,
                    "signal queue saturated past the processing timeout, signal dropped"
                );
                self.risk.lock().await.record_process_error(
                    &strategy,
                    Some(symbol),
                    "signal queue saturated, signal dropped",
                    ts,
                );
                self.persist_risk_events().await;
            }
        }
    }

    async fn persist_risk_events(&self) {
        let events = self.risk.lock().await.take_new_events();
        for event in events {
            if let Err(e) = self
                .store
                .append_risk_event(&self.config.session_id, event)
                .await
            {
                warn!(error = %e, "risk event not persisted");
            }
        }
    }

    /// Approve, persist, and submit one signal.
    async fn process_signal(&self, mut signal: Signal) {
        let (view, close_qty) = {
            let account = self.account.lock().await;
            if signal.action.is_open() && signal.suggested_qty <= Decimal::ZERO {
                let notional = account.equity() * self.config.position_pct;
                signal.suggested_qty = match decimal::div(notional, signal.suggested_price) {
                    Ok(qty) => decimal::floor_to_step_dec(qty, self.config.qty_step),
                    Err(_) => Decimal::ZERO,
                };
            }
            let close_qty = if signal.action.is_close() && signal.suggested_qty <= Decimal::ZERO {
                account
                    .position(&signal.symbol, signal.action.pos_side())
                    .map(|p| p.qty)
            } else {
                Some(signal.suggested_qty)
            };
            (
                AccountView {
                    equity: account.equity(),
                    available: account.available(),
                    open_positions: account.open_position_count(),
                    total_exposure: account.total_exposure(),
                },
                close_qty,
            )
        };

        let approved = self.risk.lock().await.approve(&mut signal, &view);
        self.persist_risk_events().await;
        if let Err(e) = self
            .store
            .append_signal(&self.config.session_id, signal.clone())
            .await
        {
            // persistence failure never blocks the trading path
            warn!(error = %e, "signal not persisted");
        }
        if !approved {
            return;
        }
        // risk may have resized an open; closes fall back to the full
        // position size captured above
        let qty = if signal.action.is_open() {
            signal.suggested_qty
        } else {
            match close_qty.filter(|q| *q > Decimal::ZERO) {
                Some(qty) => qty,
                None => {
                    debug!(symbol = %signal.symbol, "nothing to close, signal skipped");
                    return;
                }
            }
        };

        let order = Order::from_signal(&signal, qty);
        match submit_with_retry(
            self.execution.as_ref(),
            &order,
            SUBMIT_ATTEMPTS,
            Duration::from_millis(SUBMIT_BASE_DELAY_MS),
        )
        .await
        {
            Ok(exchange_id) => {
                info!(
                    %exchange_id,
                    symbol = %order.symbol,
                    side = ?order.side,
                    qty = %order.qty,
                    "order submitted"
                );
                self.tracker.lock().await.track(exchange_id, order);
            }
            Err(e) => {
                self.risk.lock().await.record_process_error(
                    "execution",
                    Some(signal.symbol.clone()),
                    &e.to_string(),
                    signal.timestamp,
                );
                self.persist_risk_events().await;
            }
        }
    }
}

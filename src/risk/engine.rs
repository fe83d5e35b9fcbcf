//! Pre-trade risk checks and account-level guards
//!
//! Every signal passes through [`RiskEngine::approve`] before it may
//! become an order. The engine is intentionally synchronous and clock-free:
//! timestamps come from the signals and trades it is fed, so backtests
//! replay identically.

use crate::config::RiskConfig;
use crate::decimal;
use crate::risk::{RiskEvent, RiskEventType, RiskSeverity, RiskSnapshot};
use crate::strategy::Signal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

/// Account figures the risk engine needs for one decision
#[derive(Debug, Clone)]
pub struct AccountView {
    pub equity: Decimal,
    /// Cash not locked as margin
    pub available: Decimal,
    pub open_positions: usize,
    /// Sum of open position notionals
    pub total_exposure: Decimal,
}

/// Stateful risk engine for one trading session
pub struct RiskEngine {
    config: RiskConfig,
    equity: Decimal,
    peak_equity: Decimal,
    consecutive_losses: u32,
    circuit_broken: bool,
    drawdown_halted: bool,
    drawdown_warned: bool,
    emergency_stopped: bool,
    process_errors: u32,
    open_position_count: usize,
    events: Vec<RiskEvent>,
    events_cursor: usize,
}

impl RiskEngine {
    pub fn new(config: RiskConfig, initial_equity: Decimal) -> Self {
        Self {
            config,
            equity: initial_equity,
            peak_equity: initial_equity,
            consecutive_losses: 0,
            circuit_broken: false,
            drawdown_halted: false,
            drawdown_warned: false,
            emergency_stopped: false,
            process_errors: 0,
            open_position_count: 0,
            events: Vec::new(),
            events_cursor: 0,
        }
    }

    fn drawdown_ratio(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.peak_equity - self.equity) / self.peak_equity).max(Decimal::ZERO)
    }

    /// Current state capture.
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            equity: self.equity,
            peak_equity: self.peak_equity,
            drawdown_percent: decimal::round_pct(self.drawdown_ratio() * Decimal::ONE_HUNDRED),
            consecutive_losses: self.consecutive_losses,
            is_circuit_broken: self.circuit_broken,
            is_drawdown_halted: self.drawdown_halted,
            open_position_count: self.open_position_count,
        }
    }

    fn push_event(
        &mut self,
        event_type: RiskEventType,
        severity: RiskSeverity,
        source: &str,
        symbol: Option<String>,
        reason: String,
        ts: DateTime<Utc>,
    ) {
        let snapshot = self.snapshot();
        self.events.push(RiskEvent::new(
            event_type, severity, source, symbol, reason, snapshot, ts,
        ));
    }

    fn reject(&mut self, signal: &mut Signal, reason: &str) -> bool {
        signal.reject(reason);
        warn!(
            strategy = %signal.strategy,
            symbol = %signal.symbol,
            reason,
            "signal rejected"
        );
        self.push_event(
            RiskEventType::OrderRejected,
            RiskSeverity::Warning,
            &signal.strategy.clone(),
            Some(signal.symbol.clone()),
            reason.to_string(),
            signal.timestamp,
        );
        false
    }

    /// Evaluate a signal against all guards. Mutates the signal in place:
    /// sets the verdict, the reject reason, and possibly a reduced
    /// quantity. Returns the verdict.
    pub fn approve(&mut self, signal: &mut Signal, view: &AccountView) -> bool {
        self.open_position_count = view.open_positions;

        if self.emergency_stopped {
            return self.reject(signal, "emergency_stop");
        }
        if self.circuit_broken {
            return self.reject(signal, "circuit_breaker");
        }
        if signal.action.is_close() {
            // closes always pass the remaining guards so positions can
            // be flattened under halt
            signal.approve();
            return true;
        }
        if self.drawdown_halted {
            return self.reject(signal, "drawdown_halt");
        }
        if signal.suggested_qty <= Decimal::ZERO || signal.suggested_price <= Decimal::ZERO {
            return self.reject(signal, "non_positive_size");
        }

        let notional = signal.suggested_qty * signal.suggested_price;
        let margin = if self.config.leverage > Decimal::ZERO {
            notional / self.config.leverage
        } else {
            notional
        };
        if margin > view.available {
            self.push_event(
                RiskEventType::EquityInsufficient,
                RiskSeverity::Warning,
                &signal.strategy.clone(),
                Some(signal.symbol.clone()),
                format!("margin {margin} exceeds available {}", view.available),
                signal.timestamp,
            );
            return self.reject(signal, "equity_insufficient");
        }

        if view.total_exposure + notional > self.config.max_total_exposure {
            let allowed = self.config.max_total_exposure - view.total_exposure;
            if allowed <= Decimal::ZERO {
                return self.reject(signal, "exposure_exceeded");
            }
            let resized = match decimal::div(allowed, signal.suggested_price) {
                Ok(qty) => decimal::floor_to_step_dec(qty, self.config.qty_step),
                Err(_) => return self.reject(signal, "exposure_exceeded"),
            };
            if resized <= self.config.min_order_qty {
                return self.reject(signal, "exposure_exceeded");
            }
            let original = signal.suggested_qty;
            signal.suggested_qty = resized;
            info!(
                strategy = %signal.strategy,
                symbol = %signal.symbol,
                %original,
                %resized,
                "resized signal to fit exposure cap"
            );
            self.push_event(
                RiskEventType::ExposureAdjusted,
                RiskSeverity::Info,
                &signal.strategy.clone(),
                Some(signal.symbol.clone()),
                format!("qty reduced from {original} to {resized}"),
                signal.timestamp,
            );
        }

        signal.approve();
        true
    }

    /// Register a completed round trip. Trips the circuit breaker on a
    /// loss streak or a single catastrophic loss.
    pub fn on_trade_closed(&mut self, net_pnl: Decimal, ts: DateTime<Utc>) {
        if net_pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
            let catastrophic = self.equity > Decimal::ZERO
                && net_pnl.abs() >= self.equity * self.config.catastrophic_loss_pct;
            if catastrophic && !self.circuit_broken {
                self.circuit_broken = true;
                self.push_event(
                    RiskEventType::CircuitBreak,
                    RiskSeverity::Critical,
                    "risk_engine",
                    None,
                    format!("catastrophic loss {net_pnl}"),
                    ts,
                );
                return;
            }
            if self.consecutive_losses >= self.config.max_consecutive_losses
                && !self.circuit_broken
            {
                self.circuit_broken = true;
                self.push_event(
                    RiskEventType::CircuitBreak,
                    RiskSeverity::Critical,
                    "risk_engine",
                    None,
                    format!("{} consecutive losses", self.consecutive_losses),
                    ts,
                );
            }
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Manually reset the circuit breaker and the loss streak.
    pub fn reset_circuit(&mut self, ts: DateTime<Utc>) {
        self.circuit_broken = false;
        self.consecutive_losses = 0;
        self.push_event(
            RiskEventType::CircuitReset,
            RiskSeverity::Info,
            "risk_engine",
            None,
            "circuit breaker reset".to_string(),
            ts,
        );
    }

    /// Track equity against the running peak: warn once per excursion,
    /// halt opens past the halt threshold, clear the halt on recovery.
    pub fn update_equity(&mut self, equity: Decimal, ts: DateTime<Utc>) {
        self.equity = equity;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let drawdown = self.drawdown_ratio();

        if self.drawdown_halted {
            if drawdown <= self.config.drawdown_recover_pct {
                self.drawdown_halted = false;
                self.drawdown_warned = false;
                info!(%equity, %drawdown, "drawdown recovered, opens re-enabled");
            }
            return;
        }
        if drawdown >= self.config.drawdown_halt_pct {
            self.drawdown_halted = true;
            self.push_event(
                RiskEventType::DrawdownHalt,
                RiskSeverity::Critical,
                "risk_engine",
                None,
                format!("drawdown {drawdown} past halt threshold"),
                ts,
            );
        } else if drawdown >= self.config.drawdown_warning_pct && !self.drawdown_warned {
            self.drawdown_warned = true;
            self.push_event(
                RiskEventType::DrawdownWarning,
                RiskSeverity::Warning,
                "risk_engine",
                None,
                format!("drawdown {drawdown} past warning threshold"),
                ts,
            );
        } else if drawdown < self.config.drawdown_warning_pct {
            self.drawdown_warned = false;
        }
    }

    /// Count a processing failure; repeated failures stop all trading.
    pub fn record_process_error(
        &mut self,
        source: &str,
        symbol: Option<String>,
        reason: &str,
        ts: DateTime<Utc>,
    ) {
        self.process_errors += 1;
        warn!(source, reason, errors = self.process_errors, "process error");
        self.push_event(
            RiskEventType::ProcessError,
            RiskSeverity::Warning,
            source,
            symbol.clone(),
            reason.to_string(),
            ts,
        );
        if self.process_errors >= self.config.max_process_errors && !self.emergency_stopped {
            self.emergency_stopped = true;
            self.push_event(
                RiskEventType::EmergencyStop,
                RiskSeverity::Critical,
                source,
                symbol,
                format!("{} process errors", self.process_errors),
                ts,
            );
        }
    }

    /// Clear an emergency stop and the error counter.
    pub fn clear_emergency_stop(&mut self) {
        self.emergency_stopped = false;
        self.process_errors = 0;
    }

    /// Drain events recorded since the previous call.
    pub fn take_new_events(&mut self) -> Vec<RiskEvent> {
        let new = self.events[self.events_cursor..].to_vec();
        self.events_cursor = self.events.len();
        new
    }

    /// All events this session.
    pub fn events(&self) -> &[RiskEvent] {
        &self.events
    }

    /// Acknowledge an event by id.
    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.acknowledge();
                true
            }
            None => false,
        }
    }

    pub fn is_circuit_broken(&self) -> bool {
        self.circuit_broken
    }

    pub fn is_drawdown_halted(&self) -> bool {
        self.drawdown_halted
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stopped
    }
}

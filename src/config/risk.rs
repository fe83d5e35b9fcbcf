//! Risk engine parameters

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Session risk limits. Percentage thresholds are fractions (0.10 = 10%).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Losing trades in a row before the circuit breaker trips
    pub max_consecutive_losses: u32,
    /// Single-trade loss, as a fraction of equity, that trips immediately
    pub catastrophic_loss_pct: Decimal,
    /// Drawdown fraction that logs a warning event
    pub drawdown_warning_pct: Decimal,
    /// Drawdown fraction that suspends opens
    pub drawdown_halt_pct: Decimal,
    /// Drawdown fraction at or below which a halt clears
    pub drawdown_recover_pct: Decimal,
    /// Cap on total open notional
    pub max_total_exposure: Decimal,
    /// Smallest order quantity worth submitting
    pub min_order_qty: Decimal,
    /// Exchange quantity step
    pub qty_step: Decimal,
    /// Account leverage used for margin checks
    pub leverage: Decimal,
    /// Process errors tolerated before an emergency stop
    pub max_process_errors: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_consecutive_losses: 3,
            catastrophic_loss_pct: Decimal::new(10, 2),
            drawdown_warning_pct: Decimal::new(10, 2),
            drawdown_halt_pct: Decimal::new(20, 2),
            drawdown_recover_pct: Decimal::new(10, 2),
            max_total_exposure: Decimal::from(100_000),
            min_order_qty: Decimal::new(1, 3),
            qty_step: Decimal::new(1, 3),
            leverage: Decimal::ONE,
            max_process_errors: 5,
        }
    }
}

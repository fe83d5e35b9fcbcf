//! Backtest parameters

use crate::config::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Simulation parameters for one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_balance: Decimal,
    /// Taker fee as a fraction of fill notional
    pub fee_rate: Decimal,
    /// Slippage applied against the order, in basis points
    pub slippage_bps: Decimal,
    pub leverage: Decimal,
    /// Fraction of equity committed per entry when the strategy does not
    /// size the order itself
    pub position_pct: Decimal,
    /// Quantity step orders are floored to
    pub qty_step: Decimal,
    /// Funding rate per settlement; positive charges longs
    pub funding_rate: Decimal,
    /// Klines between funding settlements, 0 disables funding
    pub funding_interval_steps: usize,
    /// Kline interval of the input data (e.g., "5m", "1h")
    pub interval: String,
    pub risk: RiskConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(10_000),
            fee_rate: Decimal::new(4, 4),
            slippage_bps: Decimal::from(5),
            leverage: Decimal::ONE,
            position_pct: Decimal::new(1, 1),
            qty_step: Decimal::new(1, 3),
            funding_rate: Decimal::ZERO,
            funding_interval_steps: 0,
            interval: "1h".to_string(),
            risk: RiskConfig::default(),
        }
    }
}

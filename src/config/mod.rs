//! Engine configuration

pub mod backtest;
pub mod risk;
pub mod strategy;

pub use backtest::BacktestConfig;
pub use risk::RiskConfig;
pub use strategy::ExitConfig;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Live engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Session identifier used as the persistence key
    pub session_id: String,
    pub symbols: Vec<String>,
    /// Kline interval subscribed from the feed
    pub interval: String,
    /// Bound on one strategy evaluation before it counts as an error
    pub eval_timeout_ms: u64,
    /// Signals queued for risk approval before emitters block
    pub signal_queue_capacity: usize,
    /// Klines retained per symbol in the indicator cache
    pub max_cache_history: usize,
    pub leverage: Decimal,
    /// Fraction of equity committed per entry when the strategy does not
    /// size the order itself
    pub position_pct: Decimal,
    /// Quantity step orders are floored to
    pub qty_step: Decimal,
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_id: "default".to_string(),
            symbols: Vec::new(),
            interval: "1h".to_string(),
            eval_timeout_ms: 2_000,
            signal_queue_capacity: 256,
            max_cache_history: 500,
            leverage: Decimal::ONE,
            position_pct: Decimal::new(1, 1),
            qty_step: Decimal::new(1, 3),
            risk: RiskConfig::default(),
        }
    }
}

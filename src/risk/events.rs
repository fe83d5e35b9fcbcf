//! Risk events and account snapshots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the risk engine observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskEventType {
    /// Consecutive-loss or catastrophic-loss circuit breaker tripped
    CircuitBreak,
    /// Circuit breaker manually reset
    CircuitReset,
    /// Drawdown crossed the warning threshold
    DrawdownWarning,
    /// Drawdown crossed the halt threshold, opens suspended
    DrawdownHalt,
    /// Signal rejected before it could become an order
    OrderRejected,
    /// Signal quantity reduced to fit the exposure cap
    ExposureAdjusted,
    /// Not enough free margin for the proposed order
    EquityInsufficient,
    /// All trading stopped after repeated processing errors
    EmergencyStop,
    /// A strategy evaluation or pipeline step failed
    ProcessError,
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Info,
    Warning,
    Critical,
}

/// Account state captured when an event fired
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub equity: Decimal,
    pub peak_equity: Decimal,
    pub drawdown_percent: Decimal,
    pub consecutive_losses: u32,
    pub is_circuit_broken: bool,
    pub is_drawdown_halted: bool,
    pub open_position_count: usize,
}

/// One risk engine event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: Uuid,
    pub event_type: RiskEventType,
    pub severity: RiskSeverity,
    /// Component or strategy that triggered the event
    pub source: String,
    pub symbol: Option<String>,
    pub reason: String,
    pub snapshot: RiskSnapshot,
    pub acknowledged: bool,
    pub timestamp: DateTime<Utc>,
}

impl RiskEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_type: RiskEventType,
        severity: RiskSeverity,
        source: impl Into<String>,
        symbol: Option<String>,
        reason: impl Into<String>,
        snapshot: RiskSnapshot,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity,
            source: source.into(),
            symbol,
            reason: reason.into(),
            snapshot,
            acknowledged: false,
            timestamp,
        }
    }

    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }
}

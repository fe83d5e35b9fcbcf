//! Trading signals emitted by strategies

use crate::portfolio::PosSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Intended position action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl SignalAction {
    /// True for position-opening actions.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::OpenLong | Self::OpenShort)
    }

    /// True for position-closing actions.
    pub fn is_close(&self) -> bool {
        !self.is_open()
    }

    /// Position side the action targets.
    pub fn pos_side(&self) -> PosSide {
        match self {
            Self::OpenLong | Self::CloseLong => PosSide::Long,
            Self::OpenShort | Self::CloseShort => PosSide::Short,
        }
    }
}

/// A strategy's intent to trade, pending risk approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    /// Emitting strategy name
    pub strategy: String,
    pub symbol: String,
    pub action: SignalAction,
    /// Proposed quantity; zero on a close means "the entire position",
    /// zero on an open means "let the host size it"
    pub suggested_qty: Decimal,
    /// Reference price at emission time
    pub suggested_price: Decimal,
    /// Strategy conviction in [0, 1]
    pub confidence: f64,
    /// Close-only flag carried through to the order
    pub reduce_only: bool,
    /// Human-readable trigger (e.g., "entry_long", "stop_loss")
    pub reason: String,
    /// Indicator values at emission time
    pub market_context: serde_json::Value,
    /// Risk verdict; `None` until evaluated
    pub risk_approved: Option<bool>,
    pub reject_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Position-opening signal.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        action: SignalAction,
        suggested_qty: Decimal,
        suggested_price: Decimal,
        confidence: f64,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            symbol: symbol.into(),
            action,
            suggested_qty,
            suggested_price,
            confidence,
            reduce_only: false,
            reason: reason.into(),
            market_context: serde_json::Value::Null,
            risk_approved: None,
            reject_reason: None,
            timestamp,
        }
    }

    /// Position-closing signal for the entire position.
    pub fn close(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        action: SignalAction,
        suggested_price: Decimal,
        confidence: f64,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            symbol: symbol.into(),
            action,
            suggested_qty: Decimal::ZERO,
            suggested_price,
            confidence,
            reduce_only: true,
            reason: reason.into(),
            market_context: serde_json::Value::Null,
            risk_approved: None,
            reject_reason: None,
            timestamp,
        }
    }

    /// Mark as approved by risk.
    pub fn approve(&mut self) {
        self.risk_approved = Some(true);
        self.reject_reason = None;
    }

    /// Mark as rejected by risk with a reason.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.risk_approved = Some(false);
        self.reject_reason = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_action_classification() {
        assert!(SignalAction::OpenLong.is_open());
        assert!(SignalAction::CloseShort.is_close());
        assert_eq!(SignalAction::OpenShort.pos_side(), PosSide::Short);
        assert_eq!(SignalAction::CloseLong.pos_side(), PosSide::Long);
    }

    #[test]
    fn test_close_signal_defaults() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let signal = Signal::close(
            "test",
            "BTC-USDT",
            SignalAction::CloseLong,
            Decimal::from(100),
            1.0,
            "take_profit",
            ts,
        );
        assert!(signal.reduce_only);
        assert_eq!(signal.suggested_qty, Decimal::ZERO);
        assert_eq!(signal.risk_approved, None);
    }
}

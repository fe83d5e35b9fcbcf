//! Deterministic fill simulation

use crate::decimal;
use crate::strategy::SignalAction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One simulated execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedFill {
    pub price: Decimal,
    pub qty: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Applies taker fees and fixed slippage against the order direction
#[derive(Debug, Clone)]
pub struct FillSimulator {
    fee_rate: Decimal,
    slippage_bps: Decimal,
}

impl FillSimulator {
    pub fn new(fee_rate: Decimal, slippage_bps: Decimal) -> Self {
        Self {
            fee_rate,
            slippage_bps,
        }
    }

    /// Fill at the reference price adjusted by slippage. Buy-side actions
    /// (open long, close short) pay up; sell-side actions receive less.
    pub fn execute(
        &self,
        action: SignalAction,
        price: Decimal,
        qty: Decimal,
        ts: DateTime<Utc>,
    ) -> SimulatedFill {
        let slip = price * self.slippage_bps / Decimal::from(10_000);
        let fill_price = match action {
            SignalAction::OpenLong | SignalAction::CloseShort => price + slip,
            SignalAction::OpenShort | SignalAction::CloseLong => price - slip,
        };
        let fill_price = decimal::round_price(fill_price);
        let fee = decimal::round_money(fill_price * qty * self.fee_rate);
        SimulatedFill {
            price: fill_price,
            qty,
            fee,
            timestamp: ts,
        }
    }
}

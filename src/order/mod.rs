//! Order lifecycle
//!
//! Orders move through a fixed status machine; every transition is
//! checked so an exchange callback arriving out of order cannot corrupt
//! fill accounting.

pub mod execution;
pub mod tracker;

pub use execution::{submit_with_retry, ExecutionClient, ExecutionError};
pub use tracker::{ExecutionEvent, OrderTracker};

use crate::decimal::{self, DecimalError};
use crate::portfolio::PosSide;
use crate::strategy::{Signal, SignalAction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order status machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Failed,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected | Self::Failed)
    }

    /// Allowed transitions of the status machine.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Open)
                | (Pending, Cancelled)
                | (Pending, Rejected)
                | (Pending, Failed)
                | (Open, PartiallyFilled)
                | (Open, Filled)
                | (Open, Cancelled)
                | (PartiallyFilled, PartiallyFilled)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Cancelled)
        )
    }
}

/// Order lifecycle errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order {0} is terminal")]
    Terminal(Uuid),
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error(transparent)]
    Decimal(#[from] DecimalError),
}

/// One order derived from an approved signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub signal_id: Uuid,
    /// Emitting strategy, carried for trade attribution
    pub strategy: String,
    pub symbol: String,
    pub side: OrderSide,
    pub pos_side: PosSide,
    pub order_type: OrderType,
    pub qty: Decimal,
    /// Limit price; `None` for market orders
    pub price: Option<Decimal>,
    pub filled_qty: Decimal,
    /// Volume-weighted average fill price
    pub avg_fill_price: Option<Decimal>,
    pub fee: Decimal,
    pub status: OrderStatus,
    pub reduce_only: bool,
    /// Signal trigger (e.g., "entry_long", "stop_loss")
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a market order from an approved signal.
    pub fn from_signal(signal: &Signal, qty: Decimal) -> Self {
        let side = match signal.action {
            SignalAction::OpenLong | SignalAction::CloseShort => OrderSide::Buy,
            SignalAction::OpenShort | SignalAction::CloseLong => OrderSide::Sell,
        };
        Self {
            id: Uuid::new_v4(),
            signal_id: signal.id,
            strategy: signal.strategy.clone(),
            symbol: signal.symbol.clone(),
            side,
            pos_side: signal.action.pos_side(),
            order_type: OrderType::Market,
            qty,
            price: None,
            filled_qty: Decimal::ZERO,
            avg_fill_price: None,
            fee: Decimal::ZERO,
            status: OrderStatus::Pending,
            reduce_only: signal.reduce_only,
            reason: signal.reason.clone(),
            created_at: signal.timestamp,
            updated_at: signal.timestamp,
        }
    }

    /// Move to a new status, enforcing the machine.
    pub fn transition(&mut self, to: OrderStatus, ts: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::Terminal(self.id));
        }
        if !self.status.can_transition(to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = ts;
        Ok(())
    }

    /// Apply one fill: updates the weighted average fill price, the
    /// filled quantity, and the status. A pending order is promoted to
    /// open first, mirroring exchanges that report the fill before the
    /// acceptance ack.
    pub fn apply_fill(
        &mut self,
        price: Decimal,
        qty: Decimal,
        fee: Decimal,
        ts: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.status == OrderStatus::Pending {
            self.transition(OrderStatus::Open, ts)?;
        }
        let new_filled = self.filled_qty + qty;
        let prior_notional = self
            .avg_fill_price
            .map(|avg| avg * self.filled_qty)
            .unwrap_or(Decimal::ZERO);
        let avg = decimal::div(prior_notional + price * qty, new_filled)?;

        let to = if new_filled >= self.qty {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(to, ts)?;
        self.filled_qty = new_filled;
        self.avg_fill_price = Some(decimal::round_price(avg));
        self.fee += fee;
        Ok(())
    }

    /// Quantity still unfilled.
    pub fn remaining_qty(&self) -> Decimal {
        self.qty - self.filled_qty
    }
}

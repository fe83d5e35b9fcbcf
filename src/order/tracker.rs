//! Order tracking against exchange callbacks

use crate::order::{Order, OrderError, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Normalized exchange execution callback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Fill {
        order_id: String,
        price: Decimal,
        qty: Decimal,
        fee: Decimal,
        timestamp: DateTime<Utc>,
    },
    Cancelled {
        order_id: String,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        order_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    Failed {
        order_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn order_id(&self) -> &str {
        match self {
            Self::Fill { order_id, .. }
            | Self::Cancelled { order_id, .. }
            | Self::Rejected { order_id, .. }
            | Self::Failed { order_id, .. } => order_id,
        }
    }
}

/// In-memory map of live orders keyed by exchange order id
#[derive(Default)]
pub struct OrderTracker {
    orders: HashMap<String, Order>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an order under its exchange id.
    pub fn track(&mut self, exchange_id: impl Into<String>, order: Order) {
        self.orders.insert(exchange_id.into(), order);
    }

    /// Apply an execution event. Returns the updated order, or `None`
    /// for unknown ids (logged and dropped) and invalid transitions.
    pub fn apply(&mut self, event: &ExecutionEvent) -> Option<&Order> {
        let order_id = event.order_id().to_string();
        let Some(order) = self.orders.get_mut(&order_id) else {
            warn!(order_id, "execution event for unknown order");
            return None;
        };
        let result: Result<(), OrderError> = match event {
            ExecutionEvent::Fill {
                price,
                qty,
                fee,
                timestamp,
                ..
            } => order.apply_fill(*price, *qty, *fee, *timestamp),
            ExecutionEvent::Cancelled { timestamp, .. } => {
                order.transition(OrderStatus::Cancelled, *timestamp)
            }
            ExecutionEvent::Rejected { timestamp, .. } => {
                order.transition(OrderStatus::Rejected, *timestamp)
            }
            ExecutionEvent::Failed { timestamp, .. } => {
                order.transition(OrderStatus::Failed, *timestamp)
            }
        };
        if let Err(e) = result {
            warn!(order_id, error = %e, "execution event not applied");
            return None;
        }
        self.orders.get(&order_id)
    }

    pub fn get(&self, exchange_id: &str) -> Option<&Order> {
        self.orders.get(exchange_id)
    }

    /// Orders not yet in a terminal state.
    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .collect()
    }

    /// Drop terminal orders from the table.
    pub fn prune_terminal(&mut self) {
        self.orders.retain(|_, o| !o.status.is_terminal());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Signal, SignalAction};
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn order() -> Order {
        let signal = Signal::open(
            "test",
            "BTC-USDT",
            SignalAction::OpenLong,
            Decimal::from(2),
            Decimal::from(100),
            0.7,
            "entry_long",
            ts(),
        );
        Order::from_signal(&signal, Decimal::from(2))
    }

    #[test]
    fn test_fill_flow() {
        let mut tracker = OrderTracker::new();
        tracker.track("ex-1", order());
        let updated = tracker
            .apply(&ExecutionEvent::Fill {
                order_id: "ex-1".to_string(),
                price: Decimal::from(100),
                qty: Decimal::from(2),
                fee: Decimal::new(4, 2),
                timestamp: ts(),
            })
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Filled);
        assert!(tracker.open_orders().is_empty());
        tracker.prune_terminal();
        assert!(tracker.get("ex-1").is_none());
    }

    #[test]
    fn test_unknown_order_is_dropped() {
        let mut tracker = OrderTracker::new();
        assert!(tracker
            .apply(&ExecutionEvent::Cancelled {
                order_id: "ghost".to_string(),
                timestamp: ts(),
            })
            .is_none());
    }

    #[test]
    fn test_event_after_terminal_is_ignored() {
        let mut tracker = OrderTracker::new();
        tracker.track("ex-1", order());
        tracker
            .apply(&ExecutionEvent::Rejected {
                order_id: "ex-1".to_string(),
                reason: "insufficient margin".to_string(),
                timestamp: ts(),
            })
            .unwrap();
        assert!(tracker
            .apply(&ExecutionEvent::Fill {
                order_id: "ex-1".to_string(),
                price: Decimal::from(100),
                qty: Decimal::ONE,
                fee: Decimal::ZERO,
                timestamp: ts(),
            })
            .is_none());
        assert_eq!(tracker.get("ex-1").unwrap().status, OrderStatus::Rejected);
    }
}

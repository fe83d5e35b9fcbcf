//! Margin account with hedged position bookkeeping
//!
//! Positions are keyed by (symbol, side) so a long and a short can
//! coexist on one symbol. Fees are deducted from cash as they occur;
//! funding accrues on the position and settles into cash at close.

use crate::portfolio::{PosSide, Position};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Equity curve sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Simulated margin account
#[derive(Debug, Clone)]
pub struct Account {
    cash: Decimal,
    positions: HashMap<(String, PosSide), Position>,
}

impl Account {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            cash: initial_balance,
            positions: HashMap::new(),
        }
    }

    /// Open or add to a position. Fees come out of cash immediately;
    /// adds recompute the volume-weighted entry price.
    pub fn open_position(
        &mut self,
        symbol: &str,
        side: PosSide,
        qty: Decimal,
        price: Decimal,
        leverage: Decimal,
        fee: Decimal,
        ts: DateTime<Utc>,
    ) {
        self.cash -= fee;
        let key = (symbol.to_string(), side);
        match self.positions.get_mut(&key) {
            Some(position) => {
                let total_qty = position.qty + qty;
                if total_qty > Decimal::ZERO {
                    position.entry_price = crate::decimal::round_price(
                        (position.entry_price * position.qty + price * qty) / total_qty,
                    );
                }
                position.qty = total_qty;
                position.mark_price = price;
                position.fee_paid += fee;
            }
            None => {
                let mut position = Position::new(symbol, side, qty, price, leverage, ts);
                position.fee_paid = fee;
                self.positions.insert(key, position);
            }
        }
    }

    /// Close a position, fully (`qty` zero or at least the open size) or
    /// partially. Realized PnL plus the released funding share settle
    /// into cash, net of the close fee. Returns the closed slice and its
    /// realized price PnL, `None` when no such position exists.
    pub fn close_position(
        &mut self,
        symbol: &str,
        side: PosSide,
        qty: Decimal,
        price: Decimal,
        fee: Decimal,
    ) -> Option<(Position, Decimal)> {
        let key = (symbol.to_string(), side);
        let position = self.positions.get_mut(&key)?;
        let close_qty = if qty <= Decimal::ZERO || qty >= position.qty {
            position.qty
        } else {
            qty
        };
        if close_qty <= Decimal::ZERO {
            return None;
        }

        let pnl = match side {
            PosSide::Long => (price - position.entry_price) * close_qty,
            PosSide::Short => (position.entry_price - price) * close_qty,
        };
        // funding releases in proportion to the closed quantity
        let funding_share = if close_qty == position.qty {
            position.funding_pnl
        } else {
            crate::decimal::round_money(
                position.funding_pnl * close_qty
                    / position.qty,
            )
        };
        self.cash += pnl - fee + funding_share;

        let mut closed = position.clone();
        closed.qty = close_qty;
        closed.mark_price = price;
        closed.funding_pnl = funding_share;

        if close_qty == position.qty {
            self.positions.remove(&key);
        } else {
            position.qty -= close_qty;
            position.funding_pnl -= funding_share;
        }
        Some((closed, pnl))
    }

    /// Accrue one funding settlement on every open position. Positive
    /// rates charge longs and pay shorts.
    pub fn apply_funding(&mut self, rate: Decimal) {
        for position in self.positions.values_mut() {
            let payment = crate::decimal::round_money(position.notional() * rate);
            match position.side {
                PosSide::Long => position.funding_pnl -= payment,
                PosSide::Short => position.funding_pnl += payment,
            }
        }
    }

    /// Update the mark price of every position on a symbol.
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        for ((s, _), position) in self.positions.iter_mut() {
            if s == symbol {
                position.mark(price);
            }
        }
    }

    /// Cash plus unrealized PnL plus accrued funding.
    pub fn equity(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.unrealized_pnl() + p.funding_pnl)
                .sum::<Decimal>()
    }

    /// Cash not locked as margin.
    pub fn available(&self) -> Decimal {
        self.cash - self.positions.values().map(Position::margin).sum::<Decimal>()
    }

    /// Sum of position notionals at the current marks.
    pub fn total_exposure(&self) -> Decimal {
        self.positions.values().map(Position::notional).sum()
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, symbol: &str, side: PosSide) -> Option<&Position> {
        self.positions.get(&(symbol.to_string(), side))
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Sample the equity curve at a timestamp.
    pub fn equity_point(&self, timestamp: DateTime<Utc>) -> EquityPoint {
        EquityPoint {
            timestamp,
            equity: self.equity(),
            cash: self.cash,
            unrealized_pnl: self.positions.values().map(Position::unrealized_pnl).sum(),
        }
    }
}

//! Open position accounting

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosSide {
    Long,
    Short,
}

/// One open position on a symbol/side pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PosSide,
    pub qty: Decimal,
    /// Volume-weighted average entry price
    pub entry_price: Decimal,
    /// Latest observed price
    pub mark_price: Decimal,
    pub leverage: Decimal,
    /// Funding accrued while the position has been open
    pub funding_pnl: Decimal,
    /// Fees paid opening (and adding to) the position
    pub fee_paid: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        side: PosSide,
        qty: Decimal,
        entry_price: Decimal,
        leverage: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            qty,
            entry_price,
            mark_price: entry_price,
            leverage,
            funding_pnl: Decimal::ZERO,
            fee_paid: Decimal::ZERO,
            opened_at,
        }
    }

    /// Update the mark price.
    pub fn mark(&mut self, price: Decimal) {
        self.mark_price = price;
    }

    /// Unrealized PnL at the current mark.
    pub fn unrealized_pnl(&self) -> Decimal {
        match self.side {
            PosSide::Long => (self.mark_price - self.entry_price) * self.qty,
            PosSide::Short => (self.entry_price - self.mark_price) * self.qty,
        }
    }

    /// Position value at the current mark.
    pub fn notional(&self) -> Decimal {
        self.mark_price * self.qty
    }

    /// Margin locked by the position.
    pub fn margin(&self) -> Decimal {
        if self.leverage > Decimal::ZERO {
            self.notional() / self.leverage
        } else {
            self.notional()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn position(side: PosSide) -> Position {
        Position::new(
            "BTC-USDT",
            side,
            Decimal::from(2),
            Decimal::from(100),
            Decimal::from(5),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_unrealized_pnl_signs() {
        let mut long = position(PosSide::Long);
        long.mark(Decimal::from(110));
        assert_eq!(long.unrealized_pnl(), Decimal::from(20));

        let mut short = position(PosSide::Short);
        short.mark(Decimal::from(110));
        assert_eq!(short.unrealized_pnl(), Decimal::from(-20));
    }

    #[test]
    fn test_margin_uses_leverage() {
        let mut p = position(PosSide::Long);
        p.mark(Decimal::from(100));
        assert_eq!(p.notional(), Decimal::from(200));
        assert_eq!(p.margin(), Decimal::from(40));
    }
}

//! Completed trade records

use crate::portfolio::PosSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One completed round trip: open to close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy: String,
    pub symbol: String,
    pub side: PosSide,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Realized price PnL, before fees and funding
    pub pnl: Decimal,
    /// Signed return on entry notional, percent
    pub pnl_percent: Decimal,
    /// Total fees across open and close
    pub fee: Decimal,
    /// Funding accrued while open, signed
    pub funding_pnl: Decimal,
    pub duration_secs: i64,
    /// Close trigger (e.g., "exit_long", "take_profit", "session_end")
    pub reason: String,
}

impl TradeRecord {
    /// PnL net of fees and funding.
    pub fn net_pnl(&self) -> Decimal {
        self.pnl - self.fee + self.funding_pnl
    }
}

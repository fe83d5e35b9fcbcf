//! Account, position, and trade accounting

pub mod account;
pub mod position;
pub mod trade;

pub use account::{Account, EquityPoint};
pub use position::{PosSide, Position};
pub use trade::TradeRecord;

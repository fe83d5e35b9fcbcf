//! Strategy exit parameters

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Take-profit / stop-loss thresholds, in percent of entry price.
/// `None` disables the corresponding exit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitConfig {
    pub take_profit_pct: Option<Decimal>,
    pub stop_loss_pct: Option<Decimal>,
}

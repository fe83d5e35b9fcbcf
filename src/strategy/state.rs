//! Per-(strategy, symbol) evaluation state

use crate::portfolio::PosSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Mutable state a strategy carries between evaluations of one symbol
#[derive(Debug, Clone, Default)]
pub struct StrategyState {
    /// Side of the strategy-tracked position, `None` when flat
    pub side: Option<PosSide>,
    /// Entry price of the tracked position
    pub entry_price: Option<Decimal>,
    /// Most recent price observed (kline close or tick)
    pub latest_price: Option<Decimal>,
    /// Indicator/price value table from the previous kline, for cross
    /// detection
    pub prev_values: Option<BTreeMap<String, Decimal>>,
    /// Timestamp of the last emitted signal
    pub last_signal: Option<DateTime<Utc>>,
}

impl StrategyState {
    /// Record a position open.
    pub fn open(&mut self, side: PosSide, entry_price: Decimal, ts: DateTime<Utc>) {
        self.side = Some(side);
        self.entry_price = Some(entry_price);
        self.last_signal = Some(ts);
    }

    /// Record a position close.
    pub fn close(&mut self, ts: DateTime<Utc>) {
        self.side = None;
        self.entry_price = None;
        self.last_signal = Some(ts);
    }

    /// True while the strategy tracks an open position.
    pub fn in_position(&self) -> bool {
        self.side.is_some()
    }
}

/// Key for one strategy/symbol state slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub strategy: String,
    pub symbol: String,
}

impl StateKey {
    pub fn new(strategy: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            symbol: symbol.into(),
        }
    }
}

/// Concurrent store of strategy states. The outer lock guards the map,
/// each slot has its own mutex so evaluations for different keys never
/// serialize on each other.
#[derive(Default)]
pub struct StateStore {
    slots: RwLock<HashMap<StateKey, Arc<Mutex<StrategyState>>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the state slot for a key.
    pub async fn entry(&self, key: &StateKey) -> Arc<Mutex<StrategyState>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(key) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Drop all slots for a symbol.
    pub async fn evict_symbol(&self, symbol: &str) {
        self.slots.write().await.retain(|k, _| k.symbol != symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_transitions() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = StrategyState::default();
        assert!(!state.in_position());
        state.open(PosSide::Long, Decimal::from(100), ts);
        assert!(state.in_position());
        assert_eq!(state.entry_price, Some(Decimal::from(100)));
        state.close(ts);
        assert!(!state.in_position());
        assert_eq!(state.entry_price, None);
    }

    #[tokio::test]
    async fn test_store_returns_same_slot() {
        let store = StateStore::new();
        let key = StateKey::new("s1", "BTC-USDT");
        let a = store.entry(&key).await;
        let b = store.entry(&key).await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}

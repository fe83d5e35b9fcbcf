//! Shared indicator cache
//!
//! One cache instance serves every strategy in the session. Kline history
//! is kept per symbol, bounded by `max_history`. An indicator instance is
//! created lazily on first request for its `(symbol, kind)` pair, replayed
//! over the retained history, then advanced incrementally on each new
//! kline, so ten strategies asking for RSI(14) on the same symbol share
//! one computation.

use super::{Indicator, IndicatorKind, IndicatorValue};
use crate::data::Kline;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const DEFAULT_MAX_HISTORY: usize = 500;

struct Entry {
    indicator: Box<dyn Indicator>,
    value: Option<IndicatorValue>,
}

struct SymbolCache {
    klines: VecDeque<Kline>,
    last_ts: Option<DateTime<Utc>>,
    entries: HashMap<IndicatorKind, Entry>,
}

impl SymbolCache {
    fn new() -> Self {
        Self {
            klines: VecDeque::new(),
            last_ts: None,
            entries: HashMap::new(),
        }
    }
}

/// Per-symbol kline history plus lazily materialized indicator values
pub struct IndicatorCache {
    max_history: usize,
    symbols: Mutex<HashMap<String, SymbolCache>>,
}

impl Default for IndicatorCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl IndicatorCache {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            symbols: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SymbolCache>> {
        match self.symbols.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Ingest a closed kline: append to history and advance every
    /// indicator already materialized for the symbol. Klines at or before
    /// the last seen timestamp are dropped.
    pub fn on_kline(&self, kline: &Kline) {
        let mut symbols = self.lock();
        let cache = symbols
            .entry(kline.symbol.clone())
            .or_insert_with(SymbolCache::new);

        if let Some(last_ts) = cache.last_ts {
            if kline.timestamp <= last_ts {
                warn!(
                    symbol = %kline.symbol,
                    ts = %kline.timestamp,
                    last_ts = %last_ts,
                    "dropping stale kline"
                );
                return;
            }
        }
        cache.last_ts = Some(kline.timestamp);
        cache.klines.push_back(kline.clone());
        while cache.klines.len() > self.max_history {
            cache.klines.pop_front();
        }
        for entry in cache.entries.values_mut() {
            entry.indicator.update(kline);
            entry.value = entry.indicator.value();
        }
    }

    /// Current value of an indicator for a symbol. First request for a
    /// `(symbol, kind)` pair instantiates the indicator and replays the
    /// retained history; later requests are a table lookup. Returns `None`
    /// while warming up or when the symbol has no history.
    pub fn get(&self, symbol: &str, kind: &IndicatorKind) -> Option<IndicatorValue> {
        let mut symbols = self.lock();
        let cache = symbols.get_mut(symbol)?;
        if let Some(entry) = cache.entries.get(kind) {
            return entry.value.clone();
        }
        let mut indicator = match kind.build() {
            Ok(indicator) => indicator,
            Err(e) => {
                warn!(symbol, ?kind, error = %e, "failed to build indicator");
                return None;
            }
        };
        debug!(symbol, ?kind, replayed = cache.klines.len(), "materializing indicator");
        for kline in &cache.klines {
            indicator.update(kline);
        }
        let value = indicator.value();
        cache.entries.insert(kind.clone(), Entry { indicator, value: value.clone() });
        value
    }

    /// Number of retained klines for a symbol.
    pub fn history_len(&self, symbol: &str) -> usize {
        self.lock().get(symbol).map_or(0, |c| c.klines.len())
    }

    /// Timestamp of the newest retained kline for a symbol.
    pub fn last_timestamp(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.lock().get(symbol).and_then(|c| c.last_ts)
    }

    /// Drop all state for a symbol.
    pub fn evict_symbol(&self, symbol: &str) {
        self.lock().remove(symbol);
    }

    /// Drop symbols whose newest kline is older than `cutoff`.
    pub fn evict_idle(&self, cutoff: DateTime<Utc>) {
        let mut symbols = self.lock();
        symbols.retain(|symbol, cache| {
            let keep = cache.last_ts.is_some_and(|ts| ts >= cutoff);
            if !keep {
                debug!(symbol, "evicting idle symbol");
            }
            keep
        });
    }
}

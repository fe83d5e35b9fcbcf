//! Automated crypto-futures trading engine
//!
//! The pipeline runs market data through a shared indicator cache,
//! declarative or coded strategies, a stateful risk engine, and an order
//! lifecycle tracker. The same pipeline drives live sessions
//! ([`engine::TradingEngine`]) and deterministic historical replay
//! ([`backtest::BacktestEngine`], [`backtest::Tournament`]).
//!
//! All prices, quantities, and PnL figures are exact decimals; floats
//! appear only inside indicator math and ratio-style metrics.

pub mod backtest;
pub mod config;
pub mod data;
pub mod decimal;
pub mod engine;
pub mod indicators;
pub mod logging;
pub mod order;
pub mod persist;
pub mod portfolio;
pub mod risk;
pub mod strategy;

/// Crate-wide result type
pub type Result<T> = anyhow::Result<T>;

pub mod prelude {
    //! Common imports for embedding the engine

    pub use crate::backtest::{BacktestEngine, BacktestResult, Tournament, TournamentEntry};
    pub use crate::config::{BacktestConfig, EngineConfig, ExitConfig, RiskConfig};
    pub use crate::data::{Kline, KlineSeries, MarketDataFeed, MarketEvent, MarketTick};
    pub use crate::engine::TradingEngine;
    pub use crate::indicators::{IndicatorCache, IndicatorKind, IndicatorSpec, IndicatorValue};
    pub use crate::order::{ExecutionClient, ExecutionEvent, Order, OrderStatus, OrderTracker};
    pub use crate::persist::{MemoryStore, TradeStore};
    pub use crate::portfolio::{Account, PosSide, Position, TradeRecord};
    pub use crate::risk::{AccountView, RiskEngine, RiskEvent, RiskEventType};
    pub use crate::strategy::{
        RuleDefinition, RuleStrategy, Signal, SignalAction, Strategy, StrategyRegistry,
        StrategyState,
    };
    pub use crate::Result;
}

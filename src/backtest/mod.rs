//! Backtesting: deterministic replay, metrics, and tournaments

pub mod engine;
pub mod fill;
pub mod metrics;
pub mod tournament;

pub use engine::{BacktestEngine, BacktestResult, BacktestStatus};
pub use fill::{FillSimulator, SimulatedFill};
pub use metrics::BacktestMetrics;
pub use tournament::{
    LeaderboardRow, StrategyDetail, Tournament, TournamentEntry, TournamentStanding,
};

//! Strategy tournament
//!
//! Runs several strategies over the same kline series in parallel, each
//! against its own isolated account, and exposes a live leaderboard while
//! runs are in flight plus per-strategy detail after they finish.

use crate::backtest::{BacktestEngine, BacktestResult, BacktestStatus};
use crate::config::BacktestConfig;
use crate::data::KlineSeries;
use crate::decimal;
use crate::portfolio::Position;
use crate::strategy::Strategy;
use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// One competitor
pub struct TournamentEntry {
    pub name: String,
    pub strategy: Arc<dyn Strategy>,
}

impl TournamentEntry {
    pub fn new(name: impl Into<String>, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }
}

/// Live snapshot of one competitor's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentStanding {
    pub equity: Decimal,
    pub cash: Decimal,
    pub unrealized_pnl: Decimal,
    pub positions: Vec<Position>,
    pub processed: usize,
    pub total: usize,
    pub status: BacktestStatus,
}

/// One leaderboard row, ranked by equity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub strategy: String,
    pub equity: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub unrealized_pnl: Decimal,
    pub position_count: usize,
    pub rank: u32,
}

/// Post-run detail for one competitor
#[derive(Debug, Clone)]
pub struct StrategyDetail {
    pub name: String,
    pub standing: TournamentStanding,
    pub result: BacktestResult,
}

type Standings = Arc<RwLock<HashMap<String, TournamentStanding>>>;

/// Parallel multi-strategy backtest with a shared leaderboard
pub struct Tournament {
    config: BacktestConfig,
    standings: Standings,
    results: HashMap<String, BacktestResult>,
}

impl Tournament {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            standings: Arc::new(RwLock::new(HashMap::new())),
            results: HashMap::new(),
        }
    }

    /// Run all entries to completion. Each entry replays the full series
    /// on a blocking worker; standings update as klines are processed.
    pub async fn run(&mut self, entries: Vec<TournamentEntry>, data: Arc<KlineSeries>) -> Result<()> {
        let mut handles = Vec::with_capacity(entries.len());
        for entry in entries {
            let data = Arc::clone(&data);
            let config = self.config.clone();
            let standings = Arc::clone(&self.standings);
            let name = entry.name.clone();
            let strategy = entry.strategy;
            info!(entry = %name, "tournament entry started");
            let task_name = name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let engine = BacktestEngine::new(config, strategy);
                engine.run_with_progress(&data, |processed, total, account| {
                    let standing = TournamentStanding {
                        equity: account.equity(),
                        cash: account.cash(),
                        unrealized_pnl: account.positions().map(Position::unrealized_pnl).sum(),
                        positions: account.positions().cloned().collect(),
                        processed,
                        total,
                        status: BacktestStatus::Running,
                    };
                    standings
                        .blocking_write()
                        .insert(task_name.clone(), standing);
                })
            });
            handles.push((name, handle));
        }

        let (names, joins): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let outcomes = futures::future::join_all(joins).await;
        for (name, outcome) in names.into_iter().zip(outcomes) {
            let result = outcome??;
            {
                let mut standings = self.standings.write().await;
                if let Some(standing) = standings.get_mut(&name) {
                    standing.status = result.status;
                    standing.equity = result.metrics.final_equity;
                    standing.positions.clear();
                    standing.unrealized_pnl = Decimal::ZERO;
                }
            }
            info!(
                entry = %name,
                final_equity = %result.metrics.final_equity,
                trades = result.metrics.total_trades,
                "tournament entry finished"
            );
            self.results.insert(name, result);
        }
        Ok(())
    }

    /// Current leaderboard: equity descending, name ascending on ties.
    pub async fn leaderboard(&self) -> Vec<LeaderboardRow> {
        let initial = self.config.initial_balance;
        let standings = self.standings.read().await;
        let mut rows: Vec<LeaderboardRow> = standings
            .iter()
            .map(|(name, standing)| {
                let pnl = standing.equity - initial;
                let pnl_percent = decimal::pct_change_dec(initial, standing.equity)
                    .unwrap_or(Decimal::ZERO);
                LeaderboardRow {
                    strategy: name.clone(),
                    equity: standing.equity,
                    pnl,
                    pnl_percent,
                    unrealized_pnl: standing.unrealized_pnl,
                    position_count: standing.positions.len(),
                    rank: 0,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.equity
                .cmp(&a.equity)
                .then_with(|| a.strategy.cmp(&b.strategy))
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i as u32 + 1;
        }
        rows
    }

    /// Full detail for one finished competitor.
    pub async fn strategy_detail(&self, name: &str) -> Option<StrategyDetail> {
        let standing = self.standings.read().await.get(name).cloned()?;
        let result = self.results.get(name).cloned()?;
        Some(StrategyDetail {
            name: name.to_string(),
            standing,
            result,
        })
    }
}

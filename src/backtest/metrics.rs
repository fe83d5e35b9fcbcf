//! Backtest performance metrics

use crate::decimal;
use crate::portfolio::{EquityPoint, TradeRecord};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const MINUTES_PER_YEAR: f64 = 525_600.0;

/// Summary statistics for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Sum of positive net PnL
    pub gross_profit: Decimal,
    /// Sum of negative net PnL, as a positive magnitude
    pub gross_loss: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub profit_factor: f64,
    /// Mean net PnL per trade
    pub expectancy: f64,
    pub max_drawdown: Decimal,
    pub max_drawdown_percent: Decimal,
    /// Annualized, from per-step equity returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub avg_hold_secs: f64,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
    pub total_fees: Decimal,
    pub total_funding: Decimal,
    pub final_equity: Decimal,
    pub total_return_percent: Decimal,
}

/// Kline interval length in minutes ("5m", "1h", "1d"). Unknown formats
/// fall back to one hour.
fn interval_minutes(interval: &str) -> f64 {
    let (digits, unit) = interval.split_at(interval.len().saturating_sub(1));
    let n: f64 = digits.parse().unwrap_or(1.0);
    match unit {
        "m" => n,
        "h" => n * 60.0,
        "d" => n * 1_440.0,
        _ => 60.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

impl BacktestMetrics {
    /// Compute from completed trades and the equity curve.
    pub fn compute(
        initial_balance: Decimal,
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        interval: &str,
    ) -> Self {
        let mut winning = 0usize;
        let mut losing = 0usize;
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut largest_win = Decimal::ZERO;
        let mut largest_loss = Decimal::ZERO;
        let mut total_fees = Decimal::ZERO;
        let mut total_funding = Decimal::ZERO;
        let mut hold_secs = 0i64;
        let mut win_streak = 0u32;
        let mut loss_streak = 0u32;
        let mut max_win_streak = 0u32;
        let mut max_loss_streak = 0u32;

        for trade in trades {
            let net = trade.net_pnl();
            total_fees += trade.fee;
            total_funding += trade.funding_pnl;
            hold_secs += trade.duration_secs;
            if net > Decimal::ZERO {
                winning += 1;
                gross_profit += net;
                largest_win = largest_win.max(net);
                win_streak += 1;
                loss_streak = 0;
            } else if net < Decimal::ZERO {
                losing += 1;
                gross_loss += net.abs();
                largest_loss = largest_loss.max(net.abs());
                loss_streak += 1;
                win_streak = 0;
            } else {
                win_streak = 0;
                loss_streak = 0;
            }
            max_win_streak = max_win_streak.max(win_streak);
            max_loss_streak = max_loss_streak.max(loss_streak);
        }

        let total = trades.len();
        let net_total = gross_profit - gross_loss;
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);

        // drawdown over the sampled curve
        let mut peak = initial_balance;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_ratio = Decimal::ZERO;
        for point in equity_curve {
            if point.equity > peak {
                peak = point.equity;
            }
            let dd = peak - point.equity;
            if dd > max_drawdown {
                max_drawdown = dd;
            }
            if peak > Decimal::ZERO {
                max_drawdown_ratio = max_drawdown_ratio.max(dd / peak);
            }
        }

        // per-step simple returns in the float domain
        let mut returns = Vec::with_capacity(equity_curve.len());
        let mut prev = initial_balance.to_f64().unwrap_or(0.0);
        for point in equity_curve {
            let equity = point.equity.to_f64().unwrap_or(0.0);
            if prev > 0.0 {
                returns.push(equity / prev - 1.0);
            }
            prev = equity;
        }
        let steps_per_year = MINUTES_PER_YEAR / interval_minutes(interval);
        let mean_return = mean(&returns);
        let sd = std_dev(&returns, mean_return);
        let sharpe_ratio = if sd > 0.0 {
            mean_return / sd * steps_per_year.sqrt()
        } else {
            0.0
        };
        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let downside_sd = std_dev(&downside, mean(&downside));
        let sortino_ratio = if downside_sd > 0.0 {
            mean_return / downside_sd * steps_per_year.sqrt()
        } else {
            0.0
        };
        let annualized_return = mean_return * steps_per_year;
        let dd_ratio = max_drawdown_ratio.to_f64().unwrap_or(0.0);
        let calmar_ratio = if dd_ratio > 0.0 {
            annualized_return / dd_ratio
        } else {
            0.0
        };

        let total_return_percent = if initial_balance > Decimal::ZERO {
            decimal::round_pct(
                (final_equity - initial_balance) / initial_balance * Decimal::ONE_HUNDRED,
            )
        } else {
            Decimal::ZERO
        };

        Self {
            total_trades: total,
            winning_trades: winning,
            losing_trades: losing,
            win_rate: if total > 0 {
                winning as f64 / total as f64
            } else {
                0.0
            },
            gross_profit,
            gross_loss,
            avg_win: if winning > 0 {
                decimal::round_money(gross_profit / Decimal::from(winning as u64))
            } else {
                Decimal::ZERO
            },
            avg_loss: if losing > 0 {
                decimal::round_money(gross_loss / Decimal::from(losing as u64))
            } else {
                Decimal::ZERO
            },
            largest_win,
            largest_loss,
            profit_factor: if gross_loss > Decimal::ZERO {
                (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
            } else if gross_profit > Decimal::ZERO {
                f64::INFINITY
            } else {
                0.0
            },
            expectancy: if total > 0 {
                (net_total / Decimal::from(total as u64))
                    .to_f64()
                    .unwrap_or(0.0)
            } else {
                0.0
            },
            max_drawdown: decimal::round_money(max_drawdown),
            max_drawdown_percent: decimal::round_pct(
                max_drawdown_ratio * Decimal::ONE_HUNDRED,
            ),
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            avg_hold_secs: if total > 0 {
                hold_secs as f64 / total as f64
            } else {
                0.0
            },
            max_consecutive_wins: max_win_streak,
            max_consecutive_losses: max_loss_streak,
            total_fees,
            total_funding,
            final_equity,
            total_return_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::PosSide;
    use chrono::{Duration, TimeZone, Utc};

    fn trade(pnl: i64, fee: i64) -> TradeRecord {
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TradeRecord {
            strategy: "test".to_string(),
            symbol: "BTC-USDT".to_string(),
            side: PosSide::Long,
            qty: Decimal::ONE,
            entry_price: Decimal::from(100),
            exit_price: Decimal::from(100 + pnl),
            entry_time: entry,
            exit_time: entry + Duration::hours(1),
            pnl: Decimal::from(pnl),
            pnl_percent: Decimal::from(pnl),
            fee: Decimal::from(fee),
            funding_pnl: Decimal::ZERO,
            duration_secs: 3600,
            reason: "exit_long".to_string(),
        }
    }

    fn point(minute: u32, equity: i64) -> EquityPoint {
        EquityPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            equity: Decimal::from(equity),
            cash: Decimal::from(equity),
            unrealized_pnl: Decimal::ZERO,
        }
    }

    #[test]
    fn test_trade_statistics() {
        let trades = vec![trade(10, 0), trade(-5, 0), trade(-5, 0), trade(20, 0)];
        let curve = vec![point(0, 10010), point(1, 10005), point(2, 10000), point(3, 10020)];
        let metrics =
            BacktestMetrics::compute(Decimal::from(10_000), &trades, &curve, "1h");
        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 2);
        assert_eq!(metrics.win_rate, 0.5);
        assert_eq!(metrics.gross_profit, Decimal::from(30));
        assert_eq!(metrics.gross_loss, Decimal::from(10));
        assert_eq!(metrics.profit_factor, 3.0);
        assert_eq!(metrics.largest_win, Decimal::from(20));
        assert_eq!(metrics.largest_loss, Decimal::from(5));
        assert_eq!(metrics.max_consecutive_losses, 2);
        assert_eq!(metrics.expectancy, 5.0);
        assert_eq!(metrics.avg_hold_secs, 3600.0);
        assert_eq!(metrics.final_equity, Decimal::from(10_020));
        assert_eq!(
            metrics.total_return_percent,
            decimal::round_pct(Decimal::new(2, 1)),
        );
    }

    #[test]
    fn test_fees_flip_a_winner() {
        // price pnl +10 but fee 12: net loss
        let trades = vec![trade(10, 12)];
        let metrics = BacktestMetrics::compute(Decimal::from(10_000), &trades, &[], "1h");
        assert_eq!(metrics.winning_trades, 0);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.gross_loss, Decimal::from(2));
    }

    #[test]
    fn test_max_drawdown_from_curve() {
        let curve = vec![point(0, 11000), point(1, 9900), point(2, 10500)];
        let metrics = BacktestMetrics::compute(Decimal::from(10_000), &[], &curve, "1h");
        assert_eq!(metrics.max_drawdown, Decimal::from(1_100));
        assert_eq!(metrics.max_drawdown_percent, Decimal::new(100_000, 4));
    }

    #[test]
    fn test_empty_run() {
        let metrics = BacktestMetrics::compute(Decimal::from(10_000), &[], &[], "1h");
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.final_equity, Decimal::from(10_000));
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!(interval_minutes("5m"), 5.0);
        assert_eq!(interval_minutes("1h"), 60.0);
        assert_eq!(interval_minutes("4h"), 240.0);
        assert_eq!(interval_minutes("1d"), 1_440.0);
        assert_eq!(interval_minutes("bogus"), 60.0);
    }
}

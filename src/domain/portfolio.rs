//! Sequential portfolio simulation over a signal list.
//!
//! Each signal is one trade: a fixed fraction of the current capital goes in
//! at the signal close and comes out at the next session's close. Gains and
//! losses compound into the capital used for the next trade.

use crate::domain::signal::Signal;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    /// `None` for the starting point.
    pub date: Option<NaiveDate>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioTrade {
    pub symbol: String,
    pub date: NaiveDate,
    pub invested: f64,
    /// Fraction, `0.1` is +10%.
    pub trade_return: f64,
    pub profit: f64,
    pub capital_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub initial_capital: f64,
    pub position_size: f64,
    pub final_capital: f64,
    /// Fraction of initial capital.
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_return_per_trade: f64,
    /// Population std of per-trade returns.
    pub volatility: f64,
    /// Largest `(peak - trough) / peak` on the equity curve.
    pub max_drawdown: f64,
    /// Mean over std of per-trade returns, zero risk-free rate.
    pub sharpe_ratio: f64,
    pub trades: Vec<PortfolioTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl PortfolioReport {
    pub fn empty(initial_capital: f64, position_size: f64) -> Self {
        Self {
            initial_capital,
            position_size,
            final_capital: initial_capital,
            total_return: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            avg_return_per_trade: 0.0,
            volatility: 0.0,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            trades: Vec::new(),
            equity_curve: vec![EquityPoint {
                date: None,
                equity: initial_capital,
            }],
        }
    }
}

/// Runs the simulation. Signals without a next-session return are left out.
///
/// `position_size` is expected in `(0, 1]` and `initial_capital` above zero;
/// config validation enforces both.
pub fn simulate_portfolio(
    signals: &[Signal],
    initial_capital: f64,
    position_size: f64,
) -> PortfolioReport {
    let mut usable: Vec<&Signal> = signals
        .iter()
        .filter(|s| s.next_day_return.is_some_and(f64::is_finite))
        .collect();
    if usable.is_empty() {
        return PortfolioReport::empty(initial_capital, position_size);
    }
    usable.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));

    let mut capital = initial_capital;
    let mut trades = Vec::with_capacity(usable.len());
    let mut equity_curve = Vec::with_capacity(usable.len() + 1);
    equity_curve.push(EquityPoint {
        date: None,
        equity: capital,
    });

    for signal in usable {
        let trade_return = signal.next_day_return.unwrap_or(0.0) / 100.0;
        let invested = capital * position_size;
        let profit = invested * trade_return;
        capital += profit;

        trades.push(PortfolioTrade {
            symbol: signal.symbol.clone(),
            date: signal.date,
            invested,
            trade_return,
            profit,
            capital_after: capital,
        });
        equity_curve.push(EquityPoint {
            date: Some(signal.date),
            equity: capital,
        });
    }

    let returns: Vec<f64> = trades.iter().map(|t| t.trade_return).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let volatility = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let sharpe_ratio = if volatility > 0.0 { mean / volatility } else { 0.0 };

    let winning_trades = returns.iter().filter(|&&r| r > 0.0).count();
    let losing_trades = returns.iter().filter(|&&r| r < 0.0).count();

    PortfolioReport {
        initial_capital,
        position_size,
        final_capital: capital,
        total_return: (capital - initial_capital) / initial_capital,
        total_trades: trades.len(),
        winning_trades,
        losing_trades,
        win_rate: winning_trades as f64 / n,
        avg_return_per_trade: mean,
        volatility,
        max_drawdown: max_drawdown(&equity_curve),
        sharpe_ratio,
        trades,
        equity_curve,
    }
}

fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd
}

use serde::Serialize;

use crate::backtest::BacktestResult;
use crate::engine::EquityPoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub initial_cash: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
    /// Share of closed trades with a positive profit/loss; `None` without trades.
    pub win_rate: Option<f64>,
    pub total_commission: f64,
    pub open_positions: usize,
}

impl RunSummary {
    pub fn from_result(initial_cash: f64, result: &BacktestResult) -> Self {
        let final_equity = result.final_equity().unwrap_or(initial_cash);
        let total_return_pct = if initial_cash > 0.0 {
            (final_equity / initial_cash - 1.0) * 100.0
        } else {
            0.0
        };

        let trade_count = result.trades.len();
        let win_rate = if trade_count == 0 {
            None
        } else {
            let wins = result
                .trades
                .iter()
                .filter(|trade| trade.profit_loss > 0.0)
                .count();
            Some(wins as f64 / trade_count as f64)
        };

        Self {
            initial_cash,
            final_equity,
            total_return_pct,
            max_drawdown_pct: max_drawdown_pct(&result.equity),
            trade_count,
            win_rate,
            total_commission: result
                .trades
                .iter()
                .map(|trade| trade.trade_commission)
                .sum(),
            open_positions: result.open_positions.len(),
        }
    }
}

/// Largest peak-to-trough decline of the equity series, in percent of the peak.
pub fn max_drawdown_pct(equity: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for point in equity {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak * 100.0);
        }
    }

    worst
}

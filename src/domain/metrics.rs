//! Episode statistics derived from an [`EpisodeRun`].

use super::action::Side;
use super::episode::EpisodeRun;
use super::position::TradeRecord;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub steps: usize,
    pub initial_balance: f64,
    pub final_net_worth: f64,
    /// Percent, e.g. `5.0` for +5%.
    pub total_return_pct: f64,
    /// Peak-to-trough decline over the equity curve, percent, non-negative.
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration: usize,
    pub direction_changes: usize,
    pub total_reward: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub avg_bars_held: f64,
}

impl EpisodeReport {
    pub fn compute(run: &EpisodeRun, periods_per_year: f64) -> Self {
        let equity_curve = &run.equity_curve;
        let initial_balance = run.initial_balance;
        let final_net_worth = run.final_net_worth();

        let total_return_pct = if initial_balance > 0.0 {
            (final_net_worth - initial_balance) / initial_balance * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, periods_per_year);

        let tally = run
            .trades
            .iter()
            .fold(TradeTally::default(), TradeTally::add);
        let trades = run.trades.len();

        EpisodeReport {
            steps: run.steps(),
            initial_balance,
            final_net_worth,
            total_return_pct,
            max_drawdown_pct: max_drawdown * 100.0,
            max_drawdown_duration,
            direction_changes: direction_changes(&run.sides),
            total_reward: run.total_reward(),
            sharpe_ratio,
            sortino_ratio,
            trades,
            trades_won: tally.won,
            trades_lost: tally.lost,
            trades_breakeven: trades - tally.won - tally.lost,
            win_rate: ratio(tally.won as f64, trades),
            profit_factor: tally.profit_factor(),
            avg_win: ratio(tally.gross_wins, tally.won),
            avg_loss: ratio(tally.gross_losses, tally.lost),
            largest_win: tally.largest_win,
            largest_loss: tally.largest_loss,
            total_fees: tally.fees,
            avg_bars_held: ratio(tally.bars as f64, trades),
        }
    }
}

/// Running totals over closed trades. Losses are kept as positive amounts.
#[derive(Debug, Default)]
struct TradeTally {
    won: usize,
    lost: usize,
    gross_wins: f64,
    gross_losses: f64,
    largest_win: f64,
    largest_loss: f64,
    fees: f64,
    bars: usize,
}

impl TradeTally {
    fn add(mut self, record: &TradeRecord) -> Self {
        let pnl = record.trade.pnl;
        if pnl > 0.0 {
            self.won += 1;
            self.gross_wins += pnl;
            self.largest_win = self.largest_win.max(pnl);
        } else if pnl < 0.0 {
            self.lost += 1;
            self.gross_losses -= pnl;
            self.largest_loss = self.largest_loss.max(-pnl);
        }
        self.fees += record.trade.fees();
        self.bars += record.bars_held();
        self
    }

    /// Infinite with wins and no losses, zero with neither.
    fn profit_factor(&self) -> f64 {
        match (self.gross_wins > 0.0, self.gross_losses > 0.0) {
            (_, true) => self.gross_wins / self.gross_losses,
            (true, false) => f64::INFINITY,
            (false, false) => 0.0,
        }
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

/// Step-to-step transitions in held side, starting from FLAT. A flip
/// counts once.
pub fn direction_changes(sides: &[Side]) -> usize {
    let mut previous = Side::Flat;
    let mut changes = 0;
    for &side in sides {
        if side != previous {
            changes += 1;
            previous = side;
        }
    }
    changes
}

fn compute_drawdown(equity_curve: &[f64]) -> (f64, usize) {
    let Some(&first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for &equity in equity_curve {
        if equity >= peak {
            peak = equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[f64], periods_per_year: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let annualize = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        mean / stddev * annualize
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        mean / downside_stddev * annualize
    } else {
        0.0
    };

    (sharpe, sortino)
}

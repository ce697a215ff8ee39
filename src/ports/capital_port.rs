//! Capital ledger port trait for live deployment.

use crate::domain::error::GymError;
use chrono::NaiveDate;

/// Tracks free and committed capital across process restarts. Every
/// mutation is persisted before it returns.
pub trait CapitalLedger {
    fn available(&self) -> f64;

    fn in_use(&self) -> f64;

    /// Commits all free capital; returns 0 when it is below the minimum.
    fn reserve(&mut self) -> Result<f64, GymError>;

    /// Returns capital after a trade closes.
    fn release(&mut self, amount: f64) -> Result<f64, GymError>;

    fn sync_balance(&mut self, exchange_balance: f64, today: NaiveDate) -> Result<(), GymError>;

    /// Profit since the start of the day as `(currency, percent)`.
    fn daily_pnl(&self) -> (f64, f64);
}

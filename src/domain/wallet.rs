//! Capital tracking for live deployment: an all-in reserve/release cycle
//! with a daily PnL reference.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_RESERVE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Capital free to be reserved.
    pub balance: f64,
    /// Total capital at the start of `reference_date`.
    pub day_start_balance: f64,
    /// Capital currently committed to an open trade.
    pub in_use: f64,
    pub reference_date: NaiveDate,
}

impl Wallet {
    pub fn new(balance: f64, today: NaiveDate) -> Self {
        Wallet {
            balance,
            day_start_balance: balance,
            in_use: 0.0,
            reference_date: today,
        }
    }

    pub fn total(&self) -> f64 {
        self.balance + self.in_use
    }

    /// Moves the whole free balance into use. Returns 0 and changes nothing
    /// when the balance is below `min_reserve`.
    pub fn reserve(&mut self, min_reserve: f64) -> f64 {
        if self.balance < min_reserve {
            return 0.0;
        }
        let amount = self.balance;
        self.balance = 0.0;
        self.in_use = amount;
        amount
    }

    /// Returns capital after a trade. The returned amount becomes the free
    /// balance, whatever was reserved.
    pub fn release(&mut self, amount: f64) -> f64 {
        self.balance = amount;
        self.in_use = 0.0;
        amount
    }

    /// Reconciles with the balance reported by the exchange.
    ///
    /// A new day resets the day-start reference. The free balance is only
    /// overwritten while nothing is in use.
    pub fn sync(&mut self, exchange_balance: f64, today: NaiveDate) {
        if self.reference_date != today {
            self.day_start_balance = exchange_balance;
            self.reference_date = today;
        }
        if self.in_use == 0.0 {
            self.balance = exchange_balance;
        }
        if self.day_start_balance == 0.0 {
            self.day_start_balance = exchange_balance;
        }
    }

    /// Profit since the start of the day, in currency and percent.
    pub fn daily_pnl(&self) -> (f64, f64) {
        let pnl = self.total() - self.day_start_balance;
        let pct = if self.day_start_balance > 0.0 {
            pnl / self.day_start_balance * 100.0
        } else {
            0.0
        };
        (pnl, pct)
    }
}

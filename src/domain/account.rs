//! Account valuation and high-water mark tracking.

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub initial_balance: f64,
    pub cash_balance: f64,
    pub net_worth: f64,
    pub max_net_worth: f64,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        AccountState {
            initial_balance,
            cash_balance: initial_balance,
            net_worth: initial_balance,
            max_net_worth: initial_balance,
        }
    }

    /// Revalues the account. The high-water mark only ever rises.
    pub fn mark(&mut self, cash_balance: f64, unrealized_pnl: f64) {
        self.cash_balance = cash_balance;
        self.net_worth = cash_balance + unrealized_pnl;
        if self.net_worth > self.max_net_worth {
            self.max_net_worth = self.net_worth;
        }
    }

    /// Fractional decline from the high-water mark; zero or negative.
    pub fn drawdown(&self) -> f64 {
        if self.max_net_worth > 0.0 {
            (self.net_worth - self.max_net_worth) / self.max_net_worth
        } else {
            0.0
        }
    }

    pub fn is_bankrupt(&self, bankruptcy_fraction: f64) -> bool {
        self.net_worth <= self.initial_balance * bankruptcy_fraction
    }

    pub fn total_return(&self) -> f64 {
        (self.net_worth - self.initial_balance) / self.initial_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_account() {
        let account = AccountState::new(10_000.0);
        assert_relative_eq!(account.cash_balance, 10_000.0);
        assert_relative_eq!(account.net_worth, 10_000.0);
        assert_relative_eq!(account.max_net_worth, 10_000.0);
        assert_relative_eq!(account.drawdown(), 0.0);
    }

    #[test]
    fn mark_raises_high_water_mark() {
        let mut account = AccountState::new(10_000.0);
        account.mark(9_990.0, 510.0);
        assert_relative_eq!(account.net_worth, 10_500.0);
        assert_relative_eq!(account.max_net_worth, 10_500.0);
    }

    #[test]
    fn mark_never_lowers_high_water_mark() {
        let mut account = AccountState::new(10_000.0);
        account.mark(10_000.0, 1_000.0);
        account.mark(10_000.0, -2_000.0);
        assert_relative_eq!(account.max_net_worth, 11_000.0);
        assert_relative_eq!(account.drawdown(), (8_000.0 - 11_000.0) / 11_000.0);
    }

    #[test]
    fn bankruptcy_is_inclusive() {
        let mut account = AccountState::new(10_000.0);
        account.mark(5_000.0, 0.0);
        assert!(account.is_bankrupt(0.5));
        account.mark(5_000.01, 0.0);
        assert!(!account.is_bankrupt(0.5));
    }

    #[test]
    fn total_return_fraction() {
        let mut account = AccountState::new(10_000.0);
        account.mark(11_000.0, 0.0);
        assert_relative_eq!(account.total_return(), 0.1);
    }
}

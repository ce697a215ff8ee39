//! Proportional transaction cost model.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeModel {
    pub rate: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        FeeModel { rate: 0.0005 }
    }
}

impl FeeModel {
    pub fn new(rate: f64) -> Self {
        FeeModel { rate }
    }

    /// Fee for trading `notional` dollars.
    pub fn fee(&self, notional: f64) -> f64 {
        notional * self.rate
    }

    /// Largest notional whose margin (`notional / leverage`) plus entry fee
    /// fits inside `budget`.
    pub fn sized_notional(&self, budget: f64, leverage: f64) -> f64 {
        budget * leverage / (1.0 + leverage * self.rate)
    }
}

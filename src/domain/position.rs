//! Position bookkeeping: entry, mark-to-market and settlement.

use super::action::Side;
use super::fee::FeeModel;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionState {
    pub side: Side,
    pub entry_price: f64,
    /// Dollar size fixed at entry, never marked to market.
    pub notional: f64,
}

impl PositionState {
    pub fn flat() -> Self {
        PositionState::default()
    }

    pub fn is_flat(&self) -> bool {
        self.side.is_flat()
    }

    pub fn quantity(&self) -> f64 {
        if self.is_flat() {
            return 0.0;
        }
        self.notional / self.entry_price
    }

    /// Signed dollar PnL of holding this position from entry to `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.is_flat() {
            return 0.0;
        }
        assert!(self.entry_price > 0.0, "open position with entry price {}", self.entry_price);
        self.side.sign() * (price - self.entry_price) / self.entry_price * self.notional
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub notional: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    /// Price component only.
    pub gross_pnl: f64,
    /// Net of entry and exit fee.
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn fees(&self) -> f64 {
        self.entry_fee + self.exit_fee
    }

    pub fn return_pct(&self) -> f64 {
        self.pnl / self.notional * 100.0
    }
}

/// A closed trade with the environment steps it spanned.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_step: usize,
    pub exit_step: usize,
    pub trade: ClosedTrade,
}

impl TradeRecord {
    pub fn bars_held(&self) -> usize {
        self.exit_step - self.entry_step
    }
}

/// Cash plus at most one open position. Pure bookkeeping: prices come in
/// from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionLedger {
    position: PositionState,
    cash: f64,
    entry_fee: f64,
    fees: FeeModel,
}

impl PositionLedger {
    pub fn new(cash: f64, fees: FeeModel) -> Self {
        PositionLedger {
            position: PositionState::flat(),
            cash,
            entry_fee: 0.0,
            fees,
        }
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn side(&self) -> Side {
        self.position.side
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn fee_model(&self) -> &FeeModel {
        &self.fees
    }

    /// Opens a position and charges the entry fee against cash.
    ///
    /// Panics if a position is already open or the inputs are degenerate.
    pub fn open(&mut self, side: Side, price: f64, notional: f64) -> f64 {
        assert!(self.position.is_flat(), "open() while {} is held", self.position.side);
        assert!(!side.is_flat(), "cannot open a FLAT position");
        assert!(price > 0.0, "entry price must be positive, got {price}");
        assert!(notional > 0.0, "notional must be positive, got {notional}");

        let fee = self.fees.fee(notional);
        self.cash -= fee;
        self.entry_fee = fee;
        self.position = PositionState {
            side,
            entry_price: price,
            notional,
        };
        fee
    }

    /// Settles the open position at `price`.
    ///
    /// Cash is credited with the price PnL less an exit fee on the exit
    /// value (`quantity * price`). Returns `None` when flat.
    pub fn close(&mut self, price: f64) -> Option<ClosedTrade> {
        if self.position.is_flat() {
            return None;
        }

        let position = self.position;
        let gross_pnl = position.unrealized_pnl(price);
        let exit_fee = self.fees.fee(position.quantity() * price);
        self.cash += gross_pnl - exit_fee;

        let trade = ClosedTrade {
            side: position.side,
            entry_price: position.entry_price,
            exit_price: price,
            notional: position.notional,
            entry_fee: self.entry_fee,
            exit_fee,
            gross_pnl,
            pnl: gross_pnl - self.entry_fee - exit_fee,
        };

        self.position = PositionState::flat();
        self.entry_fee = 0.0;
        Some(trade)
    }

    pub fn unrealized(&self, price: f64) -> f64 {
        self.position.unrealized_pnl(price)
    }

    pub fn net_worth(&self, price: f64) -> f64 {
        self.cash + self.unrealized(price)
    }
}

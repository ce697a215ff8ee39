//! The trading environment: a reset/step state machine over [`MarketData`].
//!
//! Step contract:
//! 1. advance one row; at the last row the episode ends with reward 0,
//! 2. resolve the action against the open position at the row's price
//!    (an opposite-direction action flips, paying exit and entry fees),
//! 3. mark the account to market and raise the high-water mark,
//! 4. score the step with the configured [`RewardPolicy`],
//! 5. end the episode with the bankruptcy penalty if net worth fell to
//!    `initial_balance * bankruptcy_fraction` or below.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::account::AccountState;
use super::action::{Action, ActionSet, Side};
use super::error::GymError;
use super::fee::FeeModel;
use super::frame::{MarketData, Observation, ObservationLayout, ObservationShape};
use super::position::{ClosedTrade, PositionLedger, PositionState, TradeRecord};
use super::reward::{RewardConfig, RewardInputs, RewardPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub lookback_window: usize,
    pub initial_balance: f64,
    pub fee_rate: f64,
    pub bankruptcy_fraction: f64,
    /// Share of cash committed when opening a position.
    pub position_fraction: f64,
    pub leverage: f64,
    pub action_set: ActionSet,
    pub observation: ObservationLayout,
    pub reward: RewardConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            lookback_window: 30,
            initial_balance: 10_000.0,
            fee_rate: 0.0005,
            bankruptcy_fraction: 0.5,
            position_fraction: 1.0,
            leverage: 1.0,
            action_set: ActionSet::FourWay,
            observation: ObservationLayout::Window,
            reward: RewardConfig::default(),
        }
    }
}

impl EnvConfig {
    /// Context window, at least one tradable row, and the terminal row.
    pub fn min_rows(&self) -> usize {
        self.lookback_window + 3
    }

    pub fn validate(&self) -> Result<(), GymError> {
        if self.lookback_window == 0 {
            return Err(GymError::invalid("environment", "lookback_window", "must be at least 1"));
        }
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(GymError::invalid("environment", "initial_balance", "must be positive"));
        }
        if !(self.fee_rate >= 0.0 && self.fee_rate < 1.0) {
            return Err(GymError::invalid("environment", "fee_rate", "must be in [0, 1)"));
        }
        if !(self.bankruptcy_fraction > 0.0 && self.bankruptcy_fraction < 1.0) {
            return Err(GymError::invalid(
                "environment",
                "bankruptcy_fraction",
                "must be in (0, 1)",
            ));
        }
        if !(self.position_fraction > 0.0 && self.position_fraction <= 1.0) {
            return Err(GymError::invalid(
                "environment",
                "position_fraction",
                "must be in (0, 1]",
            ));
        }
        if !(self.leverage.is_finite() && self.leverage > 0.0) {
            return Err(GymError::invalid("environment", "leverage", "must be positive"));
        }
        self.reward.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Bankrupt,
    EndOfData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EpisodeStatus {
    Active,
    Terminated(Termination),
}

/// Side-channel data returned with every step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub step: usize,
    pub price: f64,
    /// The action after mapping onto the action set.
    pub action: Action,
    pub side: Side,
    pub cash_balance: f64,
    pub net_worth: f64,
    pub max_net_worth: f64,
    pub unrealized_pnl: f64,
    pub drawdown: f64,
    pub closed_trade: Option<TradeRecord>,
    pub termination: Option<Termination>,
}

impl StepInfo {
    /// Numeric fields keyed by name, for consumers expecting a loose info map.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("step", self.step as f64),
            ("price", self.price),
            ("position", self.side.sign()),
            ("cash_balance", self.cash_balance),
            ("net_worth", self.net_worth),
            ("max_net_worth", self.max_net_worth),
            ("unrealized_pnl", self.unrealized_pnl),
            ("drawdown", self.drawdown),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub info: StepInfo,
}

/// Single-agent environment interface.
pub trait Environment {
    fn reset(&mut self) -> Observation;

    fn step(&mut self, action: Action) -> StepResult;

    fn observation_shape(&self) -> ObservationShape;

    fn action_set(&self) -> ActionSet;

    /// Current account value; equals the starting balance right after reset.
    fn net_worth(&self) -> f64;
}

#[derive(Debug)]
pub struct TradingEnvironment {
    data: Arc<MarketData>,
    config: EnvConfig,
    reward_policy: Box<dyn RewardPolicy>,
    ledger: PositionLedger,
    account: AccountState,
    current_step: usize,
    entry_step: usize,
    status: EpisodeStatus,
    trades: Vec<TradeRecord>,
}

impl TradingEnvironment {
    /// Builds an environment over shared market data. The returned
    /// environment is already reset.
    pub fn new(data: Arc<MarketData>, config: EnvConfig) -> Result<Self, GymError> {
        config.validate()?;
        if data.len() < config.min_rows() {
            return Err(GymError::InsufficientData {
                rows: data.len(),
                minimum: config.min_rows(),
            });
        }

        let reward_policy = config.reward.build();
        let mut env = TradingEnvironment {
            ledger: PositionLedger::new(config.initial_balance, FeeModel::new(config.fee_rate)),
            account: AccountState::new(config.initial_balance),
            current_step: config.lookback_window,
            entry_step: 0,
            status: EpisodeStatus::Active,
            trades: Vec::new(),
            data,
            config,
            reward_policy,
        };
        env.reset();
        Ok(env)
    }

    /// Swaps the reward formula, e.g. for an experimental policy not covered
    /// by [`RewardConfig`].
    pub fn with_reward_policy(mut self, policy: Box<dyn RewardPolicy>) -> Self {
        self.reward_policy = policy;
        self
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn data(&self) -> &Arc<MarketData> {
        &self.data
    }

    pub fn reward_policy(&self) -> &dyn RewardPolicy {
        self.reward_policy.as_ref()
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn position(&self) -> &PositionState {
        self.ledger.position()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.status, EpisodeStatus::Terminated(_))
    }

    pub fn termination(&self) -> Option<Termination> {
        match self.status {
            EpisodeStatus::Active => None,
            EpisodeStatus::Terminated(t) => Some(t),
        }
    }

    /// Trades closed since the last reset.
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Number of steps a full episode can trade before end of data.
    pub fn tradable_steps(&self) -> usize {
        self.data.len() - 2 - self.config.lookback_window
    }

    /// Steps with a raw policy output; values outside the action set are HOLD.
    pub fn step_raw(&mut self, raw: i64) -> StepResult {
        let action = self.config.action_set.decode(raw);
        self.step(action)
    }

    fn observation(&self) -> Observation {
        Observation::from_window(
            self.data.frame(),
            self.current_step,
            self.config.lookback_window,
            self.config.observation,
        )
    }

    fn info(&self, action: Action, closed_trade: Option<TradeRecord>) -> StepInfo {
        let price = self.data.prices().get(self.current_step);
        StepInfo {
            step: self.current_step,
            price,
            action,
            side: self.ledger.side(),
            cash_balance: self.account.cash_balance,
            net_worth: self.account.net_worth,
            max_net_worth: self.account.max_net_worth,
            unrealized_pnl: self.ledger.unrealized(price),
            drawdown: self.account.drawdown(),
            closed_trade,
            termination: self.termination(),
        }
    }

    fn terminal_result(&self, action: Action) -> StepResult {
        StepResult {
            observation: self.observation(),
            reward: 0.0,
            terminated: true,
            info: self.info(action, None),
        }
    }

    fn open(&mut self, side: Side, price: f64) {
        let budget = self.ledger.cash() * self.config.position_fraction;
        if budget <= 0.0 {
            debug!(step = self.current_step, cash = self.ledger.cash(), "no cash to open {}", side);
            return;
        }
        let notional = self
            .ledger
            .fee_model()
            .sized_notional(budget, self.config.leverage);
        let fee = self.ledger.open(side, price, notional);
        self.entry_step = self.current_step;
        debug!(
            step = self.current_step,
            %side,
            price,
            notional,
            fee,
            "opened position"
        );
    }

    fn close(&mut self, price: f64) -> Option<TradeRecord> {
        let trade: ClosedTrade = self.ledger.close(price)?;
        let record = TradeRecord {
            entry_step: self.entry_step,
            exit_step: self.current_step,
            trade,
        };
        debug!(
            step = self.current_step,
            side = %record.trade.side,
            entry_price = record.trade.entry_price,
            exit_price = price,
            pnl = record.trade.pnl,
            "closed position"
        );
        self.trades.push(record.clone());
        Some(record)
    }

    fn resolve(&mut self, action: Action, price: f64) -> Option<TradeRecord> {
        let side = self.ledger.side();
        match (action, side) {
            (Action::Buy, Side::Flat) => {
                self.open(Side::Long, price);
                None
            }
            (Action::Sell, Side::Flat) => {
                self.open(Side::Short, price);
                None
            }
            (Action::Buy, Side::Short) | (Action::Sell, Side::Long) => {
                let closed = self.close(price);
                self.open(side.opposite(), price);
                closed
            }
            (Action::Close, Side::Long | Side::Short) => self.close(price),
            _ => None,
        }
    }
}

impl Environment for TradingEnvironment {
    fn reset(&mut self) -> Observation {
        self.ledger = PositionLedger::new(
            self.config.initial_balance,
            FeeModel::new(self.config.fee_rate),
        );
        self.account = AccountState::new(self.config.initial_balance);
        self.current_step = self.config.lookback_window;
        self.entry_step = 0;
        self.status = EpisodeStatus::Active;
        self.trades.clear();
        self.observation()
    }

    fn step(&mut self, action: Action) -> StepResult {
        let action = self.config.action_set.normalize(action);
        if self.is_terminated() {
            return self.terminal_result(action);
        }

        self.current_step += 1;
        let last = self.data.len() - 1;
        if self.current_step >= last {
            self.current_step = last;
            self.status = EpisodeStatus::Terminated(Termination::EndOfData);
            debug!(step = self.current_step, net_worth = self.account.net_worth, "end of data");
            return self.terminal_result(action);
        }

        let prices = self.data.prices();
        let price_now = prices.get(self.current_step);
        let prev_price = prices.get(self.current_step - 1);
        let held_side = self.ledger.side();

        let closed = self.resolve(action, price_now);

        let unrealized = self.ledger.unrealized(price_now);
        self.account.mark(self.ledger.cash(), unrealized);

        let closed_trades: &[ClosedTrade] = match &closed {
            Some(record) => std::slice::from_ref(&record.trade),
            None => &[],
        };
        let mut reward = self.reward_policy.reward(&RewardInputs {
            initial_balance: self.config.initial_balance,
            held_side,
            prev_price,
            price_now,
            closed: closed_trades,
            account: &self.account,
        });

        let mut terminated = false;
        if self.account.is_bankrupt(self.config.bankruptcy_fraction) {
            terminated = true;
            reward = self.reward_policy.bankruptcy_penalty();
            self.status = EpisodeStatus::Terminated(Termination::Bankrupt);
            warn!(
                step = self.current_step,
                net_worth = self.account.net_worth,
                threshold = self.config.initial_balance * self.config.bankruptcy_fraction,
                "bankrupt, ending episode"
            );
        }

        StepResult {
            observation: self.observation(),
            reward,
            terminated,
            info: self.info(action, closed),
        }
    }

    fn observation_shape(&self) -> ObservationShape {
        ObservationShape::new(
            self.config.observation,
            self.config.lookback_window,
            self.data.frame().width(),
        )
    }

    fn action_set(&self) -> ActionSet {
        self.config.action_set
    }

    fn net_worth(&self) -> f64 {
        self.account.net_worth
    }
}

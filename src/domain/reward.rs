//! Reward policies: map a step's financial outcome to a scalar learning signal.
//!
//! Policies are versioned so an experiment can name the exact formula it
//! trained against. `realized_v1` is the default. Every policy is a pure
//! function of its inputs, so replaying the same actions over the same data
//! reproduces the same rewards.

use std::fmt;
use std::str::FromStr;

use super::account::AccountState;
use super::action::Side;
use super::error::GymError;
use super::position::ClosedTrade;

/// Everything a policy may look at for one step.
#[derive(Debug, Clone, Copy)]
pub struct RewardInputs<'a> {
    pub initial_balance: f64,
    /// Side held over the interval `prev_price -> price_now`, i.e. before
    /// this step's action was applied.
    pub held_side: Side,
    pub prev_price: f64,
    pub price_now: f64,
    /// Trades settled on this step (a flip settles one).
    pub closed: &'a [ClosedTrade],
    pub account: &'a AccountState,
}

pub trait RewardPolicy: fmt::Debug + Send + Sync {
    fn version(&self) -> &'static str;

    fn reward(&self, inputs: &RewardInputs<'_>) -> f64;

    /// Replaces the step reward when the account goes bankrupt.
    fn bankruptcy_penalty(&self) -> f64;
}

/// Shaping terms layered on top of a base formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaping {
    /// Subtracted once per closed trade.
    pub close_penalty: f64,
    /// Multiplier applied to the realized component of losing trades.
    pub loss_aversion: f64,
    /// Drawdown (as a positive fraction) beyond which `drawdown_penalty` applies.
    pub drawdown_threshold: f64,
    pub drawdown_penalty: f64,
    pub bankruptcy_penalty: f64,
}

impl Default for Shaping {
    fn default() -> Self {
        Shaping {
            close_penalty: 0.0,
            loss_aversion: 1.5,
            drawdown_threshold: 0.10,
            drawdown_penalty: 0.0,
            bankruptcy_penalty: -100.0,
        }
    }
}

impl Shaping {
    fn realized(&self, inputs: &RewardInputs<'_>, scale: f64) -> f64 {
        inputs
            .closed
            .iter()
            .map(|trade| {
                let r = trade.pnl / inputs.initial_balance * scale;
                if r < 0.0 { r * self.loss_aversion } else { r }
            })
            .sum()
    }

    fn penalties(&self, inputs: &RewardInputs<'_>) -> f64 {
        let mut penalty = self.close_penalty * inputs.closed.len() as f64;
        if self.drawdown_penalty > 0.0 && inputs.account.drawdown() < -self.drawdown_threshold {
            penalty += self.drawdown_penalty;
        }
        penalty
    }
}

/// Zero on every step except one that closes a trade, where the reward is
/// the trade's net PnL over the initial balance, times `scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedPnlReward {
    pub scale: f64,
    pub shaping: Shaping,
}

impl RewardPolicy for RealizedPnlReward {
    fn version(&self) -> &'static str {
        RewardPolicyKind::RealizedV1.as_str()
    }

    fn reward(&self, inputs: &RewardInputs<'_>) -> f64 {
        self.shaping.realized(inputs, self.scale) - self.shaping.penalties(inputs)
    }

    fn bankruptcy_penalty(&self) -> f64 {
        self.shaping.bankruptcy_penalty
    }
}

/// Realized component plus, every step a position was held, the
/// directional percentage price move times `step_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkToMarketReward {
    pub scale: f64,
    pub step_scale: f64,
    pub shaping: Shaping,
}

impl RewardPolicy for MarkToMarketReward {
    fn version(&self) -> &'static str {
        RewardPolicyKind::MarkToMarketV1.as_str()
    }

    fn reward(&self, inputs: &RewardInputs<'_>) -> f64 {
        let mut reward = self.shaping.realized(inputs, self.scale);
        if !inputs.held_side.is_flat() {
            assert!(inputs.prev_price > 0.0, "previous price is {}", inputs.prev_price);
            let pct_change = (inputs.price_now - inputs.prev_price) / inputs.prev_price;
            reward += inputs.held_side.sign() * pct_change * self.step_scale;
        }
        reward - self.shaping.penalties(inputs)
    }

    fn bankruptcy_penalty(&self) -> f64 {
        self.shaping.bankruptcy_penalty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewardPolicyKind {
    #[default]
    RealizedV1,
    MarkToMarketV1,
}

impl RewardPolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RewardPolicyKind::RealizedV1 => "realized_v1",
            RewardPolicyKind::MarkToMarketV1 => "mark_to_market_v1",
        }
    }
}

impl FromStr for RewardPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realized_v1" | "realized" => Ok(RewardPolicyKind::RealizedV1),
            "mark_to_market_v1" | "mark_to_market" => Ok(RewardPolicyKind::MarkToMarketV1),
            other => Err(format!("unknown reward policy '{other}'")),
        }
    }
}

impl fmt::Display for RewardPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative reward configuration, turned into a policy object by [`build`](Self::build).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardConfig {
    pub kind: RewardPolicyKind,
    pub scale: f64,
    pub mark_to_market_scale: f64,
    pub shaping: Shaping,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            kind: RewardPolicyKind::RealizedV1,
            scale: 100.0,
            mark_to_market_scale: 10.0,
            shaping: Shaping::default(),
        }
    }
}

impl RewardConfig {
    /// Rejects scales and shaping terms that would make every reward
    /// meaningless. Every value must be finite.
    pub fn validate(&self) -> Result<(), GymError> {
        let s = &self.shaping;
        for (key, value) in [
            ("scale", self.scale),
            ("mark_to_market_scale", self.mark_to_market_scale),
            ("close_penalty", s.close_penalty),
            ("loss_aversion", s.loss_aversion),
            ("drawdown_threshold", s.drawdown_threshold),
            ("drawdown_penalty", s.drawdown_penalty),
            ("bankruptcy_penalty", s.bankruptcy_penalty),
        ] {
            if !value.is_finite() {
                return Err(GymError::invalid("reward", key, format!("{key} must be finite")));
            }
        }
        if self.scale <= 0.0 {
            return Err(GymError::invalid("reward", "scale", "scale must be positive"));
        }
        for (key, value) in [
            ("mark_to_market_scale", self.mark_to_market_scale),
            ("close_penalty", s.close_penalty),
            ("loss_aversion", s.loss_aversion),
            ("drawdown_penalty", s.drawdown_penalty),
        ] {
            if value < 0.0 {
                return Err(GymError::invalid(
                    "reward",
                    key,
                    format!("{key} must be non-negative"),
                ));
            }
        }
        if s.drawdown_threshold <= 0.0 || s.drawdown_threshold >= 1.0 {
            return Err(GymError::invalid(
                "reward",
                "drawdown_threshold",
                "drawdown_threshold must be between 0 and 1",
            ));
        }
        if s.bankruptcy_penalty > 0.0 {
            return Err(GymError::invalid(
                "reward",
                "bankruptcy_penalty",
                "bankruptcy_penalty must not be positive",
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> Box<dyn RewardPolicy> {
        match self.kind {
            RewardPolicyKind::RealizedV1 => Box::new(RealizedPnlReward {
                scale: self.scale,
                shaping: self.shaping,
            }),
            RewardPolicyKind::MarkToMarketV1 => Box::new(MarkToMarketReward {
                scale: self.scale,
                step_scale: self.mark_to_market_scale,
                shaping: self.shaping,
            }),
        }
    }
}

//! Episode runner and the decision functions it drives.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::action::{Action, ActionSet, Side};
use super::environment::{Environment, Termination};
use super::error::GymError;
use super::frame::{Observation, ObservationShape};
use super::position::TradeRecord;

/// Maps an observation to an action. Implemented by trained policies,
/// fixed rules and random baselines.
pub trait DecisionFn {
    fn decide(&mut self, observation: &Observation) -> Action;

    /// Observation shape the decision function was built for, if fixed.
    fn expected_shape(&self) -> Option<ObservationShape> {
        None
    }
}

impl<F> DecisionFn for F
where
    F: FnMut(&Observation) -> Action,
{
    fn decide(&mut self, observation: &Observation) -> Action {
        self(observation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HoldPolicy;

impl DecisionFn for HoldPolicy {
    fn decide(&mut self, _observation: &Observation) -> Action {
        Action::Hold
    }
}

/// Uniformly random actions from a seeded generator, for smoke-testing an
/// environment.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
    action_set: ActionSet,
}

impl RandomPolicy {
    pub fn new(seed: u64, action_set: ActionSet) -> Self {
        RandomPolicy {
            rng: StdRng::seed_from_u64(seed),
            action_set,
        }
    }
}

impl DecisionFn for RandomPolicy {
    fn decide(&mut self, _observation: &Observation) -> Action {
        let actions = self.action_set.actions();
        actions[self.rng.gen_range(0..actions.len())]
    }
}

/// Plays a fixed list of actions, then holds.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPolicy {
    actions: Vec<Action>,
    cursor: usize,
}

impl ScriptedPolicy {
    pub fn new(actions: Vec<Action>) -> Self {
        ScriptedPolicy { actions, cursor: 0 }
    }
}

impl DecisionFn for ScriptedPolicy {
    fn decide(&mut self, _observation: &Observation) -> Action {
        let action = self.actions.get(self.cursor).copied().unwrap_or(Action::Hold);
        self.cursor += 1;
        action
    }
}

/// Trades the sign of one feature column in the most recent observation row.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub column: usize,
    pub threshold: f32,
    pub action_set: ActionSet,
}

impl DecisionFn for ThresholdRule {
    fn decide(&mut self, observation: &Observation) -> Action {
        let value = observation.latest()[self.column];
        if value > self.threshold {
            Action::Buy
        } else if value < -self.threshold {
            Action::Sell
        } else if self.action_set.has_close() {
            Action::Close
        } else {
            Action::Hold
        }
    }
}

/// Everything recorded while driving one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRun {
    pub initial_balance: f64,
    /// Net worth after reset, then after every step.
    pub equity_curve: Vec<f64>,
    /// Side held after every step.
    pub sides: Vec<Side>,
    pub rewards: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    pub termination: Termination,
}

impl EpisodeRun {
    pub fn steps(&self) -> usize {
        self.rewards.len()
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    pub fn final_net_worth(&self) -> f64 {
        self.equity_curve
            .last()
            .copied()
            .unwrap_or(self.initial_balance)
    }
}

/// Resets `env` and steps it with `decision` until the episode terminates.
pub fn run_episode<E, D>(env: &mut E, decision: &mut D) -> Result<EpisodeRun, GymError>
where
    E: Environment + ?Sized,
    D: DecisionFn + ?Sized,
{
    let actual = env.observation_shape();
    if let Some(expected) = decision.expected_shape()
        && expected != actual
    {
        return Err(GymError::ShapeMismatch { expected, actual });
    }

    let mut observation = env.reset();
    let initial_balance = env.net_worth();
    let mut run = EpisodeRun {
        initial_balance,
        equity_curve: vec![initial_balance],
        sides: Vec::new(),
        rewards: Vec::new(),
        trades: Vec::new(),
        termination: Termination::EndOfData,
    };

    info!(shape = %actual, initial_balance, "starting episode");
    loop {
        let action = decision.decide(&observation);
        let result = env.step(action);

        run.equity_curve.push(result.info.net_worth);
        run.sides.push(result.info.side);
        run.rewards.push(result.reward);
        if let Some(trade) = result.info.closed_trade {
            run.trades.push(trade);
        }

        if result.terminated {
            if let Some(termination) = result.info.termination {
                run.termination = termination;
            }
            break;
        }
        observation = result.observation;
    }

    info!(
        steps = run.steps(),
        final_net_worth = run.final_net_worth(),
        trades = run.trades.len(),
        termination = ?run.termination,
        "episode finished"
    );
    Ok(run)
}

//! Configuration validation.
//!
//! Checks every configured value before an environment is built, so a bad
//! file fails fast instead of partway through an episode.

use crate::domain::action::ActionSet;
use crate::domain::error::GymError;
use crate::domain::frame::ObservationLayout;
use crate::domain::reward::{RewardConfig, RewardPolicyKind, Shaping};
use crate::ports::config_port::ConfigPort;

pub fn validate_environment_config(config: &dyn ConfigPort) -> Result<(), GymError> {
    validate_lookback(config)?;
    let initial = number(config, "environment", "initial_balance", 10_000.0)?;
    if initial <= 0.0 {
        return Err(GymError::invalid(
            "environment",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    let fee = number(config, "environment", "fee_rate", 0.0005)?;
    if !(0.0..1.0).contains(&fee) {
        return Err(GymError::invalid(
            "environment",
            "fee_rate",
            "fee_rate must be in [0, 1)",
        ));
    }
    let fraction = number(config, "environment", "bankruptcy_fraction", 0.5)?;
    if fraction <= 0.0 || fraction >= 1.0 {
        return Err(GymError::invalid(
            "environment",
            "bankruptcy_fraction",
            "bankruptcy_fraction must be between 0 and 1",
        ));
    }
    let position_fraction = number(config, "environment", "position_fraction", 1.0)?;
    if position_fraction <= 0.0 || position_fraction > 1.0 {
        return Err(GymError::invalid(
            "environment",
            "position_fraction",
            "position_fraction must be in (0, 1]",
        ));
    }
    let leverage = number(config, "environment", "leverage", 1.0)?;
    if leverage <= 0.0 {
        return Err(GymError::invalid(
            "environment",
            "leverage",
            "leverage must be positive",
        ));
    }
    validate_action_set(config)?;
    validate_observation(config)?;
    Ok(())
}

pub fn validate_reward_config(config: &dyn ConfigPort) -> Result<(), GymError> {
    let defaults = RewardConfig::default();
    let kind = match config.get_string("reward", "policy") {
        Some(policy) => policy
            .parse::<RewardPolicyKind>()
            .map_err(|reason| GymError::invalid("reward", "policy", reason))?,
        None => defaults.kind,
    };
    let d = defaults.shaping;
    let reward = RewardConfig {
        kind,
        scale: number(config, "reward", "scale", defaults.scale)?,
        mark_to_market_scale: number(
            config,
            "reward",
            "mark_to_market_scale",
            defaults.mark_to_market_scale,
        )?,
        shaping: Shaping {
            close_penalty: number(config, "reward", "close_penalty", d.close_penalty)?,
            loss_aversion: number(config, "reward", "loss_aversion", d.loss_aversion)?,
            drawdown_threshold: number(config, "reward", "drawdown_threshold", d.drawdown_threshold)?,
            drawdown_penalty: number(config, "reward", "drawdown_penalty", d.drawdown_penalty)?,
            bankruptcy_penalty: number(config, "reward", "bankruptcy_penalty", d.bankruptcy_penalty)?,
        },
    };
    reward.validate()
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), GymError> {
    if let Some(column) = config.get_string("data", "price_column")
        && column.trim().is_empty()
    {
        return Err(GymError::invalid("data", "price_column", "price_column is empty"));
    }
    if number(config, "data", "clip", 5.0)? <= 0.0 {
        return Err(GymError::invalid("data", "clip", "clip must be positive"));
    }
    if number(config, "report", "periods_per_year", 252.0)? <= 0.0 {
        return Err(GymError::invalid(
            "report",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    Ok(())
}

pub fn validate_wallet_config(config: &dyn ConfigPort) -> Result<(), GymError> {
    match config.get_string("wallet", "path") {
        Some(p) if !p.trim().is_empty() => {}
        _ => {
            return Err(GymError::ConfigMissing {
                section: "wallet".to_string(),
                key: "path".to_string(),
            });
        }
    }
    if number(config, "wallet", "min_reserve", 5.0)? < 0.0 {
        return Err(GymError::invalid(
            "wallet",
            "min_reserve",
            "min_reserve must be non-negative",
        ));
    }
    Ok(())
}

/// Reads a numeric key, rejecting values that are present but unparsable
/// or non-finite.
fn number(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, GymError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(GymError::invalid(
                section,
                key,
                format!("'{raw}' is not a number"),
            )),
        },
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), GymError> {
    let Some(raw) = config.get_string("environment", "lookback_window") else {
        return Ok(());
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v >= 1 => Ok(()),
        _ => Err(GymError::invalid(
            "environment",
            "lookback_window",
            "lookback_window must be a positive integer",
        )),
    }
}

fn validate_action_set(config: &dyn ConfigPort) -> Result<(), GymError> {
    let Some(raw) = config.get_string("environment", "action_set") else {
        return Ok(());
    };
    let count = raw.trim().parse::<i64>().map_err(|_| {
        GymError::invalid("environment", "action_set", "action_set must be 3 or 4")
    })?;
    ActionSet::try_from(count)
        .map(|_| ())
        .map_err(|reason| GymError::invalid("environment", "action_set", reason))
}

fn validate_observation(config: &dyn ConfigPort) -> Result<(), GymError> {
    match config.get_string("environment", "observation") {
        None => Ok(()),
        Some(raw) => raw
            .parse::<ObservationLayout>()
            .map(|_| ())
            .map_err(|reason| GymError::invalid("environment", "observation", reason)),
    }
}

//! Discrete actions and position sides.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Hold,
    Buy,
    Sell,
    Close,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Hold, Action::Buy, Action::Sell, Action::Close];

    pub fn index(self) -> usize {
        match self {
            Action::Hold => 0,
            Action::Buy => 1,
            Action::Sell => 2,
            Action::Close => 3,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Hold => "HOLD",
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Close => "CLOSE",
        };
        f.write_str(name)
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hold" | "h" | "0" => Ok(Action::Hold),
            "buy" | "b" | "1" => Ok(Action::Buy),
            "sell" | "s" | "2" => Ok(Action::Sell),
            "close" | "c" | "3" => Ok(Action::Close),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// The action space exposed to a policy.
///
/// With [`ActionSet::ThreeWay`] there is no CLOSE; an opposite-direction
/// action flips the position instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionSet {
    ThreeWay,
    #[default]
    FourWay,
}

impl ActionSet {
    pub fn len(self) -> usize {
        match self {
            ActionSet::ThreeWay => 3,
            ActionSet::FourWay => 4,
        }
    }

    pub fn has_close(self) -> bool {
        matches!(self, ActionSet::FourWay)
    }

    pub fn actions(self) -> &'static [Action] {
        &Action::ALL[..self.len()]
    }

    /// Decodes a raw policy output. Anything outside the set is HOLD.
    pub fn decode(self, raw: i64) -> Action {
        match raw {
            1 => Action::Buy,
            2 => Action::Sell,
            3 if self.has_close() => Action::Close,
            _ => Action::Hold,
        }
    }

    /// Maps an action onto this set; CLOSE degrades to HOLD without it.
    pub fn normalize(self, action: Action) -> Action {
        if action == Action::Close && !self.has_close() {
            Action::Hold
        } else {
            action
        }
    }
}

impl TryFrom<i64> for ActionSet {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(ActionSet::ThreeWay),
            4 => Ok(ActionSet::FourWay),
            other => Err(format!("action set must have 3 or 4 actions, got {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Flat,
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short, 0 when flat.
    pub fn sign(self) -> f64 {
        match self {
            Side::Flat => 0.0,
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Side::Flat
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Flat => "FLAT",
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Flat => Side::Flat,
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

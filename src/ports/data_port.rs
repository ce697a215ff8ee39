//! Dataset access port trait.

use crate::domain::error::GymError;
use crate::domain::frame::MarketData;

pub trait DataPort {
    /// Loads features and the aligned reference price series.
    fn load_market_data(&self) -> Result<MarketData, GymError>;

    /// Human-readable origin of the data, for logs.
    fn describe(&self) -> String;
}

//! Port traits the domain is driven through.

pub mod capital_port;
pub mod config_port;
pub mod data_port;

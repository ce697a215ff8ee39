//! Core domain types and logic.

pub mod account;
pub mod action;
pub mod config_validation;
pub mod environment;
pub mod episode;
pub mod error;
pub mod fee;
pub mod frame;
pub mod metrics;
pub mod normalize;
pub mod position;
pub mod reward;
pub mod wallet;

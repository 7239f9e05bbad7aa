//! Core domain types and logic.

pub mod asset;
pub mod frame;
pub mod rsi;
pub mod regime;
pub mod optimizer;
pub mod allocation;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;

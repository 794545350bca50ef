//! Forex Range Strategies
//!
//! Decision core for range-bound forex trading: range tracking with ATR
//! buffers, a Bollinger range-bound filter, layered risk gates, hedged
//! decimal-exact position sizing, bracket order orchestration, and a
//! portfolio-level drawdown overlay, plus an in-process replay harness to
//! run it all over historical bars.

pub mod config;
pub mod data;
pub mod indicators;
pub mod orders;
pub mod range;
pub mod replay;
pub mod risk;
pub mod sizing;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use types::*;

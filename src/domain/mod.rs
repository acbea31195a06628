//! Core domain types and logic.

pub mod ohlcv;
pub mod interval;
pub mod norm;
pub mod strategy;
pub mod agent;
pub mod evolution;
pub mod system;
pub mod config_validation;
pub mod error;

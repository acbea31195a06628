//! Concrete adapter implementations for ports.

pub mod csv_exchange;
pub mod file_config_adapter;

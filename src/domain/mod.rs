//! Core domain types and logic.

pub mod error;
pub mod price;
pub mod financials;
pub mod signal;
pub mod analyst;
pub mod agent;
pub mod buffett;
pub mod sentiment;
pub mod order;
pub mod portfolio;
pub mod risk;
pub mod decision;
pub mod metrics;
pub mod workflow;
pub mod backtest;
pub mod execution;
pub mod ticker;
pub mod records;
pub mod config_validation;
pub mod settings;

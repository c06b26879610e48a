//! Port traits: every outside system the domain talks to.

pub mod config_port;
pub mod price_port;
pub mod fundamentals_port;
pub mod llm_port;
pub mod broker_port;
pub mod record_store_port;
pub mod ticker_directory_port;
pub mod notifier_port;
pub mod report_port;

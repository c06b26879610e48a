//! Concrete adapter implementations for ports.

pub mod alpaca_adapter;
pub mod alpha_vantage_adapter;
pub mod chart_svg;
pub mod console;
pub mod credentials;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod html_report_adapter;
pub mod http;
pub mod market_cache;
pub mod openai_adapter;
pub mod sec_ticker_adapter;
pub mod slack_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod supabase_adapter;

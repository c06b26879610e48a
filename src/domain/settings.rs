//! Typed view of the configuration file, with defaults for every key.

use super::backtest::BacktestConfig;
use super::config_validation::validate_config;
use super::decision::DecisionSettings;
use super::error::HedgeError;
use super::execution::SizingMode;
use super::risk::RiskSettings;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    None,
    Sqlite,
    Supabase,
}

impl StoreBackend {
    pub fn parse(name: &str) -> Result<Self, HedgeError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(StoreBackend::None),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "supabase" => Ok(StoreBackend::Supabase),
            other => Err(HedgeError::ConfigInvalid {
                section: "store".into(),
                key: "backend".into(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingSettings {
    pub initial_cash: f64,
    pub trade_amount: f64,
    pub leverage: f64,
    pub sizing: String,
    pub cash_buffer_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub risk_free_rate: f64,
    pub lookback_days: i64,
    pub prefetch_years: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub alpha_vantage_url: String,
    pub openai_url: String,
    pub openai_model: String,
    pub openai_max_retries: u32,
    pub alpaca_trading_url: String,
    pub alpaca_data_url: String,
    pub sec_tickers_url: String,
    pub sec_fallback_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_path: Option<String>,
    pub pool_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub max_tickers: usize,
    pub hot_limit: usize,
    pub trade_amount: f64,
    pub leverage: f64,
    pub delay_ms: u64,
    pub error_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentionSettings {
    pub window_days: i64,
    pub recent_days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub trading: TradingSettings,
    pub risk: RiskSettings,
    pub decision: DecisionSettings,
    pub backtest: BacktestSettings,
    pub endpoints: Endpoints,
    pub store: StoreSettings,
    pub scan: ScanSettings,
    pub mentions: MentionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            trading: TradingSettings {
                initial_cash: 100_000.0,
                trade_amount: 100_000.0,
                leverage: 5.0,
                sizing: "decision".into(),
                cash_buffer_pct: 0.10,
            },
            risk: RiskSettings::default(),
            decision: DecisionSettings::default(),
            backtest: BacktestSettings {
                risk_free_rate: 0.0434,
                lookback_days: 30,
                prefetch_years: 1,
            },
            endpoints: Endpoints {
                alpha_vantage_url: "https://www.alphavantage.co".into(),
                openai_url: "https://api.openai.com".into(),
                openai_model: "gpt-4o".into(),
                openai_max_retries: 3,
                alpaca_trading_url: "https://paper-api.alpaca.markets".into(),
                alpaca_data_url: "https://data.alpaca.markets".into(),
                sec_tickers_url: "https://www.sec.gov/files/company_tickers.json".into(),
                sec_fallback_path: "data/sec.json".into(),
            },
            store: StoreSettings {
                backend: StoreBackend::None,
                sqlite_path: None,
                pool_size: 4,
            },
            scan: ScanSettings {
                max_tickers: 100,
                hot_limit: 60,
                trade_amount: 2_000.0,
                leverage: 1.0,
                delay_ms: 1_000,
                error_delay_ms: 5_000,
            },
            mentions: MentionSettings {
                window_days: 7,
                recent_days: 30,
            },
        }
    }
}

impl Settings {
    /// Validates `config` and overlays its values on the defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, HedgeError> {
        validate_config(config)?;
        let d = Settings::default();
        let string = |section: &str, key: &str, default: &str| {
            config
                .get_string(section, key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Settings {
            trading: TradingSettings {
                initial_cash: config.get_double("trading", "initial_cash", d.trading.initial_cash),
                trade_amount: config.get_double("trading", "trade_amount", d.trading.trade_amount),
                leverage: config.get_double("trading", "leverage", d.trading.leverage),
                sizing: string("trading", "sizing", &d.trading.sizing).to_ascii_lowercase(),
                cash_buffer_pct: config.get_double("risk", "cash_buffer_pct", d.trading.cash_buffer_pct),
            },
            risk: RiskSettings {
                max_position_pct: config.get_double("risk", "max_position_pct", d.risk.max_position_pct),
                buying_power_pct: config.get_double("risk", "buying_power_pct", d.risk.buying_power_pct),
            },
            decision: DecisionSettings {
                buy_confidence: config.get_double(
                    "portfolio_manager",
                    "buy_confidence",
                    d.decision.buy_confidence,
                ),
                sell_confidence: config.get_double(
                    "portfolio_manager",
                    "sell_confidence",
                    d.decision.sell_confidence,
                ),
                short_confidence: config.get_double(
                    "portfolio_manager",
                    "short_confidence",
                    d.decision.short_confidence,
                ),
                force_exit_confidence: config.get_double(
                    "portfolio_manager",
                    "force_exit_confidence",
                    d.decision.force_exit_confidence,
                ),
                market_order_confidence: config.get_double(
                    "portfolio_manager",
                    "market_order_confidence",
                    d.decision.market_order_confidence,
                ),
                limit_offset_pct: config.get_double(
                    "portfolio_manager",
                    "limit_offset_pct",
                    d.decision.limit_offset_pct,
                ),
            },
            backtest: BacktestSettings {
                risk_free_rate: config.get_double("backtest", "risk_free_rate", d.backtest.risk_free_rate),
                lookback_days: config.get_int("backtest", "lookback_days", d.backtest.lookback_days),
                prefetch_years: config
                    .get_int("backtest", "prefetch_years", i64::from(d.backtest.prefetch_years))
                    .clamp(0, i64::from(u32::MAX)) as u32,
            },
            endpoints: Endpoints {
                alpha_vantage_url: string("alpha_vantage", "base_url", &d.endpoints.alpha_vantage_url),
                openai_url: string("openai", "base_url", &d.endpoints.openai_url),
                openai_model: string("openai", "model", &d.endpoints.openai_model),
                openai_max_retries: config
                    .get_int("openai", "max_retries", i64::from(d.endpoints.openai_max_retries))
                    .clamp(1, 100) as u32,
                alpaca_trading_url: string("alpaca", "trading_url", &d.endpoints.alpaca_trading_url),
                alpaca_data_url: string("alpaca", "data_url", &d.endpoints.alpaca_data_url),
                sec_tickers_url: string("sec", "tickers_url", &d.endpoints.sec_tickers_url),
                sec_fallback_path: string("sec", "fallback_path", &d.endpoints.sec_fallback_path),
            },
            store: StoreSettings {
                backend: StoreBackend::parse(&string("store", "backend", "none"))?,
                sqlite_path: config
                    .get_string("sqlite", "path")
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty()),
                pool_size: config
                    .get_int("sqlite", "pool_size", i64::from(d.store.pool_size))
                    .clamp(1, 64) as u32,
            },
            scan: ScanSettings {
                max_tickers: config
                    .get_int("scan", "max_tickers", d.scan.max_tickers as i64)
                    .max(1) as usize,
                hot_limit: config
                    .get_int("scan", "hot_limit", d.scan.hot_limit as i64)
                    .max(1) as usize,
                trade_amount: config.get_double("scan", "trade_amount", d.scan.trade_amount),
                leverage: config.get_double("scan", "leverage", d.scan.leverage),
                delay_ms: config.get_int("scan", "delay_ms", d.scan.delay_ms as i64).max(0) as u64,
                error_delay_ms: config
                    .get_int("scan", "error_delay_ms", d.scan.error_delay_ms as i64)
                    .max(0) as u64,
            },
            mentions: MentionSettings {
                window_days: config.get_int("mentions", "window_days", d.mentions.window_days),
                recent_days: config.get_int("mentions", "recent_days", d.mentions.recent_days),
            },
        })
    }

    pub fn sizing_mode(&self) -> Result<SizingMode, HedgeError> {
        SizingMode::parse(
            &self.trading.sizing,
            self.trading.trade_amount,
            self.trading.leverage,
            self.risk.max_position_pct,
            self.trading.cash_buffer_pct,
        )
    }

    /// Backtest parameters for a run, with capital from `[trading] initial_cash` unless overridden.
    pub fn backtest_config(
        &self,
        tickers: Vec<String>,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.trading.initial_cash,
            lookback_days: self.backtest.lookback_days,
            prefetch_years: self.backtest.prefetch_years,
            risk_free_rate: self.backtest.risk_free_rate,
            ..BacktestConfig::new(tickers, start, end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use approx::assert_relative_eq;

    #[test]
    fn empty_config_yields_defaults() {
        let s = Settings::from_config(&FileConfigAdapter::empty()).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.sizing_mode().unwrap(), SizingMode::Decision);
    }

    #[test]
    fn values_override_defaults() {
        let config = FileConfigAdapter::from_string(
            "[trading]\ninitial_cash = 25000\nsizing = fixed\ntrade_amount = 2000\nleverage = 2\n\
             [risk]\nmax_position_pct = 0.1\n\
             [openai]\nmodel = gpt-4o-mini\n\
             [store]\nbackend = sqlite\n[sqlite]\npath = /tmp/h.db\n\
             [scan]\ndelay_ms = 0\n",
        )
        .unwrap();
        let s = Settings::from_config(&config).unwrap();
        assert_relative_eq!(s.trading.initial_cash, 25_000.0);
        assert_relative_eq!(s.risk.max_position_pct, 0.1);
        assert_eq!(s.endpoints.openai_model, "gpt-4o-mini");
        assert_eq!(s.store.backend, StoreBackend::Sqlite);
        assert_eq!(s.store.sqlite_path.as_deref(), Some("/tmp/h.db"));
        assert_eq!(s.scan.delay_ms, 0);
        assert_eq!(
            s.sizing_mode().unwrap(),
            SizingMode::FixedAmount { amount: 2_000.0, leverage: 2.0 }
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        let config = FileConfigAdapter::from_string("[risk]\nmax_position_pct = 3\n").unwrap();
        assert!(matches!(
            Settings::from_config(&config),
            Err(HedgeError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn backtest_config_uses_settings() {
        let s = Settings::default();
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let c = s.backtest_config(vec!["AAPL".into()], start, end);
        assert_relative_eq!(c.initial_capital, 100_000.0);
        assert_eq!(c.lookback_days, 30);
        assert_relative_eq!(c.risk_free_rate, 0.0434);
    }
}

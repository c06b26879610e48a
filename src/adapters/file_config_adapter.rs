//! INI file configuration adapter.

use crate::domain::error::HedgeError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    /// No file: every lookup falls back to its default.
    pub fn empty() -> Self {
        Self { config: Ini::new() }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HedgeError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| HedgeError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    /// Loads `path` when given, otherwise the empty configuration.
    pub fn load_optional<P: AsRef<Path>>(path: Option<P>) -> Result<Self, HedgeError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::empty()),
        }
    }

    pub fn from_string(content: &str) -> Result<Self, HedgeError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| HedgeError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[openai]
model = gpt-4o-mini

[trading]
initial_cash = 50000.0
leverage = 2

[store]
backend = sqlite
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("openai", "model"), Some("gpt-4o-mini".to_string()));
        assert_eq!(adapter.get_double("trading", "initial_cash", 0.0), 50000.0);
        assert_eq!(adapter.get_int("trading", "leverage", 1), 2);
        assert_eq!(adapter.get_string("store", "backend"), Some("sqlite".to_string()));
    }

    #[test]
    fn missing_keys_fall_back() {
        let adapter = FileConfigAdapter::from_string("[scan]\nmax_tickers = 10\n").unwrap();
        assert_eq!(adapter.get_string("scan", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("scan", "hot_limit", 60), 60);
        assert_eq!(adapter.get_double("scan", "trade_amount", 2000.0), 2000.0);
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let adapter =
            FileConfigAdapter::from_string("[scan]\nmax_tickers = many\ntrade_amount = x\n").unwrap();
        assert_eq!(adapter.get_int("scan", "max_tickers", 100), 100);
        assert_eq!(adapter.get_double("scan", "trade_amount", 2000.0), 2000.0);
    }

    #[test]
    fn empty_adapter_has_no_values() {
        let adapter = FileConfigAdapter::empty();
        assert_eq!(adapter.get_string("trading", "initial_cash"), None);
        assert_eq!(adapter.get_double("trading", "initial_cash", 7.0), 7.0);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = /var/lib/hedgebot.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/hedgebot.db".to_string())
        );
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/hedgebot.ini");
        assert!(matches!(result, Err(HedgeError::ConfigParse { .. })));
    }

    #[test]
    fn load_optional_without_path_is_empty() {
        let adapter = FileConfigAdapter::load_optional(None::<&str>).unwrap();
        assert_eq!(adapter.get_string("openai", "model"), None);
    }
}

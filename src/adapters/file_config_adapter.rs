//! INI file configuration adapter.

use crate::domain::error::EvotraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvotraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| EvotraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .filter(|v| !v.trim().is_empty())
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
    fn from_string_parses_config() {
        let content = r#"
[simulation]
data_path = data/btc_hourly.csv
start = 2020-01-01 00:00:00

[agent]
initial_capital = 100
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("simulation", "data_path"),
            Some("data/btc_hourly.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("simulation", "start"),
            Some("2020-01-01 00:00:00".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[agent]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("agent", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_string_treats_blank_as_missing() {
        let adapter = FileConfigAdapter::from_string("[simulation]\ndata_path =\n").unwrap();
        assert_eq!(adapter.get_string("simulation", "data_path"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[simulation]\npopulation = 12\n").unwrap();
        assert_eq!(adapter.get_int("simulation", "population", 0), 12);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[simulation]\n").unwrap();
        assert_eq!(adapter.get_int("simulation", "population", 20), 20);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[simulation]\nseed = abc\n").unwrap();
        assert_eq!(adapter.get_int("simulation", "seed", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[agent]\ntransaction_fee = 0.0001\n").unwrap();
        assert_eq!(adapter.get_double("agent", "transaction_fee", 0.0), 0.0001);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[agent]\ninitial_capital = lots\n").unwrap();
        assert_eq!(adapter.get_double("agent", "initial_capital", 99.9), 99.9);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[evolution]\nselection = truncation\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("evolution", "selection"),
            Some("truncation".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(EvotraderError::ConfigParse { .. })));
    }
}

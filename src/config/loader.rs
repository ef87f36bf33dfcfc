//! Configuration Loader
//!
//! Loads and validates configuration from TOML files. Every section has
//! defaults, so an empty file (or none at all) yields a working setup apart
//! from the API key, which only ever comes from the environment or the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::adapters::alpha_vantage::{AlphaVantageConfig, DEFAULT_BASE_URL};
use crate::domain::{Position, PositionBook, PositionError};

/// Environment variable holding the provider credential
pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Watchlist used to seed the initial batch
    #[serde(default)]
    pub positions: Vec<PositionEntry>,
}

/// Quote provider section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Query endpoint
    pub base_url: String,
    /// Optional credential; the environment variable wins when both are set
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Minimum seconds between the start of consecutive provider calls
    pub min_call_interval_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
            min_call_interval_secs: 15,
        }
    }
}

/// Refresh scheduling section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Quiet period after a cycle during which timer ticks are ignored
    pub cooldown_secs: u64,
    /// Period of the refresh timer; shorter than the cooldown so the cooldown
    /// sets the refresh cadence
    pub tick_interval_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            tick_interval_secs: 60,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One seeded position
#[derive(Debug, Clone, Deserialize)]
pub struct PositionEntry {
    pub ticker: String,
    pub shares: f64,
    pub purchase_price: f64,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid seed position: {0}")]
    InvalidPosition(#[from] PositionError),
    #[error("Missing API key: set {API_KEY_ENV} in the environment or .env file")]
    MissingApiKey,
    #[error("Cannot expand config path: {0}")]
    PathExpansion(String),
}

/// Expand `~` and `$VAR`/`${VAR}` references in a user-supplied path
pub fn expand_path<P: AsRef<Path>>(path: P) -> Result<PathBuf, ConfigError> {
    let raw = path.as_ref().to_string_lossy();
    let expanded = shellexpand::full(&raw).map_err(|e| ConfigError::PathExpansion(e.to_string()))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(expand_path(path)?)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the given file, or the default file if present, or built-in defaults.
///
/// Only an explicitly named file is required to exist.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        None => {
            tracing::debug!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.base_url cannot be empty".to_string(),
            ));
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.provider.min_call_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.min_call_interval_secs must be > 0".to_string(),
            ));
        }

        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.tick_interval_secs must be > 0".to_string(),
            ));
        }

        // cooldown starts when a cycle ends, so a tick no shorter than it always lands inside
        if self.scheduler.cooldown_secs > 0
            && self.scheduler.tick_interval_secs >= self.scheduler.cooldown_secs
        {
            return Err(ConfigError::ValidationError(format!(
                "scheduler.tick_interval_secs ({}) must be < cooldown_secs ({})",
                self.scheduler.tick_interval_secs, self.scheduler.cooldown_secs
            )));
        }

        self.seed_positions()?;
        Ok(())
    }

    /// Seed positions as domain records, rejecting duplicates
    pub fn seed_positions(&self) -> Result<Vec<Position>, ConfigError> {
        let positions = self
            .positions
            .iter()
            .map(|p| Position::from_parts(&p.ticker, p.shares, p.purchase_price))
            .collect::<Result<Vec<_>, _>>()?;

        let book = PositionBook::from_positions(positions)?;
        Ok(book.positions().to_vec())
    }

    /// API key from the process environment, falling back to the file
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key_from(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_from(&self, env_value: Option<String>) -> Result<String, ConfigError> {
        env_value
            .into_iter()
            .chain(self.provider.api_key.clone())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Client settings; fails fast when no credential is configured
    pub fn alpha_vantage(&self) -> Result<AlphaVantageConfig, ConfigError> {
        Ok(AlphaVantageConfig {
            base_url: self.provider.base_url.clone(),
            api_key: self.api_key()?,
            timeout: Duration::from_secs(self.provider.timeout_secs),
        })
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_secs(self.provider.min_call_interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.scheduler.cooldown_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[provider]
base_url = "https://www.alphavantage.co/query"
timeout_secs = 10
min_call_interval_secs = 15

[scheduler]
cooldown_secs = 300
tick_interval_secs = 60

[logging]
level = "debug"

[[positions]]
ticker = "aapl"
shares = 10.0
purchase_price = 150.0

[[positions]]
ticker = "MSFT"
shares = 2.5
purchase_price = 400.0
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&create_valid_config());

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.min_call_interval(), Duration::from_secs(15));
        assert_eq!(config.cooldown(), Duration::from_secs(300));
        assert_eq!(config.logging.level, "debug");

        let seeds = config.seed_positions().unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].ticker.as_str(), "AAPL");
        assert_eq!(seeds[1].shares, 2.5);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.provider.min_call_interval_secs, 15);
        assert_eq!(config.scheduler.cooldown_secs, 300);
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.positions.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = load_config_or_default(Some(Path::new("/nonexistent/path/config.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let file = write_config("[provider\nbase_url = ");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = write_config("[provider]\nmin_call_interval_secs = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_tick_not_shorter_than_cooldown_rejected() {
        let file = write_config("[scheduler]\ncooldown_secs = 300\ntick_interval_secs = 300\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));

        let file = write_config("[scheduler]\ncooldown_secs = 0\ntick_interval_secs = 300\n");
        assert!(load_config(file.path()).is_ok());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let file = write_config("[provider]\nbase_url = \"  \"\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_invalid_seed_position_rejected() {
        let file = write_config(
            r#"
[[positions]]
ticker = "AAPL"
shares = -1.0
purchase_price = 150.0
"#,
        );
        let result = load_config(file.path());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidPosition(PositionError::InvalidShares(_))
        ));
    }

    #[test]
    fn test_duplicate_seed_position_rejected() {
        let file = write_config(
            r#"
[[positions]]
ticker = "AAPL"
shares = 1.0
purchase_price = 150.0

[[positions]]
ticker = "aapl"
shares = 2.0
purchase_price = 140.0
"#,
        );
        let result = load_config(file.path());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidPosition(PositionError::DuplicateTicker(_))
        ));
    }

    #[test]
    fn test_api_key_env_wins() {
        let mut config = Config::default();
        config.provider.api_key = Some("from-file".to_string());

        assert_eq!(config.api_key_from(Some("from-env".to_string())).unwrap(), "from-env");
        assert_eq!(config.api_key_from(Some("   ".to_string())).unwrap(), "from-file");
        assert_eq!(config.api_key_from(None).unwrap(), "from-file");
    }

    #[test]
    fn test_missing_api_key() {
        let config = Config::default();
        assert!(matches!(config.api_key_from(None), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            config.api_key_from(Some(String::new())),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(
            expand_path("config/default.toml").unwrap(),
            PathBuf::from("config/default.toml")
        );
    }

    #[test]
    fn test_expand_path_env_vars() {
        let home = std::env::var("HOME").unwrap_or_default();
        if !home.is_empty() {
            assert_eq!(
                expand_path("$HOME/quote.toml").unwrap(),
                PathBuf::from(format!("{}/quote.toml", home))
            );
        }

        let result = expand_path("${QUOTE_REFRESH_UNSET_DIR_7F3A}/quote.toml");
        assert!(matches!(result, Err(ConfigError::PathExpansion(_))));
    }
}

//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    expand_path, load_config, load_config_or_default, Config, ConfigError, PositionEntry,
    API_KEY_ENV, DEFAULT_CONFIG_PATH,
};

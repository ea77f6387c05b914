//! Tool configuration module.
//!
//! Handles loading, validating, and merging `exact-image.toml`. Stock
//! defaults are the base layer; a user file only needs the keys it wants
//! to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [encode]
//! quality = 75              # JPEG quality (0-100)
//! compression = ""          # Codec compression option, "" = codec default
//!
//! [colors]
//! background = "#ffffff"    # Fill for rotations and blank images
//!
//! [processing]
//! max_processes = 4         # Max parallel decoders (omit for auto = CPU cores)
//!
//! [logging]
//! level = "info"            # error | warn | info | debug | trace
//! format = "pretty"         # pretty | json
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Color, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "exact-image.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `exact-image.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Defaults for encoding output files.
    pub encode: EncodeConfig,
    /// Colours used when pixels have to be invented.
    pub colors: ColorsConfig,
    /// Parallel decoding settings.
    pub processing: ProcessingConfig,
    /// Log verbosity and format.
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encode.quality > 100 {
            return Err(ConfigError::Validation(
                "encode.quality must be 0-100".into(),
            ));
        }
        self.background()?;
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.encode.quality)
    }

    /// The configured background colour, parsed.
    pub fn background(&self) -> Result<Color, ConfigError> {
        self.colors.background.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "colors.background '{}' is not a #rgb, #rrggbb or #rrggbbaa colour",
                self.colors.background
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeConfig {
    pub quality: u32,
    pub compression: String,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default().value() as u32,
            compression: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorsConfig {
    pub background: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel decoders.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`, the base
/// layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file
/// is missing.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `exact-image.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# exact-image Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encode]
# JPEG quality (0 = worst, 100 = best). Other codecs ignore it.
quality = 75

# Compression option passed to the encoder; empty means codec default.
#   png:  default | fast | best
#   tiff: lzw | none | deflate | packbits
compression = ""

# ---------------------------------------------------------------------------
# Colors
# ---------------------------------------------------------------------------
[colors]
# Fill for arbitrary rotations, out-of-image crops and blank images.
background = "#ffffff"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel decoders for multi-file commands.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# error | warn | info | debug | trace  (RUST_LOG overrides)
level = "info"

# pretty | json
format = "pretty"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.encode.quality, 75);
        assert_eq!(config.encode.compression, "");
        assert_eq!(config.colors.background, "#ffffff");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.processing.max_processes.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("missing.toml")).unwrap();
        assert_eq!(config.encode.quality, 75);
    }

    #[test]
    fn load_config_overrides_only_given_keys() {
        let (_tmp, path) = write_config(
            r#"
[encode]
quality = 80

[logging]
format = "json"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.encode.quality, 80);
        assert_eq!(config.encode.compression, "");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.quality(), Quality::new(80));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let (_tmp, path) = write_config("this is not toml [[[");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let (_tmp, path) = write_config("[encode]\nqualty = 80\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let (_tmp, path) = write_config("[decode]\nquality = 80\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn validate_quality_boundary() {
        let mut config = Config::default();
        config.encode.quality = 100;
        assert!(config.validate().is_ok());
        config.encode.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_bad_background() {
        let mut config = Config::default();
        config.colors.background = "white".into();
        assert!(config.validate().is_err());
        config.colors.background = "#000".into();
        assert_eq!(config.background().unwrap(), Color::BLACK);
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
        config.logging.level = "DEBUG".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_processes_rejected() {
        let (_tmp, path) = write_config("[processing]\nmax_processes = 0\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 64),
        };
        assert_eq!(effective_threads(&config), cores);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        let one = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&one), 1);
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\nz = 4\n").unwrap();
        let merged = merge_toml(base, overlay);
        let a = merged.get("a").unwrap();
        assert_eq!(a.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(a.get("y").unwrap().as_integer(), Some(3));
        assert_eq!(a.get("z").unwrap().as_integer(), Some(4));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let merged = merge_toml(toml::Value::Integer(1), toml::Value::Integer(2));
        assert_eq!(merged.as_integer(), Some(2));
    }

    #[test]
    fn stock_config_roundtrips_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value().unwrap(), Some(value)).unwrap();
        let defaults = Config::default();
        assert_eq!(config.encode.quality, defaults.encode.quality);
        assert_eq!(config.encode.compression, defaults.encode.compression);
        assert_eq!(config.colors.background, defaults.colors.background);
        assert_eq!(config.logging.level, defaults.logging.level);
        assert_eq!(config.logging.format, defaults.logging.format);
        assert_eq!(config.processing.max_processes, None);
    }
}

use crate::error::{Error, Kind};
use eyre::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Placeholder shipped in config.example.toml
const PLACEHOLDER_WORKSPACE_ID: &str = "your-log-analytics-workspace-id";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Prefix for environment overrides, e.g. AZSQLDIAG_AZURE_WORKSPACE_ID
const ENV_PREFIX: &str = "AZSQLDIAG";

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AzureSection {
    workspace_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DefaultsSection {
    time_range_minutes: Option<i64>,
    slow_query_threshold_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingSection {
    level: Option<LogLevel>,
    verbose: Option<bool>,
}

/// Raw deserialized shape of config.toml, before defaults and validation
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    azure: Option<AzureSection>,
    defaults: Option<DefaultsSection>,
    logging: Option<LoggingSection>,
}

/// Immutable configuration snapshot
///
/// Loaded once at process start and passed by reference; nothing mutates it
/// afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_id: String,
    pub time_range_minutes: u32,
    pub slow_query_threshold_ms: u64,
    pub log_level: LogLevel,
    pub verbose: bool,
}

impl Config {
    /// Load config.toml from the working directory or any of its parents
    pub fn load() -> eyre::Result<Self> {
        let path = Self::find_config_file().ok_or_else(|| {
            eyre::Report::from(Error::new(
                Kind::ConfigNotFound,
                "Could not find config.toml",
                Some("Create one from config.example.toml in the project directory."),
            ))
        })?;

        Self::from_path(&path)
    }

    /// Load and validate a specific config file
    pub fn from_path(path: &Path) -> eyre::Result<Self> {
        log::info!("Loading configuration from {}", path.display());

        let toml_string = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Failed to read {}: {e:?}", path.display());
            Error::new(
                Kind::ConfigNotFound,
                "Could not read config.toml",
                Some("Check that the file exists and is readable."),
            )
        })?;

        let raw: RawConfig = toml::from_str(&toml_string).map_err(|e| {
            log::error!("Failed to parse {}: {e:?}", path.display());
            Error::new(
                Kind::ConfigInvalid,
                "Could not parse config.toml",
                Some("Check the file against config.example.toml."),
            )
        })?;

        Self::from_raw(raw)
    }

    /// Walk from the working directory up to the filesystem root
    fn find_config_file() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;

        current_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.exists())
    }

    /// Environment override for a single key, AZSQLDIAG_<SECTION>_<KEY>
    fn env_override(section: &str, key: &str) -> Option<String> {
        std::env::var(format!(
            "{ENV_PREFIX}_{}_{}",
            section.to_uppercase(),
            key.to_uppercase()
        ))
        .ok()
        .filter(|value| !value.is_empty())
    }

    /// Apply env overrides and defaults, then validate
    fn from_raw(raw: RawConfig) -> eyre::Result<Self> {
        let workspace_id = Self::env_override("azure", "workspace_id")
            .or(raw.azure.and_then(|section| section.workspace_id))
            .unwrap_or_default();

        if workspace_id.is_empty() || workspace_id == PLACEHOLDER_WORKSPACE_ID {
            return Err(Error::new(
                Kind::ConfigInvalid,
                "No workspace_id set in the [azure] section of config.toml",
                Some("Add the ID of your Log Analytics workspace."),
            )
            .into());
        }

        let defaults = raw.defaults.unwrap_or(DefaultsSection {
            time_range_minutes: None,
            slow_query_threshold_ms: None,
        });

        let time_range_minutes = Self::positive_value(
            "defaults",
            "time_range_minutes",
            defaults.time_range_minutes,
            10,
        )?;

        let slow_query_threshold_ms = Self::positive_value(
            "defaults",
            "slow_query_threshold_ms",
            defaults.slow_query_threshold_ms,
            5000,
        )?;

        let logging = raw.logging.unwrap_or(LoggingSection {
            level: None,
            verbose: None,
        });

        let verbose = Self::env_override("logging", "verbose")
            .map(|value| value == "true" || value == "1")
            .or(logging.verbose)
            .unwrap_or(false);

        let log_level = match Self::env_override("logging", "level") {
            Some(raw) => Self::parse_log_level(&raw)?,
            None => logging.level.unwrap_or_default(),
        };

        Ok(Config {
            workspace_id,
            time_range_minutes: u32::try_from(time_range_minutes)
                .wrap_err("time_range_minutes out of range")?,
            slow_query_threshold_ms: u64::try_from(slow_query_threshold_ms)
                .wrap_err("slow_query_threshold_ms out of range")?,
            log_level,
            verbose,
        })
    }

    fn parse_log_level(raw: &str) -> eyre::Result<LogLevel> {
        match raw.to_lowercase().as_str() {
            "off" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::new(
                Kind::ConfigInvalid,
                &format!("Invalid value for logging.level: {other}"),
                Some("Use off, error, warn, info, debug or trace."),
            )
            .into()),
        }
    }

    /// Resolve a numeric key with env override and default, rejecting <= 0
    fn positive_value(
        section: &str,
        key: &str,
        from_file: Option<i64>,
        default: i64,
    ) -> eyre::Result<i64> {
        let value = match Self::env_override(section, key) {
            Some(raw) => raw.parse::<i64>().map_err(|e| {
                log::error!("Invalid {section}.{key} override: {e:?}");
                Error::new(
                    Kind::ConfigInvalid,
                    &format!("Invalid value for {section}.{key}"),
                    Some("The override must be a positive integer."),
                )
            })?,
            None => from_file.unwrap_or(default),
        };

        if value <= 0 {
            return Err(Error::new(
                Kind::ConfigInvalid,
                &format!("{section}.{key} must be a positive integer"),
                None,
            )
            .into());
        }

        Ok(value)
    }
}

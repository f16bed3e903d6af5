//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//! 1. built-in defaults
//! 2. an optional TOML file (`/etc/coldtrace/config.toml` on Linux)
//! 3. environment variables prefixed `COLDTRACE__`, with `__` between
//!    section and key (e.g. `COLDTRACE__TELEGRAM__BOT_TOKEN`)
//!
//! Set `COLDTRACE_CONFIG` to point at a different file; in that case the
//! file must exist.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "COLDTRACE_CONFIG";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "COLDTRACE";

/// Upper bound for the debounce window (one day).
pub const MAX_DEBOUNCE_SECS: u64 = 86_400;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The layered sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// A single field holds an invalid value.
    #[error("invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Temperature alarm thresholds.
    pub alerts: AlertsConfig,
    /// Reading persistence.
    pub storage: StorageConfig,
    /// Live subscriber delivery.
    pub hub: HubConfig,
    /// Telegram alert delivery.
    pub telegram: TelegramConfig,
    /// System-wide settings.
    pub system: SystemConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            cors_origins: vec!["http://localhost:8080".to_string()],
        }
    }
}

/// Temperature alarm thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Lowest acceptable temperature in °C (inclusive).
    pub min_celsius: f64,
    /// Highest acceptable temperature in °C (inclusive).
    pub max_celsius: f64,
    /// Seconds a sensor must stay out of range before alerting.
    pub debounce_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            min_celsius: 25.0,
            max_celsius: 35.0,
            debounce_secs: 60,
        }
    }
}

/// Which store backs reading persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Append-only JSON lines file in the data directory.
    #[default]
    JsonLines,
    /// Process memory only.
    Memory,
}

/// Reading persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store implementation.
    pub backend: StorageBackend,
    /// Directory holding data files.
    pub data_dir: PathBuf,
    /// Upper bound for a single write, in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            write_timeout_ms: 2_000,
        }
    }
}

/// Live subscriber delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Readings queued per subscriber before it is evicted.
    pub subscriber_buffer: usize,
    /// Upper bound for one socket write, in milliseconds.
    pub send_timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
            send_timeout_ms: 5_000,
        }
    }
}

/// Telegram alert delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; never written back out.
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    /// Chat receiving alerts.
    pub chat_id: Option<i64>,
    /// Bot API base URL.
    pub api_base: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
        }
    }
}

impl TelegramConfig {
    /// Whether both token and chat are set.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

/// System-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// IANA timezone used when rendering alert messages.
    pub timezone: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// JSON file logs plus compact stdout instead of pretty stdout.
    pub production: bool,
    /// Directory for rolling log files.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            production: false,
            directory: None,
        }
    }
}

impl Config {
    /// Load configuration from `COLDTRACE_CONFIG` or the default location,
    /// with environment overrides, and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, a source cannot be
    /// parsed, or the result fails validation.
    pub fn load() -> ConfigResult<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load_from(Path::new(&path), true, ENV_PREFIX),
            None => Self::load_from(&default_config_path(), false, ENV_PREFIX),
        }
    }

    /// Load from `path` layered under environment variables with `env_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when `required` and the file is
    /// absent, [`ConfigError::ParseError`] on malformed sources, or a
    /// validation error.
    pub fn load_from(path: &Path, required: bool, env_prefix: &str) -> ConfigResult<Self> {
        if required && !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the single failing field, or
    /// [`ConfigError::MultipleValidationErrors`] when several fail.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: String| {
            errors.push(ConfigError::ValidationError { field, message });
        };

        if !self.alerts.min_celsius.is_finite() || !self.alerts.max_celsius.is_finite() {
            fail("alerts", "thresholds must be finite numbers".to_string());
        } else if self.alerts.min_celsius >= self.alerts.max_celsius {
            fail(
                "alerts.min_celsius",
                format!(
                    "must be below max_celsius ({} >= {})",
                    self.alerts.min_celsius, self.alerts.max_celsius
                ),
            );
        }
        if self.alerts.debounce_secs == 0 || self.alerts.debounce_secs > MAX_DEBOUNCE_SECS {
            fail(
                "alerts.debounce_secs",
                format!("must be between 1 and {MAX_DEBOUNCE_SECS}"),
            );
        }
        if self.storage.write_timeout_ms == 0 {
            fail("storage.write_timeout_ms", "must be greater than 0".to_string());
        }
        if self.hub.subscriber_buffer == 0 {
            fail("hub.subscriber_buffer", "must be greater than 0".to_string());
        }
        if self.hub.send_timeout_ms == 0 {
            fail("hub.send_timeout_ms", "must be greater than 0".to_string());
        }
        if self.telegram.bot_token.is_some() != self.telegram.chat_id.is_some() {
            fail(
                "telegram",
                "bot_token and chat_id must be set together".to_string(),
            );
        }
        if self.telegram.timeout_secs == 0 {
            fail("telegram.timeout_secs", "must be greater than 0".to_string());
        }
        if !is_valid_timezone(&self.system.timezone) {
            fail(
                "system.timezone",
                format!("unknown IANA timezone '{}'", self.system.timezone),
            );
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Parsed timezone, falling back to UTC.
    #[must_use]
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.system.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

/// Whether `name` is a known IANA timezone.
#[must_use]
pub fn is_valid_timezone(name: &str) -> bool {
    name.parse::<chrono_tz::Tz>().is_ok()
}

/// Default configuration file location.
///
/// On Linux: `/etc/coldtrace/config.toml`.
/// Elsewhere: the platform config directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/coldtrace/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "coldtrace").map_or_else(
            || PathBuf::from("./config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

/// Default data directory.
///
/// On Linux: `/var/lib/coldtrace`.
/// Elsewhere: the platform data directory.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/coldtrace")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "coldtrace")
            .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
    }
}

// config.rs
use serde::Deserialize;
use std::path::PathBuf;

/// Request logger configuration.
///
/// Caller overrides are merged onto [`LoggerConfig::default`], either with
/// struct update syntax or by deserializing a partial table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Logger name, also the stem of the log file names.
    pub name: String,
    /// Directory for `<name>.log` and `<name>_error.log`; standard streams when unset.
    pub path: Option<PathBuf>,
    pub json: bool,
    /// Put the raw error detail into failed responses.
    pub surface_errors: bool,
    /// Replace `authorization` and `cookie` request headers in log records.
    pub obfuscate: bool,
    /// Read client ip and protocol from `X-Forwarded-*` headers.
    pub trust_proxy: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            path: None,
            json: true,
            surface_errors: false,
            obfuscate: false,
            trust_proxy: false,
        }
    }
}

impl LoggerConfig {
    pub fn info_log_file(&self) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", self.name)))
    }

    pub fn error_log_file(&self) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|dir| dir.join(format!("{}_error.log", self.name)))
    }
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // e.g. "info", "debug", "warn"
}

/// Global configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub request_log: LoggerConfig,
}

impl Config {
    /// Load config from `config/default.toml` and environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load(env: config::Environment) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(env)
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        Ok(cfg)
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::CircuitBreakerPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub downstream: DownstreamConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Base URLs of the services a customer summary is assembled from.
#[derive(Clone, Debug)]
pub struct DownstreamConfig {
    pub accounts_url: String,
    pub cards_url: String,
    pub credits_url: String,
    pub call_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub window_size: usize,
    pub minimum_calls: usize,
    pub failure_rate_threshold: f64,
    pub open_cooldown_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub accounts_url: Option<String>,
    pub cards_url: Option<String>,
    pub credits_url: Option<String>,
    pub call_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://clientele.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            downstream: DownstreamConfig {
                accounts_url: "http://localhost:8081".to_string(),
                cards_url: "http://localhost:8082".to_string(),
                credits_url: "http://localhost:8083".to_string(),
                call_timeout_ms: 5_000,
            },
            circuit_breaker: CircuitBreakerConfig {
                window_size: 10,
                minimum_calls: 5,
                failure_rate_threshold: 50.0,
                open_cooldown_ms: 30_000,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl DownstreamConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn policy(&self) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy {
            window_size: self.window_size,
            minimum_calls: self.minimum_calls,
            failure_rate_threshold: self.failure_rate_threshold,
            open_cooldown: Duration::from_millis(self.open_cooldown_ms),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("clientele.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(downstream) = patch.downstream {
            if let Some(accounts_url) = downstream.accounts_url {
                self.downstream.accounts_url = accounts_url;
            }
            if let Some(cards_url) = downstream.cards_url {
                self.downstream.cards_url = cards_url;
            }
            if let Some(credits_url) = downstream.credits_url {
                self.downstream.credits_url = credits_url;
            }
            if let Some(call_timeout_ms) = downstream.call_timeout_ms {
                self.downstream.call_timeout_ms = call_timeout_ms;
            }
        }

        if let Some(breaker) = patch.circuit_breaker {
            if let Some(window_size) = breaker.window_size {
                self.circuit_breaker.window_size = window_size;
            }
            if let Some(minimum_calls) = breaker.minimum_calls {
                self.circuit_breaker.minimum_calls = minimum_calls;
            }
            if let Some(failure_rate_threshold) = breaker.failure_rate_threshold {
                self.circuit_breaker.failure_rate_threshold = failure_rate_threshold;
            }
            if let Some(open_cooldown_ms) = breaker.open_cooldown_ms {
                self.circuit_breaker.open_cooldown_ms = open_cooldown_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CLIENTELE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CLIENTELE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("CLIENTELE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CLIENTELE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("CLIENTELE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CLIENTELE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CLIENTELE_SERVER_PORT") {
            self.server.port = parse_env("CLIENTELE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CLIENTELE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("CLIENTELE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CLIENTELE_DOWNSTREAM_ACCOUNTS_URL") {
            self.downstream.accounts_url = value;
        }
        if let Some(value) = read_env("CLIENTELE_DOWNSTREAM_CARDS_URL") {
            self.downstream.cards_url = value;
        }
        if let Some(value) = read_env("CLIENTELE_DOWNSTREAM_CREDITS_URL") {
            self.downstream.credits_url = value;
        }
        if let Some(value) = read_env("CLIENTELE_DOWNSTREAM_CALL_TIMEOUT_MS") {
            self.downstream.call_timeout_ms =
                parse_env("CLIENTELE_DOWNSTREAM_CALL_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("CLIENTELE_CIRCUIT_BREAKER_WINDOW_SIZE") {
            self.circuit_breaker.window_size =
                parse_env("CLIENTELE_CIRCUIT_BREAKER_WINDOW_SIZE", &value)?;
        }
        if let Some(value) = read_env("CLIENTELE_CIRCUIT_BREAKER_MINIMUM_CALLS") {
            self.circuit_breaker.minimum_calls =
                parse_env("CLIENTELE_CIRCUIT_BREAKER_MINIMUM_CALLS", &value)?;
        }
        if let Some(value) = read_env("CLIENTELE_CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD") {
            self.circuit_breaker.failure_rate_threshold =
                parse_env("CLIENTELE_CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CLIENTELE_CIRCUIT_BREAKER_OPEN_COOLDOWN_MS") {
            self.circuit_breaker.open_cooldown_ms =
                parse_env("CLIENTELE_CIRCUIT_BREAKER_OPEN_COOLDOWN_MS", &value)?;
        }

        let log_level =
            read_env("CLIENTELE_LOGGING_LEVEL").or_else(|| read_env("CLIENTELE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CLIENTELE_LOGGING_FORMAT").or_else(|| read_env("CLIENTELE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(accounts_url) = overrides.accounts_url {
            self.downstream.accounts_url = accounts_url;
        }
        if let Some(cards_url) = overrides.cards_url {
            self.downstream.cards_url = cards_url;
        }
        if let Some(credits_url) = overrides.credits_url {
            self.downstream.credits_url = credits_url;
        }
        if let Some(call_timeout_ms) = overrides.call_timeout_ms {
            self.downstream.call_timeout_ms = call_timeout_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_downstream(&self.downstream)?;
        validate_circuit_breaker(&self.circuit_breaker)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("clientele.toml"), PathBuf::from("config/clientele.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_downstream(downstream: &DownstreamConfig) -> Result<(), ConfigError> {
    for (key, url) in [
        ("downstream.accounts_url", &downstream.accounts_url),
        ("downstream.cards_url", &downstream.cards_url),
        ("downstream.credits_url", &downstream.credits_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https:// (got `{url}`)"
            )));
        }
    }

    if downstream.call_timeout_ms == 0 || downstream.call_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "downstream.call_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_circuit_breaker(breaker: &CircuitBreakerConfig) -> Result<(), ConfigError> {
    if breaker.window_size == 0 {
        return Err(ConfigError::Validation(
            "circuit_breaker.window_size must be greater than zero".to_string(),
        ));
    }

    if breaker.minimum_calls == 0 || breaker.minimum_calls > breaker.window_size {
        return Err(ConfigError::Validation(
            "circuit_breaker.minimum_calls must be in range 1..=window_size".to_string(),
        ));
    }

    let threshold = breaker.failure_rate_threshold;
    if !(threshold > 0.0 && threshold <= 100.0) {
        return Err(ConfigError::Validation(
            "circuit_breaker.failure_rate_threshold must be a percentage in (0, 100]".to_string(),
        ));
    }

    if breaker.open_cooldown_ms == 0 {
        return Err(ConfigError::Validation(
            "circuit_breaker.open_cooldown_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    downstream: Option<DownstreamPatch>,
    circuit_breaker: Option<CircuitBreakerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DownstreamPatch {
    accounts_url: Option<String>,
    cards_url: Option<String>,
    credits_url: Option<String>,
    call_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CircuitBreakerPatch {
    window_size: Option<usize>,
    minimum_calls: Option<usize>,
    failure_rate_threshold: Option<f64>,
    open_cooldown_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

use std::env;
use std::fs;
use std::path::Path;

use clientele_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, env_keys, value) in effective_values(&config) {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

type EffectiveValue = (&'static str, &'static [&'static str], String);

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    let database = &config.database;
    let server = &config.server;
    let downstream = &config.downstream;
    let breaker = &config.circuit_breaker;

    vec![
        entry("database.url", &["CLIENTELE_DATABASE_URL"], &database.url),
        entry(
            "database.max_connections",
            &["CLIENTELE_DATABASE_MAX_CONNECTIONS"],
            database.max_connections,
        ),
        entry("database.timeout_secs", &["CLIENTELE_DATABASE_TIMEOUT_SECS"], database.timeout_secs),
        entry("server.bind_address", &["CLIENTELE_SERVER_BIND_ADDRESS"], &server.bind_address),
        entry("server.port", &["CLIENTELE_SERVER_PORT"], server.port),
        entry(
            "server.graceful_shutdown_secs",
            &["CLIENTELE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            server.graceful_shutdown_secs,
        ),
        entry(
            "downstream.accounts_url",
            &["CLIENTELE_DOWNSTREAM_ACCOUNTS_URL"],
            &downstream.accounts_url,
        ),
        entry("downstream.cards_url", &["CLIENTELE_DOWNSTREAM_CARDS_URL"], &downstream.cards_url),
        entry(
            "downstream.credits_url",
            &["CLIENTELE_DOWNSTREAM_CREDITS_URL"],
            &downstream.credits_url,
        ),
        entry(
            "downstream.call_timeout_ms",
            &["CLIENTELE_DOWNSTREAM_CALL_TIMEOUT_MS"],
            downstream.call_timeout_ms,
        ),
        entry(
            "circuit_breaker.window_size",
            &["CLIENTELE_CIRCUIT_BREAKER_WINDOW_SIZE"],
            breaker.window_size,
        ),
        entry(
            "circuit_breaker.minimum_calls",
            &["CLIENTELE_CIRCUIT_BREAKER_MINIMUM_CALLS"],
            breaker.minimum_calls,
        ),
        entry(
            "circuit_breaker.failure_rate_threshold",
            &["CLIENTELE_CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD"],
            breaker.failure_rate_threshold,
        ),
        entry(
            "circuit_breaker.open_cooldown_ms",
            &["CLIENTELE_CIRCUIT_BREAKER_OPEN_COOLDOWN_MS"],
            breaker.open_cooldown_ms,
        ),
        entry(
            "logging.level",
            &["CLIENTELE_LOGGING_LEVEL", "CLIENTELE_LOG_LEVEL"],
            &config.logging.level,
        ),
        entry(
            "logging.format",
            &["CLIENTELE_LOGGING_FORMAT", "CLIENTELE_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn entry(
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: impl ToString,
) -> EffectiveValue {
    (key_path, env_keys, value.to_string())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

use std::env;
use std::sync::{Mutex, OnceLock};

use clientele_cli::commands::{config, doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("CLIENTELE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_downstream_url() {
    with_env(
        &[
            ("CLIENTELE_DATABASE_URL", "sqlite::memory:"),
            ("CLIENTELE_DOWNSTREAM_CARDS_URL", "cards.internal"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn config_attributes_values_to_their_source() {
    with_env(
        &[
            ("CLIENTELE_DATABASE_URL", "sqlite::memory:"),
            ("CLIENTELE_DOWNSTREAM_CALL_TIMEOUT_MS", "750"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "expected config inspection success");
            assert!(result
                .output
                .contains("- downstream.call_timeout_ms = 750 (source: env (CLIENTELE_DOWNSTREAM_CALL_TIMEOUT_MS))"));
            assert!(result
                .output
                .contains("- database.url = sqlite::memory: (source: env (CLIENTELE_DATABASE_URL))"));
            assert!(result.output.contains("circuit_breaker.window_size = 10 (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("CLIENTELE_CIRCUIT_BREAKER_MINIMUM_CALLS", "0")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_after_migrate_on_file_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!("sqlite://{}", dir.path().join("clientele.db").display());

    with_env(&[("CLIENTELE_DATABASE_URL", database_url.as_str())], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1, "schema should be reported as missing before migrate");
        let payload = parse_payload(&before.output);
        let schema = find_check(&payload, "schema_migrations");
        assert_eq!(schema["status"], "fail");
        assert!(schema["details"].as_str().unwrap_or_default().contains("clientele migrate"));

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0, "doctor output: {}", after.output);
        let payload = parse_payload(&after.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(find_check(&payload, "database_connectivity")["status"], "pass");
        assert_eq!(find_check(&payload, "schema_migrations")["status"], "pass");
    });
}

#[test]
fn doctor_reports_unreadable_migration_history_as_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!("sqlite://{}", dir.path().join("broken.db").display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let pool = clientele_db::connect(&database_url).await.expect("connect");
        sqlx::query("CREATE TABLE _sqlx_migrations (version INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .expect("create bookkeeping table without success column");
        pool.close().await;
    });

    with_env(&[("CLIENTELE_DATABASE_URL", database_url.as_str())], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(find_check(&payload, "database_connectivity")["status"], "pass");
        let schema = find_check(&payload, "schema_migrations");
        assert_eq!(schema["status"], "fail");
        let details = schema["details"].as_str().unwrap_or_default();
        assert!(details.starts_with("failed to read applied migrations"), "details: {details}");
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    with_env(&[("CLIENTELE_DATABASE_URL", "postgres://localhost/clientele")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(find_check(&payload, "config_validation")["status"], "fail");
        assert_eq!(find_check(&payload, "database_connectivity")["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_lists_each_check() {
    with_env(&[("CLIENTELE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(false);

        assert!(result.output.starts_with("doctor:"));
        assert!(result.output.contains("[ok] config_validation"));
        assert!(result.output.contains("[ok] database_connectivity"));
        assert!(result.output.contains("[fail] schema_migrations"));
    });
}

fn find_check<'a>(payload: &'a Value, name: &str) -> &'a Value {
    payload["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .unwrap_or_else(|| panic!("missing check {name} in {payload}"))
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CLIENTELE_DATABASE_URL",
        "CLIENTELE_DATABASE_MAX_CONNECTIONS",
        "CLIENTELE_DATABASE_TIMEOUT_SECS",
        "CLIENTELE_SERVER_BIND_ADDRESS",
        "CLIENTELE_SERVER_PORT",
        "CLIENTELE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CLIENTELE_DOWNSTREAM_ACCOUNTS_URL",
        "CLIENTELE_DOWNSTREAM_CARDS_URL",
        "CLIENTELE_DOWNSTREAM_CREDITS_URL",
        "CLIENTELE_DOWNSTREAM_CALL_TIMEOUT_MS",
        "CLIENTELE_CIRCUIT_BREAKER_WINDOW_SIZE",
        "CLIENTELE_CIRCUIT_BREAKER_MINIMUM_CALLS",
        "CLIENTELE_CIRCUIT_BREAKER_FAILURE_RATE_THRESHOLD",
        "CLIENTELE_CIRCUIT_BREAKER_OPEN_COOLDOWN_MS",
        "CLIENTELE_LOGGING_LEVEL",
        "CLIENTELE_LOGGING_FORMAT",
        "CLIENTELE_LOG_LEVEL",
        "CLIENTELE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}

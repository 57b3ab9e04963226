use clientele_core::config::{AppConfig, LoadOptions};
use clientele_db::{connect_with_config, migrations, ping, DbPool};
use serde::Serialize;

use crate::commands::{runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::report(output, passed);
    }

    CommandResult::report(render_human(&report), passed)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(DoctorCheck::pass(
                "downstream_targets",
                format!(
                    "accounts={} cards={} credits={} timeout={}ms",
                    config.downstream.accounts_url,
                    config.downstream.cards_url,
                    config.downstream.credits_url,
                    config.downstream.call_timeout_ms
                ),
            ));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("downstream_targets", "configuration did not load"));
            checks.push(DoctorCheck::skipped("database_connectivity", "configuration did not load"));
            checks.push(DoctorCheck::skipped("schema_migrations", "configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("schema_migrations", "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("schema_migrations", "the database is unreachable"),
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            Err(error) => {
                DoctorCheck::fail("database_connectivity", format!("SELECT 1 failed: {error}"))
            }
        };
        let schema = check_schema(&pool).await;
        pool.close().await;

        vec![connectivity, schema]
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let known = migrations::known_migrations();
    let applied = match applied_migrations(pool).await {
        Ok(applied) => applied,
        Err(error) => {
            return DoctorCheck::fail(
                "schema_migrations",
                format!("failed to read applied migrations: {error}"),
            );
        }
    };

    if usize::try_from(applied).is_ok_and(|applied| applied >= known) {
        DoctorCheck::pass("schema_migrations", format!("{applied} of {known} migrations applied"))
    } else {
        DoctorCheck::fail(
            "schema_migrations",
            format!("{applied} of {known} migrations applied; run `clientele migrate`"),
        )
    }
}

async fn applied_migrations(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let (tracked,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    // No bookkeeping table yet means nothing was applied.
    if tracked == 0 {
        return Ok(0);
    }

    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

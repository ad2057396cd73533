//! Read-only environment diagnosis. Unlike `smoke`, doctor never mutates
//! anything: it loads the config, opens a connection, and compares the
//! migration journal against the embedded set without applying it.

use dealflow_core::config::{AppConfig, LoadOptions};
use dealflow_db::{connect_from_config, migrations, DbPool};
use serde::Serialize;

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            None
        }
    };

    match config {
        Some(config) => run_database_checks(&config, &mut checks),
        None => {
            for name in ["database_connectivity", "migration_status"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status != CheckStatus::Pass);
    DoctorReport {
        overall_status: if failed { CheckStatus::Fail } else { CheckStatus::Pass },
        summary: if failed {
            "doctor: one or more readiness checks failed".to_string()
        } else {
            "doctor: all readiness checks passed".to_string()
        },
        checks,
    }
}

fn run_database_checks(config: &AppConfig, checks: &mut Vec<DoctorCheck>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(DoctorCheck {
                name: "migration_status",
                status: CheckStatus::Skipped,
                details: "skipped because no database connection was made".to_string(),
            });
            return;
        }
    };

    let pool = match runtime.block_on(connect_from_config(&config.database)) {
        Ok(pool) => {
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            });
            pool
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to connect to database: {error}"),
            });
            checks.push(DoctorCheck {
                name: "migration_status",
                status: CheckStatus::Skipped,
                details: "skipped because no database connection was made".to_string(),
            });
            return;
        }
    };

    checks.push(runtime.block_on(check_migration_journal(&pool)));
    runtime.block_on(pool.close());
}

/// Compares the database's migration journal against the embedded set
/// without applying anything.
async fn check_migration_journal(pool: &DbPool) -> DoctorCheck {
    let known = migrations::known_count() as i64;
    let applied = migrations::applied_count(pool).await;

    if applied >= known {
        DoctorCheck {
            name: "migration_status",
            status: CheckStatus::Pass,
            details: format!("{applied} of {known} migrations applied"),
        }
    } else {
        DoctorCheck {
            name: "migration_status",
            status: CheckStatus::Fail,
            details: format!(
                "{applied} of {known} migrations applied; run `dealflow migrate`"
            ),
        }
    }
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

//! End-to-end readiness probe: config, database, migrations. Emits one
//! human summary line followed by a machine-readable JSON report; any
//! failing check turns the whole run into exit code 6.

use std::time::Instant;

use crate::commands::CommandResult;
use dealflow_core::config::{AppConfig, LoadOptions};
use dealflow_db::{connect_from_config, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

/// Collects check outcomes and remembers whether a failure has already
/// occurred, so later checks record themselves as skipped instead of
/// running against a half-ready stack.
struct CheckLog {
    started: Instant,
    checks: Vec<SmokeCheck>,
    halted: bool,
}

impl CheckLog {
    fn new() -> Self {
        Self { started: Instant::now(), checks: Vec::new(), halted: false }
    }

    fn record<T>(
        &mut self,
        name: &'static str,
        run: impl FnOnce() -> Result<(String, T), String>,
    ) -> Option<T> {
        if self.halted {
            self.checks.push(SmokeCheck {
                name,
                status: SmokeStatus::Skipped,
                elapsed_ms: 0,
                message: "not run; an earlier check failed".to_string(),
            });
            return None;
        }
        let check_started = Instant::now();
        let outcome = run();
        let elapsed_ms = check_started.elapsed().as_millis() as u64;
        match outcome {
            Ok((message, value)) => {
                self.checks.push(SmokeCheck {
                    name,
                    status: SmokeStatus::Pass,
                    elapsed_ms,
                    message,
                });
                Some(value)
            }
            Err(message) => {
                self.halted = true;
                self.checks.push(SmokeCheck {
                    name,
                    status: SmokeStatus::Fail,
                    elapsed_ms,
                    message,
                });
                None
            }
        }
    }

    fn into_result(self) -> CommandResult {
        let passed = self.checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
        let total = self.checks.len();
        let total_elapsed_ms = self.started.elapsed().as_millis() as u64;
        let failed = self.checks.iter().any(|check| check.status == SmokeStatus::Fail);

        let report = SmokeReport {
            command: "smoke",
            status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
            summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
            total_elapsed_ms,
            checks: self.checks,
        };

        let human = report.summary.clone();
        let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "command": "smoke",
                "status": "fail",
                "summary": "serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        });

        CommandResult {
            exit_code: if failed { 6 } else { 0 },
            output: format!("{human}\n{machine}"),
        }
    }
}

pub fn run() -> CommandResult {
    let mut log = CheckLog::new();

    let config = log.record("config_validation", || {
        AppConfig::load(LoadOptions::default())
            .map(|config| ("configuration loaded and validated".to_string(), config))
            .map_err(|error| error.to_string())
    });

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            log.record::<()>("db_connectivity", || {
                Err(format!("failed to initialize async runtime: {error}"))
            });
            log.record::<()>("migration_visibility", || {
                Err("no runtime available".to_string())
            });
            return log.into_result();
        }
    };

    let pool = log.record("db_connectivity", || {
        let Some(config) = config.as_ref() else {
            return Err("configuration unavailable".to_string());
        };
        runtime
            .block_on(connect_from_config(&config.database))
            .map(|pool| (format!("connected using `{}`", config.database.url), pool))
            .map_err(|error| format!("failed to connect: {error}"))
    });

    log.record("migration_visibility", || {
        let Some(pool) = pool.as_ref() else {
            return Err("database connection unavailable".to_string());
        };
        let known = migrations::known_count();
        runtime
            .block_on(migrations::run_pending(pool))
            .map(|()| (format!("{known} migrations visible; database is current"), ()))
            .map_err(|error| format!("migration execution failed: {error}"))
    });

    if let Some(pool) = pool {
        runtime.block_on(pool.close());
    }

    log.into_result()
}

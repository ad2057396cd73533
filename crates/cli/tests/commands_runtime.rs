use std::env;
use std::sync::{Mutex, OnceLock};

use dealflow_cli::commands::{config, doctor, migrate, seed, smoke};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("DEALFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("message string");
        assert!(message.starts_with("applied "), "fresh database applies everything: {message}");
    });
}

#[test]
fn migrate_returns_config_failure_with_invalid_currency() {
    with_env(&[("DEALFLOW_WORKFLOW_BASE_CURRENCY", "dollars")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_returns_deterministic_dataset_summary() {
    with_env(&[("DEALFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("demo dataset loaded for organization `org-demo`"));
        assert!(message
            .contains("  - draft: Q-1001 quote-demo-draft (Fresh draft with two unresolved items)"));
        assert!(message.contains(
            "  - procurement: Q-1002 quote-demo-procurement (Mid-procurement, one of two items purchased)"
        ));
        assert!(message.contains(
            "  - deal: Q-1003 quote-demo-deal (Closed into an active deal with ledger and invoice)"
        ));
        assert!(message.contains("  - deal: deal-demo-001 with invoice inv-demo-001"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("DEALFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["status"], "ok");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn smoke_returns_success_report_with_valid_env() {
    with_env(&[("DEALFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("DEALFLOW_WORKFLOW_MINIMUM_MARKUP_PERCENT", "150")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");

        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert_eq!(checks[1]["status"], "skipped");
    });
}

#[test]
fn config_reports_env_source_attribution() {
    with_env(&[("DEALFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let output = config::run();
        assert!(output.starts_with("effective config (source precedence: env > file > default):"));
        assert!(output
            .contains("- database.url = sqlite::memory: (source: env (DEALFLOW_DATABASE_URL))"));
        assert!(output.contains("- workflow.base_currency = USD (source: default)"));
        assert!(output.contains("- logging.format = compact (source: default)"));
    });
}

#[test]
fn doctor_json_report_is_machine_readable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("doctor.db").display());
    with_env(&[("DEALFLOW_DATABASE_URL", url.as_str())], || {
        // Doctor flags an unmigrated database, so bring it current first.
        assert_eq!(migrate::run().exit_code, 0, "expected migrate to succeed");

        let output = doctor::run(true);
        let payload: Value =
            serde_json::from_str(&output).expect("doctor --json should emit valid JSON");
        assert_eq!(payload["overall_status"], "pass");

        let checks = payload["checks"].as_array().expect("checks array");
        let names: Vec<&str> =
            checks.iter().filter_map(|check| check["name"].as_str()).collect();
        assert_eq!(names, ["config_validation", "database_connectivity", "migration_status"]);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DEALFLOW_DATABASE_URL",
        "DEALFLOW_DATABASE_MAX_CONNECTIONS",
        "DEALFLOW_DATABASE_BUSY_TIMEOUT_MS",
        "DEALFLOW_WORKFLOW_BASE_CURRENCY",
        "DEALFLOW_WORKFLOW_MINIMUM_MARKUP_PERCENT",
        "DEALFLOW_WORKFLOW_FULL_PREPAYMENT_PERCENT",
        "DEALFLOW_LOGGING_LEVEL",
        "DEALFLOW_LOGGING_FORMAT",
        "DEALFLOW_LOG_LEVEL",
        "DEALFLOW_LOG_FORMAT",
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

pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod smoke;

use serde::Serialize;
use serde_json::json;

/// Outcome of one CLI subcommand: the process exit code plus the line
/// printed to stdout. Every command funnels through here so scripts can
/// rely on one payload shape.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'a str,
    error_class: Option<&'a str>,
    message: &'a str,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            exit_code: 0,
            output: serialize_payload(CommandOutcome {
                command,
                status: "ok",
                error_class: None,
                message: &message,
            }),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let message = message.into();
        Self {
            exit_code,
            output: serialize_payload(CommandOutcome {
                command,
                status: "error",
                error_class: Some(error_class),
                message: &message,
            }),
        }
    }
}

fn serialize_payload(payload: CommandOutcome<'_>) -> String {
    // json! of plain strings cannot fail, so the fallback stays trivial.
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        json!({
            "command": "unknown",
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}

use crate::commands::CommandResult;
use dealflow_core::config::{AppConfig, LoadOptions};
use dealflow_db::{connect_from_config, migrations};

struct StepFailure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
}

impl StepFailure {
    fn new(error_class: &'static str, message: String, exit_code: u8) -> Self {
        Self { error_class, message, exit_code }
    }
}

pub fn run() -> CommandResult {
    match apply_migrations() {
        Ok(message) => CommandResult::success("migrate", message),
        Err(failure) => CommandResult::failure(
            "migrate",
            failure.error_class,
            failure.message,
            failure.exit_code,
        ),
    }
}

fn apply_migrations() -> Result<String, StepFailure> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        StepFailure::new("config_validation", format!("configuration issue: {error}"), 2)
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            StepFailure::new("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
        })?;

    runtime.block_on(async {
        let pool = connect_from_config(&config.database).await.map_err(|error| {
            StepFailure::new("db_connectivity", error.to_string(), 4)
        })?;

        let before = migrations::applied_count(&pool).await;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| StepFailure::new("migration", error.to_string(), 5))?;
        let after = migrations::applied_count(&pool).await;
        pool.close().await;

        Ok(if after > before {
            format!("applied {} migrations; {after} now recorded", after - before)
        } else {
            format!("no pending migrations; {after} already recorded")
        })
    })
}

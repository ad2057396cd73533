use crate::commands::CommandResult;
use dealflow_core::config::{AppConfig, LoadOptions};
use dealflow_db::{connect_from_config, migrations, seed_demo_dataset, SeedSummary};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let summary = seed_demo_dataset(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<SeedSummary, (&'static str, String, u8)>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success("seed", render_summary(&summary)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

/// The dataset is deterministic, so this message is identical across runs
/// and doubles as an idempotency check in the tests.
fn render_summary(summary: &SeedSummary) -> String {
    let mut lines = vec![format!(
        "demo dataset loaded for organization `{}` with {} quotes:",
        summary.org_id.0,
        summary.quotes.len()
    )];
    for quote in &summary.quotes {
        lines.push(format!(
            "  - {}: {} {} ({})",
            quote.label, quote.number, quote.quote_id, quote.description
        ));
    }
    lines.push(format!(
        "  - deal: {} with invoice {}",
        summary.deal_id.0, summary.invoice_id.0
    ));
    lines.join("\n")
}

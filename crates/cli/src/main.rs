//! `stockpulse` binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use stockpulse_ai::ModelStore;
use stockpulse_cli::{Cli, commands};
use stockpulse_infra::{FileModelStore, InMemoryTableStore, Pipelines, PostgresTableStore, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    stockpulse_observability::tracing::init(cli.log_format.into());

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    let models: Arc<dyn ModelStore> = Arc::new(FileModelStore::new(&settings.model_path));

    let output = match settings.database_url.clone() {
        Some(url) => {
            let store = PostgresTableStore::connect(&url)
                .await
                .context("connecting to postgres")?;
            store.ensure_schema().await.context("preparing postgres schema")?;
            commands::execute(cli.command, &Pipelines::new(store, models, settings)).await?
        }
        None => {
            warn!("database_url is not set; using an in-memory store that is discarded on exit");
            commands::execute(cli.command, &Pipelines::new(InMemoryTableStore::new(), models, settings)).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

//! Command execution against a [`Pipelines`] instance.

use anyhow::{Context, Result};
use serde_json::{Value, json};

use stockpulse_ai::ModelRefresh;
use stockpulse_core::Sku;
use stockpulse_infra::ingest::{load_file, load_product_master, load_sales_transactions, load_stock_snapshots};
use stockpulse_infra::{Pipelines, TableStore};
use stockpulse_inventory::ManualOverride;

use crate::Commands;

/// Run one command and return its JSON output.
///
/// # Errors
///
/// Returns an error if an input file cannot be read or the pipeline fails.
pub async fn execute<S: TableStore>(command: Commands, pipelines: &Pipelines<S>) -> Result<Value> {
    let output = match command {
        Commands::Report(args) => {
            let current = load_file(&args.current, load_stock_snapshots)
                .with_context(|| format!("reading current snapshot {}", args.current.display()))?;
            let previous = match &args.previous {
                Some(path) => Some(
                    load_file(path, load_stock_snapshots)
                        .with_context(|| format!("reading previous snapshot {}", path.display()))?,
                ),
                None => None,
            };
            let report = pipelines.stock_report(current, previous).await?;
            serde_json::to_value(report)?
        }
        Commands::SetOverride(args) => {
            let sku = Sku::new(&args.sku)?;
            let update = ManualOverride::new(args.min_stock, args.buffer)?;
            let outcome = pipelines.set_override(&sku, update).await?;
            serde_json::to_value(outcome)?
        }
        Commands::Notifications => serde_json::to_value(pipelines.replenishment_records().await?)?,
        Commands::StockLevels(args) => serde_json::to_value(pipelines.stock_levels(&args.filter()).await?)?,
        Commands::StockCategories => serde_json::to_value(pipelines.stock_categories().await?)?,
        Commands::ClearStock => json!({ "removed": pipelines.clear_stock().await? }),
        Commands::IngestSales(args) => {
            let transactions = load_file(&args.transactions, load_sales_transactions)
                .with_context(|| format!("reading sales transactions {}", args.transactions.display()))?;
            let master = load_file(&args.master, load_product_master)
                .with_context(|| format!("reading product master {}", args.master.display()))?;
            let summary = pipelines.ingest_sales(&transactions, &master).await?;
            serde_json::to_value(summary)?
        }
        Commands::Train(args) => {
            let refresh = if args.refit {
                ModelRefresh::Refit
            } else {
                ModelRefresh::ReuseStored
            };
            let report = pipelines.train(refresh, args.forecast.options()?).await?;
            serde_json::to_value(report)?
        }
        Commands::Forecast(args) => {
            let outcome = pipelines.forecast(args.options()?).await?;
            serde_json::to_value(outcome)?
        }
        Commands::Forecasts => serde_json::to_value(pipelines.forecasts().await?)?,
        Commands::ClearForecasts => json!({ "removed": pipelines.clear_forecasts().await? }),
    };
    Ok(output)
}

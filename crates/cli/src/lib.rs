//! # stockpulse-cli
//!
//! Command-line entry point for the replenishment and forecasting pipelines.
//!
//! ## Commands
//!
//! - `stockpulse report` - compare a stock snapshot against the previous one
//! - `stockpulse set-override` - pin min stock and/or buffer for a SKU
//! - `stockpulse notifications` / `stock-levels` / `stock-categories` - read back stock state
//! - `stockpulse clear-stock` - drop the stored snapshot and report
//! - `stockpulse ingest-sales` - merge sales transactions into the monthly panel
//! - `stockpulse train` - prepare a model, forecast and store the result
//! - `stockpulse forecast` - forecast with the stored model
//! - `stockpulse forecasts` / `clear-forecasts` - read back or drop stored forecasts
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.
//!
//! ## Configuration
//!
//! `stockpulse.toml` (or `--config <file>`) plus `STOCKPULSE_*` environment
//! variables. Without `database_url` the pipelines run against an in-memory store
//! that lives only for the current invocation.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use stockpulse_infra::{ForecastOptions, StockLevelFilter, StockSort};
use stockpulse_inventory::ActivityFlag;
use stockpulse_observability::LogFormat;

/// Stock replenishment signals and monthly sales forecasts.
#[derive(Debug, Parser)]
#[command(name = "stockpulse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file; replaces the optional `stockpulse.toml`.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value = "json", global = true)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare the current stock snapshot against the previous one and store the report.
    Report(ReportArgs),
    /// Set a manual min stock and/or buffer for one SKU.
    SetOverride(SetOverrideArgs),
    /// Print the stored replenishment report.
    Notifications,
    /// Print stored stock levels, optionally filtered and sorted.
    StockLevels(StockLevelsArgs),
    /// Print the distinct categories of the stored stock snapshot.
    StockCategories,
    /// Delete the stored stock snapshot and report.
    ClearStock,
    /// Merge a sales transaction upload into the stored monthly panel.
    IngestSales(IngestSalesArgs),
    /// Prepare a model from the stored panel, forecast, and store the forecast.
    Train(TrainArgs),
    /// Forecast with the stored model.
    Forecast(ForecastArgs),
    /// Print the stored forecasts.
    Forecasts,
    /// Delete the stored forecasts.
    ClearForecasts,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Current stock snapshot CSV.
    pub current: PathBuf,

    /// Previous stock snapshot CSV; read only when no snapshot is stored yet.
    #[arg(long)]
    pub previous: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SetOverrideArgs {
    pub sku: String,

    #[arg(long)]
    pub min_stock: Option<i64>,

    #[arg(long)]
    pub buffer: Option<i64>,
}

#[derive(Debug, Args)]
pub struct StockLevelsArgs {
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, value_enum)]
    pub flag: Option<FlagArg>,

    #[arg(long, value_enum, default_value = "stored")]
    pub sort: SortArg,
}

impl StockLevelsArgs {
    pub fn filter(&self) -> StockLevelFilter {
        StockLevelFilter {
            category: self.category.clone(),
            flag: self.flag.map(ActivityFlag::from),
            sort: self.sort.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlagArg {
    Stage,
    Active,
    Inactive,
    JustAddedStock,
}

impl From<FlagArg> for ActivityFlag {
    fn from(arg: FlagArg) -> Self {
        match arg {
            FlagArg::Stage => ActivityFlag::Stage,
            FlagArg::Active => ActivityFlag::Active,
            FlagArg::Inactive => ActivityFlag::Inactive,
            FlagArg::JustAddedStock => ActivityFlag::JustAddedStock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Stored,
    QuantityAsc,
    QuantityDesc,
    NameAsc,
    NameDesc,
}

impl From<SortArg> for StockSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Stored => StockSort::Stored,
            SortArg::QuantityAsc => StockSort::QuantityAsc,
            SortArg::QuantityDesc => StockSort::QuantityDesc,
            SortArg::NameAsc => StockSort::NameAsc,
            SortArg::NameDesc => StockSort::NameDesc,
        }
    }
}

#[derive(Debug, Args)]
pub struct IngestSalesArgs {
    /// Sales transactions CSV.
    pub transactions: PathBuf,

    /// Product master CSV.
    #[arg(long)]
    pub master: PathBuf,
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Fit a new model even when a compatible one is stored.
    #[arg(long)]
    pub refit: bool,

    #[command(flatten)]
    pub forecast: ForecastArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ForecastArgs {
    /// Restrict the forecast to a SKU; repeatable.
    #[arg(long = "sku")]
    pub skus: Vec<String>,

    /// Months to forecast; defaults to `forecast.default_steps`.
    #[arg(long)]
    pub steps: Option<u32>,

    /// Do not warm-start the model on its own predictions between steps.
    #[arg(long)]
    pub no_retrain: bool,
}

impl ForecastArgs {
    pub fn options(&self) -> Result<ForecastOptions, stockpulse_core::DomainError> {
        let skus = if self.skus.is_empty() {
            None
        } else {
            Some(
                self.skus
                    .iter()
                    .map(stockpulse_core::Sku::new)
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };
        Ok(ForecastOptions {
            skus,
            steps: self.steps,
            retrain_each_step: self.no_retrain.then_some(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_flags_map_to_forecast_options() {
        let cli = Cli::parse_from([
            "stockpulse",
            "--log-format",
            "pretty",
            "train",
            "--refit",
            "--sku",
            "A100",
            "--sku",
            "B200",
            "--steps",
            "4",
            "--no-retrain",
        ]);
        assert_eq!(cli.log_format, LogFormatArg::Pretty);

        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert!(args.refit);
        let options = args.forecast.options().unwrap();
        assert_eq!(options.steps, Some(4));
        assert_eq!(options.retrain_each_step, Some(false));
        assert_eq!(options.skus.unwrap().len(), 2);
    }

    #[test]
    fn forecast_defaults_defer_to_settings() {
        let cli = Cli::parse_from(["stockpulse", "forecast"]);
        let Commands::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.options().unwrap(), ForecastOptions::default());
    }

    #[test]
    fn blank_sku_filter_is_rejected() {
        let cli = Cli::parse_from(["stockpulse", "forecast", "--sku", " "]);
        let Commands::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert!(args.options().is_err());
    }

    #[test]
    fn stock_level_flags_map_to_filter() {
        let cli = Cli::parse_from([
            "stockpulse",
            "stock-levels",
            "--category",
            "Hardware",
            "--flag",
            "just-added-stock",
            "--sort",
            "quantity-desc",
        ]);
        let Commands::StockLevels(args) = cli.command else {
            panic!("expected stock-levels");
        };
        let filter = args.filter();
        assert_eq!(filter.category.as_deref(), Some("Hardware"));
        assert_eq!(filter.flag, Some(ActivityFlag::JustAddedStock));
        assert_eq!(filter.sort, StockSort::QuantityDesc);

        let cli = Cli::parse_from(["stockpulse", "stock-levels"]);
        let Commands::StockLevels(args) = cli.command else {
            panic!("expected stock-levels");
        };
        assert_eq!(args.filter(), StockLevelFilter::default());
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["stockpulse", "forecasts", "--config", "ops.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("ops.toml")));
        assert!(matches!(cli.command, Commands::Forecasts));
    }
}

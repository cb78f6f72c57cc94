use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use energy_dash::config::{DashboardConfig, SchemaChoice};
use energy_dash::data::aggregate::Reducer;
use energy_dash::data::loader::{LoadCache, Source};
use energy_dash::data::model::CellValue;
use energy_dash::error::ConfigError;
use energy_dash::pipeline::{DashboardView, Dataset, ForecastSkip};
use energy_dash::state::DashboardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Clean, filter and summarize a renewable-energy table, and extrapolate its trend.
#[derive(Debug, Parser)]
#[command(name = "energy-dash", version, about)]
struct Args {
    /// Path or URL of the table (overrides the config file)
    source: Option<String>,

    /// JSON config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Built-in schema: energy-projects or country-mix
    #[arg(short, long)]
    schema: Option<String>,

    /// Restrict a filter column to a value; repeat to select several
    #[arg(long = "select", value_name = "COLUMN=VALUE", value_parser = parse_selection)]
    selections: Vec<(String, CellValue)>,

    /// Lower bound of the range column (inclusive)
    #[arg(long)]
    from: Option<f64>,

    /// Upper bound of the range column (inclusive)
    #[arg(long)]
    to: Option<f64>,

    /// Value column for totals and forecasts
    #[arg(long)]
    value_column: Option<String>,

    /// Reducer for grouped totals
    #[arg(long, value_enum)]
    reducer: Option<Reducer>,

    /// Number of future points to forecast
    #[arg(long)]
    horizon: Option<usize>,

    /// Memoize loads by source
    #[arg(long)]
    cache: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn parse_selection(s: &str) -> Result<(String, CellValue), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got \"{s}\""))?;
    Ok((column.trim().to_string(), CellValue::parse(value.trim())))
}

impl Args {
    fn into_config(self) -> Result<(DashboardConfig, OutputFormat)> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::from_file(path)?,
            None => DashboardConfig::default(),
        };
        if let Some(source) = self.source {
            config.source = Some(source);
        }
        if let Some(schema) = self.schema {
            config.schema = SchemaChoice::Builtin(schema);
        }
        if !self.selections.is_empty() {
            config.selections.clear();
            for (column, value) in self.selections {
                config.selections.entry(column).or_default().insert(value);
            }
        }
        if self.from.is_some() || self.to.is_some() {
            let (lo, hi) = config.range.unwrap_or((None, None));
            config.range = Some((self.from.or(lo), self.to.or(hi)));
        }
        if let Some(col) = self.value_column {
            config.value_column = Some(col);
        }
        if let Some(reducer) = self.reducer {
            config.reducer = reducer;
        }
        if let Some(horizon) = self.horizon {
            config.horizon = horizon;
        }
        config.cache_loads |= self.cache;
        Ok((config, self.format))
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let (config, format) = Args::parse().into_config()?;
    let source = Source::parse(config.source.as_deref().ok_or(ConfigError::MissingSource)?);
    let schema = config.schema.resolve()?;

    let mut cache = LoadCache::new(config.cache_loads);
    let dataset = Dataset::load(&source, schema, Some(&mut cache))
        .with_context(|| format!("loading {source}"))?;
    let params = config.view_params(&dataset.table, &dataset.schema)?;
    let state = DashboardState::new(dataset, params);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&state.view)?);
        }
        OutputFormat::Text => print_text(&state),
    }
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn print_text(state: &DashboardState) {
    let DashboardView {
        rows,
        value_column,
        totals,
        statistics,
        correlation,
        forecast,
        ..
    } = &state.view;
    let report = &state.dataset.report;

    println!("== {} ==", state.dataset.schema.name);
    println!(
        "{} rows loaded, {} duplicates dropped, {} cells filled, {} totals reconciled",
        report.input_rows, report.duplicates_removed, report.cells_filled, report.totals_reconciled
    );
    println!("{rows} rows match the current filters\n");

    println!(
        "{} of {value_column} by {}",
        totals.reducer.name(),
        totals.key_column
    );
    for group in &totals.groups {
        println!("  {:<30} {:>16.2}", group.key.to_string(), group.value);
    }

    println!("\nstatistics");
    println!(
        "  {:<32} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in statistics {
        println!(
            "  {:<32} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            s.column,
            s.count,
            fmt_opt(s.mean),
            fmt_opt(s.std),
            fmt_opt(s.min),
            fmt_opt(s.q25),
            fmt_opt(s.q50),
            fmt_opt(s.q75),
            fmt_opt(s.max)
        );
    }

    if !correlation.columns.is_empty() {
        println!("\ncorrelation (full dataset)");
        for (name, row) in correlation.columns.iter().zip(&correlation.values) {
            let cells: Vec<String> = row.iter().map(|r| format!("{r:>6.2}")).collect();
            println!("  {:<32} {}", name, cells.join(" "));
        }
    }

    println!("\nforecast");
    match forecast {
        Ok(result) => {
            println!(
                "  y = {:.4} * x + {:.4} (n = {})",
                result.fit.slope, result.fit.intercept, result.fit.n
            );
            for p in &result.points {
                println!("  {:>10} {:>16.2}", p.x, p.y);
            }
        }
        Err(ForecastSkip::NotConfigured) => println!("  not configured for this schema"),
        Err(ForecastSkip::SubsetAbsent(value)) => {
            println!("  skipped: no {value} rows in the current selection")
        }
        Err(ForecastSkip::Insufficient(reason)) => println!("  skipped: {reason}"),
        Err(ForecastSkip::UnknownColumn(column)) => {
            println!("  skipped: column \"{column}\" is not in the table")
        }
    }
}
